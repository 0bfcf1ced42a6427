// Copyright 2026 The relaymeter Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::api::Options;
use crate::api::PacketId;
use crate::api::SessionTime;
use crate::logging::log_payload;
use crate::packet::TestPacket;
use crate::session::context::Context;
use crate::session::control;
use crate::session::state::State;
use crate::transport::SendOutcome;
#[cfg(not(test))]
use log::debug;
#[cfg(not(test))]
use log::warn;
use std::time::Duration;
#[cfg(test)]
use std::println as debug;
#[cfg(test)]
use std::println as warn;

/// Paces the transmission of the configured number of test packets over endpoint A.
///
/// The send primitive is non-blocking and may refuse an attempt or raise a channel error; neither
/// is fatal. An attempt is also skipped while the in-flight volume exceeds the configured ceiling
/// or the channel buffer has not drained. Skipped attempts are retried on a short fixed delay,
/// successful sends re-arm the pacing timer so that the effective cadence stays close to the
/// configured interval even when ticks are observed late.
pub(crate) struct PacketScheduler {
    packet: TestPacket,
    packet_count: u16,
    next_id: u16,
    num_sent: u16,

    /// The target time of the armed tick; the difference to the observed tick time shortens the
    /// next delay.
    next_send_at: SessionTime,
}

enum SendAttempt {
    Accepted,
    Deferred,
}

impl PacketScheduler {
    /// Lower bound on the delay between send attempts, also used to retry a skipped attempt.
    pub const MIN_SEND_DELAY: Duration = Duration::from_millis(2);

    pub fn new(options: &Options) -> Self {
        Self {
            packet: TestPacket::new(options.packet_size),
            packet_count: options.packet_count,
            next_id: 0,
            num_sent: 0,
            next_send_at: SessionTime::zero(),
        }
    }

    pub fn num_sent(&self) -> u16 {
        self.num_sent
    }

    pub fn all_sent(&self) -> bool {
        self.num_sent == self.packet_count
    }
}

/// Starts the data phase: anchors the test epoch, arms the test timer and attempts the first
/// send right away.
pub(crate) fn begin_test(state: &mut State, ctx: &mut Context, now: SessionTime) {
    debug!("[{}] starting the data phase", ctx.name);
    *state = State::Sending;
    ctx.test_begin = Some(now);
    ctx.test_timer.start(now);
    ctx.scheduler.next_send_at = now;
    tick(state, ctx, now);
}

/// One pacing tick: attempts a single send and arms the timer for the next attempt, or hands
/// over to the end messenger after the last packet was accepted.
pub(crate) fn tick(state: &mut State, ctx: &mut Context, now: SessionTime) {
    debug_assert!(*state == State::Sending);

    let delay = match attempt_send(ctx, now) {
        SendAttempt::Accepted => {
            if ctx.scheduler.all_sent() {
                debug!("[{}] all the packets sent", ctx.name);
                control::begin_end_phase(state, ctx, now);
                return;
            }
            // The tick may have been observed late (a slow synchronous send shows up as
            // lateness); subtract it so the cadence does not accumulate the delay.
            let lateness = now - ctx.scheduler.next_send_at;
            ctx.options
                .sending_interval
                .saturating_sub(lateness)
                .max(PacketScheduler::MIN_SEND_DELAY)
        }
        SendAttempt::Deferred => PacketScheduler::MIN_SEND_DELAY,
    };

    ctx.scheduler.next_send_at = now + delay;
    ctx.pacing_timer.set_duration(delay);
    ctx.pacing_timer.start(now);
}

fn attempt_send(ctx: &mut Context, now: SessionTime) -> SendAttempt {
    if ctx.pending_bytes() > ctx.options.pending_ceiling() {
        debug!("[{}] in-flight volume above ceiling, deferring send", ctx.name);
        return SendAttempt::Deferred;
    }

    let Some(endpoint) = ctx.endpoint_a.as_ref() else {
        return SendAttempt::Deferred;
    };
    if endpoint.buffered_amount() > 0 {
        debug!("[{}] sending buffer not empty, deferring send", ctx.name);
        return SendAttempt::Deferred;
    }

    let id = PacketId(ctx.scheduler.next_id);
    ctx.scheduler.packet.set_id(id);
    let payload = ctx.scheduler.packet.to_payload();

    let Some(endpoint) = ctx.endpoint_a.as_mut() else {
        return SendAttempt::Deferred;
    };
    match endpoint.send(&payload) {
        Ok(SendOutcome::Accepted) => {}
        Ok(SendOutcome::Refused) => {
            debug!("[{}] send of packet {} refused, retrying", ctx.name, id);
            return SendAttempt::Deferred;
        }
        Err(error) => {
            // A single failed attempt is recovered by retrying, exactly like a full buffer.
            warn!("[{}] error sending packet {}: {}", ctx.name, id, error);
            return SendAttempt::Deferred;
        }
    }

    let begin = ctx.test_begin.unwrap_or(now);
    let offset = now - begin;
    log_payload(&ctx.name, offset, true, &payload);

    let ignored = offset < ctx.options.ignored_interval;
    if !ignored && ctx.valid_begin.is_none() {
        ctx.valid_begin = Some(now);
    }
    ctx.tracker.record_sent(id, offset, ignored);
    ctx.scheduler.next_id += 1;
    ctx.scheduler.num_sent += 1;
    ctx.push_backlog_sample(offset);
    SendAttempt::Accepted
}
