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

//! Inbound message dispatch.
//!
//! Every (state, endpoint, payload) combination has a defined outcome: record, ignore, or fail
//! with an internal error. Test packets and the end token are only meaningful on endpoint B, the
//! start token only on the side opposite to its configured sender; anything else is a protocol
//! violation on this channel.

use crate::api::Endpoint;
use crate::api::ErrorKind;
use crate::api::PacketId;
use crate::api::SessionEvent;
use crate::api::SessionTime;
use crate::logging::log_payload;
use crate::packet::Inbound;
use crate::packet::classify;
use crate::session::context::Context;
use crate::session::fail;
use crate::session::finalize;
use crate::session::pacing;
use crate::session::state::State;
use crate::tracker::ReceiveOutcome;
use crate::transport::Payload;
#[cfg(not(test))]
use log::debug;
#[cfg(not(test))]
use log::warn;
#[cfg(test)]
use std::println as debug;
#[cfg(test)]
use std::println as warn;

pub(crate) fn handle_payload(
    state: &mut State,
    ctx: &mut Context,
    now: SessionTime,
    endpoint: Endpoint,
    payload: Payload,
) {
    log_payload(&ctx.name, now - SessionTime::zero(), false, &payload);
    match classify(&payload, ctx.options.packet_size) {
        Inbound::Start => handle_start(state, ctx, now, endpoint),
        Inbound::End => handle_end(state, ctx, now, endpoint),
        Inbound::Data(id) => handle_data(state, ctx, now, endpoint, id),
        Inbound::Unexpected => {
            fail(state, ctx, ErrorKind::InternalError, "unexpected message received");
        }
    }
}

fn handle_start(state: &mut State, ctx: &mut Context, now: SessionTime, endpoint: Endpoint) {
    if ctx.start_token_receiver() != Some(endpoint) {
        fail(state, ctx, ErrorKind::InternalError, "START received on an unexpected channel");
        return;
    }
    match state {
        State::Handshaking => {
            debug!("[{}] START received, starting the test", ctx.name);
            ctx.start_message_timer.stop();
            ctx.start_guard_timer.stop();
            pacing::begin_test(state, ctx, now);
        }
        State::Sending | State::Draining => {
            // The opposite side stops repeating the token the moment it is first observed, but
            // transmissions already in flight may still arrive.
            debug!("[{}] ignoring START retransmission", ctx.name);
        }
        _ => fail(state, ctx, ErrorKind::InternalError, "START received out of phase"),
    }
}

fn handle_end(state: &mut State, ctx: &mut Context, now: SessionTime, endpoint: Endpoint) {
    if endpoint != Endpoint::B {
        fail(state, ctx, ErrorKind::InternalError, "END received on an unexpected channel");
        return;
    }
    match state {
        State::Draining if !ctx.end_seen => {
            debug!("[{}] END received", ctx.name);
            ctx.end_seen = true;
            ctx.end_message_timer.stop();
            if ctx.options.drain_window.is_some() && !ctx.tracker.all_received() {
                // Keep recording late packets for the settle window before producing the
                // report.
                ctx.drain_timer.start(now);
            } else {
                finalize(state, ctx, now);
            }
        }
        State::Draining => {
            debug!("[{}] ignoring END retransmission", ctx.name);
        }
        _ => fail(state, ctx, ErrorKind::InternalError, "END received out of phase"),
    }
}

fn handle_data(
    state: &mut State,
    ctx: &mut Context,
    now: SessionTime,
    endpoint: Endpoint,
    id: PacketId,
) {
    if endpoint != Endpoint::B {
        fail(state, ctx, ErrorKind::InternalError, "test packet received on an unexpected channel");
        return;
    }
    if !matches!(state, State::Sending | State::Draining) {
        fail(state, ctx, ErrorKind::InternalError, "test packet received out of phase");
        return;
    }

    let begin = ctx.test_begin.unwrap_or(now);
    let offset = now - begin;
    match ctx.tracker.record_received(id, offset) {
        ReceiveOutcome::Recorded { out_of_order, .. } => {
            if out_of_order {
                debug!("[{}] packet {} received out of order", ctx.name, id);
            }
            ctx.push_backlog_sample(offset);
            let received = ctx.tracker.received_count();
            let total = ctx.options.packet_count;
            ctx.emit(SessionEvent::OnPacketReceived(id, received, total));
            if ctx.tracker.all_received() {
                // The last pending packet may beat the end token; the first trigger wins and
                // there is nothing left to drain.
                debug!("[{}] received packet is the last one, ending the test", ctx.name);
                finalize(state, ctx, now);
            }
        }
        ReceiveOutcome::Duplicate => {
            warn!(
                "[{}] retransmission received for packet {} (must not happen on this channel)",
                ctx.name, id
            );
        }
        ReceiveOutcome::NeverSent | ReceiveOutcome::OutOfRange => {
            fail(state, ctx, ErrorKind::InternalError, "malformed packet id received");
        }
    }
}
