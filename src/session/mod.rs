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

use crate::EventSink;
use crate::api::Endpoint;
use crate::api::ErrorKind;
use crate::api::Options;
use crate::api::OptionsError;
use crate::api::RelayServer;
use crate::api::SessionEvent;
use crate::api::SessionState;
use crate::api::SessionTime;
use crate::api::TestSession;
use crate::session::context::Context;
use crate::session::state::State;
use crate::stats;
use crate::transport::IceCandidate;
use crate::transport::Payload;
use crate::transport::PeerEndpoint;
use crate::transport::Transport;
#[cfg(not(test))]
use log::info;
#[cfg(not(test))]
use log::warn;
use std::cmp::min;
#[cfg(test)]
use std::println as info;
#[cfg(test)]
use std::println as warn;

pub mod context;
pub mod control;
pub mod handshake;
pub mod pacing;
pub mod receive;
pub mod state;


/// A relayed-path measurement session.
///
/// The session is the main entry point for using the `relaymeter` library: it sequences the
/// connection handshake over two co-located peer endpoints, paces the test packets through the
/// relay, tracks their arrival and produces the final statistics exactly once.
///
/// To create a session, use [`crate::new_session`].
pub struct Session {
    now: SessionTime,
    state: State,
    ctx: Context,
}

fn closest_timeout(a: Option<SessionTime>, b: Option<SessionTime>) -> Option<SessionTime> {
    match (a, b) {
        (Some(a), Some(b)) => Some(min(a, b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

/// Terminates the session with an error. Entering the failed state stops every timer, closes
/// both endpoints and emits the failure event; calling it again once the session has terminated
/// does nothing.
pub(crate) fn fail(state: &mut State, ctx: &mut Context, kind: ErrorKind, reason: &str) {
    if state.is_terminal() {
        return;
    }
    warn!("[{}] test failed: {:?}, {}", ctx.name, kind, reason);
    *state = State::Failed(kind);
    ctx.release();
    ctx.emit(SessionEvent::OnFailed(kind, reason.to_string()));
}

/// Completes the test and produces the report. The duration is anchored at the first non-warm-up
/// send. Both termination triggers (end token, last packet) funnel through here; only the first
/// one has any effect.
pub(crate) fn finalize(state: &mut State, ctx: &mut Context, now: SessionTime) {
    if state.is_terminal() {
        return;
    }
    let anchor = ctx.valid_begin.or(ctx.test_begin).unwrap_or(now);
    let test_duration = now - anchor;
    *state = State::Done;
    ctx.release();

    let packets = ctx.tracker.snapshot();
    let backlog = std::mem::take(&mut ctx.backlog);
    let statistics = stats::compute(
        packets,
        ctx.tracker.out_of_order_count(),
        test_duration,
        backlog,
        &ctx.options,
    );
    info!(
        "[{}] test complete: {} packets, {:.1}% loss, {:.1}% out of order",
        ctx.name, statistics.num_packets, statistics.packet_loss_pct, statistics.out_of_order_pct
    );
    ctx.emit(SessionEvent::OnComplete(statistics));
}

impl Session {
    /// Creates a new session measuring the path through `relay`.
    ///
    /// The options are validated before any endpoint is created. Endpoint creation failure does
    /// not fail the constructor; it parks the session in the failed state with the failure event
    /// already queued, so that the caller observes errors on a single surface.
    pub fn new(
        name: &str,
        transport: &mut dyn Transport,
        relay: &RelayServer,
        options: &Options,
    ) -> Result<Session, OptionsError> {
        options.validate()?;

        let mut creation_error = None;
        let mut endpoint_a: Option<Box<dyn PeerEndpoint>> = None;
        let mut endpoint_b: Option<Box<dyn PeerEndpoint>> = None;
        match transport.create_endpoint(relay) {
            Ok(a) => {
                endpoint_a = Some(a);
                let relay_b = options.relay_b.as_ref().unwrap_or(relay);
                match transport.create_endpoint(relay_b) {
                    Ok(b) => endpoint_b = Some(b),
                    Err(error) => creation_error = Some(error),
                }
            }
            Err(error) => creation_error = Some(error),
        }

        let mut state = State::Idle;
        let mut ctx = Context::new(name, options, endpoint_a, endpoint_b);
        if let Some(error) = creation_error {
            fail(&mut state, &mut ctx, ErrorKind::InternalError, &error.to_string());
        }
        Ok(Session { now: SessionTime::zero(), state, ctx })
    }
}

impl TestSession for Session {
    fn poll_event(&mut self) -> Option<SessionEvent> {
        self.ctx.events.next_event()
    }

    fn connect(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        handshake::initiate(&mut self.state, &mut self.ctx, self.now);
    }

    fn cancel(&mut self, reason: &str) {
        fail(&mut self.state, &mut self.ctx, ErrorKind::Cancelled, reason);
    }

    fn handle_channel_open(&mut self, endpoint: Endpoint) {
        if self.state.is_terminal() {
            return;
        }
        handshake::handle_channel_open(&mut self.state, &mut self.ctx, self.now, endpoint);
    }

    fn handle_candidate(&mut self, endpoint: Endpoint, candidate: &IceCandidate) {
        if self.state.is_terminal() {
            return;
        }
        handshake::handle_candidate(&mut self.ctx, endpoint, candidate);
    }

    fn handle_message(&mut self, endpoint: Endpoint, payload: Payload) {
        if self.state.is_terminal() {
            return;
        }
        receive::handle_payload(&mut self.state, &mut self.ctx, self.now, endpoint, payload);
    }

    fn handle_interrupted(&mut self) {
        fail(&mut self.state, &mut self.ctx, ErrorKind::Aborted, "interrupted externally");
    }

    fn advance_time(&mut self, now: SessionTime) {
        if now < self.now {
            return;
        }
        self.now = now;
        if self.state.is_terminal() {
            return;
        }

        if self.ctx.connect_timer.expire(now) {
            fail(
                &mut self.state,
                &mut self.ctx,
                ErrorKind::ConnectionTimeout,
                "timeout connecting through the relay",
            );
            return;
        }
        if self.ctx.start_guard_timer.expire(now) {
            fail(
                &mut self.state,
                &mut self.ctx,
                ErrorKind::ConnectionTimeout,
                "timeout waiting for the start token",
            );
            return;
        }
        if self.ctx.test_timer.expire(now) {
            fail(
                &mut self.state,
                &mut self.ctx,
                ErrorKind::TestTimeout,
                "data phase exceeded its bound",
            );
            return;
        }

        while self.ctx.start_message_timer.expire(now) {
            control::start_token_tick(&mut self.ctx, now);
        }
        while !self.state.is_terminal() && self.ctx.pacing_timer.expire(now) {
            pacing::tick(&mut self.state, &mut self.ctx, now);
        }
        while self.ctx.end_message_timer.expire(now) {
            control::end_token_tick(&mut self.ctx, now);
        }
        if self.ctx.drain_timer.expire(now) {
            finalize(&mut self.state, &mut self.ctx, now);
        }
    }

    fn poll_timeout(&self) -> SessionTime {
        let mut closest = None;
        for timer in [
            &self.ctx.connect_timer,
            &self.ctx.start_guard_timer,
            &self.ctx.start_message_timer,
            &self.ctx.test_timer,
            &self.ctx.pacing_timer,
            &self.ctx.end_message_timer,
            &self.ctx.drain_timer,
        ] {
            closest = closest_timeout(closest, timer.next_expiry());
        }
        match closest {
            // An overdue timer is reported as due now, never in the past.
            Some(expiry) => expiry.max(self.now),
            None => SessionTime::infinite_future(),
        }
    }

    fn state(&self) -> SessionState {
        self.state.public()
    }

    fn options(&self) -> Options {
        self.ctx.options.clone()
    }
}
