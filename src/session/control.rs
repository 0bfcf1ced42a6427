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

//! Redundant retransmission of the out-of-band control tokens.
//!
//! A single transmission of `"START"` or `"END"` could be dropped by the unreliable channel, so
//! the token is repeated on a fixed interval until the co-located opposite endpoint observes it
//! and stops the repetition. Receiving a token a second time is a no-op on the receiving side.

use crate::api::Endpoint;
use crate::api::SessionTime;
use crate::logging::log_payload;
use crate::packet::END_TOKEN;
use crate::packet::START_TOKEN;
use crate::session::context::Context;
use crate::session::pacing;
use crate::session::state::State;
use crate::transport::Payload;
#[cfg(not(test))]
use log::debug;
#[cfg(not(test))]
use log::warn;
#[cfg(test)]
use std::println as debug;
#[cfg(test)]
use std::println as warn;

/// Both channels are open: either start the data phase right away, or enter the start-token
/// exchange with its own guard timer, depending on the configured policy.
pub(crate) fn begin_start_phase(state: &mut State, ctx: &mut Context, now: SessionTime) {
    match ctx.start_token_sender() {
        None => pacing::begin_test(state, ctx, now),
        Some(sender) => {
            debug!("[{}] exchanging the start token from endpoint {}", ctx.name, sender);
            *state = State::Handshaking;
            ctx.start_message_timer.start(now);
            // The channel open events alone don't prove the reverse path works, so the guard
            // keeps running until the token actually arrives.
            ctx.start_guard_timer.start(now);
        }
    }
}

/// One retransmission of the start token.
pub(crate) fn start_token_tick(ctx: &mut Context, now: SessionTime) {
    if let Some(sender) = ctx.start_token_sender() {
        send_token(ctx, sender, START_TOKEN, now);
    }
}

/// Every packet was handed to the send primitive: move to draining and begin repeating the end
/// token towards the receiver. The test timer keeps running.
pub(crate) fn begin_end_phase(state: &mut State, ctx: &mut Context, now: SessionTime) {
    *state = State::Draining;
    ctx.pacing_timer.stop();
    ctx.end_message_timer.start(now);
}

/// One retransmission of the end token.
pub(crate) fn end_token_tick(ctx: &mut Context, now: SessionTime) {
    send_token(ctx, Endpoint::A, END_TOKEN, now);
}

fn send_token(ctx: &mut Context, endpoint: Endpoint, token: &str, now: SessionTime) {
    let payload = Payload::Text(token.to_string());
    log_payload(&ctx.name, now - SessionTime::zero(), true, &payload);
    let outcome = ctx.endpoint_mut(endpoint).map(|handle| handle.send(&payload));
    // A dropped or refused token is compensated by the next tick.
    if let Some(Err(error)) = outcome {
        warn!("[{}] error sending {} token: {}", ctx.name, token, error);
    }
}
