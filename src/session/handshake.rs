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

//! Offer/answer sequencing and candidate exchange between the two co-located endpoints.
//!
//! Endpoint A creates the offer, endpoint B the answer; each description is set locally on its
//! creator and remotely on the peer. Discovered candidates are only forwarded when they describe
//! a relayed path, so that the channel is forced through the relay under measurement; everything
//! else is dropped without being an error.

use crate::api::Endpoint;
use crate::api::ErrorKind;
use crate::api::SessionTime;
use crate::session::context::Context;
use crate::session::control;
use crate::session::fail;
use crate::session::state::State;
use crate::transport::IceCandidate;
use crate::transport::NegotiationError;
#[cfg(not(test))]
use log::debug;
#[cfg(not(test))]
use log::warn;
#[cfg(test)]
use std::println as debug;
#[cfg(test)]
use std::println as warn;

/// Starts the connection: arms the connect timer and runs the blocking part of the offer/answer
/// exchange. The handshake completes asynchronously when both channels report open.
pub(crate) fn initiate(state: &mut State, ctx: &mut Context, now: SessionTime) {
    if *state != State::Idle {
        warn!("[{}] connect() called more than once, ignoring", ctx.name);
        return;
    }
    *state = State::Connecting;
    ctx.connect_timer.start(now);

    if let Err(error) = run_offer_answer(ctx) {
        fail(state, ctx, ErrorKind::InternalError, &error.to_string());
    }
}

fn run_offer_answer(ctx: &mut Context) -> Result<(), NegotiationError> {
    let Some(a) = ctx.endpoint_a.as_mut() else {
        return Err(NegotiationError("endpoint A is gone".into()));
    };
    let offer = a.create_offer()?;
    a.set_local_description(&offer)?;

    let Some(b) = ctx.endpoint_b.as_mut() else {
        return Err(NegotiationError("endpoint B is gone".into()));
    };
    b.set_remote_description(&offer)?;
    let answer = b.create_answer()?;
    b.set_local_description(&answer)?;

    let Some(a) = ctx.endpoint_a.as_mut() else {
        return Err(NegotiationError("endpoint A is gone".into()));
    };
    a.set_remote_description(&answer)?;
    Ok(())
}

/// A channel endpoint reported open. Once both are open the connect timer is cancelled and
/// control passes to the start phase.
pub(crate) fn handle_channel_open(
    state: &mut State,
    ctx: &mut Context,
    now: SessionTime,
    endpoint: Endpoint,
) {
    if *state != State::Connecting {
        debug!("[{}] channel {} open event in {:?}, ignoring", ctx.name, endpoint, state);
        return;
    }
    debug!("[{}] channel {} open", ctx.name, endpoint);
    match endpoint {
        Endpoint::A => ctx.a_open = true,
        Endpoint::B => ctx.b_open = true,
    }
    if ctx.a_open && ctx.b_open {
        ctx.connect_timer.stop();
        control::begin_start_phase(state, ctx, now);
    }
}

/// A local candidate was discovered on `endpoint`. Relay-type candidates are added to the peer
/// endpoint; all others are discarded.
pub(crate) fn handle_candidate(ctx: &mut Context, endpoint: Endpoint, candidate: &IceCandidate) {
    if !candidate.is_relay() {
        debug!(
            "[{}] discarding non-relay candidate from {}: {}",
            ctx.name, endpoint, candidate.candidate
        );
        return;
    }
    debug!(
        "[{}] adding relay candidate into {}: {}",
        ctx.name,
        endpoint.peer(),
        candidate.candidate
    );
    if let Some(peer) = ctx.endpoint_mut(endpoint.peer()) {
        peer.add_remote_candidate(candidate);
    }
}
