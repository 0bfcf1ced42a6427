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

//! The capability contract of the transport/session-establishment collaborator.
//!
//! The session core never talks to a network stack directly. It drives two [`PeerEndpoint`]
//! handles created by a [`Transport`], and the embedder forwards the collaborator's asynchronous
//! events (channel open, candidate discovered, message received) into the corresponding
//! `handle_*` methods on the session. Negotiation internals, vendor differences and candidate
//! discovery all live behind this boundary.

use crate::api::RelayServer;
use thiserror::Error;

/// A message on the datagram channel: either a test packet or a short control token.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Binary(Vec<u8>),
    Text(String),
}

/// An opaque local/remote description produced by offer/answer negotiation.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionDescription {
    pub sdp: String,
}

/// A discovered network path candidate.
#[derive(Clone, Debug, PartialEq)]
pub struct IceCandidate {
    pub candidate: String,
}

impl IceCandidate {
    /// Whether this candidate describes a path through a forwarding (relay) server. Only these
    /// are exchanged between the endpoints, forcing traffic onto the relayed path under
    /// measurement.
    pub fn is_relay(&self) -> bool {
        self.candidate.contains("relay")
    }
}

/// Negotiation (offer/answer/description) failure reported by the collaborator.
#[derive(Debug, Error)]
#[error("negotiation failed: {0}")]
pub struct NegotiationError(pub String);

/// Channel failure raised by a send attempt. A single occurrence is not fatal to the test; the
/// scheduler retries the attempt.
#[derive(Debug, Error)]
#[error("channel error: {0}")]
pub struct ChannelError(pub String);

/// The result of a successful call to [`PeerEndpoint::send`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SendOutcome {
    /// The payload was handed to the channel.
    Accepted,

    /// The channel refused the attempt, e.g. because its buffer has not drained yet. Not an
    /// error; the caller retries later.
    Refused,
}

/// One peer endpoint: a connection handle together with its datagram channel.
pub trait PeerEndpoint {
    fn create_offer(&mut self) -> Result<SessionDescription, NegotiationError>;

    fn create_answer(&mut self) -> Result<SessionDescription, NegotiationError>;

    fn set_local_description(&mut self, desc: &SessionDescription)
    -> Result<(), NegotiationError>;

    fn set_remote_description(
        &mut self,
        desc: &SessionDescription,
    ) -> Result<(), NegotiationError>;

    /// Adds a candidate discovered by the peer endpoint.
    fn add_remote_candidate(&mut self, candidate: &IceCandidate);

    /// Attempts a non-blocking send on the channel.
    fn send(&mut self, payload: &Payload) -> Result<SendOutcome, ChannelError>;

    /// The number of bytes queued on the channel but not yet handed to the network.
    fn buffered_amount(&self) -> usize;

    /// Closes the channel and the connection. Must be idempotent.
    fn close(&mut self);
}

/// Factory for peer endpoints, implemented by the embedder on top of its native connection stack.
pub trait Transport {
    fn create_endpoint(
        &mut self,
        relay: &RelayServer,
    ) -> Result<Box<dyn PeerEndpoint>, NegotiationError>;
}
