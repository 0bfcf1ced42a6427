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

//! A deterministic in-memory transport for tests.
//!
//! Accepted sends are parked in a per-endpoint queue on the shared [`FakeNet`]; the test decides
//! when (and whether) to hand them to the session's `handle_message`, which makes loss,
//! reordering and delay trivial to stage. Failure injection covers endpoint creation,
//! offer/answer creation, refused sends and channel errors.

use crate::api::RelayServer;
use crate::transport::ChannelError;
use crate::transport::IceCandidate;
use crate::transport::NegotiationError;
use crate::transport::Payload;
use crate::transport::PeerEndpoint;
use crate::transport::SendOutcome;
use crate::transport::SessionDescription;
use crate::transport::Transport;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Default)]
pub struct FakeNet {
    /// Payloads accepted for sending, per endpoint index (0 = A, 1 = B).
    pub sent: [VecDeque<Payload>; 2],

    /// Value reported by `buffered_amount`.
    pub buffered: [usize; 2],

    /// Number of upcoming send attempts to refuse, per endpoint.
    pub refuse_next: [u32; 2],

    /// Number of upcoming send attempts to fail with a channel error, per endpoint.
    pub error_next: [u32; 2],

    pub send_calls: [u32; 2],
    pub close_calls: [u32; 2],

    /// Candidates added *to* each endpoint via `add_remote_candidate`.
    pub added_candidates: [Vec<IceCandidate>; 2],

    pub fail_create: bool,
    pub fail_offer: bool,
    pub fail_answer: bool,

    pub created: u32,

    /// The relay each created endpoint was pointed at.
    pub relays: Vec<RelayServer>,
}

pub struct FakeTransport {
    net: Rc<RefCell<FakeNet>>,
}

impl FakeTransport {
    pub fn new() -> (FakeTransport, Rc<RefCell<FakeNet>>) {
        let net = Rc::new(RefCell::new(FakeNet::default()));
        (FakeTransport { net: Rc::clone(&net) }, net)
    }
}

impl Transport for FakeTransport {
    fn create_endpoint(
        &mut self,
        relay: &RelayServer,
    ) -> Result<Box<dyn PeerEndpoint>, NegotiationError> {
        let mut net = self.net.borrow_mut();
        if net.fail_create {
            return Err(NegotiationError("endpoint creation failed".into()));
        }
        let index = net.created as usize;
        net.created += 1;
        net.relays.push(relay.clone());
        Ok(Box::new(FakeEndpoint { index, net: Rc::clone(&self.net) }))
    }
}

struct FakeEndpoint {
    index: usize,
    net: Rc<RefCell<FakeNet>>,
}

impl PeerEndpoint for FakeEndpoint {
    fn create_offer(&mut self) -> Result<SessionDescription, NegotiationError> {
        if self.net.borrow().fail_offer {
            return Err(NegotiationError("offer creation failed".into()));
        }
        Ok(SessionDescription { sdp: "v=0 offer".into() })
    }

    fn create_answer(&mut self) -> Result<SessionDescription, NegotiationError> {
        if self.net.borrow().fail_answer {
            return Err(NegotiationError("answer creation failed".into()));
        }
        Ok(SessionDescription { sdp: "v=0 answer".into() })
    }

    fn set_local_description(
        &mut self,
        _desc: &SessionDescription,
    ) -> Result<(), NegotiationError> {
        Ok(())
    }

    fn set_remote_description(
        &mut self,
        _desc: &SessionDescription,
    ) -> Result<(), NegotiationError> {
        Ok(())
    }

    fn add_remote_candidate(&mut self, candidate: &IceCandidate) {
        self.net.borrow_mut().added_candidates[self.index].push(candidate.clone());
    }

    fn send(&mut self, payload: &Payload) -> Result<SendOutcome, ChannelError> {
        let mut net = self.net.borrow_mut();
        net.send_calls[self.index] += 1;
        if net.error_next[self.index] > 0 {
            net.error_next[self.index] -= 1;
            return Err(ChannelError("injected send error".into()));
        }
        if net.refuse_next[self.index] > 0 {
            net.refuse_next[self.index] -= 1;
            return Ok(SendOutcome::Refused);
        }
        net.sent[self.index].push_back(payload.clone());
        Ok(SendOutcome::Accepted)
    }

    fn buffered_amount(&self) -> usize {
        self.net.borrow().buffered[self.index]
    }

    fn close(&mut self) {
        self.net.borrow_mut().close_calls[self.index] += 1;
    }
}
