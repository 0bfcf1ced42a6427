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

use crate::api::ErrorKind;
use crate::api::SessionState;

/// The session state machine.
///
/// `Done` and `Failed` are absorbing: entering either one stops every timer, closes both
/// endpoints and emits the single terminal event. `Failed` is reachable from every other state.
#[derive(Debug, PartialEq)]
pub(crate) enum State {
    /// Created; `connect()` has not been called.
    Idle,

    /// Offer/answer exchanged; waiting for both channels to report open, guarded by the connect
    /// timer.
    Connecting,

    /// Both channels open; the start token is being retransmitted, guarded by the start timer.
    Handshaking,

    /// Test packets are being paced out, bounded by the test timer.
    Sending,

    /// Every packet was handed to the send primitive; the end token is being retransmitted and
    /// late packets may still be recorded.
    Draining,

    Done,

    Failed(ErrorKind),
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Done | State::Failed(_))
    }

    pub fn public(&self) -> SessionState {
        match self {
            State::Idle => SessionState::Idle,
            State::Connecting => SessionState::Connecting,
            State::Handshaking => SessionState::Handshaking,
            State::Sending => SessionState::Sending,
            State::Draining => SessionState::Draining,
            State::Done => SessionState::Done,
            State::Failed(_) => SessionState::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!State::Idle.is_terminal());
        assert!(!State::Sending.is_terminal());
        assert!(State::Done.is_terminal());
        assert!(State::Failed(ErrorKind::Cancelled).is_terminal());
    }

    #[test]
    fn maps_to_public_state() {
        assert_eq!(State::Draining.public(), SessionState::Draining);
        assert_eq!(State::Failed(ErrorKind::TestTimeout).public(), SessionState::Failed);
    }
}
