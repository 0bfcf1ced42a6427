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
use crate::api::OptionsError;
use crate::api::RelayServer;
use crate::api::TestSession;
use crate::transport::Transport;

pub mod api;
pub mod transport;

pub(crate) mod events;
pub(crate) mod packet;
pub(crate) mod session;
pub(crate) mod stats;
pub(crate) mod timer;
pub(crate) mod tracker;

trait EventSink {
    fn add(&mut self, event: api::SessionEvent);
    fn next_event(&mut self) -> Option<api::SessionEvent>;
}

#[cfg(test)]
pub(crate) mod testing;

/// Returns the version of this crate.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Creates a new `Session` measuring the path through `relay`.
///
/// The provided `name` is only used for logging to identify this session. Both peer endpoints are
/// created from `transport` before this function returns; the handshake itself starts when
/// [`TestSession::connect`] is called.
pub fn new_session(
    name: &str,
    transport: &mut dyn Transport,
    relay: &RelayServer,
    options: &Options,
) -> Result<Box<dyn TestSession>, OptionsError> {
    Ok(Box::new(session::Session::new(name, transport, relay, options)?))
}

pub(crate) mod logging {
    use crate::transport::Payload;
    #[cfg(not(test))]
    use log::debug;
    #[cfg(test)]
    use std::println as debug;
    use std::time::Duration;

    pub fn log_payload(name: &str, ts: Duration, sent: bool, payload: &Payload) {
        let prefix = if sent { "O" } else { "I" };
        match payload {
            Payload::Binary(data) => {
                debug!("{} {:>8}ms binary {} bytes # {}", prefix, ts.as_millis(), data.len(), name);
            }
            Payload::Text(token) => {
                debug!("{} {:>8}ms token {:?} # {}", prefix, ts.as_millis(), token, name);
            }
        }
    }
}
