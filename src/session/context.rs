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
use crate::api::BacklogSample;
use crate::api::Endpoint;
use crate::api::Options;
use crate::api::SessionEvent;
use crate::api::SessionTime;
use crate::api::StartPolicy;
use crate::events::Events;
use crate::session::pacing::PacketScheduler;
use crate::timer::Timer;
use crate::tracker::SequenceTracker;
use crate::transport::PeerEndpoint;
use std::time::Duration;

/// Everything a session owns besides its state: the two endpoint handles, every timer, the
/// scheduler, the tracker and the event queue. Keeping all timers here lets teardown cancel them
/// from one place, and `release` is the single spot where resources are let go.
pub(crate) struct Context {
    pub name: String,
    pub options: Options,
    pub events: Events,

    pub endpoint_a: Option<Box<dyn PeerEndpoint>>,
    pub endpoint_b: Option<Box<dyn PeerEndpoint>>,

    /// Guards the time from `connect()` until both channels are open.
    pub connect_timer: Timer,

    /// Guards the time from both-channels-open until the start token is observed.
    pub start_guard_timer: Timer,

    /// Retransmits the start token.
    pub start_message_timer: Timer,

    /// Absolute bound on the data phase.
    pub test_timer: Timer,

    /// Fires one send attempt; re-armed by the scheduler with the delay to the next attempt.
    pub pacing_timer: Timer,

    /// Retransmits the end token.
    pub end_message_timer: Timer,

    /// The settle window after the end token, when configured.
    pub drain_timer: Timer,

    pub a_open: bool,
    pub b_open: bool,
    pub end_seen: bool,

    pub scheduler: PacketScheduler,
    pub tracker: SequenceTracker,

    /// When the first packet was sent.
    pub test_begin: Option<SessionTime>,

    /// When the first non-warm-up packet was sent; the anchor for the reported duration.
    pub valid_begin: Option<SessionTime>,

    pub backlog: Vec<BacklogSample>,
}

impl Context {
    pub fn new(
        name: &str,
        options: &Options,
        endpoint_a: Option<Box<dyn PeerEndpoint>>,
        endpoint_b: Option<Box<dyn PeerEndpoint>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            events: Events::new(),
            endpoint_a,
            endpoint_b,
            connect_timer: Timer::new(options.connect_timeout, Some(0)),
            start_guard_timer: Timer::new(options.connect_timeout, Some(0)),
            start_message_timer: Timer::new(options.start_message_interval, None),
            test_timer: Timer::new(options.test_timeout, Some(0)),
            pacing_timer: Timer::new(PacketScheduler::MIN_SEND_DELAY, Some(0)),
            end_message_timer: Timer::new(options.end_message_interval, None),
            drain_timer: Timer::new(options.drain_window.unwrap_or(Duration::ZERO), Some(0)),
            a_open: false,
            b_open: false,
            end_seen: false,
            scheduler: PacketScheduler::new(options),
            tracker: SequenceTracker::new(options.packet_count),
            test_begin: None,
            valid_begin: None,
            backlog: Vec::new(),
            options: options.clone(),
        }
    }

    pub fn emit(&mut self, event: SessionEvent) {
        self.events.add(event);
    }

    pub fn endpoint_mut(&mut self, endpoint: Endpoint) -> Option<&mut Box<dyn PeerEndpoint>> {
        match endpoint {
            Endpoint::A => self.endpoint_a.as_mut(),
            Endpoint::B => self.endpoint_b.as_mut(),
        }
    }

    /// Which endpoint retransmits the start token, if the policy uses one.
    pub fn start_token_sender(&self) -> Option<Endpoint> {
        match self.options.start_policy {
            StartPolicy::Immediate => None,
            StartPolicy::FromReceiver => Some(Endpoint::B),
            StartPolicy::FromSender => Some(Endpoint::A),
        }
    }

    /// Which endpoint's receipt of the start token begins the data phase.
    pub fn start_token_receiver(&self) -> Option<Endpoint> {
        self.start_token_sender().map(|e| e.peer())
    }

    /// The sent-but-not-yet-received volume in bytes.
    pub fn pending_bytes(&self) -> usize {
        let in_flight =
            usize::from(self.scheduler.num_sent()) - usize::from(self.tracker.received_count());
        in_flight * self.options.packet_size
    }

    pub fn push_backlog_sample(&mut self, at: Duration) {
        let pending_bytes = self.pending_bytes();
        self.backlog.push(BacklogSample { at, pending_bytes });
    }

    fn stop_all_timers(&mut self) {
        self.connect_timer.stop();
        self.start_guard_timer.stop();
        self.start_message_timer.stop();
        self.test_timer.stop();
        self.pacing_timer.stop();
        self.end_message_timer.stop();
        self.drain_timer.stop();
    }

    /// Stops every timer and closes both endpoints. Idempotent: a second call finds the handles
    /// already taken and does nothing.
    pub fn release(&mut self) {
        self.stop_all_timers();
        if let Some(mut endpoint) = self.endpoint_a.take() {
            endpoint.close();
        }
        if let Some(mut endpoint) = self.endpoint_b.take() {
            endpoint.close();
        }
    }
}
