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

use crate::api::SessionTime;

/// Maximum number of timer restarts, when not set.
pub const MAX_RESTARTS: u32 = u32::MAX;

/// A very simple timer implementation
///
/// Timers are started and can be stopped or restarted. A timer is automatically restarted when it
/// expires, as long as the number of restarts is below the configurable `max_restarts` parameter,
/// so a guard timer is created with `max_restarts: Some(0)` and a periodic timer with
/// `max_restarts: None`. The restart is computed from the previous expiry rather than from the
/// observation time, so a periodic timer does not drift when its expiry is observed late. The
/// `is_running` property can be queried to know if it's still running after having expired.
pub struct Timer {
    base_duration: std::time::Duration,
    expiration_count: u32,
    max_restarts: u32,
    next_expiry: Option<SessionTime>,
}

impl Timer {
    /// Creates a new timer with the provided duration and restart limit.
    pub fn new(duration: std::time::Duration, max_restarts: Option<u32>) -> Self {
        Self {
            base_duration: duration,
            expiration_count: 0,
            max_restarts: max_restarts.unwrap_or(MAX_RESTARTS),
            next_expiry: None,
        }
    }

    fn compute_expiry(&self, from_time: SessionTime) -> Option<SessionTime> {
        if self.base_duration == std::time::Duration::ZERO {
            None
        } else {
            Some(from_time + self.base_duration)
        }
    }

    /// Returns true if a timer has expired. This method is not idempotent - calling it changes
    /// its state.
    ///
    /// If expired, it will calculate the next expiration time and update the timer. If the timer
    /// has reached its max restart limit (if any), it will be stopped, otherwise, it will keep
    /// running.
    pub fn expire(&mut self, now: SessionTime) -> bool {
        let Some(current_expiry) = self.next_expiry else {
            return false;
        };

        if current_expiry > now {
            return false;
        }

        let restarts_remaining = self.expiration_count < self.max_restarts;
        self.expiration_count = self.expiration_count.saturating_add(1);

        self.next_expiry =
            restarts_remaining.then(|| self.compute_expiry(current_expiry)).flatten();

        true
    }

    pub fn next_expiry(&self) -> Option<SessionTime> {
        self.next_expiry
    }

    pub fn is_running(&self) -> bool {
        self.next_expiry.is_some()
    }

    pub fn stop(&mut self) {
        self.next_expiry = None;
    }

    /// Starts a timer. If it's already started, it will be restarted to its original expiration
    /// delay and its expiration count will be reset.
    pub fn start(&mut self, now: SessionTime) {
        self.expiration_count = 0;
        self.next_expiry = self.compute_expiry(now);
    }

    /// Updates the timer's duration. This doesn't change the timer's current expiration time in
    /// case it's running.
    pub fn set_duration(&mut self, duration: std::time::Duration) {
        self.base_duration = duration;
    }

    /// Returns the timer's duration.
    pub fn duration(&self) -> std::time::Duration {
        self.base_duration
    }
}
