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

use crate::packet::SEQUENCE_HEADER_SIZE;
use crate::transport::IceCandidate;
use crate::transport::Payload;
use std::fmt;
use std::ops::Add;
use std::ops::Sub;
use std::time::Duration;
use thiserror::Error;

pub use crate::session::Session;

/// Represents a point in time relative to the creation of the session.
///
/// This is an absolute timestamp within the "Session Epoch".
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SessionTime(Duration);

impl SessionTime {
    /// The moment the session was created (t=0).
    pub const fn zero() -> SessionTime {
        SessionTime(Duration::ZERO)
    }
    pub const fn infinite_future() -> SessionTime {
        SessionTime(Duration::MAX)
    }
}

impl Add<Duration> for SessionTime {
    type Output = SessionTime;
    fn add(self, rhs: Duration) -> SessionTime {
        SessionTime(self.0 + rhs)
    }
}

impl Sub<Duration> for SessionTime {
    type Output = SessionTime;
    fn sub(self, rhs: Duration) -> SessionTime {
        SessionTime(self.0 - rhs)
    }
}

impl Sub<SessionTime> for SessionTime {
    type Output = Duration;
    fn sub(self, rhs: SessionTime) -> Duration {
        self.0 - rhs.0
    }
}

impl From<Duration> for SessionTime {
    fn from(value: Duration) -> Self {
        SessionTime(value)
    }
}

impl From<SessionTime> for Duration {
    fn from(value: SessionTime) -> Self {
        value.0
    }
}

/// Sequence identifier of a test packet, carried in the first two bytes of its payload.
///
/// Identifiers are assigned strictly in increasing order starting at zero, and are never reused
/// within a session.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PacketId(pub u16);

impl fmt::Debug for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the two co-located peer endpoints driven by a session.
///
/// Endpoint A initiates the offer and transmits the test packets; endpoint B answers and receives
/// them.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Endpoint {
    A,
    B,
}

impl Endpoint {
    /// The endpoint at the other end of the relayed path.
    pub fn peer(&self) -> Endpoint {
        match self {
            Endpoint::A => Endpoint::B,
            Endpoint::B => Endpoint::A,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::A => write!(f, "A"),
            Endpoint::B => write!(f, "B"),
        }
    }
}

/// Represents the category of an error that terminated a session.
///
/// This enum is used in [`SessionEvent::OnFailed`] and is a closed taxonomy: transient conditions
/// (a refused send, a not-yet-drained buffer) are recovered internally and never surface here.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// The connection handshake, or the start-token confirmation that follows it, did not
    /// complete within the configured connect timeout.
    ConnectionTimeout,

    /// The data phase exceeded [`Options::test_timeout`].
    TestTimeout,

    /// Negotiation failed, a malformed packet was received, or some other condition with no
    /// recovery path occurred.
    InternalError,

    /// The caller cancelled the session via [`TestSession::cancel`].
    Cancelled,

    /// The session was interrupted externally, e.g. by losing foreground focus. See
    /// [`TestSession::handle_interrupted`].
    Aborted,
}

/// Selects how the data phase is started once both channels are open.
///
/// The start token exists because a single transmission over the unreliable channel may be lost;
/// it is repeated on a fixed interval until the opposite side observes it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StartPolicy {
    /// Start transmitting test packets as soon as both channels are open.
    Immediate,

    /// The receiving endpoint (B) repeatedly sends `"START"` to the sender; packet transmission
    /// begins when the sender observes it. This additionally confirms the reverse path before
    /// the test begins.
    FromReceiver,

    /// The sending endpoint (A) repeatedly sends `"START"` to the receiver; packet transmission
    /// begins when the receiver observes it.
    FromSender,
}

/// A relay (TURN) server endpoint, given as configuration.
///
/// Candidate discovery and relay allocation happen inside the transport collaborator; the session
/// only forwards relay-type candidates between the two endpoints so that traffic is forced
/// through the relay under measurement.
#[derive(Clone, Debug)]
pub struct RelayServer {
    /// One or more URIs for the same relay, e.g. `turn:turn.example.com:3478?transport=udp`.
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// User configurable options.
#[derive(Clone, Debug)]
pub struct Options {
    /// Number of test packets to send. Must be greater than zero.
    pub packet_count: u16,

    /// The size of each test packet in bytes. Must be even and large enough to carry the two
    /// byte sequence header. Everything after the header is random padding.
    pub packet_size: usize,

    /// Target cadence between consecutive test packets. May be zero, in which case packets are
    /// sent as fast as the send primitive accepts them.
    pub sending_interval: Duration,

    /// Bounds the time spent connecting to the relay, and separately the time spent waiting for
    /// the start token once both channels are open.
    pub connect_timeout: Duration,

    /// Absolute bound on the data phase (sending and draining). When it fires the session fails
    /// with [`ErrorKind::TestTimeout`].
    pub test_timeout: Duration,

    /// Initial warm-up interval. Packets sent while the test has been running for less than this
    /// are flagged as warm-up and excluded from the statistics, to avoid measurement bias from
    /// connection ramp-up effects. Must not exceed half of the nominal test duration
    /// (`packet_count` x `sending_interval`).
    pub ignored_interval: Duration,

    /// How the data phase is started. See [`StartPolicy`].
    pub start_policy: StartPolicy,

    /// Grace period after the end token during which late-arriving test packets are still
    /// recorded before the report is computed. `None` finalizes on the first end token.
    pub drain_window: Option<Duration>,

    /// Retransmission interval for the `"START"` token.
    pub start_message_interval: Duration,

    /// Retransmission interval for the `"END"` token.
    pub end_message_interval: Duration,

    /// Ceiling on the in-flight volume, in bytes. While `(sent - received) * packet_size`
    /// exceeds this value, send attempts are skipped and retried, which bounds queueing on a
    /// congested path. `None` uses 25 packets worth of bytes.
    pub max_pending_bytes: Option<usize>,

    /// Optional second relay for endpoint B. When unset, both endpoints use the same relay.
    pub relay_b: Option<RelayServer>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            packet_count: 800,
            packet_size: 1250,
            sending_interval: Duration::from_millis(10),
            connect_timeout: Duration::from_secs(4),
            test_timeout: Duration::from_secs(30),
            ignored_interval: Duration::from_secs(2),
            start_policy: StartPolicy::FromReceiver,
            drain_window: None,
            start_message_interval: Duration::from_millis(100),
            end_message_interval: Duration::from_millis(100),
            max_pending_bytes: None,
            relay_b: None,
        }
    }
}

/// Validation errors for [`Options`], reported before any channel is created.
#[derive(Debug, Error, PartialEq)]
pub enum OptionsError {
    #[error("packet_count must be greater than zero")]
    ZeroPacketCount,

    #[error("packet_size must be even")]
    OddPacketSize,

    #[error("packet_size must be at least {0} bytes")]
    PacketSizeTooSmall(usize),

    #[error("ignored_interval must not exceed half of the nominal test duration")]
    IgnoredIntervalTooLong,
}

impl Options {
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.packet_count == 0 {
            return Err(OptionsError::ZeroPacketCount);
        }
        if self.packet_size < SEQUENCE_HEADER_SIZE {
            return Err(OptionsError::PacketSizeTooSmall(SEQUENCE_HEADER_SIZE));
        }
        if self.packet_size % 2 != 0 {
            return Err(OptionsError::OddPacketSize);
        }
        let nominal = self.sending_interval * u32::from(self.packet_count);
        if self.ignored_interval > nominal / 2 {
            return Err(OptionsError::IgnoredIntervalTooLong);
        }
        Ok(())
    }

    /// The in-flight ceiling in effect, resolving the default.
    pub(crate) fn pending_ceiling(&self) -> usize {
        self.max_pending_bytes.unwrap_or(self.packet_size * 25)
    }
}

/// Information about a single test packet, one entry per sequence id.
///
/// Created when the packet is accepted by the send primitive and mutated exactly once when it is
/// first received; a duplicate receipt never modifies it.
#[derive(Clone, Debug, PartialEq)]
pub struct PacketInfo {
    /// When the packet was sent, relative to the begin of the test.
    pub sent_time: Duration,

    /// When the packet was received, relative to the begin of the test. `None` if it was lost.
    pub recv_time: Option<Duration>,

    /// `recv_time - sent_time`.
    pub elapsed: Option<Duration>,

    /// Whether the packet was sent inside the warm-up interval and is excluded from the
    /// statistics.
    pub ignored: bool,
}

/// A sample of the in-flight (sent but not yet received) volume, taken after every send and every
/// receipt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BacklogSample {
    /// When the sample was taken, relative to the begin of the test.
    pub at: Duration,

    /// `(packets sent - packets received) * packet_size`.
    pub pending_bytes: usize,
}

/// The result of a completed test, excluding warm-up packets from every aggregate.
#[derive(Clone, Debug)]
pub struct Statistics {
    /// Wall time between the first non-warm-up packet being sent and the test finishing.
    pub test_duration: Duration,

    /// The configured warm-up interval.
    pub ignored_interval: Duration,

    /// Number of test packets counted, i.e. those sent after the warm-up interval.
    pub num_packets: u16,

    /// The configured packet size in bytes.
    pub packet_size: usize,

    /// The configured sending cadence.
    pub sending_interval: Duration,

    /// Percentage of counted packets that were never received.
    pub packet_loss_pct: f64,

    /// Percentage of counted packets that arrived after a higher sequence id had already been
    /// observed.
    pub out_of_order_pct: f64,

    /// Mean elapsed time of the received, counted packets. `None` when every counted packet was
    /// lost.
    pub mean_rtt: Option<Duration>,

    /// Measured bandwidth in kbit/s, corrected by half the mean RTT since the perceived duration
    /// includes path latency while packets flow in one direction only. `None` when it cannot be
    /// derived (everything lost, or a non-positive corrected duration).
    pub bandwidth_kbits: Option<f64>,

    /// The duration the test would have taken at the configured cadence with no backpressure.
    pub optimal_test_duration: Duration,

    /// The bandwidth the configuration could have achieved over `optimal_test_duration` with no
    /// loss.
    pub optimal_bandwidth_kbits: f64,

    /// Per-packet send/receive information, indexed by sequence id.
    pub packets: Vec<PacketInfo>,

    /// In-flight volume over the life of the test.
    pub backlog: Vec<BacklogSample>,
}

/// Application level events generated by the session.
#[derive(Debug)]
pub enum SessionEvent {
    /// A test packet was received. Carries the packet id, the number of packets received so far
    /// and the configured packet count.
    OnPacketReceived(PacketId, u16, u16),

    /// The test completed and produced a report. This is terminal; no other event follows it.
    OnComplete(Statistics),

    /// The session failed. This is terminal; no other event follows it. Exactly one of
    /// `OnComplete` and `OnFailed` is generated per session.
    OnFailed(ErrorKind, String),
}

/// The externally observable session state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    /// Created but [`TestSession::connect`] has not been called.
    Idle,

    /// Negotiating and waiting for both channels to open.
    Connecting,

    /// Both channels are open; the start token is being exchanged.
    Handshaking,

    /// Test packets are being transmitted.
    Sending,

    /// All packets were handed to the send primitive; waiting for the end token or the last
    /// packet.
    Draining,

    /// The test completed and the report was produced.
    Done,

    /// The session terminated with an error.
    Failed,
}

/// A relayed-path measurement session.
///
/// The session is sans-io: it never blocks and never reads a clock. The embedder forwards
/// transport callbacks into the `handle_*` methods, advances the internal clock with
/// [`TestSession::advance_time`] whenever the time returned by [`TestSession::poll_timeout`] is
/// reached, and drains results from [`TestSession::poll_event`].
pub trait TestSession {
    /// Returns the next generated event, if any.
    fn poll_event(&mut self) -> Option<SessionEvent>;

    /// Starts the offer/answer handshake and the connect timer. Calling it more than once has no
    /// effect.
    fn connect(&mut self);

    /// Cancels the session. Equivalent to an immediate transition to the failed state with
    /// [`ErrorKind::Cancelled`]; safe to call at any point and a no-op once the session has
    /// terminated.
    fn cancel(&mut self, reason: &str);

    /// To be called when a channel endpoint reports open.
    fn handle_channel_open(&mut self, endpoint: Endpoint);

    /// To be called when an endpoint discovers a local candidate. Relay-type candidates are
    /// forwarded to the peer endpoint; all others are discarded.
    fn handle_candidate(&mut self, endpoint: Endpoint, candidate: &IceCandidate);

    /// To be called when a message arrives on an endpoint's channel.
    fn handle_message(&mut self, endpoint: Endpoint, payload: Payload);

    /// To be called when the embedding environment is interrupted (e.g. the page loses
    /// foreground focus). Terminates the session with [`ErrorKind::Aborted`].
    fn handle_interrupted(&mut self);

    /// Advances the internal clock to a specific point in the session's lifetime, triggering any
    /// timers scheduled to expire at or before `now`. Time moving backwards is safe but ignored.
    fn advance_time(&mut self, now: SessionTime);

    /// Returns the next absolute time on the session's timeline when a timer expires, and
    /// [`SessionTime::infinite_future`] if there are no active timers. The return value is
    /// invalidated by calling any mutable method on the session.
    fn poll_timeout(&self) -> SessionTime;

    /// The session state.
    fn state(&self) -> SessionState;

    fn options(&self) -> Options;
}
