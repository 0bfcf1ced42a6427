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

use crate::api::PacketId;
use crate::api::PacketInfo;
use std::time::Duration;

/// The result of recording an inbound test packet.
#[derive(Debug, PartialEq)]
pub(crate) enum ReceiveOutcome {
    /// First receipt of this id.
    Recorded {
        out_of_order: bool,
        ignored: bool,
        elapsed: Duration,
    },

    /// The id was already received. Retransmission must not happen on this channel; the receipt
    /// is logged and dropped without touching the existing record or any counter.
    Duplicate,

    /// The id is inside the configured range but was never sent. Malformed.
    NeverSent,

    /// The id is at or beyond the configured packet count. Malformed.
    OutOfRange,
}

/// Tracks per-packet send/receive timestamps and detects loss, duplication and out-of-order
/// arrival.
///
/// One record slot exists per sequence id in `[0, packet_count)`. A slot is created when the
/// packet is accepted by the send primitive and is written at most once more, on the first valid
/// receipt. `highest_received` is monotonically non-decreasing; any first-seen id at or below it
/// arrived out of order. Warm-up packets are recorded and may raise `highest_received`, but never
/// contribute to the out-of-order counter.
pub(crate) struct SequenceTracker {
    records: Vec<Option<PacketInfo>>,
    highest_received: Option<PacketId>,
    out_of_order_count: u32,
    received_count: u16,
}

impl SequenceTracker {
    pub fn new(packet_count: u16) -> Self {
        Self {
            records: (0..packet_count).map(|_| None).collect(),
            highest_received: None,
            out_of_order_count: 0,
            received_count: 0,
        }
    }

    /// Called when a packet has been accepted by the send primitive.
    pub fn record_sent(&mut self, id: PacketId, sent_time: Duration, ignored: bool) {
        debug_assert!(self.records[id.0 as usize].is_none());
        self.records[id.0 as usize] =
            Some(PacketInfo { sent_time, recv_time: None, elapsed: None, ignored });
    }

    /// Called once per inbound test packet.
    pub fn record_received(&mut self, id: PacketId, recv_time: Duration) -> ReceiveOutcome {
        if id.0 as usize >= self.records.len() {
            return ReceiveOutcome::OutOfRange;
        }
        let Some(info) = self.records[id.0 as usize].as_mut() else {
            return ReceiveOutcome::NeverSent;
        };
        if info.recv_time.is_some() {
            return ReceiveOutcome::Duplicate;
        }

        let elapsed = recv_time.saturating_sub(info.sent_time);
        info.recv_time = Some(recv_time);
        info.elapsed = Some(elapsed);
        let ignored = info.ignored;
        self.received_count += 1;

        let out_of_order = match self.highest_received {
            Some(highest) if id <= highest => {
                if !ignored {
                    self.out_of_order_count += 1;
                }
                !ignored
            }
            _ => {
                self.highest_received = Some(id);
                false
            }
        };

        ReceiveOutcome::Recorded { out_of_order, ignored, elapsed }
    }

    pub fn received_count(&self) -> u16 {
        self.received_count
    }

    pub fn out_of_order_count(&self) -> u32 {
        self.out_of_order_count
    }

    pub fn highest_received(&self) -> Option<PacketId> {
        self.highest_received
    }

    /// Whether every configured packet has been received.
    pub fn all_received(&self) -> bool {
        self.received_count as usize == self.records.len()
    }

    /// The records created so far, in sequence order. Ids that were never handed to the send
    /// primitive have no record and are skipped.
    pub fn snapshot(&self) -> Vec<PacketInfo> {
        self.records.iter().flatten().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn tracker_with_sent(count: u16) -> SequenceTracker {
        let mut t = SequenceTracker::new(count);
        for id in 0..count {
            t.record_sent(PacketId(id), ms(u64::from(id) * 10), false);
        }
        t
    }

    #[test]
    fn records_in_order_receipts() {
        let mut t = tracker_with_sent(3);
        for id in 0..3 {
            let outcome = t.record_received(PacketId(id), ms(u64::from(id) * 10 + 5));
            assert_eq!(
                outcome,
                ReceiveOutcome::Recorded { out_of_order: false, ignored: false, elapsed: ms(5) }
            );
        }
        assert_eq!(t.received_count(), 3);
        assert_eq!(t.out_of_order_count(), 0);
        assert_eq!(t.highest_received(), Some(PacketId(2)));
        assert!(t.all_received());
    }

    #[test]
    fn highest_received_is_monotone_and_gaps_count_out_of_order() {
        let mut t = tracker_with_sent(5);
        t.record_received(PacketId(0), ms(1));
        t.record_received(PacketId(3), ms(2));
        assert_eq!(t.highest_received(), Some(PacketId(3)));

        // 1 and 2 arrive while 3 is already the highest: each increments the counter once, and
        // the highest id never moves backwards.
        assert!(matches!(
            t.record_received(PacketId(2), ms(3)),
            ReceiveOutcome::Recorded { out_of_order: true, .. }
        ));
        assert!(matches!(
            t.record_received(PacketId(1), ms(4)),
            ReceiveOutcome::Recorded { out_of_order: true, .. }
        ));
        assert_eq!(t.out_of_order_count(), 2);
        assert_eq!(t.highest_received(), Some(PacketId(3)));
    }

    #[test]
    fn duplicate_receipt_changes_nothing() {
        let mut t = tracker_with_sent(2);
        t.record_received(PacketId(0), ms(7));
        let before = t.snapshot();

        assert_eq!(t.record_received(PacketId(0), ms(50)), ReceiveOutcome::Duplicate);
        assert_eq!(t.snapshot(), before);
        assert_eq!(t.received_count(), 1);
        assert_eq!(t.out_of_order_count(), 0);
    }

    #[test]
    fn out_of_range_and_never_sent_are_malformed() {
        let mut t = SequenceTracker::new(4);
        t.record_sent(PacketId(0), ms(0), false);
        assert_eq!(t.record_received(PacketId(4), ms(1)), ReceiveOutcome::OutOfRange);
        assert_eq!(t.record_received(PacketId(2), ms(1)), ReceiveOutcome::NeverSent);
        assert_eq!(t.received_count(), 0);
    }

    #[test]
    fn warm_up_packets_never_increment_out_of_order() {
        let mut t = SequenceTracker::new(4);
        t.record_sent(PacketId(0), ms(0), true);
        t.record_sent(PacketId(1), ms(10), true);
        t.record_sent(PacketId(2), ms(20), false);
        t.record_sent(PacketId(3), ms(30), false);

        // A warm-up packet may still raise the highest id...
        assert!(matches!(
            t.record_received(PacketId(1), ms(12)),
            ReceiveOutcome::Recorded { out_of_order: false, ignored: true, .. }
        ));
        // ...and its own late arrival is not counted.
        assert!(matches!(
            t.record_received(PacketId(0), ms(13)),
            ReceiveOutcome::Recorded { out_of_order: false, ignored: true, .. }
        ));
        assert_eq!(t.out_of_order_count(), 0);

        t.record_received(PacketId(3), ms(31));
        assert!(matches!(
            t.record_received(PacketId(2), ms(32)),
            ReceiveOutcome::Recorded { out_of_order: true, ignored: false, .. }
        ));
        assert_eq!(t.out_of_order_count(), 1);
    }

    #[test]
    fn elapsed_saturates_instead_of_underflowing() {
        let mut t = SequenceTracker::new(1);
        t.record_sent(PacketId(0), ms(10), false);
        let outcome = t.record_received(PacketId(0), ms(5));
        assert_eq!(
            outcome,
            ReceiveOutcome::Recorded {
                out_of_order: false,
                ignored: false,
                elapsed: Duration::ZERO
            }
        );
    }

    #[test]
    fn every_id_is_accounted_exactly_once() {
        let mut t = tracker_with_sent(10);
        for id in [0u16, 2, 4, 6, 8] {
            t.record_received(PacketId(id), ms(100));
        }
        // Duplicates of already-received ids do not shift the accounting.
        t.record_received(PacketId(2), ms(101));

        let records = t.snapshot();
        let received = records.iter().filter(|r| r.recv_time.is_some()).count();
        let lost = records.iter().filter(|r| r.recv_time.is_none()).count();
        assert_eq!(received + lost, 10);
        assert_eq!(received, 5);
    }
}
