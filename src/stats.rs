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

use crate::api::BacklogSample;
use crate::api::Options;
use crate::api::PacketInfo;
use crate::api::Statistics;
use std::time::Duration;

/// Turns the finished packet records into the final report.
///
/// Warm-up packets are excluded from every aggregate: `num_packets`, the loss and out-of-order
/// percentages, the mean RTT and both bandwidth figures all divide by the packets sent after the
/// warm-up interval. `test_duration` is anchored at the first non-warm-up send for the same
/// reason. Divisions with a zero denominator produce `None` (or NaN for the plain `f64` fields)
/// instead of failing.
pub(crate) fn compute(
    packets: Vec<PacketInfo>,
    out_of_order_count: u32,
    test_duration: Duration,
    backlog: Vec<BacklogSample>,
    options: &Options,
) -> Statistics {
    let mut num_packets: u16 = 0;
    let mut lost: u16 = 0;
    let mut sum_elapsed = Duration::ZERO;

    for info in packets.iter().filter(|info| !info.ignored) {
        num_packets += 1;
        match info.elapsed {
            Some(elapsed) => sum_elapsed += elapsed,
            None => lost += 1,
        }
    }
    let delivered = num_packets - lost;

    let packet_loss_pct = f64::from(lost) * 100.0 / f64::from(num_packets);
    let out_of_order_pct = f64::from(out_of_order_count) * 100.0 / f64::from(num_packets);

    let mean_rtt = (delivered > 0).then(|| sum_elapsed / u32::from(delivered));

    let packet_kbits = options.packet_size as f64 * 8.0 / 1000.0;
    let bandwidth_kbits = mean_rtt.and_then(|rtt| {
        // Packets flow in one direction but the observed duration includes the path latency, so
        // half the round trip is carved off before dividing.
        let corrected = test_duration.as_secs_f64() - rtt.as_secs_f64() / 2.0;
        (corrected > 0.0).then(|| packet_kbits * f64::from(delivered) / corrected)
    });

    let optimal_test_duration = options.sending_interval * u32::from(num_packets);
    let optimal_bandwidth_kbits =
        packet_kbits * f64::from(num_packets) / optimal_test_duration.as_secs_f64();

    Statistics {
        test_duration,
        ignored_interval: options.ignored_interval,
        num_packets,
        packet_size: options.packet_size,
        sending_interval: options.sending_interval,
        packet_loss_pct,
        out_of_order_pct,
        mean_rtt,
        bandwidth_kbits,
        optimal_test_duration,
        optimal_bandwidth_kbits,
        packets,
        backlog,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn received(sent_time: Duration, elapsed: Duration) -> PacketInfo {
        PacketInfo {
            sent_time,
            recv_time: Some(sent_time + elapsed),
            elapsed: Some(elapsed),
            ignored: false,
        }
    }

    fn lost(sent_time: Duration) -> PacketInfo {
        PacketInfo { sent_time, recv_time: None, elapsed: None, ignored: false }
    }

    fn options(packet_size: usize, packet_count: u16, sending_interval: Duration) -> Options {
        Options {
            packet_size,
            packet_count,
            sending_interval,
            ignored_interval: Duration::ZERO,
            ..Options::default()
        }
    }

    #[test]
    fn ten_of_a_hundred_lost_is_exactly_ten_percent() {
        let mut packets: Vec<PacketInfo> = (0..90).map(|i| received(ms(i), ms(0))).collect();
        packets.extend((90..100).map(|i| lost(ms(i))));

        let stats =
            compute(packets, 0, Duration::from_secs(1), vec![], &options(500, 100, ms(10)));
        assert_eq!(stats.num_packets, 100);
        assert_eq!(stats.packet_loss_pct, 10.0);
        assert_eq!(stats.mean_rtt, Some(Duration::ZERO));
        // 90 delivered packets of 4 kbit over a full second.
        assert_eq!(stats.bandwidth_kbits, Some(360.0));
    }

    #[test]
    fn mean_rtt_averages_over_delivered_packets() {
        let packets = vec![
            received(ms(0), ms(10)),
            received(ms(10), ms(20)),
            received(ms(20), ms(30)),
            lost(ms(30)),
        ];
        let stats =
            compute(packets, 0, Duration::from_secs(1), vec![], &options(500, 4, ms(10)));
        assert_eq!(stats.mean_rtt, Some(ms(20)));
    }

    #[test]
    fn rtt_correction_shrinks_the_effective_duration() {
        // One second of perceived duration, 200 ms mean RTT: bandwidth divides by 0.9 s.
        let packets = vec![received(ms(0), ms(200)), received(ms(10), ms(200))];
        let stats =
            compute(packets, 0, Duration::from_secs(1), vec![], &options(1000, 2, ms(10)));
        let expected = 8.0 * 2.0 / 0.9;
        assert!((stats.bandwidth_kbits.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn everything_lost_yields_sentinels_not_panics() {
        let packets = vec![lost(ms(0)), lost(ms(10))];
        let stats =
            compute(packets, 0, Duration::from_secs(1), vec![], &options(500, 2, ms(10)));
        assert_eq!(stats.packet_loss_pct, 100.0);
        assert_eq!(stats.mean_rtt, None);
        assert_eq!(stats.bandwidth_kbits, None);
    }

    #[test]
    fn non_positive_corrected_duration_yields_no_bandwidth() {
        let packets = vec![received(ms(0), ms(400))];
        let stats = compute(packets, 0, ms(100), vec![], &options(500, 1, ms(10)));
        // 100 ms duration minus 200 ms half-RTT is negative.
        assert_eq!(stats.bandwidth_kbits, None);
    }

    #[test]
    fn warm_up_packets_are_excluded_from_every_aggregate() {
        let mut warm = received(ms(0), ms(500));
        warm.ignored = true;
        let mut warm_lost = lost(ms(5));
        warm_lost.ignored = true;
        let packets = vec![warm, warm_lost, received(ms(10), ms(0)), received(ms(20), ms(0))];

        let stats =
            compute(packets, 0, Duration::from_secs(1), vec![], &options(500, 4, ms(10)));
        assert_eq!(stats.num_packets, 2);
        assert_eq!(stats.packet_loss_pct, 0.0);
        assert_eq!(stats.mean_rtt, Some(Duration::ZERO));
    }

    #[test]
    fn out_of_order_percentage_uses_counted_packets() {
        let packets = (0..4u64).map(|i| received(ms(i * 10), ms(0))).collect();
        let stats =
            compute(packets, 1, Duration::from_secs(1), vec![], &options(500, 4, ms(10)));
        assert_eq!(stats.out_of_order_pct, 25.0);
    }

    #[test]
    fn optimal_figures_follow_the_configuration() {
        let packets = (0..800u64).map(|i| received(ms(i * 10), ms(0))).collect();
        let stats =
            compute(packets, 0, Duration::from_secs(9), vec![], &options(1250, 800, ms(10)));
        assert_eq!(stats.optimal_test_duration, Duration::from_secs(8));
        // 800 packets of 10 kbit over 8 seconds.
        assert_eq!(stats.optimal_bandwidth_kbits, 1000.0);
    }
}
