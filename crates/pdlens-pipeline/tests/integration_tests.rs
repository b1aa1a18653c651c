//! Integration tests for the pdlens pipeline
//!
//! These tests verify end-to-end behavior of the pipeline including:
//! - Telemetry averaging across one pass
//! - Protocol log ordering, dense indices and inter-arrival deltas
//! - Queue capacity, eviction and release
//! - Selection and follow mode
//! - Decoder unavailability and transport resets
//! - The async actor under paused time

use std::time::{Duration, Instant};

use pdlens_pipeline::{
    FollowMode, Pipeline, PipelineConfig, PipelineEvent, ReportQueue, DEFAULT_PAYLOAD,
};
use pdlens_protocol::InboundReport;

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use pdlens_protocol::{
        parse_hex, DecodeError, DecodedMessage, Decoder, MessageKind, MetadataNode,
    };

    /// Temperature byte value meaning "no temperature"
    pub const NO_TEMPERATURE: u8 = 0xFF;

    /// Protocol type byte the decoder rejects
    pub const BAD_PROTOCOL: u8 = 0xEE;

    /// Decoder for the test report layout
    ///
    /// Telemetry: `FF 00 <centivolts u16 le> <milliamps u16 le> <temp> <group> ...`
    /// Protocol: `FE 02 <type> 00`
    #[derive(Clone)]
    pub struct MeterDecoder {
        ready: Arc<AtomicBool>,
    }

    impl MeterDecoder {
        pub fn new() -> Self {
            Self {
                ready: Arc::new(AtomicBool::new(true)),
            }
        }

        pub fn set_ready(&self, ready: bool) {
            self.ready.store(ready, Ordering::SeqCst);
        }
    }

    impl Decoder for MeterDecoder {
        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        fn decode(&self, hex: &str) -> Result<DecodedMessage, DecodeError> {
            let bytes = parse_hex(hex)?;
            match bytes[0] {
                0xFF => {
                    let cv = u16::from_le_bytes([bytes[2], bytes[3]]);
                    let ma = u16::from_le_bytes([bytes[4], bytes[5]]);
                    let mut fields = vec![
                        MetadataNode::text("VBus", format!("{:.2}V", volts(cv))),
                        MetadataNode::text("Current", format!("{:.3}A", amps(ma))),
                        MetadataNode::text("Group", format!("{}", bytes[7])),
                    ];
                    if bytes[6] != NO_TEMPERATURE {
                        fields.push(MetadataNode::text("Temperature", format!("{}℃", bytes[6])));
                    }
                    Ok(DecodedMessage {
                        kind: MessageKind::Telemetry,
                        tree: MetadataNode::root(fields),
                        raw_hex: hex.to_string(),
                        protocol_message_type: None,
                    })
                }
                0xFE if bytes[2] == BAD_PROTOCOL => {
                    Err(DecodeError::Status("CRC mismatch".to_string()))
                }
                0xFE => Ok(DecodedMessage {
                    kind: MessageKind::Protocol,
                    tree: MetadataNode::root(vec![MetadataNode::branch(
                        "Message Header",
                        vec![
                            MetadataNode::text("Port Power Role", "Source"),
                            MetadataNode::text("Port Data Role", "DFP"),
                        ],
                    )])
                    .with_bits(0, 15),
                    raw_hex: hex.to_string(),
                    protocol_message_type: Some(format!("Type{}", bytes[2])),
                }),
                other => Err(DecodeError::UnknownMarker(other)),
            }
        }
    }

    pub fn volts(cv: u16) -> f64 {
        f64::from(cv) / 100.0
    }

    pub fn amps(ma: u16) -> f64 {
        f64::from(ma) / 1000.0
    }

    /// 64-byte telemetry report
    pub fn telemetry(cv: u16, ma: u16, temperature: Option<u8>, arrival_ms: u64) -> InboundReport {
        let mut bytes = vec![0u8; 64];
        bytes[0] = 0xFF;
        bytes[2..4].copy_from_slice(&cv.to_le_bytes());
        bytes[4..6].copy_from_slice(&ma.to_le_bytes());
        bytes[6] = temperature.unwrap_or(NO_TEMPERATURE);
        InboundReport::new(0, bytes, arrival_ms)
    }

    /// Protocol report of the given type
    pub fn protocol(message_type: u8, arrival_ms: u64) -> InboundReport {
        InboundReport::new(0, vec![0xFE, 0x02, message_type, 0x00], arrival_ms)
    }

    /// One-byte report
    pub fn malformed(arrival_ms: u64) -> InboundReport {
        InboundReport::new(0, vec![0xFE], arrival_ms)
    }

    pub fn pipeline() -> Pipeline<MeterDecoder> {
        Pipeline::new(MeterDecoder::new())
    }

    /// Pipeline whose decoder starts unavailable, for building up one batch
    pub fn held_pipeline() -> (Pipeline<MeterDecoder>, MeterDecoder) {
        let decoder = MeterDecoder::new();
        decoder.set_ready(false);
        (Pipeline::new(decoder.clone()), decoder)
    }

    /// Ingest every report into one batch, then run exactly one pass
    pub fn one_pass(reports: Vec<InboundReport>) -> Pipeline<MeterDecoder> {
        let (mut pipeline, decoder) = held_pipeline();
        let t0 = Instant::now();
        for report in reports {
            pipeline.ingest(report, t0);
        }
        decoder.set_ready(true);
        pipeline.run_pass(t0 + Duration::from_secs(1));
        pipeline
    }

    /// Ingest reports spaced one update interval apart, each in its own pass
    pub fn paced(pipeline: &mut Pipeline<MeterDecoder>, reports: Vec<InboundReport>) {
        let mut now = Instant::now();
        for report in reports {
            now += Duration::from_millis(250);
            pipeline.ingest(report, now);
        }
        pipeline.run_pass(now + Duration::from_millis(250));
    }

    pub fn count_transient_errors(events: &[PipelineEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, PipelineEvent::TransientError { .. }))
            .count()
    }
}

// ============================================================================
// Telemetry Tests
// ============================================================================

mod telemetry_tests {
    use super::*;

    #[test]
    fn two_samples_average_to_six_volts() {
        let pipeline = helpers::one_pass(vec![
            helpers::telemetry(500, 1000, None, 1_000),
            helpers::telemetry(700, 1000, None, 1_010),
        ]);

        let snapshot = pipeline.snapshot().unwrap();
        assert!((snapshot.voltage - 6.0).abs() < 1e-9);
        assert_eq!(snapshot.sample_count, 2);
    }

    #[test]
    fn text_fields_come_from_last_sample() {
        let mut first = helpers::telemetry(500, 100, None, 1_000);
        first.bytes[7] = 1;
        let mut last = helpers::telemetry(500, 100, None, 1_010);
        last.bytes[7] = 2;

        let pipeline = helpers::one_pass(vec![first, last]);
        assert_eq!(
            pipeline.snapshot().unwrap().aux.group.as_deref(),
            Some("2")
        );
    }

    #[test]
    fn pass_without_telemetry_keeps_previous_snapshot() {
        let mut pipeline = helpers::pipeline();
        helpers::paced(
            &mut pipeline,
            vec![helpers::telemetry(510, 200, Some(30), 1_000)],
        );
        let before = pipeline.snapshot().cloned();

        helpers::paced(&mut pipeline, vec![helpers::protocol(1, 2_000)]);
        assert_eq!(pipeline.snapshot().cloned(), before);
    }

    #[test]
    fn malformed_report_is_skipped_with_one_error() {
        let mut pipeline = helpers::pipeline();
        pipeline.ingest(helpers::malformed(1_000), Instant::now());

        assert!(pipeline.snapshot().is_none());
        assert!(pipeline.queue().is_empty());
        assert_eq!(pipeline.stats().skipped, 1);
        assert_eq!(helpers::count_transient_errors(&pipeline.drain_events()), 1);
        assert!(pipeline.last_error().unwrap().contains("malformed"));
    }

    #[test]
    fn truncated_telemetry_is_skipped() {
        let mut report = helpers::telemetry(500, 100, None, 1_000);
        report.bytes.truncate(40);
        let pipeline = helpers::one_pass(vec![report]);

        assert!(pipeline.snapshot().is_none());
        assert!(pipeline.queue().is_empty());
    }
}

// ============================================================================
// Protocol Log Tests
// ============================================================================

mod protocol_log_tests {
    use super::*;

    #[test]
    fn deltas_are_arrival_differences() {
        let pipeline = helpers::one_pass(vec![
            helpers::protocol(1, 1_000),
            helpers::protocol(2, 1_045),
            helpers::protocol(3, 2_045),
        ]);

        let entries = pipeline.log().entries();
        let deltas: Vec<i64> = entries.iter().map(|e| e.delta_ms).collect();
        assert_eq!(deltas, vec![0, 45, 1_000]);
        assert_eq!(entries[1].delta_label(), "+0.045s");
    }

    #[test]
    fn roles_and_type_come_from_decoder() {
        let pipeline = helpers::one_pass(vec![helpers::protocol(7, 1_000)]);
        let entry = pipeline.log().latest().unwrap();

        assert_eq!(entry.message_type, "Type7");
        assert_eq!(entry.power_role, "Source");
        assert_eq!(entry.data_role, "DFP");
        assert_eq!(entry.bit_length, 16);
        assert_eq!(entry.raw_hex, "FE 02 07 00");
    }

    #[test]
    fn failed_decodes_leave_no_gaps() {
        let pipeline = helpers::one_pass(vec![
            helpers::protocol(1, 1_000),
            helpers::protocol(helpers::BAD_PROTOCOL, 1_010),
            helpers::telemetry(500, 100, None, 1_020),
            helpers::malformed(1_030),
            helpers::protocol(2, 1_040),
        ]);

        let indices: Vec<u64> = pipeline
            .log()
            .entries()
            .iter()
            .map(|e| e.order_index)
            .collect();
        assert_eq!(indices, vec![1, 2]);
        // Only the last error of the pass is kept
        assert!(pipeline.last_error().unwrap().contains("malformed"));
        assert_eq!(helpers::count_transient_errors(&pipeline_events(pipeline)), 1);
    }

    fn pipeline_events(mut pipeline: Pipeline<helpers::MeterDecoder>) -> Vec<PipelineEvent> {
        pipeline.drain_events()
    }

    #[test]
    fn clear_on_ten_entries_resets_counters() {
        let mut pipeline = helpers::pipeline();
        helpers::paced(
            &mut pipeline,
            (0..10).map(|i| helpers::protocol(i, 1_000 + u64::from(i))).collect(),
        );
        assert_eq!(pipeline.log().len(), 10);

        pipeline.clear();
        let view = pipeline.view();
        assert!(view.entries.is_empty());
        assert_eq!(view.selected, None);

        helpers::paced(&mut pipeline, vec![helpers::protocol(1, 9_000)]);
        let entry = pipeline.log().latest().unwrap();
        assert_eq!(entry.order_index, 1);
        assert_eq!(entry.id, 1);
        assert_eq!(entry.delta_ms, 0);
    }
}

// ============================================================================
// Queue Tests
// ============================================================================

mod queue_tests {
    use super::*;

    #[test]
    fn capacity_three_keeps_last_three() {
        let mut queue = ReportQueue::new(3);
        for tag in [b'A', b'B', b'C', b'D'] {
            queue.push(InboundReport::new(0, vec![0xFE, 0x01, tag], 0));
        }

        let tags: Vec<u8> = queue.iter().map(|r| r.bytes[2]).collect();
        assert_eq!(tags, vec![b'B', b'C', b'D']);
    }

    #[test]
    fn overflow_is_counted_and_reported() {
        let config = PipelineConfig {
            queue_capacity: 3,
            ..Default::default()
        };
        let decoder = helpers::MeterDecoder::new();
        decoder.set_ready(false);
        let mut pipeline = Pipeline::with_config(decoder, config).unwrap();

        let t0 = Instant::now();
        for i in 0..5 {
            pipeline.ingest(helpers::protocol(1, i), t0 + Duration::from_millis(i * 20));
        }

        assert_eq!(pipeline.queue().len(), 3);
        assert_eq!(pipeline.stats().evicted, 2);
        let evicted: u64 = pipeline
            .drain_events()
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::ReportsEvicted { count, .. } => Some(*count),
                _ => None,
            })
            .sum();
        assert_eq!(evicted, 2);
    }

    #[test]
    fn decoder_not_ready_holds_reports() {
        let (mut pipeline, decoder) = helpers::held_pipeline();
        let t0 = Instant::now();
        pipeline.ingest(helpers::protocol(1, 1_000), t0);
        pipeline.ingest(helpers::protocol(2, 1_001), t0 + Duration::from_millis(50));
        pipeline.on_notify(t0 + Duration::from_millis(60));
        pipeline.on_pass_timer(t0 + Duration::from_millis(100));

        assert_eq!(pipeline.queue().len(), 2);
        assert!(pipeline.log().is_empty());
        assert!(pipeline.pass_deadline().is_some());

        decoder.set_ready(true);
        pipeline.on_pass_timer(t0 + Duration::from_millis(200));
        assert!(pipeline.queue().is_empty());
        assert_eq!(pipeline.log().len(), 2);
        assert!(pipeline.pass_deadline().is_none());
    }

    #[test]
    fn disconnect_resets_queue_and_sequence() {
        let (mut pipeline, _decoder) = helpers::held_pipeline();
        let t0 = Instant::now();
        pipeline.connect();
        for i in 0..3 {
            pipeline.ingest(helpers::protocol(1, i), t0);
        }
        assert_eq!(pipeline.queue().last_seq(), 3);

        pipeline.disconnect();
        assert!(pipeline.queue().is_empty());
        assert_eq!(pipeline.queue().last_seq(), 0);
        assert!(pipeline.pass_deadline().is_none());
        assert!(pipeline
            .drain_events()
            .iter()
            .any(|e| matches!(e, PipelineEvent::PipelineReset)));
    }
}

// ============================================================================
// Selection Tests
// ============================================================================

mod selection_tests {
    use super::*;

    #[test]
    fn auto_follow_then_pinned() {
        let mut pipeline = helpers::pipeline();
        let mut now = Instant::now();
        for i in 1..=4u8 {
            now += Duration::from_millis(200);
            pipeline.ingest(helpers::protocol(i, u64::from(i) * 100), now);
            assert_eq!(pipeline.selected(), Some(u64::from(i)));
        }

        assert_eq!(pipeline.toggle_follow(), FollowMode::Pinned);
        now += Duration::from_millis(200);
        pipeline.ingest(helpers::protocol(5, 500), now);
        assert_eq!(pipeline.log().len(), 5);
        assert_eq!(pipeline.selected(), Some(4));
    }

    #[test]
    fn selecting_pins_and_toggle_returns_to_newest() {
        let pipeline = &mut helpers::one_pass(vec![
            helpers::protocol(1, 100),
            helpers::protocol(2, 200),
            helpers::protocol(3, 300),
        ]);

        pipeline.select(2).unwrap();
        assert_eq!(pipeline.follow_mode(), FollowMode::Pinned);
        assert_eq!(pipeline.view().selected_entry().map(|e| e.id), Some(2));

        pipeline.toggle_follow();
        assert_eq!(pipeline.selected(), Some(3));
    }
}

// ============================================================================
// Manual Decode Tests
// ============================================================================

mod manual_decode_tests {
    use super::*;

    #[test]
    fn default_payload_before_any_report() {
        let pipeline = helpers::pipeline();
        assert_eq!(pipeline.last_payload(), DEFAULT_PAYLOAD);
    }

    #[test]
    fn manual_decode_reuses_last_streamed_payload() {
        let mut pipeline = helpers::one_pass(vec![helpers::protocol(9, 1_000)]);
        assert_eq!(pipeline.last_payload(), "FE 02 09 00");

        pipeline.request_decode(None, 5_000).unwrap();
        let latest = pipeline.log().latest().unwrap();
        assert_eq!(latest.message_type, "Type9");
        assert_eq!(latest.delta_ms, 4_000);
    }
}

// ============================================================================
// Actor Tests
// ============================================================================

mod actor_tests {
    use super::*;
    use pdlens_pipeline::{run_pipeline_actor, PipelineCommand, PipelineView};
    use tokio::sync::{mpsc, oneshot};

    fn command(report: InboundReport) -> PipelineCommand {
        PipelineCommand::Report {
            report_id: report.report_id,
            bytes: report.bytes,
            arrival_ms: report.arrival_ms,
        }
    }

    async fn view(cmd_tx: &mpsc::Sender<PipelineCommand>) -> PipelineView {
        let (response, rx) = oneshot::channel();
        cmd_tx
            .send(PipelineCommand::QueryView { response })
            .await
            .unwrap();
        rx.await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn sustained_stream_respects_cadence() {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        let (event_tx, mut event_rx) = mpsc::channel(1024);
        let actor = tokio::spawn(run_pipeline_actor(
            helpers::MeterDecoder::new(),
            PipelineConfig::default(),
            cmd_rx,
            event_tx,
        ));

        // 50 telemetry reports per second for one second
        for i in 0..50u64 {
            cmd_tx
                .send(command(helpers::telemetry(500, 100, None, i * 20)))
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        let view = view(&cmd_tx).await;
        assert_eq!(view.queue_len, 0);
        assert_eq!(view.stats.decoded, 50);
        // At most one pass per 100 ms interval
        assert!(view.stats.passes <= 12, "passes = {}", view.stats.passes);

        cmd_tx.send(PipelineCommand::Shutdown).await.unwrap();
        actor.await.unwrap();

        let mut snapshots = 0;
        while let Ok(event) = event_rx.try_recv() {
            if matches!(event, PipelineEvent::SnapshotUpdated { .. }) {
                snapshots += 1;
            }
        }
        assert_eq!(snapshots as u64, view.stats.passes);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_then_reconnect_restarts_sequence() {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (event_tx, _event_rx) = mpsc::channel(256);
        let decoder = helpers::MeterDecoder::new();
        decoder.set_ready(false);
        let actor = tokio::spawn(run_pipeline_actor(
            decoder.clone(),
            PipelineConfig::default(),
            cmd_rx,
            event_tx,
        ));

        cmd_tx.send(PipelineCommand::Connected).await.unwrap();
        for i in 0..3 {
            cmd_tx.send(command(helpers::protocol(1, i))).await.unwrap();
        }
        assert_eq!(view(&cmd_tx).await.queue_len, 3);

        cmd_tx.send(PipelineCommand::Disconnected).await.unwrap();
        let after = view(&cmd_tx).await;
        assert_eq!(after.queue_len, 0);
        assert!(!after.connected);

        decoder.set_ready(true);
        cmd_tx.send(PipelineCommand::Connected).await.unwrap();
        cmd_tx.send(command(helpers::protocol(2, 10))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let view = view(&cmd_tx).await;
        assert_eq!(view.entries.len(), 1);
        assert_eq!(view.entries[0].seq, 1);

        cmd_tx.send(PipelineCommand::Shutdown).await.unwrap();
        actor.await.unwrap();
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Kind {
        Telemetry(u16, u16, Option<u8>),
        Protocol(u8),
        BadProtocol,
        Malformed,
    }

    fn kind() -> impl Strategy<Value = Kind> {
        prop_oneof![
            (0u16..3000, 0u16..5000, prop::option::of(0u8..100))
                .prop_map(|(cv, ma, t)| Kind::Telemetry(cv, ma, t)),
            (0u8..0x20).prop_map(Kind::Protocol),
            Just(Kind::BadProtocol),
            Just(Kind::Malformed),
        ]
    }

    fn build(kind: &Kind, arrival_ms: u64) -> InboundReport {
        match kind {
            Kind::Telemetry(cv, ma, t) => helpers::telemetry(*cv, *ma, *t, arrival_ms),
            Kind::Protocol(ty) => helpers::protocol(*ty, arrival_ms),
            Kind::BadProtocol => helpers::protocol(helpers::BAD_PROTOCOL, arrival_ms),
            Kind::Malformed => helpers::malformed(arrival_ms),
        }
    }

    proptest! {
        #[test]
        fn snapshot_is_mean_of_batch(
            samples in prop::collection::vec(
                (0u16..3000, 0u16..5000, prop::option::of(0u8..100)),
                1..20,
            )
        ) {
            let reports = samples
                .iter()
                .enumerate()
                .map(|(i, (cv, ma, t))| helpers::telemetry(*cv, *ma, *t, i as u64))
                .collect();
            let pipeline = helpers::one_pass(reports);
            let snapshot = pipeline.snapshot().unwrap();

            let n = samples.len() as f64;
            let voltage: f64 = samples.iter().map(|(cv, _, _)| helpers::volts(*cv)).sum::<f64>() / n;
            let current: f64 = samples.iter().map(|(_, ma, _)| helpers::amps(*ma)).sum::<f64>() / n;
            let power: f64 = samples
                .iter()
                .map(|(cv, ma, _)| helpers::volts(*cv) * helpers::amps(*ma))
                .sum::<f64>() / n;
            let temps: Vec<f64> = samples.iter().filter_map(|(_, _, t)| t.map(f64::from)).collect();

            prop_assert!((snapshot.voltage - voltage).abs() < 1e-9);
            prop_assert!((snapshot.current - current).abs() < 1e-9);
            prop_assert!((snapshot.power - power).abs() < 1e-6);
            match snapshot.temperature {
                Some(t) => {
                    let mean = temps.iter().sum::<f64>() / temps.len() as f64;
                    prop_assert!((t - mean).abs() < 1e-9);
                }
                None => {
                    prop_assert!(temps.is_empty());
                }
            }
        }

        #[test]
        fn order_index_is_dense(kinds in prop::collection::vec(kind(), 0..60)) {
            let mut pipeline = helpers::pipeline();
            let reports = kinds
                .iter()
                .enumerate()
                .map(|(i, k)| build(k, 1_000 + i as u64))
                .collect();
            helpers::paced(&mut pipeline, reports);

            let expected = kinds.iter().filter(|k| matches!(k, Kind::Protocol(_))).count() as u64;
            let indices: Vec<u64> = pipeline.log().entries().iter().map(|e| e.order_index).collect();
            prop_assert_eq!(indices, (1..=expected).collect::<Vec<_>>());
            prop_assert!(pipeline.queue().is_empty());
        }

        #[test]
        fn deltas_follow_arrivals(gaps in prop::collection::vec(0u64..5_000, 1..30)) {
            let mut arrival = 1_000u64;
            let mut arrivals = Vec::new();
            for gap in &gaps {
                arrival += gap;
                arrivals.push(arrival);
            }
            let reports = arrivals.iter().map(|&ms| helpers::protocol(1, ms)).collect();
            let pipeline = helpers::one_pass(reports);

            let entries = pipeline.log().entries();
            prop_assert_eq!(entries[0].delta_ms, 0);
            for n in 1..entries.len() {
                let expected = (arrivals[n] - arrivals[n - 1]) as i64;
                prop_assert_eq!(entries[n].delta_ms, expected);
                prop_assert!(entries[n].delta_ms >= 0);
            }
        }

        #[test]
        fn queue_never_exceeds_capacity(capacity in 1usize..20, pushes in 0usize..80) {
            let mut queue = ReportQueue::new(capacity);
            for i in 0..pushes {
                let oldest = queue.first_seq();
                let full = queue.len() == capacity;
                let outcome = queue.push(helpers::protocol(1, i as u64));

                prop_assert!(queue.len() <= capacity);
                if full {
                    prop_assert_eq!(outcome.evicted, oldest);
                } else {
                    prop_assert_eq!(outcome.evicted, None);
                }
            }
        }

        #[test]
        fn release_removes_exact_prefix(count in 1u64..40, up_to in 0u64..50) {
            let mut queue = ReportQueue::new(100);
            for i in 0..count {
                queue.push(helpers::protocol(1, i));
            }

            let removed = queue.release_up_to(up_to);
            prop_assert_eq!(removed as u64, up_to.min(count));
            prop_assert!(queue.iter().all(|r| r.seq > up_to));

            // Idempotent
            prop_assert_eq!(queue.release_up_to(up_to), 0);
        }

        #[test]
        fn auto_follow_tracks_each_append(n in 1u8..20) {
            let mut pipeline = helpers::pipeline();
            let mut now = Instant::now();
            for i in 1..=n {
                now += Duration::from_millis(150);
                pipeline.ingest(helpers::protocol(i, u64::from(i)), now);
                prop_assert_eq!(pipeline.selected(), pipeline.log().latest().map(|e| e.id));
            }

            pipeline.toggle_follow();
            let pinned = pipeline.selected();
            now += Duration::from_millis(150);
            pipeline.ingest(helpers::protocol(0, 999), now);
            prop_assert_eq!(pipeline.selected(), pinned);
        }
    }
}
