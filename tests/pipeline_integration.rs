//! Pipeline integration tests
//!
//! Drives full sessions through `ManualSource`, on both backends.
//!
//! Run with:
//! ```bash
//! cargo test -p pitchtrack --test pipeline_integration
//! ```

mod helpers;

use helpers::tolerances::*;
use helpers::*;
use pitchtrack::prelude::*;
use pitchtrack::{Error, StreamId};
use std::sync::Arc;
use std::time::Duration;

fn pipeline() -> PitchPipeline {
    init_tracing();
    PitchPipeline::builder()
        .build()
        .expect("Failed to create test pipeline")
}

fn polling_pipeline() -> PitchPipeline {
    init_tracing();
    PitchPipeline::builder()
        .force_polling(true)
        .build()
        .expect("Failed to create test pipeline")
}

fn is_near(reading: &PitchReading, frequency: f32) -> bool {
    (reading.frequency_hz - frequency).abs() <= STABLE_HZ_EPSILON
}

#[test]
fn test_live_sine_is_detected() {
    let pipeline = pipeline();
    let source = ManualSource::new(TEST_SAMPLE_RATE);
    let mut feeder = SineFeeder::new(source.feeder(), 440.0, TEST_SAMPLE_RATE);

    let session = pipeline.start(Box::new(source), "voice").unwrap();
    let reading = feed_until(&session, &mut feeder, SETTLE_TIMEOUT_MS, |r| is_near(r, 440.0))
        .expect("Pipeline never settled on 440 Hz");

    assert!(reading.clarity > CLEAN_CLARITY, "Clarity {}", reading.clarity);
    assert!(reading.rms > 0.0);
    assert!(reading.latency_ms > 0.0);
    assert_eq!(reading.note_name(), Some("A4".to_string()));
}

#[test]
fn test_polling_fallback_detects_pitch() {
    let pipeline = polling_pipeline();
    let source = ManualSource::new(TEST_SAMPLE_RATE);
    let mut feeder = SineFeeder::new(source.feeder(), 220.0, TEST_SAMPLE_RATE);

    let session = pipeline.start(Box::new(source), "voice").unwrap();
    assert_eq!(session.backend(), Backend::Polling);

    feed_until(&session, &mut feeder, SETTLE_TIMEOUT_MS, |r| is_near(r, 220.0))
        .expect("Polling backend never settled on 220 Hz");
}

#[test]
fn test_source_without_shared_memory_polls() {
    let pipeline = pipeline();
    let source = ManualSource::new(TEST_SAMPLE_RATE).without_shared_memory();
    let mut feeder = SineFeeder::new(source.feeder(), 330.0, TEST_SAMPLE_RATE);

    let session = pipeline.start(Box::new(source), "general").unwrap();
    assert_eq!(session.backend(), Backend::Polling);

    feed_until(&session, &mut feeder, SETTLE_TIMEOUT_MS, |r| is_near(r, 330.0))
        .expect("Polling backend never settled on 330 Hz");
}

#[test]
fn test_pitch_change_is_tracked() {
    let pipeline = pipeline();
    let source = ManualSource::new(TEST_SAMPLE_RATE);
    let mut feeder = SineFeeder::new(source.feeder(), 440.0, TEST_SAMPLE_RATE);

    let session = pipeline.start(Box::new(source), "voice").unwrap();
    feed_until(&session, &mut feeder, SETTLE_TIMEOUT_MS, |r| is_near(r, 440.0))
        .expect("Pipeline never settled on 440 Hz");

    feeder.set_frequency(330.0);
    feed_until(&session, &mut feeder, SETTLE_TIMEOUT_MS, |r| is_near(r, 330.0))
        .expect("Pipeline never moved to 330 Hz");
}

#[test]
fn test_silence_reads_unpitched() {
    let pipeline = pipeline();
    let source = ManualSource::new(TEST_SAMPLE_RATE);
    let mut feeder = SineFeeder::new(source.feeder(), 440.0, TEST_SAMPLE_RATE);
    feeder.set_amplitude(0.0);

    let session = pipeline.start(Box::new(source), "voice").unwrap();
    assert!(wait_for_ticks(&session, &mut feeder, 3, SETTLE_TIMEOUT_MS));

    let reading = session.poll().expect("Reading after ticks");
    assert_eq!(reading.frequency_hz, 0.0);
    assert_eq!(reading.clarity, 0.0);
    assert!(!reading.is_pitched());
}

#[test]
fn test_start_is_idempotent() {
    let pipeline = pipeline();
    let id = StreamId(0xA11CE);
    let first = pipeline
        .start(Box::new(ManualSource::with_id(id, TEST_SAMPLE_RATE)), "voice")
        .unwrap();
    let second = pipeline
        .start(Box::new(ManualSource::with_id(id, TEST_SAMPLE_RATE)), "voice")
        .unwrap();

    assert_eq!(first.id(), second.id());
    assert!(first.is_active());
}

#[test]
fn test_profile_swap_keeps_session() {
    let pipeline = pipeline();
    let id = StreamId(0xB0B);
    let source = ManualSource::with_id(id, TEST_SAMPLE_RATE);
    let mut feeder = SineFeeder::new(source.feeder(), 110.0, TEST_SAMPLE_RATE);

    let voice = pipeline.start(Box::new(source), "voice").unwrap();
    let bass = pipeline
        .start(Box::new(ManualSource::with_id(id, TEST_SAMPLE_RATE)), "bass")
        .unwrap();

    assert_eq!(voice.id(), bass.id());
    assert_eq!(bass.profile().name, "bass");
    assert!(feeder.feed() > 0, "Original source must stay attached");

    feed_until(&bass, &mut feeder, SETTLE_TIMEOUT_MS, |r| is_near(r, 110.0))
        .expect("Session stopped tracking after profile swap");
}

#[test]
fn test_new_stream_replaces_session() {
    let pipeline = pipeline();
    let first_source = ManualSource::new(TEST_SAMPLE_RATE);
    let first_feeder = first_source.feeder();
    let first = pipeline.start(Box::new(first_source), "voice").unwrap();

    let second_source = ManualSource::new(TEST_SAMPLE_RATE);
    let mut second_feeder = SineFeeder::new(second_source.feeder(), 440.0, TEST_SAMPLE_RATE);
    let second = pipeline.start(Box::new(second_source), "voice").unwrap();

    assert_ne!(first.id(), second.id());
    assert!(!first.is_active());
    assert!(!first_feeder.is_attached());
    assert!(first.poll().is_none());
    assert!(second.is_active());

    feed_until(&second, &mut second_feeder, SETTLE_TIMEOUT_MS, |r| is_near(r, 440.0))
        .expect("New session never settled on 440 Hz");
}

fn assert_no_work_after_stop(pipeline: PitchPipeline) {
    let source = ManualSource::new(TEST_SAMPLE_RATE);
    let mut feeder = SineFeeder::new(source.feeder(), 440.0, TEST_SAMPLE_RATE);

    let session = pipeline.start(Box::new(source), "voice").unwrap();
    assert!(wait_for_ticks(&session, &mut feeder, 3, SETTLE_TIMEOUT_MS));
    assert!(session.poll().is_some());
    assert!(session.analysis_iterations() >= session.analysis_ticks());

    pipeline.stop(&session);
    assert!(pipeline.poll(&session).is_none());
    assert!(session.poll().is_none());
    assert!(!session.is_active());

    let ticks = session.analysis_ticks();
    let iterations = session.analysis_iterations();
    for _ in 0..10 {
        assert_eq!(feeder.feed(), 0, "Stopped session still accepts samples");
        session.poll();
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(session.analysis_ticks(), ticks);
    assert_eq!(
        session.analysis_iterations(),
        iterations,
        "Analysis loop kept running after stop"
    );
}

#[test]
fn test_stop_then_poll_is_none() {
    let pipeline = pipeline();
    assert_no_work_after_stop(pipeline);
}

#[test]
fn test_stop_then_poll_is_none_when_polling() {
    let pipeline = polling_pipeline();
    assert_no_work_after_stop(pipeline);
}

#[test]
fn test_stop_is_idempotent() {
    let pipeline = pipeline();
    let session = pipeline
        .start(Box::new(ManualSource::new(TEST_SAMPLE_RATE)), "voice")
        .unwrap();

    pipeline.stop(&session);
    pipeline.stop(&session);
    assert!(pipeline.poll(&session).is_none());
    assert!(pipeline.current_session().is_none());
}

#[test]
fn test_stale_handle_does_not_stop_new_session() {
    let pipeline = pipeline();
    let old = pipeline
        .start(Box::new(ManualSource::new(TEST_SAMPLE_RATE)), "voice")
        .unwrap();
    let current = pipeline
        .start(Box::new(ManualSource::new(TEST_SAMPLE_RATE)), "voice")
        .unwrap();

    pipeline.stop(&old);
    assert!(current.is_active());
    assert_eq!(pipeline.current_session().map(|s| s.id()), Some(current.id()));
}

#[test]
fn test_unknown_profile_uses_general() {
    let pipeline = pipeline();
    let session = pipeline
        .start(Box::new(ManualSource::new(TEST_SAMPLE_RATE)), "theremin")
        .unwrap();
    assert_eq!(session.profile().name, "general");
    assert_eq!(session.profile().min_hz, 50.0);
    assert_eq!(session.profile().max_hz, 2000.0);
}

#[test]
fn test_ended_stream_fails_start() {
    let pipeline = pipeline();
    let source = ManualSource::new(TEST_SAMPLE_RATE);
    source.feeder().end();

    let result = pipeline.start(Box::new(source), "voice");
    assert!(matches!(
        result,
        Err(Error::Core(pitchtrack::core::Error::StreamEnded))
    ));
    assert!(pipeline.latest().is_none());
}

#[test]
fn test_invalid_sample_rate_rejected() {
    let pipeline = pipeline();
    let result = pipeline.start(Box::new(ManualSource::new(0.0)), "voice");
    assert!(matches!(
        result,
        Err(Error::Core(pitchtrack::core::Error::InvalidConfig(_)))
    ));
}

#[test]
fn test_latest_follows_current_session() {
    let pipeline = pipeline();
    assert!(pipeline.latest().is_none());

    let source = ManualSource::new(TEST_SAMPLE_RATE);
    let mut feeder = SineFeeder::new(source.feeder(), 440.0, TEST_SAMPLE_RATE);
    let session = pipeline.start(Box::new(source), "voice").unwrap();
    assert!(wait_for_ticks(&session, &mut feeder, 1, SETTLE_TIMEOUT_MS));
    assert!(pipeline.latest().is_some());

    pipeline.stop_all();
    assert!(pipeline.latest().is_none());
    assert!(!session.is_active());
}

#[test]
fn test_noise_never_publishes_non_finite_values() {
    let pipeline = pipeline();
    let source = ManualSource::new(TEST_SAMPLE_RATE);
    let feeder = source.feeder();
    let session = pipeline.start(Box::new(source), "general").unwrap();

    let noise = generate_noise(44100, 42);
    let mut last_timestamp = 0.0;
    for (i, block) in noise.chunks(FEED_BLOCK).enumerate() {
        feeder.push(block);
        if i % 7 == 0 {
            feeder.push(&[f32::NAN; 8]);
        }
        if let Some(reading) = session.poll() {
            assert!(reading.frequency_hz.is_finite());
            assert!(reading.clarity.is_finite() && (0.0..=1.0).contains(&reading.clarity));
            assert!(reading.rms.is_finite());
            assert!(reading.timestamp_ms >= last_timestamp);
            last_timestamp = reading.timestamp_ms;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn test_concurrent_pollers() {
    let pipeline = pipeline();
    let source = ManualSource::new(TEST_SAMPLE_RATE);
    let mut feeder = SineFeeder::new(source.feeder(), 440.0, TEST_SAMPLE_RATE);
    let session = pipeline.start(Box::new(source), "voice").unwrap();

    let done = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let pollers: Vec<_> = (0..4)
        .map(|_| {
            let handle = session.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                let mut last = 0.0f64;
                let mut reads = 0usize;
                while !done.load(std::sync::atomic::Ordering::Acquire) {
                    if let Some(reading) = handle.poll() {
                        assert!(reading.timestamp_ms >= last, "Timestamp went backwards");
                        last = reading.timestamp_ms;
                        reads += 1;
                    }
                    std::thread::yield_now();
                }
                reads
            })
        })
        .collect();

    assert!(wait_for_ticks(&session, &mut feeder, 10, SETTLE_TIMEOUT_MS));
    done.store(true, std::sync::atomic::Ordering::Release);

    for poller in pollers {
        assert!(poller.join().unwrap() > 0);
    }
}

#[test]
fn test_dropped_samples_are_counted() {
    init_tracing();
    let pipeline = PitchPipeline::builder()
        .force_polling(true)
        .ring_capacity(4096)
        .build()
        .unwrap();
    let source = ManualSource::new(TEST_SAMPLE_RATE);
    let feeder = source.feeder();
    let session = pipeline.start(Box::new(source), "voice").unwrap();

    // Nobody polls, so nothing drains the ring
    let accepted = feeder.push(&generate_silence(10_000));
    assert_eq!(accepted, 4096);
    assert_eq!(session.dropped_samples(), 10_000 - 4096);
}

#[test]
fn test_full_ring_analyses_newest_audio() {
    let pipeline = polling_pipeline();
    let source = ManualSource::new(TEST_SAMPLE_RATE);
    let feeder = source.feeder();
    let session = pipeline.start(Box::new(source), "voice").unwrap();

    // The consumer stalls long enough for the ring to fill with old audio
    let capacity = pipeline.config().ring_capacity;
    let stale: Vec<f32> = generate_sine(220.0, TEST_SAMPLE_RATE, capacity)
        .iter()
        .map(|s| s * 0.5)
        .collect();
    assert_eq!(feeder.push(&stale), capacity);

    let fresh: Vec<f32> = generate_sine(440.0, TEST_SAMPLE_RATE, 4096)
        .iter()
        .map(|s| s * 0.5)
        .collect();
    assert_eq!(feeder.push(&fresh), 4096);
    assert_eq!(session.dropped_samples(), 4096);

    let reading = session.poll().expect("Reading after the stall");
    assert!(
        (435.0..=445.0).contains(&reading.frequency_hz),
        "First reading after the stall is {} Hz, expected the newest audio",
        reading.frequency_hz
    );
}

#[test]
fn test_pipeline_drop_detaches_source() {
    let source = ManualSource::new(TEST_SAMPLE_RATE);
    let feeder = source.feeder();
    let session = {
        let pipeline = pipeline();
        let session = pipeline.start(Box::new(source), "voice").unwrap();
        assert!(feeder.is_attached());
        session
    };

    assert!(!feeder.is_attached());
    assert!(session.poll().is_none());
}
