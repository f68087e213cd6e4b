//! End-to-end runs of the demonstration hosts and the `ringdemo` binary.

use shmring::{
    run_consumer, Backoff, BlockingConsumer, BlockingProducer, Config, ParkWaiter, RingBuffer,
    Role, ThreadHost, WaitStrategy, DEMO_COUNT, DEMO_SLOTS, SENTINEL,
};
use std::thread;
use std::time::Duration;

fn fast_polling() -> Config {
    Config::default()
        .with_producer_backoff(Duration::from_millis(1))
        .with_consumer_backoff(Duration::ZERO)
        .with_metrics(true)
}

fn expected_values() -> Vec<i32> {
    (0..DEMO_COUNT).collect()
}

// =============================================================================
// Thread host
// =============================================================================

#[test]
fn test_thread_host_delivers_all_values_in_order() {
    let report = ThreadHost::new(fast_polling()).run(DEMO_COUNT).unwrap();

    assert_eq!(report.produced, 50);
    let consumer = report.consumer.unwrap();
    assert_eq!(consumer.values, expected_values());
    assert!(!consumer.values.contains(&SENTINEL));
}

#[test]
fn test_thread_host_parking_delivers_all_values() {
    let report = ThreadHost::new(fast_polling().with_wait(WaitStrategy::Park))
        .run(DEMO_COUNT)
        .unwrap();

    assert_eq!(report.consumer.unwrap().values, expected_values());
}

#[test]
fn test_slow_consumer_fills_the_ring() {
    // Producer retries fast, consumer sleeps: the producer must hit full
    let config = Config::default()
        .with_producer_backoff(Duration::ZERO)
        .with_consumer_backoff(Duration::from_millis(1))
        .with_metrics(true);

    let report = ThreadHost::new(config).run(DEMO_COUNT).unwrap();

    assert_eq!(report.consumer.unwrap().values, expected_values());
    assert_eq!(report.producer_metrics.completed, 51);
}

// =============================================================================
// Starvation: consumer first, item later
// =============================================================================

#[test]
fn test_consumer_started_first_waits_without_corruption() {
    let mut ring = RingBuffer::<i32, DEMO_SLOTS>::new();
    let (producer, consumer) = ring.split();
    let mut producer = BlockingProducer::new(
        producer,
        Backoff::new(Role::Producer, Duration::ZERO),
        false,
    );
    let mut consumer = BlockingConsumer::new(
        consumer,
        Backoff::new(Role::Consumer, Duration::from_millis(1)),
        true,
    );

    let report = thread::scope(|s| {
        let worker = s.spawn(move || run_consumer(&mut consumer));

        // Let the consumer spin on an empty ring for a while
        thread::sleep(Duration::from_millis(30));
        assert!(producer.handle().is_empty());

        producer.enqueue(0);
        producer.enqueue(SENTINEL);
        worker.join().unwrap()
    });

    assert_eq!(report.values, vec![0]);
    assert!(report.metrics.failed_attempts > 0);

    let snapshot = ring.snapshot();
    assert_eq!(snapshot.front, 3);
    assert_eq!(snapshot.back, 2);
    assert!(ring.is_empty());
}

#[test]
fn test_parking_consumer_started_first() {
    let mut ring = RingBuffer::<i32, 2>::new();
    let (producer, consumer) = ring.split();
    let (producer_waiter, consumer_waiter) = ParkWaiter::pair(Duration::from_secs(1));
    let mut producer = BlockingProducer::new(producer, producer_waiter, false);
    let mut consumer = BlockingConsumer::new(consumer, consumer_waiter, false);

    // Single usable slot: every item forces a handoff between the sides
    let report = thread::scope(|s| {
        let worker = s.spawn(move || run_consumer(&mut consumer));
        thread::sleep(Duration::from_millis(10));
        for value in 0..20 {
            producer.enqueue(value);
        }
        producer.enqueue(SENTINEL);
        worker.join().unwrap()
    });

    assert_eq!(report.values, (0..20).collect::<Vec<_>>());
}

// =============================================================================
// Process host
// =============================================================================

#[cfg(target_os = "linux")]
mod process {
    use super::*;
    use shmring::{HostError, ProcessHost};
    use std::process::Command;

    const RINGDEMO: &str = env!("CARGO_BIN_EXE_ringdemo");

    #[test]
    fn test_process_host_delivers_all_values() {
        let report = ProcessHost::new(RINGDEMO, fast_polling()).run(DEMO_COUNT).unwrap();

        assert_eq!(report.produced, 50);
        assert!(report.exit.unwrap().success());
        assert!(report.consumer.is_none());
        assert_eq!(report.producer_metrics.completed, 51);
    }

    #[test]
    fn test_process_host_fails_when_consumer_fails() {
        // `true` ignores its arguments, exits 0 and never consumes; a ring of
        // 10 usable slots still takes 5 values plus the sentinel.
        let report = ProcessHost::new("true", fast_polling()).run(5).unwrap();
        assert!(report.exit.unwrap().success());

        let err = ProcessHost::new("false", fast_polling()).run(5).unwrap_err();
        assert!(matches!(err, HostError::ConsumerFailed(status) if status.code() == Some(1)));
        assert!(!err.is_setup());
    }

    #[test]
    fn test_cli_thread_mode_succeeds() {
        let output = Command::new(RINGDEMO)
            .args(["host", "--mode", "thread", "--producer-backoff-ms", "1"])
            .args(["--consumer-backoff-ms", "0"])
            .output()
            .unwrap();

        assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    }

    #[test]
    fn test_cli_process_mode_succeeds() {
        let output = Command::new(RINGDEMO)
            .args(["host", "--mode", "process", "--count", "25", "--metrics"])
            .args(["--producer-backoff-ms", "1", "--consumer-backoff-ms", "0"])
            .output()
            .unwrap();

        assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    }

    #[test]
    fn test_process_host_reports_consumer_that_quits_early() {
        // `true` exits 0 without consuming; 50 values cannot fit in 10 slots
        let err = ProcessHost::new("true", fast_polling()).run(DEMO_COUNT).unwrap_err();

        assert!(matches!(err, HostError::ConsumerAbandoned(status) if status.success()));
        assert!(!err.is_setup());
    }

    #[test]
    fn test_cli_consume_rejects_negative_descriptor() {
        let output = Command::new(RINGDEMO)
            .args(["consume", "--shm-fd=-1"])
            .output()
            .unwrap();

        assert_eq!(output.status.code(), Some(1));
        assert!(String::from_utf8_lossy(&output.stderr).contains("invalid shared memory descriptor"));
    }

    #[test]
    fn test_cli_rejects_parking_across_processes() {
        let output = Command::new(RINGDEMO)
            .args(["host", "--mode", "process", "--wait", "park"])
            .output()
            .unwrap();

        assert_eq!(output.status.code(), Some(1));
    }
}
