// End-to-end runs of the heartbeat exchange.
//
// Ratios between made and missed operations depend on how the OS schedules
// the two threads, so only scheduling-independent facts are asserted here.
use shmsync_core::{
    run_reader_role, run_writer_role, Algorithm, ExchangeConfig, ExchangeReport, ExchangeSession,
    Role, SharedBuffer, ShmSyncError, StopSignal,
};
use std::thread;
use std::time::{Duration, Instant};

const CYCLES: u64 = 2_000;

fn run(config: ExchangeConfig) -> ExchangeReport {
    ExchangeSession::run(&config.with_cycles(CYCLES), &StopSignal::new()).unwrap()
}

fn assert_common(report: &ExchangeReport) {
    let task = report.writer_task.expect("in-process run reports writer timing");
    assert_eq!(task.cycles, CYCLES);
    assert_eq!(report.writes.attempts(), CYCLES);
    assert_eq!(report.reads.inconsistent, 0);
    assert_eq!(report.reads.stale_reads, 0);
    assert_eq!(report.reads.attempts(), report.reader_polls);
}

#[test]
fn head_tail_reference_scenario() {
    let report = run(ExchangeConfig::head_tail_reference());
    assert_common(&report);
    assert_eq!(report.algorithm, Algorithm::HeadTail);
    assert_eq!(report.writes.made_writes, CYCLES);
    assert_eq!(report.writes.missed_writes, 0);
    assert!(report.reads.made_reads > 0);
}

#[test]
fn peterson_busy_poll_scenario() {
    let report = run(ExchangeConfig::peterson_busy_poll());
    assert_common(&report);
    assert!(report.reads.made_reads > 0);
}

#[test]
fn peterson_sleepy_reader_scenario() {
    let report = run(ExchangeConfig::peterson_sleepy_reader());
    assert_common(&report);

    // every poll sleeps 10 ms, so the count is bounded by the run time
    let bound = (report.elapsed_secs / 0.010).ceil() as u64 + 1;
    assert!(report.reader_polls <= bound, "{} polls in {:.3}s", report.reader_polls, report.elapsed_secs);
}

#[test]
fn test_and_set_scenario() {
    let report = run(ExchangeConfig::test_and_set_busy_poll());
    assert_common(&report);
}

#[test]
fn last_heartbeat_never_exceeds_writes() {
    let report = run(ExchangeConfig::head_tail_reference());
    let last = report.last_heartbeat.unwrap_or_default();
    assert!((0..=CYCLES as i32).contains(&last));
}

#[test]
fn raised_stop_ends_unbounded_run() {
    let stop = StopSignal::new();
    let config = ExchangeConfig {
        cycles: None,
        ..Default::default()
    };

    let stopper = {
        let stop = stop.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            stop.stop();
        })
    };
    let started = Instant::now();
    let report = ExchangeSession::run(&config, &stop).unwrap();
    stopper.join().unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    let task = report.writer_task.unwrap();
    assert_eq!(report.writes.attempts(), task.cycles);
    assert_eq!(report.reads.inconsistent, 0);
}

#[test]
fn invalid_config_is_rejected_before_allocation() {
    let config = ExchangeConfig {
        payload_len: 1,
        ..Default::default()
    };
    assert!(ExchangeSession::run(&config, &StopSignal::new()).is_err());
}

#[test]
fn writer_and_reader_roles_share_a_named_region() {
    let config = ExchangeConfig {
        region_name: format!("it_roles_{}", std::process::id()),
        payload_len: 128,
        cycles: None,
        ..Default::default()
    };

    let writer_stop = StopSignal::new();
    let writer = {
        let config = config.clone();
        let stop = writer_stop.clone();
        thread::spawn(move || run_writer_role(&config, &stop))
    };

    // Observe without claiming a role
    let deadline = Instant::now() + Duration::from_secs(10);
    let observer = loop {
        if let Ok(buffer) = SharedBuffer::attach(&config.region_name, config.algorithm) {
            break buffer;
        }
        assert!(Instant::now() < deadline, "writer never created the region");
        thread::sleep(Duration::from_millis(5));
    };

    let reader_stop = StopSignal::new();
    let reader = {
        let config = config.clone();
        let stop = reader_stop.clone();
        thread::spawn(move || run_reader_role(&config, &stop))
    };

    while !observer.is_attached(Role::Reader) || observer.write_stats().made_writes < 200 {
        assert!(Instant::now() < deadline, "reader never attached");
        thread::sleep(Duration::from_millis(5));
    }

    writer_stop.stop();
    let (writes, task) = writer.join().unwrap().unwrap();
    reader_stop.stop();
    let report = reader.join().unwrap().unwrap();

    assert_eq!(writes.attempts(), task.cycles);
    assert_eq!(writes.missed_writes, 0);
    assert_eq!(report.writes, writes);
    assert_eq!(report.reads.inconsistent, 0);
    assert!(report.writer_task.is_none());
}

#[test]
fn reader_with_wrong_algorithm_fails_instead_of_waiting() {
    let name = format!("it_mismatch_{}", std::process::id());
    let _buffer = SharedBuffer::create(&name, Algorithm::HeadTail, 16).unwrap();

    let config = ExchangeConfig {
        region_name: name,
        algorithm: Algorithm::Peterson,
        payload_len: 16,
        cycles: None,
        ..Default::default()
    };
    let started = Instant::now();
    let result = run_reader_role(&config, &StopSignal::new());

    assert!(matches!(result, Err(ShmSyncError::Incompatible(_))), "{:?}", result);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn second_writer_role_leaves_running_writer_alone() {
    let config = ExchangeConfig {
        region_name: format!("it_second_writer_{}", std::process::id()),
        payload_len: 32,
        cycles: None,
        ..Default::default()
    };

    let writer_stop = StopSignal::new();
    let writer = {
        let config = config.clone();
        let stop = writer_stop.clone();
        thread::spawn(move || run_writer_role(&config, &stop))
    };

    let deadline = Instant::now() + Duration::from_secs(10);
    let observer = loop {
        if let Ok(buffer) = SharedBuffer::attach(&config.region_name, config.algorithm) {
            if buffer.is_attached(Role::Writer) {
                break buffer;
            }
        }
        assert!(Instant::now() < deadline, "writer never created the region");
        thread::sleep(Duration::from_millis(5));
    };

    let second = run_writer_role(&config, &StopSignal::new());
    assert!(matches!(second, Err(ShmSyncError::RoleTaken(Role::Writer))), "{:?}", second.err());

    // the first writer keeps publishing into the same, intact header
    let before = observer.write_stats().made_writes;
    while observer.write_stats().made_writes <= before {
        assert!(Instant::now() < deadline, "first writer stopped publishing");
        thread::sleep(Duration::from_millis(5));
    }
    assert!(observer.is_attached(Role::Writer));

    writer_stop.stop();
    let (writes, _) = writer.join().unwrap().unwrap();
    assert_eq!(writes.missed_writes, 0);
}
