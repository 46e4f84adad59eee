// Jitter recorder and reader in separate roles over a named log.
use shmsync_core::{run_jitter_reader, run_jitter_recorder, JitterConfig, ShmSyncError, StopSignal};
use std::thread;

const SAMPLES: usize = 32;

#[test]
fn recorder_and_reader_share_a_named_log() {
    let recorder_config = JitterConfig {
        samples: SAMPLES,
        period_ns: 200_000,
        region_name: format!("it_jitter_{}", std::process::id()),
        ..Default::default()
    };
    // the reader analyses against the period stored in the log
    let reader_config = JitterConfig {
        period_ns: 1_000_000,
        ..recorder_config.clone()
    };

    let stop = StopSignal::new();
    let recorder = {
        let stop = stop.clone();
        thread::spawn(move || run_jitter_recorder(&recorder_config, &stop))
    };

    let analysis = run_jitter_reader(&reader_config, &stop).unwrap();
    let stats = recorder.join().unwrap().unwrap();

    assert_eq!(stats.cycles, SAMPLES as u64);
    assert_eq!(analysis.deltas_us.len(), SAMPLES - 1);
    assert!((analysis.nominal_period_us - 200.0).abs() < 1e-9);
    assert!(analysis.min_us > 0.0);
}

#[test]
fn stopped_reader_without_recorder_reports_missing_log() {
    let config = JitterConfig {
        samples: SAMPLES,
        region_name: format!("it_jitter_absent_{}", std::process::id()),
        ..Default::default()
    };
    let stop = StopSignal::new();
    stop.stop();

    assert!(matches!(
        run_jitter_reader(&config, &stop),
        Err(ShmSyncError::Layout(_))
    ));
}
