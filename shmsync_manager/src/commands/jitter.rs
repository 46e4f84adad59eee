use super::JitterArgs;
use anyhow::{Context, Result};
use colored::*;
use shmsync_core::{
    run_jitter, run_jitter_reader, run_jitter_recorder, JitterAnalysis, StopSignal,
};
use std::fmt::Write as _;
use std::path::Path;

pub fn execute(args: &JitterArgs) -> Result<()> {
    let config = args.to_config()?;
    tracing::debug!(?config, "resolved jitter config");
    let stop = StopSignal::new();
    stop.install_ctrlc()?;

    if !args.json {
        eprintln!(
            "{} {} samples at {:?}",
            "Recording".cyan().bold(),
            config.samples,
            config.period()
        );
    }
    let analysis = run_jitter(&config, &stop)?;
    report(args, &analysis)
}

/// `jitter record`: fill a named log for a reader in another process
pub fn record(args: &JitterArgs) -> Result<()> {
    let config = args.to_config()?;
    tracing::debug!(?config, "resolved jitter recorder config");
    let stop = StopSignal::new();
    stop.install_ctrlc()?;

    eprintln!(
        "{} {} samples at {:?} into region '{}'",
        "Recording".cyan().bold(),
        config.samples,
        config.period(),
        config.region_name
    );
    let stats = run_jitter_recorder(&config, &stop)?;
    println!("recorder timing: {}", stats);
    Ok(())
}

/// `jitter read`: analyse a named log once its recorder has filled it
pub fn read(args: &JitterArgs) -> Result<()> {
    let config = args.to_config()?;
    tracing::debug!(?config, "resolved jitter reader config");
    let stop = StopSignal::new();
    stop.install_ctrlc()?;

    if !args.json {
        eprintln!(
            "{} region '{}'",
            "Reading jitter log from".cyan().bold(),
            config.region_name
        );
    }
    let analysis = run_jitter_reader(&config, &stop)?;
    report(args, &analysis)
}

fn report(args: &JitterArgs, analysis: &JitterAnalysis) -> Result<()> {
    if let Some(path) = &args.output {
        write_deltas(path, analysis)?;
        eprintln!(
            "{} {} deltas to {}",
            "Wrote".green().bold(),
            analysis.deltas_us.len(),
            path.display()
        );
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(analysis)?);
    } else if args.summary || args.output.is_some() {
        println!("{}", analysis);
    } else {
        print!("{}", format_deltas(analysis));
        eprintln!("{}", analysis);
    }
    Ok(())
}

/// One delta per line, microseconds
fn format_deltas(analysis: &JitterAnalysis) -> String {
    let mut out = String::with_capacity(analysis.deltas_us.len() * 12);
    for delta in &analysis.deltas_us {
        let _ = writeln!(out, "{:.6}", delta);
    }
    out
}

fn write_deltas(path: &Path, analysis: &JitterAnalysis) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    std::fs::write(path, format_deltas(analysis))
        .with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn analysis() -> JitterAnalysis {
        JitterAnalysis::from_samples(&[0, 50_000, 101_000], 1e-9, Duration::from_micros(50))
            .unwrap()
    }

    #[test]
    fn test_deltas_one_per_line() {
        assert_eq!(format_deltas(&analysis()), "50.000000\n51.000000\n");
    }

    #[test]
    fn test_write_deltas_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs").join("jitter.txt");
        write_deltas(&path, &analysis()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
