use super::ExchangeArgs;
use anyhow::Result;
use colored::*;
use shmsync_core::{ExchangeConfig, ExchangeReport, ExchangeSession, StopSignal};

pub fn execute(args: &ExchangeArgs, json: bool) -> Result<()> {
    let config = args.to_config()?;
    tracing::debug!(?config, "resolved exchange config");
    let stop = StopSignal::new();
    stop.install_ctrlc()?;

    if !json {
        print_banner(&config);
    }
    let report = ExchangeSession::run(&config, &stop)?;

    if json {
        println!("{}", report.to_json_pretty()?);
    } else {
        print_report(&report);
    }
    Ok(())
}

pub(crate) fn print_banner(config: &ExchangeConfig) {
    println!(
        "{} {} exchange over {} integers",
        "Running".cyan().bold(),
        config.algorithm.to_string().white().bold(),
        config.payload_len
    );
    let duration = match config.cycles {
        Some(cycles) => format!("{} cycles", cycles),
        None => "until Ctrl+C".to_string(),
    };
    let reader = match config.reader_poll_interval() {
        Some(interval) => format!("reader sleeps {:?} between polls", interval),
        None => "reader busy-polls".to_string(),
    };
    println!(
        "  writer at {:.0} Hz for {}, {}",
        config.writer_rate_hz(),
        duration,
        reader
    );
}

pub(crate) fn print_report(report: &ExchangeReport) {
    println!();
    println!("{}", report);

    if report.reads.stale_reads > 0 {
        println!(
            "{} {} reads returned an older heartbeat than the previous one",
            "warning:".yellow().bold(),
            report.reads.stale_reads
        );
    }
    if report.reads.inconsistent > 0 {
        println!(
            "{} {} successful reads were torn",
            "warning:".yellow().bold(),
            report.reads.inconsistent
        );
    }

    println!();
    println!(
        "  read success:  {:>6.2}%  ({} polls)",
        report.read_success_ratio() * 100.0,
        report.reader_polls
    );
    println!(
        "  write success: {:>6.2}%",
        report.write_success_ratio() * 100.0
    );
    if let Some(task) = &report.writer_task {
        println!("  writer timing: {}", task);
    }
    if let Some(heartbeat) = report.last_heartbeat {
        println!("  last heartbeat: {}", heartbeat);
    }
    println!("  elapsed: {:.3} s", report.elapsed_secs);
}
