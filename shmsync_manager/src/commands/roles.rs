//! Writer and reader as separate processes over a named region.

use super::run::{print_banner, print_report};
use super::ExchangeArgs;
use anyhow::Result;
use colored::*;
use shmsync_core::{run_reader_role, run_writer_role, StopSignal};

pub fn run_writer(args: &ExchangeArgs) -> Result<()> {
    let config = args.to_config()?;
    tracing::debug!(region = %config.region_name, ?config, "resolved exchange config");
    let stop = StopSignal::new();
    stop.install_ctrlc()?;

    print_banner(&config);
    println!(
        "  region: {}",
        config.region_name.white().bold()
    );
    let (writes, task) = run_writer_role(&config, &stop)?;

    println!();
    println!(
        "writes made/missed:             {}/{}",
        writes.made_writes, writes.missed_writes
    );
    println!("  writer timing: {}", task);
    Ok(())
}

pub fn run_reader(args: &ExchangeArgs, json: bool) -> Result<()> {
    let config = args.to_config()?;
    tracing::debug!(region = %config.region_name, ?config, "resolved exchange config");
    let stop = StopSignal::new();
    stop.install_ctrlc()?;

    if !json {
        println!(
            "{} region {} as {} reader (Ctrl+C to finish)",
            "Attaching".cyan().bold(),
            config.region_name.white().bold(),
            config.algorithm
        );
    }
    let report = run_reader_role(&config, &stop)?;

    if json {
        println!("{}", report.to_json_pretty()?);
    } else {
        print_report(&report);
    }
    Ok(())
}
