//! Subcommand implementations and the argument groups they share.

pub mod config;
pub mod jitter;
pub mod roles;
pub mod run;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use shmsync_core::{Algorithm, ExchangeConfig, JitterConfig, RealtimeConfig};
use std::path::PathBuf;

/// Built-in exchange scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// Head/tail counters, busy-polling reader
    Reference,
    /// Peterson, busy-polling reader
    Peterson,
    /// Peterson, reader sleeping 10 ms between polls
    PetersonSleepy,
    /// Test-and-set, busy-polling reader
    TestAndSet,
}

impl Preset {
    pub fn config(self) -> ExchangeConfig {
        match self {
            Preset::Reference => ExchangeConfig::head_tail_reference(),
            Preset::Peterson => ExchangeConfig::peterson_busy_poll(),
            Preset::PetersonSleepy => ExchangeConfig::peterson_sleepy_reader(),
            Preset::TestAndSet => ExchangeConfig::test_and_set_busy_poll(),
        }
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct ExchangeArgs {
    /// Start from a built-in scenario
    #[arg(short, long, value_enum, conflicts_with = "config")]
    pub preset: Option<Preset>,

    /// Start from a TOML, YAML or JSON file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// peterson, test-and-set or head-tail
    #[arg(short, long)]
    pub algorithm: Option<Algorithm>,

    /// Writer cycles to run
    #[arg(short = 'n', long, conflicts_with = "forever")]
    pub cycles: Option<u64>,

    /// Run until Ctrl+C
    #[arg(long)]
    pub forever: bool,

    /// Writer release rate
    #[arg(short, long)]
    pub rate_hz: Option<f64>,

    /// Integers in the shared payload
    #[arg(short = 'l', long)]
    pub payload_len: Option<usize>,

    /// Reader sleep between polls; 0 busy-polls
    #[arg(long)]
    pub poll_interval_ms: Option<f64>,

    /// Name of the shared region used by the writer and reader roles
    #[arg(long)]
    pub region: Option<String>,

    /// SCHED_FIFO priority for the writer thread
    #[arg(long)]
    pub priority: Option<i32>,

    /// CPU core for the writer thread
    #[arg(long)]
    pub writer_cpu: Option<usize>,

    /// CPU core for the reader thread
    #[arg(long)]
    pub reader_cpu: Option<usize>,

    /// Lock the process memory before the writer starts
    #[arg(long)]
    pub lock_memory: bool,
}

impl ExchangeArgs {
    /// Resolve the base scenario, then apply every flag on top of it
    pub fn to_config(&self) -> Result<ExchangeConfig> {
        let mut config = match (&self.config, self.preset) {
            (Some(path), _) => ExchangeConfig::load(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            (None, Some(preset)) => preset.config(),
            (None, None) => ExchangeConfig::head_tail_reference(),
        };

        if let Some(algorithm) = self.algorithm {
            config.algorithm = algorithm;
        }
        if let Some(cycles) = self.cycles {
            config.cycles = Some(cycles);
        }
        if self.forever {
            config.cycles = None;
        }
        if let Some(rate) = self.rate_hz {
            config.writer_period_ns = period_ns_from_rate(rate)?;
        }
        if let Some(len) = self.payload_len {
            config.payload_len = len;
        }
        if let Some(ms) = self.poll_interval_ms {
            if !(ms >= 0.0) || !ms.is_finite() {
                bail!("poll interval must be a non-negative number of milliseconds");
            }
            let us = (ms * 1000.0).round() as u64;
            config.reader_poll_interval_us = (us > 0).then_some(us);
        }
        if let Some(region) = &self.region {
            config.region_name = region.clone();
        }
        if let Some(cpu) = self.reader_cpu {
            config.reader_cpu = Some(cpu);
        }
        apply_realtime_flags(
            &mut config.writer_realtime,
            self.priority,
            self.writer_cpu,
            self.lock_memory,
        );

        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct JitterArgs {
    /// Cycle-counter readings to take
    #[arg(short = 'n', long)]
    pub samples: Option<usize>,

    /// Nominal release period
    #[arg(short, long)]
    pub period_us: Option<u64>,

    /// SCHED_FIFO priority for the recorder thread
    #[arg(long)]
    pub priority: Option<i32>,

    /// CPU core for the recorder thread
    #[arg(long)]
    pub cpu: Option<usize>,

    #[arg(long)]
    pub lock_memory: bool,

    /// Print only the summary line, not every delta
    #[arg(short, long)]
    pub summary: bool,

    /// Print the full analysis as JSON
    #[arg(long, conflicts_with = "summary")]
    pub json: bool,

    /// Write the deltas to a file, one per line
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Named log shared by `jitter record` and `jitter read`
    #[arg(long)]
    pub region: Option<String>,
}

/// Split the jitter instrument across two processes
#[derive(Debug, Clone, Subcommand)]
pub enum JitterRole {
    /// Record into a named log and keep it until a reader has consumed it
    Record {
        #[command(flatten)]
        jitter: JitterArgs,
    },

    /// Wait for a recorder's named log and analyse it
    Read {
        #[command(flatten)]
        jitter: JitterArgs,
    },
}

impl JitterArgs {
    pub fn to_config(&self) -> Result<JitterConfig> {
        let mut config = JitterConfig::default();
        if let Some(samples) = self.samples {
            config.samples = samples;
        }
        if let Some(period_us) = self.period_us {
            config.period_ns = period_us.saturating_mul(1000);
        }
        if let Some(region) = &self.region {
            config.region_name = region.clone();
        }
        apply_realtime_flags(&mut config.realtime, self.priority, self.cpu, self.lock_memory);
        config.validate()?;
        Ok(config)
    }
}

fn apply_realtime_flags(
    realtime: &mut RealtimeConfig,
    priority: Option<i32>,
    cpu: Option<usize>,
    lock_memory: bool,
) {
    if priority.is_some() {
        realtime.priority = priority;
    }
    if cpu.is_some() {
        realtime.cpu = cpu;
    }
    realtime.lock_memory |= lock_memory;
}

fn period_ns_from_rate(rate_hz: f64) -> Result<u64> {
    if !(rate_hz > 0.0) || !rate_hz.is_finite() {
        bail!("rate must be a positive number of Hz, got {}", rate_hz);
    }
    let period_ns = (1e9 / rate_hz).round();
    if period_ns < 1.0 {
        bail!("rate {} Hz is above 1 GHz", rate_hz);
    }
    Ok(period_ns as u64)
}
