//! Configuration for the exchange scenario and the jitter instrument.
//!
//! Every struct deserializes with `#[serde(default)]`, so a file only needs
//! the keys it changes. Files may be TOML, YAML or JSON; [`ExchangeConfig::load`]
//! picks the format from the extension.

use crate::consistency::Algorithm;
use crate::error::{ShmSyncError, ShmSyncResult};
use crate::memory::{MAX_PAYLOAD_LEN, MIN_PAYLOAD_LEN};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PAYLOAD_LEN: usize = 1000;
/// 10 kHz
pub const DEFAULT_WRITER_PERIOD_NS: u64 = 100_000;
pub const REFERENCE_CYCLES: u64 = 100_000;
pub const SLEEPY_READER_POLL_US: u64 = 10_000;

pub const DEFAULT_JITTER_SAMPLES: usize = 1024;
/// 20 kHz
pub const DEFAULT_JITTER_PERIOD_NS: u64 = 50_000;

/// Scheduling settings applied to a periodic thread
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// SCHED_FIFO priority, 1..=99
    pub priority: Option<i32>,
    /// CPU core to pin the thread to
    pub cpu: Option<usize>,
    /// `mlockall` before the first tick
    pub lock_memory: bool,
    /// Fail instead of warning when a setting cannot be applied
    pub strict: bool,
}

impl RealtimeConfig {
    pub fn is_empty(&self) -> bool {
        self.priority.is_none() && self.cpu.is_none() && !self.lock_memory
    }

    pub fn validate(&self) -> ShmSyncResult<()> {
        if let Some(priority) = self.priority {
            if !(1..=99).contains(&priority) {
                return Err(ShmSyncError::config(format!(
                    "realtime priority {} is outside 1..=99",
                    priority
                )));
            }
        }
        if let Some(cpu) = self.cpu {
            validate_cpu(cpu)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub algorithm: Algorithm,
    /// Number of integers in the shared payload
    pub payload_len: usize,
    pub writer_period_ns: u64,
    /// Writer cycles to run; `None` runs until cancelled
    pub cycles: Option<u64>,
    /// Reader sleep between polls; `None` busy-polls
    pub reader_poll_interval_us: Option<u64>,
    /// Name of the file-backed region used by the cross-process roles
    pub region_name: String,
    /// CPU core for the reader thread
    pub reader_cpu: Option<usize>,
    pub writer_realtime: RealtimeConfig,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            payload_len: DEFAULT_PAYLOAD_LEN,
            writer_period_ns: DEFAULT_WRITER_PERIOD_NS,
            cycles: None,
            reader_poll_interval_us: None,
            region_name: "exchange".to_string(),
            reader_cpu: None,
            writer_realtime: RealtimeConfig::default(),
        }
    }
}

impl ExchangeConfig {
    /// 10 kHz writer for 100 000 cycles, busy-polling head/tail reader
    pub fn head_tail_reference() -> Self {
        Self {
            algorithm: Algorithm::HeadTail,
            cycles: Some(REFERENCE_CYCLES),
            ..Default::default()
        }
    }

    pub fn peterson_busy_poll() -> Self {
        Self {
            algorithm: Algorithm::Peterson,
            ..Self::head_tail_reference()
        }
    }

    /// Peterson with the reader sleeping 10 ms between polls
    pub fn peterson_sleepy_reader() -> Self {
        Self {
            reader_poll_interval_us: Some(SLEEPY_READER_POLL_US),
            ..Self::peterson_busy_poll()
        }
    }

    pub fn test_and_set_busy_poll() -> Self {
        Self {
            algorithm: Algorithm::TestAndSet,
            ..Self::head_tail_reference()
        }
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_cycles(mut self, cycles: u64) -> Self {
        self.cycles = Some(cycles);
        self
    }

    pub fn writer_period(&self) -> Duration {
        Duration::from_nanos(self.writer_period_ns)
    }

    pub fn writer_rate_hz(&self) -> f64 {
        1e9 / self.writer_period_ns as f64
    }

    pub fn reader_poll_interval(&self) -> Option<Duration> {
        self.reader_poll_interval_us.map(Duration::from_micros)
    }

    pub fn validate(&self) -> ShmSyncResult<()> {
        if self.payload_len < MIN_PAYLOAD_LEN {
            return Err(ShmSyncError::config(format!(
                "payload_len must be at least {}, got {}",
                MIN_PAYLOAD_LEN, self.payload_len
            )));
        }
        if self.payload_len > MAX_PAYLOAD_LEN {
            return Err(ShmSyncError::config(format!(
                "payload_len {} exceeds the maximum of {}",
                self.payload_len, MAX_PAYLOAD_LEN
            )));
        }
        if self.writer_period_ns == 0 {
            return Err(ShmSyncError::config("writer_period_ns must be positive"));
        }
        if self.cycles == Some(0) {
            return Err(ShmSyncError::config("cycles must be positive when set"));
        }
        if self.region_name.trim().is_empty() {
            return Err(ShmSyncError::config("region_name must not be empty"));
        }
        self.writer_realtime.validate()?;
        if let Some(cpu) = self.reader_cpu {
            validate_cpu(cpu)?;
        }
        Ok(())
    }

    pub fn load(path: &Path) -> ShmSyncResult<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("toml") => Self::load_toml(path),
            Some("yaml") | Some("yml") => Self::load_yaml(path),
            Some("json") => Self::load_json(path),
            _ => Err(ShmSyncError::config(format!(
                "unrecognized config format: {}",
                path.display()
            ))),
        }
    }

    pub fn load_toml(path: &Path) -> ShmSyncResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_yaml(path: &Path) -> ShmSyncResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_json(path: &Path) -> ShmSyncResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ShmSyncResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save_toml(&self, path: &Path) -> ShmSyncResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_toml_string()?)?;
        log::info!("Wrote exchange config to {}", path.display());
        Ok(())
    }
}

/// Settings for the scheduling-jitter instrument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitterConfig {
    pub samples: usize,
    pub period_ns: u64,
    pub region_name: String,
    pub realtime: RealtimeConfig,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            samples: DEFAULT_JITTER_SAMPLES,
            period_ns: DEFAULT_JITTER_PERIOD_NS,
            region_name: "jitter".to_string(),
            realtime: RealtimeConfig::default(),
        }
    }
}

impl JitterConfig {
    pub fn period(&self) -> Duration {
        Duration::from_nanos(self.period_ns)
    }

    pub fn validate(&self) -> ShmSyncResult<()> {
        if self.samples < 2 {
            return Err(ShmSyncError::config(
                "at least two jitter samples are needed for one delta",
            ));
        }
        if self.period_ns == 0 {
            return Err(ShmSyncError::config("period_ns must be positive"));
        }
        self.realtime.validate()
    }
}

fn validate_cpu(cpu: usize) -> ShmSyncResult<()> {
    let available = num_cpus::get();
    if cpu >= available {
        return Err(ShmSyncError::config(format!(
            "CPU {} out of range (0-{})",
            cpu,
            available.saturating_sub(1)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ExchangeConfig::default();
        assert_eq!(config.algorithm, Algorithm::HeadTail);
        assert_eq!(config.payload_len, 1000);
        assert!((config.writer_rate_hz() - 10_000.0).abs() < 1e-6);
        config.validate().unwrap();
        JitterConfig::default().validate().unwrap();
    }

    #[test]
    fn test_presets() {
        let reference = ExchangeConfig::head_tail_reference();
        assert_eq!(reference.cycles, Some(100_000));
        assert_eq!(reference.reader_poll_interval(), None);

        let sleepy = ExchangeConfig::peterson_sleepy_reader();
        assert_eq!(sleepy.algorithm, Algorithm::Peterson);
        assert_eq!(sleepy.reader_poll_interval(), Some(Duration::from_millis(10)));

        assert_eq!(
            ExchangeConfig::test_and_set_busy_poll().algorithm,
            Algorithm::TestAndSet
        );
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let short = ExchangeConfig {
            payload_len: 1,
            ..Default::default()
        };
        assert!(short.validate().is_err());

        let stopped = ExchangeConfig {
            writer_period_ns: 0,
            ..Default::default()
        };
        assert!(stopped.validate().is_err());

        let mut rt = ExchangeConfig::default();
        rt.writer_realtime.priority = Some(100);
        assert!(rt.validate().is_err());

        let far_cpu = ExchangeConfig {
            reader_cpu: Some(num_cpus::get()),
            ..Default::default()
        };
        assert!(far_cpu.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ExchangeConfig = toml::from_str(
            r#"
            algorithm = "test-and-set"
            cycles = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.algorithm, Algorithm::TestAndSet);
        assert_eq!(config.cycles, Some(500));
        assert_eq!(config.payload_len, DEFAULT_PAYLOAD_LEN);
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        assert!(matches!(
            ExchangeConfig::load(Path::new("exchange.ini")),
            Err(ShmSyncError::Config(_))
        ));
    }
}
