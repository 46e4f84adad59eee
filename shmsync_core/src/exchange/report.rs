use crate::consistency::{Algorithm, ReadStats, WriteStats};
use crate::error::ShmSyncResult;
use crate::scheduling::TaskStats;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final tallies of one exchange run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeReport {
    pub algorithm: Algorithm,
    pub payload_len: usize,
    pub reads: ReadStats,
    pub writes: WriteStats,
    /// Writer timing, when the writer ran in this process
    pub writer_task: Option<TaskStats>,
    pub reader_polls: u64,
    pub elapsed_secs: f64,
    pub last_heartbeat: Option<i32>,
}

impl ExchangeReport {
    /// `made / (made + missed)` over reads
    pub fn read_success_ratio(&self) -> f64 {
        self.reads.success_ratio()
    }

    pub fn write_success_ratio(&self) -> f64 {
        let attempts = self.writes.attempts();
        if attempts == 0 {
            0.0
        } else {
            self.writes.made_writes as f64 / attempts as f64
        }
    }

    pub fn to_json_pretty(&self) -> ShmSyncResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for ExchangeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "reads made/missed/inconsistent: {}/{}/{}",
            self.reads.made_reads, self.reads.missed_reads, self.reads.inconsistent
        )?;
        write!(
            f,
            "writes made/missed:             {}/{}",
            self.writes.made_writes, self.writes.missed_writes
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ExchangeReport {
        ExchangeReport {
            algorithm: Algorithm::HeadTail,
            payload_len: 1000,
            reads: ReadStats {
                made_reads: 915_997,
                missed_reads: 101_048,
                ..Default::default()
            },
            writes: WriteStats {
                made_writes: 101_376,
                missed_writes: 0,
            },
            writer_task: None,
            reader_polls: 1_017_045,
            elapsed_secs: 10.1,
            last_heartbeat: Some(101_376),
        }
    }

    #[test]
    fn test_display_matches_reference_lines() {
        assert_eq!(
            sample().to_string(),
            "reads made/missed/inconsistent: 915997/101048/0\n\
             writes made/missed:             101376/0"
        );
    }

    #[test]
    fn test_ratios() {
        let report = sample();
        let ratio = report.read_success_ratio();
        assert!(ratio > 0.89 && ratio < 0.91);
        assert_eq!(report.write_success_ratio(), 1.0);
    }

    #[test]
    fn test_json_output() {
        let json = sample().to_json_pretty().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["algorithm"], "head-tail");
        assert_eq!(value["reads"]["missed_reads"], 101_048);
    }
}
