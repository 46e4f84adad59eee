use serde::{Deserialize, Serialize};

/// Writer-side tallies, also published in the buffer header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteStats {
    pub made_writes: u64,
    pub missed_writes: u64,
}

impl WriteStats {
    pub fn attempts(&self) -> u64 {
        self.made_writes + self.missed_writes
    }
}

/// Reader-side tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadStats {
    /// Successful reads whose payload was self-consistent
    pub made_reads: u64,
    /// Reads refused by the strategy or detected as straddling a write
    pub missed_reads: u64,
    /// Reads reported successful whose payload was torn anyway
    pub inconsistent: u64,
    /// Consistent reads whose heartbeat went backwards
    pub stale_reads: u64,
}

impl ReadStats {
    pub fn attempts(&self) -> u64 {
        self.made_reads + self.missed_reads + self.inconsistent
    }

    /// `made / (made + missed)`, or 0 before the first attempt
    pub fn success_ratio(&self) -> f64 {
        let denominator = self.made_reads + self.missed_reads;
        if denominator == 0 {
            0.0
        } else {
            self.made_reads as f64 / denominator as f64
        }
    }
}
