use super::tsc::cycles_between;
use crate::error::{ShmSyncError, ShmSyncResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Per-period deltas of a sample log and their summary statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JitterAnalysis {
    pub nominal_period_us: f64,
    /// Successive sample differences in microseconds
    pub deltas_us: Vec<f64>,
    pub min_us: f64,
    pub max_us: f64,
    pub mean_us: f64,
    pub stddev_us: f64,
    /// Largest absolute distance of any delta from the nominal period
    pub worst_deviation_us: f64,
}

impl JitterAnalysis {
    pub fn from_samples(
        samples: &[u64],
        secs_per_cycle: f64,
        nominal_period: Duration,
    ) -> ShmSyncResult<Self> {
        if samples.len() < 2 {
            return Err(ShmSyncError::config(
                "at least two samples are needed for one delta",
            ));
        }
        if !(secs_per_cycle > 0.0) {
            return Err(ShmSyncError::config("secs_per_cycle must be positive"));
        }

        let us_per_cycle = secs_per_cycle * 1e6;
        let deltas_us: Vec<f64> = samples
            .windows(2)
            .map(|pair| cycles_between(pair[1], pair[0]) as f64 * us_per_cycle)
            .collect();

        let nominal_period_us = nominal_period.as_secs_f64() * 1e6;
        let count = deltas_us.len() as f64;
        let mean_us = deltas_us.iter().sum::<f64>() / count;
        let variance = deltas_us.iter().map(|d| (d - mean_us).powi(2)).sum::<f64>() / count;

        let mut min_us = f64::INFINITY;
        let mut max_us = f64::NEG_INFINITY;
        let mut worst_deviation_us: f64 = 0.0;
        for &delta in &deltas_us {
            min_us = min_us.min(delta);
            max_us = max_us.max(delta);
            worst_deviation_us = worst_deviation_us.max((delta - nominal_period_us).abs());
        }

        Ok(Self {
            nominal_period_us,
            deltas_us,
            min_us,
            max_us,
            mean_us,
            stddev_us: variance.sqrt(),
            worst_deviation_us,
        })
    }
}

impl fmt::Display for JitterAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} periods of {:.3} us: min {:.3} max {:.3} mean {:.3} stddev {:.3} worst deviation {:.3}",
            self.deltas_us.len(),
            self.nominal_period_us,
            self.min_us,
            self.max_us,
            self.mean_us,
            self.stddev_us,
            self.worst_deviation_us
        )
    }
}
