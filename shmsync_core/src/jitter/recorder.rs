use super::sample_log::JitterLog;
use super::tsc::read_cycles;
use crate::core::{Node, NodeInfo};

/// Periodic node appending one counter reading per tick
#[derive(Debug)]
pub struct JitterRecorder {
    log: JitterLog,
    reported_full: bool,
}

impl JitterRecorder {
    pub fn new(log: JitterLog) -> Self {
        Self {
            log,
            reported_full: false,
        }
    }

    pub fn log(&self) -> &JitterLog {
        &self.log
    }
}

impl Node for JitterRecorder {
    fn name(&self) -> &'static str {
        "jitter_recorder"
    }

    fn tick(&mut self, ctx: &mut NodeInfo) {
        if !self.log.push(read_cycles()) && !self.reported_full {
            self.reported_full = true;
            ctx.log_debug("log full, recording inhibited");
        }
    }
}
