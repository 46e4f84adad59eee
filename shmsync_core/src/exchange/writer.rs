use crate::consistency::{Outcome, WriteStats, WriterEndpoint};
use crate::core::{Node, NodeInfo};
use crate::error::ShmSyncResult;
use crate::memory::SharedBuffer;

/// Periodic producer of `[k, k, ..., k]` payloads.
///
/// Each tick increments the heartbeat, makes one write attempt and publishes
/// the running tallies to the buffer header. A missed write is counted and
/// left to the next tick.
#[derive(Debug)]
pub struct HeartbeatWriter {
    endpoint: WriterEndpoint,
    local: Vec<i32>,
    heartbeat: i32,
    stats: WriteStats,
}

impl HeartbeatWriter {
    pub fn new(endpoint: WriterEndpoint) -> Self {
        let local = vec![0; endpoint.payload_len()];
        Self {
            endpoint,
            local,
            heartbeat: 0,
            stats: WriteStats::default(),
        }
    }

    /// Claim the writer role on `buffer`
    pub fn attach(buffer: &SharedBuffer) -> ShmSyncResult<Self> {
        Ok(Self::new(WriterEndpoint::attach(buffer)?))
    }

    pub fn stats(&self) -> WriteStats {
        self.stats
    }

    /// Value written in the most recent cycle
    pub fn heartbeat(&self) -> i32 {
        self.heartbeat
    }

    pub fn endpoint(&self) -> &WriterEndpoint {
        &self.endpoint
    }

    /// One write cycle, outside any scheduler
    pub fn write_cycle(&mut self) -> Outcome {
        self.heartbeat = self.heartbeat.wrapping_add(1);
        self.local.fill(self.heartbeat);

        let outcome = self.endpoint.try_write(&self.local);
        match outcome {
            Outcome::Success => self.stats.made_writes += 1,
            Outcome::Missed => self.stats.missed_writes += 1,
        }
        self.endpoint.publish_stats(self.stats);
        outcome
    }
}

impl Node for HeartbeatWriter {
    fn name(&self) -> &'static str {
        "heartbeat_writer"
    }

    fn init(&mut self, ctx: &mut NodeInfo) -> ShmSyncResult<()> {
        ctx.log_info(&format!(
            "writing {} elements with {}",
            self.local.len(),
            self.endpoint.algorithm()
        ));
        Ok(())
    }

    fn tick(&mut self, _ctx: &mut NodeInfo) {
        self.write_cycle();
    }

    fn shutdown(&mut self, ctx: &mut NodeInfo) -> ShmSyncResult<()> {
        ctx.log_info(&format!(
            "writes made/missed: {}/{}",
            self.stats.made_writes, self.stats.missed_writes
        ));
        Ok(())
    }
}
