use crate::consistency::{is_consistent, Outcome, ReadStats, ReaderEndpoint, WriteStats};
use crate::core::{Node, NodeInfo};
use crate::error::ShmSyncResult;
use crate::memory::SharedBuffer;

/// Polling consumer that audits every snapshot it obtains.
///
/// A successful read whose elements differ counts as `inconsistent`, never
/// as made. A consistent read whose heartbeat is older than the last one
/// seen counts as made and also as `stale`.
#[derive(Debug)]
pub struct ConsistencyReader {
    endpoint: ReaderEndpoint,
    stats: ReadStats,
    last_heartbeat: Option<i32>,
}

impl ConsistencyReader {
    pub fn new(endpoint: ReaderEndpoint) -> Self {
        Self {
            endpoint,
            stats: ReadStats::default(),
            last_heartbeat: None,
        }
    }

    /// Claim the reader role on `buffer`
    pub fn attach(buffer: &SharedBuffer) -> ShmSyncResult<Self> {
        Ok(Self::new(ReaderEndpoint::attach(buffer)?))
    }

    pub fn stats(&self) -> ReadStats {
        self.stats
    }

    /// Heartbeat of the last consistent snapshot
    pub fn last_heartbeat(&self) -> Option<i32> {
        self.last_heartbeat
    }

    pub fn writer_stats(&self) -> WriteStats {
        self.endpoint.writer_stats()
    }

    pub fn endpoint(&self) -> &ReaderEndpoint {
        &self.endpoint
    }

    /// One read attempt plus its audit. Returns the strategy's outcome.
    pub fn read_cycle(&mut self, ctx: Option<&mut NodeInfo>) -> Outcome {
        let outcome = self.endpoint.try_read();
        if outcome == Outcome::Missed {
            self.stats.missed_reads += 1;
            return outcome;
        }

        let snapshot = self.endpoint.snapshot();
        if !is_consistent(snapshot) {
            self.stats.inconsistent += 1;
            if self.stats.inconsistent == 1 {
                let message = format!(
                    "torn snapshot reported as a successful {} read (first element {}, last {})",
                    self.endpoint.algorithm(),
                    snapshot.first().copied().unwrap_or_default(),
                    snapshot.last().copied().unwrap_or_default()
                );
                match ctx {
                    Some(ctx) => ctx.log_warning(&message),
                    None => log::warn!("{}", message),
                }
            }
            return outcome;
        }

        self.stats.made_reads += 1;
        let heartbeat = snapshot[0];
        if let Some(last) = self.last_heartbeat {
            if heartbeat.wrapping_sub(last) < 0 {
                self.stats.stale_reads += 1;
            }
        }
        self.last_heartbeat = Some(heartbeat);
        outcome
    }
}

impl Node for ConsistencyReader {
    fn name(&self) -> &'static str {
        "consistency_reader"
    }

    fn tick(&mut self, ctx: &mut NodeInfo) {
        self.read_cycle(Some(ctx));
    }

    fn shutdown(&mut self, ctx: &mut NodeInfo) -> ShmSyncResult<()> {
        ctx.log_info(&format!(
            "reads made/missed/inconsistent: {}/{}/{}",
            self.stats.made_reads, self.stats.missed_reads, self.stats.inconsistent
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consistency::{Algorithm, WriterEndpoint};

    #[test]
    fn test_counts_made_and_missed() {
        let buffer = SharedBuffer::allocate(Algorithm::TestAndSet, 4).unwrap();
        let mut reader = ConsistencyReader::attach(&buffer).unwrap();

        assert_eq!(reader.read_cycle(None), Outcome::Success);
        let guard = buffer.header().tas().try_acquire().unwrap();
        assert_eq!(reader.read_cycle(None), Outcome::Missed);
        drop(guard);

        let stats = reader.stats();
        assert_eq!((stats.made_reads, stats.missed_reads, stats.inconsistent), (1, 1, 0));
        assert_eq!(reader.last_heartbeat(), Some(0));
    }

    #[test]
    fn test_torn_payload_counts_inconsistent() {
        let buffer = SharedBuffer::allocate(Algorithm::TestAndSet, 4).unwrap();
        let mut writer = WriterEndpoint::attach(&buffer).unwrap();
        let mut reader = ConsistencyReader::attach(&buffer).unwrap();

        // TAS copies whatever is there, so a mixed payload goes straight through
        assert_eq!(writer.try_write(&[1, 1, 2, 2]), Outcome::Success);
        assert_eq!(reader.read_cycle(None), Outcome::Success);

        let stats = reader.stats();
        assert_eq!(stats.inconsistent, 1);
        assert_eq!(stats.made_reads, 0);
        assert_eq!(reader.last_heartbeat(), None);
    }

    #[test]
    fn test_backwards_heartbeat_counts_stale() {
        let buffer = SharedBuffer::allocate(Algorithm::HeadTail, 2).unwrap();
        let mut writer = WriterEndpoint::attach(&buffer).unwrap();
        let mut reader = ConsistencyReader::attach(&buffer).unwrap();

        writer.try_write(&[5, 5]);
        reader.read_cycle(None);
        writer.try_write(&[4, 4]);
        reader.read_cycle(None);

        let stats = reader.stats();
        assert_eq!(stats.made_reads, 2);
        assert_eq!(stats.stale_reads, 1);
    }

    #[test]
    fn test_heartbeat_wraparound_is_not_stale() {
        let buffer = SharedBuffer::allocate(Algorithm::HeadTail, 2).unwrap();
        let mut writer = WriterEndpoint::attach(&buffer).unwrap();
        let mut reader = ConsistencyReader::attach(&buffer).unwrap();

        writer.try_write(&[i32::MAX, i32::MAX]);
        reader.read_cycle(None);
        writer.try_write(&[i32::MIN, i32::MIN]);
        reader.read_cycle(None);
        assert_eq!(reader.stats().stale_reads, 0);
    }
}
