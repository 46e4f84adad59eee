//! The heartbeat exchange: a periodic writer, a polling reader and the
//! report they produce together.
//!
//! The writer fills the whole payload with one incrementing heartbeat value
//! per cycle; the reader checks every successful snapshot for that shape.

pub mod reader;
pub mod report;
pub mod session;
pub mod writer;

pub use reader::ConsistencyReader;
pub use report::ExchangeReport;
pub use session::{run_reader_role, run_writer_role, ExchangeSession};
pub use writer::HeartbeatWriter;
