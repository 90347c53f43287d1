//! Incremental synchronization: traversal, cursor, and the cycle driver.

mod cursor;
mod driver;
mod thread;

pub use cursor::{CursorStore, MemoryCursorStore, SyncCursor};
pub use driver::{poll_loop, run_cycle, sync_once, CycleOutcome, CycleReport};
pub use thread::traverse;
