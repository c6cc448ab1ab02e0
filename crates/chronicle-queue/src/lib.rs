//! Durable update queue and the replay loop that drains it into the mirror.
//!
//! - UpdateQueue: ordered list of pending updates, persisted to a JSON file
//!   before every mutation is acknowledged
//! - Replayer: periodic drain cycle applying each update through the
//!   dispatcher, removing exactly the entries that applied

mod error;
mod queue;
mod replay;

pub use error::{QueueError, QueueResult};
pub use queue::{QUEUE_FILE_VERSION, QueuedUpdate, UpdateQueue};
pub use replay::{DrainReport, ReplayConfig, Replayer};
