pub mod capture;
pub mod feed;

pub use capture::{AllowList, Capture, CaptureStats};
pub use feed::{blocking_events, jsonl_events, open_feed};
