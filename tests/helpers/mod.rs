pub mod flaky_store;

pub use flaky_store::{FailureRule, FlakyStore, RecordingProgressSink};
