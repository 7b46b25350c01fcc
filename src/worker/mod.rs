mod state;
mod ta;

pub use ta::{TeachingAssistant, Timing, WorkerSummary};
