pub mod caseid;
pub mod classify;
pub mod cluster;
pub mod config;
pub mod encoding;
pub mod error;
pub mod extract;
pub mod fingerprint;
pub mod materialize;
pub mod pipeline;
pub mod progress;
pub mod status;

pub use config::AppConfig;
pub use error::Error;
pub use pipeline::{Analysis, CancelToken, Pipeline, RunOutcome, RunSummary};
pub use progress::{ProgressReporter, SilentReporter};
pub use status::{Stage, StatusBoard};
