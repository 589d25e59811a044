pub mod config;
pub mod context;
pub mod error;
pub mod fanout;
pub mod progress;
pub mod runner;

pub use config::PipelineConfig;
pub use context::{Outcome, SourceContext};
pub use error::PipelineError;
pub use fanout::{AcquiredItem, FanOut};
pub use progress::{NoopProgress, ProgressEvent, ProgressReporter, RegistryProgress};
pub use runner::Pipeline;
