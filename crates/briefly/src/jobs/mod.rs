pub mod progress;
pub mod registry;
pub mod status;

pub use progress::{JobProgressBroadcaster, JobProgressEvent};
pub use registry::{InMemoryJobRegistry, JobRegistry};
pub use status::{
    FailureKind, JobError, JobInput, JobPhase, JobResult, JobStatus, JobUpdate, JobView,
    PhaseEntry, SummaryView,
};
