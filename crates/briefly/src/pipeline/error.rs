use thiserror::Error;

use crate::error::{StageError, StoreError, ValidationError};
use crate::jobs::{FailureKind, JobError};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Stage(#[from] StageError),

    #[error("storage failed: {0}")]
    Store(#[from] StoreError),

    #[error("no playlist item could be acquired")]
    NothingAcquired,

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Validation(_) => FailureKind::Validation,
            PipelineError::Stage(_) | PipelineError::Store(_) | PipelineError::NothingAcquired => {
                FailureKind::Collaborator
            }
            PipelineError::Internal(_) => FailureKind::Internal,
        }
    }

    pub fn to_job_error(&self) -> JobError {
        JobError::new(self.kind(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            PipelineError::from(ValidationError::EmptyLink).kind(),
            FailureKind::Validation
        );
        assert_eq!(
            PipelineError::from(StageError::ExtractionFailed("x".into())).kind(),
            FailureKind::Collaborator
        );
        assert_eq!(
            PipelineError::from(StoreError::InvalidKey("k".into())).kind(),
            FailureKind::Collaborator
        );
        assert_eq!(PipelineError::NothingAcquired.kind(), FailureKind::Collaborator);
        assert_eq!(
            PipelineError::Internal("x".into()).kind(),
            FailureKind::Internal
        );
    }

    #[test]
    fn test_job_error_message_is_the_display() {
        let err = PipelineError::from(StageError::AcquisitionFailed("403".into())).to_job_error();
        assert_eq!(err.kind, FailureKind::Collaborator);
        assert_eq!(err.message, "acquisition failed: 403");
    }
}
