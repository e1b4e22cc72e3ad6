//! Failure taxonomy of the sync engine.

use std::time::Duration;
use thiserror::Error;

use super::model::MeetingStatus;

#[derive(Debug, Error)]
pub enum SyncError {
    /// A required field was empty; nothing was sent.
    #[error("{field} is required")]
    Validation { field: &'static str },

    /// Network or HTTP failure talking to the meetings service.
    #[error("remote request failed: {0:#}")]
    Remote(#[from] anyhow::Error),

    /// A remote call did not finish within the configured request timeout.
    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The selection id has no matching meeting in the store yet.
    #[error("meeting {0} is not loaded")]
    NotFoundLocal(String),

    /// Note operations on a meeting that has not completed.
    #[error("meeting {id} is {status}, notes exist only for completed meetings")]
    NotCompleted { id: String, status: MeetingStatus },
}

impl SyncError {
    /// Failures that came from talking to the service rather than local state.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_) | Self::Timeout { .. })
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Run `fut`, mapping an elapsed deadline to [`SyncError::Timeout`] and any
/// client error to [`SyncError::Remote`].
pub(crate) async fn bounded<T, F>(operation: &'static str, after: Duration, fut: F) -> SyncResult<T>
where
    F: std::future::Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result.map_err(SyncError::Remote),
        Err(_) => Err(SyncError::Timeout { operation, after }),
    }
}
