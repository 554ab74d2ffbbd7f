//! Error taxonomy for the ingestion pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    /// Upstream transport, HTTP status or error-payload failure.
    #[error("market data source unavailable ({context}): {message}")]
    SourceUnavailable { context: String, message: String },

    /// Snapshot is missing its coin info, aggregate data or exchange list.
    #[error("unprocessable snapshot for '{0}'")]
    UnprocessableSnapshot(String),

    #[error("coin store failure: {0}")]
    StoreFailure(String),

    /// Store failure that may succeed on a later attempt (connection, pool
    /// exhaustion, serialization conflict).
    #[error("transient coin store failure: {0}")]
    TransientStoreFailure(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl IngestError {
    pub fn source_unavailable(context: impl Into<String>, message: impl Into<String>) -> Self {
        IngestError::SourceUnavailable {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, IngestError::SourceUnavailable { .. })
    }

    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            IngestError::StoreFailure(_) | IngestError::TransientStoreFailure(_)
        )
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, IngestError::TransientStoreFailure(_))
    }
}

impl From<sqlx::Error> for IngestError {
    fn from(err: sqlx::Error) -> Self {
        if is_transient_sqlx_error(&err) {
            IngestError::TransientStoreFailure(err.to_string())
        } else {
            IngestError::StoreFailure(err.to_string())
        }
    }
}

fn is_transient_sqlx_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::WorkerCrashed => true,
        // serialization_failure, deadlock_detected, too_many_connections,
        // admin_shutdown, cannot_connect_now
        sqlx::Error::Database(db_err) => matches!(
            db_err.code().as_deref(),
            Some("40001" | "40P01" | "53300" | "57P01" | "57P03")
        ),
        _ => false,
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
