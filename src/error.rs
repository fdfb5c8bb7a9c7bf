#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    /// The adapter needs at least one classifier result with a confidence in [0, 1].
    #[error("invalid classification input: {0}")]
    InvalidInput(String),
}

/// Failure to hand a message to the email provider.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("email request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("email provider rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("email transport not configured: {0}")]
    NotConfigured(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("transport failure for notification {id}: {source}")]
    TransportFailure {
        id: uuid::Uuid,
        #[source]
        source: TransportError,
    },

    #[error("notification store error: {0}")]
    Store(#[from] anyhow::Error),
}
