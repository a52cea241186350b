use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("Node HTTP error: {0:#}")]
    Transport(#[from] reqwest::Error),
    #[error("Invalid URL: {0}")]
    InvalidUrl(url::Url),
    #[error("Error deserializing response: {0:#}")]
    DeserializeBody(#[from] serde_json::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unexpected HTTP status {status}: {body}")]
    Status { status: StatusCode, body: String },
}

impl NodeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, NodeError::NotFound(_))
    }

    /// Whether a retry can be expected to help.
    pub fn is_transient(&self) -> bool {
        match self {
            NodeError::Transport(_) => true,
            NodeError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}
