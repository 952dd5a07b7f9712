/// Errors that can occur while probing or discovering the cloud.
///
/// # Examples
///
/// ```rust
/// use ospulse_cloud::error::CloudError;
///
/// let err = CloudError::MissingEndpoint("image".to_string());
/// assert!(err.to_string().contains("image"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum CloudError {
    /// Client construction failed (bad credentials or unreachable auth
    /// endpoint). Never cached; propagates to the caller.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// An underlying HTTP transport error from `reqwest`.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A probe target answered with a non-success status.
    #[error("{component} probe returned status {status}")]
    UnexpectedStatus { component: String, status: u16 },

    /// The service catalog advertises no public endpoint for this type.
    #[error("No public endpoint for service type '{0}' in catalog")]
    MissingEndpoint(String),

    /// The catalog carries no region information.
    #[error("Service catalog carries no region")]
    MissingRegion,

    /// A success response arrived without the `content-length` header the
    /// sample's `response_length` field is derived from.
    #[error("Response missing content-length header")]
    MissingContentLength,

    /// JSON serialization or deserialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Persisting a record into the search store failed.
    #[error("Store error: {0}")]
    Store(String),

    /// A control-plane listing call failed.
    #[error("Control plane error: {0}")]
    ControlPlane(String),
}

/// Convenience type alias so callers can write `error::Result<T>`.
pub type Result<T> = std::result::Result<T, CloudError>;
