use std::time::Duration;

/// Errors that can be surfaced by a [`FetchCache`](crate::FetchCache) lookup.
///
/// Apart from [`InvalidKey`](FetchError::InvalidKey), which is rejected before
/// any fetch is attempted, these originate in the underlying
/// [`FetchDriver`](crate::FetchDriver) and are passed through unmodified to
/// every caller that was awaiting the fetch.
///
/// The type is `Clone` because a single fetch outcome is fanned out to all
/// concurrent callers for its key.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The key was rejected by the driver before a fetch was attempted.
    #[error("invalid key: {0}")]
    InvalidKey(String),
    /// The resource could not be fetched due to a transport problem,
    /// like connection loss, DNS resolution, or a server error response.
    ///
    /// The attached string contains the underlying error message.
    #[error("download failed: {0}")]
    Download(String),
    /// The resource could not be fetched within the configured deadline.
    #[error("download timed out")]
    Timeout(Duration),
    /// The resource was fetched successfully, but its payload could not be
    /// decoded.
    #[error("malformed payload: {0}")]
    Malformed(String),
    /// The in-flight fetch was dropped without producing a result.
    ///
    /// This is an internal condition that callers should not normally observe.
    #[error("fetch canceled")]
    Canceled,
}
