//! Error types for gantry operations.

/// Alias for `Result<T, gantry::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by ordinary fallible host operations.
///
/// Failures crossing the boundary itself do not use this type; they travel
/// as panic records through the failure bridge.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An adaptation host was already installed for this process.
    #[error("adaptation host already installed")]
    HostInstalled,

    /// A serialized header image was rejected by the host parser.
    #[error("header parse failed: {0}")]
    HeaderParse(String),
}
