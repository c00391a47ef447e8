/// Shared error type used across all tempvoice crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// An open session already exists for the channel.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A platform call (create / delete / move / resolve) failed.
    #[error("external resource: {0}")]
    ExternalResource(String),

    /// The session store could not complete a read or write.
    #[error("store: {0}")]
    Store(String),

    #[error("only the channel owner can do that")]
    NotOwner,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Expected races (missing session, missing channel) that must never be
    /// reported to the event-delivery layer as failures.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
