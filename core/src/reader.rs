//! The radio hardware boundary.

use std::fmt::{Display, Formatter};

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("NFC is not available on this device: {0}")]
    NotSupported(String),

    #[error("Access to NFC was denied")]
    PermissionDenied,

    #[error("No NFC session is active")]
    NotStarted,

    #[error("No tag is connected")]
    NoTag,

    #[error("Error occurred while communicating with the tag: {0}")]
    Tag(#[from] crate::type4::Error),

    #[error("{0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A tag or peer device detected during a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: Vec<u8>,
}

impl Tag {
    /// Creates a tag from its identifier. An empty identifier is rendered as unknown.
    pub fn new(id: Vec<u8>) -> Self {
        Self { id }
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.id.is_empty() {
            true => f.write_str("(unknown)"),
            _ => f.write_str(&hex::encode_upper(&self.id)),
        }
    }
}

/// A short-range radio reader.
///
/// Implementations hold at most one session; [`crate::ExchangeController`] is the only
/// caller and never starts a session while another is outstanding.
#[async_trait]
pub trait Reader: Send + Sync {
    /// Acquires the hardware and starts listening for tags.
    async fn start(&self) -> Result<()>;

    /// Releases the hardware. Must succeed when no session is active.
    async fn cancel_active_request(&self) -> Result<()>;

    /// Checks once whether a tag is in range.
    async fn detect_peer(&self) -> Result<Option<Tag>>;

    /// Writes the NDEF message to the detected tag.
    async fn transmit(&self, message: &[u8]) -> Result<()>;

    /// Reads the NDEF message stored in the detected tag.
    async fn read(&self) -> Result<Vec<u8>> {
        Err(Error::NotSupported("reading tags".to_owned()))
    }
}
