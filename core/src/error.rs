//! Errors surfaced to the user while sharing a card.
//!
//! Every variant is non-fatal: the controller is back in [`crate::State::Idle`] (or still
//! listening, for [`Error::PeerNotDetected`]) and the user may try again.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Your cards are unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Could not start the NFC session: {0}")]
    SessionStartFailed(String),

    #[error("No NFC tag was detected in time")]
    SessionTimeout,

    #[error("No NFC session is active")]
    SessionInactive,

    #[error("Hold your phone near a tag before sharing")]
    PeerNotDetected,

    #[error("Error occurred while waiting for a tag: {0}")]
    PeerDetectionFailed(String),

    #[error("Choose a card to share")]
    SelectionRequired,

    #[error("Could not encode the card: {0}")]
    EncodeFailed(String),

    #[error("Could not write the card to the tag: {0}")]
    WriteFailed(String),

    #[error("Could not read from the tag: {0}")]
    ReadFailed(String),

    #[error("The tag does not carry a card: {0}")]
    DecodeFailed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
