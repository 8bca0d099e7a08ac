//! A crate to share wallet cards with nearby devices over NFC.
//!
//! The pieces compose linearly: a [`CardSource`] lists the signed-in user's cards, a
//! [`ShareModal`] holds them while the share screen is open, and an
//! [`ExchangeController`] owns the reader session that writes the chosen card to a tag as
//! a single NDEF text record.

mod trace;

#[cfg(feature = "pcsc")]
pub mod pcsc;

pub mod card;
pub mod config;
pub mod controller;
pub mod error;
pub mod modal;
pub mod ndef;
pub mod reader;
pub mod source;
pub mod type4;

#[cfg(test)]
pub(crate) mod testing;

pub use card::{Card, CardType};
pub use config::Config;
pub use controller::{ExchangeController, Host, ShareOutcome, State};
pub use error::{Error, Result};
pub use modal::ShareModal;
pub use reader::{Reader, Tag};
pub use source::{Auth, CardSource, Document, DocumentStore};
