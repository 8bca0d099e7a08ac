//! Tunables of the share screen.

use std::time::Duration;

/// Placeholder in [`Config::collection`] replaced by the signed-in user's id.
pub const UID_PLACEHOLDER: &str = "{uid}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// How long to wait for a tag after the session started.
    pub peer_timeout: Duration,

    /// Delay between two tag detection attempts.
    pub poll_interval: Duration,

    /// IANA language code stored in the NDEF text record.
    pub language: String,

    /// Path of the card collection in the document store.
    pub collection: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            peer_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(250),
            language: "en".to_owned(),
            collection: format!("users/{}/cards", UID_PLACEHOLDER),
        }
    }
}

impl Config {
    /// Resolves the collection path for the user.
    pub fn collection_for(&self, uid: &str) -> String {
        self.collection.replace(UID_PLACEHOLDER, uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_for() {
        assert_eq!("users/alice/cards", Config::default().collection_for("alice"));
    }
}
