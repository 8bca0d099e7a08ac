//! Listing the signed-in user's cards from the remote document store.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::trace::{debug, warn};
use crate::{Card, Config, Error, Result};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Accessor of the authenticated identity.
pub trait Auth: Send + Sync {
    /// Returns the id of the signed-in user, if any.
    fn current_user(&self) -> Option<String>;
}

/// A record of a document collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    /// Deserializes the fields into a card, falling back to the document id.
    pub fn into_card(self) -> serde_json::Result<Card> {
        let Self { id, mut fields } = self;
        fields.entry("id").or_insert(Value::String(id));

        serde_json::from_value(Value::Object(fields))
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Lists every document of the collection at `path`.
    async fn list_documents(&self, path: &str) -> std::result::Result<Vec<Document>, BoxError>;
}

/// The user's cards, read through the document store.
pub struct CardSource<A, S>
where
    A: Auth,
    S: DocumentStore,
{
    auth: A,
    store: S,
    config: Config,
}

impl<A, S> CardSource<A, S>
where
    A: Auth,
    S: DocumentStore,
{
    /// Creates a source reading the collection configured for the signed-in user.
    pub fn new(auth: A, store: S, config: &Config) -> Self {
        Self {
            auth,
            store,
            config: config.clone(),
        }
    }

    /// The underlying document store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetches the cards of the signed-in user, in no particular order.
    /// Documents that are not cards are skipped.
    pub async fn fetch(&self) -> Result<Vec<Card>> {
        let uid = self
            .auth
            .current_user()
            .ok_or_else(|| Error::SourceUnavailable("no user is signed in".to_owned()))?;

        let path = self.config.collection_for(&uid);
        debug!("Listing cards in {}", path);

        let documents = self
            .store
            .list_documents(&path)
            .await
            .map_err(|e| Error::SourceUnavailable(e.to_string()))?;

        Ok(documents
            .into_iter()
            .filter_map(|document| {
                let id = document.id.clone();
                match document.into_card() {
                    Ok(card) => Some(card),
                    Err(e) => {
                        warn!("Skipping document {}: {}", id, e);
                        None
                    }
                }
            })
            .collect())
    }
}
