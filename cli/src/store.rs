//! A JSON file standing in for the remote document store.
//!
//! The file maps collection paths to documents keyed by their id:
//!
//! ```json
//! {
//!   "users/alice/cards": {
//!     "1": { "firstName": "Ann", "lastName": "Lee", "type": "Work", "phone": "555-1" }
//!   }
//! }
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use cardshare::source::{BoxError, Document};
use cardshare::{Auth, DocumentStore};
use serde_json::{Map, Value};
use tracing::debug;

/// The user given on the command line.
pub struct StaticAuth(pub Option<String>);

impl Auth for StaticAuth {
    fn current_user(&self) -> Option<String> {
        self.0.clone()
    }
}

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn list_documents(&self, path: &str) -> Result<Vec<Document>, BoxError> {
        debug!("Reading {} from {}", path, self.path.display());

        let content = tokio::fs::read_to_string(&self.path).await?;
        let root: Map<String, Value> = serde_json::from_str(&content)?;

        let documents = match root.get(path) {
            Some(Value::Object(documents)) => documents,
            Some(_) => return Err(format!("{} is not a collection", path).into()),
            None => return Ok(Vec::new()),
        };

        Ok(documents
            .iter()
            .map(|(id, fields)| Document {
                id: id.clone(),
                fields: fields.as_object().cloned().unwrap_or_default(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_store(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_list_documents() {
        let file = write_store(
            r#"{
                "users/alice/cards": {
                    "1": { "firstName": "Ann", "lastName": "Lee", "type": "Work", "phone": "555-1" }
                },
                "users/bob/cards": {}
            }"#,
        );
        let store = FileStore::new(file.path());

        let documents = store.list_documents("users/alice/cards").await.unwrap();
        assert_eq!(1, documents.len());
        assert_eq!("1", documents[0].id);
        assert_eq!(
            "Ann",
            documents.into_iter().next().unwrap().into_card().unwrap().first_name,
        );

        assert!(store.list_documents("users/bob/cards").await.unwrap().is_empty());
        assert!(store.list_documents("users/carol/cards").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_malformed_store() {
        let file = write_store(r#"{ "users/alice/cards": [] }"#);
        let store = FileStore::new(file.path());
        assert!(store.list_documents("users/alice/cards").await.is_err());

        let store = FileStore::new(file.path().with_extension("missing"));
        assert!(store.list_documents("users/alice/cards").await.is_err());
    }
}
