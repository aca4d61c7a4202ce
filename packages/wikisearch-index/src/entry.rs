//! Pending index operations
//!
//! An `IndexEntry` is the unit of work flowing from the document repository
//! through the update queue into the store. Entries are immutable once
//! created and consumed exactly once by the updater worker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordered field-name -> value mapping for one document.
///
/// Producer insertion order is preserved; field names are matched against the
/// wiki page schema when the entry is applied, and unknown names are logged
/// and skipped rather than failing the batch.
pub type DocumentFields = Vec<(String, FieldValue)>;

/// Typed field value registry for indexed fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Tokenized full-text content (title, page body).
    Text(String),
    /// Raw term, matched exactly (wiki name, language code, author).
    Keyword(String),
    /// Point-in-time value (page modification date).
    Date(DateTime<Utc>),
}

/// A single pending index operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum IndexEntry {
    /// Replace-by-id: any existing document with the same id is deleted
    /// before the new one is added.
    Upsert {
        doc_id: String,
        fields: DocumentFields,
    },
    /// Remove the document with this id; a no-op if the id is absent.
    Delete { doc_id: String },
}

impl IndexEntry {
    pub fn upsert(doc_id: impl Into<String>, fields: DocumentFields) -> Self {
        IndexEntry::Upsert {
            doc_id: doc_id.into(),
            fields,
        }
    }

    pub fn delete(doc_id: impl Into<String>) -> Self {
        IndexEntry::Delete {
            doc_id: doc_id.into(),
        }
    }

    /// Stable, globally-unique document id (e.g. `"wiki:Space.Page.en"`).
    pub fn doc_id(&self) -> &str {
        match self {
            IndexEntry::Upsert { doc_id, .. } | IndexEntry::Delete { doc_id } => doc_id,
        }
    }

    pub fn is_upsert(&self) -> bool {
        matches!(self, IndexEntry::Upsert { .. })
    }
}
