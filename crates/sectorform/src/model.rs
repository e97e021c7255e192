//! Core record types for sectorform.
//!
//! Sectors and choices live in the document store as untyped field maps; this
//! module gives them named, typed fields and handles the conversion in both
//! directions.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::{Document, Fields};

/// Collection holding the sector taxonomy.
pub const SECTORS_COLLECTION: &str = "sectors";

/// Collection holding submitted choices.
pub const CHOICES_COLLECTION: &str = "choices";

/// Field name of the submitting user's display name.
pub const USER: &str = "user";

/// Field name of the selected sector identifiers.
pub const CHOSEN_IDS: &str = "chosenIds";

/// Field name of the terms-agreement flag.
pub const AGREE_TO_TERMS: &str = "agreeToTerms";

/// A node in the externally owned sector taxonomy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sector {
    /// Store-assigned identifier.
    pub id: String,
    /// Display label.
    pub name: String,
    /// Delimited hierarchy path, e.g. `1-19-342`.
    pub nesting: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct SectorBody {
    name: String,
    nesting: String,
}

impl Sector {
    /// Create a sector with the given identifier, name and nesting path.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, nesting: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nesting: nesting.into(),
        }
    }

    /// Decode a sector from a stored document.
    ///
    /// Missing `name` or `nesting` fields decode as empty strings.
    ///
    /// # Errors
    ///
    /// Returns an error if a field is present with the wrong type.
    pub fn from_document(doc: Document) -> Result<Self> {
        let body: SectorBody = serde_json::from_value(serde_json::Value::Object(doc.fields))
            .map_err(|e| Error::document_decode(SECTORS_COLLECTION, &doc.id, e.to_string()))?;
        Ok(Self {
            id: doc.id,
            name: body.name,
            nesting: body.nesting,
        })
    }

    /// The stored fields of this sector (everything but the identifier).
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_fields(&self) -> Result<Fields> {
        to_fields(&SectorBody {
            name: self.name.clone(),
            nesting: self.nesting.clone(),
        })
    }
}

/// A persisted, validated choice record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    /// Store-assigned identifier; `None` until first saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name of the submitting user.
    pub user: String,
    /// Selected sector identifiers, in selection order.
    pub chosen_ids: Vec<String>,
    /// Whether the user agreed to the terms.
    pub agree_to_terms: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChoiceBody {
    user: String,
    chosen_ids: Vec<String>,
    agree_to_terms: bool,
}

impl Choice {
    /// Decode a choice from a stored document.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the three choice fields is missing or has
    /// the wrong type.
    pub fn from_document(doc: Document) -> Result<Self> {
        let body: ChoiceBody = serde_json::from_value(serde_json::Value::Object(doc.fields))
            .map_err(|e| Error::document_decode(CHOICES_COLLECTION, &doc.id, e.to_string()))?;
        Ok(Self {
            id: Some(doc.id),
            user: body.user,
            chosen_ids: body.chosen_ids,
            agree_to_terms: body.agree_to_terms,
        })
    }

    /// The stored fields of this choice (everything but the identifier).
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_fields(&self) -> Result<Fields> {
        to_fields(&ChoiceBody {
            user: self.user.clone(),
            chosen_ids: self.chosen_ids.clone(),
            agree_to_terms: self.agree_to_terms,
        })
    }

    /// Whether this choice has been persisted before.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

/// The unvalidated contents of the choice form.
///
/// A draft without an `id` is a new record; a draft with one edits an
/// existing record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChoiceDraft {
    /// Identifier of the record being edited, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Entered display name.
    pub user: String,
    /// Selected sector identifiers.
    pub chosen_ids: Vec<String>,
    /// State of the terms checkbox.
    pub agree_to_terms: bool,
}

impl ChoiceDraft {
    /// Whether this draft creates a new record.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }
}

impl From<&Choice> for ChoiceDraft {
    fn from(choice: &Choice) -> Self {
        Self {
            id: choice.id.clone(),
            user: choice.user.clone(),
            chosen_ids: choice.chosen_ids.clone(),
            agree_to_terms: choice.agree_to_terms,
        }
    }
}

fn to_fields<T: Serialize>(body: &T) -> Result<Fields> {
    match serde_json::to_value(body)? {
        serde_json::Value::Object(fields) => Ok(fields),
        other => Err(Error::internal(format!(
            "record serialized to non-object value: {other}"
        ))),
    }
}
