//! Declarative form validation.
//!
//! A [`Schema`] maps field names to rules. Validation runs over the field map
//! of a candidate record, reports the first failing rule of every field, and
//! never touches the store.

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::{Choice, ChoiceDraft, AGREE_TO_TERMS, CHOSEN_IDS, USER};
use crate::store::Fields;

/// A single check applied to one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// The field must be a non-empty string.
    Required {
        /// Message reported on failure.
        message: String,
    },
    /// The field must be an array with at least `min` elements.
    MinItems {
        /// Minimum number of elements.
        min: usize,
        /// Message reported on failure.
        message: String,
    },
    /// The field must equal `expected` exactly.
    Equals {
        /// Required value.
        expected: Value,
        /// Message reported on failure.
        message: String,
    },
}

impl Rule {
    /// Non-empty string rule.
    #[must_use]
    pub fn required(message: impl Into<String>) -> Self {
        Self::Required {
            message: message.into(),
        }
    }

    /// Minimum array length rule.
    #[must_use]
    pub fn min_items(min: usize, message: impl Into<String>) -> Self {
        Self::MinItems {
            min,
            message: message.into(),
        }
    }

    /// Exact value rule.
    #[must_use]
    pub fn equals(expected: impl Into<Value>, message: impl Into<String>) -> Self {
        Self::Equals {
            expected: expected.into(),
            message: message.into(),
        }
    }

    /// Check a field value; `None` means the field is absent.
    fn check(&self, value: Option<&Value>) -> std::result::Result<(), &str> {
        match self {
            Self::Required { message } => match value {
                Some(Value::String(s)) if !s.is_empty() => Ok(()),
                _ => Err(message.as_str()),
            },
            Self::MinItems { min, message } => match value {
                Some(Value::Array(items)) if items.len() >= *min => Ok(()),
                _ => Err(message.as_str()),
            },
            Self::Equals { expected, message } => {
                if value == Some(expected) {
                    Ok(())
                } else {
                    Err(message.as_str())
                }
            }
        }
    }
}

/// Field-scoped validation failures, in schema order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

/// One failing field and its message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field name.
    pub field: String,
    /// Human-readable message.
    pub message: String,
}

impl ValidationErrors {
    /// Record an error for a field, replacing any earlier one.
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        let field = field.into();
        let message = message.into();
        match self.errors.iter_mut().find(|e| e.field == field) {
            Some(existing) => existing.message = message,
            None => self.errors.push(FieldError { field, message }),
        }
    }

    /// The message for a field, if it failed.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// All failing fields, in schema order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// Number of failing fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether no field failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}

/// Field-name-to-rules mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<(String, Vec<Rule>)>,
}

impl Schema {
    /// Create an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule to a field. Rules of a field run in the order added.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, rule: Rule) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, rules)) => rules.push(rule),
            None => self.fields.push((name, vec![rule])),
        }
        self
    }

    /// The schema of the choice form.
    #[must_use]
    pub fn choice() -> Self {
        Self::new()
            .field(USER, Rule::required("Username is required"))
            .field(
                CHOSEN_IDS,
                Rule::min_items(1, "Please choose one of the sectors"),
            )
            .field(
                AGREE_TO_TERMS,
                Rule::equals(true, "You must agree to our terms"),
            )
    }

    /// Validate a field map, reporting the first failing rule per field.
    ///
    /// # Errors
    ///
    /// Returns the collected field errors if any rule fails.
    pub fn validate(&self, fields: &Fields) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        for (name, rules) in &self.fields {
            let value = fields.get(name);
            if let Some(message) = rules.iter().find_map(|rule| rule.check(value).err()) {
                errors.insert(name.clone(), message);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Validates choice drafts into persistable choices.
#[derive(Debug, Clone)]
pub struct Validator {
    schema: Schema,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(Schema::choice())
    }
}

impl Validator {
    /// Create a validator with a custom schema.
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    /// Validate a draft and turn it into a [`Choice`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] with field-scoped messages if the draft
    /// is rejected.
    pub fn validate(&self, draft: &ChoiceDraft) -> Result<Choice> {
        let fields = match serde_json::to_value(draft)? {
            Value::Object(fields) => fields,
            _ => return Err(Error::internal("choice draft did not serialize to an object")),
        };
        self.schema.validate(&fields)?;

        Ok(Choice {
            id: draft.id.clone(),
            user: draft.user.clone(),
            chosen_ids: draft.chosen_ids.clone(),
            agree_to_terms: draft.agree_to_terms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft(user: &str, chosen: &[&str], agree: bool) -> ChoiceDraft {
        ChoiceDraft {
            id: None,
            user: user.to_string(),
            chosen_ids: chosen.iter().map(ToString::to_string).collect(),
            agree_to_terms: agree,
        }
    }

    fn field_errors(result: Result<Choice>) -> ValidationErrors {
        match result {
            Err(Error::Validation(errors)) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_draft() {
        let choice = Validator::default()
            .validate(&draft("Acme", &["19", "342"], true))
            .unwrap();

        assert_eq!(choice.user, "Acme");
        assert_eq!(choice.chosen_ids, vec!["19", "342"]);
        assert!(choice.agree_to_terms);
        assert!(choice.id.is_none());
    }

    #[test]
    fn test_valid_draft_keeps_id() {
        let mut d = draft("Acme", &["6"], true);
        d.id = Some("abc123".to_string());

        let choice = Validator::default().validate(&d).unwrap();
        assert_eq!(choice.id.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_empty_user_rejected() {
        let errors = field_errors(Validator::default().validate(&draft("", &["19"], true)));

        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get(USER), Some("Username is required"));
    }

    #[test]
    fn test_empty_chosen_ids_rejected() {
        let errors = field_errors(Validator::default().validate(&draft("Acme", &[], true)));

        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get(CHOSEN_IDS), Some("Please choose one of the sectors"));
    }

    #[test]
    fn test_terms_not_agreed_rejected() {
        let errors = field_errors(Validator::default().validate(&draft("Acme", &["19"], false)));

        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get(AGREE_TO_TERMS), Some("You must agree to our terms"));
    }

    #[test]
    fn test_all_failures_reported_in_schema_order() {
        let errors = field_errors(Validator::default().validate(&ChoiceDraft::default()));

        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec![USER, CHOSEN_IDS, AGREE_TO_TERMS]);
    }

    #[test]
    fn test_schema_missing_field_fails_each_rule() {
        let schema = Schema::choice();
        let errors = schema.validate(&Fields::new()).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_equals_rule_is_exact() {
        let schema = Schema::new().field("flag", Rule::equals(true, "must be true"));
        let mut fields = Fields::new();
        fields.insert("flag".to_string(), json!("true"));

        let errors = schema.validate(&fields).unwrap_err();
        assert_eq!(errors.get("flag"), Some("must be true"));
    }

    #[test]
    fn test_first_failing_rule_wins() {
        let schema = Schema::new()
            .field("tags", Rule::min_items(1, "at least one"))
            .field("tags", Rule::min_items(3, "at least three"));

        let mut fields = Fields::new();
        fields.insert("tags".to_string(), json!([]));
        assert_eq!(
            schema.validate(&fields).unwrap_err().get("tags"),
            Some("at least one")
        );

        fields.insert("tags".to_string(), json!(["a"]));
        assert_eq!(
            schema.validate(&fields).unwrap_err().get("tags"),
            Some("at least three")
        );
    }

    #[test]
    fn test_validation_errors_display() {
        let mut errors = ValidationErrors::default();
        errors.insert(USER, "Username is required");
        errors.insert(CHOSEN_IDS, "Please choose one of the sectors");

        assert_eq!(
            errors.to_string(),
            "user: Username is required; chosenIds: Please choose one of the sectors"
        );
    }

    #[test]
    fn test_validation_errors_insert_replaces() {
        let mut errors = ValidationErrors::default();
        errors.insert(USER, "first");
        errors.insert(USER, "second");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get(USER), Some("second"));
    }

    #[test]
    fn test_validation_errors_serialize() {
        let mut errors = ValidationErrors::default();
        errors.insert(USER, "Username is required");
        let json = serde_json::to_string(&errors).unwrap();
        assert!(json.contains("\"field\":\"user\""));
    }
}
