//! # Approval Form Definitions
//!
//! A form is an ordered field schema an applicant fills in. Field
//! schemas are validated structurally at creation; submitted values
//! are checked against the schema when an application is submitted,
//! not when the draft is created — drafts may be partial.
//!
//! Form definitions are never copied into applications wholesale:
//! the application snapshots the *values* (`form_data`) at creation
//! and the form's display name, so later edits to the form cannot
//! retroactively change an in-flight application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use csign_core::{FolderId, FormId, UserId};

/// The closed set of field types a form may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    #[serde(rename = "textarea")]
    TextArea,
    Number,
    Date,
    Select,
    Checkbox,
    Radio,
    File,
}

impl FieldType {
    /// Whether this field type requires an enumerated option list.
    pub fn needs_options(&self) -> bool {
        matches!(self, Self::Select | Self::Radio)
    }
}

/// A single field in a form's schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub id: Uuid,
    /// Key under which the value appears in `form_data`.
    pub name: String,
    /// Human-readable label.
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    /// Enumerated choices, required for select/radio fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Display order, ascending.
    pub order: u32,
}

/// Errors in form schema definition or submitted-data checking.
#[derive(Error, Debug, PartialEq)]
pub enum FormError {
    /// A field has an empty name.
    #[error("form field at position {index} has an empty name")]
    EmptyFieldName { index: usize },

    /// Two fields share the same name.
    #[error("duplicate form field name: {name}")]
    DuplicateFieldName { name: String },

    /// A select/radio field has no options to choose from.
    #[error("field {name} is a choice field but has no options")]
    MissingOptions { name: String },

    /// Submitted data is missing a required field.
    #[error("missing required field: {name}")]
    MissingRequiredField { name: String },

    /// Submitted data is not a JSON object.
    #[error("form data must be a JSON object")]
    DataNotObject,
}

/// An approval form definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalForm {
    pub id: FormId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<FormField>,
    pub created_by: UserId,
    /// Folder where the approved output document is filed, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_folder_id: Option<FolderId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApprovalForm {
    /// Create a new form, validating the field schema.
    ///
    /// Fields are sorted by `order` so enumeration order is stable
    /// regardless of the order the caller supplied them in.
    pub fn new(
        name: String,
        description: Option<String>,
        mut fields: Vec<FormField>,
        created_by: UserId,
        target_folder_id: Option<FolderId>,
    ) -> Result<Self, FormError> {
        validate_fields(&fields)?;
        fields.sort_by_key(|f| f.order);
        let now = Utc::now();
        Ok(Self {
            id: FormId::new(),
            name,
            description,
            fields,
            created_by,
            target_folder_id,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace the field schema, re-validating.
    pub fn set_fields(&mut self, mut fields: Vec<FormField>) -> Result<(), FormError> {
        validate_fields(&fields)?;
        fields.sort_by_key(|f| f.order);
        self.fields = fields;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Check submitted form data against this schema.
    ///
    /// Every required field must be present and non-null. Values for
    /// unknown keys are permitted and stored verbatim — the schema
    /// constrains what must be there, not what may be there.
    pub fn check_submission(&self, form_data: &serde_json::Value) -> Result<(), FormError> {
        let object = form_data.as_object().ok_or(FormError::DataNotObject)?;
        for field in &self.fields {
            if !field.required {
                continue;
            }
            match object.get(&field.name) {
                Some(v) if !v.is_null() => {}
                _ => {
                    return Err(FormError::MissingRequiredField {
                        name: field.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Structural validation of a field schema.
fn validate_fields(fields: &[FormField]) -> Result<(), FormError> {
    let mut seen = std::collections::HashSet::new();
    for (index, field) in fields.iter().enumerate() {
        if field.name.trim().is_empty() {
            return Err(FormError::EmptyFieldName { index });
        }
        if !seen.insert(field.name.as_str()) {
            return Err(FormError::DuplicateFieldName {
                name: field.name.clone(),
            });
        }
        if field.field_type.needs_options()
            && field.options.as_ref().map_or(true, |o| o.is_empty())
        {
            return Err(FormError::MissingOptions {
                name: field.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, field_type: FieldType, required: bool, order: u32) -> FormField {
        FormField {
            id: Uuid::new_v4(),
            name: name.to_string(),
            label: name.to_string(),
            field_type,
            required,
            options: None,
            order,
        }
    }

    fn expense_form() -> ApprovalForm {
        ApprovalForm::new(
            "Expense Report".to_string(),
            Some("Expense report submissions".to_string()),
            vec![
                field("amount", FieldType::Number, true, 1),
                field("description", FieldType::TextArea, true, 2),
                field("notes", FieldType::Text, false, 3),
            ],
            UserId::new(),
            None,
        )
        .unwrap()
    }

    // ── Schema validation ────────────────────────────────────────────

    #[test]
    fn test_valid_form_is_accepted() {
        let form = expense_form();
        assert_eq!(form.fields.len(), 3);
    }

    #[test]
    fn test_fields_sorted_by_order() {
        let form = ApprovalForm::new(
            "f".to_string(),
            None,
            vec![
                field("second", FieldType::Text, false, 2),
                field("first", FieldType::Text, false, 1),
            ],
            UserId::new(),
            None,
        )
        .unwrap();
        assert_eq!(form.fields[0].name, "first");
        assert_eq!(form.fields[1].name, "second");
    }

    #[test]
    fn test_empty_field_name_rejected() {
        let err = ApprovalForm::new(
            "f".to_string(),
            None,
            vec![field("  ", FieldType::Text, false, 1)],
            UserId::new(),
            None,
        )
        .unwrap_err();
        assert_eq!(err, FormError::EmptyFieldName { index: 0 });
    }

    #[test]
    fn test_duplicate_field_name_rejected() {
        let err = ApprovalForm::new(
            "f".to_string(),
            None,
            vec![
                field("amount", FieldType::Number, true, 1),
                field("amount", FieldType::Text, false, 2),
            ],
            UserId::new(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, FormError::DuplicateFieldName { .. }));
    }

    #[test]
    fn test_select_without_options_rejected() {
        let err = ApprovalForm::new(
            "f".to_string(),
            None,
            vec![field("category", FieldType::Select, true, 1)],
            UserId::new(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, FormError::MissingOptions { .. }));
    }

    #[test]
    fn test_select_with_options_accepted() {
        let mut f = field("category", FieldType::Select, true, 1);
        f.options = Some(vec!["travel".to_string(), "supplies".to_string()]);
        assert!(ApprovalForm::new("f".to_string(), None, vec![f], UserId::new(), None).is_ok());
    }

    // ── Submission checking ──────────────────────────────────────────

    #[test]
    fn test_submission_with_all_required_fields() {
        let form = expense_form();
        let data = serde_json::json!({"amount": 100.0, "description": "Office supplies"});
        assert!(form.check_submission(&data).is_ok());
    }

    #[test]
    fn test_submission_missing_required_field() {
        let form = expense_form();
        let data = serde_json::json!({"amount": 100.0});
        let err = form.check_submission(&data).unwrap_err();
        assert_eq!(
            err,
            FormError::MissingRequiredField {
                name: "description".to_string()
            }
        );
    }

    #[test]
    fn test_submission_null_required_field_rejected() {
        let form = expense_form();
        let data = serde_json::json!({"amount": null, "description": "x"});
        assert!(form.check_submission(&data).is_err());
    }

    #[test]
    fn test_submission_optional_field_may_be_absent() {
        let form = expense_form();
        let data = serde_json::json!({"amount": 1, "description": "x"});
        assert!(form.check_submission(&data).is_ok());
    }

    #[test]
    fn test_submission_unknown_keys_permitted() {
        let form = expense_form();
        let data = serde_json::json!({"amount": 1, "description": "x", "extra": true});
        assert!(form.check_submission(&data).is_ok());
    }

    #[test]
    fn test_submission_non_object_rejected() {
        let form = expense_form();
        assert_eq!(
            form.check_submission(&serde_json::json!([1, 2])).unwrap_err(),
            FormError::DataNotObject
        );
    }

    #[test]
    fn test_field_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&FieldType::TextArea).unwrap(),
            "\"textarea\""
        );
        assert_eq!(serde_json::to_string(&FieldType::File).unwrap(), "\"file\"");
    }
}
