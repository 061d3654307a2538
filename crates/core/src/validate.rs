use serde_json::Value;
use snafu::{ResultExt, Snafu};

/// Validated ticket data, ready for submission. Immutable once constructed;
/// the validator is the only producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketPayload {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ValidationError {
    #[snafu(display("ticket candidate is not valid JSON: {source}"))]
    MalformedPayload {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("ticket candidate violates the schema, offending fields: {}", fields.join(", ")))]
    SchemaViolation {
        stage: &'static str,
        fields: Vec<&'static str>,
    },
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Parses and schema-checks a raw candidate.
///
/// Pure and side-effect free: the extractor re-runs on every streaming
/// update, so this must be safely re-invocable on the same candidate while
/// the surrounding text is still settling.
///
/// Field values are stored as emitted; trimming is applied only for the
/// emptiness check.
pub fn validate_candidate(candidate: &str) -> ValidationResult<TicketPayload> {
    let value: Value = serde_json::from_str(candidate).context(MalformedPayloadSnafu {
        stage: "parse-candidate",
    })?;

    let Some(object) = value.as_object() else {
        // A non-object parse has neither required field.
        return SchemaViolationSnafu {
            stage: "candidate-shape",
            fields: vec!["title", "description"],
        }
        .fail();
    };

    let mut missing = Vec::new();
    let mut field = |name: &'static str| -> Option<String> {
        match object.get(name).and_then(Value::as_str) {
            Some(text) if !text.trim().is_empty() => Some(text.to_string()),
            _ => {
                missing.push(name);
                None
            }
        }
    };

    let title = field("title");
    let description = field("description");

    match (title, description) {
        (Some(title), Some(description)) => Ok(TicketPayload { title, description }),
        _ => SchemaViolationSnafu {
            stage: "required-fields",
            fields: missing,
        }
        .fail(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_candidate_produces_a_payload() {
        let payload = validate_candidate(
            "{\"title\":\"Add dark mode\",\"description\":\"Users want a dark theme.\"}",
        )
        .unwrap();
        assert_eq!(payload.title, "Add dark mode");
        assert_eq!(payload.description, "Users want a dark theme.");
    }

    #[test]
    fn field_values_keep_their_original_text() {
        let payload =
            validate_candidate("{\"title\":\"  padded  \",\"description\":\"## Overview\\nbody\"}")
                .unwrap();
        assert_eq!(payload.title, "  padded  ");
        assert_eq!(payload.description, "## Overview\nbody");
    }

    #[test]
    fn truncated_json_is_malformed() {
        let error = validate_candidate("{\"title\":\"Add dark").unwrap_err();
        assert!(matches!(error, ValidationError::MalformedPayload { .. }));
    }

    #[test]
    fn empty_title_names_the_field() {
        let error = validate_candidate("{\"title\": \"\", \"description\": \"x\"}").unwrap_err();
        match error {
            ValidationError::SchemaViolation { fields, .. } => {
                assert_eq!(fields, vec!["title"]);
            }
            other => panic!("expected schema violation, got {other:?}"),
        }
    }

    #[test]
    fn whitespace_only_and_missing_fields_are_both_named() {
        let error = validate_candidate("{\"title\": \"   \"}").unwrap_err();
        match error {
            ValidationError::SchemaViolation { fields, .. } => {
                assert_eq!(fields, vec!["title", "description"]);
            }
            other => panic!("expected schema violation, got {other:?}"),
        }
    }

    #[test]
    fn non_string_field_counts_as_missing() {
        let error = validate_candidate("{\"title\": 42, \"description\": \"x\"}").unwrap_err();
        match error {
            ValidationError::SchemaViolation { fields, .. } => {
                assert_eq!(fields, vec!["title"]);
            }
            other => panic!("expected schema violation, got {other:?}"),
        }
    }

    #[test]
    fn non_object_json_violates_the_schema() {
        let error = validate_candidate("[\"title\", \"description\"]").unwrap_err();
        assert!(matches!(
            error,
            ValidationError::SchemaViolation { fields, .. } if fields == vec!["title", "description"]
        ));
    }

    #[test]
    fn validation_is_re_invocable_without_consequence() {
        let candidate = "{\"title\":\"x\",\"description\":\"y\"}";
        let first = validate_candidate(candidate).unwrap();
        let second = validate_candidate(candidate).unwrap();
        assert_eq!(first, second);
    }
}
