use crate::error::{FolioDbError, Result};
use crate::schema::{value_type_name, TableStructure};
use serde_json::{Map, Value};

/// Insert requires every declared field; update checks only supplied fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Insert,
    Update,
}

/// Check a record payload against the table's declared structure.
///
/// Matching is purely by primitive type tag: no coercion, so a numeric
/// string never satisfies a `number` declaration. Errors are raised before
/// any file is touched.
pub fn validate(
    structure: &TableStructure,
    data: &Map<String, Value>,
    mode: ValidationMode,
) -> Result<()> {
    if mode == ValidationMode::Insert {
        for (field, _) in structure.fields() {
            if !data.contains_key(field) {
                return Err(FolioDbError::MissingField(field.clone()));
            }
        }
    }

    for (key, value) in data {
        let accepted = structure
            .accepted_types(key)
            .ok_or_else(|| FolioDbError::UnknownField(key.clone()))?;

        let actual = value_type_name(value);
        if !accepted.contains(&actual) {
            return Err(FolioDbError::TypeMismatch {
                field: key.clone(),
                expected: accepted.join("|"),
                actual: actual.to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_structure() -> TableStructure {
        TableStructure::from([
            ("name", "string"),
            ("age", "number"),
            ("active", "boolean"),
            ("nickname", "string|null"),
            ("tags", "array"),
        ])
    }

    fn payload(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn full_payload() -> Map<String, Value> {
        payload(&[
            ("name", json!("Alice")),
            ("age", json!(30)),
            ("active", json!(true)),
            ("nickname", json!(null)),
            ("tags", json!(["a", "b"])),
        ])
    }

    #[test]
    fn test_valid_insert() {
        let structure = test_structure();
        assert!(validate(&structure, &full_payload(), ValidationMode::Insert).is_ok());
    }

    #[test]
    fn test_insert_missing_field() {
        let structure = test_structure();
        let mut data = full_payload();
        data.remove("age");

        let err = validate(&structure, &data, ValidationMode::Insert).unwrap_err();
        assert!(matches!(err, FolioDbError::MissingField(ref f) if f == "age"));
    }

    #[test]
    fn test_update_allows_partial_payload() {
        let structure = test_structure();
        let data = payload(&[("age", json!(31))]);
        assert!(validate(&structure, &data, ValidationMode::Update).is_ok());
    }

    #[test]
    fn test_unknown_field_rejected_in_both_modes() {
        let structure = test_structure();
        let mut data = full_payload();
        data.insert("oops".into(), json!(1));

        for mode in [ValidationMode::Insert, ValidationMode::Update] {
            let err = validate(&structure, &data, mode).unwrap_err();
            assert!(matches!(err, FolioDbError::UnknownField(ref f) if f == "oops"));
        }
    }

    #[test]
    fn test_type_mismatch_lists_accepted_and_actual() {
        let structure = test_structure();
        let data = payload(&[("nickname", json!(7))]);

        let err = validate(&structure, &data, ValidationMode::Update).unwrap_err();
        match err {
            FolioDbError::TypeMismatch {
                field,
                expected,
                actual,
            } => {
                assert_eq!(field, "nickname");
                assert_eq!(expected, "string|null");
                assert_eq!(actual, "number");
            }
            other => panic!("expected TypeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_no_coercion_for_numeric_strings() {
        let structure = test_structure();
        let data = payload(&[("age", json!("30"))]);

        let err = validate(&structure, &data, ValidationMode::Update).unwrap_err();
        assert!(matches!(err, FolioDbError::TypeMismatch { .. }));
    }

    #[test]
    fn test_pipe_alternatives_accept_either_type() {
        let structure = test_structure();
        assert!(validate(
            &structure,
            &payload(&[("nickname", json!("Al"))]),
            ValidationMode::Update
        )
        .is_ok());
        assert!(validate(
            &structure,
            &payload(&[("nickname", json!(null))]),
            ValidationMode::Update
        )
        .is_ok());
    }
}
