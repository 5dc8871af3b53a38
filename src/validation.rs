use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;

/// One offending field and the constraint it broke.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub constraint: String,
}

/// Collects every field violation of a payload before failing.
#[derive(Debug, Default)]
pub struct Violations(Vec<FieldError>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, constraint: impl Into<String>) {
        self.0.push(FieldError {
            field,
            constraint: constraint.into(),
        });
    }

    pub fn check(&mut self, field: &'static str, ok: bool, constraint: &str) {
        if !ok {
            self.push(field, constraint);
        }
    }

    /// Records `required` when the value is blank.
    pub fn required(&mut self, field: &'static str, value: &str) -> bool {
        let present = !value.trim().is_empty();
        self.check(field, present, "required");
        present
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn finish(self) -> Result<(), AppError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.0))
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Parses a referenced id field, recording `required` or `uuid` on failure.
pub fn required_id(errors: &mut Violations, field: &'static str, raw: Option<&str>) -> Option<Uuid> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => {
            errors.push(field, "required");
            None
        }
        Some(v) => optional_id(errors, field, Some(v)),
    }
}

/// Like [`required_id`] but blank input is simply absent.
pub fn optional_id(errors: &mut Violations, field: &'static str, raw: Option<&str>) -> Option<Uuid> {
    let v = raw.map(str::trim).filter(|v| !v.is_empty())?;
    match Uuid::parse_str(v) {
        Ok(id) => Some(id),
        Err(_) => {
            errors.push(field, "uuid");
            None
        }
    }
}

/// Parses an optional decimal form field; blank means `default`.
pub fn parse_price(raw: Option<&str>, default: f64, errors: &mut Violations) -> f64 {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => default,
        Some(v) => match v.parse::<f64>() {
            Ok(price) if price.is_finite() && price >= 0.0 => price,
            Ok(_) => {
                errors.push("price", "gte=0");
                default
            }
            Err(_) => {
                errors.push("price", "number");
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_regex_accepts_common_addresses() {
        assert!(is_valid_email("a@b.io"));
        assert!(is_valid_email("first.last+tag@example.co.uk"));
        assert!(!is_valid_email("no-at-sign.example.com"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("space in@example.com"));
    }

    #[test]
    fn violations_are_collected_not_short_circuited() {
        let mut v = Violations::new();
        v.required("name", "  ");
        v.required("description", "");
        v.check("price", false, "gte=0");
        match v.finish() {
            Err(AppError::Validation(fields)) => {
                let names: Vec<_> = fields.iter().map(|f| f.field).collect();
                assert_eq!(names, vec!["name", "description", "price"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn id_fields_distinguish_missing_from_malformed() {
        let mut v = Violations::new();
        let id = Uuid::new_v4();
        assert_eq!(required_id(&mut v, "course_id", Some(&id.to_string())), Some(id));
        assert_eq!(optional_id(&mut v, "course_id", Some("  ")), None);
        assert!(v.is_empty());

        assert_eq!(required_id(&mut v, "course_id", None), None);
        assert_eq!(required_id(&mut v, "quiz_id", Some("7")), None);
        let Err(AppError::Validation(fields)) = v.finish() else {
            panic!("expected validation error");
        };
        assert_eq!(fields[0].constraint, "required");
        assert_eq!(fields[1].field, "quiz_id");
        assert_eq!(fields[1].constraint, "uuid");
    }

    #[test]
    fn price_parsing_rejects_negative_and_garbage() {
        let mut v = Violations::new();
        assert_eq!(parse_price(None, 0.0, &mut v), 0.0);
        assert_eq!(parse_price(Some("19.5"), 0.0, &mut v), 19.5);
        assert!(v.is_empty());

        parse_price(Some("-1"), 0.0, &mut v);
        parse_price(Some("ten"), 0.0, &mut v);
        let Err(AppError::Validation(fields)) = v.finish() else {
            panic!("expected validation error");
        };
        assert_eq!(fields[0].constraint, "gte=0");
        assert_eq!(fields[1].constraint, "number");
    }
}
