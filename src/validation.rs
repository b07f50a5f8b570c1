use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{AppError, AppResult};

pub const REQUIRED: &str = "This field is required.";

/// Field-keyed validation messages, serialized as `{"field": ["msg", ...]}`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Trims `value` and records an error if it is missing, blank, or longer
    /// than `max_chars`. Returns the trimmed value when it passed.
    pub fn text(&mut self, field: &str, value: Option<&str>, max_chars: usize) -> Option<String> {
        let trimmed = value.map(str::trim).unwrap_or_default();
        if trimmed.is_empty() {
            self.add(field, REQUIRED);
            return None;
        }
        self.max_chars(field, trimmed, max_chars);
        Some(trimmed.to_string())
    }

    /// Like `text`, but absence and blanks are fine.
    pub fn optional_text(
        &mut self,
        field: &str,
        value: Option<&str>,
        max_chars: usize,
    ) -> Option<String> {
        let trimmed = value.map(str::trim).filter(|s| !s.is_empty())?;
        self.max_chars(field, trimmed, max_chars);
        Some(trimmed.to_string())
    }

    fn max_chars(&mut self, field: &str, value: &str, max_chars: usize) {
        if value.chars().count() > max_chars {
            self.add(
                field,
                format!("Ensure this field has no more than {max_chars} characters."),
            );
        }
    }

    pub fn into_result(self) -> AppResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

/// Loose structural check: one `@`, a non-empty local part, and a dotted domain.
pub fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}
