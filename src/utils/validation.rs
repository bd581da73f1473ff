use std::borrow::Cow;
use validator::{Validate, ValidationError, ValidationErrors};

pub fn validate<T: Validate>(val: &T) -> Result<(), ValidationErrors> {
    val.validate()
}

/// Starts from the derive-level checks so cross-field rules can be appended
/// to the same report.
pub fn collect<T: Validate>(val: &T) -> ValidationErrors {
    match val.validate() {
        Ok(()) => ValidationErrors::new(),
        Err(errors) => errors,
    }
}

pub fn push(
    errors: &mut ValidationErrors,
    field: &'static str,
    code: &'static str,
    message: impl Into<String>,
) {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Owned(message.into()));
    errors.add(field, error);
}

pub fn single(field: &'static str, code: &'static str, message: impl Into<String>) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    push(&mut errors, field, code, message);
    errors
}

pub fn finish(errors: ValidationErrors) -> Result<(), ValidationErrors> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}
