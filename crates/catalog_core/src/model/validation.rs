use std::error::Error;
use std::fmt::{Display, Formatter};

/// Field-level input rejection, suitable for re-displaying a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Error for ValidationError {}

pub(crate) fn require_text(
    field: &'static str,
    value: &str,
    max_chars: usize,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "This field is required."));
    }
    limit_text(field, value, max_chars)
}

pub(crate) fn limit_text(
    field: &'static str,
    value: &str,
    max_chars: usize,
) -> Result<(), ValidationError> {
    let length = value.chars().count();
    if length > max_chars {
        return Err(ValidationError::new(
            field,
            format!("Ensure this value has at most {max_chars} characters (it has {length})."),
        ));
    }
    Ok(())
}
