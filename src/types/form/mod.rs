use error_stack::Report;
use std::collections::BTreeMap;
use std::fmt::Display;
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

pub mod posts;
pub mod users;

pub use self::posts::{CommentDraft, PostDraft};
pub use self::users::{AuthToken, Credentials};

#[derive(Debug, Error)]
#[error("Invalid form body")]
pub struct InvalidForm;

/// Human readable problem of a single form field, attached to
/// an [`InvalidForm`] report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMessage(pub String);

impl FieldMessage {
    fn new(field: &str, error: &ValidationError) -> Self {
        let message = error.message.as_deref().unwrap_or(&*error.code);
        Self(format!("{field}: {message}"))
    }
}

impl Display for FieldMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Runs the derived per-field checks of a form. Checks spanning
/// several fields can be added to the result afterwards.
pub fn field_checks(form: &impl Validate) -> ValidationErrors {
    form.validate().err().unwrap_or_else(ValidationErrors::new)
}

/// Fields are reported in alphabetical order.
pub fn into_result(errors: &ValidationErrors) -> error_stack::Result<(), InvalidForm> {
    let fields = errors.field_errors().into_iter().collect::<BTreeMap<_, _>>();
    if fields.is_empty() {
        return Ok(());
    }

    let mut report = Report::new(InvalidForm);
    for (field, problems) in fields {
        for problem in problems {
            report = report.attach_printable(FieldMessage::new(field, problem));
        }
    }
    Err(report)
}

/// Collects every field message attached anywhere in the report.
pub fn field_messages<C>(report: &Report<C>) -> Vec<String> {
    let mut messages = report
        .frames()
        .filter_map(|frame| frame.downcast_ref::<FieldMessage>())
        .map(|message| message.0.clone())
        .collect::<Vec<_>>();

    // frames are iterated from the most recent attachment
    messages.reverse();
    messages
}
