use actix_web::{body::BoxBody, http::StatusCode, HttpResponse};
use error_stack::{Context, Report};
use thiserror::Error as ThisError;
use tracing_error::SpanTrace;

use crate::auth::SessionError;
use crate::model::{PostError, UserError};
use crate::types::{self, form::field_messages};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, ThisError)]
#[error("Failed to process request")]
pub struct RequestError;

/// Error returned by request handlers and services. It keeps
/// the whole report chain for logging while only the error kind
/// is sent back to the client.
pub struct Error {
    error_type: types::Error,
    report: Report<RequestError>,
    trace: SpanTrace,
}

impl Error {
    #[must_use]
    pub fn from_context(error_type: types::Error, context: impl Context) -> Self {
        Self::from_report(error_type, Report::new(context))
    }

    #[must_use]
    pub fn from_report(error_type: types::Error, report: Report<impl Context>) -> Self {
        Self {
            error_type,
            report: report.change_context(RequestError),
            trace: SpanTrace::capture(),
        }
    }
}

impl Error {
    #[must_use]
    pub fn as_type(&self) -> &types::Error {
        &self.error_type
    }

    #[must_use]
    pub fn report(&self) -> &Report<RequestError> {
        &self.report
    }

    #[must_use]
    pub fn change_type(mut self, error_type: types::Error) -> Self {
        self.error_type = error_type;
        self
    }

    #[must_use]
    pub fn downcast_ref<F: Context>(&self) -> Option<&F> {
        self.report.downcast_ref::<F>()
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Error")
            .field("type", &self.error_type)
            .field("report", &self.report)
            .field("trace", &self.trace)
            .finish()
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: ", &self.error_type)?;
        writeln!(f, "{:?}", self.report)?;
        std::fmt::Display::fmt(&self.trace, f)
    }
}

impl actix_web::ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self.error_type {
            types::Error::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            types::Error::NotFound => StatusCode::NOT_FOUND,
            types::Error::Forbidden => StatusCode::FORBIDDEN,
            types::Error::Unauthenticated | types::Error::BadToken => StatusCode::UNAUTHORIZED,
            types::Error::AlreadyExists
            | types::Error::InvalidCredentials
            | types::Error::InvalidFormBody { .. } => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse<BoxBody> {
        if self.error_type == types::Error::Internal {
            tracing::error!(error = ?self.report, trace = %self.trace, "request failed");
        }
        HttpResponse::build(self.status_code()).json(&self.error_type)
    }
}

impl From<Report<PostError>> for Error {
    fn from(value: Report<PostError>) -> Self {
        let error_type = match value.current_context() {
            PostError::NotFound | PostError::CommentNotFound => types::Error::NotFound,
            PostError::Forbidden => types::Error::Forbidden,
            PostError::Validation => types::Error::InvalidFormBody {
                errors: field_messages(&value),
            },
            PostError::Storage => types::Error::Internal,
        };
        Error::from_report(error_type, value)
    }
}

impl From<Report<UserError>> for Error {
    fn from(value: Report<UserError>) -> Self {
        let error_type = match value.current_context() {
            UserError::AlreadyExists => types::Error::AlreadyExists,
            UserError::NoSuchUser => types::Error::NotFound,
            UserError::BadCredentials => types::Error::InvalidCredentials,
            UserError::Validation => types::Error::InvalidFormBody {
                errors: field_messages(&value),
            },
            UserError::Internal | UserError::Storage => types::Error::Internal,
        };
        Error::from_report(error_type, value)
    }
}

impl From<Report<SessionError>> for Error {
    fn from(value: Report<SessionError>) -> Self {
        let error_type = match value.current_context() {
            SessionError::Unauthenticated => types::Error::Unauthenticated,
            SessionError::BadToken => types::Error::BadToken,
            SessionError::Internal | SessionError::Storage => types::Error::Internal,
        };
        Error::from_report(error_type, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::form::{into_result, InvalidForm};
    use crate::types::validation::invalid;
    use validator::ValidationErrors;
    use actix_web::ResponseError;
    use error_stack::ResultExt;

    fn invalid_form() -> Report<InvalidForm> {
        let mut errors = ValidationErrors::new();
        errors.add("title", invalid("required", "Title is required"));
        into_result(&errors).unwrap_err()
    }

    #[test]
    fn post_errors_keep_their_kind() {
        let cases = [
            (PostError::NotFound, StatusCode::NOT_FOUND),
            (PostError::CommentNotFound, StatusCode::NOT_FOUND),
            (PostError::Forbidden, StatusCode::FORBIDDEN),
            (PostError::Storage, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (context, status) in cases {
            let error = Error::from(Report::new(context));
            assert_eq!(error.status_code(), status, "{context:?}");
            assert!(error.downcast_ref::<PostError>().is_some());
        }
    }

    #[test]
    fn validation_errors_list_fields() {
        let report = Err::<(), _>(invalid_form())
            .change_context(PostError::Validation)
            .unwrap_err();

        let error = Error::from(report);
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            error.as_type(),
            &types::Error::InvalidFormBody {
                errors: vec!["title: Title is required".into()]
            }
        );
    }

    #[test]
    fn login_failures_keep_their_kind() {
        let unknown = Error::from(Report::new(UserError::NoSuchUser));
        assert_eq!(unknown.as_type(), &types::Error::NotFound);
        assert_eq!(unknown.status_code(), StatusCode::NOT_FOUND);

        let wrong = Error::from(Report::new(UserError::BadCredentials));
        assert_eq!(wrong.as_type(), &types::Error::InvalidCredentials);
        assert_eq!(wrong.status_code(), StatusCode::BAD_REQUEST);

        let taken = Error::from(Report::new(UserError::AlreadyExists));
        assert_eq!(taken.as_type(), &types::Error::AlreadyExists);
    }

    #[test]
    fn session_errors_are_unauthorized() {
        let missing = Error::from(Report::new(SessionError::Unauthenticated));
        let forged = Error::from(Report::new(SessionError::BadToken));
        assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(forged.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(forged.as_type(), &types::Error::BadToken);

        let storage = Error::from(Report::new(SessionError::Storage));
        assert_eq!(storage.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn change_type_overrides_the_kind() {
        let error = Error::from_context(types::Error::Internal, RequestError)
            .change_type(types::Error::NotFound);
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }
}
