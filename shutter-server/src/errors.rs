use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::error;
use shutter_gallery::{AuthError, DatabaseError, GalleryError};
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Could not render template: {0}")]
    Template(#[from] tera::Error),
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.as_status_code();

        if status.is_server_error() {
            error!("{}", self);
            return (status, "Internal server error").into_response();
        }

        (status, self.to_string()).into_response()
    }
}

impl From<AuthError> for ServerError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::UsernameTaken(value) => Self::Conflict {
                resource: "user",
                field: "username",
                value,
            },
            AuthError::Db(e) => e.into(),
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            DatabaseError::Conflict {
                resource,
                field,
                value,
            } => Self::Conflict {
                resource,
                field,
                value,
            },
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<GalleryError> for ServerError {
    fn from(value: GalleryError) -> Self {
        match value {
            GalleryError::Database(e) => e.into(),
            e => Self::Unknown(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_database_errors() {
        let not_found: ServerError = DatabaseError::NotFound {
            resource: "album",
            identifier: "id",
        }
        .into();

        assert_eq!(not_found.as_status_code(), StatusCode::NOT_FOUND);

        let taken: ServerError = AuthError::UsernameTaken("alice".to_string()).into();
        assert_eq!(taken.as_status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn internal_errors_are_hidden() {
        let response = ServerError::Unknown("disk on fire".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
