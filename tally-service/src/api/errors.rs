//! Maps internal failures onto the spec §7 [`ErrorKind`] taxonomy and the
//! HTTP status codes it prescribes.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tally_types::error::ErrorKind;

use crate::services::audit_log::VerifyError;
use crate::services::blockchain::PublishError;
use crate::services::election_store::StoreError;
use crate::services::tally_engine::EngineError;

/// Wraps an [`ErrorKind`] so it can be returned directly from an `axum`
/// handler: the body is the serialized `ErrorKind`, the status its
/// conventional code.
pub(crate) struct ApiError(ErrorKind);

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.0.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0)).into_response()
    }
}

impl From<ErrorKind> for ApiError {
    fn from(kind: ErrorKind) -> Self {
        Self(kind)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        Self(match err {
            StoreError::NotFound(_) => ErrorKind::Domain { message },
            StoreError::Conflict(_) => ErrorKind::State { message },
            StoreError::Backend(_) => ErrorKind::Storage { message },
        })
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        Self(match err {
            EngineError::Storage(store_err) => return store_err.into(),
            EngineError::ElectionNotFound(_)
            | EngineError::UnknownTrustee { .. }
            | EngineError::NoBallotsAccepted(_)
            | EngineError::MalformedSubmission { .. }
            | EngineError::PlaintextOverflow { .. } => ErrorKind::Domain { message },
            EngineError::ElectionNotActive(_)
            | EngineError::SessionAlreadyExists(_)
            | EngineError::SessionNotFound(_)
            | EngineError::WrongState { .. }
            | EngineError::DuplicateSubmission { .. }
            | EngineError::TrusteeRevoked { .. }
            | EngineError::TooFewTrustees { .. } => ErrorKind::State { message },
            EngineError::Combine(_) => ErrorKind::Crypto { message },
            EngineError::Timeout { .. } => ErrorKind::Timeout { message },
            EngineError::TaskJoin(_) => ErrorKind::Storage { message },
        })
    }
}

impl From<VerifyError> for ApiError {
    fn from(err: VerifyError) -> Self {
        let message = err.to_string();
        Self(match err {
            VerifyError::Storage(store_err) => return store_err.into(),
            VerifyError::NoResult(_) => ErrorKind::Domain { message },
        })
    }
}

impl From<PublishError> for ApiError {
    fn from(err: PublishError) -> Self {
        Self(ErrorKind::Storage {
            message: err.to_string(),
        })
    }
}
