use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use launchpad_common::LaunchpadError;
use serde_json::json;
use tracing::{error, warn};

/// Domain error carried out of a handler.
pub struct ApiError(pub LaunchpadError);

impl From<LaunchpadError> for ApiError {
    fn from(e: LaunchpadError) -> Self {
        Self(e)
    }
}

impl From<launchpad_store::StoreError> for ApiError {
    fn from(e: launchpad_store::StoreError) -> Self {
        Self(e.into())
    }
}

pub fn status_for(e: &LaunchpadError) -> StatusCode {
    match e {
        LaunchpadError::NotFound(_) | LaunchpadError::NoUpdate(_) => StatusCode::NOT_FOUND,
        LaunchpadError::PartialConsistency { .. } | LaunchpadError::Conflict(_) => StatusCode::CONFLICT,
        e if e.is_upstream() => StatusCode::BAD_GATEWAY,
        LaunchpadError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        } else if matches!(self.0, LaunchpadError::PartialConsistency { .. }) {
            warn!(error = %self.0, "Request partially applied");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchpad_common::EntityKind;

    #[test]
    fn maps_domain_errors_to_status_codes() {
        assert_eq!(status_for(&LaunchpadError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&LaunchpadError::NoUpdate("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&LaunchpadError::PartialConsistency {
                operation: "toggle-interest",
                applied: "a".into(),
                failed: "b".into(),
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&LaunchpadError::MaxRetriesExceeded {
                kind: EntityKind::Event,
                attempts: 3,
                last_error: "down".into(),
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(status_for(&LaunchpadError::Store("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
