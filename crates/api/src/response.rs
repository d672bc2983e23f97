//! Response envelopes shared by the handlers.
//!
//! Successful calls return `{ "success": true, "data": ... }`. Operations
//! that report failure inside a structured result (a sync or generation that
//! ran but did not succeed) keep the result in `data` and answer 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Standard `{ "success": true, "data": T }` envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> DataResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for DataResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// A result that carries its own success flag.
pub trait Outcome: Serialize {
    fn succeeded(&self) -> bool;
}

/// Envelope for an [`Outcome`]: 200 when it succeeded, 500 otherwise.
pub struct OutcomeResponse<T: Outcome>(pub T);

impl<T: Outcome> IntoResponse for OutcomeResponse<T> {
    fn into_response(self) -> Response {
        let success = self.0.succeeded();
        let status = if success {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (
            status,
            Json(DataResponse {
                success,
                data: self.0,
            }),
        )
            .into_response()
    }
}

impl Outcome for nm_pipeline::sync::SyncResult {
    fn succeeded(&self) -> bool {
        self.success
    }
}

impl Outcome for nm_pipeline::sync::ProjectSyncResult {
    fn succeeded(&self) -> bool {
        self.success
    }
}

impl Outcome for nm_pipeline::generation::GenerationResult {
    fn succeeded(&self) -> bool {
        self.success
    }
}

impl Outcome for nm_pipeline::generation::StageOutcome {
    fn succeeded(&self) -> bool {
        self.success
    }
}
