//! HTTP request handlers.

use crate::page::REGISTER_PAGE;
use crate::server::AppState;
use crate::session::CallerSession;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use cardlink_core::{CardlinkError, ErrorKind, LinkStatus};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Registration form fields. Missing fields count as blank.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub reg_no: String,
}

/// Body posted by the scanner.
#[derive(Debug, Default, Deserialize)]
pub struct LinkRequest {
    #[serde(default)]
    pub rfid_uid: String,
}

fn reply(status: StatusCode, body: Value, session: Option<&CallerSession>) -> Response {
    let mut response = (status, Json(body)).into_response();
    if let Some(session) = session {
        session.attach(&mut response);
    }
    response
}

/// Health check endpoint.
pub async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "pending": state.api.pending_count(),
        "backend": state.api.backend_name(),
    }))
}

/// Registration form page.
pub async fn handle_index(session: CallerSession) -> Response {
    let mut response = Html(REGISTER_PAGE).into_response();
    session.attach(&mut response);
    response
}

/// `POST /register`
///
/// Validation errors answer 200 with `status: "error"`; the page reads the
/// body, not the status code. Row store failures answer 500.
pub async fn handle_register(
    State(state): State<Arc<AppState>>,
    session: CallerSession,
    Form(form): Form<RegisterForm>,
) -> Response {
    match state.api.register(&form.name, &form.reg_no, &session.id).await {
        Ok(ack) => reply(
            StatusCode::OK,
            json!({
                "status": "waiting",
                "message": ack.message(),
                "reg_no": ack.reg_no,
            }),
            Some(&session),
        ),
        Err(e) => {
            let (status, message) = match e.kind() {
                ErrorKind::InvalidInput => (StatusCode::OK, e.to_string()),
                ErrorKind::PersistenceUnavailable => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Could not connect to database.".to_string(),
                ),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to save registration data: {}", e),
                ),
            };
            let mut body = json!({ "status": "error", "message": message });
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                body["retryable"] = json!(e.is_retryable());
            }
            reply(status, body, Some(&session))
        }
    }
}

/// `GET /check_status/:reg_no`
pub async fn handle_check_status(
    State(state): State<Arc<AppState>>,
    session: CallerSession,
    Path(reg_no): Path<String>,
) -> Response {
    let (code, body) = match state.api.check_status(&reg_no, &session.id) {
        Ok(status) => {
            debug!(reg_no = %reg_no, status = status.as_str(), "Status check");
            let code = match status {
                LinkStatus::Timeout => StatusCode::REQUEST_TIMEOUT,
                _ => StatusCode::OK,
            };
            (
                code,
                json!({ "status": status.as_str(), "message": status.message() }),
            )
        }
        Err(e) => (
            StatusCode::OK,
            json!({ "status": "error", "message": e.to_string() }),
        ),
    };
    reply(code, body, Some(&session))
}

/// `POST /link_rfid`, called by the scanner.
pub async fn handle_link_rfid(
    State(state): State<Arc<AppState>>,
    request: std::result::Result<Json<LinkRequest>, JsonRejection>,
) -> Response {
    let request = match request {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Rejected scanner request: {}", rejection.body_text());
            return reply(
                StatusCode::BAD_REQUEST,
                json!({
                    "status": "error",
                    "message": format!("Invalid scan request: {}", rejection.body_text()),
                }),
                None,
            );
        }
    };

    match state.api.link_scan(&request.rfid_uid).await {
        Ok(card) => reply(
            StatusCode::OK,
            json!({
                "status": "linked",
                "name": card.name,
                "register_number": card.reg_no,
                "message": card.message(),
            }),
            None,
        ),
        Err(e) => {
            let status = scan_error_status(&e);
            let mut body = json!({ "status": "error", "message": e.to_string() });
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                error!("Scan could not be linked: {}", e);
                body["retryable"] = json!(e.is_retryable());
            }
            reply(status, body, None)
        }
    }
}

fn scan_error_status(err: &CardlinkError) -> StatusCode {
    match err.kind() {
        ErrorKind::NoActiveSession => StatusCode::NOT_FOUND,
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_error_status_codes() {
        assert_eq!(
            scan_error_status(&CardlinkError::NoActiveSession),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            scan_error_status(&CardlinkError::invalid_input("blank")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            scan_error_status(&CardlinkError::write_failed("quota")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            scan_error_status(&CardlinkError::unavailable("offline")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
