pub mod capture;
pub mod diag;
pub mod packets;

use actix_web::HttpResponse;
use serde_json::json;

use crate::utils::error::AppError;

/// Uniform `{ok: false, error}` body carrying the error's status code.
pub(crate) fn error_response(err: &AppError) -> HttpResponse {
    HttpResponse::build(err.status_code()).json(json!({
        "ok": false,
        "error": err.to_string(),
    }))
}
