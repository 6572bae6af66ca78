use actix_web::{web, HttpResponse, Responder};
use log::{error, info};
use serde::Deserialize;
use serde_json::json;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::api::handlers::error_response;
use crate::capture::session::{CaptureSession, StartOptions};
use crate::capture::source;
use crate::utils::error::AppError;

/// Shared handle to the capture session.
pub type SessionHandle = Arc<RwLock<CaptureSession>>;

/// Request for starting capture
#[derive(Deserialize)]
pub struct StartCaptureRequest {
    /// Interface to capture on (falls back to the configured default)
    pub interface: Option<String>,

    /// Query-time IP filter to apply from the start
    pub filter_ip: Option<IpAddr>,

    /// Stop automatically after this many seconds
    pub duration_secs: Option<u64>,

    /// Also append records to this JSON-lines file
    pub capture_file: Option<PathBuf>,
}

/// Request for updating the query-time filter
#[derive(Deserialize)]
pub struct SetFilterRequest {
    /// IP to filter on; empty or missing clears the filter
    pub ip: Option<String>,
}

/// List available network interfaces
pub async fn list_interfaces() -> impl Responder {
    HttpResponse::Ok().json(json!({ "interfaces": source::list_interfaces() }))
}

/// Start packet capture
pub async fn start_capture(
    session: web::Data<SessionHandle>,
    request: Option<web::Json<StartCaptureRequest>>,
) -> impl Responder {
    let opts = match request {
        Some(req) => {
            let req = req.into_inner();
            StartOptions {
                interface: req.interface,
                filter_ip: req.filter_ip,
                duration_secs: req.duration_secs,
                capture_file: req.capture_file,
            }
        }
        None => StartOptions::default(),
    };

    let mut session = session.write().await;
    match session.start(opts).await {
        Ok(()) => {
            info!(
                "Capture started on interface {:?}",
                session.interface_name()
            );
            HttpResponse::Ok().json(json!({ "ok": true }))
        }
        Err(e) => {
            error!("Failed to start capture: {}", e);
            error_response(&e)
        }
    }
}

/// Stop packet capture. Stopping an idle session succeeds.
pub async fn stop_capture(session: web::Data<SessionHandle>) -> impl Responder {
    let mut session = session.write().await;
    match session.stop().await {
        Ok(()) => HttpResponse::Ok().json(json!({ "ok": true })),
        Err(e) => {
            error!("Failed to stop capture: {}", e);
            error_response(&e)
        }
    }
}

/// Get capture status
pub async fn get_capture_status(session: web::Data<SessionHandle>) -> impl Responder {
    // status reaps a finished capture loop, hence the write lock
    let mut session = session.write().await;
    HttpResponse::Ok().json(session.status().await)
}

/// Set or clear the query-time IP filter
pub async fn set_filter(
    session: web::Data<SessionHandle>,
    request: web::Json<SetFilterRequest>,
) -> impl Responder {
    let raw = request.ip.as_deref().unwrap_or("").trim();
    let parsed = if raw.is_empty() {
        None
    } else {
        match raw.parse::<IpAddr>() {
            Ok(ip) => Some(ip),
            Err(_) => {
                return error_response(&AppError::BadRequest(format!("invalid IP '{}'", raw)))
            }
        }
    };

    let mut session = session.write().await;
    session.set_filter(parsed);
    info!("Query filter set to {:?}", parsed);

    HttpResponse::Ok().json(json!({ "ok": true, "filter_ip": parsed }))
}
