use actix_web::{web, HttpResponse, Responder};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::IpAddr;
use std::sync::Arc;

use crate::api::handlers::capture::SessionHandle;
use crate::api::handlers::error_response;
use crate::capture::classifier::{self, ViewMode};
use crate::models::packet::PacketRecord;
use crate::utils::error::AppError;

const DEFAULT_LIMIT: usize = 200;
const MAX_LIMIT: usize = 2000;

/// Query parameters for the packet poll endpoint
#[derive(Deserialize)]
pub struct PacketsQuery {
    /// Return only records with a higher sequence id
    #[serde(default)]
    since: u64,

    /// Maximum records to return
    limit: Option<usize>,

    /// Exact-match IP filter; overrides the session filter when present
    ip: Option<String>,
}

/// Query parameters for the payload view endpoint
#[derive(Deserialize)]
pub struct ViewQuery {
    mode: Option<ViewMode>,
}

/// Response for the packet poll endpoint
#[derive(Serialize)]
struct PacketsResponse<'a> {
    records: Vec<&'a PacketRecord>,
    next_since: u64,
}

/// Poll captured records in ascending sequence order.
pub async fn get_packets(
    session: web::Data<SessionHandle>,
    query: web::Query<PacketsQuery>,
) -> impl Responder {
    let (store, session_filter) = {
        let session = session.read().await;
        (session.store(), session.filter_ip())
    };

    let ip = match &query.ip {
        Some(raw) if !raw.trim().is_empty() => match raw.trim().parse::<IpAddr>() {
            Ok(ip) => Some(ip),
            Err(_) => {
                return error_response(&AppError::BadRequest(format!("invalid IP '{}'", raw)))
            }
        },
        _ => session_filter,
    };

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let records = store.query(ip, query.since, limit);
    let next_since = records
        .last()
        .map(|r| r.sequence_id)
        .unwrap_or(query.since);

    HttpResponse::Ok().json(PacketsResponse {
        records: records.iter().map(Arc::as_ref).collect(),
        next_since,
    })
}

/// Get a single record by sequence id.
pub async fn get_packet(
    session: web::Data<SessionHandle>,
    path: web::Path<u64>,
) -> impl Responder {
    let seq = path.into_inner();
    let store = session.read().await.store();

    match store.get(seq) {
        Some(record) => HttpResponse::Ok().json(record.as_ref()),
        None => HttpResponse::NotFound().json(json!({
            "ok": false,
            "error": format!("packet {} not found", seq),
        })),
    }
}

/// Render a stored payload in the requested view mode (text by default).
pub async fn get_packet_view(
    session: web::Data<SessionHandle>,
    path: web::Path<u64>,
    query: web::Query<ViewQuery>,
) -> impl Responder {
    let seq = path.into_inner();
    let mode = query.mode.unwrap_or(ViewMode::Text);
    let store = session.read().await.store();

    match store.get(seq) {
        Some(record) => HttpResponse::Ok().json(json!({
            "sequence_id": seq,
            "mode": mode,
            "rendered": classifier::render(&record.payload, mode),
        })),
        None => HttpResponse::NotFound().json(json!({
            "ok": false,
            "error": format!("packet {} not found", seq),
        })),
    }
}

/// Drop all stored records.
pub async fn clear_packets(session: web::Data<SessionHandle>) -> impl Responder {
    let store = session.read().await.store();
    let dropped = store.size();
    store.clear();
    info!("Cleared {} stored records", dropped);

    HttpResponse::Ok().json(json!({ "ok": true, "dropped": dropped }))
}
