use actix_web::{web, HttpResponse, Responder};
use log::error;
use serde::Deserialize;
use serde_json::json;
use std::net::IpAddr;

use crate::api::handlers::error_response;
use crate::diag::{probe, sweep, DeviceRegistry};
use crate::utils::error::AppError;

/// Query parameters for ping
#[derive(Deserialize)]
pub struct PingQuery {
    ip: String,
    count: Option<u32>,
    timeout_ms: Option<u64>,
}

/// Query parameters for traceroute
#[derive(Deserialize)]
pub struct TracerouteQuery {
    ip: String,
    max_hops: Option<u32>,
}

/// Request body for a ping sweep
#[derive(Deserialize)]
pub struct SweepRequest {
    network: String,
}

fn parse_ip(raw: &str) -> Result<IpAddr, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid IP '{}'", raw)))
}

/// Ping a host with the system binary.
pub async fn ping(query: web::Query<PingQuery>) -> impl Responder {
    let ip = match parse_ip(&query.ip) {
        Ok(ip) => ip,
        Err(e) => return error_response(&e),
    };

    match probe::ping(ip, query.count.unwrap_or(4), query.timeout_ms.unwrap_or(1000)).await {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(e) => {
            error!("Ping failed: {}", e);
            error_response(&e)
        }
    }
}

/// Trace the route to a host.
pub async fn traceroute(query: web::Query<TracerouteQuery>) -> impl Responder {
    let ip = match parse_ip(&query.ip) {
        Ok(ip) => ip,
        Err(e) => return error_response(&e),
    };

    match probe::traceroute(ip, query.max_hops.unwrap_or(16)).await {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(e) => {
            error!("Traceroute failed: {}", e);
            error_response(&e)
        }
    }
}

/// Read the OS ARP/neighbor cache into the device registry.
pub async fn arp_cache(registry: web::Data<DeviceRegistry>) -> impl Responder {
    match sweep::read_arp_cache(registry.get_ref()).await {
        Ok(entries) => HttpResponse::Ok().json(json!({ "entries": entries })),
        Err(e) => {
            error!("ARP cache read failed: {}", e);
            error_response(&e)
        }
    }
}

/// Ping-sweep a network, populating the device registry.
pub async fn ping_sweep(
    registry: web::Data<DeviceRegistry>,
    request: web::Json<SweepRequest>,
) -> impl Responder {
    match sweep::ping_sweep(&request.network, registry.get_ref()).await {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(e) => {
            error!("Ping sweep failed: {}", e);
            error_response(&e)
        }
    }
}

/// List devices discovered so far.
pub async fn list_devices(registry: web::Data<DeviceRegistry>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "count": registry.count(),
        "devices": registry.list(),
    }))
}
