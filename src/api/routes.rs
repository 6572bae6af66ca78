use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

use crate::api::handlers::{
    capture::{get_capture_status, list_interfaces, set_filter, start_capture, stop_capture},
    diag::{arp_cache, list_devices, ping, ping_sweep, traceroute},
    packets::{clear_packets, get_packet, get_packet_view, get_packets},
};

/// Root endpoint to provide information about the API
async fn index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "name": "netmon API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "An L7 network traffic monitor with REST API",
        "endpoints": [
            {
                "path": "/api/interfaces",
                "method": "GET",
                "description": "List available network interfaces"
            },
            {
                "path": "/api/capture/start",
                "method": "POST",
                "description": "Start packet capture"
            },
            {
                "path": "/api/capture/stop",
                "method": "POST",
                "description": "Stop packet capture"
            },
            {
                "path": "/api/capture/status",
                "method": "GET",
                "description": "Get status of the capture session"
            },
            {
                "path": "/api/capture/filter",
                "method": "POST",
                "description": "Set or clear the query-time IP filter"
            },
            {
                "path": "/api/packets",
                "method": "GET",
                "description": "Poll captured records (since/limit/ip)"
            },
            {
                "path": "/api/packets/{seq}",
                "method": "GET",
                "description": "Get one record by sequence id"
            },
            {
                "path": "/api/packets/{seq}/view",
                "method": "GET",
                "description": "Render a payload as text, hex or base64"
            },
            {
                "path": "/api/packets/clear",
                "method": "POST",
                "description": "Drop all stored records"
            },
            {
                "path": "/api/ping",
                "method": "GET",
                "description": "Ping a host"
            },
            {
                "path": "/api/traceroute",
                "method": "GET",
                "description": "Trace the route to a host"
            },
            {
                "path": "/api/arp",
                "method": "GET",
                "description": "Read the ARP/neighbor cache"
            },
            {
                "path": "/api/sweep",
                "method": "POST",
                "description": "Ping-sweep a network"
            },
            {
                "path": "/api/devices",
                "method": "GET",
                "description": "List discovered devices"
            }
        ]
    }))
}

/// Configure API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        // Root endpoint
        .route("/", web::get().to(index))
        .service(
            web::scope("/api")
                // Interface discovery
                .service(web::scope("/interfaces").route("", web::get().to(list_interfaces)))
                // Capture session management
                .service(
                    web::scope("/capture")
                        .route("/start", web::post().to(start_capture))
                        .route("/stop", web::post().to(stop_capture))
                        .route("/status", web::get().to(get_capture_status))
                        .route("/filter", web::post().to(set_filter)),
                )
                // Packet data
                .service(
                    web::scope("/packets")
                        .route("", web::get().to(get_packets))
                        .route("/clear", web::post().to(clear_packets))
                        .route("/{seq}", web::get().to(get_packet))
                        .route("/{seq}/view", web::get().to(get_packet_view)),
                )
                // Discovery / diagnostics
                .route("/ping", web::get().to(ping))
                .route("/traceroute", web::get().to(traceroute))
                .route("/arp", web::get().to(arp_cache))
                .route("/sweep", web::post().to(ping_sweep))
                .route("/devices", web::get().to(list_devices)),
        );
}
