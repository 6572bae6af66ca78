mod api;
mod capture;
mod diag;
mod models;
mod utils;

use actix_web::{web, App, HttpServer};
use anyhow::Result;
use clap::Parser;
use log::info;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::api::routes;
use crate::capture::session::CaptureSession;
use crate::diag::DeviceRegistry;
use crate::models::config::AppConfig;
use crate::utils::logging;

#[derive(Parser, Debug)]
#[clap(author, version, about = "An L7 network traffic monitor with REST API")]
struct Args {
    /// Network interface to capture from
    #[clap(short, long)]
    interface: Option<String>,

    /// Port for the REST API server
    #[clap(short, long, default_value = "3000")]
    port: u16,

    /// Ring buffer capacity in records
    #[clap(long, default_value = "2000")]
    capacity: usize,

    /// Default query-time IP filter
    #[clap(long)]
    filter_ip: Option<IpAddr>,

    /// Log level (trace, debug, info, warn, error, off)
    #[clap(long, default_value = "info")]
    log_level: String,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init(&args.log_level);

    info!("Starting netmon v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig {
        interface: args.interface,
        port: args.port,
        capacity: args.capacity,
        filter_ip: args.filter_ip,
    };

    // The session is created idle; capture starts on request via the API.
    let session = web::Data::new(Arc::new(RwLock::new(CaptureSession::new(config.clone()))));
    let registry = web::Data::new(DeviceRegistry::new());

    info!("Starting netmon API server on port {}", config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(session.clone())
            .app_data(registry.clone())
            .configure(routes::configure)
    })
    .bind(("127.0.0.1", config.port))?
    .run()
    .await?;

    Ok(())
}
