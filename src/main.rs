mod api;
mod config;
mod mercator;
mod surface;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use livetrack::{
    EngineEvent, GeoPoint, LiveMapService, MapSurface, RouteInspection, ServiceConfig, SystemClock,
};
use log::{error, info, warn};
use tokio::sync::broadcast::error::RecvError;

use api::FlightApi;
use config::AppConfig;
use mercator::WebMercator;
use surface::{viewport_around, HeadlessSurface};

/// Headless live flight-tracking map host.
#[derive(Parser, Debug)]
#[command(name = "flighttrail", version, about)]
struct Args {
    /// Flight data service base URL (overrides config)
    #[arg(long)]
    server: Option<String>,

    /// Initial viewport center latitude
    #[arg(long)]
    lat: Option<f64>,

    /// Initial viewport center longitude
    #[arg(long)]
    lon: Option<f64>,

    /// Initial zoom level
    #[arg(long)]
    zoom: Option<f64>,

    /// Route id to open for inspection on startup
    #[arg(long)]
    route: Option<i64>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = AppConfig::load().unwrap_or_else(|err| {
        warn!("failed to load config ({err}), using defaults");
        AppConfig::default()
    });
    if let Ok(path) = AppConfig::get_config_path() {
        info!("config file: {}", path.display());
    }

    let base_url = args.server.unwrap_or_else(|| config.api_base_url.clone());
    let center = GeoPoint::new(
        args.lon.unwrap_or(config.center_lon),
        args.lat.unwrap_or(config.center_lat),
    );
    let zoom = args.zoom.unwrap_or(config.default_zoom);

    let api = match FlightApi::new(
        base_url.clone(),
        Duration::from_secs(config.request_timeout_secs),
    ) {
        Ok(api) => Arc::new(api),
        Err(err) => {
            error!("failed to build HTTP client: {err}");
            std::process::exit(1);
        }
    };

    let surface: Arc<dyn MapSurface> =
        Arc::new(HeadlessSurface::new(viewport_around(center, zoom)));
    info!(
        "tracking {base_url} around ({:.4}, {:.4}) at zoom {zoom}",
        center.lat, center.lon
    );

    let service_config = ServiceConfig {
        frame_interval: Duration::from_millis(config.frame_interval_ms),
        ..ServiceConfig::default()
    };
    let service = LiveMapService::spawn(
        service_config,
        api.clone(),
        api,
        Arc::clone(&surface),
        Arc::new(SystemClock),
    );

    if let Some(route_id) = args.route {
        service.open_route(route_id);
    }

    let mut events = service.subscribe();
    let mut status = tokio::time::interval(Duration::from_secs(config.status_period_secs.max(1)));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            _ = status.tick() => {
                print_status(&service, zoom);
            }
            event = events.recv() => {
                match event {
                    Ok(event) => log_event(&event),
                    Err(RecvError::Lagged(missed)) => warn!("dropped {missed} engine events"),
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    service.shutdown();
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::SnapshotApplied { aircraft } => {
            info!("snapshot applied: {aircraft} aircraft");
        }
        EngineEvent::SnapshotFailed => warn!("snapshot fetch failed, showing last good data"),
        EngineEvent::RouteOpened(id) => info!("route {id} opened"),
        EngineEvent::RouteClosed(id) => info!("route {id} closed"),
        EngineEvent::RouteNotFound(id) => warn!("route {id} not found"),
        EngineEvent::RouteLoadFailed(id) => warn!("route {id} failed to load"),
        EngineEvent::ScrubMoved { route_id, index } => {
            info!("route {route_id} scrub moved to index {index}");
        }
    }
}

fn print_status(service: &LiveMapService, zoom: f64) {
    let engine = service.engine();
    let Ok(engine) = engine.read() else { return };

    let live = &engine.layers().live;
    info!("{} live aircraft on screen", live.len());

    let tile_zoom = zoom.clamp(0.0, 22.0).round() as u8;
    for aircraft in live.iter().take(5) {
        let (x, y) = WebMercator::project(aircraft.position, tile_zoom);
        info!(
            "  #{} at ({:.5}, {:.5}) -> tile ({:.2}, {:.2})",
            aircraft.id, aircraft.position.lat, aircraft.position.lon, x, y
        );
    }

    if let RouteInspection::Open(view) = engine.inspection() {
        if let Some(metrics) = view.metrics() {
            info!(
                "route {}: {:.1}% flown, altitude {:.0} m, bearing {:.0}°",
                view.detail.id, metrics.percent, metrics.altitude_m, metrics.bearing_deg
            );
        }
    }
}
