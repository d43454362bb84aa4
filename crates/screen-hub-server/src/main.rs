mod api;
mod capture;
mod config;
mod models;
mod openapi;
mod state;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize};

use actix_web::{App, HttpServer, middleware::Logger, web};
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use device_bridge::{
    AdbClient, NoopVirtualDisplay, SessionSupervisor, UsbMmIddDisplay, VirtualDisplay,
};

use crate::capture::XcapFrameSource;
use crate::state::{AppState, RelayState};

#[derive(Parser, Debug)]
#[command(name = "screen-hub-server")]
struct Args {
    /// HTTP bind address, e.g. 0.0.0.0:5000
    #[arg(long)]
    bind: Option<std::net::SocketAddr>,

    /// Folder where recordings and screenshots are written
    #[arg(long)]
    output_folder: Option<PathBuf>,

    /// Optional server config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// End streams on capture errors instead of sending placeholder frames
    #[arg(long)]
    strict_capture: bool,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,actix_web=info,screen_hub_server=info,device_bridge=info")
        }))
        .init();

    let (cfg, config_path) = match args.config.clone() {
        Some(path) => (config::ServerConfig::load(&path)?, Some(path)),
        None => {
            let auto_path = std::env::current_exe()
                .ok()
                .and_then(|path| path.parent().map(|dir| dir.join("config.toml")));
            match auto_path {
                Some(path) if path.exists() => (config::ServerConfig::load(&path)?, Some(path)),
                _ => (config::ServerConfig::default(), None),
            }
        }
    };
    let mut settings = cfg.resolve()?;
    if let Some(bind) = args.bind {
        settings.bind = bind;
    }
    if let Some(folder) = args.output_folder {
        settings.output_folder = folder;
    }
    std::fs::create_dir_all(&settings.output_folder)
        .with_context(|| format!("create output folder {:?}", settings.output_folder))?;
    tracing::info!(
        bind = %settings.bind,
        output_folder = %settings.output_folder.display(),
        "starting screen-hub-server"
    );

    let adb = Arc::new(AdbClient::resolve());
    tracing::info!(
        adb = %adb.program().display(),
        bundled = adb.is_bundled(),
        "device bridge resolved"
    );
    if !adb.is_available().await {
        tracing::warn!("device bridge is not available; device operations will fail until it is");
    }

    // The virtual-display driver tooling ships alongside the mirroring tool.
    let display: Arc<dyn VirtualDisplay> = settings
        .scrcpy_dir
        .as_ref()
        .and_then(|dir| UsbMmIddDisplay::locate(&dir.join("usbmmidd_v2")))
        .map(|d| Arc::new(d) as Arc<dyn VirtualDisplay>)
        .unwrap_or_else(|| Arc::new(NoopVirtualDisplay));

    let supervisor = SessionSupervisor::new(
        adb,
        display,
        settings.output_folder.clone(),
        settings.scrcpy_dir.clone(),
    );

    let _ = ctrlc::set_handler(move || {
        if let Some(system) = actix_web::rt::System::try_current() {
            system.stop();
        } else {
            std::process::exit(0);
        }
    });

    let state = web::Data::new(AppState {
        supervisor,
        recording_defaults: settings.recording.clone(),
        frames: Arc::new(XcapFrameSource),
        relay: RelayState {
            stop: AtomicBool::new(false),
            monitor_index: AtomicUsize::new(settings.monitor_index),
            jpeg_quality: settings.jpeg_quality,
            fps: settings.recording.fps,
            strict: args.strict_capture,
        },
        config_path,
    });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default().exclude("/video_feed"))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", openapi::ApiDoc::openapi()),
            )
            .service(api::index)
            .service(api::video_feed)
            .service(api::shutdown)
            .service(api::select_monitor)
            .service(api::devices_list)
            .service(api::device_storage)
            .service(api::device_capabilities)
            .service(api::sessions_list)
            .service(api::recording_presets)
            .service(api::recording_start)
            .service(api::recording_stop)
            .service(api::test_recording)
            .service(api::screenshot)
            .service(api::mirroring_start)
            .service(api::mirroring_stop)
            .service(api::connect_wifi)
            .service(api::disconnect_device)
            .service(api::update_output_folder)
    })
    .bind(settings.bind)?
    .run()
    .await?;

    Ok(())
}
