//! Device and session control handlers.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, Responder, get, post, web};

use screen_hub_types::{
    MirrorConfig, RecordingConfig, RecordingPreset, SessionError, format_bytes,
};

use crate::models::{
    CapabilitiesResponse, DevicesResponse, DisconnectResponse, ErrorBody, OutputFolderRequest,
    PresetsResponse, ScreenshotResponse, SessionsResponse, StartMirroringRequest,
    StartRecordingRequest, StopMirroringResponse, StopRecordingResponse, StorageResponse,
    WifiConnectResponse,
};
use crate::state::AppState;

/// On-device recorder hard limit for a single clip.
const MAX_TIME_LIMIT_SECS: u32 = 180;

fn error_response(err: &SessionError) -> HttpResponse {
    let status = match err {
        SessionError::SessionConflict { .. } => StatusCode::CONFLICT,
        SessionError::DeviceNotFound { .. } => StatusCode::NOT_FOUND,
        SessionError::CapabilityUnsupported { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        SessionError::BridgeUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        SessionError::ProcessStartFailed { .. } | SessionError::ProcessTimeout => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    HttpResponse::build(status).json(ErrorBody {
        error: err.to_string(),
    })
}

fn merge_recording(defaults: &RecordingConfig, req: &StartRecordingRequest) -> RecordingConfig {
    RecordingConfig {
        resolution: req
            .resolution
            .clone()
            .or_else(|| defaults.resolution.clone()),
        bitrate_mbps: req
            .bitrate_mbps
            .unwrap_or(defaults.bitrate_mbps)
            .clamp(1, 20),
        fps: req.fps.unwrap_or(defaults.fps),
        time_limit_secs: req
            .max_time_minutes
            .map(|minutes| (minutes * 60).min(MAX_TIME_LIMIT_SECS))
            .unwrap_or(defaults.time_limit_secs),
    }
}

#[utoipa::path(
    get,
    path = "/devices",
    responses(
        (status = 200, description = "Connected, authorized devices", body = crate::models::DevicesResponse)
    )
)]
#[get("/devices")]
/// List connected devices with their properties.
pub async fn devices_list(state: web::Data<AppState>) -> impl Responder {
    let devices = state.registry().refresh().await;
    HttpResponse::Ok().json(DevicesResponse { devices })
}

#[utoipa::path(
    get,
    path = "/devices/{id}/storage",
    params(("id" = String, Path, description = "Device serial")),
    responses(
        (status = 200, description = "Shared storage snapshot", body = crate::models::StorageResponse)
    )
)]
#[get("/devices/{id}/storage")]
/// Storage snapshot for a device's shared storage.
pub async fn device_storage(state: web::Data<AppState>, id: web::Path<String>) -> impl Responder {
    let device_id = id.into_inner();
    let storage = state.registry().storage_info(&device_id).await;
    let available_display = storage.available_bytes.map(format_bytes);
    HttpResponse::Ok().json(StorageResponse {
        device_id,
        storage,
        available_display,
    })
}

#[utoipa::path(
    get,
    path = "/devices/{id}/capabilities",
    params(("id" = String, Path, description = "Device serial")),
    responses(
        (status = 200, description = "Recording capability profile", body = crate::models::CapabilitiesResponse)
    )
)]
#[get("/devices/{id}/capabilities")]
/// Recording capability profile derived from the device SDK level.
pub async fn device_capabilities(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> impl Responder {
    let device_id = id.into_inner();
    let capabilities = state.registry().capabilities(&device_id).await;
    HttpResponse::Ok().json(CapabilitiesResponse {
        device_id,
        capabilities,
    })
}

#[utoipa::path(
    get,
    path = "/sessions",
    responses(
        (status = 200, description = "Live sessions", body = crate::models::SessionsResponse)
    )
)]
#[get("/sessions")]
/// Snapshots of every live session.
pub async fn sessions_list(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(SessionsResponse {
        sessions: state.supervisor.sessions(),
    })
}

#[utoipa::path(
    get,
    path = "/recording-presets",
    responses(
        (status = 200, description = "Built-in recording presets", body = crate::models::PresetsResponse)
    )
)]
#[get("/recording-presets")]
/// Built-in recording presets clients can offer as starting points.
pub async fn recording_presets() -> impl Responder {
    HttpResponse::Ok().json(PresetsResponse {
        presets: RecordingPreset::builtin(),
    })
}

#[utoipa::path(
    post,
    path = "/devices/{id}/recording/start",
    params(("id" = String, Path, description = "Device serial")),
    request_body = StartRecordingRequest,
    responses(
        (status = 200, description = "Recording started", body = screen_hub_types::SessionSnapshot),
        (status = 404, description = "Device not found"),
        (status = 409, description = "Device already has an active session"),
        (status = 422, description = "Device cannot record"),
        (status = 503, description = "Device bridge unavailable")
    )
)]
#[post("/devices/{id}/recording/start")]
/// Start a screen recording.
pub async fn recording_start(
    state: web::Data<AppState>,
    id: web::Path<String>,
    body: web::Json<StartRecordingRequest>,
) -> impl Responder {
    let device_id = id.into_inner();
    let cfg = merge_recording(&state.recording_defaults, &body);
    tracing::info!(device_id = %device_id, "recording start request");
    match state.supervisor.start_recording(&device_id, cfg).await {
        Ok(snapshot) => HttpResponse::Ok().json(snapshot),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/devices/{id}/recording/stop",
    params(("id" = String, Path, description = "Device serial")),
    responses(
        (status = 200, description = "Recording stopped (or nothing to stop)", body = crate::models::StopRecordingResponse)
    )
)]
#[post("/devices/{id}/recording/stop")]
/// Stop a running recording and pull the artifact.
pub async fn recording_stop(state: web::Data<AppState>, id: web::Path<String>) -> impl Responder {
    let device_id = id.into_inner();
    tracing::info!(device_id = %device_id, "recording stop request");
    let transfer = state.supervisor.stop_recording(&device_id).await;
    HttpResponse::Ok().json(StopRecordingResponse {
        stopped: transfer.is_some(),
        transfer,
    })
}

#[utoipa::path(
    post,
    path = "/devices/{id}/test-recording",
    params(("id" = String, Path, description = "Device serial")),
    responses(
        (status = 200, description = "Test recording started", body = screen_hub_types::SessionSnapshot),
        (status = 409, description = "Device already has an active session")
    )
)]
#[post("/devices/{id}/test-recording")]
/// Start a short fixed-length recording to verify a device end to end.
pub async fn test_recording(state: web::Data<AppState>, id: web::Path<String>) -> impl Responder {
    let device_id = id.into_inner();
    let cfg = state.recording_defaults.clone();
    match state.supervisor.start_test_recording(&device_id, cfg).await {
        Ok(snapshot) => HttpResponse::Ok().json(snapshot),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/devices/{id}/screenshot",
    params(("id" = String, Path, description = "Device serial")),
    responses(
        (status = 200, description = "Screenshot pulled", body = crate::models::ScreenshotResponse),
        (status = 404, description = "Device not found"),
        (status = 503, description = "Device bridge unavailable")
    )
)]
#[post("/devices/{id}/screenshot")]
/// Capture a one-shot screenshot; no session is created.
pub async fn screenshot(state: web::Data<AppState>, id: web::Path<String>) -> impl Responder {
    let device_id = id.into_inner();
    match state.supervisor.take_screenshot(&device_id).await {
        Ok(transfer) => HttpResponse::Ok().json(ScreenshotResponse { transfer }),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/devices/{id}/mirroring/start",
    params(("id" = String, Path, description = "Device serial")),
    request_body = StartMirroringRequest,
    responses(
        (status = 200, description = "Mirroring started", body = screen_hub_types::SessionSnapshot),
        (status = 409, description = "Device already has an active session"),
        (status = 422, description = "Extend mode not available on this host"),
        (status = 500, description = "Mirroring tool missing or failed to start")
    )
)]
#[post("/devices/{id}/mirroring/start")]
/// Start mirroring a device to the host.
pub async fn mirroring_start(
    state: web::Data<AppState>,
    id: web::Path<String>,
    body: web::Json<StartMirroringRequest>,
) -> impl Responder {
    let device_id = id.into_inner();
    let cfg = MirrorConfig {
        resolution: body.resolution.clone(),
        fps: body.fps,
        extend_display: body.extend_display,
    };
    tracing::info!(device_id = %device_id, extend = cfg.extend_display, "mirroring start request");
    match state.supervisor.start_mirroring(&device_id, cfg).await {
        Ok(snapshot) => HttpResponse::Ok().json(snapshot),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/devices/{id}/mirroring/stop",
    params(("id" = String, Path, description = "Device serial")),
    responses(
        (status = 200, description = "Mirroring stopped (or nothing to stop)", body = crate::models::StopMirroringResponse)
    )
)]
#[post("/devices/{id}/mirroring/stop")]
/// Stop a running mirroring session.
pub async fn mirroring_stop(state: web::Data<AppState>, id: web::Path<String>) -> impl Responder {
    let device_id = id.into_inner();
    let stopped = state.supervisor.stop_mirroring(&device_id).await;
    HttpResponse::Ok().json(StopMirroringResponse { stopped })
}

/// Port the device listens on after switching to TCP mode.
const WIFI_PORT: u16 = 5555;

#[utoipa::path(
    post,
    path = "/devices/{id}/wifi",
    params(("id" = String, Path, description = "Device serial (USB-attached)")),
    responses(
        (status = 200, description = "Device reachable over the network", body = crate::models::WifiConnectResponse),
        (status = 422, description = "Device Wi-Fi address could not be determined"),
        (status = 500, description = "Mode switch or connect failed")
    )
)]
#[post("/devices/{id}/wifi")]
/// Switch a USB-attached device to TCP mode and reconnect over Wi-Fi.
pub async fn connect_wifi(state: web::Data<AppState>, id: web::Path<String>) -> impl Responder {
    let device_id = id.into_inner();
    let adb = state.registry().adb().clone();
    let Some(ip) = adb.device_ip(&device_id).await else {
        return HttpResponse::UnprocessableEntity().json(ErrorBody {
            error: format!("device {device_id} has no readable wlan0 address"),
        });
    };
    if let Err(e) = adb.tcpip(&device_id, WIFI_PORT).await {
        return HttpResponse::InternalServerError().json(ErrorBody {
            error: e.to_string(),
        });
    }
    // The device restarts its bridge daemon after the mode switch.
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    match adb.connect(&ip, WIFI_PORT).await {
        Ok(()) => {
            let connected = format!("{ip}:{WIFI_PORT}");
            tracing::info!(device_id = %device_id, serial = %connected, "device connected over wifi");
            HttpResponse::Ok().json(WifiConnectResponse { connected })
        }
        Err(e) => HttpResponse::InternalServerError().json(ErrorBody {
            error: e.to_string(),
        }),
    }
}

#[utoipa::path(
    post,
    path = "/devices/{id}/disconnect",
    params(("id" = String, Path, description = "Network device serial (`host:port`)")),
    responses(
        (status = 200, description = "Disconnect attempted", body = crate::models::DisconnectResponse)
    )
)]
#[post("/devices/{id}/disconnect")]
/// Disconnect a network-attached device.
pub async fn disconnect_device(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> impl Responder {
    let device_id = id.into_inner();
    let disconnected = state.registry().adb().disconnect(&device_id).await;
    HttpResponse::Ok().json(DisconnectResponse { disconnected })
}

#[utoipa::path(
    post,
    path = "/settings/output-folder",
    request_body = OutputFolderRequest,
    responses(
        (status = 200, description = "Persisted; applies at next start"),
        (status = 409, description = "No config file to persist to"),
        (status = 500, description = "Write failed")
    )
)]
#[post("/settings/output-folder")]
/// Persist a new output folder to the config file. Takes effect at the
/// next server start.
pub async fn update_output_folder(
    state: web::Data<AppState>,
    body: web::Json<OutputFolderRequest>,
) -> impl Responder {
    let Some(path) = state.config_path.as_ref() else {
        return HttpResponse::Conflict().json(ErrorBody {
            error: "no config file configured; use --config".to_string(),
        });
    };
    match crate::config::update_output_folder(path, std::path::Path::new(&body.output_folder)) {
        Ok(()) => {
            tracing::info!(output_folder = %body.output_folder, "output folder persisted");
            HttpResponse::Ok().finish()
        }
        Err(e) => {
            tracing::error!(error = %e, "output folder update failed");
            HttpResponse::InternalServerError().json(ErrorBody {
                error: e.to_string(),
            })
        }
    }
}
