use utoipa::OpenApi;

use crate::api;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::relay::index,
        api::relay::video_feed,
        api::relay::shutdown,
        api::relay::select_monitor,
        api::control::devices_list,
        api::control::device_storage,
        api::control::device_capabilities,
        api::control::sessions_list,
        api::control::recording_presets,
        api::control::recording_start,
        api::control::recording_stop,
        api::control::test_recording,
        api::control::screenshot,
        api::control::mirroring_start,
        api::control::mirroring_stop,
        api::control::connect_wifi,
        api::control::disconnect_device,
        api::control::update_output_folder,
    ),
    components(
        schemas(
            models::DevicesResponse,
            models::StorageResponse,
            models::CapabilitiesResponse,
            models::SessionsResponse,
            models::PresetsResponse,
            models::StartRecordingRequest,
            models::StopRecordingResponse,
            models::ScreenshotResponse,
            models::StartMirroringRequest,
            models::OutputFolderRequest,
            models::WifiConnectResponse,
            models::DisconnectResponse,
            models::StopMirroringResponse,
            models::MonitorResponse,
            models::ShutdownResponse,
            models::ErrorBody,
            screen_hub_types::DeviceInfo,
            screen_hub_types::DeviceTransport,
            screen_hub_types::StorageInfo,
            screen_hub_types::RecordingCapabilities,
            screen_hub_types::RecordingConfig,
            screen_hub_types::RecordingPreset,
            screen_hub_types::SessionSnapshot,
            screen_hub_types::SessionKind,
            screen_hub_types::SessionState,
            screen_hub_types::TransferRecord,
            screen_hub_types::TransferOutcome,
        )
    ),
    tags(
        (name = "screen-hub-server", description = "Screen recording and mirroring control API")
    )
)]
pub struct ApiDoc;
