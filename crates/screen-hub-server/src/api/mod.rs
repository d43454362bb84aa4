//! HTTP API handlers.
//!
//! Defines the Actix routes for the streaming relay and the device/session
//! control surface.

pub mod control;
pub mod relay;

pub use control::{
    connect_wifi, device_capabilities, device_storage, devices_list, disconnect_device,
    mirroring_start, mirroring_stop, recording_presets, recording_start, recording_stop,
    screenshot, sessions_list, test_recording, update_output_folder,
};
pub use relay::{index, select_monitor, shutdown, video_feed};

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    use actix_web::{App, test};

    use device_bridge::{AdbClient, NoopVirtualDisplay, SessionSupervisor};
    use screen_hub_types::RecordingConfig;

    use crate::api;
    use crate::capture::testing::FakeFrameSource;
    use crate::models::StartRecordingRequest;
    use crate::state::{AppState, RelayState};

    fn make_state() -> actix_web::web::Data<AppState> {
        let output_dir = std::env::temp_dir().join(format!(
            "screen-hub-api-smoke-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let supervisor = SessionSupervisor::new(
            Arc::new(AdbClient::with_program("/nonexistent/path/to/adb")),
            Arc::new(NoopVirtualDisplay),
            output_dir,
            None,
        );
        actix_web::web::Data::new(AppState {
            supervisor,
            recording_defaults: RecordingConfig::default(),
            frames: Arc::new(FakeFrameSource { monitors: 2 }),
            relay: RelayState {
                stop: AtomicBool::new(false),
                monitor_index: AtomicUsize::new(0),
                jpeg_quality: 80,
                fps: 30,
                strict: false,
            },
            config_path: None,
        })
    }

    #[actix_web::test]
    async fn devices_list_is_empty_without_a_bridge() {
        let state = make_state();
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .service(api::devices_list),
        )
        .await;
        let req = test::TestRequest::get().uri("/devices").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["devices"], serde_json::json!([]));
    }

    #[actix_web::test]
    async fn sessions_list_starts_empty() {
        let state = make_state();
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .service(api::sessions_list),
        )
        .await;
        let req = test::TestRequest::get().uri("/sessions").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["sessions"], serde_json::json!([]));
    }

    #[actix_web::test]
    async fn recording_presets_are_served() {
        let state = make_state();
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .service(api::recording_presets),
        )
        .await;
        let req = test::TestRequest::get().uri("/recording-presets").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let presets = body["presets"].as_array().unwrap();
        assert!(!presets.is_empty());
        assert!(presets.iter().any(|p| p["name"] == "balanced"));
        assert!(presets.iter().all(|p| p["config"]["bitrate_mbps"].is_u64()));
    }

    #[actix_web::test]
    async fn recording_start_without_a_bridge_is_503() {
        let state = make_state();
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .service(api::recording_start),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/devices/ABC123/recording/start")
            .set_json(StartRecordingRequest::default())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[actix_web::test]
    async fn stops_without_sessions_are_no_ops() {
        let state = make_state();
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .service(api::recording_stop)
                .service(api::mirroring_stop),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/devices/ABC123/recording/stop")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["stopped"], serde_json::json!(false));

        let req = test::TestRequest::post()
            .uri("/devices/ABC123/mirroring/stop")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["stopped"], serde_json::json!(false));
    }

    #[actix_web::test]
    async fn monitor_selection_validates_the_index() {
        let state = make_state();
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .service(api::select_monitor),
        )
        .await;
        let req = test::TestRequest::get().uri("/monitor/5").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri("/monitor/1").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        assert_eq!(state.relay.monitor(), 1);
    }

    #[actix_web::test]
    async fn viewer_page_embeds_the_stream() {
        let state = make_state();
        let app =
            test::init_service(App::new().app_data(state.clone()).service(api::index)).await;
        let req = test::TestRequest::get().uri("/").to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert!(String::from_utf8_lossy(&body).contains("/video_feed"));
    }

    #[actix_web::test]
    async fn video_feed_ends_once_stopped() {
        let state = make_state();
        state.relay.request_stop();
        let app = test::init_service(
            App::new().app_data(state.clone()).service(api::video_feed),
        )
        .await;
        let req = test::TestRequest::get().uri("/video_feed").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let content_type = resp
            .headers()
            .get(actix_web::http::header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(content_type.starts_with("multipart/x-mixed-replace"));
        let body = test::read_body(resp).await;
        assert!(body.is_empty());
    }

    #[actix_web::test]
    async fn shutdown_sets_the_stop_flag() {
        let state = make_state();
        let app =
            test::init_service(App::new().app_data(state.clone()).service(api::shutdown)).await;
        let req = test::TestRequest::post().uri("/shutdown").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        assert!(state.relay.stopping());
    }
}
