//! Local streaming relay handlers.
//!
//! Serves the host screen as an MJPEG stream plus the small viewer page the
//! device browser loads. Each `/video_feed` connection gets its own frame
//! generator; all of them share the relay stop flag.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{Error, HttpResponse, Responder, get, route, web};
use bytes::Bytes;
use futures_util::stream::unfold;

use crate::capture::{FrameSource, encode_jpeg, placeholder_jpeg};
use crate::models::{ErrorBody, MonitorResponse, ShutdownResponse};
use crate::state::AppState;

const VIEWER_HTML: &str = include_str!("viewer.html");

/// Delay between the stop acknowledgement and the forced system stop, so
/// the response and open streams can flush.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(750);

struct FeedState {
    state: web::Data<AppState>,
    interval: tokio::time::Interval,
}

fn frame_chunk(jpeg: &[u8]) -> Bytes {
    let mut buf = Vec::with_capacity(jpeg.len() + 64);
    buf.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n");
    buf.extend_from_slice(format!("Content-Length: {}\r\n\r\n", jpeg.len()).as_bytes());
    buf.extend_from_slice(jpeg);
    buf.extend_from_slice(b"\r\n");
    Bytes::from(buf)
}

#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Viewer page"))
)]
#[get("/")]
/// Serve the embedded stream viewer page.
pub async fn index() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(VIEWER_HTML)
}

#[utoipa::path(
    get,
    path = "/video_feed",
    responses(
        (status = 200, description = "MJPEG stream of the selected host monitor")
    )
)]
#[get("/video_feed")]
/// Stream the selected host monitor as motion JPEG.
pub async fn video_feed(state: web::Data<AppState>) -> impl Responder {
    let fps = state.relay.fps.max(1);
    let mut interval =
        tokio::time::interval(Duration::from_millis((1000 / u64::from(fps)).max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let stream = unfold(
        FeedState {
            state: state.clone(),
            interval,
        },
        |mut ctx| async move {
            if ctx.state.relay.stopping() {
                return None;
            }
            ctx.interval.tick().await;
            if ctx.state.relay.stopping() {
                return None;
            }

            let frames: Arc<dyn FrameSource> = ctx.state.frames.clone();
            let monitor = ctx.state.relay.monitor();
            let quality = ctx.state.relay.jpeg_quality;
            // Capture is a blocking platform call; keep it off the worker.
            let captured = web::block(move || {
                frames
                    .capture(monitor)
                    .and_then(|frame| encode_jpeg(&frame, quality))
            })
            .await;

            let jpeg = match captured {
                Ok(Ok(jpeg)) => jpeg,
                Ok(Err(e)) => {
                    if ctx.state.relay.strict {
                        tracing::warn!(error = %e, monitor = monitor, "capture failed; ending stream");
                        return None;
                    }
                    tracing::debug!(error = %e, monitor = monitor, "capture failed; sending placeholder");
                    placeholder_jpeg(quality)
                }
                Err(_) => return None,
            };
            Some((Ok::<Bytes, Error>(frame_chunk(&jpeg)), ctx))
        },
    );

    HttpResponse::Ok()
        .content_type("multipart/x-mixed-replace; boundary=frame")
        .streaming(stream)
}

#[utoipa::path(
    get,
    path = "/shutdown",
    responses((status = 200, description = "Shutdown initiated", body = crate::models::ShutdownResponse))
)]
#[route("/shutdown", method = "GET", method = "POST")]
/// Stop all streams and schedule server shutdown.
pub async fn shutdown(state: web::Data<AppState>) -> impl Responder {
    tracing::info!("shutdown requested over http");
    state.relay.request_stop();
    tokio::spawn(async {
        tokio::time::sleep(SHUTDOWN_GRACE).await;
        if let Some(system) = actix_web::rt::System::try_current() {
            system.stop();
        } else {
            std::process::exit(0);
        }
    });
    HttpResponse::Ok().json(ShutdownResponse { stopping: true })
}

#[utoipa::path(
    get,
    path = "/monitor/{index}",
    params(("index" = usize, Path, description = "Host monitor index")),
    responses(
        (status = 200, description = "Monitor selected", body = crate::models::MonitorResponse),
        (status = 404, description = "No such monitor")
    )
)]
#[get("/monitor/{index}")]
/// Select which host monitor the relay streams.
pub async fn select_monitor(
    state: web::Data<AppState>,
    path: web::Path<usize>,
) -> impl Responder {
    let monitor_index = path.into_inner();
    let available = state.frames.monitor_count();
    if monitor_index >= available {
        return HttpResponse::NotFound().json(ErrorBody {
            error: format!("monitor {monitor_index} not found ({available} available)"),
        });
    }
    state.relay.select_monitor(monitor_index);
    tracing::info!(monitor = monitor_index, "relay monitor selected");
    HttpResponse::Ok().json(MonitorResponse { monitor_index })
}
