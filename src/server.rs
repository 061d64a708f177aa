//! HTTP surface of the viewer.
//!
//! The browser document in `assets/index.html` drives the session through a
//! small JSON API; every mutating route answers with a fresh
//! [`SessionSnapshot`] and the page reloads the panel images afterwards.

use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
};
use image::{DynamicImage, ImageFormat};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::enums::{Detector, Orientation, RotationAxis};
use crate::feature::Keypoint;
use crate::session::{Session, SessionError, SessionSnapshot};

const INDEX_HTML: &str = include_str!("../assets/index.html");
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    session: Arc<Mutex<Session>>,
}

impl AppState {
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Session>, ApiError> {
        self.session.lock().map_err(|_| ApiError::Poisoned)
    }
}

#[derive(Debug)]
pub enum ApiError {
    Session(SessionError),
    Encode(image::ImageError),
    Poisoned,
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        ApiError::Session(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Session(SessionError::Render) => {
                (StatusCode::INTERNAL_SERVER_ERROR, SessionError::Render.to_string())
            }
            ApiError::Session(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::Encode(err) => {
                error!(error = %err, "png encoding failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            ApiError::Poisoned => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "session state is unavailable".to_string(),
            ),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Deserialize)]
struct ViewRequest {
    view: Orientation,
}

#[derive(Deserialize)]
struct FrameRequest {
    frame: usize,
}

#[derive(Deserialize)]
struct RotationRequest {
    h: i32,
    v: i32,
}

#[derive(Deserialize)]
struct ResetRequest {
    axis: RotationAxis,
}

#[derive(Deserialize, Default)]
struct DetectRequest {
    #[serde(default)]
    detector: Detector,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/state", get(snapshot))
        .route("/api/view", post(change_view))
        .route("/api/frame", post(set_frame))
        .route("/api/rotation", post(set_rotation))
        .route("/api/rotation/reset", post(reset_rotation))
        .route("/api/reference.png", get(reference_png))
        .route("/api/target.png", get(target_png))
        .route("/api/target", put(upload_target).delete(clear_target))
        .route("/api/detect", post(detect))
        .route("/api/annotations", put(set_annotations))
        .route("/api/annotations/clear", post(clear_annotations))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn snapshot(State(state): State<AppState>) -> ApiResult<Json<SessionSnapshot>> {
    Ok(Json(state.lock()?.snapshot()))
}

async fn change_view(
    State(state): State<AppState>,
    Json(request): Json<ViewRequest>,
) -> ApiResult<Json<SessionSnapshot>> {
    let mut session = state.lock()?;
    session.change_view(request.view);
    Ok(Json(session.snapshot()))
}

async fn set_frame(
    State(state): State<AppState>,
    Json(request): Json<FrameRequest>,
) -> ApiResult<Json<SessionSnapshot>> {
    let mut session = state.lock()?;
    session.set_frame(request.frame)?;
    Ok(Json(session.snapshot()))
}

async fn set_rotation(
    State(state): State<AppState>,
    Json(request): Json<RotationRequest>,
) -> ApiResult<Json<SessionSnapshot>> {
    let mut session = state.lock()?;
    session.set_rotation(request.h, request.v)?;
    Ok(Json(session.snapshot()))
}

async fn reset_rotation(
    State(state): State<AppState>,
    Json(request): Json<ResetRequest>,
) -> ApiResult<Json<SessionSnapshot>> {
    let mut session = state.lock()?;
    session.reset_rotation(request.axis);
    Ok(Json(session.snapshot()))
}

fn png_response(image: DynamicImage) -> ApiResult<Response> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .map_err(ApiError::Encode)?;
    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        bytes.into_inner(),
    )
        .into_response())
}

async fn reference_png(State(state): State<AppState>) -> ApiResult<Response> {
    let image = state.lock()?.reference_image()?;
    png_response(DynamicImage::ImageLuma8(image))
}

async fn target_png(State(state): State<AppState>) -> ApiResult<Response> {
    let image = state.lock()?.target_image().clone();
    png_response(DynamicImage::ImageRgba8(image))
}

async fn upload_target(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<SessionSnapshot>> {
    let mut session = state.lock()?;
    session.upload_target(&body);
    Ok(Json(session.snapshot()))
}

async fn clear_target(State(state): State<AppState>) -> ApiResult<Json<SessionSnapshot>> {
    let mut session = state.lock()?;
    session.clear_target();
    Ok(Json(session.snapshot()))
}

async fn detect(
    State(state): State<AppState>,
    request: Option<Json<DetectRequest>>,
) -> ApiResult<Json<SessionSnapshot>> {
    let request = request.map(|Json(request)| request).unwrap_or_default();
    let mut session = state.lock()?;
    session.detect(request.detector)?;
    Ok(Json(session.snapshot()))
}

async fn set_annotations(
    State(state): State<AppState>,
    Json(points): Json<Vec<Keypoint>>,
) -> ApiResult<Json<SessionSnapshot>> {
    let mut session = state.lock()?;
    session.set_annotations(points);
    Ok(Json(session.snapshot()))
}

async fn clear_annotations(State(state): State<AppState>) -> ApiResult<Json<SessionSnapshot>> {
    let mut session = state.lock()?;
    session.clear_annotations();
    Ok(Json(session.snapshot()))
}
