use std::sync::Arc;

use atlas_slicer::{
    Session, Volume,
    server::{AppState, router},
};
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use ndarray::Array3;
use serde_json::{Value, json};
use tower::ServiceExt;

fn app() -> Router {
    let data = Array3::from_shape_fn((20, 16, 12), |(ap, dv, ml)| (ap * 40 + dv * 2 + ml) as u16);
    router(AppState::new(Session::new(Arc::new(Volume::new(data)))))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

async fn json_of(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn serves_the_viewer_page() {
    let app = app();
    let (status, body) = send(&app, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    let page = String::from_utf8(body).unwrap();
    assert!(page.contains("Coronal") && page.contains("Sagittal") && page.contains("Transverse"));
}

#[tokio::test]
async fn initial_state_is_coronal_middle_frame() {
    let app = app();
    let (status, state) = json_of(&app, "GET", "/api/state", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["view"], "coronal");
    assert_eq!(state["frame"], 10);
    assert_eq!(state["n_frame"], 20);
    assert_eq!((state["width"].as_u64(), state["height"].as_u64()), (Some(12), Some(16)));
    assert_eq!(state["annotations"], json!([]));
}

#[tokio::test]
async fn switching_view_updates_frame_bound() {
    let app = app();
    let (_, state) = json_of(&app, "POST", "/api/view", Some(json!({ "view": "sagittal" }))).await;
    assert_eq!(state["view"], "sagittal");
    assert_eq!(state["n_frame"], 12);
    assert_eq!((state["width"].as_u64(), state["height"].as_u64()), (Some(20), Some(16)));
}

#[tokio::test]
async fn out_of_range_sliders_are_rejected() {
    let app = app();
    let (status, body) = json_of(&app, "POST", "/api/frame", Some(json!({ "frame": 21 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("21"));

    let (status, _) = json_of(&app, "POST", "/api/rotation", Some(json!({ "h": 0, "v": -101 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, state) = json_of(&app, "POST", "/api/rotation", Some(json!({ "h": 100, "v": -100 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!((state["h"].as_i64(), state["v"].as_i64()), (Some(100), Some(-100)));

    let (_, state) = json_of(&app, "POST", "/api/rotation/reset", Some(json!({ "axis": "v" }))).await;
    assert_eq!((state["h"].as_i64(), state["v"].as_i64()), (Some(100), Some(0)));
}

#[tokio::test]
async fn reference_png_has_plane_size() {
    let app = app();
    json_of(&app, "POST", "/api/view", Some(json!({ "view": "transverse" }))).await;
    let (status, bytes) = send(&app, "GET", "/api/reference.png", None).await;
    assert_eq!(status, StatusCode::OK);
    let image = image::load_from_memory(&bytes).unwrap();
    assert_eq!((image.width(), image.height()), (12, 20));
}

#[tokio::test]
async fn annotations_are_replaced_and_cleared() {
    let app = app();
    let points = json!([{ "x": 1.0, "y": 2.0 }, { "x": 3.5, "y": 4.5 }]);
    let (_, state) = json_of(&app, "PUT", "/api/annotations", Some(points.clone())).await;
    assert_eq!(state["annotations"], points);

    let (status, _) = json_of(&app, "POST", "/api/detect", Some(json!({ "detector": "good-features" }))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, state) = json_of(&app, "POST", "/api/annotations/clear", None).await;
    assert_eq!(state["annotations"], json!([]));
}

#[tokio::test]
async fn unknown_detector_is_a_client_error() {
    let app = app();
    let (status, _) = send(&app, "POST", "/api/detect", Some(json!({ "detector": "surf" }))).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn broken_upload_falls_back_to_placeholder() {
    let app = app();
    let request = Request::builder()
        .method("PUT")
        .uri("/api/target")
        .body(Body::from("not an image"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let state: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(state["target_placeholder"], true);

    let (status, bytes) = send(&app, "GET", "/api/target.png", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(image::load_from_memory(&bytes).is_ok());
}
