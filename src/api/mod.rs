//! HTTP surface for the dashboard GUI and the phone app.
//!
//! Two routes only: read the latest vitals, write control intent. Intent
//! writes are applied to the actuators synchronously so a tap in the app
//! changes the light immediately instead of on the next actuation tick.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use log::warn;
use serde::Serialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::acquisition::AcquisitionController;
use crate::actuation::Actuators;
use crate::control::{ControlChannel, ControlPatch};
use crate::vitals::VitalsStore;

pub struct ApiState {
    pub store: VitalsStore,
    pub control: ControlChannel,
    pub actuators: Actuators,
    pub acquisition: AcquisitionController,
}

/// Flat vitals record; every field is `null` until the first sample so
/// consumers can tell "no data yet" from a literal zero reading.
#[derive(Debug, Default, Serialize)]
struct VitalsResponse {
    heart_rate: Option<f64>,
    breathing_rate: Option<f64>,
    temperature: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/vitals", get(get_vitals))
        .route("/control", post(post_control))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn get_vitals(State(state): State<Arc<ApiState>>) -> Json<VitalsResponse> {
    let response = match state.store.read_latest().await {
        Some(sample) => VitalsResponse {
            heart_rate: Some(sample.heart_rate),
            breathing_rate: Some(sample.breathing_rate),
            temperature: Some(sample.temperature),
            humidity: Some(sample.humidity),
            pressure: Some(sample.pressure),
        },
        None => VitalsResponse::default(),
    };
    Json(response)
}

async fn post_control(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<ControlPatch>, JsonRejection>,
) -> Response {
    let Json(patch) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, &rejection.body_text());
        }
    };

    let merged = match state.control.write_intent(patch) {
        Ok(merged) => merged,
        Err(err) => {
            warn!("failed to persist control intent: {err:#}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &format!("{err:#}"));
        }
    };

    // Apply right away; the actuation loop will converge to the same state
    // on its next tick anyway.
    let status = state.acquisition.status().await;
    state.actuators.apply(&merged, status);

    (
        StatusCode::OK,
        Json(json!({ "status": "received", "data": merged })),
    )
        .into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioEngineHandle;
    use crate::light::LoggingLight;
    use crate::notify::Notifier;
    use crate::sensing::environment::EnvHandle;
    use crate::sensing::SensorReader;
    use crate::settings::Settings;
    use crate::vitals::VitalsSample;
    use axum::body::Body;
    use axum::http::{header, Request};
    use chrono::Local;
    use http_body_util::BodyExt;
    use std::fs;
    use std::path::PathBuf;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn test_state() -> (Arc<ApiState>, PathBuf) {
        let dir = std::env::temp_dir().join(format!("sleepdoc-api-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let settings = Arc::new(Settings {
            data_dir: dir.join("data_collected"),
            live_vitals_path: dir.join("live_vitals.txt"),
            selection_path: dir.join("vsd_selection.json"),
            stop_marker_path: dir.join("stop_vitals"),
            ..Settings::default()
        });
        let store = VitalsStore::new();
        let acquisition = AcquisitionController::new(
            SensorReader::new(None, EnvHandle::new()),
            store.clone(),
            Notifier::new(None),
            settings.clone(),
        );
        let state = ApiState {
            store,
            control: ControlChannel::new(settings.selection_path.clone()),
            actuators: Actuators::new(Arc::new(LoggingLight), AudioEngineHandle::new()),
            acquisition,
        };
        (Arc::new(state), dir)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn vitals_all_null_before_first_sample() {
        let (state, dir) = test_state();
        let response = router(state)
            .oneshot(Request::get("/vitals").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        for field in [
            "heart_rate",
            "breathing_rate",
            "temperature",
            "humidity",
            "pressure",
        ] {
            assert!(body[field].is_null(), "{field} should be null");
        }
        fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn vitals_reflect_latest_sample() {
        let (state, dir) = test_state();
        state
            .store
            .update(VitalsSample {
                timestamp: Local::now(),
                heart_rate: 67.5,
                breathing_rate: 14.25,
                temperature: 21.0,
                humidity: 44.0,
                pressure: 1012.0,
            })
            .await;

        let response = router(state)
            .oneshot(Request::get("/vitals").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["heart_rate"], 67.5);
        assert_eq!(body["breathing_rate"], 14.25);
        fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn control_persists_and_echoes() {
        let (state, dir) = test_state();
        let request = Request::post("/control")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"light_on": true, "light_mode": "fresh", "brightness": 80}"#,
            ))
            .unwrap();
        let response = router(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "received");
        assert_eq!(body["data"]["light_mode"], "fresh");
        assert_eq!(body["data"]["brightness"], 80);

        let persisted = state.control.read_intent();
        assert!(persisted.light_on);
        assert_eq!(persisted.light_mode.as_deref(), Some("fresh"));
        fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn control_clamps_brightness_end_to_end() {
        let (state, dir) = test_state();
        let request = Request::post("/control")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"brightness": 300}"#))
            .unwrap();
        let response = router(state.clone()).oneshot(request).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["data"]["brightness"], 100);
        assert_eq!(state.control.read_intent().brightness, 100);
        fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn malformed_control_body_is_a_client_error() {
        let (state, dir) = test_state();
        let request = Request::post("/control")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{definitely not json"))
            .unwrap();
        let response = router(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert!(body["error"].is_string());
        // No state mutation on a rejected payload.
        assert!(!state.control.read_intent().light_on);
        fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn partial_control_update_merges() {
        let (state, dir) = test_state();
        let first = Request::post("/control")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"light_on": true, "light_mode": "love", "brightness": 60}"#,
            ))
            .unwrap();
        router(state.clone()).oneshot(first).await.unwrap();

        let second = Request::post("/control")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"brightness": 25}"#))
            .unwrap();
        let response = router(state.clone()).oneshot(second).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["data"]["light_mode"], "love");
        assert_eq!(body["data"]["brightness"], 25);
        fs::remove_dir_all(dir).unwrap();
    }
}
