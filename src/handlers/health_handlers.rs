//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the record store, the scratch
//!   directory and the object store

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;
use tokio::fs;
use uuid::Uuid;

/// `GET /healthz`
///
/// Very small liveness probe. Always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Pings the record store.
/// 2. Performs a write/read/delete in the temp directory uploads are buffered in.
/// 3. Asks the object store backend whether it is reachable.
///
/// Returns JSON describing each check. HTTP 200 when all checks pass,
/// HTTP 503 when any check fails.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let ingest = &state.ingest;

    let database_check = match ingest.videos().ping().await {
        Ok(()) => (true, None::<String>),
        Err(e) => (false, Some(format!("error: {}", e))),
    };

    let tmp_path = ingest
        .temp_dir()
        .join(format!(".readyz-{}", Uuid::new_v4()));
    let temp_dir_check = match fs::write(&tmp_path, b"readyz").await {
        Ok(_) => {
            let read = fs::read(&tmp_path).await;
            // best-effort cleanup
            let _ = fs::remove_file(&tmp_path).await;
            match read {
                Ok(bytes) if bytes == b"readyz" => (true, None),
                Ok(_) => (false, Some("file content mismatch".to_string())),
                Err(e) => (false, Some(format!("could not read tmp file: {}", e))),
            }
        }
        Err(e) => (false, Some(format!("could not write tmp file: {}", e))),
    };

    let objects = ingest.objects();
    let object_store_check = match objects.check().await {
        Ok(()) => (true, None),
        Err(e) => (false, Some(format!("{} backend: {}", objects.backend_name(), e))),
    };

    let overall_ok = database_check.0 && temp_dir_check.0 && object_store_check.0;

    let mut checks = HashMap::new();
    for (name, (ok, error)) in [
        ("database", database_check),
        ("temp_dir", temp_dir_check),
        ("object_store", object_store_check),
    ] {
        checks.insert(name, CheckStatus { ok, error });
    }

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
