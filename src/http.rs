use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, StatusCode};
use percent_encoding::percent_decode_str;
use serde::Serialize;
use serde_json::json;

use crate::analytics;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::models::{FeatureInput, Features, Outcome};
use crate::predictor::Predictor;
use crate::store::{Dataset, DatasetStore, UploadPolicy};

const STUDENT_ANALYTICS_PREFIX: &str = "/analytics/";
const KNOWN_PATHS: [&str; 6] = [
    "/health",
    "/students",
    "/predict",
    "/analytics",
    "/upload",
    "/download",
];

#[derive(Clone)]
pub struct HttpState {
    store: Arc<DatasetStore>,
    predictor: Arc<dyn Predictor>,
    updated_path: PathBuf,
    current_path: PathBuf,
    policy: UploadPolicy,
}

impl HttpState {
    pub fn new(
        store: Arc<DatasetStore>,
        predictor: Arc<dyn Predictor>,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            predictor,
            updated_path: config.updated_path.clone(),
            current_path: config.current_path.clone(),
            policy: config.upload_policy,
        }
    }
}

pub async fn serve(
    addr: SocketAddr,
    state: HttpState,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    let make_svc = make_service_fn(move |_| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let state = state.clone();
                async move { Ok::<_, Infallible>(handle_request(state, req).await) }
            }))
        }
    });

    let server = hyper::Server::try_bind(&addr)?.serve(make_svc);
    tracing::info!(%addr, "listening");
    server.with_graceful_shutdown(shutdown).await?;
    Ok(())
}

pub async fn handle_request(state: HttpState, req: Request<Body>) -> Response<Body> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let mut response = route(&state, req).await;
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));

    let status = response.status();
    if status.is_server_error() {
        tracing::error!(%method, %path, status = status.as_u16(), "request failed");
    } else {
        tracing::info!(%method, %path, status = status.as_u16(), "request");
    }
    response
}

async fn route(state: &HttpState, req: Request<Body>) -> Response<Body> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (&method, path.as_str()) {
        (&Method::OPTIONS, _) => preflight(),
        (&Method::GET, "/health") => {
            json_response(StatusCode::OK, &json!({ "message": "API is working!" }))
        }
        (&Method::GET, "/students") => students(state),
        (&Method::POST, "/predict") => predict(state, req).await,
        (&Method::GET, "/analytics") => cohort_analytics(state),
        (&Method::GET, p) if p.starts_with(STUDENT_ANALYTICS_PREFIX) => {
            let raw = &p[STUDENT_ANALYTICS_PREFIX.len()..];
            let name = percent_decode_str(raw).decode_utf8_lossy();
            student_analytics(state, &name)
        }
        (&Method::POST, "/upload") => upload(state, req).await,
        (&Method::GET, "/download") => download(state),
        (_, p) if KNOWN_PATHS.contains(&p) || p.starts_with(STUDENT_ANALYTICS_PREFIX) => {
            json_response(
                StatusCode::METHOD_NOT_ALLOWED,
                &json!({ "error": "method not allowed" }),
            )
        }
        _ => json_response(StatusCode::NOT_FOUND, &json!({ "error": "not found" })),
    }
}

fn students(state: &HttpState) -> Response<Body> {
    let dataset = state.store.all();
    json_response(StatusCode::OK, &dataset.records())
}

#[derive(Serialize)]
struct PredictResponse {
    prediction: Outcome,
    score: f64,
}

async fn predict(state: &HttpState, req: Request<Body>) -> Response<Body> {
    match predict_inner(state, req).await {
        Ok(score) => json_response(
            StatusCode::OK,
            &PredictResponse {
                prediction: Outcome::from_score(score),
                score,
            },
        ),
        Err(err) => error_response(err.status(), &err),
    }
}

async fn predict_inner(state: &HttpState, req: Request<Body>) -> AppResult<f64> {
    let body = hyper::body::to_bytes(req.into_body())
        .await
        .map_err(|e| AppError::Feature(format!("unreadable body: {e}")))?;
    let input: FeatureInput =
        serde_json::from_slice(&body).map_err(|e| AppError::Feature(e.to_string()))?;
    let features = Features::try_from(input)?;
    state.predictor.predict_one(&features)
}

/// Stored rows are not client input, so a bad one is a server failure here.
fn stored_data_status(err: &AppError) -> StatusCode {
    match err {
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn cohort_analytics(state: &HttpState) -> Response<Body> {
    let dataset = state.store.all();
    match analytics::cohort_overview(&dataset, state.predictor.as_ref()) {
        Ok(overview) => json_response(StatusCode::OK, &overview),
        Err(err) => error_response(stored_data_status(&err), &err),
    }
}

fn student_analytics(state: &HttpState, name: &str) -> Response<Body> {
    let dataset = state.store.all();
    match analytics::student_detail(&dataset, state.predictor.as_ref(), name) {
        Ok(detail) => json_response(StatusCode::OK, &detail),
        Err(err) => error_response(stored_data_status(&err), &err),
    }
}

async fn upload(state: &HttpState, req: Request<Body>) -> Response<Body> {
    match upload_inner(state, req).await {
        Ok(rows) => {
            tracing::info!(
                rows,
                path = %state.updated_path.display(),
                "dataset replaced from upload"
            );
            json_response(
                StatusCode::OK,
                &json!({ "message": "File uploaded successfully! Data updated." }),
            )
        }
        Err(err) => {
            tracing::warn!(error = %err, "upload rejected");
            let message = err.to_string();
            json_response(
                err.status(),
                &json!({ "error": message, "message": message }),
            )
        }
    }
}

async fn upload_inner(state: &HttpState, req: Request<Body>) -> AppResult<usize> {
    let boundary = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| multer::parse_boundary(value).ok())
        .ok_or_else(|| AppError::InvalidUpload("expected a multipart/form-data body".to_string()))?;

    let mut multipart = multer::Multipart::new(req.into_body(), boundary);
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidUpload(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let is_csv = field
            .file_name()
            .is_some_and(|name| name.to_ascii_lowercase().ends_with(".csv"));
        if !is_csv {
            return Err(AppError::InvalidUpload(
                "Invalid file format! Please upload a CSV file.".to_string(),
            ));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidUpload(format!("failed to read upload: {e}")))?;
        let dataset = Dataset::from_reader(&data[..], state.policy)?;
        let rows = dataset.len();
        state
            .store
            .replace_with(dataset, |next| next.write_csv(&state.updated_path))?;
        return Ok(rows);
    }

    Err(AppError::InvalidUpload("No file part named 'file'".to_string()))
}

fn download(state: &HttpState) -> Response<Body> {
    let dataset = state.store.all();
    match dataset.write_csv(&state.current_path) {
        Ok(()) => {
            let filename = state
                .current_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| state.current_path.display().to_string());
            json_response(
                StatusCode::OK,
                &json!({ "message": "File ready for download", "filename": filename }),
            )
        }
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &err),
    }
}

fn preflight() -> Response<Body> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS")
        .header(ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type")
        .body(Body::empty())
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

fn error_response(status: StatusCode, err: &AppError) -> Response<Body> {
    json_response(status, &json!({ "error": err.to_string() }))
}

fn json_response<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Response<Body> {
    let (status, body) = match serde_json::to_vec(value) {
        Ok(body) => (status, body),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": format!("serialization failed: {e}") })
                .to_string()
                .into_bytes(),
        ),
    };
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}
