use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, DefaultBodyLimit, Multipart,
        Path, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use pcb_assemble::{
    generate, AssembleError, CircuitDescription, GenerationReport, IndexOptions, PipelineOptions,
    DEFAULT_PROJECT,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, ServerConfig};

const RUN_META: &str = "run.json";

pub fn router() -> Router<AppState> {
    const MAX_UPLOAD: usize = 10 * 1024 * 1024;
    Router::new()
        .route("/health", get(health))
        .route("/generate", post(generate_json))
        .route("/upload", post(upload))
        .route("/runs/{id}/board", get(get_board))
        .route("/runs/{id}/gerbers.zip", get(get_gerbers))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Deserialize)]
struct GenerateRequest {
    #[serde(default)]
    project: Option<String>,
    design: serde_json::Value,
}

#[derive(Serialize)]
struct GenerateResponse {
    id: String,
    created: String,
    board_url: String,
    gerbers_url: String,
    report: GenerationReport,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Stored next to each run so downloads can find its files.
#[derive(Debug, Serialize, Deserialize)]
struct RunMeta {
    id: String,
    project: String,
    created: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

async fn generate_json(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(request) = payload
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, &format!("Invalid request: {e}")))?;
    run_generation(&state, request.project, request.design).await
}

async fn upload(
    State(state): State<AppState>,
    multipart_result: Result<Multipart, MultipartRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let mut multipart = multipart_result
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, &format!("Upload error: {e}")))?;
    let mut file_data: Option<Vec<u8>> = None;
    let mut project = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            let data = field
                .bytes()
                .await
                .map_err(|_| error_response(StatusCode::BAD_REQUEST, "Failed to read upload"))?;
            file_data = Some(data.to_vec());
        } else if name == "project" {
            let value = field.text().await.unwrap_or_default();
            if !value.trim().is_empty() {
                project = Some(value.trim().to_string());
            }
        }
    }

    let data =
        file_data.ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "No file uploaded"))?;
    let design: serde_json::Value = serde_json::from_slice(&data).map_err(|e| {
        error_response(
            StatusCode::BAD_REQUEST,
            &format!("Design file is not valid JSON: {e}"),
        )
    })?;
    run_generation(&state, project, design).await
}

async fn run_generation(
    state: &AppState,
    project: Option<String>,
    design: serde_json::Value,
) -> Result<Json<GenerateResponse>, ApiError> {
    let desc = CircuitDescription::from_value(design).map_err(assemble_error)?;
    let project = project.unwrap_or_else(|| DEFAULT_PROJECT.to_string());

    let id = Uuid::new_v4().to_string();
    let (report, meta) = store_run(&state.config, &id, project, desc).await?;

    tracing::info!(
        "Run {id}: {} placed, {} tracks, {} skipped",
        report.assembly.placed.len(),
        report.assembly.tracks,
        report.assembly.skipped.len()
    );

    let base_url = &state.config.base_url;
    Ok(Json(GenerateResponse {
        board_url: format!("{base_url}/runs/{id}/board"),
        gerbers_url: format!("{base_url}/runs/{id}/gerbers.zip"),
        id,
        created: meta.created,
        report,
    }))
}

/// Generate into `OUTPUT_DIR/<id>/` and record the run. A failed run leaves
/// no directory behind.
async fn store_run(
    config: &ServerConfig,
    id: &str,
    project: String,
    desc: CircuitDescription,
) -> Result<(GenerationReport, RunMeta), ApiError> {
    let run_dir = config.output_dir.join(id);
    let stored = write_run(config, id, &run_dir, project, desc).await;
    if stored.is_err() {
        if let Err(e) = tokio::fs::remove_dir_all(&run_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Cannot remove failed run {id}: {e}");
            }
        }
    }
    stored
}

async fn write_run(
    config: &ServerConfig,
    id: &str,
    run_dir: &std::path::Path,
    project: String,
    desc: CircuitDescription,
) -> Result<(GenerationReport, RunMeta), ApiError> {
    // Library roots named in a request body are not scanned; the server
    // only reads its configured footprint paths.
    let opts = PipelineOptions {
        project_name: project.clone(),
        output_root: run_dir.to_path_buf(),
        index: IndexOptions {
            system_libraries: config.system_libraries,
            extra_roots: config.footprint_paths.clone(),
        },
        description_libraries: false,
        pad_aliases: config.pad_aliases.clone(),
        bundle_zip: true,
        ..Default::default()
    };

    let report = tokio::task::spawn_blocking(move || generate(&desc, &opts))
        .await
        .map_err(|e| {
            tracing::error!("Generation task failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Generation failed")
        })?
        .map_err(assemble_error)?;

    let meta = RunMeta {
        id: id.to_string(),
        project,
        created: chrono::Utc::now().to_rfc3339(),
    };
    let meta_json = serde_json::to_vec(&meta).map_err(|_| {
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "JSON serialization failed",
        )
    })?;
    tokio::fs::write(run_dir.join(RUN_META), meta_json)
        .await
        .map_err(|e| {
            tracing::error!("Cannot store run metadata for {id}: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store run")
        })?;

    Ok((report, meta))
}

async fn get_board(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (run_dir, meta) = load_run(&state, &id).await?;
    let file_name = format!("{}.kicad_pcb", meta.project);
    let path = run_dir.join(&meta.project).join(&file_name);
    serve_file(path, file_name, "application/octet-stream").await
}

async fn get_gerbers(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (run_dir, meta) = load_run(&state, &id).await?;
    let file_name = format!("{}-gerbers.zip", meta.project);
    let path = run_dir.join(&meta.project).join(&file_name);
    serve_file(path, file_name, "application/zip").await
}

async fn load_run(state: &AppState, id: &str) -> Result<(std::path::PathBuf, RunMeta), ApiError> {
    // run directories are named by issued UUIDs only
    let id = Uuid::parse_str(id)
        .map_err(|_| error_response(StatusCode::NOT_FOUND, "Run not found"))?
        .to_string();
    let run_dir = state.config.output_dir.join(&id);
    let meta_bytes = tokio::fs::read(run_dir.join(RUN_META))
        .await
        .map_err(|_| error_response(StatusCode::NOT_FOUND, "Run not found"))?;
    let meta: RunMeta = serde_json::from_slice(&meta_bytes)
        .map_err(|_| error_response(StatusCode::INTERNAL_SERVER_ERROR, "Invalid run metadata"))?;
    Ok((run_dir, meta))
}

async fn serve_file(
    path: std::path::PathBuf,
    file_name: String,
    content_type: &'static str,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| error_response(StatusCode::NOT_FOUND, "File not found"))?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    ))
}

fn status_for(err: &AssembleError) -> StatusCode {
    match err {
        AssembleError::ProjectName(_) => StatusCode::BAD_REQUEST,
        AssembleError::InvalidDescription(_)
        | AssembleError::UnparsedDescription
        | AssembleError::Config(_)
        | AssembleError::Outline(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn assemble_error(err: AssembleError) -> ApiError {
    let status = status_for(&err);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("Generation error: {err}");
        error_response(status, "Generation failed")
    } else {
        error_response(status, &err.to_string())
    }
}

fn error_response(status: StatusCode, msg: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: msg.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use pcb_assemble::PadAliasTable;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const R0805: &str = r#"(footprint "R_0805_2012Metric" (layer "F.Cu")
  (pad "1" smd roundrect (at -0.9125 0) (size 1.025 1.4) (layers "F.Cu" "F.Paste" "F.Mask") (roundrect_rratio 0.25))
  (pad "2" smd roundrect (at 0.9125 0) (size 1.025 1.4) (layers "F.Cu" "F.Paste" "F.Mask") (roundrect_rratio 0.25))
)"#;

    fn config(root: &std::path::Path) -> ServerConfig {
        let lib = root.join("libs").join("Resistor_SMD.pretty");
        std::fs::create_dir_all(&lib).unwrap();
        std::fs::write(lib.join("R_0805_2012Metric.kicad_mod"), R0805).unwrap();
        ServerConfig {
            output_dir: root.join("runs"),
            footprint_paths: vec![root.join("libs")],
            system_libraries: false,
            pad_aliases: PadAliasTable::default(),
            base_url: "http://test".to_string(),
        }
    }

    fn app(root: &std::path::Path) -> Router {
        router().with_state(AppState {
            config: Arc::new(config(root)),
        })
    }

    fn design() -> Value {
        json!({
            "board": {"size": {"width": 50, "height": 30}},
            "components": [
                {"name": "R1", "footprint": "R_0805_2012Metric", "position": {"x": 10, "y": 10}}
            ]
        })
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let tmp = tempfile::tempdir().unwrap();
        let response = app(tmp.path())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_generate_then_download() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app(tmp.path());

        let response = app
            .clone()
            .oneshot(post_json(
                "/generate",
                json!({"project": "blink", "design": design()}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["report"]["project"], "blink");
        assert_eq!(body["report"]["gerber_files"].as_array().unwrap().len(), 7);
        let id = body["id"].as_str().unwrap().to_string();
        assert_eq!(
            body["board_url"],
            format!("http://test/runs/{id}/board").as_str()
        );

        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/runs/{id}/board"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(bytes.starts_with(b"(kicad_pcb"));

        let response = app
            .oneshot(
                Request::get(format!("/runs/{id}/gerbers.zip"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/zip"
        );
    }

    #[tokio::test]
    async fn test_upload_multipart() {
        let tmp = tempfile::tempdir().unwrap();
        let boundary = "X-PCB-BOUNDARY";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"design.json\"\r\n\
             Content-Type: application/json\r\n\r\n\
             {}\r\n\
             --{boundary}\r\n\
             Content-Disposition: form-data; name=\"project\"\r\n\r\n\
             uploaded\r\n\
             --{boundary}--\r\n",
            design()
        );
        let request = Request::post("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();

        let response = app(tmp.path()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["report"]["project"], "uploaded");
        assert_eq!(body["report"]["placed"][0]["name"], "R1");
    }

    #[tokio::test]
    async fn test_unparsed_description_is_unprocessable() {
        let tmp = tempfile::tempdir().unwrap();
        let response = app(tmp.path())
            .oneshot(post_json(
                "/generate",
                json!({"design": {"raw_response": "sorry, here is a circuit"}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_bad_project_name() {
        let tmp = tempfile::tempdir().unwrap();
        let response = app(tmp.path())
            .oneshot(post_json(
                "/generate",
                json!({"project": "../etc", "design": design()}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"]
            .as_str()
            .unwrap()
            .contains("project name"));
    }

    #[tokio::test]
    async fn test_unknown_run() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app(tmp.path());
        for uri in ["/runs/not-a-uuid/board", "/runs/6f1c1f0e-4d3b-4c8e-9a51-0e1f2a3b4c5d/board"] {
            let response = app
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_request_libraries_are_not_scanned() {
        let tmp = tempfile::tempdir().unwrap();
        let private = tmp.path().join("private").join("Capacitor_SMD.pretty");
        std::fs::create_dir_all(&private).unwrap();
        std::fs::write(private.join("C_0402_1005Metric.kicad_mod"), R0805).unwrap();

        let mut design = design();
        design["components"][0]["footprint"] = json!("C_0402_1005Metric");
        design["libraries"] = json!({"footprint_paths": [tmp.path().join("private")]});

        let response = app(tmp.path())
            .oneshot(post_json("/generate", json!({"design": design})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let placed = &body_json(response).await["report"]["placed"][0];
        assert_eq!(placed["method"], "placeholder");
        assert_eq!(placed["footprint"], "Resistor_SMD:R_0805_2012Metric");
    }

    #[tokio::test]
    async fn test_failed_run_leaves_no_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path());
        let id = "0d6c8e52-2f0b-4a7e-8c1d-5b9f3e2a1c40";
        // A file where the Gerber directory belongs makes the export fail
        // after the board file is written.
        let project_dir = config.output_dir.join(id).join("demo");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(project_dir.join("gerbers"), b"").unwrap();

        let desc = CircuitDescription::from_value(design()).unwrap();
        let (status, _) = store_run(&config, id, "demo".to_string(), desc)
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!config.output_dir.join(id).exists());
        assert!(config.output_dir.exists());
    }
}
