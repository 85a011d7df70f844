use std::io::Cursor;
use std::sync::{Arc, Mutex};

use anyhow::{Context, anyhow};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{DynamicImage, ImageFormat};
use serde_json::json;
use tracing::info;

use crate::detection::PpeDetector;
use crate::visualizer::Visualizer;

const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Shared state of the web handlers. Requests resolve synchronously (detect,
/// annotate, summarize) while holding the detector lock; concurrent uploads
/// simply queue on it.
#[derive(Clone)]
struct UiState {
    detector: Arc<Mutex<PpeDetector>>,
    visualizer: Arc<Visualizer>,
    system_info: String,
}

/// Browser form in front of the detector: one page with an image upload, a
/// confidence slider and two display checkboxes, answering with the
/// annotated image and the textual summary.
pub struct WebInterface {
    state: UiState,
}

impl WebInterface {
    pub fn new(
        detector: Arc<Mutex<PpeDetector>>,
        visualizer: Arc<Visualizer>,
        system_info: String,
    ) -> Self {
        Self {
            state: UiState {
                detector,
                visualizer,
                system_info,
            },
        }
    }

    /// Serves the interface, blocking until the server stops. `share` binds
    /// all interfaces instead of loopback.
    pub fn launch(self, share: bool, port: u16) -> anyhow::Result<()> {
        let app = Router::new()
            .route("/", get(index))
            .route("/detect", post(detect))
            .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
            .with_state(self.state);

        let host = if share { "0.0.0.0" } else { "127.0.0.1" };
        let addr = format!("{host}:{port}");

        let runtime = tokio::runtime::Runtime::new().context("failed to start UI runtime")?;
        runtime.block_on(async {
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            info!("web interface listening on http://{addr}");
            axum::serve(listener, app).await.context("server error")
        })
    }
}

async fn index(State(state): State<UiState>) -> Html<String> {
    Html(render_page(&state.system_info))
}

async fn detect(State(state): State<UiState>, multipart: Multipart) -> Response {
    match handle_detect(state, multipart).await {
        Ok(body) => Json(body).into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn handle_detect(
    state: UiState,
    mut multipart: Multipart,
) -> anyhow::Result<serde_json::Value> {
    let mut image_bytes: Option<Vec<u8>> = None;
    let mut confidence: Option<f32> = None;
    let mut show_labels = false;
    let mut show_confidence = false;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => image_bytes = Some(field.bytes().await?.to_vec()),
            Some("confidence") => confidence = field.text().await?.parse().ok(),
            Some("show_labels") => show_labels = true,
            Some("show_confidence") => show_confidence = true,
            _ => {}
        }
    }

    let image_bytes = image_bytes.ok_or_else(|| anyhow!("no image uploaded"))?;
    let image = image::load_from_memory(&image_bytes).context("could not decode image")?;

    let (prediction, threshold) = {
        let mut detector = state
            .detector
            .lock()
            .map_err(|_| anyhow!("detector lock poisoned"))?;
        let threshold = confidence.unwrap_or(detector.config().confidence_threshold);
        (detector.predict(&image, confidence)?, threshold)
    };

    let annotated = state
        .visualizer
        .annotate(&image, &prediction, show_labels, show_confidence);
    let summary = state.visualizer.summary_text(&prediction, threshold);

    let mut png = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(annotated)
        .write_to(&mut png, ImageFormat::Png)
        .context("could not encode annotated image")?;

    Ok(json!({
        "image": format!("data:image/png;base64,{}", BASE64.encode(png.into_inner())),
        "summary": summary,
    }))
}

fn render_page(system_info: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="pt-BR">
<head>
<meta charset="utf-8">
<title>Detecção de EPIs</title>
<style>
 body {{ font-family: sans-serif; max-width: 960px; margin: 2rem auto; }}
 .row {{ display: flex; gap: 2rem; }}
 .col {{ flex: 1; }}
 img {{ max-width: 100%; }}
 pre {{ background: #f4f4f4; padding: 1rem; }}
</style>
</head>
<body>
<h1>Detecção de EPIs com YOLOv8</h1>
<p>Sistema de detecção de equipamentos de proteção individual</p>
<div class="row">
  <div class="col">
    <form id="form">
      <p><input type="file" name="image" accept="image/*" required></p>
      <p><label>Confiança mínima:
        <input type="range" name="confidence" min="0.1" max="1.0" step="0.05" value="0.4"
               oninput="this.nextElementSibling.textContent = this.value">
        <span>0.4</span></label></p>
      <p>
        <label><input type="checkbox" name="show_labels" checked> Mostrar labels</label>
        <label><input type="checkbox" name="show_confidence" checked> Mostrar confiança</label>
      </p>
      <p><button type="submit">Detectar EPIs</button></p>
    </form>
  </div>
  <div class="col">
    <img id="result" alt="">
    <pre id="summary"></pre>
  </div>
</div>
<h3>Informações do sistema</h3>
<pre>{system_info}</pre>
<script>
document.getElementById('form').addEventListener('submit', async (event) => {{
  event.preventDefault();
  const response = await fetch('/detect', {{
    method: 'POST',
    body: new FormData(event.target),
  }});
  const body = await response.json();
  if (response.ok) {{
    document.getElementById('result').src = body.image;
    document.getElementById('summary').textContent = body.summary;
  }} else {{
    document.getElementById('summary').textContent = body.error;
  }}
}});
</script>
</body>
</html>"#
    )
}
