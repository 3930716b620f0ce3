//! The prediction web service: an HTML form (model selector and SMILES field), a JSON endpoint
//! with the same semantics, and a liveness check.
//!
//! ## Endpoints
//!
//! - `GET /` - The form
//! - `POST /` - Submit the form; renders the outcome
//! - `POST /api/predict` - JSON prediction
//! - `GET /health` - Health check

use std::{fmt::Write, str::FromStr, sync::Arc};

use axum::{
    Form, Json, Router,
    extract::State,
    http::StatusCode,
    response::Html,
    routing::{get, post},
};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    dataset::Histogram,
    infer::{Outcome, Predictor},
    regression::ModelKind,
    train::ReportSummary,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    predictor: Arc<Predictor>,
    report: Option<Arc<ReportSummary>>,
    title: Arc<str>,
}

impl AppState {
    pub fn new(predictor: Predictor, report: Option<ReportSummary>, title: &str) -> Self {
        Self {
            predictor: Arc::new(predictor),
            report: report.map(Arc::new),
            title: title.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    /// "Random Forest" or "SVM"
    pub model: String,
    #[serde(default)]
    pub smiles: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub model: String,
    /// None when the input was empty.
    pub prediction: Option<f64>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub models_loaded: Vec<String>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler).post(form_handler))
        .route("/api/predict", post(predict_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let models_loaded = ModelKind::ALL
        .into_iter()
        .filter(|k| state.predictor.has_model(*k))
        .map(|k| k.label().to_owned())
        .collect();

    Json(HealthResponse {
        status: "healthy".to_owned(),
        models_loaded,
    })
}

async fn index_handler(State(state): State<AppState>) -> Html<String> {
    Html(render_page(&state, ModelKind::RandomForest, "", &Outcome::Idle))
}

async fn form_handler(
    State(state): State<AppState>,
    Form(form): Form<PredictRequest>,
) -> (StatusCode, Html<String>) {
    let Ok(kind) = ModelKind::from_str(&form.model) else {
        let page = render_page(&state, ModelKind::RandomForest, &form.smiles, &Outcome::Idle);
        return (StatusCode::BAD_REQUEST, Html(page));
    };

    let outcome = state.predictor.submit(kind, &form.smiles);
    debug!("Form submission, {kind}, {:?}: {outcome:?}", form.smiles);

    (
        StatusCode::OK,
        Html(render_page(&state, kind, &form.smiles, &outcome)),
    )
}

async fn predict_handler(
    State(state): State<AppState>,
    Json(req): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, (StatusCode, Json<ErrorResponse>)> {
    let kind = ModelKind::from_str(&req.model).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
    })?;

    let outcome = state.predictor.submit(kind, &req.smiles);

    let status = match &outcome {
        Outcome::InvalidSmiles => Some(StatusCode::UNPROCESSABLE_ENTITY),
        Outcome::ModelMissing(_) => Some(StatusCode::SERVICE_UNAVAILABLE),
        _ => None,
    };
    if let Some(code) = status {
        return Err((
            code,
            Json(ErrorResponse {
                error: outcome.to_string(),
            }),
        ));
    }

    let prediction = match outcome {
        Outcome::Prediction(v) => Some(v),
        _ => None,
    };

    Ok(Json(PredictResponse {
        model: kind.label().to_owned(),
        prediction,
        message: outcome.message(),
    }))
}

/// Escape text for HTML content and double-quoted attribute values.
fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            _ => result.push(c),
        }
    }
    result
}

/// An SVG bar chart of the pChEMBL distribution.
fn render_histogram(hist: &Histogram) -> String {
    const W: f64 = 600.;
    const H: f64 = 200.;
    const PAD: f64 = 24.;

    let max_count = hist.counts.iter().copied().max().unwrap_or(0).max(1) as f64;
    let bar_w = (W - 2. * PAD) / hist.counts.len().max(1) as f64;

    let mut svg = format!(
        r#"<svg width="{W}" height="{H}" viewBox="0 0 {W} {H}" role="img" aria-label="pChEMBL distribution">"#
    );

    for (i, &c) in hist.counts.iter().enumerate() {
        let h = (H - 2. * PAD) * c as f64 / max_count;
        let x = PAD + i as f64 * bar_w;
        let y = H - PAD - h;
        let lo = hist.min + i as f64 * hist.bin_width();
        let _ = write!(
            svg,
            r##"<rect x="{x:.1}" y="{y:.1}" width="{:.1}" height="{h:.1}" fill="#4c72b0"><title>{lo:.2}: {c}</title></rect>"##,
            (bar_w - 1.).max(0.5)
        );
    }

    let _ = write!(
        svg,
        r#"<text x="{PAD}" y="{}" font-size="12">{:.2}</text><text x="{}" y="{}" font-size="12" text-anchor="end">{:.2}</text></svg>"#,
        H - 6.,
        hist.min,
        W - PAD,
        H - 6.,
        hist.max
    );

    svg
}

pub fn render_page(state: &AppState, selected: ModelKind, smiles: &str, outcome: &Outcome) -> String {
    let title = escape_html(&state.title);

    let mut options = String::new();
    for kind in ModelKind::ALL {
        let sel = if kind == selected { " selected" } else { "" };
        let _ = write!(options, r#"<option value="{0}"{sel}>{0}</option>"#, kind.label());
    }

    let result = match outcome.message() {
        Some(msg) => {
            let class = if outcome.is_error() { "error" } else { "success" };
            format!(r#"<p class="{class}">{}</p>"#, escape_html(&msg))
        }
        None => String::new(),
    };

    let distribution = match &state.report {
        Some(r) => format!(
            "<h2>pChEMBL distribution</h2><p>{} activities for {}</p>{}",
            r.num_records,
            escape_html(&r.target_id),
            render_histogram(&r.pchembl_histogram)
        ),
        None => String::new(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; max-width: 720px; margin: 2em auto; }}
.error {{ color: #b00020; }}
.success {{ color: #1b5e20; }}
</style>
</head>
<body>
<h1>{title}</h1>
<form method="post" action="/">
<label>Select Model <select name="model">{options}</select></label>
<label>Enter SMILES <input type="text" name="smiles" value="{}"></label>
<button type="submit">Predict</button>
</form>
{result}
{distribution}
</body>
</html>
"#,
        escape_html(smiles)
    )
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState, bind: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Serving on http://{}", listener.local_addr()?);

    axum::serve(listener, create_router(state)).await
}
