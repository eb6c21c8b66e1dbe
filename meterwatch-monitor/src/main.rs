// Meterwatch Monitor - HTTP service for electricity theft detection
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Meterwatch Monitor
//!
//! Serves live risk scores from a metering board (or its simulation),
//! synthesizes labelled scenarios and runs batch detection on them.
//!
//! ## Usage
//!
//! ```bash
//! # Serve on the default port with the board on /dev/ttyACM0
//! meterwatch-monitor serve
//!
//! # Simulated readings, custom port
//! meterwatch-monitor --mode simulation serve --port 9000
//!
//! # Generate a theft scenario, evaluate it and save it as CSV
//! meterwatch-monitor --mode simulation generate --scenario theft
//!
//! # Print ten live scores
//! meterwatch-monitor probe --count 10
//! ```

mod config;
mod error;
mod metrics;
mod poller;
mod store;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use clap::{Parser, Subcommand};
use config::MonitorConfig;
use error::MonitorError;
use meterwatch::{LiveRiskScorer, LiveVerdict, ReadingSource, SourceMode};
use meterwatch_detect::{tabulate, DetectionResult, DetectionRow, HybridEngine};
use meterwatch_testdata::{Scenario, Synthesizer};
use metrics::encode_metrics;
use poller::{LivePoller, LiveSnapshot, PollerHandle, SharedSource};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use store::{CsvStore, StoreError};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Meterwatch theft detection monitor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Reading source (hardware, simulation)
    #[arg(short, long, global = true)]
    mode: Option<SourceMode>,

    /// Sensor link: device path or tcp://host:port
    #[arg(long, global = true)]
    connection: Option<String>,

    /// Seed for simulated readings and scenario noise
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Dataset CSV path
    #[arg(long, global = true)]
    data_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Run the HTTP service
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,
    },
    /// Synthesize a scenario, evaluate it and save it
    Generate {
        /// Scenario to synthesize (normal, theft)
        #[arg(short, long, default_value = "normal")]
        scenario: Scenario,
    },
    /// Print live scores from the reading source
    Probe {
        /// Number of polls
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
    },
}

impl Args {
    /// Configuration file (or defaults) with command-line overrides applied.
    fn monitor_config(&self) -> Result<MonitorConfig, MonitorError> {
        let mut config = match &self.config {
            Some(path) => MonitorConfig::from_json_file(path)?,
            None => MonitorConfig::default(),
        };

        if let Some(mode) = self.mode {
            config.source.mode = mode;
        }
        if let Some(connection) = &self.connection {
            config.source.connection = connection.clone();
        }
        if let Some(seed) = self.seed {
            config.source.seed = Some(seed);
        }
        if let Some(path) = &self.data_path {
            config.data_path = path.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

/// Application state shared across handlers.
struct AppState {
    source: SharedSource,
    poller: PollerHandle,
    synthesizer: Synthesizer,
    engine: HybridEngine,
    store: CsvStore,
    last_scenario: RwLock<Option<Scenario>>,
    start_time: Instant,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Meterwatch Monitor v{}", env!("CARGO_PKG_VERSION"));

    let result = match args.monitor_config() {
        Ok(config) => {
            let command = args.command.unwrap_or(Command::Serve { port: 8000 });
            match command {
                Command::Serve { port } => serve(config, args.seed, port).await,
                Command::Generate { scenario } => generate(config, args.seed, scenario),
                Command::Probe { count } => probe(config, count).await,
            }
        }
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn synthesizer(config: &MonitorConfig, seed: Option<u64>) -> Result<Synthesizer, MonitorError> {
    let synthesizer = Synthesizer::new(config.synth.clone())?;
    Ok(match seed {
        Some(s) => synthesizer.with_seed(s),
        None => synthesizer,
    })
}

async fn serve(config: MonitorConfig, seed: Option<u64>, port: u16) -> Result<(), MonitorError> {
    let source = ReadingSource::connect(&config.source)?;
    info!("Reading source: {}", source.status().as_str());
    metrics::update_source_metrics(source.is_hardware());

    let source: SharedSource = Arc::new(Mutex::new(source));
    let poller = LivePoller::new(Arc::clone(&source), LiveRiskScorer::new(config.band))
        .with_interval(Duration::from_millis(config.poll_interval_ms))
        .with_history_len(config.history_len)
        .spawn();

    let state = Arc::new(AppState {
        source,
        poller,
        synthesizer: synthesizer(&config, seed)?,
        engine: HybridEngine::new(config.detection.clone()),
        store: CsvStore::new(&config.data_path),
        last_scenario: RwLock::new(None),
        start_time: Instant::now(),
    });

    // Build router
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/generate/:mode", get(generate_handler))
        .route("/detect", get(detect_handler))
        .route("/detect/batch", get(batch_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .with_state(Arc::clone(&state));

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting server on http://{}", addr);
    info!("Metrics endpoint: http://{}/metrics", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.poller.stop();
    state.source.lock().await.close();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

fn generate(config: MonitorConfig, seed: Option<u64>, scenario: Scenario) -> Result<(), MonitorError> {
    let mut source = ReadingSource::connect(&config.source)?;
    let generated = synthesizer(&config, seed)?.generate(&mut source, scenario);
    source.close();

    let result = HybridEngine::new(config.detection.clone()).evaluate(&generated.series);
    let store = CsvStore::new(&config.data_path);
    store.save(&generated.series, Some(&result))?;

    println!(
        "Generated {} points ({} from hardware), scenario {}",
        generated.len(),
        generated.hardware_points,
        scenario
    );
    println!("Risk score: {}", result.risk_score);
    println!("Verdict:    {}", result.verdict);
    println!("Reason:     {}", result.reason);
    println!("Saved to:   {}", store.path().display());
    Ok(())
}

async fn probe(config: MonitorConfig, count: usize) -> Result<(), MonitorError> {
    let mut source = ReadingSource::connect(&config.source)?;
    let scorer = LiveRiskScorer::new(config.band);
    let interval = Duration::from_millis(config.poll_interval_ms);

    for _ in 0..count {
        let outcome = source.next_reading();
        match outcome.value() {
            Some(reading) => {
                let result = scorer.score(reading);
                println!(
                    "{:<11} {:>8.2} kWh  risk {:>3}  {}",
                    outcome.as_str(),
                    result.consumption.kwh(),
                    result.risk_score,
                    result.verdict
                );
            }
            None => println!("{:<11} no reading yet", outcome.as_str()),
        }
        tokio::time::sleep(interval).await;
    }

    source.close();
    Ok(())
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    #[derive(Serialize)]
    struct ErrorBody {
        error: String,
    }

    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Root handler - shows a simple HTML page.
async fn root_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Meterwatch Monitor</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 800px; margin: 50px auto; padding: 20px; }
        h1 { color: #2c3e50; }
        a { color: #3498db; text-decoration: none; }
        a:hover { text-decoration: underline; }
        .endpoints { background: #f8f9fa; padding: 20px; border-radius: 8px; margin: 20px 0; }
        .endpoint { margin: 10px 0; }
        code { background: #e9ecef; padding: 2px 6px; border-radius: 4px; }
    </style>
</head>
<body>
    <h1>Meterwatch Monitor</h1>
    <p>Electricity theft detection for smart-meter consumption.</p>

    <div class="endpoints">
        <h2>Endpoints</h2>
        <div class="endpoint"><a href="/detect">/detect</a> - Live risk score (JSON)</div>
        <div class="endpoint"><a href="/generate/normal">/generate/normal</a> - Synthesize a normal scenario</div>
        <div class="endpoint"><a href="/generate/theft">/generate/theft</a> - Synthesize a theft scenario</div>
        <div class="endpoint"><a href="/detect/batch">/detect/batch</a> - Hybrid detection on the saved dataset</div>
        <div class="endpoint"><a href="/metrics">/metrics</a> - Prometheus metrics</div>
        <div class="endpoint"><a href="/health">/health</a> - Health check</div>
        <div class="endpoint"><a href="/status">/status</a> - Status information (JSON)</div>
    </div>

    <h2>Metrics</h2>
    <ul>
        <li><code>meterwatch_live_risk_score</code> - Latest live risk score</li>
        <li><code>meterwatch_live_verdict</code> - Verdict (0=Normal, 1=Warning, 2=Theft)</li>
        <li><code>meterwatch_live_consumption_kwh</code> - Latest smoothed consumption</li>
        <li><code>meterwatch_batch_risk_score</code> - Risk of the last batch evaluation</li>
        <li><code>meterwatch_batch_drop_percent</code> - Drop against the rolling baseline</li>
        <li><code>meterwatch_batch_evaluations_total</code> - Batch evaluations by verdict</li>
    </ul>
</body>
</html>"#,
    )
}

#[derive(Serialize)]
struct GenerateResponse {
    mode: Scenario,
    points: usize,
    hardware_points: usize,
    path: String,
}

/// Synthesize a scenario and save it as the current dataset.
async fn generate_handler(
    State(state): State<Arc<AppState>>,
    Path(mode): Path<String>,
) -> Response {
    let scenario: Scenario = match mode.parse() {
        Ok(s) => s,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let task_state = Arc::clone(&state);
    let task = tokio::task::spawn_blocking(move || {
        let generated = {
            let mut source = task_state.source.blocking_lock();
            task_state.synthesizer.generate(&mut source, scenario)
        };
        task_state.store.save(&generated.series, None)?;
        Ok::<_, StoreError>(generated)
    });

    match task.await {
        Ok(Ok(generated)) => {
            metrics::record_generated(scenario);
            *state.last_scenario.write().await = Some(scenario);
            Json(GenerateResponse {
                mode: scenario,
                points: generated.len(),
                hardware_points: generated.hardware_points,
                path: state.store.path().display().to_string(),
            })
            .into_response()
        }
        Ok(Err(e)) => {
            error!("Failed to save dataset: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => {
            error!("Generation task failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "generation failed")
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
struct DetectResponse {
    consumption: f64,
    risk_score: u8,
    verdict: LiveVerdict,
    anomaly: bool,
    reason: String,
    outcome: &'static str,
    scenario: Option<Scenario>,
}

impl DetectResponse {
    fn from_snapshot(snapshot: &LiveSnapshot, scenario: Option<Scenario>) -> Option<Self> {
        let result = snapshot.result.as_ref()?;
        Some(Self {
            consumption: result.consumption.kwh(),
            risk_score: result.risk_score,
            verdict: result.verdict,
            anomaly: result.is_theft(),
            reason: result.reason.clone(),
            outcome: snapshot.outcome,
            scenario,
        })
    }
}

/// Latest live score.
async fn detect_handler(State(state): State<Arc<AppState>>) -> Response {
    let scenario = *state.last_scenario.read().await;
    match state
        .poller
        .latest()
        .and_then(|s| DetectResponse::from_snapshot(&s, scenario))
    {
        Some(body) => Json(body).into_response(),
        None => error_response(StatusCode::SERVICE_UNAVAILABLE, "no reading yet"),
    }
}

#[derive(Serialize)]
struct BatchResponse {
    scenario: Option<Scenario>,
    result: DetectionResult,
    rows: Vec<DetectionRow>,
}

/// Hybrid detection over the saved dataset.
async fn batch_handler(State(state): State<Arc<AppState>>) -> Response {
    if !state.store.exists() {
        return error_response(
            StatusCode::NOT_FOUND,
            "no dataset, call /generate/normal or /generate/theft first",
        );
    }

    let task_state = Arc::clone(&state);
    let task = tokio::task::spawn_blocking(move || {
        let series = task_state.store.load()?;
        let result = task_state.engine.evaluate(&series);
        Ok::<_, StoreError>((series, result))
    });

    match task.await {
        Ok(Ok((series, result))) => {
            metrics::record_evaluation(&result);
            info!(
                "Batch evaluation: risk {} ({}, {})",
                result.risk_score, result.verdict, result.reason
            );
            Json(BatchResponse {
                scenario: *state.last_scenario.read().await,
                rows: tabulate(&series, &result),
                result,
            })
            .into_response()
        }
        Ok(Err(StoreError::Empty)) => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, "dataset is empty")
        }
        Ok(Err(e)) => {
            error!("Failed to load dataset: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => {
            error!("Detection task failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "detection failed")
        }
    }
}

/// Metrics handler - returns Prometheus text format.
async fn metrics_handler() -> impl IntoResponse {
    let metrics = encode_metrics();
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        metrics,
    )
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Status information response.
#[derive(Serialize)]
struct StatusResponse {
    version: String,
    uptime_secs: u64,
    source: SourceStatusInfo,
    poller_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_scenario: Option<Scenario>,
    dataset: DatasetStatus,
    recent: Vec<LiveSnapshot>,
}

#[derive(Serialize)]
struct SourceStatusInfo {
    status: &'static str,
    hardware: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    fallback_reason: Option<String>,
    window_len: usize,
}

#[derive(Serialize)]
struct DatasetStatus {
    path: String,
    exists: bool,
}

/// Status handler - returns JSON status information.
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let source = {
        let source = state.source.lock().await;
        SourceStatusInfo {
            status: source.status().as_str(),
            hardware: source.is_hardware(),
            fallback_reason: source.fallback_reason().map(str::to_string),
            window_len: source.window().len(),
        }
    };

    let mut recent = state.poller.history().await;
    let keep = recent.len().saturating_sub(10);
    recent.drain(..keep);

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        source,
        poller_running: state.poller.is_running(),
        last_scenario: *state.last_scenario.read().await,
        dataset: DatasetStatus {
            path: state.store.path().display().to_string(),
            exists: state.store.exists(),
        },
        recent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use meterwatch::{LiveRiskScorer, Reading};

    fn snapshot(kwh: Option<f64>) -> LiveSnapshot {
        LiveSnapshot {
            taken_at: NaiveDate::from_ymd_opt(2024, 2, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            outcome: if kwh.is_some() { "fresh" } else { "unavailable" },
            result: kwh.map(|v| LiveRiskScorer::default().score(Reading::new(v))),
        }
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::try_parse_from([
            "meterwatch-monitor",
            "--mode",
            "simulation",
            "--seed",
            "9",
            "--data-path",
            "/tmp/mw.csv",
            "generate",
            "--scenario",
            "theft",
        ])
        .unwrap();

        assert_eq!(
            args.command,
            Some(Command::Generate {
                scenario: Scenario::Theft
            })
        );
        let config = args.monitor_config().unwrap();
        assert_eq!(config.source.mode, SourceMode::Simulation);
        assert_eq!(config.source.seed, Some(9));
        assert_eq!(config.data_path, PathBuf::from("/tmp/mw.csv"));
    }

    #[test]
    fn test_args_defaults_and_errors() {
        let args = Args::try_parse_from(["meterwatch-monitor"]).unwrap();
        assert!(args.command.is_none());
        assert_eq!(args.monitor_config().unwrap().source.mode, SourceMode::Hardware);

        let args = Args::try_parse_from(["meterwatch-monitor", "serve", "-p", "9000"]).unwrap();
        assert_eq!(args.command, Some(Command::Serve { port: 9000 }));

        assert!(Args::try_parse_from(["meterwatch-monitor", "--mode", "carrier-pigeon"]).is_err());
        assert!(Args::try_parse_from(["meterwatch-monitor", "generate", "-s", "tamper"]).is_err());
    }

    #[test]
    fn test_detect_response_for_theft() {
        let body = DetectResponse::from_snapshot(&snapshot(Some(0.0)), Some(Scenario::Theft)).unwrap();
        assert_eq!(body.risk_score, 80);
        assert_eq!(body.verdict, LiveVerdict::Theft);
        assert!(body.anomaly);
        assert_eq!(body.scenario, Some(Scenario::Theft));

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["verdict"], "THEFT DETECTED");
        assert_eq!(json["scenario"], "theft");
    }

    #[test]
    fn test_detect_response_warning_is_not_anomaly() {
        let body = DetectResponse::from_snapshot(&snapshot(Some(6.0)), None).unwrap();
        assert_eq!(body.risk_score, 70);
        assert_eq!(body.verdict, LiveVerdict::Warning);
        assert!(!body.anomaly);
    }

    #[test]
    fn test_no_reading_yet() {
        assert!(DetectResponse::from_snapshot(&snapshot(None), None).is_none());
    }
}
