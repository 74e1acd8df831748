//! Frame anomaly evaluation over object-detector output.
//!
//! The [`detection`] module holds the rule engine. [`run`] hosts one evaluator behind
//! the ingest queue, reading frame requests as JSON lines on stdin and writing one
//! report per frame to stdout.

pub mod detection;
pub mod ingest;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use watchpost_core::{init_tracing, load_config};

use detection::{AnomalyEvaluator, EvaluatorConfig};
use ingest::{start_ingest, FrameRequest, PushOutcome};

pub const SERVICE_NAME: &str = "anomaly-service";

fn default_queue_capacity() -> usize { 64 }
fn default_max_objects() -> usize { 1024 }

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub service_name: String,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_max_objects")]
    pub max_objects_per_frame: usize,
    /// YAML rule file; built-in defaults when unset.
    #[serde(default)]
    pub rules_file: Option<String>,
}

impl ServiceConfig {
    pub fn evaluator_config(&self) -> Result<EvaluatorConfig> {
        match &self.rules_file {
            Some(path) => EvaluatorConfig::load_rules_file(path).with_context(|| format!("loading rules from {path}")),
            None => Ok(EvaluatorConfig::default()),
        }
    }
}

pub async fn run() -> Result<()> {
    init_tracing(SERVICE_NAME)?;
    let cfg: ServiceConfig = load_config(SERVICE_NAME)?;
    info!(?cfg, "config loaded");

    let evaluator = AnomalyEvaluator::from_config(cfg.evaluator_config()?)?;
    info!(rules = ?evaluator.rule_names(), "evaluator ready");

    let (report_tx, mut report_rx) = mpsc::channel(cfg.queue_capacity.max(1));
    let (handle, worker) = start_ingest(cfg.queue_capacity, cfg.max_objects_per_frame, evaluator, report_tx);

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(report) = report_rx.recv().await {
            let mut line = serde_json::to_vec(&report)?;
            line.push(b'\n');
            stdout.write_all(&line).await?;
            stdout.flush().await?;
        }
        anyhow::Ok(())
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0u64;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() { continue; }
        let req: FrameRequest = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => { warn!(line = line_no, error = %e, "malformed frame request skipped"); continue; }
        };
        match handle.push(req).await? {
            PushOutcome::Accepted => {}
            outcome => warn!(line = line_no, ?outcome, "frame dropped"),
        }
    }

    drop(handle);
    let evaluator = worker.await?;
    writer.await??;
    info!(frames = evaluator.frame_history().len(), remembered = evaluator.anomaly_history().len(), "input closed, shutting down");
    Ok(())
}
