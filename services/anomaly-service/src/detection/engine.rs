use std::sync::Arc;
use std::time::Instant;

use chrono::{Timelike, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, instrument};
use watchpost_core::{detection_metrics, record_anomaly, record_suppressed};

use super::anomaly::CountSpikeRule;
use super::clock::{Clock, SystemClock};
use super::config::EvaluatorConfig;
use super::history::{AnomalyHistory, FrameHistory};
use super::rules::{default_object_rules, tally, FrameRule, ObjectRule, RuleContext};
use super::types::{Anomaly, DetectedObject, FrameDims};
use super::EvalError;

/// Applies the rule set to one frame at a time and owns the frame and anomaly histories.
///
/// Not internally synchronised. Give each worker its own instance or wrap it in [`SharedEvaluator`].
pub struct AnomalyEvaluator {
    cfg: EvaluatorConfig,
    object_rules: Vec<Box<dyn ObjectRule + Send + Sync>>,
    frame_rules: Vec<Box<dyn FrameRule + Send + Sync>>,
    frames: FrameHistory,
    seen: AnomalyHistory,
    clock: Arc<dyn Clock>,
}

impl AnomalyEvaluator {
    pub fn from_config(cfg: EvaluatorConfig) -> Result<Self, EvalError> {
        cfg.validate()?;
        let object_rules = default_object_rules(&cfg);
        let frame_rules: Vec<Box<dyn FrameRule + Send + Sync>> = vec![Box::new(CountSpikeRule::from_config(&cfg))];
        Ok(Self {
            frames: FrameHistory::new(cfg.frame_history_capacity),
            seen: AnomalyHistory::new(cfg.anomaly_history_capacity),
            object_rules,
            frame_rules,
            clock: Arc::new(SystemClock),
            cfg,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Appends a per-object rule after the built-ins.
    pub fn with_object_rule(mut self, rule: impl ObjectRule + Send + Sync + 'static) -> Self {
        self.object_rules.push(Box::new(rule));
        self
    }

    pub fn with_frame_rule(mut self, rule: impl FrameRule + Send + Sync + 'static) -> Self {
        self.frame_rules.push(Box::new(rule));
        self
    }

    pub fn config(&self) -> &EvaluatorConfig { &self.cfg }
    pub fn frame_history(&self) -> &FrameHistory { &self.frames }
    pub fn anomaly_history(&self) -> &AnomalyHistory { &self.seen }
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.object_rules.iter().map(|r| r.name()).chain(self.frame_rules.iter().map(|r| r.name())).collect()
    }

    pub fn reset(&mut self) {
        self.frames.clear();
        self.seen.clear();
    }

    /// Evaluates one frame. Input is validated before any history is touched.
    #[instrument(skip(self, objects), fields(objects = objects.len()))]
    pub fn evaluate(&mut self, objects: &[DetectedObject], frame_dims: Option<FrameDims>) -> Result<Vec<Anomaly>, EvalError> {
        for o in objects { o.validate()?; }
        if let Some(d) = &frame_dims { d.validate()?; }

        let start = Instant::now();
        let now = self.clock.now();
        let ctx = RuleContext { timestamp: now.with_timezone(&Utc), hour: now.hour(), frame_dims };

        let mut candidates = Vec::new();
        for obj in objects {
            for rule in &self.object_rules { rule.check(obj, &ctx, &mut candidates); }
        }

        self.frames.record(ctx.timestamp, objects.to_vec());
        for rule in &self.frame_rules { rule.check(objects, &self.frames, &ctx, &mut candidates); }

        if !candidates.is_empty() { debug!(candidates = ?tally(&candidates), "rules matched"); }
        let anomalies = self.suppress_repeats(candidates, &ctx);

        let metrics = detection_metrics();
        metrics.frames_total.add(1, &[]);
        metrics.evaluate_latency_ms.record(start.elapsed().as_secs_f64() * 1000.0, &[]);
        if !anomalies.is_empty() {
            info!(count = anomalies.len(), kinds = ?anomalies.iter().map(|a| a.kind.as_str()).collect::<Vec<_>>(), "anomalies emitted");
        }
        Ok(anomalies)
    }

    fn suppress_repeats(&mut self, candidates: Vec<Anomaly>, ctx: &RuleContext) -> Vec<Anomaly> {
        let mut kept = Vec::with_capacity(candidates.len());
        for a in candidates {
            let key = a.dedup_key();
            if self.seen.admit(key.clone(), ctx.timestamp) {
                record_anomaly(a.kind.as_str());
                kept.push(a);
            } else {
                debug!(%key, "repeat anomaly suppressed");
                record_suppressed(a.kind.as_str());
            }
        }
        kept
    }
}

/// Evaluator behind a mutex, for hosts that call from several tasks.
#[derive(Clone)]
pub struct SharedEvaluator {
    inner: Arc<Mutex<AnomalyEvaluator>>,
}

impl SharedEvaluator {
    pub fn new(evaluator: AnomalyEvaluator) -> Self { Self { inner: Arc::new(Mutex::new(evaluator)) } }

    pub fn evaluate(&self, objects: &[DetectedObject], frame_dims: Option<FrameDims>) -> Result<Vec<Anomaly>, EvalError> {
        self.inner.lock().evaluate(objects, frame_dims)
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut AnomalyEvaluator) -> R) -> R { f(&mut self.inner.lock()) }
}
