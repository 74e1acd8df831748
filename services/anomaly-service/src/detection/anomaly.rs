use super::config::EvaluatorConfig;
use super::history::FrameHistory;
use super::rules::{FrameRule, RuleContext};
use super::types::{Anomaly, DetectedObject};

/// Flags a frame whose object count jumps well above the rolling baseline.
#[derive(Debug, Clone, Copy)]
pub struct CountSpikeRule {
    pub factor: f64, // current count must be strictly above factor * mean
    pub min_prior_frames: usize,
}

impl Default for CountSpikeRule {
    fn default() -> Self { Self { factor: 3.0, min_prior_frames: 10 } }
}

impl CountSpikeRule {
    pub fn from_config(cfg: &EvaluatorConfig) -> Self {
        Self { factor: cfg.spike_factor, min_prior_frames: cfg.spike_min_prior_frames }
    }
}

impl FrameRule for CountSpikeRule {
    fn name(&self) -> &'static str { "count_spike" }

    /// Expects the current frame to already be the newest history entry; it is left out of the baseline.
    /// A zero baseline makes any non-empty frame a spike.
    fn check(&self, objects: &[DetectedObject], history: &FrameHistory, ctx: &RuleContext, out: &mut Vec<Anomaly>) {
        if history.prior_len() < self.min_prior_frames { return; }
        let Some(mean) = history.prior_mean_count() else { return; };
        let count = objects.len();
        if count as f64 > self.factor * mean {
            out.push(Anomaly::count_spike(count, mean, ctx.timestamp));
        }
    }
}
