//! Rule configuration passed to the evaluator at construction time.
//!
//! Rule files are YAML:
//!
//! ```yaml
//! person_min_confidence: 0.75
//! prohibited_classes: [67, 56, 43]
//! time_restrictions:
//!   0: { start_hour: 22, end_hour: 6 }
//! zones:
//!   - name: server-rack
//!     bounds: [0.6, 0.0, 1.0, 0.5]
//!     restricted_classes: [0]
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::types::PERSON_CLASS_ID;
use super::EvalError;

/// Restricted hours, `[start_hour, end_hour)` in local time.
/// When `start_hour > end_hour` the window wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl TimeWindow {
    pub fn new(start_hour: u32, end_hour: u32) -> Self { Self { start_hour, end_hour } }

    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour > self.end_hour {
            hour >= self.start_hour || hour < self.end_hour
        } else {
            hour >= self.start_hour && hour < self.end_hour
        }
    }

    fn validate(&self, class_id: u32) -> Result<(), EvalError> {
        if self.start_hour > 23 || self.end_hour > 23 {
            return Err(EvalError::Configuration(format!(
                "time restriction for class {class_id}: hours must be in 0..=23, got {}..{}", self.start_hour, self.end_hour
            )));
        }
        if self.start_hour == self.end_hour {
            return Err(EvalError::Configuration(format!(
                "time restriction for class {class_id}: start_hour equals end_hour ({})", self.start_hour
            )));
        }
        Ok(())
    }
}

/// Fractional frame rectangle `[x1, y1, x2, y2]` with the classes barred from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub bounds: [f64; 4],
    pub restricted_classes: BTreeSet<u32>,
}

impl ZoneConfig {
    pub fn new(bounds: [f64; 4], restricted_classes: impl IntoIterator<Item = u32>) -> Self {
        Self { name: None, bounds, restricted_classes: restricted_classes.into_iter().collect() }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Inclusive on every edge.
    pub fn contains(&self, (fx, fy): (f64, f64)) -> bool {
        let [x1, y1, x2, y2] = self.bounds;
        fx >= x1 && fx <= x2 && fy >= y1 && fy <= y2
    }

    pub fn label(&self, index: usize) -> String {
        self.name.clone().unwrap_or_else(|| format!("zone-{index}"))
    }

    fn validate(&self, index: usize) -> Result<(), EvalError> {
        let [x1, y1, x2, y2] = self.bounds;
        if self.bounds.iter().any(|v| !v.is_finite() || !(0.0..=1.0).contains(v)) {
            return Err(EvalError::Configuration(format!("{}: bounds {:?} must lie in [0,1]", self.label(index), self.bounds)));
        }
        if x1 > x2 || y1 > y2 {
            return Err(EvalError::Configuration(format!("{}: inverted bounds {:?}", self.label(index), self.bounds)));
        }
        Ok(())
    }
}

fn default_person_class() -> u32 { PERSON_CLASS_ID }
fn default_person_confidence() -> f32 { 0.75 }
// cell phone, chair, knife
fn default_prohibited() -> BTreeSet<u32> { [67, 56, 43].into_iter().collect() }
fn default_frame_capacity() -> usize { 30 }
fn default_anomaly_capacity() -> usize { 100 }
fn default_min_prior_frames() -> usize { 10 }
fn default_spike_factor() -> f64 { 3.0 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    #[serde(default = "default_person_class")]
    pub person_class_id: u32,
    /// Strict lower bound on person confidence for the restricted-hours rule.
    #[serde(default = "default_person_confidence")]
    pub person_min_confidence: f32,
    #[serde(default = "default_prohibited")]
    pub prohibited_classes: BTreeSet<u32>,
    /// Restricted hours keyed by class id. Only the person entry is consulted today.
    #[serde(default)]
    pub time_restrictions: HashMap<u32, TimeWindow>,
    #[serde(default)]
    pub zones: Vec<ZoneConfig>,
    #[serde(default = "default_frame_capacity")]
    pub frame_history_capacity: usize,
    #[serde(default = "default_anomaly_capacity")]
    pub anomaly_history_capacity: usize,
    #[serde(default = "default_min_prior_frames")]
    pub spike_min_prior_frames: usize,
    #[serde(default = "default_spike_factor")]
    pub spike_factor: f64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            person_class_id: default_person_class(),
            person_min_confidence: default_person_confidence(),
            prohibited_classes: default_prohibited(),
            time_restrictions: HashMap::new(),
            zones: Vec::new(),
            frame_history_capacity: default_frame_capacity(),
            anomaly_history_capacity: default_anomaly_capacity(),
            spike_min_prior_frames: default_min_prior_frames(),
            spike_factor: default_spike_factor(),
        }
    }
}

impl EvaluatorConfig {
    pub fn with_time_restriction(mut self, class_id: u32, window: TimeWindow) -> Self {
        self.time_restrictions.insert(class_id, window);
        self
    }

    pub fn with_zone(mut self, zone: ZoneConfig) -> Self {
        self.zones.push(zone);
        self
    }

    pub fn validate(&self) -> Result<(), EvalError> {
        if !self.person_min_confidence.is_finite() || !(0.0..=1.0).contains(&self.person_min_confidence) {
            return Err(EvalError::Configuration(format!("person_min_confidence {} outside [0,1]", self.person_min_confidence)));
        }
        for (class_id, w) in &self.time_restrictions { w.validate(*class_id)?; }
        for (i, z) in self.zones.iter().enumerate() { z.validate(i)?; }
        if self.frame_history_capacity == 0 || self.anomaly_history_capacity == 0 {
            return Err(EvalError::Configuration("history capacities must be non-zero".into()));
        }
        if !self.spike_factor.is_finite() || self.spike_factor <= 0.0 {
            return Err(EvalError::Configuration(format!("spike_factor {} must be positive", self.spike_factor)));
        }
        // the newest frame is never part of the baseline, so at most capacity - 1 priors exist
        if self.spike_min_prior_frames >= self.frame_history_capacity {
            return Err(EvalError::Configuration(format!(
                "spike_min_prior_frames {} needs frame_history_capacity of at least {}, got {}",
                self.spike_min_prior_frames, self.spike_min_prior_frames + 1, self.frame_history_capacity
            )));
        }
        Ok(())
    }

    /// Restricted classes no built-in rule reads. Only the person class has a time-of-day rule.
    pub fn ignored_time_restrictions(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.time_restrictions.keys().copied().filter(|c| *c != self.person_class_id).collect();
        ids.sort_unstable();
        ids
    }

    pub fn from_yaml(text: &str) -> Result<Self, EvalError> {
        let cfg: EvaluatorConfig = serde_yaml::from_str(text)?;
        cfg.validate()?;
        let ignored = cfg.ignored_time_restrictions();
        if !ignored.is_empty() {
            warn!(classes = ?ignored, person_class = cfg.person_class_id, "time restrictions for non-person classes have no effect");
        }
        Ok(cfg)
    }

    pub fn load_rules_file(path: impl AsRef<Path>) -> Result<Self, EvalError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let cfg = Self::from_yaml(&content)?;
        info!(path = %path.display(), zones = cfg.zones.len(), restrictions = cfg.time_restrictions.len(), "rules loaded");
        Ok(cfg)
    }
}
