//! Per-object and frame-level rule contracts plus the built-in object rules.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use super::config::{EvaluatorConfig, TimeWindow, ZoneConfig};
use super::history::FrameHistory;
use super::types::{Anomaly, AnomalyKind, DetectedObject, FrameDims, Severity};

/// What every rule sees about the frame being evaluated.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext {
    pub timestamp: DateTime<Utc>,
    /// Local wall-clock hour, 0..=23.
    pub hour: u32,
    pub frame_dims: Option<FrameDims>,
}

/// Inspects one detection and appends zero or more anomalies.
pub trait ObjectRule {
    fn name(&self) -> &'static str;
    fn check(&self, obj: &DetectedObject, ctx: &RuleContext, out: &mut Vec<Anomaly>);
}

/// Runs once per frame, after every object rule and after the frame is recorded in history.
pub trait FrameRule {
    fn name(&self) -> &'static str;
    fn check(&self, objects: &[DetectedObject], history: &FrameHistory, ctx: &RuleContext, out: &mut Vec<Anomaly>);
}

/// Person seen with high confidence during restricted hours.
#[derive(Debug, Clone)]
pub struct PersonRule {
    pub class_id: u32,
    pub min_confidence: f32,
    pub window: Option<TimeWindow>,
}

impl PersonRule {
    pub fn from_config(cfg: &EvaluatorConfig) -> Self {
        Self {
            class_id: cfg.person_class_id,
            min_confidence: cfg.person_min_confidence,
            window: cfg.time_restrictions.get(&cfg.person_class_id).copied(),
        }
    }
}

impl ObjectRule for PersonRule {
    fn name(&self) -> &'static str { "person" }

    fn check(&self, obj: &DetectedObject, ctx: &RuleContext, out: &mut Vec<Anomaly>) {
        if obj.class_id != self.class_id || obj.confidence <= self.min_confidence { return; }
        let Some(window) = self.window else { return; };
        if window.contains(ctx.hour) {
            out.push(Anomaly::for_object(AnomalyKind::UnauthorizedPerson, Severity::High, obj, ctx.timestamp));
        }
    }
}

/// Classes that must never appear. No confidence gate beyond the detector's own.
#[derive(Debug, Clone, Default)]
pub struct ProhibitedObjectRule {
    pub classes: BTreeSet<u32>,
}

impl ProhibitedObjectRule {
    pub fn new(classes: impl IntoIterator<Item = u32>) -> Self { Self { classes: classes.into_iter().collect() } }
}

impl ObjectRule for ProhibitedObjectRule {
    fn name(&self) -> &'static str { "prohibited_object" }

    fn check(&self, obj: &DetectedObject, ctx: &RuleContext, out: &mut Vec<Anomaly>) {
        if self.classes.contains(&obj.class_id) {
            out.push(Anomaly::for_object(AnomalyKind::ProhibitedObject, Severity::Medium, obj, ctx.timestamp));
        }
    }
}

/// Object center inside a zone that bars its class. One anomaly per matching zone.
#[derive(Debug, Clone, Default)]
pub struct ZoneRule {
    pub zones: Vec<ZoneConfig>,
}

impl ZoneRule {
    pub fn new(zones: Vec<ZoneConfig>) -> Self { Self { zones } }
}

impl ObjectRule for ZoneRule {
    fn name(&self) -> &'static str { "restricted_zone" }

    fn check(&self, obj: &DetectedObject, ctx: &RuleContext, out: &mut Vec<Anomaly>) {
        let Some(dims) = ctx.frame_dims else { return; };
        if self.zones.is_empty() { return; }
        let center = dims.fraction(obj.bbox.center());
        for (i, zone) in self.zones.iter().enumerate() {
            if zone.contains(center) && zone.restricted_classes.contains(&obj.class_id) {
                out.push(Anomaly::for_object(AnomalyKind::RestrictedZone, Severity::High, obj, ctx.timestamp).in_zone(zone.label(i)));
            }
        }
    }
}

/// Built-in object rules in evaluation order.
pub fn default_object_rules(cfg: &EvaluatorConfig) -> Vec<Box<dyn ObjectRule + Send + Sync>> {
    vec![
        Box::new(PersonRule::from_config(cfg)),
        Box::new(ProhibitedObjectRule::new(cfg.prohibited_classes.iter().copied())),
        Box::new(ZoneRule::new(cfg.zones.clone())),
    ]
}

/// Counts candidate anomalies by rule kind, for debug logging.
pub fn tally(anomalies: &[Anomaly]) -> HashMap<&'static str, usize> {
    let mut m = HashMap::new();
    for a in anomalies { *m.entry(a.kind.as_str()).or_insert(0) += 1; }
    m
}
