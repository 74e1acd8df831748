pub mod types;
pub mod clock;
pub mod config;
pub mod history;
pub mod rules;
pub mod anomaly;
pub mod engine;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("invalid input: {0}")] InvalidInput(String),
    #[error("configuration error: {0}")] Configuration(String),
    #[error("io error: {0}")] Io(#[from] std::io::Error),
    #[error("rules file error: {0}")] Yaml(#[from] serde_yaml::Error),
}

pub use types::{Anomaly, AnomalyDetails, AnomalyKind, BoundingBox, DetectedObject, FrameDims, FrameReport, Severity, parse_objects, PERSON_CLASS_ID};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{EvaluatorConfig, TimeWindow, ZoneConfig};
pub use history::{AnomalyHistory, BoundedHistory, FrameHistory, FrameSnapshot};
pub use rules::{FrameRule, ObjectRule, PersonRule, ProhibitedObjectRule, RuleContext, ZoneRule};
pub use anomaly::CountSpikeRule;
pub use engine::{AnomalyEvaluator, SharedEvaluator};
