//! Wire and domain types for detections and anomalies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EvalError;

/// COCO class id the detector assigns to people.
pub const PERSON_CLASS_ID: u32 = 0;

/// COCO class names (80 classes), indexed by class id.
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck",
    "boat", "traffic light", "fire hydrant", "stop sign", "parking meter", "bench",
    "bird", "cat", "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra",
    "giraffe", "backpack", "umbrella", "handbag", "tie", "suitcase", "frisbee",
    "skis", "snowboard", "sports ball", "kite", "baseball bat", "baseball glove",
    "skateboard", "surfboard", "tennis racket", "bottle", "wine glass", "cup",
    "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink",
    "refrigerator", "book", "clock", "vase", "scissors", "teddy bear",
    "hair drier", "toothbrush",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self { Self { x1, y1, x2, y2 } }

    /// Center point in pixel coordinates.
    pub fn center(&self) -> (f64, f64) {
        ((self.x1 as f64 + self.x2 as f64) / 2.0, (self.y1 as f64 + self.y2 as f64) / 2.0)
    }

    pub fn area(&self) -> i64 {
        (self.x2 as i64 - self.x1 as i64) * (self.y2 as i64 - self.y1 as i64)
    }

    pub fn is_valid(&self) -> bool { self.x2 >= self.x1 && self.y2 >= self.y1 }
}

/// One detection produced by the upstream model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    #[serde(flatten)]
    pub bbox: BoundingBox,
    pub class_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_at: Option<DateTime<Utc>>,
}

impl DetectedObject {
    pub fn new(bbox: BoundingBox, class_id: u32, confidence: f32) -> Self {
        Self { bbox, class_id, class_name: None, confidence, area: None, detected_at: None }
    }

    pub fn with_class_name(mut self, name: impl Into<String>) -> Self {
        self.class_name = Some(name.into());
        self
    }

    /// Detector-supplied name, else the COCO table entry, else `"unknown"`.
    pub fn class_label(&self) -> &str {
        self.class_name.as_deref()
            .or_else(|| COCO_CLASSES.get(self.class_id as usize).copied())
            .unwrap_or("unknown")
    }

    pub fn validate(&self) -> Result<(), EvalError> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(EvalError::InvalidInput(format!(
                "confidence {} for class {} is outside [0,1]", self.confidence, self.class_id
            )));
        }
        if !self.bbox.is_valid() {
            return Err(EvalError::InvalidInput(format!("inverted bounding box {:?}", self.bbox)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDims {
    pub width: u32,
    pub height: u32,
}

impl FrameDims {
    pub fn new(width: u32, height: u32) -> Self { Self { width, height } }

    pub fn validate(&self) -> Result<(), EvalError> {
        if self.width == 0 || self.height == 0 {
            return Err(EvalError::InvalidInput(format!("frame dimensions {}x{} must be non-zero", self.width, self.height)));
        }
        Ok(())
    }

    /// Position of a pixel coordinate as a fraction of the frame.
    pub fn fraction(&self, (x, y): (f64, f64)) -> (f64, f64) {
        (x / self.width as f64, y / self.height as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    UnauthorizedPerson,
    ProhibitedObject,
    RestrictedZone,
    ObjectCountSpike,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::UnauthorizedPerson => "unauthorized_person",
            AnomalyKind::ProhibitedObject => "prohibited_object",
            AnomalyKind::RestrictedZone => "restricted_zone",
            AnomalyKind::ObjectCountSpike => "object_count_spike",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AnomalyKind::UnauthorizedPerson => "Unauthorized person detected",
            AnomalyKind::ProhibitedObject => "Prohibited object detected",
            AnomalyKind::RestrictedZone => "Object in restricted zone",
            AnomalyKind::ObjectCountSpike => "Sudden increase in object count",
        }
    }
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnomalyDetails {
    Object {
        object: DetectedObject,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        zone: Option<String>,
    },
    CountSpike {
        count: usize,
        average: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    pub anomaly: String,
    pub severity: Severity,
    pub details: AnomalyDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    pub timestamp: DateTime<Utc>,
}

impl Anomaly {
    pub fn for_object(kind: AnomalyKind, severity: Severity, object: &DetectedObject, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            anomaly: kind.description().to_string(),
            severity,
            details: AnomalyDetails::Object { object: object.clone(), zone: None },
            confidence: Some(object.confidence),
            timestamp,
        }
    }

    pub fn count_spike(count: usize, average: f64, timestamp: DateTime<Utc>) -> Self {
        let kind = AnomalyKind::ObjectCountSpike;
        Self {
            kind,
            anomaly: kind.description().to_string(),
            severity: Severity::Medium,
            details: AnomalyDetails::CountSpike { count, average },
            confidence: None,
            timestamp,
        }
    }

    pub fn in_zone(mut self, zone: impl Into<String>) -> Self {
        if let AnomalyDetails::Object { zone: z, .. } = &mut self.details { *z = Some(zone.into()); }
        self
    }

    /// Class of the triggering object; 0 for frame-level anomalies.
    pub fn class_id(&self) -> u32 {
        match &self.details {
            AnomalyDetails::Object { object, .. } => object.class_id,
            AnomalyDetails::CountSpike { .. } => 0,
        }
    }

    /// Suppression key. Location blind: two objects of one class share a key.
    pub fn dedup_key(&self) -> String { format!("{}_{}", self.kind.as_str(), self.class_id()) }
}

/// Per-frame response handed to the serving layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub anomalies: Vec<Anomaly>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Parses a detector JSON array. Missing or mistyped fields are rejected.
pub fn parse_objects(json: &str) -> Result<Vec<DetectedObject>, EvalError> {
    let objects: Vec<DetectedObject> = serde_json::from_str(json).map_err(|e| EvalError::InvalidInput(e.to_string()))?;
    for o in &objects { o.validate()?; }
    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_detector_shape() {
        let objs = parse_objects(r#"[{"x1":1,"y1":2,"x2":11,"y2":22,"class_id":67,"confidence":0.4}]"#).unwrap();
        assert_eq!(objs.len(), 1);
        assert_eq!(objs[0].bbox, BoundingBox::new(1, 2, 11, 22));
        assert_eq!(objs[0].class_label(), "cell phone");
        assert_eq!(objs[0].bbox.area(), 200);
    }

    #[test]
    fn missing_field_is_invalid_input() {
        let err = parse_objects(r#"[{"x1":1,"y1":2,"x2":11,"y2":22,"confidence":0.4}]"#).unwrap_err();
        assert!(matches!(err, EvalError::InvalidInput(m) if m.contains("class_id")));
    }

    #[test]
    fn out_of_range_confidence_rejected() {
        let err = parse_objects(r#"[{"x1":0,"y1":0,"x2":1,"y2":1,"class_id":0,"confidence":1.5}]"#).unwrap_err();
        assert!(matches!(err, EvalError::InvalidInput(_)));
    }

    #[test]
    fn dedup_key_ignores_location() {
        let now = Utc::now();
        let a = DetectedObject::new(BoundingBox::new(0, 0, 10, 10), 43, 0.5);
        let b = DetectedObject::new(BoundingBox::new(500, 500, 510, 510), 43, 0.9);
        let ka = Anomaly::for_object(AnomalyKind::ProhibitedObject, Severity::Medium, &a, now).dedup_key();
        let kb = Anomaly::for_object(AnomalyKind::ProhibitedObject, Severity::Medium, &b, now).dedup_key();
        assert_eq!(ka, "prohibited_object_43");
        assert_eq!(ka, kb);
        assert_eq!(Anomaly::count_spike(7, 2.0, now).dedup_key(), "object_count_spike_0");
    }

    #[test]
    fn report_omits_image() {
        let json = serde_json::to_value(FrameReport::default()).unwrap();
        assert_eq!(json, serde_json::json!({"anomalies": []}));
    }
}
