//! End-to-end checks of the evaluator through its public API, driven by detector-shaped JSON.

use std::sync::Arc;

use anomaly_service::detection::{
    parse_objects, AnomalyDetails, AnomalyEvaluator, AnomalyKind, BoundingBox, DetectedObject, EvalError,
    EvaluatorConfig, FixedClock, FrameDims, FrameReport, SharedEvaluator, Severity, TimeWindow, ZoneConfig,
};

fn night_watch(hour: u32) -> AnomalyEvaluator {
    let cfg = EvaluatorConfig::default().with_time_restriction(0, TimeWindow::new(22, 6));
    AnomalyEvaluator::from_config(cfg).unwrap().with_clock(Arc::new(FixedClock::at_hour(hour).unwrap()))
}

fn cars(n: usize) -> Vec<DetectedObject> {
    (0..n).map(|i| DetectedObject::new(BoundingBox::new(i as i32 * 10, 0, i as i32 * 10 + 8, 8), 2, 0.7)).collect()
}

#[test]
fn person_at_night_from_detector_json() {
    let objects = parse_objects(r#"[{"x1":100,"y1":50,"x2":180,"y2":300,"class_id":0,"class_name":"person","confidence":0.9}]"#).unwrap();
    let mut ev = night_watch(23);
    let out = ev.evaluate(&objects, Some(FrameDims::new(640, 480))).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].kind, AnomalyKind::UnauthorizedPerson);
    assert_eq!(out[0].severity, Severity::High);
    assert_eq!(out[0].anomaly, "Unauthorized person detected");

    let mut ev = night_watch(10);
    assert!(ev.evaluate(&objects, Some(FrameDims::new(640, 480))).unwrap().is_empty());
}

#[test]
fn count_spike_after_steady_traffic() {
    let mut ev = night_watch(12);
    for _ in 0..11 { assert!(ev.evaluate(&cars(2), None).unwrap().is_empty()); }
    let out = ev.evaluate(&cars(7), None).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].details, AnomalyDetails::CountSpike { count: 7, average: 2.0 });

    let mut ev = night_watch(12);
    for _ in 0..11 { ev.evaluate(&cars(2), None).unwrap(); }
    assert!(ev.evaluate(&cars(6), None).unwrap().is_empty());
}

#[test]
fn suppressed_key_returns_after_hundred_others() {
    let mut cfg = EvaluatorConfig::default();
    cfg.prohibited_classes = (0..=100).collect();
    let mut ev = AnomalyEvaluator::from_config(cfg).unwrap().with_clock(Arc::new(FixedClock::at_hour(12).unwrap()));
    let phone = |class_id| vec![DetectedObject::new(BoundingBox::new(0, 0, 4, 4), class_id, 0.5)];

    assert_eq!(ev.evaluate(&phone(67), None).unwrap().len(), 1);
    assert!(ev.evaluate(&phone(67), None).unwrap().is_empty());
    let others: Vec<u32> = (0..=100).filter(|c| *c != 67).collect();
    for c in &others[..99] { assert_eq!(ev.evaluate(&phone(*c), None).unwrap().len(), 1); }
    assert!(ev.evaluate(&phone(67), None).unwrap().is_empty(), "still inside the window");
    assert_eq!(ev.evaluate(&phone(others[99]), None).unwrap().len(), 1);
    assert_eq!(ev.anomaly_history().len(), 100);
    assert_eq!(ev.evaluate(&phone(67), None).unwrap().len(), 1);
}

#[test]
fn histories_stay_bounded() {
    let mut cfg = EvaluatorConfig::default();
    cfg.prohibited_classes = (0..500).collect();
    let mut ev = AnomalyEvaluator::from_config(cfg).unwrap();
    for c in 0..500u32 {
        ev.evaluate(&[DetectedObject::new(BoundingBox::new(0, 0, 1, 1), c, 0.5)], None).unwrap();
        assert!(ev.frame_history().len() <= 30);
        assert!(ev.anomaly_history().len() <= 100);
    }
    assert_eq!(ev.frame_history().len(), 30);
    assert_eq!(ev.anomaly_history().len(), 100);
}

#[test]
fn zone_edge_counts_as_inside() {
    let cfg = EvaluatorConfig::default().with_zone(ZoneConfig::new([0.25, 0.0, 0.5, 1.0], [2]).named("lane"));
    let mut ev = AnomalyEvaluator::from_config(cfg).unwrap();
    // center x = 100 / 400 = 0.25
    let car = DetectedObject::new(BoundingBox::new(80, 10, 120, 30), 2, 0.6);
    let out = ev.evaluate(&[car], Some(FrameDims::new(400, 200))).unwrap();
    assert_eq!(out.len(), 1);
    assert!(matches!(&out[0].details, AnomalyDetails::Object { zone: Some(z), .. } if z == "lane"));
}

#[test]
fn malformed_payload_fails_fast() {
    assert!(matches!(parse_objects(r#"[{"x1":1,"class_id":0,"confidence":0.5}]"#), Err(EvalError::InvalidInput(_))));
    assert!(matches!(parse_objects("not json"), Err(EvalError::InvalidInput(_))));
}

#[test]
fn report_json_shape() {
    let mut ev = night_watch(12);
    let anomalies = ev.evaluate(&[DetectedObject::new(BoundingBox::new(1, 2, 3, 4), 43, 0.42)], None).unwrap();
    let json = serde_json::to_value(FrameReport { id: None, anomalies, image: None }).unwrap();
    let a = &json["anomalies"][0];
    assert_eq!(a["type"], "prohibited_object");
    assert_eq!(a["severity"], "medium");
    assert_eq!(a["details"]["object"]["class_id"], 43);
    assert_eq!(a["details"]["object"]["x2"], 3);
    assert!(json.get("image").is_none());
}

#[test]
fn shared_evaluator_serialises_threads() {
    let shared = SharedEvaluator::new(AnomalyEvaluator::from_config(EvaluatorConfig::default()).unwrap());
    let handles: Vec<_> = (0..8).map(|_| {
        let s = shared.clone();
        std::thread::spawn(move || {
            let mut n = 0;
            for _ in 0..25 { n += s.evaluate(&[DetectedObject::new(BoundingBox::new(0, 0, 2, 2), 56, 0.8)], None).unwrap().len(); }
            n
        })
    }).collect();
    let emitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(emitted, 1);
    assert_eq!(shared.with(|ev| ev.frame_history().len()), 30);
}
