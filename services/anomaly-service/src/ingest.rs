//! Bounded frame queue feeding a single task that owns the evaluator.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use watchpost_core::record_dropped;

use crate::detection::{AnomalyEvaluator, DetectedObject, FrameDims, FrameReport};

/// One frame of detector output as it arrives from upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub objects: Vec<DetectedObject>,
    #[serde(default)]
    pub frame: Option<FrameDims>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Accepted,
    Oversize,
    QueueFull,
}

#[derive(Clone)]
pub struct IngestHandle {
    tx: mpsc::Sender<FrameRequest>,
    max_objects: usize,
}

impl IngestHandle {
    /// Waits for queue space. Used when the source can be paused, such as a pipe.
    pub async fn push(&self, req: FrameRequest) -> Result<PushOutcome> {
        if req.objects.len() > self.max_objects {
            record_dropped("oversize");
            return Ok(PushOutcome::Oversize);
        }
        self.tx.send(req).await.map_err(|e| anyhow::anyhow!("ingest worker stopped: {e}"))?;
        Ok(PushOutcome::Accepted)
    }

    /// Never blocks. Frames that do not fit are dropped and counted.
    pub fn try_push(&self, req: FrameRequest) -> Result<PushOutcome> {
        if req.objects.len() > self.max_objects {
            record_dropped("oversize");
            return Ok(PushOutcome::Oversize);
        }
        match self.tx.try_send(req) {
            Ok(_) => Ok(PushOutcome::Accepted),
            Err(mpsc::error::TrySendError::Full(_)) => { record_dropped("queue_full"); Ok(PushOutcome::QueueFull) }
            Err(e) => Err(anyhow::anyhow!("ingest send error: {e}")),
        }
    }
}

/// Starts the worker. It exits once every [`IngestHandle`] is dropped and the queue is drained.
pub fn start_ingest(
    cap: usize,
    max_objects: usize,
    mut evaluator: AnomalyEvaluator,
    reports: mpsc::Sender<FrameReport>,
) -> (IngestHandle, JoinHandle<AnomalyEvaluator>) {
    let (tx, mut rx) = mpsc::channel::<FrameRequest>(cap.max(1));
    let worker = tokio::spawn(async move {
        while let Some(req) = rx.recv().await {
            match evaluator.evaluate(&req.objects, req.frame) {
                Ok(anomalies) => {
                    let report = FrameReport { id: req.id, anomalies, image: None };
                    if reports.send(report).await.is_err() { debug!("report receiver closed"); break; }
                }
                Err(e) => {
                    record_dropped("invalid");
                    warn!(error = %e, id = ?req.id, "frame rejected");
                }
            }
        }
        evaluator
    });
    (IngestHandle { tx, max_objects }, worker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{BoundingBox, EvaluatorConfig};

    fn phone() -> DetectedObject { DetectedObject::new(BoundingBox::new(0, 0, 10, 10), 67, 0.6) }

    #[tokio::test]
    async fn frames_flow_through_worker() {
        let ev = AnomalyEvaluator::from_config(EvaluatorConfig::default()).unwrap();
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let (handle, worker) = start_ingest(4, 16, ev, out_tx);
        assert_eq!(handle.try_push(FrameRequest { id: Some("f1".into()), objects: vec![phone()], frame: None }).unwrap(), PushOutcome::Accepted);
        let report = out_rx.recv().await.unwrap();
        assert_eq!(report.id.as_deref(), Some("f1"));
        assert_eq!(report.anomalies.len(), 1);
        drop(handle);
        let ev = worker.await.unwrap();
        assert_eq!(ev.frame_history().len(), 1);
    }

    #[tokio::test]
    async fn oversize_frame_is_dropped() {
        let ev = AnomalyEvaluator::from_config(EvaluatorConfig::default()).unwrap();
        let (out_tx, _out_rx) = mpsc::channel(8);
        let (handle, _worker) = start_ingest(4, 1, ev, out_tx);
        let req = FrameRequest { id: None, objects: vec![phone(), phone()], frame: None };
        assert_eq!(handle.try_push(req).unwrap(), PushOutcome::Oversize);
    }
}
