use parking_lot::Mutex;
use serde::Serialize;

/// Pipeline stages reported to a [`ProgressSink`], in completion order for a
/// sequential run. Parallel runs may report the three detectors in any order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Loading,
    Ela,
    CopyMove,
    Splicing,
    Fusion,
}

impl Stage {
    pub const COUNT: usize = 5;

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Loading => "Loading image",
            Stage::Ela => "Error level analysis",
            Stage::CopyMove => "Copy-move detection",
            Stage::Splicing => "Splicing detection",
            Stage::Fusion => "Classification",
        }
    }
}

/// Receives a notification after each stage finishes. Called synchronously
/// from the analysis thread (or a rayon worker), so implementations must
/// return promptly.
pub trait ProgressSink: Send + Sync {
    fn report(&self, stage: Stage, fraction: f64);
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _stage: Stage, _fraction: f64) {}
}

impl<F> ProgressSink for F
where
    F: Fn(Stage, f64) + Send + Sync,
{
    fn report(&self, stage: Stage, fraction: f64) {
        self(stage, fraction)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub fraction: f64,
}

/// Records every event so a host can poll job status from another thread.
#[derive(Debug, Default)]
pub struct ProgressLog {
    events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<ProgressEvent> {
        self.events.lock().last().copied()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    pub fn is_complete(&self) -> bool {
        self.latest().is_some_and(|e| e.fraction >= 1.0)
    }
}

impl ProgressSink for ProgressLog {
    fn report(&self, stage: Stage, fraction: f64) {
        self.events.lock().push(ProgressEvent { stage, fraction });
    }
}
