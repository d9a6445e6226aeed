use serde::{Deserialize, Serialize};

/// Marker for "no valid result"; excluded from averaging and best-model selection.
pub const SENTINEL_SCORE: f64 = -1.0;

/// One evaluation submission: fan `prompt` out to `models`, judge each
/// completion against `rubric`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub models: Vec<String>,
    pub prompt: String,
    pub rubric: String,
    #[serde(default)]
    pub title: String,
    pub user: String,
}

/// A persisted evaluation run. `title` may be empty; "Untitled" is a
/// render-time default, never stored. Summary fields stay unset until every
/// model finished and at least one produced a valid score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalRun {
    pub id: String,
    pub owner: String,
    pub prompt: String,
    pub rubric: String,
    pub models: Vec<String>,
    pub title: String,
    pub public: bool,
    pub best_model: Option<String>,
    pub best_model_score: Option<f64>,
    pub best_model_icon: Option<String>,
    pub created_at: String,
}

/// One trial's completion text and its normalized judge score in [0.0, 1.0],
/// or the -1 sentinel when the trial failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialCompletion {
    pub answer: String,
    pub score: f64,
}

/// Aggregate result for one (run, model) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResult {
    pub model: String,
    pub score: f64,
    pub trials: u32,
    pub completions: Vec<TrialCompletion>,
}

/// Per-model progress record. Each snapshot replaces the prior one for that
/// model; it is never a delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub model: String,
    pub score: f64,
    pub trials: u32,
    pub completions: Vec<TrialCompletion>,
}

/// One line of the newline-delimited progress stream.
///
/// Untagged so the wire shapes stay exactly: `{run_id}` first, then per model
/// either `{model, score, trials, completions}`, `{model, error}` or
/// `{model, timeout_ms}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunEvent {
    Started { run_id: String },
    Snapshot(ModelSnapshot),
    Failed { model: String, error: String },
    TimedOut { model: String, timeout_ms: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestModel {
    pub model: String,
    pub score: f64,
    pub icon: String,
}

/// Final artifacts of one orchestrated run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub results: Vec<ModelResult>,
    pub best: Option<BestModel>,
}

/// Two-decimal rounding used for every stored or streamed score.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
