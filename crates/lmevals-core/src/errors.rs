use thiserror::Error;

/// Failure taxonomy for a run submission.
///
/// Per-trial failures (completion shape, judge parse, per-call timeout) are
/// recovered locally by the trial runner as a -1 sentinel score and never
/// abort the run. Pre-stream failures (credits, run insert) abort the whole
/// submission.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("insufficient credits for user '{user}'")]
    InsufficientCredits { user: String },

    #[error("completion response is not valid JSON: {raw}")]
    MalformedResponse { raw: String },

    #[error("completion response missing choices[0].message.content")]
    InvalidCompletionShape,

    #[error("judge response is not valid JSON: {raw}")]
    JudgeParse { raw: String },

    #[error("judge score {score} outside 0..=100")]
    JudgeScoreOutOfRange { score: f64 },

    #[error("{what} call timed out after {after_ms}ms")]
    Timeout { what: &'static str, after_ms: u64 },

    #[error("upstream API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
