use crate::errors::EvalError;
use crate::judge::JudgeService;
use crate::model::{round2, ModelResult, ModelSnapshot, RunEvent, TrialCompletion, SENTINEL_SCORE};
use crate::providers::llm::CompletionClient;
use crate::storage::Store;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

/// Runs the fixed trial count for a single model: each trial is one
/// completion call plus one judge call, strictly sequential. Any failure
/// inside a trial collapses to the -1 sentinel and the loop continues.
pub(crate) struct TrialRunner {
    pub store: Store,
    pub completion: Arc<dyn CompletionClient>,
    pub judge: JudgeService,
    pub trials: u32,
    pub call_timeout: Duration,
}

impl TrialRunner {
    pub async fn run_model(
        &self,
        run_id: &str,
        model: &str,
        prompt: &str,
        rubric: &str,
        events: &mpsc::Sender<RunEvent>,
    ) -> ModelResult {
        let mut completions: Vec<TrialCompletion> = Vec::new();

        for trial_no in 1..=self.trials {
            let completion = self.one_trial(model, prompt, rubric, trial_no).await;
            completions.push(completion);

            let snapshot = ModelSnapshot {
                model: model.to_string(),
                score: aggregate_score(&completions),
                trials: completions.len() as u32,
                completions: completions.clone(),
            };
            // A gone receiver is not our problem; keep going so the result
            // row still gets persisted.
            let _ = events.send(RunEvent::Snapshot(snapshot)).await;
        }

        let result = ModelResult {
            model: model.to_string(),
            score: aggregate_score(&completions),
            trials: completions.len() as u32,
            completions,
        };

        // Single write, after the loop. Streaming already delivered the data,
        // so a failed write is logged rather than escalated.
        if let Err(e) = self.store.upsert_model_result(run_id, &result) {
            tracing::warn!(run_id, model, error = %e, "failed to persist model result");
        }

        result
    }

    async fn one_trial(
        &self,
        model: &str,
        prompt: &str,
        rubric: &str,
        trial_no: u32,
    ) -> TrialCompletion {
        let answer = match self
            .bounded(self.completion.complete(model, prompt), "completion")
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(model, trial_no, error = %e, "completion failed");
                return TrialCompletion {
                    answer: String::new(),
                    score: SENTINEL_SCORE,
                };
            }
        };

        let score = match self
            .bounded(self.judge.score_completion(rubric, prompt, &answer), "judge")
            .await
        {
            Ok(verdict) => round2(verdict.score / 100.0),
            Err(e) => {
                tracing::debug!(model, trial_no, error = %e, "judge failed");
                SENTINEL_SCORE
            }
        };

        TrialCompletion { answer, score }
    }

    async fn bounded<T, F>(&self, fut: F, what: &'static str) -> Result<T, EvalError>
    where
        F: Future<Output = Result<T, EvalError>>,
    {
        match timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(EvalError::Timeout {
                what,
                after_ms: self.call_timeout.as_millis() as u64,
            }),
        }
    }
}

/// Mean of the non-sentinel per-trial scores, rounded to two decimals;
/// -1 when no trial produced a valid score.
pub(crate) fn aggregate_score(completions: &[TrialCompletion]) -> f64 {
    let valid: Vec<f64> = completions
        .iter()
        .map(|c| c.score)
        .filter(|s| *s >= 0.0)
        .collect();
    if valid.is_empty() {
        return SENTINEL_SCORE;
    }
    round2(valid.iter().sum::<f64>() / valid.len() as f64)
}
