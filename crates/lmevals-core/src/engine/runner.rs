use crate::catalog::ModelCatalog;
use crate::credits::CreditGate;
use crate::engine::cancel::{cancel_pair, CancelToken};
use crate::engine::trial::TrialRunner;
use crate::errors::EvalError;
use crate::judge::JudgeService;
use crate::model::{BestModel, ModelResult, RunEvent, RunRequest, RunSummary};
use crate::providers::llm::CompletionClient;
use crate::storage::Store;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Duration;

#[derive(Debug, Clone)]
pub struct RunPolicy {
    /// Trials per model.
    pub trials: u32,
    /// Concurrently running models.
    pub parallel: usize,
    /// Deadline for each outbound completion/judge call.
    pub call_timeout: Duration,
    /// Overall run deadline; unfinished models emit a terminal timeout event.
    pub run_timeout: Option<Duration>,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            trials: 5,
            parallel: 5,
            call_timeout: Duration::from_secs(120),
            run_timeout: None,
        }
    }
}

/// Drives one evaluation run: credit gate, run-row creation, bounded fan-out
/// of per-model trial runners, progress streaming, best-model summary.
pub struct Orchestrator {
    pub store: Store,
    pub completion: Arc<dyn CompletionClient>,
    pub judge: JudgeService,
    pub catalog: ModelCatalog,
    pub policy: RunPolicy,
}

impl Orchestrator {
    /// Submits `req` and streams progress into `events`. The stream closes
    /// once every requested model has emitted a terminal event and the last
    /// sender clone drops.
    pub async fn run(
        &self,
        req: &RunRequest,
        events: mpsc::Sender<RunEvent>,
    ) -> Result<RunSummary, EvalError> {
        let (handle, token) = cancel_pair();
        if let Some(deadline) = self.policy.run_timeout {
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                handle.cancel();
            });
        }
        self.run_with_cancel(req, events, token).await
    }

    pub async fn run_with_cancel(
        &self,
        req: &RunRequest,
        events: mpsc::Sender<RunEvent>,
        cancel: CancelToken,
    ) -> Result<RunSummary, EvalError> {
        // Reject before any row exists; a failed gate has no side effects
        // beyond the rejection itself.
        let gate = CreditGate::new(self.store.clone());
        gate.check_and_consume(&req.user)?;

        let run_id = self.store.insert_run(req).map_err(EvalError::Other)?;
        // First streamed line, so the caller can start polling before any
        // model result exists.
        let _ = events
            .send(RunEvent::Started {
                run_id: run_id.clone(),
            })
            .await;

        let timeout_ms = self
            .policy
            .run_timeout
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let sem = Arc::new(Semaphore::new(self.policy.parallel.max(1)));
        let mut handles = Vec::with_capacity(req.models.len());
        for model in &req.models {
            // Refill the launch window as runners finish; launch order follows
            // the request, completion order does not.
            let permit = sem
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| EvalError::Other(e.into()))?;
            let runner = TrialRunner {
                store: self.store.clone(),
                completion: self.completion.clone(),
                judge: self.judge.clone(),
                trials: self.policy.trials,
                call_timeout: self.policy.call_timeout,
            };
            let run_id = run_id.clone();
            let model_name = model.clone();
            let model = model.clone();
            let prompt = req.prompt.clone();
            let rubric = req.rubric.clone();
            let tx = events.clone();
            let mut cancel = cancel.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                tokio::select! {
                    result = runner.run_model(&run_id, &model, &prompt, &rubric, &tx) => Some(result),
                    _ = cancel.cancelled() => {
                        let _ = tx
                            .send(RunEvent::TimedOut {
                                model: model.clone(),
                                timeout_ms,
                            })
                            .await;
                        None
                    }
                }
            });
            handles.push((model_name, handle));
        }

        let mut results: Vec<ModelResult> = Vec::new();
        for (model, handle) in handles {
            match handle.await {
                Ok(Some(result)) => results.push(result),
                // Cancelled; the task already emitted its terminal event.
                Ok(None) => {}
                Err(e) => {
                    // A panicked runner still counts as finished for this
                    // model and never aborts its siblings.
                    tracing::warn!(model = %model, error = %e, "model task failed");
                    let _ = events
                        .send(RunEvent::Failed {
                            model,
                            error: format!("task error: {}", e),
                        })
                        .await;
                }
            }
        }
        // Last sender; the stream closes here, after the final terminal event.
        drop(events);

        let best = select_best(&results).map(|r| BestModel {
            model: r.model.clone(),
            score: r.score,
            icon: self.catalog.icon(&r.model).to_string(),
        });
        if let Some(ref b) = best {
            self.store
                .set_best_model(&run_id, &b.model, b.score, &b.icon)
                .map_err(EvalError::Other)?;
        }

        Ok(RunSummary {
            run_id,
            results,
            best,
        })
    }
}

/// Strict greater-than reduction over models with a valid score, so the
/// first-encountered maximum wins ties. None when no model scored.
fn select_best(results: &[ModelResult]) -> Option<&ModelResult> {
    let mut best: Option<&ModelResult> = None;
    for r in results.iter().filter(|r| r.score >= 0.0) {
        match best {
            Some(b) if r.score > b.score => best = Some(r),
            None => best = Some(r),
            _ => {}
        }
    }
    best
}
