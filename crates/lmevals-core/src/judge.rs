use crate::errors::EvalError;
use crate::providers::llm::CompletionClient;
use serde::Deserialize;
use std::sync::Arc;

/// The judge model is fixed per deployment, not configurable per run.
pub const DEFAULT_JUDGE_MODEL: &str = "openai/gpt-4o-mini";

#[derive(Debug, Clone, Deserialize)]
pub struct JudgeVerdict {
    #[serde(default)]
    pub explanation: String,
    pub score: f64,
}

/// Scores completions against a free-text rubric via a secondary LLM call.
///
/// Returns the raw 0..=100 score; normalization (divide by 100, round to two
/// decimals) is the trial runner's job.
#[derive(Clone)]
pub struct JudgeService {
    client: Arc<dyn CompletionClient>,
    model: String,
}

impl JudgeService {
    pub fn new(client: Arc<dyn CompletionClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub async fn score_completion(
        &self,
        rubric: &str,
        prompt: &str,
        completion: &str,
    ) -> Result<JudgeVerdict, EvalError> {
        let instruction = judge_prompt(rubric, prompt, completion);
        let raw = self.client.complete_json(&self.model, &instruction).await?;
        let verdict = parse_verdict(&raw)?;
        if !(0.0..=100.0).contains(&verdict.score) {
            return Err(EvalError::JudgeScoreOutOfRange {
                score: verdict.score,
            });
        }
        Ok(verdict)
    }
}

fn judge_prompt(rubric: &str, prompt: &str, completion: &str) -> String {
    format!(
        "You are grading a model's answer against an evaluation rubric.\n\
         Respond with a JSON object only: {{\"explanation\": string, \"score\": integer}} \
         where score is between 0 and 100.\n\n\
         Rubric:\n{rubric}\n\nPrompt:\n{prompt}\n\nAnswer:\n{completion}"
    )
}

/// Direct parse first; judge models often wrap the object in prose, so fall
/// back to the outermost brace-delimited span.
fn parse_verdict(raw: &str) -> Result<JudgeVerdict, EvalError> {
    if let Ok(v) = serde_json::from_str::<JudgeVerdict>(raw) {
        return Ok(v);
    }
    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if end > start {
            if let Ok(v) = serde_json::from_str::<JudgeVerdict>(&raw[start..=end]) {
                return Ok(v);
            }
        }
    }
    Err(EvalError::JudgeParse {
        raw: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::llm::fake::FakeClient;

    #[test]
    fn test_parse_direct_json() {
        let v = parse_verdict(r#"{"explanation":"ok","score":95}"#).unwrap();
        assert_eq!(v.score, 95.0);
        assert_eq!(v.explanation, "ok");
    }

    #[test]
    fn test_parse_brace_fallback() {
        let v = parse_verdict(r#"Sure! {"explanation":"ok","score":80} thanks"#).unwrap();
        assert_eq!(v.score, 80.0);
    }

    #[test]
    fn test_parse_missing_explanation_defaults_empty() {
        let v = parse_verdict(r#"{"score":10}"#).unwrap();
        assert_eq!(v.explanation, "");
    }

    #[test]
    fn test_parse_garbage_fails() {
        let err = parse_verdict("no json here").unwrap_err();
        assert!(matches!(err, EvalError::JudgeParse { .. }));
    }

    #[tokio::test]
    async fn test_score_out_of_range_rejected() {
        let judge = JudgeService::new(
            std::sync::Arc::new(FakeClient::canned(r#"{"explanation":"x","score":150}"#)),
            "fake-judge",
        );
        let err = judge
            .score_completion("rubric", "prompt", "answer")
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::JudgeScoreOutOfRange { .. }));
    }

    #[tokio::test]
    async fn test_score_in_range_accepted() {
        let judge = JudgeService::new(
            std::sync::Arc::new(FakeClient::canned(r#"{"explanation":"x","score":100}"#)),
            "fake-judge",
        );
        let v = judge
            .score_completion("rubric", "prompt", "answer")
            .await
            .unwrap();
        assert_eq!(v.score, 100.0);
    }
}
