use lmevals_core::catalog::ModelCatalog;
use lmevals_core::engine::runner::{Orchestrator, RunPolicy};
use lmevals_core::errors::EvalError;
use lmevals_core::judge::JudgeService;
use lmevals_core::model::{RunEvent, RunRequest, RunSummary};
use lmevals_core::providers::llm::fake::FakeClient;
use lmevals_core::providers::llm::CompletionClient;
use lmevals_core::storage::Store;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;

fn request(models: &[&str], user: &str) -> RunRequest {
    RunRequest {
        models: models.iter().map(|m| m.to_string()).collect(),
        prompt: "How many r's in Strawberry?".into(),
        rubric: "three r's = 1, else = 0".into(),
        title: String::new(),
        user: user.into(),
    }
}

/// Judge client that grades by whether the judged answer (the text after the
/// final "Answer:" marker of the judge instruction) matches `passing`.
fn strawberry_judge(passing: &'static str) -> JudgeService {
    let client = FakeClient::new(move |_model, prompt| {
        let answer = prompt.rsplit("Answer:\n").next().unwrap_or("");
        let score = if answer.trim() == passing { 100 } else { 0 };
        Ok(format!(r#"{{"explanation":"graded","score":{score}}}"#))
    });
    JudgeService::new(Arc::new(client), "fake-judge")
}

fn orchestrator(
    store: Store,
    completion: Arc<dyn CompletionClient>,
    judge: JudgeService,
    policy: RunPolicy,
) -> Orchestrator {
    Orchestrator {
        store,
        completion,
        judge,
        catalog: ModelCatalog::new().with_icon("model-a", "icon-a"),
        policy,
    }
}

async fn run_and_collect(
    orch: &Orchestrator,
    req: &RunRequest,
) -> (Result<RunSummary, EvalError>, Vec<RunEvent>) {
    let (tx, mut rx) = mpsc::channel::<RunEvent>(256);
    let collector = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    });
    let outcome = orch.run(req, tx).await;
    let events = collector.await.unwrap();
    (outcome, events)
}

fn snapshots_for<'a>(
    events: &'a [RunEvent],
    model: &str,
) -> Vec<&'a lmevals_core::model::ModelSnapshot> {
    events
        .iter()
        .filter_map(|e| match e {
            RunEvent::Snapshot(s) if s.model == model => Some(s),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_strawberry_scenario() -> anyhow::Result<()> {
    let store = Store::open_in_memory()?;
    store.init_schema()?;

    // model-a always answers correctly, model-b never does
    let completion = Arc::new(FakeClient::new(|model, _prompt| {
        Ok(if model == "model-a" { "3" } else { "2" }.to_string())
    }));
    let orch = orchestrator(
        store.clone(),
        completion,
        strawberry_judge("3"),
        RunPolicy::default(),
    );

    let req = request(&["model-a", "model-b"], "alice");
    let (outcome, events) = run_and_collect(&orch, &req).await;
    let summary = outcome?;

    // first streamed line is the run id
    assert!(matches!(&events[0], RunEvent::Started { run_id } if *run_id == summary.run_id));

    // within one model, trial counts only grow
    for model in ["model-a", "model-b"] {
        let snaps = snapshots_for(&events, model);
        assert_eq!(snaps.len(), 5);
        for pair in snaps.windows(2) {
            assert!(pair[1].trials >= pair[0].trials);
        }
        assert_eq!(snaps.last().unwrap().trials, 5);
    }

    let last_a = *snapshots_for(&events, "model-a").last().unwrap();
    let last_b = *snapshots_for(&events, "model-b").last().unwrap();
    assert_eq!(last_a.score, 1.0);
    assert_eq!(last_b.score, 0.0);

    // persisted rows agree with the last streamed snapshot
    let rows = store.results_for_run(&summary.run_id)?;
    assert_eq!(rows.len(), 2);
    for row in &rows {
        let last = *snapshots_for(&events, &row.model).last().unwrap();
        assert_eq!(row.score, last.score);
        assert_eq!(row.trials, last.trials);
        assert_eq!(row.completions, last.completions);
    }

    // winner summary written onto the run row, icon from the catalog
    let best = summary.best.expect("a model scored");
    assert_eq!(best.model, "model-a");
    assert_eq!(best.score, 1.0);
    assert_eq!(best.icon, "icon-a");
    let run = store.get_run(&summary.run_id)?.unwrap();
    assert_eq!(run.best_model.as_deref(), Some("model-a"));
    assert_eq!(run.best_model_score, Some(1.0));
    assert_eq!(run.best_model_icon.as_deref(), Some("icon-a"));

    // exactly one credit consumed from the seeded balance
    assert_eq!(store.credit_balance("alice")?, 4);
    Ok(())
}

#[tokio::test]
async fn test_insufficient_credits_rejects_without_side_effects() -> anyhow::Result<()> {
    let store = Store::open_in_memory()?;
    store.init_schema()?;
    store.ensure_user("broke", 0)?;

    let orch = orchestrator(
        store.clone(),
        Arc::new(FakeClient::canned("3")),
        strawberry_judge("3"),
        RunPolicy::default(),
    );

    let (outcome, events) = run_and_collect(&orch, &request(&["model-a"], "broke")).await;
    assert!(matches!(
        outcome,
        Err(EvalError::InsufficientCredits { .. })
    ));
    assert!(events.is_empty(), "no stream output before the gate");
    assert!(store.list_by_owner("broke")?.is_empty(), "no run row created");
    assert_eq!(store.credit_balance("broke")?, 0);
    Ok(())
}

#[tokio::test]
async fn test_all_failing_model_is_recorded_and_excluded() -> anyhow::Result<()> {
    let store = Store::open_in_memory()?;
    store.init_schema()?;

    let completion = Arc::new(FakeClient::new(|model, _prompt| {
        if model == "bad" {
            Err(EvalError::InvalidCompletionShape)
        } else {
            Ok("3".to_string())
        }
    }));
    let orch = orchestrator(
        store.clone(),
        completion,
        strawberry_judge("3"),
        RunPolicy::default(),
    );

    let (outcome, events) = run_and_collect(&orch, &request(&["bad", "good"], "alice")).await;
    let summary = outcome?;

    let rows = store.results_for_run(&summary.run_id)?;
    let bad = rows.iter().find(|r| r.model == "bad").unwrap();
    assert_eq!(bad.trials, 5, "attempts are still counted");
    assert_eq!(bad.score, -1.0, "no valid trials");
    assert!(bad.completions.iter().all(|c| c.score == -1.0));

    let best = summary.best.expect("good still scored");
    assert_eq!(best.model, "good");

    // every failed trial still produced a snapshot
    assert_eq!(snapshots_for(&events, "bad").len(), 5);
    Ok(())
}

#[tokio::test]
async fn test_first_encountered_max_wins() -> anyhow::Result<()> {
    let store = Store::open_in_memory()?;
    store.init_schema()?;

    // answers echo the model name; the judge maps them to fixed scores
    let completion = Arc::new(FakeClient::new(|model, _prompt| {
        if model == "m-fail" {
            Err(EvalError::InvalidCompletionShape)
        } else {
            Ok(model.to_string())
        }
    }));
    let judge = JudgeService::new(
        Arc::new(FakeClient::new(|_model, prompt| {
            let answer = prompt.rsplit("Answer:\n").next().unwrap_or("").trim();
            let score = match answer {
                "m-90" => 90,
                "m-95-first" | "m-95-second" => 95,
                _ => 0,
            };
            Ok(format!(r#"{{"explanation":"x","score":{score}}}"#))
        })),
        "fake-judge",
    );
    let policy = RunPolicy {
        trials: 1,
        ..RunPolicy::default()
    };
    let orch = orchestrator(store.clone(), completion, judge, policy);

    let req = request(&["m-90", "m-95-first", "m-95-second", "m-fail"], "alice");
    let (outcome, _events) = run_and_collect(&orch, &req).await;
    let summary = outcome?;

    assert_eq!(summary.best.unwrap().model, "m-95-first");
    Ok(())
}

#[tokio::test]
async fn test_run_timeout_emits_terminal_timeout_events() -> anyhow::Result<()> {
    struct SlowClient;

    #[async_trait::async_trait]
    impl CompletionClient for SlowClient {
        async fn complete(&self, _model: &str, _prompt: &str) -> Result<String, EvalError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".into())
        }

        fn provider_name(&self) -> &'static str {
            "slow"
        }
    }

    let store = Store::open_in_memory()?;
    store.init_schema()?;
    let policy = RunPolicy {
        run_timeout: Some(Duration::from_millis(100)),
        ..RunPolicy::default()
    };
    let orch = orchestrator(
        store.clone(),
        Arc::new(SlowClient),
        strawberry_judge("3"),
        policy,
    );

    let (outcome, events) = run_and_collect(&orch, &request(&["s1", "s2"], "alice")).await;
    let summary = outcome?;

    assert!(summary.best.is_none());
    assert!(summary.results.is_empty());

    let timed_out: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, RunEvent::TimedOut { .. }))
        .collect();
    assert_eq!(timed_out.len(), 2, "one terminal timeout event per model");
    assert!(store.results_for_run(&summary.run_id)?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_stream_has_a_terminal_event_per_model() -> anyhow::Result<()> {
    let store = Store::open_in_memory()?;
    store.init_schema()?;
    let orch = orchestrator(
        store.clone(),
        Arc::new(FakeClient::canned("3")),
        strawberry_judge("3"),
        RunPolicy::default(),
    );

    let models = ["a", "b", "c", "d", "e", "f", "g"];
    let (outcome, events) = run_and_collect(&orch, &request(&models, "alice")).await;
    let summary = outcome?;

    // more models than the launch window; everyone still finishes
    for model in models {
        let snaps = snapshots_for(&events, model);
        assert_eq!(snaps.last().unwrap().trials, 5, "terminal snapshot for {model}");
    }
    assert_eq!(store.results_for_run(&summary.run_id)?.len(), models.len());
    Ok(())
}
