use crate::cli::args::{Cli, Command, CreditsArgs, ListArgs, RunArgs};
use lmevals_core::catalog::ModelCatalog;
use lmevals_core::config::{self, ProviderConfig};
use lmevals_core::credits::CreditGate;
use lmevals_core::engine::runner::{Orchestrator, RunPolicy};
use lmevals_core::errors::EvalError;
use lmevals_core::judge::JudgeService;
use lmevals_core::model::RunEvent;
use lmevals_core::providers::llm::fake::FakeClient;
use lmevals_core::providers::llm::openrouter::OpenRouterClient;
use lmevals_core::providers::llm::CompletionClient;
use lmevals_core::storage::Store;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const RUN_FAILED: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Run(args) => cmd_run(&cli.db, args).await,
        Command::Show { run_id } => cmd_show(&cli.db, &run_id),
        Command::List(args) => cmd_list(&cli.db, args),
        Command::Title {
            run_id,
            user,
            title,
        } => owner_mutation(&cli.db, |s| s.set_title(&run_id, &user, &title)),
        Command::Publish { run_id, user } => {
            owner_mutation(&cli.db, |s| s.set_visibility(&run_id, &user, true))
        }
        Command::Unpublish { run_id, user } => {
            owner_mutation(&cli.db, |s| s.set_visibility(&run_id, &user, false))
        }
        Command::Upvote { run_id, user } => {
            let store = open_store(&cli.db)?;
            store.upvote(&run_id, &user)?;
            eprintln!("upvotes: {}", store.upvote_count(&run_id)?);
            Ok(exit_codes::OK)
        }
        Command::Unupvote { run_id, user } => {
            let store = open_store(&cli.db)?;
            store.remove_upvote(&run_id, &user)?;
            eprintln!("upvotes: {}", store.upvote_count(&run_id)?);
            Ok(exit_codes::OK)
        }
        Command::Delete { run_id, user } => {
            owner_mutation(&cli.db, |s| s.delete_run(&run_id, &user))
        }
        Command::Credits(args) => cmd_credits(&cli.db, args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}

async fn cmd_run(db: &Path, args: RunArgs) -> anyhow::Result<i32> {
    if args.init {
        config::write_sample_request(&args.request)?;
        eprintln!("created {}", args.request.display());
        return Ok(exit_codes::OK);
    }

    let store = open_store(db)?;
    let req = config::load_request(&args.request)?;

    let (completion, judge) = build_clients(args.offline)?;
    let policy = RunPolicy {
        trials: args.trials.max(1),
        parallel: args.parallel.max(1),
        call_timeout: Duration::from_secs(args.call_timeout_secs),
        run_timeout: args.run_timeout_secs.map(Duration::from_secs),
    };
    let orchestrator = Orchestrator {
        store,
        completion,
        judge,
        catalog: ModelCatalog::defaults(),
        policy,
    };

    let (tx, mut rx) = mpsc::channel::<RunEvent>(64);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "unserializable event"),
            }
        }
    });

    let outcome = orchestrator.run(&req, tx).await;
    printer.await?;

    match outcome {
        Ok(summary) => {
            lmevals_core::report::console::print_summary(&summary);
            Ok(exit_codes::OK)
        }
        Err(e @ EvalError::InsufficientCredits { .. }) => {
            eprintln!("rejected: {e}");
            Ok(exit_codes::RUN_FAILED)
        }
        Err(e) => Err(e.into()),
    }
}

fn build_clients(offline: bool) -> anyhow::Result<(Arc<dyn CompletionClient>, JudgeService)> {
    if offline {
        let completion: Arc<dyn CompletionClient> = Arc::new(FakeClient::new(|model, _prompt| {
            Ok(format!("offline reply from {model}"))
        }));
        let judge_client: Arc<dyn CompletionClient> = Arc::new(FakeClient::canned(
            r#"{"explanation":"offline","score":100}"#,
        ));
        return Ok((completion, JudgeService::new(judge_client, "offline-judge")));
    }
    let cfg = ProviderConfig::from_env()?;
    let client: Arc<dyn CompletionClient> = Arc::new(OpenRouterClient::new(&cfg));
    let judge = JudgeService::new(client.clone(), cfg.judge_model.clone());
    Ok((client, judge))
}

fn cmd_show(db: &Path, run_id: &str) -> anyhow::Result<i32> {
    let store = open_store(db)?;
    let Some(run) = store.get_run(run_id)? else {
        eprintln!("no such run: {run_id}");
        return Ok(exit_codes::RUN_FAILED);
    };
    let results = store.results_for_run(run_id)?;
    let upvotes = store.upvote_count(run_id)?;
    let out = serde_json::json!({
        "run": run,
        "results": results,
        "upvotes": upvotes,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(exit_codes::OK)
}

fn cmd_list(db: &Path, args: ListArgs) -> anyhow::Result<i32> {
    let store = open_store(db)?;
    let runs = match &args.mine {
        Some(owner) => store.list_by_owner(owner)?,
        None => store.list_public()?,
    };
    for run in &runs {
        let title = if run.title.is_empty() {
            "Untitled"
        } else {
            &run.title
        };
        let best = run
            .best_model
            .as_deref()
            .map(|m| format!(" best={m}"))
            .unwrap_or_default();
        println!(
            "{} {} owner={} upvotes={}{}",
            run.id,
            title,
            run.owner,
            store.upvote_count(&run.id)?,
            best,
        );
    }
    Ok(exit_codes::OK)
}

fn cmd_credits(db: &Path, args: CreditsArgs) -> anyhow::Result<i32> {
    let store = open_store(db)?;
    let gate = CreditGate::new(store);
    if let Some(amount) = args.grant {
        gate.grant(&args.user, amount)?;
    }
    eprintln!("credits[{}] = {}", args.user, gate.balance(&args.user)?);
    Ok(exit_codes::OK)
}

fn owner_mutation<F>(db: &Path, op: F) -> anyhow::Result<i32>
where
    F: FnOnce(&Store) -> anyhow::Result<bool>,
{
    let store = open_store(db)?;
    if op(&store)? {
        Ok(exit_codes::OK)
    } else {
        eprintln!("refused: run not found or not owned by you");
        Ok(exit_codes::RUN_FAILED)
    }
}

fn open_store(db: &Path) -> anyhow::Result<Store> {
    if let Some(parent) = db.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = Store::open(db)?;
    store.init_schema()?;
    Ok(store)
}
