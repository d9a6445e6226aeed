use crate::model::{EvalRun, ModelResult, RunRequest, TrialCompletion};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Durable row storage for runs, per-model results, upvotes and credits.
/// Cloneable; all access serializes through one connection.
#[derive(Clone)]
pub struct Store {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(crate::storage::schema::DDL)?;
        Ok(())
    }

    // runs

    pub fn insert_run(&self, req: &RunRequest) -> anyhow::Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO runs(id, owner, prompt, rubric, models_json, title, public, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
            params![
                id,
                req.user,
                req.prompt,
                req.rubric,
                serde_json::to_string(&req.models)?,
                req.title,
                now_rfc3339(),
            ],
        )?;
        Ok(id)
    }

    pub fn get_run(&self, run_id: &str) -> anyhow::Result<Option<EvalRun>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, owner, prompt, rubric, models_json, title, public,
                    best_model, best_model_score, best_model_icon, created_at
             FROM runs WHERE id=?1",
        )?;
        let mut rows = stmt.query(params![run_id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(row_to_run(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn list_public(&self) -> anyhow::Result<Vec<EvalRun>> {
        self.list_where("public = 1", params![])
    }

    pub fn list_by_owner(&self, owner: &str) -> anyhow::Result<Vec<EvalRun>> {
        self.list_where("owner = ?1", params![owner])
    }

    fn list_where(
        &self,
        clause: &str,
        args: &[&dyn rusqlite::types::ToSql],
    ) -> anyhow::Result<Vec<EvalRun>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT id, owner, prompt, rubric, models_json, title, public,
                    best_model, best_model_score, best_model_icon, created_at
             FROM runs WHERE {} ORDER BY created_at DESC",
            clause
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(args)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row_to_run(row)?);
        }
        Ok(out)
    }

    /// Owner-checked; returns false when the run does not exist or the
    /// caller does not own it.
    pub fn set_title(&self, run_id: &str, owner: &str, title: &str) -> anyhow::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "UPDATE runs SET title=?1 WHERE id=?2 AND owner=?3",
            params![title, run_id, owner],
        )?;
        Ok(n > 0)
    }

    pub fn set_visibility(&self, run_id: &str, owner: &str, public: bool) -> anyhow::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "UPDATE runs SET public=?1 WHERE id=?2 AND owner=?3",
            params![public as i64, run_id, owner],
        )?;
        Ok(n > 0)
    }

    pub fn set_best_model(
        &self,
        run_id: &str,
        model: &str,
        score: f64,
        icon: &str,
    ) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE runs SET best_model=?1, best_model_score=?2, best_model_icon=?3 WHERE id=?4",
            params![model, score, icon, run_id],
        )?;
        Ok(())
    }

    /// Deletes the run and everything hanging off it in one transaction.
    pub fn delete_run(&self, run_id: &str, owner: &str) -> anyhow::Result<bool> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let owned: i64 = tx.query_row(
            "SELECT count(*) FROM runs WHERE id=?1 AND owner=?2",
            params![run_id, owner],
            |r| r.get(0),
        )?;
        if owned == 0 {
            return Ok(false);
        }
        tx.execute("DELETE FROM upvotes WHERE run_id=?1", params![run_id])?;
        tx.execute("DELETE FROM model_results WHERE run_id=?1", params![run_id])?;
        tx.execute("DELETE FROM runs WHERE id=?1", params![run_id])?;
        tx.commit()?;
        Ok(true)
    }

    // model results

    /// Idempotent upsert keyed by (run_id, model); a rerun for the same pair
    /// overwrites rather than duplicating.
    pub fn upsert_model_result(&self, run_id: &str, result: &ModelResult) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO model_results(run_id, model, score, trials, completions_json, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(run_id, model) DO UPDATE SET
               score=excluded.score,
               trials=excluded.trials,
               completions_json=excluded.completions_json,
               updated_at=excluded.updated_at",
            params![
                run_id,
                result.model,
                result.score,
                result.trials,
                serde_json::to_string(&result.completions)?,
                now_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn results_for_run(&self, run_id: &str) -> anyhow::Result<Vec<ModelResult>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT model, score, trials, completions_json
             FROM model_results WHERE run_id=?1 ORDER BY rowid",
        )?;
        let mut rows = stmt.query(params![run_id])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let completions_json: String = row.get(3)?;
            let completions: Vec<TrialCompletion> = serde_json::from_str(&completions_json)?;
            out.push(ModelResult {
                model: row.get(0)?,
                score: row.get(1)?,
                trials: row.get::<_, i64>(2)? as u32,
                completions,
            });
        }
        Ok(out)
    }

    // upvotes

    /// Idempotent: a duplicate upvote is success, not an error.
    pub fn upvote(&self, run_id: &str, user_id: &str) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO upvotes(run_id, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![run_id, user_id, now_rfc3339()],
        )?;
        Ok(())
    }

    pub fn remove_upvote(&self, run_id: &str, user_id: &str) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM upvotes WHERE run_id=?1 AND user_id=?2",
            params![run_id, user_id],
        )?;
        Ok(())
    }

    pub fn upvote_count(&self, run_id: &str) -> anyhow::Result<i64> {
        let conn = self.conn.lock().unwrap();
        let n = conn.query_row(
            "SELECT count(*) FROM upvotes WHERE run_id=?1",
            params![run_id],
            |r| r.get(0),
        )?;
        Ok(n)
    }

    // credits

    pub fn ensure_user(&self, user_id: &str, starting_balance: i64) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO credits(user_id, balance) VALUES (?1, ?2)",
            params![user_id, starting_balance],
        )?;
        Ok(())
    }

    pub fn credit_balance(&self, user_id: &str) -> anyhow::Result<i64> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT balance FROM credits WHERE user_id=?1")?;
        let mut rows = stmt.query(params![user_id])?;
        if let Some(row) = rows.next()? {
            Ok(row.get(0)?)
        } else {
            Ok(0)
        }
    }

    pub fn grant_credits(&self, user_id: &str, amount: i64) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO credits(user_id, balance) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET balance = balance + excluded.balance",
            params![user_id, amount],
        )?;
        Ok(())
    }

    /// Single conditional statement, so check and decrement cannot race.
    /// Returns false when the balance was already exhausted.
    pub fn consume_credit(&self, user_id: &str) -> anyhow::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "UPDATE credits SET balance = balance - 1 WHERE user_id=?1 AND balance > 0",
            params![user_id],
        )?;
        Ok(n > 0)
    }
}

fn row_to_run(row: &Row<'_>) -> anyhow::Result<EvalRun> {
    let models_json: String = row.get(4)?;
    Ok(EvalRun {
        id: row.get(0)?,
        owner: row.get(1)?,
        prompt: row.get(2)?,
        rubric: row.get(3)?,
        models: serde_json::from_str(&models_json)?,
        title: row.get(5)?,
        public: row.get::<_, i64>(6)? != 0,
        best_model: row.get(7)?,
        best_model_score: row.get(8)?,
        best_model_icon: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
