pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS runs (
  id TEXT PRIMARY KEY,
  owner TEXT NOT NULL,
  prompt TEXT NOT NULL,
  rubric TEXT NOT NULL,
  models_json TEXT NOT NULL,
  title TEXT NOT NULL DEFAULT '',
  public INTEGER NOT NULL DEFAULT 0,
  best_model TEXT,
  best_model_score REAL,
  best_model_icon TEXT,
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS model_results (
  run_id TEXT NOT NULL REFERENCES runs(id),
  model TEXT NOT NULL,
  score REAL NOT NULL,
  trials INTEGER NOT NULL,
  completions_json TEXT NOT NULL,
  updated_at TEXT NOT NULL,
  PRIMARY KEY (run_id, model)
);

CREATE TABLE IF NOT EXISTS upvotes (
  run_id TEXT NOT NULL,
  user_id TEXT NOT NULL,
  created_at TEXT NOT NULL,
  PRIMARY KEY (run_id, user_id)
);

CREATE TABLE IF NOT EXISTS credits (
  user_id TEXT PRIMARY KEY,
  balance INTEGER NOT NULL
);
"#;
