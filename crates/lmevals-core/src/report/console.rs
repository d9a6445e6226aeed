use crate::model::RunSummary;

/// Human-readable run summary on stderr; stdout stays reserved for the
/// NDJSON stream.
pub fn print_summary(summary: &RunSummary) {
    for r in &summary.results {
        if r.score < 0.0 {
            eprintln!("{}: no valid trials ({} attempted)", r.model, r.trials);
        } else {
            eprintln!(
                "{}: score={:.2} ({:.0}%) trials={}",
                r.model,
                r.score,
                r.score * 100.0,
                r.trials
            );
        }
    }
    match &summary.best {
        Some(b) => eprintln!("best: {} ({:.2})", b.model, b.score),
        None => eprintln!("best: none (no model produced a valid score)"),
    }
}
