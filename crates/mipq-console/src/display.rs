use mipq_core::api::{Expr, QueryPlan};
use mipq_core::encoding::json::{expr_to_json, record_to_json};
use mipq_core::types::Record;
use serde_json::{Value, json};

/// Output mode for rendering results.
pub enum OutputMode {
    /// Human-readable pretty-printed output.
    Pretty,
    /// Machine-parseable JSON (one JSON object per result on stdout).
    Json,
}

/// Render the records a query returned.
pub fn render_records(records: &[Record], skipped: usize, mode: &OutputMode) {
    match mode {
        OutputMode::Pretty => {
            for record in records {
                print_item(&record_to_json(record));
            }
            let n = records.len();
            println!("Returned {n} record(s).");
            if skipped > 0 {
                println!("({skipped} record(s) skipped: null comparison)");
            }
        }
        OutputMode::Json => {
            let items: Vec<Value> = records.iter().map(record_to_json).collect();
            println!(
                "{}",
                json!({
                    "records": items,
                    "count": records.len(),
                    "skipped": skipped,
                })
            );
        }
    }
}

/// Render how a query splits its filters.
pub fn render_plan(plan: &QueryPlan, mode: &OutputMode) {
    match mode {
        OutputMode::Pretty => print_plan(plan),
        OutputMode::Json => println!(
            "{}",
            json!({
                "model": plan.model,
                "inequality_property": plan.inequality_property,
                "pushed": plan.pushed.iter().map(expr_to_json).collect::<Vec<_>>(),
                "residual": plan.residual.iter().map(expr_to_json).collect::<Vec<_>>(),
            })
        ),
    }
}

/// Render an error in the given mode (always to stderr).
pub fn render_error(err: &dyn std::fmt::Display, mode: &OutputMode) {
    match mode {
        OutputMode::Pretty => print_error(err),
        OutputMode::Json => {
            eprintln!("{}", json!({"error": err.to_string()}));
        }
    }
}

// ---- Pretty-print helpers ----

/// Pretty-print a single item with 2-space indentation.
pub fn print_item(item: &Value) {
    match serde_json::to_string_pretty(item) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Error formatting item: {e}"),
    }
}

pub fn print_plan(plan: &QueryPlan) {
    println!("Model: {}", plan.model);
    match &plan.inequality_property {
        Some(p) => println!("  Inequality property: {p}"),
        None => println!("  Inequality property: (none)"),
    }
    print_filters("Pushed", &plan.pushed);
    print_filters("Residual", &plan.residual);
}

fn print_filters(label: &str, filters: &[Expr]) {
    if filters.is_empty() {
        println!("  {label}: (none)");
        return;
    }
    println!("  {label}:");
    for f in filters {
        println!("    {f}");
    }
}

/// Print an error message to stderr.
pub fn print_error(err: &dyn std::fmt::Display) {
    eprintln!("Error: {err}");
}
