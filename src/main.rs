use anyhow::Context;
use csv::ReaderBuilder;
use intellisheet::automation::{ActionSpec, RuleStatus};
use intellisheet::execution::BLANK_CATEGORY;
use intellisheet::{CommandOutcome, Dataset, EngineConfig, SheetEngine};
use std::fs::File;
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

const MAX_DISPLAY_ROWS: usize = 20;

fn load_csv(path: &str) -> anyhow::Result<Dataset> {
    let file = File::open(path).with_context(|| format!("opening {}", path))?;
    let mut reader = ReaderBuilder::new().has_headers(true).flexible(true).from_reader(file);
    let headers = reader.headers()?.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    let mut rows = Vec::new();

    for result in reader.records() {
        let record = result?;
        let mut row: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        // Short records are padded with blanks
        row.resize(headers.len(), String::new());
        rows.push(row);
    }

    Ok(Dataset::from_raw_rows(&headers, &rows)?)
}

fn print_rows(dataset: &Dataset, source_rows: &[usize]) {
    let names = dataset.column_names();
    if names.is_empty() {
        return;
    }
    print!("{:>6} |", "row");
    for name in &names {
        let name: String = name.chars().take(16).collect();
        print!(" {:>16} |", name);
    }
    println!();
    println!("{}", "-".repeat(8 + names.len() * 19));

    for row in 0..dataset.row_count().min(MAX_DISPLAY_ROWS) {
        let label = source_rows.get(row).copied().unwrap_or(row);
        print!("{:>6} |", label);
        for col in 0..names.len() {
            let text = match dataset.cell(row, col) {
                Some(cell) if !cell.is_null() => cell.to_string(),
                _ => BLANK_CATEGORY.to_string(),
            };
            let text: String = text.chars().take(16).collect();
            print!(" {:>16} |", text);
        }
        println!();
    }
    if dataset.row_count() > MAX_DISPLAY_ROWS {
        println!("... {} more rows", dataset.row_count() - MAX_DISPLAY_ROWS);
    }
}

fn print_outcome(outcome: &CommandOutcome) {
    match outcome {
        CommandOutcome::Rows { dataset, predicate, rows } => {
            if let Some(predicate) = predicate {
                println!(" Condition: {}", predicate);
            }
            println!(" Result: {} rows", dataset.row_count());
            let labels = if rows.len() == dataset.row_count() { rows.as_slice() } else { &[] };
            print_rows(dataset, labels);
        }
        CommandOutcome::Highlight { rows, predicate, flags } => {
            if let Some(predicate) = predicate {
                println!(" Condition: {}", predicate);
            }
            println!(" Highlighted rows ({}): {:?}", rows.len(), rows);
            for flag in flags.iter().take(MAX_DISPLAY_ROWS) {
                match &flag.column {
                    Some(column) => println!("   row {} [{}] {}: {}", flag.row_index, column, flag.kind, flag.detail),
                    None => println!("   row {} {}: {}", flag.row_index, flag.kind, flag.detail),
                }
            }
        }
        CommandOutcome::Chart(series) => {
            println!(
                " {:?} chart: {} of {} by {}",
                series.kind,
                series.metric,
                series.value_column.as_deref().unwrap_or("rows"),
                series.group_column
            );
            let max = series.points.iter().map(|p| p.value).fold(0.0_f64, f64::max);
            for point in &series.points {
                let width = if max > 0.0 { ((point.value / max) * 40.0).round() as usize } else { 0 };
                println!("   {:>20} | {:<40} {}", point.category, "#".repeat(width), point.value);
            }
        }
        CommandOutcome::Insights(records) => {
            for record in records {
                println!(
                    "   {:>20} {:>16} = {} (n={})",
                    record.column_or_group, record.metric_name, record.value, record.evidence_row_count
                );
            }
        }
    }
}

fn print_help() {
    println!("\n Available commands:");
    println!("   exit, quit, q          - Exit the REPL");
    println!("   help, ?                - Show this help");
    println!("   schema                 - Show inferred column types");
    println!("   report                 - Full data-quality report");
    println!("   apply                  - Keep the last show/filter/sort/remove result");
    println!("   reset                  - Go back to the loaded file");
    println!("   rule <name>: <cond>    - Highlight rows matching <cond> on every refresh");
    println!("   presets                - Add the low marks / low stock rules that fit");
    println!("   rules                  - Re-evaluate every automation rule");
    println!("   audit                  - Show the command audit trail");
    println!();
    println!("{}", SheetEngine::help());
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("INTELLISHEET_LOG").unwrap_or_else(|_| EnvFilter::new("intellisheet=info")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(csv_path) = args.next() else {
        eprintln!("usage: intellisheet <data.csv> [config.json]");
        std::process::exit(2);
    };
    let config = match args.next() {
        Some(path) => EngineConfig::from_path(&path).with_context(|| format!("loading config {}", path))?,
        None => EngineConfig::default(),
    };

    let original = load_csv(&csv_path)?;
    let mut engine = SheetEngine::new(config)?;
    let mut current = original.clone();
    let mut pending: Option<Dataset> = None;

    println!(" IntelliSheet - plain-language commands over {}", csv_path);
    println!("{}", "=".repeat(80));
    println!(" Loaded {} rows, {} columns", current.row_count(), current.column_count());
    println!(" Type a command (or 'help', 'exit')");
    println!();

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("sheet> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            "exit" | "quit" | "q" => break,
            "help" | "?" => print_help(),
            "schema" => {
                let schema = engine.schema(&current);
                for column in schema.columns() {
                    println!(
                        "   {:>20}  {:<8} nulls={} sample={:?}",
                        column.name,
                        column.inferred_type.as_str(),
                        column.null_count,
                        column.distinct_sample
                    );
                }
            }
            "report" => match engine.quality_report(&current, None) {
                Ok(report) => {
                    println!(" {} flags over {} rows", report.flags.len(), report.row_count);
                    for summary in &report.missing_summary {
                        println!("   {:>20} missing {} ({:.1}%)", summary.column, summary.count, summary.percentage);
                    }
                    for flag in report.flags.iter().take(MAX_DISPLAY_ROWS) {
                        println!("   row {} {}: {}", flag.row_index, flag.kind, flag.detail);
                    }
                }
                Err(e) => println!(" Error: {}", e),
            },
            "apply" => match pending.take() {
                Some(next) => {
                    current = next;
                    println!(" Dataset now has {} rows", current.row_count());
                    report_rules(&mut engine, &current);
                }
                None => println!(" Nothing to apply"),
            },
            "reset" => {
                current = original.clone();
                pending = None;
                println!(" Back to {} rows", current.row_count());
                report_rules(&mut engine, &current);
            }
            "presets" => {
                let added = engine.add_presets(&current);
                println!(" Added {} preset rules", added.len());
                report_rules(&mut engine, &current);
            }
            "rules" => report_rules(&mut engine, &current),
            "audit" => {
                for entry in engine.audit_entries() {
                    let status = entry.error.as_deref().unwrap_or("ok");
                    println!("   {} {:<40} {}", entry.timestamp, entry.command, status);
                }
            }
            _ if line.starts_with("rule ") => {
                let body = &line["rule ".len()..];
                let Some((name, condition)) = body.split_once(':') else {
                    println!(" Usage: rule <name>: <condition>");
                    continue;
                };
                match engine.create_rule(name.trim(), condition.trim(), ActionSpec::Highlight, &current) {
                    Ok(id) => println!(" Rule {} added", id),
                    Err(e) => println!(" Error: {}", e),
                }
            }
            _ => match engine.execute(line, &current) {
                Ok(outcome) => {
                    print_outcome(&outcome);
                    if let CommandOutcome::Rows { dataset, .. } = outcome {
                        pending = Some(dataset);
                        println!(" Type 'apply' to keep this result");
                    }
                }
                Err(e) => println!(" Error: {}", e),
            },
        }
    }

    println!(" Goodbye!");
    Ok(())
}

fn report_rules(engine: &mut SheetEngine, dataset: &Dataset) {
    for outcome in engine.refresh_rules(dataset) {
        match outcome.status {
            RuleStatus::Fired { action, rows } => match action {
                ActionSpec::Notify { message } if !rows.is_empty() => {
                    println!(" [{}] {}: rows {:?}", outcome.name, message, rows)
                }
                _ => println!(" [{}] {} rows", outcome.name, rows.len()),
            },
            RuleStatus::Deactivated { error } => println!(" [{}] deactivated: {}", outcome.name, error),
            RuleStatus::Failed { error } => println!(" [{}] failed: {}", outcome.name, error),
            RuleStatus::Inactive => {}
        }
    }
}
