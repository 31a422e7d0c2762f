//! Tally CLI - evaluate expressions, batches and ledgers

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value as Json;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tally::number::format_number;
use tally::prelude::*;
use tally::{validate, CalculationReport, LedgerReport};
use tracing::debug;

#[derive(Parser)]
#[command(name = "tally")]
#[command(author, version, about = "Stack-machine expression evaluator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a single expression
    Eval {
        /// Expression, e.g. "2 3 +"
        expression: String,

        /// JSON file with variable values
        #[arg(long)]
        values: Option<PathBuf>,

        /// Print the register store afterwards
        #[arg(long)]
        registers: bool,
    },

    /// Check an expression for unknown tokens
    Check {
        expression: String,
    },

    /// Evaluate a JSON list of named expressions in dependency order
    Batch {
        /// JSON file: [{"name": "...", "expression": "..."}]
        input: PathBuf,

        /// JSON file with local variable values
        #[arg(long)]
        values: Option<PathBuf>,

        /// JSON file with outer-scope variable values
        #[arg(long)]
        outer: Option<PathBuf>,

        /// Render values with this many decimals
        #[arg(short, long)]
        precision: Option<usize>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Print the register store afterwards
        #[arg(long)]
        registers: bool,
    },

    /// Recalculate a JSON ledger and store section subtotals
    Ledger {
        input: PathBuf,

        /// Render values with this many decimals
        #[arg(short, long)]
        precision: Option<usize>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Print the register store afterwards
        #[arg(long)]
        registers: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mut out = io::stdout().lock();

    match cli.command {
        Commands::Eval {
            expression,
            values,
            registers,
        } => eval(&mut out, &expression, values.as_deref(), registers),
        Commands::Check { expression } => check(&mut out, &expression),
        Commands::Batch {
            input,
            values,
            outer,
            precision,
            format,
            registers,
        } => batch(
            &mut out,
            &input,
            values.as_deref(),
            outer.as_deref(),
            CalculationOptions { precision },
            format,
            registers,
        ),
        Commands::Ledger {
            input,
            precision,
            format,
            registers,
        } => ledger(
            &mut out,
            &input,
            CalculationOptions { precision },
            format,
            registers,
        ),
    }
}

/// Install a subscriber only when RUST_LOG is set
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true).with_writer(io::stderr))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn eval(
    out: &mut impl Write,
    expression: &str,
    values: Option<&Path>,
    show_registers: bool,
) -> Result<()> {
    let mut session = Session::new();
    let result = match values {
        Some(path) => session.evaluate_with(expression, &load_values(path)?),
        None => session.evaluate(expression),
    };

    writeln!(out, "{}", format_number(result))?;
    if show_registers {
        write_registers(out, session.registers())?;
    }
    Ok(())
}

fn check(out: &mut impl Write, expression: &str) -> Result<()> {
    let program = validate(expression)?;
    writeln!(out, "ok ({} tokens)", program.len())?;
    Ok(())
}

fn batch(
    out: &mut impl Write,
    input: &Path,
    values: Option<&Path>,
    outer: Option<&Path>,
    options: CalculationOptions,
    format: OutputFormat,
    show_registers: bool,
) -> Result<()> {
    let nodes: Vec<NodeSpec> = read_json(input)?;
    let local = values.map(load_values).transpose()?.unwrap_or_default();
    let outer = outer.map(load_values).transpose()?;
    debug!(nodes = nodes.len(), "loaded batch");

    let mut session = Session::new();
    let report = session
        .calculate(
            &nodes,
            &local,
            outer.as_ref().map(|o| o as &dyn ValueProvider),
            &options,
        )
        .with_context(|| format!("Failed to evaluate '{}'", input.display()))?;

    match format {
        OutputFormat::Text => write_report(out, &report)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &report)?;
            writeln!(out)?;
        }
    }
    if show_registers {
        write_registers(out, session.registers())?;
    }
    Ok(())
}

fn ledger(
    out: &mut impl Write,
    input: &Path,
    options: CalculationOptions,
    format: OutputFormat,
    show_registers: bool,
) -> Result<()> {
    let ledger: Ledger = read_json(input)?;

    let mut session = Session::new();
    let report = session.recalculate_ledger(&ledger, &options);

    match format {
        OutputFormat::Text => write_ledger(out, &report)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &report)?;
            writeln!(out)?;
        }
    }
    if show_registers {
        write_registers(out, session.registers())?;
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse '{}'", path.display()))
}

/// Load variable values.
///
/// Accepts either a serialized `MemoryProvider` (`{"entries": [...]}`) or a
/// flat object of names to numbers, strings or arrays of those.
fn load_values(path: &Path) -> Result<MemoryProvider> {
    let json: Json = read_json(path)?;
    if json.get("entries").is_some() {
        return serde_json::from_value(json)
            .with_context(|| format!("Invalid value entries in '{}'", path.display()));
    }

    let Json::Object(map) = json else {
        anyhow::bail!("Expected a JSON object in '{}'", path.display());
    };
    let mut provider = MemoryProvider::new();
    for (name, value) in map {
        match value {
            Json::Array(items) => {
                for item in items {
                    provider.insert(name.clone(), json_text(item));
                }
            }
            other => {
                provider.insert(name, json_text(other));
            }
        }
    }
    Ok(provider)
}

fn json_text(value: Json) -> String {
    match value {
        Json::String(text) => text,
        Json::Null => String::new(),
        other => other.to_string(),
    }
}

fn write_report(out: &mut impl Write, report: &CalculationReport) -> io::Result<()> {
    for value in &report.values {
        writeln!(out, "{} = {}", value.name, value.rendered)?;
    }
    Ok(())
}

fn write_ledger(out: &mut impl Write, report: &LedgerReport) -> io::Result<()> {
    for (index, section) in report.sections.iter().enumerate() {
        let name = section.name.as_deref().unwrap_or("");
        writeln!(out, "[{index}] {name}")?;
        for (line_index, line) in section.lines.iter().enumerate() {
            let columns: Vec<String> = line
                .columns
                .iter()
                .map(|c| format!("{}={}", c.name, c.rendered))
                .collect();
            writeln!(out, "  {}: {}", line_index + 1, columns.join(" "))?;
        }
        writeln!(out, "  {} = {}", section.register, format_number(section.subtotal))?;
    }
    Ok(())
}

fn write_registers(out: &mut impl Write, registers: &RegisterStore) -> io::Result<()> {
    writeln!(out, "registers:")?;
    for (name, value) in registers.snapshot() {
        writeln!(out, "  {} = {}", name, format_number(value))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn output(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut buffer = Vec::new();
        f(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_load_flat_values() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "values.json",
            r#"{"qty": 3, "price": "2.5", "parts": [1, 2]}"#,
        );

        let values = load_values(&path).unwrap();
        assert_eq!(values.values_for("qty")[0].to_number(), 3.0);
        assert_eq!(values.values_for("price")[0].to_number(), 2.5);
        assert_eq!(values.values_for("parts").len(), 2);
    }

    #[test]
    fn test_load_entry_values() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "values.json",
            r#"{"entries": [{"name": "qty", "scope": ["line1"], "value": "4"}]}"#,
        );

        let values = load_values(&path).unwrap();
        assert_eq!(values.scoped_values_for("line1", "qty")[0].to_number(), 4.0);
    }

    #[test]
    fn test_eval_with_registers() {
        let text = output(|out| eval(out, "5 ~x str 2 *", None, true));
        assert_eq!(text, "10\nregisters:\n  INTERMEDIATE = 0\n  LAST = 10\n  x = 5\n");
    }

    #[test]
    fn test_check_rejects_unknown() {
        let mut buffer = Vec::new();
        assert!(check(&mut buffer, "1 2 plus").is_err());
        let text = output(|out| check(out, "1 2 +"));
        assert_eq!(text, "ok (3 tokens)\n");
    }

    #[test]
    fn test_batch_file() {
        let dir = TempDir::new().unwrap();
        let input = write_file(
            &dir,
            "batch.json",
            r#"[
                {"name": "total", "expression": "$net $tax +"},
                {"name": "net", "expression": "$qty 10 *"},
                {"name": "tax", "expression": "$net 5 %"}
            ]"#,
        );
        let values = write_file(&dir, "values.json", r#"{"qty": 3}"#);

        let text = output(|out| {
            batch(
                out,
                &input,
                Some(&values),
                None,
                CalculationOptions::with_precision(2),
                OutputFormat::Text,
                false,
            )
        });
        assert_eq!(text, "net = 30.00\ntax = 1.50\ntotal = 31.50\n");
    }

    #[test]
    fn test_batch_cycle_is_an_error() {
        let dir = TempDir::new().unwrap();
        let input = write_file(
            &dir,
            "batch.json",
            r#"[{"name": "a", "expression": "$b"}, {"name": "b", "expression": "$a"}]"#,
        );
        let mut buffer = Vec::new();
        let err = batch(
            &mut buffer,
            &input,
            None,
            None,
            CalculationOptions::default(),
            OutputFormat::Json,
            false,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("Cyclic dependency"));
    }

    #[test]
    fn test_ledger_file() {
        let dir = TempDir::new().unwrap();
        let input = write_file(
            &dir,
            "ledger.json",
            r#"{"sections": [{"name": "items", "lines": [
                {"fields": [{"name": "qty", "value": "2"}],
                 "columns": [{"name": "amount", "expression": "$qty 4 *"}]}
            ]}]}"#,
        );

        let text = output(|out| {
            ledger(
                out,
                &input,
                CalculationOptions::default(),
                OutputFormat::Text,
                false,
            )
        });
        assert_eq!(text, "[0] items\n  1: amount=8\n  IVALUE0 = 8\n");
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = load_values(&dir.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
