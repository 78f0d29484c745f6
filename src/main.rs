use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::Write as _;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use mirador::analyzer::Analyzer;
use mirador::batch::{self, FileReport};
use mirador::cli::{Cli, OutputFormat};
use mirador::config::Config;
use mirador::diagnostics::Guard;
use mirador::fixer::{self, FixError, FixMode};
use mirador::output;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(2);
        }
    }
}

fn run(cli: &Cli) -> Result<i32> {
    let (mut config, warnings) = Config::load(cli.config.as_deref());
    for warning in &warnings {
        eprintln!("warning: {warning}");
    }

    if !cli.guards.is_empty() {
        restrict_guards(&mut config, &cli.guards)?;
    }
    if let Some(timeout) = cli.timeout {
        config.files.timeout_secs = timeout;
    }

    let analyzer = Arc::new(Analyzer::new(config));
    let files = batch::discover(&cli.paths, &analyzer.config().files.ignore_dirs);
    if files.is_empty() {
        bail!("no Python files found under the given paths");
    }
    tracing::debug!("analyzing {} file(s)", files.len());

    let reports = batch::analyze_files(&analyzer, &files);

    if cli.fix || cli.dry_run {
        apply_fix_pass(cli, &reports)?;
    }

    match cli.format {
        OutputFormat::Text => print!("{}", output::render_text(&reports)),
        OutputFormat::Json => println!("{}", output::render_json(&reports)?),
    }

    let failed = reports.iter().any(|r| r.result.has_critical());
    Ok(if failed { 1 } else { 0 })
}

/// `--guards a,b` enables exactly the listed analyses.
fn restrict_guards(config: &mut Config, names: &[String]) -> Result<()> {
    let mut selected = Vec::new();
    for name in names {
        let guard = Guard::from_str(name).map_err(|e| anyhow::anyhow!(e))?;
        selected.push(guard);
    }
    config.guards.mirage.enabled = selected.contains(&Guard::Mirage);
    config.guards.leakage.enabled = selected.contains(&Guard::Leakage);
    config.guards.hypothesis.enabled = selected.contains(&Guard::Hypothesis);
    config.guards.unit.enabled = selected.contains(&Guard::Unit);
    config.guards.tensor.enabled = selected.contains(&Guard::Tensor);
    Ok(())
}

/// Rewrite every file that carries fixes. A file whose fixes overlap is
/// reported and skipped; the rest of the batch still completes.
fn apply_fix_pass(cli: &Cli, reports: &[FileReport]) -> Result<()> {
    let fixable: Vec<&FileReport> = reports
        .iter()
        .filter(|r| r.result.diagnostics.iter().any(|d| d.fix.is_some()))
        .collect();

    if fixable.is_empty() {
        eprintln!("no auto-fixable findings");
        return Ok(());
    }
    if cli.output.is_some() && fixable.len() > 1 {
        bail!("--output only applies when exactly one file has fixes");
    }

    for report in fixable {
        let source = std::fs::read_to_string(&report.path)
            .with_context(|| format!("re-reading {}", report.path.display()))?;

        // Preview always: the diff backs --diff and --dry-run.
        let outcome = if cli.interactive {
            fixer::apply_fixes_filtered(
                &source,
                &report.result.diagnostics,
                FixMode::Preview,
                |diagnostic, replacement| confirm_fix(diagnostic.line, replacement),
            )
        } else {
            fixer::apply_fixes(&source, &report.result.diagnostics, FixMode::Preview)
        };

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e @ FixError::Overlapping { .. }) => {
                eprintln!("{}: {e}; file left untouched", report.path.display());
                continue;
            }
            Err(e) => return Err(e).with_context(|| format!("fixing {}", report.path.display())),
        };

        if cli.diff || cli.dry_run {
            print!("{}", outcome.diff);
        }
        if cli.dry_run {
            eprintln!(
                "[dry run] {}: {} fix(es) not written",
                report.path.display(),
                outcome.applied
            );
            continue;
        }

        let target: &Path = cli.output.as_deref().unwrap_or(&report.path);
        std::fs::write(target, &outcome.new_text)
            .with_context(|| format!("writing {}", target.display()))?;
        eprintln!(
            "{}: {} fix(es) written to {}",
            report.path.display(),
            outcome.applied,
            target.display()
        );
    }
    Ok(())
}

fn confirm_fix(line: u32, replacement: &str) -> bool {
    eprint!("apply fix at line {line} -> {replacement}? [y/N] ");
    let _ = std::io::stderr().flush();
    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y" | "yes")
}
