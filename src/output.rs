//! Report rendering: text for humans, JSON for machines
//!
//! The JSON form is the stable wire format external CI/IDE layers consume;
//! it is a direct serialization of the batch reports, so nothing has to
//! re-run analysis to render a finding.

use std::fmt::Write as _;

use crate::batch::FileReport;
use crate::diagnostics::Severity;

/// Human-readable report, one line per finding plus a summary.
pub fn render_text(reports: &[FileReport]) -> String {
    let mut out = String::new();
    let mut total = 0usize;
    let mut critical = 0usize;

    for report in reports {
        for diagnostic in &report.result.diagnostics {
            total += 1;
            if diagnostic.severity == Severity::Critical {
                critical += 1;
            }
            let _ = writeln!(
                out,
                "{}:{}: [{}] {}: {}",
                report.path.display(),
                diagnostic.line,
                diagnostic.severity,
                diagnostic.guard,
                diagnostic.message
            );
            if let Some(fix) = &diagnostic.fix {
                let _ = writeln!(out, "    fix available: {}", fix.rationale);
            }
        }
    }

    let files = reports.len();
    if total == 0 {
        let _ = writeln!(out, "{files} file(s) analyzed, no findings");
    } else {
        let _ = writeln!(
            out,
            "{files} file(s) analyzed, {total} finding(s) ({critical} critical)"
        );
    }
    out
}

/// Machine-readable report.
pub fn render_json(reports: &[FileReport]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(reports)
}
