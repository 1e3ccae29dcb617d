// ABOUTME: The scan and fix commands: run one readiness stage per repository.
// ABOUTME: Exit is an error when critical problems remain unresolved.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::exec::ExecutionContext;
use crate::fix::{self, Report, ScanOptions, Stage};
use crate::output::Output;
use crate::plugin::Registry;

#[derive(Serialize)]
struct RepoReport<'a> {
    repo: String,
    stage: Stage,
    #[serde(flatten)]
    report: &'a Report,
}

pub fn scan(
    paths: &[PathBuf],
    stage: Stage,
    apply_fixes: bool,
    on_target: bool,
    output: &Output,
) -> Result<()> {
    let registry = Registry::with_builtins();
    let options = ScanOptions { apply_fixes };
    let exec_ctx = if on_target {
        ExecutionContext::on_target()
    } else {
        ExecutionContext::remote()
    };

    let mut unresolved_critical = 0;
    let mut problems = 0;
    let mut applied = 0;

    for root in super::resolve_roots(paths)? {
        let spec = crate::spec::EnvironmentSpec::discover(&root)?;
        output.progress(&format!("{} ({})", spec.name, root.display()));

        let report = fix::run_stage(&registry, stage, &spec, &root, None, exec_ctx, options)?;

        if output.is_json() {
            output.emit_json(&RepoReport {
                repo: spec.name.to_string(),
                stage,
                report: &report,
            });
        } else {
            print_report(&report, output);
        }

        problems += report.problems_found();
        applied += report.fixes_applied();
        unresolved_critical += report
            .entries()
            .iter()
            .filter(|e| e.unresolved() && e.severity == crate::fix::Severity::Critical)
            .count();
    }

    let summary = if apply_fixes {
        format!("{problems} problem(s) found, {applied} fixed")
    } else {
        format!("{problems} problem(s) found")
    };
    output.success(&summary);

    if unresolved_critical > 0 {
        return Err(Error::UnresolvedCritical {
            count: unresolved_critical,
        });
    }
    Ok(())
}

fn print_report(report: &Report, output: &Output) {
    for entry in report.entries() {
        if !entry.problem_found {
            continue;
        }
        match (entry.fix_applied, &entry.error) {
            (Some(true), _) => output.progress(&format!("  fixed: {}", entry.fix_id)),
            (_, Some(error)) => output.warn(&format!(
                "  [{}] {}: {}",
                entry.severity, entry.fix_id, error
            )),
            _ => {
                let hint = entry
                    .manual_fix
                    .as_deref()
                    .unwrap_or("no automatic fix available");
                output.warn(&format!(
                    "  [{}] {}: {}",
                    entry.severity, entry.fix_id, hint
                ));
            }
        }
    }
}
