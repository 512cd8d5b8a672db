use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use chrono::Utc;
use clap::ArgMatches;
use irf_core::{
    attach_inputs, create_report, export_path, render_json, render_markdown, Quarter, Report,
    ReportRun, ReportSession, SectionOutcome, TextGenerator, Ticker,
};
use irf_schema::{FrameworkId, SectionId};
use tracing::{info, warn};

use super::{required, App};
use crate::inputs::JsonFileInputs;

/// `irf report ...`
pub async fn run(app: &App, matches: &ArgMatches, out: &mut dyn Write) -> anyhow::Result<()> {
    match matches.subcommand() {
        Some(("new", sub)) => new_report(app, sub, out).await,
        Some(("generate", sub)) => generate(app, sub, out).await,
        Some(("qa", sub)) => qa(app, sub, out),
        Some(("approve", sub)) => {
            let session = session(app, find_report(app, sub)?, app.generator_or_offline());
            let id = section_arg(sub)?.ok_or_else(|| anyhow!("missing argument --section"))?;
            session.approve_section(id)?;
            writeln!(out, "Approved section {id}: {}", session.framework().section(id).title)?;
            Ok(())
        }
        Some(("view", sub)) => {
            write!(out, "{}", render_markdown(&find_report(app, sub)?))?;
            Ok(())
        }
        Some(("export", sub)) => {
            let report = find_report(app, sub)?;
            let dir = sub
                .get_one::<PathBuf>("output")
                .cloned()
                .unwrap_or_else(|| app.config.output_dir());
            let path = export(&report, &dir, required(sub, "format")?)?;
            writeln!(out, "Exported {} {} to {}", report.ticker, report.quarter, path.display())?;
            Ok(())
        }
        Some(("status", sub)) => status(&find_report(app, sub)?, out),
        _ => bail!("unknown report command"),
    }
}

async fn new_report(app: &App, matches: &ArgMatches, out: &mut dyn Write) -> anyhow::Result<()> {
    let framework_id = FrameworkId::parse(required(matches, "framework")?)?;
    let framework = app.store.frameworks().resolve_shared(&framework_id).await?;
    let mut report = create_report(required(matches, "ticker")?, framework, required(matches, "quarter")?)?;

    if let Some(path) = matches.get_one::<PathBuf>("inputs") {
        let provider = JsonFileInputs::new(path);
        report = attach_inputs(report, &provider).await?;
        report = report.with_references(provider.references().map_err(anyhow::Error::msg)?);
    }

    app.store.reports().create(&report)?;
    writeln!(
        out,
        "Created report {} for {} {} using {} ({} inputs, {} references)",
        report.id,
        report.ticker,
        report.quarter,
        report.framework_id(),
        report.inputs.len(),
        report.references.len()
    )?;
    Ok(())
}

async fn generate(app: &App, matches: &ArgMatches, out: &mut dyn Write) -> anyhow::Result<()> {
    let session = session(app, find_report(app, matches)?, app.generator()?);
    let force = matches.get_flag("force");

    if let Some(id) = section_arg(matches)? {
        let state = session.generate_section(id, force).await?;
        writeln!(
            out,
            "Section {id}: {} -> {} ({} words)",
            session.framework().section(id).title,
            state.status,
            state.word_count()
        )?;
        return Ok(());
    }

    writeln!(out, "Generating {} {}...", session.ticker(), session.quarter())?;
    let run = session.generate_report(force).await;
    print_run(&session, &run, out)?;

    if let Some((id, err)) = run.failures().find(|(_, e)| e.is_fatal()) {
        bail!("generation stopped at section {id}: {err}");
    }
    if run.succeeded() {
        let path = export(&session.report(), &app.config.output_dir(), "md")?;
        writeln!(out, "Report written to {}", path.display())?;
    } else {
        warn!(failed = run.stats.failed, "report generated with failures");
    }
    Ok(())
}

fn print_run(session: &ReportSession, run: &ReportRun, out: &mut dyn Write) -> anyhow::Result<()> {
    for (id, outcome) in &run.outcomes {
        let title = &session.framework().section(*id).title;
        match outcome {
            SectionOutcome::Generated(state) => {
                writeln!(out, "  {id:>2}. {title:<44} generated ({} words)", state.word_count())?;
            }
            SectionOutcome::Skipped(status) => {
                writeln!(out, "  {id:>2}. {title:<44} skipped ({status})")?;
            }
            SectionOutcome::Failed(err) => {
                writeln!(out, "  {id:>2}. {title:<44} FAILED: {err}")?;
            }
            SectionOutcome::Aborted => {
                writeln!(out, "  {id:>2}. {title:<44} not started")?;
            }
        }
    }
    write!(
        out,
        "{} generated, {} skipped, {} failed",
        run.stats.generated, run.stats.skipped, run.stats.failed
    )?;
    if run.stats.aborted > 0 {
        write!(out, ", {} not started", run.stats.aborted)?;
    }
    writeln!(out, " in {:.1}s", run.stats.elapsed.as_secs_f64())?;
    Ok(())
}

fn qa(app: &App, matches: &ArgMatches, out: &mut dyn Write) -> anyhow::Result<()> {
    let session = session(app, find_report(app, matches)?, app.generator_or_offline());
    let heading = |id: SectionId| format!("Section {id}: {}", session.framework().section(id).title);

    if let Some(id) = section_arg(matches)? {
        let outcome = session.run_qa(id)?;
        write!(out, "{}", irf_qa::format_qa_report(&heading(id), &outcome))?;
        return Ok(());
    }

    let results = session.run_qa_all();
    if results.is_empty() {
        writeln!(out, "No sections are ready for QA")?;
        return Ok(());
    }
    let mut passed = 0;
    for (id, result) in &results {
        match result {
            Ok(outcome) => {
                if outcome.passed() {
                    passed += 1;
                }
                writeln!(out, "{}", irf_qa::format_qa_report(&heading(*id), outcome))?;
            }
            Err(err) => writeln!(out, "Section {id}: {err}")?,
        }
    }

    let report = session.report();
    writeln!(out, "{}", irf_qa::format_qa_report("Whole report", &report.report_findings()))?;
    let citations = report.citation_check();
    if !citations.orphaned.is_empty() {
        writeln!(out, "Citations without a reference: {:?}", citations.orphaned)?;
    }
    if !citations.sequential {
        writeln!(out, "Reference numbering has gaps")?;
    }
    writeln!(out, "QA: {passed}/{} sections passed", results.len())?;
    Ok(())
}

fn status(report: &Report, out: &mut dyn Write) -> anyhow::Result<()> {
    writeln!(
        out,
        "{} {} ({}), framework {}",
        report.ticker,
        report.quarter,
        report.id,
        report.framework_id()
    )?;
    for def in report.framework.sections() {
        let Some(state) = report.section(def.id) else {
            continue;
        };
        let mut line = format!("  {:>2}. {:<44} {:<10}", def.id, def.title, state.status.to_string());
        if state.content.is_some() {
            line.push_str(&format!(" {:>5} words", state.word_count()));
        }
        if state.stale {
            line.push_str("  stale");
        }
        if state.retry_count > 0 {
            line.push_str(&format!("  retries: {}", state.retry_count));
        }
        if let Some(err) = &state.last_error {
            line.push_str(&format!("  last error: {err}"));
        }
        writeln!(out, "{line}")?;
    }
    let summary = report.summary();
    writeln!(
        out,
        "{} words, {} blocking findings, {} warnings; {}",
        summary.total_words,
        summary.blocking_failures,
        summary.warnings,
        if summary.complete { "complete" } else { "incomplete" }
    )?;
    for finding in report.report_findings().warnings() {
        writeln!(out, "  warning: {}: {}", finding.rule_name, finding.message)?;
    }
    Ok(())
}

fn export(report: &Report, dir: &std::path::Path, format: &str) -> anyhow::Result<PathBuf> {
    let (body, extension) = match format {
        "md" => (render_markdown(report), "md"),
        "json" => (render_json(report)?, "json"),
        other => bail!("unsupported report format `{other}`"),
    };
    let path = export_path(dir, report, Utc::now(), extension);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    std::fs::write(&path, body).with_context(|| format!("cannot write {}", path.display()))?;
    info!(report = %report.id, path = %path.display(), "report exported");
    Ok(path)
}

fn session(app: &App, report: Report, generator: Arc<dyn TextGenerator>) -> ReportSession {
    ReportSession::builder(report, generator)
        .with_config(app.config.report_config())
        .with_sink(Arc::new(app.store.reports()))
        .with_cancellation(app.cancellation_token())
        .build()
}

fn find_report(app: &App, matches: &ArgMatches) -> anyhow::Result<Report> {
    let ticker = Ticker::parse(required(matches, "ticker")?)?;
    let repo = app.store.reports();
    match matches.get_one::<String>("quarter") {
        Some(raw) => {
            let quarter = Quarter::parse(raw)?;
            repo.find(&ticker, &quarter)?
                .ok_or_else(|| anyhow!("no report for {ticker} {quarter}; create one with `irf report new`"))
        }
        None => repo
            .latest_for(&ticker)?
            .ok_or_else(|| anyhow!("no report for {ticker}; create one with `irf report new`")),
    }
}

fn section_arg(matches: &ArgMatches) -> anyhow::Result<Option<SectionId>> {
    matches
        .get_one::<u32>("section")
        .map(|&n| SectionId::new(n))
        .transpose()
        .map_err(Into::into)
}
