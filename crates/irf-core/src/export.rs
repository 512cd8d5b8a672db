//! Report export to Markdown and JSON

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::report::{Report, ReportSummary};
use crate::status::SectionStatus;

/// `<dir>/<TICKER>/<YYYY-MM-DD>_<quarter>_report.<ext>`
#[must_use]
pub fn export_path(dir: &Path, report: &Report, date: DateTime<Utc>, extension: &str) -> PathBuf {
    dir.join(report.ticker.as_str()).join(format!(
        "{}_{}_report.{extension}",
        date.format("%Y-%m-%d"),
        report.quarter.slug()
    ))
}

fn anchor(title: &str) -> String {
    title
        .to_lowercase()
        .replace('&', "and")
        .chars()
        .filter_map(|c| match c {
            'a'..='z' | '0'..='9' | '-' => Some(c),
            ' ' | '/' => Some('-'),
            _ => None,
        })
        .collect()
}

/// Render the whole report as one Markdown document
///
/// Sections without content are listed with their status so gaps are
/// visible in the output.
#[must_use]
pub fn render_markdown(report: &Report) -> String {
    let framework = &report.framework;
    let summary = report.summary();
    let mut out = String::new();

    let _ = writeln!(out, "# {} Investment Analysis\n", report.ticker);
    let _ = writeln!(out, "**Reference Quarter:** {}", report.quarter);
    let _ = writeln!(
        out,
        "**Framework:** {} (`{}`)",
        framework.name(),
        framework.framework_id()
    );
    let _ = writeln!(out, "**Created:** {}", report.created_at.format("%Y-%m-%d"));
    let _ = writeln!(out, "\n---\n\n## Table of Contents\n");
    for def in framework.sections() {
        let _ = writeln!(out, "{}. [{}](#{})", def.id, def.title, anchor(&def.title));
    }
    let _ = writeln!(out, "\n---\n");

    for def in framework.sections() {
        let Some(state) = report.section(def.id) else {
            continue;
        };
        match state.content.as_deref() {
            Some(content) if content.trim_start().starts_with('#') => {
                let _ = writeln!(out, "{}\n", content.trim_end());
            }
            Some(content) => {
                let _ = writeln!(out, "## {}\n\n{}\n", def.title, content.trim_end());
            }
            None => {
                let _ = writeln!(out, "## {}\n", def.title);
                match &state.last_error {
                    Some(error) if state.status == SectionStatus::Failed => {
                        let _ = writeln!(out, "> **Generation Error:** {error}\n");
                    }
                    _ => {
                        let _ = writeln!(out, "> *Not yet generated ({}).*\n", state.status);
                    }
                }
            }
        }
        if state.content.is_some() {
            let _ = writeln!(out, "*[{} words, {}]*\n", state.word_count(), state.status);
        }
        let _ = writeln!(out, "---\n");
    }

    if !report.references.is_empty() {
        let _ = writeln!(out, "## References\n");
        for r in &report.references {
            let _ = write!(out, "[{}] {}", r.id, r.title);
            if let Some(source) = &r.source {
                let _ = write!(out, ". {source}");
            }
            if let Some(url) = &r.url {
                let _ = write!(out, ". <{url}>");
            }
            let _ = writeln!(out);
        }
        let _ = writeln!(out, "\n---\n");
    }

    let _ = write!(
        out,
        "*Total word count: {}. Status: {}.*\n",
        summary.total_words,
        if summary.complete { "complete" } else { "draft" }
    );
    out
}

#[derive(Serialize)]
struct ReportExport<'a> {
    #[serde(flatten)]
    report: &'a Report,
    summary: ReportSummary,
    citations: irf_qa::CitationCheck,
}

/// Render the report, its summary and the citation check as pretty JSON
///
/// # Errors
/// Returns the serializer error, which only happens for non-finite input
/// numbers
pub fn render_json(report: &Report) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&ReportExport {
        report,
        summary: report.summary(),
        citations: report.citation_check(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Quarter, Reference, Ticker};
    use irf_schema::{Framework, SectionId};
    use std::sync::Arc;

    fn report() -> Report {
        let framework = irf_resolver::resolve(&Framework::base()).unwrap();
        Report::new(
            Ticker::parse("NVDA").unwrap(),
            Quarter::parse("Q3 2025").unwrap(),
            Arc::new(framework),
        )
    }

    #[test]
    fn path_layout() {
        let r = report();
        let date = DateTime::parse_from_rfc3339("2025-11-20T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            export_path(Path::new("out"), &r, date, "md"),
            PathBuf::from("out/NVDA/2025-11-20_Q3_2025_report.md")
        );
    }

    #[test]
    fn anchors() {
        assert_eq!(anchor("Design Wins & Product Cycle"), "design-wins-and-product-cycle");
        assert_eq!(anchor("Risks (Key)"), "risks-key");
    }

    #[test]
    fn markdown_lists_every_section() {
        let mut r = report();
        let first = r.sections.get_mut(&SectionId::new(1).unwrap()).unwrap();
        first.status = SectionStatus::Generated;
        first.content = Some("Revenue grew 94% [1].".into());
        r.references.push(Reference {
            id: 1,
            title: "Q3 10-Q".into(),
            source: Some("SEC".into()),
            url: None,
        });

        let md = render_markdown(&r);
        assert!(md.starts_with("# NVDA Investment Analysis\n"));
        assert!(md.contains("## Executive Summary\n\nRevenue grew 94% [1]."));
        assert!(md.contains("*[4 words, generated]*"));
        assert!(md.contains("> *Not yet generated (pending).*"));
        assert!(md.contains("[1] Q3 10-Q. SEC"));
        assert!(md.ends_with("Status: draft.*\n"));
    }

    #[test]
    fn json_carries_summary() {
        let r = report();
        let value: serde_json::Value = serde_json::from_str(&render_json(&r).unwrap()).unwrap();
        assert_eq!(value["ticker"], "NVDA");
        assert_eq!(value["summary"]["complete"], false);
        assert_eq!(value["sections"].as_object().unwrap().len(), 11);
    }
}
