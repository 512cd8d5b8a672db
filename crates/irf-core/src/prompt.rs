//! Prompt assembly for one section
//!
//! Layout, top to bottom:
//! 1. heading with company, period and targets
//! 2. required elements
//! 3. the section's rendered prompt template
//! 4. input data
//! 5. content of the sections it depends on, by ascending id
//! 6. the reference list, when there is one

use std::fmt::Write as _;

use irf_schema::{SectionDefinition, SectionId, SectionInputs};

use crate::types::{Quarter, Reference, Ticker};

/// Already-generated upstream section handed to a dependent
#[derive(Debug, Clone, Copy)]
pub struct Upstream<'a> {
    /// Upstream section id
    pub id: SectionId,
    /// Upstream section title
    pub title: &'a str,
    /// Upstream section content
    pub content: &'a str,
}

/// Inputs to [`assemble_prompt`]
#[derive(Debug, Clone, Copy)]
pub struct PromptParts<'a> {
    /// Section being written
    pub definition: &'a SectionDefinition,
    /// Company ticker
    pub ticker: &'a Ticker,
    /// Reporting period
    pub quarter: &'a Quarter,
    /// Report inputs; narrowed to the section's required keys when it has any
    pub inputs: &'a SectionInputs,
    /// Upstream sections, in any order
    pub upstream: &'a [Upstream<'a>],
    /// Report reference list
    pub references: &'a [Reference],
}

/// Substitute `{ticker}`, `{quarter}`, `{title}` and `{section_id}`
#[must_use]
pub fn render_template(template: &str, definition: &SectionDefinition, ticker: &Ticker, quarter: &Quarter) -> String {
    template
        .replace("{ticker}", ticker.as_str())
        .replace("{quarter}", quarter.as_str())
        .replace("{title}", &definition.title)
        .replace("{section_id}", &definition.id.to_string())
}

/// `gross_margin_drivers` -> `Gross Margin Drivers`
fn humanize(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build the full user prompt for one section
#[must_use]
pub fn assemble_prompt(parts: &PromptParts<'_>) -> String {
    let def = parts.definition;
    let mut out = String::new();

    let _ = writeln!(out, "# Section {}: {}", def.id, def.title);
    let _ = writeln!(out);
    let _ = writeln!(out, "**Company:** {}", parts.ticker);
    let _ = writeln!(out, "**Reference Quarter:** {}", parts.quarter);
    let _ = writeln!(out, "**Word Count Target:** {} words", def.word_target);
    let _ = writeln!(
        out,
        "**Citation Target:** {} inline citations [N]",
        def.citation_target
    );
    let _ = writeln!(out);

    if !def.required_elements.is_empty() {
        let _ = writeln!(out, "**Required Elements (must include all):**");
        for element in &def.required_elements {
            let _ = writeln!(out, "- {}", humanize(element));
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(
        out,
        "{}",
        render_template(&def.prompt_template, def, parts.ticker, parts.quarter)
    );

    let inputs = if def.required_inputs.is_empty() {
        parts.inputs.clone()
    } else {
        parts.inputs.select(&def.required_inputs)
    };
    if !inputs.is_empty() {
        let _ = writeln!(out, "\n---\n## Input Data\n");
        for (key, value) in inputs.iter() {
            let _ = writeln!(out, "- {}: {value}", humanize(key));
        }
    }

    let mut upstream: Vec<&Upstream<'_>> = parts.upstream.iter().collect();
    upstream.sort_by_key(|u| u.id);
    for section in upstream {
        let _ = writeln!(
            out,
            "\n---\n## Context: Section {} ({})\n\n{}",
            section.id,
            section.title,
            section.content.trim_end()
        );
    }

    if !parts.references.is_empty() {
        let _ = writeln!(out, "\n---\n## Available Citations\nUse [N] format to cite these sources inline:\n");
        for r in parts.references {
            match &r.source {
                Some(source) => {
                    let _ = writeln!(out, "[{}] {} ({source})", r.id, r.title);
                }
                None => {
                    let _ = writeln!(out, "[{}] {}", r.id, r.title);
                }
            }
        }
    }

    let _ = write!(
        out,
        "\n---\n\nWrite Section {}: {}. Target {} words with {} citations.",
        def.id, def.title, def.word_target, def.citation_target
    );
    out
}
