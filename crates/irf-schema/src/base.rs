//! The base schema: the fixed 11-section reference definition
//!
//! Every framework resolves against these sections. Base sections declare no
//! dependencies and no required inputs; sector frameworks add both.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;

use crate::rules::{Predicate, QaRule};
use crate::section::{SectionDefinition, SectionId, TargetRange};

struct Seed {
    id: u8,
    title: &'static str,
    brief: &'static str,
    words: (u32, u32),
    citations: (u32, u32),
    elements: &'static [&'static str],
}

const SEEDS: [Seed; 11] = [
    Seed {
        id: 1,
        title: "Executive Summary",
        brief: "State the investment thesis for {ticker} in {quarter}, the catalysts that \
                support it, the headline metrics, and where the market misprices the company.",
        words: (400, 500),
        citations: (3, 5),
        elements: &[
            "headline_thesis",
            "key_catalysts",
            "headline_metrics",
            "valuation_context",
            "mispricing_argument",
            "investor_takeaway",
        ],
    },
    Seed {
        id: 2,
        title: "Macroeconomic & Geopolitical Backdrop",
        brief: "Describe the industry tailwinds, the position in the market cycle, and the \
                geopolitical and regulatory context that shape {ticker}'s operating environment.",
        words: (400, 600),
        citations: (4, 6),
        elements: &[
            "industry_tailwinds",
            "market_cycle_position",
            "geopolitical_regulatory_context",
        ],
    },
    Seed {
        id: 3,
        title: "Strategic Positioning",
        brief: "Explain how {ticker} is positioned strategically: business overview, \
                restructuring or M&A activity, and competitive moat.",
        words: (400, 600),
        citations: (3, 5),
        elements: &["business_overview", "competitive_position"],
    },
    Seed {
        id: 4,
        title: "Operational Analysis - Primary",
        brief: "Analyse {ticker}'s primary operating segment: segment overview, product \
                portfolio, operational KPIs and outlook.",
        words: (800, 1200),
        citations: (8, 12),
        elements: &[
            "segment_overview",
            "product_portfolio",
            "operational_kpis",
            "outlook",
        ],
    },
    Seed {
        id: 5,
        title: "Operational Analysis - Secondary",
        brief: "Analyse {ticker}'s secondary segments and their contribution to growth and \
                margins.",
        words: (400, 600),
        citations: (3, 5),
        elements: &[],
    },
    Seed {
        id: 6,
        title: "Associated Companies & Ecosystem",
        brief: "Map the suppliers, customers, partners and affiliated companies around \
                {ticker} and how they affect its prospects.",
        words: (300, 400),
        citations: (2, 4),
        elements: &[],
    },
    Seed {
        id: 7,
        title: "Financial Performance Deep Dive",
        brief: "Review {ticker}'s financial results for {quarter}: P&L snapshot, revenue and \
                margin analysis, backlog or forward metrics, balance sheet and cash flow.",
        words: (600, 800),
        citations: (6, 10),
        elements: &[
            "pnl_snapshot_table",
            "revenue_analysis",
            "margin_analysis",
            "backlog_or_forward_metrics",
            "balance_sheet_cash_flow",
        ],
    },
    Seed {
        id: 8,
        title: "Masterclass",
        brief: "Teach the reader how to analyse a company like {ticker}: the metrics that \
                matter, how to read them, and common analytical mistakes.",
        words: (800, 1000),
        citations: (4, 6),
        elements: &[],
    },
    Seed {
        id: 9,
        title: "Peer Valuation & Comparative Analysis",
        brief: "Compare {ticker} with its peers on valuation multiples and operating metrics, \
                then derive a fair value estimate.",
        words: (500, 700),
        citations: (5, 7),
        elements: &[
            "peer_comparison_table",
            "valuation_discussion",
            "fair_value_estimate",
        ],
    },
    Seed {
        id: 10,
        title: "Risks & Challenges",
        brief: "Set out the three most material risks to the {ticker} thesis, each with an \
                assessed probability and impact.",
        words: (400, 600),
        citations: (3, 5),
        elements: &[
            "risk_1_with_probability_impact",
            "risk_2_with_probability_impact",
            "risk_3_with_probability_impact",
        ],
    },
    Seed {
        id: 11,
        title: "Conclusion & Monitoring Framework",
        brief: "Restate the thesis for {ticker}, list the monitoring points that would \
                confirm or break it, and give actionable recommendations.",
        words: (300, 400),
        citations: (2, 3),
        elements: &[
            "thesis_restatement",
            "monitoring_points",
            "actionable_recommendations",
        ],
    },
];

fn template(brief: &str) -> String {
    format!(
        "Write Section {{section_id}}: {{title}} of an institutional research report on \
         {{ticker}} for {{quarter}}.\n\n{brief}\n\nUse Markdown with ## and ### headers, \
         cite sources inline as [N], and present financial data in Markdown tables."
    )
}

fn base_rules(seed: &Seed) -> Vec<QaRule> {
    let mut rules = vec![
        QaRule::blocking("min_words", Predicate::MinWords { min: seed.words.0 }),
        QaRule::warning("max_words", Predicate::MaxWords { max: seed.words.1 }),
        QaRule::blocking(
            "min_citations",
            Predicate::MinCitations {
                min: seed.citations.0,
            },
        ),
        QaRule::blocking("no_placeholders", Predicate::no_placeholders()),
        QaRule::warning("no_hype_language", Predicate::no_hype_language()),
        QaRule::warning("no_first_person", Predicate::NoFirstPerson),
    ];
    match seed.id {
        7 | 9 => rules.push(QaRule::warning("requires_table", Predicate::RequiresTable)),
        10 => rules.push(QaRule::warning(
            "risk_probability_impact",
            Predicate::MentionsAny {
                terms: vec!["probability".into(), "likelihood".into(), "impact".into()],
            },
        )),
        _ => {}
    }
    rules
}

static BASE: Lazy<Vec<SectionDefinition>> = Lazy::new(|| {
    SEEDS
        .iter()
        .zip(SectionId::all())
        .map(|(seed, id)| SectionDefinition {
            id,
            title: seed.title.to_string(),
            prompt_template: template(seed.brief),
            required_inputs: BTreeSet::new(),
            qa_rules: base_rules(seed),
            depends_on: BTreeSet::new(),
            word_target: TargetRange {
                min: seed.words.0,
                max: seed.words.1,
            },
            citation_target: TargetRange {
                min: seed.citations.0,
                max: seed.citations.1,
            },
            required_elements: seed.elements.iter().map(|e| (*e).to_string()).collect(),
        })
        .collect()
});

/// The 11 base sections, ordered by id
#[must_use]
pub fn base_schema() -> &'static [SectionDefinition] {
    &BASE
}

/// Base definition of one section
#[must_use]
pub fn base_section(id: SectionId) -> &'static SectionDefinition {
    &BASE[id.index()]
}

/// Sum of word targets across sections
#[must_use]
pub fn total_word_target(sections: &[SectionDefinition]) -> TargetRange {
    sections.iter().fold(TargetRange { min: 0, max: 0 }, |acc, s| TargetRange {
        min: acc.min + s.word_target.min,
        max: acc.max + s.word_target.max,
    })
}

/// Sum of citation targets across sections
#[must_use]
pub fn total_citation_target(sections: &[SectionDefinition]) -> TargetRange {
    sections.iter().fold(TargetRange { min: 0, max: 0 }, |acc, s| TargetRange {
        min: acc.min + s.citation_target.min,
        max: acc.max + s.citation_target.max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::FieldName;

    #[test]
    fn base_has_eleven_ordered_sections() {
        let base = base_schema();
        assert_eq!(base.len(), 11);
        for (i, section) in base.iter().enumerate() {
            assert_eq!(usize::from(section.id.get()), i + 1);
        }
    }

    #[test]
    fn base_sections_have_required_fields() {
        for section in base_schema() {
            for field in FieldName::ALL.into_iter().filter(|f| f.is_required()) {
                assert!(!section.is_field_empty(field), "section {} {field}", section.id);
            }
            assert!(section.word_target.is_valid());
            assert!(section.citation_target.is_valid());
        }
    }

    #[test]
    fn base_declares_no_dependencies() {
        assert!(base_schema().iter().all(|s| s.depends_on.is_empty()));
        assert!(base_schema().iter().all(|s| s.required_inputs.is_empty()));
    }

    #[test]
    fn totals_sum_sections() {
        let words = total_word_target(base_schema());
        assert_eq!(words.min, 5300);
        assert_eq!(words.max, 7400);
        let citations = total_citation_target(base_schema());
        assert_eq!(citations.min, 43);
        assert_eq!(citations.max, 68);
    }

    #[test]
    fn templates_carry_placeholders() {
        let s = base_section(SectionId::new(7).unwrap());
        assert!(s.prompt_template.contains("{ticker}"));
        assert!(s.prompt_template.contains("{quarter}"));
        assert!(s.prompt_template.contains("{section_id}"));
    }
}
