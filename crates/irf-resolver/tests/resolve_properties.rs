use irf_resolver::{export, import, resolve, DocumentFormat, ResolveError};
use irf_schema::{base_schema, base_section, Framework, FrameworkId, Override, SectionId};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;

fn empty_framework() -> Framework {
    Framework::new(FrameworkId::parse("prop_fw").unwrap(), "tech", "Property Framework")
}

fn override_strategy() -> impl Strategy<Value = Override> {
    (
        1u32..=11,
        proptest::option::of("[A-Z][a-z ]{2,20}"),
        proptest::option::of("[a-z]{5,40}"),
        proptest::option::of((0u32..2000, 0u32..2000)),
        proptest::collection::btree_set(1u32..=11, 0..3),
        proptest::option::of(proptest::collection::btree_set("[a-z_]{3,12}", 1..3)),
    )
        .prop_map(|(id, title, template, words, deps, inputs)| {
            let mut ov = Override::new(id);
            if let Some(title) = title {
                ov = ov.set("title", json!(title));
            }
            if let Some(template) = template {
                ov = ov.set("prompt_template", json!(template));
            }
            if let Some((a, b)) = words {
                ov = ov.set("word_target", json!({"min": a.min(b), "max": a.max(b)}));
            }
            // Only point at lower ids so the generated graph stays acyclic.
            let deps: Vec<u32> = deps.into_iter().filter(|d| *d < id).collect();
            if !deps.is_empty() {
                ov = ov.set("depends_on", json!(deps));
            }
            if let Some(inputs) = inputs {
                ov = ov.set("required_inputs", json!(inputs));
            }
            ov
        })
}

fn framework_strategy() -> impl Strategy<Value = Framework> {
    proptest::collection::vec(override_strategy(), 0..6).prop_map(|ovs| {
        ovs.into_iter()
            .fold(empty_framework(), |fw, ov| fw.with_override(ov))
    })
}

fn cycle_strategy() -> impl Strategy<Value = Vec<u32>> {
    proptest::sample::subsequence((1u32..=11).collect::<Vec<_>>(), 1..=5).prop_shuffle()
}

proptest! {
    #[test]
    fn prop_resolution_is_deterministic(fw in framework_strategy()) {
        let a = resolve(&fw).unwrap();
        let b = resolve(&fw).unwrap();
        prop_assert_eq!(a.fingerprint(), b.fingerprint());
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_json_round_trip_is_lossless(fw in framework_strategy()) {
        let text = export(&fw, DocumentFormat::Json).unwrap();
        let (imported, resolved) = import(&text, DocumentFormat::Json).unwrap();
        prop_assert_eq!(&imported, &fw);
        prop_assert_eq!(resolved, resolve(&fw).unwrap());
    }

    #[test]
    fn prop_yaml_round_trip_is_lossless(fw in framework_strategy()) {
        let text = export(&fw, DocumentFormat::Yaml).unwrap();
        let (_, resolved) = import(&text, DocumentFormat::Yaml).unwrap();
        prop_assert_eq!(resolved, resolve(&fw).unwrap());
    }

    #[test]
    fn prop_untouched_sections_equal_base(fw in framework_strategy()) {
        let resolved = resolve(&fw).unwrap();
        for id in SectionId::all() {
            if fw.override_for(u32::from(id.get())).is_none() {
                prop_assert_eq!(resolved.section(id), base_section(id));
            }
        }
    }

    #[test]
    fn prop_counter_override_restores_base(
        id in 1u32..=11,
        title in "[A-Z][a-z ]{2,20}",
        template in "[a-z]{5,40}",
    ) {
        let sid = SectionId::new(id).unwrap();
        let base = base_section(sid);
        let mut fw = empty_framework().with_override(
            Override::new(id)
                .set("title", json!(title))
                .set("prompt_template", json!(template)),
        );
        fw.set_override(
            Override::new(id)
                .set("title", json!(base.title))
                .set("prompt_template", json!(base.prompt_template)),
        );
        prop_assert_eq!(resolve(&fw).unwrap(), resolve(&empty_framework()).unwrap());
    }

    #[test]
    fn prop_cycles_always_rejected(cycle in cycle_strategy()) {
        let mut fw = empty_framework();
        for (i, section) in cycle.iter().enumerate() {
            let next = cycle[(i + 1) % cycle.len()];
            fw.set_override(Override::new(*section).set("depends_on", json!([next])));
        }
        let is_cycle = matches!(resolve(&fw), Err(ResolveError::DependencyCycle { .. }));
        prop_assert!(is_cycle);
    }

    #[test]
    fn prop_order_respects_dependencies(fw in framework_strategy()) {
        let resolved = resolve(&fw).unwrap();
        let order = resolved.generation_order();
        prop_assert_eq!(order.len(), 11);
        for (pos, id) in order.iter().enumerate() {
            for dep in resolved.dependencies_of(*id) {
                let dep_pos = order.iter().position(|s| s == dep).unwrap();
                prop_assert!(dep_pos < pos);
            }
        }
    }
}

#[test]
fn test_no_overrides_matches_base_schema() {
    let resolved = resolve(&empty_framework()).unwrap();
    assert_eq!(resolved.sections(), base_schema());
    assert_eq!(resolved.sections().len(), 11);
}

#[test]
fn test_semiconductor_fabless_only_changes_section_four() {
    let rules = json!([
        {"name": "design_win_citations", "predicate": {"kind": "min_citations", "min": 10}, "severity": "blocking"},
        {"name": "kpis", "predicate": {"kind": "mentions_any", "terms": ["tape-out", "design win"]}, "severity": "warning"}
    ]);
    let fw = Framework::new(
        FrameworkId::parse("semiconductor_fabless").unwrap(),
        "semiconductors",
        "Semiconductor - Fabless",
    )
    .with_override(
        Override::new(4)
            .set("prompt_template", json!("Analyse design wins and the product cycle for {ticker}."))
            .set("qa_rules", rules),
    );

    let resolved = resolve(&fw).unwrap();
    let s4 = resolved.section(SectionId::new(4).unwrap());
    assert_eq!(
        s4.prompt_template,
        "Analyse design wins and the product cycle for {ticker}."
    );
    assert_eq!(s4.qa_rules.len(), 2);
    assert_eq!(s4.qa_rules[0].name, "design_win_citations");
    assert_eq!(s4.title, base_section(SectionId::new(4).unwrap()).title);

    for id in SectionId::all().filter(|id| id.get() != 4) {
        let a = serde_json::to_vec(resolved.section(id)).unwrap();
        let b = serde_json::to_vec(base_section(id)).unwrap();
        assert_eq!(a, b, "section {id} differs from base");
    }
}
