use std::path::Path;
use std::sync::Arc;

use irf_cli::{cli, dispatch, App, AppConfig};
use irf_core::{GenerationError, SectionStatus, Ticker};
use irf_resolver::DocumentFormat;
use irf_store::Store;
use irf_test_utils::{base_framework, semiconductor_fabless, sid, ScriptedGenerator};
use tempfile::TempDir;

struct Harness {
    dir: TempDir,
    app: App,
}

impl Harness {
    fn new(generator: ScriptedGenerator) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::load_file(dir.path()).unwrap();
        config.set("generation.base_delay_ms", "1").unwrap();
        config.set("generation.max_delay_ms", "5").unwrap();
        let store = Store::open(dir.path()).unwrap();
        let app = App::with_store(config, store).with_generator(Arc::new(generator));
        Self { dir, app }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    async fn run(&self, args: &[&str]) -> anyhow::Result<String> {
        run_app(&self.app, args).await
    }

    /// Second app over the same data directory with no generator injected
    fn without_generator(&self) -> App {
        let mut config = AppConfig::load_file(self.path()).unwrap();
        config.api_key = None;
        App::with_store(config, Store::open(self.path()).unwrap())
    }
}

async fn run_app(app: &App, args: &[&str]) -> anyhow::Result<String> {
    let argv = std::iter::once("irf").chain(args.iter().copied());
    let matches = cli::build().try_get_matches_from(argv)?;
    let mut out = Vec::new();
    dispatch(app, &matches, &mut out).await?;
    Ok(String::from_utf8(out).unwrap())
}

fn default_harness() -> Harness {
    Harness::new(ScriptedGenerator::new(base_framework()))
}

#[tokio::test]
async fn framework_import_list_and_export() {
    let h = default_harness();
    let file = h.path().join("fabless.json");
    std::fs::write(
        &file,
        irf_resolver::export(&semiconductor_fabless(), DocumentFormat::Json).unwrap(),
    )
    .unwrap();

    let imported = h.run(&["framework", "import", file.to_str().unwrap()]).await.unwrap();
    assert!(imported.contains("semiconductor_fabless"));

    let listing = h.run(&["framework", "list"]).await.unwrap();
    let lines: Vec<&str> = listing.lines().collect();
    assert!(lines[1].starts_with("base"));
    assert!(listing.contains("Semiconductor - Fabless"));

    let yaml = h.path().join("out.yaml");
    h.run(&[
        "framework",
        "export",
        "semiconductor_fabless",
        "--format",
        "yaml",
        "-o",
        yaml.to_str().unwrap(),
    ])
    .await
    .unwrap();
    assert!(std::fs::read_to_string(&yaml).unwrap().contains("Design Wins & Product Cycle"));

    let view = h.run(&["framework", "view", "semiconductor_fabless"]).await.unwrap();
    assert!(view.contains("Design Wins & Product Cycle"));
}

#[tokio::test]
async fn base_framework_is_protected() {
    let h = default_harness();
    let err = h.run(&["framework", "delete", "base"]).await.unwrap_err();
    assert!(err.to_string().contains("protected"));
}

#[tokio::test]
async fn create_clone_delete_framework() {
    let h = default_harness();
    h.run(&["framework", "create", "banks", "--name", "Banks", "--sector", "financials"])
        .await
        .unwrap();
    let cloned = h.run(&["framework", "clone", "banks", "regional_banks"]).await.unwrap();
    assert!(cloned.contains("Copy of Banks"));
    assert!(h.run(&["framework", "create", "banks", "--name", "Again"]).await.is_err());

    h.run(&["framework", "delete", "banks"]).await.unwrap();
    let listing = h.run(&["framework", "list"]).await.unwrap();
    assert!(!listing.lines().any(|l| l.starts_with("banks ")));
    assert!(listing.contains("regional_banks"));
}

#[tokio::test]
async fn full_generation_persists_and_exports() {
    let h = default_harness();
    let inputs = h.path().join("nvda.json");
    std::fs::write(
        &inputs,
        r#"{"inputs":{"revenue":"$35.1B"},"references":[{"id":1,"title":"Form 10-Q","source":"SEC"}]}"#,
    )
    .unwrap();

    let created = h
        .run(&[
            "report", "new", "NVDA", "--framework", "base", "--quarter", "Q3 2025", "--inputs",
            inputs.to_str().unwrap(),
        ])
        .await
        .unwrap();
    assert!(created.contains("1 inputs, 1 references"));

    let generated = h.run(&["report", "generate", "NVDA"]).await.unwrap();
    assert!(generated.contains("11 generated, 0 skipped, 0 failed"));
    assert!(generated.contains("Report written to"));
    let exported = std::fs::read_dir(h.path().join("output").join("NVDA")).unwrap().count();
    assert_eq!(exported, 1);

    // a second process sees the committed state
    let reopened = Store::open(h.path()).unwrap();
    let report = reopened.reports().latest_for(&Ticker::parse("NVDA").unwrap()).unwrap().unwrap();
    assert!(report.sections.values().all(|s| s.status == SectionStatus::Generated));

    let again = h.run(&["report", "generate", "NVDA"]).await.unwrap();
    assert!(again.contains("0 generated, 11 skipped, 0 failed"));

    let status = h.run(&["report", "status", "NVDA", "--quarter", "Q3 2025"]).await.unwrap();
    assert!(status.contains("generated"));

    let qa = h.run(&["report", "qa", "NVDA"]).await.unwrap();
    assert!(qa.contains("## Whole report"));
    assert!(qa.contains("total_words:"));
    assert!(qa.contains("total_citations:"));
    assert!(qa.contains("no_uncited_references:"));

    let json_dir = h.path().join("json");
    h.run(&["report", "export", "NVDA", "--format", "json", "-o", json_dir.to_str().unwrap()])
        .await
        .unwrap();
    assert!(json_dir.join("NVDA").is_dir());
}

#[tokio::test]
async fn qa_then_approve_single_section() {
    let h = default_harness();
    h.run(&["report", "new", "AMD", "--framework", "base", "--quarter", "Q1 2026"])
        .await
        .unwrap();

    // approval needs a QA pass first
    h.run(&["report", "generate", "AMD", "--section", "1"]).await.unwrap();
    assert!(h.run(&["report", "approve", "AMD", "--section", "1"]).await.is_err());

    let qa = h.run(&["report", "qa", "AMD", "--section", "1"]).await.unwrap();
    assert!(qa.contains("PASS"));
    let approved = h.run(&["report", "approve", "AMD", "--section", "1"]).await.unwrap();
    assert!(approved.starts_with("Approved section 1"));

    let report = h.app.store.reports().latest_for(&Ticker::parse("AMD").unwrap()).unwrap().unwrap();
    assert_eq!(report.sections[&sid(1)].status, SectionStatus::Approved);
}

#[tokio::test]
async fn single_section_failure_is_an_error() {
    let h = Harness::new(
        ScriptedGenerator::new(base_framework())
            .with_response(1, Err(GenerationError::Auth("invalid x-api-key".into()))),
    );
    h.run(&["report", "new", "NVDA", "--framework", "base", "--quarter", "Q3 2025"])
        .await
        .unwrap();

    let err = h.run(&["report", "generate", "NVDA", "--section", "1"]).await.unwrap_err();
    assert!(err.to_string().contains("invalid x-api-key"));

    let status = h.run(&["report", "status", "NVDA"]).await.unwrap();
    assert!(status.contains("failed"));
}

#[tokio::test]
async fn duplicate_report_and_missing_report() {
    let h = default_harness();
    let args = ["report", "new", "NVDA", "--framework", "base", "--quarter", "Q3 2025"];
    h.run(&args).await.unwrap();
    assert!(h.run(&args).await.is_err());

    let err = h.run(&["report", "view", "TSLA"]).await.unwrap_err();
    assert!(err.to_string().contains("no report for TSLA"));
}

#[tokio::test]
async fn config_set_and_show() {
    let h = default_harness();
    h.run(&["config", "set", "api_key", "sk-ant-api03-abcdefwxyz"]).await.unwrap();
    h.run(&["config", "set", "generation.max_concurrency", "4"]).await.unwrap();

    let shown = h.run(&["config", "show"]).await.unwrap();
    assert!(shown.contains("generation.max_concurrency = 4"));
    assert!(shown.contains("api_key = "));
    assert!(!shown.contains("api03-abcdefwxyz"));
    assert!(h.run(&["config", "set", "nope", "1"]).await.is_err());
}

#[tokio::test]
async fn init_loads_builtin_frameworks() {
    let h = default_harness();
    let builtin = h.path().join("frameworks");
    std::fs::create_dir_all(&builtin).unwrap();
    std::fs::write(
        builtin.join("fabless.yaml"),
        irf_resolver::export(&semiconductor_fabless(), DocumentFormat::Yaml).unwrap(),
    )
    .unwrap();

    let out = h.run(&["init"]).await.unwrap();
    assert!(out.contains("loaded   semiconductor_fabless"));
    assert!(h.path().join("config.toml").exists());
    assert!(h.path().join("output").is_dir());
}

#[tokio::test]
async fn qa_and_approve_work_without_an_api_key() {
    let h = default_harness();
    h.run(&["report", "new", "AMD", "--framework", "base", "--quarter", "Q1 2026"])
        .await
        .unwrap();
    h.run(&["report", "generate", "AMD", "--section", "1"]).await.unwrap();

    let offline = h.without_generator();
    let qa = run_app(&offline, &["report", "qa", "AMD", "--section", "1"]).await.unwrap();
    assert!(qa.contains("PASS"));
    let approved = run_app(&offline, &["report", "approve", "AMD", "--section", "1"])
        .await
        .unwrap();
    assert!(approved.starts_with("Approved section 1"));

    let err = run_app(&offline, &["report", "generate", "AMD", "--section", "2"])
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("API key"));
}

#[tokio::test]
async fn reimporting_an_edited_export_updates_the_framework() {
    let h = default_harness();
    h.run(&["framework", "create", "banks", "--name", "Banks", "--sector", "financials"])
        .await
        .unwrap();
    let file = h.path().join("banks.json");
    h.run(&["framework", "export", "banks", "--format", "json", "-o", file.to_str().unwrap()])
        .await
        .unwrap();

    let edited = std::fs::read_to_string(&file).unwrap().replace("\"Banks\"", "\"Regional Banks\"");
    std::fs::write(&file, edited).unwrap();
    h.run(&["framework", "import", file.to_str().unwrap()]).await.unwrap();

    let listing = h.run(&["framework", "list"]).await.unwrap();
    assert!(listing.contains("Regional Banks"));
    assert_eq!(listing.lines().filter(|l| l.starts_with("banks ")).count(), 1);
}
