use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::ArgMatches;
use tracing::info;

use super::{required, App};
use crate::config::{mask_secret, AppConfig, CONFIG_FILE};

/// `irf init`
pub fn init(app: &App, matches: &ArgMatches, out: &mut dyn Write) -> anyhow::Result<()> {
    let data_dir = &app.config.data_dir;
    if data_dir.join(CONFIG_FILE).exists() {
        writeln!(out, "Config already present in {}", data_dir.display())?;
    } else {
        // file values only, so env overrides never land on disk
        let path = AppConfig::load_file(data_dir)?.save()?;
        writeln!(out, "Wrote {}", path.display())?;
    }

    let output = app.config.output_dir();
    std::fs::create_dir_all(&output)
        .with_context(|| format!("cannot create {}", output.display()))?;

    let builtin = matches
        .get_one::<PathBuf>("builtin")
        .cloned()
        .unwrap_or_else(|| data_dir.join("frameworks"));
    if builtin.is_dir() {
        let load = app.store.frameworks().load_builtin(&builtin)?;
        for id in &load.loaded {
            writeln!(out, "  loaded   {id}")?;
        }
        for (path, reason) in &load.rejected {
            writeln!(out, "  rejected {}: {reason}", path.display())?;
        }
        info!(loaded = load.loaded.len(), rejected = load.rejected.len(), "built-in frameworks");
    } else if matches.contains_id("builtin") {
        bail!("{} is not a directory", builtin.display());
    }

    writeln!(out, "Initialized {}", data_dir.display())?;
    Ok(())
}

/// `irf config set|show`
pub fn config(data_dir: &Path, matches: &ArgMatches, out: &mut dyn Write) -> anyhow::Result<()> {
    match matches.subcommand() {
        Some(("set", sub)) => {
            let key = required(sub, "key")?;
            let value = required(sub, "value")?;
            let mut config = AppConfig::load_file(data_dir)?;
            config.set(key, value)?;
            let path = config.save()?;
            let shown = if key == "api_key" {
                mask_secret(value)
            } else {
                value.to_string()
            };
            writeln!(out, "Set {key} = {shown} in {}", path.display())?;
        }
        Some(("show", _)) => {
            let config = AppConfig::load(data_dir)?;
            for (key, value) in config.entries() {
                writeln!(out, "{key} = {value}")?;
            }
        }
        _ => bail!("expected `set` or `show`"),
    }
    Ok(())
}
