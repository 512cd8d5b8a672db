use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use clap::ArgMatches;
use irf_resolver::DocumentFormat;
use irf_schema::{Framework, FrameworkId};

use super::{required, App};

/// `irf framework ...`
pub fn run(app: &App, matches: &ArgMatches, out: &mut dyn Write) -> anyhow::Result<()> {
    let repo = app.store.frameworks();
    match matches.subcommand() {
        Some(("list", _)) => {
            let frameworks = repo.list()?;
            writeln!(out, "{:<28} {:<20} {:>9}  NAME", "ID", "SECTOR", "OVERRIDES")?;
            for f in frameworks {
                writeln!(
                    out,
                    "{:<28} {:<20} {:>9}  {}",
                    f.id.as_str(),
                    f.sector,
                    f.override_count,
                    f.name
                )?;
            }
        }
        Some(("view", sub)) => {
            let resolved = repo.resolve(&framework_id(sub, "id")?)?;
            write!(out, "{}", irf_resolver::render_markdown(&resolved))?;
        }
        Some(("create", sub)) => {
            let id = framework_id(sub, "id")?;
            let sector = sub
                .get_one::<String>("sector")
                .cloned()
                .unwrap_or_else(|| id.as_str().to_string());
            let description = sub.get_one::<String>("description").cloned().unwrap_or_default();
            let framework =
                Framework::new(id, sector, required(sub, "name")?).with_description(description);
            let resolved = repo.create(&framework)?;
            writeln!(
                out,
                "Created framework {} ({})",
                framework.id,
                resolved.fingerprint()
            )?;
        }
        Some(("clone", sub)) => {
            let source = framework_id(sub, "source")?;
            let target = framework_id(sub, "target")?;
            let copy = repo.clone_framework(&source, target, sub.get_one::<String>("name").cloned())?;
            writeln!(out, "Cloned {source} to {} \"{}\"", copy.id, copy.name)?;
        }
        Some(("delete", sub)) => {
            let id = framework_id(sub, "id")?;
            repo.delete(&id)?;
            writeln!(out, "Deleted framework {id}")?;
        }
        Some(("export", sub)) => {
            let id = framework_id(sub, "id")?;
            let format: DocumentFormat = required(sub, "format")?.parse()?;
            let text = repo.export(&id, format)?;
            match sub.get_one::<PathBuf>("output") {
                Some(path) => {
                    std::fs::write(path, &text)
                        .with_context(|| format!("cannot write {}", path.display()))?;
                    writeln!(out, "Exported {id} to {}", path.display())?;
                }
                None => write!(out, "{text}")?,
            }
        }
        Some(("import", sub)) => {
            let path = sub
                .get_one::<PathBuf>("file")
                .ok_or_else(|| anyhow!("missing argument <file>"))?;
            let format = match sub.get_one::<String>("format") {
                Some(f) => f.parse()?,
                None => DocumentFormat::from_path(path).ok_or_else(|| {
                    anyhow!("cannot tell the format of {}; pass --format", path.display())
                })?,
            };
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            let framework = repo.import(&text, format)?;
            writeln!(
                out,
                "Imported {} \"{}\" ({} overrides)",
                framework.id,
                framework.name,
                framework.override_count()
            )?;
        }
        _ => bail!("unknown framework command"),
    }
    Ok(())
}

fn framework_id(matches: &ArgMatches, name: &str) -> anyhow::Result<FrameworkId> {
    Ok(FrameworkId::parse(required(matches, name)?)?)
}
