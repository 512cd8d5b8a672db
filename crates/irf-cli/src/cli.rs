//! Command-line surface

use std::path::PathBuf;

use clap::{value_parser, Arg, ArgAction, Command};

fn ticker() -> Arg {
    Arg::new("ticker")
        .required(true)
        .help("Company ticker, e.g. NVDA")
}

fn quarter() -> Arg {
    Arg::new("quarter")
        .long("quarter")
        .short('q')
        .help("Reporting period, e.g. \"Q3 2025\"; defaults to the latest report")
}

fn section(required: bool) -> Arg {
    Arg::new("section")
        .long("section")
        .short('s')
        .required(required)
        .value_parser(value_parser!(u32).range(1..=11))
        .help("Section number (1-11)")
}

/// The `irf` command tree
#[must_use]
pub fn build() -> Command {
    Command::new("irf")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Investment Report Framework - sector frameworks, section generation and QA")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Data directory (default: $IRF_DATA_DIR or the platform data dir)"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Debug logging"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .value_parser(["text", "json"])
                .default_value("text")
                .help("Log line format"),
        )
        .subcommand(
            Command::new("init")
                .about("Create the database, config file and load built-in frameworks")
                .arg(
                    Arg::new("builtin")
                        .long("builtin")
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory of framework files (default: <data-dir>/frameworks)"),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Manage configuration settings")
                .subcommand_required(true)
                .subcommand(
                    Command::new("set")
                        .about("Set a configuration value")
                        .arg(Arg::new("key").required(true))
                        .arg(Arg::new("value").required(true)),
                )
                .subcommand(Command::new("show").about("Show the effective configuration")),
        )
        .subcommand(framework_commands())
        .subcommand(report_commands())
}

fn framework_commands() -> Command {
    let id = || Arg::new("id").required(true).help("Framework id");
    Command::new("framework")
        .about("Manage sector frameworks")
        .subcommand_required(true)
        .subcommand(Command::new("list").about("List stored frameworks"))
        .subcommand(
            Command::new("view")
                .about("Show a framework's resolved sections")
                .arg(id()),
        )
        .subcommand(
            Command::new("create")
                .about("Create a framework with no overrides")
                .arg(id())
                .arg(Arg::new("name").long("name").required(true).help("Display name"))
                .arg(
                    Arg::new("sector")
                        .long("sector")
                        .help("Sector label (default: the id)"),
                )
                .arg(Arg::new("description").long("description").default_value("")),
        )
        .subcommand(
            Command::new("clone")
                .about("Copy a framework under a new id")
                .arg(Arg::new("source").required(true))
                .arg(Arg::new("target").required(true))
                .arg(Arg::new("name").long("name").help("Display name (default: Copy of <name>)")),
        )
        .subcommand(Command::new("delete").about("Delete a framework").arg(id()))
        .subcommand(
            Command::new("export")
                .about("Write a framework document")
                .arg(id())
                .arg(
                    Arg::new("format")
                        .long("format")
                        .short('f')
                        .value_parser(["json", "yaml", "md"])
                        .default_value("json"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_parser(value_parser!(PathBuf))
                        .help("Output file (default: stdout)"),
                ),
        )
        .subcommand(
            Command::new("import")
                .about("Validate and store a framework document")
                .long_about(
                    "Validate and store a framework document.\n\n\
                     Importing a document whose id is already stored replaces that \
                     framework, so editing is export, change the file, import again:\n\n  \
                     irf framework export banks --format yaml -o banks.yaml\n  \
                     irf framework import banks.yaml\n\n\
                     Existing reports keep the framework they were created with.",
                )
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .short('f')
                        .value_parser(["json", "yaml"])
                        .help("Document format (default: from the file extension)"),
                ),
        )
}

fn report_commands() -> Command {
    Command::new("report")
        .about("Create, generate, check and export reports")
        .subcommand_required(true)
        .subcommand(
            Command::new("new")
                .about("Start a report for a company")
                .arg(ticker())
                .arg(
                    Arg::new("framework")
                        .long("framework")
                        .required(true)
                        .help("Sector framework id"),
                )
                .arg(quarter().required(true))
                .arg(
                    Arg::new("inputs")
                        .long("inputs")
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON file with inputs and references"),
                ),
        )
        .subcommand(
            Command::new("generate")
                .about("Generate every section that needs it, or one section")
                .arg(ticker())
                .arg(quarter())
                .arg(section(false))
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Regenerate sections that already have content"),
                ),
        )
        .subcommand(
            Command::new("qa")
                .about("Run QA on generated sections")
                .arg(ticker())
                .arg(quarter())
                .arg(section(false)),
        )
        .subcommand(
            Command::new("approve")
                .about("Approve a QA-passed section")
                .arg(ticker())
                .arg(quarter())
                .arg(section(true)),
        )
        .subcommand(
            Command::new("view")
                .about("Print the report as Markdown")
                .arg(ticker())
                .arg(quarter()),
        )
        .subcommand(
            Command::new("export")
                .about("Write the report to the output directory")
                .arg(ticker())
                .arg(quarter())
                .arg(
                    Arg::new("format")
                        .long("format")
                        .short('f')
                        .value_parser(["md", "json"])
                        .default_value("md"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_parser(value_parser!(PathBuf))
                        .help("Output directory (default: configured output_dir)"),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("Show per-section status")
                .arg(ticker())
                .arg(quarter()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_tree_is_consistent() {
        build().debug_assert();
    }

    #[test]
    fn import_help_describes_editing() {
        let mut cmd = build();
        let help = cmd
            .find_subcommand_mut("framework")
            .and_then(|f| f.find_subcommand_mut("import"))
            .unwrap()
            .render_long_help()
            .to_string();
        assert!(help.contains("replaces that framework"));
        assert!(help.contains("irf framework export banks"));
    }

    #[test]
    fn section_is_range_checked() {
        let err = build()
            .try_get_matches_from(["irf", "report", "generate", "NVDA", "--section", "12"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let matches = build()
            .try_get_matches_from(["irf", "framework", "list", "--verbose", "--log-format", "json"])
            .unwrap();
        assert!(matches.get_flag("verbose"));
        assert_eq!(
            matches.get_one::<String>("log-format").map(String::as_str),
            Some("json")
        );
    }

    #[test]
    fn approve_requires_section() {
        assert!(build()
            .try_get_matches_from(["irf", "report", "approve", "NVDA"])
            .is_err());
    }
}
