use std::path::PathBuf;
use std::process::ExitCode;

use clap::{value_parser, Arg, ArgAction, Command};

mod commands;
mod logging;

use logging::LogFormat;

fn workspace_arg() -> Arg {
    Arg::new("workspace")
        .required(true)
        .value_parser(value_parser!(u64))
        .help("Workspace id")
}

fn cli() -> Command {
    Command::new("rigor")
        .version(rigor_core::VERSION)
        .about("Edit hypothesis-test workspaces and run them in the sandbox")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("api-url")
                .long("api-url")
                .global(true)
                .help("API root, overrides the config file and RIGOR_API_URL"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .default_value("text")
                .value_parser(value_parser!(LogFormat))
                .help("Log format on stderr: text or json"),
        )
        .subcommand(
            Command::new("show")
                .about("List a workspace's files")
                .arg(workspace_arg()),
        )
        .subcommand(
            Command::new("push")
                .about("Upload a local file into a workspace, creating it if needed")
                .arg(workspace_arg())
                .arg(Arg::new("path").required(true).help("Path inside the workspace"))
                .arg(
                    Arg::new("from")
                        .long("from")
                        .value_parser(value_parser!(PathBuf))
                        .help("Local file to read (defaults to PATH)"),
                ),
        )
        .subcommand(
            Command::new("new-file")
                .about("Create a file from the template")
                .arg(workspace_arg())
                .arg(Arg::new("name").required(true).help("File name, e.g. analysis.py")),
        )
        .subcommand(
            Command::new("rm")
                .about("Delete a file")
                .arg(workspace_arg())
                .arg(Arg::new("path").required(true).help("Path inside the workspace")),
        )
        .subcommand(
            Command::new("run")
                .about("Save the active file, run the workspace and wait for the result")
                .arg(workspace_arg())
                .arg(
                    Arg::new("file")
                        .long("file")
                        .help("Active file to save first (defaults to the entry file)"),
                )
                .arg(
                    Arg::new("from")
                        .long("from")
                        .value_parser(value_parser!(PathBuf))
                        .help("Replace the active file with this local file before running"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the completion as JSON"),
                ),
        )
        .subcommand(
            Command::new("runs")
                .about("Show a workspace's run history")
                .arg(workspace_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("create")
                .about("Create a workspace")
                .arg(Arg::new("name").required(true))
                .arg(Arg::new("description").long("description"))
                .arg(
                    Arg::new("investigation")
                        .long("investigation")
                        .value_parser(value_parser!(u64))
                        .help("Investigation to link"),
                )
                .arg(
                    Arg::new("agent")
                        .long("agent")
                        .value_parser(value_parser!(u64)),
                )
                .arg(
                    Arg::new("generate")
                        .long("generate")
                        .action(ArgAction::SetTrue)
                        .requires("investigation")
                        .help("Generate the entry file from the investigation"),
                ),
        )
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();

    let format = matches
        .get_one::<LogFormat>("log-format")
        .copied()
        .unwrap_or(LogFormat::Text);
    logging::init(format);

    match commands::dispatch(&matches).await {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let matches = cli()
            .try_get_matches_from(["rigor", "run", "7", "--file", "main.py", "--log-format", "json"])
            .unwrap();
        assert_eq!(matches.get_one::<LogFormat>("log-format"), Some(&LogFormat::Json));
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "run");
        assert_eq!(args.get_one::<u64>("workspace"), Some(&7));
    }

    #[test]
    fn generate_requires_investigation() {
        let err = cli()
            .try_get_matches_from(["rigor", "create", "probe", "--generate"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
