//! # Command Line Interface / 命令行接口
//!
//! Builds the `tox-matrix` command with localised help text and dispatches to
//! the `run`, `list` and `init` commands.
//!
//! 构建带有本地化帮助文本的 `tox-matrix` 命令，并分派到 `run`、`list` 和 `init` 命令。

pub mod commands;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::{env, path::PathBuf, process::ExitCode};

use crate::infra::t;
use commands::run::RunArgs;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG: &str = "tox.toml";

/// Pre-parses the command line arguments to find the language setting.
/// This allows i18n to be initialized before the full CLI is built.
/// It looks for a `--lang <VALUE>` or `--lang=<VALUE>` argument.
fn pre_parse_language() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    for (pos, arg) in args.iter().enumerate() {
        if arg == "--" {
            break;
        }
        if arg == "--lang" {
            return args.get(pos + 1).cloned();
        }
        if let Some(lang) = arg.strip_prefix("--lang=") {
            return Some(lang.to_string());
        }
    }
    None
}

fn config_arg(locale: &str) -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .help(t!("cli.arg_config", locale = locale).to_string())
        .value_name("CONFIG")
        .default_value(DEFAULT_CONFIG)
        .value_parser(clap::value_parser!(PathBuf))
        .action(ArgAction::Set)
}

pub fn build_cli(locale: &str) -> Command {
    Command::new("tox-matrix")
        .version(env!("CARGO_PKG_VERSION"))
        .about(t!("cli.about", locale = locale).to_string())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("lang")
                .long("lang")
                .help(t!("cli.arg_lang", locale = locale).to_string())
                .value_name("LANGUAGE")
                .global(true)
                .action(ArgAction::Set),
        )
        .subcommand(
            Command::new("run")
                .about(t!("cli.cmd_run_about", locale = locale).to_string())
                .arg(config_arg(locale))
                .arg(
                    Arg::new("env")
                        .short('e')
                        .long("env")
                        .help(t!("cli.arg_env", locale = locale).to_string())
                        .value_name("ENVS")
                        .value_delimiter(',')
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .help(t!("cli.arg_jobs", locale = locale).to_string())
                        .value_name("JOBS")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("recreate")
                        .short('r')
                        .long("recreate")
                        .help(t!("cli.arg_recreate", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("skip-missing-interpreters")
                        .long("skip-missing-interpreters")
                        .help(t!("cli.arg_skip_missing", locale = locale).to_string())
                        .value_name("BOOL")
                        .value_parser(clap::value_parser!(bool))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("total-runners")
                        .long("total-runners")
                        .help(t!("cli.arg_total_runners", locale = locale).to_string())
                        .value_name("TOTAL_RUNNERS")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set)
                        .requires("runner-index"),
                )
                .arg(
                    Arg::new("runner-index")
                        .long("runner-index")
                        .help(t!("cli.arg_runner_index", locale = locale).to_string())
                        .value_name("RUNNER_INDEX")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set)
                        .requires("total-runners"),
                )
                .arg(
                    Arg::new("html")
                        .long("html")
                        .help(t!("cli.arg_html", locale = locale).to_string())
                        .value_name("HTML")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help(t!("cli.arg_json", locale = locale).to_string())
                        .value_name("JSON")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("posargs")
                        .help(t!("cli.arg_posargs", locale = locale).to_string())
                        .value_name("POSARGS")
                        .num_args(0..)
                        .last(true)
                        .action(ArgAction::Append),
                ),
        )
        .subcommand(
            Command::new("list")
                .about(t!("cli.cmd_list_about", locale = locale).to_string())
                .arg(config_arg(locale)),
        )
        .subcommand(
            Command::new("init")
                .about(t!("cli.cmd_init_about", locale = locale).to_string())
                .arg(config_arg(locale))
                .arg(
                    Arg::new("non-interactive")
                        .long("non-interactive")
                        .help(t!("cli.arg_non_interactive", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help(t!("cli.arg_force", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn config_path(matches: &ArgMatches) -> PathBuf {
    matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG))
}

fn run_args(matches: &ArgMatches) -> RunArgs {
    RunArgs {
        config: config_path(matches),
        envs: matches
            .get_many::<String>("env")
            .map(|values| values.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()).collect()),
        jobs: matches.get_one::<usize>("jobs").copied(),
        recreate: matches.get_flag("recreate"),
        skip_missing_interpreters: matches.get_one::<bool>("skip-missing-interpreters").copied(),
        total_runners: matches.get_one::<usize>("total-runners").copied(),
        runner_index: matches.get_one::<usize>("runner-index").copied(),
        html: matches.get_one::<PathBuf>("html").cloned(),
        json: matches.get_one::<PathBuf>("json").cloned(),
        posargs: matches
            .get_many::<String>("posargs")
            .map(|values| values.cloned().collect())
            .unwrap_or_default(),
    }
}

/// Parses the command line and runs the selected command.
/// 解析命令行并运行所选命令。
pub async fn run() -> Result<ExitCode> {
    // Pre-parse language and initialize i18n first.
    let language = match pre_parse_language() {
        Some(lang) => {
            rust_i18n::set_locale(&lang);
            lang
        }
        None => crate::init(),
    };

    let matches = build_cli(&language).get_matches();

    match matches.subcommand() {
        Some(("run", run_matches)) => commands::run::execute(run_args(run_matches), &language).await,
        Some(("list", list_matches)) => {
            commands::list::execute(&config_path(list_matches), &language)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(("init", init_matches)) => {
            commands::init::run_init_wizard(
                &config_path(init_matches),
                &language,
                init_matches.get_flag("non-interactive"),
                init_matches.get_flag("force"),
            )?;
            Ok(ExitCode::SUCCESS)
        }
        // `subcommand_required` makes clap print help and exit before this.
        _ => Ok(ExitCode::SUCCESS),
    }
}
