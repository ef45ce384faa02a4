use std::io::stdout;

use anyhow::Result;
use clap::{crate_version, value_parser, Arg, Command};
use clap_complete::{generate, Shell};

pub mod progress;

mod subcommands;

pub mod traits;
use traits::SentimentApp;

fn main() -> Result<()> {
    // Known subapplications.
    let apps = vec![
        subcommands::DecodeApp::app(),
        subcommands::TrainApp::app(),
    ];

    env_logger::init();

    let cli = Command::new("imdb-sentiment")
        .about("IMDB movie review sentiment classifiers")
        .version(crate_version!())
        .dont_collapse_args_in_usage(true)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommands(apps)
        .subcommand(
            Command::new("completions")
                .about("Generate completion scripts for your shell")
                .arg_required_else_help(true)
                .arg(Arg::new("shell").value_parser(value_parser!(Shell))),
        );
    let matches = cli.clone().get_matches();

    match matches.subcommand() {
        Some(("completions", matches)) => {
            let shell = *matches.get_one::<Shell>("shell").unwrap();
            write_completion_script(cli, shell);
            Ok(())
        }
        Some(("decode", matches)) => subcommands::DecodeApp::parse(matches)?.run(),
        Some(("train", matches)) => subcommands::TrainApp::parse(matches)?.run(),
        _unknown => unreachable!(),
    }
}

fn write_completion_script(mut cli: Command, shell: Shell) {
    generate(shell, &mut cli, "imdb-sentiment", &mut stdout());
}
