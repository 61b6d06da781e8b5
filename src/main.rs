use clap::{arg, command, value_parser, ArgAction, Command};
use colored::Colorize;
use sepulka::config::EngineConfig;
use sepulka::scenario::{Runner, Scenario};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn main() -> ExitCode {
    let matches = command!()
        .subcommand_required(true)
        .arg(
            arg!(-v --verbose "Log more; repeat for even more")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand(
            Command::new("run")
                .about("Run a scenario against in-memory stores")
                .arg(
                    arg!(<file> "The scenario file to run").value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"max-steps" <N> "Longest chain of steps one take may drive")
                        .value_parser(value_parser!(usize)),
                ),
        )
        .get_matches();

    let level = match matches.get_count("verbose") {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match matches.subcommand() {
        Some(("run", args)) => {
            let Some(file) = args.get_one::<PathBuf>("file") else {
                return ExitCode::FAILURE;
            };
            let max_steps = args.get_one::<usize>("max-steps").copied();
            run_scenario(file, max_steps)
        }
        _ => unreachable!(),
    }
}

fn run_scenario(file: &Path, max_steps: Option<usize>) -> ExitCode {
    let scenario = match Scenario::load(file) {
        Ok(scenario) => scenario,
        Err(err) => {
            println!("{}", "Could not load scenario".bright_red());
            eprintln!("{:?}", miette::Report::new(err));
            return ExitCode::FAILURE;
        }
    };

    let config = EngineConfig {
        max_steps: max_steps.unwrap_or(scenario.config.max_steps),
    };
    let mut runner = Runner::new(config);
    match runner.run(&scenario, |event| println!("{}", event)) {
        Ok(()) => {
            println!("{}", "Scenario completed".bright_green());
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!("{}", "Scenario failed".bright_red());
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::FAILURE
        }
    }
}
