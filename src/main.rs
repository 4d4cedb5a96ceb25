mod compiler;
mod config;
mod display;
mod environment;
mod error;
mod executor;
mod history_store;
mod scaffold;
mod storage;
mod template_store;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::io::{self, Write};
use std::process;

use environment::Environment;
use executor::ProcessRunner;
use scaffold::Scaffold;
use storage::RunRecord;
use template_store::DEFAULT_TEMPLATE;

#[derive(Parser)]
#[command(name = "scaffold", version)]
#[command(about = "Edit reusable shell-command templates, run them, and keep a run history")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a template in your editor, then run the edited command (default)
    Run {
        /// Template to start from
        #[arg(long, short = 't', default_value = DEFAULT_TEMPLATE)]
        template: String,
        /// Do not echo the command's output while it runs (it is still recorded)
        #[arg(long, short = 'q')]
        quiet: bool,
    },
    /// Page through recent runs; the latest run is number 1
    #[command(alias = "hist")]
    History {
        /// Number of runs to show [default: history_lines from the config]
        #[arg(long = "lines", short = 'n')]
        lines: Option<usize>,
        /// Show every recorded run
        #[arg(long, conflicts_with = "lines")]
        all: bool,
    },
    /// Delete every recorded run
    ClearHistory {
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Re-edit and run a previous run, numbered as in `history`
    #[command(alias = "edit-previous-run")]
    Replay {
        index: usize,
        /// Do not echo the command's output while it runs (it is still recorded)
        #[arg(long, short = 'q')]
        quiet: bool,
    },
    /// List all templates you have defined
    #[command(alias = "ls")]
    Templates,
    /// Display the contents of a template
    Show {
        name: String,
    },
    /// Delete a template
    Delete {
        name: String,
    },
    /// Open the config file in your editor
    EditConfig,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .init();

    let cli = Cli::parse();
    match dispatch(cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            process::exit(1);
        }
    }
}

fn dispatch(cli: Cli) -> Result<i32> {
    let env = Environment::resolve().context("Could not prepare scaffold's storage")?;
    log::debug!("using data directory {}", env.share.display());

    let command = cli.command.unwrap_or(Commands::Run {
        template: DEFAULT_TEMPLATE.to_string(),
        quiet: false,
    });
    let runner = match &command {
        Commands::Run { quiet: true, .. } | Commands::Replay { quiet: true, .. } => ProcessRunner::quiet(),
        _ => ProcessRunner::default(),
    };
    let scaffold = Scaffold::with_runner(&env, runner);

    match command {
        Commands::Run { template, .. } => {
            let record = scaffold.run_scaffold(None, Some(&template))?;
            Ok(report(&record))
        }
        Commands::Replay { index, .. } => {
            let record = scaffold.replay(index)?;
            Ok(report(&record))
        }
        Commands::History { lines, all } => {
            let lines = if all { None } else { Some(lines.unwrap_or(env.config.history_lines)) };
            scaffold.show_history(lines)?;
            Ok(0)
        }
        Commands::ClearHistory { yes } => {
            let history = env.history_store();
            if history.is_empty()? {
                println!("{}", "History is already empty.".yellow());
                return Ok(0);
            }
            let count = history.len()?;
            println!("{}", format!("This will delete {} recorded runs.", count).red().bold());
            if !yes && !confirm()? {
                println!("{}", "Aborted, history kept.".yellow());
                return Ok(0);
            }
            scaffold.clear_history()?;
            println!("{}", "History cleared.".green());
            Ok(0)
        }
        Commands::Templates => {
            for name in scaffold.list_templates()? {
                println!("{}", name);
            }
            Ok(0)
        }
        Commands::Show { name } => {
            scaffold.show_template(&name)?;
            Ok(0)
        }
        Commands::Delete { name } => {
            scaffold
                .delete_template(&name)
                .with_context(|| format!("Could not delete template '{}'", name))?;
            Ok(0)
        }
        Commands::EditConfig => {
            scaffold.edit_config()?;
            Ok(0)
        }
    }
}

fn report(record: &RunRecord) -> i32 {
    let summary = format!("Command completed, exit code: {}", record.returncode);
    if record.success {
        println!("{}", summary.green().bold());
    } else {
        println!("{}", summary.red().bold());
    }
    println!(
        "{}: {}",
        "Execution time".yellow(),
        format!("{:.3}s", record.elapsed_time_seconds).green()
    );
    println!("{}", "Run saved to history".dimmed());
    if record.returncode < 0 {
        1
    } else {
        record.returncode
    }
}

fn confirm() -> Result<bool> {
    print!("{}", "Type 'yes' to confirm: ".yellow());
    io::stdout().flush().ok();
    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return Ok(false);
    }
    Ok(input.trim().eq_ignore_ascii_case("yes"))
}
