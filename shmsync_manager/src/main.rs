use clap::{Parser, Subcommand};
use colored::*;
use shmsync_manager::commands::{self, ExchangeArgs, JitterArgs, JitterRole, Preset};
use shmsync_manager::{logging, version};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shmsync")]
#[command(about = "Shared-memory exchange between a realtime writer and a polling reader")]
#[command(version)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run writer and reader in this process and print the tallies
    Run {
        #[command(flatten)]
        exchange: ExchangeArgs,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create the named region and run only the periodic writer
    Writer {
        #[command(flatten)]
        exchange: ExchangeArgs,
    },

    /// Attach to a writer's region and run only the polling reader
    Reader {
        #[command(flatten)]
        exchange: ExchangeArgs,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Measure the release jitter of a periodic thread
    ///
    /// Without a subcommand the recorder and the analysis run in this
    /// process; `record` and `read` split them across two processes.
    #[command(args_conflicts_with_subcommands = true)]
    Jitter {
        #[command(subcommand)]
        role: Option<JitterRole>,

        #[command(flatten)]
        jitter: JitterArgs,
    },

    /// Inspect or create exchange configuration files
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Show version and platform information
    Version,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print a preset as TOML
    Show {
        #[arg(short, long, value_enum, default_value_t = Preset::Reference)]
        preset: Preset,
    },

    /// Write a preset to a TOML file
    Init {
        /// Destination file
        #[arg(default_value = "shmsync.toml")]
        path: PathBuf,

        #[arg(short, long, value_enum, default_value_t = Preset::Reference)]
        preset: Preset,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    if let Err(e) = run_command(cli.command) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run { exchange, json } => commands::run::execute(&exchange, json),
        Commands::Writer { exchange } => commands::roles::run_writer(&exchange),
        Commands::Reader { exchange, json } => commands::roles::run_reader(&exchange, json),
        Commands::Jitter { role, jitter } => match role {
            None => commands::jitter::execute(&jitter),
            Some(JitterRole::Record { jitter }) => commands::jitter::record(&jitter),
            Some(JitterRole::Read { jitter }) => commands::jitter::read(&jitter),
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show { preset } => commands::config::show(preset),
            ConfigCommands::Init {
                path,
                preset,
                force,
            } => commands::config::init(&path, preset, force),
        },
        Commands::Version => {
            version::print_version_info();
            Ok(())
        }
    }
}
