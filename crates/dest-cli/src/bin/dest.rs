//! DEST CLI: configure drive error injection rules

use clap::{Args, Parser, Subcommand};
use dest_cli::config::{load_service, load_topology};
use dest_cli::{dispatch, CommandError, Console, DestConfig, Session};
use dest_core::sim::{SimError, SimulatedService};
use snafu::Snafu;
use std::io::{self, Write};
use std::path::PathBuf;

/// CLI errors for the dest binary.
#[derive(Debug, Snafu)]
enum CliError {
    #[snafu(display("Simulator state error: {source}"), context(false))]
    Sim { source: SimError },
    #[snafu(display("{source}"), context(false))]
    Command { source: CommandError },
    #[snafu(display("I/O error: {source}"), context(false))]
    Io { source: std::io::Error },
    #[snafu(display("JSON error: {source}"), context(false))]
    Json { source: serde_json::Error },
    #[snafu(display("{message}"))]
    Other { message: String },
}

#[derive(Parser)]
#[command(name = "dest")]
#[command(about = "Drive Error Simulation Tool: configure error injection rules")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalOpts {
    /// Platform root holding dest_config/
    #[arg(long, env = "DEST_ROOT", default_value = ".", global = true)]
    root: PathBuf,

    /// JSON description of the simulated drives
    #[arg(long, global = true)]
    topology: Option<PathBuf>,

    /// JSON file persisting the simulated service between runs
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Seed for randomized reactivation budgets
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Read DEST commands from stdin until exit
    Shell,

    /// Run one DEST command, e.g. `dest exec add -d 0_0_5 -serr FBE_SCSI_CC_HARD_BAD_BLOCK`
    Exec {
        /// Command and its arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// List the simulated drives
    Drives {
        /// Print the topology as JSON
        #[arg(short, long)]
        json: bool,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Shell => cmd_shell(&cli.global),
        Commands::Exec { args } => cmd_exec(&cli.global, &args),
        Commands::Drives { json } => cmd_drives(&cli.global, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn config_for(opts: &GlobalOpts) -> DestConfig {
    DestConfig {
        seed: opts.seed,
        ..DestConfig::with_root(&opts.root)
    }
}

fn store_state(opts: &GlobalOpts, service: &SimulatedService) -> Result<(), CliError> {
    if let Some(path) = &opts.state {
        service.save_state(path)?;
        log::debug!("saved {} record(s) to {}", service.len(), path.display());
    }
    Ok(())
}

fn cmd_exec(opts: &GlobalOpts, args: &[String]) -> Result<(), CliError> {
    let config = config_for(opts);
    let topology = load_topology(opts.topology.as_deref())?;
    let mut service = load_service(opts.state.as_deref(), config.seed)?;

    let words: Vec<&str> = args.iter().map(String::as_str).collect();
    let outcome = {
        let console = Console::new(io::stdin().lock(), io::stdout().lock());
        let mut session = Session::new(&mut service, &topology, &config, console);
        dispatch(&mut session, &words)
    };
    store_state(opts, &service)?;

    match outcome {
        Ok(()) | Err(CommandError::Cancelled) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn cmd_shell(opts: &GlobalOpts) -> Result<(), CliError> {
    let config = config_for(opts);
    let topology = load_topology(opts.topology.as_deref())?;
    let mut service = load_service(opts.state.as_deref(), config.seed)?;

    let outcome = {
        let console = Console::new(io::stdin().lock(), io::stdout().lock());
        let mut session = Session::new(&mut service, &topology, &config, console);
        run_shell(&mut session)
    };
    store_state(opts, &service)?;
    outcome
}

fn run_shell(session: &mut Session<'_>) -> Result<(), CliError> {
    loop {
        write!(session.console, "dest> ")?;
        session.console.flush()?;
        let Some(line) = session.console.read_line()? else {
            return Ok(());
        };
        match line.as_str() {
            "" => continue,
            "exit" | "quit" => return Ok(()),
            _ => {}
        }
        if let Err(e) = session.run_line(&line) {
            if !e.is_reported() {
                return Err(e.into());
            }
            log::debug!("{}: {}", line, e);
        }
    }
}

fn cmd_drives(opts: &GlobalOpts, json: bool) -> Result<(), CliError> {
    let topology = load_topology(opts.topology.as_deref())?;
    if topology.drives.is_empty() {
        return Err(OtherSnafu {
            message: "topology has no drives".to_string(),
        }
        .build());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&topology)?);
        return Ok(());
    }

    println!("{:<10} {:<10} {}", "Drive", "Object id", "User space");
    for drive in &topology.drives {
        println!(
            "{:<10} {:<10} [{:#X} .. {:#X}]",
            drive.fru.to_string(),
            drive.object_id.to_string(),
            drive.layout.start_of_user_space,
            drive.layout.end_of_user_space
        );
    }
    Ok(())
}
