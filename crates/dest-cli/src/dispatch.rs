//! Command table and dispatch.
//!
//! ```text
//!   "add -d 0_0_5 ..."  ──► find_command("add") ──► help flag? ──► print usage
//!                                                      │ no
//!                                                      ▼
//!                                          service initialized? ──► remediation message
//!                                                      │ yes
//!                                                      ▼
//!                                               handler(session, args)
//! ```

use std::io::{self, Write};
use thiserror::Error;

use dest_core::persist::{LoadError, SaveError};
use dest_core::rule::Fru;
use dest_core::scenario::ScenarioError;
use dest_core::service::{InjectionService, ServiceError, ServiceState, Topology, TopologyError};
use dest_core::validate::ValidationError;

use crate::batch::BatchError;
use crate::commands;
use crate::config::DestConfig;
use crate::prompt::{Console, PromptError};

pub const SERVICE_DOWN: &str =
    "Please issue 'net start newneitpackage' to start DEST Service on SP.";

pub const HELP_FLAGS: [&str; 4] = ["-h", "-help", "h", "help"];

pub const DEST_USAGE: &str = "\
DEST commands - add, add_spinup, add_scenario, fail, glitch, start, stop, search, delete,
                display, state, load, save, clean, list_scenarios, list_port_errors,
                list_scsi_errors, list_opcodes

dest add [add_args]     (no args will use interactive mode)
  add_args:
    -d b_e_s[,b_e_s...]          drives (required)
    -lr start end                LBA range
    -oc opcode                   opcode name, value or shortcut (see list_opcodes)
    -et none|scsi|port           error type
    -serr name                   named scsi error (see list_scsi_errors)
    -sk 0xSSAAQQ                 sense key / ASC / ASCQ
    -ilba                        sense data does not report a valid LBA
    -def                         deferred error
    -perr name|value             port error (see list_port_errors)
    -delay msec                  delay each matching IO
    -num n                       times to insert
    -freq n | -rfreq n           fixed or random frequency
    -react_gap time|io_count n   reactivation gap
    -react_rgap time|io_count n  random reactivation gap, n is the max
    -n_react n | -n_rreact n     fixed or random number of reactivations";

/// Failures surfaced by command handlers.
///
/// Handlers print the operator message before returning; see
/// [`CommandError::is_reported`].
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("usage error: {0}")]
    Usage(#[from] BatchError),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("LBA range does not resolve on drive {0}")]
    WrongLba(Fru),

    #[error("cancelled by operator")]
    Cancelled,

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Save(#[from] SaveError),

    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("DEST service is not initialized")]
    ServiceNotInitialized,

    #[error("console input closed")]
    InputClosed,

    #[error("console IO error: {0}")]
    Console(#[from] io::Error),
}

impl From<PromptError> for CommandError {
    fn from(e: PromptError) -> Self {
        match e {
            PromptError::Cancelled => CommandError::Cancelled,
            PromptError::Eof => CommandError::InputClosed,
            PromptError::Io(e) => CommandError::Console(e),
        }
    }
}

impl CommandError {
    /// True when the operator has already been told about the failure.
    pub fn is_reported(&self) -> bool {
        !matches!(self, CommandError::Console(_) | CommandError::InputClosed)
    }
}

/// Everything a handler works with.
pub struct Session<'a> {
    pub service: &'a mut dyn InjectionService,
    pub topology: &'a dyn Topology,
    pub config: &'a DestConfig,
    pub console: Console<'a>,
}

impl<'a> Session<'a> {
    pub fn new(
        service: &'a mut dyn InjectionService,
        topology: &'a dyn Topology,
        config: &'a DestConfig,
        console: Console<'a>,
    ) -> Self {
        Self {
            service,
            topology,
            config,
            console,
        }
    }

    /// Split a command line on whitespace and dispatch it.
    pub fn run_line(&mut self, line: &str) -> Result<(), CommandError> {
        let args: Vec<&str> = line.split_whitespace().collect();
        dispatch(self, &args)
    }
}

pub type Handler = fn(&mut Session<'_>, &[&str]) -> Result<(), CommandError>;

/// One verb.
pub struct Command {
    pub name: &'static str,
    pub usage: &'static str,
    pub handler: Handler,
}

pub static COMMANDS: &[Command] = &[
    Command {
        name: "init",
        usage: commands::INIT_NOTICE,
        handler: commands::init,
    },
    Command {
        name: "start",
        usage: "dest start - Start error insertion",
        handler: commands::start,
    },
    Command {
        name: "stop",
        usage: "dest stop - Stop error insertion",
        handler: commands::stop,
    },
    Command {
        name: "add",
        usage: "dest add [add_args]: Add record.  No args will use interactive mode",
        handler: commands::add,
    },
    Command {
        name: "add_spinup",
        usage: "dest add_spinup [add_args]: Add errors during spinup/spindown.  \
                No args will use interactive mode",
        handler: commands::add_spinup,
    },
    Command {
        name: "search",
        usage: "dest search - Search in interactive mode",
        handler: commands::search,
    },
    Command {
        name: "delete",
        usage: "dest delete [record_id] - Delete a record.  No args will prompt for the record id",
        handler: commands::delete,
    },
    Command {
        name: "display",
        usage: "dest display - Display all error records",
        handler: commands::display,
    },
    Command {
        name: "fail",
        usage: "dest fail -d b_e_s[,b_e_s...] [add_args] - Fails a drive",
        handler: commands::fail,
    },
    Command {
        name: "glitch",
        usage: "dest glitch -d b_e_s[,b_e_s...] [-time secs] [add_args] - \
                Glitches a drive for a specified time",
        handler: commands::glitch,
    },
    Command {
        name: "load",
        usage: "dest load [file] - Load the configuration file",
        handler: commands::load,
    },
    Command {
        name: "save",
        usage: "dest save [file] - Save the configuration file",
        handler: commands::save,
    },
    Command {
        name: "clean",
        usage: "dest clean - Deletes all error records",
        handler: commands::clean,
    },
    Command {
        name: "add_scenario",
        usage: "dest add_scenario [scen_name] -d b_e_s[,b_e_s...] - \
                Add a built-in scenario.  No args will use interactive mode",
        handler: commands::add_scenario,
    },
    Command {
        name: "list_scenarios",
        usage: "dest list_scenarios - List built-in scenarios",
        handler: commands::list_scenarios,
    },
    Command {
        name: "list_port_errors",
        usage: "dest list_port_errors - List port errors that can be injected",
        handler: commands::list_port_errors,
    },
    Command {
        name: "list_scsi_errors",
        usage: "dest list_scsi_errors - List scsi errors that can be injected",
        handler: commands::list_scsi_errors,
    },
    Command {
        name: "list_opcodes",
        usage: "dest list_opcodes - List opcodes that can be injected",
        handler: commands::list_opcodes,
    },
    Command {
        name: "state",
        usage: "dest state - Displays state of DEST Service",
        handler: commands::state,
    },
];

/// Look a verb up; a leading `-` is accepted.
pub fn find_command(name: &str) -> Option<&'static Command> {
    let name = name.strip_prefix('-').unwrap_or(name);
    COMMANDS.iter().find(|c| c.name == name)
}

/// Run one command line, already split into words.
pub fn dispatch(session: &mut Session<'_>, args: &[&str]) -> Result<(), CommandError> {
    let Some((&verb, rest)) = args.split_first() else {
        writeln!(session.console, "{}", DEST_USAGE)?;
        return Err(CommandError::InvalidArgs("no command given".to_string()));
    };

    let Some(command) = find_command(verb) else {
        writeln!(session.console, "{}", DEST_USAGE)?;
        return Err(CommandError::UnknownCommand(verb.to_string()));
    };

    if rest.first().is_some_and(|arg| HELP_FLAGS.contains(arg)) {
        writeln!(session.console, "{}", command.usage)?;
        return Ok(());
    }

    match session.service.state() {
        Ok(ServiceState::NotInitialized) | Err(_) => {
            writeln!(session.console, "{}", SERVICE_DOWN)?;
            return Err(CommandError::ServiceNotInitialized);
        }
        Ok(_) => {}
    }

    log::debug!("dispatching {} {:?}", command.name, rest);
    (command.handler)(session, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dest_core::sim::{SimulatedService, SimulatedTopology};
    use std::io::Cursor;

    fn run(service: &mut SimulatedService, line: &str) -> (Result<(), CommandError>, String) {
        let topo = SimulatedTopology::default();
        let config = DestConfig::default();
        let mut out = Vec::new();
        let result = {
            let console = Console::new(Cursor::new(""), &mut out);
            let mut session = Session::new(service, &topo, &config, console);
            session.run_line(line)
        };
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn every_command_is_findable_with_or_without_dash() {
        for command in COMMANDS {
            assert_eq!(find_command(command.name).map(|c| c.name), Some(command.name));
            let dashed = format!("-{}", command.name);
            assert_eq!(find_command(&dashed).map(|c| c.name), Some(command.name));
        }
        assert!(find_command("explode").is_none());
    }

    #[test]
    fn unknown_command_prints_general_usage() {
        let mut svc = SimulatedService::new(1);
        let (result, out) = run(&mut svc, "explode now");
        assert!(matches!(result, Err(CommandError::UnknownCommand(ref c)) if c == "explode"));
        assert!(out.contains("DEST commands"));
    }

    #[test]
    fn empty_line_prints_usage() {
        let mut svc = SimulatedService::new(1);
        let (result, out) = run(&mut svc, "   ");
        assert!(matches!(result, Err(CommandError::InvalidArgs(_))));
        assert!(out.contains("dest add [add_args]"));
    }

    #[test]
    fn help_flag_prints_command_usage_only() {
        for flag in HELP_FLAGS {
            let mut svc = SimulatedService::new(1);
            let (result, out) = run(&mut svc, &format!("add {flag}"));
            assert!(result.is_ok());
            assert_eq!(
                out,
                "dest add [add_args]: Add record.  No args will use interactive mode\n"
            );
            assert!(svc.is_empty());
        }
    }

    #[test]
    fn help_works_even_when_service_is_down() {
        let mut svc = SimulatedService::uninitialized();
        let (result, out) = run(&mut svc, "-clean help");
        assert!(result.is_ok());
        assert!(out.contains("Deletes all error records"));
    }

    #[test]
    fn uninitialized_service_short_circuits() {
        let mut svc = SimulatedService::uninitialized();
        let (result, out) = run(&mut svc, "add -d 0_0_5 -sk 0x031100");
        assert!(matches!(result, Err(CommandError::ServiceNotInitialized)));
        assert_eq!(out, format!("{}\n", SERVICE_DOWN));
    }

    #[test]
    fn reported_errors() {
        assert!(CommandError::Cancelled.is_reported());
        assert!(CommandError::ServiceNotInitialized.is_reported());
        assert!(!CommandError::InputClosed.is_reported());
        let io = io::Error::new(io::ErrorKind::BrokenPipe, "gone");
        assert!(!CommandError::Console(io).is_reported());
    }
}
