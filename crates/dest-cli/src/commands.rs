//! Command handlers.
//!
//! Each handler prints the operator-facing `DEST:` messages itself and
//! returns the underlying error so callers can pick an exit status.

use std::io::Write;

use dest_core::persist::{load_from_path, save_to_path};
use dest_core::rule::{ErrorRule, ErrorType, RuleDraft, SearchParams, Target};
use dest_core::scenario::{Scenario, ScenarioError};
use dest_core::service::{InjectionService, RecordHandle, ServiceError};
use dest_core::number::parse_u32;
use dest_core::validate::{LbaAssignment, RuleValidator};

use crate::batch::{parse_rule_args, split_drives, BatchError};
use crate::dispatch::{find_command, CommandError, Session, DEST_USAGE};
use crate::display::{
    write_opcodes, write_port_errors, write_record, write_scenarios, write_scsi_errors,
};
use crate::interactive;

pub const INIT_NOTICE: &str =
    "dest -init is no longer supported. Use -load to load xml config file";

const VALIDATION_FAILED: &str = "DEST: ADD failed.  There is a problem validating the record.";
const SPINUP_NOTE: &str =
    "DEST: Need to check the pdo's state to figure out if the insertion occured \
     at spinup or spindown.";

// ── Shared helpers ──────────────────────────────────────────────

fn report_batch_error(session: &mut Session<'_>, error: &BatchError) -> Result<(), CommandError> {
    let out = &mut session.console;
    match error {
        BatchError::MissingValue { flag } => {
            writeln!(out, "DEST: Missing option for argument {}", flag)?;
            writeln!(out, "{}", DEST_USAGE)?;
        }
        BatchError::InvalidArgument { value, .. } => {
            writeln!(out, "DEST: Invalid argument: {}", value)?
        }
        BatchError::UnknownFlag(flag) => {
            writeln!(out, "DEST: Invalid argument: {}", flag)?;
            writeln!(out, "{}", DEST_USAGE)?;
        }
        BatchError::Conflict { first, second } => {
            writeln!(out, "DEST: {} cannot be used together with {}", first, second)?
        }
        BatchError::MissingDrive => writeln!(out, "DEST: Error: Required drive argument not set")?,
        BatchError::TooManyDrives => writeln!(out, "DEST: Error: Too many drives given")?,
    }
    Ok(())
}

/// Resolve typed drive locations; the first failure aborts.
fn resolve_drives(
    session: &mut Session<'_>,
    drives: &[String],
) -> Result<Vec<Target>, CommandError> {
    let mut targets = Vec::with_capacity(drives.len());
    for text in drives {
        match session.topology.resolve_target(text) {
            Ok(target) => targets.push(target),
            Err(e) => {
                writeln!(
                    session.console,
                    "DEST: Error occured while finding the Object ID for drive {}.",
                    text
                )?;
                return Err(e.into());
            }
        }
    }
    Ok(targets)
}

/// Re-read a record from the service, which owns its id and counters.
fn find_record(
    service: &dyn InjectionService,
    handle: RecordHandle,
) -> Result<Option<ErrorRule>, ServiceError> {
    let mut cursor = None;
    while let Some((h, rule)) = service.next_record(cursor)? {
        if h == handle {
            return Ok(Some(rule));
        }
        cursor = Some(h);
    }
    Ok(None)
}

/// Validate `draft` once, then add it to every target.
///
/// A target whose LBA window does not resolve, or whose record the service
/// refuses, stops the loop; records already added stay.
fn add_rules(
    session: &mut Session<'_>,
    draft: &RuleDraft,
    targets: &[Target],
) -> Result<usize, CommandError> {
    let validator = RuleValidator::new(session.topology);
    let template = match validator.normalize(draft) {
        Ok(rule) => rule,
        Err(e) => {
            log::warn!("rule refused: {}", e);
            writeln!(session.console, "{}", VALIDATION_FAILED)?;
            return Err(e.into());
        }
    };

    let mut added = 0;
    for target in targets {
        let mut rule = template.retarget(*target);
        match validator.assign_lba_range(&mut rule) {
            Ok(LbaAssignment::Resolved) => {}
            Ok(LbaAssignment::WholeRange) => {
                writeln!(session.console, "DEST: ADD failed. Wrong LBA.")?;
                return Err(CommandError::WrongLba(target.fru));
            }
            Err(e) => {
                writeln!(session.console, "{}", VALIDATION_FAILED)?;
                return Err(e.into());
            }
        }

        match session.service.add_record(&rule) {
            Ok(handle) => {
                added += 1;
                log::info!("added rule on {}", target);
                writeln!(session.console, "DEST: DEST ADD issued.")?;
                if let Some(stored) = find_record(&*session.service, handle)? {
                    write_record(&mut session.console, &stored)?;
                }
            }
            Err(e) => {
                writeln!(
                    session.console,
                    "DEST: ADD failed. There is a problem creating the record."
                )?;
                return Err(e.into());
            }
        }
    }
    Ok(added)
}

fn batch_add(
    session: &mut Session<'_>,
    args: &[&str],
    base: RuleDraft,
) -> Result<usize, CommandError> {
    let request = match parse_rule_args(args, base) {
        Ok(request) => request,
        Err(e) => {
            report_batch_error(session, &e)?;
            return Err(e.into());
        }
    };
    let targets = resolve_drives(session, &request.drives)?;
    let draft = RuleDraft {
        target: targets.first().copied(),
        ..request.draft
    };
    add_rules(session, &draft, &targets)
}

fn usage_of(name: &str) -> &'static str {
    find_command(name).map_or("", |c| c.usage)
}

// ── Lifecycle ───────────────────────────────────────────────────

pub fn init(session: &mut Session<'_>, _args: &[&str]) -> Result<(), CommandError> {
    writeln!(session.console, "{}", INIT_NOTICE)?;
    Ok(())
}

pub fn start(session: &mut Session<'_>, _args: &[&str]) -> Result<(), CommandError> {
    match session.service.start() {
        Ok(()) => {
            writeln!(session.console, "DEST: Error Insertion Started.")?;
            Ok(())
        }
        Err(e) => {
            writeln!(session.console, "DEST: Failed to start error insertion. {}", e)?;
            Err(e.into())
        }
    }
}

pub fn stop(session: &mut Session<'_>, _args: &[&str]) -> Result<(), CommandError> {
    match session.service.stop() {
        Ok(()) => {
            writeln!(session.console, "DEST: Error Insertion Stopped.")?;
            Ok(())
        }
        Err(e) => {
            writeln!(session.console, "DEST: Failed to stop error insertion. {}", e)?;
            Err(e.into())
        }
    }
}

pub fn state(session: &mut Session<'_>, _args: &[&str]) -> Result<(), CommandError> {
    let state = session.service.state()?;
    writeln!(session.console, "DEST State: {}.", state)?;
    Ok(())
}

// ── Adding rules ────────────────────────────────────────────────

pub fn add(session: &mut Session<'_>, args: &[&str]) -> Result<(), CommandError> {
    if args.is_empty() {
        let built = interactive::build_rule(&mut session.console, session.topology)?;
        add_rules(session, &built.draft, &built.targets)?;
    } else {
        batch_add(session, args, RuleDraft::default())?;
    }
    Ok(())
}

pub fn add_spinup(session: &mut Session<'_>, args: &[&str]) -> Result<(), CommandError> {
    let added = if args.is_empty() {
        let built = interactive::build_spinup_rule(&mut session.console, session.topology)?;
        add_rules(session, &built.draft, &built.targets)?
    } else {
        batch_add(session, args, RuleDraft::spinup())?
    };
    if added > 0 {
        writeln!(session.console, "{}", SPINUP_NOTE)?;
    }
    Ok(())
}

pub fn fail(session: &mut Session<'_>, args: &[&str]) -> Result<(), CommandError> {
    let base = RuleDraft {
        error_type: ErrorType::Fail,
        ..RuleDraft::default()
    };
    batch_add(session, args, base)?;
    Ok(())
}

pub fn glitch(session: &mut Session<'_>, args: &[&str]) -> Result<(), CommandError> {
    let base = RuleDraft {
        error_type: ErrorType::Glitch,
        ..RuleDraft::default()
    };
    batch_add(session, args, base)?;
    Ok(())
}

pub fn add_scenario(session: &mut Session<'_>, args: &[&str]) -> Result<(), CommandError> {
    let (scenario, targets) = match args {
        [] => {
            let scenario = interactive::ask_scenario(&mut session.console)?;
            let targets = interactive::ask_drives(&mut session.console, session.topology)?;
            (scenario, targets)
        }
        [name, "-d", drives] => {
            let Some(scenario) = Scenario::from_name(name) else {
                writeln!(session.console, "DEST: Invalid Error Scenario: {}", name)?;
                return Err(ScenarioError::Unknown(name.to_string()).into());
            };
            let drives = match split_drives(drives) {
                Ok(drives) => drives,
                Err(e) => {
                    report_batch_error(session, &e)?;
                    return Err(e.into());
                }
            };
            (scenario, resolve_drives(session, &drives)?)
        }
        _ => {
            writeln!(session.console, "DEST: Error: Invalid args to -add_scenario")?;
            writeln!(session.console, "{}", usage_of("add_scenario"))?;
            return Err(CommandError::InvalidArgs(args.join(" ")));
        }
    };

    let report = match scenario.apply(&targets, &mut *session.service, session.topology) {
        Ok(report) => report,
        Err(e) => {
            writeln!(session.console, "DEST: Scenario {} aborted: {}", scenario, e)?;
            return Err(e.into());
        }
    };
    for (target, _) in &report.added {
        writeln!(session.console, "DEST: Scenario {} added to drive {}.", scenario, target.fru)?;
    }
    for (target, e) in &report.failed {
        writeln!(
            session.console,
            "DEST: Scenario {} failed on drive {}: {}",
            scenario, target.fru, e
        )?;
    }
    Ok(())
}

// ── Queries and removal ─────────────────────────────────────────

fn print_matches(session: &mut Session<'_>, params: &SearchParams) -> Result<usize, CommandError> {
    let mut count = 0;
    let mut cursor = None;
    while let Some((handle, rule)) = session.service.search_record(params, cursor)? {
        write_record(&mut session.console, &rule)?;
        cursor = Some(handle);
        count += 1;
    }
    Ok(count)
}

pub fn search(session: &mut Session<'_>, _args: &[&str]) -> Result<(), CommandError> {
    let mut params = interactive::build_search(&mut session.console, session.topology)?;
    let validator = RuleValidator::new(session.topology);
    match validator.assign_search_range(&mut params) {
        Ok(LbaAssignment::Resolved) => {}
        Ok(LbaAssignment::WholeRange) => {
            writeln!(
                session.console,
                "DEST: Start and Stop LBA range ({:#x} - {:#x}) invalid.",
                params.lba_start, params.lba_end
            )?;
            return Err(CommandError::InvalidArgs("LBA range".to_string()));
        }
        Err(e) => {
            writeln!(session.console, "DEST: Enter valid parameters")?;
            return Err(e.into());
        }
    }
    if print_matches(session, &params)? == 0 {
        writeln!(session.console, "DEST: No records to display")?;
    }
    Ok(())
}

pub fn delete(session: &mut Session<'_>, args: &[&str]) -> Result<(), CommandError> {
    let record_id = match args.first() {
        Some(text) => match parse_u32(text) {
            Some(id) => id,
            None => {
                writeln!(session.console, "DEST: Invalid argument: {}", text)?;
                return Err(CommandError::InvalidArgs(text.to_string()));
            }
        },
        None => session.console.ask_until(
            "Enter the record id to delete:",
            None,
            "That is an invalid entry. Please try again",
            parse_u32,
        )?,
    };

    let handle = match session.service.record_handle(record_id) {
        Ok(handle) => handle,
        Err(e) => {
            writeln!(session.console, "DEST: Unable to get handle of an error record.")?;
            return Err(e.into());
        }
    };
    match session.service.remove_record(handle) {
        Ok(()) => {
            log::info!("deleted record {}", record_id);
            writeln!(session.console, "DEST: Successfully deleted one error record.")?;
            Ok(())
        }
        Err(e) => {
            writeln!(session.console, "DEST: Failed to delete the error record.")?;
            Err(e.into())
        }
    }
}

pub fn display(session: &mut Session<'_>, _args: &[&str]) -> Result<(), CommandError> {
    let mut count = 0;
    let mut cursor = None;
    while let Some((handle, rule)) = session.service.next_record(cursor)? {
        write_record(&mut session.console, &rule)?;
        cursor = Some(handle);
        count += 1;
    }
    if count == 0 {
        writeln!(session.console, "DEST: No records to display")?;
    }
    Ok(())
}

pub fn clean(session: &mut Session<'_>, _args: &[&str]) -> Result<(), CommandError> {
    match session.service.remove_all_records() {
        Ok(()) => {
            writeln!(session.console, "DEST: Deleted all records in the record queue.")?;
            Ok(())
        }
        Err(e) => {
            writeln!(session.console, "DEST: Failed to clean the error record queue.")?;
            Err(e.into())
        }
    }
}

// ── Persistence ─────────────────────────────────────────────────

pub fn load(session: &mut Session<'_>, args: &[&str]) -> Result<(), CommandError> {
    let path = session.config.config_path(args.first().copied());
    match load_from_path(&path, &mut *session.service, session.topology) {
        Ok(report) => {
            writeln!(
                session.console,
                "DEST: Loaded {} record(s) from {}.",
                report.loaded,
                path.display()
            )?;
            if report.skipped > 0 {
                writeln!(
                    session.console,
                    "DEST: Skipped {} record(s) that could not be added.",
                    report.skipped
                )?;
            }
            Ok(())
        }
        Err(e) => {
            writeln!(session.console, "\nDEST: Error loading the Config File: {}", e)?;
            Err(e.into())
        }
    }
}

pub fn save(session: &mut Session<'_>, args: &[&str]) -> Result<(), CommandError> {
    if args.is_empty()
        && !session
            .console
            .confirm("DEST: This would overwrite the existing File.\nDo you wish to continue?")?
    {
        return Ok(());
    }
    let path = session.config.config_path(args.first().copied());
    match save_to_path(&*session.service, &path) {
        Ok(count) => {
            writeln!(
                session.console,
                "DEST: Saved {} record(s) to {}.",
                count,
                path.display()
            )?;
            Ok(())
        }
        Err(e) => {
            log::warn!("{}", e);
            writeln!(session.console, "DEST: Could not write to the file.")?;
            Err(e.into())
        }
    }
}

// ── Listings ────────────────────────────────────────────────────

pub fn list_scenarios(session: &mut Session<'_>, _args: &[&str]) -> Result<(), CommandError> {
    write_scenarios(&mut session.console)?;
    Ok(())
}

pub fn list_port_errors(session: &mut Session<'_>, _args: &[&str]) -> Result<(), CommandError> {
    write_port_errors(&mut session.console)?;
    Ok(())
}

pub fn list_scsi_errors(session: &mut Session<'_>, _args: &[&str]) -> Result<(), CommandError> {
    write_scsi_errors(&mut session.console)?;
    Ok(())
}

pub fn list_opcodes(session: &mut Session<'_>, _args: &[&str]) -> Result<(), CommandError> {
    write_opcodes(&mut session.console)?;
    Ok(())
}
