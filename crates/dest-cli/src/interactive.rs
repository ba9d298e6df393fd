//! Interactive rule building.
//!
//! The prompt order follows the batch flags: drives, LBA window, opcode,
//! error, insertion policy, reactivation policy.  Each step loops until the
//! answer is usable; `quit` at any step unwinds with
//! [`PromptError::Cancelled`].

use std::io::Write;

use dest_core::lookup::{
    port_error_lookup, resolve_opcodes, scsi_error_lookup, DEFAULT_PORT_ERROR,
};
use dest_core::number::{parse_hex_prefixed, parse_u32};
use dest_core::rule::{
    ErrorType, GapType, InsertLimit, Lba, RuleDraft, SearchParams, Target, ANY_OPCODE,
    MAX_DISK_LBA, MAX_FRUS_PER_RECORD, SCSI_STATUS_CHECK_CONDITION,
};
use dest_core::scenario::Scenario;
use dest_core::service::Topology;

use crate::display::{write_port_errors, write_scenarios, write_scsi_errors};
use crate::prompt::{Console, PromptError};

const INVALID_ENTRY: &str = "That is an invalid entry. Please try again";

/// A rule template and the drives it should be added to.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractiveRule {
    pub draft: RuleDraft,
    pub targets: Vec<Target>,
}

fn number_or(default: u32) -> impl FnMut(&str) -> Option<u32> {
    move |s| {
        if s.is_empty() {
            Some(default)
        } else {
            parse_u32(s)
        }
    }
}

// ── Drives ──────────────────────────────────────────────────────

fn resolve_all(topology: &dyn Topology, answer: &str) -> Option<Vec<Target>> {
    let mut targets = Vec::new();
    for text in answer.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match topology.resolve_target(text) {
            Ok(target) => targets.push(target),
            Err(e) => {
                log::debug!("drive '{}' refused: {}", text, e);
                return None;
            }
        }
    }
    if targets.is_empty() || targets.len() > MAX_FRUS_PER_RECORD {
        return None;
    }
    Some(targets)
}

/// Ask for one or more comma-separated drives.
pub fn ask_drives(
    console: &mut Console<'_>,
    topology: &dyn Topology,
) -> Result<Vec<Target>, PromptError> {
    console.ask_until(
        "Enter Drive Number.  Multiple drives can be added: (b_e_s[,b_e_s...])",
        None,
        INVALID_ENTRY,
        |answer| resolve_all(topology, answer),
    )
}

fn ask_one_drive(
    console: &mut Console<'_>,
    topology: &dyn Topology,
) -> Result<Target, PromptError> {
    console.ask_until("Enter Drive Number (b_e_s):", None, INVALID_ENTRY, |answer| {
        topology.resolve_target(answer).ok()
    })
}

// ── LBA window ──────────────────────────────────────────────────

fn ask_lba(console: &mut Console<'_>, prompt: &str) -> Result<Lba, PromptError> {
    console.ask_until(
        prompt,
        Some(0),
        "Invalid LBA value detected. Please provide correct LBA value in hex format. ",
        |answer| parse_hex_prefixed(answer).filter(|lba| *lba <= MAX_DISK_LBA),
    )
}

/// Ask for the LBA window.  `0x0` or an empty answer for either bound
/// means "default".
pub fn ask_lba_range(console: &mut Console<'_>) -> Result<(Lba, Lba), PromptError> {
    let start = ask_lba(
        console,
        "Start LBA (Use 0x prefix for Hex) [Enter 0x0 or 0X0 for Default]: ",
    )?;
    let end = ask_lba(
        console,
        "LBA End. (Use 0x prefix for Hex) [Enter 0x0 or 0X0 for Default]: ",
    )?;
    Ok((start, end))
}

// ── Opcode ──────────────────────────────────────────────────────

pub fn ask_opcode(console: &mut Console<'_>) -> Result<String, PromptError> {
    console.ask_until(
        "OPCODE: Enter SCSI OPCODE string or shortcut such as read, write [ANY]",
        Some(ANY_OPCODE.to_string()),
        "Invalid Entry\nEnter Opcode [ANY]",
        |answer| {
            resolve_opcodes(answer)
                .ok()
                .map(|_| answer.to_ascii_uppercase())
        },
    )
}

// ── Error ───────────────────────────────────────────────────────

fn parse_sense(answer: &str) -> Result<(u32, Option<bool>), &'static str> {
    let hex = answer
        .strip_prefix("0x")
        .or_else(|| answer.strip_prefix("0X"));
    match hex {
        Some(digits) => u32::from_str_radix(digits, 16)
            .ok()
            .filter(|v| *v <= 0xFF_FFFF)
            .map(|v| (v, None))
            .ok_or("DEST: Invalid hex value. Please try again."),
        None => scsi_error_lookup(answer)
            .map(|e| (e.code, Some(e.valid_lba)))
            .map_err(|_| "DEST: Invalid hex value or scsi error name. Please try again."),
    }
}

/// Ask for a sense code (hex triple) or a named SCSI error.
pub fn ask_scsi_error(console: &mut Console<'_>, draft: &mut RuleDraft) -> Result<(), PromptError> {
    writeln!(console, "Enter Sense Key to inject or Scsi Error Name.")?;
    write_scsi_errors(console)?;
    writeln!(console, "Example Sense Key Value:   0x031100")?;
    loop {
        let answer = console.ask("Sense Key / Error Name:")?;
        match parse_sense(&answer) {
            Ok((packed, valid_lba)) => {
                let valid_lba = valid_lba.unwrap_or(draft.valid_lba);
                draft.set_scsi_error(packed, valid_lba);
                draft.scsi_status = SCSI_STATUS_CHECK_CONDITION;
                return Ok(());
            }
            Err(message) => writeln!(console, "{}", message)?,
        }
    }
}

/// Ask for a port error by name or number.  Empty input picks the default.
pub fn ask_port_error(console: &mut Console<'_>, draft: &mut RuleDraft) -> Result<(), PromptError> {
    writeln!(
        console,
        "Please enter a port error (string or numerical value). Possible values are:"
    )?;
    write_port_errors(console)?;
    let status = console.ask_until(
        &format!("Port error [{}]:", DEFAULT_PORT_ERROR),
        port_error_lookup(DEFAULT_PORT_ERROR).ok(),
        "DEST: Error is not recognized. Record not created in DEST package.",
        |answer| port_error_lookup(answer).ok(),
    )?;
    draft.port_status = Some(status);
    Ok(())
}

/// Error type, its payload and the I/O delay.
pub fn ask_error(console: &mut Console<'_>, draft: &mut RuleDraft) -> Result<(), PromptError> {
    let error_type = console.ask_until(
        "Enter error type.[2]\n   1: delay only\n   2: scsi\n   3: port",
        Some(ErrorType::Scsi),
        INVALID_ENTRY,
        |answer| match answer {
            "1" => Some(ErrorType::None),
            "2" => Some(ErrorType::Scsi),
            "3" => Some(ErrorType::Port),
            _ => None,
        },
    )?;
    draft.error_type = error_type;
    match error_type {
        ErrorType::Scsi => ask_scsi_error(console, draft)?,
        ErrorType::Port => ask_port_error(console, draft)?,
        _ => {}
    }
    let delay = console.ask_until("Enter delay in msec [0]", None, INVALID_ENTRY, number_or(0))?;
    draft.delay_io_msec = Some(delay);
    Ok(())
}

// ── Insertion and reactivation ──────────────────────────────────

pub fn ask_insertion(console: &mut Console<'_>, draft: &mut RuleDraft) -> Result<(), PromptError> {
    let times = console.ask_until("Enter times to insert [1]", None, INVALID_ENTRY, number_or(1))?;
    draft.insert_limit = Some(InsertLimit::from_raw(times));

    let strategy = console.ask_until(
        "Enter insertion strategy:[1]\n   1: every IO\n   2: fixed frequency\
         \n   3: random frequency",
        Some(1),
        INVALID_ENTRY,
        |answer| parse_u32(answer).filter(|n| (1..=3).contains(n)),
    )?;
    match strategy {
        2 => {
            let freq = console.ask_until(
                "Enter frequency.  Number of IOs per insertion. [1]",
                None,
                INVALID_ENTRY,
                number_or(1),
            )?;
            draft.frequency = Some(freq);
            draft.is_random_frequency = false;
        }
        3 => {
            let freq = console.ask_until(
                "Enter average frequency per insertion. [5]",
                None,
                INVALID_ENTRY,
                number_or(5),
            )?;
            draft.frequency = Some(freq);
            draft.is_random_frequency = true;
        }
        _ => {
            draft.frequency = Some(1);
            draft.is_random_frequency = false;
        }
    }
    Ok(())
}

pub fn ask_reactivation(
    console: &mut Console<'_>,
    draft: &mut RuleDraft,
) -> Result<(), PromptError> {
    let choice = console.ask_until(
        "Enter Reactivation type:[1] \n   1: none\n   2: time\n   3: io count\
         \n   4: random time\n   5: random io count",
        Some(1),
        INVALID_ENTRY,
        |answer| parse_u32(answer).filter(|n| (1..=5).contains(n)),
    )?;

    let (gap_type, random) = match choice {
        2 => (GapType::Time, false),
        3 => (GapType::IoCount, false),
        4 => (GapType::Time, true),
        5 => (GapType::IoCount, true),
        _ => (GapType::None, false),
    };
    draft.react_gap_type = gap_type;
    draft.is_random_gap = random;

    match (gap_type, random) {
        (GapType::Time, false) => {
            let ms = console.ask_until(
                "Milliseconds to reactivate in. [0]",
                None,
                INVALID_ENTRY,
                number_or(0),
            )?;
            draft.react_gap_msecs = Some(ms);
        }
        (GapType::IoCount, false) => {
            let n =
                console.ask_until("Enter num IO to skip [0]", None, INVALID_ENTRY, number_or(0))?;
            draft.react_gap_io_count = Some(n);
        }
        (GapType::Time, true) => {
            let ms = console.ask_until(
                "Max milliseconds to wait before reactivating. [0]",
                None,
                INVALID_ENTRY,
                number_or(0),
            )?;
            draft.max_rand_msecs = Some(ms);
        }
        (GapType::IoCount, true) => {
            let n = console.ask_until(
                "Enter max num IO to skip [0]",
                None,
                INVALID_ENTRY,
                number_or(0),
            )?;
            draft.max_rand_io_count = Some(n);
        }
        _ => return Ok(()),
    }

    draft.is_random_reactivations = console.confirm("Random reactivation iterations? (y/n)")?;
    let count = if draft.is_random_reactivations {
        console.ask_until(
            "Max number of times to reactivate.  Random iteration will be somewhere from 0..max",
            None,
            INVALID_ENTRY,
            number_or(0),
        )?
    } else {
        console.ask_until("Number of times to reactivate [0]", None, INVALID_ENTRY, number_or(0))?
    };
    draft.num_reactivations = Some(count);
    Ok(())
}

// ── Whole flows ─────────────────────────────────────────────────

/// Full `add` prompt sequence.
pub fn build_rule(
    console: &mut Console<'_>,
    topology: &dyn Topology,
) -> Result<InteractiveRule, PromptError> {
    let targets = ask_drives(console, topology)?;
    let (lba_start, lba_end) = ask_lba_range(console)?;
    let mut draft = RuleDraft {
        target: targets.first().copied(),
        lba_start,
        lba_end,
        opcode: ask_opcode(console)?,
        ..RuleDraft::default()
    };
    ask_error(console, &mut draft)?;
    ask_insertion(console, &mut draft)?;
    ask_reactivation(console, &mut draft)?;
    Ok(InteractiveRule { draft, targets })
}

/// `add_spinup` prompt sequence: drives and error only.
pub fn build_spinup_rule(
    console: &mut Console<'_>,
    topology: &dyn Topology,
) -> Result<InteractiveRule, PromptError> {
    let targets = ask_drives(console, topology)?;
    let mut draft = RuleDraft {
        target: targets.first().copied(),
        lba_start: 0,
        lba_end: 0,
        ..RuleDraft::spinup()
    };
    ask_error(console, &mut draft)?;
    Ok(InteractiveRule { draft, targets })
}

pub fn ask_scenario(console: &mut Console<'_>) -> Result<Scenario, PromptError> {
    writeln!(console, "Select error scenario")?;
    write_scenarios(console)?;
    console.ask_until("Scenario number:", None, "DEST: Invalid Error Scenario", |answer| {
        parse_u32(answer)
            .and_then(|n| Scenario::from_index(n as usize))
            .or_else(|| Scenario::from_name(answer))
    })
}

/// Drive and LBA window for `search`.
pub fn build_search(
    console: &mut Console<'_>,
    topology: &dyn Topology,
) -> Result<SearchParams, PromptError> {
    let target = ask_one_drive(console, topology)?;
    let (lba_start, lba_end) = ask_lba_range(console)?;
    Ok(SearchParams {
        lba_start,
        lba_end,
        ..SearchParams::new(target.object_id)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dest_core::rule::{PortStatus, SenseCode};
    use dest_core::sim::SimulatedTopology;
    use std::io::Cursor;

    fn run<T>(
        script: &str,
        f: impl FnOnce(&mut Console<'_>, &SimulatedTopology) -> Result<T, PromptError>,
    ) -> (Result<T, PromptError>, String) {
        let topo = SimulatedTopology::default();
        let mut out = Vec::new();
        let result = {
            let mut console = Console::new(Cursor::new(script.to_string()), &mut out);
            f(&mut console, &topo)
        };
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn full_scsi_rule() {
        let script = "0_0_5,0_0_6\n0x100\n0x200\nread\n2\n0x031100\n\n3\n2\n2\n2\n50\nn\n4\n";
        let (result, _) = run(script, |c, t| build_rule(c, t));
        let rule = result.unwrap();
        assert_eq!(rule.targets.len(), 2);
        let d = rule.draft;
        assert_eq!(d.target, Some(rule.targets[0]));
        assert_eq!((d.lba_start, d.lba_end), (0x100, 0x200));
        assert_eq!(d.opcode, "READ");
        assert_eq!(d.error_type, ErrorType::Scsi);
        assert_eq!(d.sense, Some(SenseCode::new(3, 0x11, 0)));
        assert_eq!(d.delay_io_msec, Some(0));
        assert_eq!(d.insert_limit, Some(InsertLimit::Times(3)));
        assert_eq!(d.frequency, Some(2));
        assert!(!d.is_random_frequency);
        assert_eq!(d.react_gap_type, GapType::Time);
        assert_eq!(d.react_gap_msecs, Some(50));
        assert!(!d.is_random_reactivations);
        assert_eq!(d.num_reactivations, Some(4));
    }

    #[test]
    fn quit_at_drive_prompt() {
        let (result, out) = run("quit\n", |c, t| build_rule(c, t));
        assert!(matches!(result, Err(PromptError::Cancelled)));
        assert!(out.contains("Quitting DEST command"));
    }

    #[test]
    fn quit_deep_in_sequence() {
        let script = "0_0_5\n0x0\n0x0\n\n1\nq\n";
        let (result, _) = run(script, |c, t| build_rule(c, t));
        assert!(matches!(result, Err(PromptError::Cancelled)));
    }

    #[test]
    fn bad_drive_and_lba_reprompt() {
        let script = "9_9_9\n0_0_1\n100\n0x10\n0x0\n";
        let (result, out) = run(script, |c, t| {
            let drives = ask_drives(c, t)?;
            let range = ask_lba_range(c)?;
            Ok((drives, range))
        });
        let (drives, range) = result.unwrap();
        assert_eq!(drives[0].fru.to_string(), "0_0_1");
        assert_eq!(range, (0x10, 0));
        assert!(out.contains(INVALID_ENTRY));
        assert!(out.contains("Invalid LBA value detected"));
    }

    #[test]
    fn empty_lba_answers_take_the_default() {
        let (result, out) = run("\n\n", |c, _| ask_lba_range(c));
        assert_eq!(result.unwrap(), (0, 0));
        assert!(!out.contains("Invalid LBA value detected"));
    }

    #[test]
    fn empty_error_type_defaults_to_scsi() {
        let (result, _) = run("\n0x031100\n\n", |c, _| {
            let mut draft = RuleDraft::default();
            ask_error(c, &mut draft)?;
            Ok(draft)
        });
        let draft = result.unwrap();
        assert_eq!(draft.error_type, ErrorType::Scsi);
        assert_eq!(draft.sense, Some(SenseCode::new(3, 0x11, 0)));
        assert_eq!(draft.delay_io_msec, Some(0));
    }

    #[test]
    fn port_error_default_and_retry() {
        let (result, out) = run("bogus\n\n", |c, _| {
            let mut draft = RuleDraft::default();
            ask_port_error(c, &mut draft)?;
            Ok(draft)
        });
        assert_eq!(result.unwrap().port_status, Some(PortStatus::ABORT_TIMEOUT));
        assert!(out.contains("Error is not recognized"));
    }

    #[test]
    fn scsi_error_by_name_and_bad_hex() {
        let (result, out) = run("0xZZ\nFBE_SCSI_CC_MEDIA_ERR_CANT_REMAP\n", |c, _| {
            let mut draft = RuleDraft::default();
            ask_scsi_error(c, &mut draft)?;
            Ok(draft)
        });
        let draft = result.unwrap();
        assert_eq!(draft.sense, Some(SenseCode::new(3, 0x11, 0)));
        assert!(!draft.valid_lba);
        assert!(out.contains("DEST: Invalid hex value. Please try again."));
    }

    #[test]
    fn random_reactivation() {
        let (result, _) = run("5\n40\ny\n3\n", |c, _| {
            let mut draft = RuleDraft::default();
            ask_reactivation(c, &mut draft)?;
            Ok(draft)
        });
        let d = result.unwrap();
        assert_eq!(d.react_gap_type, GapType::IoCount);
        assert!(d.is_random_gap);
        assert_eq!(d.max_rand_io_count, Some(40));
        assert!(d.is_random_reactivations);
        assert_eq!(d.num_reactivations, Some(3));
    }

    #[test]
    fn spinup_asks_drives_and_error_only() {
        let (result, _) = run("0_0_2\n1\n250\n", |c, t| build_spinup_rule(c, t));
        let rule = result.unwrap();
        assert_eq!(rule.draft.opcode, "STARTSTOP");
        assert_eq!(rule.draft.error_type, ErrorType::None);
        assert_eq!(rule.draft.delay_io_msec, Some(250));
    }

    #[test]
    fn scenario_by_number_or_name() {
        let (result, out) = run("7\n2\n", |c, _| ask_scenario(c));
        assert_eq!(result.unwrap(), Scenario::RandomMediaError);
        assert!(out.contains("1. SLOW_IO"));
        assert!(out.contains("DEST: Invalid Error Scenario"));
        let (result, _) = run("proactive_spare\n", |c, _| ask_scenario(c));
        assert_eq!(result.unwrap(), Scenario::ProactiveSpare);
    }

    #[test]
    fn search_params_from_prompts() {
        let (result, _) = run("0_0_3\n0x0\n0x0\n", |c, t| build_search(c, t));
        let params = result.unwrap();
        assert_eq!(params.object_id.0, 0x103);
        assert_eq!((params.lba_start, params.lba_end), (0, 0));
    }
}
