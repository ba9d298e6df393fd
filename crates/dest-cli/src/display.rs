//! Operator-facing listings: records and lookup tables.

use std::fmt::Display;
use std::io::{self, Write};

use dest_core::lookup::{port_status_name, OPCODES, PORT_ERRORS, SCSI_ERRORS};
use dest_core::rule::{ErrorPayload, ErrorRule, ANY_OPCODE};
use dest_core::scenario::Scenario;

pub const SEPARATOR: &str = "--------------------------------------------------";

fn field(out: &mut dyn Write, label: &str, value: impl Display) -> io::Result<()> {
    writeln!(out, "{:<27}{}", label, value)
}

/// Print one record in the labelled column layout.
pub fn write_record(out: &mut dyn Write, rule: &ErrorRule) -> io::Result<()> {
    let (valid_lba, deferred) = match rule.payload {
        ErrorPayload::Scsi(e) => (e.valid_lba, e.deferred),
        _ => (false, false),
    };
    let gap = &rule.react_gap;

    writeln!(out, "{}", SEPARATOR)?;
    field(out, "Record id:", rule.record_id)?;
    field(out, "Object id:", rule.target.object_id)?;
    field(out, "Drive:", rule.target.fru)?;
    field(
        out,
        "LBA:",
        format_args!("[{:#X} .. {:#X}]", rule.lba_start, rule.lba_end),
    )?;
    field(out, "Opcode:", &rule.opcode)?;
    match rule.payload {
        ErrorPayload::Port(status) => field(out, "Port Error:", port_status_name(status))?,
        ErrorPayload::Scsi(e) => field(out, "Error(SK/ASC/ASCQ):", e.sense)?,
        ErrorPayload::Glitch { secs } => field(out, "Glitch seconds:", secs)?,
        ErrorPayload::None | ErrorPayload::Fail => {}
    }
    field(out, "Error Type:", rule.error_type())?;
    field(out, "Sense Data - valid lba:", u8::from(valid_lba))?;
    field(out, "Sense Data - deferred:", u8::from(deferred))?;
    field(out, "Num insertions:", rule.insert_limit)?;
    field(out, "Frequency:", rule.frequency)?;
    field(out, "Is random freq:", u8::from(rule.is_random_frequency))?;
    field(out, "Reactivation Gap Type:", gap.gap_type())?;
    field(out, "Gap milliseconds:", gap.msecs())?;
    field(out, "Gap IO count:", gap.io_count())?;
    field(out, "Is random gap:", u8::from(gap.is_random()))?;
    field(out, "Random gap sec max:", gap.max_rand_msecs())?;
    field(out, "Random gap count max:", gap.max_rand_io_count())?;
    field(
        out,
        "Is random reactivations:",
        u8::from(rule.reactivation.is_random()),
    )?;
    field(out, "Num reactivations:", rule.reactivation.count())?;
    field(out, "Delay IO msec:", rule.delay_io_msec)?;
    field(out, "stats - Times reactivated:", rule.counters.times_reset)?;
    field(out, "stats - React budget:", rule.counters.reactivations_left)?;
    field(out, "stats - Times inserted:", rule.counters.times_inserted)
}

pub fn write_opcodes(out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "\nThe following opcode name, value or shortcut can be injected:")?;
    writeln!(out, "{:<30} {:<6} {}", "Name", "Value", "Shortcut")?;
    for entry in OPCODES {
        writeln!(
            out,
            "{:<30} 0x{:<2x}   {}",
            entry.name, entry.code, entry.shortcut
        )?;
    }
    writeln!(out, "{:<30} 0x{:<2x}   {}", ANY_OPCODE, 0xFF, ANY_OPCODE)
}

pub fn write_scsi_errors(out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "\nThe following SCSI error strings can be injected:")?;
    for entry in SCSI_ERRORS {
        writeln!(out, "{:<48} {:#08x}", entry.name, entry.code)?;
    }
    Ok(())
}

pub fn write_port_errors(out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "\nThe following PORT error strings can be injected:")?;
    for entry in PORT_ERRORS {
        writeln!(out, "{:<30} {}", entry.name, entry.status.0)?;
    }
    Ok(())
}

pub fn write_scenarios(out: &mut dyn Write) -> io::Result<()> {
    for (i, scenario) in Scenario::ALL.iter().enumerate() {
        writeln!(out, "{}. {}", i + 1, scenario)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dest_core::rule::{
        Fru, InjectionPath, InsertLimit, ObjectId, PortStatus, ReactGap, Reactivation,
        RuleCounters, ScsiError, SenseCode, Target,
    };

    fn rule(payload: ErrorPayload) -> ErrorRule {
        ErrorRule {
            record_id: 7,
            target: Target {
                fru: Fru::new(0, 0, 5),
                object_id: ObjectId(0x105),
            },
            lba_start: 0x10000,
            lba_end: 0x2FFFF,
            opcode: "READ".into(),
            commands: vec![0x28],
            payload,
            insert_limit: InsertLimit::Times(1),
            frequency: 1,
            is_random_frequency: false,
            react_gap: ReactGap::None,
            reactivation: Reactivation::Fixed(0),
            delay_io_msec: 0,
            injection_path: InjectionPath::Completion,
            counters: RuleCounters::default(),
        }
    }

    fn render(rule: &ErrorRule) -> String {
        let mut out = Vec::new();
        write_record(&mut out, rule).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn scsi_record_layout() {
        let text = render(&rule(ErrorPayload::Scsi(ScsiError {
            status: 2,
            sense: SenseCode::new(3, 0x11, 0),
            valid_lba: true,
            deferred: false,
        })));
        assert!(text.starts_with(SEPARATOR));
        assert!(text.contains("Record id:                 7\n"));
        assert!(text.contains("Object id:                 0x105\n"));
        assert!(text.contains("Drive:                     0_0_5\n"));
        assert!(text.contains("LBA:                       [0x10000 .. 0x2FFFF]\n"));
        assert!(text.contains("Error(SK/ASC/ASCQ):        3/11/0\n"));
        assert!(text.contains("Error Type:                scsi\n"));
        assert!(text.contains("Sense Data - valid lba:    1\n"));
        assert!(text.contains("stats - Times inserted:    0\n"));
        assert!(!text.contains("Port Error:"));
    }

    #[test]
    fn port_record_names_status() {
        let text = render(&rule(ErrorPayload::Port(PortStatus::SELECTION_TIMEOUT)));
        assert!(text.contains("Port Error:                SCSI_SELECTIONTIMEOUT\n"));
        assert!(text.contains("Error Type:                port\n"));
    }

    #[test]
    fn random_reactivation_shows_ceiling_and_budget() {
        let mut r = rule(ErrorPayload::None);
        r.reactivation = Reactivation::Random { max: 8 };
        r.counters.reactivations_left = 3;
        let text = render(&r);
        assert!(text.contains("Is random reactivations:   1\n"));
        assert!(text.contains("Num reactivations:         8\n"));
        assert!(text.contains("stats - React budget:      3\n"));
    }

    #[test]
    fn tables_list_every_entry() {
        let mut out = Vec::new();
        write_opcodes(&mut out).unwrap();
        write_scsi_errors(&mut out).unwrap();
        write_port_errors(&mut out).unwrap();
        write_scenarios(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("SCSI_READ_10"));
        assert!(text.contains("FBE_SCSI_CC_HARD_BAD_BLOCK"));
        assert!(text.contains("SCSI_IO_TIMEOUT_ABORT"));
        assert!(text.contains("1. SLOW_IO\n"));
        assert!(text.contains("3. PROACTIVE_SPARE\n"));
    }
}
