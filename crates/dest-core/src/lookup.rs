//! Static name ↔ code tables.
//!
//! All tables are plain slices scanned linearly; the first match wins.
//! Opcode resolution is one-to-many: a shortcut such as `READ` expands to
//! every table entry carrying that shortcut.

use thiserror::Error;

use crate::number::parse_u32;
use crate::rule::{PortStatus, ANY_OPCODE};

/// Most operation codes a single rule can match.
pub const MAX_OPCODES: usize = 11;
/// Command byte meaning "any operation".
pub const ANY_OPCODE_CODE: u8 = 0xFF;

/// Errors from table lookups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("unknown opcode '{0}'")]
    UnknownOpcode(String),

    #[error("invalid opcode {0:#x}: must fit in one byte")]
    OpcodeOutOfRange(u32),

    #[error("unknown SCSI error '{0}'")]
    UnknownScsiError(String),

    #[error("unknown port error '{0}'")]
    UnknownPortError(String),
}

// ── Opcodes ─────────────────────────────────────────────────────

/// One SCSI operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeEntry {
    pub name: &'static str,
    pub code: u8,
    pub shortcut: &'static str,
}

const fn op(name: &'static str, code: u8, shortcut: &'static str) -> OpcodeEntry {
    OpcodeEntry {
        name,
        code,
        shortcut,
    }
}

/// SCSI operations an operator can filter on.
pub static OPCODES: &[OpcodeEntry] = &[
    op("SCSI_COPY", 0x18, "COPY"),
    op("SCSI_FORCE_RESERVE", 0xD3, "FRESERVE"),
    op("SCSI_DEFINE_GROUP", 0xD0, "DEFINE_GROUP"),
    op("SCSI_FORMAT_UNIT", 0x04, "FORMAT_UNIT"),
    op("SCSI_INQUIRY", 0x12, "INQUIRY"),
    op("SCSI_LOG_SENSE", 0x4D, "LOG_SENSE"),
    op("SCSI_MAINT_IN", 0xA3, "MAINT"),
    op("SCSI_MAINT_OUT", 0xA4, "MAINT"),
    op("SCSI_MODE_SELECT_6", 0x15, "MODE_SELECT"),
    op("SCSI_MODE_SELECT_10", 0x55, "MODE_SELECT"),
    op("SCSI_MODE_SENSE_6", 0x1A, "MODE_SENSE"),
    op("SCSI_MODE_SENSE_10", 0x5A, "MODE_SENSE"),
    op("SCSI_PER_RESERVE_IN", 0x5E, "RESERVE"),
    op("SCSI_PER_RESERVE_OUT", 0x5F, "RESERVE"),
    op("SCSI_PREFETCH", 0x34, "PREFETCH"),
    op("SCSI_READ", 0x08, "READ"),
    op("SCSI_READ_6", 0x08, "READ"),
    op("SCSI_READ_10", 0x28, "READ"),
    op("SCSI_READ_12", 0xA8, "READ"),
    op("SCSI_READ_16", 0x88, "READ"),
    op("SCSI_READ_BUFFER", 0x3C, "READ"),
    op("SCSI_READ_CAPACITY", 0x25, "READ"),
    op("SCSI_READ_CAPACITY_16", 0x9E, "READ"),
    op("SCSI_REASSIGN_BLOCKS", 0x07, "REASSIGN"),
    op("SCSI_RCV_DIAGNOSTIC", 0x1C, "DIAGNOSTIC"),
    op("SCSI_RELEASE", 0x17, "RELEASE"),
    op("SCSI_RELEASE_10", 0x57, "RELEASE"),
    op("SCSI_RELEASE_GROUP", 0xD2, "RELEASE"),
    op("SCSI_REQUEST_SENSE", 0x03, "SENSE"),
    op("SCSI_REPORT_LUNS", 0xA0, "LUNS"),
    op("SCSI_RESERVE", 0x16, "RESERVE"),
    op("SCSI_RESERVE_10", 0x56, "RESERVE"),
    op("SCSI_RESERVE_GROUP", 0xD1, "RESERVE"),
    op("SCSI_REZERO", 0x01, "ZEROS"),
    op("SCSI_SEND_DIAGNOSTIC", 0x1D, "DIAGNOSTIC"),
    op("SCSI_RECEIVE_DIAGNOSTIC", 0x1C, "DIAGNOSTIC"),
    op("SCSI_SKIPMASK_READ", 0xE8, "SKIPMASK"),
    op("SCSI_SKIPMASK_WRITE", 0xEA, "SKIPMASK"),
    op("SCSI_START_STOP_UNIT", 0x1B, "STARTSTOP"),
    op("SCSI_SYNCRONIZE", 0x35, "SYNC"),
    op("SCSI_TEST_UNIT_READY", 0x00, "UNITREADY"),
    op("SCSI_VERIFY", 0x2F, "VERIFY"),
    op("SCSI_VERIFY_16", 0x8F, "VERIFY"),
    op("SCSI_VOLUME_SET_IN", 0xBE, "VOLUME"),
    op("SCSI_VOLUME_SET_OUT", 0xBF, "VOLUME"),
    op("SCSI_WRITE", 0x0A, "WRITE"),
    op("SCSI_WRITE_6", 0x0A, "WRITE"),
    op("SCSI_WRITE_10", 0x2A, "WRITE"),
    op("SCSI_WRITE_12", 0xAA, "WRITE"),
    op("SCSI_WRITE_16", 0x8A, "WRITE"),
    op("SCSI_WRITE_BUFFER", 0x3B, "WRITE"),
    op("SCSI_WRITE_SAME", 0x41, "WRITE"),
    op("SCSI_WRITE_SAME_16", 0x93, "WRITE"),
    op("SCSI_WRITE_VERIFY", 0x2E, "WRITE"),
    op("SCSI_WRITE_VERIFY_16", 0x8E, "WRITE"),
];

/// Resolve an opcode string to the set of operation codes it covers.
///
/// Numeric input (`0x`-prefixed hex or decimal) bypasses the table.  `ANY`
/// resolves to `[0xFF]`.  Names and shortcuts collect every matching entry
/// in table order, capped at [`MAX_OPCODES`].  Aliases sharing a code (such
/// as `SCSI_READ` and `SCSI_READ_6`) each contribute an entry.
pub fn resolve_opcodes(input: &str) -> Result<Vec<u8>, LookupError> {
    let upper = input.trim().to_ascii_uppercase();

    if let Some(value) = parse_u32(&upper) {
        return u8::try_from(value)
            .map(|code| vec![code])
            .map_err(|_| LookupError::OpcodeOutOfRange(value));
    }

    if upper == ANY_OPCODE {
        return Ok(vec![ANY_OPCODE_CODE]);
    }

    let mut codes = Vec::new();
    for entry in OPCODES {
        if codes.len() == MAX_OPCODES {
            break;
        }
        if entry.name == upper || entry.shortcut == upper {
            codes.push(entry.code);
        }
    }

    if codes.is_empty() {
        log::debug!("opcode '{}' not found", upper);
        return Err(LookupError::UnknownOpcode(upper));
    }
    Ok(codes)
}

/// First operation code for a name or shortcut, or the numeric value.
pub fn opcode_lookup(input: &str) -> Option<u8> {
    let upper = input.trim().to_ascii_uppercase();
    OPCODES
        .iter()
        .find(|e| e.name == upper || e.shortcut == upper)
        .map(|e| e.code)
        .or_else(|| parse_u32(&upper).and_then(|v| u8::try_from(v).ok()))
}

/// Canonical name for an operation code.
pub fn opcode_name(code: u8) -> Option<&'static str> {
    if code == ANY_OPCODE_CODE {
        return Some(ANY_OPCODE);
    }
    OPCODES.iter().find(|e| e.code == code).map(|e| e.name)
}

// ── SCSI sense errors ───────────────────────────────────────────

/// A named check-condition error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScsiErrorEntry {
    pub name: &'static str,
    /// Packed sense key / ASC / ASCQ.
    pub code: u32,
    /// Whether the sense data should report the failing LBA.
    pub valid_lba: bool,
}

const fn cc(name: &'static str, code: u32, valid_lba: bool) -> ScsiErrorEntry {
    ScsiErrorEntry {
        name,
        code,
        valid_lba,
    }
}

pub static SCSI_ERRORS: &[ScsiErrorEntry] = &[
    cc("FBE_SCSI_CC_NOERR", 0x000001, true),
    cc("FBE_SCSI_CC_AUTO_REMAPPED", 0x011802, true),
    cc("FBE_SCSI_CC_RECOVERED_BAD_BLOCK", 0x011800, true),
    cc("FBE_SCSI_CC_RECOVERED_ERR_CANT_REMAP", 0x011800, false),
    cc("FBE_SCSI_CC_DIE_RETIREMENT_START", 0x0118FD, true),
    cc("FBE_SCSI_CC_DIE_RETIREMENT_END", 0x0118FE, true),
    cc("FBE_SCSI_CC_PFA_THRESHOLD_REACHED", 0x015D00, true),
    cc("FBE_SCSI_CC_RECOVERED_ERR_NOSYNCH", 0x015C02, true),
    cc("FBE_SCSI_CC_RECOVERED_ERR", 0x015C00, true),
    cc("FBE_SCSI_CC_BECOMING_READY", 0x020401, true),
    cc("FBE_SCSI_CC_NOT_SPINNING", 0x020402, true),
    cc("FBE_SCSI_CC_FORMAT_IN_PROGRESS", 0x020404, true),
    cc("FBE_SCSI_CC_NOT_READY", 0x020000, true),
    cc("FBE_SCSI_CC_FORMAT_CORRUPTED", 0x023100, true),
    cc("FBE_SCSI_CC_SANITIZE_INTERRUPTED", 0x033180, true),
    cc("FBE_SCSI_CC_HARD_BAD_BLOCK", 0x031100, true),
    cc("FBE_SCSI_CC_MEDIA_ERR_CANT_REMAP", 0x031100, false),
    cc("FBE_SCSI_CC_HARDWARE_ERROR_PARITY", 0x044700, true),
    cc("FBE_SCSI_CC_HARDWARE_ERROR_SELF_TEST", 0x043E03, true),
    cc("FBE_SCSI_CC_HARDWARE_ERROR", 0x040000, true),
    cc("FBE_SCSI_CC_ILLEGAL_REQUEST", 0x050000, true),
    cc("FBE_SCSI_CC_DEV_RESET", 0x062900, true),
    cc("FBE_SCSI_CC_MODE_SELECT_OCCURRED", 0x062A00, true),
    cc("FBE_SCSI_CC_SYNCH_SUCCESS", 0x065C01, true),
    cc("FBE_SCSI_CC_SYNCH_FAIL", 0x065C02, true),
    cc("FBE_SCSI_CC_UNIT_ATTENTION", 0x060000, true),
    cc("FBE_SCSI_CC_ABORTED_CMD_PARITY_ERROR", 0x0B4700, true),
    cc("FBE_SCSI_CC_ABORTED_CMD", 0x0B0000, true),
    cc("FBE_SCSI_CC_UNEXPECTED_SENSE_KEY", 0x070000, true),
    cc("FBE_SCSI_CC_HARDWARE_ERROR_FIRMWARE", 0x048000, true),
    cc("FBE_SCSI_CC_HARDWARE_ERROR_NO_SPARE", 0x043200, true),
    cc("FBE_SCSI_CC_MEDIA_ERR_WRITE_ERROR", 0x030C00, true),
    cc("FBE_SCSI_CC_DEFECT_LIST_ERROR", 0x031900, true),
    cc("FBE_SCSI_CC_SEEK_POSITIONING_ERROR", 0x041500, true),
    cc("FBE_SCSI_CC_SEL_ID_ERROR", 0x06FF00, true),
    cc("FBE_SCSI_CC_RECOVERED_WRITE_FAULT", 0x010300, true),
    cc("FBE_SCSI_CC_MEDIA_ERROR_WRITE_FAULT", 0x030300, true),
    cc("FBE_SCSI_CC_HARDWARE_ERROR_WRITE_FAULT", 0x040300, true),
    cc("FBE_SCSI_CC_INTERNAL_TARGET_FAILURE", 0x044400, true),
    cc("FBE_SCSI_CC_RECOVERED_DEFECT_LIST_ERROR", 0x011900, true),
    cc("FBE_SCSI_CC_INVALID_LUN", 0x052500, true),
    cc("FBE_SCSI_LOGICAL_UNIT_FAILED_SELF_CONFIGURATION", 0x024C00, true),
    cc("FBE_SCSI_CC_SUPER_CAP_FAILURE", 0x018030, true),
    cc("FBE_SCSI_CC_DRIVE_TABLE_REBUILD", 0x020405, true),
    cc("FBE_SCSI_CC_WRITE_PROTECT", 0x072700, true),
    cc("FBE_SCSI_CC_SENSE_DATA_MISSING", 0x000000, true),
];

/// Find a SCSI error by name (case-insensitive).
pub fn scsi_error_lookup(name: &str) -> Result<&'static ScsiErrorEntry, LookupError> {
    let upper = name.trim().to_ascii_uppercase();
    SCSI_ERRORS
        .iter()
        .find(|e| e.name == upper)
        .ok_or(LookupError::UnknownScsiError(upper))
}

/// First table name carrying this packed sense code.
pub fn scsi_error_name(code: u32) -> Option<&'static str> {
    SCSI_ERRORS.iter().find(|e| e.code == code).map(|e| e.name)
}

// ── Port errors ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortErrorEntry {
    pub name: &'static str,
    pub status: PortStatus,
}

const fn pe(name: &'static str, status: PortStatus) -> PortErrorEntry {
    PortErrorEntry { name, status }
}

pub static PORT_ERRORS: &[PortErrorEntry] = &[
    pe("SCSI_INVALIDREQUEST", PortStatus::INVALID_REQUEST),
    pe("SCSI_DEVICE_BUSY", PortStatus::BUSY),
    pe("SCSI_DEVICE_NOT_PRESENT", PortStatus::DEVICE_NOT_LOGGED_IN),
    pe("SCSI_BADBUSPHASE", PortStatus::PROTOCOL_ERROR),
    pe("SCSI_IO_TIMEOUT_ABORT", PortStatus::ABORT_TIMEOUT),
    pe("SCSI_SELECTIONTIMEOUT", PortStatus::SELECTION_TIMEOUT),
    pe("SCSI_TOOMUCHDATA", PortStatus::DATA_OVERRUN),
    pe("SCSI_XFERCOUNTNOTZERO", PortStatus::DATA_UNDERRUN),
    pe("SCSI_DRVABORT", PortStatus::ABORTED_BY_DEVICE),
    pe("SCSI_INCIDENTAL_ABORT", PortStatus::INCIDENTAL_ABORT),
];

/// Port error used when the interactive prompt is left empty.
pub const DEFAULT_PORT_ERROR: &str = "SCSI_IO_TIMEOUT_ABORT";

/// Resolve a port error by name, falling back to a numeric status.
pub fn port_error_lookup(text: &str) -> Result<PortStatus, LookupError> {
    let upper = text.trim().to_ascii_uppercase();
    PORT_ERRORS
        .iter()
        .find(|e| e.name == upper)
        .map(|e| e.status)
        .or_else(|| parse_u32(&upper).map(PortStatus))
        .ok_or(LookupError::UnknownPortError(upper))
}

/// Display name for a port status; `ANY` when the table has none.
pub fn port_status_name(status: PortStatus) -> &'static str {
    PORT_ERRORS
        .iter()
        .find(|e| e.status == status)
        .map_or(ANY_OPCODE, |e| e.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_shortcut_expands() {
        let codes = resolve_opcodes("read").unwrap();
        assert_eq!(codes, vec![0x08, 0x08, 0x28, 0xA8, 0x88, 0x3C, 0x25, 0x9E]);
    }

    #[test]
    fn write_shortcut_stays_under_cap() {
        let codes = resolve_opcodes("WRITE").unwrap();
        assert!(codes.len() <= MAX_OPCODES);
        assert!(codes.contains(&0x2A));
        assert!(codes.contains(&0x8E));
    }

    #[test]
    fn canonical_name_resolves_to_one_code() {
        assert_eq!(resolve_opcodes("SCSI_READ_10").unwrap(), vec![0x28]);
    }

    #[test]
    fn resolution_is_idempotent() {
        let first = resolve_opcodes("MODE_SENSE").unwrap();
        let second = resolve_opcodes("MODE_SENSE").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn any_and_numeric_bypass_table() {
        assert_eq!(resolve_opcodes("ANY").unwrap(), vec![ANY_OPCODE_CODE]);
        assert_eq!(resolve_opcodes("0x28").unwrap(), vec![0x28]);
        assert_eq!(resolve_opcodes("40").unwrap(), vec![40]);
    }

    #[test]
    fn numeric_opcode_out_of_range() {
        assert_eq!(
            resolve_opcodes("0x100"),
            Err(LookupError::OpcodeOutOfRange(0x100))
        );
    }

    #[test]
    fn unknown_opcode() {
        assert!(matches!(
            resolve_opcodes("bogus"),
            Err(LookupError::UnknownOpcode(s)) if s == "BOGUS"
        ));
    }

    #[test]
    fn startstop_resolves() {
        assert_eq!(resolve_opcodes("STARTSTOP").unwrap(), vec![0x1B]);
    }

    #[test]
    fn opcode_first_match_and_name() {
        assert_eq!(opcode_lookup("write"), Some(0x0A));
        assert_eq!(opcode_lookup("0x2a"), Some(0x2A));
        assert_eq!(opcode_lookup("nope"), None);
        assert_eq!(opcode_name(0x28), Some("SCSI_READ_10"));
        assert_eq!(opcode_name(0xFF), Some("ANY"));
    }

    #[test]
    fn scsi_error_first_match_wins() {
        let e = scsi_error_lookup("fbe_scsi_cc_hard_bad_block").unwrap();
        assert_eq!(e.code, 0x031100);
        assert!(e.valid_lba);
        let e = scsi_error_lookup("FBE_SCSI_CC_MEDIA_ERR_CANT_REMAP").unwrap();
        assert!(!e.valid_lba);
        assert_eq!(scsi_error_name(0x031100), Some("FBE_SCSI_CC_HARD_BAD_BLOCK"));
        assert!(scsi_error_lookup("NOT_AN_ERROR").is_err());
    }

    #[test]
    fn port_error_by_name_or_number() {
        assert_eq!(
            port_error_lookup("scsi_device_busy").unwrap(),
            PortStatus::BUSY
        );
        assert_eq!(port_error_lookup("0x7").unwrap(), PortStatus(7));
        assert!(port_error_lookup("nonsense").is_err());
    }

    #[test]
    fn port_status_reverse_lookup() {
        assert_eq!(port_status_name(PortStatus::ABORT_TIMEOUT), "SCSI_IO_TIMEOUT_ABORT");
        assert_eq!(port_status_name(PortStatus(0x77)), "ANY");
    }
}
