//! Error rule model.
//!
//! An [`ErrorRule`] is the unit of configuration handed to the injection
//! service.  Rules are never built field-by-field by front ends; instead the
//! batch parser, the interactive prompts and the XML loader each fill in a
//! [`RuleDraft`] and the validator turns that draft into a rule.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::number::parse_u32;

/// Logical block address.
pub type Lba = u64;

/// Identifier assigned to a rule by the injection service.
pub type RecordId = u32;

/// "Whole range" / unset marker for LBA bounds.
pub const ANY_RANGE: Lba = u64::MAX;
/// Largest LBA an operator may type.
pub const MAX_DISK_LBA: Lba = u64::MAX - 1;
/// Longest accepted `bus_enclosure_slot` text.
pub const MAX_FRU_STR_LEN: usize = 16;
/// Most drives a single command may target.
pub const MAX_FRUS_PER_RECORD: usize = 16;
/// Raw insertion count meaning "insert forever".
pub const INSERT_ALWAYS: u32 = 0x7FFF_FFFF;
/// Default reactivation budget.
pub const ALWAYS_REACTIVATE: u32 = 0x7FFF_FFFF;
/// Glitch duration used when a glitch rule asks for zero seconds.
pub const DEFAULT_GLITCH_SECS: u32 = 10;
/// SCSI CHECK CONDITION status byte.
pub const SCSI_STATUS_CHECK_CONDITION: u8 = 0x02;
/// Opcode string matching every operation.
pub const ANY_OPCODE: &str = "ANY";
/// Internal opcode used by spin-up rules.
pub const STARTSTOP_OPCODE: &str = "STARTSTOP";

// ── Target identity ─────────────────────────────────────────────

/// Physical drive location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fru {
    pub bus: u32,
    pub enclosure: u32,
    pub slot: u32,
}

impl Fru {
    pub fn new(bus: u32, enclosure: u32, slot: u32) -> Self {
        Self {
            bus,
            enclosure,
            slot,
        }
    }
}

impl fmt::Display for Fru {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.bus, self.enclosure, self.slot)
    }
}

/// Why a `bus_enclosure_slot` string was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FruParseError {
    #[error("drive location '{0}' is longer than {MAX_FRU_STR_LEN} characters")]
    TooLong(String),

    #[error("'{0}' is not a bus_enclosure_slot location")]
    Malformed(String),
}

impl FromStr for Fru {
    type Err = FruParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.len() > MAX_FRU_STR_LEN {
            return Err(FruParseError::TooLong(text.to_string()));
        }
        let malformed = || FruParseError::Malformed(text.to_string());
        let mut parts = text.split('_');
        let mut next = || parts.next().and_then(parse_u32).ok_or_else(malformed);
        let fru = Fru::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(malformed());
        }
        Ok(fru)
    }
}

/// Opaque drive handle issued by the topology service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A resolved target: where the drive is and the handle that reaches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub fru: Fru,
    pub object_id: ObjectId,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (oid {})", self.fru, self.object_id)
    }
}

// ── Error payload ───────────────────────────────────────────────

/// Error category carried by a rule.
///
/// `Invalid` only ever appears on drafts; the validator refuses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorType {
    None,
    Scsi,
    Port,
    Glitch,
    Fail,
    Invalid,
}

impl ErrorType {
    /// Numeric code used in saved configuration files.
    pub fn code(self) -> Option<u32> {
        match self {
            ErrorType::None => Some(0),
            ErrorType::Scsi => Some(1),
            ErrorType::Port => Some(2),
            ErrorType::Glitch => Some(3),
            ErrorType::Fail => Some(4),
            ErrorType::Invalid => None,
        }
    }

    pub fn from_code(code: u32) -> Self {
        match code {
            0 => ErrorType::None,
            1 => ErrorType::Scsi,
            2 => ErrorType::Port,
            3 => ErrorType::Glitch,
            4 => ErrorType::Fail,
            _ => ErrorType::Invalid,
        }
    }

    /// Parse the `-et` keyword.  Only the operator-selectable types exist.
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "none" => Some(ErrorType::None),
            "scsi" => Some(ErrorType::Scsi),
            "port" => Some(ErrorType::Port),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorType::None => "none",
            ErrorType::Scsi => "scsi",
            ErrorType::Port => "port",
            ErrorType::Glitch => "glitch",
            ErrorType::Fail => "fail",
            ErrorType::Invalid => "invalid",
        };
        f.write_str(s)
    }
}

/// Sense key / additional sense code / qualifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SenseCode {
    pub sense_key: u8,
    pub asc: u8,
    pub ascq: u8,
}

impl SenseCode {
    pub fn new(sense_key: u8, asc: u8, ascq: u8) -> Self {
        Self {
            sense_key,
            asc,
            ascq,
        }
    }

    /// Split a packed `0xSSAAQQ` value.
    pub fn from_packed(value: u32) -> Self {
        Self {
            sense_key: ((value >> 16) & 0xFF) as u8,
            asc: ((value >> 8) & 0xFF) as u8,
            ascq: (value & 0xFF) as u8,
        }
    }

    pub fn packed(self) -> u32 {
        (u32::from(self.sense_key) << 16) | (u32::from(self.asc) << 8) | u32::from(self.ascq)
    }
}

impl fmt::Display for SenseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}/{:x}/{:x}", self.sense_key, self.asc, self.ascq)
    }
}

/// Port (transport) request status returned instead of SCSI data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortStatus(pub u32);

impl PortStatus {
    pub const SUCCESS: PortStatus = PortStatus(0);
    pub const INVALID_REQUEST: PortStatus = PortStatus(1);
    pub const DEVICE_NOT_LOGGED_IN: PortStatus = PortStatus(3);
    pub const BUSY: PortStatus = PortStatus(4);
    pub const PROTOCOL_ERROR: PortStatus = PortStatus(5);
    pub const ABORT_TIMEOUT: PortStatus = PortStatus(6);
    pub const SELECTION_TIMEOUT: PortStatus = PortStatus(7);
    pub const DATA_OVERRUN: PortStatus = PortStatus(9);
    pub const DATA_UNDERRUN: PortStatus = PortStatus(10);
    pub const ABORTED_BY_DEVICE: PortStatus = PortStatus(12);
    pub const INCIDENTAL_ABORT: PortStatus = PortStatus(14);
}

/// SCSI check-condition details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScsiError {
    pub status: u8,
    pub sense: SenseCode,
    /// Report the failing LBA in the sense data.
    pub valid_lba: bool,
    /// Report the error as deferred rather than current.
    pub deferred: bool,
}

/// What the injection service returns when a rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorPayload {
    /// Delay only.
    None,
    Scsi(ScsiError),
    Port(PortStatus),
    /// Take the drive away for a while.
    Glitch { secs: u32 },
    /// Fail the drive.
    Fail,
}

impl ErrorPayload {
    pub fn error_type(&self) -> ErrorType {
        match self {
            ErrorPayload::None => ErrorType::None,
            ErrorPayload::Scsi(_) => ErrorType::Scsi,
            ErrorPayload::Port(_) => ErrorType::Port,
            ErrorPayload::Glitch { .. } => ErrorType::Glitch,
            ErrorPayload::Fail => ErrorType::Fail,
        }
    }
}

// ── Insertion and reactivation policy ───────────────────────────

/// How many times a rule fires before going dormant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertLimit {
    Times(u32),
    Always,
}

impl InsertLimit {
    pub fn raw(self) -> u32 {
        match self {
            InsertLimit::Times(n) => n,
            InsertLimit::Always => INSERT_ALWAYS,
        }
    }

    pub fn from_raw(raw: u32) -> Self {
        if raw >= INSERT_ALWAYS {
            InsertLimit::Always
        } else {
            InsertLimit::Times(raw)
        }
    }
}

impl fmt::Display for InsertLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsertLimit::Times(n) => write!(f, "{n}"),
            InsertLimit::Always => f.write_str("always"),
        }
    }
}

/// Kind of gap a dormant rule waits out before reactivating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GapType {
    None,
    Time,
    IoCount,
    Invalid,
}

impl GapType {
    pub fn code(self) -> Option<u32> {
        match self {
            GapType::None => Some(0),
            GapType::Time => Some(1),
            GapType::IoCount => Some(2),
            GapType::Invalid => None,
        }
    }

    pub fn from_code(code: u32) -> Self {
        match code {
            0 => GapType::None,
            1 => GapType::Time,
            2 => GapType::IoCount,
            _ => GapType::Invalid,
        }
    }

    /// Parse the `-react_gap` keyword; anything unknown is `Invalid`.
    pub fn from_keyword(word: &str) -> Self {
        match word.to_ascii_lowercase().as_str() {
            "time" => GapType::Time,
            "io_count" => GapType::IoCount,
            _ => GapType::Invalid,
        }
    }
}

impl fmt::Display for GapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GapType::None => "none",
            GapType::Time => "time",
            GapType::IoCount => "io_count",
            GapType::Invalid => "invalid",
        };
        f.write_str(s)
    }
}

/// A fixed value, or an upper bound the service draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Magnitude {
    Fixed(u32),
    Random { max: u32 },
}

/// Reactivation gap with its magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReactGap {
    None,
    /// Milliseconds.
    Time(Magnitude),
    /// Qualifying I/Os to skip.
    IoCount(Magnitude),
}

impl ReactGap {
    pub fn gap_type(&self) -> GapType {
        match self {
            ReactGap::None => GapType::None,
            ReactGap::Time(_) => GapType::Time,
            ReactGap::IoCount(_) => GapType::IoCount,
        }
    }

    pub fn is_random(&self) -> bool {
        matches!(
            self,
            ReactGap::Time(Magnitude::Random { .. }) | ReactGap::IoCount(Magnitude::Random { .. })
        )
    }

    pub fn msecs(&self) -> u32 {
        match self {
            ReactGap::Time(Magnitude::Fixed(v)) => *v,
            _ => 0,
        }
    }

    pub fn io_count(&self) -> u32 {
        match self {
            ReactGap::IoCount(Magnitude::Fixed(v)) => *v,
            _ => 0,
        }
    }

    pub fn max_rand_msecs(&self) -> u32 {
        match self {
            ReactGap::Time(Magnitude::Random { max }) => *max,
            _ => 0,
        }
    }

    pub fn max_rand_io_count(&self) -> u32 {
        match self {
            ReactGap::IoCount(Magnitude::Random { max }) => *max,
            _ => 0,
        }
    }
}

/// How many times a dormant rule may come back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reactivation {
    Fixed(u32),
    /// The service draws the budget from `0..=max` when the rule is added
    /// and keeps it in [`RuleCounters::reactivations_left`]; `max` is left
    /// as configured.
    Random { max: u32 },
}

impl Reactivation {
    pub fn count(self) -> u32 {
        match self {
            Reactivation::Fixed(n) | Reactivation::Random { max: n } => n,
        }
    }

    pub fn is_random(self) -> bool {
        matches!(self, Reactivation::Random { .. })
    }
}

/// Where in the I/O path the error is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InjectionPath {
    /// Let the I/O reach the drive, then replace its completion.
    #[default]
    Completion,
    /// Complete the I/O before it is sent.
    Send,
}

/// Runtime statistics owned by the injection service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleCounters {
    pub times_inserted: u32,
    pub times_reset: u32,
    pub is_active: bool,
    /// Reactivations still available.
    #[serde(default)]
    pub reactivations_left: u32,
}

// ── Rules ───────────────────────────────────────────────────────

/// A validated error rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRule {
    /// Assigned by the injection service; 0 until submitted.
    pub record_id: RecordId,
    pub target: Target,
    pub lba_start: Lba,
    pub lba_end: Lba,
    /// Opcode as the operator wrote it (canonical name, shortcut, number or `ANY`).
    pub opcode: String,
    /// Concrete operation codes the opcode resolved to.  `[0xFF]` means any.
    pub commands: Vec<u8>,
    pub payload: ErrorPayload,
    pub insert_limit: InsertLimit,
    /// Fire on every Nth qualifying I/O.
    pub frequency: u32,
    /// Fire on average once every `frequency` I/Os instead of exactly.
    pub is_random_frequency: bool,
    pub react_gap: ReactGap,
    pub reactivation: Reactivation,
    pub delay_io_msec: u32,
    pub injection_path: InjectionPath,
    pub counters: RuleCounters,
}

impl ErrorRule {
    pub fn error_type(&self) -> ErrorType {
        self.payload.error_type()
    }

    /// Same rule aimed at another drive.  The LBA window is kept and must be
    /// re-resolved against the new drive's layout.
    pub fn retarget(&self, target: Target) -> Self {
        Self {
            target,
            ..self.clone()
        }
    }

    /// True when both rules would configure identical injection behaviour.
    pub fn same_configuration(&self, other: &ErrorRule) -> bool {
        self.target == other.target
            && self.lba_start == other.lba_start
            && self.lba_end == other.lba_end
            && self.commands == other.commands
            && self.payload == other.payload
            && self.insert_limit == other.insert_limit
            && self.frequency == other.frequency
            && self.is_random_frequency == other.is_random_frequency
            && self.react_gap == other.react_gap
            && self.reactivation == other.reactivation
            && self.delay_io_msec == other.delay_io_msec
            && self.injection_path == other.injection_path
    }
}

impl fmt::Display for ErrorRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rule#{}({}, lba=[{:#x}..{:#x}], op={}, {})",
            self.record_id,
            self.target.fru,
            self.lba_start,
            self.lba_end,
            self.opcode,
            self.error_type()
        )
    }
}

/// A candidate rule as filled in by a front end.
///
/// Numeric fields are `Option`s: `None` records "the operator typed
/// something unparseable", which the validator replaces with the default.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDraft {
    pub target: Option<Target>,
    pub lba_start: Lba,
    pub lba_end: Lba,
    pub opcode: String,
    pub error_type: ErrorType,
    pub scsi_status: u8,
    pub sense: Option<SenseCode>,
    pub valid_lba: bool,
    pub deferred: bool,
    pub port_status: Option<PortStatus>,
    pub glitch_secs: u32,
    pub delay_io_msec: Option<u32>,
    pub insert_limit: Option<InsertLimit>,
    pub frequency: Option<u32>,
    pub is_random_frequency: bool,
    pub react_gap_type: GapType,
    pub react_gap_msecs: Option<u32>,
    pub react_gap_io_count: Option<u32>,
    pub is_random_gap: bool,
    pub max_rand_msecs: Option<u32>,
    pub max_rand_io_count: Option<u32>,
    pub num_reactivations: Option<u32>,
    pub is_random_reactivations: bool,
    pub injection_path: InjectionPath,
}

impl Default for RuleDraft {
    fn default() -> Self {
        Self {
            target: None,
            lba_start: 0,
            lba_end: ANY_RANGE,
            opcode: ANY_OPCODE.to_string(),
            error_type: ErrorType::Scsi,
            scsi_status: SCSI_STATUS_CHECK_CONDITION,
            sense: None,
            valid_lba: true,
            deferred: false,
            port_status: None,
            glitch_secs: 0,
            delay_io_msec: Some(0),
            insert_limit: Some(InsertLimit::Times(1)),
            frequency: Some(1),
            is_random_frequency: false,
            react_gap_type: GapType::None,
            react_gap_msecs: Some(0),
            react_gap_io_count: Some(0),
            is_random_gap: false,
            max_rand_msecs: Some(0),
            max_rand_io_count: Some(0),
            num_reactivations: Some(ALWAYS_REACTIVATE),
            is_random_reactivations: false,
            injection_path: InjectionPath::Completion,
        }
    }
}

impl RuleDraft {
    /// Draft for a spin-up rule: start/stop opcode, injected on send.
    pub fn spinup() -> Self {
        Self {
            opcode: STARTSTOP_OPCODE.to_string(),
            injection_path: InjectionPath::Send,
            ..Self::default()
        }
    }

    /// Select a SCSI error by packed code, keeping the given LBA flag.
    pub fn set_scsi_error(&mut self, packed: u32, valid_lba: bool) {
        self.sense = Some(SenseCode::from_packed(packed));
        self.valid_lba = valid_lba;
    }
}

/// Projection used to find existing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchParams {
    pub object_id: ObjectId,
    pub lba_start: Lba,
    pub lba_end: Lba,
    /// Restrict matches to one error type.
    pub error_type: Option<ErrorType>,
}

impl SearchParams {
    pub fn new(object_id: ObjectId) -> Self {
        Self {
            object_id,
            lba_start: 0,
            lba_end: ANY_RANGE,
            error_type: None,
        }
    }

    pub fn matches(&self, rule: &ErrorRule) -> bool {
        rule.target.object_id == self.object_id
            && rule.lba_start <= self.lba_end
            && self.lba_start <= rule.lba_end
            && self.error_type.map_or(true, |t| t == rule.error_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fru_parse_and_display() {
        let fru: Fru = "0_1_5".parse().unwrap();
        assert_eq!(fru, Fru::new(0, 1, 5));
        assert_eq!(fru.to_string(), "0_1_5");
    }

    #[test]
    fn fru_rejects_malformed() {
        assert!(matches!("0_1".parse::<Fru>(), Err(FruParseError::Malformed(_))));
        assert!(matches!("0_1_2_3".parse::<Fru>(), Err(FruParseError::Malformed(_))));
        assert!(matches!("a_b_c".parse::<Fru>(), Err(FruParseError::Malformed(_))));
    }

    #[test]
    fn fru_rejects_overlong_text() {
        let long = "0000000000_0000000_1";
        assert!(matches!(long.parse::<Fru>(), Err(FruParseError::TooLong(_))));
    }

    #[test]
    fn sense_code_packing() {
        let s = SenseCode::from_packed(0x031100);
        assert_eq!(s, SenseCode::new(0x03, 0x11, 0x00));
        assert_eq!(s.packed(), 0x031100);
        assert_eq!(s.to_string(), "3/11/0");
    }

    #[test]
    fn error_type_codes_round_trip() {
        for t in [
            ErrorType::None,
            ErrorType::Scsi,
            ErrorType::Port,
            ErrorType::Glitch,
            ErrorType::Fail,
        ] {
            assert_eq!(ErrorType::from_code(t.code().unwrap()), t);
        }
        assert_eq!(ErrorType::Invalid.code(), None);
        assert_eq!(ErrorType::from_code(99), ErrorType::Invalid);
    }

    #[test]
    fn error_type_keywords() {
        assert_eq!(ErrorType::from_keyword("SCSI"), Some(ErrorType::Scsi));
        assert_eq!(ErrorType::from_keyword("none"), Some(ErrorType::None));
        assert_eq!(ErrorType::from_keyword("glitch"), None);
    }

    #[test]
    fn insert_limit_raw() {
        assert_eq!(InsertLimit::from_raw(3), InsertLimit::Times(3));
        assert_eq!(InsertLimit::from_raw(INSERT_ALWAYS), InsertLimit::Always);
        assert_eq!(InsertLimit::Always.raw(), INSERT_ALWAYS);
        assert_eq!(InsertLimit::Always.to_string(), "always");
    }

    #[test]
    fn react_gap_accessors() {
        let gap = ReactGap::Time(Magnitude::Random { max: 500 });
        assert_eq!(gap.gap_type(), GapType::Time);
        assert!(gap.is_random());
        assert_eq!(gap.max_rand_msecs(), 500);
        assert_eq!(gap.msecs(), 0);
        assert_eq!(gap.io_count(), 0);

        let gap = ReactGap::IoCount(Magnitude::Fixed(20));
        assert!(!gap.is_random());
        assert_eq!(gap.io_count(), 20);
    }

    #[test]
    fn gap_keyword_unknown_is_invalid() {
        assert_eq!(GapType::from_keyword("time"), GapType::Time);
        assert_eq!(GapType::from_keyword("IO_COUNT"), GapType::IoCount);
        assert_eq!(GapType::from_keyword("seconds"), GapType::Invalid);
    }

    #[test]
    fn draft_defaults() {
        let d = RuleDraft::default();
        assert_eq!(d.opcode, "ANY");
        assert_eq!(d.error_type, ErrorType::Scsi);
        assert_eq!(d.lba_start, 0);
        assert_eq!(d.lba_end, ANY_RANGE);
        assert!(d.valid_lba);
        assert_eq!(d.insert_limit, Some(InsertLimit::Times(1)));
        assert_eq!(d.num_reactivations, Some(ALWAYS_REACTIVATE));
        assert_eq!(d.injection_path, InjectionPath::Completion);
    }

    #[test]
    fn spinup_draft() {
        let d = RuleDraft::spinup();
        assert_eq!(d.opcode, STARTSTOP_OPCODE);
        assert_eq!(d.injection_path, InjectionPath::Send);
    }

    #[test]
    fn search_matches_overlapping_window() {
        let rule = ErrorRule {
            record_id: 1,
            target: Target {
                fru: Fru::new(0, 0, 5),
                object_id: ObjectId(0x105),
            },
            lba_start: 0x100,
            lba_end: 0x200,
            opcode: "ANY".into(),
            commands: vec![0xFF],
            payload: ErrorPayload::None,
            insert_limit: InsertLimit::Times(1),
            frequency: 1,
            is_random_frequency: false,
            react_gap: ReactGap::None,
            reactivation: Reactivation::Fixed(0),
            delay_io_msec: 0,
            injection_path: InjectionPath::Completion,
            counters: RuleCounters::default(),
        };
        let mut params = SearchParams::new(ObjectId(0x105));
        assert!(params.matches(&rule));
        params.lba_start = 0x1F0;
        params.lba_end = 0x300;
        assert!(params.matches(&rule));
        params.lba_start = 0x201;
        assert!(!params.matches(&rule));
        let params = SearchParams {
            error_type: Some(ErrorType::Scsi),
            ..SearchParams::new(ObjectId(0x105))
        };
        assert!(!params.matches(&rule));
        assert!(!SearchParams::new(ObjectId(0x106)).matches(&rule));
    }
}
