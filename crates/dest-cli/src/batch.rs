//! Batch flag grammar for `add`, `add_spinup`, `fail` and `glitch`.
//!
//! Flags are scanned left to right; each consumes a fixed number of value
//! tokens.  Numeric values that do not parse are stored as `None` and
//! defaulted later by the validator.

use thiserror::Error;

use dest_core::lookup::{port_error_lookup, scsi_error_lookup};
use dest_core::number::{parse_u32, parse_u64};
use dest_core::rule::{
    ErrorType, GapType, InsertLimit, RuleDraft, ANY_RANGE, MAX_FRUS_PER_RECORD,
    STARTSTOP_OPCODE,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("missing option for argument {flag}")]
    MissingValue { flag: String },

    #[error("invalid argument: {flag} {value}")]
    InvalidArgument { flag: String, value: String },

    #[error("invalid argument: {0}")]
    UnknownFlag(String),

    #[error("{first} cannot be combined with {second}")]
    Conflict { first: String, second: String },

    #[error("required drive argument not set")]
    MissingDrive,

    #[error("at most {MAX_FRUS_PER_RECORD} drives may be given")]
    TooManyDrives,
}

/// A parsed batch command: the rule template and the drives to apply it to.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub draft: RuleDraft,
    /// Drive locations as typed; resolved by the caller.
    pub drives: Vec<String>,
}

fn value<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    flag: &str,
) -> Result<&'a str, BatchError> {
    tokens.next().ok_or_else(|| BatchError::MissingValue {
        flag: flag.to_string(),
    })
}

fn invalid(flag: &str, value: &str) -> BatchError {
    BatchError::InvalidArgument {
        flag: flag.to_string(),
        value: value.to_string(),
    }
}

/// Split a `-d` value into drive locations.
pub fn split_drives(list: &str) -> Result<Vec<String>, BatchError> {
    let drives: Vec<String> = list
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect();
    if drives.len() > MAX_FRUS_PER_RECORD {
        return Err(BatchError::TooManyDrives);
    }
    Ok(drives)
}

/// Parse batch flags on top of `base`.
pub fn parse_rule_args(args: &[&str], base: RuleDraft) -> Result<BatchRequest, BatchError> {
    let mut draft = base;
    let mut drives = Vec::new();
    let mut named_error: Option<&str> = None;
    let mut sense_detail: Option<&str> = None;
    let mut tokens = args.iter().copied();

    while let Some(flag) = tokens.next() {
        match flag {
            "-d" => {
                drives.extend(split_drives(value(&mut tokens, flag)?)?);
                if drives.len() > MAX_FRUS_PER_RECORD {
                    return Err(BatchError::TooManyDrives);
                }
            }
            "-lr" => {
                let start = value(&mut tokens, flag)?;
                let end = value(&mut tokens, flag)?;
                draft.lba_start = parse_u64(start).unwrap_or(ANY_RANGE);
                draft.lba_end = parse_u64(end).unwrap_or(ANY_RANGE);
            }
            "-oc" => {
                let opcode = value(&mut tokens, flag)?;
                if draft.opcode != STARTSTOP_OPCODE {
                    draft.opcode = opcode.to_ascii_uppercase();
                }
            }
            "-et" => {
                let word = value(&mut tokens, flag)?;
                draft.error_type =
                    ErrorType::from_keyword(word).ok_or_else(|| invalid(flag, word))?;
            }
            "-serr" => {
                let name = value(&mut tokens, flag)?;
                let entry = scsi_error_lookup(name).map_err(|_| invalid(flag, name))?;
                draft.set_scsi_error(entry.code, entry.valid_lba);
                named_error = Some(flag);
            }
            "-sk" => {
                let text = value(&mut tokens, flag)?;
                let digits = text
                    .strip_prefix("0x")
                    .or_else(|| text.strip_prefix("0X"))
                    .unwrap_or(text);
                let packed = u32::from_str_radix(digits, 16).map_err(|_| invalid(flag, text))?;
                let valid_lba = draft.valid_lba;
                draft.set_scsi_error(packed, valid_lba);
                sense_detail = Some(flag);
            }
            "-ilba" => {
                draft.valid_lba = false;
                sense_detail = Some(flag);
            }
            "-def" => {
                draft.deferred = true;
                sense_detail = Some(flag);
            }
            "-perr" => {
                let text = value(&mut tokens, flag)?;
                draft.port_status = match port_error_lookup(text) {
                    Ok(status) => Some(status),
                    Err(e) => {
                        log::warn!("{}", e);
                        None
                    }
                };
            }
            "-delay" => draft.delay_io_msec = parse_u32(value(&mut tokens, flag)?),
            "-num" => {
                draft.insert_limit = parse_u32(value(&mut tokens, flag)?).map(InsertLimit::from_raw)
            }
            "-freq" => {
                draft.frequency = parse_u32(value(&mut tokens, flag)?);
                draft.is_random_frequency = false;
            }
            "-rfreq" => {
                draft.frequency = parse_u32(value(&mut tokens, flag)?);
                draft.is_random_frequency = true;
            }
            "-react_gap" | "-react_rgap" => {
                let kind = GapType::from_keyword(value(&mut tokens, flag)?);
                let amount = parse_u32(value(&mut tokens, flag)?);
                let random = flag == "-react_rgap";
                draft.react_gap_type = kind;
                draft.is_random_gap = random;
                match (kind, random) {
                    (GapType::Time, false) => draft.react_gap_msecs = amount,
                    (GapType::Time, true) => draft.max_rand_msecs = amount,
                    (GapType::IoCount, false) => draft.react_gap_io_count = amount,
                    (GapType::IoCount, true) => draft.max_rand_io_count = amount,
                    _ => {}
                }
            }
            "-n_react" | "-n_rreact" => {
                draft.num_reactivations = parse_u32(value(&mut tokens, flag)?);
                draft.is_random_reactivations = flag == "-n_rreact";
            }
            "-time" if draft.error_type == ErrorType::Glitch => {
                draft.glitch_secs = parse_u32(value(&mut tokens, flag)?).unwrap_or(0);
            }
            other => return Err(BatchError::UnknownFlag(other.to_string())),
        }

        if let (Some(first), Some(second)) = (named_error, sense_detail) {
            return Err(BatchError::Conflict {
                first: first.to_string(),
                second: second.to_string(),
            });
        }
    }

    if drives.is_empty() {
        return Err(BatchError::MissingDrive);
    }
    Ok(BatchRequest { draft, drives })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dest_core::rule::{InjectionPath, PortStatus, SenseCode, ALWAYS_REACTIVATE};

    fn parse(line: &str) -> Result<BatchRequest, BatchError> {
        let args: Vec<&str> = line.split_whitespace().collect();
        parse_rule_args(&args, RuleDraft::default())
    }

    #[test]
    fn scsi_sense_with_defaults() {
        let req = parse("-d 0_0_5 -oc READ -et scsi -sk 0x031100").unwrap();
        assert_eq!(req.drives, vec!["0_0_5"]);
        let d = req.draft;
        assert_eq!(d.sense, Some(SenseCode::new(0x03, 0x11, 0x00)));
        assert!(d.valid_lba);
        assert!(!d.deferred);
        assert_eq!(d.opcode, "READ");
        assert_eq!(d.error_type, ErrorType::Scsi);
        assert_eq!(d.insert_limit, Some(InsertLimit::Times(1)));
        assert_eq!(d.frequency, Some(1));
        assert!(!d.is_random_frequency);
        assert_eq!(d.react_gap_type, GapType::None);
        assert_eq!(d.num_reactivations, Some(ALWAYS_REACTIVATE));
    }

    #[test]
    fn short_lba_range_names_flag() {
        assert_eq!(
            parse("-d 0_0_5 -lr 10"),
            Err(BatchError::MissingValue { flag: "-lr".into() })
        );
    }

    #[test]
    fn drive_is_required_after_full_scan() {
        assert_eq!(parse("-oc READ -sk 0x031100"), Err(BatchError::MissingDrive));
        assert_eq!(
            parse("-oc READ -bogus 1"),
            Err(BatchError::UnknownFlag("-bogus".into()))
        );
    }

    #[test]
    fn drive_list() {
        let req = parse("-d 0_0_1,0_0_2,").unwrap();
        assert_eq!(req.drives, vec!["0_0_1", "0_0_2"]);
        let req = parse("-d 0_0_1,0_0_2 -d 0_0_3").unwrap();
        assert_eq!(req.drives.len(), 3);
        let many: Vec<String> = (0..17).map(|s| format!("0_0_{s}")).collect();
        let line = format!("-d {}", many.join(","));
        assert_eq!(parse(&line), Err(BatchError::TooManyDrives));
    }

    #[test]
    fn named_error_excludes_sense_details() {
        let req = parse("-d 0_0_5 -serr FBE_SCSI_CC_MEDIA_ERR_CANT_REMAP").unwrap();
        assert_eq!(req.draft.sense, Some(SenseCode::new(0x03, 0x11, 0x00)));
        assert!(!req.draft.valid_lba);

        assert_eq!(
            parse("-d 0_0_5 -serr FBE_SCSI_CC_HARD_BAD_BLOCK -def"),
            Err(BatchError::Conflict {
                first: "-serr".into(),
                second: "-def".into()
            })
        );
        assert!(matches!(
            parse("-d 0_0_5 -ilba -serr FBE_SCSI_CC_HARD_BAD_BLOCK"),
            Err(BatchError::Conflict { .. })
        ));
        assert!(matches!(
            parse("-d 0_0_5 -serr NOT_AN_ERROR"),
            Err(BatchError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn port_error_and_policy_flags() {
        let req = parse(
            "-d 0_0_5 -et port -perr SCSI_SELECTIONTIMEOUT -delay 20 -num 3 -rfreq 8 \
             -react_rgap time 500 -n_rreact 4",
        )
        .unwrap();
        let d = req.draft;
        assert_eq!(d.error_type, ErrorType::Port);
        assert_eq!(d.port_status, Some(PortStatus::SELECTION_TIMEOUT));
        assert_eq!(d.delay_io_msec, Some(20));
        assert_eq!(d.insert_limit, Some(InsertLimit::Times(3)));
        assert_eq!(d.frequency, Some(8));
        assert!(d.is_random_frequency);
        assert_eq!(d.react_gap_type, GapType::Time);
        assert!(d.is_random_gap);
        assert_eq!(d.max_rand_msecs, Some(500));
        assert_eq!(d.num_reactivations, Some(4));
        assert!(d.is_random_reactivations);
    }

    #[test]
    fn unparseable_numbers_become_defaults_later() {
        let d = parse("-d 0_0_5 -freq x -num y -delay z -react_gap io_count 0x10")
            .unwrap()
            .draft;
        assert_eq!(d.frequency, None);
        assert_eq!(d.insert_limit, None);
        assert_eq!(d.delay_io_msec, None);
        assert_eq!(d.react_gap_io_count, Some(16));
        assert!(!d.is_random_gap);
    }

    #[test]
    fn unknown_port_error_leaves_status_unset() {
        let d = parse("-d 0_0_5 -et port -perr NOPE").unwrap().draft;
        assert_eq!(d.port_status, None);
    }

    #[test]
    fn bad_error_type_keyword() {
        assert!(matches!(
            parse("-d 0_0_5 -et glitch"),
            Err(BatchError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn spinup_keeps_startstop_opcode() {
        let args = ["-d", "0_0_5", "-oc", "READ"];
        let req = parse_rule_args(&args, RuleDraft::spinup()).unwrap();
        assert_eq!(req.draft.opcode, STARTSTOP_OPCODE);
        assert_eq!(req.draft.injection_path, InjectionPath::Send);
    }

    #[test]
    fn glitch_time_only_for_glitch() {
        let base = RuleDraft {
            error_type: ErrorType::Glitch,
            ..RuleDraft::default()
        };
        let req = parse_rule_args(&["-d", "0_0_5", "-time", "30"], base).unwrap();
        assert_eq!(req.draft.glitch_secs, 30);
        assert_eq!(
            parse("-d 0_0_5 -time 30"),
            Err(BatchError::UnknownFlag("-time".into()))
        );
    }
}
