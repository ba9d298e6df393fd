//! Rule validation and normalization.
//!
//! Validation is strict about identity and error type, and permissive about
//! everything that has a sensible default: unparseable counts, delays and
//! reactivation fields fall back to their defaults, unknown opcodes fall back
//! to `ANY`, and missing or inverted LBA windows are widened to the drive's
//! user space.

use thiserror::Error;

use crate::lookup::{resolve_opcodes, ANY_OPCODE_CODE};
use crate::rule::{
    ErrorPayload, ErrorRule, ErrorType, GapType, InsertLimit, Lba, Magnitude, ObjectId,
    ReactGap, Reactivation, RuleCounters, RuleDraft, ScsiError, SearchParams, ANY_OPCODE,
    ANY_RANGE, DEFAULT_GLITCH_SECS, STARTSTOP_OPCODE,
};
use crate::service::{Topology, TopologyError};

/// Why a candidate rule was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no target drive")]
    MissingTarget,

    #[error("invalid error type")]
    InvalidErrorType,

    #[error("scsi error type selected but no sense code given")]
    MissingScsiError,

    #[error("port error type selected but no port status given")]
    MissingPortError,

    #[error("invalid reactivation gap type")]
    InvalidReactGap,

    #[error("drive {0} reports no user space")]
    NoUserSpace(ObjectId),

    #[error("LBA range [{start:#x}..{end:#x}] does not resolve on drive {object_id}")]
    WholeRange {
        object_id: ObjectId,
        start: Lba,
        end: Lba,
    },

    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// Outcome of fitting an LBA window to a drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LbaAssignment {
    /// The window is a concrete range on the drive.
    Resolved,
    /// Even after defaulting, the window is still "whole range" or inverted.
    /// Callers treat this as a soft failure.
    WholeRange,
}

/// Validates drafts against a drive topology.
pub struct RuleValidator<'a> {
    topology: &'a dyn Topology,
}

impl<'a> RuleValidator<'a> {
    pub fn new(topology: &'a dyn Topology) -> Self {
        Self { topology }
    }

    /// Full validation: [`normalize`](Self::normalize) and then fit the LBA
    /// window.  A window that stays unresolved is an error here.
    pub fn validate(&self, draft: &RuleDraft) -> Result<ErrorRule, ValidationError> {
        let mut rule = self.normalize(draft)?;
        match self.assign_lba_range(&mut rule)? {
            LbaAssignment::Resolved => Ok(rule),
            LbaAssignment::WholeRange => Err(ValidationError::WholeRange {
                object_id: rule.target.object_id,
                start: rule.lba_start,
                end: rule.lba_end,
            }),
        }
    }

    /// Check identity and type fields and fill in defaults.
    ///
    /// The LBA window is copied as-is; multi-drive callers fit it per drive
    /// with [`assign_lba_range`](Self::assign_lba_range).
    pub fn normalize(&self, draft: &RuleDraft) -> Result<ErrorRule, ValidationError> {
        let target = draft.target.ok_or(ValidationError::MissingTarget)?;

        let payload = match draft.error_type {
            ErrorType::Invalid => return Err(ValidationError::InvalidErrorType),
            ErrorType::None => ErrorPayload::None,
            ErrorType::Scsi => {
                let sense = draft.sense.ok_or(ValidationError::MissingScsiError)?;
                ErrorPayload::Scsi(ScsiError {
                    status: draft.scsi_status,
                    sense,
                    valid_lba: draft.valid_lba,
                    deferred: draft.deferred,
                })
            }
            ErrorType::Port => {
                let status = draft.port_status.ok_or(ValidationError::MissingPortError)?;
                ErrorPayload::Port(status)
            }
            ErrorType::Glitch => {
                let secs = if draft.glitch_secs == 0 {
                    DEFAULT_GLITCH_SECS
                } else {
                    draft.glitch_secs
                };
                ErrorPayload::Glitch { secs }
            }
            ErrorType::Fail => ErrorPayload::Fail,
        };

        let react_gap = match draft.react_gap_type {
            GapType::Invalid => return Err(ValidationError::InvalidReactGap),
            GapType::None => ReactGap::None,
            GapType::Time => ReactGap::Time(magnitude(
                draft.is_random_gap,
                draft.react_gap_msecs,
                draft.max_rand_msecs,
            )),
            GapType::IoCount => ReactGap::IoCount(magnitude(
                draft.is_random_gap,
                draft.react_gap_io_count,
                draft.max_rand_io_count,
            )),
        };

        let reactivations = draft.num_reactivations.unwrap_or(0);
        let reactivation = if draft.is_random_reactivations {
            Reactivation::Random { max: reactivations }
        } else {
            Reactivation::Fixed(reactivations)
        };

        let insert_limit = match draft.insert_limit {
            Some(InsertLimit::Times(0)) | None => InsertLimit::Times(1),
            Some(limit) => limit,
        };

        let frequency = match draft.frequency {
            Some(0) | None => 1,
            Some(f) => f,
        };

        let (opcode, commands) = resolve_rule_opcode(&draft.opcode);

        Ok(ErrorRule {
            record_id: 0,
            target,
            lba_start: draft.lba_start,
            lba_end: draft.lba_end,
            opcode,
            commands,
            payload,
            insert_limit,
            frequency,
            is_random_frequency: draft.is_random_frequency,
            react_gap,
            reactivation,
            delay_io_msec: draft.delay_io_msec.unwrap_or(0),
            injection_path: draft.injection_path,
            counters: RuleCounters::default(),
        })
    }

    /// Fit a rule's LBA window to its drive's layout.
    pub fn assign_lba_range(&self, rule: &mut ErrorRule) -> Result<LbaAssignment, ValidationError> {
        let (start, end, outcome) =
            self.fit_window(rule.target.object_id, rule.lba_start, rule.lba_end)?;
        rule.lba_start = start;
        rule.lba_end = end;
        Ok(outcome)
    }

    /// Same as [`assign_lba_range`](Self::assign_lba_range) for search parameters.
    pub fn assign_search_range(
        &self,
        params: &mut SearchParams,
    ) -> Result<LbaAssignment, ValidationError> {
        let (start, end, outcome) =
            self.fit_window(params.object_id, params.lba_start, params.lba_end)?;
        params.lba_start = start;
        params.lba_end = end;
        Ok(outcome)
    }

    fn fit_window(
        &self,
        object_id: ObjectId,
        mut start: Lba,
        mut end: Lba,
    ) -> Result<(Lba, Lba, LbaAssignment), ValidationError> {
        let layout = self.topology.physical_layout(object_id)?;
        if layout.end_of_user_space == ANY_RANGE {
            return Err(ValidationError::NoUserSpace(object_id));
        }

        if start == 0 || start > layout.end_of_drive {
            start = layout.start_of_user_space;
        }
        if end == 0 || end > layout.end_of_drive {
            end = layout.end_of_user_space;
        }
        if (start == 0 && end == 0) || start > end {
            start = layout.start_of_user_space;
            end = layout.end_of_user_space;
        }

        let outcome = if window_unresolved(start, end) {
            log::debug!(
                "LBA window [{:#x}..{:#x}] on {} stays unresolved",
                start,
                end,
                object_id
            );
            LbaAssignment::WholeRange
        } else {
            LbaAssignment::Resolved
        };
        Ok((start, end, outcome))
    }
}

/// True when a window still means "whole range" rather than concrete blocks.
pub fn window_unresolved(start: Lba, end: Lba) -> bool {
    (start == 0 && end == 0) || start > end || start == ANY_RANGE
}

fn magnitude(random: bool, fixed: Option<u32>, max: Option<u32>) -> Magnitude {
    if random {
        Magnitude::Random {
            max: max.unwrap_or(0),
        }
    } else {
        Magnitude::Fixed(fixed.unwrap_or(0))
    }
}

fn resolve_rule_opcode(opcode: &str) -> (String, Vec<u8>) {
    let upper = opcode.trim().to_ascii_uppercase();
    match resolve_opcodes(&upper) {
        Ok(commands) => (upper, commands),
        Err(e) if upper != STARTSTOP_OPCODE => {
            log::warn!("{}; matching any opcode instead", e);
            (ANY_OPCODE.to_string(), vec![ANY_OPCODE_CODE])
        }
        Err(_) => (upper, Vec::new()),
    }
}
