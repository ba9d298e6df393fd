//! Named rule bundles.
//!
//! A scenario stamps out one rule per target drive from a fixed template.
//! Every target is attempted; failures are collected per drive instead of
//! aborting the batch.

use std::fmt;
use thiserror::Error;

use crate::rule::{
    ErrorType, InsertLimit, RuleDraft, Target, ANY_OPCODE, SCSI_STATUS_CHECK_CONDITION,
};
use crate::service::{InjectionService, RecordHandle, ServiceError, Topology};
use crate::validate::{RuleValidator, ValidationError};

/// Packed sense for an unrecovered read error.
const READ_MEDIA_ERROR: u32 = 0x031100;
/// Packed sense for a write positioning error.
const WRITE_MEDIA_ERROR: u32 = 0x031503;
/// Packed sense for a failure-prediction threshold.
const PFA_THRESHOLD: u32 = 0x015D00;

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("unknown scenario '{0}'")]
    Unknown(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// The built-in scenarios, in menu order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Delay every fifth I/O (on average) by one second, forever.
    SlowIo,
    /// Unrecovered media errors on reads, or on writes when the read rule is refused.
    RandomMediaError,
    /// A single failure-prediction sense, which triggers proactive sparing.
    ProactiveSpare,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [
        Scenario::SlowIo,
        Scenario::RandomMediaError,
        Scenario::ProactiveSpare,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::SlowIo => "SLOW_IO",
            Scenario::RandomMediaError => "RANDOM_MEDIA_ERROR",
            Scenario::ProactiveSpare => "PROACTIVE_SPARE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|s| s.name() == upper)
    }

    /// Menu selection, counted from 1.
    pub fn from_index(index: usize) -> Option<Self> {
        index.checked_sub(1).and_then(|i| Self::ALL.get(i).copied())
    }

    /// Drafts to try for one target, in order.  Later drafts are fallbacks
    /// used only when the service refuses the earlier ones.
    fn templates(self, target: Target) -> Vec<RuleDraft> {
        let base = RuleDraft {
            target: Some(target),
            lba_start: 0,
            lba_end: 0,
            ..RuleDraft::default()
        };
        match self {
            Scenario::SlowIo => vec![RuleDraft {
                opcode: ANY_OPCODE.to_string(),
                error_type: ErrorType::None,
                insert_limit: Some(InsertLimit::Always),
                frequency: Some(5),
                is_random_frequency: true,
                delay_io_msec: Some(1000),
                ..base
            }],
            Scenario::RandomMediaError => {
                let media = RuleDraft {
                    scsi_status: SCSI_STATUS_CHECK_CONDITION,
                    insert_limit: Some(InsertLimit::Always),
                    frequency: Some(5),
                    is_random_frequency: true,
                    ..base
                };
                let mut read = RuleDraft {
                    opcode: "READ".to_string(),
                    ..media.clone()
                };
                read.set_scsi_error(READ_MEDIA_ERROR, true);
                let mut write = RuleDraft {
                    opcode: "WRITE".to_string(),
                    ..media
                };
                write.set_scsi_error(WRITE_MEDIA_ERROR, true);
                vec![read, write]
            }
            Scenario::ProactiveSpare => {
                let mut draft = base;
                draft.set_scsi_error(PFA_THRESHOLD, true);
                vec![draft]
            }
        }
    }

    /// Instantiate the scenario on every target.
    pub fn apply(
        self,
        targets: &[Target],
        service: &mut dyn InjectionService,
        topology: &dyn Topology,
    ) -> Result<ScenarioReport, ScenarioError> {
        let validator = RuleValidator::new(topology);
        let mut report = ScenarioReport::default();

        for &target in targets {
            match self.apply_one(target, service, &validator) {
                Ok(handle) => {
                    log::info!("scenario {} added on {}", self.name(), target.fru);
                    report.added.push((target, handle));
                }
                Err(ScenarioError::Service(e)) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    log::warn!("scenario {} failed on {}: {}", self.name(), target.fru, e);
                    report.failed.push((target, e));
                }
            }
        }
        Ok(report)
    }

    fn apply_one(
        self,
        target: Target,
        service: &mut dyn InjectionService,
        validator: &RuleValidator<'_>,
    ) -> Result<RecordHandle, ScenarioError> {
        let mut last = ScenarioError::Unknown(self.name().to_string());
        for draft in self.templates(target) {
            let rule = validator.validate(&draft)?;
            match service.add_record(&rule) {
                Ok(handle) => return Ok(handle),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    log::debug!("{} template refused on {}: {}", self.name(), target.fru, e);
                    last = e.into();
                }
            }
        }
        Err(last)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-drive outcome of applying a scenario.
#[derive(Debug, Default)]
pub struct ScenarioReport {
    pub added: Vec<(Target, RecordHandle)>,
    pub failed: Vec<(Target, ScenarioError)>,
}

impl ScenarioReport {
    pub fn all_added(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Look a scenario up by name and apply it.
pub fn apply_scenario(
    name: &str,
    targets: &[Target],
    service: &mut dyn InjectionService,
    topology: &dyn Topology,
) -> Result<ScenarioReport, ScenarioError> {
    let scenario =
        Scenario::from_name(name).ok_or_else(|| ScenarioError::Unknown(name.to_string()))?;
    scenario.apply(targets, service, topology)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{ErrorPayload, SenseCode};
    use crate::service::collect_records;
    use crate::sim::{SimulatedService, SimulatedTopology};

    fn targets(topo: &SimulatedTopology, slots: &[u32]) -> Vec<Target> {
        slots
            .iter()
            .map(|s| topo.resolve_target(&format!("0_0_{s}")).unwrap())
            .collect()
    }

    #[test]
    fn names_and_indices() {
        assert_eq!(Scenario::from_name("slow_io"), Some(Scenario::SlowIo));
        assert_eq!(Scenario::from_index(2), Some(Scenario::RandomMediaError));
        assert_eq!(Scenario::from_index(0), None);
        assert_eq!(Scenario::from_index(4), None);
        assert_eq!(Scenario::ProactiveSpare.to_string(), "PROACTIVE_SPARE");
    }

    #[test]
    fn slow_io_on_two_drives() {
        let topo = SimulatedTopology::default();
        let mut svc = SimulatedService::new(1);
        let report = apply_scenario("SLOW_IO", &targets(&topo, &[1, 2]), &mut svc, &topo).unwrap();
        assert!(report.all_added());

        let rules = collect_records(&svc).unwrap();
        assert_eq!(rules.len(), 2);
        for (_, rule) in rules {
            assert_eq!(rule.payload, ErrorPayload::None);
            assert_eq!(rule.frequency, 5);
            assert!(rule.is_random_frequency);
            assert_eq!(rule.delay_io_msec, 1000);
            assert_eq!(rule.insert_limit, InsertLimit::Always);
            assert_eq!((rule.lba_start, rule.lba_end), (0x10000, 0x1000_0000));
        }
    }

    #[test]
    fn media_error_falls_back_to_write() {
        let topo = SimulatedTopology::default();
        let mut svc = SimulatedService::new(1);
        let drives = targets(&topo, &[3]);
        apply_scenario("random_media_error", &drives, &mut svc, &topo).unwrap();
        apply_scenario("random_media_error", &drives, &mut svc, &topo).unwrap();

        let rules = collect_records(&svc).unwrap();
        assert_eq!(rules.len(), 2);
        let senses: Vec<_> = rules
            .iter()
            .map(|(_, r)| match r.payload {
                ErrorPayload::Scsi(e) => e.sense,
                _ => panic!("expected scsi payload"),
            })
            .collect();
        assert_eq!(senses[0], SenseCode::new(0x03, 0x11, 0x00));
        assert_eq!(senses[1], SenseCode::new(0x03, 0x15, 0x03));
        assert_eq!(rules[0].1.opcode, "READ");
        assert_eq!(rules[1].1.opcode, "WRITE");
    }

    #[test]
    fn media_error_exhausted_reports_failure() {
        let topo = SimulatedTopology::default();
        let mut svc = SimulatedService::new(1);
        let drives = targets(&topo, &[3]);
        for _ in 0..2 {
            apply_scenario("random_media_error", &drives, &mut svc, &topo).unwrap();
        }
        let report = apply_scenario("random_media_error", &drives, &mut svc, &topo).unwrap();
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(
            report.failed[0].1,
            ScenarioError::Service(ServiceError::AlreadyExists)
        ));
    }

    #[test]
    fn proactive_spare_sense() {
        let topo = SimulatedTopology::default();
        let mut svc = SimulatedService::new(1);
        apply_scenario("PROACTIVE_SPARE", &targets(&topo, &[0]), &mut svc, &topo).unwrap();
        let (_, rule) = collect_records(&svc).unwrap().remove(0);
        match rule.payload {
            ErrorPayload::Scsi(e) => assert_eq!(e.sense.packed(), PFA_THRESHOLD),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn unknown_scenario() {
        let topo = SimulatedTopology::default();
        let mut svc = SimulatedService::new(1);
        let result = apply_scenario("meteor_strike", &[], &mut svc, &topo);
        assert!(matches!(result, Err(ScenarioError::Unknown(_))));
    }

    #[test]
    fn uninitialized_service_aborts() {
        let topo = SimulatedTopology::default();
        let mut svc = SimulatedService::uninitialized();
        let result = apply_scenario("SLOW_IO", &targets(&topo, &[1, 2]), &mut svc, &topo);
        assert!(matches!(
            result,
            Err(ScenarioError::Service(ServiceError::NotInitialized))
        ));
    }
}
