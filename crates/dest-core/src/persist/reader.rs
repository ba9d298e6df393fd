//! Loading rules from a configuration document.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::tokenizer::{tokenize, SaxHandler};
use super::{lookup_tag, LoadError, LoadReport, Tag, MAX_TAG_TEXT, RECORD_TAG};
use crate::number::{parse_u32, parse_u64};
use crate::rule::{
    ErrorType, GapType, InjectionPath, InsertLimit, PortStatus, RuleDraft, SenseCode,
    SCSI_STATUS_CHECK_CONDITION,
};
use crate::service::{InjectionService, Topology};
use crate::validate::RuleValidator;

/// State for the record currently being parsed.
struct ParseContext {
    /// Element depth of the record tag itself.
    depth: usize,
    draft: RuleDraft,
    fru_text: String,
    /// Raw `<Error>` value, interpreted once the error type is known.
    error_code: Option<u32>,
    /// First reason this record cannot be submitted.
    problem: Option<String>,
}

impl ParseContext {
    fn new(depth: usize) -> Self {
        Self {
            depth,
            draft: RuleDraft {
                lba_start: 0,
                lba_end: 0,
                ..RuleDraft::default()
            },
            fru_text: String::new(),
            error_code: None,
            problem: None,
        }
    }

    fn apply(&mut self, tag: Tag, text: &str) {
        let text = text.trim();
        let d = &mut self.draft;
        let flag = || parse_u32(text).map_or(false, |v| v != 0);
        match tag {
            Tag::Drive => self.fru_text = text.to_string(),
            Tag::LbaStart => d.lba_start = parse_u64(text).unwrap_or(0),
            Tag::LbaEnd => d.lba_end = parse_u64(text).unwrap_or(0),
            Tag::Opcode => d.opcode = text.to_string(),
            Tag::ErrorType => {
                d.error_type = parse_u32(text).map_or(ErrorType::Invalid, ErrorType::from_code)
            }
            Tag::Error => self.error_code = parse_u32(text),
            Tag::ScsiStatus => {
                d.scsi_status = parse_u32(text)
                    .and_then(|v| u8::try_from(v).ok())
                    .unwrap_or(SCSI_STATUS_CHECK_CONDITION)
            }
            Tag::ValidLba => d.valid_lba = flag(),
            Tag::Deferred => d.deferred = flag(),
            Tag::NumInsert => d.insert_limit = parse_u32(text).map(InsertLimit::from_raw),
            Tag::Frequency => d.frequency = parse_u32(text),
            Tag::RandomFrequency => d.is_random_frequency = flag(),
            Tag::ReactGapType => {
                d.react_gap_type = parse_u32(text).map_or(GapType::Invalid, GapType::from_code)
            }
            Tag::ReactGapMsecs => d.react_gap_msecs = parse_u32(text),
            Tag::ReactGapIoCount => d.react_gap_io_count = parse_u32(text),
            Tag::RandomGap => d.is_random_gap = flag(),
            Tag::MaxRandMsecs => d.max_rand_msecs = parse_u32(text),
            Tag::MaxRandIoCount => d.max_rand_io_count = parse_u32(text),
            Tag::NumReactivate => d.num_reactivations = parse_u32(text),
            Tag::RandomReactivate => d.is_random_reactivations = flag(),
            Tag::DelayMsec => d.delay_io_msec = parse_u32(text),
            Tag::GlitchTime => d.glitch_secs = parse_u32(text).unwrap_or(0),
            Tag::InjectOnSend => {
                d.injection_path = if flag() {
                    InjectionPath::Send
                } else {
                    InjectionPath::Completion
                }
            }
        }
    }
}

/// SAX handler that validates and submits each `<ErrorRule>` as it closes.
///
/// One loader serves one document; create a fresh one per parse.
pub struct RuleLoader<'a> {
    service: &'a mut dyn InjectionService,
    topology: &'a dyn Topology,
    depth: usize,
    accepting: Option<Tag>,
    buffer: String,
    overflowed: bool,
    context: Option<ParseContext>,
    report: LoadReport,
}

impl<'a> RuleLoader<'a> {
    pub fn new(service: &'a mut dyn InjectionService, topology: &'a dyn Topology) -> Self {
        Self {
            service,
            topology,
            depth: 0,
            accepting: None,
            buffer: String::new(),
            overflowed: false,
            context: None,
            report: LoadReport::default(),
        }
    }

    pub fn report(&self) -> LoadReport {
        self.report
    }

    fn skip(&mut self, reason: &str) {
        log::warn!("skipping record: {}", reason);
        self.report.skipped += 1;
    }

    fn finish_record(&mut self, ctx: ParseContext) -> Result<(), LoadError> {
        if let Some(problem) = ctx.problem {
            self.skip(&problem);
            return Ok(());
        }

        let mut draft = ctx.draft;
        match self.topology.resolve_target(&ctx.fru_text) {
            Ok(target) => draft.target = Some(target),
            Err(e) => {
                self.skip(&format!("drive '{}': {}", ctx.fru_text, e));
                return Ok(());
            }
        }
        match draft.error_type {
            ErrorType::Scsi => draft.sense = ctx.error_code.map(SenseCode::from_packed),
            ErrorType::Port => draft.port_status = ctx.error_code.map(PortStatus),
            _ => {}
        }

        let rule = match RuleValidator::new(self.topology).validate(&draft) {
            Ok(rule) => rule,
            Err(e) => {
                self.skip(&e.to_string());
                return Ok(());
            }
        };
        match self.service.add_record(&rule) {
            Ok(_) => {
                log::info!("loaded {}", rule);
                self.report.loaded += 1;
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                self.skip(&e.to_string());
                Ok(())
            }
        }
    }
}

impl SaxHandler for RuleLoader<'_> {
    fn start_tag(&mut self, name: &str) -> Result<(), LoadError> {
        self.depth += 1;
        if name == RECORD_TAG {
            if self.context.is_some() {
                self.skip("record opened before the previous one closed");
            }
            self.context = Some(ParseContext::new(self.depth));
            self.accepting = None;
            return Ok(());
        }
        self.accepting = lookup_tag(name);
        self.buffer.clear();
        self.overflowed = false;
        Ok(())
    }

    fn character_data(&mut self, text: &str) -> Result<(), LoadError> {
        if self.accepting.is_none() {
            return Ok(());
        }
        if self.buffer.len() + text.len() > MAX_TAG_TEXT {
            self.overflowed = true;
        } else {
            self.buffer.push_str(text);
        }
        Ok(())
    }

    fn end_tag(&mut self, name: &str) -> Result<(), LoadError> {
        let depth = self.depth;
        self.depth = self.depth.saturating_sub(1);

        if name == RECORD_TAG {
            self.accepting = None;
            return match self.context.take() {
                Some(ctx) if ctx.depth == depth => self.finish_record(ctx),
                other => {
                    self.context = other;
                    Ok(())
                }
            };
        }

        let tag = match self.accepting.take() {
            Some(tag) if lookup_tag(name) == Some(tag) => tag,
            _ => return Ok(()),
        };
        let overflowed = self.overflowed;
        let text = std::mem::take(&mut self.buffer);
        if let Some(ctx) = self.context.as_mut() {
            if depth != ctx.depth + 1 {
                return Ok(());
            }
            if overflowed {
                ctx.problem.get_or_insert_with(|| {
                    format!("<{}> text exceeds {} bytes", name, MAX_TAG_TEXT)
                });
            } else {
                ctx.apply(tag, &text);
            }
        }
        Ok(())
    }
}

/// Load every record in `reader`, submitting each valid one to `service`.
///
/// Records that fail validation or that the service refuses are skipped and
/// counted.  Malformed XML or an unreachable service aborts the load; records
/// submitted before that point are kept.
pub fn load_rules<R: BufRead>(
    reader: R,
    service: &mut dyn InjectionService,
    topology: &dyn Topology,
) -> Result<LoadReport, LoadError> {
    let mut loader = RuleLoader::new(service, topology);
    tokenize(reader, &mut loader)?;
    let report = loader.report();
    log::info!(
        "load complete: {} record(s) loaded, {} skipped",
        report.loaded,
        report.skipped
    );
    Ok(report)
}

pub fn load_from_path(
    path: &Path,
    service: &mut dyn InjectionService,
    topology: &dyn Topology,
) -> Result<LoadReport, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    load_rules(BufReader::new(file), service, topology)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::HEADER;
    use crate::rule::{ErrorPayload, Magnitude, ReactGap, Reactivation};
    use crate::service::{collect_records, ServiceError};
    use crate::sim::{SimulatedService, SimulatedTopology};
    use std::io::Cursor;

    fn record(fields: &str) -> String {
        format!("  <ErrorRule>\n{}  </ErrorRule>\n", fields)
    }

    fn doc(records: &[String]) -> String {
        format!("{}{}</DESTConfig>\n", HEADER, records.concat())
    }

    fn load(text: &str, svc: &mut SimulatedService) -> Result<LoadReport, LoadError> {
        let topo = SimulatedTopology::default();
        load_rules(Cursor::new(text), svc, &topo)
    }

    const SCSI_FIELDS: &str = "    <Drive>0_0_5</Drive>\n\
        <LbaStart>0x20000</LbaStart>\n\
        <LbaEnd>0x20100</LbaEnd>\n\
        <Opcode>READ</Opcode>\n\
        <ErrorType>0x1</ErrorType>\n\
        <Error>0x031100</Error>\n\
        <ValidLba>0x1</ValidLba>\n";

    #[test]
    fn loads_minimal_scsi_record() {
        let mut svc = SimulatedService::new(1);
        let report = load(&doc(&[record(SCSI_FIELDS)]), &mut svc).unwrap();
        assert_eq!(report, LoadReport { loaded: 1, skipped: 0 });

        let (_, rule) = collect_records(&svc).unwrap().remove(0);
        assert_eq!(rule.target.fru.to_string(), "0_0_5");
        assert_eq!((rule.lba_start, rule.lba_end), (0x20000, 0x20100));
        assert_eq!(rule.opcode, "READ");
        match rule.payload {
            ErrorPayload::Scsi(e) => {
                assert_eq!(e.sense, SenseCode::new(0x03, 0x11, 0x00));
                assert!(e.valid_lba);
                assert_eq!(e.status, SCSI_STATUS_CHECK_CONDITION);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn missing_window_defaults_to_user_space() {
        let mut svc = SimulatedService::new(1);
        let fields = "<Drive>0_0_1</Drive><ErrorType>0</ErrorType><DelayMsec>0x64</DelayMsec>";
        load(&doc(&[record(fields)]), &mut svc).unwrap();
        let (_, rule) = collect_records(&svc).unwrap().remove(0);
        assert_eq!((rule.lba_start, rule.lba_end), (0x10000, 0x1000_0000));
        assert_eq!(rule.delay_io_msec, 100);
        assert_eq!(rule.payload, ErrorPayload::None);
    }

    #[test]
    fn port_and_reactivation_fields() {
        let mut svc = SimulatedService::new(1);
        let fields = "<Drive>0_0_2</Drive>\
            <ErrorType>0x2</ErrorType><Error>0x4</Error>\
            <ReactGapType>0x1</ReactGapType><RandomGap>1</RandomGap>\
            <MaxRandMsecs>0x1F4</MaxRandMsecs><NumReactivate>3</NumReactivate>\
            <NumInsert>0x7FFFFFFF</NumInsert><InjectOnSend>1</InjectOnSend>";
        load(&doc(&[record(fields)]), &mut svc).unwrap();
        let (_, rule) = collect_records(&svc).unwrap().remove(0);
        assert_eq!(rule.payload, ErrorPayload::Port(PortStatus::BUSY));
        assert_eq!(rule.react_gap, ReactGap::Time(Magnitude::Random { max: 500 }));
        assert_eq!(rule.reactivation, Reactivation::Fixed(3));
        assert_eq!(rule.insert_limit, InsertLimit::Always);
        assert_eq!(rule.injection_path, InjectionPath::Send);
    }

    #[test]
    fn bad_records_are_skipped() {
        let mut svc = SimulatedService::new(1);
        let unknown_drive = record("<Drive>0_0_99</Drive><ErrorType>0</ErrorType>");
        let no_sense = record("<Drive>0_0_3</Drive><ErrorType>1</ErrorType>");
        let bad_type = record("<Drive>0_0_3</Drive><ErrorType>9</ErrorType>");
        let good = record(SCSI_FIELDS);
        let report = load(&doc(&[unknown_drive, no_sense, bad_type, good]), &mut svc).unwrap();
        assert_eq!(report, LoadReport { loaded: 1, skipped: 3 });
    }

    #[test]
    fn duplicate_record_skipped() {
        let mut svc = SimulatedService::new(1);
        let report = load(&doc(&[record(SCSI_FIELDS), record(SCSI_FIELDS)]), &mut svc).unwrap();
        assert_eq!(report, LoadReport { loaded: 1, skipped: 1 });
    }

    #[test]
    fn overlong_text_skips_only_that_record() {
        let mut svc = SimulatedService::new(1);
        let long = format!(
            "<Drive>0_0_4</Drive><ErrorType>0</ErrorType><Opcode>{}</Opcode>",
            "A".repeat(MAX_TAG_TEXT + 1)
        );
        let report = load(&doc(&[record(&long), record(SCSI_FIELDS)]), &mut svc).unwrap();
        assert_eq!(report, LoadReport { loaded: 1, skipped: 1 });
    }

    #[test]
    fn unknown_tags_and_stray_text_ignored() {
        let mut svc = SimulatedService::new(1);
        let fields = format!("<Comment>hand edited</Comment>\n{}", SCSI_FIELDS);
        let report = load(&doc(&[record(&fields)]), &mut svc).unwrap();
        assert_eq!(report.loaded, 1);
    }

    #[test]
    fn malformed_document_keeps_earlier_records() {
        let mut svc = SimulatedService::new(1);
        let text = format!("{}{}  <ErrorRule>\n<Drive>0_0_6", HEADER, record(SCSI_FIELDS));
        let result = load(&text, &mut svc);
        assert!(matches!(result, Err(LoadError::Malformed { .. })));
        assert_eq!(svc.len(), 1);
    }

    #[test]
    fn uninitialized_service_aborts() {
        let mut svc = SimulatedService::uninitialized();
        let result = load(&doc(&[record(SCSI_FIELDS)]), &mut svc);
        assert!(matches!(
            result,
            Err(LoadError::Service(ServiceError::NotInitialized))
        ));
    }

    #[test]
    fn missing_file() {
        let mut svc = SimulatedService::new(1);
        let topo = SimulatedTopology::default();
        let result = load_from_path(Path::new("/nonexistent/config.xml"), &mut svc, &topo);
        assert!(matches!(result, Err(LoadError::Read { .. })));
    }
}
