//! Saving rules as a configuration document.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use super::{escape_text, SaveError, Tag, FOOTER, HEADER, RECORD_TAG};
use crate::rule::{ErrorPayload, ErrorRule, InjectionPath, SCSI_STATUS_CHECK_CONDITION};
use crate::service::InjectionService;

fn flag(value: bool) -> u32 {
    u32::from(value)
}

fn write_hex<W: Write>(out: &mut W, tag: Tag, value: u64) -> std::io::Result<()> {
    writeln!(out, "    <{0}>{1:#X}</{0}>", tag.name(), value)
}

fn write_text<W: Write>(out: &mut W, tag: Tag, value: &str) -> std::io::Result<()> {
    writeln!(out, "    <{0}>{1}</{0}>", tag.name(), escape_text(value))
}

/// Render one `<ErrorRule>` element.
pub fn write_rule<W: Write>(out: &mut W, rule: &ErrorRule) -> std::io::Result<()> {
    let (error_code, scsi_status, valid_lba, deferred, glitch_secs) = match rule.payload {
        ErrorPayload::Scsi(e) => (e.sense.packed(), e.status, e.valid_lba, e.deferred, 0),
        ErrorPayload::Port(status) => (status.0, SCSI_STATUS_CHECK_CONDITION, false, false, 0),
        ErrorPayload::Glitch { secs } => (0, SCSI_STATUS_CHECK_CONDITION, false, false, secs),
        ErrorPayload::None | ErrorPayload::Fail => {
            (0, SCSI_STATUS_CHECK_CONDITION, false, false, 0)
        }
    };
    let error_type = rule.error_type().code().unwrap_or(0);
    let gap_type = rule.react_gap.gap_type().code().unwrap_or(0);

    writeln!(out, "  <{}>", RECORD_TAG)?;
    write_text(out, Tag::Drive, &rule.target.fru.to_string())?;
    write_hex(out, Tag::LbaStart, rule.lba_start)?;
    write_hex(out, Tag::LbaEnd, rule.lba_end)?;
    write_text(out, Tag::Opcode, &rule.opcode)?;
    write_hex(out, Tag::ErrorType, error_type.into())?;
    write_hex(out, Tag::Error, error_code.into())?;
    write_hex(out, Tag::ScsiStatus, scsi_status.into())?;
    write_hex(out, Tag::ValidLba, flag(valid_lba).into())?;
    write_hex(out, Tag::Deferred, flag(deferred).into())?;
    write_hex(out, Tag::NumInsert, rule.insert_limit.raw().into())?;
    write_hex(out, Tag::Frequency, rule.frequency.into())?;
    write_hex(out, Tag::RandomFrequency, flag(rule.is_random_frequency).into())?;
    write_hex(out, Tag::ReactGapType, gap_type.into())?;
    write_hex(out, Tag::ReactGapMsecs, rule.react_gap.msecs().into())?;
    write_hex(out, Tag::ReactGapIoCount, rule.react_gap.io_count().into())?;
    write_hex(out, Tag::RandomGap, flag(rule.react_gap.is_random()).into())?;
    write_hex(out, Tag::MaxRandMsecs, rule.react_gap.max_rand_msecs().into())?;
    write_hex(out, Tag::MaxRandIoCount, rule.react_gap.max_rand_io_count().into())?;
    write_hex(out, Tag::NumReactivate, rule.reactivation.count().into())?;
    write_hex(out, Tag::RandomReactivate, flag(rule.reactivation.is_random()).into())?;
    write_hex(out, Tag::DelayMsec, rule.delay_io_msec.into())?;
    write_hex(out, Tag::GlitchTime, glitch_secs.into())?;
    write_hex(
        out,
        Tag::InjectOnSend,
        flag(rule.injection_path == InjectionPath::Send).into(),
    )?;
    writeln!(out, "  </{}>", RECORD_TAG)
}

/// Stream every record held by `service` into `out`.  Returns the number of
/// records written.
pub fn write_rules<W: Write>(
    service: &dyn InjectionService,
    out: &mut W,
) -> Result<usize, SaveError> {
    out.write_all(HEADER.as_bytes())?;
    let mut count = 0;
    let mut cursor = None;
    while let Some((handle, rule)) = service.next_record(cursor)? {
        write_rule(out, &rule)?;
        cursor = Some(handle);
        count += 1;
    }
    out.write_all(FOOTER.as_bytes())?;
    Ok(count)
}

/// Write the configuration document at `path`, creating parent directories.
pub fn save_to_path(service: &dyn InjectionService, path: &Path) -> Result<usize, SaveError> {
    let write_err = |source| SaveError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let file = File::create(path).map_err(write_err)?;
    let mut out = BufWriter::new(file);
    let count = write_rules(service, &mut out)?;
    out.flush().map_err(write_err)?;
    log::info!("saved {} record(s) to {}", count, path.display());
    Ok(count)
}
