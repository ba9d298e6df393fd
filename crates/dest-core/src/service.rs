//! Collaborator interfaces.
//!
//! The injection engine and drive discovery live outside this crate.  The
//! rule core only ever talks to them through these two traits, and never
//! caches rule state locally: listing, searching and deleting always go back
//! to the service.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::rule::{ErrorRule, Fru, FruParseError, Lba, ObjectId, RecordId, SearchParams, Target};

/// Errors reported by the injection service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("injection service is not initialized")]
    NotInitialized,

    #[error("injection service unavailable: {0}")]
    Unavailable(String),

    #[error("no matching record")]
    NotFound,

    #[error("an identical record already exists")]
    AlreadyExists,

    #[error("record rejected: {0}")]
    Rejected(String),
}

impl ServiceError {
    /// Errors after which no further request to the service can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ServiceError::NotInitialized | ServiceError::Unavailable(_))
    }
}

/// Errors reported by the topology service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error(transparent)]
    InvalidLocation(#[from] FruParseError),

    #[error("no drive at {0}")]
    NoSuchDrive(Fru),

    #[error("unknown drive object {0}")]
    UnknownObject(ObjectId),
}

/// Lifecycle state of the injection service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceState {
    NotInitialized,
    Initialized,
    Started,
    Stopped,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceState::NotInitialized => "Not initialized",
            ServiceState::Initialized => "Initialized",
            ServiceState::Started => "Started",
            ServiceState::Stopped => "Stopped",
        };
        f.write_str(s)
    }
}

/// Opaque handle to a record held by the injection service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordHandle(pub u64);

/// Usable block ranges of a drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalLayout {
    pub start_of_user_space: Lba,
    pub end_of_user_space: Lba,
    pub end_of_drive: Lba,
}

/// The error-injection engine.
pub trait InjectionService {
    fn state(&self) -> Result<ServiceState, ServiceError>;

    fn start(&mut self) -> Result<(), ServiceError>;

    fn stop(&mut self) -> Result<(), ServiceError>;

    /// Submit a validated rule.
    fn add_record(&mut self, rule: &ErrorRule) -> Result<RecordHandle, ServiceError>;

    fn remove_record(&mut self, handle: RecordHandle) -> Result<(), ServiceError>;

    fn remove_all_records(&mut self) -> Result<(), ServiceError>;

    /// First record after `cursor` (or from the start) matching `params`.
    fn search_record(
        &self,
        params: &SearchParams,
        cursor: Option<RecordHandle>,
    ) -> Result<Option<(RecordHandle, ErrorRule)>, ServiceError>;

    /// Handle of the record with this id.
    fn record_handle(&self, record_id: RecordId) -> Result<RecordHandle, ServiceError>;

    /// Record following `cursor`, or the first one when `cursor` is `None`.
    /// Returns `None` once the list is exhausted.
    fn next_record(
        &self,
        cursor: Option<RecordHandle>,
    ) -> Result<Option<(RecordHandle, ErrorRule)>, ServiceError>;
}

/// Drive discovery.
pub trait Topology {
    fn resolve_handle(&self, fru: Fru) -> Result<ObjectId, TopologyError>;

    fn physical_layout(&self, object_id: ObjectId) -> Result<PhysicalLayout, TopologyError>;

    fn parse_target_string(&self, text: &str) -> Result<Fru, TopologyError> {
        Ok(text.parse::<Fru>()?)
    }

    /// Parse a `bus_enclosure_slot` string and resolve it to a target.
    fn resolve_target(&self, text: &str) -> Result<Target, TopologyError> {
        let fru = self.parse_target_string(text)?;
        let object_id = self.resolve_handle(fru)?;
        Ok(Target { fru, object_id })
    }
}

/// Fetch every record through the service cursor.
pub fn collect_records(
    service: &dyn InjectionService,
) -> Result<Vec<(RecordHandle, ErrorRule)>, ServiceError> {
    let mut records = Vec::new();
    let mut cursor = None;
    while let Some((handle, rule)) = service.next_record(cursor)? {
        cursor = Some(handle);
        records.push((handle, rule));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_display_strings() {
        assert_eq!(ServiceState::NotInitialized.to_string(), "Not initialized");
        assert_eq!(ServiceState::Initialized.to_string(), "Initialized");
        assert_eq!(ServiceState::Started.to_string(), "Started");
        assert_eq!(ServiceState::Stopped.to_string(), "Stopped");
    }

    #[test]
    fn fatal_errors() {
        assert!(ServiceError::NotInitialized.is_fatal());
        assert!(ServiceError::Unavailable("gone".into()).is_fatal());
        assert!(!ServiceError::AlreadyExists.is_fatal());
        assert!(!ServiceError::NotFound.is_fatal());
    }
}
