//! In-memory injection service and drive topology.
//!
//! [`SimulatedService`] keeps records in insertion order and hands out
//! monotonically increasing handles and record ids, the way the real engine
//! queues them.  Its whole state serializes to JSON so a CLI session can
//! persist it between invocations.

use rand::RngCore;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use thiserror::Error;

use crate::rule::{
    ErrorRule, Fru, ObjectId, Reactivation, RecordId, RuleCounters, SearchParams,
};
use crate::service::{
    InjectionService, PhysicalLayout, RecordHandle, ServiceError, ServiceState, Topology,
    TopologyError,
};

/// Errors reading or writing simulator state files.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ── Injection service ───────────────────────────────────────────

/// Injection engine kept in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedService {
    state: ServiceState,
    records: Vec<(RecordHandle, ErrorRule)>,
    next_handle: u64,
    next_record_id: RecordId,
    seed: u64,
}

impl SimulatedService {
    /// An initialized, idle service.
    pub fn new(seed: u64) -> Self {
        Self {
            state: ServiceState::Initialized,
            records: Vec::new(),
            next_handle: 1,
            next_record_id: 1,
            seed,
        }
    }

    /// A service that refuses every request.
    pub fn uninitialized() -> Self {
        Self {
            state: ServiceState::NotInitialized,
            ..Self::new(0)
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn save_state(&self, path: &Path) -> Result<(), SimError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn load_state(path: &Path) -> Result<Self, SimError> {
        let file = File::open(path)?;
        let service = serde_json::from_reader(file)?;
        Ok(service)
    }

    fn ensure_ready(&self) -> Result<(), ServiceError> {
        match self.state {
            ServiceState::NotInitialized => Err(ServiceError::NotInitialized),
            _ => Ok(()),
        }
    }

    fn position(&self, handle: RecordHandle) -> Option<usize> {
        self.records.iter().position(|(h, _)| *h == handle)
    }

    fn draw_reactivations(&self, record_id: RecordId, max: u32) -> u32 {
        let mut key = [0u8; 32];
        key[..8].copy_from_slice(&self.seed.to_le_bytes());
        key[8..12].copy_from_slice(&record_id.to_le_bytes());
        let mut rng = ChaCha20Rng::from_seed(key);
        (rng.next_u64() % (u64::from(max) + 1)) as u32
    }
}

impl Default for SimulatedService {
    fn default() -> Self {
        Self::new(0)
    }
}

impl InjectionService for SimulatedService {
    fn state(&self) -> Result<ServiceState, ServiceError> {
        Ok(self.state)
    }

    fn start(&mut self) -> Result<(), ServiceError> {
        self.ensure_ready()?;
        self.state = ServiceState::Started;
        log::info!("injection started with {} record(s)", self.records.len());
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ServiceError> {
        self.ensure_ready()?;
        self.state = ServiceState::Stopped;
        log::info!("injection stopped");
        Ok(())
    }

    fn add_record(&mut self, rule: &ErrorRule) -> Result<RecordHandle, ServiceError> {
        self.ensure_ready()?;
        if self
            .records
            .iter()
            .any(|(_, existing)| existing.same_configuration(rule))
        {
            return Err(ServiceError::AlreadyExists);
        }

        let record_id = self.next_record_id;
        let mut stored = rule.clone();
        stored.record_id = record_id;
        stored.counters = RuleCounters {
            reactivations_left: match rule.reactivation {
                Reactivation::Fixed(n) => n,
                Reactivation::Random { max } => self.draw_reactivations(record_id, max),
            },
            ..RuleCounters::default()
        };

        let handle = RecordHandle(self.next_handle);
        self.next_handle += 1;
        self.next_record_id += 1;
        log::debug!("added {}", stored);
        self.records.push((handle, stored));
        Ok(handle)
    }

    fn remove_record(&mut self, handle: RecordHandle) -> Result<(), ServiceError> {
        self.ensure_ready()?;
        let index = self.position(handle).ok_or(ServiceError::NotFound)?;
        let (_, rule) = self.records.remove(index);
        log::debug!("removed {}", rule);
        Ok(())
    }

    fn remove_all_records(&mut self) -> Result<(), ServiceError> {
        self.ensure_ready()?;
        self.records.clear();
        Ok(())
    }

    fn search_record(
        &self,
        params: &SearchParams,
        cursor: Option<RecordHandle>,
    ) -> Result<Option<(RecordHandle, ErrorRule)>, ServiceError> {
        self.ensure_ready()?;
        let start = match cursor {
            Some(handle) => self.position(handle).ok_or(ServiceError::NotFound)? + 1,
            None => 0,
        };
        Ok(self.records[start..]
            .iter()
            .find(|(_, rule)| params.matches(rule))
            .cloned())
    }

    fn record_handle(&self, record_id: RecordId) -> Result<RecordHandle, ServiceError> {
        self.ensure_ready()?;
        self.records
            .iter()
            .find(|(_, rule)| rule.record_id == record_id)
            .map(|(handle, _)| *handle)
            .ok_or(ServiceError::NotFound)
    }

    fn next_record(
        &self,
        cursor: Option<RecordHandle>,
    ) -> Result<Option<(RecordHandle, ErrorRule)>, ServiceError> {
        self.ensure_ready()?;
        let index = match cursor {
            Some(handle) => self.position(handle).ok_or(ServiceError::NotFound)? + 1,
            None => 0,
        };
        Ok(self.records.get(index).cloned())
    }
}

// ── Topology ────────────────────────────────────────────────────

/// One simulated drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveSpec {
    pub fru: Fru,
    pub object_id: ObjectId,
    pub layout: PhysicalLayout,
}

/// A fixed set of drives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedTopology {
    pub drives: Vec<DriveSpec>,
}

/// Drives in the default enclosure.
pub const DEFAULT_DRIVE_COUNT: u32 = 15;
/// Object id of slot 0 in the default enclosure.
pub const DEFAULT_OBJECT_BASE: u32 = 0x100;

impl Default for SimulatedTopology {
    /// A single enclosure `0_0` with slots 0 through 14.
    fn default() -> Self {
        let layout = PhysicalLayout {
            start_of_user_space: 0x10000,
            end_of_user_space: 0x1000_0000,
            end_of_drive: 0x1010_0000,
        };
        let drives = (0..DEFAULT_DRIVE_COUNT)
            .map(|slot| DriveSpec {
                fru: Fru::new(0, 0, slot),
                object_id: ObjectId(DEFAULT_OBJECT_BASE + slot),
                layout,
            })
            .collect();
        Self { drives }
    }
}

impl SimulatedTopology {
    pub fn from_json_file(path: &Path) -> Result<Self, SimError> {
        let file = File::open(path)?;
        let topology = serde_json::from_reader(file)?;
        Ok(topology)
    }
}

impl Topology for SimulatedTopology {
    fn resolve_handle(&self, fru: Fru) -> Result<ObjectId, TopologyError> {
        self.drives
            .iter()
            .find(|d| d.fru == fru)
            .map(|d| d.object_id)
            .ok_or(TopologyError::NoSuchDrive(fru))
    }

    fn physical_layout(&self, object_id: ObjectId) -> Result<PhysicalLayout, TopologyError> {
        self.drives
            .iter()
            .find(|d| d.object_id == object_id)
            .map(|d| d.layout)
            .ok_or(TopologyError::UnknownObject(object_id))
    }
}
