//! Persisted brain state.
//!
//! All learned state is saved and restored as one unit: bandit arms, capture
//! ledger, interaction history, optimizer observations, timing parameters,
//! mode and the known-endpoint set. The blob is JSON; where it lives is up to
//! the [`StateStore`].

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bandit::BanditState;
use crate::mac::MacAddr;
use crate::mode::Mode;
use crate::optimizer::{OptimizerState, TimingParams};
use crate::tactical::{InteractionEntry, LedgerRecord};

pub const STATE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("state encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported state version {0}")]
    UnsupportedVersion(u32),
    #[error("state store poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrainState {
    pub version: u32,
    pub mode: Mode,
    #[serde(default)]
    pub bandit: BanditState,
    #[serde(default)]
    pub ledger: Vec<LedgerRecord>,
    #[serde(default)]
    pub interactions: Vec<InteractionEntry>,
    #[serde(default)]
    pub optimizer: OptimizerState,
    #[serde(default)]
    pub timing: TimingParams,
    #[serde(default)]
    pub known_endpoints: Vec<MacAddr>,
    #[serde(default)]
    pub epoch: u64,
}

impl BrainState {
    pub fn to_bytes(&self) -> Result<Vec<u8>, PersistError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PersistError> {
        let state: BrainState = serde_json::from_slice(bytes)?;
        if state.version != STATE_VERSION {
            return Err(PersistError::UnsupportedVersion(state.version));
        }
        Ok(state)
    }
}

/// Opaque blob storage for [`BrainState`].
pub trait StateStore: Send {
    /// The last saved blob, `None` if nothing was ever saved.
    fn load(&self) -> Result<Option<Vec<u8>>, PersistError>;
    fn save(&mut self, blob: &[u8]) -> Result<(), PersistError>;
}

/// Stores the blob in a file, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileStateStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "brain-state".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<Option<Vec<u8>>, PersistError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&mut self, blob: &[u8]) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.tmp_path();
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(blob)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    blob: Arc<Mutex<Option<Vec<u8>>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: Vec<u8>) -> Self {
        MemoryStateStore {
            blob: Arc::new(Mutex::new(Some(blob))),
        }
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<Vec<u8>>, PersistError> {
        let guard = self.blob.lock().map_err(|_| PersistError::Poisoned)?;
        Ok(guard.clone())
    }

    fn save(&mut self, blob: &[u8]) -> Result<(), PersistError> {
        let mut guard = self.blob.lock().map_err(|_| PersistError::Poisoned)?;
        *guard = Some(blob.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> BrainState {
        BrainState {
            version: STATE_VERSION,
            mode: Mode::Assist,
            bandit: BanditState::default(),
            ledger: Vec::new(),
            interactions: Vec::new(),
            optimizer: OptimizerState::default(),
            timing: TimingParams::default(),
            known_endpoints: vec![MacAddr::new([1, 2, 3, 4, 5, 6])],
            epoch: 42,
        }
    }

    #[test]
    fn state_bytes_roundtrip() {
        let state = sample_state();
        let back = BrainState::from_bytes(&state.to_bytes().unwrap()).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn timing_floats_survive_bit_exact() {
        let mut state = sample_state();
        state.timing = TimingParams {
            recon_time: 105.28026182813761,
            hop_recon_time: 0.1 + 0.2,
            min_recon_time: 1.0 / 3.0,
            ap_ttl: 599.9999999999999,
            sta_ttl: std::f64::consts::PI * 100.0,
        };
        let back = BrainState::from_bytes(&state.to_bytes().unwrap()).unwrap();
        for (a, b) in back.timing.to_vec().iter().zip(state.timing.to_vec()) {
            assert_eq!(a.to_bits(), b.to_bits(), "{a} vs {b}");
        }
    }

    #[test]
    fn wrong_version_rejected() {
        let mut state = sample_state();
        state.version = 99;
        let bytes = state.to_bytes().unwrap();
        assert!(matches!(
            BrainState::from_bytes(&bytes),
            Err(PersistError::UnsupportedVersion(99))
        ));
        assert!(matches!(
            BrainState::from_bytes(b"{not json"),
            Err(PersistError::Json(_))
        ));
    }

    #[test]
    fn missing_sections_default() {
        let state = BrainState::from_bytes(br#"{"version":1,"mode":"passive"}"#).unwrap();
        assert_eq!(state.mode, Mode::Passive);
        assert_eq!(state.epoch, 0);
        assert!(state.ledger.is_empty());
    }

    #[test]
    fn memory_store_clones_share_slot() {
        let mut store = MemoryStateStore::new();
        let observer = store.clone();
        assert_eq!(observer.load().unwrap(), None);
        store.save(b"abc").unwrap();
        assert_eq!(observer.load().unwrap(), Some(b"abc".to_vec()));
    }

    #[test]
    fn file_store_saves_atomically() {
        let dir = std::env::temp_dir().join(format!("nextgen-brain-persist-{}", std::process::id()));
        let path = dir.join("state.json");
        let mut store = FileStateStore::new(&path);
        assert_eq!(store.load().unwrap(), None);

        store.save(b"first").unwrap();
        store.save(b"second").unwrap();
        assert_eq!(store.load().unwrap(), Some(b"second".to_vec()));
        assert!(!dir.join("state.json.tmp").exists());

        let _ = fs::remove_dir_all(&dir);
    }
}
