//! Durable record of deployed addresses, one JSON document per network.
//!
//! The store is the only component that writes to disk. Every write replaces the whole
//! document through a temporary file and a rename, so a reader sees either the old or
//! the new document. There is no cross-process locking: running two deployments against
//! the same network at once is unsupported.

use std::{
    collections::BTreeMap,
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::DeployError;

/// Default directory holding `<network>.json` state files.
pub const DEFAULT_STATE_DIR: &str = "deployments";

/// One persisted deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRecord {
    pub network: String,
    pub artifact_name: String,
    pub address: String,
    pub deployed_at: DateTime<Utc>,
    /// SHA-256 of the deployed wasm, when known.
    pub wasm_hash: Option<String>,
}

impl DeploymentRecord {
    pub fn new(
        network: impl Into<String>,
        artifact_name: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            network: network.into(),
            artifact_name: artifact_name.into(),
            address: address.into(),
            deployed_at: Utc::now(),
            wasm_hash: None,
        }
    }

    pub fn with_wasm_hash(mut self, wasm_hash: Option<String>) -> Self {
        self.wasm_hash = wasm_hash;
        self
    }
}

/// Access to deployment records.
pub trait StateStore {
    /// The record for `name` on `network`, if one exists.
    fn get(&self, network: &str, name: &str) -> Result<Option<DeploymentRecord>, DeployError>;

    /// Insert or replace the record for `record.artifact_name`.
    fn put(&self, record: &DeploymentRecord) -> Result<(), DeployError>;

    /// Every recorded `name -> address` on `network`.
    fn load_all(&self, network: &str) -> Result<BTreeMap<String, String>, DeployError>;

    /// Record the deploying identity's address. No-op if unchanged.
    fn set_deployer(&self, network: &str, address: &str) -> Result<(), DeployError>;
}

/// Where state files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateLocation {
    /// One `<network>.json` per network inside this directory.
    Directory(PathBuf),
    /// A single file pinned to whichever network it was first written for.
    File(PathBuf),
}

impl Default for StateLocation {
    fn default() -> Self {
        StateLocation::Directory(PathBuf::from(DEFAULT_STATE_DIR))
    }
}

/// On-disk layout of a state file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDocument {
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployer: Option<String>,
    #[serde(default)]
    pub contracts: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub deployed_at: BTreeMap<String, DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub wasm_hashes: BTreeMap<String, String>,
    /// Keys written by other tools, carried through rewrites untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StateDocument {
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            deployer: None,
            contracts: BTreeMap::new(),
            deployed_at: BTreeMap::new(),
            wasm_hashes: BTreeMap::new(),
            extra: Map::new(),
        }
    }

    fn record(&self, name: &str) -> Option<DeploymentRecord> {
        let address = self.contracts.get(name)?;
        Some(DeploymentRecord {
            network: self.network.clone(),
            artifact_name: name.to_string(),
            address: address.clone(),
            deployed_at: self
                .deployed_at
                .get(name)
                .copied()
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            wasm_hash: self.wasm_hashes.get(name).cloned(),
        })
    }

    fn insert(&mut self, record: &DeploymentRecord) {
        let name = record.artifact_name.clone();
        self.contracts.insert(name.clone(), record.address.clone());
        self.deployed_at.insert(name.clone(), record.deployed_at);
        match &record.wasm_hash {
            Some(hash) => self.wasm_hashes.insert(name, hash.clone()),
            None => self.wasm_hashes.remove(&name),
        };
    }
}

/// JSON-file backed [`StateStore`].
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    location: StateLocation,
}

impl JsonFileStore {
    pub fn new(location: StateLocation) -> Self {
        Self { location }
    }

    /// The file holding `network`'s state.
    pub fn path_for(&self, network: &str) -> PathBuf {
        match &self.location {
            StateLocation::Directory(dir) => dir.join(format!("{network}.json")),
            StateLocation::File(path) => path.clone(),
        }
    }

    /// Read the document for `network`. A missing file is `Ok(None)`; anything unreadable
    /// or malformed is an error, never an empty store.
    pub fn read_document(&self, network: &str) -> Result<Option<StateDocument>, DeployError> {
        let path = self.path_for(network);

        let exists = path
            .try_exists()
            .map_err(|e| unavailable(&path, format!("failed to stat state file: {e}")))?;
        if !exists {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| unavailable(&path, format!("failed to read state file: {e}")))?;
        let document: StateDocument = serde_json::from_str(&content)
            .map_err(|e| unavailable(&path, format!("malformed state file: {e}")))?;

        if document.network != network {
            return Err(unavailable(
                &path,
                format!(
                    "state file records network `{}`, expected `{network}`",
                    document.network
                ),
            ));
        }

        Ok(Some(document))
    }

    /// Replace the document on disk: write `<file>.tmp`, sync, rename over the target.
    pub fn write_document(&self, document: &StateDocument) -> Result<(), DeployError> {
        let path = self.path_for(&document.network);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| unavailable(&path, format!("failed to create state directory: {e}")))?;
        }

        let mut content = serde_json::to_string_pretty(document)
            .map_err(|e| unavailable(&path, format!("failed to serialize state: {e}")))?;
        content.push('\n');

        let tmp_path = tmp_path_for(&path);
        let write = || -> std::io::Result<()> {
            let mut file = File::create(&tmp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
            std::fs::rename(&tmp_path, &path)
        };

        if let Err(e) = write() {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(unavailable(&path, format!("failed to write state file: {e}")));
        }

        tracing::debug!(path = %path.display(), "State file written");
        Ok(())
    }

    fn update(
        &self,
        network: &str,
        f: impl FnOnce(&mut StateDocument) -> bool,
    ) -> Result<(), DeployError> {
        let mut document = self
            .read_document(network)?
            .unwrap_or_else(|| StateDocument::new(network));
        if f(&mut document) {
            self.write_document(&document)?;
        }
        Ok(())
    }
}

impl StateStore for JsonFileStore {
    fn get(&self, network: &str, name: &str) -> Result<Option<DeploymentRecord>, DeployError> {
        Ok(self
            .read_document(network)?
            .and_then(|document| document.record(name)))
    }

    fn put(&self, record: &DeploymentRecord) -> Result<(), DeployError> {
        self.update(&record.network, |document| {
            document.insert(record);
            true
        })?;
        tracing::info!(
            network = %record.network,
            artifact = %record.artifact_name,
            address = %record.address,
            "Deployment recorded"
        );
        Ok(())
    }

    fn load_all(&self, network: &str) -> Result<BTreeMap<String, String>, DeployError> {
        Ok(self
            .read_document(network)?
            .map(|document| document.contracts)
            .unwrap_or_default())
    }

    fn set_deployer(&self, network: &str, address: &str) -> Result<(), DeployError> {
        self.update(network, |document| {
            if document.deployer.as_deref() == Some(address) {
                return false;
            }
            document.deployer = Some(address.to_string());
            true
        })
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn unavailable(path: &Path, reason: String) -> DeployError {
    DeployError::StoreUnavailable {
        path: path.to_path_buf(),
        reason,
    }
}
