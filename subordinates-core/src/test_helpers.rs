//! Helpers shared by unit and integration tests

use base64::Engine;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use crate::config::MessageBus;
use crate::credentials::CredentialStore;
use crate::error::{SubordinatesError, SubordinatesResult};
use crate::events::{EventSink, SubordinateEvent};
use crate::lock::DirectoryLock;
use crate::provisioning::SubordinatesManager;
use crate::registry::HierarchyRegistry;
use crate::service::ServiceRestarter;
use crate::store::{ConfigStore, MemoryStore, Section, Transaction};

pub const TEST_CONTROLLER_ID: &str = "0000000000000001";

/// Builds provisioning tokens the way the enrollment side does
#[derive(Debug, Clone)]
pub struct TokenBuilder {
    device_id: String,
    port: u16,
    ipv4_ips: BTreeMap<String, Vec<String>>,
    manifest: Option<serde_json::Value>,
    include_manifest: bool,
    files: Vec<(String, Vec<u8>)>,
    directories: Vec<String>,
}

impl TokenBuilder {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            port: 11884,
            ipv4_ips: BTreeMap::from([
                ("lan".to_string(), vec!["123.123.123.123".to_string()]),
                ("wan".to_string(), vec![]),
            ]),
            manifest: None,
            include_manifest: true,
            files: Vec::new(),
            directories: Vec::new(),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn ipv4(mut self, class: &str, ips: &[&str]) -> Self {
        self.ipv4_ips
            .insert(class.to_string(), ips.iter().map(|ip| ip.to_string()).collect());
        self
    }

    /// Replace the generated manifest with arbitrary JSON
    pub fn raw_manifest(mut self, manifest: serde_json::Value) -> Self {
        self.manifest = Some(manifest);
        self
    }

    pub fn without_manifest(mut self) -> Self {
        self.include_manifest = false;
        self
    }

    /// Append an extra file after the standard ones
    pub fn file(mut self, path: &str, content: &[u8]) -> Self {
        self.files.push((path.to_string(), content.to_vec()));
        self
    }

    pub fn directory(mut self, path: &str) -> Self {
        self.directories.push(path.to_string());
        self
    }

    fn manifest_json(&self) -> serde_json::Value {
        self.manifest.clone().unwrap_or_else(|| {
            serde_json::json!({
                "name": "some_name",
                "hostname": "localhost",
                "ipv4_ips": self.ipv4_ips,
                "dhcp_names": [],
                "port": self.port,
                "device_id": self.device_id,
            })
        })
    }

    /// The gzip-compressed tar archive
    pub fn build_archive(&self) -> Vec<u8> {
        let mut entries: Vec<(String, Vec<u8>)> = vec![
            ("some_name/token.crt".into(), b"token cert content".to_vec()),
            ("some_name/token.key".into(), b"token key content".to_vec()),
            ("some_name/ca.crt".into(), b"ca cert content".to_vec()),
        ];
        if self.include_manifest {
            entries.push((
                "some_name/conf.json".into(),
                self.manifest_json().to_string().into_bytes(),
            ));
        }
        entries.extend(self.files.iter().cloned());

        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for dir in &self.directories {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Directory);
            header.set_size(0);
            header.set_mode(0o755);
            builder
                .append_data(&mut header, dir, std::io::empty())
                .expect("append directory");
        }
        for (path, content) in &entries {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(content.len() as u64);
            header.set_mode(0o600);
            builder
                .append_data(&mut header, path, content.as_slice())
                .expect("append file");
        }

        builder
            .into_inner()
            .and_then(|encoder| encoder.finish())
            .expect("finish archive")
    }

    /// The base64 token text
    pub fn build(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.build_archive())
    }
}

/// Restarter that counts calls and can be told to fail
#[derive(Debug, Default)]
pub struct RecordingRestarter {
    count: AtomicUsize,
    failure: Mutex<Option<String>>,
}

impl RecordingRestarter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.to_string());
    }
}

#[async_trait::async_trait]
impl ServiceRestarter for RecordingRestarter {
    async fn restart(&self) -> SubordinatesResult<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        match self.failure.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            Some(message) => Err(SubordinatesError::restart("test", message)),
            None => Ok(()),
        }
    }
}

/// Event sink keeping every event in order
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<SubordinateEvent>>,
}

impl RecordingEventSink {
    pub fn events(&self) -> Vec<SubordinateEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: SubordinateEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

/// How a [`FailingStore`] rejects commits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitFailure {
    /// An IO-level failure, surfaced as an error
    Storage,
    /// The target section disappeared between read and commit
    Vanished,
}

/// Wraps a [`MemoryStore`]; reads pass through, commits can be made to fail
#[derive(Debug)]
pub struct FailingStore {
    inner: Arc<MemoryStore>,
    failure: Mutex<Option<CommitFailure>>,
}

impl FailingStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            failure: Mutex::new(None),
        }
    }

    /// Fail every following commit; `None` lets commits through again
    pub fn fail_commits(&self, failure: Option<CommitFailure>) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = failure;
    }
}

#[async_trait::async_trait]
impl ConfigStore for FailingStore {
    async fn read(&self, namespace: &str) -> SubordinatesResult<Vec<Section>> {
        self.inner.read(namespace).await
    }

    async fn commit(&self, transaction: Transaction) -> SubordinatesResult<()> {
        let failure = *self.failure.lock().unwrap_or_else(|e| e.into_inner());
        match failure {
            None => self.inner.commit(transaction).await,
            Some(CommitFailure::Storage) => Err(SubordinatesError::storage(
                "commit",
                std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            )),
            Some(CommitFailure::Vanished) => Err(SubordinatesError::section_not_found(
                "fosquitto",
                "vanished",
            )),
        }
    }
}

/// A manager over an in-memory store and a temporary credential area
pub struct TestHarness {
    pub manager: SubordinatesManager,
    pub store: Arc<MemoryStore>,
    pub lock: DirectoryLock,
    pub restarter: Arc<RecordingRestarter>,
    pub sink: Arc<RecordingEventSink>,
    pub dir: TempDir,
}

impl TestHarness {
    pub fn new(bus: MessageBus) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::over(bus, store.clone(), store)
    }

    /// Harness whose commits can be made to fail; `store` still shows the data
    pub fn with_failing_store(bus: MessageBus) -> (Self, Arc<FailingStore>) {
        let store = Arc::new(MemoryStore::new());
        let failing = Arc::new(FailingStore::new(store.clone()));
        (Self::over(bus, store, failing.clone()), failing)
    }

    fn over(bus: MessageBus, store: Arc<MemoryStore>, backend: Arc<dyn ConfigStore>) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let lock = DirectoryLock::new();
        let restarter = Arc::new(RecordingRestarter::new());
        let sink = Arc::new(RecordingEventSink::default());

        let registry = HierarchyRegistry::new(backend, lock.clone(), TEST_CONTROLLER_ID, bus);
        let manager = SubordinatesManager::new(
            registry,
            CredentialStore::new(dir.path().join("bridges")),
            restarter.clone(),
            sink.clone(),
        );

        Self {
            manager,
            store,
            lock,
            restarter,
            sink,
            dir,
        }
    }

    pub fn events(&self) -> Vec<SubordinateEvent> {
        self.sink.events()
    }
}
