//! Shared fixtures for liq-scanner integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use liq_common::events::{EventBus, ScanEvent};
use liq_scanner::cache::LedgerCache;
use liq_scanner::manifest::Group;
use liq_scanner::submission::{SubmissionPayload, SubmissionReceipt};
use liq_scanner::{
    Backend, FetchError, Scheduler, SchedulerConfig, SchedulerHandle, Session, SubmitError,
    SyncController, SyncMode,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;

pub const DEBOUNCE: Duration = Duration::from_millis(250);
pub const AUTOSYNC: Duration = Duration::from_secs(30);

pub fn group(key: &str, label: &str, plate: &str, codes: &[&str]) -> Group {
    Group {
        group_key: key.to_string(),
        vehicle_plate: plate.to_string(),
        city: "MEDELLIN".to_string(),
        color: "#1e90ff".to_string(),
        color_label: label.to_string(),
        guide_codes: codes.iter().map(|c| c.to_string()).collect(),
    }
}

/// In-process backend with scripted manifests
///
/// Manifest responses are served in order; once the script runs out every
/// fetch fails with a network error.
#[derive(Default)]
pub struct FakeBackend {
    manifests: Mutex<VecDeque<Result<Vec<Group>, FetchError>>>,
    gate: Mutex<Option<Arc<Notify>>>,
    submit_gate: Mutex<Option<Arc<Notify>>>,
    fetch_calls: AtomicUsize,
    submissions: Mutex<Vec<SubmissionPayload>>,
    fail_submits: AtomicBool,
}

impl FakeBackend {
    pub fn new(manifests: Vec<Result<Vec<Group>, FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            manifests: Mutex::new(manifests.into()),
            ..Default::default()
        })
    }

    /// Hold the next fetch until the returned notify fires
    pub fn gate_next_fetch(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Hold the next submit until the returned notify fires
    pub fn gate_next_submit(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.submit_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn fail_submits(&self, fail: bool) {
        self.fail_submits.store(fail, Ordering::SeqCst);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> Vec<SubmissionPayload> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn fetch_manifest(&self) -> Result<Vec<Group>, FetchError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.manifests
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Network("script exhausted".to_string())))
    }

    async fn submit(&self, payload: &SubmissionPayload) -> Result<SubmissionReceipt, SubmitError> {
        let gate = self.submit_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_submits.load(Ordering::SeqCst) {
            return Err(SubmitError::Http(500));
        }
        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(payload.clone());
        Ok(SubmissionReceipt {
            sheet: format!("LIQ-{}", submissions.len()),
            blocks: payload.groups.len() as u64,
        })
    }
}

/// A running scheduler with its observers
pub struct Harness {
    pub handle: SchedulerHandle,
    pub task: JoinHandle<Session>,
    pub events: broadcast::Receiver<ScanEvent>,
    pub backend: Arc<FakeBackend>,
    pub cache_path: std::path::PathBuf,
    _dir: TempDir,
}

/// Load the first scripted manifest, then start the scheduler
///
/// The event receiver is subscribed after the startup load, so it only
/// sees what the scheduler produces.
pub async fn start(backend: Arc<FakeBackend>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("scanned.json.zst");
    let events = EventBus::new(64);

    let mut session = Session::restore(LedgerCache::new(&cache_path), events.clone());
    SyncController::new(backend.clone(), events.clone())
        .load_manifest(&mut session, SyncMode::Blocking)
        .await
        .expect("startup manifest load");

    let rx = events.subscribe();
    let config = SchedulerConfig {
        debounce: DEBOUNCE,
        autosync_interval: AUTOSYNC,
    };
    let (handle, task) = Scheduler::new(session, backend.clone(), events, config).spawn();

    Harness {
        handle,
        task,
        events: rx,
        backend,
        cache_path,
        _dir: dir,
    }
}

/// Next published event, failing the test if none arrives in time
pub async fn next_event(rx: &mut broadcast::Receiver<ScanEvent>) -> ScanEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event bus closed")
}

/// Let the scheduler drain its queue without crossing a timer deadline
pub async fn settle_loop() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
