//! Manifest synchronization
//!
//! A load is split in two steps so scans can keep running while the request
//! is out:
//! 1. `fetch` talks to the backend and builds a complete snapshot; it does
//!    not touch the session.
//! 2. `complete` swaps the snapshot into the session (a single assignment)
//!    or, on failure, leaves the previous manifest in place and reports it.
//!
//! The startup load is blocking: its failure is returned and shown to the
//! user. Scheduled resyncs are silent: failures are only logged.

use crate::backend::Backend;
use crate::error::FetchError;
use crate::manifest::ManifestSnapshot;
use crate::session::Session;
use liq_common::events::{EventBus, ScanEvent};
use liq_common::time;
use std::sync::Arc;
use tracing::{error, info, warn};

/// How a load failure is surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Startup or user-requested: failure is surfaced to the user
    Blocking,
    /// Background timer: failure is logged only
    Silent,
}

impl SyncMode {
    pub fn is_silent(self) -> bool {
        self == SyncMode::Silent
    }
}

#[derive(Clone)]
pub struct SyncController {
    backend: Arc<dyn Backend>,
    events: EventBus,
}

impl SyncController {
    pub fn new(backend: Arc<dyn Backend>, events: EventBus) -> Self {
        Self { backend, events }
    }

    /// Fetch the manifest and build its index
    pub async fn fetch(&self) -> Result<ManifestSnapshot, FetchError> {
        let groups = self.backend.fetch_manifest().await?;
        Ok(ManifestSnapshot::from_groups(groups, Some(time::now_local())))
    }

    /// Terminal step of a load: swap on success, report on failure
    pub fn complete(
        &self,
        session: &mut Session,
        result: Result<ManifestSnapshot, FetchError>,
        mode: SyncMode,
    ) -> Result<Arc<ManifestSnapshot>, FetchError> {
        match result {
            Ok(snapshot) => {
                let groups = snapshot.groups().len();
                let guides = snapshot.guide_count();
                session.apply_manifest(snapshot);
                info!(groups, guides, silent = mode.is_silent(), "Manifest synced");
                self.events.emit_lossy(ScanEvent::ManifestSynced {
                    groups,
                    guides,
                    silent: mode.is_silent(),
                    timestamp: time::now(),
                });
                Ok(session.manifest())
            }
            Err(e) => {
                match mode {
                    SyncMode::Silent => warn!(error = %e, "Background manifest sync failed"),
                    SyncMode::Blocking => error!(error = %e, "Manifest sync failed"),
                }
                self.events.emit_lossy(ScanEvent::SyncFailed {
                    error: e.to_string(),
                    silent: mode.is_silent(),
                    timestamp: time::now(),
                });
                Err(e)
            }
        }
    }

    /// Fetch and apply in one call
    pub async fn load_manifest(
        &self,
        session: &mut Session,
        mode: SyncMode,
    ) -> Result<Arc<ManifestSnapshot>, FetchError> {
        let result = self.fetch().await;
        self.complete(session, result, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LedgerCache;
    use crate::error::SubmitError;
    use crate::manifest::Group;
    use crate::submission::{SubmissionPayload, SubmissionReceipt};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Backend that replays scripted manifest responses
    struct ScriptedBackend {
        responses: Mutex<Vec<Result<Vec<Group>, FetchError>>>,
    }

    impl ScriptedBackend {
        fn new(mut responses: Vec<Result<Vec<Group>, FetchError>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl Backend for ScriptedBackend {
        async fn fetch_manifest(&self) -> Result<Vec<Group>, FetchError> {
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(FetchError::Network("script exhausted".to_string())))
        }

        async fn submit(&self, _: &SubmissionPayload) -> Result<SubmissionReceipt, SubmitError> {
            Ok(SubmissionReceipt::default())
        }
    }

    fn group(label: &str, codes: &[&str]) -> Group {
        Group {
            group_key: "1".to_string(),
            vehicle_plate: "AAA111".to_string(),
            city: "CALI".to_string(),
            color: "#f00".to_string(),
            color_label: label.to_string(),
            guide_codes: codes.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn session(dir: &tempfile::TempDir, events: &EventBus) -> Session {
        Session::new(LedgerCache::new(dir.path().join("c.zst")), events.clone())
    }

    #[tokio::test]
    async fn test_successful_load_replaces_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let events = EventBus::new(16);
        let mut rx = events.subscribe();
        let mut session = session(&dir, &events);
        let sync = SyncController::new(
            Arc::new(ScriptedBackend::new(vec![Ok(vec![group("ROJO", &["111", "222"])])])),
            events.clone(),
        );

        let snapshot = sync.load_manifest(&mut session, SyncMode::Blocking).await.unwrap();
        assert_eq!(snapshot.guide_count(), 2);
        assert!(snapshot.synced_at().is_some());
        assert!(session.manifest().lookup("111").is_some());
        assert!(matches!(
            rx.try_recv().unwrap(),
            ScanEvent::ManifestSynced { groups: 1, guides: 2, silent: false, .. }
        ));
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let events = EventBus::new(16);
        let mut session = session(&dir, &events);
        let sync = SyncController::new(
            Arc::new(ScriptedBackend::new(vec![
                Ok(vec![group("ROJO", &["111"])]),
                Err(FetchError::Rejected),
                Err(FetchError::Http(502)),
            ])),
            events.clone(),
        );

        sync.load_manifest(&mut session, SyncMode::Blocking).await.unwrap();
        let mut rx = events.subscribe();

        assert!(matches!(
            sync.load_manifest(&mut session, SyncMode::Silent).await,
            Err(FetchError::Rejected)
        ));
        assert!(matches!(
            sync.load_manifest(&mut session, SyncMode::Silent).await,
            Err(FetchError::Http(502))
        ));
        assert!(session.manifest().lookup("111").is_some());
        assert!(matches!(
            rx.try_recv().unwrap(),
            ScanEvent::SyncFailed { silent: true, .. }
        ));
    }

    #[tokio::test]
    async fn test_resync_leaves_ledger_alone() {
        let dir = tempfile::tempdir().unwrap();
        let events = EventBus::new(16);
        let mut session = session(&dir, &events);
        let sync = SyncController::new(
            Arc::new(ScriptedBackend::new(vec![
                Ok(vec![group("ROJO", &["12345678901", "12345678902"])]),
                Ok(vec![group("ROJO", &["12345678909"])]),
            ])),
            events.clone(),
        );

        sync.load_manifest(&mut session, SyncMode::Blocking).await.unwrap();
        assert!(session.match_scan("12345678901").unwrap().is_accepted());

        sync.load_manifest(&mut session, SyncMode::Silent).await.unwrap();
        assert_eq!(session.ledger().len(), 1);
        assert_eq!(session.aggregate().scanned_count("ROJO"), 1);
        assert_eq!(session.missing_report().groups[0].not_found, vec!["12345678909"]);
    }
}
