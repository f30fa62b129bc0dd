use crate::application::ports::{DocumentAuthority, DraftStore};
use crate::application::services::finalize::FinalizeService;
use crate::application::services::single_flight::SingleFlight;
use crate::domain::entities::{
    ConflictDigest, DocumentDraft, FinalizeOutcome, ReconcileOutcome, ReconcileReport,
};
use crate::domain::value_objects::{DraftStatus, SyncPolicy};
use crate::shared::error::{AppError, Result};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

/// Background reconciliation of every record whose local state has diverged
/// from the last confirmed server state. Never merges: when the server is
/// ahead, the divergence is recorded and surfaced. Resolution of legal
/// document fields belongs to the user.
pub struct SyncReconciler {
    store: Arc<dyn DraftStore>,
    authority: Arc<dyn DocumentAuthority>,
    finalize: Arc<FinalizeService>,
    locks: Arc<SingleFlight>,
    policy: SyncPolicy,
    batch_size: usize,
    running: Arc<Mutex<bool>>,
    wake: Arc<Notify>,
}

impl SyncReconciler {
    pub fn new(
        store: Arc<dyn DraftStore>,
        authority: Arc<dyn DocumentAuthority>,
        finalize: Arc<FinalizeService>,
        locks: Arc<SingleFlight>,
        policy: SyncPolicy,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            authority,
            finalize,
            locks,
            policy,
            batch_size: batch_size.max(1),
            running: Arc::new(Mutex::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn policy(&self) -> SyncPolicy {
        self.policy
    }

    /// Connectivity came back: reconcile without waiting for the next tick.
    pub fn notify_connectivity_restored(&self) {
        self.wake.notify_one();
    }

    /// One reconcile pass. Overlapping passes are collapsed: a call while
    /// another is running returns an empty report.
    pub async fn run_once(&self) -> Result<ReconcileReport> {
        {
            let mut running = self.running.lock().await;
            if *running {
                return Ok(ReconcileReport::default());
            }
            *running = true;
        }

        let result = self.reconcile_pending().await;

        *self.running.lock().await = false;
        result
    }

    async fn reconcile_pending(&self) -> Result<ReconcileReport> {
        let pending = self.store.list_pending_sync().await?;
        let batch: Vec<DocumentDraft> = pending.into_iter().take(self.batch_size).collect();

        let outcomes = join_all(
            batch
                .into_iter()
                .map(|draft| async move { self.reconcile_one(draft).await }),
        )
        .await;

        let mut report = ReconcileReport::default();
        for outcome in outcomes {
            report.record(outcome);
        }

        tracing::info!(
            target: "docs::reconcile",
            examined = report.examined,
            pushed = report.pushed,
            recovered = report.recovered,
            conflicts = report.conflicts,
            skipped = report.skipped,
            "reconcile pass complete"
        );
        Ok(report)
    }

    async fn reconcile_one(&self, draft: DocumentDraft) -> ReconcileOutcome {
        let id = draft.id.clone();
        let token = self.locks.token(&id);
        let _flight = token.lock().await;

        // Re-read under the lock; an autosave or finalize may have landed
        // between the listing and now.
        let draft = match self.store.load(&id).await {
            Ok(draft) => draft,
            Err(err) => {
                return ReconcileOutcome::Skipped {
                    document_id: id,
                    reason: err.to_string(),
                }
            }
        };
        if !draft.pending_sync {
            return ReconcileOutcome::AlreadySynced { document_id: id };
        }

        let head = match self.authority.get_version(&id).await {
            Ok(head) => head,
            Err(err) => {
                tracing::debug!(
                    target: "docs::reconcile",
                    document_id = %id,
                    error = %err,
                    "server unreachable, record stays pending"
                );
                return ReconcileOutcome::Skipped {
                    document_id: id,
                    reason: err.to_string(),
                };
            }
        };

        match head.server_version {
            // Another session progressed the document further. Never
            // overwrite; surface for user resolution.
            Some(server_version) if server_version > draft.local_version => {
                let digest = ConflictDigest {
                    local_version: draft.local_version,
                    server_version,
                    server_status: Some(head.status.clone()),
                    observed_at: Utc::now().timestamp(),
                };
                if let Err(err) = self.store.record_conflict(&id, &digest).await {
                    return ReconcileOutcome::Skipped {
                        document_id: id,
                        reason: err.to_string(),
                    };
                }
                ReconcileOutcome::Conflict {
                    document_id: id,
                    local_version: draft.local_version,
                    server_version,
                }
            }
            Some(server_version) if server_version == draft.local_version => {
                match self.store.acknowledge_sync(&id, server_version).await {
                    Ok(_) => ReconcileOutcome::AlreadySynced { document_id: id },
                    Err(err) => ReconcileOutcome::Skipped {
                        document_id: id,
                        reason: err.to_string(),
                    },
                }
            }
            // Server missing or behind: push local state.
            _ => self.push_local(draft).await,
        }
    }

    async fn push_local(&self, draft: DocumentDraft) -> ReconcileOutcome {
        let id = draft.id.clone();

        match draft.status {
            DraftStatus::FinalizeFailed | DraftStatus::Finalizing => {
                // `finalizing` here means a crash mid-finalize: under the
                // single-flight token nothing else can be running it.
                if draft.status == DraftStatus::Finalizing {
                    if let Err(err) = self
                        .store
                        .set_status(&id, DraftStatus::FinalizeFailed, &[DraftStatus::Finalizing])
                        .await
                    {
                        return ReconcileOutcome::Skipped {
                            document_id: id,
                            reason: err.to_string(),
                        };
                    }
                }
                match self.finalize.finalize(&id).await {
                    Ok(FinalizeOutcome::Finalized(_)) => {
                        ReconcileOutcome::FinalizeRecovered { document_id: id }
                    }
                    Ok(FinalizeOutcome::Conflict {
                        local_version,
                        server_version,
                    }) => ReconcileOutcome::Conflict {
                        document_id: id,
                        local_version,
                        server_version,
                    },
                    Ok(other) => ReconcileOutcome::Skipped {
                        document_id: id,
                        reason: format!("finalize not recovered: {other:?}"),
                    },
                    Err(err) => ReconcileOutcome::Skipped {
                        document_id: id,
                        reason: err.to_string(),
                    },
                }
            }
            DraftStatus::Draft | DraftStatus::Saving | DraftStatus::Ready => {
                match self
                    .authority
                    .push_draft(&id, draft.local_version, &draft.field_values)
                    .await
                {
                    Ok(()) => match self.store.acknowledge_sync(&id, draft.local_version).await {
                        Ok(_) => ReconcileOutcome::Pushed { document_id: id },
                        Err(err) => ReconcileOutcome::Skipped {
                            document_id: id,
                            reason: err.to_string(),
                        },
                    },
                    Err(AppError::VersionConflict {
                        local_version,
                        server_version,
                        ..
                    }) => {
                        let digest = ConflictDigest {
                            local_version,
                            server_version,
                            server_status: None,
                            observed_at: Utc::now().timestamp(),
                        };
                        let _ = self.store.record_conflict(&id, &digest).await;
                        ReconcileOutcome::Conflict {
                            document_id: id,
                            local_version,
                            server_version,
                        }
                    }
                    Err(err) => ReconcileOutcome::Skipped {
                        document_id: id,
                        reason: err.to_string(),
                    },
                }
            }
            DraftStatus::Finalized => {
                // Finalized with pending_sync set should not occur; leave it
                // for the next pass rather than guessing.
                ReconcileOutcome::Skipped {
                    document_id: id,
                    reason: "finalized record still marked pending".to_string(),
                }
            }
        }
    }

    /// Spawns the periodic loop. Cadence follows the injected policy:
    /// foreground interval when connected, background interval standalone.
    /// `notify_connectivity_restored` wakes it early.
    pub fn schedule(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let reconciler = Arc::clone(self);
        tokio::spawn(async move {
            let interval = reconciler.policy.poll_interval();
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = reconciler.wake.notified() => {}
                }
                if let Err(err) = reconciler.run_once().await {
                    tracing::error!(
                        target: "docs::reconcile",
                        error = %err,
                        "reconcile pass failed"
                    );
                }
            }
        })
    }
}
