mod common;

use common::*;
use dealer_docs::{
    DraftStatus, FieldValue, ReconcileOutcome, SessionMode, SyncPolicy,
};
use std::sync::atomic::Ordering;

fn policy() -> SyncPolicy {
    SyncPolicy::new(SessionMode::Connected, 30, 300)
}

async fn saved_draft(h: &Harness) -> dealer_docs::DraftHandle {
    let draft = h.engine.create_draft(deal(), template_id()).await.unwrap();
    let handle = h.engine.open_draft(&draft.id).await.unwrap();
    h.engine
        .edit_field(&handle, key("buyer"), FieldValue::Text("Dana Whitfield".into()))
        .await
        .unwrap();
    h.engine
        .edit_field(&handle, key("price"), FieldValue::Number(18500.0))
        .await
        .unwrap();
    h.engine.save_now(&handle).await.unwrap();
    handle
}

#[tokio::test]
async fn local_draft_is_pushed_when_server_has_no_record() {
    let h = harness().await;
    let handle = saved_draft(&h).await;
    let reconciler = h.engine.reconciler(policy());

    let report = reconciler.run_once().await.unwrap();
    assert_eq!(report.examined, 1);
    assert_eq!(report.pushed, 1);
    assert!(matches!(report.outcomes[0], ReconcileOutcome::Pushed { .. }));
    assert_eq!(h.authority.push_calls.load(Ordering::SeqCst), 1);

    let draft = h.engine.load_draft(&handle).await.unwrap();
    assert!(!draft.pending_sync);
    assert_eq!(draft.server_version, Some(draft.local_version));
}

#[tokio::test]
async fn nothing_pending_means_an_empty_pass() {
    let h = harness().await;
    let reconciler = h.engine.reconciler(policy());

    let report = reconciler.run_once().await.unwrap();
    assert_eq!(report.examined, 0);
    assert_eq!(h.authority.get_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_offline_finalize_is_recovered_once_reachable() {
    let h = harness().await;
    let handle = saved_draft(&h).await;

    // Finalize while the document service is down.
    h.authority.fail_confirm(Some(AuthorityFailure::Network));
    let outcome = h.engine.request_finalize(&handle).await.unwrap();
    assert!(matches!(
        outcome,
        dealer_docs::FinalizeOutcome::Failed { .. }
    ));

    // Connectivity restored.
    h.authority.fail_confirm(None);
    let reconciler = h.engine.reconciler(policy());
    let report = reconciler.run_once().await.unwrap();

    assert_eq!(report.recovered, 1);
    let draft = h.engine.load_draft(&handle).await.unwrap();
    assert_eq!(draft.status, DraftStatus::Finalized);
    assert!(!draft.pending_sync);
    assert!(draft.artifact_ref.is_some());
}

#[tokio::test]
async fn server_ahead_surfaces_a_conflict_instead_of_overwriting() {
    let h = harness().await;
    let handle = saved_draft(&h).await;
    let before = h.engine.load_draft(&handle).await.unwrap();

    // Another session already progressed this document on the server.
    h.authority.set_server_version(Some(5), "finalized");

    let reconciler = h.engine.reconciler(policy());
    let report = reconciler.run_once().await.unwrap();

    assert_eq!(report.conflicts, 1);
    match &report.outcomes[0] {
        ReconcileOutcome::Conflict {
            local_version,
            server_version,
            ..
        } => {
            assert_eq!(*local_version, before.local_version);
            assert_eq!(*server_version, 5);
        }
        other => panic!("expected conflict, got {other:?}"),
    }

    // Nothing was pushed, nothing was overwritten.
    assert_eq!(h.authority.push_calls.load(Ordering::SeqCst), 0);
    let draft = h.engine.load_draft(&handle).await.unwrap();
    assert_eq!(draft.field_values, before.field_values);
    assert!(draft.pending_sync);
    assert!(draft.conflict_data.is_some());
}

#[tokio::test]
async fn matching_versions_just_clear_the_pending_flag() {
    let h = harness().await;
    let handle = saved_draft(&h).await;
    let before = h.engine.load_draft(&handle).await.unwrap();

    h.authority
        .set_server_version(Some(before.local_version), "draft");

    let reconciler = h.engine.reconciler(policy());
    let report = reconciler.run_once().await.unwrap();

    assert_eq!(report.already_synced, 1);
    assert_eq!(h.authority.push_calls.load(Ordering::SeqCst), 0);

    let draft = h.engine.load_draft(&handle).await.unwrap();
    assert!(!draft.pending_sync);
    assert_eq!(draft.server_version, Some(before.local_version));
}

#[tokio::test]
async fn unreachable_server_keeps_records_pending_for_the_next_pass() {
    let h = harness().await;
    let handle = saved_draft(&h).await;
    h.authority.set_unreachable(true);

    let reconciler = h.engine.reconciler(policy());
    let report = reconciler.run_once().await.unwrap();
    assert_eq!(report.skipped, 1);

    let draft = h.engine.load_draft(&handle).await.unwrap();
    assert!(draft.pending_sync);

    // Next pass with connectivity back succeeds.
    h.authority.set_unreachable(false);
    let report = reconciler.run_once().await.unwrap();
    assert_eq!(report.pushed, 1);
    let draft = h.engine.load_draft(&handle).await.unwrap();
    assert!(!draft.pending_sync);
}

#[tokio::test]
async fn push_rejected_with_conflict_is_recorded() {
    let h = harness().await;
    let handle = saved_draft(&h).await;
    h.authority
        .fail_push(Some(AuthorityFailure::Conflict { server_version: 9 }));

    let reconciler = h.engine.reconciler(policy());
    let report = reconciler.run_once().await.unwrap();

    assert_eq!(report.conflicts, 1);
    let draft = h.engine.load_draft(&handle).await.unwrap();
    assert!(draft.pending_sync);
    assert!(draft.conflict_data.is_some());
}

#[tokio::test]
async fn reconcile_batches_multiple_documents_in_one_pass() {
    let h = harness().await;
    let _first = saved_draft(&h).await;
    let _second = saved_draft(&h).await;

    let reconciler = h.engine.reconciler(policy());
    let report = reconciler.run_once().await.unwrap();
    assert_eq!(report.examined, 2);
    assert_eq!(report.pushed, 2);

    let remaining = reconciler.run_once().await.unwrap();
    assert_eq!(remaining.examined, 0);
}
