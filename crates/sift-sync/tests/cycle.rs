//! Full reconciliation cycles against an in-memory database and a scripted
//! provider.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pretty_assertions::assert_eq;
use serde_json::json;
use sift_core::entities::{Account, Item};
use sift_core::enums::{Controller, MissingPolicy};
use sift_sync::{Resolution, Scheduler, SyncEngine, SyncError};

use common::{Calls, Failure, Harness, USER, harness};

async fn item(h: &Harness, account: &Account, key: &str) -> Item {
    let shadow = h.shadow(account, key).await;
    h.db.get_item(&shadow.item_id).await.unwrap()
}

#[tokio::test]
async fn first_cycle_creates_items_and_membership() {
    let h = harness(MissingPolicy::Delete).await;
    let a1 = h.account("a1").await;
    let l1 = h.list(&a1, "mine", None).await;
    h.remote.put("a1", "PROJ-1", "Fix login");
    h.remote.put("a1", "PROJ-2", "Write docs");
    h.remote.search("a1", "mine", &["PROJ-2", "PROJ-1"]);

    let report = h.engine.run().await.unwrap();

    assert_eq!(report.accounts, 1);
    assert_eq!(report.created, 2);
    assert!(report.failed.is_empty());
    assert_eq!(h.keys(&a1).await, vec!["PROJ-1", "PROJ-2"]);

    let first = item(&h, &a1, "PROJ-1").await;
    assert_eq!(first.summary, "Fix login");
    assert_eq!(first.user_id, USER);
    assert_eq!(first.controller, Controller::ServiceList);

    let second = item(&h, &a1, "PROJ-2").await;
    assert_eq!(
        h.db.list_membership(&l1.id).await.unwrap(),
        vec![second.id, first.id],
        "membership keeps the remote order"
    );
}

#[tokio::test]
async fn repeated_cycles_write_nothing() {
    let h = harness(MissingPolicy::Delete).await;
    let a1 = h.account("a1").await;
    let l1 = h.list(&a1, "mine", Some("+1d")).await;
    h.remote.put("a1", "PROJ-1", "Fix login");
    h.remote.put("a1", "PROJ-2", "Write docs");
    h.remote.edit("a1", "PROJ-2", |r| r.done = true);
    h.remote.search("a1", "mine", &["PROJ-1", "PROJ-2"]);

    h.engine.run().await.unwrap();
    let items = h.db.list_items_for_user(USER, 100).await.unwrap();
    let shadows = h.db.shadows_for_account(&a1.id).await.unwrap();
    let membership = h.db.list_membership(&l1.id).await.unwrap();

    for _ in 0..2 {
        let report = h.engine.run().await.unwrap();
        assert_eq!(report.writes, 0);
        assert_eq!(report.unchanged, 2);
    }
    assert_eq!(h.db.list_items_for_user(USER, 100).await.unwrap(), items);
    assert_eq!(h.db.shadows_for_account(&a1.id).await.unwrap(), shadows);
    assert_eq!(h.db.list_membership(&l1.id).await.unwrap(), membership);
}

#[tokio::test]
async fn one_item_per_entity_across_lists() {
    let h = harness(MissingPolicy::Delete).await;
    let a1 = h.account("a1").await;
    let mine = h.list(&a1, "mine", None).await;
    let urgent = h.list(&a1, "urgent", None).await;
    h.remote.put("a1", "PROJ-1", "Fix login");
    h.remote.search("a1", "mine", &["PROJ-1"]);
    h.remote.search("a1", "urgent", &["PROJ-1"]);

    let report = h.engine.run().await.unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(h.item_ids().await.len(), 1);
    let tracked = item(&h, &a1, "PROJ-1").await;
    assert_eq!(h.db.list_membership(&mine.id).await.unwrap(), vec![tracked.id.clone()]);
    assert_eq!(h.db.list_membership(&urgent.id).await.unwrap(), vec![tracked.id]);
}

#[tokio::test]
async fn remote_changes_update_the_tracked_item() {
    let h = harness(MissingPolicy::Delete).await;
    let a1 = h.account("a1").await;
    h.list(&a1, "mine", None).await;
    h.remote.put("a1", "PROJ-1", "Fix login");
    h.remote.search("a1", "mine", &["PROJ-1"]);
    h.engine.run().await.unwrap();
    let before = item(&h, &a1, "PROJ-1").await;

    h.remote.edit("a1", "PROJ-1", |r| r.summary = "Fix login on mobile".into());
    let report = h.engine.run().await.unwrap();

    assert_eq!(report.updated, 1);
    assert_eq!(report.created, 0);
    let after = item(&h, &a1, "PROJ-1").await;
    assert_eq!(after.id, before.id);
    assert_eq!(after.summary, "Fix login on mobile");
}

#[tokio::test]
async fn done_time_is_fixed_at_first_detection() {
    let h = harness(MissingPolicy::Delete).await;
    let a1 = h.account("a1").await;
    h.list(&a1, "mine", None).await;
    h.remote.put("a1", "PROJ-1", "Fix login");
    h.remote.search("a1", "mine", &["PROJ-1"]);
    h.engine.run().await.unwrap();
    assert_eq!(item(&h, &a1, "PROJ-1").await.done, None);

    h.remote.edit("a1", "PROJ-1", |r| r.done = true);
    h.engine.run().await.unwrap();
    let done_at = h.shadow(&a1, "PROJ-1").await.done_at.expect("done recorded");
    assert_eq!(item(&h, &a1, "PROJ-1").await.done, Some(done_at));

    h.remote.edit("a1", "PROJ-1", |r| r.done = false);
    h.engine.run().await.unwrap();
    assert_eq!(item(&h, &a1, "PROJ-1").await.done, None);
    assert_eq!(h.shadow(&a1, "PROJ-1").await.done_at, Some(done_at));

    h.remote.edit("a1", "PROJ-1", |r| r.done = true);
    h.engine.run().await.unwrap();
    assert_eq!(item(&h, &a1, "PROJ-1").await.done, Some(done_at));
    assert_eq!(Calls::get(&h.remote.calls.done_detections), 1);
}

#[tokio::test]
async fn stragglers_are_refreshed_then_removed_when_gone() {
    let h = harness(MissingPolicy::Delete).await;
    let a1 = h.account("a1").await;
    let l1 = h.list(&a1, "mine", None).await;
    for key in ["B-1", "B-2", "B-3"] {
        h.remote.put("a1", key, &format!("Bug {key}"));
    }
    h.remote.search("a1", "mine", &["B-1", "B-3"]);
    h.engine.run().await.unwrap();
    assert_eq!(h.keys(&a1).await, vec!["B-1", "B-3"]);

    // B-3 leaves the list but still exists upstream.
    h.remote.search("a1", "mine", &["B-1", "B-2"]);
    let report = h.engine.run().await.unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.deleted, 0);
    assert_eq!(h.keys(&a1).await, vec!["B-1", "B-2", "B-3"]);
    assert_eq!(Calls::get(&h.remote.calls.refresh), 1);
    assert_eq!(item(&h, &a1, "B-3").await.controller, Controller::Service);
    let b1 = item(&h, &a1, "B-1").await;
    let b2 = item(&h, &a1, "B-2").await;
    assert_eq!(h.db.list_membership(&l1.id).await.unwrap(), vec![b1.id, b2.id]);

    // Now it is gone upstream too.
    let b3 = item(&h, &a1, "B-3").await;
    h.remote.remove("a1", "B-3");
    let report = h.engine.run().await.unwrap();

    assert_eq!(report.deleted, 1);
    assert_eq!(h.keys(&a1).await, vec!["B-1", "B-2"]);
    assert!(!h.item_ids().await.contains(&b3.id));
}

#[tokio::test]
async fn one_cycle_updates_creates_and_deletes() {
    let h = harness(MissingPolicy::Delete).await;
    let a1 = h.account("a1").await;
    let l1 = h.list(&a1, "mine", None).await;
    h.remote.put("a1", "b1", "Crash on save");
    h.remote.put("a1", "b3", "Typo in footer");
    h.remote.search("a1", "mine", &["b1", "b3"]);
    h.engine.run().await.unwrap();
    assert_eq!(h.keys(&a1).await, vec!["b1", "b3"]);
    let b1_before = item(&h, &a1, "b1").await;
    let b3 = item(&h, &a1, "b3").await;

    h.remote.edit("a1", "b1", |r| r.summary = "Crash on save as".into());
    h.remote.put("a1", "b2", "Slow startup");
    h.remote.remove("a1", "b3");
    h.remote.search("a1", "mine", &["b1", "b2"]);
    let report = h.engine.run().await.unwrap();

    assert_eq!(report.updated, 1);
    assert_eq!(report.created, 1);
    assert_eq!(report.deleted, 1);
    assert!(report.failed.is_empty());
    assert_eq!(h.keys(&a1).await, vec!["b1", "b2"]);

    let b1 = item(&h, &a1, "b1").await;
    assert_eq!(b1.id, b1_before.id);
    assert_eq!(b1.summary, "Crash on save as");
    let b2 = item(&h, &a1, "b2").await;
    assert_eq!(b2.summary, "Slow startup");
    assert!(!h.item_ids().await.contains(&b3.id));
    assert_eq!(h.db.list_membership(&l1.id).await.unwrap(), vec![b1.id, b2.id]);
}

#[tokio::test]
async fn unmappable_entity_is_skipped_and_left_untouched() {
    let h = harness(MissingPolicy::Delete).await;
    let a1 = h.account("a1").await;
    h.list(&a1, "mine", None).await;
    h.remote.put("a1", "PROJ-1", "Fix login");
    h.remote.put("a1", "PROJ-2", "Write docs");
    h.remote.search("a1", "mine", &["PROJ-1", "PROJ-2"]);
    h.engine.run().await.unwrap();
    let broken_before = item(&h, &a1, "PROJ-1").await;
    let shadow_before = h.shadow(&a1, "PROJ-1").await;

    h.remote.edit("a1", "PROJ-1", |r| r.summary = String::new());
    h.remote.edit("a1", "PROJ-2", |r| r.summary = "Write better docs".into());
    let report = h.engine.run().await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.deleted, 0);
    assert!(report.failed.is_empty());
    assert_eq!(item(&h, &a1, "PROJ-1").await, broken_before);
    assert_eq!(h.shadow(&a1, "PROJ-1").await.item_id, shadow_before.item_id);
    assert_eq!(h.keys(&a1).await, vec!["PROJ-1", "PROJ-2"]);
    assert_eq!(item(&h, &a1, "PROJ-2").await.summary, "Write better docs");
}

#[tokio::test]
async fn detach_policy_keeps_the_item() {
    let h = harness(MissingPolicy::Detach).await;
    let a1 = h.account("a1").await;
    let l1 = h.list(&a1, "starred", None).await;
    h.remote.put("a1", "thread:1", "Quarterly report");
    h.remote.search("a1", "starred", &["thread:1"]);
    h.engine.run().await.unwrap();
    let tracked = item(&h, &a1, "thread:1").await;

    h.remote.search("a1", "starred", &[]);
    h.remote.remove("a1", "thread:1");
    let report = h.engine.run().await.unwrap();

    assert_eq!(report.detached, 1);
    assert_eq!(report.deleted, 0);
    assert!(h.keys(&a1).await.is_empty());
    let kept = h.db.get_item(&tracked.id).await.unwrap();
    assert_eq!(kept.controller, Controller::Manual);
    assert_eq!(kept.summary, "Quarterly report");
    assert!(h.db.list_membership(&l1.id).await.unwrap().is_empty());

    assert_eq!(h.engine.run().await.unwrap().writes, 0);
}

#[tokio::test]
async fn failing_account_keeps_its_state() {
    let h = harness(MissingPolicy::Delete).await;
    let a1 = h.account("a1").await;
    let a2 = h.account("a2").await;
    h.list(&a1, "mine", None).await;
    h.list(&a2, "mine", None).await;
    h.remote.put("a1", "X-1", "Healthy");
    h.remote.put("a2", "Y-1", "Flaky");
    h.remote.search("a1", "mine", &["X-1"]);
    h.remote.search("a2", "mine", &["Y-1"]);
    h.engine.run().await.unwrap();

    h.remote.edit("a1", "X-1", |r| r.summary = "Healthy, renamed".into());
    h.remote.edit("a2", "Y-1", |r| r.summary = "Flaky, renamed".into());
    h.remote.fail("a2", Failure::Transient);
    let report = h.engine.run().await.unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].account_id, a2.id);
    assert!(report.flagged.is_empty());
    assert_eq!(item(&h, &a1, "X-1").await.summary, "Healthy, renamed");
    assert_eq!(item(&h, &a2, "Y-1").await.summary, "Flaky");
    assert_eq!(h.keys(&a2).await, vec!["Y-1"]);

    h.remote.heal("a2");
    h.engine.run().await.unwrap();
    assert_eq!(item(&h, &a2, "Y-1").await.summary, "Flaky, renamed");
}

#[tokio::test]
async fn slow_account_times_out_alone() {
    let h = harness(MissingPolicy::Delete).await;
    let a1 = h.account("a1").await;
    let a2 = h.account("a2").await;
    h.list(&a1, "mine", None).await;
    h.list(&a2, "mine", None).await;
    h.remote.put("a1", "X-1", "Fast");
    h.remote.put("a2", "Y-1", "Slow");
    h.remote.search("a1", "mine", &["X-1"]);
    h.remote.search("a2", "mine", &["Y-1"]);
    h.remote.fail("a2", Failure::Slow);

    let report = tokio::time::timeout(Duration::from_secs(5), h.engine.run())
        .await
        .expect("cycle is bounded by the call timeout")
        .unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].account_id, a2.id);
    assert!(report.failed[0].reason.contains("timed out"));
    assert!(h.keys(&a2).await.is_empty());
}

#[tokio::test]
async fn revoked_account_is_flagged_and_skipped() {
    let h = harness(MissingPolicy::Delete).await;
    let a1 = h.account("a1").await;
    h.list(&a1, "mine", None).await;
    h.remote.put("a1", "X-1", "Tracked");
    h.remote.search("a1", "mine", &["X-1"]);
    h.engine.run().await.unwrap();

    h.remote.fail("a1", Failure::Revoked);
    let report = h.engine.run().await.unwrap();

    assert_eq!(report.flagged, vec![a1.id.clone()]);
    assert!(report.failed.is_empty());
    let flagged = h.db.get_account(&a1.id).await.unwrap();
    assert!(flagged.problem.as_deref().unwrap_or_default().contains("revoked"));
    assert_eq!(h.keys(&a1).await, vec!["X-1"], "tracked state is kept");

    let calls = Calls::get(&h.remote.calls.list_items);
    let report = h.engine.run().await.unwrap();
    assert_eq!(report.accounts, 0);
    assert_eq!(Calls::get(&h.remote.calls.list_items), calls);
}

#[tokio::test]
async fn new_items_take_their_due_from_the_list() {
    let h = harness(MissingPolicy::Delete).await;
    let a1 = h.account("a1").await;
    h.list(&a1, "soon", Some("+1d")).await;
    h.remote.put("a1", "X-1", "No due upstream");
    h.remote.put("a1", "X-2", "Due upstream");
    let upstream_due = Utc::now() + chrono::TimeDelta::days(10);
    h.remote.edit("a1", "X-2", |r| r.due = Some(upstream_due));
    h.remote.search("a1", "soon", &["X-1", "X-2"]);

    let before = Utc::now();
    h.engine.run().await.unwrap();

    let due = item(&h, &a1, "X-1").await.due.expect("due from list offset");
    assert!(due > before + chrono::TimeDelta::hours(23));
    assert!(due < before + chrono::TimeDelta::hours(25));
    let upstream = item(&h, &a1, "X-2").await.due.expect("due from upstream");
    assert_eq!(upstream.timestamp(), upstream_due.timestamp());
}

#[tokio::test]
async fn add_list_syncs_before_returning() {
    let h = harness(MissingPolicy::Delete).await;
    let a1 = h.account("a1").await;
    h.remote.put("a1", "X-5", "Starred thing");
    h.remote.search("a1", "starred", &["X-5"]);

    let list = h
        .engine
        .add_list(&a1.id, "Starred", json!({"query": "starred"}), Some("eod"))
        .await
        .unwrap();

    assert_eq!(list.name, "Starred");
    assert_eq!(h.db.lists_for_account(&a1.id).await.unwrap(), vec![list.clone()]);
    let tracked = item(&h, &a1, "X-5").await;
    assert!(tracked.due.is_some());
    assert_eq!(h.db.list_membership(&list.id).await.unwrap(), vec![tracked.id]);
    assert_eq!(
        h.engine.list_url(&a1, &list).as_deref(),
        Some(format!("fake://a1/search/{}", list.id).as_str())
    );
}

#[tokio::test]
async fn add_list_rejects_bad_input_without_writing() {
    let h = harness(MissingPolicy::Delete).await;
    let a1 = h.account("a1").await;

    let err = h
        .engine
        .add_list(&a1.id, "Broken", json!({"jql": "x"}), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::InvalidQuery(_)));

    let err = h
        .engine
        .add_list(&a1.id, "Broken", json!({"query": "mine"}), Some("next tuesday"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Core(_)));

    h.remote.fail("a1", Failure::Transient);
    let err = h
        .engine
        .add_list(&a1.id, "Later", json!({"query": "mine"}), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::TemporarilyUnavailable { .. }));

    assert!(h.db.lists_for_account(&a1.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn add_list_on_flagged_account_is_refused() {
    let h = harness(MissingPolicy::Delete).await;
    let a1 = h.account("a1").await;
    h.remote.fail("a1", Failure::Revoked);

    let err = h
        .engine
        .add_list(&a1.id, "Mine", json!({"query": "mine"}), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Revoked { .. }));

    let err = h
        .engine
        .add_list(&a1.id, "Mine", json!({"query": "mine"}), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::AccountUnusable { .. }));
}

#[tokio::test]
async fn resolve_url_creates_once() {
    let h = harness(MissingPolicy::Delete).await;
    let a1 = h.account("a1").await;
    h.remote.put("a1", "X-9", "Pasted link");

    let first = h.engine.resolve_url(USER, "fake://a1/X-9").await.unwrap();
    let second = h.engine.resolve_url(USER, "fake://a1/X-9").await.unwrap();

    let Resolution::Created(created) = &first else {
        panic!("expected a created item, got {first:?}");
    };
    assert_eq!(second, Resolution::Existing(created.clone()));
    assert_eq!(created.account_id, a1.id);
    assert_eq!(created.native_key, "X-9");
    assert_eq!(Calls::get(&h.remote.calls.fetch_one), 1);
    assert_eq!(item(&h, &a1, "X-9").await.controller, Controller::Service);

    // The next cycle keeps it as a straggler.
    let report = h.engine.run().await.unwrap();
    assert_eq!(report.deleted, 0);
    assert_eq!(h.keys(&a1).await, vec!["X-9"]);
}

#[tokio::test]
async fn resolve_url_finds_nothing_for_foreign_links() {
    let h = harness(MissingPolicy::Delete).await;
    h.account("a1").await;
    h.remote.put("a1", "X-1", "Mine");

    let cases = [
        (USER, "https://example.org/elsewhere"),
        (USER, "fake://a2/X-1"),
        (USER, "fake://a1/X-404"),
        ("someone-else", "fake://a1/X-1"),
    ];
    for (user, url) in cases {
        assert_eq!(
            h.engine.resolve_url(user, url).await.unwrap(),
            Resolution::NotFound,
            "{user} {url}"
        );
    }
    assert!(h.item_ids().await.is_empty());
}

#[tokio::test]
async fn resolve_url_surfaces_provider_outage() {
    let h = harness(MissingPolicy::Delete).await;
    h.account("a1").await;
    h.remote.put("a1", "X-1", "Mine");
    h.remote.fail("a1", Failure::Transient);

    let err = h.engine.resolve_url(USER, "fake://a1/X-1").await.unwrap_err();

    assert!(matches!(err, SyncError::TemporarilyUnavailable { .. }));
    assert!(h.item_ids().await.is_empty());
}

#[tokio::test]
async fn scheduled_engine_syncs_in_the_background() {
    let h = harness(MissingPolicy::Delete).await;
    let a1 = h.account("a1").await;
    h.list(&a1, "mine", None).await;
    h.remote.put("a1", "X-1", "Background");
    h.remote.search("a1", "mine", &["X-1"]);

    let scheduler = Scheduler::new();
    let db = Arc::clone(&h.db);
    let engine = Arc::new(h.engine);
    let task = Arc::clone(&engine).start(&scheduler);
    assert_eq!(task.name(), "sync:jira");

    let mut synced = false;
    for _ in 0..100 {
        if !db.shadows_for_account(&a1.id).await.unwrap().is_empty() {
            synced = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(synced, "first cycle runs after the initial delay");

    scheduler.shutdown();
    task.stop().await;
}
