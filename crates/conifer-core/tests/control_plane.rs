//! End-to-end control plane behavior over in-memory storage.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use conifer_core::prelude::*;
use conifer_test_utils::{
    container_pool, finished_task, queue_item, sample_settings, TestContext, INVALID_DISTRO,
    TEST_POOL, VALID_DISTRO,
};

/// Millisecond audit timestamps need distinct instants to keep ordering
/// assertions unambiguous.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(2)).await;
}

#[tokio::test]
async fn default_document_exists_before_first_write() {
    let ctx = TestContext::new();
    let settings = ctx.settings.get().await.unwrap();

    assert_eq!(settings, Settings::default());
    assert_eq!(settings.logger.default_level, "info");
    assert!(settings.container_pools.pools.is_empty());
}

#[tokio::test]
async fn valid_round_trip_preserves_every_section() {
    let ctx = TestContext::new();
    ctx.seed_fleet().await;

    let committed = sample_settings();
    ctx.settings
        .set(committed.clone(), "user")
        .await
        .unwrap();

    let settings = ctx.settings.get().await.unwrap();
    assert_eq!(settings, committed);

    assert_eq!(settings.api_url, "https://ci.example.com");
    assert_eq!(settings.alerts.smtp.from, "alerts@example.com");
    assert_eq!(settings.alerts.smtp.port, 2525);
    assert_eq!(settings.alerts.smtp.admin_email, vec!["admin@example.com"]);
    assert_eq!(settings.api.http_listen_addr, ":8080");
    assert_eq!(settings.auth.naive.users[0].username, "alice");
    assert_eq!(settings.auth.github.client_id, "github-client");
    assert_eq!(
        settings.container_pools.pools,
        vec![container_pool(TEST_POOL, VALID_DISTRO)]
    );
    assert_eq!(settings.host_init.ssh_timeout_secs, 20);
    assert_eq!(settings.jira.host, "jira.example.com");
    assert_eq!(settings.job_queue.name, "service");
    assert_eq!(settings.job_queue.local_storage, 1024);
    assert_eq!(settings.logger.default_level, "info");
    assert_eq!(settings.logger.buffer.count, 100);
    assert_eq!(settings.notify.smtp.from, "notify@example.com");
    assert_eq!(settings.providers.aws.key, "aws-key");
    assert_eq!(settings.providers.docker.api_version, "1.41");
    assert_eq!(settings.providers.gce.project_id, "example-project");
    assert_eq!(settings.providers.openstack.region, "region-1");
    assert_eq!(settings.providers.vsphere.host, "vcenter.example.com");
    assert_eq!(settings.repo_tracker.max_concurrent_requests, 2);
    assert_eq!(settings.scheduler.task_finder, "legacy");
    assert!(settings.service_flags.host_init_disabled);
    assert_eq!(settings.slack.options.channel, "#ci");
    assert_eq!(settings.splunk.server_url, "https://splunk.example.com");
    assert_eq!(settings.ui.http_listen_addr, ":9090");
    assert_eq!(settings.ui.csrf_key.len(), 32);
    assert!(settings.ui.cache_templates);
}

#[tokio::test]
async fn validation_reports_all_violations_in_one_failure() {
    let ctx = TestContext::new();

    let mut candidate = Settings::default();
    candidate.ui.csrf_key = "12345".to_string();

    let err = ctx.settings.set(candidate, "user").await.unwrap_err();
    assert!(matches!(err, Error::ValidationFailed { .. }));

    let message = err.to_string();
    assert!(message.contains("API hostname must not be empty"));
    assert!(message.contains("CSRF key must be 32 characters long"));

    // Nothing was applied.
    assert_eq!(ctx.settings.get().await.unwrap(), Settings::default());
}

#[tokio::test]
async fn pool_reference_failures_are_distinguished() {
    let ctx = TestContext::new();
    ctx.seed_fleet().await;

    let mut candidate = sample_settings();
    candidate.container_pools.pools = vec![
        container_pool("test-pool-1", VALID_DISTRO),
        container_pool("test-pool-2", INVALID_DISTRO),
        container_pool("test-pool-3", "missing-distro"),
    ];

    let err = ctx.settings.set(candidate, "user").await.unwrap_err();
    let Error::ValidationFailed { errors } = err else {
        panic!("expected validation failure");
    };

    assert_eq!(
        errors,
        vec![
            "container pool test-pool-2 has invalid distro",
            "error finding distro for container pool test-pool-3",
        ]
    );
    assert!(errors.iter().all(|e| !e.contains("test-pool-1")));
}

#[tokio::test]
async fn every_accepted_change_leaves_an_audit_record() {
    let ctx = TestContext::new();
    ctx.seed_fleet().await;

    ctx.settings
        .set(sample_settings(), "user")
        .await
        .unwrap();

    let page = ctx.events.paginate(None, 10).await.unwrap();
    assert_eq!(page.events.len(), 1);

    let event = &page.events[0];
    assert!(!event.guid.is_empty());
    assert_eq!(event.user, "user");
    match &event.payload {
        AdminEventPayload::ConfigChange { before, after } => {
            assert_eq!(**before, Settings::default());
            assert_eq!(**after, sample_settings());
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[tokio::test]
async fn revert_is_reconstructive() {
    let ctx = TestContext::new();
    ctx.seed_fleet().await;

    let baseline = sample_settings();
    ctx.settings.set(baseline.clone(), "user").await.unwrap();
    settle().await;

    let mut change_a = sample_settings();
    change_a.super_users = vec!["me".to_string()];
    ctx.settings.set(change_a.clone(), "user").await.unwrap();
    settle().await;

    let mut change_b = sample_settings();
    change_b.super_users = vec!["someone-else".to_string()];
    ctx.settings.set(change_b.clone(), "user").await.unwrap();
    settle().await;

    // The record of change A: its after snapshot names "me".
    let page = ctx.events.paginate(None, 10).await.unwrap();
    let record_a = page
        .events
        .iter()
        .find(|event| match &event.payload {
            AdminEventPayload::ConfigChange { after, .. } => {
                after.super_users == vec!["me".to_string()]
            }
            AdminEventPayload::TaskRestart { .. } => false,
        })
        .expect("change A recorded");

    let warnings = ctx.settings.revert(&record_a.guid, "user").await.unwrap();
    assert!(warnings.is_empty());

    // Live state is what was in effect immediately before change A.
    assert_eq!(ctx.settings.get().await.unwrap(), baseline);

    // The revert produced a fresh record; history was not rewritten.
    let page = ctx.events.paginate(None, 10).await.unwrap();
    assert_eq!(page.events.len(), 4);
    match &page.events[0].payload {
        AdminEventPayload::ConfigChange { before, after } => {
            assert_eq!(**before, change_b);
            assert_eq!(**after, baseline);
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[tokio::test]
async fn revert_rejects_empty_identifier_without_mutation() {
    let ctx = TestContext::new();
    ctx.seed_fleet().await;

    let committed = sample_settings();
    ctx.settings.set(committed.clone(), "user").await.unwrap();

    let err = ctx.settings.revert("", "user").await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    assert_eq!(ctx.settings.get().await.unwrap(), committed);
    assert_eq!(ctx.events.paginate(None, 10).await.unwrap().events.len(), 1);
}

#[tokio::test]
async fn pagination_is_exact_at_the_cursor_boundary() {
    let ctx = TestContext::new();

    for i in 0..12 {
        let mut candidate = Settings::default();
        candidate.api_url = format!("https://ci-{i}.example.com");
        ctx.settings.set(candidate, "user").await.unwrap();
        settle().await;
    }

    let mut all = ctx.events.paginate(None, 100).await.unwrap().events;
    assert_eq!(all.len(), 12);
    all.reverse(); // oldest first

    // Exactly the first ten records are older than the eleventh's timestamp.
    let cursor = all[10].timestamp;
    let page = ctx.events.paginate(Some(cursor), 10).await.unwrap();
    assert_eq!(page.events.len(), 10);

    for pair in page.events.windows(2) {
        assert!(
            pair[0].timestamp > pair[1].timestamp,
            "events must be strictly descending"
        );
    }

    let expected: Vec<&str> = all[..10].iter().rev().map(|e| e.guid.as_str()).collect();
    let returned: Vec<&str> = page.events.iter().map(|e| e.guid.as_str()).collect();
    assert_eq!(returned, expected);

    let link = page.next.unwrap();
    assert_eq!(
        link.key,
        all[0]
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    );

    // The cursor value survives the string round trip a client performs.
    let reparsed: DateTime<Utc> = link.key.parse().unwrap();
    assert_eq!(reparsed, all[0].timestamp);
}

#[tokio::test]
async fn queue_clear_is_idempotent_and_total() {
    let ctx = TestContext::new();

    let queue = TaskQueue::new(
        "d1",
        vec![queue_item("task-1"), queue_item("task-2"), queue_item("task-3")],
    );
    ctx.queues.save(&queue).await.unwrap();
    assert_eq!(ctx.queues.load("d1").await.unwrap().len(), 3);

    ctx.queues.clear("d1").await.unwrap();
    assert!(ctx.queues.load("d1").await.unwrap().is_empty());

    ctx.queues.clear("d1").await.unwrap();
    assert!(ctx.queues.load("d1").await.unwrap().is_empty());
}

#[tokio::test]
async fn task_restart_events_cannot_be_reverted() {
    let ctx = TestContext::new();
    ctx.seed_fleet().await;

    let start = Utc::now() - chrono::Duration::hours(2);
    let end = Utc::now();
    ctx.finished
        .record(&finished_task("task-1", "d1", "failed", start))
        .await
        .unwrap();

    let summary = ctx
        .restarter()
        .restart_tasks(
            RestartOptions {
                start_time: start,
                end_time: end,
                dry_run: false,
            },
            "user",
        )
        .await
        .unwrap();
    assert_eq!(summary.restarted, vec!["task-1"]);
    assert_eq!(ctx.queues.load("d1").await.unwrap().len(), 1);

    let restart_record = &ctx.events.paginate(None, 1).await.unwrap().events[0];
    let err = ctx
        .settings
        .revert(&restart_record.guid, "user")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}
