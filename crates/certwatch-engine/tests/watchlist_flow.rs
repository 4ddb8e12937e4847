mod common;

use certwatch_common::types::{CertStatus, MANUAL_ISSUER};
use certwatch_engine::cert::scheduler::RefreshScheduler;
use common::{build_test_context, ScriptedProbe};
use std::time::Duration;

fn watched_id(ctx: &common::TestContext, domain: &str) -> i64 {
    ctx.store.get_watched_by_domain(domain).unwrap().unwrap().id
}

#[tokio::test]
async fn adding_same_domain_twice_is_rejected() {
    let ctx = build_test_context(ScriptedProbe::new(&[]));

    let first = ctx.app.add_watched_domain("example.com", Some("Main"));
    assert!(first.success, "{}", first.message);

    let second = ctx.app.add_watched_domain(" example.com ", None);
    assert!(!second.success);
    assert!(second.error.unwrap().contains("already being watched"));

    assert_eq!(ctx.store.list_watched().unwrap().len(), 1);
}

#[tokio::test]
async fn empty_domain_cannot_be_watched() {
    let ctx = build_test_context(ScriptedProbe::new(&[]));
    let result = ctx.app.add_watched_domain("  ", None);
    assert!(!result.success);
    assert!(result.message.contains("domain must not be empty"), "{}", result.message);
    assert!(ctx.store.list_watched().unwrap().is_empty());
}

#[tokio::test]
async fn import_counts_duplicates_as_skipped() {
    let ctx = build_test_context(ScriptedProbe::new(&[]));

    let result = ctx
        .app
        .import_domains_from_text("a.com\n#comment\n\nb.com,Bob\na.com");
    assert!(result.success);
    assert_eq!(result.total, 3);
    assert_eq!(result.success_count, 2);
    assert_eq!(result.skipped_count, 1);
    assert_eq!(result.failed_count, 0);
    assert!(result.failed_domains.is_empty());
    assert_eq!(
        result.message,
        "import finished: total 3, succeeded 2, skipped 1, failed 0"
    );

    let bob = ctx.store.get_watched_by_domain("b.com").unwrap().unwrap();
    assert_eq!(bob.nickname.as_deref(), Some("Bob"));
}

#[tokio::test]
async fn import_reads_csv_exports_and_drops_blank_domains() {
    let ctx = build_test_context(ScriptedProbe::new(&[]));

    let result = ctx
        .app
        .import_domains_from_text("a.com,Bob,safe,42\n,Orphan\nb.com,,2030-01-01");
    assert!(result.success);
    assert_eq!(result.total, 2);
    assert_eq!(result.success_count, 2);
    assert_eq!(result.failed_count, 0);
    assert!(result.failed_domains.is_empty());

    let a = ctx.store.get_watched_by_domain("a.com").unwrap().unwrap();
    assert_eq!(a.nickname.as_deref(), Some("Bob"));
    let b = ctx.store.get_watched_by_domain("b.com").unwrap().unwrap();
    assert!(b.nickname.is_none());
}

#[tokio::test]
async fn import_of_only_comments_is_rejected() {
    let ctx = build_test_context(ScriptedProbe::new(&[]));

    let result = ctx.app.import_domains_from_text("# nothing\n\n");
    assert!(!result.success);
    assert_eq!(result.total, 0);

    let result = ctx.app.import_domains_from_text("");
    assert!(!result.success);

    let result = ctx.app.import_domains_from_text(",Nobody\n");
    assert!(!result.success);
    assert_eq!(result.total, 0);
    assert!(ctx.store.list_watched().unwrap().is_empty());
}

#[tokio::test]
async fn manual_mode_round_trip_skips_network() {
    let ctx = build_test_context(ScriptedProbe::new(&[]));
    ctx.app.add_watched_domain("intranet.example", None);
    let id = watched_id(&ctx, "intranet.example");

    let rejected = ctx.app.update_manual_cert_info(id, "2024-01-01", "2024-01-01");
    assert!(!rejected.success);

    let saved = ctx.app.update_manual_cert_info(id, "2024-01-01", "2030-01-01");
    assert!(saved.success, "{}", saved.message);

    let listing = ctx.app.get_watched_domains().await;
    assert!(listing.success);
    assert_eq!(listing.total, 1);
    let view = &listing.domains[0];
    let cert = view.cert_info.as_ref().unwrap();
    assert_eq!(cert.not_after, "2030-01-01 00:00:00");
    assert_eq!(cert.not_before, "2024-01-01 00:00:00");
    assert_eq!(cert.issuer, MANUAL_ISSUER);
    assert_eq!(cert.subject, "intranet.example");
    assert!(view.watched.is_manual);
    assert!(view.watched.last_check_time.is_none());
    assert!(ctx.probe.calls().is_empty());

    assert!(ctx.app.disable_manual_mode(id).success);
    let listing = ctx.app.get_watched_domains().await;
    assert!(listing.domains[0].cert_info.is_none());
    assert_eq!(ctx.probe.calls(), vec!["intranet.example".to_string()]);
}

#[tokio::test]
async fn listing_attaches_live_status_and_stamps_check_time() {
    let ctx = build_test_context(ScriptedProbe::new(&[("up.example", 12)]));
    ctx.app.add_watched_domain("up.example", None);
    ctx.app.add_watched_domain("down.example", Some("Flaky"));

    let listing = ctx.app.get_watched_domains().await;
    assert!(listing.success);
    assert_eq!(listing.total, 2);

    let up = listing.domains.iter().find(|v| v.watched.domain == "up.example").unwrap();
    let cert = up.cert_info.as_ref().unwrap();
    assert_eq!(cert.days_remaining, 12);
    assert_eq!(cert.status, CertStatus::Warning);
    assert!(up.watched.last_check_time.is_some());

    let down = listing.domains.iter().find(|v| v.watched.domain == "down.example").unwrap();
    assert!(down.cert_info.is_none());
    assert!(down.watched.last_check_time.is_none());

    // listing never writes history
    assert_eq!(ctx.store.count_history().unwrap(), 0);
}

#[tokio::test]
async fn refresh_one_stamps_without_history() {
    let ctx = build_test_context(ScriptedProbe::new(&[("up.example", 100)]));
    ctx.app.add_watched_domain("up.example", None);

    let result = ctx.app.refresh_watched_domain("up.example").await;
    assert!(result.success);
    assert_eq!(result.data.unwrap().days_remaining, 100);

    let row = ctx.store.get_watched_by_domain("up.example").unwrap().unwrap();
    assert!(row.last_check_time.is_some());
    assert_eq!(ctx.store.count_history().unwrap(), 0);

    let failed = ctx.app.refresh_watched_domain("down.example").await;
    assert!(!failed.success);
}

#[tokio::test]
async fn notifications_exclude_expired_and_disabled() {
    let ctx = build_test_context(ScriptedProbe::new(&[
        ("soon.example", 5),
        ("gone.example", -3),
        ("later.example", 20),
        ("quiet.example", 3),
        ("far.example", 200),
    ]));
    let domains = [
        "soon.example",
        "gone.example",
        "later.example",
        "quiet.example",
        "far.example",
    ];
    for domain in domains {
        assert!(ctx.app.add_watched_domain(domain, None).success);
    }
    for (domain, threshold) in [
        ("soon.example", 7),
        ("gone.example", 30),
        ("later.example", 30),
        ("far.example", 30),
    ] {
        let id = watched_id(&ctx, domain);
        assert!(ctx.app.update_notify_settings(id, true, threshold).success);
    }

    let result = ctx.app.check_notifications().await;
    assert!(result.success);
    assert_eq!(result.total, 2);

    let mut domains: Vec<&str> = result.items.iter().map(|i| i.domain.as_str()).collect();
    domains.sort();
    assert_eq!(domains, vec!["later.example", "soon.example"]);
    assert!(result.items.iter().all(|i| i.days_remaining >= 0));

    let soon = result.items.iter().find(|i| i.domain == "soon.example").unwrap();
    assert_eq!(soon.threshold, 7);
    assert_eq!(soon.status, CertStatus::Danger);
}

#[tokio::test]
async fn notifications_on_empty_watchlist() {
    let ctx = build_test_context(ScriptedProbe::new(&[]));
    let result = ctx.app.check_notifications().await;
    assert!(result.success);
    assert_eq!(result.total, 0);
    assert!(result.items.is_empty());
}

#[tokio::test]
async fn out_of_range_threshold_keeps_prior_settings() {
    let ctx = build_test_context(ScriptedProbe::new(&[]));
    ctx.app.add_watched_domain("example.com", None);
    let id = watched_id(&ctx, "example.com");

    assert!(ctx.app.update_notify_settings(id, true, 14).success);

    let result = ctx.app.update_notify_settings(id, true, 400);
    assert!(!result.success);
    assert!(result.error.is_some());

    let row = ctx.store.get_watched(id).unwrap().unwrap();
    assert!(row.notify_enabled);
    assert_eq!(row.notify_threshold, 14);
}

#[tokio::test]
async fn rename_and_remove() {
    let ctx = build_test_context(ScriptedProbe::new(&[]));
    ctx.app.add_watched_domain("example.com", None);
    let id = watched_id(&ctx, "example.com");

    assert!(ctx.app.update_watched_domain_nickname(id, "Home").success);
    let row = ctx.store.get_watched(id).unwrap().unwrap();
    assert_eq!(row.nickname.as_deref(), Some("Home"));

    assert!(ctx.app.remove_watched_domain(id).success);
    assert!(ctx.store.get_watched(id).unwrap().is_none());
    // unknown ids are a no-op, not an error
    assert!(ctx.app.remove_watched_domain(id).success);
}

#[tokio::test]
async fn scheduler_cycle_reports_expiring_domains() {
    let ctx = build_test_context(ScriptedProbe::new(&[("soon.example", 2), ("fine.example", 90)]));
    ctx.app.add_watched_domain("soon.example", None);
    ctx.app.add_watched_domain("fine.example", None);
    for domain in ["soon.example", "fine.example"] {
        let id = watched_id(&ctx, domain);
        ctx.app.update_notify_settings(id, true, 7);
    }

    let scheduler = RefreshScheduler::new(ctx.app.watchlist().clone(), Duration::from_secs(60));
    let items = scheduler.run_once().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].domain, "soon.example");
    assert_eq!(items[0].days_remaining, 2);

    let refreshed = ctx.app.refresh_all_watched_domains().await;
    assert!(refreshed.success);
    assert_eq!(refreshed.message, "refreshed 2 watched domains");
}
