//! End-to-end scenarios over in-memory fakes, a scripted transport and the
//! deterministic hash embedder.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod support;

use std::collections::HashMap;
use std::sync::Arc;

use stg_application::services::{ContextService, LibraryService, MissionService, TargetService};
use stg_application::{
    BodyLimits, HttpExecutor, MissionContext, RedactionPolicy, RequestLogger, RequestSpec, Store,
};
use stg_domain::entities::{ActionOutcome, ContextAuthor, MissionScope, Protocol};
use stg_domain::error::Error;
use stg_domain::ports::{
    ContextRepository, EmbeddingProvider, MissionRepository, NewContextVersion,
    RequestRepository, TransferFailureKind,
};
use stg_providers::embedding::HashEmbeddingProvider;

use support::{FakeCookieSource, StubTransport, fake_store};

fn embedder() -> Arc<dyn EmbeddingProvider> {
    Arc::new(HashEmbeddingProvider::new(384))
}

struct Gateway {
    executor: HttpExecutor,
    transport: Arc<StubTransport>,
    mission_context: Arc<MissionContext>,
}

fn gateway(store: Option<Store>, cookies: Option<Arc<FakeCookieSource>>) -> Gateway {
    let transport = Arc::new(StubTransport::new());
    let mission_context = Arc::new(MissionContext::new());
    let logger = Arc::new(RequestLogger::new(
        store,
        RedactionPolicy::default(),
        BodyLimits::default(),
    ));
    let cookie_source: Option<Arc<dyn stg_domain::ports::CookieProfileSource>> = match cookies {
        Some(source) => Some(source),
        None => None,
    };
    let executor = HttpExecutor::new(
        Arc::clone(&transport),
        cookie_source,
        logger,
        Arc::clone(&mission_context),
        None,
        BodyLimits::default(),
    );
    Gateway {
        executor,
        transport,
        mission_context,
    }
}

#[tokio::test]
async fn auto_target_creation_on_first_request() {
    let (store, db) = fake_store();
    let gw = gateway(Some(store), None);

    let envelope = gw
        .executor
        .execute(RequestSpec::new("https://api.example.com:443/v1/ping"))
        .await
        .expect("execute");
    assert_eq!(envelope.status, Some(200));
    assert!(envelope.request_id.is_some());

    let db = db.lock().unwrap();
    assert_eq!(db.targets.len(), 1);
    let target = &db.targets[0];
    assert_eq!(target.host, "api.example.com");
    assert_eq!(target.port, None, "scheme-default port is normalised away");
    assert_eq!(target.protocol, Protocol::Https);

    assert_eq!(db.requests.len(), 1);
    let request = &db.requests[0];
    assert_eq!(request.target_id, Some(target.id));
    assert_eq!(target.last_activity, Some(request.created_at));
}

#[tokio::test]
async fn requests_link_to_the_latest_action_of_the_active_mission() {
    let (store, db) = fake_store();
    let mission_context = Arc::new(MissionContext::new());
    let missions = MissionService::new(
        Some(store.clone()),
        Some(embedder()),
        Arc::clone(&mission_context),
    );

    let mission = missions
        .create(
            "auth probe".to_owned(),
            "probe auth".to_owned(),
            None,
            MissionScope::default(),
        )
        .await
        .expect("create mission");
    missions
        .set_context(&mission.id, None)
        .await
        .expect("set context");

    let (action, linked_at_record_time) = missions
        .record_action(
            "baseline GET".to_owned(),
            "200 OK".to_owned(),
            ActionOutcome::Success,
            None,
            None,
            None,
            3,
        )
        .await
        .expect("record action");
    assert_eq!(linked_at_record_time, 0, "no requests existed yet");

    // The executor shares the same mission context the service wrote to.
    let transport = Arc::new(StubTransport::new());
    let logger = Arc::new(RequestLogger::new(
        Some(store.clone()),
        RedactionPolicy::default(),
        BodyLimits::default(),
    ));
    let executor = HttpExecutor::new(
        Arc::clone(&transport),
        None,
        logger,
        Arc::clone(&mission_context),
        None,
        BodyLimits::default(),
    );

    for _ in 0..2 {
        executor
            .execute(RequestSpec::new("https://x.test/"))
            .await
            .expect("execute");
    }

    {
        let db = db.lock().unwrap();
        assert_eq!(db.requests.len(), 2);
        assert!(db.requests.iter().all(|r| r.action_id == Some(action.id)));
    }
    let recent = store
        .requests
        .recent_for_mission(&mission.id, 10)
        .await
        .expect("recent");
    assert_eq!(recent.len(), 2);
}

#[tokio::test]
async fn concurrent_context_appends_yield_exactly_one_winner() {
    let (store, db) = fake_store();
    let contexts = ContextService::new(Some(store.clone()));
    let targets = TargetService::new(Some(store.clone()));

    let (target, _) = targets
        .create(
            "app.test",
            None,
            Protocol::Https,
            None,
            stg_domain::entities::TargetStatus::Active,
            stg_domain::entities::RiskLevel::Medium,
            None,
        )
        .await
        .expect("create target");

    for i in 1..=3 {
        contexts
            .update(
                &target.id,
                None,
                Some(format!("note {i}")),
                None,
                false,
                ContextAuthor::Agent,
            )
            .await
            .expect("seed version");
    }

    // Both writers observed version 3; the second append must lose.
    let stale = NewContextVersion {
        user_context: String::new(),
        agent_context: "racer".to_owned(),
        created_by: ContextAuthor::Agent,
        change_summary: None,
        change_type: None,
        expected_version: Some(3),
    };
    let first = store.contexts.append(&target.id, stale.clone()).await;
    let second = store.contexts.append(&target.id, stale).await;

    let winner = first.expect("first append wins");
    assert_eq!(winner.version, 4);
    assert!(matches!(second.expect_err("loser"), Error::Conflict { .. }));

    // Chain from the head pointer covers 4..1 exactly once.
    let db = db.lock().unwrap();
    let head = db.targets[0].current_context_id.expect("head pointer");
    let mut visited = Vec::new();
    let mut cursor = Some(head);
    while let Some(id) = cursor {
        let ctx = db.contexts.iter().find(|c| c.id == id).expect("chain node");
        visited.push(ctx.version);
        cursor = ctx.parent_version_id;
    }
    assert_eq!(visited, vec![4, 3, 2, 1]);
}

#[tokio::test]
async fn library_rejects_near_duplicate_content() {
    let (store, _db) = fake_store();
    let library = LibraryService::new(Some(store), Some(embedder()));

    let first = library
        .add(
            "Unicode SQLi".to_owned(),
            "unicode sqli via u2019 homoglyph smuggling filter bypass".to_owned(),
            "injection".to_owned(),
            vec!["sqli".to_owned()],
            HashMap::new(),
        )
        .await
        .expect("first add");

    let err = library
        .add(
            "Unicode SQLi again".to_owned(),
            "unicode sqli via u2019 homoglyph smuggling filter bypass variant".to_owned(),
            "injection".to_owned(),
            vec![],
            HashMap::new(),
        )
        .await
        .expect_err("duplicate");
    match err {
        Error::Duplicate { existing_id, .. } => assert_eq!(existing_id, first.id.as_str()),
        other => panic!("expected duplicate, got {other:?}"),
    }
}

#[tokio::test]
async fn library_round_trips_exact_content_with_top_score() {
    let (store, _db) = fake_store();
    let library = LibraryService::new(Some(store), Some(embedder()));
    let content = "time based blind sqli with sleep payloads in order by clause";

    let entry = library
        .add(
            "Blind SQLi".to_owned(),
            content.to_owned(),
            "injection".to_owned(),
            vec![],
            HashMap::new(),
        )
        .await
        .expect("add");

    let hits = library.search(content, 10, 0.5, None).await.expect("search");
    assert_eq!(hits[0].0.id, entry.id);
    assert!(hits[0].1 >= 0.99, "exact content must score ~1.0");

    // Retrieval bumps usage statistics.
    let stats = library.stats().await.expect("stats");
    assert_eq!(stats.entry_count, 1);
    let stored = store_usage(&library).await;
    assert_eq!(stored, 1);
}

async fn store_usage(library: &LibraryService) -> i64 {
    // usage_count is surfaced through search results
    let hits = library
        .search("time based blind sqli with sleep payloads in order by clause", 1, 0.5, None)
        .await
        .expect("search");
    hits[0].0.usage_count
}

#[tokio::test]
async fn redirects_attribute_the_final_host() {
    let (store, db) = fake_store();
    let gw = gateway(Some(store), None);
    gw.transport
        .push(StubTransport::ok(200, "https://b.test/home", b"landed"));

    let envelope = gw
        .executor
        .execute(RequestSpec::new("http://a.test/"))
        .await
        .expect("execute");
    assert_eq!(envelope.final_url, "https://b.test/home");

    let db = db.lock().unwrap();
    assert_eq!(db.requests[0].final_url, "https://b.test/home");
    assert_eq!(db.requests[0].url, "http://a.test/");
    assert_eq!(db.targets.len(), 1);
    assert_eq!(db.targets[0].host, "b.test");
    assert_eq!(db.targets[0].protocol, Protocol::Https);
}

#[tokio::test]
async fn explicit_cookies_override_profile_entries_by_key() {
    let (store, _db) = fake_store();
    let mut profiles = HashMap::new();
    profiles.insert(
        "admin".to_owned(),
        HashMap::from([
            ("sid".to_owned(), "aaa".to_owned()),
            ("csrf".to_owned(), "bbb".to_owned()),
        ]),
    );
    let gw = gateway(Some(store), Some(Arc::new(FakeCookieSource { profiles })));

    let mut spec = RequestSpec::new("https://x.test/profile");
    spec.cookie_profile = Some("admin".to_owned());
    spec.cookies.insert("csrf".to_owned(), "ccc".to_owned());
    gw.executor.execute(spec).await.expect("execute");

    let seen = gw.transport.seen.lock().unwrap();
    assert_eq!(seen[0].cookies["sid"], "aaa");
    assert_eq!(seen[0].cookies["csrf"], "ccc", "explicit wins by key");
}

#[tokio::test]
async fn active_cookie_profile_applies_when_none_is_given() {
    let (store, _db) = fake_store();
    let mut profiles = HashMap::new();
    profiles.insert(
        "admin".to_owned(),
        HashMap::from([("sid".to_owned(), "aaa".to_owned())]),
    );
    let gw = gateway(Some(store), Some(Arc::new(FakeCookieSource { profiles })));
    gw.mission_context.set(
        stg_domain::value_objects::MissionId::new(),
        "probe".to_owned(),
        Some("admin".to_owned()),
    );

    gw.executor
        .execute(RequestSpec::new("https://x.test/"))
        .await
        .expect("execute");

    let seen = gw.transport.seen.lock().unwrap();
    assert_eq!(seen[0].cookies["sid"], "aaa", "profile from the mission context");
}

#[tokio::test]
async fn logging_failures_never_fail_the_http_call() {
    let (store, db) = fake_store();
    db.lock().unwrap().fail_request_insert = true;
    let gw = gateway(Some(store), None);

    let envelope = gw
        .executor
        .execute(RequestSpec::new("https://x.test/"))
        .await
        .expect("execute must still succeed");
    assert_eq!(envelope.status, Some(200));
    assert!(envelope.request_id.is_none());
    assert!(
        envelope.logging.iter().any(|n| n.starts_with("request_insert:")),
        "failure is reported in the side channel: {:?}",
        envelope.logging
    );
}

#[tokio::test]
async fn target_attribution_failures_still_persist_the_request() {
    let (store, db) = fake_store();
    db.lock().unwrap().fail_target_upsert = true;
    let gw = gateway(Some(store), None);

    let envelope = gw
        .executor
        .execute(RequestSpec::new("https://x.test/"))
        .await
        .expect("execute");
    assert!(envelope.request_id.is_some(), "insert runs despite step 2 failing");

    let db = db.lock().unwrap();
    assert_eq!(db.requests.len(), 1);
    assert_eq!(db.requests[0].target_id, None);
}

#[tokio::test]
async fn store_less_mode_executes_without_logging() {
    let gw = gateway(None, None);
    let envelope = gw
        .executor
        .execute(RequestSpec::new("https://x.test/"))
        .await
        .expect("execute");
    assert_eq!(envelope.status, Some(200));
    assert!(envelope.request_id.is_none());
    assert!(envelope.logging.iter().any(|n| n.contains("store unavailable")));
}

#[tokio::test]
async fn transfer_failures_are_persisted_with_error_and_no_status() {
    let (store, db) = fake_store();
    let gw = gateway(Some(store), None);
    gw.transport.push(StubTransport::failed(
        TransferFailureKind::Timeout,
        "timeout",
        "https://slow.test/",
    ));

    let envelope = gw
        .executor
        .execute(RequestSpec::new("https://slow.test/"))
        .await
        .expect("execute");
    assert_eq!(envelope.status, None);
    assert_eq!(envelope.error.as_deref(), Some("timeout"));

    let db = db.lock().unwrap();
    assert_eq!(db.requests[0].status_code, None);
    assert_eq!(db.requests[0].error.as_deref(), Some("timeout"));
}

#[tokio::test]
async fn target_status_updates_follow_the_state_machine() {
    let (store, _db) = fake_store();
    let targets = TargetService::new(Some(store));

    let (target, _) = targets
        .create(
            "machine.test",
            None,
            Protocol::Https,
            None,
            stg_domain::entities::TargetStatus::Active,
            stg_domain::entities::RiskLevel::Medium,
            None,
        )
        .await
        .expect("create");

    let blocked = targets
        .update_status(
            &target.id,
            Some(stg_domain::entities::TargetStatus::Blocked),
            None,
            None,
        )
        .await
        .expect("active -> blocked");
    assert_eq!(blocked.status, stg_domain::entities::TargetStatus::Blocked);

    let err = targets
        .update_status(
            &target.id,
            Some(stg_domain::entities::TargetStatus::Completed),
            None,
            None,
        )
        .await
        .expect_err("blocked -> completed is illegal");
    assert_eq!(err.kind(), "validation_failed");

    let recovered = targets
        .update_status(
            &target.id,
            Some(stg_domain::entities::TargetStatus::Active),
            None,
            None,
        )
        .await
        .expect("blocked recovers to active");
    assert_eq!(recovered.status, stg_domain::entities::TargetStatus::Active);
}

#[tokio::test]
async fn active_mission_requests_associate_their_targets() {
    let (store, _db) = fake_store();
    let mission_context = Arc::new(MissionContext::new());
    let missions = MissionService::new(
        Some(store.clone()),
        Some(embedder()),
        Arc::clone(&mission_context),
    );
    let mission = missions
        .create(
            "assoc".to_owned(),
            "map targets".to_owned(),
            None,
            MissionScope::default(),
        )
        .await
        .expect("mission");
    missions.set_context(&mission.id, None).await.expect("set");

    let transport = Arc::new(StubTransport::new());
    let logger = Arc::new(RequestLogger::new(
        Some(store.clone()),
        RedactionPolicy::default(),
        BodyLimits::default(),
    ));
    let executor = HttpExecutor::new(
        Arc::clone(&transport),
        None,
        logger,
        Arc::clone(&mission_context),
        None,
        BodyLimits::default(),
    );
    executor
        .execute(RequestSpec::new("https://assoc.test/"))
        .await
        .expect("execute");

    let associated = store.missions.targets(&mission.id).await.expect("targets");
    assert_eq!(associated.len(), 1);

    store
        .missions
        .dissociate_target(&mission.id, &associated[0])
        .await
        .expect("dissociate");
    assert!(store.missions.targets(&mission.id).await.expect("targets").is_empty());
}

#[tokio::test]
async fn context_updates_append_or_replace_per_mode() {
    let (store, _db) = fake_store();
    let targets = TargetService::new(Some(store.clone()));
    let contexts = ContextService::new(Some(store));

    let (target, _) = targets
        .create(
            "ctx.test",
            None,
            Protocol::Https,
            None,
            stg_domain::entities::TargetStatus::Active,
            stg_domain::entities::RiskLevel::Medium,
            None,
        )
        .await
        .expect("create");

    contexts
        .update(
            &target.id,
            None,
            Some("first".to_owned()),
            None,
            true,
            ContextAuthor::Agent,
        )
        .await
        .expect("v1");
    let v2 = contexts
        .update(
            &target.id,
            None,
            Some("second".to_owned()),
            None,
            true,
            ContextAuthor::Agent,
        )
        .await
        .expect("v2");
    assert_eq!(v2.version, 2);
    assert!(v2.agent_context.ends_with("second"));
    assert!(v2.agent_context.starts_with("first"));

    let v3 = contexts
        .update(
            &target.id,
            None,
            Some("fresh".to_owned()),
            None,
            false,
            ContextAuthor::Agent,
        )
        .await
        .expect("v3");
    assert_eq!(v3.agent_context, "fresh");

    let view = contexts.get(&target.id, None, true).await.expect("view");
    assert_eq!(view.current.expect("current").version, 3);
    assert_eq!(view.history.expect("history").len(), 3);
}

#[tokio::test]
async fn record_action_sweeps_recent_mission_requests_into_the_new_action() {
    let (store, db) = fake_store();
    let mission_context = Arc::new(MissionContext::new());
    let missions = MissionService::new(
        Some(store.clone()),
        Some(embedder()),
        Arc::clone(&mission_context),
    );
    let mission = missions
        .create(
            "sweep".to_owned(),
            "sweep goal".to_owned(),
            None,
            MissionScope::default(),
        )
        .await
        .expect("mission");
    missions.set_context(&mission.id, None).await.expect("set");

    let (first_action, _) = missions
        .record_action(
            "recon".to_owned(),
            "mapped endpoints".to_owned(),
            ActionOutcome::Success,
            None,
            None,
            None,
            3,
        )
        .await
        .expect("first action");

    let transport = Arc::new(StubTransport::new());
    let logger = Arc::new(RequestLogger::new(
        Some(store.clone()),
        RedactionPolicy::default(),
        BodyLimits::default(),
    ));
    let executor = HttpExecutor::new(
        Arc::clone(&transport),
        None,
        logger,
        Arc::clone(&mission_context),
        None,
        BodyLimits::default(),
    );
    for _ in 0..2 {
        executor
            .execute(RequestSpec::new("https://sweep.test/"))
            .await
            .expect("execute");
    }

    let (second_action, linked) = missions
        .record_action(
            "exploit".to_owned(),
            "worked".to_owned(),
            ActionOutcome::Success,
            None,
            None,
            None,
            3,
        )
        .await
        .expect("second action");
    assert_eq!(linked, 2, "both requests re-link to the new action");
    assert_ne!(first_action.id, second_action.id);

    let db = db.lock().unwrap();
    assert!(db
        .requests
        .iter()
        .all(|r| r.action_id == Some(second_action.id)));
}
