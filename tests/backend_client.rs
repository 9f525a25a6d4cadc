use std::sync::Arc;
use std::time::Duration;

use action_locator::{ElementLocator, LocatorSettings, ResolveRequest, StrategyKind};
use guidepath_cli::backend::BackendClient;
use guidepath_core_types::{PatternScope, StepIntent, WorkflowContext};
use memory_center::{LearnedPattern, PatternCache, PatternError, PatternStore, SOURCE_IMPORTED};
use perceiver_structural::{DomSnapshot, NodeSpec, StaticDocument};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> BackendClient {
    BackendClient::new(format!("{}/api/", server.uri()), Duration::from_secs(5)).unwrap()
}

fn save_button_page() -> Arc<StaticDocument> {
    let root = NodeSpec::new("body").rect(0.0, 0.0, 800.0, 600.0).child(
        NodeSpec::new("button")
            .attr("id", "save")
            .text("Save")
            .rect(10.0, 10.0, 80.0, 24.0),
    );
    Arc::new(StaticDocument::new(
        DomSnapshot::from_root(root).with_url("https://crm.example.com/contacts"),
    ))
}

#[tokio::test]
async fn save_posts_pattern_and_adopts_server_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/patterns"))
        .and(body_partial_json(serde_json::json!({
            "intent": "click save",
            "selector": "#save",
            "scope": "acme/contacts"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": "srv-42",
            "intent": "click save",
            "selector": "#save",
            "scope": "acme/contacts",
            "confidence": 0.0,
            "success_count": 0,
            "failure_count": 0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let scope = PatternScope::new(Some("acme".into()), "contacts");
    let local = LearnedPattern::new("Click Save", "#save", scope.clone(), "text");
    let stored = client_for(&server).save(&local).await.unwrap();

    assert_eq!(stored.id, "srv-42");
    assert_eq!(stored.scope, scope);
    assert_eq!(stored.source, SOURCE_IMPORTED);
}

#[tokio::test]
async fn find_queries_by_intent_and_scope_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/patterns"))
        .and(query_param("intent", "click save"))
        .and(query_param("scope", "*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "p1", "intent": "click save", "selector": "#save", "confidence": 0.75,
             "success_count": 3, "failure_count": 0},
            {"intent": "click save", "selector": "button.primary"}
        ])))
        .mount(&server)
        .await;

    let found = client_for(&server)
        .find("click save", &PatternScope::global())
        .await
        .unwrap();

    assert_eq!(found.len(), 2);
    assert_eq!(found[0].id, "p1");
    assert_eq!(found[0].success_count, 3);
    assert_eq!(found[1].scope, PatternScope::global());
    assert!(!found[1].id.is_empty());
}

#[tokio::test]
async fn server_errors_become_remote_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/patterns"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database offline"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .find("click save", &PatternScope::global())
        .await
        .unwrap_err();
    match err {
        PatternError::Remote(message) => {
            assert!(message.contains("500"), "{message}");
            assert!(message.contains("database offline"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn element_finder_sends_context() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/element-finder"))
        .and(body_partial_json(serde_json::json!({
            "intent": "Click Save",
            "url": "https://crm.example.com/contacts",
            "scope": "*",
            "context": {"workflow_name": "Add contact", "current_step": "Click Save"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "selector": "#save",
            "confidence": 0.9,
            "source": "pattern"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let context = WorkflowContext {
        workflow_name: Some("Add contact".into()),
        current_step: "Click Save".into(),
        ..WorkflowContext::default()
    };
    let hint = client_for(&server)
        .find_element(
            "Click Save",
            Some(&context),
            "https://crm.example.com/contacts",
            &PatternScope::global(),
        )
        .await
        .unwrap();
    assert_eq!(hint.selector.as_deref(), Some("#save"));
    assert_eq!(hint.source.as_deref(), Some("pattern"));
}

#[tokio::test]
async fn resolution_uses_remote_patterns_on_local_miss() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/patterns"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "remote-1", "intent": "click save", "selector": "#save", "confidence": 0.8,
             "success_count": 4, "failure_count": 0}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(PatternCache::default().with_remote(Arc::new(client_for(&server))));
    let locator = ElementLocator::new(&LocatorSettings::default(), Arc::clone(&cache), None);

    let request = ResolveRequest::new(StepIntent::adhoc("Click  Save"), save_button_page());
    let result = locator.resolve(request).await.unwrap();
    assert_eq!(result.strategy(), Some(StrategyKind::PatternCache));
    assert_eq!(result.selector(), Some("#save"));
    assert_eq!(result.pattern_id(), Some("remote-1"));

    // Adopted locally: the second lookup never reaches the server.
    let again = ResolveRequest::new(StepIntent::adhoc("click save"), save_button_page());
    assert!(locator.resolve(again).await.unwrap().is_found());
}

#[tokio::test]
async fn unreachable_backend_never_blocks_resolution() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let client = BackendClient::new(uri, Duration::from_millis(500)).unwrap();
    let cache = Arc::new(PatternCache::default().with_remote(Arc::new(client)));
    let locator = ElementLocator::new(&LocatorSettings::default(), Arc::clone(&cache), None);

    let request = ResolveRequest::new(StepIntent::adhoc("Click Save"), save_button_page());
    let result = locator.resolve(request).await.unwrap();
    assert!(result.is_found());
    assert_ne!(result.strategy(), Some(StrategyKind::PatternCache));
    assert_eq!(cache.len(), 1);
    assert!(cache.stats().remote_failures >= 1);
}
