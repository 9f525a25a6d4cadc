use std::sync::Arc;

use action_locator::{
    AttemptOutcome, ElementLocator, LocatorError, LocatorSettings, ResolutionContext,
    ResolutionResult, ResolveRequest, Strategy, StrategyKind, StrategyOutcome, TextStrategy,
};
use async_trait::async_trait;
use guidepath_core_types::{PatternScope, StepClock, StepIntent, WorkflowContext};
use llm_provider::{CompletionProvider, LlmError, ScriptedProvider};
use memory_center::{PatternCache, SOURCE_MANUAL};
use perceiver_semantic::{Scorer, ScoringThresholds};
use perceiver_structural::{
    query_selector_all, DocumentHandle, DomSnapshot, ElementFacts, LiveDocument, NodeSpec,
    StaticDocument,
};

fn el(tag: &str) -> NodeSpec {
    NodeSpec::new(tag).rect(0.0, 0.0, 100.0, 20.0)
}

fn page(children: Vec<NodeSpec>) -> Arc<StaticDocument> {
    let snapshot = DomSnapshot::from_root(el("body").children(children))
        .with_url("https://app.example.com/library");
    Arc::new(StaticDocument::new(snapshot))
}

fn locator(provider: Option<Arc<dyn CompletionProvider>>) -> ElementLocator {
    ElementLocator::new(
        &LocatorSettings::default(),
        Arc::new(PatternCache::default()),
        provider,
    )
}

fn request(instruction: &str, document: Arc<StaticDocument>) -> ResolveRequest {
    ResolveRequest::new(StepIntent::new("step-1", instruction), document)
}

/// Two activatable controls, neither related to exporting anything.
fn unrelated_buttons() -> Arc<StaticDocument> {
    page(vec![
        el("div").text("Your library"),
        el("button").text("Help"),
        el("button").text("About"),
    ])
}

fn found_text(result: &ResolutionResult) -> &str {
    match result {
        ResolutionResult::Found { element, .. } => &element.text,
        other => panic!("expected a match, got {other:?}"),
    }
}

#[tokio::test]
async fn labelled_button_resolves_through_accessibility() {
    let document = page(vec![
        el("div").text("Recently played"),
        el("button").attr("aria-label", "Create playlist").text("New"),
    ]);
    let result = locator(None)
        .resolve(request("Click the Create playlist button", document))
        .await
        .unwrap();

    assert_eq!(result.strategy(), Some(StrategyKind::Accessibility));
    assert!(result.confidence().unwrap() >= 12.0);
    assert_eq!(result.selector(), Some("[aria-label=\"Create playlist\"]"));
}

#[tokio::test]
async fn text_entry_instruction_finds_the_input() {
    let mut children: Vec<NodeSpec> = (0..8)
        .map(|i| el("div").attr("class", "decor").text(format!("Section {i}")))
        .collect();
    children.push(el("input").attr("placeholder", "Enter playlist name"));
    let result = locator(None)
        .resolve(request("Enter your playlist name", page(children)))
        .await
        .unwrap();

    assert_eq!(result.strategy(), Some(StrategyKind::Accessibility));
    match result {
        ResolutionResult::Found { element, .. } => assert_eq!(element.tag, "input"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn typing_finds_an_editable_region() {
    let document = page(vec![
        el("div").attr("contenteditable", "true"),
        el("button").text("Menu"),
    ]);
    let result = locator(None)
        .resolve(request("Type something", document))
        .await
        .unwrap();

    assert_eq!(result.strategy(), Some(StrategyKind::Accessibility));
    assert!(result.confidence().unwrap() >= 12.0);
    match result {
        ResolutionResult::Found { element, .. } => {
            assert_eq!(element.tag, "div");
            assert_eq!(element.role.as_deref(), Some("textbox"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn typing_never_lands_on_a_button() {
    let document = page(vec![
        el("button").text("Submit"),
        el("input").attr("type", "text").attr("name", "q"),
    ]);
    let result = locator(None)
        .resolve(request("Type your message", document))
        .await
        .unwrap();
    match result {
        ResolutionResult::Found { element, .. } => assert_eq!(element.tag, "input"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn compose_is_not_confused_with_create_label() {
    let document = page(vec![
        el("a").attr("href", "#labels").text("Create label"),
        el("button").text("Compose"),
    ]);
    let result = locator(None)
        .resolve(request("Compose a new email", document))
        .await
        .unwrap();
    assert_eq!(found_text(&result), "Compose");
}

#[tokio::test]
async fn exhausted_chain_returns_guidance_then_teach_records_pattern() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply(r#"{"candidateId": null, "confidence": 0, "guidance": "Open the File menu first"}"#),
    );
    let locator = locator(Some(provider.clone()));
    let document = unrelated_buttons();

    let report = locator
        .resolve_detailed(request("Click the export report button", document.clone()))
        .await
        .unwrap();
    assert_eq!(report.result.guidance(), Some("Open the File menu first"));
    assert!(!report.result.is_found());
    assert_eq!(provider.calls(), 1);
    assert_eq!(report.attempts.last().map(|a| a.strategy), Some(StrategyKind::Ai));
    assert!(locator.cache().is_empty());

    let snapshot = document.snapshot();
    let clicked = snapshot.nodes().find(|n| n.tag == "div").unwrap().id;
    let intent = StepIntent::new("step-1", "Click the export report button");
    let pattern = locator
        .teach(&intent, document.as_ref(), clicked, &PatternScope::global())
        .await
        .unwrap();
    assert_eq!(pattern.success_count, 0);
    assert_eq!(pattern.failure_count, 0);
    assert_eq!(pattern.source, SOURCE_MANUAL);
    assert_eq!(locator.cache().len(), 1);
}

#[tokio::test]
async fn fenced_model_reply_picks_candidate() {
    let reply = "Here you go:\n```json\n{\n  \"candidateId\": \"candidate_1\",\n  \"confidence\": 85,\n  \"reasoning\": \"About\nis closest\",\n}\n```";
    let provider = Arc::new(ScriptedProvider::new().reply(reply));
    let locator = locator(Some(provider.clone()));
    let context = WorkflowContext {
        workflow_name: Some("Export".into()),
        previous_steps: vec!["Open the library".into()],
        current_step: "Click the export report button".into(),
        next_step: Some("Choose CSV".into()),
    };

    let result = locator
        .resolve(request("Click the export report button", unrelated_buttons()).with_context(context))
        .await
        .unwrap();
    assert_eq!(result.strategy(), Some(StrategyKind::Ai));
    assert_eq!(result.confidence(), Some(85.0));
    assert_eq!(found_text(&result), "About");
    assert!(result.pattern_id().is_some());

    let prompt = &provider.prompts()[0];
    assert!(prompt.contains("1. Open the library ✓"));
    assert!(prompt.contains("← YOU ARE HERE"));
    assert!(prompt.contains("candidate_1"));
}

#[tokio::test]
async fn model_outage_degrades_to_not_found() {
    let provider = Arc::new(ScriptedProvider::new().fail(LlmError::Unavailable("connection refused".into())));
    let report = locator(Some(provider))
        .resolve_detailed(request("Click the export report button", unrelated_buttons()))
        .await
        .unwrap();
    assert_eq!(report.result, ResolutionResult::not_found());
    assert!(matches!(
        report.attempts.last().map(|a| &a.outcome),
        Some(AttemptOutcome::Fault { .. })
    ));
}

#[tokio::test]
async fn duplicate_labels_reach_the_model_once() {
    let provider = Arc::new(ScriptedProvider::new().reply("I am not sure."));
    let document = page(vec![
        el("button").attr("aria-label", "Options"),
        el("button").attr("aria-label", "Options"),
    ]);
    let result = locator(Some(provider.clone()))
        .resolve(request("Click the export report button", document))
        .await
        .unwrap();

    assert_eq!(result.guidance(), Some("I am not sure."));
    let prompt = &provider.prompts()[0];
    assert!(prompt.contains("candidate_0"));
    assert!(!prompt.contains("candidate_1"));
}

#[tokio::test]
async fn repeated_resolution_returns_same_selector() {
    let locator = locator(None);
    let document = page(vec![el("button").attr("aria-label", "Create playlist").text("New")]);

    let first = locator
        .resolve(request("Click the Create playlist button", document.clone()))
        .await
        .unwrap();
    let second = locator
        .resolve(request("Click the Create playlist button", document))
        .await
        .unwrap();

    assert_eq!(first.selector(), second.selector());
    assert_eq!(second.strategy(), Some(StrategyKind::PatternCache));
    assert_eq!(first.pattern_id(), second.pattern_id());
    assert_eq!(locator.cache().len(), 1);
}

#[tokio::test]
async fn feedback_updates_recorded_pattern() {
    let locator = locator(None);
    let document = page(vec![el("button").attr("aria-label", "Create playlist")]);
    let result = locator
        .resolve(request("Click the Create playlist button", document))
        .await
        .unwrap();
    let id = result.pattern_id().unwrap().to_string();

    let updated = locator.feedback(&id, true).unwrap();
    assert_eq!(updated.confidence, 0.5);
    assert!(matches!(
        locator.feedback("missing", true),
        Err(LocatorError::NotFound(_))
    ));
}

#[tokio::test]
async fn patterns_stay_in_their_scope() {
    let locator = locator(None);
    let document = page(vec![el("button").attr("aria-label", "Create playlist")]);
    let library = PatternScope::new(Some("acme".into()), "library");

    locator
        .resolve(request("Click the Create playlist button", document.clone()).with_scope(library.clone()))
        .await
        .unwrap();
    let elsewhere = locator
        .resolve(request("Click the Create playlist button", document))
        .await
        .unwrap();

    assert_eq!(elsewhere.strategy(), Some(StrategyKind::Accessibility));
    assert_eq!(locator.cache().list(Some(&library)).len(), 1);
}

#[tokio::test]
async fn late_model_reply_is_discarded() {
    let clock = StepClock::new();
    let ticket = clock.ticket("step-1");
    let advancing = clock.clone();
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply(r#"{"candidateId": "candidate_0", "confidence": 90}"#)
            .on_call(move || {
                advancing.advance();
            }),
    );
    let locator = locator(Some(provider));

    let report = locator
        .resolve_detailed(request("Click the export report button", unrelated_buttons()).with_ticket(ticket))
        .await
        .unwrap();

    assert_eq!(report.result, ResolutionResult::not_found());
    assert_eq!(report.attempts.last().map(|a| &a.outcome), Some(&AttemptOutcome::Stale));
    assert!(locator.cache().is_empty());
}

#[tokio::test]
async fn candidate_removed_during_model_call_is_not_returned() {
    let document = Arc::new(LiveDocument::new(
        DomSnapshot::from_root(el("body").children(vec![
            el("button").text("Help"),
            el("button").text("About"),
        ]))
        .with_url("https://app.example.com/library"),
    ));
    let swapped = Arc::clone(&document);
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply(r#"{"candidateId": 0, "confidence": 70, "guidance": "Look in the toolbar"}"#)
            .on_call(move || {
                swapped.replace(DomSnapshot::from_root(el("body")));
            }),
    );
    let locator = locator(Some(provider));

    let result = locator
        .resolve(ResolveRequest::new(
            StepIntent::new("step-1", "Click the export report button"),
            document,
        ))
        .await
        .unwrap();

    assert!(!result.is_found());
    assert_eq!(result.guidance(), Some("Look in the toolbar"));
    assert!(locator.cache().is_empty());
}

fn live_buttons(labels: &[&str]) -> DomSnapshot {
    DomSnapshot::from_root(
        el("body").children(labels.iter().map(|label| el("button").text(*label)).collect::<Vec<_>>()),
    )
    .with_url("https://app.example.com/library")
}

/// Model picks `candidate_0` ("Help") and the page re-renders mid-call.
fn rerendering_locator(document: &Arc<LiveDocument>, after: &[&str]) -> ElementLocator {
    let swapped = Arc::clone(document);
    let after = live_buttons(after);
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply(r#"{"candidateId": "candidate_0", "confidence": 80}"#)
            .on_call(move || {
                swapped.replace(after.clone());
            }),
    );
    locator(Some(provider))
}

#[tokio::test]
async fn different_element_at_same_position_is_not_returned() {
    let document = Arc::new(LiveDocument::new(live_buttons(&["Help", "Delete account"])));
    let locator = rerendering_locator(&document, &["Delete account"]);

    let result = locator
        .resolve(ResolveRequest::new(
            StepIntent::new("step-1", "Click the export report button"),
            document.clone(),
        ))
        .await
        .unwrap();

    assert!(!result.is_found(), "got {result:?}");
    assert!(locator.cache().is_empty());
}

#[tokio::test]
async fn moved_element_is_reported_with_its_new_selector() {
    let document = Arc::new(LiveDocument::new(live_buttons(&["Help", "About"])));
    let locator = rerendering_locator(&document, &["Close", "Help", "About"]);

    let result = locator
        .resolve(ResolveRequest::new(
            StepIntent::new("step-1", "Click the export report button"),
            document.clone(),
        ))
        .await
        .unwrap();

    assert_eq!(result.strategy(), Some(StrategyKind::Ai));
    assert_eq!(found_text(&result), "Help");
    let live = document.snapshot();
    let hits = query_selector_all(&live, result.selector().unwrap()).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(ElementFacts::derive(&live, hits[0]).unwrap().text, "Help");
}

struct Exploding;

#[async_trait]
impl Strategy for Exploding {
    async fn resolve(&self, _ctx: &ResolutionContext) -> action_locator::Result<StrategyOutcome> {
        panic!("selector engine exploded");
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::AttributeMatch
    }
}

struct Failing;

#[async_trait]
impl Strategy for Failing {
    async fn resolve(&self, _ctx: &ResolutionContext) -> action_locator::Result<StrategyOutcome> {
        Err(LocatorError::ExternalServiceUnavailable("backend down".into()))
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::FuzzyKeyword
    }
}

#[tokio::test]
async fn broken_strategies_do_not_abort_the_chain() {
    let text = TextStrategy::new(Arc::new(Scorer::default()), &ScoringThresholds::default());
    let locator = ElementLocator::from_strategies(
        vec![Arc::new(Exploding), Arc::new(Failing), Arc::new(text)],
        Arc::new(PatternCache::default()),
    );
    let document = page(vec![el("button").text("Send")]);

    let report = locator
        .resolve_detailed(request("Send the message", document))
        .await
        .unwrap();

    assert_eq!(report.result.strategy(), Some(StrategyKind::Text));
    match &report.attempts[0].outcome {
        AttemptOutcome::Fault { reason } => assert!(reason.contains("selector engine exploded")),
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(report.attempts[1].outcome, AttemptOutcome::Fault { .. }));
}

#[tokio::test]
async fn empty_chain_is_a_configuration_fault() {
    let locator = ElementLocator::from_strategies(Vec::new(), Arc::new(PatternCache::default()));
    let err = locator
        .resolve(request("Click anything", unrelated_buttons()))
        .await
        .unwrap_err();
    assert!(matches!(err, LocatorError::Internal(_)));
}

#[tokio::test]
async fn author_hint_wins_over_scoring() {
    let document = page(vec![
        el("button").attr("aria-label", "Create playlist"),
        el("button").attr("id", "legacy-create").text("Old create"),
    ]);
    let intent = StepIntent::new("step-1", "Click the Create playlist button").with_hint("#legacy-create");
    let result = locator(None)
        .resolve(ResolveRequest::new(intent, document))
        .await
        .unwrap();
    assert_eq!(result.strategy(), Some(StrategyKind::DirectSelector));
    assert_eq!(result.selector(), Some("#legacy-create"));
    assert_eq!(result.confidence(), Some(1.0));
}
