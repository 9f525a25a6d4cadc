use std::sync::Arc;

use action_locator::{ElementLocator, LocatorSettings, ResolutionResult, StrategyKind};
use async_trait::async_trait;
use guidepath_cli::service::{GuideReply, GuideRequest, GuideService, DEFAULT_BUFFER};
use guidepath_core_types::StepClock;
use guidepath_recipes::{Workflow, WorkflowSession, WorkflowStep};
use llm_provider::{CompletionOptions, CompletionProvider};
use memory_center::PatternCache;
use perceiver_structural::{DomSnapshot, NodeSpec, StaticDocument};
use tokio::sync::Notify;

fn settings_page() -> Arc<StaticDocument> {
    let root = NodeSpec::new("body").rect(0.0, 0.0, 800.0, 600.0).children([
        NodeSpec::new("button")
            .attr("id", "save")
            .text("Save")
            .rect(10.0, 10.0, 80.0, 24.0),
        NodeSpec::new("a")
            .attr("href", "/settings")
            .attr("aria-label", "Settings")
            .text("Settings")
            .rect(100.0, 10.0, 80.0, 24.0),
    ]);
    Arc::new(StaticDocument::new(
        DomSnapshot::from_root(root).with_url("https://crm.example.com/contacts"),
    ))
}

fn workflow() -> Arc<Workflow> {
    Arc::new(
        Workflow::new("Save contact", "crm")
            .with_step(WorkflowStep::new("save", "save_contact", "Click Save").with_selector("#save"))
            .with_step(WorkflowStep::new("settings", "open_settings", "Open Settings")),
    )
}

fn locator() -> Arc<ElementLocator> {
    Arc::new(ElementLocator::new(
        &LocatorSettings::default(),
        Arc::new(PatternCache::default()),
        None,
    ))
}

#[tokio::test]
async fn walks_a_workflow_through_the_channel() {
    let clock = StepClock::new();
    let session = WorkflowSession::start(workflow(), clock.clone()).unwrap();
    let (handle, task) = GuideService::new(locator(), settings_page())
        .with_session(session)
        .spawn(DEFAULT_BUFFER);

    match handle.send(GuideRequest::CurrentStep).await.unwrap() {
        GuideReply::Step { position, moved } => {
            assert_eq!(position.index, 0);
            assert_eq!(position.total, 2);
            assert!(!moved);
        }
        other => panic!("unexpected reply: {other:?}"),
    }

    let pattern_id = match handle
        .send(GuideRequest::Resolve {
            instruction: None,
            target: None,
            selector: None,
        })
        .await
        .unwrap()
    {
        GuideReply::Resolved { result } => {
            assert_eq!(result.strategy(), Some(StrategyKind::DirectSelector));
            assert_eq!(result.selector(), Some("#save"));
            result.pattern_id().unwrap().to_string()
        }
        other => panic!("unexpected reply: {other:?}"),
    };

    match handle
        .send(GuideRequest::Feedback {
            pattern_id: pattern_id.clone(),
            success: true,
        })
        .await
        .unwrap()
    {
        GuideReply::FeedbackRecorded { pattern } => {
            assert_eq!(pattern.id, pattern_id);
            assert_eq!(pattern.success_count, 1);
            assert_eq!(pattern.confidence, 0.5);
        }
        other => panic!("unexpected reply: {other:?}"),
    }

    let before = clock.current();
    let advanced = handle.send(GuideRequest::Advance).await.unwrap();
    assert!(matches!(advanced, GuideReply::Step { moved: true, ref position } if position.index == 1));
    assert_eq!(clock.current(), before + 1);

    let at_end = handle.send(GuideRequest::Advance).await.unwrap();
    assert!(matches!(at_end, GuideReply::Step { moved: false, ref position } if position.index == 1));

    let back = handle.send(GuideRequest::Back).await.unwrap();
    assert!(matches!(back, GuideReply::Step { moved: true, ref position } if position.index == 0));

    drop(handle);
    task.await.unwrap();
}

#[tokio::test]
async fn teach_records_a_pattern_for_the_current_step() {
    let locator = locator();
    let session = WorkflowSession::start(workflow(), StepClock::new()).unwrap();
    let (handle, _task) = GuideService::new(Arc::clone(&locator), settings_page())
        .with_session(session)
        .spawn(DEFAULT_BUFFER);

    match handle
        .send(GuideRequest::Teach {
            instruction: None,
            selector: "a[href=\"/settings\"]".into(),
        })
        .await
        .unwrap()
    {
        GuideReply::Taught { pattern } => {
            assert_eq!(pattern.intent, "click save");
            assert_eq!(pattern.success_count, 0);
        }
        other => panic!("unexpected reply: {other:?}"),
    }
    assert_eq!(locator.cache().len(), 1);

    let missing = handle
        .send(GuideRequest::Teach {
            instruction: Some("Open help".into()),
            selector: "#help".into(),
        })
        .await
        .unwrap();
    assert!(matches!(missing, GuideReply::Error { .. }));
}

#[tokio::test]
async fn requests_without_a_workflow_need_an_instruction() {
    let (handle, _task) = GuideService::new(locator(), settings_page()).spawn(4);

    let reply = handle
        .send(GuideRequest::Resolve {
            instruction: None,
            target: None,
            selector: None,
        })
        .await
        .unwrap();
    assert!(matches!(reply, GuideReply::Error { .. }));
    assert!(matches!(
        handle.send(GuideRequest::Advance).await.unwrap(),
        GuideReply::Error { .. }
    ));

    let reply = handle
        .send(GuideRequest::Resolve {
            instruction: Some("Click Save".into()),
            target: None,
            selector: Some("#save".into()),
        })
        .await
        .unwrap();
    match reply {
        GuideReply::Resolved { result } => assert_eq!(result.selector(), Some("#save")),
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_senders_are_served_in_turn() {
    let session = WorkflowSession::start(workflow(), StepClock::new()).unwrap();
    let (handle, _task) = GuideService::new(locator(), settings_page())
        .with_session(session)
        .spawn(DEFAULT_BUFFER);
    let other = handle.clone();

    let (first, second) = tokio::join!(
        handle.send(GuideRequest::CurrentStep),
        other.send(GuideRequest::CurrentStep)
    );
    for reply in [first.unwrap(), second.unwrap()] {
        assert!(matches!(reply, GuideReply::Step { moved: false, .. }));
    }
}

/// Model that answers only once the test lets it.
#[derive(Default)]
struct HeldModel {
    called: Notify,
    release: Notify,
}

#[async_trait]
impl CompletionProvider for HeldModel {
    fn name(&self) -> &str {
        "held"
    }

    async fn complete(&self, _prompt: &str, _options: &CompletionOptions) -> llm_provider::Result<String> {
        self.called.notify_one();
        self.release.notified().await;
        Ok(r#"{"candidateId": "candidate_0", "confidence": 90}"#.to_string())
    }
}

#[tokio::test]
async fn advancing_during_a_model_call_discards_its_answer() {
    let model = Arc::new(HeldModel::default());
    let cache = Arc::new(PatternCache::default());
    let locator = Arc::new(ElementLocator::new(
        &LocatorSettings::default(),
        Arc::clone(&cache),
        Some(model.clone() as Arc<dyn CompletionProvider>),
    ));
    let workflow = Arc::new(
        Workflow::new("Export", "crm")
            .with_step(WorkflowStep::new("export", "export_report", "Click the export report button"))
            .with_step(WorkflowStep::new("done", "finish", "Open Settings")),
    );
    let session = WorkflowSession::start(workflow, StepClock::new()).unwrap();
    let (handle, _task) = GuideService::new(locator, settings_page())
        .with_session(session)
        .spawn(DEFAULT_BUFFER);

    let resolving = {
        let handle = handle.clone();
        tokio::spawn(async move {
            handle
                .send(GuideRequest::Resolve {
                    instruction: None,
                    target: None,
                    selector: None,
                })
                .await
        })
    };
    model.called.notified().await;

    let advanced = handle.send(GuideRequest::Advance).await.unwrap();
    assert!(matches!(advanced, GuideReply::Step { moved: true, .. }));
    model.release.notify_one();

    match resolving.await.unwrap().unwrap() {
        GuideReply::Resolved { result } => assert_eq!(result, ResolutionResult::not_found()),
        other => panic!("unexpected reply: {other:?}"),
    }
    assert!(cache.is_empty());
}
