//! Typed request/response channel in front of the element locator.
//!
//! A single task owns the locator, the current document and the optional
//! workflow session, and takes requests in arrival order. Resolutions run
//! on their own tasks, so navigation can overtake a slow model call; the
//! overtaken resolution then comes back as stale `NotFound`.

use std::sync::Arc;

use action_locator::{ElementLocator, ResolutionResult, ResolveRequest};
use anyhow::{anyhow, Result};
use guidepath_core_types::{PatternScope, StepIntent};
use guidepath_recipes::{StepPosition, WorkflowSession};
use memory_center::LearnedPattern;
use perceiver_structural::DocumentHandle;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const DEFAULT_BUFFER: usize = 32;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GuideRequest {
    /// Resolve an ad-hoc instruction, or the current workflow step when
    /// `instruction` is omitted.
    Resolve {
        #[serde(default)]
        instruction: Option<String>,
        #[serde(default)]
        target: Option<String>,
        #[serde(default)]
        selector: Option<String>,
    },
    Teach {
        #[serde(default)]
        instruction: Option<String>,
        selector: String,
    },
    Feedback {
        pattern_id: String,
        success: bool,
    },
    Advance,
    Back,
    CurrentStep,
}

impl GuideRequest {
    fn label(&self) -> &'static str {
        match self {
            GuideRequest::Resolve { .. } => "resolve",
            GuideRequest::Teach { .. } => "teach",
            GuideRequest::Feedback { .. } => "feedback",
            GuideRequest::Advance => "advance",
            GuideRequest::Back => "back",
            GuideRequest::CurrentStep => "current_step",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GuideReply {
    Resolved { result: ResolutionResult },
    Taught { pattern: LearnedPattern },
    FeedbackRecorded { pattern: LearnedPattern },
    Step { position: StepPosition, moved: bool },
    Error { message: String },
}

impl GuideReply {
    fn error(message: impl Into<String>) -> Self {
        GuideReply::Error {
            message: message.into(),
        }
    }
}

struct Envelope {
    request: GuideRequest,
    reply: oneshot::Sender<GuideReply>,
}

/// Cloneable sender side of the service.
#[derive(Clone)]
pub struct GuideHandle {
    sender: mpsc::Sender<Envelope>,
}

impl GuideHandle {
    pub async fn send(&self, request: GuideRequest) -> Result<GuideReply> {
        let (reply, receiver) = oneshot::channel();
        self.sender
            .send(Envelope { request, reply })
            .await
            .map_err(|_| anyhow!("guide service has stopped"))?;
        receiver
            .await
            .map_err(|_| anyhow!("guide service dropped the request"))
    }
}

pub struct GuideService {
    locator: Arc<ElementLocator>,
    document: Arc<dyn DocumentHandle>,
    session: Option<WorkflowSession>,
    scope: PatternScope,
}

impl GuideService {
    pub fn new(locator: Arc<ElementLocator>, document: Arc<dyn DocumentHandle>) -> Self {
        Self {
            locator,
            document,
            session: None,
            scope: PatternScope::global(),
        }
    }

    pub fn with_session(mut self, session: WorkflowSession) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_scope(mut self, scope: PatternScope) -> Self {
        self.scope = scope;
        self
    }

    /// Move the service onto its own task. The task ends once every
    /// handle has been dropped.
    pub fn spawn(self, buffer: usize) -> (GuideHandle, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<Envelope>(buffer.max(1));
        let mut service = self;
        let task = tokio::spawn(async move {
            while let Some(Envelope { request, reply }) = receiver.recv().await {
                let label = request.label();
                if let GuideRequest::Resolve {
                    instruction,
                    target,
                    selector,
                } = request
                {
                    match service.resolve_request(instruction, target, selector) {
                        Ok(resolve) => {
                            let locator = Arc::clone(&service.locator);
                            tokio::spawn(async move {
                                deliver(label, reply, resolve_reply(&locator, resolve).await);
                            });
                        }
                        Err(message) => deliver(label, reply, GuideReply::error(message)),
                    }
                    continue;
                }
                let answer = service.handle(request).await;
                deliver(label, reply, answer);
            }
            debug!("guide service stopped");
        });
        (GuideHandle { sender }, task)
    }

    pub async fn handle(&mut self, request: GuideRequest) -> GuideReply {
        match request {
            GuideRequest::Resolve {
                instruction,
                target,
                selector,
            } => match self.resolve_request(instruction, target, selector) {
                Ok(request) => resolve_reply(&self.locator, request).await,
                Err(message) => GuideReply::error(message),
            },
            GuideRequest::Teach {
                instruction,
                selector,
            } => {
                let intent = match self.intent_for(instruction) {
                    Ok(intent) => intent,
                    Err(message) => return GuideReply::error(message),
                };
                match self
                    .locator
                    .teach_selector(&intent, self.document.as_ref(), &selector, &self.scope)
                    .await
                {
                    Ok(pattern) => GuideReply::Taught { pattern },
                    Err(err) => GuideReply::error(err.to_string()),
                }
            }
            GuideRequest::Feedback {
                pattern_id,
                success,
            } => match self.locator.feedback(&pattern_id, success) {
                Ok(pattern) => GuideReply::FeedbackRecorded { pattern },
                Err(err) => GuideReply::error(err.to_string()),
            },
            GuideRequest::Advance => self.navigate(|session| session.next().is_some()),
            GuideRequest::Back => self.navigate(|session| session.previous().is_some()),
            GuideRequest::CurrentStep => self.navigate(|_| false),
        }
    }

    /// Build the locator request, capturing the step ticket now so a later
    /// navigation marks the result stale.
    fn resolve_request(
        &self,
        instruction: Option<String>,
        target: Option<String>,
        selector: Option<String>,
    ) -> std::result::Result<ResolveRequest, String> {
        let mut intent = self.intent_for(instruction)?;
        if let Some(target) = target {
            intent = intent.with_target(target);
        }
        if let Some(selector) = selector {
            intent = intent.with_hint(selector);
        }
        let mut request =
            ResolveRequest::new(intent, Arc::clone(&self.document)).with_scope(self.scope.clone());
        if let Some(session) = &self.session {
            request = request
                .with_context(session.context())
                .with_ticket(session.ticket());
        }
        Ok(request)
    }

    fn intent_for(&self, instruction: Option<String>) -> std::result::Result<StepIntent, String> {
        match (instruction, &self.session) {
            (Some(instruction), _) if !instruction.trim().is_empty() => {
                Ok(StepIntent::adhoc(instruction))
            }
            (_, Some(session)) => Ok(session.intent()),
            _ => Err("no instruction given and no workflow is active".to_string()),
        }
    }

    fn navigate<F>(&mut self, step: F) -> GuideReply
    where
        F: FnOnce(&mut WorkflowSession) -> bool,
    {
        let Some(session) = self.session.as_mut() else {
            return GuideReply::error("no workflow is active");
        };
        let moved = step(session);
        GuideReply::Step {
            position: session.position(),
            moved,
        }
    }
}

async fn resolve_reply(locator: &ElementLocator, request: ResolveRequest) -> GuideReply {
    match locator.resolve(request).await {
        Ok(result) => GuideReply::Resolved { result },
        Err(err) => {
            warn!(error = %err, "resolution failed");
            GuideReply::error(err.to_string())
        }
    }
}

fn deliver(label: &'static str, reply: oneshot::Sender<GuideReply>, answer: GuideReply) {
    if reply.send(answer).is_err() {
        debug!(request = label, "requester went away before the reply");
    }
}
