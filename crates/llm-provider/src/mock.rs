use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::{LlmError, Result};
use crate::{CompletionOptions, CompletionProvider};

type Hook = Box<dyn Fn() + Send + Sync>;

/// Deterministic provider used for tests and offline development.
///
/// Replies are served in order; once exhausted every call fails with
/// [`LlmError::EmptyResponse`]. Prompts are kept for inspection.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
    hook: Option<Hook>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        self.replies.lock().push_back(Ok(text.into()));
        self
    }

    pub fn fail(self, error: LlmError) -> Self {
        self.replies.lock().push_back(Err(error));
        self
    }

    /// Run `hook` inside every call, before the reply is returned.
    pub fn on_call(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str, _options: &CompletionOptions) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        if let Some(hook) = &self.hook {
            hook();
        }
        self.replies
            .lock()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyResponse))
    }
}
