use crate::client::{CompletionClient, CompletionRequest, PromptKind};
use crate::error::{Error, Result};
use std::cell::RefCell;

/// Deterministic completion client that records every request kind.
pub(crate) struct ScriptedClient {
    findings: String,
    fail_on: Option<PromptKind>,
    calls: RefCell<Vec<PromptKind>>,
}

impl ScriptedClient {
    pub(crate) fn new() -> Self {
        Self {
            findings: r#"{"architecture": "a linear pipeline", "testing": "unit tests"}"#.to_string(),
            fail_on: None,
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Replaces the response given to the findings request.
    pub(crate) fn findings_response(mut self, response: impl Into<String>) -> Self {
        self.findings = response.into();
        self
    }

    /// Makes every request of `kind` fail with an API error.
    pub(crate) fn fail_on(mut self, kind: PromptKind) -> Self {
        self.fail_on = Some(kind);
        self
    }

    pub(crate) fn calls(&self) -> Vec<PromptKind> {
        self.calls.borrow().clone()
    }
}

impl CompletionClient for ScriptedClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.calls.borrow_mut().push(request.kind);

        if self.fail_on == Some(request.kind) {
            return Err(Error::Api {
                status: 500,
                message: "scripted failure".to_string(),
            });
        }

        let subject = request.prompt.lines().next().unwrap_or_default();
        Ok(match request.kind {
            PromptKind::File => format!("file summary for [{subject}]"),
            PromptKind::Directory => format!("directory summary for [{subject}]"),
            PromptKind::Overview => "overview of the project".to_string(),
            PromptKind::Findings => self.findings.clone(),
            PromptKind::Guide => "# Developer Guide\n\nGenerated.\n".to_string(),
        })
    }
}
