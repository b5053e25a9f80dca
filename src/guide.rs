use crate::{
    client::CompletionClient,
    error::Result,
    findings::Findings,
    prompts::PromptEngine,
    summarizer::SummaryLog,
};
use tracing::info;

/// Asks the model to turn the findings into a markdown developer guide.
pub(crate) struct Renderer<'a, C: CompletionClient + ?Sized> {
    client: &'a C,
    prompts: &'a PromptEngine,
}

impl<'a, C: CompletionClient + ?Sized> Renderer<'a, C> {
    pub(crate) const fn new(client: &'a C, prompts: &'a PromptEngine) -> Self {
        Self { client, prompts }
    }

    /// Returns the model's response verbatim.
    pub(crate) fn render(&self, log: &SummaryLog, findings: &Findings) -> Result<String> {
        let request = self.prompts.guide(&log.render(), &findings.to_json_pretty()?)?;
        let guide = self.client.complete(&request)?;

        info!("Received guide ({} lines)", guide.lines().count());
        Ok(guide)
    }
}
