use crate::{
    client::CompletionClient,
    error::{Error, Result},
    prompts::PromptEngine,
    summarizer::{SummaryKind, SummaryLog},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Structured record of everything learned about the project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Findings {
    /// Project overview
    pub root_summary: String,
    /// Directory → summary
    pub directories: BTreeMap<String, String>,
    /// File → summary
    pub files: BTreeMap<String, String>,
    /// Topic → description, as decoded from the aggregation response
    pub topics: BTreeMap<String, String>,
}

impl Findings {
    /// Collects the per-item summaries of a log. Topics are left empty.
    #[must_use]
    pub fn from_log(log: &SummaryLog) -> Self {
        let mut findings = Self::default();

        for summary in log.entries() {
            match summary.kind {
                SummaryKind::Overview => findings.root_summary.clone_from(&summary.text),
                SummaryKind::File => {
                    findings
                        .files
                        .insert(summary.subject.clone(), summary.text.clone());
                }
                SummaryKind::Directory => {
                    findings
                        .directories
                        .insert(summary.subject.clone(), summary.text.clone());
                }
            }
        }

        findings
    }

    /// Serializes the findings as indented JSON.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Error::from)
    }
}

/// Decodes an aggregation response into a topic → description map.
///
/// A single surrounding markdown code fence is tolerated. Anything other than
/// a non-empty JSON object whose values are all strings is rejected.
///
/// # Errors
///
/// Returns [`Error::MalformedFindings`] describing the first problem found.
pub fn parse_topics(response: &str) -> Result<BTreeMap<String, String>> {
    let body = strip_code_fence(response);

    let value: Value = serde_json::from_str(body)
        .map_err(|e| Error::malformed_findings(format!("not valid JSON: {e}"), response))?;

    let Value::Object(map) = value else {
        return Err(Error::malformed_findings("expected a JSON object", response));
    };

    if map.is_empty() {
        return Err(Error::malformed_findings("the JSON object has no topics", response));
    }

    map.into_iter()
        .map(|(topic, description)| match description {
            Value::String(text) => Ok((topic, text)),
            other => Err(Error::malformed_findings(
                format!("topic '{topic}' is not a string (got {})", json_type(&other)),
                response,
            )),
        })
        .collect()
}

fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string (e.g. "json") on the opening line
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };

    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Turns the raw summaries into [`Findings`] with one completion request.
pub(crate) struct Aggregator<'a, C: CompletionClient + ?Sized> {
    client: &'a C,
    prompts: &'a PromptEngine,
}

impl<'a, C: CompletionClient + ?Sized> Aggregator<'a, C> {
    pub(crate) const fn new(client: &'a C, prompts: &'a PromptEngine) -> Self {
        Self { client, prompts }
    }

    /// Requests the topic breakdown and merges it with the log's summaries.
    ///
    /// # Errors
    ///
    /// Propagates completion failures and [`Error::MalformedFindings`].
    pub(crate) fn aggregate(&self, log: &SummaryLog) -> Result<Findings> {
        let request = self.prompts.findings(&log.render())?;
        let response = self.client.complete(&request)?;

        let topics = parse_topics(&response)?;
        info!("Decoded {} topics", topics.len());
        debug!("Topics: {:?}", topics.keys().collect::<Vec<_>>());

        let mut findings = Findings::from_log(log);
        findings.topics = topics;
        Ok(findings)
    }
}
