use crate::{
    client::{CompletionRequest, PromptKind},
    config::Config,
    error::{Error, Result},
    file::SourceFile,
    token::{SimpleTokenizer, TokenEstimator},
};
use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera, Value};
use tracing::{trace, warn};

#[derive(Serialize)]
struct FileView<'a> {
    name: &'a str,
    summary: &'a str,
}

/// Renders the prompts sent at each pipeline stage.
pub(crate) struct PromptEngine {
    tera: Tera,
    language: String,
    context_tokens: usize,
    estimator: SimpleTokenizer,
}

impl PromptEngine {
    /// Creates a prompt engine from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in template fails to parse.
    pub(crate) fn new(config: &Config) -> Result<Self> {
        let mut tera = Tera::default();

        Self::register_builtin_templates(&mut tera)?;
        tera.register_filter("fence_language", Self::fence_language_filter);

        Ok(Self {
            tera,
            language: config.language.clone(),
            context_tokens: config.context_tokens,
            estimator: SimpleTokenizer,
        })
    }

    fn register_builtin_templates(tera: &mut Tera) -> Result<()> {
        let templates = [
            (PromptKind::File, include_str!("../templates/file.tera")),
            (PromptKind::Directory, include_str!("../templates/directory.tera")),
            (PromptKind::Overview, include_str!("../templates/overview.tera")),
            (PromptKind::Findings, include_str!("../templates/findings.tera")),
            (PromptKind::Guide, include_str!("../templates/guide.tera")),
        ];

        for (kind, source) in templates {
            let name = kind.template_name();
            tera.add_raw_template(name, source)
                .map_err(|e| Error::template(name, e))?;
        }

        Ok(())
    }

    /// Maps a file path to the info string of a markdown code fence.
    fn fence_language_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        let Some(path) = value.as_str() else {
            return Ok(Value::String(String::new()));
        };

        let ext = path.rsplit_once('.').map_or("", |(_, ext)| ext);
        let language = match ext {
            "rs" => "rust",
            "py" => "python",
            "js" | "mjs" | "cjs" => "javascript",
            "ts" => "typescript",
            "jsx" => "jsx",
            "tsx" => "tsx",
            "go" => "go",
            "java" => "java",
            "kt" => "kotlin",
            "c" | "h" => "c",
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => "cpp",
            "cs" => "csharp",
            "rb" => "ruby",
            "php" => "php",
            "swift" => "swift",
            "sh" | "bash" => "bash",
            "html" | "htm" => "html",
            "css" => "css",
            "scss" => "scss",
            "xml" => "xml",
            "json" => "json",
            "yaml" | "yml" => "yaml",
            "toml" => "toml",
            "md" | "markdown" => "markdown",
            "sql" => "sql",
            "proto" => "protobuf",
            _ => "",
        };

        Ok(Value::String(language.to_string()))
    }

    fn system_prompt(&self, kind: PromptKind) -> String {
        let role = match kind {
            PromptKind::File => "You are an AI assistant that analyzes source code files.",
            PromptKind::Directory => "You are an AI assistant that analyzes code directories.",
            PromptKind::Overview => {
                "You are an AI assistant that summarizes the main language and the purpose of a project."
            }
            PromptKind::Findings => {
                "You are an AI assistant that organizes project analyses into structured JSON."
            }
            PromptKind::Guide => {
                "You are an expert technical writer who creates clear, well organized developer guides."
            }
        };

        format!("{role} Respond in {}.", self.language)
    }

    fn render(&self, kind: PromptKind, mut context: Context) -> Result<CompletionRequest> {
        let name = kind.template_name();
        context.insert("language", &self.language);

        let prompt = self
            .tera
            .render(name, &context)
            .map_err(|e| Error::template(name, e))?;

        let tokens = self.estimator.estimate(&prompt);
        trace!("Rendered {} prompt (~{} tokens)", name, tokens);
        if tokens > self.context_tokens {
            warn!(
                "{} prompt is ~{} tokens, above the {} token budget; the endpoint may reject it",
                name, tokens, self.context_tokens
            );
        }

        Ok(CompletionRequest {
            kind,
            system: self.system_prompt(kind),
            prompt,
        })
    }

    /// Prompt asking for a summary of one file.
    pub(crate) fn file(&self, file: &SourceFile) -> Result<CompletionRequest> {
        let mut context = Context::new();
        context.insert("path", &file.path);
        context.insert("content", &file.contents);
        self.render(PromptKind::File, context)
    }

    /// Prompt asking how the files of one directory work together.
    pub(crate) fn directory(&self, path: &str, files: &[(String, String)]) -> Result<CompletionRequest> {
        let views: Vec<FileView<'_>> = files
            .iter()
            .map(|(name, summary)| FileView { name, summary })
            .collect();

        let mut context = Context::new();
        context.insert("path", path);
        context.insert("files", &views);
        self.render(PromptKind::Directory, context)
    }

    /// Prompt asking for the project's main language and purpose.
    pub(crate) fn overview(&self, root: &str, paths: &[String]) -> Result<CompletionRequest> {
        let mut context = Context::new();
        context.insert("root", root);
        context.insert("paths", paths);
        self.render(PromptKind::Overview, context)
    }

    /// Prompt asking for the topic → description breakdown.
    pub(crate) fn findings(&self, summaries: &str) -> Result<CompletionRequest> {
        let mut context = Context::new();
        context.insert("summaries", summaries);
        self.render(PromptKind::Findings, context)
    }

    /// Prompt asking for the final guide.
    pub(crate) fn guide(&self, summaries: &str, findings_json: &str) -> Result<CompletionRequest> {
        let mut context = Context::new();
        context.insert("summaries", summaries);
        context.insert("findings", findings_json);
        self.render(PromptKind::Guide, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn engine(language: &str) -> PromptEngine {
        let config = Config::builder()
            .root_dir("/srv/project")
            .api_key("test-key")
            .language(language)
            .build()
            .unwrap();
        PromptEngine::new(&config).unwrap()
    }

    #[test]
    fn test_file_prompt() {
        let file = SourceFile::new("src/main.rs", PathBuf::from("/p/src/main.rs"), "fn main() {}");
        let request = engine("English").file(&file).unwrap();

        assert_eq!(request.kind, PromptKind::File);
        assert!(request.prompt.contains("Analyze this file: src/main.rs"));
        assert!(request.prompt.contains("```rust\nfn main() {}\n```"));
        assert!(request.prompt.contains("Write everything in English."));
        assert!(request.system.contains("source code files"));
    }

    #[test]
    fn test_content_is_not_escaped_or_interpreted() {
        let file = SourceFile::new(
            "page.html",
            PathBuf::from("/p/page.html"),
            "<p>{{ user }} & {% raw %}</p>",
        );
        let request = engine("English").file(&file).unwrap();

        assert!(request.prompt.contains("<p>{{ user }} & {% raw %}</p>"));
    }

    #[test]
    fn test_language_flows_into_every_prompt() {
        let engine = engine("Brazilian Portuguese");
        let requests = [
            engine.directory("src", &[("a.rs".to_string(), "does a".to_string())]).unwrap(),
            engine.overview("/p", &["a.rs".to_string()]).unwrap(),
            engine.findings("File: a.rs\ndoes a").unwrap(),
            engine.guide("File: a.rs\ndoes a", "{}").unwrap(),
        ];

        for request in &requests {
            assert!(request.prompt.contains("Brazilian Portuguese"));
            assert!(request.system.ends_with("Respond in Brazilian Portuguese."));
        }
    }

    #[test]
    fn test_directory_prompt_lists_files() {
        let request = engine("English")
            .directory(
                "src/net",
                &[
                    ("client.rs".to_string(), "HTTP client".to_string()),
                    ("server.rs".to_string(), "HTTP server".to_string()),
                ],
            )
            .unwrap();

        assert!(request.prompt.contains("Analyze this directory: src/net"));
        assert!(request.prompt.contains("### client.rs\nHTTP client"));
        assert!(request.prompt.contains("### server.rs\nHTTP server"));
    }

    #[test]
    fn test_overview_prompt_lists_paths() {
        let request = engine("English")
            .overview("/p", &["a.rs".to_string(), "src/b.rs".to_string()])
            .unwrap();

        assert_eq!(request.kind, PromptKind::Overview);
        assert!(request.prompt.contains("a.rs\nsrc/b.rs\n"));
    }

    #[test]
    fn test_guide_prompt_embeds_findings() {
        let request = engine("English")
            .guide("File: a.rs", "{\n  \"topics\": {}\n}")
            .unwrap();

        assert!(request.prompt.contains("\"topics\""));
        assert!(request.prompt.contains("Executive Summary"));
    }

    #[test]
    fn test_fence_language_filter() {
        let cases = [
            ("test.rs", "rust"),
            ("script.py", "python"),
            ("config.toml", "toml"),
            ("Makefile", ""),
            ("unknown.xyz", ""),
        ];

        for (path, expected) in cases {
            let value = Value::String(path.to_string());
            let result = PromptEngine::fence_language_filter(&value, &HashMap::new()).unwrap();
            assert_eq!(result.as_str().unwrap(), expected);
        }
    }
}
