use crate::{
    client::{CompletionClient, CompletionRequest},
    config::Config,
    error::{Error, Result},
    file::SourceFile,
    prompts::PromptEngine,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::{debug, info};

/// What a summary describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryKind {
    /// The project as a whole
    Overview,
    /// One source file
    File,
    /// One directory
    Directory,
}

/// One model-written summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// What is being summarized
    pub kind: SummaryKind,
    /// Relative path of the file or directory, root label for the overview
    pub subject: String,
    /// Text returned by the model
    pub text: String,
}

impl Summary {
    fn heading(&self) -> String {
        match self.kind {
            SummaryKind::Overview => "Project overview:".to_string(),
            SummaryKind::File => format!("File: {}", self.subject),
            SummaryKind::Directory => format!("Directory: {}", self.subject),
        }
    }
}

/// Ordered log of every summary produced during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryLog {
    entries: Vec<Summary>,
}

impl SummaryLog {
    /// Appends a summary.
    pub fn push(&mut self, kind: SummaryKind, subject: impl Into<String>, text: impl Into<String>) {
        self.entries.push(Summary {
            kind,
            subject: subject.into(),
            text: text.into(),
        });
    }

    /// All summaries in the order they were produced.
    #[must_use]
    pub fn entries(&self) -> &[Summary] {
        &self.entries
    }

    /// Summaries of the given kind.
    pub fn of_kind(&self, kind: SummaryKind) -> impl Iterator<Item = &Summary> {
        self.entries.iter().filter(move |s| s.kind == kind)
    }

    /// The project overview, if one was produced.
    #[must_use]
    pub fn overview(&self) -> Option<&Summary> {
        self.of_kind(SummaryKind::Overview).next()
    }

    /// Returns true if nothing has been summarized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the log as the raw-summary artifact.
    ///
    /// The overview comes first, every other entry keeps its production order.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let ordered = self
            .of_kind(SummaryKind::Overview)
            .chain(self.entries.iter().filter(|s| s.kind != SummaryKind::Overview));

        for summary in ordered {
            let _ = write!(out, "{}\n{}\n\n", summary.heading(), summary.text);
        }

        out
    }
}

/// Every summarized file plus each directory above it, directories marked
/// with a trailing `/`, in sorted order.
fn project_listing(paths: &[String]) -> Vec<String> {
    let mut entries = BTreeSet::new();

    for path in paths {
        for (idx, _) in path.match_indices('/') {
            entries.insert(path[..=idx].to_string());
        }
        entries.insert(path.clone());
    }

    entries.into_iter().collect()
}

/// Issues one completion request per file, then per directory, then one for
/// the whole project.
pub(crate) struct Summarizer<'a, C: CompletionClient + ?Sized> {
    client: &'a C,
    prompts: &'a PromptEngine,
    root_dir: PathBuf,
    summarize_directories: bool,
    calls: usize,
}

impl<'a, C: CompletionClient + ?Sized> Summarizer<'a, C> {
    pub(crate) fn new(client: &'a C, prompts: &'a PromptEngine, config: &Config) -> Self {
        Self {
            client,
            prompts,
            root_dir: config.root_dir.clone(),
            summarize_directories: config.summarize_directories,
            calls: 0,
        }
    }

    /// Number of completion requests issued so far.
    #[must_use]
    pub(crate) const fn calls(&self) -> usize {
        self.calls
    }

    fn call(&mut self, request: &CompletionRequest) -> Result<String> {
        self.calls += 1;
        self.client.complete(request)
    }

    /// Summarizes every file, then every directory, then the project.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoFiles`] when `files` is empty (before any request
    /// is made) and propagates the first completion failure.
    pub(crate) fn summarize<I>(&mut self, files: I) -> Result<SummaryLog>
    where
        I: IntoIterator<Item = SourceFile>,
    {
        let mut log = SummaryLog::default();
        let mut by_directory: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
        let mut paths = Vec::new();

        for file in files {
            info!("Analyzing file: {}", file.path);

            let request = self.prompts.file(&file)?;
            let text = self.call(&request)?;

            by_directory
                .entry(file.directory())
                .or_default()
                .push((file.file_name(), text.clone()));
            paths.push(file.path.clone());
            log.push(SummaryKind::File, file.path, text);
        }

        if paths.is_empty() {
            return Err(Error::no_files(&self.root_dir));
        }

        if self.summarize_directories {
            for (directory, files) in &by_directory {
                info!("Analyzing directory: {}", directory);

                let request = self.prompts.directory(directory, files)?;
                let text = self.call(&request)?;
                log.push(SummaryKind::Directory, directory.clone(), text);
            }
        }

        info!("Analyzing project overview");
        let root = self.root_dir.display().to_string();
        let request = self.prompts.overview(&root, &project_listing(&paths))?;
        let text = self.call(&request)?;
        log.push(SummaryKind::Overview, root, text);

        debug!(
            "Summarized {} files and {} directories with {} requests",
            paths.len(),
            if self.summarize_directories { by_directory.len() } else { 0 },
            self.calls
        );

        Ok(log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::PromptKind;
    use crate::test_support::ScriptedClient;

    fn config(summarize_directories: bool) -> Config {
        Config::builder()
            .root_dir("/srv/project")
            .api_key("test-key")
            .summarize_directories(summarize_directories)
            .build()
            .unwrap()
    }

    fn file(path: &str, contents: &str) -> SourceFile {
        SourceFile::new(path, PathBuf::from("/srv/project").join(path), contents)
    }

    #[test]
    fn test_empty_input_makes_no_requests() {
        let client = ScriptedClient::new();
        let config = config(true);
        let prompts = PromptEngine::new(&config).unwrap();
        let mut summarizer = Summarizer::new(&client, &prompts, &config);

        let err = summarizer.summarize(Vec::new()).unwrap_err();

        assert!(matches!(err, Error::NoFiles { .. }));
        assert!(client.calls().is_empty());
    }

    #[test]
    fn test_request_order() {
        let client = ScriptedClient::new();
        let config = config(true);
        let prompts = PromptEngine::new(&config).unwrap();
        let mut summarizer = Summarizer::new(&client, &prompts, &config);

        let log = summarizer
            .summarize(vec![
                file("a.txt", "hello"),
                file("src/lib.rs", "pub fn f() {}"),
                file("src/main.rs", "fn main() {}"),
            ])
            .unwrap();

        assert_eq!(
            client.calls(),
            vec![
                PromptKind::File,
                PromptKind::File,
                PromptKind::File,
                PromptKind::Directory,
                PromptKind::Directory,
                PromptKind::Overview,
            ]
        );
        assert_eq!(summarizer.calls(), 6);

        let directories: Vec<_> = log
            .of_kind(SummaryKind::Directory)
            .map(|s| s.subject.as_str())
            .collect();
        assert_eq!(directories, vec![".", "src"]);
        assert!(log.overview().is_some());
    }

    #[test]
    fn test_directory_summaries_can_be_disabled() {
        let client = ScriptedClient::new();
        let config = config(false);
        let prompts = PromptEngine::new(&config).unwrap();
        let mut summarizer = Summarizer::new(&client, &prompts, &config);

        summarizer.summarize(vec![file("a.txt", "hello")]).unwrap();

        assert_eq!(client.calls(), vec![PromptKind::File, PromptKind::Overview]);
    }

    #[test]
    fn test_api_failure_aborts() {
        let client = ScriptedClient::new().fail_on(PromptKind::File);
        let config = config(true);
        let prompts = PromptEngine::new(&config).unwrap();
        let mut summarizer = Summarizer::new(&client, &prompts, &config);

        let err = summarizer
            .summarize(vec![file("a.txt", "hello"), file("b.txt", "world")])
            .unwrap_err();

        assert!(err.is_api());
        assert_eq!(client.calls(), vec![PromptKind::File]);
    }

    #[test]
    fn test_project_listing_includes_directories() {
        let listing = project_listing(&[
            "a.txt".to_string(),
            "src/lib.rs".to_string(),
            "src/net/client.rs".to_string(),
        ]);

        assert_eq!(
            listing,
            vec!["a.txt", "src/", "src/lib.rs", "src/net/", "src/net/client.rs"]
        );
    }

    #[test]
    fn test_render_puts_overview_first() {
        let mut log = SummaryLog::default();
        log.push(SummaryKind::File, "a.txt", "greets");
        log.push(SummaryKind::Directory, ".", "root files");
        log.push(SummaryKind::Overview, "/p", "a greeting project");

        assert_eq!(
            log.render(),
            "Project overview:\na greeting project\n\n\
             File: a.txt\ngreets\n\n\
             Directory: .\nroot files\n\n"
        );
    }
}
