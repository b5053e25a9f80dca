use crate::{
    client::{AnthropicClient, CompletionClient},
    config::Config,
    error::{Error, Result},
    findings::Aggregator,
    guide::Renderer,
    prompts::PromptEngine,
    summarizer::{SummaryKind, Summarizer},
    walker::{Walk, Walker},
    writer::{Artifacts, RunStamp, Writer},
};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Statistics collected during a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Stamp shared by the artifacts
    pub stamp: RunStamp,

    /// Files sent to the model (or listed, in dry run mode)
    pub files_summarized: usize,

    /// Entries seen but skipped by the walker
    pub files_skipped: usize,

    /// Directories summarized
    pub directories_summarized: usize,

    /// Completion requests issued
    pub completion_calls: usize,

    /// Time spent walking and summarizing
    pub summarize_duration: Duration,

    /// Time spent on the findings request
    pub aggregate_duration: Duration,

    /// Time spent on the guide request
    pub render_duration: Duration,

    /// Total execution time
    pub duration: Duration,

    /// Written artifacts, `None` in dry run mode
    pub artifacts: Option<Artifacts>,
}

impl RunReport {
    fn empty(stamp: RunStamp) -> Self {
        Self {
            stamp,
            files_summarized: 0,
            files_skipped: 0,
            directories_summarized: 0,
            completion_calls: 0,
            summarize_duration: Duration::ZERO,
            aggregate_duration: Duration::ZERO,
            render_duration: Duration::ZERO,
            duration: Duration::ZERO,
            artifacts: None,
        }
    }

    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║               Guide Generation Summary                ║");
        println!("╠═══════════════════════════════════════════════════════╣");
        println!("║ Run:                  {:>15}                 ║", self.stamp);
        println!(
            "║ Files Summarized:     {:>8}                        ║",
            self.files_summarized
        );
        println!(
            "║ Files Skipped:        {:>8}                        ║",
            self.files_skipped
        );
        println!(
            "║ Directories:          {:>8}                        ║",
            self.directories_summarized
        );
        println!(
            "║ Completion Calls:     {:>8}                        ║",
            self.completion_calls
        );
        println!("║                                                       ║");

        match &self.artifacts {
            Some(artifacts) => {
                println!("║ Artifacts:                                            ║");
                println!("║   {}", artifacts.summaries.display());
                println!("║   {}", artifacts.findings.display());
                println!("║   {}", artifacts.guidebook.display());
            }
            None => println!("║ ⚠ No files were written (dry run mode)               ║"),
        }

        println!("║                                                       ║");
        println!("║ Timing Breakdown:                                     ║");
        println!(
            "║   - Summarizing:      {:>8.2}s                     ║",
            self.summarize_duration.as_secs_f64()
        );
        println!(
            "║   - Findings:         {:>8.2}s                     ║",
            self.aggregate_duration.as_secs_f64()
        );
        println!(
            "║   - Guide:            {:>8.2}s                     ║",
            self.render_duration.as_secs_f64()
        );
        println!(
            "║   - Total:            {:>8.2}s                     ║",
            self.duration.as_secs_f64()
        );
        println!("╚═══════════════════════════════════════════════════════╝\n");
    }
}

/// Runs the walk → summarize → aggregate → render sequence once.
pub struct Pipeline<C = AnthropicClient> {
    config: Config,
    client: C,
    walker: Walker,
    prompts: PromptEngine,
}

impl Pipeline<AnthropicClient> {
    /// Creates a pipeline that talks to the configured Messages API.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The HTTP client cannot be built
    /// - A prompt template or exclusion pattern is invalid
    pub fn new(config: Config) -> Result<Self> {
        let client = AnthropicClient::new(&config)?;
        Self::with_client(config, client)
    }
}

impl<C: CompletionClient> Pipeline<C> {
    /// Creates a pipeline using any completion client.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::new`].
    pub fn with_client(config: Config, client: C) -> Result<Self> {
        config.validate()?;

        let walker = Walker::new(&config)?;
        let prompts = PromptEngine::new(&config)?;

        Ok(Self {
            config,
            client,
            walker,
            prompts,
        })
    }

    /// Executes the pipeline, stamping artifacts with the current time.
    ///
    /// # Process
    ///
    /// 1. **Walk + summarize**: files are read lazily and summarized one by one
    /// 2. **Aggregate**: one request turns the summaries into structured findings
    /// 3. **Render**: one request turns the findings into the guide
    ///
    /// Any failure aborts the run. Artifacts already written stay on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if any stage fails.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use devguide::{Config, Pipeline};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let report = Pipeline::new(Config::from_env()?)?.run()?;
    /// report.print_summary();
    /// # Ok(())
    /// # }
    /// ```
    pub fn run(self) -> Result<RunReport> {
        self.run_at(RunStamp::now())
    }

    /// Executes the pipeline with an explicit stamp.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::run`].
    #[instrument(skip(self), fields(root_dir = %self.config.root_dir.display()))]
    pub fn run_at(self, stamp: RunStamp) -> Result<RunReport> {
        let start_time = Instant::now();
        info!("Starting guide generation");

        let mut walk = self.walker.walk()?;

        if self.config.dry_run {
            return self.dry_run(walk, stamp, start_time);
        }

        // Stage 1: Walking and summarizing
        info!("Stage 1/3: Summarizing project...");
        let summarize_start = Instant::now();
        let mut summarizer = Summarizer::new(&self.client, &self.prompts, &self.config);
        let log = summarizer.summarize(walk.by_ref())?;
        let summarize_duration = summarize_start.elapsed();

        let files_summarized = log.of_kind(SummaryKind::File).count();
        let directories_summarized = log.of_kind(SummaryKind::Directory).count();
        info!(
            "✓ Summarized {} files and {} directories in {:.2}s",
            files_summarized,
            directories_summarized,
            summarize_duration.as_secs_f64()
        );

        let stats = walk.stats();
        if stats.skipped() > 0 {
            warn!(
                "Skipped {} entries ({} excluded, {} binary, {} oversized, {} unreadable)",
                stats.skipped(),
                stats.excluded,
                stats.binary,
                stats.oversized,
                stats.errors
            );
        }

        let writer = Writer::new(&self.config.output_dir, &stamp);
        writer.write_summaries(&log)?;

        // Stage 2: Findings
        info!("Stage 2/3: Aggregating findings...");
        let aggregate_start = Instant::now();
        let findings = Aggregator::new(&self.client, &self.prompts).aggregate(&log)?;
        writer.write_findings(&findings)?;
        let aggregate_duration = aggregate_start.elapsed();

        // Stage 3: Guide
        info!("Stage 3/3: Rendering developer guide...");
        let render_start = Instant::now();
        let guide = Renderer::new(&self.client, &self.prompts).render(&log, &findings)?;
        writer.write_guidebook(&guide)?;
        let render_duration = render_start.elapsed();

        let duration = start_time.elapsed();
        info!(
            "✓ Guide generation completed in {:.2}s",
            duration.as_secs_f64()
        );

        Ok(RunReport {
            stamp,
            files_summarized,
            files_skipped: stats.skipped(),
            directories_summarized,
            completion_calls: summarizer.calls() + 2,
            summarize_duration,
            aggregate_duration,
            render_duration,
            duration,
            artifacts: Some(writer.artifacts().clone()),
        })
    }

    /// Lists the files that would be summarized.
    fn dry_run(
        &self,
        mut walk: Walk,
        stamp: RunStamp,
        start_time: Instant,
    ) -> Result<RunReport> {
        warn!("Dry run mode enabled - no completion requests, no files written");

        let mut report = RunReport::empty(stamp);

        for file in walk.by_ref() {
            info!("Would summarize: {} ({} lines)", file.path, file.line_count());
            report.files_summarized += 1;
        }

        if report.files_summarized == 0 {
            return Err(Error::no_files(walk.root_dir()));
        }

        report.files_skipped = walk.stats().skipped();
        report.duration = start_time.elapsed();
        Ok(report)
    }
}
