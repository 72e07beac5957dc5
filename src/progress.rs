//! Crawl progress reporting.
//!
//! Reports observable progress during `depcrawl crawl` so users see which
//! page is being read, which repository is being resolved, and which ones
//! are skipped because an earlier run already finished them. Progress is
//! emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

use depcrawl_core::models::RepositoryRef;

/// A single progress event.
#[derive(Clone, Debug)]
pub enum CrawlProgressEvent {
    /// Requesting a search page.
    Paging { page: u32 },
    /// Resolving a repository; `n` counts repositories processed this run.
    Processing { repo: RepositoryRef, n: u64 },
    /// Repository already checkpointed by an earlier run.
    Skipped { repo: RepositoryRef },
}

/// Reports crawl progress. Implementations write to stderr (human or JSON).
pub trait CrawlProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the crawl driver.
    fn report(&self, event: CrawlProgressEvent);
}

/// Human-friendly progress on stderr: "crawl  processing  1,234  apple/swift-nio".
pub struct StderrProgress;

impl CrawlProgressReporter for StderrProgress {
    fn report(&self, event: CrawlProgressEvent) {
        let line = match &event {
            CrawlProgressEvent::Paging { page } => {
                format!("crawl  page {}\n", format_number(u64::from(*page)))
            }
            CrawlProgressEvent::Processing { repo, n } => {
                format!("crawl  processing  {}  {}\n", format_number(*n), repo)
            }
            CrawlProgressEvent::Skipped { repo } => {
                format!("crawl  skipping  {}, already processed\n", repo)
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl CrawlProgressReporter for JsonProgress {
    fn report(&self, event: CrawlProgressEvent) {
        let obj = match &event {
            CrawlProgressEvent::Paging { page } => serde_json::json!({
                "event": "progress",
                "phase": "paging",
                "page": page
            }),
            CrawlProgressEvent::Processing { repo, n } => serde_json::json!({
                "event": "progress",
                "phase": "processing",
                "repo": repo.to_string(),
                "n": n
            }),
            CrawlProgressEvent::Skipped { repo } => serde_json::json!({
                "event": "progress",
                "phase": "skipped",
                "repo": repo.to_string()
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl CrawlProgressReporter for NoProgress {
    fn report(&self, _event: CrawlProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode. Caller passes it to the crawl driver.
    pub fn reporter(&self) -> Box<dyn CrawlProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
