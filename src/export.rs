//! Export crawl results as CSV.
//!
//! Reads every record from the result journal and writes two tables into
//! the output directory:
//!
//! - `repositories.csv`: `owner,name,url,stars,last_updated,dependency_count`,
//!   one row per crawled repository. `dependency_count` counts only the
//!   dependencies its own manifest declares.
//! - `dependencies.csv`: `declaring_repo,package_url,version,depth,parent_package`,
//!   one row per dependency record at every depth, in tree pre-order.
//!
//! Both files are rewritten from scratch on every export.

use std::path::Path;

use anyhow::{Context, Result};
use depcrawl_core::graph::{flatten_edges, DependencyEdge};
use depcrawl_core::models::RepositoryRecord;
use depcrawl_core::store::ResultSink;
use serde::Serialize;
use tracing::info;

use crate::config::{Config, OutputConfig};
use crate::journal::JsonlSink;

#[derive(Serialize)]
struct RepositoryRow<'a> {
    owner: &'a str,
    name: &'a str,
    url: &'a str,
    stars: u64,
    last_updated: String,
    dependency_count: usize,
}

impl<'a> From<&'a RepositoryRecord> for RepositoryRow<'a> {
    fn from(record: &'a RepositoryRecord) -> Self {
        Self {
            owner: &record.repo.owner,
            name: &record.repo.name,
            url: &record.url,
            stars: record.star_count,
            last_updated: record.last_updated.to_rfc3339(),
            dependency_count: record.dependencies.len(),
        }
    }
}

/// Row counts written by one export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportCounts {
    pub repositories: usize,
    pub dependencies: usize,
}

/// Write both CSV tables from everything in `sink`.
pub async fn export_csv(sink: &dyn ResultSink, output: &OutputConfig) -> Result<ExportCounts> {
    let records = sink.records().await?;
    let edges = flatten_edges(&records);

    std::fs::create_dir_all(&output.dir).with_context(|| {
        format!("Failed to create output directory: {}", output.dir.display())
    })?;
    write_repositories(&output.repositories_csv_path(), &records)?;
    write_dependencies(&output.dependencies_csv_path(), &edges)?;

    info!(
        repositories = records.len(),
        dependencies = edges.len(),
        "exported results to {}",
        output.dir.display()
    );
    Ok(ExportCounts {
        repositories: records.len(),
        dependencies: edges.len(),
    })
}

pub fn write_repositories(path: &Path, records: &[RepositoryRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for record in records {
        writer.serialize(RepositoryRow::from(record))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_dependencies(path: &Path, edges: &[DependencyEdge]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for edge in edges {
        writer.serialize(edge)?;
    }
    writer.flush()?;
    Ok(())
}

/// `depcrawl export`: rewrite the CSV tables from the journal.
pub async fn run_export(config: &Config) -> Result<()> {
    let sink = JsonlSink::new(config.output.journal_path());
    let counts = export_csv(&sink, &config.output).await?;

    println!("export {}", config.output.dir.display());
    println!(
        "  {}: {} rows",
        config.output.repositories_csv, counts.repositories
    );
    println!(
        "  {}: {} rows",
        config.output.dependencies_csv, counts.dependencies
    );
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use depcrawl_core::models::{DependencyRecord, RepositoryRef};
    use depcrawl_core::store::memory::InMemorySink;
    use tempfile::TempDir;

    fn output_in(dir: &Path) -> OutputConfig {
        OutputConfig {
            dir: dir.to_path_buf(),
            ..OutputConfig::default()
        }
    }

    fn record() -> RepositoryRecord {
        let repo = RepositoryRef::new("vapor", "vapor");
        let mut nio = DependencyRecord::new(
            "https://github.com/apple/swift-nio.git",
            "2.0.0",
            repo.clone(),
            0,
        );
        nio.sub_dependencies.push(DependencyRecord::new(
            "https://github.com/apple/swift-atomics.git",
            "1.0.2",
            RepositoryRef::new("apple", "swift-nio"),
            1,
        ));
        let crypto = DependencyRecord::new(
            "https://github.com/apple/swift-crypto.git",
            "",
            repo.clone(),
            0,
        );
        RepositoryRecord {
            repo,
            url: "https://github.com/vapor/vapor".to_string(),
            star_count: 24000,
            last_updated: Utc.with_ymd_and_hms(2024, 3, 2, 10, 30, 0).unwrap(),
            dependencies: vec![nio, crypto],
        }
    }

    #[tokio::test]
    async fn writes_both_tables() {
        let tmp = TempDir::new().unwrap();
        let output = output_in(&tmp.path().join("results"));
        let sink = InMemorySink::new();
        sink.append(&record()).await.unwrap();

        let counts = export_csv(&sink, &output).await.unwrap();
        assert_eq!(
            counts,
            ExportCounts {
                repositories: 1,
                dependencies: 3
            }
        );

        let repos = std::fs::read_to_string(output.repositories_csv_path()).unwrap();
        assert_eq!(
            repos,
            "owner,name,url,stars,last_updated,dependency_count\n\
             vapor,vapor,https://github.com/vapor/vapor,24000,2024-03-02T10:30:00+00:00,2\n"
        );

        let deps = std::fs::read_to_string(output.dependencies_csv_path()).unwrap();
        let lines: Vec<&str> = deps.lines().collect();
        assert_eq!(
            lines[0],
            "declaring_repo,package_url,version,depth,parent_package"
        );
        assert_eq!(
            lines[1],
            "vapor/vapor,https://github.com/apple/swift-nio.git,2.0.0,0,"
        );
        assert_eq!(
            lines[2],
            "apple/swift-nio,https://github.com/apple/swift-atomics.git,1.0.2,1,\
             https://github.com/apple/swift-nio.git"
        );
        assert_eq!(
            lines[3],
            "vapor/vapor,https://github.com/apple/swift-crypto.git,,0,"
        );
    }

    #[tokio::test]
    async fn empty_sink_writes_empty_tables() {
        let tmp = TempDir::new().unwrap();
        let output = output_in(tmp.path());
        let counts = export_csv(&InMemorySink::new(), &output).await.unwrap();

        assert_eq!(counts.repositories, 0);
        assert!(output.repositories_csv_path().exists());
        assert!(output.dependencies_csv_path().exists());
    }
}
