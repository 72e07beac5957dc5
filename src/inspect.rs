//! One-off inspection commands.
//!
//! `depcrawl extract` runs the configured extractor over a local manifest
//! file, and `depcrawl resolve` resolves a single package location against
//! the live host. Both print dependency records as pretty JSON on stdout
//! and leave the checkpoint and journal untouched.

use std::path::Path;

use anyhow::{bail, Context, Result};
use depcrawl_core::extract::{ManifestExtractor, MarkerExtractor};
use depcrawl_core::models::{DependencyRecord, RepositoryRef};

use crate::config::Config;
use crate::crawl::{build_engine, github_host};
use crate::resolver::repository_for_location;

/// Extract dependencies from manifest text as if `repo` declared them.
pub fn extract_file(config: &Config, path: &Path, repo: &RepositoryRef) -> Result<Vec<DependencyRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
    Ok(MarkerExtractor::new(config.extractor.clone()).extract(&text, repo))
}

/// `depcrawl extract <file> [--repo owner/name]`.
pub fn run_extract(config: &Config, path: &Path, repo: Option<RepositoryRef>) -> Result<()> {
    let repo = repo.unwrap_or_else(|| RepositoryRef::new("local", "manifest"));
    let records = extract_file(config, path, &repo)?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

/// `depcrawl resolve <location>`.
pub async fn run_resolve(config: &Config, location: &str) -> Result<()> {
    if repository_for_location(location, &config.crawl.package_host_prefix).is_none() {
        bail!(
            "'{}' is not a repository under {}",
            location,
            config.crawl.package_host_prefix
        );
    }

    let host = github_host(config)?;
    let (_quota, resolver) = build_engine(config, host);
    let records = resolver.resolve(location, 1).await?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}
