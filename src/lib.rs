//! # depcrawl
//!
//! A resumable crawler that maps the dependency graph of Swift packages
//! hosted on GitHub.
//!
//! depcrawl pages through GitHub's repository search for projects that
//! carry a `Package.swift` manifest, pulls each manifest from the default
//! branch, extracts its `.package(url:, from:)` declarations, and follows
//! every dependency back to its own manifest up to a depth bound. Progress
//! is checkpointed after every repository, so an interrupted crawl resumes
//! where it stopped.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ CrawlDriver  │──▶│  Resolver    │──▶│ManifestFetcher│──▶ RepositoryHost
//! │ page by page │   │ depth bound  │   │ branch + raw  │    (GitHub / memory)
//! └──────┬───────┘   └──────┬───────┘   └───────────────┘
//!        │                  └──▶ QuotaGuard (waits out rate-limit windows)
//!        ▼
//! ┌──────────────┐   ┌──────────────┐
//! │ records.jsonl│──▶│  CSV export  │
//! │checkpoint.json   └──────────────┘
//! └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GITHUB_TOKEN=...
//! depcrawl crawl                # crawl, checkpoint, export CSV
//! depcrawl crawl                # resume after an interruption
//! depcrawl status               # what is on disk
//! depcrawl export               # rewrite the CSV tables
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Host and crawl error types |
//! | [`host`] | Repository host trait, GitHub client, in-memory host |
//! | [`quota`] | Rate-limit gate |
//! | [`fetcher`] | Manifest retrieval |
//! | [`resolver`] | Recursive dependency resolution |
//! | [`checkpoint`] | JSON checkpoint file |
//! | [`journal`] | JSON Lines result journal |
//! | [`crawl`] | Crawl driver state machine |
//! | [`export`] | CSV export |
//! | [`progress`] | Progress reporting on stderr |
//! | [`status`] | `status` and `quota` commands |
//! | [`inspect`] | `extract` and `resolve` commands |

pub mod checkpoint;
pub mod config;
pub mod crawl;
pub mod error;
pub mod export;
pub mod fetcher;
pub mod host;
pub mod inspect;
pub mod journal;
pub mod progress;
pub mod quota;
pub mod resolver;
pub mod status;
