//! # Quackstack
//!
//! A local code index for asking questions about a repository.
//!
//! Quackstack segments source files into function and class level
//! fragments, enriches them with git history, projects them into a TF-IDF
//! vector space built from the whole project, and stores everything in
//! SQLite. Queries are ranked by cosine similarity (optionally boosted by
//! recency and commit frequency) and the top fragments are handed to an
//! LLM provider as context.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌──────────┐
//! │  Scanner    │──▶│ Segment + TF-IDF │──▶│  SQLite  │
//! │  + git log  │   │   (core crate)   │   │ snippets │
//! └─────────────┘   └──────────────────┘   └────┬─────┘
//!                                               │
//!                        ┌──────────────────────┤
//!                        ▼                      ▼
//!                 ┌────────────┐         ┌────────────┐
//!                 │   Ranker   │────────▶│  Answer    │
//!                 │ (CodeIndex)│         │ OpenAI/... │
//!                 └────────────┘         └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! quack init                          # create database
//! quack ingest --root .               # index the working tree
//! quack search "where is the config parsed"
//! quack ask "how does retry work?" --boost-recent
//! quack status                        # what changed since the last ingest
//! quack history --days 14             # authors and recently changed files
//! quack readme                        # draft README.md from the index
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`scanner`] | Source file enumeration |
//! | [`history`] | Git revision history and author activity |
//! | [`ingest`] | Ingestion pipeline |
//! | [`index`] | The [`index::CodeIndex`] service |
//! | [`changes`] | Change detection against the working tree |
//! | [`answer`] | LLM answer providers |
//! | [`search`] | `search` / `ask` output |
//! | [`status`] | `status` output |
//! | [`activity`] | `history` output |
//! | [`docs`] | `readme` / `agents` generation |
//! | [`sqlite_store`] | SQLite [`SnippetStore`](quackstack_core::store::SnippetStore) |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`progress`] | Ingest progress reporting |
//!
//! Pure algorithms (segmentation, vector space, ranking, change
//! classification) live in the `quackstack-core` crate.

pub mod activity;
pub mod answer;
pub mod changes;
pub mod config;
pub mod db;
pub mod docs;
pub mod history;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod progress;
pub mod scanner;
pub mod search;
pub mod sqlite_store;
pub mod status;
