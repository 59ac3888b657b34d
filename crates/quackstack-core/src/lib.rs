//! # Quackstack Core
//!
//! Pure indexing and retrieval logic for Quackstack: fragment models,
//! source segmentation, the TF-IDF vector space, similarity ranking,
//! change classification, and the snippet store abstraction.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. The
//! `quackstack` application crate supplies those around it.

pub mod changes;
pub mod embedding;
pub mod models;
pub mod search;
pub mod segment;
pub mod store;
pub mod vector_space;
