//! # Pending Sync
//!
//! A reconciling scheduler that keeps long-running side-effect tasks in step
//! with a continuously changing set of desired work items.
//!
//! A store publishes two kinds of pending work: per-message actions (mark a
//! mention or a reaction as read on the server) and "needs refresh" markers for
//! tag summaries (unseen counts). A scheduler subscribes to those views, diffs
//! every snapshot against the tasks it has running, cancels tasks whose entry
//! disappeared and starts tasks for new entries.
//!
//! ## Key Features
//!
//! - **Per-peer exclusivity**: at most one action task per peer, and no summary
//!   refresh for a peer while one of its actions runs
//! - **Cancellable handles**: every task is staged under its own handle before
//!   it is launched; disposing the scheduler cancels each handle exactly once
//! - **Always-clear pipelines**: the originating entry is removed after every
//!   run, so failures never leave work behind for an immediate retry
//! - **Pluggable collaborators**: store, network and account state are traits
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pending_sync::builders::build_schedulers;
//! use pending_sync::config::SyncConfig;
//! use pending_sync::infra::InMemoryStore;
//! use pending_sync::runtime::TokioSpawner;
//! use pending_sync::sync::SyncContext;
//!
//! let cfg = SyncConfig::from_env()?;
//! let ctx = SyncContext::new(Arc::new(InMemoryStore::new()), network, account);
//! let handles = build_schedulers(&cfg, &ctx, TokioSpawner::current(), None)?;
//! // ...
//! for handle in &handles {
//!     handle.dispose();
//! }
//! ```
//!
//! For complete examples, see `tests/scheduler_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: keys, handles, reconciler and loop.
pub mod core;
/// Configuration models for synchronizers and runtime.
pub mod config;
/// Builders to construct schedulers from configuration.
pub mod builders;
/// Infrastructure adapters for the store collaborator.
pub mod infra;
/// Runtime adapters.
pub mod runtime;
/// Message and tag-summary synchronizers.
pub mod sync;
/// Shared utilities.
pub mod util;
