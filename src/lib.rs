// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dotfiles deployment and synchronization.
//!
//! Dotsync moves configuration trees between a version-controlled dotfiles
//! repository and their per-user system locations. Everything it knows lives
//! on the filesystem itself. There is no state file, and no daemon.
//!
//! # Components
//!
//! 1. [`deploy`]: one-directional repository to destination materialization,
//!    with idempotency and backup-before-overwrite.
//! 2. [`sync`]: bidirectional reconciliation selectable by category and
//!    direction, plus diff and status reporting.
//! 3. [`tree`]: the shared tree equality, diffing, and copy primitives that
//!    both of the above are built on.
//!
//! The fixed set of managed [`category`] entries and their platform-dependent
//! destinations are resolved once at startup, optionally tuned through the
//! [`config`] file.

pub mod backup;
pub mod category;
pub mod config;
pub mod deploy;
pub mod path;
pub mod sync;
pub mod tree;

pub use category::{CategoryName, CategoryTable, ConfigCategory, Platform};
pub use deploy::{Deployer, DeploymentDecision};
pub use sync::{SyncDirection, Synchronizer};
