//! Kompox Core Library
//!
//! This crate provides the resource-definition engine for Kompox:
//! - Canonical hierarchical identifiers (FQN)
//! - Loading `ops.kompox.dev/v1alpha1` documents from files and directories
//! - Batch validation in topological order
//! - An immutable, kind-indexed snapshot (the [`Sink`])
//! - Projection of a sink into caller-supplied repositories
//!
//! # Architecture
//!
//! ```text
//! ┌─────────┐   ┌───────────┐   ┌──────┐   ┌───────────┐   ┌──────────────┐
//! │ Loader  │──▶│ Validator │──▶│ Sink │──▶│ Projector │──▶│ Repositories │
//! │ (YAML)  │   │           │   │      │   │           │   │  (external)  │
//! └─────────┘   └───────────┘   └──────┘   └───────────┘   └──────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use kompox_core::{Loader, Sink};
//!
//! let result = Loader::new().load("./kom")?;
//! let sink = Sink::new(result.documents)?;
//! for (fqn, _app) in sink.apps() {
//!     println!("App: {}", fqn);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod error;
pub mod fqn;
pub mod loader;
pub mod model;
pub mod projector;
pub mod quantity;
pub mod repository;
pub mod resources;
pub mod sink;
pub mod validator;

pub use document::{Document, Kind, Provenance, Resource};
pub use error::{Error, Result};
pub use fqn::{Fqn, FqnError};
pub use loader::{LoadError, LoadResult, Loader};
pub use repository::Repositories;
pub use sink::Sink;
pub use validator::{ValidationError, ValidationErrors, ValidationResult, validate};
