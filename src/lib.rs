//! # Sluice Builder
//!
//! Compiles a declarative, multi-stage event-processing *environment* into
//! a single composable expression tree that a downstream runtime evaluates
//! against incoming events.
//!
//! An environment definition lists the assets it is made of by name, one
//! array per family (`decoders`, `rules`, `outputs`, plus `filters`). The
//! builder fetches each asset's JSON through the [`Catalog`] port, compiles
//! every stage through the [`StageRegistry`] port, assembles one DAG per
//! family (multiple parents allowed, cycles refused), injects filters into
//! the parents they name, and folds the whole collection into a tree of
//! logical operators: decoders under `Or` (first match wins), rules and
//! outputs under `Broadcast` (every match fires), all families under a
//! top-level `Chain`.
//!
//! ## Example
//!
//! ```
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use serde_json::{json, Value};
//! use sluice_builder::{compile, AssetKind, Catalog, Expression, Registry};
//!
//! // An in-memory catalog; a deployment would back this with storage.
//! struct MemoryCatalog {
//!     assets: HashMap<(i32, String), Value>,
//! }
//!
//! impl Catalog for MemoryCatalog {
//!     fn get_asset(&self, kind: AssetKind, name: &str) -> anyhow::Result<Value> {
//!         self.assets
//!             .get(&(kind.code(), name.to_string()))
//!             .cloned()
//!             .ok_or_else(|| anyhow::anyhow!("no {} named '{}'", kind, name))
//!     }
//! }
//!
//! let mut assets = HashMap::new();
//! assets.insert(
//!     (AssetKind::Decoder.code(), "syslog".to_string()),
//!     json!({"name": "syslog", "check": [], "normalize": {}}),
//! );
//! let catalog = MemoryCatalog { assets };
//!
//! let mut registry = Registry::new();
//! registry.register("stage.check", |_json| Ok(Expression::and("check", vec![])));
//! registry.register("stage.normalize", |_json| {
//!     Ok(Expression::term("normalize", Arc::new(())))
//! });
//!
//! let environment = compile(
//!     "production",
//!     &json!({"decoders": ["syslog"]}),
//!     &catalog,
//!     &registry,
//! )
//! .expect("environment compiles");
//!
//! let expression = environment.to_expression().expect("folds");
//! assert_eq!(expression.name(), "production");
//! assert_eq!(expression.kind_name(), "chain");
//! ```

mod asset;
mod catalog;
mod environment;
mod error;
mod expression;
mod graph;
mod registry;

pub mod graphviz;

pub use asset::{Asset, AssetError};
pub use catalog::{AssetKind, Catalog};
pub use environment::{Environment, Family};
pub use error::BuildError;
pub use expression::{Expression, Kind, TermOp};
pub use graph::Graph;
pub use registry::{Registry, StageBuilder, StageRegistry};

/// Compile an environment definition. See [`Environment::compile`].
pub fn compile(
    name: impl Into<String>,
    definition: &serde_json::Value,
    catalog: &dyn Catalog,
    registry: &dyn StageRegistry,
) -> Result<Environment, BuildError> {
    Environment::compile(name, definition, catalog, registry)
}

/// The crate version, as defined in Cargo.toml.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
