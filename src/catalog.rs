use std::fmt;

use serde_json::Value;

/// The asset categories understood by the builder.
///
/// The numeric codes are the catalog wire contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Decoder,
    Filter,
    Rule,
    Output,
}

impl AssetKind {
    /// The catalog type code for this kind.
    pub fn code(self) -> i32 {
        match self {
            AssetKind::Decoder => 0,
            AssetKind::Filter => 1,
            AssetKind::Rule => 2,
            AssetKind::Output => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Decoder => "decoder",
            AssetKind::Filter => "filter",
            AssetKind::Rule => "rule",
            AssetKind::Output => "output",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of raw asset definitions, keyed by kind and name.
///
/// The builder invokes it sequentially, once per referenced asset. A
/// catalog may block on I/O; the builder imposes no concurrency discipline
/// on it. Failures are wrapped as [`BuildError::CatalogFetch`]
/// (`crate::BuildError`) with the requested name attached.
pub trait Catalog {
    fn get_asset(&self, kind: AssetKind, name: &str) -> anyhow::Result<Value>;
}
