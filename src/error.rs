use thiserror::Error;

/// All possible errors raised while compiling an environment.
///
/// Compilation is fail-fast: the first error aborts the whole build, and
/// every error carries the owning asset's name and, where applicable, the
/// stage key.
#[derive(Error, Debug)]
pub enum BuildError {
    /// A fetched asset definition violates the asset schema.
    #[error("asset '{asset}': {reason}")]
    AssetMalformed { asset: String, reason: String },

    /// The registry has no builder for a stage key.
    #[error("asset '{asset}': no stage builder registered for '{stage}'")]
    StageUnknown { asset: String, stage: String },

    /// A per-stage builder failed.
    #[error("asset '{asset}': stage '{stage}' failed to build")]
    StageBuild {
        asset: String,
        stage: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The catalog could not provide a referenced asset.
    #[error("failed to fetch asset '{name}' from the catalog")]
    CatalogFetch {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Parent/child relations within a family form a cycle.
    #[error("circular dependency in '{family}' graph: {}", .path.join(" -> "))]
    CycleDetected { family: String, path: Vec<String> },

    /// The environment definition itself has the wrong shape.
    #[error("malformed environment definition: {0}")]
    EnvMalformed(String),

    /// A builder invariant was broken; always a bug in the builder.
    #[error("internal builder error: {0}")]
    Internal(String),
}
