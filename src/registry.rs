use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::expression::Expression;

/// Compiles one stage definition into an expression.
///
/// Builders are shared (`Arc`) so a registry can be cloned cheaply and the
/// same builder handed out for every asset that uses the stage.
pub type StageBuilder = Arc<dyn Fn(&Value) -> anyhow::Result<Expression> + Send + Sync>;

/// Lookup from a stage key (`"stage.check"`, `"stage.normalize"`, ...) to
/// its builder.
///
/// The builder core only consumes this interface; how a deployment
/// populates it is not its concern. A missing key surfaces as
/// `BuildError::StageUnknown` enriched with the owning asset's name, a
/// failing builder as `BuildError::StageBuild` with the cause attached.
pub trait StageRegistry {
    fn get(&self, key: &str) -> Option<StageBuilder>;
}

/// Hashmap-backed [`StageRegistry`].
#[derive(Default, Clone)]
pub struct Registry {
    builders: HashMap<String, StageBuilder>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Register a builder under `key`, replacing any previous one.
    pub fn register<F>(&mut self, key: impl Into<String>, builder: F)
    where
        F: Fn(&Value) -> anyhow::Result<Expression> + Send + Sync + 'static,
    {
        self.builders.insert(key.into(), Arc::new(builder));
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }
}

impl StageRegistry for Registry {
    fn get(&self, key: &str) -> Option<StageBuilder> {
        self.builders.get(key).cloned()
    }
}
