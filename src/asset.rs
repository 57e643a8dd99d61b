use std::collections::BTreeSet;

use serde_json::Value;
use thiserror::Error;

use crate::catalog::AssetKind;
use crate::error::BuildError;
use crate::expression::Expression;
use crate::registry::StageRegistry;

/// Errors local to parsing a single asset definition.
///
/// The environment compiler enriches these with the owning asset's name via
/// [`AssetError::with_asset`] before they reach the caller.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("{0}")]
    Malformed(String),

    #[error("no stage builder registered for '{0}'")]
    StageUnknown(String),

    #[error("stage '{stage}' failed to build")]
    StageBuild {
        stage: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl AssetError {
    pub(crate) fn with_asset(self, asset: &str) -> BuildError {
        let asset = asset.to_string();
        match self {
            AssetError::Malformed(reason) => BuildError::AssetMalformed { asset, reason },
            AssetError::StageUnknown(stage) => BuildError::StageUnknown { asset, stage },
            AssetError::StageBuild { stage, source } => BuildError::StageBuild {
                asset,
                stage,
                source,
            },
        }
    }
}

/// One named processing unit: a decoder, rule, output, or filter.
///
/// `check` is the mandatory predicate stage; `stages` is an `And` over the
/// remaining stages in definition order. `filters` starts empty and is
/// populated by the environment compiler during filter injection.
#[derive(Debug, Clone)]
pub struct Asset {
    name: String,
    kind: AssetKind,
    parents: Vec<String>,
    filters: BTreeSet<String>,
    check: Expression,
    stages: Expression,
}

impl Asset {
    /// Parse one asset definition.
    ///
    /// The reserved keys `name`, `parents`, `metaData` and `check` are
    /// consumed first (`metaData` is discarded); every remaining key is a
    /// stage and is compiled through the registry under `"stage.<key>"`,
    /// in the definition's order.
    pub fn from_json(
        definition: &Value,
        kind: AssetKind,
        registry: &dyn StageRegistry,
    ) -> Result<Self, AssetError> {
        let object = definition
            .as_object()
            .ok_or_else(|| AssetError::Malformed("definition is not a JSON object".to_string()))?;

        let name = match object.get("name") {
            Some(Value::String(name)) if !name.is_empty() => name.clone(),
            Some(_) => {
                return Err(AssetError::Malformed(
                    "'name' must be a non-empty string".to_string(),
                ))
            }
            None => return Err(AssetError::Malformed("missing 'name'".to_string())),
        };

        let mut parents = Vec::new();
        if let Some(value) = object.get("parents") {
            let entries = value
                .as_array()
                .ok_or_else(|| AssetError::Malformed("'parents' must be an array".to_string()))?;
            for entry in entries {
                let parent = entry.as_str().ok_or_else(|| {
                    AssetError::Malformed("'parents' entries must be strings".to_string())
                })?;
                if !parents.iter().any(|p| p == parent) {
                    parents.push(parent.to_string());
                }
            }
        }

        let check_json = object
            .get("check")
            .ok_or_else(|| AssetError::Malformed("missing 'check' stage".to_string()))?;
        let check = build_stage("stage.check", check_json, registry)?;

        let mut stage_ops = Vec::new();
        for (key, value) in object {
            if matches!(key.as_str(), "name" | "parents" | "metaData" | "check") {
                continue;
            }
            let stage_key = format!("stage.{}", key);
            stage_ops.push(build_stage(&stage_key, value, registry)?);
        }
        let stages = Expression::and("stages", stage_ops);

        Ok(Asset {
            name,
            kind,
            parents,
            filters: BTreeSet::new(),
            check,
            stages,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    /// Declared parents, in definition order, duplicates removed.
    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    /// Names of the filters attached to this asset, sorted by name.
    pub fn filters(&self) -> &BTreeSet<String> {
        &self.filters
    }

    pub(crate) fn attach_filter(&mut self, name: &str) {
        self.filters.insert(name.to_string());
    }

    pub fn check(&self) -> &Expression {
        &self.check
    }

    pub fn stages(&self) -> &Expression {
        &self.stages
    }

    /// The asset's own compiled form.
    ///
    /// A decoder, rule or output fires its stages iff its check matches. A
    /// filter is just its check conditions folded as a conjunction, ready
    /// to be spliced into its parent's children gate; when the check
    /// compiled to a bare term, the term itself is the single conjunct.
    pub fn to_expression(&self) -> Expression {
        match self.kind {
            AssetKind::Decoder | AssetKind::Rule | AssetKind::Output => Expression::implication(
                self.name.clone(),
                self.check.clone(),
                self.stages.clone(),
            ),
            AssetKind::Filter => {
                let conditions = if self.check.is_operation() {
                    self.check.operands().to_vec()
                } else {
                    vec![self.check.clone()]
                };
                Expression::and(self.name.clone(), conditions)
            }
        }
    }
}

fn build_stage(
    key: &str,
    definition: &Value,
    registry: &dyn StageRegistry,
) -> Result<Expression, AssetError> {
    let builder = registry
        .get(key)
        .ok_or_else(|| AssetError::StageUnknown(key.to_string()))?;
    builder(definition).map_err(|cause| AssetError::StageBuild {
        stage: key.to_string(),
        source: cause.into(),
    })
}
