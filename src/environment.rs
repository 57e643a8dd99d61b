use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::asset::Asset;
use crate::catalog::{AssetKind, Catalog};
use crate::error::BuildError;
use crate::expression::Expression;
use crate::graph::Graph;
use crate::registry::StageRegistry;

pub const DECODERS: &str = "decoders";
pub const RULES: &str = "rules";
pub const OUTPUTS: &str = "outputs";
pub const FILTERS: &str = "filters";

/// The three graph-producing families of an environment definition.
///
/// Filters are the fourth family but never form a graph of their own; they
/// are parsed up front and injected into the parents they name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Decoders,
    Rules,
    Outputs,
}

impl Family {
    pub fn from_key(key: &str) -> Option<Family> {
        match key {
            DECODERS => Some(Family::Decoders),
            RULES => Some(Family::Rules),
            OUTPUTS => Some(Family::Outputs),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Family::Decoders => DECODERS,
            Family::Rules => RULES,
            Family::Outputs => OUTPUTS,
        }
    }

    pub fn kind(self) -> AssetKind {
        match self {
            Family::Decoders => AssetKind::Decoder,
            Family::Rules => AssetKind::Rule,
            Family::Outputs => AssetKind::Output,
        }
    }

    /// Name of the family's synthetic root node.
    pub fn root_name(self) -> String {
        format!("{}Input", self.as_str())
    }
}

/// A compiled environment: the asset map plus one graph per processed
/// family.
///
/// Everything in here is frozen once [`Environment::compile`] returns; the
/// graphs are retained for diagnostics and [`Environment::to_expression`]
/// reads them without mutating anything, so an environment may be shared
/// freely.
#[derive(Debug, Clone)]
pub struct Environment {
    name: String,
    assets: HashMap<String, Asset>,
    graphs: Vec<(Family, Graph)>,
}

impl Environment {
    /// Compile an environment definition into its asset map and family
    /// graphs.
    ///
    /// The definition's top-level keys must be a subset of `filters`,
    /// `decoders`, `rules` and `outputs`, each holding an array of asset
    /// names to fetch from the catalog. Families are processed in
    /// definition order; the first error aborts the whole compilation.
    pub fn compile(
        name: impl Into<String>,
        definition: &Value,
        catalog: &dyn Catalog,
        registry: &dyn StageRegistry,
    ) -> Result<Self, BuildError> {
        let name = name.into();
        let object = definition.as_object().ok_or_else(|| {
            BuildError::EnvMalformed("environment definition is not a JSON object".to_string())
        })?;
        debug!(environment = name.as_str(), "compiling environment");

        let mut assets: HashMap<String, Asset> = HashMap::new();

        // Filters never form a graph; parse them up front so they can be
        // injected once every family graph exists.
        if let Some(value) = object.get(FILTERS) {
            for filter_name in as_name_list(FILTERS, value)? {
                let json = fetch(catalog, AssetKind::Filter, &filter_name)?;
                let asset = parse_asset(&json, AssetKind::Filter, &filter_name, registry)?;
                insert_asset(&mut assets, asset)?;
            }
        }

        let mut graphs: Vec<(Family, Graph)> = Vec::new();
        for (key, value) in object {
            if key.as_str() == FILTERS {
                continue;
            }
            let family = Family::from_key(key)
                .ok_or_else(|| BuildError::EnvMalformed(format!("unknown family '{}'", key)))?;
            let asset_names = as_name_list(key, value)?;
            debug!(
                family = key.as_str(),
                assets = asset_names.len(),
                "building family graph"
            );

            let root = family.root_name();
            let mut graph = Graph::new(key.as_str(), root.as_str());
            for asset_name in asset_names {
                let json = fetch(catalog, family.kind(), &asset_name)?;
                let asset = parse_asset(&json, family.kind(), &asset_name, registry)?;
                graph.add_node(&asset_name)?;
                if asset.parents().is_empty() {
                    graph.add_edge(&root, &asset_name)?;
                } else {
                    for parent in asset.parents() {
                        graph.add_edge(parent, &asset_name)?;
                    }
                }
                insert_asset(&mut assets, asset)?;
            }
            graphs.push((family, graph));
        }

        inject_filters(&mut assets, &graphs);

        for (family, graph) in &graphs {
            for node in graph.unreachable_nodes() {
                warn!(
                    family = family.as_str(),
                    asset = node,
                    "asset is unreachable from the family root and will not appear in the expression"
                );
            }
        }

        Ok(Environment {
            name,
            assets,
            graphs,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn assets(&self) -> &HashMap<String, Asset> {
        &self.assets
    }

    /// The family graphs, in environment definition order.
    pub fn graphs(&self) -> &[(Family, Graph)] {
        &self.graphs
    }

    /// Fold the family graphs into the single expression the runtime
    /// evaluates.
    ///
    /// The top level is a `Chain` over one sub-expression per family.
    /// Decoders fold under `Or` (first matching decoder wins); rules and
    /// outputs fold under `Broadcast` (every matching asset fires). A node
    /// with several parents is materialized once and wired into each of
    /// them by identity.
    pub fn to_expression(&self) -> Result<Expression, BuildError> {
        let mut families = Vec::with_capacity(self.graphs.len());
        for (family, graph) in &self.graphs {
            families.push(self.fold_family(*family, graph)?);
        }
        Ok(Expression::chain(self.name.clone(), families))
    }

    fn fold_family(&self, family: Family, graph: &Graph) -> Result<Expression, BuildError> {
        enum Frame<'a> {
            Enter(&'a str),
            Exit(&'a str),
        }

        // Post-order walk with an explicit stack: children are built before
        // their parents, and a node revisited through another parent reuses
        // the expression built the first time.
        let mut built: HashMap<&str, Expression> = HashMap::new();
        let mut stack: Vec<Frame> = graph
            .edges_of(graph.root())
            .iter()
            .rev()
            .map(|child| Frame::Enter(child))
            .collect();

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(node) => {
                    if built.contains_key(node) {
                        continue;
                    }
                    stack.push(Frame::Exit(node));
                    for child in graph.edges_of(node).iter().rev() {
                        stack.push(Frame::Enter(child));
                    }
                }
                Frame::Exit(node) => {
                    if built.contains_key(node) {
                        continue;
                    }
                    let expression = self.build_node(family, graph, node, &built)?;
                    built.insert(node, expression);
                }
            }
        }

        let mut operands = Vec::with_capacity(graph.edges_of(graph.root()).len());
        for child in graph.edges_of(graph.root()) {
            operands.push(lookup_built(&built, child)?.clone());
        }
        Ok(match family {
            Family::Decoders => Expression::or(graph.root().to_string(), operands),
            Family::Rules | Family::Outputs => {
                Expression::broadcast(graph.root().to_string(), operands)
            }
        })
    }

    fn build_node(
        &self,
        family: Family,
        graph: &Graph,
        name: &str,
        built: &HashMap<&str, Expression>,
    ) -> Result<Expression, BuildError> {
        let asset = self.assets.get(name).ok_or_else(|| {
            BuildError::Internal(format!(
                "graph node '{}' is missing from the asset map",
                name
            ))
        })?;

        let mut child_ops = Vec::with_capacity(graph.edges_of(name).len());
        for child in graph.edges_of(name) {
            child_ops.push(lookup_built(built, child)?.clone());
        }
        let children = match family {
            Family::Decoders => Expression::or("children", child_ops),
            Family::Rules | Family::Outputs => Expression::broadcast("children", child_ops),
        };

        // Filters gate the children subtree, not the asset's own stages.
        let consequent = if asset.filters().is_empty() {
            children
        } else {
            let mut operands = Vec::with_capacity(asset.filters().len() + 1);
            for filter_name in asset.filters() {
                let filter = self.assets.get(filter_name).ok_or_else(|| {
                    BuildError::Internal(format!(
                        "filter '{}' attached to '{}' is missing from the asset map",
                        filter_name, name
                    ))
                })?;
                operands.push(filter.to_expression());
            }
            operands.push(children);
            Expression::and("filters", operands)
        };

        Ok(Expression::implication(
            format!("{}Node", asset.name()),
            asset.to_expression(),
            consequent,
        ))
    }
}

// Attach every filter to each of its declared parents that is a node in
// some family graph. A filter may gate parents across several families.
fn inject_filters(assets: &mut HashMap<String, Asset>, graphs: &[(Family, Graph)]) {
    let links: Vec<(String, Vec<String>)> = assets
        .values()
        .filter(|asset| asset.kind() == AssetKind::Filter)
        .map(|asset| (asset.name().to_string(), asset.parents().to_vec()))
        .collect();

    for (filter_name, parents) in links {
        for parent in parents {
            if graphs.iter().any(|(_, graph)| graph.has_node(&parent)) {
                if let Some(parent_asset) = assets.get_mut(&parent) {
                    debug!(
                        filter = filter_name.as_str(),
                        parent = parent.as_str(),
                        "attaching filter"
                    );
                    parent_asset.attach_filter(&filter_name);
                }
            }
        }
    }
}

fn parse_asset(
    json: &Value,
    kind: AssetKind,
    requested_name: &str,
    registry: &dyn StageRegistry,
) -> Result<Asset, BuildError> {
    let asset =
        Asset::from_json(json, kind, registry).map_err(|err| err.with_asset(requested_name))?;
    if asset.name() != requested_name {
        return Err(BuildError::AssetMalformed {
            asset: requested_name.to_string(),
            reason: format!(
                "definition declares name '{}' but the catalog entry is '{}'",
                asset.name(),
                requested_name
            ),
        });
    }
    Ok(asset)
}

fn insert_asset(assets: &mut HashMap<String, Asset>, asset: Asset) -> Result<(), BuildError> {
    let name = asset.name().to_string();
    if assets.insert(name.clone(), asset).is_some() {
        return Err(BuildError::AssetMalformed {
            asset: name,
            reason: "duplicate asset name in environment".to_string(),
        });
    }
    Ok(())
}

fn as_name_list(key: &str, value: &Value) -> Result<Vec<String>, BuildError> {
    let entries = value.as_array().ok_or_else(|| {
        BuildError::EnvMalformed(format!("'{}' must be an array of asset names", key))
    })?;
    let mut names = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry.as_str() {
            Some(name) => names.push(name.to_string()),
            None => {
                return Err(BuildError::EnvMalformed(format!(
                    "'{}' entries must be strings",
                    key
                )))
            }
        }
    }
    Ok(names)
}

fn fetch(catalog: &dyn Catalog, kind: AssetKind, name: &str) -> Result<Value, BuildError> {
    catalog
        .get_asset(kind, name)
        .map_err(|cause| BuildError::CatalogFetch {
            name: name.to_string(),
            source: cause.into(),
        })
}

fn lookup_built<'a>(
    built: &'a HashMap<&str, Expression>,
    name: &str,
) -> Result<&'a Expression, BuildError> {
    built.get(name).ok_or_else(|| {
        BuildError::Internal(format!("node '{}' was never built during the fold", name))
    })
}
