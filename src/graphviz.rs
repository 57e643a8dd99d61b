//! Graphviz rendering of compiled environments.
//!
//! Purely informational: one cluster per family graph, one node per asset,
//! edges per parent/child relation. When a parent has filters attached,
//! the filters are grouped in a nested cluster and the parent routes
//! through it to each child.

use std::fmt::Write;

use crate::environment::Environment;

/// Render the environment's family graphs as a DOT document.
pub fn render(environment: &Environment) -> String {
    let mut dot = String::new();
    let _ = writeln!(dot, "digraph G {{");
    let _ = writeln!(dot, "compound=true;");
    let _ = writeln!(dot, "fontname=\"Helvetica,Arial,sans-serif\";");
    let _ = writeln!(dot, "fontsize=12;");
    let _ = writeln!(
        dot,
        "node [fontname=\"Helvetica,Arial,sans-serif\", fontsize=10];"
    );
    let _ = writeln!(
        dot,
        "edge [fontname=\"Helvetica,Arial,sans-serif\", fontsize=8];"
    );
    let _ = writeln!(
        dot,
        "environment [label=\"{}\", shape=Mdiamond];",
        environment.name()
    );

    for (family, graph) in environment.graphs() {
        let _ = writeln!(dot);
        let _ = writeln!(dot, "subgraph cluster_{} {{", family.as_str());
        let _ = writeln!(dot, "label=\"{}\";", family.as_str());
        let _ = writeln!(dot, "style=filled;");
        let _ = writeln!(dot, "color=lightgrey;");
        let _ = writeln!(dot, "node [style=filled,color=white];");

        let _ = writeln!(dot, "\"{}\" [label=\"{}\"];", graph.root(), graph.root());
        for node in graph.node_names() {
            let _ = writeln!(dot, "\"{}\" [label=\"{}\"];", node, node);
        }

        let mut parents: Vec<&str> = vec![graph.root()];
        parents.extend(graph.node_names().iter().map(String::as_str));
        for parent in parents {
            let children = graph.edges_of(parent);
            if children.is_empty() {
                continue;
            }
            let filters = environment
                .assets()
                .get(parent)
                .map(|asset| asset.filters().iter().collect::<Vec<_>>())
                .unwrap_or_default();
            if filters.is_empty() {
                for child in children {
                    let _ = writeln!(dot, "\"{}\" -> \"{}\";", parent, child);
                }
            } else {
                let _ = writeln!(dot, "subgraph cluster_filters_{} {{", parent);
                let _ = writeln!(dot, "label=\"\";");
                let _ = writeln!(dot, "color=\"blue\";");
                let _ = writeln!(dot, "style=default;");
                for filter in &filters {
                    let _ = writeln!(dot, "\"{}\" [label=\"{}\"];", filter, filter);
                }
                let _ = writeln!(dot, "}}");
                for filter in &filters {
                    let _ = writeln!(
                        dot,
                        "\"{}\" -> \"{}\" [ltail={} lhead=cluster_filters_{}];",
                        parent, filter, parent, parent
                    );
                }
                for child in children {
                    for filter in &filters {
                        let _ = writeln!(
                            dot,
                            "\"{}\" -> \"{}\" [ltail=cluster_filters_{} lhead={}];",
                            filter, child, parent, child
                        );
                    }
                }
            }
        }

        let _ = writeln!(dot, "}}");
        let _ = writeln!(dot, "environment -> \"{}\";", graph.root());
    }

    let _ = writeln!(dot, "}}");
    dot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AssetKind, Catalog};
    use crate::expression::Expression;
    use crate::registry::Registry;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Arc;

    struct MapCatalog {
        assets: HashMap<(i32, String), Value>,
    }

    impl Catalog for MapCatalog {
        fn get_asset(&self, kind: AssetKind, name: &str) -> anyhow::Result<Value> {
            self.assets
                .get(&(kind.code(), name.to_string()))
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no {} named '{}'", kind, name))
        }
    }

    fn catalog(entries: Vec<(AssetKind, Value)>) -> MapCatalog {
        let assets = entries
            .into_iter()
            .map(|(kind, json)| {
                let name = json["name"].as_str().expect("test asset name").to_string();
                ((kind.code(), name), json)
            })
            .collect();
        MapCatalog { assets }
    }

    fn test_registry() -> Registry {
        let mut registry = Registry::new();
        registry.register("stage.check", |_| Ok(Expression::and("check", vec![])));
        registry.register("stage.normalize", |_| {
            Ok(Expression::term("normalize", Arc::new(())))
        });
        registry
    }

    #[test]
    fn test_dot_structure() {
        let catalog = catalog(vec![
            (
                AssetKind::Filter,
                json!({"name": "f", "parents": ["p"], "check": []}),
            ),
            (
                AssetKind::Decoder,
                json!({"name": "p", "check": [], "normalize": {}}),
            ),
            (
                AssetKind::Decoder,
                json!({"name": "c", "parents": ["p"], "check": []}),
            ),
            (AssetKind::Rule, json!({"name": "r", "check": []})),
        ]);
        let registry = test_registry();
        let env = Environment::compile(
            "env",
            &json!({"filters": ["f"], "decoders": ["p", "c"], "rules": ["r"]}),
            &catalog,
            &registry,
        )
        .expect("compiles");

        let dot = render(&env);
        assert!(dot.starts_with("digraph G {"));
        assert!(dot.trim_end().ends_with('}'));
        assert!(dot.contains("compound=true;"));
        assert!(dot.contains("environment [label=\"env\", shape=Mdiamond];"));
        assert!(dot.contains("subgraph cluster_decoders {"));
        assert!(dot.contains("subgraph cluster_rules {"));
        assert!(dot.contains("environment -> \"decodersInput\";"));
        assert!(dot.contains("environment -> \"rulesInput\";"));
        assert!(dot.contains("\"decodersInput\" -> \"p\";"));
        // p has a filter: it routes through the filter cluster to c.
        assert!(dot.contains("subgraph cluster_filters_p {"));
        assert!(dot.contains("\"p\" -> \"f\" [ltail=p lhead=cluster_filters_p];"));
        assert!(dot.contains("\"f\" -> \"c\" [ltail=cluster_filters_p lhead=c];"));
        assert!(!dot.contains("\"p\" -> \"c\";"));
    }

    #[test]
    fn test_dot_plain_edges_without_filters() {
        let catalog = catalog(vec![
            (AssetKind::Decoder, json!({"name": "p", "check": []})),
            (
                AssetKind::Decoder,
                json!({"name": "c", "parents": ["p"], "check": []}),
            ),
        ]);
        let registry = test_registry();
        let env = Environment::compile("env", &json!({"decoders": ["p", "c"]}), &catalog, &registry)
            .expect("compiles");

        let dot = render(&env);
        assert!(dot.contains("\"p\" -> \"c\";"));
        assert!(!dot.contains("cluster_filters_"));
    }
}
