//! Serialisable picture of a graph's content.

use crate::graph::core::Graph;
use crate::graph::element::Element;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: String,
    pub attributes: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub id: String,
    pub source: String,
    pub target: String,
    pub directed: bool,
    pub attributes: BTreeMap<String, Value>,
}

/// Graph content without the graph id, so two graphs holding the same
/// elements compare equal. Nodes and edges are sorted by id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub attributes: BTreeMap<String, Value>,
    pub nodes: Vec<NodeSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
}

impl GraphSnapshot {
    pub fn of(graph: &Graph) -> Self {
        let mut nodes: Vec<NodeSnapshot> = graph
            .nodes()
            .iter()
            .map(|node| NodeSnapshot {
                id: node.id().to_string(),
                attributes: node.attributes().to_map(),
            })
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut edges: Vec<EdgeSnapshot> = graph
            .edges()
            .iter()
            .map(|edge| EdgeSnapshot {
                id: edge.id().to_string(),
                source: edge.source().id().to_string(),
                target: edge.target().id().to_string(),
                directed: edge.is_directed(),
                attributes: edge.attributes().to_map(),
            })
            .collect();
        edges.sort_by(|a, b| a.id.cmp(&b.id));

        Self {
            attributes: graph.attributes().to_map(),
            nodes,
            edges,
        }
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
