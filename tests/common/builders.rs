//! Test data builders for creating test graphs

use graphvis_rs::graph::{Element, Graph};
use graphvis_rs::Value;
use std::rc::Rc;

/// Builder for creating test Graphs
pub struct GraphBuilder {
    id: String,
    strict: bool,
    auto_create: bool,
    nodes: Vec<(String, Vec<(String, Value)>)>,
    edges: Vec<(String, String, String, bool)>,
    attributes: Vec<(String, Value)>,
}

impl GraphBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            strict: true,
            auto_create: false,
            nodes: Vec::new(),
            edges: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn relaxed(mut self) -> Self {
        self.strict = false;
        self
    }

    pub fn auto_create(mut self) -> Self {
        self.auto_create = true;
        self
    }

    pub fn node(mut self, id: &str) -> Self {
        self.nodes.push((id.to_string(), Vec::new()));
        self
    }

    /// Attribute on the last added node
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        if let Some((_, attributes)) = self.nodes.last_mut() {
            attributes.push((name.to_string(), value.into()));
        }
        self
    }

    pub fn edge(mut self, id: &str, from: &str, to: &str, directed: bool) -> Self {
        self.edges
            .push((id.to_string(), from.to_string(), to.to_string(), directed));
        self
    }

    pub fn attribute(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attributes.push((name.to_string(), value.into()));
        self
    }

    pub fn build(self) -> Rc<Graph> {
        let graph = Graph::with_options(&self.id, self.strict, self.auto_create);
        for (name, value) in self.attributes {
            graph.set_attribute(&name, value).unwrap();
        }
        for (id, attributes) in self.nodes {
            let node = graph.add_node(&id).unwrap();
            for (name, value) in attributes {
                node.set_attribute(&name, value).unwrap();
            }
        }
        for (id, from, to, directed) in self.edges {
            graph.add_edge(&id, &from, &to, directed).unwrap();
        }
        graph
    }
}

/// `count` nodes `n0..` joined in a path by undirected edges `e0..`.
pub fn path_graph(id: &str, count: usize) -> Rc<Graph> {
    let mut builder = GraphBuilder::new(id);
    for i in 0..count {
        builder = builder.node(&format!("n{}", i));
    }
    for i in 1..count {
        builder = builder.edge(
            &format!("e{}", i - 1),
            &format!("n{}", i - 1),
            &format!("n{}", i),
            false,
        );
    }
    builder.build()
}
