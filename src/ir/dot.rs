//! Dependency view of an `ExprGraph` as a petgraph `DiGraph`.
//!
//! One node per live expression, labelled with its listing (`v_2 = v_1 +
//! v_0`). An edge runs from every writer of an argument to the reader,
//! weighted by the argument's slot.

use std::collections::HashMap;

use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, NodeIndex};

use super::{ExprGraph, ExprId};

impl ExprGraph {
    pub fn dependency_graph(&self) -> DiGraph<String, usize> {
        let mut graph = DiGraph::new();
        let mut writers: HashMap<ExprId, Vec<NodeIndex>> = HashMap::new();

        for (pos, expr) in self.live() {
            let node = graph.add_node(format!("{}: {}", pos, expr));
            for (slot, arg) in expr.arguments().iter().enumerate() {
                for &from in writers.get(arg).into_iter().flatten() {
                    graph.add_edge(from, node, slot);
                }
            }
            if let Some(lhs) = expr.lhs() {
                writers.entry(lhs).or_default().push(node);
            }
        }
        graph
    }

    /// Graphviz rendering of `dependency_graph`.
    pub fn to_dot(&self) -> String {
        format!("{}", Dot::new(&self.dependency_graph()))
    }
}
