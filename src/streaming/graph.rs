/// Directed graph of stream controllers with declared, relabeling edges
use std::collections::HashMap;

use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::types::TimeSeriesSet;

use super::controller::StreamController;

/// Handle to a node in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

struct GraphNode {
    name: String,
    controller: StreamController,
}

#[derive(Clone)]
struct GraphEdge {
    to: usize,
    relabel: HashMap<String, String>,
}

/// Output emitted by one node during a push
pub struct NodeOutput {
    pub node: String,
    pub output: TimeSeriesSet,
}

/// Wires controllers into a processing graph built once at startup.
///
/// Each edge carries a channel-relabel rule applied to the upstream output
/// before delivery. Delivery is synchronous and depth-first: a push into a
/// node runs that node, then walks its out-edges in declaration order,
/// recursing into each downstream node before moving to the next edge.
/// Cycles are rejected when an edge is added.
pub struct StreamGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<Vec<GraphEdge>>,
}

impl StreamGraph {
    pub fn new() -> Self {
        StreamGraph {
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn add_node(&mut self, name: impl Into<String>, controller: StreamController) -> Result<NodeId> {
        let name = name.into();
        if self.nodes.iter().any(|n| n.name == name) {
            return Err(PipelineError::Streaming(format!(
                "Duplicate node name: {}",
                name
            )));
        }
        self.nodes.push(GraphNode { name, controller });
        self.edges.push(Vec::new());
        Ok(NodeId(self.nodes.len() - 1))
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.name == name).map(NodeId)
    }

    fn reaches(&self, from: usize, target: usize) -> bool {
        if from == target {
            return true;
        }
        self.edges[from]
            .iter()
            .any(|edge| self.reaches(edge.to, target))
    }

    pub fn add_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        relabel: HashMap<String, String>,
    ) -> Result<()> {
        if from.0 >= self.nodes.len() || to.0 >= self.nodes.len() {
            return Err(PipelineError::Streaming("Edge references unknown node".to_string()));
        }
        if self.reaches(to.0, from.0) {
            return Err(PipelineError::Streaming(format!(
                "Edge {} -> {} would create a cycle",
                self.nodes[from.0].name, self.nodes[to.0].name
            )));
        }
        self.edges[from.0].push(GraphEdge { to: to.0, relabel });
        Ok(())
    }

    /// Build the configured graph: every controller becomes a node, every
    /// declared edge is wired with its relabel rule.
    pub fn from_config(config: &crate::types::Config) -> Result<Self> {
        let mut graph = StreamGraph::new();
        for controller in &config.controllers {
            let algorithm = crate::algorithm::from_spec(&controller.algorithm)?;
            let node = StreamController::new(
                controller.components.clone(),
                algorithm,
                controller.max_delay_secs.map(chrono::Duration::seconds),
                controller.left_pad,
                controller.right_pad,
            );
            graph.add_node(controller.name.clone(), node)?;
        }
        for edge in &config.edges {
            let from = graph.node_id(&edge.from).ok_or_else(|| {
                PipelineError::Streaming(format!("Unknown controller: {}", edge.from))
            })?;
            let to = graph.node_id(&edge.to).ok_or_else(|| {
                PipelineError::Streaming(format!("Unknown controller: {}", edge.to))
            })?;
            graph.add_edge(from, to, edge.rename.clone())?;
        }
        Ok(graph)
    }

    /// Push data into one node and deliver outputs through the graph.
    ///
    /// Returns every non-empty output produced during the walk, in
    /// delivery (depth-first) order.
    pub fn push(&mut self, node: NodeId, data: &TimeSeriesSet) -> Result<Vec<NodeOutput>> {
        let mut outputs = Vec::new();
        self.push_inner(node.0, data, &mut outputs)?;
        Ok(outputs)
    }

    fn push_inner(
        &mut self,
        node: usize,
        data: &TimeSeriesSet,
        outputs: &mut Vec<NodeOutput>,
    ) -> Result<()> {
        let output = self.nodes[node].controller.on_data(data)?;
        if output.is_empty() {
            return Ok(());
        }
        debug!(
            "Node {} emitted {} channel(s)",
            self.nodes[node].name,
            output.len()
        );
        outputs.push(NodeOutput {
            node: self.nodes[node].name.clone(),
            output: output.clone(),
        });
        let edges = self.edges[node].clone();
        for edge in edges {
            let mut delivered = output.clone();
            if !edge.relabel.is_empty() {
                delivered.rename_channels(&edge.relabel);
            }
            self.push_inner(edge.to, &delivered, outputs)?;
        }
        Ok(())
    }
}

impl Default for StreamGraph {
    fn default() -> Self {
        StreamGraph::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{ScaleAlgorithm, SumAlgorithm};
    use crate::streaming::controller::ComponentSelector;
    use crate::types::{Channel, DataType, SampleInterval};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn channel(name: &str, data: Vec<f64>) -> Channel {
        Channel::new(
            "LLO",
            name,
            DataType::Variation,
            SampleInterval::Minute,
            Utc.with_ymd_and_hms(2019, 1, 1, 0, 2, 0).unwrap(),
            data,
        )
    }

    fn scale_node(channel: &str, factor: f64) -> StreamController {
        StreamController::new(
            vec![ComponentSelector::new(None, channel)],
            Arc::new(ScaleAlgorithm::new(vec![channel.to_string()], factor)),
            None,
            0,
            0,
        )
    }

    fn sum_node() -> StreamController {
        StreamController::new(
            vec![
                ComponentSelector::new(None, "U_Bin"),
                ComponentSelector::new(None, "U_Volt"),
            ],
            Arc::new(SumAlgorithm::new(
                vec!["U_Bin".to_string(), "U_Volt".to_string()],
                "U",
            )),
            None,
            0,
            0,
        )
    }

    #[test]
    fn test_cascade_with_relabeling_edges() {
        let mut graph = StreamGraph::new();
        let volt = graph.add_node("volt", scale_node("BEU", 100.0)).unwrap();
        let bin = graph.add_node("bin", scale_node("BYU", 500.0)).unwrap();
        let sum = graph.add_node("sum", sum_node()).unwrap();
        graph
            .add_edge(
                volt,
                sum,
                HashMap::from([("BEU".to_string(), "U_Volt".to_string())]),
            )
            .unwrap();
        graph
            .add_edge(
                bin,
                sum,
                HashMap::from([("BYU".to_string(), "U_Bin".to_string())]),
            )
            .unwrap();

        let outputs = graph
            .push(
                bin,
                &TimeSeriesSet::from_channels(vec![channel(
                    "BYU",
                    vec![10.0, 20.0, 30.0, 40.0, 50.0],
                )])
                .unwrap(),
            )
            .unwrap();
        // sum is still waiting for its second component
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].node, "bin");

        let outputs = graph
            .push(
                volt,
                &TimeSeriesSet::from_channels(vec![channel(
                    "BEU",
                    vec![1.0, 2.0, 3.0, 4.0, 5.0],
                )])
                .unwrap(),
            )
            .unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].node, "volt");
        assert_eq!(outputs[1].node, "sum");
        let summed = outputs[1].output.select(None, Some("U"))[0];
        assert_eq!(
            summed.data,
            vec![
                10.0 * 500.0 + 1.0 * 100.0,
                20.0 * 500.0 + 2.0 * 100.0,
                30.0 * 500.0 + 3.0 * 100.0,
                40.0 * 500.0 + 4.0 * 100.0,
                50.0 * 500.0 + 5.0 * 100.0
            ]
        );
    }

    #[test]
    fn test_graph_built_from_config() {
        let config = crate::config::parse_config(
            r#"
[[controller]]
name = "volt"
components = [{ channel = "BEU" }]
algorithm = { name = "scale", channels = ["BEU"], factor = 2.0 }

[[controller]]
name = "combine"
components = [{ channel = "U_Volt" }]
algorithm = { name = "identity" }

[[edge]]
from = "volt"
to = "combine"
rename = { BEU = "U_Volt" }
"#,
        )
        .unwrap();
        let mut graph = StreamGraph::from_config(&config).unwrap();
        let volt = graph.node_id("volt").unwrap();
        let outputs = graph
            .push(
                volt,
                &TimeSeriesSet::from_channels(vec![channel("BEU", vec![1.0, 2.0, 3.0])]).unwrap(),
            )
            .unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[1].node, "combine");
        let relabeled = outputs[1].output.select(None, Some("U_Volt"))[0];
        assert_eq!(relabeled.data, vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_cycles_are_rejected() {
        let mut graph = StreamGraph::new();
        let a = graph.add_node("a", scale_node("BEU", 1.0)).unwrap();
        let b = graph.add_node("b", scale_node("BEU", 1.0)).unwrap();
        graph.add_edge(a, b, HashMap::new()).unwrap();
        assert!(graph.add_edge(b, a, HashMap::new()).is_err());
        assert!(graph.add_edge(a, a, HashMap::new()).is_err());
    }

    #[test]
    fn test_duplicate_node_names_rejected() {
        let mut graph = StreamGraph::new();
        graph.add_node("a", scale_node("BEU", 1.0)).unwrap();
        assert!(graph.add_node("a", scale_node("BYU", 1.0)).is_err());
    }
}
