pub mod controller;
pub mod graph;

pub use controller::{ComponentSelector, SharedController, StreamController};
pub use graph::{NodeId, NodeOutput, StreamGraph};
