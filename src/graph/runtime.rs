// Graph Runtime - petgraph based
// Validated linear stage chain, executed lazily as a stream

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use futures_util::stream::{self, BoxStream, StreamExt};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use super::node::{GraphError, Node, NodeContext, NodeOutcome};
use super::state::TutorState;
use super::stream::{explanation_chunks, StreamChunk};

/// A built pipeline: the stage graph plus its precomputed execution order.
pub struct GraphRuntime {
    graph: DiGraph<Box<dyn Node>, ()>,
    order: Vec<NodeIndex>,
}

impl GraphRuntime {
    /// Stage ids in execution order.
    pub fn stage_ids(&self) -> Vec<&'static str> {
        self.order.iter().map(|idx| self.graph[*idx].id()).collect()
    }

    /// Lazily runs every stage over `state`.
    ///
    /// Nothing executes until the stream is polled, and a stage only starts
    /// once every chunk of the previous stage has been taken. Dropping the
    /// stream drops any in-flight capability call and skips the remaining
    /// stages.
    pub fn stream(self: Arc<Self>, state: TutorState, ctx: NodeContext) -> BoxStream<'static, StreamChunk> {
        let run = Run {
            graph: self,
            ctx,
            state,
            next_stage: 0,
            pending: VecDeque::new(),
            trace: Vec::new(),
            finished: false,
        };

        stream::unfold(run, |mut run| async move {
            let chunk = run.next_chunk().await?;
            Some((chunk, run))
        })
        .boxed()
    }

    async fn run_stage(
        &self,
        idx: NodeIndex,
        state: &mut TutorState,
        ctx: &NodeContext,
    ) -> Result<Vec<StreamChunk>, GraphError> {
        let node = &self.graph[idx];
        let node_id = node.id();
        let explanation_was_set = state.explanation.is_set();

        tracing::debug!("Executing stage: {}", node_id);
        let label = match node.execute(state, ctx).await? {
            NodeOutcome::Completed(label) => {
                tracing::debug!("Stage {} completed: {}", node_id, label);
                label
            }
            NodeOutcome::Failed(err) => {
                tracing::warn!("Stage {} failed: {}", node_id, err);
                node.recover(state, &err)?;
                node.failure_label(&err)
            }
        };
        state.set_current_step(label.clone());

        let mut chunks = vec![StreamChunk::Progress {
            stage: node_id,
            label,
        }];
        if !explanation_was_set {
            if let Some(explanation) = state.explanation.get() {
                chunks.extend(explanation_chunks(explanation));
            }
        }
        Ok(chunks)
    }
}

/// Per-stream execution state carried through `unfold`.
struct Run {
    graph: Arc<GraphRuntime>,
    ctx: NodeContext,
    state: TutorState,
    next_stage: usize,
    pending: VecDeque<StreamChunk>,
    trace: Vec<&'static str>,
    finished: bool,
}

impl Run {
    async fn next_chunk(&mut self) -> Option<StreamChunk> {
        loop {
            if let Some(chunk) = self.pending.pop_front() {
                return Some(chunk);
            }
            if self.finished {
                return None;
            }
            let Some(&idx) = self.graph.order.get(self.next_stage) else {
                self.finished = true;
                tracing::debug!("Pipeline complete: {}", self.state.current_step());
                return None;
            };
            self.next_stage += 1;

            match self.graph.run_stage(idx, &mut self.state, &self.ctx).await {
                Ok(chunks) => {
                    self.trace.push(self.graph.graph[idx].id());
                    self.pending.extend(chunks);
                }
                Err(err) => {
                    let err = err.with_trace(&self.trace);
                    tracing::error!("Error in workflow execution: {}", err);
                    self.finished = true;
                    self.pending.push_back(StreamChunk::Error(err.message));
                }
            }
        }
    }
}

/// Builder for the stage chain.
///
/// The chain must have exactly one entry, no cycles, at most one outgoing
/// edge per stage, and every stage reachable from the entry.
pub struct GraphBuilder {
    entry: Option<String>,
    nodes: Vec<Box<dyn Node>>,
    edges: Vec<(String, String)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            entry: None,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn entry(mut self, node_id: impl Into<String>) -> Self {
        self.entry = Some(node_id.into());
        self
    }

    pub fn node(mut self, node: Box<dyn Node>) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    pub fn build(self) -> Result<GraphRuntime, GraphError> {
        let mut graph: DiGraph<Box<dyn Node>, ()> = DiGraph::new();
        let mut node_indices: HashMap<&'static str, NodeIndex> = HashMap::new();

        for node in self.nodes {
            let id = node.id();
            if node_indices.contains_key(id) {
                return Err(GraphError::new(id, format!("Duplicate node: {}", id)));
            }
            let index = graph.add_node(node);
            node_indices.insert(id, index);
        }

        for (from, to) in &self.edges {
            let from_idx = node_indices
                .get(from.as_str())
                .ok_or_else(|| GraphError::new(from, format!("Source node not found: {}", from)))?;
            let to_idx = node_indices
                .get(to.as_str())
                .ok_or_else(|| GraphError::new(to, format!("Target node not found: {}", to)))?;
            graph.add_edge(*from_idx, *to_idx, ());
        }

        let entry = self
            .entry
            .ok_or_else(|| GraphError::new("runtime", "No entry node set"))?;
        let entry_idx = *node_indices
            .get(entry.as_str())
            .ok_or_else(|| GraphError::new("runtime", format!("Entry node not found: {}", entry)))?;

        if petgraph::algo::is_cyclic_directed(&graph) {
            return Err(GraphError::new("runtime", "Stage graph contains a cycle"));
        }
        if graph
            .edges_directed(entry_idx, Direction::Incoming)
            .next()
            .is_some()
        {
            return Err(GraphError::new(
                &entry,
                format!("Entry node has incoming edges: {}", entry),
            ));
        }

        let mut order = Vec::with_capacity(graph.node_count());
        let mut visited = HashSet::new();
        let mut current = Some(entry_idx);

        while let Some(idx) = current {
            if !visited.insert(idx) {
                break;
            }
            order.push(idx);

            let mut outgoing = graph.edges_directed(idx, Direction::Outgoing);
            current = outgoing.next().map(|edge| edge.target());
            if outgoing.next().is_some() {
                let id = graph[idx].id();
                return Err(GraphError::new(id, format!("Node branches: {}", id)));
            }
        }

        if order.len() != graph.node_count() {
            let unreachable: Vec<&str> = graph
                .node_indices()
                .filter(|idx| !visited.contains(idx))
                .map(|idx| graph[idx].id())
                .collect();
            return Err(GraphError::new(
                "runtime",
                format!("Unreachable nodes: {}", unreachable.join(", ")),
            ));
        }

        Ok(GraphRuntime { graph, order })
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}
