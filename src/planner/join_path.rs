//! Join path finding over the catalog's join graph.
//!
//! Joins are traversable in either direction (the catalog stores a reversed
//! copy of every declared join). For a set of requested entities the finder
//! computes the entities of a minimum join tree, then roots that tree at the
//! requested entity preferred by the tie-break and orients it with a
//! breadth-first search restricted to those entities.
//!
//! Up to [`EXACT_TERMINAL_LIMIT`] requested entities the tree is exact
//! (Dreyfus-Wagner over breadth-first distances). Larger requests take the
//! smallest union of shortest paths from any single entity in the component.
//! Visited tracking bounds every search even on cyclic graphs.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use super::error::JoinPathError;
use super::plan::QueryPlan;
use crate::catalog::{JoinKind, SemanticCatalog};

/// Requested entity count up to which join trees are minimal.
pub const EXACT_TERMINAL_LIMIT: usize = 8;

const UNREACHABLE: u32 = u32::MAX;

/// Rule for choosing between equally short join trees.
///
/// Every rule falls back to entity id order, so the choice is total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Root at the entity the plan mentions most often.
    #[default]
    MostReferenced,
    /// Root at the entity the plan mentions last.
    MostRecent,
    /// Root at the entity with the smallest id.
    Lexical,
}

impl std::str::FromStr for TieBreak {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "most_referenced" => Ok(TieBreak::MostReferenced),
            "most_recent" => Ok(TieBreak::MostRecent),
            "lexical" => Ok(TieBreak::Lexical),
            other => Err(format!("unknown tie-break rule: {other}")),
        }
    }
}

/// One join in a path, oriented away from the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinStep {
    pub from: String,
    pub to: String,
    pub kind: JoinKind,
    pub from_columns: Vec<String>,
    pub to_columns: Vec<String>,
}

impl JoinStep {
    /// Does this step cause row multiplication (fan-out)?
    pub fn causes_fanout(&self) -> bool {
        self.kind.causes_fanout()
    }
}

/// A join tree rooted at one entity. Each step's `from` is the root or the
/// `to` of an earlier step, and no entity appears twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinPath {
    pub root: String,
    pub steps: Vec<JoinStep>,
}

impl JoinPath {
    /// A path with no joins.
    pub fn single(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            steps: vec![],
        }
    }

    /// All entities covered: the root, then each joined entity.
    pub fn entities(&self) -> Vec<&str> {
        std::iter::once(self.root.as_str())
            .chain(self.steps.iter().map(|s| s.to.as_str()))
            .collect()
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.root == entity || self.steps.iter().any(|s| s.to == entity)
    }

    /// Does any step cause fan-out?
    pub fn causes_fanout(&self) -> bool {
        self.steps.iter().any(JoinStep::causes_fanout)
    }

    /// Number of joins.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Parent information for path reconstruction.
/// Stores the parent node and the edge used to reach the current node.
struct ParentInfo {
    parent: NodeIndex,
    edge_idx: EdgeIndex,
}

/// Finds join paths in a catalog.
pub struct JoinPathFinder<'a> {
    catalog: &'a SemanticCatalog,
    tie_break: TieBreak,
}

impl<'a> JoinPathFinder<'a> {
    pub fn new(catalog: &'a SemanticCatalog) -> Self {
        Self {
            catalog,
            tie_break: TieBreak::default(),
        }
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Resolve the join tree for a plan's entities.
    pub fn resolve(&self, plan: &QueryPlan) -> Result<JoinPath, JoinPathError> {
        self.connect(plan.entities(), &plan.reference_sequence())
    }

    /// Connect `requested` entities with a minimal join tree.
    ///
    /// `references` is the order in which the caller mentioned entities; it
    /// only feeds the tie-break between equally short trees.
    pub fn connect<S: AsRef<str>>(
        &self,
        requested: &[S],
        references: &[&str],
    ) -> Result<JoinPath, JoinPathError> {
        let mut targets: Vec<&str> = Vec::new();
        for id in requested.iter().map(AsRef::as_ref) {
            if !targets.contains(&id) {
                targets.push(id);
            }
        }
        if targets.is_empty() {
            return Err(JoinPathError::EmptyRequest);
        }

        let indices = targets
            .iter()
            .map(|id| {
                self.catalog
                    .node_index(id)
                    .ok_or_else(|| JoinPathError::UnknownEntity(id.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if targets.len() == 1 {
            return Ok(JoinPath::single(targets[0]));
        }

        let ranked = self.rank_roots(&targets, references);
        let root = indices[ranked[0]];
        let parents = self.bfs(root, None);
        if !indices.iter().all(|idx| *idx == root || parents.contains_key(idx)) {
            let unreachable = self.unreachable(&targets, &indices, &ranked);
            tracing::debug!(unreachable = ?unreachable, "requested entities are disconnected");
            return Err(JoinPathError::Disconnected { unreachable });
        }

        let span = if indices.len() <= EXACT_TERMINAL_LIMIT {
            self.steiner_nodes(&indices, root)
        } else {
            self.shortest_union(&indices, &parents, root)
        };
        let within = self.bfs(root, Some(&span));
        let path = self.merge_paths(root, &indices, &within);

        tracing::debug!(
            root = %path.root,
            joins = path.len(),
            fanout = path.causes_fanout(),
            "join path resolved"
        );
        Ok(path)
    }

    /// Requested entities outside the component holding the most requested
    /// entities. Ties go to the best-ranked root.
    fn unreachable(&self, targets: &[&str], indices: &[NodeIndex], ranked: &[usize]) -> Vec<String> {
        let mut anchor: Option<HashSet<NodeIndex>> = None;
        for &root_pos in ranked {
            let root = indices[root_pos];
            let parents = self.bfs(root, None);
            let reached: HashSet<NodeIndex> = indices
                .iter()
                .copied()
                .filter(|idx| *idx == root || parents.contains_key(idx))
                .collect();
            if anchor.as_ref().map_or(true, |a| reached.len() > a.len()) {
                anchor = Some(reached);
            }
        }
        let anchor = anchor.unwrap_or_default();

        targets
            .iter()
            .zip(indices)
            .filter(|(_, idx)| !anchor.contains(*idx))
            .map(|(id, _)| id.to_string())
            .collect()
    }

    /// Shortest join path between two entities.
    pub fn shortest_path(&self, from: &str, to: &str) -> Result<JoinPath, JoinPathError> {
        let from_idx = self
            .catalog
            .node_index(from)
            .ok_or_else(|| JoinPathError::UnknownEntity(from.into()))?;
        let to_idx = self
            .catalog
            .node_index(to)
            .ok_or_else(|| JoinPathError::UnknownEntity(to.into()))?;

        if from_idx == to_idx {
            return Ok(JoinPath::single(from));
        }

        let parents = self.bfs(from_idx, None);
        if !parents.contains_key(&to_idx) {
            return Err(JoinPathError::NoPath {
                from: from.into(),
                to: to.into(),
            });
        }
        Ok(self.merge_paths(from_idx, &[to_idx], &parents))
    }

    /// Breadth-first search from `root`, over the whole graph or only the
    /// entities in `within`.
    ///
    /// Neighbours are visited in entity id order so the resulting tree is
    /// deterministic regardless of declaration order.
    fn bfs(
        &self,
        root: NodeIndex,
        within: Option<&HashSet<NodeIndex>>,
    ) -> HashMap<NodeIndex, ParentInfo> {
        let graph = self.catalog.graph();
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut parents: HashMap<NodeIndex, ParentInfo> = HashMap::new();
        let mut queue: VecDeque<NodeIndex> = VecDeque::new();

        queue.push_back(root);
        visited.insert(root);

        while let Some(current) = queue.pop_front() {
            let mut edges: Vec<_> = graph.edges(current).collect();
            edges.sort_by(|a, b| {
                graph[a.target()]
                    .cmp(&graph[b.target()])
                    .then_with(|| a.id().index().cmp(&b.id().index()))
            });

            for edge_ref in edges {
                let neighbor = edge_ref.target();
                if within.is_some_and(|w| !w.contains(&neighbor)) || !visited.insert(neighbor) {
                    continue;
                }
                parents.insert(
                    neighbor,
                    ParentInfo {
                        parent: current,
                        edge_idx: edge_ref.id(),
                    },
                );
                queue.push_back(neighbor);
            }
        }

        parents
    }

    /// Union of root-to-target paths from one BFS tree, in target order.
    fn merge_paths(
        &self,
        root: NodeIndex,
        targets: &[NodeIndex],
        parents: &HashMap<NodeIndex, ParentInfo>,
    ) -> JoinPath {
        let graph = self.catalog.graph();
        let mut steps: Vec<JoinStep> = Vec::new();
        let mut covered: HashSet<NodeIndex> = HashSet::from([root]);

        for &target in targets {
            let mut chain = Vec::new();
            let mut current = target;
            // Walk backward until we meet the part of the tree already emitted.
            while !covered.contains(&current) {
                let info = &parents[&current];
                chain.push((info.parent, current, info.edge_idx));
                current = info.parent;
            }
            for (from, to, edge_idx) in chain.into_iter().rev() {
                let edge = &graph[edge_idx];
                covered.insert(to);
                steps.push(JoinStep {
                    from: graph[from].clone(),
                    to: graph[to].clone(),
                    kind: edge.kind,
                    from_columns: edge.from_columns.clone(),
                    to_columns: edge.to_columns.clone(),
                });
            }
        }

        JoinPath {
            root: graph[root].clone(),
            steps,
        }
    }

    /// Entities of a minimum tree connecting `terminals` (Dreyfus-Wagner).
    ///
    /// `cost[mask][v]` is the size of the smallest tree holding the terminals
    /// in `mask` plus `v`. `split` records how the tree at `v` divides the
    /// terminals, and `via` the entity whose split tree is extended to `v`.
    fn steiner_nodes(&self, terminals: &[NodeIndex], root: NodeIndex) -> HashSet<NodeIndex> {
        let adj = self.adjacency();
        let n = adj.len();
        let dist: Vec<Vec<u32>> = (0..n).map(|v| distances(&adj, v)).collect();

        let full = (1usize << terminals.len()) - 1;
        let mut cost = vec![vec![UNREACHABLE; n]; full + 1];
        let mut split = vec![vec![0usize; n]; full + 1];
        let mut via = vec![vec![0usize; n]; full + 1];

        for (i, terminal) in terminals.iter().enumerate() {
            let mask = 1 << i;
            cost[mask] = dist[terminal.index()].clone();
            via[mask] = vec![terminal.index(); n];
        }

        for mask in 1..=full {
            if mask.count_ones() < 2 {
                continue;
            }
            let lowest = mask & mask.wrapping_neg();
            let mut merged = vec![UNREACHABLE; n];
            for (v, best) in merged.iter_mut().enumerate() {
                let mut sub = (mask - 1) & mask;
                while sub > 0 {
                    if sub & lowest != 0 {
                        let c = cost[sub][v].saturating_add(cost[mask ^ sub][v]);
                        if c < *best {
                            *best = c;
                            split[mask][v] = sub;
                        }
                    }
                    sub = (sub - 1) & mask;
                }
            }
            for v in 0..n {
                for (u, m) in merged.iter().enumerate() {
                    let c = m.saturating_add(dist[u][v]);
                    if c < cost[mask][v] {
                        cost[mask][v] = c;
                        via[mask][v] = u;
                    }
                }
            }
        }

        let mut nodes = HashSet::new();
        let mut stack = vec![(full, root.index())];
        while let Some((mask, v)) = stack.pop() {
            let u = via[mask][v];
            nodes.extend(walk(&adj, &dist[u], v).into_iter().map(NodeIndex::new));
            if mask.count_ones() > 1 {
                let sub = split[mask][u];
                stack.push((sub, u));
                stack.push((mask ^ sub, u));
            }
        }
        nodes
    }

    /// Entities of the smallest union of shortest paths from any single
    /// entity in the component to every terminal.
    fn shortest_union(
        &self,
        terminals: &[NodeIndex],
        component: &HashMap<NodeIndex, ParentInfo>,
        root: NodeIndex,
    ) -> HashSet<NodeIndex> {
        let mut candidates: Vec<NodeIndex> = component.keys().copied().collect();
        candidates.push(root);
        candidates.sort();

        let mut best: Option<JoinPath> = None;
        for candidate in candidates {
            let parents = self.bfs(candidate, None);
            let path = self.merge_paths(candidate, terminals, &parents);
            if best.as_ref().map_or(true, |b| path.len() < b.len()) {
                best = Some(path);
            }
        }

        best.map(|path| {
            path.entities()
                .into_iter()
                .filter_map(|id| self.catalog.node_index(id))
                .collect()
        })
        .unwrap_or_default()
    }

    /// Undirected neighbour lists by node index, in index order.
    fn adjacency(&self) -> Vec<Vec<usize>> {
        let graph = self.catalog.graph();
        let mut adj = vec![Vec::new(); graph.node_count()];
        for edge in graph.edge_references() {
            adj[edge.source().index()].push(edge.target().index());
        }
        for neighbours in &mut adj {
            neighbours.sort_unstable();
            neighbours.dedup();
        }
        adj
    }

    /// Positions of `targets`, best root candidate first.
    fn rank_roots(&self, targets: &[&str], references: &[&str]) -> Vec<usize> {
        let count = |id: &str| references.iter().filter(|r| **r == id).count();
        let last_seen = |id: &str| references.iter().rposition(|r| *r == id);

        let mut order: Vec<usize> = (0..targets.len()).collect();
        order.sort_by(|&a, &b| {
            let (ia, ib) = (targets[a], targets[b]);
            let primary = match self.tie_break {
                TieBreak::MostReferenced => count(ib).cmp(&count(ia)),
                TieBreak::MostRecent => last_seen(ib).cmp(&last_seen(ia)),
                TieBreak::Lexical => std::cmp::Ordering::Equal,
            };
            primary.then_with(|| ia.cmp(ib))
        });
        order
    }
}

/// Breadth-first distances from `from` to every node.
fn distances(adj: &[Vec<usize>], from: usize) -> Vec<u32> {
    let mut dist = vec![UNREACHABLE; adj.len()];
    let mut queue = VecDeque::from([from]);
    dist[from] = 0;
    while let Some(current) = queue.pop_front() {
        for &next in &adj[current] {
            if dist[next] == UNREACHABLE {
                dist[next] = dist[current] + 1;
                queue.push_back(next);
            }
        }
    }
    dist
}

/// Nodes on a shortest path from the source of `dist` to `to`, inclusive.
fn walk(adj: &[Vec<usize>], dist: &[u32], to: usize) -> Vec<usize> {
    let mut nodes = vec![to];
    let mut current = to;
    while dist[current] > 0 && dist[current] != UNREACHABLE {
        let Some(&prev) = adj[current].iter().find(|w| dist[**w] == dist[current] - 1) else {
            break;
        };
        nodes.push(prev);
        current = prev;
    }
    nodes
}
