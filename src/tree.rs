//! Join-tree construction.
//!
//! The parsed constraints form an undirected graph over the query's
//! aliases. A valid query's graph is a tree; we root it at a
//! maximum-degree alias and orient every edge child-to-parent, storing the
//! edge constraint normalized so its source is the child. Cyclic or
//! disconnected graphs are rejected.

use crate::constraint::JoinConstraint;
use crate::entry::Entry;
use crate::error::ObliviousJoinError;
use crate::query::ParsedQuery;
use crate::table::Table;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// One node of the rooted join tree.
#[derive(Debug, Clone)]
pub struct JoinTreeNode {
    pub alias: String,
    /// The augmented base table (load order preserved; metadata mutated
    /// in place by the phases).
    pub table: Table,
    /// Expanded/aligned rows, populated by distribute-expand and reordered
    /// by align-concat. Length equals the output cardinality.
    pub expanded: Vec<Entry>,
    /// Join column toward the parent; the root inherits its first child
    /// edge's target column.
    pub join_column: String,
    /// Edge constraint to the parent, source side = this node.
    pub constraint: Option<JoinConstraint>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

/// Index-arena join tree.
#[derive(Debug, Clone)]
pub struct JoinTree {
    nodes: Vec<JoinTreeNode>,
    root: usize,
}

impl JoinTree {
    /// Build the tree from a parsed query and the loaded tables.
    pub fn build(
        query: &ParsedQuery,
        tables: &HashMap<String, Table>,
    ) -> Result<Self, ObliviousJoinError> {
        let n = query.tables.len();
        if n == 0 {
            return Err(ObliviousJoinError::SchemaError(
                "query references no tables".into(),
            ));
        }

        let mut nodes = Vec::with_capacity(n);
        let mut index_of: HashMap<&str, usize> = HashMap::new();
        for (i, table_ref) in query.tables.iter().enumerate() {
            let base = tables.get(&table_ref.name).ok_or_else(|| {
                ObliviousJoinError::SchemaError(format!(
                    "table '{}' (alias '{}') not found in input",
                    table_ref.name, table_ref.alias
                ))
            })?;
            let mut table = base.clone();
            table.set_name(&table_ref.alias);
            index_of.insert(table_ref.alias.as_str(), i);
            nodes.push(JoinTreeNode {
                alias: table_ref.alias.clone(),
                table,
                expanded: Vec::new(),
                join_column: String::new(),
                constraint: None,
                parent: None,
                children: Vec::new(),
            });
        }

        // Validate constraint columns against the schemas up front.
        for c in &query.joins {
            for (alias, column) in [
                (&c.source_table, &c.source_column),
                (&c.target_table, &c.target_column),
            ] {
                let idx = *index_of.get(alias.as_str()).ok_or_else(|| {
                    ObliviousJoinError::UnsupportedPredicate(format!("unknown alias '{alias}'"))
                })?;
                nodes[idx].table.column_index(column)?;
            }
        }

        // Undirected adjacency: alias index -> (neighbor, constraint index).
        let mut adjacency: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
        for (ci, c) in query.joins.iter().enumerate() {
            let a = index_of[c.source_table.as_str()];
            let b = index_of[c.target_table.as_str()];
            adjacency[a].push((b, ci));
            adjacency[b].push((a, ci));
        }

        if query.joins.len() + 1 != n {
            return Err(ObliviousJoinError::CyclicOrDisconnected(format!(
                "{n} tables need exactly {} join edges, got {}",
                n - 1,
                query.joins.len()
            )));
        }

        // Root: first alias of maximum degree, to shorten propagation paths.
        let root = (0..n)
            .max_by_key(|&i| (adjacency[i].len(), usize::MAX - i))
            .unwrap_or(0);

        // BFS orientation; an unvisited node afterwards means the edge
        // count was consumed by a cycle elsewhere.
        let mut visited = vec![false; n];
        visited[root] = true;
        let mut queue = VecDeque::from([root]);
        let mut order = vec![root];
        while let Some(here) = queue.pop_front() {
            for &(next, ci) in &adjacency[here] {
                if visited[next] {
                    continue;
                }
                visited[next] = true;
                let c = &query.joins[ci];
                let oriented = if c.source_table == nodes[next].alias {
                    c.clone()
                } else {
                    c.reverse()
                };
                nodes[next].join_column = oriented.source_column.clone();
                nodes[next].constraint = Some(oriented);
                nodes[next].parent = Some(here);
                nodes[here].children.push(next);
                queue.push_back(next);
                order.push(next);
            }
        }

        if let Some(stray) = visited.iter().position(|v| !v) {
            return Err(ObliviousJoinError::CyclicOrDisconnected(format!(
                "table '{}' is not connected to the rest of the query",
                nodes[stray].alias
            )));
        }

        // The root joins on its first child edge's target column; a
        // single-table query has no join column at all.
        let root_column = nodes[root]
            .children
            .first()
            .and_then(|&child| nodes[child].constraint.as_ref())
            .map(|c| c.target_column.clone())
            .unwrap_or_default();
        nodes[root].join_column = root_column;

        debug!(
            root = %nodes[root].alias,
            nodes = n,
            "join tree built"
        );
        Ok(JoinTree { nodes, root })
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, i: usize) -> &JoinTreeNode {
        &self.nodes[i]
    }

    pub fn node_mut(&mut self, i: usize) -> &mut JoinTreeNode {
        &mut self.nodes[i]
    }

    pub fn nodes(&self) -> &[JoinTreeNode] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [JoinTreeNode] {
        &mut self.nodes
    }

    pub fn index_of_alias(&self, alias: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.alias == alias)
    }

    /// Children first, each subtree fully before its root.
    pub fn post_order(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.post_order_into(self.root, &mut out);
        out
    }

    fn post_order_into(&self, node: usize, out: &mut Vec<usize>) {
        for &child in &self.nodes[node].children {
            self.post_order_into(child, out);
        }
        out.push(node);
    }

    /// Root first, parents before children.
    pub fn pre_order(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            out.push(node);
            for &child in self.nodes[node].children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Simultaneous mutable access to two distinct nodes.
    pub fn pair_mut(&mut self, a: usize, b: usize) -> (&mut JoinTreeNode, &mut JoinTreeNode) {
        assert_ne!(a, b);
        if a < b {
            let (lo, hi) = self.nodes.split_at_mut(b);
            (&mut lo[a], &mut hi[0])
        } else {
            let (lo, hi) = self.nodes.split_at_mut(a);
            (&mut hi[0], &mut lo[b])
        }
    }
}
