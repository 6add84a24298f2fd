use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use petgraph::Direction;
use petgraph::algo::{condensation, maximum_matching};
use petgraph::graph::{DiGraph, NodeIndex, UnGraph};

/// Equations that must be solved simultaneously, in system insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub equations: Vec<String>,
    /// Unknowns paired with an equation of this block by the matching.
    pub matched: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
enum Side<'a> {
    Equation(usize),
    Variable(&'a str),
}

/// Orders `equations` into blocks that can be solved one after another.
///
/// Equations and unknowns form a bipartite graph; a maximum matching
/// assigns each equation at most one unknown. Equation `a` precedes
/// equation `b` when `b` references the unknown matched to `a`, and the
/// strongly connected components of that relation, in topological order,
/// are the blocks. Only names for which `is_unknown` holds take part.
pub fn decompose<'a, I, F>(equations: I, is_unknown: F) -> Vec<Block>
where
    I: IntoIterator<Item = (&'a str, &'a BTreeSet<String>)>,
    F: Fn(&str) -> bool,
{
    let equations: Vec<(&str, &BTreeSet<String>)> = equations.into_iter().collect();

    let mut bipartite: UnGraph<Side, ()> = UnGraph::new_undirected();
    let eq_nodes: Vec<NodeIndex> = (0..equations.len())
        .map(|i| bipartite.add_node(Side::Equation(i)))
        .collect();
    let mut var_nodes: HashMap<&str, NodeIndex> = HashMap::new();
    let mut users: HashMap<&str, Vec<usize>> = HashMap::new();

    for (i, (_, names)) in equations.iter().enumerate() {
        for name in names.iter().map(String::as_str).filter(|name| is_unknown(name)) {
            let var_node = *var_nodes
                .entry(name)
                .or_insert_with(|| bipartite.add_node(Side::Variable(name)));
            bipartite.add_edge(eq_nodes[i], var_node, ());
            users.entry(name).or_default().push(i);
        }
    }

    let matching = maximum_matching(&bipartite);

    let mut dependency: DiGraph<usize, ()> = DiGraph::with_capacity(equations.len(), 0);
    let dep_nodes: Vec<NodeIndex> = (0..equations.len()).map(|i| dependency.add_node(i)).collect();
    let mut matched: Vec<Option<&str>> = vec![None; equations.len()];

    for (i, eq_node) in eq_nodes.iter().enumerate() {
        let Some(var_node) = matching.mate(*eq_node) else {
            continue;
        };
        let Side::Variable(name) = bipartite[var_node] else {
            continue;
        };
        matched[i] = Some(name);
        for &j in users.get(name).into_iter().flatten() {
            if j != i {
                dependency.update_edge(dep_nodes[i], dep_nodes[j], ());
            }
        }
    }

    // Components in topological order; among ready components the one
    // holding the earliest inserted equation goes first.
    let condensed = condensation(dependency, true);
    let mut in_degree: Vec<usize> = condensed
        .node_indices()
        .map(|node| condensed.neighbors_directed(node, Direction::Incoming).count())
        .collect();
    let first_member = |node: NodeIndex| condensed[node].iter().copied().min().unwrap_or(usize::MAX);
    let mut ready: BinaryHeap<Reverse<(usize, NodeIndex)>> = condensed
        .node_indices()
        .filter(|node| in_degree[node.index()] == 0)
        .map(|node| Reverse((first_member(node), node)))
        .collect();

    let mut blocks = Vec::with_capacity(condensed.node_count());
    while let Some(Reverse((_, node))) = ready.pop() {
        let mut members = condensed[node].clone();
        members.sort_unstable();
        blocks.push(Block {
            equations: members.iter().map(|&i| equations[i].0.to_string()).collect(),
            matched: members
                .iter()
                .filter_map(|&i| matched[i])
                .map(str::to_string)
                .collect(),
        });
        for next in condensed.neighbors(node) {
            in_degree[next.index()] -= 1;
            if in_degree[next.index()] == 0 {
                ready.push(Reverse((first_member(next), next)));
            }
        }
    }
    blocks
}
