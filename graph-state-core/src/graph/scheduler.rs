//! Update Scheduler
//!
//! The scheduler owns every node state of one store and determines the order
//! in which nodes are settled after a write. It ensures that dependencies are
//! always settled before their dependents.
//!
//! # Algorithm
//!
//! 1. When a node changes, mark its direct dependents as "dirty"
//! 2. Propagate "maybe dirty" to their dependents, recursively
//! 3. Collect all marked nodes
//! 4. Sort them topologically (dependencies before dependents)
//! 5. The store then settles each node in order:
//!    - "maybe dirty" nodes first settle their own dependencies, and only
//!      recompute if one of them turned out to change
//!    - "dirty" nodes recompute
//!    - a recomputation that changes the value marks direct dependents dirty
//!
//! This push-pull approach minimizes unnecessary recomputation.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use smallvec::SmallVec;

use super::node::{NodeId, NodeState};
use crate::reactive::ErasedNode;

/// Arena of node states for one store, indexed by node identity.
#[derive(Debug, Default)]
pub(crate) struct UpdateScheduler {
    nodes: HashMap<NodeId, NodeState>,
}

impl UpdateScheduler {
    pub(crate) fn new() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    /// Get the state for a descriptor, creating it on first access.
    pub(crate) fn ensure(&mut self, def: &Arc<dyn ErasedNode>) -> &mut NodeState {
        self.nodes
            .entry(def.id())
            .or_insert_with(|| NodeState::new(Arc::clone(def)))
    }

    pub(crate) fn get(&self, node_id: NodeId) -> Option<&NodeState> {
        self.nodes.get(&node_id)
    }

    pub(crate) fn get_mut(&mut self, node_id: NodeId) -> Option<&mut NodeState> {
        self.nodes.get_mut(&node_id)
    }

    /// Remove every node, handing back their states.
    pub(crate) fn drain(&mut self) -> Vec<NodeState> {
        self.nodes.drain().map(|(_, state)| state).collect()
    }

    /// Install the dependency set of a successful resolution, replacing the
    /// previous one.
    pub(crate) fn replace_dependencies(
        &mut self,
        node_id: NodeId,
        dependencies: SmallVec<[NodeId; 4]>,
    ) {
        let old: SmallVec<[NodeId; 4]> = match self.nodes.get(&node_id) {
            Some(node) => node.dependencies().iter().copied().collect(),
            None => return,
        };

        for dep_id in old.iter().filter(|id| !dependencies.contains(id)) {
            if let Some(dep) = self.nodes.get_mut(dep_id) {
                dep.remove_dependent(node_id);
            }
        }

        for dep_id in &dependencies {
            if let Some(dep) = self.nodes.get_mut(dep_id) {
                dep.add_dependent(node_id);
            }
        }

        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.set_dependencies(dependencies);
        }
    }

    /// Add edges without removing any. Used after a failed resolution, which
    /// must not drop edges but should still react to what it managed to read.
    pub(crate) fn extend_dependencies(&mut self, node_id: NodeId, dependencies: &[NodeId]) {
        for &dep_id in dependencies {
            if let Some(dep) = self.nodes.get_mut(&dep_id) {
                dep.add_dependent(node_id);
            }
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.add_dependency(dep_id);
            }
        }
    }

    /// Mark a changed node's dependents and return them in settle order.
    ///
    /// Direct dependents become dirty, everything further downstream becomes
    /// maybe dirty. Nodes that were never resolved are skipped: they will
    /// read fresh values whenever they are first resolved.
    pub(crate) fn mark_changed(&mut self, source_id: NodeId) -> Vec<NodeId> {
        let mut to_process = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        if let Some(source) = self.nodes.get(&source_id) {
            for dependent_id in source.dependents() {
                queue.push_back((*dependent_id, true));
            }
        }

        while let Some((node_id, direct)) = queue.pop_front() {
            if node_id == source_id {
                continue;
            }

            if let Some(node) = self.nodes.get_mut(&node_id) {
                if !node.is_settled() {
                    continue;
                }
                if direct {
                    node.mark_dirty();
                } else {
                    node.mark_maybe_dirty();
                }
                if !visited.insert(node_id) {
                    continue;
                }
                to_process.push(node_id);

                for dependent_id in node.dependents() {
                    queue.push_back((*dependent_id, false));
                }
            }
        }

        self.topological_sort(to_process)
    }

    /// Perform a topological sort of the given nodes.
    ///
    /// Returns nodes in order such that dependencies come before dependents.
    /// Nodes caught in a cycle are appended at the end in discovery order.
    fn topological_sort(&self, nodes: Vec<NodeId>) -> Vec<NodeId> {
        let node_set: HashSet<_> = nodes.iter().copied().collect();
        let mut in_degree: HashMap<NodeId, usize> = HashMap::new();
        let mut result = Vec::with_capacity(nodes.len());
        let mut queue = VecDeque::new();

        for &node_id in &nodes {
            if let Some(node) = self.nodes.get(&node_id) {
                let degree = node
                    .dependencies()
                    .iter()
                    .filter(|d| node_set.contains(d))
                    .count();
                in_degree.insert(node_id, degree);
                if degree == 0 {
                    queue.push_back(node_id);
                }
            }
        }

        // Kahn's algorithm
        while let Some(node_id) = queue.pop_front() {
            result.push(node_id);

            if let Some(node) = self.nodes.get(&node_id) {
                for dependent_id in node.dependents() {
                    if let Some(degree) = in_degree.get_mut(dependent_id) {
                        if *degree == 0 {
                            continue;
                        }
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(*dependent_id);
                        }
                    }
                }
            }
        }

        if result.len() < nodes.len() {
            let placed: HashSet<_> = result.iter().copied().collect();
            result.extend(nodes.into_iter().filter(|id| !placed.contains(id)));
        }

        result
    }

    /// Get the total number of nodes in the arena.
    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::{DirtyState, NodeStatus};
    use crate::reactive::GraphNode;
    use smallvec::smallvec;

    fn settled(scheduler: &mut UpdateScheduler) -> NodeId {
        let def = GraphNode::constant(0).erased();
        let state = scheduler.ensure(&def);
        state.status = NodeStatus::Resolved;
        def.id()
    }

    #[test]
    fn ensure_creates_once() {
        let mut scheduler = UpdateScheduler::new();
        let def = GraphNode::constant(1).erased();

        scheduler.ensure(&def);
        scheduler.ensure(&def);

        assert_eq!(scheduler.node_count(), 1);
    }

    #[test]
    fn replace_dependencies_rewires_edges() {
        let mut scheduler = UpdateScheduler::new();
        let a = settled(&mut scheduler);
        let b = settled(&mut scheduler);
        let derived = settled(&mut scheduler);

        scheduler.replace_dependencies(derived, smallvec![a]);
        assert!(scheduler.get(a).unwrap().dependents().contains(&derived));

        scheduler.replace_dependencies(derived, smallvec![b]);
        assert!(!scheduler.get(a).unwrap().dependents().contains(&derived));
        assert!(scheduler.get(b).unwrap().dependents().contains(&derived));
        assert_eq!(scheduler.get(derived).unwrap().dependencies(), &[b]);
    }

    #[test]
    fn extend_dependencies_keeps_existing_edges() {
        let mut scheduler = UpdateScheduler::new();
        let a = settled(&mut scheduler);
        let b = settled(&mut scheduler);
        let derived = settled(&mut scheduler);

        scheduler.replace_dependencies(derived, smallvec![a]);
        scheduler.extend_dependencies(derived, &[b]);

        assert_eq!(scheduler.get(derived).unwrap().dependencies(), &[a, b]);
        assert!(scheduler.get(a).unwrap().dependents().contains(&derived));
    }

    #[test]
    fn mark_changed_propagates_in_topological_order() {
        let mut scheduler = UpdateScheduler::new();

        // source -> derived1 -> derived2, and source -> derived2
        let source = settled(&mut scheduler);
        let derived1 = settled(&mut scheduler);
        let derived2 = settled(&mut scheduler);

        scheduler.replace_dependencies(derived1, smallvec![source]);
        scheduler.replace_dependencies(derived2, smallvec![derived1, source]);

        let to_process = scheduler.mark_changed(source);
        assert_eq!(to_process, vec![derived1, derived2]);

        assert_eq!(scheduler.get(derived1).unwrap().dirty, DirtyState::Dirty);
        assert_eq!(scheduler.get(derived2).unwrap().dirty, DirtyState::Dirty);
    }

    #[test]
    fn mark_changed_marks_transitive_nodes_maybe_dirty() {
        let mut scheduler = UpdateScheduler::new();
        let source = settled(&mut scheduler);
        let middle = settled(&mut scheduler);
        let leaf = settled(&mut scheduler);

        scheduler.replace_dependencies(middle, smallvec![source]);
        scheduler.replace_dependencies(leaf, smallvec![middle]);

        scheduler.mark_changed(source);

        assert_eq!(scheduler.get(middle).unwrap().dirty, DirtyState::Dirty);
        assert_eq!(scheduler.get(leaf).unwrap().dirty, DirtyState::MaybeDirty);
    }

    #[test]
    fn mark_changed_skips_unresolved_dependents() {
        let mut scheduler = UpdateScheduler::new();
        let source = settled(&mut scheduler);
        let derived = settled(&mut scheduler);
        scheduler.replace_dependencies(derived, smallvec![source]);
        scheduler.get_mut(derived).unwrap().status = NodeStatus::Uninitialized;

        assert!(scheduler.mark_changed(source).is_empty());
    }
}
