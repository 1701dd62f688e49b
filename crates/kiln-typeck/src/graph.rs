//! Dependency graphs between toplevel definitions.
//!
//! Nodes are indices into a definition list and edges point from a
//! definition to the definitions it mentions. Used to order classes by
//! their superclasses and to split value definitions into binding groups.

use std::collections::VecDeque;
use std::fmt;

/// A dependency cycle, as node names ending with the repeated name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError {
    pub cycle_path: Vec<usize>,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: Vec<String> = self.cycle_path.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", path.join(" -> "))
    }
}

#[derive(Debug, Clone, Default)]
pub struct DepGraph {
    /// `deps[i]` are the nodes `i` depends on, without duplicates.
    deps: Vec<Vec<usize>>,
}

impl DepGraph {
    pub fn new(nodes: usize) -> Self {
        DepGraph {
            deps: vec![Vec::new(); nodes],
        }
    }

    pub fn len(&self) -> usize {
        self.deps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    /// Record that `from` depends on `to`.
    pub fn add_dependency(&mut self, from: usize, to: usize) {
        if !self.deps[from].contains(&to) {
            self.deps[from].push(to);
        }
    }

    pub fn dependencies(&self, node: usize) -> &[usize] {
        &self.deps[node]
    }

    /// Nodes in dependency order using Kahn's algorithm: dependencies
    /// first, ties broken by index.
    ///
    /// Returns `Err(CycleError)` if the graph contains a cycle.
    pub fn topological_sort(&self) -> Result<Vec<usize>, CycleError> {
        let n = self.deps.len();
        // in_degree[i] = number of node i's dependencies not yet emitted.
        let mut in_degree: Vec<usize> = self.deps.iter().map(Vec::len).collect();
        let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(node) = queue.pop_front() {
            order.push(node);
            for (i, deps) in self.deps.iter().enumerate() {
                if in_degree[i] > 0 && deps.contains(&node) {
                    in_degree[i] -= 1;
                    if in_degree[i] == 0 {
                        queue.push_back(i);
                    }
                }
            }
        }

        if order.len() == n {
            Ok(order)
        } else {
            Err(CycleError {
                cycle_path: self.extract_cycle_path(&in_degree),
            })
        }
    }

    /// Follow dependency edges among unemitted nodes until one repeats.
    fn extract_cycle_path(&self, in_degree: &[usize]) -> Vec<usize> {
        let Some(start) = (0..self.deps.len()).find(|&i| in_degree[i] > 0) else {
            return Vec::new();
        };
        let mut path = Vec::new();
        let mut visited = vec![false; self.deps.len()];
        let mut current = start;
        loop {
            if visited[current] {
                let begin = path.iter().position(|&n| n == current).unwrap_or(0);
                let mut cycle = path[begin..].to_vec();
                cycle.push(current);
                return cycle;
            }
            visited[current] = true;
            path.push(current);
            match self.deps[current].iter().find(|&&d| in_degree[d] > 0) {
                Some(&next) => current = next,
                None => return path,
            }
        }
    }

    /// Strongly connected components (Tarjan), dependencies before the
    /// components that use them. Members of a component are in index
    /// order.
    pub fn strongly_connected_components(&self) -> Vec<Vec<usize>> {
        let mut state = Tarjan {
            graph: self,
            index: 0,
            indices: vec![None; self.deps.len()],
            lowlink: vec![0; self.deps.len()],
            on_stack: vec![false; self.deps.len()],
            stack: Vec::new(),
            components: Vec::new(),
        };
        for node in 0..self.deps.len() {
            if state.indices[node].is_none() {
                state.visit(node);
            }
        }
        state.components
    }
}

struct Tarjan<'a> {
    graph: &'a DepGraph,
    index: usize,
    indices: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    components: Vec<Vec<usize>>,
}

impl Tarjan<'_> {
    fn visit(&mut self, node: usize) {
        self.indices[node] = Some(self.index);
        self.lowlink[node] = self.index;
        self.index += 1;
        self.stack.push(node);
        self.on_stack[node] = true;

        for &dep in self.graph.dependencies(node) {
            match self.indices[dep] {
                None => {
                    self.visit(dep);
                    self.lowlink[node] = self.lowlink[node].min(self.lowlink[dep]);
                }
                Some(dep_index) if self.on_stack[dep] => {
                    self.lowlink[node] = self.lowlink[node].min(dep_index);
                }
                Some(_) => {}
            }
        }

        if Some(self.lowlink[node]) == self.indices[node] {
            let mut component = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack[member] = false;
                component.push(member);
                if member == node {
                    break;
                }
            }
            component.sort_unstable();
            self.components.push(component);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topological_order_puts_dependencies_first() {
        let mut graph = DepGraph::new(3);
        graph.add_dependency(0, 2);
        graph.add_dependency(1, 0);
        assert_eq!(graph.topological_sort(), Ok(vec![2, 0, 1]));
    }

    #[test]
    fn cycles_are_reported_with_their_path() {
        let mut graph = DepGraph::new(3);
        graph.add_dependency(0, 1);
        graph.add_dependency(1, 2);
        graph.add_dependency(2, 1);
        let err = graph.topological_sort().unwrap_err();
        assert_eq!(err.cycle_path, vec![1, 2, 1]);
    }

    #[test]
    fn components_group_mutual_recursion() {
        // 0 uses 1 and 2; 1 and 2 call each other; 3 stands alone.
        let mut graph = DepGraph::new(4);
        graph.add_dependency(0, 1);
        graph.add_dependency(0, 2);
        graph.add_dependency(1, 2);
        graph.add_dependency(2, 1);
        assert_eq!(
            graph.strongly_connected_components(),
            vec![vec![1, 2], vec![0], vec![3]]
        );
    }

    #[test]
    fn self_loops_form_singleton_components() {
        let mut graph = DepGraph::new(2);
        graph.add_dependency(0, 0);
        graph.add_dependency(1, 0);
        assert_eq!(graph.strongly_connected_components(), vec![vec![0], vec![1]]);
    }
}
