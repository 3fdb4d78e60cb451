//! The task registry: a name-keyed, insertion-ordered map of every task in
//! the graph, validated once at construction.
//!
//! Composites reference other tasks by name only. `finish` resolves those
//! references and rejects graphs that are not well-defined: duplicate names,
//! dangling references, reference cycles, and parallel branches whose leaf
//! actions claim overlapping output locations.

use std::collections::HashMap;
use std::sync::Arc;

use petgraph::Graph;
use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;

use crate::error::RegistryError;
use crate::task::{Action, TaskKind};

pub struct Registry {
    entries: Vec<(&'static str, TaskKind)>,
    index: HashMap<&'static str, usize>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&TaskKind> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    /// Registered names, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    /// Leaf actions reachable from `name`, in first-visit order.
    pub fn leaves(&self, name: &str) -> Vec<&'static str> {
        let mut acc = Vec::new();
        self.collect_leaves(name, &mut acc);
        acc
    }

    fn collect_leaves(&self, name: &str, acc: &mut Vec<&'static str>) {
        let Some(&i) = self.index.get(name) else {
            return;
        };
        let (own, kind) = &self.entries[i];

        match kind {
            TaskKind::Action(_) => {
                if !acc.contains(own) {
                    acc.push(*own);
                }
            }
            TaskKind::Series(members) | TaskKind::Parallel(members) => {
                for member in members {
                    self.collect_leaves(member, acc);
                }
            }
            TaskKind::Alias(target) => self.collect_leaves(target, acc),
        }
    }

    fn action(&self, name: &str) -> Option<&Arc<dyn Action>> {
        match self.get(name) {
            Some(TaskKind::Action(action)) => Some(action),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.entries.iter().cloned()).finish()
    }
}

/// Renders the graph as a mermaid flowchart, handy for documentation.
impl std::fmt::Display for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "graph LR")?;

        for (i, (name, _)) in self.entries.iter().enumerate() {
            writeln!(f, "    {i}[\"{name}\"]")?;
        }

        for (i, (_, kind)) in self.entries.iter().enumerate() {
            let (members, label): (&[&str], _) = match kind {
                TaskKind::Action(_) => (&[], ""),
                TaskKind::Series(members) => (members, "seq"),
                TaskKind::Parallel(members) => (members, "par"),
                TaskKind::Alias(target) => (std::slice::from_ref(target), "alias"),
            };

            for member in members {
                let j = self.index[*member];
                writeln!(f, "    {i} -- \"{label}\" --> {j}")?;
            }
        }

        Ok(())
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<(&'static str, TaskKind)>,
}

impl RegistryBuilder {
    pub fn action(&mut self, name: &'static str, action: impl Action + 'static) -> &mut Self {
        self.entries.push((name, TaskKind::Action(Arc::new(action))));
        self
    }

    pub fn series<I>(&mut self, name: &'static str, members: I) -> &mut Self
    where
        I: IntoIterator<Item = &'static str>,
    {
        self.entries
            .push((name, TaskKind::Series(members.into_iter().collect())));
        self
    }

    pub fn parallel<I>(&mut self, name: &'static str, members: I) -> &mut Self
    where
        I: IntoIterator<Item = &'static str>,
    {
        self.entries
            .push((name, TaskKind::Parallel(members.into_iter().collect())));
        self
    }

    pub fn alias(&mut self, name: &'static str, target: &'static str) -> &mut Self {
        self.entries.push((name, TaskKind::Alias(target)));
        self
    }

    pub fn finish(self) -> Result<Registry, RegistryError> {
        let mut index = HashMap::new();
        for (i, (name, _)) in self.entries.iter().enumerate() {
            if index.insert(*name, i).is_some() {
                return Err(RegistryError::Duplicate(name.to_string()));
            }
        }

        let registry = Registry {
            entries: self.entries,
            index,
        };

        registry.check_references()?;
        registry.check_acyclic()?;
        registry.check_disjoint_outputs()?;

        Ok(registry)
    }
}

impl Registry {
    fn members_of(kind: &TaskKind) -> &[&'static str] {
        match kind {
            TaskKind::Action(_) => &[],
            TaskKind::Series(members) | TaskKind::Parallel(members) => members,
            TaskKind::Alias(target) => std::slice::from_ref(target),
        }
    }

    fn check_references(&self) -> Result<(), RegistryError> {
        for (name, kind) in &self.entries {
            for member in Self::members_of(kind) {
                if !self.index.contains_key(member) {
                    return Err(RegistryError::Unknown {
                        member: member.to_string(),
                        referenced_by: name.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_acyclic(&self) -> Result<(), RegistryError> {
        let mut graph = Graph::<&'static str, ()>::new();
        let mut nodes = HashMap::<&'static str, NodeIndex>::new();

        for (name, _) in &self.entries {
            nodes.insert(name, graph.add_node(name));
        }

        for (name, kind) in &self.entries {
            for member in Self::members_of(kind) {
                graph.add_edge(nodes[name], nodes[member], ());
            }
        }

        match toposort(&graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => Err(RegistryError::Cycle(graph[cycle.node_id()].to_string())),
        }
    }

    /// Every pair of leaves that may run at the same time under some parallel
    /// composite must claim disjoint outputs. Safety of the shared output
    /// tree rests on this, not on runtime locking.
    fn check_disjoint_outputs(&self) -> Result<(), RegistryError> {
        for (_, kind) in &self.entries {
            let TaskKind::Parallel(members) = kind else {
                continue;
            };

            for (i, a) in members.iter().enumerate() {
                for b in &members[i + 1..] {
                    self.check_branches_disjoint(a, b)?;
                }
            }
        }
        Ok(())
    }

    fn check_branches_disjoint(&self, a: &str, b: &str) -> Result<(), RegistryError> {
        for leaf_a in self.leaves(a) {
            for leaf_b in self.leaves(b) {
                let (Some(action_a), Some(action_b)) = (self.action(leaf_a), self.action(leaf_b))
                else {
                    continue;
                };

                for claim_a in action_a.claims() {
                    for claim_b in action_b.claims() {
                        if claim_a.overlaps(&claim_b) {
                            return Err(RegistryError::Overlap(
                                leaf_a.to_string(),
                                leaf_b.to_string(),
                                claim_a.overlap_root(&claim_b),
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
