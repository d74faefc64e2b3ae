use crate::contract::Contract;
use crate::store::InterfaceId;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Which declared interfaces each interface obligates its candidates to satisfy.
///
/// An edge `A -> B` means some requirement of `A` names `B` as a return obligation or
/// in an `implements` predicate. Targets that are not declared interfaces are skipped.
pub struct ObligationGraph {
    graph: DiGraph<InterfaceId, ()>,
    index: HashMap<InterfaceId, NodeIndex>,
}

impl ObligationGraph {
    pub fn build<'a>(contracts: impl IntoIterator<Item = &'a Contract>) -> Self {
        let contracts: Vec<&Contract> = contracts.into_iter().collect();
        let mut graph = DiGraph::with_capacity(contracts.len(), contracts.len());
        let mut index = HashMap::with_capacity(contracts.len());

        for contract in &contracts {
            let node = graph.add_node(contract.identity.clone());
            index.insert(contract.identity.clone(), node);
        }
        for contract in &contracts {
            let Some(&from) = index.get(&contract.identity) else { continue };
            for target in contract.obligation_targets() {
                if let Some(&to) = index.get(target) {
                    graph.update_edge(from, to, ());
                }
            }
        }
        Self { graph, index }
    }

    /// Interfaces directly obligated by `identity`, sorted.
    pub fn dependencies(&self, identity: &str) -> Vec<InterfaceId> {
        let Some(&node) = self.index.get(identity) else {
            return Vec::new();
        };
        let mut deps: Vec<InterfaceId> =
            self.graph.neighbors(node).map(|n| self.graph[n].clone()).collect();
        deps.sort();
        deps
    }

    /// Strongly connected groups that can re-enter themselves, including single
    /// interfaces that obligate themselves. Each group and the list are sorted.
    pub fn cycles(&self) -> Vec<Vec<InterfaceId>> {
        let mut cycles: Vec<Vec<InterfaceId>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| match scc.as_slice() {
                [single] => self.graph.contains_edge(*single, *single),
                members => members.len() > 1,
            })
            .map(|scc| {
                let mut ids: Vec<InterfaceId> =
                    scc.into_iter().map(|n| self.graph[n].clone()).collect();
                ids.sort();
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }
}
