//! Inheritance linearization
//!
//! Uses the linearization solc reports when present; otherwise computes
//! Solidity's C3 order, where bases are merged right to left so that in
//! `contract D is A, B` the base `B` is "more derived" than `A`.

use std::collections::{BTreeMap, BTreeSet};

use crate::ast::{ContractDefinition, NodeId};
use crate::error::Defect;

/// Linearization of every contract, most derived first, self included
pub(crate) fn linearize_all(
    contracts: &BTreeMap<NodeId, &ContractDefinition>,
) -> Result<BTreeMap<NodeId, Vec<NodeId>>, Defect> {
    let mut linearizer = Linearizer {
        contracts,
        done: BTreeMap::new(),
        in_progress: BTreeSet::new(),
    };
    for &id in contracts.keys() {
        linearizer.linearize(id)?;
    }
    Ok(linearizer.done)
}

/// Contracts ordered so that every ancestor precedes its descendants.
///
/// An ancestor's linearization is a strict subsequence of each
/// descendant's, so sorting by length is a topological order.
pub(crate) fn ancestor_first_order(linearizations: &BTreeMap<NodeId, Vec<NodeId>>) -> Vec<NodeId> {
    let mut order: Vec<NodeId> = linearizations.keys().copied().collect();
    order.sort_by_key(|id| (linearizations[id].len(), *id));
    order
}

struct Linearizer<'a, 'ast> {
    contracts: &'a BTreeMap<NodeId, &'ast ContractDefinition>,
    done: BTreeMap<NodeId, Vec<NodeId>>,
    in_progress: BTreeSet<NodeId>,
}

impl Linearizer<'_, '_> {
    fn linearize(&mut self, id: NodeId) -> Result<Vec<NodeId>, Defect> {
        if let Some(lin) = self.done.get(&id) {
            return Ok(lin.clone());
        }

        let contract = *self
            .contracts
            .get(&id)
            .ok_or_else(|| Defect::UnknownContract(id.to_string()))?;

        // Re-entering a contract still being linearized means a cycle
        if !self.in_progress.insert(id) {
            return Err(Defect::InconsistentHierarchy(contract.name.clone()));
        }

        let lin = if contract.linearized_base_contracts.is_empty() {
            self.c3(contract)?
        } else {
            self.reported(contract)?
        };

        self.in_progress.remove(&id);
        self.done.insert(id, lin.clone());
        Ok(lin)
    }

    fn c3(&mut self, contract: &ContractDefinition) -> Result<Vec<NodeId>, Defect> {
        let bases: Vec<NodeId> = contract.base_ids().collect();

        let mut sequences = Vec::with_capacity(bases.len() + 1);
        for &base in bases.iter().rev() {
            sequences.push(self.linearize(base)?);
        }
        sequences.push(bases.iter().rev().copied().collect());

        let merged = merge(sequences)
            .ok_or_else(|| Defect::InconsistentHierarchy(contract.name.clone()))?;

        let mut lin = Vec::with_capacity(merged.len() + 1);
        lin.push(contract.id);
        lin.extend(merged);
        Ok(lin)
    }

    fn reported(&mut self, contract: &ContractDefinition) -> Result<Vec<NodeId>, Defect> {
        let lin = &contract.linearized_base_contracts;
        if lin.first() != Some(&contract.id) {
            return Err(Defect::InconsistentHierarchy(contract.name.clone()));
        }
        if let Some(unknown) = lin.iter().find(|id| !self.contracts.contains_key(id)) {
            return Err(Defect::UnknownContract(unknown.to_string()));
        }
        Ok(lin.clone())
    }
}

/// C3 merge; `None` when no consistent order exists
fn merge(mut sequences: Vec<Vec<NodeId>>) -> Option<Vec<NodeId>> {
    let mut result = Vec::new();
    loop {
        sequences.retain(|seq| !seq.is_empty());
        if sequences.is_empty() {
            return Some(result);
        }

        let head = sequences
            .iter()
            .map(|seq| seq[0])
            .find(|candidate| sequences.iter().all(|seq| !seq[1..].contains(candidate)))?;

        result.push(head);
        for seq in &mut sequences {
            if seq[0] == head {
                seq.remove(0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[i64]) -> Vec<NodeId> {
        raw.iter().copied().map(NodeId).collect()
    }

    #[test]
    fn test_merge_diamond() {
        // D is B, C; B is A; C is A  →  D, C, B, A
        let merged = merge(vec![ids(&[3, 1]), ids(&[2, 1]), ids(&[3, 2])]).unwrap();
        assert_eq!(merged, ids(&[3, 2, 1]));
    }

    #[test]
    fn test_merge_inconsistent() {
        assert!(merge(vec![ids(&[1, 2]), ids(&[2, 1])]).is_none());
    }

    #[test]
    fn test_ancestor_first_order() {
        let mut lins = BTreeMap::new();
        lins.insert(NodeId(30), ids(&[30, 20, 10]));
        lins.insert(NodeId(10), ids(&[10]));
        lins.insert(NodeId(20), ids(&[20, 10]));
        lins.insert(NodeId(5), ids(&[5]));
        assert_eq!(ancestor_first_order(&lins), ids(&[5, 10, 20, 30]));
    }
}
