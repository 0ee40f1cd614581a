//! Resolution context
//!
//! Cross-contract symbol table for one program. Built once by
//! [`ContextBuilder`], then frozen into a read-only [`ResolutionContext`]
//! that answers "which declaration does this signature (or state variable
//! name) denote when the receiver's dynamic type is `C`?".

mod builder;
mod linearize;
mod source;

pub use builder::ContextBuilder;
pub use source::SourceLocation;

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};

use crate::ast::{
    ContractDefinition, EventDefinition, FunctionDefinition, NodeId, VariableDeclaration,
};
use crate::boogie::{BoogieType, TypedIdent};
use crate::error::Defect;

/// Members declared directly in one contract
#[derive(Debug, Clone, Default)]
pub struct DeclaredMembers<'ast> {
    pub constructor: Option<&'ast FunctionDefinition>,
    /// Keyed by signature
    pub functions: BTreeMap<String, &'ast FunctionDefinition>,
    pub state_variables: BTreeMap<String, &'ast VariableDeclaration>,
    pub mappings: BTreeMap<String, &'ast VariableDeclaration>,
    pub arrays: BTreeMap<String, &'ast VariableDeclaration>,
    pub events: BTreeMap<String, &'ast EventDefinition>,
}

/// Members a contract can see: its own plus every inherited member it does
/// not shadow
#[derive(Debug, Clone, Default)]
pub struct VisibleMembers<'ast> {
    pub functions: BTreeMap<String, &'ast FunctionDefinition>,
    pub state_variables: BTreeMap<String, &'ast VariableDeclaration>,
}

/// Frozen symbol table. Only the fresh identifier counter changes after
/// construction.
#[derive(Debug)]
pub struct ResolutionContext<'ast> {
    contracts: BTreeMap<NodeId, &'ast ContractDefinition>,
    /// Ancestor-first
    order: Vec<NodeId>,
    linearizations: BTreeMap<NodeId, Vec<NodeId>>,
    subtypes: BTreeMap<NodeId, BTreeSet<NodeId>>,
    declared: BTreeMap<NodeId, DeclaredMembers<'ast>>,
    visible: BTreeMap<NodeId, VisibleMembers<'ast>>,
    function_owner: BTreeMap<NodeId, NodeId>,
    state_var_owner: BTreeMap<NodeId, NodeId>,
    event_owner: BTreeMap<NodeId, NodeId>,
    /// signature → dynamic type → resolved function
    function_resolution: BTreeMap<String, BTreeMap<NodeId, &'ast FunctionDefinition>>,
    /// name → dynamic type → resolved state variable
    state_var_resolution: BTreeMap<String, BTreeMap<NodeId, &'ast VariableDeclaration>>,
    sources: source::SourceMap,
    fresh_counter: Cell<u64>,
}

impl<'ast> ResolutionContext<'ast> {
    /// Function that a call to `signature` reaches on a receiver of
    /// dynamic type `dynamic_type`
    pub fn resolve_function(
        &self,
        signature: &str,
        dynamic_type: NodeId,
    ) -> Result<&'ast FunctionDefinition, Defect> {
        self.contract(dynamic_type)?;
        self.function_resolution
            .get(signature)
            .ok_or_else(|| Defect::unknown("function signature", signature))?
            .get(&dynamic_type)
            .copied()
            .ok_or_else(|| {
                Defect::unknown("function resolution", format!("{signature} in {dynamic_type}"))
            })
    }

    pub fn resolve_state_variable(
        &self,
        name: &str,
        dynamic_type: NodeId,
    ) -> Result<&'ast VariableDeclaration, Defect> {
        self.contract(dynamic_type)?;
        self.state_var_resolution
            .get(name)
            .ok_or_else(|| Defect::unknown("state variable", name))?
            .get(&dynamic_type)
            .copied()
            .ok_or_else(|| {
                Defect::unknown("state variable resolution", format!("{name} in {dynamic_type}"))
            })
    }

    pub fn has_function_signature(&self, signature: &str) -> bool {
        self.function_resolution.contains_key(signature)
    }

    pub fn has_state_variable_name(&self, name: &str) -> bool {
        self.state_var_resolution.contains_key(name)
    }

    /// Every function signature declared anywhere in the program, sorted
    pub fn function_signatures(&self) -> impl Iterator<Item = &str> + '_ {
        self.function_resolution.keys().map(String::as_str)
    }

    /// Every dynamic type that can answer `signature`, with the function it
    /// dispatches to
    pub fn all_function_definitions(
        &self,
        signature: &str,
    ) -> Result<&BTreeMap<NodeId, &'ast FunctionDefinition>, Defect> {
        self.function_resolution
            .get(signature)
            .ok_or_else(|| Defect::unknown("function signature", signature))
    }

    /// Reflexive-transitive descendants of `contract`
    pub fn subtypes(&self, contract: NodeId) -> Result<&BTreeSet<NodeId>, Defect> {
        self.subtypes
            .get(&contract)
            .ok_or_else(|| Defect::UnknownContract(contract.to_string()))
    }

    pub fn declared_members(&self, contract: NodeId) -> Result<DeclaredMembers<'ast>, Defect> {
        self.contract(contract)?;
        Ok(self.declared.get(&contract).cloned().unwrap_or_default())
    }

    pub fn visible_members(&self, contract: NodeId) -> Result<&VisibleMembers<'ast>, Defect> {
        self.visible
            .get(&contract)
            .ok_or_else(|| Defect::UnknownContract(contract.to_string()))
    }

    pub fn contract(&self, id: NodeId) -> Result<&'ast ContractDefinition, Defect> {
        self.contracts
            .get(&id)
            .copied()
            .ok_or_else(|| Defect::UnknownContract(id.to_string()))
    }

    pub fn contract_by_name(&self, name: &str) -> Result<&'ast ContractDefinition, Defect> {
        self.find_contract_by_name(name)
            .ok_or_else(|| Defect::UnknownContract(name.to_string()))
    }

    /// Non-defect lookup by name; the first contract in ancestor-first order wins
    pub fn find_contract_by_name(&self, name: &str) -> Option<&'ast ContractDefinition> {
        self.contracts().find(|c| c.name == name)
    }

    /// All contracts, every ancestor before its descendants
    pub fn contracts(&self) -> impl Iterator<Item = &'ast ContractDefinition> + '_ {
        self.order.iter().map(|id| self.contracts[id])
    }

    /// Most derived first, `contract` itself included
    pub fn linearization(&self, contract: NodeId) -> Result<&[NodeId], Defect> {
        self.linearizations
            .get(&contract)
            .map(Vec::as_slice)
            .ok_or_else(|| Defect::UnknownContract(contract.to_string()))
    }

    pub fn owner_of_function(&self, func: NodeId) -> Result<&'ast ContractDefinition, Defect> {
        let owner = self
            .function_owner
            .get(&func)
            .ok_or_else(|| Defect::unknown("function", func.to_string()))?;
        self.contract(*owner)
    }

    pub fn owner_of_state_variable(&self, var: NodeId) -> Result<&'ast ContractDefinition, Defect> {
        let owner = self
            .state_var_owner
            .get(&var)
            .ok_or_else(|| Defect::unknown("state variable", var.to_string()))?;
        self.contract(*owner)
    }

    pub fn owner_of_event(&self, event: NodeId) -> Result<&'ast ContractDefinition, Defect> {
        let owner = self
            .event_owner
            .get(&event)
            .ok_or_else(|| Defect::unknown("event", event.to_string()))?;
        self.contract(*owner)
    }

    pub fn constructor_of(&self, contract: NodeId) -> Result<Option<&'ast FunctionDefinition>, Defect> {
        self.contract(contract)?;
        Ok(self.declared.get(&contract).and_then(|m| m.constructor))
    }

    /// Synthetic identifier unique within this context: `__var_1`, `__var_2`, ...
    pub fn fresh_identifier(&self, ty: BoogieType) -> TypedIdent {
        let n = self.fresh_counter.get() + 1;
        self.fresh_counter.set(n);
        TypedIdent::new(format!("__var_{n}"), ty)
    }

    pub fn source_of(&self, node: NodeId) -> Result<&SourceLocation, Defect> {
        self.sources.get(node)
    }

    pub fn attributed_nodes(&self) -> usize {
        self.sources.len()
    }
}
