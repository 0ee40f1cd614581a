//! Resolution context construction
//!
//! The builder is the only mutable phase. Every `register_*` call checks all
//! of its invariants before touching any table, so a rejected registration
//! leaves the builder exactly as it was.

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::ast::{
    ContractDefinition, EventDefinition, FunctionDefinition, NodeId, Program, Span,
    VariableDeclaration,
};
use crate::error::Defect;

use super::linearize::{ancestor_first_order, linearize_all};
use super::source::SourceMap;
use super::{DeclaredMembers, ResolutionContext, VisibleMembers};

/// Mutable construction phase of a [`ResolutionContext`]
#[derive(Debug, Default)]
pub struct ContextBuilder<'ast> {
    contracts: BTreeMap<NodeId, &'ast ContractDefinition>,
    linearizations: BTreeMap<NodeId, Vec<NodeId>>,
    subtypes: BTreeMap<NodeId, BTreeSet<NodeId>>,
    declared: BTreeMap<NodeId, DeclaredMembers<'ast>>,
    function_owner: BTreeMap<NodeId, NodeId>,
    state_var_owner: BTreeMap<NodeId, NodeId>,
    event_owner: BTreeMap<NodeId, NodeId>,
    sources: SourceMap,
}

impl<'ast> ContextBuilder<'ast> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk the whole program once: contracts, then the subtype relation,
    /// then members, then the override and visibility maps.
    pub fn build(program: &'ast Program) -> Result<ResolutionContext<'ast>, Defect> {
        let mut builder = Self::new();

        for contract in program.contracts() {
            builder.register_contract(contract)?;
            builder.attribute_span(program, contract.id, &contract.src)?;
        }

        builder.link_hierarchy()?;

        for contract in program.contracts() {
            builder.register_members(program, contract)?;
        }

        let context = builder.freeze()?;
        tracing::debug!(
            contracts = context.contracts.len(),
            signatures = context.function_resolution.len(),
            state_variables = context.state_var_resolution.len(),
            "resolution context built"
        );
        Ok(context)
    }

    pub fn register_contract(&mut self, contract: &'ast ContractDefinition) -> Result<(), Defect> {
        if self.contracts.contains_key(&contract.id) {
            return Err(Defect::DuplicateContract {
                name: contract.name.clone(),
                id: contract.id,
            });
        }
        self.contracts.insert(contract.id, contract);
        Ok(())
    }

    /// Record `contract` as a subtype of `ancestor`. Repeating a pair is a no-op.
    pub fn register_subtype(&mut self, ancestor: NodeId, contract: NodeId) -> Result<(), Defect> {
        self.contract_name(ancestor)?;
        self.contract_name(contract)?;
        self.subtypes.entry(ancestor).or_default().insert(contract);
        Ok(())
    }

    /// Compute every linearization and derive the subtype relation from it
    pub fn link_hierarchy(&mut self) -> Result<(), Defect> {
        let linearizations = linearize_all(&self.contracts)?;
        for (&contract, lin) in &linearizations {
            for &ancestor in lin {
                self.register_subtype(ancestor, contract)?;
            }
        }
        self.linearizations = linearizations;
        Ok(())
    }

    pub fn register_state_variable(
        &mut self,
        contract: NodeId,
        var: &'ast VariableDeclaration,
    ) -> Result<(), Defect> {
        let contract_name = self.contract_name(contract)?;
        if !var.state_variable {
            return Err(Defect::CategoryMismatch {
                name: var.name.clone(),
                expected: "a state variable",
            });
        }
        self.check_unowned(&self.state_var_owner, &var.name, var.id)?;

        if self.declared_member(contract, |m| m.state_variables.contains_key(&var.name)) {
            return Err(Defect::DuplicateStateVariable {
                contract: contract_name,
                name: var.name.clone(),
            });
        }
        self.declared.entry(contract).or_default().state_variables.insert(var.name.clone(), var);
        self.state_var_owner.insert(var.id, contract);
        Ok(())
    }

    pub fn register_mapping(
        &mut self,
        contract: NodeId,
        var: &'ast VariableDeclaration,
    ) -> Result<(), Defect> {
        let contract_name = self.contract_name(contract)?;
        if !var.is_mapping() {
            return Err(Defect::CategoryMismatch {
                name: var.name.clone(),
                expected: "a mapping",
            });
        }

        if self.declared_member(contract, |m| m.mappings.contains_key(&var.name)) {
            return Err(Defect::DuplicateMapping {
                contract: contract_name,
                name: var.name.clone(),
            });
        }
        self.declared.entry(contract).or_default().mappings.insert(var.name.clone(), var);
        Ok(())
    }

    pub fn register_array(
        &mut self,
        contract: NodeId,
        var: &'ast VariableDeclaration,
    ) -> Result<(), Defect> {
        let contract_name = self.contract_name(contract)?;
        if !var.is_array() {
            return Err(Defect::CategoryMismatch {
                name: var.name.clone(),
                expected: "an array",
            });
        }

        if self.declared_member(contract, |m| m.arrays.contains_key(&var.name)) {
            return Err(Defect::DuplicateArray {
                contract: contract_name,
                name: var.name.clone(),
            });
        }
        self.declared.entry(contract).or_default().arrays.insert(var.name.clone(), var);
        Ok(())
    }

    pub fn register_event(
        &mut self,
        contract: NodeId,
        event: &'ast EventDefinition,
    ) -> Result<(), Defect> {
        let contract_name = self.contract_name(contract)?;
        self.check_unowned(&self.event_owner, &event.name, event.id)?;

        if self.declared_member(contract, |m| m.events.contains_key(&event.name)) {
            return Err(Defect::DuplicateEvent {
                contract: contract_name,
                name: event.name.clone(),
            });
        }
        self.declared.entry(contract).or_default().events.insert(event.name.clone(), event);
        self.event_owner.insert(event.id, contract);
        Ok(())
    }

    pub fn register_function(
        &mut self,
        contract: NodeId,
        func: &'ast FunctionDefinition,
    ) -> Result<(), Defect> {
        let contract_name = self.contract_name(contract)?;
        if func.is_constructor() {
            return Err(Defect::CategoryMismatch {
                name: format!("constructor of {contract_name}"),
                expected: "a plain function",
            });
        }
        let signature = func.signature();
        self.check_unowned(&self.function_owner, &signature, func.id)?;

        if self.declared_member(contract, |m| m.functions.contains_key(&signature)) {
            return Err(Defect::DuplicateFunctionSignature {
                contract: contract_name,
                signature,
            });
        }
        self.declared.entry(contract).or_default().functions.insert(signature, func);
        self.function_owner.insert(func.id, contract);
        Ok(())
    }

    pub fn register_constructor(
        &mut self,
        contract: NodeId,
        func: &'ast FunctionDefinition,
    ) -> Result<(), Defect> {
        let contract_name = self.contract_name(contract)?;
        if !func.is_constructor() {
            return Err(Defect::CategoryMismatch {
                name: func.name.clone(),
                expected: "a constructor",
            });
        }
        self.check_unowned(&self.function_owner, "constructor", func.id)?;

        if self.declared_member(contract, |m| m.constructor.is_some()) {
            return Err(Defect::MultipleConstructors {
                contract: contract_name,
            });
        }
        self.declared.entry(contract).or_default().constructor = Some(func);
        self.function_owner.insert(func.id, contract);
        Ok(())
    }

    pub fn attribute_source(&mut self, node: NodeId, path: &Path, line: usize) -> Result<(), Defect> {
        self.sources.attribute(node, path, line)
    }

    /// Finish construction: compute visible members and the override
    /// resolution maps, then hand out the read-only context.
    pub fn freeze(mut self) -> Result<ResolutionContext<'ast>, Defect> {
        if self.linearizations.len() != self.contracts.len() {
            self.link_hierarchy()?;
        }
        for &id in self.contracts.keys() {
            self.subtypes.entry(id).or_default().insert(id);
        }

        let order = ancestor_first_order(&self.linearizations);

        let mut visible: BTreeMap<NodeId, VisibleMembers<'ast>> = BTreeMap::new();
        let mut function_resolution: BTreeMap<String, BTreeMap<NodeId, &'ast FunctionDefinition>> =
            BTreeMap::new();
        let mut state_var_resolution: BTreeMap<String, BTreeMap<NodeId, &'ast VariableDeclaration>> =
            BTreeMap::new();

        for &dynamic_type in &order {
            let view = visible.entry(dynamic_type).or_default();

            // Most-base first: a later (more derived) declaration overwrites
            for base in self.linearizations[&dynamic_type].iter().rev() {
                let Some(members) = self.declared.get(base) else {
                    continue;
                };
                for (signature, &func) in &members.functions {
                    function_resolution
                        .entry(signature.clone())
                        .or_default()
                        .insert(dynamic_type, func);
                    view.functions.insert(signature.clone(), func);
                }
                for (name, &var) in &members.state_variables {
                    state_var_resolution
                        .entry(name.clone())
                        .or_default()
                        .insert(dynamic_type, var);
                    view.state_variables.insert(name.clone(), var);
                }
            }
        }

        Ok(ResolutionContext {
            contracts: self.contracts,
            order,
            linearizations: self.linearizations,
            subtypes: self.subtypes,
            declared: self.declared,
            visible,
            function_owner: self.function_owner,
            state_var_owner: self.state_var_owner,
            event_owner: self.event_owner,
            function_resolution,
            state_var_resolution,
            sources: self.sources,
            fresh_counter: Cell::new(0),
        })
    }

    fn register_members(
        &mut self,
        program: &'ast Program,
        contract: &'ast ContractDefinition,
    ) -> Result<(), Defect> {
        for var in contract.state_variables() {
            self.register_state_variable(contract.id, var)?;
            if var.is_mapping() {
                self.register_mapping(contract.id, var)?;
            } else if var.is_array() {
                self.register_array(contract.id, var)?;
            }
            self.attribute_span(program, var.id, &var.src)?;
        }

        for event in contract.events() {
            self.register_event(contract.id, event)?;
            self.attribute_span(program, event.id, &event.src)?;
        }

        for func in contract.functions() {
            if func.is_constructor() {
                self.register_constructor(contract.id, func)?;
            } else {
                self.register_function(contract.id, func)?;
            }
            self.attribute_span(program, func.id, &func.src)?;
        }

        Ok(())
    }

    fn attribute_span(&mut self, program: &Program, node: NodeId, span: &Span) -> Result<(), Defect> {
        match program.locate(span) {
            Some((path, line)) => self.sources.attribute(node, &path, line),
            None => Ok(()),
        }
    }

    fn contract_name(&self, id: NodeId) -> Result<String, Defect> {
        self.contracts
            .get(&id)
            .map(|c| c.name.clone())
            .ok_or_else(|| Defect::UnknownContract(id.to_string()))
    }

    fn declared_member(&self, contract: NodeId, test: impl Fn(&DeclaredMembers<'ast>) -> bool) -> bool {
        self.declared.get(&contract).is_some_and(test)
    }

    fn check_unowned(
        &self,
        owners: &BTreeMap<NodeId, NodeId>,
        member: &str,
        id: NodeId,
    ) -> Result<(), Defect> {
        match owners.get(&id) {
            Some(owner) => Err(Defect::OwnershipConflict {
                member: member.to_string(),
                id,
                owner: self.contract_name(*owner)?,
            }),
            None => Ok(()),
        }
    }
}
