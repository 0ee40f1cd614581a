//! Declaration-level Solidity → Boogie translation
//!
//! Emits the type, constant and global declarations of a program, one
//! body-less procedure per function and constructor, a dispatch procedure
//! per externally callable signature, and the entry harnesses the verifier
//! and model checker are pointed at. Function bodies are not translated.

mod dispatch;
mod harness;
mod types;

pub use dispatch::dispatch_name;
pub use harness::{boogie_entry_name, corral_choice_name, corral_entry_name};
pub use types::{type_name_to_boogie, type_string_to_boogie, variable_type};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::ast::{ContractDefinition, FunctionDefinition, FunctionKind, Program};
use crate::boogie::{BoogieProgram, BoogieType, Declaration, Procedure, TypedIdent};
use crate::context::{ContextBuilder, ResolutionContext};
use crate::error::TranslateError;

/// Name of the receiver parameter every contract procedure takes
pub const THIS: &str = "this";
/// Name of the `msg.sender` parameter every contract procedure takes
pub const MSG_SENDER: &str = "msgsender_MSG";

/// Boogie keywords and prelude names a Solidity identifier may collide with
const RESERVED: &[&str] = &[
    "Alloc", "ContractName", "DType", "Ref", "assert", "assume", "async", "axiom", "bool",
    "break", "call", "complete", "const", "else", "ensures", "exists", "extends", "false",
    "finite", "forall", "free", "function", "goto", "havoc", "if", "implementation", "int",
    "invariant", "lambda", "modifies", "old", "par", "procedure", "real", "requires", "return",
    "returns", "then", "true", "type", "unique", "var", "where", "while", "yield",
];

/// Solidity identifier as a Boogie identifier. Reserved words get a `#`
/// suffix, which no Solidity identifier contains.
pub fn boogie_ident(name: &str) -> String {
    if RESERVED.contains(&name) {
        format!("{name}#")
    } else {
        name.to_string()
    }
}

/// AST → IR translation
pub trait Translator {
    fn translate(
        &self,
        program: &Program,
        options: &TranslateOptions,
    ) -> Result<BoogieProgram, TranslateError>;
}

#[derive(Debug, Clone, Default)]
pub struct TranslateOptions {
    /// Contract to build harnesses for; every concrete contract when `None`
    pub target: Option<String>,
    pub ignore: IgnoreList,
    pub honor_ignore: bool,
}

impl TranslateOptions {
    pub fn for_contract(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ignore: IgnoreList::default(),
            honor_ignore: true,
        }
    }
}

/// One `Contract.method` entry of an ignore list. `*` matches any method.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IgnoredMethod {
    pub contract: String,
    pub method: String,
}

impl FromStr for IgnoredMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((contract, method)) if !contract.is_empty() && !method.is_empty() => Ok(Self {
                contract: contract.to_string(),
                method: method.to_string(),
            }),
            _ => Err(format!("expected Contract.method, got '{s}'")),
        }
    }
}

impl fmt::Display for IgnoredMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.contract, self.method)
    }
}

/// `(contract, method)` pairs left out of the harnesses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreList {
    entries: BTreeSet<IgnoredMethod>,
}

impl IgnoreList {
    pub fn insert(&mut self, entry: IgnoredMethod) {
        self.entries.insert(entry);
    }

    pub fn contains(&self, contract: &str, method: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.contract == contract && (e.method == "*" || e.method == method))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl FromIterator<IgnoredMethod> for IgnoreList {
    fn from_iter<I: IntoIterator<Item = IgnoredMethod>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// The shipped translator: declarations plus harnesses
#[derive(Debug, Clone, Copy, Default)]
pub struct BoogieTranslator;

impl Translator for BoogieTranslator {
    fn translate(
        &self,
        program: &Program,
        options: &TranslateOptions,
    ) -> Result<BoogieProgram, TranslateError> {
        let ctx = ContextBuilder::build(program)?;

        let targets: Vec<&ContractDefinition> = match &options.target {
            Some(name) => {
                let target = ctx
                    .find_contract_by_name(name)
                    .ok_or_else(|| TranslateError::UnknownTargetContract(name.clone()))?;
                vec![target]
            }
            None => ctx.contracts().filter(|c| !c.is_abstract).collect(),
        };

        let mut out = BoogieProgram::new();
        emit_prelude(&ctx, &mut out);
        for contract in ctx.contracts() {
            emit_contract(&ctx, contract, &mut out)?;
        }
        dispatch::emit(&ctx, &mut out)?;
        for target in targets {
            if target.is_interface() || target.is_library() {
                tracing::warn!(contract = %target.name, "no harness for interfaces and libraries");
                continue;
            }
            harness::emit(&ctx, target, options, &mut out)?;
        }

        tracing::debug!(declarations = out.declarations.len(), "translation finished");
        Ok(out)
    }
}

fn emit_prelude(ctx: &ResolutionContext<'_>, out: &mut BoogieProgram) {
    let names: Vec<&str> = ctx.contracts().map(|c| c.name.as_str()).collect();
    out.push(Declaration::Comment(format!("contracts: {}", names.join(", "))));
    out.push(Declaration::Type("Ref".to_string()));
    out.push(Declaration::Type("ContractName".to_string()));
    for contract in ctx.contracts() {
        out.push(Declaration::Const {
            ident: TypedIdent::new(boogie_ident(&contract.name), BoogieType::ContractName),
            unique: true,
        });
    }
    out.push(Declaration::GlobalVar(TypedIdent::new(
        "DType",
        BoogieType::map(BoogieType::Ref, BoogieType::ContractName),
    )));
    out.push(Declaration::GlobalVar(TypedIdent::new(
        "Alloc",
        BoogieType::map(BoogieType::Ref, BoogieType::Bool),
    )));
}

fn emit_contract(
    ctx: &ResolutionContext<'_>,
    contract: &ContractDefinition,
    out: &mut BoogieProgram,
) -> Result<(), TranslateError> {
    out.push(Declaration::Comment(format!("contract {}", contract.name)));

    // Source order, not the declared-members map order
    for var in contract.state_variables().filter(|v| !v.constant) {
        let ty = variable_type(var)?;
        out.push(Declaration::GlobalVar(TypedIdent::new(
            state_variable_name(&var.name, &contract.name),
            BoogieType::map(BoogieType::Ref, ty),
        )));
    }

    let overloaded = overloaded_names(contract);
    if let Some(ctor) = ctx.constructor_of(contract.id)? {
        out.push(Declaration::Procedure(signature_procedure(
            constructor_name(&contract.name),
            ctor,
        )?));
    }
    for func in ctx.declared_members(contract.id)?.functions.values() {
        let name = procedure_name(func, &contract.name, &overloaded);
        out.push(Declaration::Procedure(signature_procedure(name, func)?));
    }
    Ok(())
}

/// Body-less procedure with the receiver, sender and declared parameters
fn signature_procedure(name: String, func: &FunctionDefinition) -> Result<Procedure, TranslateError> {
    let mut proc = Procedure::new(name);
    proc.params.push(TypedIdent::new(THIS, BoogieType::Ref));
    proc.params.push(TypedIdent::new(MSG_SENDER, BoogieType::Ref));
    for (i, param) in func.parameters.parameters.iter().enumerate() {
        proc.params
            .push(TypedIdent::new(param_name(&param.name, "__arg", i), variable_type(param)?));
    }
    for (i, ret) in func.return_parameters.parameters.iter().enumerate() {
        proc.returns
            .push(TypedIdent::new(param_name(&ret.name, "__ret", i), variable_type(ret)?));
    }
    Ok(proc)
}

fn param_name(name: &str, prefix: &str, index: usize) -> String {
    if name.is_empty() {
        format!("{prefix}{index}")
    } else {
        boogie_ident(name)
    }
}

pub fn state_variable_name(var: &str, contract: &str) -> String {
    format!("{var}_{contract}")
}

pub fn constructor_name(contract: &str) -> String {
    format!("{contract}_{contract}")
}

/// `<name>_<Contract>`; overloaded names carry their parameter types
pub fn procedure_name(
    func: &FunctionDefinition,
    contract: &str,
    overloaded: &BTreeSet<String>,
) -> String {
    let base = match func.kind {
        FunctionKind::Fallback => "fallback",
        FunctionKind::Receive => "receive",
        _ => func.name.as_str(),
    };
    if !overloaded.contains(base) {
        return format!("{base}_{contract}");
    }
    let mut name = base.to_string();
    for param in &func.parameters.parameters {
        name.push('~');
        name.extend(
            param
                .type_string()
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }),
        );
    }
    format!("{name}_{contract}")
}

/// Function names declared more than once in `contract`
pub fn overloaded_names(contract: &ContractDefinition) -> BTreeSet<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for func in contract.functions().filter(|f| !f.is_constructor()) {
        *counts.entry(func.name.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(name, _)| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SourceUnit;
    use serde_json::{Value, json};

    fn param(id: i64, name: &str, ty: &str) -> Value {
        json!({
            "id": id, "name": name, "src": "0:0:0",
            "typeDescriptions": { "typeString": ty }
        })
    }

    fn token_program() -> Program {
        let unit: SourceUnit = serde_json::from_value(json!({
            "id": 1, "absolutePath": "token.sol",
            "nodes": [
                { "nodeType": "ContractDefinition", "id": 2, "name": "Token", "src": "0:10:0",
                  "contractKind": "contract",
                  "nodes": [
                    { "nodeType": "VariableDeclaration", "id": 3, "name": "balances",
                      "src": "0:0:0", "stateVariable": true,
                      "typeName": {
                        "nodeType": "Mapping",
                        "keyType": { "nodeType": "ElementaryTypeName", "name": "address" },
                        "valueType": { "nodeType": "ElementaryTypeName", "name": "uint256" }
                      } },
                    { "nodeType": "FunctionDefinition", "id": 4, "name": "", "src": "0:0:0",
                      "kind": "constructor", "visibility": "public",
                      "parameters": { "parameters": [param(5, "supply", "uint256")] } },
                    { "nodeType": "FunctionDefinition", "id": 6, "name": "transfer", "src": "0:0:0",
                      "kind": "function", "visibility": "public",
                      "parameters": { "parameters": [param(7, "to", "address"), param(8, "amount", "uint256")] },
                      "returnParameters": { "parameters": [param(9, "", "bool")] } },
                    { "nodeType": "FunctionDefinition", "id": 10, "name": "balanceOf", "src": "0:0:0",
                      "kind": "function", "visibility": "public", "stateMutability": "view",
                      "parameters": { "parameters": [param(11, "who", "address")] },
                      "returnParameters": { "parameters": [param(12, "", "uint256")] } }
                  ] }
            ]
        }))
        .unwrap();
        let mut program = Program::new("/src");
        program.add_unit(0, None, unit);
        program
    }

    #[test]
    fn test_parse_ignored_method() {
        let entry: IgnoredMethod = "Token.transfer".parse().unwrap();
        assert_eq!(entry.contract, "Token");
        assert_eq!(entry.method, "transfer");
        assert_eq!(entry.to_string(), "Token.transfer");
        assert!("Token".parse::<IgnoredMethod>().is_err());
        assert!(".transfer".parse::<IgnoredMethod>().is_err());
    }

    #[test]
    fn test_ignore_list_wildcard() {
        let list: IgnoreList = ["A.f".parse().unwrap(), "B.*".parse().unwrap()]
            .into_iter()
            .collect();
        assert!(list.contains("A", "f"));
        assert!(!list.contains("A", "g"));
        assert!(list.contains("B", "anything"));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_declarations() {
        let program = token_program();
        let boogie = BoogieTranslator
            .translate(&program, &TranslateOptions::for_contract("Token"))
            .unwrap();

        assert_eq!(
            boogie.global("balances_Token").unwrap().ty.to_string(),
            "[Ref][Ref]int"
        );
        assert!(boogie.global("DType").is_some());

        let ctor = boogie.procedure("Token_Token").unwrap();
        assert_eq!(ctor.params.len(), 3);
        assert_eq!(ctor.params[1].name, MSG_SENDER);

        let transfer = boogie.procedure("transfer_Token").unwrap();
        assert_eq!(transfer.returns[0].name, "__ret0");
        assert!(transfer.body.is_none());

        let text = boogie.render();
        assert!(text.contains("const unique Token: ContractName;"));
        assert!(text.contains(
            "procedure transfer_Token(this: Ref, msgsender_MSG: Ref, to: Ref, amount: int) returns (__ret0: bool);"
        ));
    }

    #[test]
    fn test_unknown_target() {
        let program = token_program();
        let err = BoogieTranslator
            .translate(&program, &TranslateOptions::for_contract("Nope"))
            .unwrap_err();
        assert!(matches!(err, TranslateError::UnknownTargetContract(name) if name == "Nope"));
    }

    #[test]
    fn test_overloaded_procedure_names() {
        let contract: ContractDefinition = serde_json::from_value(json!({
            "id": 1, "name": "A", "src": "0:0:0", "contractKind": "contract",
            "nodes": [
                { "nodeType": "FunctionDefinition", "id": 2, "name": "f", "src": "0:0:0",
                  "parameters": { "parameters": [param(3, "x", "uint256")] } },
                { "nodeType": "FunctionDefinition", "id": 4, "name": "f", "src": "0:0:0",
                  "parameters": { "parameters": [param(5, "x", "address payable")] } },
                { "nodeType": "FunctionDefinition", "id": 6, "name": "g", "src": "0:0:0" }
            ]
        }))
        .unwrap();
        let overloaded = overloaded_names(&contract);
        let names: Vec<String> = contract
            .functions()
            .map(|f| procedure_name(f, "A", &overloaded))
            .collect();
        assert_eq!(names, vec!["f~uint256_A", "f~address_payable_A", "g_A"]);
    }

    fn hierarchy_program() -> Program {
        let f = |id: i64, visibility: &str| {
            json!({ "nodeType": "FunctionDefinition", "id": id, "name": "f", "src": "0:0:0",
                    "kind": "function", "visibility": visibility })
        };
        let contract = |id: i64, name: &str, kind: &str, bases: &[i64], nodes: Vec<Value>| {
            let bases: Vec<Value> = bases
                .iter()
                .map(|b| json!({ "baseName": { "referencedDeclaration": b } }))
                .collect();
            json!({ "nodeType": "ContractDefinition", "id": id, "name": name, "src": "0:0:0",
                    "contractKind": kind, "baseContracts": bases, "nodes": nodes })
        };
        let unit: SourceUnit = serde_json::from_value(json!({
            "id": 100, "absolutePath": "hierarchy.sol",
            "nodes": [
                contract(1, "I", "interface", &[], vec![f(11, "external")]),
                contract(2, "Base", "contract", &[1], vec![
                    f(21, "public"),
                    json!({ "nodeType": "FunctionDefinition", "id": 22, "name": "g", "src": "0:0:0",
                            "kind": "function", "visibility": "public",
                            "parameters": { "parameters": [param(23, "old", "uint256")] },
                            "returnParameters": { "parameters": [param(24, "returns", "bool")] } }),
                    json!({ "nodeType": "FunctionDefinition", "id": 25, "name": "h", "src": "0:0:0",
                            "kind": "function", "visibility": "internal" })
                ]),
                contract(3, "Derived", "contract", &[2], vec![f(31, "public")]),
                contract(4, "Plain", "contract", &[2], vec![])
            ]
        }))
        .unwrap();
        let mut program = Program::new("/src");
        program.add_unit(0, None, unit);
        program
    }

    #[test]
    fn test_dispatch_name() {
        assert_eq!(dispatch_name("f()"), "Dispatch_f");
        assert_eq!(
            dispatch_name("transfer(address,uint256)"),
            "Dispatch_transfer~address~uint256"
        );
        assert_eq!(dispatch_name("pay(address payable)"), "Dispatch_pay~address_payable");
    }

    #[test]
    fn test_dispatch_follows_overrides() {
        let boogie = BoogieTranslator
            .translate(&hierarchy_program(), &TranslateOptions::for_contract("Plain"))
            .unwrap();
        let text = boogie.render();
        assert!(text.contains(
            "procedure Dispatch_f(this: Ref, msgsender_MSG: Ref)
{
  if (DType[this] == Base) {
    call f_Base(this, msgsender_MSG);
  } else {
    if (DType[this] == Derived) {
      call f_Derived(this, msgsender_MSG);
    } else {
      if (DType[this] == Plain) {
        call f_Base(this, msgsender_MSG);
      } else {
        assume false;
      }
    }
  }
}
"
        ), "{text}");
        // interfaces never receive a call, internal functions are not dispatched
        assert!(!text.contains("call f_I("));
        assert!(boogie.procedure("Dispatch_h").is_none());

        let g = boogie.procedure("Dispatch_g~uint256").unwrap();
        assert_eq!(g.params[2].name, "__arg0");
        assert_eq!(g.returns[0].name, "__ret0");
        // the harness calls what Plain resolves f to
        let harness = text.split("// harness for Plain\n").nth(1).unwrap();
        assert!(harness.contains("call f_Base(this, msgsender_MSG);"), "{harness}");
        assert!(!harness.contains("f_Derived"));
    }

    #[test]
    fn test_keywords_are_escaped() {
        let boogie = BoogieTranslator
            .translate(&hierarchy_program(), &TranslateOptions::for_contract("Base"))
            .unwrap();
        assert!(boogie.render().contains(
            "procedure g_Base(this: Ref, msgsender_MSG: Ref, old#: int) returns (returns#: bool);"
        ));

        let unit: SourceUnit = serde_json::from_value(json!({
            "id": 1, "absolutePath": "free.sol",
            "nodes": [{ "nodeType": "ContractDefinition", "id": 2, "name": "free", "src": "0:0:0",
                        "contractKind": "contract", "nodes": [] }]
        }))
        .unwrap();
        let mut program = Program::new("/src");
        program.add_unit(0, None, unit);
        let text = BoogieTranslator
            .translate(&program, &TranslateOptions::for_contract("free"))
            .unwrap()
            .render();
        assert!(text.contains("const unique free#: ContractName;"), "{text}");
        assert!(text.contains("assume DType[this] == free#;"), "{text}");
        assert_eq!(boogie_ident("balance"), "balance");
    }
}
