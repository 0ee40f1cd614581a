//! Solidity AST definitions
//!
//! A typed view of the subset of solc's compact JSON AST that symbol
//! resolution needs. Node kinds this crate does not model deserialize to an
//! `Other` variant and are skipped.

mod span;
mod types;

pub use span::*;
pub use types::*;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// solc node id, unique across one compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A source file known to the compiler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: PathBuf,
    /// File contents, when available; used for line attribution and diagnostics
    #[serde(default, skip_serializing)]
    pub text: Option<String>,
}

/// A whole compiled program: every source unit solc returned, plus the
/// source list that `src` file indices refer to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub units: Vec<SourceUnit>,
    pub sources: BTreeMap<usize, SourceFile>,
    pub source_dir: PathBuf,
}

impl Program {
    pub fn new(source_dir: impl AsRef<Path>) -> Self {
        Self {
            units: Vec::new(),
            sources: BTreeMap::new(),
            source_dir: source_dir.as_ref().to_path_buf(),
        }
    }

    /// Add a source unit together with its file index and (optional) text
    pub fn add_unit(&mut self, file_index: usize, text: Option<String>, unit: SourceUnit) {
        self.sources.insert(
            file_index,
            SourceFile {
                path: PathBuf::from(&unit.absolute_path),
                text,
            },
        );
        self.units.push(unit);
    }

    /// All contract definitions, in source-unit order
    pub fn contracts(&self) -> impl Iterator<Item = &ContractDefinition> {
        self.units.iter().flat_map(|unit| unit.contracts())
    }

    pub fn source_file(&self, span: &Span) -> Option<&SourceFile> {
        span.file.and_then(|index| self.sources.get(&index))
    }

    /// Absolute path and 1-based line of a span; line is 0 when the source
    /// text is unavailable.
    pub fn locate(&self, span: &Span) -> Option<(PathBuf, usize)> {
        let file = self.source_file(span)?;
        let path = if file.path.is_absolute() {
            file.path.clone()
        } else {
            self.source_dir.join(&file.path)
        };
        let line = file.text.as_deref().map_or(0, |text| span.line_in(text));
        Some((path, line))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceUnit {
    pub id: NodeId,
    pub absolute_path: String,
    #[serde(default)]
    pub nodes: Vec<SourceUnitNode>,
}

impl SourceUnit {
    pub fn contracts(&self) -> impl Iterator<Item = &ContractDefinition> {
        self.nodes.iter().filter_map(|node| match node {
            SourceUnitNode::ContractDefinition(contract) => Some(contract),
            SourceUnitNode::Other => None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "nodeType")]
pub enum SourceUnitNode {
    ContractDefinition(ContractDefinition),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractKind {
    Contract,
    Interface,
    Library,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDefinition {
    pub id: NodeId,
    pub name: String,
    pub src: Span,
    pub contract_kind: ContractKind,
    #[serde(rename = "abstract", default)]
    pub is_abstract: bool,
    /// Direct bases in declaration order (`is A, B` → `[A, B]`)
    #[serde(default)]
    pub base_contracts: Vec<InheritanceSpecifier>,
    /// C3 linearization, most derived first, including the contract itself.
    /// Empty when the AST was not produced by solc.
    #[serde(default)]
    pub linearized_base_contracts: Vec<NodeId>,
    #[serde(default)]
    pub nodes: Vec<ContractNode>,
}

impl ContractDefinition {
    pub fn base_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.base_contracts
            .iter()
            .map(|spec| spec.base_name.referenced_declaration)
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDefinition> {
        self.nodes.iter().filter_map(|node| match node {
            ContractNode::FunctionDefinition(func) => Some(func),
            _ => None,
        })
    }

    pub fn state_variables(&self) -> impl Iterator<Item = &VariableDeclaration> {
        self.nodes.iter().filter_map(|node| match node {
            ContractNode::VariableDeclaration(var) => Some(var),
            _ => None,
        })
    }

    pub fn events(&self) -> impl Iterator<Item = &EventDefinition> {
        self.nodes.iter().filter_map(|node| match node {
            ContractNode::EventDefinition(event) => Some(event),
            _ => None,
        })
    }

    pub fn is_interface(&self) -> bool {
        self.contract_kind == ContractKind::Interface
    }

    pub fn is_library(&self) -> bool {
        self.contract_kind == ContractKind::Library
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InheritanceSpecifier {
    pub base_name: BaseName,
}

/// `UserDefinedTypeName` or `IdentifierPath`, depending on the solc version
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseName {
    #[serde(default)]
    pub name: Option<String>,
    pub referenced_declaration: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "nodeType")]
pub enum ContractNode {
    FunctionDefinition(FunctionDefinition),
    VariableDeclaration(VariableDeclaration),
    EventDefinition(EventDefinition),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FunctionKind {
    #[default]
    Function,
    Constructor,
    Fallback,
    Receive,
    FreeFunction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    External,
    #[default]
    Internal,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateMutability {
    Pure,
    View,
    #[default]
    Nonpayable,
    Payable,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterList {
    #[serde(default)]
    pub parameters: Vec<VariableDeclaration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDefinition {
    pub id: NodeId,
    pub name: String,
    pub src: Span,
    #[serde(default)]
    pub kind: FunctionKind,
    /// Pre-0.5 compilers mark constructors with this flag instead of `kind`
    #[serde(default)]
    pub is_constructor: bool,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub state_mutability: StateMutability,
    #[serde(default)]
    pub parameters: ParameterList,
    #[serde(default)]
    pub return_parameters: ParameterList,
    #[serde(default = "default_true")]
    pub implemented: bool,
}

fn default_true() -> bool {
    true
}

impl FunctionDefinition {
    pub fn is_constructor(&self) -> bool {
        self.kind == FunctionKind::Constructor || self.is_constructor
    }

    /// Callable from outside the contract
    pub fn is_externally_callable(&self) -> bool {
        matches!(self.visibility, Visibility::Public | Visibility::External)
    }

    pub fn is_read_only(&self) -> bool {
        matches!(
            self.state_mutability,
            StateMutability::Pure | StateMutability::View
        )
    }

    /// Name plus parameter types, e.g. `transfer(address,uint256)`.
    /// Data locations are dropped, so overrides that only change
    /// `memory`/`calldata` share a signature.
    pub fn signature(&self) -> String {
        let name = match self.kind {
            FunctionKind::Fallback => "fallback",
            FunctionKind::Receive => "receive",
            _ => self.name.as_str(),
        };
        let params: Vec<String> = self
            .parameters
            .parameters
            .iter()
            .map(|p| p.type_string())
            .collect();
        format!("{}({})", name, params.join(","))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDeclaration {
    pub id: NodeId,
    pub name: String,
    pub src: Span,
    #[serde(default)]
    pub state_variable: bool,
    #[serde(default)]
    pub constant: bool,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub type_name: Option<TypeName>,
    #[serde(default)]
    pub type_descriptions: TypeDescriptions,
}

impl VariableDeclaration {
    pub fn is_mapping(&self) -> bool {
        self.type_name.as_ref().is_some_and(TypeName::is_mapping)
    }

    pub fn is_array(&self) -> bool {
        self.type_name.as_ref().is_some_and(TypeName::is_array)
    }

    /// Declared type with any data location removed
    pub fn type_string(&self) -> String {
        if let Some(ts) = &self.type_descriptions.type_string {
            return strip_data_location(ts).to_string();
        }
        match &self.type_name {
            Some(ty) => ty.to_string(),
            None => "var".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDefinition {
    pub id: NodeId,
    pub name: String,
    pub src: Span,
    #[serde(default)]
    pub parameters: ParameterList,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn param(name: &str, type_string: &str) -> serde_json::Value {
        json!({
            "id": 900, "name": name, "src": "0:0:0",
            "typeDescriptions": { "typeString": type_string }
        })
    }

    #[test]
    fn test_function_signature() {
        let func: FunctionDefinition = serde_json::from_value(json!({
            "id": 7, "name": "transfer", "src": "10:40:0", "kind": "function",
            "visibility": "public",
            "parameters": { "parameters": [param("to", "address"), param("amount", "uint256")] }
        }))
        .unwrap();
        assert_eq!(func.signature(), "transfer(address,uint256)");
        assert!(func.is_externally_callable());
        assert!(!func.is_constructor());
    }

    #[test]
    fn test_signature_ignores_data_location() {
        let a: FunctionDefinition = serde_json::from_value(json!({
            "id": 1, "name": "set", "src": "0:0:0",
            "parameters": { "parameters": [param("s", "string memory")] }
        }))
        .unwrap();
        let b: FunctionDefinition = serde_json::from_value(json!({
            "id": 2, "name": "set", "src": "0:0:0",
            "parameters": { "parameters": [param("s", "string calldata")] }
        }))
        .unwrap();
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn test_fallback_signature() {
        let func: FunctionDefinition = serde_json::from_value(json!({
            "id": 3, "name": "", "src": "0:0:0", "kind": "fallback", "visibility": "external"
        }))
        .unwrap();
        assert_eq!(func.signature(), "fallback()");
    }

    #[test]
    fn test_legacy_constructor_flag() {
        let func: FunctionDefinition = serde_json::from_value(json!({
            "id": 4, "name": "", "src": "0:0:0", "isConstructor": true
        }))
        .unwrap();
        assert!(func.is_constructor());
    }

    #[test]
    fn test_contract_members_skip_unknown_nodes() {
        let contract: ContractDefinition = serde_json::from_value(json!({
            "id": 10, "name": "Token", "src": "0:100:0", "contractKind": "contract",
            "nodes": [
                { "nodeType": "UsingForDirective", "id": 11, "src": "0:0:0" },
                { "nodeType": "VariableDeclaration", "id": 12, "name": "total", "src": "0:0:0",
                  "stateVariable": true,
                  "typeName": { "nodeType": "ElementaryTypeName", "name": "uint256" },
                  "typeDescriptions": { "typeString": "uint256" } },
                { "nodeType": "EventDefinition", "id": 13, "name": "Sent", "src": "0:0:0" },
                { "nodeType": "ModifierDefinition", "id": 14, "src": "0:0:0" }
            ]
        }))
        .unwrap();
        assert_eq!(contract.state_variables().count(), 1);
        assert_eq!(contract.events().count(), 1);
        assert_eq!(contract.functions().count(), 0);
        assert_eq!(contract.nodes.len(), 4);
    }

    #[test]
    fn test_program_locate() {
        let unit: SourceUnit = serde_json::from_value(json!({
            "id": 1, "absolutePath": "a.sol", "nodes": []
        }))
        .unwrap();
        let mut program = Program::new("/work");
        program.add_unit(0, Some("line1\nline2\n".to_string()), unit);

        let (path, line) = program.locate(&Span::new(6, 8, Some(0))).unwrap();
        assert_eq!(path, PathBuf::from("/work/a.sol"));
        assert_eq!(line, 2);
        assert!(program.locate(&Span::new(0, 1, Some(5))).is_none());
    }
}
