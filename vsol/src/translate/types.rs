//! Solidity → Boogie type mapping

use crate::ast::{TypeName, VariableDeclaration, strip_data_location};
use crate::boogie::BoogieType;
use crate::error::TranslateError;

/// Boogie type of a variable, from its type name when solc gave one,
/// otherwise from its type string
pub fn variable_type(var: &VariableDeclaration) -> Result<BoogieType, TranslateError> {
    let unsupported = || TranslateError::UnsupportedType {
        name: var.name.clone(),
        ty: var.type_string(),
    };
    match &var.type_name {
        Some(ty) => type_name_to_boogie(ty).ok_or_else(unsupported),
        None => type_string_to_boogie(&var.type_string()).ok_or_else(unsupported),
    }
}

pub fn type_name_to_boogie(ty: &TypeName) -> Option<BoogieType> {
    match ty {
        TypeName::ElementaryTypeName { name, .. } => elementary(name),
        TypeName::Mapping {
            key_type,
            value_type,
            ..
        } => Some(BoogieType::map(
            type_name_to_boogie(key_type)?,
            type_name_to_boogie(value_type)?,
        )),
        TypeName::ArrayTypeName { base_type, .. } => {
            Some(BoogieType::map(BoogieType::Int, type_name_to_boogie(base_type)?))
        }
        TypeName::UserDefinedTypeName {
            type_descriptions, ..
        } => match type_descriptions.type_string.as_deref() {
            Some(ts) => type_string_to_boogie(ts),
            None => Some(BoogieType::Ref),
        },
        TypeName::FunctionTypeName { .. } | TypeName::Unsupported => None,
    }
}

/// Map a solc type string such as `mapping(address => uint256[])`
pub fn type_string_to_boogie(type_string: &str) -> Option<BoogieType> {
    let ts = strip_data_location(type_string);

    if let Some(inner) = ts.strip_prefix("mapping(").and_then(|s| s.strip_suffix(')')) {
        let (key, value) = inner.split_once(" => ")?;
        return Some(BoogieType::map(
            type_string_to_boogie(key)?,
            type_string_to_boogie(value)?,
        ));
    }

    if let Some(base) = ts.strip_suffix(']') {
        let open = base.rfind('[')?;
        let element = type_string_to_boogie(&base[..open])?;
        return Some(BoogieType::map(BoogieType::Int, element));
    }

    if ts.starts_with("contract ") || ts.starts_with("struct ") {
        return Some(BoogieType::Ref);
    }
    if ts.starts_with("enum ") {
        return Some(BoogieType::Int);
    }
    elementary(ts)
}

fn elementary(name: &str) -> Option<BoogieType> {
    let ty = match name {
        "bool" => BoogieType::Bool,
        "address" | "address payable" => BoogieType::Ref,
        "string" | "bytes" | "byte" => BoogieType::Int,
        n if n.starts_with("uint") || n.starts_with("int") || n.starts_with("bytes") => {
            BoogieType::Int
        }
        n if n.starts_with("literal_string") || n.starts_with("int_const") => BoogieType::Int,
        _ => return None,
    };
    Some(ty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elementary_types() {
        assert_eq!(type_string_to_boogie("uint256"), Some(BoogieType::Int));
        assert_eq!(type_string_to_boogie("int8"), Some(BoogieType::Int));
        assert_eq!(type_string_to_boogie("bool"), Some(BoogieType::Bool));
        assert_eq!(type_string_to_boogie("address payable"), Some(BoogieType::Ref));
        assert_eq!(type_string_to_boogie("string memory"), Some(BoogieType::Int));
        assert_eq!(type_string_to_boogie("bytes32"), Some(BoogieType::Int));
        assert_eq!(type_string_to_boogie("contract Token"), Some(BoogieType::Ref));
        assert_eq!(type_string_to_boogie("function () external"), None);
    }

    #[test]
    fn test_nested_mapping_and_arrays() {
        let ty = type_string_to_boogie("mapping(address => mapping(address => uint256))").unwrap();
        assert_eq!(ty.to_string(), "[Ref][Ref]int");

        let ty = type_string_to_boogie("uint256[] storage ref").unwrap();
        assert_eq!(ty.to_string(), "[int]int");

        let ty = type_string_to_boogie("mapping(uint256 => address[3])").unwrap();
        assert_eq!(ty.to_string(), "[int][int]Ref");
    }

    #[test]
    fn test_type_name_mapping() {
        let ty: TypeName = serde_json::from_value(serde_json::json!({
            "nodeType": "Mapping",
            "keyType": { "nodeType": "ElementaryTypeName", "name": "address" },
            "valueType": {
                "nodeType": "ArrayTypeName",
                "baseType": { "nodeType": "ElementaryTypeName", "name": "bool" }
            }
        }))
        .unwrap();
        assert_eq!(type_name_to_boogie(&ty).unwrap().to_string(), "[Ref][int]bool");
    }
}
