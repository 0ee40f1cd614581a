//! Type-name AST nodes

use serde::{Deserialize, Serialize};

use super::NodeId;

/// Type information solc attaches to typed nodes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDescriptions {
    #[serde(default)]
    pub type_string: Option<String>,
    #[serde(default)]
    pub type_identifier: Option<String>,
}

/// A type name as written in source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "nodeType")]
pub enum TypeName {
    ElementaryTypeName {
        name: String,
        #[serde(rename = "typeDescriptions", default)]
        type_descriptions: TypeDescriptions,
    },
    Mapping {
        #[serde(rename = "keyType")]
        key_type: Box<TypeName>,
        #[serde(rename = "valueType")]
        value_type: Box<TypeName>,
        #[serde(rename = "typeDescriptions", default)]
        type_descriptions: TypeDescriptions,
    },
    ArrayTypeName {
        #[serde(rename = "baseType")]
        base_type: Box<TypeName>,
        /// Length expression; absent or null for dynamic arrays
        #[serde(default)]
        length: Option<serde_json::Value>,
        #[serde(rename = "typeDescriptions", default)]
        type_descriptions: TypeDescriptions,
    },
    UserDefinedTypeName {
        #[serde(default)]
        name: Option<String>,
        #[serde(rename = "referencedDeclaration")]
        referenced_declaration: NodeId,
        #[serde(rename = "typeDescriptions", default)]
        type_descriptions: TypeDescriptions,
    },
    FunctionTypeName {
        #[serde(rename = "typeDescriptions", default)]
        type_descriptions: TypeDescriptions,
    },
    #[serde(other)]
    Unsupported,
}

impl TypeName {
    pub fn is_mapping(&self) -> bool {
        matches!(self, TypeName::Mapping { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self, TypeName::ArrayTypeName { .. })
    }

    /// solc's own rendering of this type, when present
    pub fn type_string(&self) -> Option<&str> {
        let descriptions = match self {
            TypeName::ElementaryTypeName { type_descriptions, .. }
            | TypeName::Mapping { type_descriptions, .. }
            | TypeName::ArrayTypeName { type_descriptions, .. }
            | TypeName::UserDefinedTypeName { type_descriptions, .. }
            | TypeName::FunctionTypeName { type_descriptions } => type_descriptions,
            TypeName::Unsupported => return None,
        };
        descriptions.type_string.as_deref()
    }
}

impl std::fmt::Display for TypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeName::ElementaryTypeName { name, .. } => write!(f, "{name}"),
            TypeName::Mapping {
                key_type,
                value_type,
                ..
            } => write!(f, "mapping({key_type} => {value_type})"),
            TypeName::ArrayTypeName { base_type, .. } => {
                // Fixed lengths are expressions; only solc's type string carries the value
                match self.type_string() {
                    Some(ts) => write!(f, "{}", strip_data_location(ts)),
                    None => write!(f, "{base_type}[]"),
                }
            }
            TypeName::UserDefinedTypeName {
                name,
                type_descriptions,
                ..
            } => match (name, &type_descriptions.type_string) {
                (Some(name), _) => write!(f, "{name}"),
                (None, Some(ts)) => write!(f, "{}", strip_data_location(ts)),
                (None, None) => write!(f, "<user-defined>"),
            },
            TypeName::FunctionTypeName { type_descriptions } => {
                write!(f, "{}", type_descriptions.type_string.as_deref().unwrap_or("function"))
            }
            TypeName::Unsupported => write!(f, "<unsupported>"),
        }
    }
}

/// Drop a trailing data-location qualifier from a solc type string, so that
/// `string memory` and `string calldata` name the same parameter type.
pub fn strip_data_location(type_string: &str) -> &str {
    const LOCATIONS: [&str; 5] = [" memory", " storage", " calldata", " pointer", " ref"];

    let mut ts = type_string.trim();
    loop {
        match LOCATIONS.iter().find_map(|loc| ts.strip_suffix(loc)) {
            Some(rest) => ts = rest.trim_end(),
            None => return ts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elementary(name: &str) -> TypeName {
        TypeName::ElementaryTypeName {
            name: name.to_string(),
            type_descriptions: TypeDescriptions::default(),
        }
    }

    #[test]
    fn test_strip_data_location() {
        assert_eq!(strip_data_location("string memory"), "string");
        assert_eq!(strip_data_location("uint256[] storage ref"), "uint256[]");
        assert_eq!(strip_data_location("bytes calldata"), "bytes");
        assert_eq!(strip_data_location("address"), "address");
    }

    #[test]
    fn test_display_mapping() {
        let ty = TypeName::Mapping {
            key_type: Box::new(elementary("address")),
            value_type: Box::new(elementary("uint256")),
            type_descriptions: TypeDescriptions::default(),
        };
        assert!(ty.is_mapping());
        assert!(!ty.is_array());
        assert_eq!(ty.to_string(), "mapping(address => uint256)");
    }

    #[test]
    fn test_deserialize_array_type() {
        let ty: TypeName = serde_json::from_value(serde_json::json!({
            "nodeType": "ArrayTypeName",
            "baseType": { "nodeType": "ElementaryTypeName", "name": "uint8" },
            "length": null,
            "typeDescriptions": { "typeString": "uint8[] storage ref" }
        }))
        .unwrap();
        assert!(ty.is_array());
        assert_eq!(ty.to_string(), "uint8[]");
    }

    #[test]
    fn test_deserialize_unknown_type_node() {
        let ty: TypeName =
            serde_json::from_value(serde_json::json!({ "nodeType": "SomethingNew" })).unwrap();
        assert_eq!(ty, TypeName::Unsupported);
    }
}
