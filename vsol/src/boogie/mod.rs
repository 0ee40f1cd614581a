//! Boogie program model
//!
//! Just enough of the Boogie language to declare a contract program's
//! types, globals and procedures and to write verification harnesses.
//! The only operation consumers need is rendering to text (`Display`).

use std::fmt::{self, Write as FmtWrite};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BoogieType {
    Int,
    Bool,
    Ref,
    ContractName,
    Map(Box<BoogieType>, Box<BoogieType>),
}

impl BoogieType {
    pub fn map(key: BoogieType, value: BoogieType) -> Self {
        BoogieType::Map(Box::new(key), Box::new(value))
    }
}

impl fmt::Display for BoogieType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoogieType::Int => write!(f, "int"),
            BoogieType::Bool => write!(f, "bool"),
            BoogieType::Ref => write!(f, "Ref"),
            BoogieType::ContractName => write!(f, "ContractName"),
            BoogieType::Map(key, value) => write!(f, "[{key}]{value}"),
        }
    }
}

/// A name paired with its Boogie type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedIdent {
    pub name: String,
    pub ty: BoogieType,
}

impl TypedIdent {
    pub fn new(name: impl Into<String>, ty: BoogieType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

impl fmt::Display for TypedIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.ty)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(String),
    Int(i64),
    Bool(bool),
    Select(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn select(map: Expr, index: Expr) -> Self {
        Expr::Select(Box::new(map), Box::new(index))
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> Self {
        Expr::Eq(Box::new(lhs), Box::new(rhs))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Ident(name) => write!(f, "{name}"),
            Expr::Int(n) => write!(f, "{n}"),
            Expr::Bool(b) => write!(f, "{b}"),
            Expr::Select(map, index) => write!(f, "{map}[{index}]"),
            Expr::Eq(lhs, rhs) => write!(f, "{lhs} == {rhs}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Havoc(Vec<String>),
    Assume(Expr),
    Call {
        callee: String,
        args: Vec<Expr>,
        returns: Vec<String>,
    },
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
}

impl Stmt {
    fn render(&self, out: &mut String, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        match self {
            Stmt::Havoc(names) => writeln!(out, "{pad}havoc {};", names.join(", ")),
            Stmt::Assume(expr) => writeln!(out, "{pad}assume {expr};"),
            Stmt::Call {
                callee,
                args,
                returns,
            } => {
                let args: Vec<String> = args.iter().map(Expr::to_string).collect();
                if returns.is_empty() {
                    writeln!(out, "{pad}call {callee}({});", args.join(", "))
                } else {
                    writeln!(
                        out,
                        "{pad}call {} := {callee}({});",
                        returns.join(", "),
                        args.join(", ")
                    )
                }
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                writeln!(out, "{pad}if ({cond}) {{")?;
                for stmt in then_branch {
                    stmt.render(out, indent + 1)?;
                }
                if else_branch.is_empty() {
                    writeln!(out, "{pad}}}")
                } else {
                    writeln!(out, "{pad}}} else {{")?;
                    for stmt in else_branch {
                        stmt.render(out, indent + 1)?;
                    }
                    writeln!(out, "{pad}}}")
                }
            }
            Stmt::While { cond, body } => {
                writeln!(out, "{pad}while ({cond})")?;
                writeln!(out, "{pad}{{")?;
                for stmt in body {
                    stmt.render(out, indent + 1)?;
                }
                writeln!(out, "{pad}}}")
            }
        }
    }
}

/// Procedure body: local declarations followed by statements
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Body {
    pub locals: Vec<TypedIdent>,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Procedure {
    pub name: String,
    pub params: Vec<TypedIdent>,
    pub returns: Vec<TypedIdent>,
    /// `None` declares an abstract procedure
    pub body: Option<Body>,
}

impl Procedure {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: Vec::new(),
            body: None,
        }
    }

    fn render(&self, out: &mut String) -> fmt::Result {
        let params: Vec<String> = self.params.iter().map(TypedIdent::to_string).collect();
        write!(out, "procedure {}({})", self.name, params.join(", "))?;
        if !self.returns.is_empty() {
            let returns: Vec<String> = self.returns.iter().map(TypedIdent::to_string).collect();
            write!(out, " returns ({})", returns.join(", "))?;
        }

        let Some(body) = &self.body else {
            return writeln!(out, ";");
        };

        writeln!(out, "\n{{")?;
        for local in &body.locals {
            writeln!(out, "  var {local};")?;
        }
        for stmt in &body.stmts {
            stmt.render(out, 1)?;
        }
        writeln!(out, "}}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Comment(String),
    Type(String),
    Const { ident: TypedIdent, unique: bool },
    GlobalVar(TypedIdent),
    Procedure(Procedure),
}

/// A complete Boogie program
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoogieProgram {
    pub declarations: Vec<Declaration>,
}

impl BoogieProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, decl: Declaration) {
        self.declarations.push(decl);
    }

    pub fn procedure(&self, name: &str) -> Option<&Procedure> {
        self.declarations.iter().find_map(|decl| match decl {
            Declaration::Procedure(proc) if proc.name == name => Some(proc),
            _ => None,
        })
    }

    pub fn global(&self, name: &str) -> Option<&TypedIdent> {
        self.declarations.iter().find_map(|decl| match decl {
            Declaration::GlobalVar(ident) if ident.name == name => Some(ident),
            _ => None,
        })
    }

    /// Render the program as Boogie source text
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BoogieProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        for decl in &self.declarations {
            match decl {
                Declaration::Comment(text) => writeln!(out, "// {text}")?,
                Declaration::Type(name) => writeln!(out, "type {name};")?,
                Declaration::Const { ident, unique } => {
                    let unique = if *unique { "unique " } else { "" };
                    writeln!(out, "const {unique}{ident};")?
                }
                Declaration::GlobalVar(ident) => writeln!(out, "var {ident};")?,
                Declaration::Procedure(proc) => {
                    proc.render(&mut out)?;
                    if proc.body.is_some() {
                        writeln!(out)?;
                    }
                }
            }
        }
        f.write_str(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_map_type() {
        let ty = BoogieType::map(BoogieType::Ref, BoogieType::map(BoogieType::Ref, BoogieType::Int));
        assert_eq!(ty.to_string(), "[Ref][Ref]int");
    }

    #[test]
    fn test_render_declarations() {
        let mut program = BoogieProgram::new();
        program.push(Declaration::Type("Ref".to_string()));
        program.push(Declaration::Const {
            ident: TypedIdent::new("Token", BoogieType::ContractName),
            unique: true,
        });
        program.push(Declaration::GlobalVar(TypedIdent::new(
            "DType",
            BoogieType::map(BoogieType::Ref, BoogieType::ContractName),
        )));

        let mut proc = Procedure::new("f_Token");
        proc.params.push(TypedIdent::new("this", BoogieType::Ref));
        proc.returns.push(TypedIdent::new("r", BoogieType::Int));
        program.push(Declaration::Procedure(proc));

        insta::assert_snapshot!(program.render(), @r"
        type Ref;
        const unique Token: ContractName;
        var DType: [Ref]ContractName;
        procedure f_Token(this: Ref) returns (r: int);
        ");
    }

    #[test]
    fn test_render_procedure_with_body() {
        let mut proc = Procedure::new("Main");
        proc.body = Some(Body {
            locals: vec![TypedIdent::new("choice", BoogieType::Int)],
            stmts: vec![
                Stmt::Havoc(vec!["choice".to_string()]),
                Stmt::If {
                    cond: Expr::eq(Expr::ident("choice"), Expr::Int(1)),
                    then_branch: vec![Stmt::Call {
                        callee: "g".to_string(),
                        args: vec![Expr::ident("choice")],
                        returns: vec!["x".to_string()],
                    }],
                    else_branch: vec![Stmt::Assume(Expr::Bool(false))],
                },
            ],
        });

        let mut out = String::new();
        proc.render(&mut out).unwrap();
        assert_eq!(
            out,
            "procedure Main()\n{\n  var choice: int;\n  havoc choice;\n  if (choice == 1) {\n    call x := g(choice);\n  } else {\n    assume false;\n  }\n}\n"
        );
    }

    #[test]
    fn test_lookup_helpers() {
        let mut program = BoogieProgram::new();
        program.push(Declaration::GlobalVar(TypedIdent::new("x_A", BoogieType::Int)));
        program.push(Declaration::Procedure(Procedure::new("f_A")));
        assert!(program.global("x_A").is_some());
        assert!(program.procedure("f_A").is_some());
        assert!(program.procedure("g_A").is_none());
    }
}
