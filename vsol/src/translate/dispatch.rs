//! Dynamic dispatch
//!
//! One `Dispatch_<signature>` procedure per externally callable signature.
//! Its body branches on `DType[this]` and calls the implementation that the
//! receiver's dynamic type resolves to. Receivers of any other type are
//! unreachable (`assume false`).

use crate::ast::{ContractDefinition, FunctionDefinition};
use crate::boogie::{
    BoogieProgram, BoogieType, Body, Declaration, Expr, Procedure, Stmt, TypedIdent,
};
use crate::context::ResolutionContext;
use crate::error::TranslateError;

use super::{MSG_SENDER, THIS, boogie_ident, overloaded_names, procedure_name, variable_type};

/// `transfer(address,uint256)` → `Dispatch_transfer~address~uint256`
pub fn dispatch_name(signature: &str) -> String {
    let (name, params) = signature.split_once('(').unwrap_or((signature, ")"));
    let params = params.strip_suffix(')').unwrap_or(params);

    let mut out = format!("Dispatch_{name}");
    if !params.is_empty() {
        for ty in params.split(',') {
            out.push('~');
            out.extend(ty.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }));
        }
    }
    out
}

pub(super) fn emit(
    ctx: &ResolutionContext<'_>,
    out: &mut BoogieProgram,
) -> Result<(), TranslateError> {
    for signature in ctx.function_signatures() {
        let mut receivers = Vec::new();
        for (&dynamic_type, &func) in ctx.all_function_definitions(signature)? {
            let receiver = ctx.contract(dynamic_type)?;
            if is_instantiable(receiver) && func.is_externally_callable() {
                receivers.push((receiver, func));
            }
        }
        let Some(&(_, representative)) = receivers.first() else {
            continue;
        };
        out.push(Declaration::Procedure(dispatch_procedure(
            ctx,
            signature,
            representative,
            &receivers,
        )?));
    }
    Ok(())
}

fn is_instantiable(contract: &ContractDefinition) -> bool {
    !contract.is_abstract && !contract.is_interface() && !contract.is_library()
}

fn dispatch_procedure(
    ctx: &ResolutionContext<'_>,
    signature: &str,
    representative: &FunctionDefinition,
    receivers: &[(&ContractDefinition, &FunctionDefinition)],
) -> Result<Procedure, TranslateError> {
    let mut proc = Procedure::new(dispatch_name(signature));
    proc.params.push(TypedIdent::new(THIS, BoogieType::Ref));
    proc.params.push(TypedIdent::new(MSG_SENDER, BoogieType::Ref));
    let mut args = vec![Expr::ident(THIS), Expr::ident(MSG_SENDER)];
    for (i, param) in representative.parameters.parameters.iter().enumerate() {
        let arg = TypedIdent::new(format!("__arg{i}"), variable_type(param)?);
        args.push(Expr::ident(&arg.name));
        proc.params.push(arg);
    }
    let mut returns = Vec::new();
    for (i, ret) in representative.return_parameters.parameters.iter().enumerate() {
        let ret = TypedIdent::new(format!("__ret{i}"), variable_type(ret)?);
        returns.push(ret.name.clone());
        proc.returns.push(ret);
    }

    let mut chain = vec![Stmt::Assume(Expr::Bool(false))];
    for &(receiver, func) in receivers.iter().rev() {
        let owner = ctx.owner_of_function(func.id)?;
        chain = vec![Stmt::If {
            cond: Expr::eq(
                Expr::select(Expr::ident("DType"), Expr::ident(THIS)),
                Expr::ident(boogie_ident(&receiver.name)),
            ),
            then_branch: vec![Stmt::Call {
                callee: procedure_name(func, &owner.name, &overloaded_names(owner)),
                args: args.clone(),
                returns: returns.clone(),
            }],
            else_branch: chain,
        }];
    }

    proc.body = Some(Body {
        locals: Vec::new(),
        stmts: chain,
    });
    Ok(proc)
}
