//! Entry harnesses
//!
//! For a contract `C`:
//! - `CorralChoice_C(this)` nondeterministically calls one public or
//!   external state-changing function, resolved against dynamic type `C`
//! - `BoogieEntry_C` and `CorralEntry_C` construct a `C` and then call
//!   `CorralChoice_C` forever

use crate::ast::{ContractDefinition, FunctionDefinition};
use crate::boogie::{BoogieProgram, BoogieType, Body, Declaration, Expr, Procedure, Stmt, TypedIdent};
use crate::context::ResolutionContext;
use crate::error::TranslateError;

use super::{
    MSG_SENDER, THIS, TranslateOptions, boogie_ident, constructor_name, overloaded_names,
    procedure_name, variable_type,
};

pub fn boogie_entry_name(contract: &str) -> String {
    format!("BoogieEntry_{contract}")
}

pub fn corral_entry_name(contract: &str) -> String {
    format!("CorralEntry_{contract}")
}

pub fn corral_choice_name(contract: &str) -> String {
    format!("CorralChoice_{contract}")
}

pub(super) fn emit(
    ctx: &ResolutionContext<'_>,
    contract: &ContractDefinition,
    options: &TranslateOptions,
    out: &mut BoogieProgram,
) -> Result<(), TranslateError> {
    out.push(Declaration::Comment(format!("harness for {}", contract.name)));
    out.push(Declaration::Procedure(choice_procedure(ctx, contract, options)?));
    out.push(Declaration::Procedure(entry_procedure(
        ctx,
        contract,
        boogie_entry_name(&contract.name),
    )?));
    out.push(Declaration::Procedure(entry_procedure(
        ctx,
        contract,
        corral_entry_name(&contract.name),
    )?));
    Ok(())
}

fn choice_procedure(
    ctx: &ResolutionContext<'_>,
    contract: &ContractDefinition,
    options: &TranslateOptions,
) -> Result<Procedure, TranslateError> {
    let mut locals = vec![
        TypedIdent::new(MSG_SENDER, BoogieType::Ref),
        TypedIdent::new("choice", BoogieType::Int),
    ];
    let mut calls = Vec::new();

    for signature in ctx.visible_members(contract.id)?.functions.keys() {
        let func = ctx.resolve_function(signature, contract.id)?;
        if !func.is_externally_callable() || func.is_read_only() {
            continue;
        }
        let owner = ctx.owner_of_function(func.id)?;
        if options.honor_ignore && is_ignored(options, &[&owner.name, &contract.name], &func.name) {
            tracing::debug!(contract = %contract.name, method = %func.name, "ignored in harness");
            continue;
        }

        let callee = procedure_name(func, &owner.name, &overloaded_names(owner));
        calls.push(call_with_fresh_args(ctx, callee, func, &mut locals)?);
    }

    let mut stmts = vec![
        Stmt::Havoc(locals.iter().map(|l| l.name.clone()).collect()),
    ];
    let mut chain = Vec::new();
    for (i, call) in calls.into_iter().enumerate().rev() {
        chain = vec![Stmt::If {
            cond: Expr::eq(Expr::ident("choice"), Expr::Int(i as i64 + 1)),
            then_branch: vec![call],
            else_branch: chain,
        }];
    }
    stmts.extend(chain);

    let mut proc = Procedure::new(corral_choice_name(&contract.name));
    proc.params.push(TypedIdent::new(THIS, BoogieType::Ref));
    proc.body = Some(Body { locals, stmts });
    Ok(proc)
}

fn entry_procedure(
    ctx: &ResolutionContext<'_>,
    contract: &ContractDefinition,
    name: String,
) -> Result<Procedure, TranslateError> {
    let mut locals = vec![
        TypedIdent::new(THIS, BoogieType::Ref),
        TypedIdent::new(MSG_SENDER, BoogieType::Ref),
    ];

    let construct = match ctx.constructor_of(contract.id)? {
        Some(ctor) => Some(call_with_fresh_args(
            ctx,
            constructor_name(&contract.name),
            ctor,
            &mut locals,
        )?),
        None => None,
    };

    let mut stmts = vec![
        Stmt::Havoc(locals.iter().map(|l| l.name.clone()).collect()),
        Stmt::Assume(Expr::eq(
            Expr::select(Expr::ident("DType"), Expr::ident(THIS)),
            Expr::ident(boogie_ident(&contract.name)),
        )),
    ];
    stmts.extend(construct);
    stmts.push(Stmt::While {
        cond: Expr::Bool(true),
        body: vec![Stmt::Call {
            callee: corral_choice_name(&contract.name),
            args: vec![Expr::ident(THIS)],
            returns: Vec::new(),
        }],
    });

    let mut proc = Procedure::new(name);
    proc.body = Some(Body { locals, stmts });
    Ok(proc)
}

/// `call r.. := callee(this, msgsender_MSG, a..)` with every argument and
/// result a fresh local
fn call_with_fresh_args(
    ctx: &ResolutionContext<'_>,
    callee: String,
    func: &FunctionDefinition,
    locals: &mut Vec<TypedIdent>,
) -> Result<Stmt, TranslateError> {
    let mut args = vec![Expr::ident(THIS), Expr::ident(MSG_SENDER)];
    for param in &func.parameters.parameters {
        let fresh = ctx.fresh_identifier(variable_type(param)?);
        args.push(Expr::ident(&fresh.name));
        locals.push(fresh);
    }

    let mut returns = Vec::new();
    for ret in &func.return_parameters.parameters {
        let fresh = ctx.fresh_identifier(variable_type(ret)?);
        returns.push(fresh.name.clone());
        locals.push(fresh);
    }

    Ok(Stmt::Call {
        callee,
        args,
        returns,
    })
}

fn is_ignored(options: &TranslateOptions, contracts: &[&str], method: &str) -> bool {
    contracts.iter().any(|c| options.ignore.contains(c, method))
}
