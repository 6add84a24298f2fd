use std::collections::HashMap;

use crate::ast::Expr;
use crate::builtins::Builtin;
use crate::errors::EvalError;
use crate::namespace::{Namespace, UserFunction};

/// Nested user-function calls deeper than this fail instead of overflowing
/// the stack.
pub const MAX_CALL_DEPTH: usize = 64;

/// Name lookup consulted before the namespace constants.
pub trait Scope {
    fn lookup(&self, name: &str) -> Option<f64>;
}

impl Scope for HashMap<String, f64> {
    fn lookup(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

impl Scope for indexmap::IndexMap<String, f64> {
    fn lookup(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

pub struct EmptyScope;

impl Scope for EmptyScope {
    fn lookup(&self, _name: &str) -> Option<f64> {
        None
    }
}

/// Bound parameters of one user-function call.
struct Frame<'a> {
    params: &'a [String],
    args: &'a [f64],
}

impl Scope for Frame<'_> {
    fn lookup(&self, name: &str) -> Option<f64> {
        self.params
            .iter()
            .position(|param| param == name)
            .map(|i| self.args[i])
    }
}

pub fn evaluate(expr: &Expr, scope: &dyn Scope, namespace: &Namespace) -> Result<f64, EvalError> {
    evaluate_at_depth(expr, scope, namespace, 0)
}

fn evaluate_at_depth(
    expr: &Expr,
    scope: &dyn Scope,
    namespace: &Namespace,
    depth: usize,
) -> Result<f64, EvalError> {
    match expr {
        Expr::Number(value) => Ok(*value),
        Expr::Name(name) => scope
            .lookup(name)
            .or_else(|| namespace.constant(name))
            .ok_or_else(|| EvalError::UnknownName(name.clone())),
        Expr::Neg(inner) => Ok(-evaluate_at_depth(inner, scope, namespace, depth)?),
        Expr::Binary { op, lhs, rhs } => {
            let lhs = evaluate_at_depth(lhs, scope, namespace, depth)?;
            let rhs = evaluate_at_depth(rhs, scope, namespace, depth)?;
            Ok(op.apply(lhs, rhs))
        }
        Expr::Call { name, args } => {
            let args = args
                .iter()
                .map(|arg| evaluate_at_depth(arg, scope, namespace, depth))
                .collect::<Result<Vec<_>, _>>()?;
            call_function(name, &args, namespace, depth)
        }
        Expr::Compare { .. } => Err(EvalError::Comparison),
    }
}

/// User functions shadow builtins of the same name.
pub fn call_function(
    name: &str,
    args: &[f64],
    namespace: &Namespace,
    depth: usize,
) -> Result<f64, EvalError> {
    if let Some(function) = namespace.function(name) {
        return call_user(function, args, namespace, depth);
    }
    let builtin = Builtin::lookup(name).ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
    check_arity(name, builtin.arity(), args.len())?;
    Ok(builtin.apply(args))
}

pub fn call_user(
    function: &UserFunction,
    args: &[f64],
    namespace: &Namespace,
    depth: usize,
) -> Result<f64, EvalError> {
    check_arity(&function.name, function.params.len(), args.len())?;
    if depth >= MAX_CALL_DEPTH {
        return Err(EvalError::RecursionLimit(function.name.clone()));
    }
    let frame = Frame {
        params: &function.params,
        args,
    };
    evaluate_at_depth(&function.body, &frame, namespace, depth + 1)
}

pub fn check_arity(name: &str, expected: usize, found: usize) -> Result<(), EvalError> {
    if expected == found {
        Ok(())
    } else {
        Err(EvalError::Arity {
            name: name.to_string(),
            expected,
            found,
        })
    }
}
