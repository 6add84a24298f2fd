use std::sync::Arc;

use crate::ast::{BinOp, Expr, Folder, fold_children};
use crate::builtins::Builtin;
use crate::errors::EvalError;
use crate::eval::{call_user, check_arity};
use crate::namespace::{Namespace, UserFunction};

struct CompareToSubtract;

impl Folder for CompareToSubtract {
    fn fold_expr(&mut self, expr: Expr) -> Expr {
        match expr {
            Expr::Compare { lhs, rhs } => {
                Expr::binary(BinOp::Sub, self.fold_expr(*lhs), self.fold_expr(*rhs))
            }
            other => fold_children(self, other),
        }
    }
}

/// `lhs - rhs` of an equation `lhs = rhs`; zero at a solution.
#[derive(Debug, Clone, PartialEq)]
pub struct Residual {
    expr: Expr,
}

impl Residual {
    pub fn from_tree(tree: &Expr) -> Self {
        Self {
            expr: CompareToSubtract.fold_expr(tree.clone()),
        }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn compile(&self, bindings: &dyn Bindings, namespace: &Namespace) -> Result<Compiled, EvalError> {
        compile(&self.expr, bindings, namespace)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Binding {
    Known(f64),
    /// Index into the unknown vector of the block being solved.
    Unknown(usize),
}

pub trait Bindings {
    fn bind(&self, name: &str) -> Option<Binding>;
}

/// A residual with every name resolved to a constant or an unknown slot.
#[derive(Debug, Clone)]
pub enum Compiled {
    Constant(f64),
    Unknown(usize),
    Neg(Box<Compiled>),
    Binary(BinOp, Box<Compiled>, Box<Compiled>),
    Builtin(Builtin, Vec<Compiled>),
    User(Arc<UserFunction>, Vec<Compiled>),
}

fn compile(expr: &Expr, bindings: &dyn Bindings, namespace: &Namespace) -> Result<Compiled, EvalError> {
    let compiled = match expr {
        Expr::Number(value) => Compiled::Constant(*value),
        Expr::Name(name) => match bindings.bind(name) {
            Some(Binding::Known(value)) => Compiled::Constant(value),
            Some(Binding::Unknown(index)) => Compiled::Unknown(index),
            None => Compiled::Constant(
                namespace
                    .constant(name)
                    .ok_or_else(|| EvalError::UnknownName(name.clone()))?,
            ),
        },
        Expr::Neg(inner) => match compile(inner, bindings, namespace)? {
            Compiled::Constant(value) => Compiled::Constant(-value),
            inner => Compiled::Neg(Box::new(inner)),
        },
        Expr::Binary { op, lhs, rhs } => {
            let lhs = compile(lhs, bindings, namespace)?;
            let rhs = compile(rhs, bindings, namespace)?;
            match (&lhs, &rhs) {
                (Compiled::Constant(l), Compiled::Constant(r)) => Compiled::Constant(op.apply(*l, *r)),
                _ => Compiled::Binary(*op, Box::new(lhs), Box::new(rhs)),
            }
        }
        Expr::Call { name, args } => {
            let args = args
                .iter()
                .map(|arg| compile(arg, bindings, namespace))
                .collect::<Result<Vec<_>, _>>()?;
            if let Some(function) = namespace.function(name) {
                check_arity(name, function.params.len(), args.len())?;
                Compiled::User(Arc::clone(function), args)
            } else {
                let builtin =
                    Builtin::lookup(name).ok_or_else(|| EvalError::UnknownFunction(name.clone()))?;
                check_arity(name, builtin.arity(), args.len())?;
                Compiled::Builtin(builtin, args)
            }
        }
        Expr::Compare { .. } => return Err(EvalError::Comparison),
    };
    Ok(compiled)
}

impl Compiled {
    pub fn eval(&self, unknowns: &[f64], namespace: &Namespace) -> Result<f64, EvalError> {
        match self {
            Compiled::Constant(value) => Ok(*value),
            Compiled::Unknown(index) => Ok(unknowns[*index]),
            Compiled::Neg(inner) => Ok(-inner.eval(unknowns, namespace)?),
            Compiled::Binary(op, lhs, rhs) => {
                Ok(op.apply(lhs.eval(unknowns, namespace)?, rhs.eval(unknowns, namespace)?))
            }
            Compiled::Builtin(builtin, args) => {
                let args = eval_all(args, unknowns, namespace)?;
                Ok(builtin.apply(&args))
            }
            Compiled::User(function, args) => {
                let args = eval_all(args, unknowns, namespace)?;
                call_user(function, &args, namespace, 0)
            }
        }
    }
}

fn eval_all(args: &[Compiled], unknowns: &[f64], namespace: &Namespace) -> Result<Vec<f64>, EvalError> {
    args.iter().map(|arg| arg.eval(unknowns, namespace)).collect()
}
