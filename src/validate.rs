use crate::ast::{BinOp, Expr};
use crate::builtins::{Builtin, UnitRule};
use crate::errors::UnitError;
use crate::units::{Unit, integer_literal};

/// Unit information available to the validator.
pub trait UnitLookup {
    /// Unit of a variable, parameter or namespace constant.
    fn name_unit(&self, name: &str) -> Option<Unit>;

    /// Declared result unit of a user function. `Some(Err(_))` when the
    /// declaration does not parse.
    fn function_unit(&self, name: &str) -> Option<Result<Unit, UnitError>>;
}

/// Inferred unit of a subexpression.
#[derive(Debug, Clone, PartialEq)]
enum Inferred {
    /// A number literal, compatible with any unit.
    Literal(f64),
    Known(Unit),
    /// No unit information; compatible with anything.
    Free,
}

impl Inferred {
    fn unit(&self) -> Option<&Unit> {
        match self {
            Inferred::Known(unit) => Some(unit),
            _ => None,
        }
    }
}

/// Walks a tree bottom-up inferring units. Inconsistencies become warnings
/// and the offending subexpression is treated as `Free` afterwards, so one
/// mistake is reported once.
pub struct UnitValidator<'a> {
    lookup: &'a dyn UnitLookup,
    warnings: Vec<String>,
}

impl<'a> UnitValidator<'a> {
    pub fn new(lookup: &'a dyn UnitLookup) -> Self {
        Self {
            lookup,
            warnings: Vec::new(),
        }
    }

    pub fn validate(mut self, tree: &Expr) -> Vec<String> {
        self.infer(tree);
        self.warnings
    }

    fn warn(&mut self, context: &Expr, error: UnitError) {
        self.warnings.push(format!("{context}: {error}"));
    }

    fn known(&mut self, expr: &Expr, unit: Result<Unit, UnitError>) -> Inferred {
        match unit {
            Ok(unit) => Inferred::Known(unit),
            Err(error) => {
                self.warn(expr, error);
                Inferred::Free
            }
        }
    }

    fn combine_additive(&mut self, expr: &Expr, lhs: Inferred, rhs: Inferred) -> Inferred {
        match (lhs, rhs) {
            (Inferred::Known(l), Inferred::Known(r)) => self.known(expr, l.checked_add(&r)),
            (Inferred::Known(unit), _) | (_, Inferred::Known(unit)) => Inferred::Known(unit),
            (Inferred::Literal(l), Inferred::Literal(r)) => Inferred::Literal(l + r),
            _ => Inferred::Free,
        }
    }

    fn infer(&mut self, expr: &Expr) -> Inferred {
        match expr {
            Expr::Number(value) => Inferred::Literal(*value),
            Expr::Name(name) => match self.lookup.name_unit(name) {
                Some(unit) => Inferred::Known(unit),
                None => Inferred::Free,
            },
            Expr::Neg(inner) => match self.infer(inner) {
                Inferred::Literal(value) => Inferred::Literal(-value),
                other => other,
            },
            Expr::Binary { op, lhs, rhs } => {
                let l = self.infer(lhs);
                let r = self.infer(rhs);
                match op {
                    BinOp::Add | BinOp::Sub => self.combine_additive(expr, l, r),
                    BinOp::Mul => match (l, r) {
                        (Inferred::Known(l), Inferred::Known(r)) => self.known(expr, l.mul(&r)),
                        (Inferred::Known(unit), Inferred::Literal(_))
                        | (Inferred::Literal(_), Inferred::Known(unit)) => Inferred::Known(unit),
                        (Inferred::Literal(l), Inferred::Literal(r)) => Inferred::Literal(l * r),
                        _ => Inferred::Free,
                    },
                    BinOp::Div => match (l, r) {
                        (Inferred::Known(l), Inferred::Known(r)) => self.known(expr, l.div(&r)),
                        (Inferred::Known(unit), Inferred::Literal(_)) => Inferred::Known(unit),
                        (Inferred::Literal(_), Inferred::Known(unit)) => {
                            self.known(expr, Unit::dimensionless().div(&unit))
                        }
                        (Inferred::Literal(l), Inferred::Literal(r)) => Inferred::Literal(l / r),
                        _ => Inferred::Free,
                    },
                    BinOp::Pow => self.infer_power(expr, l, rhs),
                }
            }
            Expr::Call { name, args } => self.infer_call(expr, name, args),
            Expr::Compare { lhs, rhs } => {
                let l = self.infer(lhs);
                let r = self.infer(rhs);
                self.combine_additive(expr, l, r)
            }
        }
    }

    fn infer_power(&mut self, expr: &Expr, base: Inferred, exponent: &Expr) -> Inferred {
        match base {
            Inferred::Known(unit) if !unit.is_dimensionless() => match integer_literal(exponent) {
                Some(n) => self.known(expr, unit.powi(n)),
                None => {
                    self.warn(expr, UnitError::NonIntegerPower(unit.name().to_string()));
                    Inferred::Free
                }
            },
            Inferred::Known(unit) => Inferred::Known(unit),
            _ => Inferred::Free,
        }
    }

    fn infer_call(&mut self, expr: &Expr, name: &str, args: &[Expr]) -> Inferred {
        let inferred: Vec<Inferred> = args.iter().map(|arg| self.infer(arg)).collect();

        if let Some(declared) = self.lookup.function_unit(name) {
            return match declared {
                Ok(unit) => Inferred::Known(unit),
                Err(error) => {
                    self.warn(expr, error);
                    Inferred::Free
                }
            };
        }

        let Some(builtin) = Builtin::lookup(name) else {
            return Inferred::Free;
        };
        let Some(first) = inferred.first() else {
            return Inferred::Free;
        };
        match builtin.unit_rule() {
            UnitRule::Dimensionless => {
                for arg in &inferred {
                    if let Some(unit) = arg.unit().filter(|unit| !unit.is_dimensionless()) {
                        let error = Unit::dimensionless()
                            .checked_add(unit)
                            .err()
                            .unwrap_or_else(|| UnitError::UndefinedUnit(unit.name().to_string()));
                        self.warn(expr, error);
                    }
                }
                Inferred::Known(Unit::dimensionless())
            }
            UnitRule::SameAsArgument => {
                let mut result = first.clone();
                for arg in inferred.iter().skip(1) {
                    result = self.combine_additive(expr, result, arg.clone());
                }
                result
            }
            UnitRule::SquareRoot => match first {
                Inferred::Known(unit) => match unit.sqrt() {
                    Ok(unit) => Inferred::Known(unit),
                    Err(error) => {
                        self.warn(expr, error);
                        Inferred::Free
                    }
                },
                other => other.clone(),
            },
            UnitRule::Power => match args.get(1) {
                Some(exponent) => self.infer_power(expr, first.clone(), exponent),
                None => Inferred::Free,
            },
        }
    }
}

pub fn validate_units(tree: &Expr, lookup: &dyn UnitLookup) -> Vec<String> {
    UnitValidator::new(lookup).validate(tree)
}
