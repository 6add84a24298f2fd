use std::f64::consts;

/// Constants seeded into every namespace.
pub const CONSTANTS: [(&str, f64); 2] = [("pi", consts::PI), ("e", consts::E)];

/// How a builtin maps the unit of its first argument to its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitRule {
    /// Arguments must be dimensionless, result is dimensionless.
    Dimensionless,
    SameAsArgument,
    SquareRoot,
    /// `pow(x, n)` with a literal integer `n`.
    Power,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Ln,
    Log10,
    Sqrt,
    Abs,
    Floor,
    Ceil,
    Atan2,
    Pow,
    Min,
    Max,
}

impl Builtin {
    pub fn lookup(name: &str) -> Option<Self> {
        let builtin = match name {
            "sin" => Builtin::Sin,
            "cos" => Builtin::Cos,
            "tan" => Builtin::Tan,
            "asin" | "arcsin" => Builtin::Asin,
            "acos" | "arccos" => Builtin::Acos,
            "atan" | "arctan" => Builtin::Atan,
            "sinh" => Builtin::Sinh,
            "cosh" => Builtin::Cosh,
            "tanh" => Builtin::Tanh,
            "exp" => Builtin::Exp,
            "ln" | "log" => Builtin::Ln,
            "log10" => Builtin::Log10,
            "sqrt" => Builtin::Sqrt,
            "abs" => Builtin::Abs,
            "floor" => Builtin::Floor,
            "ceil" => Builtin::Ceil,
            "atan2" | "arctan2" => Builtin::Atan2,
            "pow" => Builtin::Pow,
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn arity(self) -> usize {
        match self {
            Builtin::Atan2 | Builtin::Pow | Builtin::Min | Builtin::Max => 2,
            _ => 1,
        }
    }

    pub fn unit_rule(self) -> UnitRule {
        match self {
            Builtin::Sqrt => UnitRule::SquareRoot,
            Builtin::Pow => UnitRule::Power,
            Builtin::Abs | Builtin::Floor | Builtin::Ceil | Builtin::Min | Builtin::Max => {
                UnitRule::SameAsArgument
            }
            _ => UnitRule::Dimensionless,
        }
    }

    /// `args.len()` must equal `arity()`.
    pub fn apply(self, args: &[f64]) -> f64 {
        let x = args[0];
        match self {
            Builtin::Sin => x.sin(),
            Builtin::Cos => x.cos(),
            Builtin::Tan => x.tan(),
            Builtin::Asin => x.asin(),
            Builtin::Acos => x.acos(),
            Builtin::Atan => x.atan(),
            Builtin::Sinh => x.sinh(),
            Builtin::Cosh => x.cosh(),
            Builtin::Tanh => x.tanh(),
            Builtin::Exp => x.exp(),
            Builtin::Ln => x.ln(),
            Builtin::Log10 => x.log10(),
            Builtin::Sqrt => x.sqrt(),
            Builtin::Abs => x.abs(),
            Builtin::Floor => x.floor(),
            Builtin::Ceil => x.ceil(),
            Builtin::Atan2 => x.atan2(args[1]),
            Builtin::Pow => x.powf(args[1]),
            Builtin::Min => x.min(args[1]),
            Builtin::Max => x.max(args[1]),
        }
    }
}
