use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => " + ",
            BinOp::Sub => " - ",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Pow => "^",
        }
    }

    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinOp::Add => lhs + rhs,
            BinOp::Sub => lhs - rhs,
            BinOp::Mul => lhs * rhs,
            BinOp::Div => lhs / rhs,
            BinOp::Pow => lhs.powf(rhs),
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinOp::Add | BinOp::Sub => 1,
            BinOp::Mul | BinOp::Div => 2,
            BinOp::Pow => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Name(String),
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    /// `lhs = rhs`; only ever the root of an equation tree.
    Compare {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    pub fn name(name: impl Into<String>) -> Self {
        Expr::Name(name.into())
    }

    pub fn neg(inner: Expr) -> Self {
        Expr::Neg(Box::new(inner))
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            name: name.into(),
            args,
        }
    }

    pub fn compare(lhs: Expr, rhs: Expr) -> Self {
        Expr::Compare {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn is_compare(&self) -> bool {
        matches!(self, Expr::Compare { .. })
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Expr::Name(name) => Some(name),
            _ => None,
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Compare { .. } => 0,
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Neg(_) => 3,
            Expr::Number(value) if value.is_sign_negative() => 3,
            Expr::Number(_) | Expr::Name(_) | Expr::Call { .. } => 5,
        }
    }

    fn fmt_child(&self, f: &mut fmt::Formatter<'_>, parenthesize: bool) -> fmt::Result {
        if parenthesize {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

/// Canonical text form. Parsing the output yields an equal tree, which is what
/// makes it usable as an equation id.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(value) => write!(f, "{value}"),
            Expr::Name(name) => f.write_str(name),
            Expr::Neg(inner) => {
                f.write_str("-")?;
                inner.fmt_child(f, inner.precedence() < 3)
            }
            Expr::Binary { op, lhs, rhs } => {
                let own = op.precedence();
                // Pow is right-associative, everything else left-associative.
                let (left_parens, right_parens) = if *op == BinOp::Pow {
                    (lhs.precedence() <= own, rhs.precedence() < 3)
                } else {
                    (lhs.precedence() < own, rhs.precedence() <= own)
                };
                lhs.fmt_child(f, left_parens)?;
                f.write_str(op.symbol())?;
                rhs.fmt_child(f, right_parens)
            }
            Expr::Call { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            Expr::Compare { lhs, rhs } => write!(f, "{lhs} = {rhs}"),
        }
    }
}

/// `target := value`, a parameter definition line.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: String,
    pub value: Expr,
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} := {}", self.target, self.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Equation(Expr),
    Assignment(Assignment),
    Empty,
}

impl fmt::Display for ParsedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParsedLine::Equation(tree) => write!(f, "{tree}"),
            ParsedLine::Assignment(assignment) => write!(f, "{assignment}"),
            ParsedLine::Empty => Ok(()),
        }
    }
}

/// A definition statement of the namespace script.
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Constant {
        name: String,
        value: Expr,
    },
    Function {
        name: String,
        params: Vec<String>,
        body: Expr,
    },
}

impl Definition {
    pub fn name(&self) -> &str {
        match self {
            Definition::Constant { name, .. } | Definition::Function { name, .. } => name,
        }
    }
}

pub trait Visitor {
    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }

    fn visit_name(&mut self, _name: &str) {}

    fn visit_call(&mut self, _name: &str, args: &[Expr]) {
        for arg in args {
            self.visit_expr(arg);
        }
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(visitor: &mut V, expr: &Expr) {
    match expr {
        Expr::Number(_) => {}
        Expr::Name(name) => visitor.visit_name(name),
        Expr::Neg(inner) => visitor.visit_expr(inner),
        Expr::Binary { lhs, rhs, .. } | Expr::Compare { lhs, rhs } => {
            visitor.visit_expr(lhs);
            visitor.visit_expr(rhs);
        }
        Expr::Call { name, args } => visitor.visit_call(name, args),
    }
}

/// Tree rewriting by value; the default rebuilds every node unchanged.
pub trait Folder {
    fn fold_expr(&mut self, expr: Expr) -> Expr {
        fold_children(self, expr)
    }
}

pub fn fold_children<F: Folder + ?Sized>(folder: &mut F, expr: Expr) -> Expr {
    match expr {
        Expr::Number(_) | Expr::Name(_) => expr,
        Expr::Neg(inner) => Expr::neg(folder.fold_expr(*inner)),
        Expr::Binary { op, lhs, rhs } => {
            Expr::binary(op, folder.fold_expr(*lhs), folder.fold_expr(*rhs))
        }
        Expr::Call { name, args } => Expr::Call {
            name,
            args: args.into_iter().map(|arg| folder.fold_expr(arg)).collect(),
        },
        Expr::Compare { lhs, rhs } => Expr::compare(folder.fold_expr(*lhs), folder.fold_expr(*rhs)),
    }
}
