use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
#[error("Parse error on line {line}: {message}")]
#[diagnostic(code(eqsolve::parse))]
pub struct ParseError {
    pub line: usize,
    pub message: String,
    #[source_code]
    pub source_line: String,
    #[label("here")]
    pub span: SourceSpan,
}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>, source_line: &str, span: (usize, usize)) -> Self {
        Self {
            line,
            message: message.into(),
            source_line: source_line.to_string(),
            span: span.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitError {
    #[error("undefined unit '{0}'")]
    UndefinedUnit(String),
    #[error("Cannot convert from '{from}' ({from_dims}) to '{to}' ({to_dims})")]
    Dimensionality {
        from: String,
        from_dims: String,
        to: String,
        to_dims: String,
    },
    #[error("cannot take a non-integer power of '{0}'")]
    NonIntegerPower(String),
    #[error("dimension exponent out of range in '{0}'")]
    ExponentOverflow(String),
    #[error("invalid unit expression '{text}': {message}")]
    Syntax { text: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("name '{0}' is not defined")]
    UnknownName(String),
    #[error("function '{0}' is not defined")]
    UnknownFunction(String),
    #[error("function '{name}' takes {expected} argument(s) but {found} were given")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("maximum call depth exceeded in '{0}'")]
    RecursionLimit(String),
    #[error("a comparison has no numeric value")]
    Comparison,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NamespaceError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("script line {line}: {source}")]
    Eval {
        line: usize,
        #[source]
        source: EvalError,
    },
    #[error("script line {line}: unit annotation is not followed by a definition")]
    DanglingAnnotation { line: usize },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SystemError {
    #[error("equation '{0}' is already registered")]
    DuplicateEquation(String),
    #[error("equation '{0}' is not registered")]
    UnknownEquation(String),
    #[error("'{0}' is not an equation")]
    NotAnEquation(String),
    #[error("variable '{0}' does not exist")]
    UnknownVariable(String),
    #[error("parameter '{0}' does not exist")]
    UnknownParameter(String),
    #[error("function '{0}' does not exist")]
    UnknownFunction(String),
    #[error("grid variable '{0}' collides with a parameter")]
    GridParameterCollision(String),
    #[error("'{0}' is not a grid variable")]
    UnknownGridVariable(String),
    #[error("invalid bounds for '{name}': lower bound {lower} exceeds upper bound {upper}")]
    InvalidBounds { name: String, lower: f64, upper: f64 },
    #[error("invalid {attribute} for '{name}': {value}")]
    InvalidAttribute {
        name: String,
        attribute: &'static str,
        value: f64,
    },
    #[error(transparent)]
    Unit(#[from] UnitError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResultsError {
    #[error("no entry named '{0}'")]
    UnknownEntry(String),
    #[error("entry '{0}' already exists")]
    DuplicateEntry(String),
    #[error("'{0}' is not a column of this entry")]
    UnknownVariable(String),
    #[error("row is incomplete, missing: {}", .0.join(", "))]
    IncompleteRow(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("equation system is not valid: {}", .0.join("; "))]
    InvalidSystem(Vec<String>),
    #[error("the equation system changed after the solve plan was built")]
    StalePlan,
    #[error("did not converge after {iterations} iterations (residual norm {residual_norm:e})")]
    NotConverged { iterations: usize, residual_norm: f64 },
    #[error("equations without unknowns do not hold (residual norm {residual_norm:e})")]
    Inconsistent { residual_norm: f64 },
    #[error("singular Jacobian: {0}")]
    SingularJacobian(String),
    #[error("residual is not finite")]
    NonFiniteResidual,
    #[error("solve cancelled")]
    Cancelled,
    #[error("parameters form a cycle through '{0}'")]
    ParameterCycle(String),
    #[error("parameter '{name}': {source}")]
    Parameter {
        name: String,
        #[source]
        source: EvalError,
    },
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Results(#[from] ResultsError),
    #[error("run {run}, block {block}: {source}")]
    InBlock {
        run: usize,
        block: usize,
        #[source]
        source: Box<SolveError>,
    },
    #[error("solver thread panicked")]
    WorkerPanicked,
}

impl SolveError {
    pub fn in_block(self, run: usize, block: usize) -> Self {
        Self::InBlock {
            run,
            block,
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping run/block context.
    pub fn root(&self) -> &SolveError {
        match self {
            Self::InBlock { source, .. } => source.root(),
            other => other,
        }
    }
}
