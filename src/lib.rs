pub mod ast;
pub mod blocking;
pub mod builtins;
pub mod cache;
pub mod document;
pub mod errors;
pub mod eval;
pub mod events;
pub mod grid;
pub mod names;
pub mod namespace;
pub mod objects;
pub mod parser;
pub mod refcount;
pub mod residual;
pub mod results;
pub mod solver;
pub mod system;
pub mod units;
pub mod validate;

pub use document::Document;
pub use errors::{EvalError, NamespaceError, ParseError, ResultsError, SolveError, SystemError, UnitError};
pub use events::{Event, EventBus};
pub use objects::{Equation, Factory, Function, Parameter, Variable, VariableAttribute};
pub use results::{ResultsEntry, ResultsManager};
pub use solver::{CancellationToken, SolveJob, SolvePlan, Solver, SolverMethod, SolverSettings};
pub use system::{BlockStatus, EquationSystem, SystemReport};
