use std::fs;
use std::path::{Path, PathBuf};

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use eqsolve::solver::SolverMethod;
use eqsolve::{
    CancellationToken, Document, EquationSystem, NamespaceError, ResultsManager, SolveError, Solver,
    SolverSettings, SystemError, UnitError,
};
use miette::{Diagnostic, Report};
use serde::Deserialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error, Diagnostic)]
enum CliError {
    #[error("failed to read '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("'{path}' is not a valid project file")]
    Project {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid grid '{0}', expected name=v1,v2,...")]
    Grid(String),
    #[error("invalid unit assignment '{0}', expected name=unit")]
    UnitAssignment(String),
    #[error("{0}")]
    Method(String),
    #[error("no input file given")]
    MissingInput,
    #[error(transparent)]
    Namespace(#[from] NamespaceError),
    #[error(transparent)]
    System(#[from] SystemError),
    #[error(transparent)]
    Unit(#[from] UnitError),
    #[error(transparent)]
    Solve(#[from] SolveError),
}

/// On-disk project: namespace script, equation document and optional
/// solver settings.
#[derive(Debug, Default, Deserialize)]
struct Project {
    #[serde(rename = "python_source", default)]
    script_source: String,
    #[serde(default)]
    equation_source: String,
    #[serde(default)]
    settings: Option<ProjectSettings>,
}

#[derive(Debug, Deserialize)]
struct ProjectSettings {
    tolerance: Option<f64>,
    max_iter: Option<usize>,
    method: Option<String>,
}

fn read(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn load_project(path: &Path) -> Result<Project, CliError> {
    let text = read(path)?;
    if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&text).map_err(|source| CliError::Project {
            path: path.to_path_buf(),
            source,
        })
    } else {
        Ok(Project {
            equation_source: text,
            ..Project::default()
        })
    }
}

fn parse_grid(spec: &str) -> Result<(String, Vec<f64>), CliError> {
    let (name, values) = spec.split_once('=').ok_or_else(|| CliError::Grid(spec.to_string()))?;
    let values = values
        .split(',')
        .map(|value| value.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| CliError::Grid(spec.to_string()))?;
    Ok((name.trim().to_string(), values))
}

fn input_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("input")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Project file (.json) or equation document"),
        )
        .arg(
            Arg::new("script")
                .long("script")
                .value_parser(value_parser!(PathBuf))
                .help("Namespace script, overrides the project's"),
        )
        .arg(
            Arg::new("grid")
                .long("grid")
                .action(ArgAction::Append)
                .help("Sweep a variable: name=v1,v2,..."),
        )
        .arg(
            Arg::new("unit")
                .long("unit")
                .action(ArgAction::Append)
                .help("Variable unit: name=unit"),
        )
        .arg(
            Arg::new("cache-capacity")
                .long("cache-capacity")
                .value_parser(value_parser!(usize))
                .help("Remembered edited variables"),
        )
}

fn cli() -> Command {
    Command::new("eqsolve")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Solve systems of algebraic equations")
        .subcommand_required(true)
        .subcommand(
            input_args(Command::new("solve").about("Solve the system and print the results"))
                .arg(
                    Arg::new("tolerance")
                        .long("tolerance")
                        .value_parser(value_parser!(f64)),
                )
                .arg(
                    Arg::new("max-iter")
                        .long("max-iter")
                        .value_parser(value_parser!(usize)),
                )
                .arg(
                    Arg::new("method")
                        .long("method")
                        .value_parser(|s: &str| s.parse::<SolverMethod>())
                        .help("newton-raphson or least-squares"),
                ),
        )
        .subcommand(input_args(Command::new("check").about("Validate the system")))
        .subcommand(input_args(Command::new("blocks").about("Print the block decomposition")))
}

struct Loaded {
    system: EquationSystem,
    settings: Option<ProjectSettings>,
}

fn load(matches: &ArgMatches) -> Result<Loaded, CliError> {
    let input = matches
        .get_one::<PathBuf>("input")
        .ok_or(CliError::MissingInput)?;
    let mut project = load_project(input)?;
    if let Some(script) = matches.get_one::<PathBuf>("script") {
        project.script_source = read(script)?;
    }

    let mut system = match matches.get_one::<usize>("cache-capacity") {
        Some(capacity) => EquationSystem::with_cache_capacity(*capacity),
        None => EquationSystem::new(),
    };
    system.compile_namespace(&project.script_source)?;

    let mut document = Document::new();
    for diagnostic in document.sync(&project.equation_source, &mut system)? {
        eprintln!("{:?}", Report::new(diagnostic));
    }

    for spec in matches.get_many::<String>("unit").into_iter().flatten() {
        let (name, unit) = spec
            .split_once('=')
            .ok_or_else(|| CliError::UnitAssignment(spec.clone()))?;
        system.set_variable_unit(name.trim(), unit)?;
    }
    for spec in matches.get_many::<String>("grid").into_iter().flatten() {
        let (name, values) = parse_grid(spec)?;
        system.assign_grid(&name, values)?;
    }

    Ok(Loaded {
        system,
        settings: project.settings,
    })
}

fn solver_settings(matches: &ArgMatches, project: Option<ProjectSettings>) -> Result<SolverSettings, CliError> {
    let mut settings = SolverSettings::default();
    if let Some(project) = project {
        settings.tolerance = project.tolerance.unwrap_or(settings.tolerance);
        settings.max_iter = project.max_iter.unwrap_or(settings.max_iter);
        if let Some(method) = project.method {
            settings.method = method.parse().map_err(CliError::Method)?;
        }
    }
    if let Some(tolerance) = matches.get_one::<f64>("tolerance") {
        settings.tolerance = *tolerance;
    }
    if let Some(max_iter) = matches.get_one::<usize>("max-iter") {
        settings.max_iter = *max_iter;
    }
    if let Some(method) = matches.get_one::<SolverMethod>("method") {
        settings.method = *method;
    }
    Ok(settings)
}

fn print_blocks(system: &EquationSystem) {
    for (i, block) in system.blocking().iter().enumerate() {
        println!("Block {} [{}]", i + 1, block.matched.join(", "));
        for equation in &block.equations {
            println!("  {equation}");
        }
    }
}

fn check(system: &EquationSystem) -> bool {
    let report = system.validate_equation_system();
    for (i, block) in report.blocks.iter().enumerate() {
        println!(
            "Block {}: {} ({} equations, unknowns: {})",
            i + 1,
            block.status,
            block.equations.len(),
            block.unknowns.join(", ")
        );
    }
    for message in report.messages() {
        println!("warning: {message}");
    }
    println!("{}", if report.valid { "System is valid" } else { "System is not valid" });
    report.valid
}

fn solve(system: &EquationSystem, settings: SolverSettings) -> Result<(), CliError> {
    let mut solver = Solver::new(settings);
    solver.subscribe(|event| tracing::info!(?event, "solver event"));
    let mut results = ResultsManager::new();
    let cancel = CancellationToken::new();

    let outcome = solver.solve(system, &mut results, &cancel);
    if let Some(entry) = results.names().last().and_then(|name| results.entry(name)) {
        println!("{}", entry.variable_names().join("\t"));
        for row in entry.rows() {
            let cells: Vec<String> = row.iter().map(|value| format!("{value:.10}")).collect();
            println!("{}", cells.join("\t"));
        }
    }
    outcome.map(|_| ()).map_err(CliError::from)
}

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    match matches.subcommand() {
        Some(("solve", sub_matches)) => {
            let loaded = load(sub_matches)?;
            let settings = solver_settings(sub_matches, loaded.settings)?;
            solve(&loaded.system, settings)?;
        }
        Some(("check", sub_matches)) => {
            let loaded = load(sub_matches)?;
            if !check(&loaded.system) {
                std::process::exit(2);
            }
        }
        Some(("blocks", sub_matches)) => {
            let loaded = load(sub_matches)?;
            print_blocks(&loaded.system);
        }
        _ => unreachable!("subcommand_required is set"),
    }
    Ok(())
}
