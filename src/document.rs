use indexmap::IndexMap;

use crate::ast::ParsedLine;
use crate::errors::{ParseError, SystemError};
use crate::objects::Factory;
use crate::parser::parse_line;
use crate::refcount::{RefCounter, Transition};
use crate::system::EquationSystem;

/// Keeps a system in step with the text of an equation document.
///
/// Lines are keyed by their canonical form, so reformatting a line or
/// moving it around does not touch the system. Identical lines are
/// reference counted and registered once.
#[derive(Debug, Default)]
pub struct Document {
    lines: RefCounter<(String, ParsedLine)>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical keys of the lines currently registered.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.lines.names()
    }

    /// Applies the difference between the registered lines and `text`.
    /// Returns diagnostics for lines that do not parse; those lines are
    /// ignored.
    pub fn sync(&mut self, text: &str, system: &mut EquationSystem) -> Result<Vec<ParseError>, SystemError> {
        let mut diagnostics = Vec::new();
        let mut wanted: IndexMap<String, (usize, String, ParsedLine)> = IndexMap::new();

        for (index, line) in text.lines().enumerate() {
            match parse_line(line, index + 1) {
                Ok(ParsedLine::Empty) => {}
                Ok(parsed) => {
                    let key = parsed.to_string();
                    wanted
                        .entry(key)
                        .and_modify(|(count, _, _)| *count += 1)
                        .or_insert_with(|| (1, line.trim().to_string(), parsed));
                }
                Err(error) => diagnostics.push(error),
            }
        }

        let current: Vec<String> = self.lines.names().map(str::to_string).collect();
        for key in current {
            let target = wanted.get(&key).map_or(0, |(count, _, _)| *count);
            for _ in target..self.lines.count(&key) {
                if let Transition::Removed(Some((source, parsed))) = self.lines.delete(&key) {
                    remove_line(system, &key, &source, parsed)?;
                }
            }
        }

        for (key, (count, source, parsed)) in wanted {
            for _ in self.lines.count(&key)..count {
                if let Transition::Added = self.lines.insert(&key, Some((source.clone(), parsed.clone()))) {
                    add_line(system, &source, parsed.clone())?;
                }
            }
        }

        if !diagnostics.is_empty() {
            tracing::debug!(count = diagnostics.len(), "document has parse errors");
        }
        Ok(diagnostics)
    }
}

fn add_line(system: &mut EquationSystem, source: &str, parsed: ParsedLine) -> Result<(), SystemError> {
    match parsed {
        ParsedLine::Equation(tree) => {
            let equation = Factory::create_equation(source, tree)?;
            system.insert_equation(equation, Vec::new())
        }
        ParsedLine::Assignment(assignment) => {
            system.insert_parameter(Factory::create_parameter(source, assignment));
            Ok(())
        }
        ParsedLine::Empty => Ok(()),
    }
}

fn remove_line(system: &mut EquationSystem, key: &str, source: &str, parsed: ParsedLine) -> Result<(), SystemError> {
    match parsed {
        ParsedLine::Equation(_) => system.delete_equation(key).map(|_| ()),
        ParsedLine::Assignment(assignment) => system.retract_parameter(&assignment.target, source).map(|_| ()),
        ParsedLine::Empty => Ok(()),
    }
}
