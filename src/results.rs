use indexmap::IndexMap;

use crate::errors::ResultsError;

/// One table of solve results: a column per variable, a row per committed
/// run. Values are staged into a pending row and become visible on commit.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsEntry {
    variable_names: Vec<String>,
    data: Vec<f64>,
    rows: usize,
    pending: Vec<Option<f64>>,
}

impl ResultsEntry {
    pub fn new(variable_names: Vec<String>) -> Self {
        let pending = vec![None; variable_names.len()];
        Self {
            variable_names,
            data: Vec::new(),
            rows: 0,
            pending,
        }
    }

    pub fn variable_names(&self) -> &[String] {
        &self.variable_names
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.variable_names.len()
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        let width = self.column_count();
        (index < self.rows).then(|| &self.data[index * width..(index + 1) * width])
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        (0..self.rows).filter_map(|index| self.row(index))
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let column = self.column_index(name)?;
        Some(self.rows().map(|row| row[column]).collect())
    }

    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        let column = self.column_index(name)?;
        self.row(row).map(|row| row[column])
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.variable_names.iter().position(|n| n == name)
    }

    pub fn stage(&mut self, name: &str, value: f64) -> Result<(), ResultsError> {
        let column = self
            .column_index(name)
            .ok_or_else(|| ResultsError::UnknownVariable(name.to_string()))?;
        self.pending[column] = Some(value);
        Ok(())
    }

    pub fn has_pending(&self) -> bool {
        self.pending.iter().any(Option::is_some)
    }

    /// Appends the pending row. Fails, keeping the staged values, unless
    /// every column has been staged.
    pub fn commit(&mut self) -> Result<usize, ResultsError> {
        let missing: Vec<String> = self
            .variable_names
            .iter()
            .zip(&self.pending)
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(ResultsError::IncompleteRow(missing));
        }
        self.data.extend(self.pending.iter().flatten());
        self.rows += 1;
        self.discard();
        Ok(self.rows - 1)
    }

    pub fn discard(&mut self) {
        self.pending.iter_mut().for_each(|value| *value = None);
    }
}

/// Named results entries, "Entry 1", "Entry 2", ... by default.
#[derive(Debug, Clone, Default)]
pub struct ResultsManager {
    entries: IndexMap<String, ResultsEntry>,
    created: usize,
}

impl ResultsManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_name(&mut self) -> String {
        loop {
            self.created += 1;
            let name = format!("Entry {}", self.created);
            if !self.entries.contains_key(&name) {
                return name;
            }
        }
    }

    pub fn create_entry(&mut self, variable_names: Vec<String>) -> String {
        self.insert_entry(ResultsEntry::new(variable_names))
    }

    /// Adds a finished entry, e.g. one returned by a background job.
    pub fn insert_entry(&mut self, entry: ResultsEntry) -> String {
        let name = self.next_name();
        self.entries.insert(name.clone(), entry);
        name
    }

    pub fn entry(&self, name: &str) -> Option<&ResultsEntry> {
        self.entries.get(name)
    }

    pub fn entry_mut(&mut self, name: &str) -> Option<&mut ResultsEntry> {
        self.entries.get_mut(name)
    }

    pub fn delete_entry(&mut self, name: &str) -> Result<ResultsEntry, ResultsError> {
        self.entries
            .shift_remove(name)
            .ok_or_else(|| ResultsError::UnknownEntry(name.to_string()))
    }

    pub fn rename_entry(&mut self, from: &str, to: &str) -> Result<(), ResultsError> {
        if from == to {
            return if self.entries.contains_key(from) {
                Ok(())
            } else {
                Err(ResultsError::UnknownEntry(from.to_string()))
            };
        }
        if self.entries.contains_key(to) {
            return Err(ResultsError::DuplicateEntry(to.to_string()));
        }
        let index = self
            .entries
            .get_index_of(from)
            .ok_or_else(|| ResultsError::UnknownEntry(from.to_string()))?;
        let (_, entry) = self
            .entries
            .shift_remove_index(index)
            .ok_or_else(|| ResultsError::UnknownEntry(from.to_string()))?;
        self.entries.shift_insert(index, to.to_string(), entry);
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
