use indexmap::IndexMap;

/// Variables swept over value lists. Each point of the cartesian product is
/// one solve run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    variables: IndexMap<String, Vec<f64>>,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any previous values for `name`.
    pub fn assign(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.variables.insert(name.into(), values);
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<f64>> {
        self.variables.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn values(&self, name: &str) -> Option<&[f64]> {
        self.variables.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn run_count(&self) -> usize {
        self.variables.values().map(Vec::len).product()
    }

    /// Cartesian product in assignment order, last variable varying fastest.
    /// An empty grid has exactly one (empty) point.
    pub fn get_grid(&self) -> Vec<IndexMap<String, f64>> {
        let mut points = vec![IndexMap::new()];
        for (name, values) in &self.variables {
            points = points
                .into_iter()
                .flat_map(|point| {
                    values.iter().map(move |value| {
                        let mut point = point.clone();
                        point.insert(name.clone(), *value);
                        point
                    })
                })
                .collect();
        }
        points
    }
}
