use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Ordered set of names with dense indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Alphabet {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Alphabet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self { names, index }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn id(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn name(&self, id: usize) -> &str {
        &self.names[id]
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl From<Vec<String>> for Alphabet {
    fn from(names: Vec<String>) -> Self {
        Alphabet::new(names)
    }
}

impl From<Alphabet> for Vec<String> {
    fn from(alphabet: Alphabet) -> Self {
        alphabet.names
    }
}

/// Dense row-major table indexed by alphabet ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            Some(self.data[row * self.cols + col])
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, row: usize, col: usize) -> Option<&mut f64> {
        if row < self.rows && col < self.cols {
            Some(&mut self.data[row * self.cols + col])
        } else {
            None
        }
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        if let Some(cell) = self.get_mut(row, col) {
            *cell = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphabet_ids() {
        let alphabet = Alphabet::new(["s1", "s2"]);
        assert_eq!(alphabet.id("s2"), Some(1));
        assert_eq!(alphabet.id("b"), None);
        assert_eq!(alphabet.name(0), "s1");
        assert_eq!(alphabet.len(), 2);
    }

    #[test]
    fn test_matrix_bounds() {
        let mut m = Matrix::filled(2, 3, 0.5);
        m.set(1, 2, 4.0);
        assert_eq!(m.get(1, 2), Some(4.0));
        assert_eq!(m.get(0, 0), Some(0.5));
        assert_eq!(m.get(2, 0), None);
    }
}
