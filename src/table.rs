//! Named-column numeric tables.
//!
//! Catalogs are usually handled as tables of named columns (magnitudes,
//! colors, redshifts). [`Table`] collects such columns and flattens the
//! selected ones into the `(N, D)` matrix the SOM trains on.

use crate::error::{Result, SomError};
use ndarray::{Array1, Array2};

/// A set of equally long, uniquely named `f64` columns.
#[derive(Debug, Clone, Default)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Array1<f64>>,
}

impl Table {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column.
    ///
    /// Fails if `name` is already taken or the column length differs from
    /// the existing columns.
    pub fn push_column(&mut self, name: impl Into<String>, values: Array1<f64>) -> Result<()> {
        let name = name.into();
        if self.names.contains(&name) {
            return Err(SomError::InvalidConfig(format!(
                "Duplicate column name: {}",
                name
            )));
        }
        if let Some(first) = self.columns.first() {
            if values.len() != first.len() {
                return Err(SomError::LengthMismatch {
                    expected: first.len(),
                    found: values.len(),
                });
            }
        }
        self.names.push(name);
        self.columns.push(values);
        Ok(())
    }

    /// Builder form of [`Table::push_column`].
    pub fn with_column(mut self, name: impl Into<String>, values: Array1<f64>) -> Result<Self> {
        self.push_column(name, values)?;
        Ok(self)
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&Array1<f64>> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i])
    }

    /// Number of rows (0 for a table without columns).
    pub fn nrows(&self) -> usize {
        self.columns.first().map_or(0, Array1::len)
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the table has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// All columns as an `(N, D)` matrix, in insertion order.
    pub fn to_array(&self) -> Array2<f64> {
        let mut out = Array2::zeros((self.nrows(), self.ncols()));
        for (mut dst, src) in out.columns_mut().into_iter().zip(&self.columns) {
            dst.assign(src);
        }
        out
    }

    /// The named columns as an `(N, D)` matrix, in the order given.
    pub fn select(&self, names: &[&str]) -> Result<Array2<f64>> {
        let mut out = Array2::zeros((self.nrows(), names.len()));
        for (mut dst, &name) in out.columns_mut().into_iter().zip(names) {
            let src = self.column(name).ok_or_else(|| {
                SomError::InvalidConfig(format!("Unknown column: {}", name))
            })?;
            dst.assign(src);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn colors() -> Table {
        Table::new()
            .with_column("g-r", array![0.1, 0.2, 0.3])
            .unwrap()
            .with_column("r-i", array![1.0, 2.0, 3.0])
            .unwrap()
    }

    #[test]
    fn test_to_array_column_order() {
        let table = colors();
        assert_eq!(table.nrows(), 3);
        assert_eq!(table.ncols(), 2);
        assert_eq!(
            table.to_array(),
            array![[0.1, 1.0], [0.2, 2.0], [0.3, 3.0]]
        );
    }

    #[test]
    fn test_length_mismatch() {
        let mut table = colors();
        assert!(matches!(
            table.push_column("i-z", array![1.0]),
            Err(SomError::LengthMismatch { expected: 3, found: 1 })
        ));
        assert_eq!(table.ncols(), 2);
    }

    #[test]
    fn test_duplicate_name() {
        let mut table = colors();
        assert!(table.push_column("g-r", array![0.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_select() {
        let table = colors();
        assert_eq!(table.column_names(), &["g-r", "r-i"]);
        assert_eq!(
            table.select(&["r-i"]).unwrap(),
            array![[1.0], [2.0], [3.0]]
        );
        assert!(table.select(&["u-g"]).is_err());
    }

    #[test]
    fn test_empty_table() {
        let table = Table::new();
        assert!(table.is_empty());
        assert_eq!(table.to_array().dim(), (0, 0));
    }
}
