//! The in-memory table every stage reads and rewrites.

use crate::{
    data::{Cell, canonicalize},
    error::{TableError, TableResult},
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    /// Where the table came from (an input path), used for source tagging.
    pub source: Option<String>,
}

impl Table {
    pub fn new(header: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            header,
            rows,
            source: None,
        }
    }

    /// Builds a table whose header may be missing.
    ///
    /// Missing names are synthesized as `col<N>` once the widest row is known,
    /// and short rows are padded with absent cells.
    pub fn from_parts(header: Option<Vec<String>>, mut rows: Vec<Vec<Cell>>) -> Self {
        let row_width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut header = header.unwrap_or_default();
        let width = header.len().max(row_width);
        for idx in header.len()..width {
            header.push(synthesized_name(idx));
        }
        for row in &mut rows {
            row.resize(width, None);
        }
        Self::new(header, rows)
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn width(&self) -> usize {
        self.header.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, index: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().map(move |row| &row[index])
    }

    /// Converts every cell of a column to its canonical form in place.
    pub fn canonicalize_column(&mut self, index: usize) {
        for row in &mut self.rows {
            let cell = row[index].take();
            row[index] = canonicalize(cell);
        }
    }

    /// Replaces the header wholesale, keeping the column count fixed.
    pub fn override_header(&mut self, names: &[String]) -> TableResult<()> {
        if names.len() != self.width() {
            return Err(TableError::Config(format!(
                "header override names {} column(s) but the table has {}",
                names.len(),
                self.width()
            )));
        }
        self.header = names.to_vec();
        Ok(())
    }

    /// Checks that every row is as wide as the header.
    pub fn is_rectangular(&self) -> bool {
        self.rows.iter().all(|row| row.len() == self.header.len())
    }
}

pub fn synthesized_name(index: usize) -> String {
    format!("col{index}")
}
