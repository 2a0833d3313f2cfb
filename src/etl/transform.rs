//! Flattens search results into a table: one row per product, one column
//! per product field or attribute name.

use super::search::SearchResponse;
use std::collections::HashMap;
use std::fmt;

/// Columns every table starts with, in order.
pub const BASE_COLUMNS: [&str; 4] = ["id", "title", "condition", "thumbnail_id"];

/// Flat product table. Missing cells are empty strings.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ProductTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at `row` under the named column.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).map(|cells| cells[index].as_str())
    }
}

/// Builds the table. Attribute columns follow the base columns in the order
/// attribute names are first seen.
pub fn transform(response: &SearchResponse) -> ProductTable {
    let mut columns: Vec<String> = BASE_COLUMNS.iter().map(|c| c.to_string()).collect();
    let mut positions: HashMap<String, usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| (c.clone(), i))
        .collect();
    let mut rows = Vec::with_capacity(response.results.len());

    for product in &response.results {
        let mut row = vec![
            product.id.clone(),
            product.title.clone(),
            product.condition.clone().unwrap_or_default(),
            product.thumbnail_id.clone().unwrap_or_default(),
        ];

        for attribute in &product.attributes {
            let index = *positions.entry(attribute.name.clone()).or_insert_with(|| {
                columns.push(attribute.name.clone());
                columns.len() - 1
            });
            if row.len() <= index {
                row.resize(index + 1, String::new());
            }
            row[index] = attribute.value_name.clone().unwrap_or_default();
        }

        rows.push(row);
    }

    // Earlier rows predate columns introduced by later products
    for row in &mut rows {
        row.resize(columns.len(), String::new());
    }

    ProductTable { columns, rows }
}

impl fmt::Display for ProductTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                self.rows
                    .iter()
                    .map(|row| row[i].chars().count())
                    .chain(std::iter::once(column.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        write_line(f, &self.columns, &widths)?;
        for row in &self.rows {
            write_line(f, row, &widths)?;
        }
        Ok(())
    }
}

fn write_line(f: &mut fmt::Formatter<'_>, cells: &[String], widths: &[usize]) -> fmt::Result {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join("  ");
    writeln!(f, "{}", line.trim_end())
}
