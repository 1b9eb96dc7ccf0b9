//! A single sheet entry.
//!
//! A [`Cell`] holds one of three representations (empty, text, or formula)
//! plus a memoised value slot. The cache uses interior mutability so that
//! reads stay `&self`; a `Cell` is not thread-safe.

use std::cell::RefCell;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FormulaError, ParseFormulaError};
use crate::formula::{Formula, Lookup};
use crate::position::Position;

/// The visible value of a cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Error(FormulaError),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(n) => f.write_str(&format_number(*n)),
            CellValue::Error(e) => write!(f, "{}", e),
        }
    }
}

/// Format a number for display: integral values print without a fractional
/// part, everything else uses the default float formatting.
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[derive(Debug, Default)]
enum Repr {
    #[default]
    Empty,
    Text(String),
    Formula(Formula),
}

/// One entry in the sheet.
#[derive(Debug, Default)]
pub struct Cell {
    repr: Repr,
    cache: RefCell<Option<CellValue>>,
}

impl Cell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reassign the cell's content and drop the cache.
    ///
    /// Empty text makes the cell empty; text starting with `=` (and longer
    /// than the bare sign) is parsed as a formula; anything else is stored
    /// as literal text. A formula that fails to parse leaves the cell
    /// completely unchanged: the new representation is built first and
    /// swapped in only on success.
    pub fn set(&mut self, text: &str) -> Result<(), ParseFormulaError> {
        let repr = if text.is_empty() {
            Repr::Empty
        } else if text.len() > 1 && text.starts_with('=') {
            Repr::Formula(Formula::parse(&text[1..])?)
        } else {
            Repr::Text(text.to_string())
        };
        self.repr = repr;
        self.cache.replace(None);
        Ok(())
    }

    /// Reset to the empty representation, dropping the cache.
    pub fn clear(&mut self) {
        self.repr = Repr::Empty;
        self.cache.replace(None);
    }

    /// The cell's visible value, memoised.
    ///
    /// Empty cells read as `Number(0.0)`. Text cells strip one leading
    /// apostrophe. Formula cells evaluate against `lookup`.
    pub fn value(&self, lookup: &Lookup) -> CellValue {
        if let Some(cached) = self.cache.borrow().as_ref() {
            return cached.clone();
        }
        let value = match &self.repr {
            Repr::Empty => CellValue::Number(0.0),
            Repr::Text(text) => {
                CellValue::Text(text.strip_prefix('\'').unwrap_or(text).to_string())
            }
            Repr::Formula(formula) => match formula.evaluate(lookup) {
                Ok(n) => CellValue::Number(n),
                Err(e) => CellValue::Error(e),
            },
        };
        self.cache.replace(Some(value.clone()));
        value
    }

    /// The cell's text as entered, except that formulas reprint in
    /// canonical form.
    pub fn text(&self) -> String {
        match &self.repr {
            Repr::Empty => String::new(),
            Repr::Text(text) => text.clone(),
            Repr::Formula(formula) => format!("={}", formula.expression()),
        }
    }

    /// Positions this cell's formula references; empty for non-formulas.
    pub fn referenced_cells(&self) -> &[Position] {
        match &self.repr {
            Repr::Formula(formula) => formula.referenced_cells(),
            Repr::Empty | Repr::Text(_) => &[],
        }
    }

    /// Drop the memoised value, keeping the representation.
    pub fn clear_cache(&self) {
        self.cache.replace(None);
    }

    pub fn has_cache(&self) -> bool {
        self.cache.borrow().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_lookup(_: Position) -> Result<f64, FormulaError> {
        Ok(0.0)
    }

    #[test]
    fn test_empty_cell() {
        let cell = Cell::new();
        assert_eq!(cell.value(&zero_lookup), CellValue::Number(0.0));
        assert_eq!(cell.text(), "");
        assert!(cell.referenced_cells().is_empty());
    }

    #[test]
    fn test_text_cell() {
        let mut cell = Cell::new();
        cell.set("meow").unwrap();
        assert_eq!(cell.text(), "meow");
        assert_eq!(cell.value(&zero_lookup), CellValue::Text("meow".into()));
    }

    #[test]
    fn test_text_cell_strips_leading_apostrophe() {
        let mut cell = Cell::new();
        cell.set("'=escaped").unwrap();
        assert_eq!(cell.text(), "'=escaped");
        assert_eq!(cell.value(&zero_lookup), CellValue::Text("=escaped".into()));
    }

    #[test]
    fn test_bare_equals_is_text() {
        let mut cell = Cell::new();
        cell.set("=").unwrap();
        assert_eq!(cell.text(), "=");
        assert_eq!(cell.value(&zero_lookup), CellValue::Text("=".into()));
    }

    #[test]
    fn test_formula_cell() {
        let mut cell = Cell::new();
        cell.set("=1+2").unwrap();
        assert_eq!(cell.text(), "=1+2");
        assert_eq!(cell.value(&zero_lookup), CellValue::Number(3.0));
    }

    #[test]
    fn test_formula_references() {
        let mut cell = Cell::new();
        cell.set("=B2+A1+B2").unwrap();
        assert_eq!(
            cell.referenced_cells(),
            [Position::from_a1("A1"), Position::from_a1("B2")]
        );
    }

    #[test]
    fn test_set_failure_leaves_cell_unchanged() {
        let mut cell = Cell::new();
        cell.set("stable").unwrap();
        cell.value(&zero_lookup);
        assert!(cell.has_cache());

        assert!(cell.set("=((1)").is_err());
        assert_eq!(cell.text(), "stable");
        assert!(cell.has_cache());
    }

    #[test]
    fn test_cache_lifecycle() {
        let mut cell = Cell::new();
        cell.set("=2*3").unwrap();
        assert!(!cell.has_cache());

        assert_eq!(cell.value(&zero_lookup), CellValue::Number(6.0));
        assert!(cell.has_cache());

        cell.clear_cache();
        assert!(!cell.has_cache());
        assert_eq!(cell.value(&zero_lookup), CellValue::Number(6.0));

        cell.clear();
        assert!(!cell.has_cache());
        assert_eq!(cell.value(&zero_lookup), CellValue::Number(0.0));
    }

    #[test]
    fn test_set_clears_cache() {
        let mut cell = Cell::new();
        cell.set("5").unwrap();
        cell.value(&zero_lookup);
        assert!(cell.has_cache());

        cell.set("6").unwrap();
        assert!(!cell.has_cache());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-14.0), "-14");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(1.25), "1.25");
    }
}
