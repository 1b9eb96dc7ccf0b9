//! Formula parsing and evaluation.
//!
//! A [`Formula`] is an owned expression tree over numbers, cell references,
//! and the four arithmetic operators. Evaluation is pure dependency
//! injection: the caller supplies a lookup closure mapping positions to
//! numbers, so a formula never holds a reference back to the sheet that
//! stores it.

pub(crate) mod ast;
mod parser;

use crate::error::{FormulaError, ParseFormulaError};
use crate::position::Position;

use ast::{Expr, Precedence};

/// Resolves a referenced position to a number during evaluation.
///
/// The contract (implemented by the sheet): absent or empty cells read as
/// `0.0`; numeric cells read as their number; text cells are parsed as a
/// full `f64` or fail with [`FormulaError::Value`]; error cells propagate
/// their error.
pub type Lookup<'a> = dyn Fn(Position) -> Result<f64, FormulaError> + 'a;

/// A parsed arithmetic expression.
#[derive(Clone, Debug)]
pub struct Formula {
    root: Expr,
    cells: Vec<Position>,
}

impl Formula {
    /// Parse an expression (without any leading `=`).
    ///
    /// Fails if the grammar rejects the text, or if a cell token denotes an
    /// out-of-range position.
    pub fn parse(expression: &str) -> Result<Self, ParseFormulaError> {
        let root = parser::parse(expression)?;
        let mut cells = Vec::new();
        root.collect_cells(&mut cells);
        cells.sort();
        cells.dedup();
        Ok(Self { root, cells })
    }

    /// Evaluate against the given lookup. Errors raised by the lookup are
    /// returned as-is; any non-finite intermediate result becomes `Div0`.
    pub fn evaluate(&self, lookup: &Lookup) -> Result<f64, FormulaError> {
        self.root.eval(lookup)
    }

    /// Canonical reprint: no whitespace, minimal parentheses.
    ///
    /// Reprinting is a fixed point: parsing the result and reprinting it
    /// yields the same string.
    pub fn expression(&self) -> String {
        let mut out = String::new();
        self.root.write_canonical(&mut out, Precedence::Atom, false);
        out
    }

    /// Positions referenced by the expression, sorted and deduplicated.
    pub fn referenced_cells(&self) -> &[Position] {
        &self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(s: &str) -> Position {
        Position::from_a1(s)
    }

    fn reformat(input: &str) -> String {
        Formula::parse(input).unwrap().expression()
    }

    #[test]
    fn test_expression_strips_whitespace_and_parens() {
        assert_eq!(reformat("  1  "), "1");
        assert_eq!(reformat("  -1  "), "-1");
        assert_eq!(reformat("2 + 2"), "2+2");
        assert_eq!(reformat("(2*3)+4"), "2*3+4");
        assert_eq!(reformat("(2*3)-4"), "2*3-4");
        assert_eq!(reformat("( ( (  1) ) )"), "1");
    }

    #[test]
    fn test_expression_keeps_required_parens() {
        assert_eq!(reformat("1-(2+3)"), "1-(2+3)");
        assert_eq!(reformat("2*(3+4)"), "2*(3+4)");
        assert_eq!(reformat("1/(2*3)"), "1/(2*3)");
        assert_eq!(reformat("-(1+2)"), "-(1+2)");
        assert_eq!(reformat("-(1*2)"), "-1*2");
    }

    #[test]
    fn test_expression_is_idempotent() {
        for input in ["1+2*3", "(1+2)*3", "-(A1+B2)/C3", "1-(2-3)", "+1"] {
            let once = reformat(input);
            assert_eq!(reformat(&once), once);
        }
    }

    #[test]
    fn test_referenced_cells_sorted_unique() {
        assert!(Formula::parse("1").unwrap().referenced_cells().is_empty());

        let single = Formula::parse("A1").unwrap();
        assert_eq!(single.referenced_cells(), [pos("A1")]);

        let pair = Formula::parse("B2+C3").unwrap();
        assert_eq!(pair.referenced_cells(), [pos("B2"), pos("C3")]);

        let tricky = Formula::parse("A1 + A2 + A1 + A3 + A1 + A2 + A1").unwrap();
        assert_eq!(tricky.expression(), "A1+A2+A1+A3+A1+A2+A1");
        assert_eq!(tricky.referenced_cells(), [pos("A1"), pos("A2"), pos("A3")]);
    }

    #[test]
    fn test_evaluate_with_lookup() {
        let formula = Formula::parse("A1+A2").unwrap();
        let result = formula.evaluate(&|p| {
            if p == pos("A1") {
                Ok(1.0)
            } else {
                Ok(2.0)
            }
        });
        assert_eq!(result, Ok(3.0));
    }

    #[test]
    fn test_evaluate_division_by_zero() {
        let formula = Formula::parse("1/0").unwrap();
        assert_eq!(formula.evaluate(&|_| Ok(0.0)), Err(FormulaError::Div0));

        let overflow = Formula::parse("1e+200/1e-200").unwrap();
        assert_eq!(overflow.evaluate(&|_| Ok(0.0)), Err(FormulaError::Div0));
    }
}
