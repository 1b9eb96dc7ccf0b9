//! The sheet: sparse cell store plus the dependency graph.
//!
//! `Sheet` owns every [`Cell`] and the [`DepGraph`] that ties them
//! together, and enforces the three cross-cutting invariants:
//!
//! 1. **Graph consistency:** the graph's forward edges at a position are
//!    exactly that cell's referenced positions.
//! 2. **Cycle freedom:** a write that would close a cycle is rejected
//!    before anything mutates.
//! 3. **Cache coherence:** whenever a cell changes, every transitive
//!    dependent's memoised value is dropped.
//!
//! All fallible work in a write happens on a temporary; the commit steps
//! cannot fail, so a returned error means the sheet is untouched.

use std::fmt;

use log::{debug, trace};
use rustc_hash::FxHashMap;

use crate::cell::{Cell, CellValue};
use crate::dep_graph::{DepGraph, Direction, Edge};
use crate::error::{FormulaError, SheetError};
use crate::position::{Position, Size};

/// A sparse two-dimensional grid of cells.
#[derive(Debug, Default)]
pub struct Sheet {
    /// Row index → column index → cell.
    cells: FxHashMap<i32, FxHashMap<i32, Cell>>,
    size: Size,
    graph: DepGraph,
}

impl Sheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `text` into the cell at `pos`, creating it if needed.
    ///
    /// Formulas are parsed and their references recorded in the dependency
    /// graph; referenced positions that have no cell yet get an empty one.
    /// Writing the text a cell already shows is a no-op that preserves
    /// caches. On any error the sheet is left exactly as it was.
    pub fn set_cell(&mut self, pos: Position, text: &str) -> Result<(), SheetError> {
        Self::validate(pos)?;

        if let Some(cell) = self.cell_at(pos) {
            if cell.text() == text {
                return Ok(());
            }
        }

        // Parse and cycle-probe on temporaries before touching any state.
        let mut incoming = Cell::new();
        incoming.set(text)?;
        let refs: Vec<Position> = incoming.referenced_cells().to_vec();
        if self.graph.creates_cycle(pos, &refs) {
            debug!("set_cell {pos}: rejected, write would close a cycle");
            return Err(SheetError::CircularDependency);
        }

        // Commit. Nothing below can fail.
        self.size.rows = self.size.rows.max(pos.row + 1);
        self.size.cols = self.size.cols.max(pos.col + 1);

        // Dependents are found through the old graph, then the edges at
        // `pos` are rewritten to the new reference set.
        self.invalidate_dependents(pos);
        self.graph.erase_vertex(pos);
        for target in refs {
            if self.cell_at(target).is_none() {
                self.set_cell(target, "")?;
            }
            self.graph.add_edge(Edge::new(pos, target));
        }

        self.cells.entry(pos.row).or_default().insert(pos.col, incoming);
        Ok(())
    }

    /// The cell at `pos`, or `None` if the position is unoccupied.
    pub fn cell(&self, pos: Position) -> Result<Option<&Cell>, SheetError> {
        Self::validate(pos)?;
        Ok(self.cell_at(pos))
    }

    /// Mutable variant of [`Sheet::cell`].
    pub fn cell_mut(&mut self, pos: Position) -> Result<Option<&mut Cell>, SheetError> {
        Self::validate(pos)?;
        Ok(self.cells.get_mut(&pos.row).and_then(|row| row.get_mut(&pos.col)))
    }

    /// The visible value of the cell at `pos`, evaluating (and memoising)
    /// formulas on demand.
    pub fn cell_value(&self, pos: Position) -> Result<Option<CellValue>, SheetError> {
        Self::validate(pos)?;
        Ok(self
            .cell_at(pos)
            .map(|cell| cell.value(&|p| self.numeric_value(p))))
    }

    /// Numeric coercion used when a formula reads a cell.
    ///
    /// Absent and empty cells read as `0.0`; numeric values read as-is;
    /// text must parse as a full `f64` or the read fails with `Value`;
    /// error values propagate; an invalid position fails with `Ref`.
    pub fn numeric_value(&self, pos: Position) -> Result<f64, FormulaError> {
        if !pos.is_valid() {
            return Err(FormulaError::Ref);
        }
        let Some(cell) = self.cell_at(pos) else {
            return Ok(0.0);
        };
        match cell.value(&|p| self.numeric_value(p)) {
            CellValue::Number(n) => Ok(n),
            CellValue::Error(e) => Err(e),
            CellValue::Text(text) => text.parse().map_err(|_| FormulaError::Value),
        }
    }

    /// Remove the cell at `pos`, if any.
    ///
    /// Dependents' caches are invalidated, the cell's outgoing edges are
    /// dropped, and the printable size shrinks when the cell sat on the
    /// current bounding edge. Inbound edges stay: formulas elsewhere still
    /// reference the (now absent) position and read it as zero.
    pub fn clear_cell(&mut self, pos: Position) -> Result<(), SheetError> {
        Self::validate(pos)?;
        if self.cell_at(pos).is_none() {
            return Ok(());
        }

        self.invalidate_dependents(pos);
        if let Some(row) = self.cells.get_mut(&pos.row) {
            row.remove(&pos.col);
            if row.is_empty() {
                self.cells.remove(&pos.row);
            }
        }
        self.graph.erase_vertex(pos);

        if pos.row + 1 == self.size.rows || pos.col + 1 == self.size.cols {
            self.size = self.occupied_bounds();
            trace!("clear_cell {pos}: printable size now {}", self.size);
        }
        Ok(())
    }

    /// The 1-based bounding box of all occupied positions.
    pub fn printable_size(&self) -> Size {
        self.size
    }

    /// True if some formula currently references `pos`.
    pub fn is_referenced(&self, pos: Position) -> Result<bool, SheetError> {
        Self::validate(pos)?;
        Ok(self.graph.has_dependents(pos))
    }

    /// Read-only view of the dependency graph.
    pub fn graph(&self) -> &DepGraph {
        &self.graph
    }

    /// Print cell values: rows newline-terminated, columns tab-separated,
    /// empty cells zero-width. Numbers use default formatting, errors their
    /// `#...!` form, text its visible value (apostrophe already stripped).
    pub fn print_values<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        self.print_with(out, |cell| {
            cell.value(&|p| self.numeric_value(p)).to_string()
        })
    }

    /// Print cell texts: formulas in canonical form, text verbatim.
    pub fn print_texts<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        self.print_with(out, |cell| cell.text())
    }

    fn print_with<W: fmt::Write>(
        &self,
        out: &mut W,
        render: impl Fn(&Cell) -> String,
    ) -> fmt::Result {
        for row in 0..self.size.rows {
            for col in 0..self.size.cols {
                if col > 0 {
                    out.write_char('\t')?;
                }
                if let Some(cell) = self.cell_at(Position::new(row, col)) {
                    out.write_str(&render(cell))?;
                }
            }
            out.write_char('\n')?;
        }
        Ok(())
    }

    fn validate(pos: Position) -> Result<(), SheetError> {
        if pos.is_valid() {
            Ok(())
        } else {
            Err(SheetError::InvalidPosition)
        }
    }

    fn cell_at(&self, pos: Position) -> Option<&Cell> {
        self.cells.get(&pos.row)?.get(&pos.col)
    }

    /// Drop the memoised values of `pos` and every transitive dependent,
    /// walking the backward graph with an explicit stack.
    fn invalidate_dependents(&self, pos: Position) {
        if let Some(cell) = self.cell_at(pos) {
            cell.clear_cache();
        }
        let mut cleared = 0usize;
        self.graph.traverse(pos, Direction::Backward, |edge| {
            if let Some(cell) = self.cell_at(edge.to) {
                cell.clear_cache();
                cleared += 1;
            }
            false
        });
        if cleared > 0 {
            trace!("invalidated {cleared} dependent cache(s) of {pos}");
        }
    }

    /// Scan all occupied positions for the tight bounding box.
    fn occupied_bounds(&self) -> Size {
        let mut size = Size::default();
        for (&row, cols) in &self.cells {
            for &col in cols.keys() {
                size.rows = size.rows.max(row + 1);
                size.cols = size.cols.max(col + 1);
            }
        }
        size
    }
}
