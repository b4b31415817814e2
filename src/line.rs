//! # Quintro Values
//!
//! A `Quintro` is a straight run of at least five cells along one of the four
//! board axes whose filled cells all share a single color. Fully filled, it is a
//! winning line; otherwise it is a *potential* quintro that could still become
//! one.

use crate::board::{Cell, Position};
use crate::color::Color;
use serde::Serialize;

/// Minimum number of cells in a quintro.
pub const QUINTRO_LENGTH: usize = 5;

/// The four directions a line can run in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Axis {
    /// Left to right.
    Horizontal,
    /// Top to bottom.
    Vertical,
    /// Top-left to bottom-right.
    Diagonal,
    /// Bottom-left to top-right.
    AntiDiagonal,
}

impl Axis {
    pub const ALL: [Axis; 4] = [
        Axis::Horizontal,
        Axis::Vertical,
        Axis::Diagonal,
        Axis::AntiDiagonal,
    ];

    /// Unit step `(d_col, d_row)`. Cells of a quintro are stored in this order.
    pub fn direction(self) -> (isize, isize) {
        match self {
            Axis::Horizontal => (1, 0),
            Axis::Vertical => (0, 1),
            Axis::Diagonal => (1, 1),
            Axis::AntiDiagonal => (1, -1),
        }
    }
}

/// Positional identity of a quintro.
///
/// Since cells are always stored in axis order, the first position, the axis
/// and the length pin down the exact ordered set of positions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct QuintroKey {
    pub axis: Axis,
    pub start: Position,
    pub len: usize,
}

/// One candidate or completed line.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quintro {
    axis: Axis,
    cells: Vec<Cell>,
    color: Option<Color>,
    number_of_empty_cells: usize,
}

impl Quintro {
    /// Builds a quintro from cells already in axis order.
    pub(crate) fn from_cells(axis: Axis, cells: Vec<Cell>) -> Self {
        debug_assert!(cells.len() >= QUINTRO_LENGTH);
        let color = cells.iter().find_map(|c| c.color);
        debug_assert!(cells
            .iter()
            .all(|c| c.color.is_none() || c.color == color));
        let number_of_empty_cells = cells.iter().filter(|c| !c.is_filled()).count();
        Quintro {
            axis,
            cells,
            color,
            number_of_empty_cells,
        }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The common color of the filled cells, `None` while the line is empty.
    pub fn color(&self) -> Option<Color> {
        self.color
    }

    pub fn number_of_empty_cells(&self) -> usize {
        self.number_of_empty_cells
    }

    /// True for a winning line.
    pub fn is_complete(&self) -> bool {
        self.number_of_empty_cells == 0
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.cells.iter().map(|c| c.position)
    }

    pub fn contains(&self, position: Position) -> bool {
        self.cells.iter().any(|c| c.position == position)
    }

    pub fn key(&self) -> QuintroKey {
        QuintroKey {
            axis: self.axis,
            start: self.cells[0].position,
            len: self.cells.len(),
        }
    }

    /// True when every cell of `self` also lies in `other`.
    pub fn lies_within(&self, other: &Quintro) -> bool {
        self.axis == other.axis && self.positions().all(|p| other.contains(p))
    }
}
