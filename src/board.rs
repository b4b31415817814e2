//! # Board Geometry
//!
//! `BoardState` is the grid a Quintro game is played on. Cells are only ever
//! filled, never cleared, and the order in which they were filled is kept: the
//! session derives whose turn it is from that history.

use crate::color::Color;
use crate::error::BoardError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A board coordinate as `(column, row)`, both 0-indexed.
///
/// Serializes as the two-element array `[col, row]`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct Position(pub usize, pub usize);

impl Position {
    pub fn new(col: usize, row: usize) -> Self {
        Position(col, row)
    }

    pub fn col(self) -> usize {
        self.0
    }

    pub fn row(self) -> usize {
        self.1
    }

    /// The position `steps` steps away along `(d_col, d_row)`, if it does not
    /// underflow. Upper bounds are the board's business.
    pub fn step(self, d_col: isize, d_row: isize, steps: isize) -> Option<Position> {
        let col = self.0 as isize + d_col * steps;
        let row = self.1 as isize + d_row * steps;
        if col < 0 || row < 0 {
            return None;
        }
        Some(Position(col as usize, row as usize))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.0, self.1)
    }
}

impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(|s| s.trim()).collect();
        if parts.len() != 2 {
            return Err("Expected format: col,row".to_string());
        }
        let col = parts[0].parse::<usize>().map_err(|e| e.to_string())?;
        let row = parts[1].parse::<usize>().map_err(|e| e.to_string())?;
        Ok(Position(col, row))
    }
}

/// A position together with whatever marble occupies it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Cell {
    pub position: Position,
    pub color: Option<Color>,
}

impl Cell {
    pub fn new(position: Position, color: Option<Color>) -> Self {
        Cell { position, color }
    }

    pub fn is_filled(&self) -> bool {
        self.color.is_some()
    }
}

/// Allowed board dimensions, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardLimits {
    pub min_size: usize,
    pub max_size: usize,
}

impl Default for BoardLimits {
    fn default() -> Self {
        BoardLimits {
            min_size: 5,
            max_size: 30,
        }
    }
}

impl BoardLimits {
    pub fn allows(&self, width: usize, height: usize) -> bool {
        let range = self.min_size..=self.max_size;
        width > 0 && height > 0 && range.contains(&width) && range.contains(&height)
    }
}

/// The grid plus the move-ordered list of filled cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardState {
    width: usize,
    height: usize,
    grid: Vec<Option<Color>>,
    moves: Vec<Position>,
}

impl BoardState {
    /// Creates an empty board, rejecting dimensions outside `limits`.
    pub fn new(width: usize, height: usize, limits: &BoardLimits) -> Result<Self, BoardError> {
        if !limits.allows(width, height) {
            return Err(BoardError::InvalidDimensions {
                width,
                height,
                min: limits.min_size,
                max: limits.max_size,
            });
        }
        Ok(BoardState {
            width,
            height,
            grid: vec![None; width * height],
            moves: Vec::new(),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn contains(&self, position: Position) -> bool {
        position.0 < self.width && position.1 < self.height
    }

    fn index(&self, position: Position) -> Result<usize, BoardError> {
        if !self.contains(position) {
            return Err(BoardError::OutOfBounds {
                position,
                width: self.width,
                height: self.height,
            });
        }
        Ok(position.1 * self.width + position.0)
    }

    pub fn get_cell(&self, position: Position) -> Result<Cell, BoardError> {
        let idx = self.index(position)?;
        Ok(Cell::new(position, self.grid[idx]))
    }

    /// Marble color at `position`; `None` for empty or off-board positions.
    pub fn color_at(&self, position: Position) -> Option<Color> {
        self.index(position).ok().and_then(|idx| self.grid[idx])
    }

    pub fn cell_is_filled(&self, position: Position) -> bool {
        self.color_at(position).is_some()
    }

    /// Places a marble, appending it to the move history.
    pub fn fill_cell(&mut self, position: Position, color: Color) -> Result<Cell, BoardError> {
        let idx = self.index(position)?;
        if self.grid[idx].is_some() {
            return Err(BoardError::CellOccupied(position));
        }
        self.grid[idx] = Some(color);
        self.moves.push(position);
        Ok(Cell::new(position, Some(color)))
    }

    /// Filled cells in the order they were played.
    pub fn filled_cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.moves
            .iter()
            .map(move |&p| Cell::new(p, self.color_at(p)))
    }

    pub fn last_filled(&self) -> Option<Cell> {
        self.moves
            .last()
            .map(|&p| Cell::new(p, self.color_at(p)))
    }

    pub fn move_count(&self) -> usize {
        self.moves.len()
    }

    pub fn is_full(&self) -> bool {
        self.moves.len() == self.grid.len()
    }

    /// Every cell on the board, row by row.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.height).flat_map(move |row| {
            (0..self.width).map(move |col| {
                let p = Position(col, row);
                Cell::new(p, self.grid[row * self.width + col])
            })
        })
    }
}

impl fmt::Display for BoardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.height {
            let line: String = (0..self.width)
                .map(|col| {
                    self.grid[row * self.width + col]
                        .map(Color::symbol)
                        .unwrap_or('.')
                })
                .collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(width: usize, height: usize) -> BoardState {
        BoardState::new(width, height, &BoardLimits::default()).unwrap()
    }

    #[test]
    fn test_rejects_dimensions_outside_limits() {
        let limits = BoardLimits::default();
        assert!(matches!(
            BoardState::new(0, 10, &limits),
            Err(BoardError::InvalidDimensions { .. })
        ));
        assert!(BoardState::new(10, 31, &limits).is_err());
        assert!(BoardState::new(4, 10, &limits).is_err());
        assert!(BoardState::new(5, 30, &limits).is_ok());
    }

    #[test]
    fn test_fill_then_get() {
        let mut b = board(10, 8);
        let p = Position::new(9, 7);
        b.fill_cell(p, Color::Green).unwrap();
        assert_eq!(b.get_cell(p).unwrap().color, Some(Color::Green));
        assert!(b.cell_is_filled(p));
        assert!(!b.cell_is_filled(Position::new(0, 0)));
    }

    #[test]
    fn test_fill_occupied_and_out_of_bounds() {
        let mut b = board(10, 10);
        b.fill_cell(Position::new(3, 3), Color::Blue).unwrap();
        assert_eq!(
            b.fill_cell(Position::new(3, 3), Color::Red),
            Err(BoardError::CellOccupied(Position::new(3, 3)))
        );
        assert!(matches!(
            b.fill_cell(Position::new(10, 0), Color::Red),
            Err(BoardError::OutOfBounds { .. })
        ));
        assert!(b.get_cell(Position::new(0, 10)).is_err());
        assert_eq!(b.move_count(), 1);
    }

    #[test]
    fn test_move_order_preserved() {
        let mut b = board(6, 6);
        let order = [(5, 5), (0, 0), (2, 3), (1, 4)];
        for (i, &(c, r)) in order.iter().enumerate() {
            let color = Color::PALETTE[i % 3];
            b.fill_cell(Position::new(c, r), color).unwrap();
        }
        let played: Vec<Position> = b.filled_cells().map(|c| c.position).collect();
        let expected: Vec<Position> = order.iter().map(|&(c, r)| Position::new(c, r)).collect();
        assert_eq!(played, expected);
        assert_eq!(b.last_filled().unwrap().position, Position::new(1, 4));
        assert_eq!(b.last_filled().unwrap().color, Some(Color::Blue));
    }

    #[test]
    fn test_position_parsing_and_display() {
        assert_eq!("3, 4".parse::<Position>(), Ok(Position::new(3, 4)));
        assert!("3".parse::<Position>().is_err());
        assert_eq!(Position::new(2, 7).to_string(), "(2,7)");
        assert_eq!(serde_json::to_string(&Position::new(2, 7)).unwrap(), "[2,7]");
    }

    #[test]
    fn test_display_renders_marbles() {
        let mut b = board(5, 5);
        b.fill_cell(Position::new(0, 0), Color::Blue).unwrap();
        b.fill_cell(Position::new(4, 1), Color::Red).unwrap();
        let text = b.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "B....");
        assert_eq!(lines[1], "....R");
    }
}
