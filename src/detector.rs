//! # Quintro Detection
//!
//! Line scanning over a `BoardState`. Every scan walks the four axes through a
//! start cell, so finding the lines a single move touches never needs more
//! than four passes over at most `max(width, height)` cells each.
//!
//! ## Potential quintros
//! On one axis, a *window* through a start cell is a contiguous run of cells
//! that contains the start cell and whose filled cells share a single color.
//! A potential quintro is a window of at least five cells that is *maximal*: it
//! cannot be grown on either end without running off the board or into a
//! marble of another color.
//!
//! A filled start cell has at most one maximal window per axis. An empty start
//! cell can have two, when the nearest marbles on either side differ in color:
//!
//! ```text
//!   . R . . S . . B . .      (S empty)
//!   [R . . S . .]            red window
//!       [. . S . . B . .]    blue window
//! ```
//!
//! ## Incremental maintenance
//! `potential_quintro_delta` computes how the set of all potential quintros
//! changes when one marble is placed, looking only at the four lines through
//! the new marble. A window that did not contain the new cell can only
//! appear if it now ends right next to it, so beyond the lines through the new
//! cell only its immediate neighbours along the same axis are rescanned.

use crate::board::{BoardState, Cell, Position};
use crate::color::Color;
use crate::error::BoardError;
use crate::line::{Axis, Quintro, QuintroKey, QUINTRO_LENGTH};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Detection settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Whether a maximal window with no marbles at all counts as a potential
    /// quintro.
    pub include_empty_runs: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            include_empty_runs: true,
        }
    }
}

/// A board, optionally with one extra marble that has not been placed yet.
#[derive(Clone, Copy)]
struct BoardView<'a> {
    board: &'a BoardState,
    overlay: Option<(Position, Color)>,
}

impl<'a> BoardView<'a> {
    fn new(board: &'a BoardState) -> Self {
        BoardView {
            board,
            overlay: None,
        }
    }

    fn with_marble(board: &'a BoardState, position: Position, color: Color) -> Self {
        BoardView {
            board,
            overlay: Some((position, color)),
        }
    }

    fn color_at(&self, position: Position) -> Option<Color> {
        match self.overlay {
            Some((p, color)) if p == position => Some(color),
            _ => self.board.color_at(position),
        }
    }

    /// All cells of the line through `start` along `axis`, in axis order,
    /// together with the index of `start` within it.
    fn line(&self, start: Position, axis: Axis) -> (Vec<Cell>, usize) {
        let (dc, dr) = axis.direction();
        let mut before = Vec::new();
        let mut k = 1;
        while let Some(p) = start.step(dc, dr, -k).filter(|&p| self.board.contains(p)) {
            before.push(Cell::new(p, self.color_at(p)));
            k += 1;
        }
        let start_idx = before.len();
        before.reverse();

        let mut line = before;
        line.push(Cell::new(start, self.color_at(start)));
        let mut k = 1;
        while let Some(p) = start.step(dc, dr, k).filter(|&p| self.board.contains(p)) {
            line.push(Cell::new(p, self.color_at(p)));
            k += 1;
        }
        (line, start_idx)
    }
}

/// Grows `[s, s]` in both directions while cells are empty or `color`.
fn extend(line: &[Cell], s: usize, color: Option<Color>) -> (usize, usize) {
    let fits = |cell: &Cell| cell.color.is_none() || cell.color == color;
    let mut lo = s;
    while lo > 0 && fits(&line[lo - 1]) {
        lo -= 1;
    }
    let mut hi = s;
    while hi + 1 < line.len() && fits(&line[hi + 1]) {
        hi += 1;
    }
    (lo, hi)
}

/// Inclusive index ranges of the maximal single-color windows through `s`.
fn maximal_windows(line: &[Cell], s: usize) -> Vec<(usize, usize)> {
    if let Some(color) = line[s].color {
        return vec![extend(line, s, Some(color))];
    }
    let left = line[..s].iter().rev().find_map(|c| c.color);
    let right = line[s + 1..].iter().find_map(|c| c.color);
    match (left, right) {
        (Some(a), Some(b)) if a != b => vec![extend(line, s, Some(a)), extend(line, s, Some(b))],
        (Some(a), _) | (None, Some(a)) => vec![extend(line, s, Some(a))],
        (None, None) => vec![(0, line.len() - 1)],
    }
}

fn windows_on_axis(
    view: &BoardView<'_>,
    start: Position,
    axis: Axis,
    config: &DetectorConfig,
) -> Vec<Quintro> {
    let (line, s) = view.line(start, axis);
    if line.len() < QUINTRO_LENGTH {
        return Vec::new();
    }
    maximal_windows(&line, s)
        .into_iter()
        .filter(|&(lo, hi)| hi - lo + 1 >= QUINTRO_LENGTH)
        .map(|(lo, hi)| Quintro::from_cells(axis, line[lo..=hi].to_vec()))
        .filter(|q| config.include_empty_runs || q.color().is_some())
        .collect()
}

fn potentials_through(view: &BoardView<'_>, start: Position, config: &DetectorConfig) -> Vec<Quintro> {
    Axis::ALL
        .iter()
        .flat_map(|&axis| windows_on_axis(view, start, axis, config))
        .collect()
}

/// Read-only quintro queries over one board.
#[derive(Clone, Copy)]
pub struct QuintroDetector<'a> {
    board: &'a BoardState,
    config: DetectorConfig,
}

impl<'a> QuintroDetector<'a> {
    pub fn new(board: &'a BoardState, config: DetectorConfig) -> Self {
        QuintroDetector { board, config }
    }

    fn check_bounds(&self, position: Position) -> Result<(), BoardError> {
        self.board.get_cell(position).map(|_| ())
    }

    /// Maximal potential quintros through `start` on all four axes.
    pub fn potential_quintros(&self, start: Position) -> Result<Vec<Quintro>, BoardError> {
        self.check_bounds(start)?;
        Ok(potentials_through(&BoardView::new(self.board), start, &self.config))
    }

    /// Every potential quintro on the board, once each, in key order.
    pub fn all_potential_quintros(&self) -> Vec<Quintro> {
        PotentialQuintroSet::from_board(self.board, self.config).into_vec()
    }

    /// Completed lines of five or more through `start`. Empty when `start`
    /// holds no marble.
    pub fn quintros(&self, start: Position) -> Result<Vec<Quintro>, BoardError> {
        let start_cell = self.board.get_cell(start)?;
        let Some(color) = start_cell.color else {
            return Ok(Vec::new());
        };
        let view = BoardView::new(self.board);
        let mut found = Vec::new();
        for axis in Axis::ALL {
            let (line, s) = view.line(start, axis);
            let mut lo = s;
            while lo > 0 && line[lo - 1].color == Some(color) {
                lo -= 1;
            }
            let mut hi = s;
            while hi + 1 < line.len() && line[hi + 1].color == Some(color) {
                hi += 1;
            }
            if hi - lo + 1 >= QUINTRO_LENGTH {
                found.push(Quintro::from_cells(axis, line[lo..=hi].to_vec()));
            }
        }
        Ok(found)
    }

    /// How the potential quintro set changes once `color` is placed at
    /// `position`. The board must still be in its pre-move state.
    pub fn potential_quintro_delta(
        &self,
        position: Position,
        color: Color,
    ) -> Result<PotentialQuintroDelta, BoardError> {
        if self.board.get_cell(position)?.is_filled() {
            return Err(BoardError::CellOccupied(position));
        }
        let before_view = BoardView::new(self.board);
        let after_view = BoardView::with_marble(self.board, position, color);

        let before: BTreeMap<QuintroKey, Quintro> =
            potentials_through(&before_view, position, &self.config)
                .into_iter()
                .map(|q| (q.key(), q))
                .collect();
        let after: BTreeMap<QuintroKey, Quintro> =
            potentials_through(&after_view, position, &self.config)
                .into_iter()
                .map(|q| (q.key(), q))
                .collect();

        let mut delta = PotentialQuintroDelta::default();
        for (key, quintro) in &before {
            if !after.contains_key(key) {
                delta.removed.push(quintro.clone());
            }
        }
        for (key, quintro) in after {
            if before.contains_key(&key) {
                delta.changed.push(quintro);
            } else {
                delta.added.push(quintro);
            }
        }

        // Windows cut short by the new marble now end next to it.
        let mut cut: BTreeMap<QuintroKey, Quintro> = BTreeMap::new();
        for axis in Axis::ALL {
            let (dc, dr) = axis.direction();
            for side in [-1, 1] {
                let Some(neighbour) = position.step(dc, dr, side).filter(|&p| self.board.contains(p))
                else {
                    continue;
                };
                for q in windows_on_axis(&after_view, neighbour, axis, &self.config) {
                    if !q.contains(position) {
                        cut.insert(q.key(), q);
                    }
                }
            }
        }
        delta.added.extend(cut.into_values());
        Ok(delta)
    }
}

/// Changes to the potential quintro set caused by one move.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PotentialQuintroDelta {
    /// Potentials that only exist after the move.
    pub added: Vec<Quintro>,
    /// Potentials the move invalidated, as they were before it.
    pub removed: Vec<Quintro>,
    /// Potentials that survive with new attributes, as they are after it.
    pub changed: Vec<Quintro>,
}

impl PotentialQuintroDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// All potential quintros of a board keyed by position set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PotentialQuintroSet {
    by_key: BTreeMap<QuintroKey, Quintro>,
}

impl PotentialQuintroSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full rescan of `board`.
    pub fn from_board(board: &BoardState, config: DetectorConfig) -> Self {
        let view = BoardView::new(board);

        #[cfg(feature = "parallel")]
        let found: Vec<Quintro> = (0..board.height())
            .into_par_iter()
            .flat_map_iter(|row| {
                (0..board.width())
                    .flat_map(move |col| potentials_through(&view, Position::new(col, row), &config))
            })
            .collect();

        #[cfg(not(feature = "parallel"))]
        let found: Vec<Quintro> = board
            .cells()
            .flat_map(|cell| potentials_through(&view, cell.position, &config))
            .collect();

        PotentialQuintroSet {
            by_key: found.into_iter().map(|q| (q.key(), q)).collect(),
        }
    }

    /// Applies a delta computed against the board state this set describes.
    pub fn apply(&mut self, delta: &PotentialQuintroDelta) {
        for quintro in &delta.removed {
            self.by_key.remove(&quintro.key());
        }
        for quintro in delta.added.iter().chain(&delta.changed) {
            self.by_key.insert(quintro.key(), quintro.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn get(&self, key: &QuintroKey) -> Option<&Quintro> {
        self.by_key.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Quintro> {
        self.by_key.values()
    }

    /// Potentials passing through `position`.
    pub fn through(&self, position: Position) -> impl Iterator<Item = &Quintro> {
        self.by_key.values().filter(move |q| q.contains(position))
    }

    pub fn into_vec(self) -> Vec<Quintro> {
        self.by_key.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardLimits;

    fn board(width: usize, height: usize) -> BoardState {
        BoardState::new(width, height, &BoardLimits::default()).unwrap()
    }

    fn fill(b: &mut BoardState, marbles: &[(usize, usize, Color)]) {
        for &(c, r, color) in marbles {
            b.fill_cell(Position::new(c, r), color).unwrap();
        }
    }

    fn key(axis: Axis, col: usize, row: usize, len: usize) -> QuintroKey {
        QuintroKey {
            axis,
            start: Position::new(col, row),
            len,
        }
    }

    fn keys(quintros: &[Quintro]) -> Vec<QuintroKey> {
        let mut keys: Vec<QuintroKey> = quintros.iter().map(Quintro::key).collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_empty_board_potentials() {
        let b = board(5, 5);
        let detector = QuintroDetector::new(&b, DetectorConfig::default());

        let center = detector.potential_quintros(Position::new(2, 2)).unwrap();
        assert_eq!(
            keys(&center),
            vec![
                key(Axis::Horizontal, 0, 2, 5),
                key(Axis::Vertical, 2, 0, 5),
                key(Axis::Diagonal, 0, 0, 5),
                key(Axis::AntiDiagonal, 0, 4, 5),
            ]
        );

        // Diagonals through an edge cell are too short.
        let edge = detector.potential_quintros(Position::new(0, 1)).unwrap();
        assert_eq!(
            keys(&edge),
            vec![key(Axis::Horizontal, 0, 1, 5), key(Axis::Vertical, 0, 0, 5)]
        );

        // Five rows, five columns, two long diagonals.
        assert_eq!(detector.all_potential_quintros().len(), 12);
    }

    #[test]
    fn test_empty_runs_can_be_excluded() {
        let mut b = board(5, 5);
        let config = DetectorConfig {
            include_empty_runs: false,
        };
        assert!(QuintroDetector::new(&b, config).all_potential_quintros().is_empty());

        fill(&mut b, &[(2, 2, Color::Red)]);
        let all = QuintroDetector::new(&b, config).all_potential_quintros();
        assert_eq!(all.len(), 4);
        assert!(all.iter().all(|q| q.color() == Some(Color::Red)));
    }

    #[test]
    fn test_colored_start_stops_at_conflict() {
        let mut b = board(10, 10);
        fill(&mut b, &[(2, 0, Color::Red), (6, 0, Color::Blue)]);
        let detector = QuintroDetector::new(&b, DetectorConfig::default());
        let found = detector.potential_quintros(Position::new(2, 0)).unwrap();
        let horizontal: Vec<&Quintro> = found.iter().filter(|q| q.axis() == Axis::Horizontal).collect();
        assert_eq!(horizontal.len(), 1);
        assert_eq!(horizontal[0].key(), key(Axis::Horizontal, 0, 0, 6));
        assert_eq!(horizontal[0].color(), Some(Color::Red));
        assert_eq!(horizontal[0].number_of_empty_cells(), 5);
    }

    #[test]
    fn test_short_window_not_reported() {
        let mut b = board(10, 10);
        fill(
            &mut b,
            &[(0, 0, Color::Blue), (2, 0, Color::Red), (5, 0, Color::Blue)],
        );
        let detector = QuintroDetector::new(&b, DetectorConfig::default());
        let found = detector.potential_quintros(Position::new(2, 0)).unwrap();
        assert!(found.iter().all(|q| q.axis() != Axis::Horizontal));
    }

    #[test]
    fn test_empty_start_between_two_colors() {
        let mut b = board(12, 12);
        fill(&mut b, &[(1, 0, Color::Red), (7, 0, Color::Blue)]);
        let detector = QuintroDetector::new(&b, DetectorConfig::default());
        let found = detector.potential_quintros(Position::new(4, 0)).unwrap();
        let mut horizontal: Vec<&Quintro> =
            found.iter().filter(|q| q.axis() == Axis::Horizontal).collect();
        horizontal.sort_by_key(|q| q.key());
        assert_eq!(horizontal.len(), 2);
        assert_eq!(horizontal[0].key(), key(Axis::Horizontal, 0, 0, 7));
        assert_eq!(horizontal[0].color(), Some(Color::Red));
        assert_eq!(horizontal[1].key(), key(Axis::Horizontal, 2, 0, 10));
        assert_eq!(horizontal[1].color(), Some(Color::Blue));
    }

    #[test]
    fn test_vertical_quintro() {
        let mut b = board(10, 10);
        fill(
            &mut b,
            &[
                (0, 0, Color::Blue),
                (0, 1, Color::Blue),
                (0, 2, Color::Blue),
                (0, 3, Color::Blue),
            ],
        );
        let detector = QuintroDetector::new(&b, DetectorConfig::default());
        assert!(detector.quintros(Position::new(0, 3)).unwrap().is_empty());

        fill(&mut b, &[(0, 4, Color::Blue)]);
        let detector = QuintroDetector::new(&b, DetectorConfig::default());
        let found = detector.quintros(Position::new(0, 4)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].axis(), Axis::Vertical);
        assert_eq!(found[0].color(), Some(Color::Blue));
        let positions: Vec<Position> = found[0].positions().collect();
        assert_eq!(positions, (0..5).map(|r| Position::new(0, r)).collect::<Vec<_>>());
    }

    #[test]
    fn test_long_and_crossing_quintros() {
        let mut b = board(10, 10);
        // Six in a row on row 5 plus a diagonal through (3,5).
        for col in 0..6 {
            fill(&mut b, &[(col, 5, Color::Green)]);
        }
        for (c, r) in [(1, 3), (2, 4), (4, 6), (5, 7)] {
            fill(&mut b, &[(c, r, Color::Green)]);
        }
        let detector = QuintroDetector::new(&b, DetectorConfig::default());
        let found = detector.quintros(Position::new(3, 5)).unwrap();
        assert_eq!(
            keys(&found),
            vec![key(Axis::Horizontal, 0, 5, 6), key(Axis::Diagonal, 1, 3, 5)]
        );
        assert!(detector.quintros(Position::new(9, 9)).unwrap().is_empty());
    }

    #[test]
    fn test_delta_cuts_window_short() {
        let mut b = board(6, 6);
        fill(&mut b, &[(0, 0, Color::Red)]);
        let detector = QuintroDetector::new(&b, DetectorConfig::default());
        let delta = detector
            .potential_quintro_delta(Position::new(5, 0), Color::Blue)
            .unwrap();

        assert!(delta.removed.iter().any(|q| q.key() == key(Axis::Horizontal, 0, 0, 6)));
        let added = keys(&delta.added);
        assert!(added.contains(&key(Axis::Horizontal, 1, 0, 5)));
        assert!(added.contains(&key(Axis::Horizontal, 0, 0, 5)));

        let mut set = PotentialQuintroSet::from_board(&b, DetectorConfig::default());
        set.apply(&delta);
        b.fill_cell(Position::new(5, 0), Color::Blue).unwrap();
        assert_eq!(set, PotentialQuintroSet::from_board(&b, DetectorConfig::default()));
    }

    #[test]
    fn test_delta_changed_fixes_color() {
        let b = board(5, 5);
        let detector = QuintroDetector::new(&b, DetectorConfig::default());
        let delta = detector
            .potential_quintro_delta(Position::new(2, 2), Color::Yellow)
            .unwrap();
        assert!(delta.added.is_empty());
        assert!(delta.removed.is_empty());
        assert_eq!(delta.changed.len(), 4);
        for q in &delta.changed {
            assert_eq!(q.color(), Some(Color::Yellow));
            assert_eq!(q.number_of_empty_cells(), 4);
        }
    }

    #[test]
    fn test_delta_rejects_filled_and_off_board() {
        let mut b = board(5, 5);
        fill(&mut b, &[(1, 1, Color::Red)]);
        let detector = QuintroDetector::new(&b, DetectorConfig::default());
        assert_eq!(
            detector.potential_quintro_delta(Position::new(1, 1), Color::Blue),
            Err(BoardError::CellOccupied(Position::new(1, 1)))
        );
        assert!(detector
            .potential_quintro_delta(Position::new(5, 1), Color::Blue)
            .is_err());
        assert!(detector.potential_quintros(Position::new(0, 9)).is_err());
    }
}
