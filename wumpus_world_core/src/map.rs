use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::Position;

/// Failed write to a [`Grid`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("cell ({x}, {y}) is outside a {width}×{height} grid")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
}

/// A dense 2D grid of cells, stored row-major.
///
/// Used for read-only snapshots of a world, e.g. [`crate::WumpusWorld::render`].
/// `origin` is the world position of cell `(0, 0)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    origin: Position,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a grid by calling `f(x, y)` for every cell, row by row.
    ///
    /// # Panics
    ///
    /// Panics if `width * height` overflows `usize`.
    pub fn from_generator<F>(width: usize, height: usize, origin: Position, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> T,
    {
        let size = width.checked_mul(height).expect("Grid size overflow");
        let mut cells = Vec::with_capacity(size);
        for y in 0..height {
            for x in 0..width {
                cells.push(f(x, y));
            }
        }
        Grid {
            width,
            height,
            origin,
            cells,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn origin(&self) -> Position {
        self.origin
    }

    #[inline]
    fn coords_to_index(&self, x: usize, y: usize) -> Option<usize> {
        self.is_valid(x, y).then(|| y * self.width + x)
    }

    #[inline]
    pub fn is_valid(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        self.coords_to_index(x, y).and_then(|i| self.cells.get(i))
    }

    /// Looks a cell up by world position.
    pub fn at(&self, position: Position) -> Option<&T> {
        let x = usize::try_from(position.x - self.origin.x).ok()?;
        let y = usize::try_from(position.y - self.origin.y).ok()?;
        self.get(x, y)
    }

    /// Overwrites one cell.
    pub fn set(&mut self, x: usize, y: usize, value: T) -> Result<(), GridError> {
        let index = self.coords_to_index(x, y).ok_or(GridError::OutOfBounds {
            x,
            y,
            width: self.width,
            height: self.height,
        })?;
        self.cells[index] = value;
        Ok(())
    }

    /// Rows from top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        self.cells.chunks(self.width.max(1))
    }
}

impl<T> Index<(usize, usize)> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &Self::Output {
        let Some(index) = self.coords_to_index(x, y) else {
            panic!("cell ({x}, {y}) outside a {}×{} grid", self.width, self.height);
        };
        &self.cells[index]
    }
}
