//! Dense index arenas
//!
//! Decision variables and solved values are addressed by `(product, period)`
//! or `(material, period, scenario)`. Both shapes are stored row-major in a
//! single `Vec` with fixed dimensions chosen at construction.
//!
//! Out-of-range indices are programming faults and panic, like slice
//! indexing does.

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Two-dimensional dense array indexed by `(row, col)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid2<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Clone> Grid2<T> {
    /// Create a grid filled with `value`
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }
}

impl<T> Grid2<T> {
    /// Build a grid by evaluating `f(row, col)` in row-major order
    ///
    /// # Example
    /// ```
    /// use mps_simulator_core::Grid2;
    ///
    /// let grid = Grid2::from_fn(2, 3, |r, c| r * 10 + c);
    /// assert_eq!(grid[(1, 2)], 12);
    /// ```
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Self { rows, cols, data }
    }

    /// Try the same as [`Grid2::from_fn`] with a fallible initializer
    pub fn try_from_fn<E>(
        rows: usize,
        cols: usize,
        mut f: impl FnMut(usize, usize) -> Result<T, E>,
    ) -> Result<Self, E> {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c)?);
            }
        }
        Ok(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// All cells in row-major order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.data.iter()
    }

    /// Cells of one row
    pub fn row(&self, row: usize) -> &[T] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    fn offset(&self, row: usize, col: usize) -> usize {
        assert!(
            row < self.rows && col < self.cols,
            "index ({}, {}) out of bounds for {}x{} grid",
            row,
            col,
            self.rows,
            self.cols
        );
        row * self.cols + col
    }
}

impl<T> Index<(usize, usize)> for Grid2<T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        &self.data[self.offset(row, col)]
    }
}

impl<T> IndexMut<(usize, usize)> for Grid2<T> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        let offset = self.offset(row, col);
        &mut self.data[offset]
    }
}

/// Three-dimensional dense array indexed by `(a, b, c)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid3<T> {
    dims: (usize, usize, usize),
    data: Vec<T>,
}

impl<T: Clone> Grid3<T> {
    pub fn filled(a: usize, b: usize, c: usize, value: T) -> Self {
        Self {
            dims: (a, b, c),
            data: vec![value; a * b * c],
        }
    }
}

impl<T> Grid3<T> {
    /// Build a grid by evaluating `f(a, b, c)` with `c` varying fastest
    pub fn from_fn(
        a: usize,
        b: usize,
        c: usize,
        mut f: impl FnMut(usize, usize, usize) -> T,
    ) -> Self {
        let mut data = Vec::with_capacity(a * b * c);
        for i in 0..a {
            for j in 0..b {
                for k in 0..c {
                    data.push(f(i, j, k));
                }
            }
        }
        Self {
            dims: (a, b, c),
            data,
        }
    }

    pub fn try_from_fn<E>(
        a: usize,
        b: usize,
        c: usize,
        mut f: impl FnMut(usize, usize, usize) -> Result<T, E>,
    ) -> Result<Self, E> {
        let mut data = Vec::with_capacity(a * b * c);
        for i in 0..a {
            for j in 0..b {
                for k in 0..c {
                    data.push(f(i, j, k)?);
                }
            }
        }
        Ok(Self {
            dims: (a, b, c),
            data,
        })
    }

    /// Dimensions `(a, b, c)`
    pub fn dims(&self) -> (usize, usize, usize) {
        self.dims
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.data.iter()
    }

    /// Cells `(a, b, 0..c)`
    pub fn lane(&self, a: usize, b: usize) -> &[T] {
        let start = self.offset(a, b, 0);
        &self.data[start..start + self.dims.2]
    }

    fn offset(&self, a: usize, b: usize, c: usize) -> usize {
        let (da, db, dc) = self.dims;
        assert!(
            a < da && b < db && c < dc,
            "index ({}, {}, {}) out of bounds for {}x{}x{} grid",
            a,
            b,
            c,
            da,
            db,
            dc
        );
        (a * db + b) * dc + c
    }
}

impl<T> Index<(usize, usize, usize)> for Grid3<T> {
    type Output = T;

    fn index(&self, (a, b, c): (usize, usize, usize)) -> &T {
        &self.data[self.offset(a, b, c)]
    }
}

impl<T> IndexMut<(usize, usize, usize)> for Grid3<T> {
    fn index_mut(&mut self, (a, b, c): (usize, usize, usize)) -> &mut T {
        let offset = self.offset(a, b, c);
        &mut self.data[offset]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid2_row_major_layout() {
        let grid = Grid2::from_fn(2, 3, |r, c| (r, c));
        let cells: Vec<_> = grid.iter().copied().collect();
        assert_eq!(cells[3], (1, 0));
        assert_eq!(grid.row(1), &[(1, 0), (1, 1), (1, 2)]);
    }

    #[test]
    fn test_grid3_lane_is_contiguous() {
        let grid = Grid3::from_fn(2, 2, 3, |a, b, c| a * 100 + b * 10 + c);
        assert_eq!(grid.lane(1, 0), &[100, 101, 102]);
        assert_eq!(grid[(0, 1, 2)], 12);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_grid2_out_of_bounds_panics() {
        let grid = Grid2::filled(1, 1, 0.0);
        let _ = grid[(0, 1)];
    }

    #[test]
    fn test_try_from_fn_propagates_error() {
        let result: Result<Grid2<u8>, &str> =
            Grid2::try_from_fn(2, 2, |r, c| if r == 1 && c == 1 { Err("bad") } else { Ok(0) });
        assert_eq!(result.unwrap_err(), "bad");
    }
}
