// THEORY:
// The `Grid` is the single mutable state of a clustering run: a square `size x size`
// board of `Pixel`s. It replaces an array of row pointers with one flat, row-major
// buffer (`index = y * size + x`), so there is exactly one owner, no ragged rows and
// one place where bounds are checked.
//
// Key architectural principles:
// 1.  **No Holes**: A grid is only ever built completely filled. Its size never changes
//     after construction and every cell holds a valid `Pixel` at all times.
// 2.  **Permutation Only**: The only mutation is `swap`. The multiset of colors on the
//     board is therefore fixed from the moment the grid is created.
// 3.  **Checked Allocation**: The cell buffer is reserved with `try_reserve_exact`, so a
//     grid that cannot fit in memory surfaces as `GridError::Allocation` instead of an abort.

use crate::core_modules::pixel::pixel::{Byte, Pixel};
use crate::error::GridError;
use rand::Rng;
use std::ops::Index;

/// A cell coordinate with `0 <= x, y < size`. Column `x`, row `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// A square board of pixels stored row-major in a single buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    size: usize,
    cells: Vec<Pixel>,
}

impl Grid {
    /// Builds a grid by evaluating `fill` once per cell in row-major order.
    pub fn from_fn<F>(size: usize, mut fill: F) -> Result<Self, GridError>
    where
        F: FnMut(Position) -> Pixel,
    {
        let mut cells = allocate(size)?;
        for y in 0..size {
            for x in 0..size {
                cells.push(fill(Position::new(x, y)));
            }
        }
        Ok(Self { size, cells })
    }

    /// A grid where every channel of every cell is drawn uniformly from [0, 255].
    pub fn random<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Result<Self, GridError> {
        Self::from_fn(size, |_| Pixel::random(&mut *rng))
    }

    pub fn filled(size: usize, pixel: Pixel) -> Result<Self, GridError> {
        Self::from_fn(size, |_| pixel)
    }

    /// Wraps an existing row-major buffer of exactly `size * size` pixels.
    pub fn from_pixels(size: usize, pixels: Vec<Pixel>) -> Result<Self, GridError> {
        if size == 0 {
            return Err(GridError::InvalidSize(size));
        }
        let expected = cell_count(size)?;
        if pixels.len() != expected {
            return Err(GridError::CellCount {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            size,
            cells: pixels,
        })
    }

    /// Builds a grid from rows (`rows[y][x]`). Every row must be `rows.len()` long.
    pub fn from_rows(rows: &[Vec<Pixel>]) -> Result<Self, GridError> {
        let size = rows.len();
        let pixels: Vec<Pixel> = rows.iter().flatten().copied().collect();
        if rows.iter().any(|row| row.len() != size) {
            return Err(GridError::CellCount {
                expected: size * size,
                actual: pixels.len(),
            });
        }
        Self::from_pixels(size, pixels)
    }

    /// The side length of the grid.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn cells(&self) -> &[Pixel] {
        &self.cells
    }

    pub fn contains(&self, position: Position) -> bool {
        position.x < self.size && position.y < self.size
    }

    pub fn get(&self, position: Position) -> Option<Pixel> {
        if self.contains(position) {
            Some(self.cells[self.index_of(position)])
        } else {
            None
        }
    }

    pub fn index_of(&self, position: Position) -> usize {
        position.y * self.size + position.x
    }

    /// Exchanges the colors stored at `a` and `b`. Swapping a cell with itself is a no-op.
    ///
    /// Panics if either position is outside the grid.
    pub fn swap(&mut self, a: Position, b: Position) {
        assert!(
            self.contains(a) && self.contains(b),
            "swap out of bounds: {a:?} <-> {b:?} on a {0}x{0} grid",
            self.size
        );
        let (ia, ib) = (self.index_of(a), self.index_of(b));
        self.cells.swap(ia, ib);
    }

    /// All positions in row-major scan order.
    pub fn positions(&self) -> impl Iterator<Item = Position> {
        let size = self.size;
        (0..size)
            .flat_map(move |y| (0..size).map(move |x| Position::new(x, y)))
    }

    /// Positions paired with their pixels, in row-major scan order.
    pub fn iter(&self) -> impl Iterator<Item = (Position, &Pixel)> {
        self.positions().zip(self.cells.iter())
    }

    /// Packed RGBA8 buffer, row-major, 4 bytes per cell.
    pub fn to_rgba_bytes(&self) -> Vec<Byte> {
        self.cells.iter().flat_map(|pixel| pixel.rgba()).collect()
    }

    /// Packed RGB8 buffer, row-major, 3 bytes per cell.
    pub fn to_rgb_bytes(&self) -> Vec<Byte> {
        self.cells
            .iter()
            .flat_map(|pixel| pixel.rgb_bytes())
            .collect()
    }
}

impl Index<Position> for Grid {
    type Output = Pixel;

    fn index(&self, position: Position) -> &Pixel {
        assert!(
            self.contains(position),
            "{position:?} is outside a {0}x{0} grid",
            self.size
        );
        &self.cells[self.index_of(position)]
    }
}

fn cell_count(size: usize) -> Result<usize, GridError> {
    size.checked_mul(size).ok_or(GridError::Allocation {
        cells: size as u128 * size as u128,
    })
}

fn allocate(size: usize) -> Result<Vec<Pixel>, GridError> {
    if size == 0 {
        return Err(GridError::InvalidSize(size));
    }
    let cells = cell_count(size)?;
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(cells)
        .map_err(|_| GridError::Allocation {
            cells: cells as u128,
        })?;
    Ok(buffer)
}
