// THEORY:
// `SpatialQuery` is the stateless half of the clustering engine. Every function here
// reads a borrowed grid snapshot and returns a coordinate; none of them mutate
// anything or keep anything between calls.
//
// Key architectural principles & algorithm steps:
// 1.  **Similarity Set**: For a reference color, the similarity set is every position
//     whose color distance to the reference is strictly below the threshold. It is
//     produced lazily and discarded as soon as the centroid has been accumulated.
// 2.  **Centroid**: The integer-truncated mean of the similarity set's coordinates. When
//     the reference color was read from the grid, its own cell is in the set (distance
//     0 is below any positive threshold), so the count is never zero.
// 3.  **Closest Cell**: Among the candidate cells around an origin, pick the one nearest
//     the centroid. Candidates are visited in a fixed scan order and the first minimum
//     wins, which makes a replayed run reproduce the same swaps.
// 4.  **Topology Is Configuration**: Which cells count as candidates is an explicit
//     `NeighborTopology` value rather than something baked into the loop.

use crate::core_modules::grid::{Grid, Position};
use crate::core_modules::pixel::pixel::{ColorDistance, Pixel};

pub mod spatial_query {
    use super::*; // Make grid and pixel types available.

    pub use crate::core_modules::pixel::pixel::color_distance;

    /// The set of cells considered as the swap partner of a sampled pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum NeighborTopology {
        /// Every cell within Chebyshev distance `radius` of the origin, the origin
        /// included, clamped to the grid. Scanned row by row, top to bottom, left
        /// to right.
        Block { radius: usize },
        /// The origin followed by the eight compass neighbors in the order up, down,
        /// left, right, up-left, up-right, down-left, down-right. A direction that
        /// would leave the grid resolves to the origin, so the origin wins ties.
        Compass,
    }

    impl Default for NeighborTopology {
        fn default() -> Self {
            NeighborTopology::Block { radius: 1 }
        }
    }

    /// Distance between two cell coordinates, used to rank candidates against a centroid.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub enum CellMetric {
        #[default]
        Manhattan,
        /// Compared as squared distance; the ordering matches true Euclidean distance.
        Euclidean,
    }

    impl CellMetric {
        pub fn distance(&self, a: Position, b: Position) -> usize {
            let dx = a.x.abs_diff(b.x);
            let dy = a.y.abs_diff(b.y);
            match self {
                CellMetric::Manhattan => dx + dy,
                CellMetric::Euclidean => dx * dx + dy * dy,
            }
        }
    }

    /// Lazily yields every position whose color is strictly closer than `threshold`
    /// to `reference`, in row-major order.
    pub fn similarity_set<'a>(
        grid: &'a Grid,
        reference: &'a Pixel,
        threshold: ColorDistance,
    ) -> impl Iterator<Item = Position> + 'a {
        grid.iter()
            .filter(move |(_, pixel)| pixel.distance(reference) < threshold)
            .map(|(position, _)| position)
    }

    /// Truncated mean position of the similarity set of `reference`.
    ///
    /// Returns `None` only when no cell qualifies, which cannot happen when
    /// `reference` was read from `grid` and `threshold > 0`.
    pub fn find_centroid(
        grid: &Grid,
        reference: &Pixel,
        threshold: ColorDistance,
    ) -> Option<Position> {
        let (sum_x, sum_y, count) = similarity_set(grid, reference, threshold).fold(
            (0u64, 0u64, 0u64),
            |(sum_x, sum_y, count), position| {
                (sum_x + position.x as u64, sum_y + position.y as u64, count + 1)
            },
        );

        if count == 0 {
            return None;
        }
        let (x, y) = (sum_x / count, sum_y / count);
        Some(Position::new(x as usize, y as usize))
    }

    /// The candidate cells around `origin`, in scan order. Never empty for an
    /// origin inside a grid of side `size`.
    pub fn candidates(size: usize, origin: Position, topology: NeighborTopology) -> Vec<Position> {
        match topology {
            NeighborTopology::Block { radius } => {
                let last = size.saturating_sub(1);
                let (x0, x1) = (
                    origin.x.saturating_sub(radius),
                    origin.x.saturating_add(radius).min(last),
                );
                let (y0, y1) = (
                    origin.y.saturating_sub(radius),
                    origin.y.saturating_add(radius).min(last),
                );
                (y0..=y1)
                    .flat_map(|y| (x0..=x1).map(move |x| Position::new(x, y)))
                    .collect()
            }
            NeighborTopology::Compass => {
                let last = size.saturating_sub(1);
                let Position { x, y } = origin;
                let (up, down, left, right) = (y > 0, y < last, x > 0, x < last);
                let step = |allowed: bool, to: (usize, usize)| {
                    if allowed {
                        Position::new(to.0, to.1)
                    } else {
                        origin
                    }
                };
                vec![
                    origin,
                    step(up, (x, y.wrapping_sub(1))),
                    step(down, (x, y + 1)),
                    step(left, (x.wrapping_sub(1), y)),
                    step(right, (x + 1, y)),
                    step(left && up, (x.wrapping_sub(1), y.wrapping_sub(1))),
                    step(right && up, (x + 1, y.wrapping_sub(1))),
                    step(left && down, (x.wrapping_sub(1), y + 1)),
                    step(right && down, (x + 1, y + 1)),
                ]
            }
        }
    }

    /// The candidate around `origin` nearest to `target` under `metric`.
    /// Ties go to the candidate visited first.
    pub fn closest_cell_to(
        grid: &Grid,
        origin: Position,
        target: Position,
        topology: NeighborTopology,
        metric: CellMetric,
    ) -> Position {
        debug_assert!(grid.contains(origin), "origin {origin:?} outside grid");
        // `min_by_key` keeps the first of several equal minima.
        candidates(grid.size(), origin, topology)
            .into_iter()
            .min_by_key(|candidate| metric.distance(*candidate, target))
            .unwrap_or(origin)
    }

    /// Mean color distance over every horizontally or vertically adjacent pair of
    /// cells. Lower means more clustered. A 1x1 grid has no pairs and scores 0.0.
    pub fn mean_adjacent_distance(grid: &Grid) -> f64 {
        let size = grid.size();
        let mut total = 0u64;
        let mut pairs = 0u64;

        for (position, pixel) in grid.iter() {
            if position.x + 1 < size {
                let right = grid[Position::new(position.x + 1, position.y)];
                total += color_distance(pixel, &right) as u64;
                pairs += 1;
            }
            if position.y + 1 < size {
                let below = grid[Position::new(position.x, position.y + 1)];
                total += color_distance(pixel, &below) as u64;
                pairs += 1;
            }
        }

        if pairs == 0 {
            return 0.0;
        }
        total as f64 / pairs as f64
    }
}
