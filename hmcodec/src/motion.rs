use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::SearchConfig;
use crate::error::{CodecError, Result};
use crate::frame::{Block, Frame};
use crate::pyramid::{PYRAMID_LEVELS, Pyramid, build_pyramid};
use crate::sad::sad;

/// Integer displacement in base-resolution pixels.
///
/// The reference block for the macroblock at origin `(y, x)` starts at
/// `(y + dy, x + dx)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct MotionVector {
    pub dy: i32,
    pub dx: i32,
}

impl MotionVector {
    pub const ZERO: MotionVector = MotionVector { dy: 0, dx: 0 };

    pub const fn new(dy: i32, dx: i32) -> Self {
        Self { dy, dx }
    }

    pub fn doubled(self) -> Self {
        Self {
            dy: self.dy * 2,
            dx: self.dx * 2,
        }
    }

    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }
}

impl std::fmt::Display for MotionVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.dy, self.dx)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    pub vector: MotionVector,
    pub cost: u32,
}

/// Macroblock layout of one frame plus one vector per macroblock in raster
/// order. This is what compensation consumes and what gets transmitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionField {
    cols: u32,
    rows: u32,
    block_size: u32,
    vectors: Vec<MotionVector>,
}

impl MotionField {
    pub fn new(cols: u32, rows: u32, block_size: u32, vectors: Vec<MotionVector>) -> Result<Self> {
        if vectors.len() != cols as usize * rows as usize {
            return Err(CodecError::corrupt(format!(
                "motion field {}x{} needs {} vectors, got {}",
                cols,
                rows,
                cols as usize * rows as usize,
                vectors.len()
            )));
        }
        Ok(Self {
            cols,
            rows,
            block_size,
            vectors,
        })
    }

    /// All-zero field covering a `width`x`height` frame.
    pub fn zero(width: u32, height: u32, block_size: u32) -> Self {
        let cols = width / block_size;
        let rows = height / block_size;
        Self {
            cols,
            rows,
            block_size,
            vectors: vec![MotionVector::ZERO; cols as usize * rows as usize],
        }
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn vectors(&self) -> &[MotionVector] {
        &self.vectors
    }

    pub fn get(&self, col: u32, row: u32) -> MotionVector {
        self.vectors[(row * self.cols + col) as usize]
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// Per-macroblock search results for one pyramid level, raster order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchGrid {
    cols: u32,
    rows: u32,
    block_size: u32,
    matches: Vec<MatchResult>,
}

impl MatchGrid {
    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn matches(&self) -> &[MatchResult] {
        &self.matches
    }

    pub fn get(&self, col: u32, row: u32) -> MatchResult {
        self.matches[(row * self.cols + col) as usize]
    }

    pub fn total_cost(&self) -> u64 {
        self.matches.iter().map(|m| m.cost as u64).sum()
    }

    pub fn to_field(&self) -> MotionField {
        MotionField {
            cols: self.cols,
            rows: self.rows,
            block_size: self.block_size,
            vectors: self.matches.iter().map(|m| m.vector).collect(),
        }
    }
}

// (row, col) grid offsets; the co-located block comes first so it wins ties.
const NEIGHBORS: [(i32, i32); 9] = [
    (0, 0),
    (0, -1),
    (0, 1),
    (-1, 0),
    (1, 0),
    (-1, -1),
    (-1, 1),
    (1, -1),
    (1, 1),
];

/// Coarse-to-fine block matcher over a three-level pyramid.
#[derive(Debug, Clone)]
pub struct MotionEstimator {
    config: SearchConfig,
    parallel: bool,
}

impl MotionEstimator {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            parallel: false,
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn estimate(&self, reference: &Frame, target: &Frame) -> Result<MatchGrid> {
        check_same_size(reference, target)?;
        self.config.validate(target.width(), target.height())?;
        let reference = build_pyramid(reference)?;
        let target = build_pyramid(target)?;
        self.estimate_pyramids(&reference, &target)
    }

    /// Same as [`estimate`](Self::estimate) for callers that already hold
    /// the pyramids, e.g. an encoder reusing each frame's pyramid twice.
    pub fn estimate_pyramids(&self, reference: &Pyramid, target: &Pyramid) -> Result<MatchGrid> {
        check_same_size(reference.level(0), target.level(0))?;
        self.config
            .validate(target.level(0).width(), target.level(0).height())?;

        let top = PYRAMID_LEVELS - 1;
        let mut grid = self.full_search(
            reference.level(top),
            target.level(top),
            self.config.block_sizes[top],
        )?;
        trace!(level = top, cost = grid.total_cost(), "full search done");

        for level in (0..top).rev() {
            grid = self.refine(
                reference.level(level),
                target.level(level),
                self.config.block_sizes[level],
                &grid,
            )?;
            trace!(level, cost = grid.total_cost(), "refined");
        }

        Ok(grid)
    }

    fn full_search(&self, reference: &Frame, target: &Frame, size: u32) -> Result<MatchGrid> {
        let cols = target.width() / size;
        let rows = target.height() / size;
        let radius = self.config.search_radius as i32;

        let matches = self.map_blocks(cols, rows, |col, row| {
            search_window(reference, target, col * size, row * size, size, radius)
        })?;

        Ok(MatchGrid {
            cols,
            rows,
            block_size: size,
            matches,
        })
    }

    fn refine(
        &self,
        reference: &Frame,
        target: &Frame,
        size: u32,
        coarse: &MatchGrid,
    ) -> Result<MatchGrid> {
        let cols = target.width() / size;
        let rows = target.height() / size;

        let matches = self.map_blocks(cols, rows, |col, row| {
            let x = col * size;
            let y = row * size;
            let current = target.block(x, y, size, size)?;

            let neighbor = search_neighbors(reference, &current, col, row, cols, rows, size)?;

            let seed = seed_vector(coarse, x, y);
            match cost_at(reference, &current, seed)? {
                Some(cost) if cost <= neighbor.cost => Ok(MatchResult { vector: seed, cost }),
                _ => Ok(neighbor),
            }
        })?;

        Ok(MatchGrid {
            cols,
            rows,
            block_size: size,
            matches,
        })
    }

    fn map_blocks<F>(&self, cols: u32, rows: u32, f: F) -> Result<Vec<MatchResult>>
    where
        F: Fn(u32, u32) -> Result<MatchResult> + Sync + Send,
    {
        let count = cols * rows;
        let at = |i: u32| f(i % cols, i / cols);
        if self.parallel {
            (0..count).into_par_iter().map(at).collect()
        } else {
            (0..count).map(at).collect()
        }
    }
}

fn check_same_size(reference: &Frame, target: &Frame) -> Result<()> {
    if !reference.same_size(target) {
        return Err(CodecError::DimensionMismatch {
            expected_w: reference.width(),
            expected_h: reference.height(),
            got_w: target.width(),
            got_h: target.height(),
        });
    }
    Ok(())
}

/// Exhaustive search of every displacement within `radius` that keeps the
/// candidate block inside the reference. Scans `dy` then `dx` in ascending
/// order and only replaces the best on a strictly lower cost.
fn search_window(
    reference: &Frame,
    target: &Frame,
    x: u32,
    y: u32,
    size: u32,
    radius: i32,
) -> Result<MatchResult> {
    let current = target.block(x, y, size, size)?;

    let min_dy = (-radius).max(-(y as i32));
    let max_dy = radius.min((reference.height() - size - y) as i32);
    let min_dx = (-radius).max(-(x as i32));
    let max_dx = radius.min((reference.width() - size - x) as i32);

    let mut best: Option<MatchResult> = None;
    for dy in min_dy..=max_dy {
        for dx in min_dx..=max_dx {
            let candidate = reference.block(
                (x as i32 + dx) as u32,
                (y as i32 + dy) as u32,
                size,
                size,
            )?;
            let cost = sad(&current, &candidate)?;
            if best.is_none_or(|b| cost < b.cost) {
                best = Some(MatchResult {
                    vector: MotionVector::new(dy, dx),
                    cost,
                });
            }
        }
    }

    // The zero displacement is always inside the window.
    best.ok_or(CodecError::InvalidConfig {
        reason: "empty search window",
    })
}

/// Compares the macroblock against the co-located reference macroblock and
/// its up to eight grid neighbours. Neighbours off the grid are skipped.
fn search_neighbors(
    reference: &Frame,
    current: &Block<'_>,
    col: u32,
    row: u32,
    cols: u32,
    rows: u32,
    size: u32,
) -> Result<MatchResult> {
    let mut best: Option<MatchResult> = None;
    for (d_row, d_col) in NEIGHBORS {
        let n_row = row as i32 + d_row;
        let n_col = col as i32 + d_col;
        if n_row < 0 || n_col < 0 || n_row >= rows as i32 || n_col >= cols as i32 {
            continue;
        }
        let candidate = reference.block(n_col as u32 * size, n_row as u32 * size, size, size)?;
        let cost = sad(current, &candidate)?;
        if best.is_none_or(|b| cost < b.cost) {
            best = Some(MatchResult {
                vector: MotionVector::new(d_row * size as i32, d_col * size as i32),
                cost,
            });
        }
    }
    best.ok_or(CodecError::InvalidConfig {
        reason: "empty macroblock grid",
    })
}

/// Doubled vector of the coarse macroblock covering the fine macroblock at
/// pixel origin `(x, y)`.
fn seed_vector(coarse: &MatchGrid, x: u32, y: u32) -> MotionVector {
    let col = ((x / 2) / coarse.block_size).min(coarse.cols - 1);
    let row = ((y / 2) / coarse.block_size).min(coarse.rows - 1);
    coarse.get(col, row).vector.doubled()
}

/// SAD of `current` against the reference block displaced by `vector`, or
/// `None` when that block leaves the frame.
fn cost_at(reference: &Frame, current: &Block<'_>, vector: MotionVector) -> Result<Option<u32>> {
    let (x, y) = current.origin();
    let rx = x as i64 + vector.dx as i64;
    let ry = y as i64 + vector.dy as i64;
    if rx < 0
        || ry < 0
        || rx + current.width() as i64 > reference.width() as i64
        || ry + current.height() as i64 > reference.height() as i64
    {
        return Ok(None);
    }
    let candidate = reference.block(rx as u32, ry as u32, current.width(), current.height())?;
    sad(current, &candidate).map(Some)
}
