//! (position, velocity) grid: coordinate mapping and the append-only sample store.

use std::collections::HashMap;

use crate::pose::MotorPose;

/// Integer cell index on the (position, velocity) grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinate {
    pub position: i32,
    pub velocity: i32,
}

impl Coordinate {
    pub const fn new(position: i32, velocity: i32) -> Self {
        Self { position, velocity }
    }
}

/// Cell sizes on each axis. The velocity size is unknown until the sweep ends.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GridSizes {
    pub position: f64,
    pub velocity: Option<f64>,
}

/// Size of one cell for a range split into `density` cells.
///
/// `min_cell` replaces the size only when the range is empty or not finite.
/// Returns the size and whether that fallback was used.
pub fn cell_size(range: f64, density: u32, min_cell: f64) -> (f64, bool) {
    let raw = range.abs() / f64::from(density.max(1));
    if raw.is_finite() && raw > 0.0 {
        (raw, false)
    } else {
        (min_cell, true)
    }
}

/// Relative slack on the cell quotient so values on a cell edge land in the
/// upper cell despite rounding (0.6 / 0.2 is 2.9999999999999996).
const EDGE_TOLERANCE: f64 = 1e-9;

/// Index of the cell containing `value`; cells are `[k*size, (k+1)*size)`.
///
/// Saturates to the `i32` range. Callers guarantee finite inputs and size > 0.
#[inline]
pub fn bin_index(value: f64, size: f64) -> i32 {
    let q = value / size;
    // `as` saturates on overflow.
    (q + EDGE_TOLERANCE * q.abs().max(1.0)).floor() as i32
}

/// Map a sample to its cell. `None` when the velocity size is not known yet
/// or the sample is not finite.
pub fn coordinate_of(pose: &MotorPose, sizes: &GridSizes, position_unique: bool) -> Option<Coordinate> {
    let vel_size = sizes.velocity?;
    if !pose.position.is_finite() || !pose.velocity.is_finite() {
        return None;
    }
    let position = if position_unique {
        0
    } else {
        bin_index(pose.position, sizes.position)
    };
    Some(Coordinate::new(position, bin_index(pose.velocity, vel_size)))
}

/// Aggregate view of one cell for export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellSummary {
    pub coordinate: Coordinate,
    pub count: usize,
    pub mean_position: f64,
    pub mean_velocity: f64,
    pub mean_acceleration: f64,
    pub mean_volts: f64,
}

impl CellSummary {
    fn from_samples(coordinate: Coordinate, samples: &[MotorPose]) -> Self {
        let n = samples.len().max(1) as f64;
        let (p, v, a, u) = samples.iter().fold((0.0, 0.0, 0.0, 0.0), |acc, s| {
            (
                acc.0 + s.position,
                acc.1 + s.velocity,
                acc.2 + s.acceleration,
                acc.3 + s.applied_volts,
            )
        });
        Self {
            coordinate,
            count: samples.len(),
            mean_position: p / n,
            mean_velocity: v / n,
            mean_acceleration: a / n,
            mean_volts: u / n,
        }
    }
}

/// Coordinate → samples in arrival order. Entries are only ever appended.
#[derive(Debug, Clone, Default)]
pub struct GridStore {
    cells: HashMap<Coordinate, Vec<MotorPose>>,
    samples: usize,
}

impl GridStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, coordinate: Coordinate, pose: MotorPose) {
        self.cells.entry(coordinate).or_default().push(pose);
        self.samples += 1;
    }

    pub fn get(&self, coordinate: &Coordinate) -> Option<&[MotorPose]> {
        self.cells.get(coordinate).map(Vec::as_slice)
    }

    /// Number of occupied cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Total samples across all cells.
    pub fn sample_count(&self) -> usize {
        self.samples
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Coordinate, &[MotorPose])> {
        self.cells.iter().map(|(c, v)| (c, v.as_slice()))
    }

    /// Cells ordered by (position, velocity) for deterministic export.
    pub fn sorted_cells(&self) -> Vec<(Coordinate, &[MotorPose])> {
        let mut out: Vec<_> = self.cells.iter().map(|(c, v)| (*c, v.as_slice())).collect();
        out.sort_unstable_by_key(|(c, _)| *c);
        out
    }

    pub fn summaries(&self) -> Vec<CellSummary> {
        self.sorted_cells()
            .into_iter()
            .map(|(c, samples)| CellSummary::from_samples(c, samples))
            .collect()
    }
}
