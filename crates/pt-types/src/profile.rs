//! Axial profiles along the pultrusion die.

use serde::{Deserialize, Serialize};

use crate::errors::{PtError, PtResult};

/// Default number of axial grid points.
pub const DEFAULT_GRID_POINTS: usize = 201;

/// Default die length in mm.
pub const DEFAULT_DIE_LENGTH_MM: f64 = 1000.0;

/// Which physical quantity a profile carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    Cure,
    Temperature,
}

impl ProfileKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cure => "cure",
            Self::Temperature => "temperature",
        }
    }
}

/// Axial grid helpers.
pub struct AxialGrid;

impl AxialGrid {
    /// Evenly spaced positions from `start` to `end` inclusive.
    pub fn uniform(start: f64, end: f64, points: usize) -> Vec<f64> {
        let points = points.max(2);
        (0..points)
            .map(|i| start + (end - start) * i as f64 / (points - 1) as f64)
            .collect()
    }

    /// The default 201-point grid over [0, 1000] mm.
    pub fn default_grid() -> Vec<f64> {
        Self::uniform(0.0, DEFAULT_DIE_LENGTH_MM, DEFAULT_GRID_POINTS)
    }

    /// Positions must be finite, at least two, and strictly increasing.
    pub fn validate(positions: &[f64]) -> PtResult<()> {
        if positions.len() < 2 {
            return Err(PtError::Validation(format!(
                "axial grid needs at least 2 points, got {}",
                positions.len()
            )));
        }
        if let Some(idx) = positions.iter().position(|p| !p.is_finite()) {
            return Err(PtError::Validation(format!(
                "axial position {idx} is not finite"
            )));
        }
        if let Some(idx) = positions.windows(2).position(|w| w[1] <= w[0]) {
            return Err(PtError::Validation(format!(
                "axial grid is not strictly increasing at index {}",
                idx + 1
            )));
        }
        Ok(())
    }
}

/// Values sampled on a fixed axial grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialProfile {
    pub axial_positions_mm: Vec<f64>,
    pub values: Vec<f64>,
}

impl SpatialProfile {
    /// Pair positions and values; both must have the same length.
    pub fn new(axial_positions_mm: Vec<f64>, values: Vec<f64>) -> PtResult<Self> {
        if axial_positions_mm.len() != values.len() {
            return Err(PtError::Validation(format!(
                "profile has {} positions but {} values",
                axial_positions_mm.len(),
                values.len()
            )));
        }
        Ok(Self {
            axial_positions_mm,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.axial_positions_mm
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }

    /// Value at the last axial position.
    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// Maximum value and the position where it first occurs.
    pub fn max(&self) -> Option<(f64, f64)> {
        self.iter().fold(None, |best, (x, v)| match best {
            Some((_, bv)) if bv >= v => best,
            _ => Some((x, v)),
        })
    }

    /// First position whose value strictly exceeds `threshold`.
    pub fn first_position_exceeding(&self, threshold: f64) -> Option<f64> {
        self.iter().find(|(_, v)| *v > threshold).map(|(x, _)| x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> SpatialProfile {
        SpatialProfile::new(
            AxialGrid::uniform(0.0, 100.0, 5),
            vec![0.0, 0.005, 0.3, 0.999, 1.0],
        )
        .unwrap()
    }

    #[test]
    fn uniform_grid_is_strictly_increasing() {
        let grid = AxialGrid::default_grid();
        assert_eq!(grid.len(), DEFAULT_GRID_POINTS);
        assert_eq!(grid[0], 0.0);
        assert_eq!(grid[DEFAULT_GRID_POINTS - 1], DEFAULT_DIE_LENGTH_MM);
        assert!(AxialGrid::validate(&grid).is_ok());
    }

    #[test]
    fn grid_validation_rejects_repeats() {
        assert!(AxialGrid::validate(&[0.0, 1.0, 1.0]).is_err());
        assert!(AxialGrid::validate(&[0.0]).is_err());
        assert!(AxialGrid::validate(&[0.0, f64::NAN]).is_err());
    }

    #[test]
    fn threshold_scan_finds_first_crossing() {
        let profile = ramp();
        assert_eq!(profile.first_position_exceeding(0.01), Some(50.0));
        assert_eq!(profile.first_position_exceeding(0.995), Some(75.0));
        assert_eq!(profile.first_position_exceeding(1.0), None);
    }

    #[test]
    fn max_reports_first_peak_position() {
        let profile =
            SpatialProfile::new(vec![0.0, 10.0, 20.0, 30.0], vec![25.0, 130.0, 130.0, 120.0])
                .unwrap();
        assert_eq!(profile.max(), Some((10.0, 130.0)));
    }

    #[test]
    fn mismatched_lengths_rejected() {
        assert!(SpatialProfile::new(vec![0.0, 1.0], vec![0.0]).is_err());
    }
}
