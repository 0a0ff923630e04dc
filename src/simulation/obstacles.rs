//! Building obstacles with frozen heights.
//!
//! Footprints come from scene data without heights; a seeded RNG assigns one
//! height per building at construction time. After that the set is immutable,
//! which keeps every line-of-sight query reproducible for the lifetime of a
//! simulation run.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Uniform};

use super::types::Point;

/// Default minimum assigned building height in meters.
pub const DEFAULT_MIN_BUILDING_HEIGHT: f64 = 10.0;
/// Default maximum assigned building height in meters.
pub const DEFAULT_MAX_BUILDING_HEIGHT: f64 = 50.0;

/// One building: a footprint polygon on the ground and a uniform height.
#[derive(Debug, Clone, PartialEq)]
pub struct Building {
    /// Footprint vertices in world meters, at least 3.
    pub footprint: Vec<Point>,
    /// Roof height in meters above ground.
    pub height: f64,
}

/// Immutable collection of buildings used for line-of-sight queries.
///
/// Construction fails rather than producing a set the propagation model
/// cannot meaningfully query.
#[derive(Debug, Clone, PartialEq)]
pub struct ObstacleSet {
    buildings: Vec<Building>,
}

/// Why an obstacle set could not be built.
#[derive(Debug, Clone, PartialEq)]
pub enum ObstacleSetError {
    /// No footprints at all; line-of-sight against nothing is undefined
    /// for this model and almost always a broken scene.
    Empty,
    /// A footprint with fewer than 3 vertices is not a polygon.
    DegenerateFootprint { index: usize, vertices: usize },
    /// Height range must satisfy `0 < min <= max`.
    InvalidHeightRange { min_height: f64, max_height: f64 },
    /// An explicit building height was negative or not finite.
    InvalidHeight { index: usize, height: f64 },
}

impl std::fmt::Display for ObstacleSetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObstacleSetError::Empty => {
                write!(f, "obstacle set is empty")
            }
            ObstacleSetError::DegenerateFootprint { index, vertices } => {
                write!(
                    f,
                    "building {} has a degenerate footprint with {} vertices",
                    index, vertices
                )
            }
            ObstacleSetError::InvalidHeightRange {
                min_height,
                max_height,
            } => {
                write!(
                    f,
                    "invalid building height range [{}, {}]",
                    min_height, max_height
                )
            }
            ObstacleSetError::InvalidHeight { index, height } => {
                write!(f, "building {} has invalid height {}", index, height)
            }
        }
    }
}

impl std::error::Error for ObstacleSetError {}

impl ObstacleSet {
    /// Build a set from bare footprints, drawing one height per building
    /// uniformly from `[min_height, max_height]` with a seeded RNG.
    ///
    /// The same footprint order and seed always produce the same heights.
    pub fn from_footprints(
        footprints: Vec<Vec<Point>>,
        min_height: f64,
        max_height: f64,
        seed: u64,
    ) -> Result<Self, ObstacleSetError> {
        if !(min_height > 0.0) || !(max_height >= min_height) || !max_height.is_finite() {
            return Err(ObstacleSetError::InvalidHeightRange {
                min_height,
                max_height,
            });
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let heights = Uniform::new_inclusive(min_height, max_height);
        let buildings = footprints
            .into_iter()
            .map(|footprint| Building {
                height: heights.sample(&mut rng),
                footprint,
            })
            .collect();
        Self::from_buildings(buildings)
    }

    /// Build a set from buildings that already carry heights.
    pub fn from_buildings(buildings: Vec<Building>) -> Result<Self, ObstacleSetError> {
        if buildings.is_empty() {
            return Err(ObstacleSetError::Empty);
        }
        for (index, building) in buildings.iter().enumerate() {
            if building.footprint.len() < 3 {
                return Err(ObstacleSetError::DegenerateFootprint {
                    index,
                    vertices: building.footprint.len(),
                });
            }
            if !(building.height >= 0.0) || !building.height.is_finite() {
                return Err(ObstacleSetError::InvalidHeight {
                    index,
                    height: building.height,
                });
            }
        }
        Ok(Self { buildings })
    }

    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point { x, y }
    }

    fn unit_square(offset: f64) -> Vec<Point> {
        vec![
            p(offset, offset),
            p(offset + 1.0, offset),
            p(offset + 1.0, offset + 1.0),
            p(offset, offset + 1.0),
        ]
    }

    #[test]
    fn seeded_heights_are_reproducible() {
        let footprints = vec![unit_square(0.0), unit_square(5.0), unit_square(10.0)];
        let a = ObstacleSet::from_footprints(footprints.clone(), 10.0, 50.0, 42).unwrap();
        let b = ObstacleSet::from_footprints(footprints, 10.0, 50.0, 42).unwrap();
        assert_eq!(a.buildings(), b.buildings());
        for building in a.buildings() {
            assert!(building.height >= 10.0 && building.height <= 50.0);
        }
    }

    #[test]
    fn different_seeds_differ() {
        let footprints = vec![unit_square(0.0), unit_square(5.0)];
        let a = ObstacleSet::from_footprints(footprints.clone(), 10.0, 50.0, 1).unwrap();
        let b = ObstacleSet::from_footprints(footprints, 10.0, 50.0, 2).unwrap();
        let same = a
            .buildings()
            .iter()
            .zip(b.buildings())
            .all(|(x, y)| x.height == y.height);
        assert!(!same);
    }

    #[test]
    fn equal_min_max_pins_every_height() {
        let set = ObstacleSet::from_footprints(vec![unit_square(0.0)], 30.0, 30.0, 7).unwrap();
        assert_eq!(set.buildings()[0].height, 30.0);
    }

    #[test]
    fn empty_set_is_rejected() {
        assert_eq!(
            ObstacleSet::from_footprints(Vec::new(), 10.0, 50.0, 42),
            Err(ObstacleSetError::Empty)
        );
        assert_eq!(
            ObstacleSet::from_buildings(Vec::new()),
            Err(ObstacleSetError::Empty)
        );
    }

    #[test]
    fn degenerate_footprint_is_rejected() {
        let footprints = vec![unit_square(0.0), vec![p(0.0, 0.0), p(1.0, 1.0)]];
        assert_eq!(
            ObstacleSet::from_footprints(footprints, 10.0, 50.0, 42),
            Err(ObstacleSetError::DegenerateFootprint {
                index: 1,
                vertices: 2
            })
        );
    }

    #[test]
    fn invalid_height_range_is_rejected() {
        let footprints = vec![unit_square(0.0)];
        assert!(matches!(
            ObstacleSet::from_footprints(footprints.clone(), 50.0, 10.0, 42),
            Err(ObstacleSetError::InvalidHeightRange { .. })
        ));
        assert!(matches!(
            ObstacleSet::from_footprints(footprints, 0.0, 10.0, 42),
            Err(ObstacleSetError::InvalidHeightRange { .. })
        ));
    }

    #[test]
    fn non_finite_height_range_is_rejected() {
        // NaN slips ordered comparisons, so the guard has to fail it
        // explicitly instead of letting the sampler panic.
        let footprints = vec![unit_square(0.0)];
        assert!(matches!(
            ObstacleSet::from_footprints(footprints.clone(), 10.0, f64::NAN, 42),
            Err(ObstacleSetError::InvalidHeightRange { .. })
        ));
        assert!(matches!(
            ObstacleSet::from_footprints(footprints.clone(), f64::NAN, 50.0, 42),
            Err(ObstacleSetError::InvalidHeightRange { .. })
        ));
        assert!(matches!(
            ObstacleSet::from_footprints(footprints, 10.0, f64::INFINITY, 42),
            Err(ObstacleSetError::InvalidHeightRange { .. })
        ));
    }

    #[test]
    fn negative_explicit_height_is_rejected() {
        let buildings = vec![Building {
            footprint: unit_square(0.0),
            height: -1.0,
        }];
        assert!(matches!(
            ObstacleSet::from_buildings(buildings),
            Err(ObstacleSetError::InvalidHeight { index: 0, .. })
        ));
    }
}
