use std::collections::VecDeque;

use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::volume::Volume;
use crate::voxel::Voxel;

/// Value written to grown voxels.
pub const FOREGROUND: f32 = 1.0;

/// Seeded region growing parameters. Seeds are extent indices `(x, y, z)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionGrowParams {
    pub seeds: Vec<[i64; 3]>,
    pub lower: f64,
    pub upper: f64,
}

impl Default for RegionGrowParams {
    fn default() -> Self {
        Self {
            seeds: vec![[75, 80, 50]],
            lower: 900.0,
            upper: 1500.0,
        }
    }
}

impl RegionGrowParams {
    /// Checks the parameters that do not depend on a volume.
    pub fn validate(&self) -> Result<()> {
        if self.seeds.is_empty() {
            return Err(Error::invalid("seeds", "at least one seed is required"));
        }
        if !(self.lower.is_finite() && self.upper.is_finite()) {
            return Err(Error::invalid("band", "bounds must be finite"));
        }
        if self.lower > self.upper {
            return Err(Error::invalid(
                "band",
                format!("lower {} exceeds upper {}", self.lower, self.upper),
            ));
        }
        Ok(())
    }

    pub fn validate_seeds<T: Voxel>(&self, volume: &Volume<T>) -> Result<()> {
        let extent = volume.extent();
        match self.seeds.iter().find(|seed| !extent.contains(**seed)) {
            Some(seed) => Err(Error::InvalidSeed {
                seed: *seed,
                min: extent.min,
                max: extent.max,
            }),
            None => Ok(()),
        }
    }

    fn in_band(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Grows a face-connected region of in-band voxels from every seed.
///
/// Seeds whose own value is outside the band contribute nothing.
pub fn connected_threshold<T: Voxel>(
    volume: &Volume<T>,
    params: &RegionGrowParams,
) -> Result<Volume<f32>> {
    params.validate()?;
    params.validate_seeds(volume)?;

    let data = volume.data();
    let (depth, height, width) = data.dim();
    let mut output = Array3::<f32>::zeros((depth, height, width));
    let mut queue = VecDeque::new();

    for seed in &params.seeds {
        let Some(idx) = volume.array_index(*seed) else {
            continue;
        };
        if output[idx] == 0.0 && params.in_band(data[idx].to_f64()) {
            output[idx] = FOREGROUND;
            queue.push_back(idx);
        }
    }

    while let Some((z, y, x)) = queue.pop_front() {
        let mut visit = |n: (usize, usize, usize)| {
            if output[n] == 0.0 && params.in_band(data[n].to_f64()) {
                output[n] = FOREGROUND;
                queue.push_back(n);
            }
        };
        if x > 0 {
            visit((z, y, x - 1));
        }
        if x + 1 < width {
            visit((z, y, x + 1));
        }
        if y > 0 {
            visit((z, y - 1, x));
        }
        if y + 1 < height {
            visit((z, y + 1, x));
        }
        if z > 0 {
            visit((z - 1, y, x));
        }
        if z + 1 < depth {
            visit((z + 1, y, x));
        }
    }

    Ok(volume.with_data(output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{Extent, Geometry};

    /// Two bright cubes separated by a dark gap along x.
    fn two_islands() -> Volume<i16> {
        let g = Geometry::new(Extent::from_dims([10, 4, 4]), [1.0; 3], [0.0; 3]);
        Volume::from_fn(g, |[x, _, _]| if x == 4 || x == 5 { 0 } else { 1000 }).unwrap()
    }

    fn count(volume: &Volume<f32>) -> usize {
        volume.data().iter().filter(|v| **v > 0.0).count()
    }

    #[test]
    fn growth_stops_at_band_boundary() {
        let params = RegionGrowParams {
            seeds: vec![[1, 1, 1]],
            lower: 900.0,
            upper: 1500.0,
        };
        let mask = connected_threshold(&two_islands(), &params).unwrap();
        assert_eq!(count(&mask), 4 * 4 * 4);
        assert_eq!(mask.get([3, 0, 0]), Some(FOREGROUND));
        assert_eq!(mask.get([6, 0, 0]), Some(0.0));
    }

    #[test]
    fn each_seed_grows_its_own_component() {
        let params = RegionGrowParams {
            seeds: vec![[0, 0, 0], [9, 3, 3]],
            lower: 900.0,
            upper: 1500.0,
        };
        let mask = connected_threshold(&two_islands(), &params).unwrap();
        assert_eq!(count(&mask), 2 * 4 * 4 * 4);
    }

    #[test]
    fn seeds_on_the_extent_boundary_are_accepted() {
        let volume = two_islands();
        for seed in [[0, 0, 0], [9, 3, 3], [9, 0, 3]] {
            let params = RegionGrowParams {
                seeds: vec![seed],
                ..Default::default()
            };
            assert!(connected_threshold(&volume, &params).is_ok(), "{seed:?}");
        }
    }

    #[test]
    fn seeds_one_past_the_extent_are_rejected() {
        let volume = two_islands();
        for seed in [[10, 0, 0], [0, 4, 0], [0, 0, 4], [-1, 0, 0], [0, -1, 0], [0, 0, -1]] {
            let params = RegionGrowParams {
                seeds: vec![seed],
                ..Default::default()
            };
            assert!(
                matches!(
                    connected_threshold(&volume, &params),
                    Err(Error::InvalidSeed { .. })
                ),
                "{seed:?}"
            );
        }
    }

    #[test]
    fn inverted_band_is_invalid() {
        let params = RegionGrowParams {
            seeds: vec![[0, 0, 0]],
            lower: 1000.0,
            upper: 999.0,
        };
        assert!(matches!(
            connected_threshold(&two_islands(), &params),
            Err(Error::InvalidParameter { name: "band", .. })
        ));
    }

    #[test]
    fn degenerate_band_selects_exact_values_only() {
        let g = Geometry::new(Extent::from_dims([5, 1, 1]), [1.0; 3], [0.0; 3]);
        let values = [1000i16, 1000, 1001, 1000, 1000];
        let volume = Volume::from_fn(g, |[x, _, _]| values[x as usize]).unwrap();
        let params = RegionGrowParams {
            seeds: vec![[0, 0, 0]],
            lower: 1000.0,
            upper: 1000.0,
        };
        let mask = connected_threshold(&volume, &params).unwrap();
        let grown: Vec<f32> = mask.data().iter().copied().collect();
        assert_eq!(grown, vec![1.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn out_of_band_seed_grows_nothing() {
        let params = RegionGrowParams {
            seeds: vec![[4, 0, 0]],
            lower: 900.0,
            upper: 1500.0,
        };
        let mask = connected_threshold(&two_islands(), &params).unwrap();
        assert_eq!(count(&mask), 0);
    }
}
