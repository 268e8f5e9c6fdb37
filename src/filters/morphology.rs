use ndarray::{Array3, Zip};

use crate::error::{Error, Result};
use crate::volume::Volume;

/// Flat structuring element stored as `(dz, dy, dx)` offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuringElement {
    radius: u32,
    offsets: Vec<[i64; 3]>,
}

impl StructuringElement {
    /// Voxels whose offset from the center lies within `radius` (index units).
    pub fn ball(radius: u32) -> Result<Self> {
        if radius == 0 {
            return Err(Error::invalid("radius", "structuring element radius must be positive"));
        }
        let r = radius as i64;
        let mut offsets = Vec::new();
        for dz in -r..=r {
            for dy in -r..=r {
                for dx in -r..=r {
                    if dx * dx + dy * dy + dz * dz <= r * r {
                        offsets.push([dz, dy, dx]);
                    }
                }
            }
        }
        Ok(Self { radius, offsets })
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

#[derive(Clone, Copy)]
enum Rank {
    Max,
    Min,
}

/// Max (dilation) or min (erosion) over the element. Neighbours outside the
/// volume are skipped.
fn rank_filter(data: &Array3<f32>, element: &StructuringElement, rank: Rank) -> Array3<f32> {
    let (depth, height, width) = data.dim();
    let bounds = [depth as i64, height as i64, width as i64];

    Zip::indexed(data).par_map_collect(|(z, y, x), &center| {
        let mut acc = center;
        for [dz, dy, dx] in &element.offsets {
            let n = [z as i64 + dz, y as i64 + dy, x as i64 + dx];
            if (0..3).any(|i| n[i] < 0 || n[i] >= bounds[i]) {
                continue;
            }
            let v = data[[n[0] as usize, n[1] as usize, n[2] as usize]];
            acc = match rank {
                Rank::Max => acc.max(v),
                Rank::Min => acc.min(v),
            };
        }
        acc
    })
}

pub fn dilate(volume: &Volume<f32>, element: &StructuringElement) -> Volume<f32> {
    volume.with_data(rank_filter(volume.data(), element, Rank::Max))
}

pub fn erode(volume: &Volume<f32>, element: &StructuringElement) -> Volume<f32> {
    volume.with_data(rank_filter(volume.data(), element, Rank::Min))
}

/// Dilation followed by erosion; fills holes smaller than the element.
pub fn closing(volume: &Volume<f32>, element: &StructuringElement) -> Volume<f32> {
    erode(&dilate(volume, element), element)
}

/// Erosion followed by dilation; removes islands smaller than the element.
pub fn opening(volume: &Volume<f32>, element: &StructuringElement) -> Volume<f32> {
    dilate(&erode(volume, element), element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{Extent, Geometry};

    fn geometry(n: usize) -> Geometry {
        Geometry::new(Extent::from_dims([n; 3]), [1.0; 3], [0.0; 3])
    }

    fn in_cube(p: [i64; 3], lo: i64, hi: i64) -> bool {
        p.iter().all(|c| *c >= lo && *c <= hi)
    }

    #[test]
    fn ball_sizes_match_the_discrete_sphere() {
        assert_eq!(StructuringElement::ball(1).unwrap().len(), 7);
        assert_eq!(StructuringElement::ball(2).unwrap().len(), 33);
        assert_eq!(StructuringElement::ball(3).unwrap().len(), 123);
        assert!(StructuringElement::ball(0).is_err());
    }

    #[test]
    fn closing_fills_a_small_hole() {
        let input = Volume::from_fn(geometry(11), |p| {
            if p == [5, 5, 5] {
                0.0
            } else if in_cube(p, 2, 8) {
                255.0
            } else {
                0.0
            }
        })
        .unwrap();
        let element = StructuringElement::ball(1).unwrap();
        let output = closing(&input, &element);
        assert_eq!(output.get([5, 5, 5]), Some(255.0));
        assert_eq!(output.get([0, 0, 0]), Some(0.0));
    }

    #[test]
    fn opening_removes_an_isolated_voxel() {
        let input = Volume::from_fn(geometry(11), |p| {
            if p == [0, 0, 10] || in_cube(p, 3, 8) {
                255.0
            } else {
                0.0
            }
        })
        .unwrap();
        let element = StructuringElement::ball(1).unwrap();
        let output = opening(&input, &element);
        assert_eq!(output.get([0, 0, 10]), Some(0.0));
        assert_eq!(output.get([5, 5, 5]), Some(255.0));
    }
}
