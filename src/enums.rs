use serde::{Deserialize, Serialize};

/// The three reslice axes, in the order they are cycled by the viewer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Axial,
    Coronal,
    Sagittal,
}

impl Orientation {
    pub const ALL: [Orientation; 3] = [
        Orientation::Axial,
        Orientation::Coronal,
        Orientation::Sagittal,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Next axis in the cycle Axial -> Coronal -> Sagittal -> Axial.
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % 3]
    }

    /// World component (0 = x, 1 = y, 2 = z) the plane normal points along.
    pub fn normal_component(self) -> usize {
        2 - self.index()
    }

    pub fn title(self) -> &'static str {
        match self {
            Orientation::Axial => "Axial - x",
            Orientation::Coronal => "Coronal - y",
            Orientation::Sagittal => "Sagittal - z",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interpolation {
    Nearest,
    #[default]
    Linear,
}

/// Scalar domain a pipeline stage consumes or produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarDomain {
    Integral,
    Floating,
}

/// Slice ordering of a DICOM series.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SortBy {
    #[default]
    ImagePositionPatient,
    TablePosition,
    InstanceNumber,
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_closes_after_three_steps() {
        for start in Orientation::ALL {
            assert_eq!(start.next().next().next(), start);
            assert_ne!(start.next(), start);
        }
    }

    #[test]
    fn normals_point_along_distinct_components() {
        assert_eq!(Orientation::Axial.normal_component(), 2);
        assert_eq!(Orientation::Coronal.normal_component(), 1);
        assert_eq!(Orientation::Sagittal.normal_component(), 0);
    }
}
