use crate::{
    enums::SortBy,
    error::Result,
    metaimage,
    volume::{Extent, Geometry, Volume},
};

use dicom::{
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::{ConvertOptions, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use ndarray::{Array2, Array3, s};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("Missing spacing information")]
    MissingSpacing,

    #[error("File not found: {0}")]
    MissingFile(PathBuf),

    #[error("Unsupported volume format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("MetaImage error: {0}")]
    MetaImage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}

/// One decoded slice with the attributes needed to place it.
struct Slice {
    order: Option<f32>,
    position: Option<[f64; 3]>,
    image: Array2<i16>,
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a volume from a MetaImage file (`.mha` / `.mhd`) or a directory
    /// of `.dcm` files
    ///
    /// # Errors
    ///
    /// Returns [`VolumeLoaderError::MissingFile`] when `path` does not exist
    /// and [`VolumeLoaderError::UnsupportedFormat`] for any other file type
    pub fn load(path: impl AsRef<Path>, sort_by: SortBy) -> Result<Volume<i16>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VolumeLoaderError::MissingFile(path.to_path_buf()).into());
        }
        let volume = if path.is_dir() {
            Self::load_from_directory(path, sort_by)?
        } else if Self::is_metaimage(path) {
            metaimage::read(path)?
        } else {
            return Err(VolumeLoaderError::UnsupportedFormat(path.to_path_buf()).into());
        };
        let (min, max) = volume.min_max();
        info!(
            path = %path.display(),
            dims = ?volume.extent().dims(),
            spacing = ?volume.spacing(),
            min,
            max,
            "loaded volume"
        );
        Ok(volume)
    }

    fn is_metaimage(path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mha") || ext.eq_ignore_ascii_case("mhd"))
    }

    /// Load a volume from DICOM objects
    ///
    /// # Arguments
    ///
    /// * `dicom_objects` - Slice of DICOM file objects
    /// * `sort_by` - Method to sort the slices
    ///
    /// # Errors
    ///
    /// Returns error if no valid images found or dimensions are inconsistent
    pub fn load_from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        sort_by: SortBy,
    ) -> Result<Volume<i16>> {
        let mut slices: Vec<_> = dicom_objects
            .iter()
            .filter_map(|dicom_object| Self::extract_slice(dicom_object, &sort_by))
            .collect();

        if slices.is_empty() {
            return Err(VolumeLoaderError::NoValidImages.into());
        }
        if slices.len() < dicom_objects.len() {
            warn!(
                skipped = dicom_objects.len() - slices.len(),
                "some DICOM objects had no decodable image"
            );
        }

        Self::sort_slices(&mut slices, sort_by);
        Self::validate_dimensions(&slices)?;

        let volume_array = Self::build_volume_array(&slices);
        let spacing = Self::get_spacing(dicom_objects).ok_or(VolumeLoaderError::MissingSpacing)?;
        let origin = slices[0].position.unwrap_or([0.0; 3]);
        let (depth, height, width) = volume_array.dim();
        debug!(width, height, depth, ?spacing, ?origin, "assembled DICOM series");

        let geometry = Geometry::new(Extent::from_dims([width, height, depth]), spacing, origin);
        Volume::new(volume_array, geometry)
    }

    /// Load a volume from file paths
    pub fn load_from_file_paths(paths: &[impl AsRef<Path>], sort_by: SortBy) -> Result<Volume<i16>> {
        let objects = paths
            .iter()
            .map(|path| open_file(path.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(VolumeLoaderError::from)?;

        Self::load_from_dicom_objects(&objects, sort_by)
    }

    /// Load a volume from a directory containing .dcm files
    pub fn load_from_directory(path: impl AsRef<Path>, sort_by: SortBy) -> Result<Volume<i16>> {
        let paths: Vec<_> = fs::read_dir(path.as_ref())
            .map_err(VolumeLoaderError::from)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();

        if paths.is_empty() {
            return Err(VolumeLoaderError::NoValidImages.into());
        }

        Self::load_from_file_paths(&paths, sort_by)
    }

    fn extract_slice(dicom_object: &FileDicomObject<InMemDicomObject>, sort_by: &SortBy) -> Option<Slice> {
        let order = Self::get_sort_order(dicom_object, sort_by)?;
        let image = Self::decode_image(dicom_object)?;
        let position = dicom_object
            .element(tags::IMAGE_POSITION_PATIENT)
            .ok()
            .and_then(|e| e.to_multi_float64().ok())
            .and_then(|p| <[f64; 3]>::try_from(p.as_slice()).ok());
        Some(Slice {
            order,
            position,
            image,
        })
    }

    fn get_sort_order(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
    ) -> Option<Option<f32>> {
        match sort_by {
            SortBy::ImagePositionPatient => {
                let pos = dicom_object
                    .element(tags::IMAGE_POSITION_PATIENT)
                    .ok()?
                    .to_multi_float32()
                    .ok()?;
                Some(pos.get(2).copied())
            }
            SortBy::TablePosition => {
                let pos = dicom_object
                    .element(tags::TABLE_POSITION)
                    .ok()?
                    .to_float32()
                    .ok();
                Some(pos)
            }
            SortBy::InstanceNumber => {
                let num = dicom_object
                    .element(tags::INSTANCE_NUMBER)
                    .ok()?
                    .to_int::<i32>()
                    .ok()
                    .map(|n| n as f32);
                Some(num)
            }
            SortBy::None => Some(Some(0.0)),
        }
    }

    /// Decodes the first frame with the modality LUT applied and no VOI
    /// windowing, so thresholds operate on stored intensities.
    fn decode_image(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<Array2<i16>> {
        let pixel_data = dicom_object.decode_pixel_data().ok()?;
        let options = ConvertOptions::new().with_voi_lut(VoiLutOption::Identity);
        pixel_data
            .to_ndarray_with_options::<i16>(&options)
            .ok()
            .map(|arr| arr.slice_move(s![0, .., .., 0]))
    }

    fn sort_slices(slices: &mut [Slice], sort_by: SortBy) {
        if !matches!(sort_by, SortBy::None) {
            slices.sort_by(|a, b| a.order.partial_cmp(&b.order).unwrap_or(std::cmp::Ordering::Equal));
        }
    }

    fn validate_dimensions(slices: &[Slice]) -> std::result::Result<(), VolumeLoaderError> {
        let first_dim = slices[0].image.dim();
        if slices.iter().any(|slice| slice.image.dim() != first_dim) {
            return Err(VolumeLoaderError::InconsistentDimensions);
        }
        Ok(())
    }

    fn build_volume_array(slices: &[Slice]) -> Array3<i16> {
        let (height, width) = slices[0].image.dim();
        let depth = slices.len();
        let mut volume = Array3::<i16>::zeros((depth, height, width));

        for (i, slice) in slices.iter().enumerate() {
            volume.slice_mut(s![i, .., ..]).assign(&slice.image);
        }

        volume
    }

    /// `(x, y, z)` spacing: PixelSpacing holds `(row, column)` spacing, the
    /// slice distance comes from SpacingBetweenSlices or SliceThickness.
    fn get_spacing(dicom_objects: &[FileDicomObject<InMemDicomObject>]) -> Option<[f64; 3]> {
        dicom_objects.iter().find_map(|dicom_object| {
            let pixel_spacing = dicom_object
                .element(tags::PIXEL_SPACING)
                .ok()?
                .to_multi_float64()
                .ok()?;

            let slice_distance = [tags::SPACING_BETWEEN_SLICES, tags::SLICE_THICKNESS]
                .into_iter()
                .find_map(|tag| dicom_object.element(tag).ok()?.to_float64().ok())?;

            Some([*pixel_spacing.get(1)?, *pixel_spacing.first()?, slice_distance])
        })
    }
}
