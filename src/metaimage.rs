//! MetaImage (`.mha` / `.mhd`) reading and writing.
//!
//! Only uncompressed, single channel, three dimensional images are handled.
//! Samples are stored with x varying fastest, which is exactly the standard
//! layout of a `(z, y, x)` array.

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array3;
use tracing::debug;

use crate::error::{Error, Result};
use crate::volume::{Extent, Geometry, Volume};
use crate::volume_loader::VolumeLoaderError;
use crate::voxel::Voxel;

/// Scalar element types of the `ElementType` header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Float,
    Double,
}

impl ElementType {
    fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "MET_CHAR" => Self::Char,
            "MET_UCHAR" => Self::UChar,
            "MET_SHORT" => Self::Short,
            "MET_USHORT" => Self::UShort,
            "MET_INT" => Self::Int,
            "MET_UINT" => Self::UInt,
            "MET_FLOAT" => Self::Float,
            "MET_DOUBLE" => Self::Double,
            _ => return None,
        })
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Char => "MET_CHAR",
            Self::UChar => "MET_UCHAR",
            Self::Short => "MET_SHORT",
            Self::UShort => "MET_USHORT",
            Self::Int => "MET_INT",
            Self::UInt => "MET_UINT",
            Self::Float => "MET_FLOAT",
            Self::Double => "MET_DOUBLE",
        }
    }

    /// Bytes per sample.
    pub fn size(self) -> usize {
        match self {
            Self::Char | Self::UChar => 1,
            Self::Short | Self::UShort => 2,
            Self::Int | Self::UInt | Self::Float => 4,
            Self::Double => 8,
        }
    }

    fn decode(self, bytes: &[u8], big_endian: bool) -> f64 {
        macro_rules! read {
            ($ty:ty) => {{
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(bytes);
                if big_endian {
                    <$ty>::from_be_bytes(raw) as f64
                } else {
                    <$ty>::from_le_bytes(raw) as f64
                }
            }};
        }
        match self {
            Self::Char => read!(i8),
            Self::UChar => read!(u8),
            Self::Short => read!(i16),
            Self::UShort => read!(u16),
            Self::Int => read!(i32),
            Self::UInt => read!(u32),
            Self::Float => read!(f32),
            Self::Double => read!(f64),
        }
    }
}

/// Parsed header fields.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaHeader {
    pub dims: [usize; 3],
    pub spacing: [f64; 3],
    pub offset: [f64; 3],
    pub element_type: ElementType,
    pub big_endian: bool,
    /// `LOCAL` or a path relative to the header file.
    pub data_file: String,
}

impl MetaHeader {
    pub fn geometry(&self) -> Geometry {
        Geometry::new(Extent::from_dims(self.dims), self.spacing, self.offset)
    }
}

fn header_error(reason: impl Into<String>) -> Error {
    VolumeLoaderError::MetaImage(reason.into()).into()
}

fn parse_vector<T: std::str::FromStr, const N: usize>(key: &str, value: &str) -> Result<[T; N]> {
    let parsed: Vec<T> = value
        .split_whitespace()
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| header_error(format!("malformed `{key}`: {value}")))?;
    parsed
        .try_into()
        .map_err(|_| header_error(format!("`{key}` needs {N} values, got `{value}`")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(header_error(format!("malformed `{key}`: {value}"))),
    }
}

/// Parses the header and returns it with the byte offset where inline data
/// starts.
pub fn parse_header(bytes: &[u8]) -> Result<(MetaHeader, usize)> {
    let mut dims = None;
    let mut spacing = [1.0; 3];
    let mut offset = [0.0; 3];
    let mut element_type = None;
    let mut big_endian = false;
    let mut data_file = None;
    let mut position = 0;

    while position < bytes.len() && data_file.is_none() {
        let end = bytes[position..]
            .iter()
            .position(|b| *b == b'\n')
            .map_or(bytes.len(), |i| position + i);
        let line = String::from_utf8_lossy(&bytes[position..end]);
        position = (end + 1).min(bytes.len());

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(header_error(format!("expected `key = value`, got `{line}`")));
        };
        let (key, value) = (key.trim(), value.trim());
        match key {
            "NDims" => {
                if value != "3" {
                    return Err(header_error(format!("only 3D images are supported, NDims = {value}")));
                }
            }
            "DimSize" => dims = Some(parse_vector::<usize, 3>(key, value)?),
            "ElementSpacing" | "ElementSize" => spacing = parse_vector(key, value)?,
            "Offset" | "Origin" | "Position" => offset = parse_vector(key, value)?,
            "ElementType" => {
                element_type = Some(
                    ElementType::parse(value)
                        .ok_or_else(|| header_error(format!("unsupported element type {value}")))?,
                )
            }
            "ElementByteOrderMSB" | "BinaryDataByteOrderMSB" => big_endian = parse_bool(key, value)?,
            "CompressedData" => {
                if parse_bool(key, value)? {
                    return Err(header_error("compressed data is not supported"));
                }
            }
            "ElementNumberOfChannels" => {
                if value != "1" {
                    return Err(header_error(format!("expected one channel, got {value}")));
                }
            }
            "ElementDataFile" => data_file = Some(value.to_string()),
            _ => debug!(key, value, "ignoring MetaImage header field"),
        }
    }

    let header = MetaHeader {
        dims: dims.ok_or_else(|| header_error("missing `DimSize`"))?,
        spacing,
        offset,
        element_type: element_type.ok_or_else(|| header_error("missing `ElementType`"))?,
        big_endian,
        data_file: data_file.ok_or_else(|| header_error("missing `ElementDataFile`"))?,
    };
    if header.dims.contains(&0) {
        return Err(header_error(format!("empty image {:?}", header.dims)));
    }
    Ok((header, position))
}

/// Reads an image and converts it to 16-bit signed samples.
///
/// Values outside the `i16` range fail with [`Error::DomainOverflow`].
pub fn read(path: impl AsRef<Path>) -> Result<Volume<i16>> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(VolumeLoaderError::Io)?;
    let (header, data_start) = parse_header(&bytes)?;

    let external;
    let data = if header.data_file.eq_ignore_ascii_case("LOCAL") {
        &bytes[data_start..]
    } else {
        let raw_path = path
            .parent()
            .map_or_else(|| PathBuf::from(&header.data_file), |dir| dir.join(&header.data_file));
        if !raw_path.is_file() {
            return Err(VolumeLoaderError::MissingFile(raw_path).into());
        }
        external = fs::read(&raw_path).map_err(VolumeLoaderError::Io)?;
        &external[..]
    };

    let [nx, ny, nz] = header.dims;
    let size = header.element_type.size();
    let byte_count = nx
        .checked_mul(ny)
        .and_then(|n| n.checked_mul(nz))
        .and_then(|n| n.checked_mul(size))
        .ok_or_else(|| header_error(format!("image too large: {:?}", header.dims)))?;
    if data.len() < byte_count {
        return Err(header_error(format!(
            "expected {} bytes of {} data, found {}",
            byte_count,
            header.element_type.tag(),
            data.len()
        )));
    }

    let values = data[..byte_count]
        .chunks_exact(size)
        .map(|chunk| {
            let value = header.element_type.decode(chunk, header.big_endian);
            i16::from_f64(value).ok_or(Error::DomainOverflow {
                value,
                target: i16::NAME,
            })
        })
        .collect::<Result<Vec<i16>>>()?;
    let array = Array3::from_shape_vec((nz, ny, nx), values)
        .map_err(|e| header_error(e.to_string()))?;

    debug!(
        path = %path.display(),
        dims = ?header.dims,
        spacing = ?header.spacing,
        element = header.element_type.tag(),
        "read MetaImage"
    );
    Volume::new(array, header.geometry())
}

/// Writes `MET_SHORT` little-endian samples. A `.mhd` path gets its data in a
/// sibling `.raw` file, anything else is written as a single `.mha`.
pub fn write(path: impl AsRef<Path>, volume: &Volume<i16>) -> Result<()> {
    let path = path.as_ref();
    let geometry = volume.geometry();
    let [nx, ny, nz] = geometry.extent.dims();
    let offset = geometry.index_to_physical(geometry.extent.min);
    let [sx, sy, sz] = geometry.spacing;

    let detached = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("mhd"));
    let raw_path = path.with_extension("raw");
    let data_file = if detached {
        raw_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "LOCAL".into())
    } else {
        "LOCAL".into()
    };

    let [ox, oy, oz] = offset;
    let header = format!(
        concat!(
            "ObjectType = Image\n",
            "NDims = 3\n",
            "BinaryData = True\n",
            "BinaryDataByteOrderMSB = False\n",
            "CompressedData = False\n",
            "TransformMatrix = 1 0 0 0 1 0 0 0 1\n",
            "Offset = {ox} {oy} {oz}\n",
            "ElementSpacing = {sx} {sy} {sz}\n",
            "DimSize = {nx} {ny} {nz}\n",
            "ElementType = {element}\n",
            "ElementDataFile = {data_file}\n",
        ),
        ox = ox,
        oy = oy,
        oz = oz,
        sx = sx,
        sy = sy,
        sz = sz,
        nx = nx,
        ny = ny,
        nz = nz,
        element = ElementType::Short.tag(),
        data_file = data_file,
    );

    let samples: Vec<u8> = volume.data().iter().flat_map(|v| v.to_le_bytes()).collect();

    if detached {
        fs::write(path, header.as_bytes()).map_err(VolumeLoaderError::Io)?;
        fs::write(&raw_path, &samples).map_err(VolumeLoaderError::Io)?;
    } else {
        let mut bytes = header.into_bytes();
        bytes.extend_from_slice(&samples);
        fs::write(path, bytes).map_err(VolumeLoaderError::Io)?;
    }
    debug!(path = %path.display(), dims = ?[nx, ny, nz], "wrote MetaImage");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Volume<i16> {
        let g = Geometry::new(Extent::from_dims([4, 3, 2]), [0.5, 0.75, 2.0], [-3.0, 1.5, 10.0]);
        Volume::from_fn(g, |[x, y, z]| (x - 2 * y + 7 * z) as i16 * 100).unwrap()
    }

    #[test]
    fn single_file_round_trip_keeps_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.mha");
        let volume = sample();
        write(&path, &volume).unwrap();
        let back = read(&path).unwrap();
        assert_eq!(back.geometry(), volume.geometry());
        assert_eq!(back.data(), volume.data());
    }

    #[test]
    fn detached_header_reads_sibling_raw() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("volume.mhd");
        write(&path, &sample()).unwrap();
        assert!(dir.path().join("volume.raw").is_file());
        assert_eq!(read(&path).unwrap(), sample());

        fs::remove_file(dir.path().join("volume.raw")).unwrap();
        assert!(matches!(
            read(&path),
            Err(Error::ResourceUnavailable(VolumeLoaderError::MissingFile(_)))
        ));
    }

    #[test]
    fn big_endian_unsigned_input_is_converted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("be.mha");
        let mut bytes = b"NDims = 3\nDimSize = 2 1 1\nElementType = MET_USHORT\n\
ElementByteOrderMSB = True\nElementDataFile = LOCAL\n"
            .to_vec();
        bytes.extend_from_slice(&1200u16.to_be_bytes());
        bytes.extend_from_slice(&7u16.to_be_bytes());
        fs::write(&path, bytes).unwrap();

        let volume = read(&path).unwrap();
        assert_eq!(volume.get([0, 0, 0]), Some(1200));
        assert_eq!(volume.get([1, 0, 0]), Some(7));
        assert_eq!(volume.spacing(), [1.0; 3]);
    }

    #[test]
    fn out_of_range_samples_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.mha");
        let mut bytes = b"NDims = 3\nDimSize = 1 1 1\nElementType = MET_INT\nElementDataFile = LOCAL\n".to_vec();
        bytes.extend_from_slice(&100_000i32.to_le_bytes());
        fs::write(&path, bytes).unwrap();
        assert!(matches!(read(&path), Err(Error::DomainOverflow { .. })));
    }

    #[test]
    fn header_problems_are_reported() {
        let cases: [&[u8]; 4] = [
            b"NDims = 2\nDimSize = 1 1\nElementType = MET_SHORT\nElementDataFile = LOCAL\n",
            b"NDims = 3\nDimSize = 1 1 1\nElementType = MET_LONG\nElementDataFile = LOCAL\n",
            b"NDims = 3\nDimSize = 1 1 1\nElementType = MET_SHORT\nCompressedData = True\nElementDataFile = LOCAL\n",
            b"NDims = 3\nElementType = MET_SHORT\nElementDataFile = LOCAL\n",
        ];
        for case in cases {
            assert!(matches!(
                parse_header(case),
                Err(Error::ResourceUnavailable(VolumeLoaderError::MetaImage(_)))
            ));
        }
    }

    #[test]
    fn truncated_data_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.mha");
        fs::write(
            &path,
            b"NDims = 3\nDimSize = 2 2 2\nElementType = MET_SHORT\nElementDataFile = LOCAL\n\x01\x00",
        )
        .unwrap();
        assert!(read(&path).is_err());
    }

    #[test]
    fn oversized_dimensions_are_a_header_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.mha");
        fs::write(
            &path,
            b"NDims = 3\nDimSize = 4294967296 4294967296 2\nElementType = MET_SHORT\nElementDataFile = LOCAL\n\x01\x00",
        )
        .unwrap();
        let err = read(&path).unwrap_err();
        assert!(
            matches!(
                &err,
                Error::ResourceUnavailable(VolumeLoaderError::MetaImage(reason)) if reason.contains("too large")
            ),
            "{err}"
        );
    }
}
