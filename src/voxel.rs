use crate::enums::ScalarDomain;

/// Scalar storage type of a volume.
///
/// Conversions go through `f64`, which represents every supported type
/// exactly. `from_f64` returns `None` when the value does not fit.
pub trait Voxel: Copy + Default + PartialOrd + Send + Sync + 'static {
    const NAME: &'static str;
    const DOMAIN: ScalarDomain;

    fn to_f64(self) -> f64;

    fn from_f64(value: f64) -> Option<Self>;
}

macro_rules! integral_voxel {
    ($($ty:ty => $name:literal),* $(,)?) => {$(
        impl Voxel for $ty {
            const NAME: &'static str = $name;
            const DOMAIN: ScalarDomain = ScalarDomain::Integral;

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(value: f64) -> Option<Self> {
                let rounded = value.round();
                if rounded.is_finite()
                    && rounded >= <$ty>::MIN as f64
                    && rounded <= <$ty>::MAX as f64
                {
                    Some(rounded as $ty)
                } else {
                    None
                }
            }
        }
    )*};
}

integral_voxel!(
    u8 => "u8",
    i8 => "i8",
    u16 => "u16",
    i16 => "i16",
    u32 => "u32",
    i32 => "i32",
);

impl Voxel for f32 {
    const NAME: &'static str = "f32";
    const DOMAIN: ScalarDomain = ScalarDomain::Floating;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(value: f64) -> Option<Self> {
        if value.is_finite() && value.abs() <= f32::MAX as f64 {
            Some(value as f32)
        } else {
            None
        }
    }
}

impl Voxel for f64 {
    const NAME: &'static str = "f64";
    const DOMAIN: ScalarDomain = ScalarDomain::Floating;

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn from_f64(value: f64) -> Option<Self> {
        value.is_finite().then_some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_conversion_rounds_and_checks_range() {
        assert_eq!(i16::from_f64(254.6), Some(255));
        assert_eq!(i16::from_f64(-32768.0), Some(i16::MIN));
        assert_eq!(i16::from_f64(32768.0), None);
        assert_eq!(u8::from_f64(-1.0), None);
        assert_eq!(i16::from_f64(f64::NAN), None);
    }

    #[test]
    fn float_conversion_rejects_non_finite() {
        assert_eq!(f32::from_f64(1500.0), Some(1500.0));
        assert_eq!(f32::from_f64(f64::INFINITY), None);
        assert_eq!(f32::from_f64(1e300), None);
    }
}
