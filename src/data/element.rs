use crate::error::{Error, Result};
use bytemuck::Pod;
use num_traits::{Bounded, NumCast, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of numeric element types a pixel buffer may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl ElementType {
    pub const ALL: [ElementType; 10] = [
        ElementType::U8,
        ElementType::I8,
        ElementType::U16,
        ElementType::I16,
        ElementType::U32,
        ElementType::I32,
        ElementType::U64,
        ElementType::I64,
        ElementType::F32,
        ElementType::F64,
    ];

    /// Decode the numeric tag used at the foreign boundary (1..=10)
    pub fn from_tag(tag: u32) -> Result<Self> {
        match tag {
            1..=10 => Ok(Self::ALL[(tag - 1) as usize]),
            _ => Err(Error::UnsupportedElementType(tag)),
        }
    }

    pub fn tag(self) -> u32 {
        match self {
            Self::U8 => 1,
            Self::I8 => 2,
            Self::U16 => 3,
            Self::I16 => 4,
            Self::U32 => 5,
            Self::I32 => 6,
            Self::U64 => 7,
            Self::I64 => 8,
            Self::F32 => 9,
            Self::F64 => 10,
        }
    }

    pub fn byte_size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Element type name in MetaImage headers
    pub fn meta_name(self) -> &'static str {
        match self {
            Self::U8 => "MET_UCHAR",
            Self::I8 => "MET_CHAR",
            Self::U16 => "MET_USHORT",
            Self::I16 => "MET_SHORT",
            Self::U32 => "MET_UINT",
            Self::I32 => "MET_INT",
            Self::U64 => "MET_ULONG_LONG",
            Self::I64 => "MET_LONG_LONG",
            Self::F32 => "MET_FLOAT",
            Self::F64 => "MET_DOUBLE",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::U64 => "u64",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// A numeric pixel value
pub trait Pixel:
    Pod + Bounded + NumCast + ToPrimitive + Zero + PartialEq + fmt::Debug + Send + Sync + 'static
{
    const ELEMENT_TYPE: ElementType;

    fn as_f64(self) -> f64 {
        ToPrimitive::to_f64(&self).unwrap_or(0.0)
    }

    /// Convert back from the interpolation domain. Integers are rounded and
    /// saturated at the type bounds; NaN maps to zero.
    fn saturate_from(value: f64) -> Self {
        if value.is_nan() {
            return Self::zero();
        }
        let value = if Self::ELEMENT_TYPE.is_float() {
            value
        } else {
            value.round()
        };
        match <Self as NumCast>::from(value) {
            Some(v) => v,
            None if value > 0.0 => Self::max_value(),
            None => Self::min_value(),
        }
    }
}

macro_rules! impl_pixel {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl Pixel for $t {
                const ELEMENT_TYPE: ElementType = ElementType::$variant;
            }
        )*
    };
}

impl_pixel! {
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    f32 => F32,
    f64 => F64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for element in ElementType::ALL {
            assert_eq!(ElementType::from_tag(element.tag()).unwrap(), element);
        }
    }

    #[test]
    fn unknown_tags_are_rejected() {
        assert!(matches!(
            ElementType::from_tag(0),
            Err(Error::UnsupportedElementType(0))
        ));
        assert!(matches!(
            ElementType::from_tag(11),
            Err(Error::UnsupportedElementType(11))
        ));
    }

    #[test]
    fn integer_conversion_saturates() {
        assert_eq!(u8::saturate_from(300.2), 255);
        assert_eq!(u8::saturate_from(-4.0), 0);
        assert_eq!(i8::saturate_from(-200.0), -128);
        assert_eq!(u16::saturate_from(1.5), 2);
        assert_eq!(i32::saturate_from(f64::NAN), 0);
        assert_eq!(u64::saturate_from(1e30), u64::MAX);
    }

    #[test]
    fn float_conversion_keeps_fraction() {
        assert_eq!(f32::saturate_from(1.25), 1.25);
        assert_eq!(f64::saturate_from(-0.5), -0.5);
    }

    #[test]
    fn byte_sizes_match_primitives() {
        assert_eq!(ElementType::U8.byte_size(), std::mem::size_of::<u8>());
        assert_eq!(ElementType::I64.byte_size(), std::mem::size_of::<i64>());
        assert_eq!(ElementType::F32.byte_size(), std::mem::size_of::<f32>());
    }
}
