//! Element types for arrayflow arrays
//!
//! Every [`NamedArray`](crate::store::NamedArray) stores one homogeneous
//! element type drawn from a fixed set. This module holds the runtime tag
//! ([`ElementType`]), the sealed compile-time counterpart ([`Element`]), and
//! the two dispatch tools that bridge them:
//!
//! - [`ElementVisitor`] - implement once, get called back with the concrete type
//! - [`with_element_type!`](crate::with_element_type) - inline match that binds a type alias
//!
//! # Supported Types
//!
//! - Signed integers: i8, i16, i32, i64
//! - Unsigned integers: u8, u16, u32, u64
//! - Floating point: f32, f64
//! - Boolean values

use crate::store::array::{Buffer, Column};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::str::FromStr;

/// Runtime tag for the element type of an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    #[default]
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    Bool,
}

impl ElementType {
    /// Returns the size in bytes of one element
    pub fn size_bytes(&self) -> usize {
        match self {
            ElementType::Int8 | ElementType::UInt8 | ElementType::Bool => 1,
            ElementType::Int16 | ElementType::UInt16 => 2,
            ElementType::Int32 | ElementType::UInt32 | ElementType::Float32 => 4,
            ElementType::Int64 | ElementType::UInt64 | ElementType::Float64 => 8,
        }
    }

    /// Get all element types
    pub fn all() -> &'static [ElementType] {
        &[
            ElementType::Int8,
            ElementType::UInt8,
            ElementType::Int16,
            ElementType::UInt16,
            ElementType::Int32,
            ElementType::UInt32,
            ElementType::Int64,
            ElementType::UInt64,
            ElementType::Float32,
            ElementType::Float64,
            ElementType::Bool,
        ]
    }

    /// Lower-case name used in pipeline files
    pub fn name(&self) -> &'static str {
        match self {
            ElementType::Int8 => "int8",
            ElementType::UInt8 => "uint8",
            ElementType::Int16 => "int16",
            ElementType::UInt16 => "uint16",
            ElementType::Int32 => "int32",
            ElementType::UInt32 => "uint32",
            ElementType::Int64 => "int64",
            ElementType::UInt64 => "uint64",
            ElementType::Float32 => "float32",
            ElementType::Float64 => "float64",
            ElementType::Bool => "bool",
        }
    }

    pub fn is_integer(&self) -> bool {
        !self.is_float() && *self != ElementType::Bool
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ElementType::Float32 | ElementType::Float64)
    }

    pub fn is_numeric(&self) -> bool {
        *self != ElementType::Bool
    }

    /// Call `visitor` with the concrete Rust type behind this tag.
    pub fn dispatch<V: ElementVisitor>(self, visitor: V) -> V::Output {
        crate::with_element_type!(self, T => visitor.visit::<T>())
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ElementType {
    type Err = String;

    /// Accepts the canonical names plus the Rust primitive spellings
    /// (`"i32"`, `"f64"`) and the C spellings `"float"` / `"double"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s.trim().to_ascii_lowercase().as_str() {
            "int8" | "i8" => ElementType::Int8,
            "uint8" | "u8" => ElementType::UInt8,
            "int16" | "i16" => ElementType::Int16,
            "uint16" | "u16" => ElementType::UInt16,
            "int32" | "i32" => ElementType::Int32,
            "uint32" | "u32" => ElementType::UInt32,
            "int64" | "i64" => ElementType::Int64,
            "uint64" | "u64" => ElementType::UInt64,
            "float32" | "f32" | "float" => ElementType::Float32,
            "float64" | "f64" | "double" => ElementType::Float64,
            "bool" | "boolean" => ElementType::Bool,
            other => return Err(format!("unknown element type '{}'", other)),
        };
        Ok(ty)
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A Rust type that can be stored in a [`NamedArray`](crate::store::NamedArray).
///
/// This trait is sealed: the set of element types is closed, which is what
/// lets [`ElementType`] dispatch exhaustively.
pub trait Element:
    sealed::Sealed + Copy + Default + PartialEq + PartialOrd + Debug + Send + Sync + 'static
{
    /// Runtime tag for this type.
    const TYPE: ElementType;

    /// Lossy widening used for comparisons and statistics.
    fn to_f64(self) -> f64;

    /// Saturating narrowing; NaN maps to the default value.
    fn from_f64(value: f64) -> Self;

    /// Parse a value written in a parameter block.
    fn parse_value(s: &str) -> Option<Self>;

    #[doc(hidden)]
    fn column(buffer: &Buffer) -> Option<&Column<Self>>;

    #[doc(hidden)]
    fn column_mut(buffer: &mut Buffer) -> Option<&mut Column<Self>>;

    #[doc(hidden)]
    fn into_buffer(column: Column<Self>) -> Buffer;
}

macro_rules! impl_numeric_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Element for $ty {
                const TYPE: ElementType = ElementType::$variant;

                fn to_f64(self) -> f64 {
                    num_traits::ToPrimitive::to_f64(&self).unwrap_or(f64::NAN)
                }

                fn from_f64(value: f64) -> Self {
                    if value.is_nan() {
                        return <$ty>::default();
                    }
                    num_traits::NumCast::from(value).unwrap_or(if value < 0.0 {
                        <$ty as num_traits::Bounded>::min_value()
                    } else {
                        <$ty as num_traits::Bounded>::max_value()
                    })
                }

                fn parse_value(s: &str) -> Option<Self> {
                    s.trim().parse::<$ty>().ok()
                }

                fn column(buffer: &Buffer) -> Option<&Column<Self>> {
                    match buffer {
                        Buffer::$variant(column) => Some(column),
                        _ => None,
                    }
                }

                fn column_mut(buffer: &mut Buffer) -> Option<&mut Column<Self>> {
                    match buffer {
                        Buffer::$variant(column) => Some(column),
                        _ => None,
                    }
                }

                fn into_buffer(column: Column<Self>) -> Buffer {
                    Buffer::$variant(column)
                }
            }
        )*
    };
}

impl_numeric_element!(
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
);

impl sealed::Sealed for bool {}

impl Element for bool {
    const TYPE: ElementType = ElementType::Bool;

    fn to_f64(self) -> f64 {
        if self {
            1.0
        } else {
            0.0
        }
    }

    fn from_f64(value: f64) -> Self {
        value != 0.0 && !value.is_nan()
    }

    fn parse_value(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }

    fn column(buffer: &Buffer) -> Option<&Column<Self>> {
        match buffer {
            Buffer::Bool(column) => Some(column),
            _ => None,
        }
    }

    fn column_mut(buffer: &mut Buffer) -> Option<&mut Column<Self>> {
        match buffer {
            Buffer::Bool(column) => Some(column),
            _ => None,
        }
    }

    fn into_buffer(column: Column<Self>) -> Buffer {
        Buffer::Bool(column)
    }
}

/// Generic callback over the concrete element type.
///
/// ```ignore
/// struct SizeOf;
/// impl ElementVisitor for SizeOf {
///     type Output = usize;
///     fn visit<T: Element>(self) -> usize {
///         std::mem::size_of::<T>()
///     }
/// }
/// assert_eq!(ElementType::Float64.dispatch(SizeOf), 8);
/// ```
pub trait ElementVisitor {
    type Output;

    fn visit<T: Element>(self) -> Self::Output;
}

/// Match on an [`ElementType`] and evaluate `$body` with `$T` bound to the
/// concrete Rust type.
///
/// ```ignore
/// let bytes = with_element_type!(ty, T => std::mem::size_of::<T>());
/// ```
#[macro_export]
macro_rules! with_element_type {
    ($ty:expr, $T:ident => $body:expr) => {
        match $ty {
            $crate::types::ElementType::Int8 => {
                type $T = i8;
                $body
            }
            $crate::types::ElementType::UInt8 => {
                type $T = u8;
                $body
            }
            $crate::types::ElementType::Int16 => {
                type $T = i16;
                $body
            }
            $crate::types::ElementType::UInt16 => {
                type $T = u16;
                $body
            }
            $crate::types::ElementType::Int32 => {
                type $T = i32;
                $body
            }
            $crate::types::ElementType::UInt32 => {
                type $T = u32;
                $body
            }
            $crate::types::ElementType::Int64 => {
                type $T = i64;
                $body
            }
            $crate::types::ElementType::UInt64 => {
                type $T = u64;
                $body
            }
            $crate::types::ElementType::Float32 => {
                type $T = f32;
                $body
            }
            $crate::types::ElementType::Float64 => {
                type $T = f64;
                $body
            }
            $crate::types::ElementType::Bool => {
                type $T = bool;
                $body
            }
        }
    };
}
