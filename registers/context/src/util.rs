// Licensed under the Apache-2.0 license

//! Bit, access and data-type helpers used by the context builder.

use serde::{Serialize, Serializer};

/// Mask of `width` ones starting at bit 0.
///
/// # Examples
/// ```
/// use registers_context::util::bitmask;
/// assert_eq!(bitmask(4), 0xf);
/// assert_eq!(bitmask(64), u64::MAX);
/// ```
pub fn bitmask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Interpret the low 32 bits of `value` as a two's-complement number.
pub fn to_int32(value: u64) -> i64 {
    (value as u32) as i32 as i64
}

/// Number of address bits needed to cover `size` bytes, `ceil(log2(size))`.
pub fn addr_width(size: u64) -> u32 {
    if size <= 1 {
        0
    } else {
        64 - (size - 1).leading_zeros()
    }
}

/// Lowercase hex with a `0x` prefix, sign in front for negative values.
///
/// # Examples
/// ```
/// use registers_context::util::hex_string;
/// assert_eq!(hex_string(0), "0x0");
/// assert_eq!(hex_string(255), "0xff");
/// assert_eq!(hex_string(-1), "-0x1");
/// ```
pub fn hex_string(val: i64) -> String {
    if val < 0 {
        format!("-0x{:x}", val.unsigned_abs())
    } else {
        format!("0x{val:x}")
    }
}

/// Access mode of a register, memory or field as seen from one side of the bus.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum AccessMode {
    RO,
    WO,
    RW,
}

impl AccessMode {
    /// Read-only when nothing is writable, write-only when nothing is
    /// readable, read-write otherwise (including no access at all).
    pub fn from_access(readable: bool, writable: bool) -> AccessMode {
        match (readable, writable) {
            (true, false) => AccessMode::RO,
            (false, true) => AccessMode::WO,
            _ => AccessMode::RW,
        }
    }
}

/// Fixed-point classification of a data-type tag.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub enum FixedPoint {
    /// Plain integer.
    #[default]
    None,
    /// `fixed` without a scale.
    Unscaled,
    /// `fixedN` or `fixed-N`.
    Scale(i32),
    /// `float`.
    Ieee754,
}

impl Serialize for FixedPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FixedPoint::None => serializer.serialize_i32(0),
            FixedPoint::Unscaled => serializer.serialize_str(""),
            FixedPoint::Scale(n) => serializer.serialize_i32(*n),
            FixedPoint::Ieee754 => serializer.serialize_str("IEEE754"),
        }
    }
}

/// Signed when the tag starts with `int` or `fixed`, case-insensitive.
pub fn data_type_signed(data_type: &str) -> bool {
    let tag = data_type.to_ascii_lowercase();
    tag.starts_with("int") || tag.starts_with("fixed")
}

/// Fixed-point scale from the last `fixed[-]N` in the tag, or `float`.
pub fn data_type_fixed(data_type: &str) -> FixedPoint {
    let tag = data_type.to_ascii_lowercase();
    if let Some(pos) = tag.rfind("fixed") {
        let rest = &tag[pos + "fixed".len()..];
        let (negative, rest) = match rest.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, rest),
        };
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        return match digits.parse::<i32>() {
            Ok(n) if negative => FixedPoint::Scale(-n),
            Ok(n) => FixedPoint::Scale(n),
            Err(_) => FixedPoint::Unscaled,
        };
    }
    if tag == "float" {
        return FixedPoint::Ieee754;
    }
    FixedPoint::None
}
