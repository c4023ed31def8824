//! 128-bit decimal number stored as four 32-bit words.

use std::fmt;

const SIGN_MASK: u32 = 0x8000_0000;
const SCALE_MASK: u32 = 0x00FF_0000;
const SCALE_SHIFT: u32 = 16;

/// The largest supported scale.
pub const MAX_SCALE: u32 = 28;

/// [`Decimal`] is a 96-bit unsigned mantissa, a sign and a power-of-ten scale.
///
/// The layout is the classic `lo`, `mid`, `hi`, `flags` quadruple: bits 16 to 23 of `flags` hold
/// the scale and bit 31 holds the sign. Equality is bitwise, so `1.0` and `1.00` are different
/// values; use [`Decimal::numeric_eq`] to compare numerically.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Decimal {
    lo: u32,
    mid: u32,
    hi: u32,
    flags: u32,
}

impl Decimal {
    /// Zero with a scale of zero.
    pub const ZERO: Decimal = Decimal {
        lo: 0,
        mid: 0,
        hi: 0,
        flags: 0,
    };

    /// Creates a [`Decimal`] from its parts.
    ///
    /// Returns `None` if `scale` is greater than [`MAX_SCALE`].
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::Decimal;
    ///
    /// let d = Decimal::from_parts(12345, 0, 0, true, 2).unwrap();
    /// assert_eq!(d.to_string(), "-123.45");
    /// assert!(Decimal::from_parts(1, 0, 0, false, 29).is_none());
    /// ```
    #[must_use]
    pub const fn from_parts(lo: u32, mid: u32, hi: u32, negative: bool, scale: u32) -> Option<Self> {
        if scale > MAX_SCALE {
            return None;
        }
        let sign = if negative { SIGN_MASK } else { 0 };
        Some(Self {
            lo,
            mid,
            hi,
            flags: sign | (scale << SCALE_SHIFT),
        })
    }

    /// Creates a [`Decimal`] from its four words in `lo`, `mid`, `hi`, `flags` order.
    ///
    /// Returns `None` if `flags` has bits set outside of the sign and scale fields, or the scale is
    /// out of range.
    #[must_use]
    pub const fn from_words(words: [u32; 4]) -> Option<Self> {
        let flags = words[3];
        if flags & !(SIGN_MASK | SCALE_MASK) != 0 || (flags & SCALE_MASK) >> SCALE_SHIFT > MAX_SCALE
        {
            return None;
        }
        Some(Self {
            lo: words[0],
            mid: words[1],
            hi: words[2],
            flags,
        })
    }

    /// Returns the four words in `lo`, `mid`, `hi`, `flags` order.
    #[must_use]
    pub const fn words(&self) -> [u32; 4] {
        [self.lo, self.mid, self.hi, self.flags]
    }

    /// Returns the 96-bit mantissa.
    #[must_use]
    pub const fn mantissa(&self) -> u128 {
        ((self.hi as u128) << 64) | ((self.mid as u128) << 32) | self.lo as u128
    }

    /// Returns the power-of-ten scale.
    #[must_use]
    pub const fn scale(&self) -> u32 {
        (self.flags & SCALE_MASK) >> SCALE_SHIFT
    }

    /// Returns `true` if the sign bit is set.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.flags & SIGN_MASK != 0
    }

    /// Returns `true` if the mantissa is zero, regardless of sign and scale.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.lo == 0 && self.mid == 0 && self.hi == 0
    }

    /// Compares two decimals by their numeric value.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::Decimal;
    ///
    /// let a = Decimal::from_parts(10, 0, 0, false, 1).unwrap();
    /// let b = Decimal::from(1_i64);
    /// assert_ne!(a, b);
    /// assert!(a.numeric_eq(&b));
    /// ```
    #[must_use]
    pub fn numeric_eq(&self, other: &Self) -> bool {
        if self.is_zero() || other.is_zero() {
            return self.is_zero() && other.is_zero();
        }
        if self.is_negative() != other.is_negative() {
            return false;
        }
        let (mut a, mut b) = (self.mantissa(), other.mantissa());
        let (sa, sb) = (self.scale(), other.scale());
        // Scale the larger-scale side down; scaling up could overflow 128 bits.
        let (low, high, diff) = if sa < sb {
            (&mut a, &mut b, sb - sa)
        } else {
            (&mut b, &mut a, sa - sb)
        };
        for _ in 0..diff {
            if *high % 10 != 0 {
                return false;
            }
            *high /= 10;
        }
        low == high
    }
}

impl From<i64> for Decimal {
    #[inline]
    fn from(value: i64) -> Self {
        let magnitude = value.unsigned_abs();
        Self {
            lo: (magnitude & 0xFFFF_FFFF) as u32,
            mid: (magnitude >> 32) as u32,
            hi: 0,
            flags: if value < 0 { SIGN_MASK } else { 0 },
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa().to_string();
        let scale = self.scale() as usize;
        if self.is_negative() && !self.is_zero() {
            f.write_str("-")?;
        }
        if scale == 0 {
            return f.write_str(&digits);
        }
        if digits.len() > scale {
            let (int, frac) = digits.split_at(digits.len() - scale);
            write!(f, "{int}.{frac}")
        } else {
            write!(f, "0.{}{digits}", "0".repeat(scale - digits.len()))
        }
    }
}
