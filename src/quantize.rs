//! Float truncation ("zerobits").
//!
//! An IEEE-754 single is laid out as `seeeeeeeefffffffffffffffffffffff`.
//! Clearing the low bits of the fraction loses precision but makes runs of
//! similar values compress far better once shuffled.

/// Largest accepted bit count; clearing all 32 bits would erase the value.
pub const MAX_ZEROBITS: u32 = 31;

/// Bit mask keeping everything but the low `zerobits` bits.
#[inline]
pub fn mask(zerobits: u32) -> u32 {
    debug_assert!(zerobits <= MAX_ZEROBITS);
    u32::MAX << zerobits
}

/// Clear the low `zerobits` bits of `v`'s bit pattern.
#[inline]
pub fn truncate(v: f32, zerobits: u32) -> f32 {
    if zerobits == 0 {
        return v;
    }
    f32::from_bits(v.to_bits() & mask(zerobits))
}
