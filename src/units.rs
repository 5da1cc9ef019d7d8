//! Unit codes stored in column descriptors.
//!
//! A code has two 16-bit halves.  The high half names a unit family; the low
//! half is a bitfield of conversion factors relative to the family's base
//! unit, so a reader can convert between related units without knowing every
//! code:
//!
//! | bit | factor                 |
//! |-----|------------------------|
//! | 1   | degrees (vs radians)   |
//! | 2   | 1/60                   |
//! | 4   | 1/60                   |
//! | 8   | per day (vs per year)  |
//!
//! These values are baked into published tiles and must never change.

use std::fmt;

const DD2R: f64 = std::f64::consts::PI / 180.0;
const DR2D: f64 = 180.0 / std::f64::consts::PI;
const DAYS_PER_YEAR: f64 = 365.25;

const FLAG_DEG: u32 = 1;
const FLAG_DIV60_A: u32 = 2;
const FLAG_DIV60_B: u32 = 4;
const FLAG_PER_DAY: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Unit(pub u32);

impl Unit {
    pub const NONE: Unit = Unit(0);
    pub const RAD: Unit = Unit(1 << 16);
    pub const DEG: Unit = Unit(Self::RAD.0 | FLAG_DEG);
    pub const ARCMIN: Unit = Unit(Self::DEG.0 | FLAG_DIV60_A);
    pub const VMAG: Unit = Unit(3 << 16);
    /// Arc seconds, as written by the star survey tools.
    pub const ARCSEC: Unit = Unit(5 << 16 | FLAG_DEG | FLAG_DIV60_A | FLAG_DIV60_B);
    pub const RAD_PER_YEAR: Unit = Unit(7 << 16);

    #[inline]
    pub fn code(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Name used in JSON schemas and diagnostics.
    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            Unit::NONE => "none",
            Unit::RAD => "rad",
            Unit::DEG => "deg",
            Unit::ARCMIN => "arcmin",
            Unit::ARCSEC => "arcsec",
            Unit::VMAG => "vmag",
            Unit::RAD_PER_YEAR => "rad/year",
            _ => return None,
        })
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" | "" => Some(Unit::NONE),
            "rad" => Some(Unit::RAD),
            "deg" => Some(Unit::DEG),
            "arcmin" => Some(Unit::ARCMIN),
            "arcsec" => Some(Unit::ARCSEC),
            "vmag" | "mag" => Some(Unit::VMAG),
            "rad/year" | "rad_per_year" => Some(Unit::RAD_PER_YEAR),
            _ => None,
        }
    }

    /// Convert `v` expressed in `self` into `dst`.
    ///
    /// Only the factor bits are looked at; converting between unrelated
    /// families is meaningless and not detected.  A `dst` of `NONE` keeps
    /// the stored value.
    pub fn convert(self, dst: Unit, mut v: f64) -> f64 {
        if dst.is_none() || self == dst {
            return v;
        }
        let (src, dst) = (self.0, dst.0);
        let has = |u: u32, flag: u32| u & flag != 0;

        if has(src, FLAG_DEG) && !has(dst, FLAG_DEG) { v *= DD2R; }
        if !has(src, FLAG_DEG) && has(dst, FLAG_DEG) { v *= DR2D; }
        for flag in [FLAG_DIV60_A, FLAG_DIV60_B] {
            if has(src, flag) && !has(dst, flag) { v /= 60.0; }
            if !has(src, flag) && has(dst, flag) { v *= 60.0; }
        }
        if has(src, FLAG_PER_DAY) && !has(dst, FLAG_PER_DAY) { v *= DAYS_PER_YEAR; }
        if !has(src, FLAG_PER_DAY) && has(dst, FLAG_PER_DAY) { v /= DAYS_PER_YEAR; }
        v
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(n) => f.write_str(n),
            None => write!(f, "{:#x}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-12 * b.abs().max(1.0)
    }

    #[test]
    fn codes_are_frozen() {
        assert_eq!(Unit::RAD.code(), 65536);
        assert_eq!(Unit::VMAG.code(), 196608);
        assert_eq!(Unit::ARCSEC.code(), 327687);
        assert_eq!(Unit::RAD_PER_YEAR.code(), 458752);
        assert_eq!(Unit::DEG.code(), 65537);
        assert_eq!(Unit::ARCMIN.code(), 65539);
    }

    #[test]
    fn arcsec_to_rad() {
        let v = Unit::ARCSEC.convert(Unit::RAD, 3600.0);
        assert!(close(v, DD2R));
        let back = Unit::RAD.convert(Unit::ARCSEC, v);
        assert!(close(back, 3600.0));
    }

    #[test]
    fn deg_and_arcmin() {
        assert!(close(Unit::DEG.convert(Unit::ARCMIN, 1.5), 90.0));
        assert!(close(Unit::RAD.convert(Unit::DEG, std::f64::consts::PI), 180.0));
    }

    #[test]
    fn per_day_flag() {
        let rad_per_day = Unit(Unit::RAD_PER_YEAR.0 | FLAG_PER_DAY);
        assert!(close(Unit::RAD_PER_YEAR.convert(rad_per_day, 365.25), 1.0));
        assert!(close(rad_per_day.convert(Unit::RAD_PER_YEAR, 2.0), 730.5));

        let deg_per_day = Unit(Unit::RAD_PER_YEAR.0 | FLAG_DEG | FLAG_PER_DAY);
        let v = deg_per_day.convert(Unit::RAD_PER_YEAR, 1.0);
        assert!(close(v, DD2R * DAYS_PER_YEAR));
        assert!(close(Unit::RAD_PER_YEAR.convert(deg_per_day, v), 1.0));
    }

    #[test]
    fn none_or_same_unit_is_identity() {
        assert_eq!(Unit::ARCSEC.convert(Unit::NONE, 12.5), 12.5);
        assert_eq!(Unit::VMAG.convert(Unit::VMAG, -1.25), -1.25);
    }

    #[test]
    fn names_round_trip() {
        for u in [Unit::NONE, Unit::RAD, Unit::DEG, Unit::ARCMIN,
                  Unit::ARCSEC, Unit::VMAG, Unit::RAD_PER_YEAR] {
            assert_eq!(Unit::from_name(u.name().unwrap()), Some(u));
        }
        assert_eq!(Unit(42).to_string(), "0x2a");
    }
}
