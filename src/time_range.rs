//! TAMS time-range grammar: parsing, overlap, containment, and formatting.
//!
//! A TAMS time range is `[lo_hi)` with independently toggleable brackets on
//! each end (`[`/`(` for the low end, `]`/`)` for the high end) and `lo`,
//! `hi` of the form `seconds:nanoseconds`. Omitted brackets default to
//! half-open `[lo_hi)`. This supersedes the teacher's `time_utils.rs`, which
//! only handled bare `start`/`end` timestamp strings with no bracket syntax.

use crate::error::TamsError;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// A (seconds, nanoseconds) pair, ordered lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimePoint {
    pub seconds: u64,
    pub nanoseconds: u32,
}

impl TimePoint {
    pub fn new(seconds: u64, nanoseconds: u32) -> Result<Self, TamsError> {
        if nanoseconds >= 1_000_000_000 {
            return Err(TamsError::InvalidTimerange(format!(
                "nanoseconds must be less than 1,000,000,000, got {nanoseconds}"
            )));
        }
        Ok(Self { seconds, nanoseconds })
    }

    pub fn as_seconds_f64(&self) -> f64 {
        self.seconds as f64 + (self.nanoseconds as f64) * 1e-9
    }
}

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.seconds, self.nanoseconds)
    }
}

/// A parsed TAMS time range with explicit endpoint inclusivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub lo: TimePoint,
    pub lo_inclusive: bool,
    pub hi: TimePoint,
    pub hi_inclusive: bool,
}

impl TimeRange {
    /// Parse a TAMS time-range string of the form `[lo_hi)` (brackets optional).
    pub fn parse(s: &str) -> Result<Self, TamsError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TamsError::InvalidTimerange("empty timerange".to_string()));
        }

        let (lo_inclusive, rest) = match s.chars().next() {
            Some('[') => (true, &s[1..]),
            Some('(') => (false, &s[1..]),
            _ => (true, s),
        };

        let (hi_inclusive, body) = match rest.chars().last() {
            Some(']') => (true, &rest[..rest.len() - 1]),
            Some(')') => (false, &rest[..rest.len() - 1]),
            _ => (false, rest),
        };

        let mut parts = body.splitn(2, '_');
        let lo_str = parts.next().ok_or_else(|| {
            TamsError::InvalidTimerange(format!("malformed timerange: '{s}'"))
        })?;
        let hi_str = parts.next().ok_or_else(|| {
            TamsError::InvalidTimerange(format!(
                "malformed timerange, expected 'lo_hi': '{s}'"
            ))
        })?;

        let lo = parse_timepoint(lo_str)?;
        let hi = parse_timepoint(hi_str)?;

        if hi < lo {
            return Err(TamsError::InvalidTimerange(format!(
                "timerange hi ({hi}) precedes lo ({lo})"
            )));
        }

        Ok(TimeRange {
            lo,
            lo_inclusive,
            hi,
            hi_inclusive,
        })
    }

    /// Canonical round-trip string of `parse`.
    pub fn format(&self) -> String {
        let open = if self.lo_inclusive { '[' } else { '(' };
        let close = if self.hi_inclusive { ']' } else { ')' };
        format!("{open}{}_{}{close}", self.lo, self.hi)
    }

    /// Whether `self` and `other` overlap, honoring endpoint brackets.
    ///
    /// Default half-open semantics: if `a.hi == b.lo` and either endpoint at
    /// that boundary is exclusive, there is no overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        let lo_ok = match self.lo.cmp(&other.hi) {
            Ordering::Less => true,
            Ordering::Equal => self.lo_inclusive && other.hi_inclusive,
            Ordering::Greater => false,
        };
        let hi_ok = match other.lo.cmp(&self.hi) {
            Ordering::Less => true,
            Ordering::Equal => other.lo_inclusive && self.hi_inclusive,
            Ordering::Greater => false,
        };
        lo_ok && hi_ok
    }

    /// Whether a single point falls inside this range.
    pub fn contains(&self, t: TimePoint) -> bool {
        let lo_ok = match t.cmp(&self.lo) {
            Ordering::Greater => true,
            Ordering::Equal => self.lo_inclusive,
            Ordering::Less => false,
        };
        let hi_ok = match t.cmp(&self.hi) {
            Ordering::Less => true,
            Ordering::Equal => self.hi_inclusive,
            Ordering::Greater => false,
        };
        lo_ok && hi_ok
    }

    /// Duration in real seconds (nanoseconds scaled by 1e-9).
    pub fn duration_seconds(&self) -> f64 {
        self.hi.as_seconds_f64() - self.lo.as_seconds_f64()
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

/// TAMS time ranges are carried over the wire as the canonical `[lo_hi)`
/// string (spec.md §3), not as a struct — mirror that in JSON (de)serialization.
impl Serialize for TimeRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.format())
    }
}

impl<'de> Deserialize<'de> for TimeRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        TimeRange::parse(&s).map_err(D::Error::custom)
    }
}

fn parse_timepoint(s: &str) -> Result<TimePoint, TamsError> {
    let mut parts = s.splitn(2, ':');
    let sec_str = parts
        .next()
        .ok_or_else(|| TamsError::InvalidTimerange(format!("missing seconds in '{s}'")))?;
    let nsec_str = parts
        .next()
        .ok_or_else(|| TamsError::InvalidTimerange(format!("missing nanoseconds in '{s}'")))?;

    let seconds: u64 = sec_str
        .parse()
        .map_err(|_| TamsError::InvalidTimerange(format!("invalid seconds value '{sec_str}'")))?;
    let nanoseconds: u32 = nsec_str.parse().map_err(|_| {
        TamsError::InvalidTimerange(format!("invalid nanoseconds value '{nsec_str}'"))
    })?;

    TimePoint::new(seconds, nanoseconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_half_open() {
        let tr = TimeRange::parse("0:0_3600:0").unwrap();
        assert!(tr.lo_inclusive);
        assert!(!tr.hi_inclusive);
        assert_eq!(tr.format(), "[0:0_3600:0)");
    }

    #[test]
    fn parses_explicit_brackets() {
        let tr = TimeRange::parse("(10:0_20:0]").unwrap();
        assert!(!tr.lo_inclusive);
        assert!(tr.hi_inclusive);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(TimeRange::parse("").is_err());
        assert!(TimeRange::parse("10:0").is_err());
        assert!(TimeRange::parse("10:0_5:0").is_err());
        assert!(TimeRange::parse("10:1000000000_20:0").is_err());
    }

    #[test]
    fn overlap_is_symmetric() {
        let a = TimeRange::parse("[0:0_10:0)").unwrap();
        let b = TimeRange::parse("[5:0_15:0)").unwrap();
        assert_eq!(a.overlaps(&b), b.overlaps(&a));
        assert!(a.overlaps(&b));
    }

    #[test]
    fn touching_exclusive_endpoints_do_not_overlap() {
        let a = TimeRange::parse("[0:0_10:0)").unwrap();
        let b = TimeRange::parse("[10:0_20:0)").unwrap();
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn touching_inclusive_endpoints_overlap() {
        let a = TimeRange::parse("[0:0_10:0]").unwrap();
        let b = TimeRange::parse("[10:0_20:0]").unwrap();
        assert!(a.overlaps(&b));
    }

    #[test]
    fn disjoint_ranges_never_overlap() {
        let a = TimeRange::parse("[0:0_10:0)").unwrap();
        let b = TimeRange::parse("[20:0_30:0)").unwrap();
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn contains_respects_brackets() {
        let tr = TimeRange::parse("[0:0_10:0)").unwrap();
        assert!(tr.contains(TimePoint::new(0, 0).unwrap()));
        assert!(!tr.contains(TimePoint::new(10, 0).unwrap()));
        assert!(tr.contains(TimePoint::new(9, 999_999_999).unwrap()));
    }

    #[test]
    fn duration_seconds_scales_nanoseconds() {
        let tr = TimeRange::parse("[0:0_1:500000000)").unwrap();
        assert!((tr.duration_seconds() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn format_round_trips() {
        for s in ["[0:0_3600:0)", "(10:0_20:0]", "[0:0_0:1)"] {
            let tr = TimeRange::parse(s).unwrap();
            assert_eq!(tr.format(), s);
        }
    }
}
