//! Text rendering of samples for the output file.

use crate::sample::Sample;
use std::fmt::Write;

/// First line of every output file.
pub const HEADER: &str = "frameTime,vectorA x,vectorA y,vectorB x,vectorB y\n";

/// Fixed-point rendering for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precision {
    pub digits: usize,
    /// Keep trailing zeros so every value has exactly `digits` decimals
    pub force_digits: bool,
}

impl Precision {
    pub fn new(digits: usize, force_digits: bool) -> Self {
        Self { digits, force_digits }
    }

    /// Render `value` into `out`, rounding halves away from zero.
    pub fn write_value(&self, out: &mut String, value: f64) {
        let start = out.len();
        let value = if is_tie(value, self.digits) {
            // Next representable value away from zero rounds the same way a
            // decimal "half up" would; the sign bit is untouched.
            f64::from_bits(value.to_bits() + 1)
        } else {
            value
        };
        // Writing into a String cannot fail.
        let _ = write!(out, "{:.*}", self.digits, value);

        if !self.force_digits && out[start..].contains('.') {
            let trimmed = out[start..].trim_end_matches('0').trim_end_matches('.').len();
            out.truncate(start + trimmed);
        }

        // "-0", "-0.00" and friends
        if out[start..].starts_with('-') && out[start + 1..].bytes().all(|b| b == b'0' || b == b'.') {
            out.remove(start);
        }
    }

    pub fn format(&self, value: f64) -> String {
        let mut out = String::new();
        self.write_value(&mut out, value);
        out
    }
}

/// Whether `value` sits exactly halfway between two `digits`-place decimals.
///
/// A finite double `m * 2^-k` with odd `m` has exactly `k` fractional decimal
/// digits and the last one is always 5, so it is a tie exactly when
/// `k == digits + 1`.
fn is_tie(value: f64, digits: usize) -> bool {
    let bits = value.to_bits();
    let biased_exp = ((bits >> 52) & 0x7ff) as i64;
    let mut mantissa = bits & ((1u64 << 52) - 1);
    if biased_exp == 0x7ff {
        return false;
    }
    let exp = if biased_exp == 0 {
        -1074
    } else {
        mantissa |= 1u64 << 52;
        biased_exp - 1075
    };
    if mantissa == 0 {
        return false;
    }
    let exp = exp + i64::from(mantissa.trailing_zeros());
    exp < 0 && (-exp) as u64 == digits as u64 + 1
}

/// Renders batches of samples as quoted, comma-separated records.
#[derive(Debug, Clone, Copy)]
pub struct RecordFormatter {
    time: Precision,
    vector: Precision,
}

impl RecordFormatter {
    pub fn new(time_digits: usize, vector_digits: usize, force_digits: bool) -> Self {
        Self {
            time: Precision::new(time_digits, force_digits),
            vector: Precision::new(vector_digits, force_digits),
        }
    }

    /// Append one newline-terminated record for `sample` to `out`.
    pub fn write_record(&self, out: &mut String, sample: &Sample) {
        out.push('"');
        self.time.write_value(out, sample.timestamp);
        for value in [
            sample.vector_a.0,
            sample.vector_a.1,
            sample.vector_b.0,
            sample.vector_b.1,
        ] {
            out.push_str("\",\"");
            self.vector.write_value(out, value);
        }
        out.push_str("\"\n");
    }

    /// Render a whole batch into one block, ready for a single append.
    pub fn format_batch<'a, I>(&self, samples: I) -> String
    where
        I: IntoIterator<Item = &'a Sample>,
    {
        let mut out = String::new();
        for sample in samples {
            self.write_record(&mut out, sample);
        }
        out
    }
}
