//! Rendering of value references and values for call traces.
//!
//! Arrays render as `{a, b, c}`. Floating point values match C's `%.16g`, integers print in
//! decimal, booleans and clocks as `0`/`1`, strings double-quoted and binary values as lower-case
//! hex pairs.

use std::{
    ffi::CStr,
    fmt::Write,
    os::raw::c_char,
};

const INITIAL_CAPACITY: usize = 1024;

/// Write `value` the way C's `printf("%.{precision}g", value)` does.
pub fn write_general(out: &mut String, value: f64, precision: usize) {
    let precision = precision.max(1);

    if value.is_nan() {
        out.push_str(if value.is_sign_negative() { "-nan" } else { "nan" });
        return;
    }
    if value.is_infinite() {
        out.push_str(if value < 0.0 { "-inf" } else { "inf" });
        return;
    }
    if value == 0.0 {
        out.push_str(if value.is_sign_negative() { "-0" } else { "0" });
        return;
    }

    // The exponent after rounding to `precision` significant digits decides the notation
    let scientific = format!("{:.*e}", precision - 1, value);
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        let _ = write!(
            out,
            "{}e{sign}{:02}",
            trim_fraction(mantissa),
            exponent.unsigned_abs()
        );
    } else {
        let decimals = (precision as i32 - 1 - exponent) as usize;
        let fixed = format!("{value:.decimals$}");
        out.push_str(trim_fraction(&fixed));
    }
}

/// Displays a float the way C's `%.16g` does
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct G16(pub f64);

impl std::fmt::Display for G16 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = String::new();
        write_general(&mut out, self.0, 16);
        f.write_str(&out)
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// A value that can appear in a call trace
pub trait TraceValue {
    fn write_trace(&self, out: &mut String);
}

impl TraceValue for f64 {
    fn write_trace(&self, out: &mut String) {
        write_general(out, *self, 16);
    }
}

impl TraceValue for f32 {
    fn write_trace(&self, out: &mut String) {
        write_general(out, *self as f64, 16);
    }
}

macro_rules! impl_trace_integer {
    ($($ty:ty),*) => {
        $(
            impl TraceValue for $ty {
                fn write_trace(&self, out: &mut String) {
                    let _ = write!(out, "{self}");
                }
            }
        )*
    };
}

impl_trace_integer!(i8, u8, i16, u16, i32, u32, i64, u64, usize);

impl TraceValue for bool {
    fn write_trace(&self, out: &mut String) {
        out.push(if *self { '1' } else { '0' });
    }
}

impl TraceValue for str {
    fn write_trace(&self, out: &mut String) {
        out.push('"');
        out.push_str(self);
        out.push('"');
    }
}

impl TraceValue for String {
    fn write_trace(&self, out: &mut String) {
        self.as_str().write_trace(out)
    }
}

impl<T: TraceValue + ?Sized> TraceValue for &T {
    fn write_trace(&self, out: &mut String) {
        (**self).write_trace(out)
    }
}

/// A C string pointer as handed across the ABI; null renders as `(null)`.
impl TraceValue for *const c_char {
    fn write_trace(&self, out: &mut String) {
        if self.is_null() {
            out.push_str("(null)");
        } else {
            unsafe { CStr::from_ptr(*self) }
                .to_string_lossy()
                .as_ref()
                .write_trace(out)
        }
    }
}

/// A binary value, rendered as lower-case hex pairs
pub struct Binary<'a>(pub &'a [u8]);

impl TraceValue for Binary<'_> {
    fn write_trace(&self, out: &mut String) {
        for byte in self.0 {
            let _ = write!(out, "{byte:02x}");
        }
    }
}

fn write_array<T: TraceValue>(out: &mut String, items: impl IntoIterator<Item = T>) {
    out.clear();
    out.push('{');
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        item.write_trace(out);
    }
    out.push('}');
}

/// Two reusable buffers, one for value references and one for values.
///
/// The buffers grow as needed and keep their capacity between calls.
#[derive(Debug)]
pub struct Formatter {
    references: String,
    values: String,
}

impl Default for Formatter {
    fn default() -> Self {
        Self {
            references: String::with_capacity(INITIAL_CAPACITY),
            values: String::with_capacity(INITIAL_CAPACITY),
        }
    }
}

impl Formatter {
    pub fn value_references(&mut self, vrs: &[u32]) -> &str {
        write_array(&mut self.references, vrs);
        &self.references
    }

    pub fn values<T: TraceValue>(&mut self, values: &[T]) -> &str {
        write_array(&mut self.values, values);
        &self.values
    }

    /// Render both arrays at once, returning `(value_references, values)`.
    pub fn format<T: TraceValue>(&mut self, vrs: &[u32], values: &[T]) -> (&str, &str) {
        write_array(&mut self.references, vrs);
        write_array(&mut self.values, values);
        (&self.references, &self.values)
    }

    /// Render binary values, one hex string per value
    pub fn binaries(&mut self, values: &[&[u8]]) -> &str {
        write_array(&mut self.values, values.iter().map(|&v| Binary(v)));
        &self.values
    }

    pub fn capacity(&self) -> (usize, usize) {
        (self.references.capacity(), self.values.capacity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g16(value: f64) -> String {
        let mut out = String::new();
        write_general(&mut out, value, 16);
        out
    }

    #[test]
    fn test_general_format_matches_printf() {
        assert_eq!(g16(1.5), "1.5");
        assert_eq!(g16(2.0), "2");
        assert_eq!(g16(-2.5), "-2.5");
        assert_eq!(g16(0.1), "0.1");
        assert_eq!(g16(100.0), "100");
        assert_eq!(g16(1.0 / 3.0), "0.3333333333333333");
        assert_eq!(g16(0.0001), "0.0001");
        assert_eq!(g16(1e-5), "1e-05");
        assert_eq!(g16(1e16), "1e+16");
        assert_eq!(g16(123456789012345678.0), "1.234567890123457e+17");
        assert_eq!(g16(9.81), "9.81");
        assert_eq!(g16(1e300), "1e+300");
        assert_eq!(g16(0.0), "0");
        assert_eq!(g16(-0.0), "-0");
        assert_eq!(g16(f64::INFINITY), "inf");
        assert_eq!(g16(f64::NAN), "nan");
    }

    #[test]
    fn test_display_wrapper() {
        // 16 significant digits drop the representation error of 0.1 + 0.2
        assert_eq!(format!("t={}", G16(0.1 + 0.2)), "t=0.3");
        assert_eq!(G16(1.0 / 3.0).to_string(), "0.3333333333333333");
        assert_eq!(G16(1e-7).to_string(), "1e-07");

        let mut out = String::new();
        write_general(&mut out, 0.1 + 0.2, 17);
        assert_eq!(out, "0.30000000000000004");
    }

    #[test]
    fn test_arrays() {
        let mut fmt = Formatter::default();
        let (vrs, values) = fmt.format(&[1, 2], &[1.5, 2.0]);
        assert_eq!(vrs, "{1, 2}");
        assert_eq!(values, "{1.5, 2}");

        assert_eq!(fmt.values(&[true, false]), "{1, 0}");
        assert_eq!(fmt.values(&[-3i8, 7]), "{-3, 7}");
        assert_eq!(fmt.values(&[u64::MAX]), "{18446744073709551615}");
        assert_eq!(fmt.values(&["a", "b c"]), r#"{"a", "b c"}"#);
        assert_eq!(fmt.binaries(&[&[0x0f, 0xa0], &[]]), "{0fa0, }");
        assert_eq!(fmt.value_references(&[]), "{}");
    }

    #[test]
    fn test_c_strings() {
        let mut fmt = Formatter::default();
        let ptrs = [c"x".as_ptr(), std::ptr::null()];
        assert_eq!(fmt.values(&ptrs), r#"{"x", (null)}"#);
    }

    #[test]
    fn test_buffers_grow_and_keep_capacity() {
        let mut fmt = Formatter::default();
        let many: Vec<u32> = (0..1000).collect();
        let rendered = fmt.value_references(&many).len();
        assert!(rendered > INITIAL_CAPACITY);

        let (grown, _) = fmt.capacity();
        fmt.value_references(&[1]);
        assert_eq!(fmt.capacity().0, grown);
    }
}
