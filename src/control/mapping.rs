//! Linear and logarithmic range mapping with clamping.
//!
//! Pure functions on `i32` inputs, evaluated in `f64` and truncated toward
//! zero.  Used to turn a filtered 16-bit reading into pulse width (linear)
//! and off time (logarithmic, for finer control at the short end).

/// Full-scale raw input range.
pub const RAW_MIN: i32 = 0;
pub const RAW_MAX: i32 = u16::MAX as i32;

/// Default steepness of the off-time curve.
pub const DEFAULT_AGGRESSION: f64 = 1.5;

/// Scale `value` from `[in_min, in_max]` to `[out_min, out_max]`.
///
/// The input is clamped first, so the result always lies in the output
/// range.  A degenerate input range yields `out_min`.
pub fn map_linear(value: i32, in_min: i32, in_max: i32, out_min: i32, out_max: i32) -> i32 {
    if in_min == in_max {
        return out_min;
    }
    let v = f64::from(value.clamp(in_min.min(in_max), in_max.max(in_min)));
    let span_in = f64::from(in_max) - f64::from(in_min);
    let span_out = f64::from(out_max) - f64::from(out_min);
    let scaled = (v - f64::from(in_min)) * span_out / span_in + f64::from(out_min);
    clamp_out(scaled.trunc() as i32, out_min, out_max)
}

/// Logarithmic scale of `value` from `[in_min, in_max]` to
/// `[out_min, out_max]`.
///
/// `aggression` multiplies the base-10 exponent span: 1.0 reaches
/// `out_max` exactly at `in_max`, larger values reach the top of the
/// range earlier and clip there.  Below 1.0 the top is never reached,
/// which is why configuration rejects it.
pub fn map_log(
    value: i32,
    in_min: i32,
    in_max: i32,
    out_min: i32,
    out_max: i32,
    aggression: f64,
) -> i32 {
    if in_min == in_max {
        return out_min;
    }
    let v = f64::from(value.clamp(in_min.min(in_max), in_max.max(in_min)));
    let log_lo = (f64::from(out_min) + 1.0).log10();
    let log_hi = (f64::from(out_max) + 1.0).log10();
    let scale = (log_hi - log_lo) * aggression / (f64::from(in_max) - f64::from(in_min));
    let result = 10f64.powf((v - f64::from(in_min)) * scale + log_lo) - 1.0;
    if !result.is_finite() {
        return out_min;
    }
    clamp_out((result + TRUNC_EPSILON).trunc() as i32, out_min, out_max)
}

/// Absorbs `powf` rounding so a whole-number result is not truncated one short.
const TRUNC_EPSILON: f64 = 1e-6;

fn clamp_out(v: i32, out_min: i32, out_max: i32) -> i32 {
    v.clamp(out_min.min(out_max), out_max.max(out_min))
}

/// Pulse width for a filtered raw reading.
pub fn pulse_width_ms(raw: u16) -> i32 {
    map_linear(i32::from(raw), RAW_MIN, RAW_MAX, 30, 200)
}

/// Off time for a filtered raw reading.
pub fn off_time_ms(raw: u16, aggression: f64) -> i32 {
    map_log(i32::from(raw), RAW_MIN, RAW_MAX, 0, 5000, aggression)
}
