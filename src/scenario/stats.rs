//! Closed-form inventory statistics: normal quantile and density, lead times and
//! safety stock.

use crate::network::Mode;
use crate::network::defaults::SEA_DETOUR_FACTOR;

// Rational approximation of the inverse normal CDF (P. J. Acklam), relative error
// below 1.15e-9 over the whole open interval.
const A: [f64; 6] = [
    -3.969683028665376e+01,
    2.209460984245205e+02,
    -2.759285104469687e+02,
    1.383577518672690e+02,
    -3.066479806614716e+01,
    2.506628277459239e+00,
];
const B: [f64; 5] = [
    -5.447609879822406e+01,
    1.615858368580409e+02,
    -1.556989798598866e+02,
    6.680131188771972e+01,
    -1.328068155288572e+01,
];
const C: [f64; 6] = [
    -7.784894002430293e-03,
    -3.223964580411365e-01,
    -2.400758277161838e+00,
    -2.549732539343734e+00,
    4.374664141464968e+00,
    2.938163982698783e+00,
];
const D: [f64; 4] = [
    7.784695709041462e-03,
    3.224671290700398e-01,
    2.445134137142996e+00,
    3.754408661907416e+00,
];
const P_LOW: f64 = 0.02425;

fn tail_quantile(q: f64) -> f64 {
    let x = (-2.0 * q.ln()).sqrt();
    (((((C[0] * x + C[1]) * x + C[2]) * x + C[3]) * x + C[4]) * x + C[5])
        / ((((D[0] * x + D[1]) * x + D[2]) * x + D[3]) * x + 1.0)
}

/// Inverse of the standard normal CDF, `Φ⁻¹(p)`.
///
/// Returns NaN outside the open interval (0, 1).
pub fn normal_quantile(p: f64) -> f64 {
    if !(p > 0.0 && p < 1.0) {
        return f64::NAN;
    }

    if p < P_LOW {
        tail_quantile(p)
    } else if p > 1.0 - P_LOW {
        -tail_quantile(1.0 - p)
    } else {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    }
}

/// Standard normal density `φ(x)`
pub fn normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

/// Sample standard deviation (n − 1 denominator), zero for fewer than two values
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (squares / (n - 1) as f64).sqrt()
}

/// Days in transit over the average network distance
pub fn lead_time_days(mode: Mode, average_distance_km: f64, speed_kmh: f64) -> f64 {
    let distance = match mode {
        Mode::Sea => average_distance_km * SEA_DETOUR_FACTOR,
        Mode::Air | Mode::Road => average_distance_km,
    };
    distance / (speed_kmh * 24.0)
}

/// Safety-stock cost of a mode, `√(LT + 1) · σ · (p + h) · φ(Φ⁻¹(α))`
pub fn safety_stock(
    lead_time_days: f64,
    demand_std: f64,
    shortage_penalty: f64,
    holding_cost: f64,
    service_level: f64,
) -> f64 {
    let z = normal_quantile(service_level);
    (lead_time_days + 1.0).sqrt() * demand_std * (shortage_penalty + holding_cost) * normal_pdf(z)
}
