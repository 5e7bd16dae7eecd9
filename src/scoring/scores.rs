//! Point-wise probability scores

/// Probabilities are clamped to `[LOG_CLAMP, 1 - LOG_CLAMP]` before taking logs
pub const LOG_CLAMP: f64 = 1e-6;

/// Brier score: squared error between `p` and the realized outcome.
/// Range `[0, 1]`, 0 is perfect.
pub fn brier(p: f64, actual: bool) -> f64 {
    let outcome = if actual { 1.0 } else { 0.0 };
    (p.clamp(0.0, 1.0) - outcome).powi(2)
}

/// Log score in bits: `-log2(p)` when the event happened, `-log2(1 - p)`
/// otherwise. Finite for every input.
pub fn log_score(p: f64, actual: bool) -> f64 {
    let p = p.clamp(LOG_CLAMP, 1.0 - LOG_CLAMP);
    if actual {
        -p.log2()
    } else {
        -(1.0 - p).log2()
    }
}
