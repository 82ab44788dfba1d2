/// Reflect-101 index mapping: `-1 -> 1`, `len -> len - 2`.
///
/// `len` must be non-zero; a single-sample axis maps everything to 0.
pub fn mirror_index(i: isize, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let period = (2 * len - 2) as isize;
    let r = i.rem_euclid(period) as usize;
    if r < len {
        r
    } else {
        (2 * len - 2) - r
    }
}

/// Nearest pixel of a continuous coordinate if it rounds into `[0, len)`
pub fn round_inside(coordinate: f64, len: usize) -> Option<usize> {
    let rounded = coordinate.round();
    // NaN fails both comparisons
    if rounded >= 0.0 && rounded < len as f64 {
        Some(rounded as usize)
    } else {
        None
    }
}
