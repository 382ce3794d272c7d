/// Scales `v` to unit length in place. Zero vectors stay zero.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= 1e-12 { return; }
    for x in v.iter_mut() { *x /= norm; }
}

/// Rejects a batch whose vectors are not all `dim` wide.
pub fn check_widths(vectors: &[Vec<f32>], dim: usize) -> qabench_core::Result<()> {
    match vectors.iter().find(|v| v.len() != dim) {
        Some(v) => Err(qabench_core::Error::DimensionMismatch { expected: dim, found: v.len() }),
        None => Ok(()),
    }
}
