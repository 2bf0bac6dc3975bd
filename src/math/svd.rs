//! Truncated singular value decomposition.
//!
//! The factor model only needs the leading `k` singular values, their right
//! singular vectors, and the energy left in the discarded part. We compute a
//! thin SVD with nalgebra and truncate it, sorting explicitly so the result
//! does not depend on the decomposition's internal ordering.

use nalgebra::{DMatrix, DVector};

/// Leading part of an SVD.
#[derive(Debug, Clone)]
pub struct TruncatedSvd {
    /// Leading singular values, descending. Padded with zeros when the matrix
    /// has fewer than `k` singular values.
    pub singular_values: DVector<f64>,
    /// Matching right singular vectors, one per row (`k x ncols`).
    pub v_t: DMatrix<f64>,
    /// Sum of squares of the discarded singular values.
    pub residual_energy: f64,
}

/// Thin SVD of `x` truncated to `k` components.
///
/// Returns `None` if the decomposition fails or produces non-finite values.
pub fn truncated_svd(x: &DMatrix<f64>, k: usize) -> Option<TruncatedSvd> {
    let svd = x.clone().svd(false, true);
    let v_t = svd.v_t.as_ref()?;
    let s = &svd.singular_values;
    if s.iter().chain(v_t.iter()).any(|v| !v.is_finite()) {
        return None;
    }

    let mut order: Vec<usize> = (0..s.len()).collect();
    order.sort_by(|&a, &b| s[b].total_cmp(&s[a]));

    let mut singular_values = DVector::zeros(k);
    let mut rows = DMatrix::zeros(k, x.ncols());
    for (slot, &i) in order.iter().take(k).enumerate() {
        singular_values[slot] = s[i];
        rows.row_mut(slot).copy_from(&v_t.row(i));
    }
    let residual_energy = order.iter().skip(k).map(|&i| s[i] * s[i]).sum();

    Some(TruncatedSvd {
        singular_values,
        v_t: rows,
        residual_energy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_largest_components_first() {
        // Singular values are 3 and 2 (diagonal matrix).
        let x = DMatrix::from_row_slice(3, 2, &[2.0, 0.0, 0.0, 3.0, 0.0, 0.0]);

        let full = truncated_svd(&x, 2).unwrap();
        assert!((full.singular_values[0] - 3.0).abs() < 1e-10);
        assert!((full.singular_values[1] - 2.0).abs() < 1e-10);
        assert!(full.residual_energy.abs() < 1e-10);

        let one = truncated_svd(&x, 1).unwrap();
        assert_eq!(one.v_t.shape(), (1, 2));
        assert!((one.v_t[(0, 1)].abs() - 1.0).abs() < 1e-10);
        assert!((one.residual_energy - 4.0).abs() < 1e-10);
    }

    #[test]
    fn pads_when_k_exceeds_rank_dimension() {
        let x = DMatrix::from_row_slice(1, 3, &[1.0, 2.0, 2.0]);
        let out = truncated_svd(&x, 2).unwrap();
        assert_eq!(out.singular_values.len(), 2);
        assert!((out.singular_values[0] - 3.0).abs() < 1e-10);
        assert_eq!(out.singular_values[1], 0.0);
    }
}
