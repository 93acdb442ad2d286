//! Small dense linear-algebra kernels on row-major `d x d` slices.
//!
//! `d` is expected to be small (tens, maybe low hundreds), so these are plain loops.

/// Dot product.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    let mut s = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        s += x * y;
    }
    s
}

/// `out = A x`.
pub fn mat_vec_into(a: &[f64], dim: usize, x: &[f64], out: &mut [f64]) {
    for i in 0..dim {
        let row = &a[i * dim..(i + 1) * dim];
        out[i] = dot(row, x);
    }
}

/// `xᵀ A x`.
pub fn quad_form(a: &[f64], dim: usize, x: &[f64]) -> f64 {
    let mut s = 0.0;
    for i in 0..dim {
        let row = &a[i * dim..(i + 1) * dim];
        s += x[i] * dot(row, x);
    }
    s
}

/// Rank-1 accumulation `A <- A + x xᵀ`.
pub fn add_outer(a: &mut [f64], dim: usize, x: &[f64]) {
    for i in 0..dim {
        for j in 0..dim {
            a[i * dim + j] += x[i] * x[j];
        }
    }
}

/// Sherman-Morrison step for `A := A + x xᵀ`, given `ax = A⁻¹ x` and
/// `denom = 1 + xᵀ A⁻¹ x`:
///
/// `A⁻¹ <- A⁻¹ - (A⁻¹ x)(A⁻¹ x)ᵀ / denom`
///
/// Relies on `A⁻¹` being symmetric, so `xᵀ A⁻¹ = (A⁻¹ x)ᵀ`.
pub fn sherman_morrison(a_inv: &mut [f64], dim: usize, ax: &[f64], denom: f64) {
    for i in 0..dim {
        for j in 0..dim {
            a_inv[i * dim + j] -= (ax[i] * ax[j]) / denom;
        }
    }
}

/// Lower-triangular Cholesky factor `L` with `A = L Lᵀ`, written into `l`.
///
/// Only the lower triangle of `a` is read. On failure returns the offending
/// (non-positive or non-finite) pivot; `l` is then partially written.
pub fn cholesky_into(a: &[f64], dim: usize, l: &mut [f64]) -> Result<(), f64> {
    l.fill(0.0);
    for j in 0..dim {
        let mut diag = a[j * dim + j];
        for k in 0..j {
            diag -= l[j * dim + k] * l[j * dim + k];
        }
        if !(diag.is_finite() && diag > 0.0) {
            return Err(diag);
        }
        let ljj = diag.sqrt();
        l[j * dim + j] = ljj;
        for i in (j + 1)..dim {
            let mut s = a[i * dim + j];
            for k in 0..j {
                s -= l[i * dim + k] * l[j * dim + k];
            }
            l[i * dim + j] = s / ljj;
        }
    }
    Ok(())
}

/// Inverse of a symmetric positive-definite matrix via its Cholesky factor.
///
/// `work` is a `d x d` scratch buffer. Returns the failing pivot if `a` is not SPD.
pub fn invert_spd_into(a: &[f64], dim: usize, work: &mut [f64], out: &mut [f64]) -> Result<(), f64> {
    cholesky_into(a, dim, work)?;
    let l = &*work;
    // Solve L Lᵀ X = I column by column.
    let mut col = vec![0.0; dim];
    for c in 0..dim {
        // forward: L y = e_c
        for i in 0..dim {
            let mut s = if i == c { 1.0 } else { 0.0 };
            for k in 0..i {
                s -= l[i * dim + k] * col[k];
            }
            col[i] = s / l[i * dim + i];
        }
        // backward: Lᵀ z = y
        for i in (0..dim).rev() {
            let mut s = col[i];
            for k in (i + 1)..dim {
                s -= l[k * dim + i] * col[k];
            }
            col[i] = s / l[i * dim + i];
        }
        for (r, v) in col.iter().enumerate() {
            out[r * dim + c] = *v;
        }
    }
    Ok(())
}

/// Write `scale * I` into `a`.
pub fn fill_scaled_identity(a: &mut [f64], dim: usize, scale: f64) {
    a.fill(0.0);
    for i in 0..dim {
        a[i * dim + i] = scale;
    }
}

/// Index of the largest value; ties (within `eps`) go to the lowest index.
///
/// Returns `None` on empty input. NaN scores never win.
pub fn argmax_lowest(scores: &[f64], eps: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &s) in scores.iter().enumerate() {
        if s.is_nan() {
            continue;
        }
        match best {
            None => best = Some((i, s)),
            Some((_, bs)) if s > bs + eps => best = Some((i, s)),
            _ => {}
        }
    }
    match best {
        Some((i, _)) => Some(i),
        None if scores.is_empty() => None,
        None => Some(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mat_mul(a: &[f64], b: &[f64], d: usize) -> Vec<f64> {
        let mut out = vec![0.0; d * d];
        for i in 0..d {
            for j in 0..d {
                for k in 0..d {
                    out[i * d + j] += a[i * d + k] * b[k * d + j];
                }
            }
        }
        out
    }

    #[test]
    fn cholesky_reconstructs_spd_matrix() {
        let a = [4.0, 2.0, 0.6, 2.0, 5.0, 1.0, 0.6, 1.0, 3.0];
        let mut l = [0.0; 9];
        cholesky_into(&a, 3, &mut l).unwrap();
        // upper triangle stays zero
        assert_eq!(l[1], 0.0);
        assert_eq!(l[2], 0.0);
        assert_eq!(l[5], 0.0);
        let mut lt = [0.0; 9];
        for i in 0..3 {
            for j in 0..3 {
                lt[i * 3 + j] = l[j * 3 + i];
            }
        }
        let back = mat_mul(&l, &lt, 3);
        for (x, y) in back.iter().zip(a.iter()) {
            assert!((x - y).abs() < 1e-12, "{x} vs {y}");
        }
    }

    #[test]
    fn cholesky_reports_non_positive_pivot() {
        let a = [1.0, 2.0, 2.0, 1.0];
        let mut l = [0.0; 4];
        let pivot = cholesky_into(&a, 2, &mut l).unwrap_err();
        assert!(pivot <= 0.0);
    }

    #[test]
    fn invert_spd_gives_identity_product() {
        let a = [4.0, 2.0, 0.6, 2.0, 5.0, 1.0, 0.6, 1.0, 3.0];
        let mut work = [0.0; 9];
        let mut inv = [0.0; 9];
        invert_spd_into(&a, 3, &mut work, &mut inv).unwrap();
        let id = mat_mul(&a, &inv, 3);
        for i in 0..3 {
            for j in 0..3 {
                let want = if i == j { 1.0 } else { 0.0 };
                assert!((id[i * 3 + j] - want).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn sherman_morrison_matches_direct_inverse() {
        let d = 2;
        let mut a = vec![0.0; 4];
        let mut a_inv = vec![0.0; 4];
        fill_scaled_identity(&mut a, d, 2.0);
        fill_scaled_identity(&mut a_inv, d, 0.5);
        let x = [1.0, -3.0];

        let mut ax = [0.0; 2];
        mat_vec_into(&a_inv, d, &x, &mut ax);
        let denom = 1.0 + dot(&x, &ax);
        sherman_morrison(&mut a_inv, d, &ax, denom);
        add_outer(&mut a, d, &x);

        let mut work = [0.0; 4];
        let mut direct = [0.0; 4];
        invert_spd_into(&a, d, &mut work, &mut direct).unwrap();
        for (x, y) in a_inv.iter().zip(direct.iter()) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn quad_form_agrees_with_mat_vec() {
        let a = [2.0, 0.5, 0.5, 1.0];
        let x = [0.3, -0.7];
        let mut ax = [0.0; 2];
        mat_vec_into(&a, 2, &x, &mut ax);
        assert!((quad_form(&a, 2, &x) - dot(&x, &ax)).abs() < 1e-15);
    }

    #[test]
    fn argmax_prefers_lowest_index_on_ties() {
        assert_eq!(argmax_lowest(&[1.0, 3.0, 3.0], 1e-12), Some(1));
        assert_eq!(argmax_lowest(&[2.0, 2.0 + 1e-14], 1e-12), Some(0));
        assert_eq!(argmax_lowest(&[f64::NAN, 0.5], 1e-12), Some(1));
        assert_eq!(argmax_lowest(&[], 1e-12), None);
    }
}
