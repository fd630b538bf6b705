//! Singular value decomposition through the Gram matrix
//!
//! For `A` with `m ≥ n`, the eigenvectors of `AᵀA` are the right singular
//! vectors `V`; `A·V` then has orthogonal columns `σᵢ·uᵢ`. The symmetric
//! eigenproblem is solved with Householder tridiagonalization and implicit QL
//! (`O(n³)` on the short side), so a 768 × 3072 projection decomposes in
//! about a second. Runs in `f64`; since `U·S` is formed as `A·V`,
//! reconstructions are exact to `f32` precision whatever the conditioning.

use crate::error::{Error, Result};
use ndarray::{s, Array1, Array2, ArrayView2, Axis, Zip};

/// Maximum number of QL steps spent on any one eigenvalue
pub const MAX_QL_ITERATIONS: usize = 60;

/// Reduced SVD `A = U · diag(s) · Vᵀ`
///
/// For an `m × n` input with `k = min(m, n)`: `u` is `m × k`, `s` has `k`
/// non-negative entries in descending order, `v` is `n × k`. Columns of `u`
/// paired with a zero singular value are zero.
#[derive(Debug, Clone)]
pub struct Svd {
    pub u: Array2<f64>,
    pub s: Array1<f64>,
    pub v: Array2<f64>,
}

impl Svd {
    /// Number of singular triplets kept
    pub fn rank(&self) -> usize {
        self.s.len()
    }

    /// Keep the `rank` largest singular triplets
    ///
    /// Ranks at or above the current count leave the decomposition unchanged.
    pub fn truncate(mut self, rank: usize) -> Self {
        if rank < self.s.len() {
            self.u = self.u.slice(s![.., ..rank]).to_owned();
            self.s = self.s.slice(s![..rank]).to_owned();
            self.v = self.v.slice(s![.., ..rank]).to_owned();
        }
        self
    }

    /// `U · diag(s)`, the left factor absorbed with its singular values
    pub fn scaled_u(&self) -> Array2<f64> {
        &self.u * &self.s.view().insert_axis(Axis(0))
    }

    /// Rebuild `U · diag(s) · Vᵀ`
    pub fn reconstruct(&self) -> Array2<f64> {
        self.scaled_u().dot(&self.v.t())
    }
}

/// Decompose an `m × n` matrix
///
/// # Errors
/// Returns [`Error::Decomposition`] for empty or non-finite input, or when an
/// eigenvalue has not converged after [`MAX_QL_ITERATIONS`] QL steps.
pub fn svd(a: ArrayView2<'_, f64>) -> Result<Svd> {
    let (m, n) = a.dim();
    if m == 0 || n == 0 {
        return Err(Error::Decomposition(format!("cannot decompose empty {m}x{n} matrix")));
    }
    if a.iter().any(|v| !v.is_finite()) {
        return Err(Error::Decomposition("matrix contains non-finite values".into()));
    }

    if m < n {
        // Aᵀ = U' S V'ᵀ  ⇒  A = V' S U'ᵀ
        let Svd { u, s, v } = svd_tall(a.t())?;
        return Ok(Svd { u: v, s, v: u });
    }
    svd_tall(a)
}

/// `m ≥ n`: eigenvectors of the `n × n` Gram matrix give `V`, then `A·V`
/// gives `U·S` column by column
fn svd_tall(a: ArrayView2<'_, f64>) -> Result<Svd> {
    let (m, n) = a.dim();
    let gram = a.t().dot(&a);
    // Row i is the i-th eigenvector
    let eigvecs = symmetric_eigenvectors(gram)?;
    let scaled = a.dot(&eigvecs.t());

    // σᵢ = ‖A·vᵢ‖ stays accurate for tiny σ, unlike √λᵢ
    let norms: Vec<f64> = scaled.columns().into_iter().map(|c| c.dot(&c).sqrt()).collect();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| norms[j].total_cmp(&norms[i]));

    let mut u = Array2::<f64>::zeros((m, n));
    let mut s = Array1::<f64>::zeros(n);
    let mut v = Array2::<f64>::zeros((n, n));
    for (dst, &src) in order.iter().enumerate() {
        let sigma = norms[src];
        s[dst] = sigma;
        if sigma > 0.0 {
            u.column_mut(dst).assign(&(&scaled.column(src) / sigma));
        }
        v.column_mut(dst).assign(&eigvecs.row(src));
    }

    Ok(Svd { u, s, v })
}

/// Orthonormal eigenvectors of a symmetric matrix, one per row
///
/// Householder reduction to tridiagonal form followed by implicit QL with
/// Wilkinson shifts. `w` holds the transpose of the accumulated transform so
/// that every inner loop walks a contiguous row.
fn symmetric_eigenvectors(mut w: Array2<f64>) -> Result<Array2<f64>> {
    let n = w.nrows();
    let mut d = Array1::<f64>::zeros(n);
    let mut e = Array1::<f64>::zeros(n);

    tridiagonalize(&mut w, &mut d, &mut e);
    diagonalize(&mut w, &mut d, &mut e)?;
    Ok(w)
}

fn tridiagonalize(w: &mut Array2<f64>, d: &mut Array1<f64>, e: &mut Array1<f64>) {
    let n = w.nrows();
    for j in 0..n {
        d[j] = w[[j, n - 1]];
    }

    for i in (1..n).rev() {
        let scale: f64 = (0..i).map(|k| d[k].abs()).sum();
        let mut h = 0.0;

        if scale == 0.0 {
            e[i] = d[i - 1];
            for j in 0..i {
                d[j] = w[[j, i - 1]];
                w[[j, i]] = 0.0;
                w[[i, j]] = 0.0;
            }
        } else {
            for k in 0..i {
                d[k] /= scale;
                h += d[k] * d[k];
            }
            let mut f = d[i - 1];
            let mut g = if f > 0.0 { -h.sqrt() } else { h.sqrt() };
            e[i] = scale * g;
            h -= f * g;
            d[i - 1] = f - g;
            for j in 0..i {
                e[j] = 0.0;
            }

            for j in 0..i {
                f = d[j];
                w[[i, j]] = f;
                g = e[j] + w[[j, j]] * f;
                for k in (j + 1)..i {
                    g += w[[j, k]] * d[k];
                    e[k] += w[[j, k]] * f;
                }
                e[j] = g;
            }
            f = 0.0;
            for j in 0..i {
                e[j] /= h;
                f += e[j] * d[j];
            }
            let hh = f / (h + h);
            for j in 0..i {
                e[j] -= hh * d[j];
            }
            for j in 0..i {
                f = d[j];
                g = e[j];
                for k in j..i {
                    w[[j, k]] -= f * e[k] + g * d[k];
                }
                d[j] = w[[j, i - 1]];
                w[[j, i]] = 0.0;
            }
        }
        d[i] = h;
    }

    // Accumulate the reflections
    for i in 0..n.saturating_sub(1) {
        w[[i, n - 1]] = w[[i, i]];
        w[[i, i]] = 1.0;
        let h = d[i + 1];
        if h != 0.0 {
            for k in 0..=i {
                d[k] = w[[i + 1, k]] / h;
            }
            for j in 0..=i {
                let g: f64 = (0..=i).map(|k| w[[i + 1, k]] * w[[j, k]]).sum();
                for k in 0..=i {
                    w[[j, k]] -= g * d[k];
                }
            }
        }
        for k in 0..=i {
            w[[i + 1, k]] = 0.0;
        }
    }
    for j in 0..n {
        d[j] = w[[j, n - 1]];
        w[[j, n - 1]] = 0.0;
    }
    w[[n - 1, n - 1]] = 1.0;
    e[0] = 0.0;
}

fn diagonalize(w: &mut Array2<f64>, d: &mut Array1<f64>, e: &mut Array1<f64>) -> Result<()> {
    let n = d.len();
    for i in 1..n {
        e[i - 1] = e[i];
    }
    e[n - 1] = 0.0;

    let mut shift = 0.0;
    let mut tst1: f64 = 0.0;
    for l in 0..n {
        tst1 = tst1.max(d[l].abs() + e[l].abs());
        let mut m = l;
        while m < n - 1 && e[m].abs() > f64::EPSILON * tst1 {
            m += 1;
        }

        if m > l {
            let mut iterations = 0;
            loop {
                iterations += 1;
                if iterations > MAX_QL_ITERATIONS {
                    return Err(Error::Decomposition(format!(
                        "QL iteration did not converge within {MAX_QL_ITERATIONS} steps for {n}x{n} Gram matrix"
                    )));
                }

                let mut g = d[l];
                let mut p = (d[l + 1] - g) / (2.0 * e[l]);
                let mut r = p.hypot(1.0);
                if p < 0.0 {
                    r = -r;
                }
                d[l] = e[l] / (p + r);
                d[l + 1] = e[l] * (p + r);
                let dl1 = d[l + 1];
                let mut h = g - d[l];
                for i in (l + 2)..n {
                    d[i] -= h;
                }
                shift += h;

                p = d[m];
                let (mut c, mut c2, mut c3) = (1.0, 1.0, 1.0);
                let el1 = e[l + 1];
                let (mut s, mut s2) = (0.0, 0.0);
                for i in (l..m).rev() {
                    c3 = c2;
                    c2 = c;
                    s2 = s;
                    g = c * e[i];
                    h = c * p;
                    r = p.hypot(e[i]);
                    e[i + 1] = s * r;
                    s = e[i] / r;
                    c = p / r;
                    p = c * d[i] - s * g;
                    d[i + 1] = h + s * (c * g + s * d[i]);
                    rotate(w, i, i + 1, c, s);
                }
                p = -s * s2 * c3 * el1 * e[l] / dl1;
                e[l] = s * p;
                d[l] = c * p;

                if e[l].abs() <= f64::EPSILON * tst1 {
                    break;
                }
            }
        }
        d[l] += shift;
        e[l] = 0.0;
    }
    Ok(())
}

/// Apply the plane rotation `(p, q) ← (c·p − s·q, s·p + c·q)` to two rows
fn rotate(rows: &mut Array2<f64>, p: usize, q: usize, c: f64, s: f64) {
    let (mut row_p, mut row_q) = rows.multi_slice_mut((s![p, ..], s![q, ..]));
    Zip::from(&mut row_p).and(&mut row_q).for_each(|x, y| {
        let (xp, yq) = (*x, *y);
        *x = c * xp - s * yq;
        *y = s * xp + c * yq;
    });
}
