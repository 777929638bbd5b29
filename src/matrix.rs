use anyhow::{Context, Result};
use ndarray::{Array1, Array2};
use ndarray_linalg::{SVD, Solve};

use crate::types::Matrix;

pub fn ensure_square(matrix: &Matrix, name: &str) -> Result<()> {
    let n = matrix.len();
    if n == 0 {
        return Err(anyhow::anyhow!("{name} must not be empty"));
    }
    for (i, row) in matrix.iter().enumerate() {
        if row.len() != n {
            return Err(anyhow::anyhow!(
                "{name} row {i} length {} does not match {n}",
                row.len()
            ));
        }
    }
    Ok(())
}

pub fn to_array2(matrix: &Matrix) -> Result<Array2<f64>> {
    let n = matrix.len();
    let m = matrix.first().map(|row| row.len()).unwrap_or(0);
    let mut data = Vec::with_capacity(n * m);
    for row in matrix {
        if row.len() != m {
            return Err(anyhow::anyhow!("Matrix is not rectangular"));
        }
        data.extend_from_slice(row);
    }
    Array2::from_shape_vec((n, m), data).map_err(|e| anyhow::anyhow!(e.to_string()))
}

/// SNP-by-category matrix from category-major columns.
pub fn columns_to_array2(columns: &[Vec<f64>]) -> Result<Array2<f64>> {
    let k = columns.len();
    let n = columns.first().map(Vec::len).unwrap_or(0);
    if columns.iter().any(|c| c.len() != n) {
        return Err(anyhow::anyhow!("LD Score columns differ in length"));
    }
    Ok(Array2::from_shape_fn((n, k), |(i, j)| columns[j][i]))
}

/// Two-norm condition number, the ratio of the largest to the smallest
/// singular value. A rank-deficient matrix gives infinity.
pub fn condition_number(matrix: &Array2<f64>) -> Result<f64> {
    if matrix.is_empty() {
        return Ok(f64::INFINITY);
    }
    let (_, singular, _) = matrix
        .svd(false, false)
        .context("singular value decomposition")?;
    let max = singular.iter().copied().fold(0.0_f64, f64::max);
    let min = singular.iter().copied().fold(f64::INFINITY, f64::min);
    if min <= 0.0 || !min.is_finite() {
        return Ok(f64::INFINITY);
    }
    Ok(max / min)
}

pub fn solve_linear(xtx: &[Vec<f64>], xty: &[f64]) -> Result<Vec<f64>> {
    let p = xty.len();
    let mut data = Vec::with_capacity(p * p);
    for row in xtx {
        data.extend_from_slice(row);
    }
    let a = Array2::from_shape_vec((p, p), data).context("xtx shape")?;
    let b = Array1::from_vec(xty.to_vec());
    let x = a.solve_into(b).context("solve linear system")?;
    Ok(x.to_vec())
}

/// Sample covariance of the rows of `matrix` (denominator `n - 1`).
#[allow(clippy::needless_range_loop)]
pub fn covariance(matrix: &[Vec<f64>]) -> Matrix {
    if matrix.is_empty() {
        return vec![];
    }
    let n = matrix.len();
    let p = matrix[0].len();
    let mut means = vec![0.0; p];
    for row in matrix {
        for i in 0..p {
            means[i] += row[i];
        }
    }
    for i in 0..p {
        means[i] /= n as f64;
    }
    let mut cov = vec![vec![0.0; p]; p];
    for row in matrix {
        for i in 0..p {
            let di = row[i] - means[i];
            for j in 0..p {
                cov[i][j] += di * (row[j] - means[j]);
            }
        }
    }
    let denom = (n.saturating_sub(1)) as f64;
    if denom > 0.0 {
        for i in 0..p {
            for j in 0..p {
                cov[i][j] /= denom;
            }
        }
    }
    cov
}

pub fn mat_vec_mul(mat: &Matrix, vec: &[f64]) -> Vec<f64> {
    mat.iter()
        .map(|row| row.iter().zip(vec).map(|(a, b)| a * b).sum())
        .collect()
}

/// `A · B · Aᵀ`.
pub fn sandwich(a: &Matrix, b: &Matrix) -> Matrix {
    let ab: Matrix = a
        .iter()
        .map(|row| {
            (0..b.first().map(Vec::len).unwrap_or(0))
                .map(|j| row.iter().zip(b).map(|(x, brow)| x * brow[j]).sum())
                .collect()
        })
        .collect();
    ab.iter()
        .map(|row| {
            a.iter()
                .map(|arow| row.iter().zip(arow).map(|(x, y)| x * y).sum())
                .collect()
        })
        .collect()
}

/// `vᵀ · A · v`.
pub fn quadratic_form(mat: &Matrix, v: &[f64]) -> f64 {
    mat_vec_mul(mat, v).iter().zip(v).map(|(a, b)| a * b).sum()
}

pub fn scale_matrix(mat: &Matrix, factor: f64) -> Matrix {
    mat.iter()
        .map(|row| row.iter().map(|v| v * factor).collect())
        .collect()
}

pub fn diag_sqrt(mat: &Matrix) -> Vec<f64> {
    mat.iter()
        .enumerate()
        .map(|(i, row)| row[i].max(0.0).sqrt())
        .collect()
}

pub fn shrink_matrix(matrix: &Matrix, keep_idx: &[usize]) -> Matrix {
    let mut out = vec![vec![0.0; keep_idx.len()]; keep_idx.len()];
    for (i_out, &i) in keep_idx.iter().enumerate() {
        for (j_out, &j) in keep_idx.iter().enumerate() {
            out[i_out][j_out] = matrix[i][j];
        }
    }
    out
}
