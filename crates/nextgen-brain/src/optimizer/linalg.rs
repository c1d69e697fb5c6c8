//! Dense symmetric positive-definite solves via Cholesky factorisation.
//!
//! `A = L·Lᵀ`, then `A·x = b` is solved as `L·y = b` (forward) followed by
//! `Lᵀ·x = y` (backward). `Lᵀ` is never materialised: element `(i, j)` of
//! `Lᵀ` is read as `L[j][i]`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinalgError {
    #[error("matrix is not positive definite (pivot {pivot} = {value})")]
    NotPositiveDefinite { pivot: usize, value: f64 },
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Square matrix, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    n: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(n: usize) -> Self {
        Matrix {
            n,
            data: vec![0.0; n * n],
        }
    }

    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, LinalgError> {
        let n = rows.len();
        let mut m = Matrix::zeros(n);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(LinalgError::DimensionMismatch {
                    expected: n,
                    got: row.len(),
                });
            }
            m.data[i * n..(i + 1) * n].copy_from_slice(row);
        }
        Ok(m)
    }

    pub fn dim(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, v: f64) {
        self.data[i * self.n + j] = v;
    }

    pub fn add_diagonal(&mut self, v: f64) {
        for i in 0..self.n {
            self.data[i * self.n + i] += v;
        }
    }

    pub fn mul_vec(&self, x: &[f64]) -> Result<Vec<f64>, LinalgError> {
        self.check_len(x.len())?;
        Ok((0..self.n)
            .map(|i| {
                self.data[i * self.n..(i + 1) * self.n]
                    .iter()
                    .zip(x)
                    .map(|(a, b)| a * b)
                    .sum()
            })
            .collect())
    }

    fn check_len(&self, got: usize) -> Result<(), LinalgError> {
        if got == self.n {
            Ok(())
        } else {
            Err(LinalgError::DimensionMismatch {
                expected: self.n,
                got,
            })
        }
    }
}

/// Lower-triangular Cholesky factor of an SPD matrix.
#[derive(Debug, Clone)]
pub struct Cholesky {
    l: Matrix,
}

impl Cholesky {
    /// Factor `a`. Only the lower triangle of `a` is read.
    pub fn factor(a: &Matrix) -> Result<Self, LinalgError> {
        let n = a.dim();
        let mut l = Matrix::zeros(n);
        for i in 0..n {
            for j in 0..=i {
                let mut sum = a.get(i, j);
                for k in 0..j {
                    sum -= l.get(i, k) * l.get(j, k);
                }
                if i == j {
                    // Also rejects NaN.
                    if !(sum > 0.0) {
                        return Err(LinalgError::NotPositiveDefinite {
                            pivot: i,
                            value: sum,
                        });
                    }
                    l.set(i, i, sum.sqrt());
                } else {
                    l.set(i, j, sum / l.get(j, j));
                }
            }
        }
        Ok(Cholesky { l })
    }

    /// Factor `a`, retrying with increasing diagonal jitter.
    ///
    /// Returns the factor and the jitter that made it succeed (0 if none was
    /// needed). Fails only when the largest jitter in `ladder` is not enough.
    pub fn factor_with_jitter(a: &Matrix, ladder: &[f64]) -> Result<(Self, f64), LinalgError> {
        let mut last_err = match Cholesky::factor(a) {
            Ok(chol) => return Ok((chol, 0.0)),
            Err(e) => e,
        };
        for &jitter in ladder {
            let mut jittered = a.clone();
            jittered.add_diagonal(jitter);
            match Cholesky::factor(&jittered) {
                Ok(chol) => return Ok((chol, jitter)),
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    pub fn dim(&self) -> usize {
        self.l.dim()
    }

    pub fn lower(&self) -> &Matrix {
        &self.l
    }

    /// Solve `L·y = b` by forward substitution.
    pub fn solve_lower(&self, b: &[f64]) -> Result<Vec<f64>, LinalgError> {
        self.l.check_len(b.len())?;
        let n = self.dim();
        let mut y = vec![0.0; n];
        for i in 0..n {
            let mut sum = b[i];
            for j in 0..i {
                sum -= self.l.get(i, j) * y[j];
            }
            y[i] = sum / self.l.get(i, i);
        }
        Ok(y)
    }

    /// Solve `Lᵀ·x = y` by back substitution.
    pub fn solve_upper(&self, y: &[f64]) -> Result<Vec<f64>, LinalgError> {
        self.l.check_len(y.len())?;
        let n = self.dim();
        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            let mut sum = y[i];
            for j in (i + 1)..n {
                // Lᵀ[i][j] == L[j][i]
                sum -= self.l.get(j, i) * x[j];
            }
            x[i] = sum / self.l.get(i, i);
        }
        Ok(x)
    }

    /// Solve `A·x = b`.
    pub fn solve(&self, b: &[f64]) -> Result<Vec<f64>, LinalgError> {
        let y = self.solve_lower(b)?;
        self.solve_upper(&y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spd3() -> Matrix {
        Matrix::from_rows(&[
            vec![4.0, 12.0, -16.0],
            vec![12.0, 37.0, -43.0],
            vec![-16.0, -43.0, 98.0],
        ])
        .unwrap()
    }

    fn assert_close(a: &[f64], b: &[f64], tol: f64) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < tol, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn factor_matches_closed_form() {
        let chol = Cholesky::factor(&spd3()).unwrap();
        let expected = Matrix::from_rows(&[
            vec![2.0, 0.0, 0.0],
            vec![6.0, 1.0, 0.0],
            vec![-8.0, 5.0, 3.0],
        ])
        .unwrap();
        for i in 0..3 {
            for j in 0..3 {
                assert!((chol.lower().get(i, j) - expected.get(i, j)).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn forward_substitution_closed_form() {
        let chol = Cholesky::factor(&spd3()).unwrap();
        // L·[1, 1, 1] = [2, 7, 0]
        assert_close(&chol.solve_lower(&[2.0, 7.0, 0.0]).unwrap(), &[1.0, 1.0, 1.0], 1e-12);
    }

    #[test]
    fn back_substitution_reads_transposed_factor() {
        let chol = Cholesky::factor(&spd3()).unwrap();
        // Lᵀ·[1, 2, 3] = [-10, 17, 9]; reading L[i][j] instead of L[j][i]
        // gives a different, still finite, answer.
        assert_close(&chol.solve_upper(&[-10.0, 17.0, 9.0]).unwrap(), &[1.0, 2.0, 3.0], 1e-12);
    }

    #[test]
    fn full_solve_closed_form() {
        let a = spd3();
        let chol = Cholesky::factor(&a).unwrap();
        let x = chol.solve(&[-20.0, -43.0, 192.0]).unwrap();
        assert_close(&x, &[1.0, 2.0, 3.0], 1e-10);
        assert_close(&a.mul_vec(&x).unwrap(), &[-20.0, -43.0, 192.0], 1e-9);
    }

    #[test]
    fn indefinite_matrix_rejected() {
        let a = Matrix::from_rows(&[vec![1.0, 2.0], vec![2.0, 1.0]]).unwrap();
        assert!(matches!(
            Cholesky::factor(&a),
            Err(LinalgError::NotPositiveDefinite { pivot: 1, .. })
        ));
        assert!(Cholesky::factor_with_jitter(&a, &[1e-10, 1e-4]).is_err());
    }

    #[test]
    fn singular_matrix_recovered_by_jitter() {
        let a = Matrix::from_rows(&[vec![1.0, 1.0], vec![1.0, 1.0]]).unwrap();
        assert!(Cholesky::factor(&a).is_err());
        let (_, jitter) = Cholesky::factor_with_jitter(&a, &[1e-10, 1e-8, 1e-6, 1e-4]).unwrap();
        assert!(jitter > 0.0);
    }

    #[test]
    fn dimension_checks() {
        assert!(matches!(
            Matrix::from_rows(&[vec![1.0, 0.0], vec![0.0]]),
            Err(LinalgError::DimensionMismatch { expected: 2, got: 1 })
        ));
        let chol = Cholesky::factor(&spd3()).unwrap();
        assert!(chol.solve(&[1.0]).is_err());
    }
}
