//! Vector primitives called from generated row logic.
//!
//! Dense variants take a full row slice; sparse variants take the stored
//! values with their column indexes. Output offsets (`ci`) are absolute
//! positions into the output slice.

/// Outer products with a long left operand are written transposed
/// (`len2 x len1`) for better locality.
#[inline]
pub fn is_flip_outer(len1: usize, len2: usize) -> bool {
    len1 > 64 * len2
}

#[inline]
pub fn dot_product(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// `sum(a[k] * b[aix[k]])`.
#[inline]
pub fn dot_product_sparse(avals: &[f64], aix: &[usize], b: &[f64]) -> f64 {
    avals.iter().zip(aix).map(|(v, &j)| v * b[j]).sum()
}

#[inline]
pub fn vect_sum(a: &[f64]) -> f64 {
    a.iter().sum()
}

/// `c[ci..ci+len] += a * s`.
#[inline]
pub fn vect_mult_add(a: &[f64], s: f64, c: &mut [f64], ci: usize) {
    for (cv, av) in c[ci..ci + a.len()].iter_mut().zip(a) {
        *cv += av * s;
    }
}

#[inline]
pub fn vect_mult_add_sparse(avals: &[f64], aix: &[usize], s: f64, c: &mut [f64], ci: usize) {
    for (v, &j) in avals.iter().zip(aix) {
        c[ci + j] += v * s;
    }
}

/// `c[ci..ci+len] = a * s`.
#[inline]
pub fn vect_mult_write(a: &[f64], s: f64, c: &mut [f64], ci: usize) {
    for (cv, av) in c[ci..ci + a.len()].iter_mut().zip(a) {
        *cv = av * s;
    }
}

/// Dense write of a sparse row of logical length `len`.
#[inline]
pub fn vect_write_sparse(avals: &[f64], aix: &[usize], len: usize, c: &mut [f64], ci: usize) {
    c[ci..ci + len].fill(0.0);
    for (v, &j) in avals.iter().zip(aix) {
        c[ci + j] = *v;
    }
}

#[inline]
pub fn vect_add(a: &[f64], c: &mut [f64], ci: usize) {
    for (cv, av) in c[ci..ci + a.len()].iter_mut().zip(a) {
        *cv += av;
    }
}

/// `C += a ⊗ b` with `C` a `len1 x len2` block at `ci`, or its transpose
/// when [`is_flip_outer`] holds.
pub fn vect_outer_mult_add(a: &[f64], b: &[f64], c: &mut [f64], ci: usize) {
    let (len1, len2) = (a.len(), b.len());
    if is_flip_outer(len1, len2) {
        for (j, bv) in b.iter().enumerate() {
            if *bv == 0.0 {
                continue;
            }
            vect_mult_add(a, *bv, c, ci + j * len1);
        }
    } else {
        for (i, av) in a.iter().enumerate() {
            if *av == 0.0 {
                continue;
            }
            vect_mult_add(b, *av, c, ci + i * len2);
        }
    }
}

/// Sparse left operand of logical length `len1`.
pub fn vect_outer_mult_add_sparse(
    avals: &[f64],
    aix: &[usize],
    len1: usize,
    b: &[f64],
    c: &mut [f64],
    ci: usize,
) {
    let len2 = b.len();
    if is_flip_outer(len1, len2) {
        for (j, bv) in b.iter().enumerate() {
            if *bv == 0.0 {
                continue;
            }
            vect_mult_add_sparse(avals, aix, *bv, c, ci + j * len1);
        }
    } else {
        for (v, &i) in avals.iter().zip(aix) {
            vect_mult_add(b, *v, c, ci + i * len2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_and_sparse_dot_agree() {
        let a = [0.0, 2.0, 0.0, 3.0];
        let b = [1.0, 4.0, 5.0, 6.0];
        assert_eq!(dot_product(&a, &b), 26.0);
        assert_eq!(dot_product_sparse(&[2.0, 3.0], &[1, 3], &b), 26.0);
    }

    #[test]
    fn outer_product_layouts() {
        let a = [1.0, 2.0];
        let b = [3.0, 4.0, 5.0];
        let mut c = vec![0.0; 6];
        vect_outer_mult_add(&a, &b, &mut c, 0);
        assert_eq!(c, vec![3.0, 4.0, 5.0, 6.0, 8.0, 10.0]);

        // long left operand: stored as len2 x len1
        let a: Vec<f64> = (0..130).map(|i| i as f64).collect();
        let b = [1.0, 2.0];
        assert!(is_flip_outer(a.len(), b.len()));
        let mut c = vec![0.0; 260];
        vect_outer_mult_add(&a, &b, &mut c, 0);
        assert_eq!(c[5], 5.0);
        assert_eq!(c[130 + 5], 10.0);

        let mut cs = vec![0.0; 260];
        let aix: Vec<usize> = (1..130).collect();
        vect_outer_mult_add_sparse(&a[1..], &aix, 130, &b, &mut cs, 0);
        assert_eq!(c, cs);
    }

    #[test]
    fn sparse_write_clears_row() {
        let mut c = vec![9.0; 5];
        vect_write_sparse(&[1.0], &[2], 4, &mut c, 1);
        assert_eq!(c, vec![9.0, 0.0, 0.0, 1.0, 0.0]);
    }
}
