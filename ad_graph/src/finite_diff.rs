//! Finite difference utilities for gradient verification.

use ad_matrix::Matrix;

/// Compute gradients of a scalar function of several matrices using central
/// finite differences.
///
/// # Arguments
/// * `f` - Function that takes the input matrices and returns a scalar
/// * `inputs` - The point at which to compute gradients
/// * `eps` - Step size (typically 1e-7 to 1e-5)
///
/// # Returns
/// One matrix per input, shaped like it, holding df/dx for every element.
///
/// # Example
/// ```
/// use ad_graph::finite_diff_grad;
/// use ad_matrix::Matrix;
///
/// // f(A) = sum(A^2), df/dA = 2A
/// let f = |m: &[Matrix]| m[0].iter().map(|v| v * v).sum::<f64>();
/// let a = Matrix::from_rows(&[&[1.0, -2.0], &[0.5, 3.0]]);
/// let grads = finite_diff_grad(f, &[a.clone()], 1e-6);
///
/// assert!(grads[0].max_abs_diff(&a.scale(2.0)) < 1e-6);
/// ```
pub fn finite_diff_grad<F>(f: F, inputs: &[Matrix], eps: f64) -> Vec<Matrix>
where
    F: Fn(&[Matrix]) -> f64,
{
    let mut perturbed = inputs.to_vec();
    let mut grads = Vec::with_capacity(inputs.len());

    for (k, input) in inputs.iter().enumerate() {
        let mut grad = input.zeros_like();
        for i in 0..input.numel() {
            let original = input.as_slice()[i];

            perturbed[k].as_slice_mut()[i] = original + eps;
            let f_plus = f(&perturbed);

            perturbed[k].as_slice_mut()[i] = original - eps;
            let f_minus = f(&perturbed);

            perturbed[k].as_slice_mut()[i] = original;

            grad.as_slice_mut()[i] = (f_plus - f_minus) / (2.0 * eps);
        }
        grads.push(grad);
    }

    grads
}

/// Largest absolute element-wise difference across two gradient sets.
///
/// Useful for comparing autodiff gradients against finite difference gradients.
pub fn max_grad_error(grads1: &[Matrix], grads2: &[Matrix]) -> f64 {
    assert_eq!(grads1.len(), grads2.len());
    grads1
        .iter()
        .zip(grads2.iter())
        .map(|(a, b)| a.max_abs_diff(b))
        .fold(0.0, f64::max)
}
