//! CLI demo for the matrix autodiff engine.
//!
//! Builds a small graph out of division, max pooling and a sub-matrix view,
//! computes gradients by backpropagation, and validates them against finite
//! differences. Set `RUST_LOG=ad_graph=debug` to watch the passes.

use ad_graph::prelude::*;
use ad_graph::{finite_diff_grad, max_grad_error};
use tracing_subscriber::EnvFilter;

/// y = mean(view(maxpool(a / b, 2x2), 0, 1, 2, 1))
fn build(g: &mut Graph, a: NodeId, b: NodeId) -> Result<NodeId> {
    let q = g.div(a, b)?;
    let pooled = g.max_pool(q, 2, 2)?;
    let right = g.view(pooled, 0, 1, 2, 1)?;
    g.reduce_mean(right)
}

fn evaluate(inputs: &[Matrix]) -> Result<f64> {
    let mut g = Graph::new();
    let a = g.constant(inputs[0].clone());
    let b = g.constant(inputs[1].clone());
    let y = build(&mut g, a, b)?;
    Ok(g.forward_node(y)?.item())
}

fn print_matrix(label: &str, m: &Matrix) {
    println!("  {label} =");
    for i in 0..m.rows() {
        let row: Vec<String> = (0..m.cols()).map(|j| format!("{:>9.5}", m.at(i, j))).collect();
        println!("    [{}]", row.join(" "));
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Reverse-Mode Autodiff Demo ===\n");

    let a_val = Matrix::from_rows(&[
        &[0.1, 0.2, 0.3, 0.0],
        &[0.9, -0.4, 0.5, 1.2],
        &[0.3, 0.8, -0.6, 0.2],
        &[0.4, 0.1, 0.7, -0.9],
    ]);
    let b_val = Matrix::from_rows(&[
        &[0.4, 0.3, 0.5, 0.7],
        &[1.5, 0.8, 0.9, 2.5],
        &[0.6, 1.1, 0.4, 0.5],
        &[0.7, 0.3, 1.3, 0.6],
    ]);

    let mut g = Graph::new();
    let a = g.named_variable("a", a_val.clone(), true);
    let b = g.named_variable("b", b_val.clone(), true);
    let y = build(&mut g, a, b)?;

    println!("Expression: y = mean(view(maxpool(a / b, 2x2), 0, 1, 2, 1))");
    print_matrix("a", &a_val);
    print_matrix("b", &b_val);

    let value = g.forward_node(y)?.item();
    println!("Value:      y = {:.10}\n", value);

    g.backward(y)?;
    let autodiff = vec![
        g.grad(a).cloned().unwrap_or_else(|| a_val.zeros_like()),
        g.grad(b).cloned().unwrap_or_else(|| b_val.zeros_like()),
    ];

    println!("Autodiff gradients:");
    print_matrix("dy/da", &autodiff[0]);
    print_matrix("dy/db", &autodiff[1]);
    println!();

    let f = |inputs: &[Matrix]| evaluate(inputs).unwrap_or(f64::NAN);
    let fd = finite_diff_grad(f, &[a_val, b_val], 1e-7);

    println!("Finite difference gradients (eps=1e-7):");
    print_matrix("dy/da", &fd[0]);
    print_matrix("dy/db", &fd[1]);
    println!();

    let max_err = max_grad_error(&autodiff, &fd);
    println!("Max absolute error: {:.2e}\n", max_err);

    let tolerance = 1e-5;
    if max_err < tolerance {
        println!("PASS: Max error ({:.2e}) < tolerance ({:.2e})", max_err, tolerance);
    } else {
        println!("FAIL: Max error ({:.2e}) >= tolerance ({:.2e})", max_err, tolerance);
        std::process::exit(1);
    }

    println!("\n=== Additional Examples ===\n");

    // Example 1: shared operand
    println!("1. Diamond graph: z = (x + y) * (x - y) = x^2 - y^2");
    let mut g = Graph::new();
    let x = g.variable(Matrix::scalar(3.0), true);
    let yv = g.variable(Matrix::scalar(2.0), true);
    let s = g.add(x, yv)?;
    let d = g.sub(x, yv)?;
    let z = g.prod(s, d)?;
    println!("   At x = 3.0, y = 2.0:");
    println!("   z = {:.10} (expected: 5)", g.forward_node(z)?.item());
    g.backward(z)?;
    if let (Some(gx), Some(gy)) = (g.grad(x), g.grad(yv)) {
        println!("   dz/dx = {:.10} (expected: 2x = 6)", gx.item());
        println!("   dz/dy = {:.10} (expected: -2y = -4)\n", gy.item());
    }

    // Example 2: argmax routing
    println!("2. MaxPool routes each pooled gradient to its argmax");
    let mut g = Graph::new();
    let x = g.variable(
        Matrix::from_rows(&[&[1.0, 5.0, -2.0, -1.0], &[3.0, 5.0, -3.0, -4.0]]),
        true,
    );
    let p = g.max_pool(x, 2, 2)?;
    let pooled = g.forward_node(p)?.clone();
    g.backward_with(p, Matrix::from_rows(&[&[10.0, 20.0]]))?;
    print_matrix("pooled", &pooled);
    if let Some(argmax) = g.function(p).and_then(|f| f.argmax()) {
        println!("  argmax = {:?} (ties keep the first cell)", argmax);
    }
    if let Some(grad) = g.grad(x) {
        print_matrix("dx", grad);
    }

    Ok(())
}
