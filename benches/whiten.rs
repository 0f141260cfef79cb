//! Whitening and elimination throughput on factor-sized blocks.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use nalgebra::{DMatrix, DVector};

use sqrtsam::noise::{Constrained, Diagonal, Gaussian};

fn test_block(rows: usize, cols: usize) -> DMatrix<f64> {
    DMatrix::from_fn(rows, cols, |i, j| ((i * 7 + j * 3) % 10) as f64 / 10.0 + 0.1)
}

fn bench_whiten(c: &mut Criterion) {
    let sigmas = DVector::from_fn(6, |i, _| 0.5 + i as f64 * 0.25);
    let diagonal = Diagonal::from_sigmas(sigmas, false).unwrap();
    let block = test_block(6, 12);

    c.bench_function("diagonal_whiten_matrix_6x12", |b| {
        b.iter(|| diagonal.whiten_matrix(black_box(&block)).unwrap())
    });

    let mut r = DMatrix::<f64>::identity(6, 6);
    for i in 0..6 {
        for j in i..6 {
            r[(i, j)] = if i == j { 1.0 + i as f64 * 0.1 } else { 0.2 };
        }
    }
    let gaussian = Gaussian::from_sqrt_information(r, false).unwrap();

    c.bench_function("gaussian_whiten_matrix_6x12", |b| {
        b.iter(|| gaussian.whiten_matrix(black_box(&block)).unwrap())
    });
}

fn bench_qr(c: &mut Criterion) {
    let diagonal = Diagonal::from_sigmas(DVector::from_element(8, 0.5), false).unwrap();
    let ab = test_block(8, 7);

    c.bench_function("diagonal_qr_8x6", |b| {
        b.iter(|| {
            let mut system = ab.clone();
            diagonal.qr(black_box(&mut system)).unwrap()
        })
    });

    let mut sigmas = DVector::from_element(8, 0.5);
    sigmas[0] = 0.0;
    let mixed = Constrained::mixed_sigmas(sigmas).unwrap();

    c.bench_function("constrained_qr_8x6", |b| {
        b.iter(|| {
            let mut system = ab.clone();
            mixed.qr(black_box(&mut system)).unwrap()
        })
    });
}

criterion_group!(benches, bench_whiten, bench_qr);
criterion_main!(benches);
