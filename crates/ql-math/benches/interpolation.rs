use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ql_math::interpolations::{
    ChebyshevInterpolation, ChebyshevPointsType, CubicNaturalSpline, Interpolation1D,
};
use ql_math::integrals::{GaussLobattoIntegral, Integrator, TanhSinhIntegral};

fn bench_interpolation(c: &mut Criterion) {
    let xs: Vec<f64> = (0..200).map(|i| i as f64 * 0.05).collect();
    let ys: Vec<f64> = xs.iter().map(|x| (-x * x).exp()).collect();
    let spline = CubicNaturalSpline::new(&xs, &ys).unwrap();
    c.bench_function("natural spline eval", |b| {
        b.iter(|| spline.value(black_box(3.1415)))
    });

    let cheb =
        ChebyshevInterpolation::try_from_fn(16, |x| Ok(x.exp()), ChebyshevPointsType::SecondKind)
            .unwrap();
    c.bench_function("chebyshev eval", |b| b.iter(|| cheb.value(black_box(0.3))));
}

fn bench_quadrature(c: &mut Criterion) {
    let f = |x: f64| (-0.5 * x * x).exp();
    c.bench_function("gauss-lobatto gaussian", |b| {
        let gl = GaussLobattoIntegral::new(100_000, 1e-10);
        b.iter(|| gl.integrate(f, black_box(-3.0), 3.0).unwrap())
    });
    c.bench_function("tanh-sinh gaussian", |b| {
        let ts = TanhSinhIntegral::default();
        b.iter(|| ts.integrate(f, black_box(-3.0), 3.0).unwrap())
    });
}

criterion_group!(benches, bench_interpolation, bench_quadrature);
criterion_main!(benches);
