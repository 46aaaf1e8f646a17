use criterion::Criterion;
use light_curve_transit::{BoxLeastSquares, PeriodGrid};
use light_curve_transit_test_util::two_planet_system;
use std::hint::black_box;

pub fn bench_bls(c: &mut Criterion) {
    let system = two_planet_system(0);
    let ts = &system.light_curve;
    let t = ts.t.as_slice().unwrap();
    let y = ts.y.as_slice().unwrap();
    let w = vec![1.0; t.len()];
    let bls = BoxLeastSquares::new(vec![0.1, 0.15, 0.2], BoxLeastSquares::default_oversample());

    for size in [1000, 10_000] {
        let grid = PeriodGrid::geometric(5.0, 30.0, size);
        c.bench_function(format!("BLS {} points, {size} periods", t.len()).as_str(), |b| {
            b.iter(|| bls.power(black_box(t), black_box(y), &w, &grid).unwrap())
        });
    }
}
