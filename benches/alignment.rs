use criterion::{black_box, criterion_group, criterion_main, Criterion};
use face_align::transform::{
    compute_similarity_transform, warp_to_canvas, FillPolicy, Point2, SimilarityTransform,
};
use opencv::core::{self, Mat, Scalar};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn bench_solver(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let truth = SimilarityTransform::new(0.2, 0.6, (120.0, -40.0));
    let generated = [
        Point2::new(310.0, 350.0),
        Point2::new(710.0, 350.0),
        Point2::new(510.0, 750.0),
    ];
    let template = generated.map(|p| {
        let q = truth.apply(&p);
        Point2::new(q.x + rng.gen_range(-2.0..2.0), q.y + rng.gen_range(-2.0..2.0))
    });

    c.bench_function("compute_similarity_transform", |b| {
        b.iter(|| compute_similarity_transform(black_box(&template), black_box(&generated)).unwrap())
    });
}

fn bench_warp(c: &mut Criterion) {
    let generated =
        Mat::new_rows_cols_with_default(768, 1024, core::CV_8UC3, Scalar::all(90.0)).unwrap();
    let transform = SimilarityTransform::new(0.05, 0.5, (145.0, 75.0));

    let mut group = c.benchmark_group("warp_to_canvas");
    group.bench_function("transparent_800x600", |b| {
        b.iter(|| {
            warp_to_canvas(black_box(&generated), (800, 600), &transform, FillPolicy::Transparent)
                .unwrap()
        })
    });
    group.bench_function("solid_800x600", |b| {
        b.iter(|| {
            warp_to_canvas(
                black_box(&generated),
                (800, 600),
                &transform,
                FillPolicy::Solid([255, 255, 255]),
            )
            .unwrap()
        })
    });
    group.finish();
}

criterion_group!(benches, bench_solver, bench_warp);
criterion_main!(benches);
