//! Benchmarks for the classification stages and the full pipeline

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sarflood_algorithms::change::{change_score, BaselineStack};
use sarflood_algorithms::classification::{
    global_threshold, grow, multiscale_bimodality_mask, GlobalThresholdParams, MultiscaleParams,
    RegionGrowingParams,
};
use sarflood_algorithms::morphology::{refine_mask, RefineParams};
use sarflood_algorithms::pipeline::{FloodConfig, FloodPipeline, PipelineInputs};
use sarflood_algorithms::synthetic::{flood_scene, FloodScene, SceneParams};
use sarflood_parallel::ProcessingMode;

fn scene(size: usize) -> FloodScene {
    let half = size as f64 / 2.0;
    flood_scene(&SceneParams {
        rows: size,
        cols: size,
        center: (half, half),
        radius: half / 2.0,
        ..Default::default()
    })
}

fn bench_change_score(c: &mut Criterion) {
    let mut group = c.benchmark_group("classification/change_score");
    for size in [256, 512, 1024] {
        let s = scene(size);
        let baseline = BaselineStack::new(s.baseline.clone()).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| change_score(black_box(&baseline), &s.flood, Some(&s.incidence)).unwrap())
        });
    }
    group.finish();
}

fn bench_bimodality(c: &mut Criterion) {
    let mut group = c.benchmark_group("classification/bimodality");
    let params = MultiscaleParams::default();
    for size in [256, 512] {
        let s = scene(size);
        let baseline = BaselineStack::new(s.baseline.clone()).unwrap();
        let score = change_score(&baseline, &s.flood, None).unwrap().score;
        for (name, mode) in [("seq", ProcessingMode::Sequential), ("par", ProcessingMode::Parallel)] {
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| multiscale_bimodality_mask(black_box(&score), &params, mode).unwrap())
            });
        }
    }
    group.finish();
}

fn bench_threshold_and_growth(c: &mut Criterion) {
    let mut group = c.benchmark_group("classification/threshold_grow");
    let s = scene(512);
    let baseline = BaselineStack::new(s.baseline.clone()).unwrap();
    let score = change_score(&baseline, &s.flood, None).unwrap().score;
    let selection = score.valid_mask();
    let thresholding = GlobalThresholdParams::default();

    group.bench_function("global_threshold", |b| {
        b.iter(|| global_threshold(black_box(&score), &selection, None, &thresholding).unwrap())
    });

    let seed = global_threshold(&score, &selection, None, &thresholding).unwrap().seed;
    let params = RegionGrowingParams::default();
    group.bench_function("grow", |b| b.iter(|| grow(black_box(&score), &seed, &params).unwrap()));

    let refine = RefineParams {
        pixel_area_m2: 1.0,
        min_mapping_unit_m2: 100.0,
        ..Default::default()
    };
    group.bench_function("refine_mask", |b| b.iter(|| refine_mask(black_box(&seed), &refine).unwrap()));
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    let mut config = FloodConfig::default();
    config.mapping.pixel_area_m2 = 1.0;
    config.mapping.min_mapping_unit_m2 = 100.0;
    let pipeline = FloodPipeline::new(config).unwrap();

    let s = scene(512);
    let inputs = PipelineInputs {
        baseline: BaselineStack::new(s.baseline).unwrap(),
        flood: s.flood,
        incidence: Some(s.incidence),
        slope: None,
    };
    group.bench_function("run_512", |b| b.iter(|| pipeline.run(black_box(&inputs)).unwrap()));
    group.finish();
}

criterion_group!(
    benches,
    bench_change_score,
    bench_bimodality,
    bench_threshold_and_growth,
    bench_pipeline
);
criterion_main!(benches);
