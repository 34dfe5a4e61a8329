//! End-to-end flood mapping on synthetic scenes.
//!
//! The default scene is a 200x200 grid with a baseline of ten `N(-15, 2)` dB
//! acquisitions and a flood acquisition with a 50 pixel radius disc of
//! `N(-22, 1.5)` dB water.

use sarflood_algorithms::change::BaselineStack;
use sarflood_algorithms::pipeline::{
    FloodConfig, FloodPipeline, PipelineInputs, BIMODALITY_MASK_FILE, CHANGE_SCORE_FILE,
    FLOOD_MASK_FILE, FLOOD_MASK_LOCAL_FILE, FLOOD_PROBABILITY_FILE,
};
use sarflood_algorithms::synthetic::{flood_scene, FloodScene, SceneParams};
use sarflood_core::io::read_geotiff;
use sarflood_core::{Error, Mask, Raster};
use sarflood_parallel::ProcessingMode;

fn inputs(scene: &FloodScene) -> PipelineInputs {
    PipelineInputs {
        baseline: BaselineStack::new(scene.baseline.clone()).unwrap(),
        flood: scene.flood.clone(),
        incidence: Some(scene.incidence.clone()),
        slope: None,
    }
}

/// One square metre pixels with a mapping unit well below the disc area
fn unit_pixel_config() -> FloodConfig {
    let mut config = FloodConfig::default();
    config.mapping.pixel_area_m2 = 1.0;
    config.mapping.min_mapping_unit_m2 = 100.0;
    config
}

/// (recall inside truth, flooded fraction outside truth)
fn accuracy(mask: &Mask, truth: &Mask) -> (f64, f64) {
    let mut hit = 0usize;
    let mut inside = 0usize;
    let mut false_alarm = 0usize;
    let mut outside = 0usize;
    for (&m, &t) in mask.data().iter().zip(truth.data().iter()) {
        if t != 0 {
            inside += 1;
            hit += usize::from(m != 0);
        } else {
            outside += 1;
            false_alarm += usize::from(m != 0);
        }
    }
    (hit as f64 / inside as f64, false_alarm as f64 / outside as f64)
}

#[test]
fn flood_disc_is_recovered() {
    let scene = flood_scene(&SceneParams::default());
    let pipeline = FloodPipeline::new(unit_pixel_config()).unwrap();
    let output = pipeline.run(&inputs(&scene)).unwrap();

    assert!(output.threshold.is_some());
    assert!(output.water.is_some());
    let (recall, background) = accuracy(&output.flood_mask, &scene.truth);
    assert!(recall >= 0.90, "recall {}", recall);
    assert!(background <= 0.05, "background flooded {}", background);

    let seed = output.seed.count_set();
    assert!(output.flood_mask.count_set() >= seed / 2);
    assert!(output.local.is_none());
}

#[test]
fn two_member_baseline_is_rejected() {
    let scene = flood_scene(&SceneParams {
        baseline_len: 2,
        ..Default::default()
    });
    let pipeline = FloodPipeline::new(unit_pixel_config()).unwrap();
    match pipeline.run(&inputs(&scene)) {
        Err(Error::Stage { stage, source }) => {
            assert_eq!(stage, "change_score");
            assert!(matches!(*source, Error::DegenerateBaseline { members: 2 }));
        }
        other => panic!("expected degenerate baseline, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn all_nodata_flood_gives_empty_products() {
    let scene = flood_scene(&SceneParams {
        rows: 80,
        cols: 80,
        center: (40.0, 40.0),
        radius: 20.0,
        ..Default::default()
    });
    let mut data = inputs(&scene);
    data.flood = scene.flood.like(f32::NAN);

    let mut config = unit_pixel_config();
    config.local.enabled = true;
    let output = FloodPipeline::new(config).unwrap().run(&data).unwrap();

    assert_eq!(output.change.score.valid_count(), 0);
    assert_eq!(output.bimodality.mask.count_set(), 0);
    assert!(!output.bimodality.fell_back);
    assert!(output.threshold.is_none());
    assert_eq!(output.seed.count_set(), 0);
    assert!(output.water.is_none());
    assert_eq!(output.flood_mask.count_set(), 0);
    assert!(output.local.is_none());
}

#[test]
fn unchanged_scene_selects_almost_nothing() {
    let scene = flood_scene(&SceneParams {
        water_mean: -15.0,
        water_std: 2.0,
        ..Default::default()
    });
    let mut config = unit_pixel_config();
    config.bimodality.bimodality.smoothing_sigma = None;
    // tile sizes that divide the scene, so no tile is padded
    config.bimodality.window_min = 50;
    config.bimodality.window_max = 100;
    let output = FloodPipeline::new(config).unwrap().run(&inputs(&scene)).unwrap();

    let seed_fraction = output.seed.set_fraction();
    assert!(
        output.bimodality.fell_back || seed_fraction < 0.01,
        "fell back {} seed fraction {}",
        output.bimodality.fell_back,
        seed_fraction
    );
}

#[test]
fn repeated_runs_are_identical() {
    let scene = flood_scene(&SceneParams {
        rows: 120,
        cols: 120,
        center: (60.0, 60.0),
        radius: 30.0,
        ..Default::default()
    });
    let pipeline = FloodPipeline::new(unit_pixel_config()).unwrap();
    let a = pipeline.run(&inputs(&scene)).unwrap();
    let b = pipeline
        .clone()
        .with_mode(ProcessingMode::Sequential)
        .run(&inputs(&scene))
        .unwrap();

    assert_eq!(a.threshold, b.threshold);
    assert_eq!(a.bimodality.mask.data(), b.bimodality.mask.data());
    assert_eq!(a.seed.data(), b.seed.data());
    assert_eq!(a.flood_mask.data(), b.flood_mask.data());
}

#[test]
fn local_thresholding_is_independent_of_workers() {
    let scene = flood_scene(&SceneParams {
        rows: 100,
        cols: 100,
        center: (50.0, 50.0),
        radius: 25.0,
        ..Default::default()
    });

    let run = |workers: usize| {
        let mut config = unit_pixel_config();
        config.local.enabled = true;
        config.local.workers = workers;
        FloodPipeline::new(config).unwrap().run(&inputs(&scene)).unwrap()
    };
    let sequential = run(1);
    let parallel = run(4);

    let a = sequential.local.expect("local output");
    let b = parallel.local.expect("local output");
    assert_eq!(a.probability.occurrences, b.probability.occurrences);
    assert_eq!(a.probability.visits, b.probability.visits);
    assert_eq!(a.probability.decisions, b.probability.decisions);
    assert_eq!(a.flood_mask.data(), b.flood_mask.data());

    for &p in a.probability.probability.data().iter() {
        assert!(p.is_nan() || (0.0..1.0).contains(&p), "probability {}", p);
    }
}

#[test]
fn products_are_written_as_geotiffs() {
    let scene = flood_scene(&SceneParams {
        rows: 100,
        cols: 100,
        center: (50.0, 50.0),
        radius: 25.0,
        ..Default::default()
    });
    let mut config = unit_pixel_config();
    config.local.enabled = true;
    let output = FloodPipeline::new(config).unwrap().run(&inputs(&scene)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let written = output.write_all(dir.path()).unwrap();
    assert_eq!(written.len(), 5);
    for name in [
        CHANGE_SCORE_FILE,
        BIMODALITY_MASK_FILE,
        FLOOD_MASK_FILE,
        FLOOD_PROBABILITY_FILE,
        FLOOD_MASK_LOCAL_FILE,
    ] {
        assert!(dir.path().join(name).exists(), "missing {}", name);
    }

    let mask: Raster<u8> = read_geotiff(dir.path().join(FLOOD_MASK_FILE)).unwrap();
    assert_eq!(mask.data(), output.flood_mask.data());

    let score: Raster<f32> = read_geotiff(dir.path().join(CHANGE_SCORE_FILE)).unwrap();
    assert_eq!(score.shape(), (100, 100));
    assert!((score.transform().origin_x - 500_000.0).abs() < 1e-6);
}
