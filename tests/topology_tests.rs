use ndarray::{ArrayD, IxDyn};
use puzzle_gan::config::{DType, NetworkConfig, Structure};
use puzzle_gan::engine::Executor;
use puzzle_gan::graph::Graph;
use puzzle_gan::network::{build_discriminator, build_generator, random_latents, Network, Topology};
use puzzle_gan::params::{MemoryParamStore, ParamStore};
use puzzle_gan::progressive::{self, GrowthPlan, GrowthStep};

const LODS: &[f32] = &[0.0, 0.3, 1.0, 1.5, 2.0, -1.0, 5.0];

fn small_config(resolution: usize, fused_scale: bool) -> NetworkConfig {
    NetworkConfig::builder()
        .resolution(resolution)
        .firstblock_res(8)
        .fmap_base(64)
        .fmap_max(16)
        .latent_size(16)
        .latent_sizes(vec![8, 8])
        .mode("2parts-bedrooms")
        .fused_scale(fused_scale)
        .mbstd_group_size(2)
        .build()
}

fn test_images(config: &NetworkConfig, batch: usize) -> ArrayD<f32> {
    let r = config.resolution;
    ArrayD::from_shape_fn(IxDyn(&[batch, config.num_channels, r, r]), |idx| {
        let v = (idx[0] * 31 + idx[2] * 7 + idx[3] * 3) % 17;
        v as f32 / 8.0 - 1.0
    })
}

fn run(graph: &Graph, store: &MemoryParamStore, lod: f32, input: &str, value: ArrayD<f32>, label_size: usize) -> ArrayD<f32> {
    let batch = value.shape()[0];
    let labels = ArrayD::zeros(IxDyn(&[batch, label_size]));
    let mut outputs = Executor::new(graph, store)
        .lod(lod)
        .run(&[(input, value), ("labels", labels)])
        .unwrap();
    outputs.pop().unwrap()
}

fn assert_close(a: &ArrayD<f32>, b: &ArrayD<f32>, what: &str) {
    assert_eq!(a.shape(), b.shape(), "{}", what);
    let scale = a.iter().fold(1.0f32, |m, v| m.max(v.abs()));
    let diff = a.iter().zip(b.iter()).fold(0.0f32, |m, (x, y)| m.max((x - y).abs()));
    assert!(diff <= 1e-4 * scale, "{}: max difference {} (scale {})", what, diff, scale);
}

#[test]
fn generator_topologies_agree() {
    for &fused in &[true, false] {
        let config = small_config(32, fused);
        let mut store = MemoryParamStore::new(11);
        let linear = build_generator(&config, &mut store, &Topology::Linear).unwrap();
        let latents = random_latents(&config, 2, 5);

        for &lod in LODS {
            let plan = GrowthPlan::new(&config, lod);
            let recursive = build_generator(&config, &mut store, &Topology::Recursive(plan)).unwrap();
            let a = run(&linear, &store, lod, "latents", latents.clone(), 0);
            let b = run(&recursive, &store, lod, "latents", latents.clone(), 0);
            assert_eq!(a.shape(), &[2, 1, 32, 32]);
            assert_close(&a, &b, &format!("generator lod {} fused {}", lod, fused));
        }
    }
}

#[test]
fn discriminator_topologies_agree() {
    for &fused in &[true, false] {
        let config = small_config(32, fused);
        let mut store = MemoryParamStore::new(12);
        let linear = build_discriminator(&config, &mut store, &Topology::Linear).unwrap();
        let images = test_images(&config, 4);

        for &lod in LODS {
            let plan = GrowthPlan::new(&config, lod);
            let recursive = build_discriminator(&config, &mut store, &Topology::Recursive(plan)).unwrap();
            let a = run(&linear, &store, lod, "images", images.clone(), 0);
            let b = run(&recursive, &store, lod, "images", images.clone(), 0);
            assert_eq!(a.shape(), &[4, 1]);
            assert_close(&a, &b, &format!("discriminator lod {} fused {}", lod, fused));
        }
    }
}

#[test]
fn separate_stores_with_the_same_seed_agree() {
    let config = small_config(16, true);
    let latents = random_latents(&config, 2, 9);

    let mut linear_store = MemoryParamStore::new(3);
    let linear = build_generator(&config, &mut linear_store, &Topology::Linear).unwrap();
    let mut recursive_store = MemoryParamStore::new(3);
    let plan = GrowthPlan::new(&config, 0.25);
    let recursive = build_generator(&config, &mut recursive_store, &Topology::Recursive(plan)).unwrap();

    let a = run(&linear, &linear_store, 0.25, "latents", latents.clone(), 0);
    let b = run(&recursive, &recursive_store, 0.25, "latents", latents, 0);
    assert_close(&a, &b, "separate stores");
}

#[test]
fn recursive_graph_skips_unreached_stages() {
    let config = small_config(32, true);
    let mut store = MemoryParamStore::default();
    let linear = build_generator(&config, &mut store, &Topology::Linear).unwrap();
    let coarse = build_generator(&config, &mut store, &Topology::Recursive(GrowthPlan::new(&config, 2.0))).unwrap();

    assert!(coarse.len() < linear.len());
    assert!(coarse.scopes().iter().all(|scope| !scope.starts_with("G/32x32")));
    assert!(linear.scopes().iter().any(|scope| scope.starts_with("G/32x32")));
    assert_eq!(coarse.count_kind("Lerp"), 0);
    assert_eq!(linear.count_kind("Lerp"), 2);
}

/// Distinct `NxN` stage scopes directly under the root, in creation order.
fn stage_scopes(graph: &Graph) -> Vec<String> {
    let mut stages: Vec<String> = Vec::new();
    for scope in graph.scopes() {
        if let Some(part) = scope.split('/').nth(1) {
            let is_stage = part.split('x').count() == 2 && part.split('x').all(|n| n.parse::<usize>().is_ok());
            if is_stage && !stages.iter().any(|s| s == part) {
                stages.push(part.to_string());
            }
        }
    }
    stages
}

#[test]
fn stages_of_32_from_8() {
    let config = small_config(32, true);
    assert_eq!(progressive::stages(&config), vec![3, 4, 5]);

    let mut store = MemoryParamStore::default();
    let generator = build_generator(&config, &mut store, &Topology::Linear).unwrap();
    assert_eq!(stage_scopes(&generator), vec!["8x8", "16x16", "32x32"]);

    let discriminator = build_discriminator(&config, &mut store, &Topology::Linear).unwrap();
    assert_eq!(stage_scopes(&discriminator), vec!["32x32", "16x16", "8x8"]);
}

#[test]
fn parameter_names_follow_the_stage_hierarchy() {
    let config = small_config(16, true);
    let mut store = MemoryParamStore::default();
    build_generator(&config, &mut store, &Topology::Linear).unwrap();
    build_discriminator(&config, &mut store, &Topology::Linear).unwrap();

    for name in &[
        "G/8x8/Dense1/weight",
        "G/8x8/Dense2/weight",
        "G/8x8/bias",
        "G/8x8/Conv/weight",
        "G/16x16/Conv0_up/weight",
        "G/16x16/Conv1/bias",
        "G/ToRGB_lod0/weight",
        "G/ToRGB_lod1/bias",
        "D/FromRGB_lod0/weight",
        "D/FromRGB_lod1/weight",
        "D/16x16/Conv1_down/weight",
        "D/8x8/Dense1/bias",
    ] {
        assert!(store.entry(name).is_some(), "missing {}", name);
    }
    assert_eq!(store.entry("D/8x8/Dense1/weight").unwrap().value.shape(), &[16, 1]);
}

#[test]
fn network_reads_lod_once_and_caches_plans() {
    let config = small_config(16, true);
    let mut generator = Network::generator(config.clone(), MemoryParamStore::default()).unwrap();
    let lod = generator.lod();
    let latents = random_latents(&config, 2, 1);

    lod.set(0.5);
    let a = generator.forward(latents.clone(), 0).unwrap();
    lod.set(0.75);
    let b = generator.forward(latents.clone(), 0).unwrap();
    assert_eq!(generator.cached_graphs(), 1);
    assert_ne!(a, b);

    lod.set(1.0);
    let c = generator.forward(latents, 0).unwrap();
    assert_eq!(generator.cached_graphs(), 2);
    assert_eq!(c.shape(), &[2, 1, 16, 16]);
    // lod 1 shows the 8x8 stage, so every 2x2 block is constant
    for y in (0..16).step_by(2) {
        for x in (0..16).step_by(2) {
            assert_eq!(c[[0, 0, y, x]], c[[0, 0, y + 1, x + 1]]);
        }
    }
}

#[test]
fn non_finite_lod_is_rejected() {
    let config = small_config(16, true);
    let mut generator = Network::generator(config.clone(), MemoryParamStore::default()).unwrap();
    generator.lod().set(f32::NAN);
    assert!(generator.forward(random_latents(&config, 1, 0), 0).is_err());
}

#[test]
fn linear_structure_builds_one_graph() {
    let config = NetworkConfig {
        structure: Some(Structure::Linear),
        ..small_config(16, true)
    };
    let mut discriminator = Network::discriminator(config.clone(), MemoryParamStore::default()).unwrap();
    for &lod in LODS {
        discriminator.lod().set(lod);
        let scores = discriminator.forward(test_images(&config, 2), 0).unwrap();
        assert_eq!(scores.shape(), &[2, 1]);
    }
    assert_eq!(discriminator.cached_graphs(), 1);
}

#[test]
fn half_precision_generator_runs() {
    let config = NetworkConfig {
        dtype: DType::Float16,
        ..small_config(16, false)
    };
    let mut generator = Network::generator(config.clone(), MemoryParamStore::default()).unwrap();
    let images = generator.forward(random_latents(&config, 2, 4), 0).unwrap();
    assert_eq!(images.shape(), &[2, 1, 16, 16]);
    assert!(images.iter().all(|v| v.is_finite()));
    assert!(generator.store().len() > 0);
}

#[test]
fn growth_plan_steps_for_three_stages() {
    let config = small_config(32, true);
    assert_eq!(
        GrowthPlan::new(&config, 1.5).steps(),
        &[GrowthStep::Descend, GrowthStep::Blend]
    );
    assert_eq!(GrowthPlan::new(&config, 2.0).steps(), &[GrowthStep::Emit]);
    assert_eq!(GrowthPlan::new(&config, 2.5).steps(), &[GrowthStep::Emit]);
}
