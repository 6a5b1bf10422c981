use ndarray::{ArrayD, IxDyn};
use puzzle_gan::config::DType;
use puzzle_gan::engine::Executor;
use puzzle_gan::graph::{Graph, GraphBuilder};
use puzzle_gan::layers::{self, NoiseMode};
use puzzle_gan::params::{MemoryParamStore, ParamKey};

fn feature_maps(batch: usize, channels: usize, size: usize) -> ArrayD<f32> {
    ArrayD::from_shape_fn(IxDyn(&[batch, channels, size, size]), |idx| {
        ((idx[0] * 13 + idx[1] * 5 + idx[2] * 3 + idx[3]) % 11) as f32 / 5.0 - 1.0
    })
}

fn eval(graph: &Graph, store: &MemoryParamStore, x: ArrayD<f32>, seed: u64) -> ArrayD<f32> {
    Executor::new(graph, store).seed(seed).run(&[("x", x)]).unwrap().remove(0)
}

fn max_abs_diff(a: &ArrayD<f32>, b: &ArrayD<f32>) -> f32 {
    assert_eq!(a.shape(), b.shape());
    a.iter().zip(b.iter()).fold(0.0f32, |m, (x, y)| m.max((x - y).abs()))
}

#[test]
fn fused_upscale_matches_upscale_then_conv() {
    let mut store = MemoryParamStore::new(21);

    let fused = {
        let mut b = GraphBuilder::new("G", DType::Float32, &mut store);
        let x = b.input("x", &[3, 4, 4]);
        let y = b
            .scope("Conv", |b| layers::upscale2d_conv2d(b, x, 5, 3, 2f32.sqrt(), true))
            .unwrap();
        assert_eq!(b.shape(y).as_slice(), &[5, 8, 8]);
        b.finish(vec![y])
    };
    let separate = {
        let mut b = GraphBuilder::new("G", DType::Float32, &mut store);
        let x = b.input("x", &[3, 4, 4]);
        let up = layers::upscale2d(&mut b, x, 2).unwrap();
        let y = b.scope("Conv", |b| layers::conv2d(b, up, 5, 3, 2f32.sqrt(), true)).unwrap();
        b.finish(vec![y])
    };
    assert_eq!(fused.param_keys(), separate.param_keys());

    let x = feature_maps(2, 3, 4);
    let a = eval(&fused, &store, x.clone(), 0);
    let b = eval(&separate, &store, x, 0);
    assert!(max_abs_diff(&a, &b) < 1e-4);
}

#[test]
fn fused_downscale_matches_conv_then_downscale() {
    let mut store = MemoryParamStore::new(22);

    let fused = {
        let mut b = GraphBuilder::new("D", DType::Float32, &mut store);
        let x = b.input("x", &[4, 8, 8]);
        let y = b
            .scope("Conv", |b| layers::conv2d_downscale2d(b, x, 2, 3, 2f32.sqrt(), true))
            .unwrap();
        assert_eq!(b.shape(y).as_slice(), &[2, 4, 4]);
        b.finish(vec![y])
    };
    let separate = {
        let mut b = GraphBuilder::new("D", DType::Float32, &mut store);
        let x = b.input("x", &[4, 8, 8]);
        let y = b.scope("Conv", |b| layers::conv2d(b, x, 2, 3, 2f32.sqrt(), true)).unwrap();
        let y = layers::downscale2d(&mut b, y, 2).unwrap();
        b.finish(vec![y])
    };

    let x = feature_maps(3, 4, 8);
    let a = eval(&fused, &store, x.clone(), 0);
    let b = eval(&separate, &store, x, 0);
    assert!(max_abs_diff(&a, &b) < 1e-4);
}

#[test]
fn upscale_and_downscale_by_four() {
    let mut store = MemoryParamStore::default();
    let mut b = GraphBuilder::new("G", DType::Float32, &mut store);
    let x = b.input("x", &[1, 2, 2]);
    let up = layers::upscale2d(&mut b, x, 4).unwrap();
    let down = layers::downscale2d(&mut b, up, 4).unwrap();
    assert_eq!(b.shape(up).as_slice(), &[1, 8, 8]);
    let graph = b.finish(vec![up, down]);

    let x = ArrayD::from_shape_vec(IxDyn(&[1, 1, 2, 2]), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    let outputs = Executor::new(&graph, &store).run(&[("x", x.clone())]).unwrap();
    assert_eq!(outputs[0][[0, 0, 0, 3]], 1.0);
    assert_eq!(outputs[0][[0, 0, 7, 4]], 4.0);
    assert_eq!(outputs[1], x);
}

#[test]
fn downscale_rejects_indivisible_maps() {
    let mut store = MemoryParamStore::default();
    let mut b = GraphBuilder::new("D", DType::Float32, &mut store);
    let x = b.input("x", &[1, 6, 6]);
    assert!(layers::downscale2d(&mut b, x, 4).is_err());
    assert!(layers::downscale2d(&mut b, x, 0).unwrap_err().is_config());
}

#[test]
fn minibatch_stddev_clamps_group_to_batch() {
    let mut store = MemoryParamStore::default();
    let mut b = GraphBuilder::new("D", DType::Float32, &mut store);
    let x = b.input("x", &[2, 3, 3]);
    let y = layers::minibatch_stddev_layer(&mut b, x, 4, 1).unwrap();
    assert_eq!(b.shape(y).as_slice(), &[3, 3, 3]);
    let graph = b.finish(vec![y]);

    let mut x = ArrayD::zeros(IxDyn(&[2, 2, 3, 3]));
    x.index_axis_mut(ndarray::Axis(0), 1).fill(2.0);
    let out = eval(&graph, &store, x, 0);
    assert_eq!(out.shape(), &[2, 3, 3, 3]);
    for n in 0..2 {
        assert!((out[[n, 2, 1, 1]] - 1.0).abs() < 1e-4);
    }
    assert_eq!(out[[1, 0, 0, 0]], 2.0);
}

#[test]
fn noise_starts_as_identity() {
    let mut store = MemoryParamStore::default();
    let mut b = GraphBuilder::new("G", DType::Float32, &mut store);
    let x = b.input("x", &[2, 4, 4]);
    let y = layers::apply_noise(&mut b, x, NoiseMode::Randomize).unwrap();
    let graph = b.finish(vec![y]);

    let x = feature_maps(2, 2, 4);
    assert_eq!(eval(&graph, &store, x.clone(), 1), x);
}

#[test]
fn fixed_noise_repeats_and_random_noise_does_not() {
    let mut store = MemoryParamStore::default();
    let (fixed, random) = {
        let build = |store: &mut MemoryParamStore, scope: &str, mode: NoiseMode| {
            let mut b = GraphBuilder::new("G", DType::Float32, store);
            let x = b.input("x", &[2, 4, 4]);
            let y = b.scope(scope, |b| layers::apply_noise(b, x, mode)).unwrap();
            b.finish(vec![y])
        };
        (
            build(&mut store, "Fixed", NoiseMode::Fixed),
            build(&mut store, "Random", NoiseMode::Randomize),
        )
    };
    assert!(store.entry("G/Fixed/Noise/noise").is_some());
    assert!(!store.entry("G/Fixed/Noise/noise").unwrap().trainable);

    let ones = ArrayD::from_elem(IxDyn(&[2]), 1.0f32);
    store.assign(&ParamKey::parse("G/Fixed/Noise/weight"), ones.clone()).unwrap();
    store.assign(&ParamKey::parse("G/Random/Noise/weight"), ones).unwrap();

    let x = feature_maps(2, 2, 4);
    assert_eq!(eval(&fixed, &store, x.clone(), 1), eval(&fixed, &store, x.clone(), 2));
    assert_ne!(eval(&random, &store, x.clone(), 1), eval(&random, &store, x.clone(), 2));
    assert_eq!(eval(&random, &store, x.clone(), 3), eval(&random, &store, x, 3));
}

#[test]
fn dense_flattens_its_input() {
    let mut store = MemoryParamStore::default();
    let mut b = GraphBuilder::new("D", DType::Float32, &mut store);
    let x = b.input("x", &[4, 2, 2]);
    let y = b.scope("Dense0", |b| layers::dense(b, x, 7, 1.0, false)).unwrap();
    assert_eq!(b.shape(y).as_slice(), &[7]);
    drop(b);
    assert_eq!(store.entry("D/Dense0/weight").unwrap().value.shape(), &[16, 7]);
}

#[test]
fn blend_rejects_mismatched_shapes() {
    let mut store = MemoryParamStore::default();
    let mut b = GraphBuilder::new("G", DType::Float32, &mut store);
    let x = b.input("x", &[1, 4, 4]);
    let up = layers::upscale2d(&mut b, x, 2).unwrap();
    assert!(layers::blend(&mut b, x, up, 0.0, true).is_err());
}

#[test]
fn blend_follows_executor_lod() {
    let mut store = MemoryParamStore::default();
    let mut b = GraphBuilder::new("G", DType::Float32, &mut store);
    let x = b.input("x", &[1, 2, 2]);
    let zero = layers::relu(&mut b, x);
    let clipped = layers::blend(&mut b, x, zero, 1.0, true).unwrap();
    let free = layers::blend(&mut b, x, zero, 1.0, false).unwrap();
    let graph = b.finish(vec![clipped, free]);

    // relu of a negative map is zero, so the blend is x * (1 - t)
    let x = ArrayD::from_elem(IxDyn(&[1, 1, 2, 2]), -2.0f32);
    let at = |lod: f32| Executor::new(&graph, &store).lod(lod).run(&[("x", x.clone())]).unwrap();
    let out = at(1.5);
    assert_eq!(out[0][[0, 0, 0, 0]], -1.0);
    assert_eq!(out[1][[0, 0, 0, 0]], -1.0);
    let out = at(3.0);
    assert_eq!(out[0][[0, 0, 0, 0]], 0.0);
    assert_eq!(out[1][[0, 0, 0, 0]], 2.0);
}

#[test]
fn slice_and_reshape_check_sizes() {
    let mut store = MemoryParamStore::default();
    let mut b = GraphBuilder::new("G", DType::Float32, &mut store);
    let z = b.input("z", &[12]);
    let part = layers::slice(&mut b, z, 4, 8).unwrap();
    assert!(layers::slice(&mut b, z, 8, 8).is_err());
    assert!(layers::reshape(&mut b, part, &[2, 2, 2]).is_ok());
    assert!(layers::reshape(&mut b, part, &[3, 3]).is_err());
}
