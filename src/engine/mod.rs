//! Reference executor for [`Graph`]s on `ndarray` tensors.

pub mod kernels;

use crate::config::DType;
use crate::constants::layers::MBSTD_EPSILON;
use crate::error::{PuzzleGanError, Result};
use crate::graph::{Graph, KernelTransform, NodeId, NoiseSource, Op, WeightRef};
use crate::params::{ParamKey, ParamStore};
use half::f16;
use ndarray::{ArrayD, IxDyn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use tracing::trace;

/// Evaluates a graph against a parameter store with a fixed LOD value.
pub struct Executor<'a> {
	graph: &'a Graph,
	store: &'a dyn ParamStore,
	lod: f32,
	rng: StdRng,
}

impl<'a> Executor<'a> {
	pub fn new(graph: &'a Graph, store: &'a dyn ParamStore) -> Self {
		Executor {
			graph,
			store,
			lod: 0.0,
			rng: StdRng::seed_from_u64(0),
		}
	}

	/// LOD value read by every blend node during this execution.
	pub fn lod(mut self, lod: f32) -> Self {
		self.lod = lod;
		self
	}

	/// Seed of the generator used for random noise.
	pub fn seed(mut self, seed: u64) -> Self {
		self.rng = StdRng::seed_from_u64(seed);
		self
	}

	/// Runs the graph. `feeds` pairs input names with batched tensors.
	pub fn run(mut self, feeds: &[(&str, ArrayD<f32>)]) -> Result<Vec<ArrayD<f32>>> {
		let graph = self.graph;
		let needed = graph.reachable();
		let mut values: Vec<Option<ArrayD<f32>>> = vec![None; graph.len()];
		let mut batch: Option<usize> = None;

		for (name, value) in feeds {
			let id = graph
				.input(name)
				.ok_or_else(|| PuzzleGanError::Execution(format!("graph has no input named {}", name)))?;
			let expected = &graph.node(id).shape;
			if value.ndim() != expected.len() + 1 || &value.shape()[1..] != expected.as_slice() {
				return Err(PuzzleGanError::Shape(format!(
					"input {} expects (batch, {:?}), got {:?}",
					name,
					expected.as_slice(),
					value.shape()
				)));
			}
			match batch {
				Some(b) if b != value.shape()[0] => {
					return Err(PuzzleGanError::Shape(format!(
						"input {} has batch {}, expected {}",
						name,
						value.shape()[0],
						b
					)))
				}
				_ => batch = Some(value.shape()[0]),
			}
			values[id.index()] = Some(value.clone());
		}

		for (index, node) in graph.nodes().iter().enumerate() {
			if !needed[index] || values[index].is_some() {
				continue;
			}
			let args: Vec<&ArrayD<f32>> = node
				.inputs
				.iter()
				.map(|id| {
					values[id.index()]
						.as_ref()
						.ok_or_else(|| PuzzleGanError::Execution(format!("{} evaluated before its input {}", index, id)))
				})
				.collect::<Result<_>>()?;
			let out = self.eval(&node.op, &args, &node.shape)?;
			trace!(node = index, op = node.op.kind(), shape = ?out.shape(), "evaluated");
			let out = self.quantize(out);
			values[index] = Some(out);
		}

		graph
			.outputs()
			.iter()
			.map(|id: &NodeId| {
				values[id.index()]
					.take()
					.ok_or_else(|| PuzzleGanError::Execution(format!("output {} was not fed", id)))
			})
			.collect()
	}

	fn eval(&mut self, op: &Op, args: &[&ArrayD<f32>], shape: &[usize]) -> Result<ArrayD<f32>> {
		match op {
			Op::Input { name } => Err(PuzzleGanError::Execution(format!("input {} was not fed", name))),
			Op::Cast { .. } => Ok(args[0].clone()),
			Op::Dense { weight } => kernels::dense(args[0], &self.weight(weight)?),
			Op::Conv2d { weight, stride } => kernels::conv2d(args[0], &self.weight(weight)?, *stride),
			Op::ConvTranspose2d { weight, stride } => {
				kernels::conv2d_transpose(args[0], &self.weight(weight)?, *stride)
			}
			Op::Bias { key } => kernels::bias(args[0], &self.variable(key)?),
			Op::LeakyRelu { alpha } => Ok(kernels::leaky_relu(args[0], *alpha)),
			Op::Relu => Ok(kernels::relu(args[0])),
			Op::Upscale2d { factor } => kernels::upscale2d(args[0], *factor),
			Op::Downscale2d { factor } => kernels::downscale2d(args[0], *factor),
			Op::PixelNorm { epsilon } => Ok(kernels::pixel_norm(args[0], *epsilon)),
			Op::MinibatchStddev {
				group_size,
				num_new_features,
			} => kernels::minibatch_stddev(args[0], *group_size, *num_new_features, MBSTD_EPSILON),
			Op::Noise { weight, source } => {
				let noise = match source {
					NoiseSource::Random => {
						let x = args[0].shape();
						let dims = [x[0], 1, x[2], x[3]];
						let len: usize = dims.iter().product();
						let rng = &mut self.rng;
						let samples: Vec<f32> = (0..len).map(|_| StandardNormal.sample(&mut *rng)).collect();
						ArrayD::from_shape_vec(IxDyn(&dims), samples)?
					}
					NoiseSource::Fixed(key) => self.variable(key)?,
				};
				kernels::add_noise(args[0], &noise, &self.variable(weight)?)
			}
			Op::Slice { start, len } => kernels::slice_columns(args[0], *start, *len),
			Op::Reshape => kernels::reshape(args[0], shape),
			Op::Assemble { tiles } => kernels::assemble(args, tiles, shape[1], shape[2]),
			Op::Lerp { lod, clip } => {
				let mut t = self.lod - *lod;
				if *clip {
					t = t.max(0.0).min(1.0);
				}
				kernels::lerp(args[0], args[1], t)
			}
		}
	}

	fn variable(&self, key: &ParamKey) -> Result<ArrayD<f32>> {
		self.store
			.value(key)
			.map(|value| self.quantize(value.clone()))
			.ok_or_else(|| PuzzleGanError::MissingParameter(key.render()))
	}

	/// Scaled and, for fused ops, rearranged kernel.
	fn weight(&self, weight: &WeightRef) -> Result<ArrayD<f32>> {
		let stored = self
			.store
			.value(&weight.key)
			.ok_or_else(|| PuzzleGanError::MissingParameter(weight.key.render()))?;
		let scaled = stored.mapv(|v| v * weight.scale);
		let kernel = match weight.transform {
			KernelTransform::Plain => scaled,
			KernelTransform::FusedUp => kernels::fuse_up_kernel(&scaled)?,
			KernelTransform::FusedDown => kernels::fuse_down_kernel(&scaled)?,
		};
		Ok(self.quantize(kernel))
	}

	fn quantize(&self, value: ArrayD<f32>) -> ArrayD<f32> {
		match self.graph.dtype() {
			DType::Float32 => value,
			DType::Float16 => value.mapv(|v| f16::from_f32(v).to_f32()),
		}
	}
}
