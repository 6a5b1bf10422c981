//! Layer primitives. Each function appends nodes to a [`GraphBuilder`] and creates its variables
//! in the builder's current scope.

use crate::config::DType;
use crate::error::{ConfigError, PuzzleGanError, Result};
use crate::graph::{GraphBuilder, KernelTransform, NodeId, NoiseSource, Op, Shape, WeightRef};
use crate::params::{Init, ParamSpec};
use smallvec::smallvec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
	LeakyRelu,
	Relu,
}

impl Activation {
	pub fn apply(self, b: &mut GraphBuilder, x: NodeId) -> NodeId {
		match self {
			Activation::LeakyRelu => leaky_relu(b, x, crate::constants::layers::LEAKY_RELU_ALPHA),
			Activation::Relu => relu(b, x),
		}
	}
}

/// How `apply_noise` obtains its per-pixel noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseMode {
	Randomize,
	/// Uses a stored constant buffer so repeated evaluations see the same noise.
	Fixed,
}

/// Creates the weight variable of a dense or convolutional layer.
///
/// Fan-in is the product of every dimension but the last, and `std = gain / sqrt(fan_in)`.
/// With `use_wscale` the variable starts at unit variance and `std` becomes the runtime scale.
pub fn get_weight(b: &mut GraphBuilder, shape: &[usize], gain: f32, use_wscale: bool) -> Result<WeightRef> {
	if shape.len() < 2 {
		return Err(PuzzleGanError::Shape(format!(
			"weight shape {:?} needs at least two dimensions",
			shape
		)));
	}
	let fan_in: usize = shape[..shape.len() - 1].iter().product();
	let std = gain / (fan_in as f32).sqrt();
	let (init, scale) = if use_wscale {
		(Init::Normal { std: 1.0 }, std)
	} else {
		(Init::Normal { std }, 1.0)
	};
	let key = b.variable("weight", ParamSpec::trainable(shape.to_vec(), init))?;
	Ok(WeightRef {
		key,
		scale,
		transform: KernelTransform::Plain,
	})
}

fn feature_map_dims(b: &GraphBuilder, x: NodeId, what: &str) -> Result<(usize, usize, usize)> {
	match b.shape(x).as_slice() {
		&[c, h, w] => Ok((c, h, w)),
		other => Err(PuzzleGanError::Shape(format!(
			"{} expects a (batch, channels, height, width) input, got per-sample shape {:?}",
			what, other
		))),
	}
}

fn check_kernel(kernel: usize) -> Result<()> {
	if kernel >= 1 && kernel % 2 == 1 {
		Ok(())
	} else {
		Err(ConfigError::InvalidKernel(kernel).into())
	}
}

pub fn dense(b: &mut GraphBuilder, x: NodeId, fmaps: usize, gain: f32, use_wscale: bool) -> Result<NodeId> {
	let flat: usize = b.shape(x).iter().product();
	let weight = get_weight(b, &[flat, fmaps], gain, use_wscale)?;
	Ok(b.add(Op::Dense { weight }, &[x], smallvec![fmaps]))
}

pub fn conv2d(
	b: &mut GraphBuilder,
	x: NodeId,
	fmaps: usize,
	kernel: usize,
	gain: f32,
	use_wscale: bool,
) -> Result<NodeId> {
	check_kernel(kernel)?;
	let (c, h, w) = feature_map_dims(b, x, "conv2d")?;
	let weight = get_weight(b, &[kernel, kernel, c, fmaps], gain, use_wscale)?;
	Ok(b.add(Op::Conv2d { weight, stride: 1 }, &[x], smallvec![fmaps, h, w]))
}

/// Per-channel bias, broadcast over the spatial axes of feature maps.
pub fn apply_bias(b: &mut GraphBuilder, x: NodeId) -> Result<NodeId> {
	let shape = b.shape(x).clone();
	let channels = *shape
		.first()
		.ok_or_else(|| PuzzleGanError::Shape("bias needs a channel axis".to_string()))?;
	let key = b.variable("bias", ParamSpec::trainable(vec![channels], Init::Zeros))?;
	Ok(b.add(Op::Bias { key }, &[x], shape))
}

pub fn leaky_relu(b: &mut GraphBuilder, x: NodeId, alpha: f32) -> NodeId {
	let shape = b.shape(x).clone();
	b.add(Op::LeakyRelu { alpha }, &[x], shape)
}

pub fn relu(b: &mut GraphBuilder, x: NodeId) -> NodeId {
	let shape = b.shape(x).clone();
	b.add(Op::Relu, &[x], shape)
}

fn check_factor(factor: usize) -> Result<()> {
	if factor >= 1 {
		Ok(())
	} else {
		Err(ConfigError::InvalidParameter("scale factor must be a positive integer".to_string()).into())
	}
}

/// Nearest neighbour upscale. A factor of 1 returns `x` unchanged.
pub fn upscale2d(b: &mut GraphBuilder, x: NodeId, factor: usize) -> Result<NodeId> {
	check_factor(factor)?;
	if factor == 1 {
		return Ok(x);
	}
	let (c, h, w) = feature_map_dims(b, x, "upscale2d")?;
	b.scope("Upscale2D", |b| {
		Ok(b.add(Op::Upscale2d { factor }, &[x], smallvec![c, h * factor, w * factor]))
	})
}

/// Box filter downscale. A factor of 1 returns `x` unchanged.
pub fn downscale2d(b: &mut GraphBuilder, x: NodeId, factor: usize) -> Result<NodeId> {
	check_factor(factor)?;
	if factor == 1 {
		return Ok(x);
	}
	let (c, h, w) = feature_map_dims(b, x, "downscale2d")?;
	if h % factor != 0 || w % factor != 0 {
		return Err(PuzzleGanError::Shape(format!(
			"{}x{} feature map is not divisible by {}",
			h, w, factor
		)));
	}
	b.scope("Downscale2D", |b| {
		Ok(b.add(Op::Downscale2d { factor }, &[x], smallvec![c, h / factor, w / factor]))
	})
}

/// Upscale by 2 and convolve as one transposed convolution.
pub fn upscale2d_conv2d(
	b: &mut GraphBuilder,
	x: NodeId,
	fmaps: usize,
	kernel: usize,
	gain: f32,
	use_wscale: bool,
) -> Result<NodeId> {
	check_kernel(kernel)?;
	let (c, h, w) = feature_map_dims(b, x, "upscale2d_conv2d")?;
	let mut weight = get_weight(b, &[kernel, kernel, c, fmaps], gain, use_wscale)?;
	weight.transform = KernelTransform::FusedUp;
	Ok(b.add(
		Op::ConvTranspose2d { weight, stride: 2 },
		&[x],
		smallvec![fmaps, h * 2, w * 2],
	))
}

/// Convolve and downscale by 2 as one strided convolution.
pub fn conv2d_downscale2d(
	b: &mut GraphBuilder,
	x: NodeId,
	fmaps: usize,
	kernel: usize,
	gain: f32,
	use_wscale: bool,
) -> Result<NodeId> {
	check_kernel(kernel)?;
	let (c, h, w) = feature_map_dims(b, x, "conv2d_downscale2d")?;
	if h % 2 != 0 || w % 2 != 0 {
		return Err(PuzzleGanError::Shape(format!("{}x{} feature map cannot be halved", h, w)));
	}
	let mut weight = get_weight(b, &[kernel, kernel, c, fmaps], gain, use_wscale)?;
	weight.transform = KernelTransform::FusedDown;
	Ok(b.add(Op::Conv2d { weight, stride: 2 }, &[x], smallvec![fmaps, h / 2, w / 2]))
}

pub fn pixel_norm(b: &mut GraphBuilder, x: NodeId, epsilon: f32) -> Result<NodeId> {
	let shape = b.shape(x).clone();
	b.scope("PixelNorm", |b| Ok(b.add(Op::PixelNorm { epsilon }, &[x], shape)))
}

/// Appends `num_new_features` channels of minibatch standard deviation statistics.
pub fn minibatch_stddev_layer(
	b: &mut GraphBuilder,
	x: NodeId,
	group_size: usize,
	num_new_features: usize,
) -> Result<NodeId> {
	let (c, h, w) = feature_map_dims(b, x, "minibatch_stddev_layer")?;
	if num_new_features == 0 || c % num_new_features != 0 {
		return Err(PuzzleGanError::Shape(format!(
			"{} channels cannot be split into {} feature groups",
			c, num_new_features
		)));
	}
	b.scope("MinibatchStddev", |b| {
		Ok(b.add(
			Op::MinibatchStddev {
				group_size,
				num_new_features,
			},
			&[x],
			smallvec![c + num_new_features, h, w],
		))
	})
}

/// Adds per-pixel Gaussian noise scaled by a per-channel weight that starts at zero.
pub fn apply_noise(b: &mut GraphBuilder, x: NodeId, mode: NoiseMode) -> Result<NodeId> {
	let (c, h, w) = feature_map_dims(b, x, "apply_noise")?;
	b.scope("Noise", |b| {
		let source = match mode {
			NoiseMode::Randomize => NoiseSource::Random,
			NoiseMode::Fixed => NoiseSource::Fixed(
				b.variable("noise", ParamSpec::constant(vec![1, 1, h, w], Init::Normal { std: 1.0 }))?,
			),
		};
		let weight = b.variable("weight", ParamSpec::trainable(vec![c], Init::Zeros))?;
		Ok(b.add(Op::Noise { weight, source }, &[x], smallvec![c, h, w]))
	})
}

/// Blend node `a + (b - a) * t` where `t = lod_in - lod` is read at execution time.
pub fn blend(b: &mut GraphBuilder, a: NodeId, other: NodeId, lod: f32, clip: bool) -> Result<NodeId> {
	let shape = b.shape(a).clone();
	if &shape != b.shape(other) {
		return Err(PuzzleGanError::Shape(format!(
			"cannot blend {:?} with {:?}",
			shape.as_slice(),
			b.shape(other).as_slice()
		)));
	}
	Ok(b.add(Op::Lerp { lod, clip }, &[a, other], shape))
}

/// Columns `start..start + len` of a flat activation.
pub fn slice(b: &mut GraphBuilder, x: NodeId, start: usize, len: usize) -> Result<NodeId> {
	match b.shape(x).as_slice() {
		&[width] if start + len <= width && len > 0 => Ok(b.add(Op::Slice { start, len }, &[x], smallvec![len])),
		other => Err(PuzzleGanError::Shape(format!(
			"cannot take columns {}..{} of per-sample shape {:?}",
			start,
			start + len,
			other
		))),
	}
}

pub fn reshape(b: &mut GraphBuilder, x: NodeId, shape: &[usize]) -> Result<NodeId> {
	let from: usize = b.shape(x).iter().product();
	let to: usize = shape.iter().product();
	if from != to {
		return Err(PuzzleGanError::Shape(format!(
			"cannot reshape {:?} into {:?}",
			b.shape(x).as_slice(),
			shape
		)));
	}
	Ok(b.add(Op::Reshape, &[x], Shape::from_slice(shape)))
}

/// Casts `x` to the builder's activation type.
pub fn cast(b: &mut GraphBuilder, x: NodeId) -> NodeId {
	let shape = b.shape(x).clone();
	let dtype: DType = b.dtype();
	b.add(Op::Cast { dtype }, &[x], shape)
}
