//! Graph node types.
//!
//! Every value flowing through a graph is batched: axis 0 is the minibatch and is only known at
//! execution time, so node shapes record the per-sample dimensions only.

use crate::config::DType;
use crate::params::ParamKey;
use smallvec::SmallVec;
use std::fmt;

/// Per-sample shape, e.g. `[C, H, W]` for a feature map or `[F]` for a flat activation.
pub type Shape = SmallVec<[usize; 4]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
	pub fn index(self) -> usize {
		self.0
	}
}

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "%{}", self.0)
	}
}

/// How a stored kernel is rearranged before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelTransform {
	Plain,
	/// Spatial flip, zero pad by one and sum of the four shifted copies. Consumed by a stride 2
	/// transposed convolution it reproduces nearest upscale followed by a SAME convolution.
	FusedUp,
	/// Zero pad by one, sum of the four shifted copies, scaled by 0.25. Consumed by a stride 2
	/// convolution it reproduces a SAME convolution followed by 2x2 average pooling.
	FusedDown,
}

/// A weight variable together with its runtime scale (the equalized learning rate constant).
#[derive(Debug, Clone, PartialEq)]
pub struct WeightRef {
	pub key: ParamKey,
	pub scale: f32,
	pub transform: KernelTransform,
}

/// Rectangle on a feature map grid, in rows and columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRect {
	pub row: usize,
	pub col: usize,
	pub height: usize,
	pub width: usize,
}

impl TileRect {
	pub const fn new(row: usize, col: usize, height: usize, width: usize) -> Self {
		TileRect { row, col, height, width }
	}

	pub fn area(&self) -> usize {
		self.height * self.width
	}

	pub fn contains(&self, row: usize, col: usize) -> bool {
		row >= self.row && row < self.row + self.height && col >= self.col && col < self.col + self.width
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum NoiseSource {
	/// Fresh N(0,1) noise per call, drawn from the executor's generator.
	Random,
	/// A stored constant noise buffer of shape `[1, 1, H, W]`.
	Fixed(ParamKey),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
	Input { name: String },
	Cast { dtype: DType },
	Dense { weight: WeightRef },
	/// SAME padded convolution.
	Conv2d { weight: WeightRef, stride: usize },
	/// SAME padded transposed convolution, output size is input size times stride.
	ConvTranspose2d { weight: WeightRef, stride: usize },
	Bias { key: ParamKey },
	LeakyRelu { alpha: f32 },
	Relu,
	Upscale2d { factor: usize },
	Downscale2d { factor: usize },
	PixelNorm { epsilon: f32 },
	MinibatchStddev { group_size: usize, num_new_features: usize },
	Noise { weight: ParamKey, source: NoiseSource },
	/// Columns `start..start + len` of a flat activation.
	Slice { start: usize, len: usize },
	/// Reinterprets the input as the node's shape.
	Reshape,
	/// Writes each input into its rectangle of a zeroed feature map.
	Assemble { tiles: Vec<TileRect> },
	/// `a + (b - a) * t` with `t = lod_in - lod`, clamped to [0, 1] when `clip` is set.
	Lerp { lod: f32, clip: bool },
}

impl Op {
	pub fn kind(&self) -> &'static str {
		match self {
			Op::Input { .. } => "Input",
			Op::Cast { .. } => "Cast",
			Op::Dense { .. } => "Dense",
			Op::Conv2d { .. } => "Conv2D",
			Op::ConvTranspose2d { .. } => "Conv2DTranspose",
			Op::Bias { .. } => "Bias",
			Op::LeakyRelu { .. } => "LeakyRelu",
			Op::Relu => "Relu",
			Op::Upscale2d { .. } => "Upscale2D",
			Op::Downscale2d { .. } => "Downscale2D",
			Op::PixelNorm { .. } => "PixelNorm",
			Op::MinibatchStddev { .. } => "MinibatchStddev",
			Op::Noise { .. } => "Noise",
			Op::Slice { .. } => "Slice",
			Op::Reshape => "Reshape",
			Op::Assemble { .. } => "Assemble",
			Op::Lerp { .. } => "Lerp",
		}
	}

	/// Variables read by this op.
	pub fn param_keys(&self) -> Vec<&ParamKey> {
		match self {
			Op::Dense { weight } | Op::Conv2d { weight, .. } | Op::ConvTranspose2d { weight, .. } => {
				vec![&weight.key]
			}
			Op::Bias { key } => vec![key],
			Op::Noise { weight, source } => match source {
				NoiseSource::Random => vec![weight],
				NoiseSource::Fixed(noise) => vec![weight, noise],
			},
			_ => Vec::new(),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
	pub op: Op,
	pub inputs: SmallVec<[NodeId; 2]>,
	pub shape: Shape,
	/// Rendered scope the node was created in.
	pub scope: String,
}
