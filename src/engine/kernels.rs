//! Numeric kernels on NCHW `ndarray` tensors.
//!
//! Convolutions use TensorFlow SAME padding: for output size `o`, stride `s` and kernel `k` the
//! total padding is `max((o - 1) * s + k - i, 0)`, with the smaller half before the data.

use crate::error::{PuzzleGanError, Result};
use ndarray::{s, Array2, Array3, Array4, ArrayD, Axis, Ix2, Ix4, IxDyn, Zip};
use rayon::prelude::*;

pub fn to4(x: ArrayD<f32>) -> Result<Array4<f32>> {
	x.into_dimensionality::<Ix4>()
		.map_err(|e| PuzzleGanError::Shape(format!("expected a 4D tensor: {}", e)))
}

fn to2(x: ArrayD<f32>) -> Result<Array2<f32>> {
	x.into_dimensionality::<Ix2>()
		.map_err(|e| PuzzleGanError::Shape(format!("expected a 2D tensor: {}", e)))
}

fn same_padding(input: usize, output: usize, stride: usize, kernel: usize) -> usize {
	(((output.max(1) - 1) * stride + kernel).saturating_sub(input)) / 2
}

/// Flattens every non-batch axis and multiplies by `w` of shape `[in, out]`.
pub fn dense(x: &ArrayD<f32>, w: &ArrayD<f32>) -> Result<ArrayD<f32>> {
	let batch = x.shape()[0];
	let flat: usize = x.shape()[1..].iter().product();
	let x2 = to2(x.as_standard_layout().into_owned().into_shape(IxDyn(&[batch, flat]))?)?;
	let w2 = to2(w.clone())?;
	if w2.nrows() != flat {
		return Err(PuzzleGanError::Shape(format!(
			"dense weight expects {} inputs, got {}",
			w2.nrows(),
			flat
		)));
	}
	Ok(x2.dot(&w2).into_dyn())
}

/// SAME convolution with weight `[kh, kw, in, out]`.
pub fn conv2d(x: &ArrayD<f32>, w: &ArrayD<f32>, stride: usize) -> Result<ArrayD<f32>> {
	let x = to4(x.clone())?;
	let w = to4(w.clone())?;
	let (batch, channels, height, width) = x.dim();
	let (kh, kw, cin, cout) = w.dim();
	if cin != channels {
		return Err(PuzzleGanError::Shape(format!(
			"conv weight expects {} input channels, got {}",
			cin, channels
		)));
	}
	let out_h = (height + stride - 1) / stride;
	let out_w = (width + stride - 1) / stride;
	let pad_top = same_padding(height, out_h, stride, kh) as isize;
	let pad_left = same_padding(width, out_w, stride, kw) as isize;
	let taps = kh * kw;

	let wmat = Array2::from_shape_fn((cout, cin * taps), |(o, idx)| {
		let tap = idx % taps;
		w[[tap / kw, tap % kw, idx / taps, o]]
	});

	let per_sample: Vec<Array3<f32>> = (0..batch)
		.into_par_iter()
		.map(|n| {
			let cols = Array2::from_shape_fn((cin * taps, out_h * out_w), |(idx, p)| {
				let tap = idx % taps;
				let y = ((p / out_w) * stride + tap / kw) as isize - pad_top;
				let xx = ((p % out_w) * stride + tap % kw) as isize - pad_left;
				if y < 0 || xx < 0 || y >= height as isize || xx >= width as isize {
					0.0
				} else {
					x[[n, idx / taps, y as usize, xx as usize]]
				}
			});
			let out = wmat.dot(&cols);
			Array3::from_shape_vec((cout, out_h, out_w), out.into_raw_vec())
		})
		.collect::<std::result::Result<_, _>>()?;

	let mut output = Array4::zeros((batch, cout, out_h, out_w));
	for (n, sample) in per_sample.into_iter().enumerate() {
		output.index_axis_mut(Axis(0), n).assign(&sample);
	}
	Ok(output.into_dyn())
}

/// Transposed SAME convolution with weight `[kh, kw, in, out]`; output is `stride` times larger.
pub fn conv2d_transpose(x: &ArrayD<f32>, w: &ArrayD<f32>, stride: usize) -> Result<ArrayD<f32>> {
	let x = to4(x.clone())?;
	let w = to4(w.clone())?;
	let (batch, channels, height, width) = x.dim();
	let (kh, kw, cin, cout) = w.dim();
	if cin != channels {
		return Err(PuzzleGanError::Shape(format!(
			"transposed conv weight expects {} input channels, got {}",
			cin, channels
		)));
	}
	let out_h = height * stride;
	let out_w = width * stride;
	let pad_top = same_padding(out_h, height, stride, kh) as isize;
	let pad_left = same_padding(out_w, width, stride, kw) as isize;

	let per_sample: Vec<Array3<f32>> = (0..batch)
		.into_par_iter()
		.map(|n| {
			let mut out = Array3::<f32>::zeros((cout, out_h, out_w));
			for ci in 0..cin {
				for i in 0..height {
					for j in 0..width {
						let v = x[[n, ci, i, j]];
						if v == 0.0 {
							continue;
						}
						for a in 0..kh {
							let y = (i * stride + a) as isize - pad_top;
							if y < 0 || y >= out_h as isize {
								continue;
							}
							for b in 0..kw {
								let xx = (j * stride + b) as isize - pad_left;
								if xx < 0 || xx >= out_w as isize {
									continue;
								}
								for o in 0..cout {
									out[[o, y as usize, xx as usize]] += w[[a, b, ci, o]] * v;
								}
							}
						}
					}
				}
			}
			out
		})
		.collect();

	let mut output = Array4::zeros((batch, cout, out_h, out_w));
	for (n, sample) in per_sample.into_iter().enumerate() {
		output.index_axis_mut(Axis(0), n).assign(&sample);
	}
	Ok(output.into_dyn())
}

/// Sum of the four one-pixel shifts of a kernel zero padded by one, `[k, k, i, o]` to `[k+1, k+1, i, o]`.
fn four_tap_sum(w: &Array4<f32>, flip: bool, gain: f32) -> Array4<f32> {
	let (kh, kw, cin, cout) = w.dim();
	let mut padded = Array4::<f32>::zeros((kh + 2, kw + 2, cin, cout));
	for a in 0..kh {
		for b in 0..kw {
			let (sa, sb) = if flip { (kh - 1 - a, kw - 1 - b) } else { (a, b) };
			padded
				.slice_mut(s![a + 1, b + 1, .., ..])
				.assign(&w.slice(s![sa, sb, .., ..]));
		}
	}
	let mut fused = Array4::<f32>::zeros((kh + 1, kw + 1, cin, cout));
	for (da, db) in [(1usize, 1usize), (0, 1), (1, 0), (0, 0)].iter() {
		let shifted = padded.slice(s![*da..*da + kh + 1, *db..*db + kw + 1, .., ..]);
		fused += &shifted;
	}
	fused.mapv_inplace(|v| v * gain);
	fused
}

pub fn fuse_up_kernel(w: &ArrayD<f32>) -> Result<ArrayD<f32>> {
	Ok(four_tap_sum(&to4(w.clone())?, true, 1.0).into_dyn())
}

pub fn fuse_down_kernel(w: &ArrayD<f32>) -> Result<ArrayD<f32>> {
	Ok(four_tap_sum(&to4(w.clone())?, false, 0.25).into_dyn())
}

/// Adds a per-channel bias to `(N, C)` or `(N, C, H, W)` activations.
pub fn bias(x: &ArrayD<f32>, b: &ArrayD<f32>) -> Result<ArrayD<f32>> {
	let channels = x.shape()[1];
	if b.len() != channels {
		return Err(PuzzleGanError::Shape(format!(
			"bias has {} values for {} channels",
			b.len(),
			channels
		)));
	}
	let mut bshape = vec![1; x.ndim()];
	bshape[1] = channels;
	let b = b.clone().into_shape(IxDyn(&bshape))?;
	Ok(x + &b)
}

pub fn leaky_relu(x: &ArrayD<f32>, alpha: f32) -> ArrayD<f32> {
	x.mapv(|v| (v * alpha).max(v))
}

pub fn relu(x: &ArrayD<f32>) -> ArrayD<f32> {
	x.mapv(|v| v.max(0.0))
}

/// Nearest neighbour replication.
pub fn upscale2d(x: &ArrayD<f32>, factor: usize) -> Result<ArrayD<f32>> {
	if factor == 1 {
		return Ok(x.clone());
	}
	let x = to4(x.clone())?;
	let (batch, channels, height, width) = x.dim();
	let out = Array4::from_shape_fn((batch, channels, height * factor, width * factor), |(n, c, y, xx)| {
		x[[n, c, y / factor, xx / factor]]
	});
	Ok(out.into_dyn())
}

/// Box filter (average pooling over non-overlapping `factor x factor` windows).
pub fn downscale2d(x: &ArrayD<f32>, factor: usize) -> Result<ArrayD<f32>> {
	if factor == 1 {
		return Ok(x.clone());
	}
	let x = to4(x.clone())?;
	let (batch, channels, height, width) = x.dim();
	let (out_h, out_w) = (height / factor, width / factor);
	let norm = 1.0 / (factor * factor) as f32;
	let out = Array4::from_shape_fn((batch, channels, out_h, out_w), |(n, c, i, j)| {
		let window = x.slice(s![n, c, i * factor..(i + 1) * factor, j * factor..(j + 1) * factor]);
		window.sum() * norm
	});
	Ok(out.into_dyn())
}

/// `x / sqrt(mean(x^2 over channels) + epsilon)`.
pub fn pixel_norm(x: &ArrayD<f32>, epsilon: f32) -> ArrayD<f32> {
	let channels = x.shape()[1] as f32;
	let mean_sq = x.mapv(|v| v * v).sum_axis(Axis(1)).mapv(|s| s / channels);
	let scale = mean_sq.mapv(|m| 1.0 / (m + epsilon).sqrt()).insert_axis(Axis(1));
	x * &scale
}

/// Appends `num_new_features` channels holding the average per-group standard deviation.
///
/// Sample `n` belongs to group `n % (batch / group_size)`, matching a `[G, M, ...]` split of the
/// minibatch axis.
pub fn minibatch_stddev(x: &ArrayD<f32>, group_size: usize, num_new_features: usize, epsilon: f32) -> Result<ArrayD<f32>> {
	let x = to4(x.clone())?;
	let (batch, channels, height, width) = x.dim();
	let group = group_size.min(batch).max(1);
	if batch % group != 0 {
		return Err(PuzzleGanError::Shape(format!(
			"minibatch size {} is not divisible by group size {}",
			batch, group
		)));
	}
	if num_new_features == 0 || channels % num_new_features != 0 {
		return Err(PuzzleGanError::Shape(format!(
			"{} channels cannot be split into {} feature groups",
			channels, num_new_features
		)));
	}
	let groups = batch / group;
	let per_feature = channels / num_new_features;

	let mut stats = Array2::<f32>::zeros((groups, num_new_features));
	for m in 0..groups {
		let members: Vec<usize> = (0..group).map(|g| g * groups + m).collect();
		for f in 0..num_new_features {
			let mut total = 0.0f32;
			for c in f * per_feature..(f + 1) * per_feature {
				for y in 0..height {
					for xx in 0..width {
						let mean = members.iter().map(|&n| x[[n, c, y, xx]]).sum::<f32>() / group as f32;
						let var = members
							.iter()
							.map(|&n| {
								let d = x[[n, c, y, xx]] - mean;
								d * d
							})
							.sum::<f32>() / group as f32;
						total += (var + epsilon).sqrt();
					}
				}
			}
			stats[[m, f]] = total / (per_feature * height * width) as f32;
		}
	}

	let mut out = Array4::<f32>::zeros((batch, channels + num_new_features, height, width));
	out.slice_mut(s![.., ..channels, .., ..]).assign(&x);
	for n in 0..batch {
		for f in 0..num_new_features {
			out.slice_mut(s![n, channels + f, .., ..]).fill(stats[[n % groups, f]]);
		}
	}
	Ok(out.into_dyn())
}

/// `x + noise * weight[c]` where `noise` is `(N or 1, 1, H, W)`.
pub fn add_noise(x: &ArrayD<f32>, noise: &ArrayD<f32>, weight: &ArrayD<f32>) -> Result<ArrayD<f32>> {
	let x = to4(x.clone())?;
	let noise = to4(noise.clone())?;
	let channels = x.dim().1;
	let weight = weight.clone().into_shape(IxDyn(&[1, channels, 1, 1]))?;
	let scaled = &noise * &weight.into_dimensionality::<Ix4>()?;
	Ok((&x + &scaled).into_dyn())
}

/// Columns `start..start + len` of a `(N, F)` tensor.
pub fn slice_columns(x: &ArrayD<f32>, start: usize, len: usize) -> Result<ArrayD<f32>> {
	let x = to2(x.clone())?;
	if start + len > x.ncols() {
		return Err(PuzzleGanError::Shape(format!(
			"slice {}..{} exceeds {} columns",
			start,
			start + len,
			x.ncols()
		)));
	}
	Ok(x.slice(s![.., start..start + len]).to_owned().into_dyn())
}

pub fn reshape(x: &ArrayD<f32>, sample_shape: &[usize]) -> Result<ArrayD<f32>> {
	let mut shape = Vec::with_capacity(sample_shape.len() + 1);
	shape.push(x.shape()[0]);
	shape.extend_from_slice(sample_shape);
	Ok(x.as_standard_layout().into_owned().into_shape(IxDyn(&shape))?)
}

/// Writes every tile into its rectangle of a zeroed `(N, C, height, width)` map.
pub fn assemble(tiles: &[&ArrayD<f32>], rects: &[crate::graph::TileRect], height: usize, width: usize) -> Result<ArrayD<f32>> {
	let first = tiles
		.first()
		.ok_or_else(|| PuzzleGanError::Shape("assembly needs at least one tile".to_string()))?;
	let (batch, channels) = (first.shape()[0], first.shape()[1]);
	let mut out = Array4::<f32>::zeros((batch, channels, height, width));
	for (tile, rect) in tiles.iter().zip(rects) {
		let tile = to4((*tile).clone())?;
		out.slice_mut(s![.., .., rect.row..rect.row + rect.height, rect.col..rect.col + rect.width])
			.assign(&tile);
	}
	Ok(out.into_dyn())
}

pub fn lerp(a: &ArrayD<f32>, b: &ArrayD<f32>, t: f32) -> Result<ArrayD<f32>> {
	if a.shape() != b.shape() {
		return Err(PuzzleGanError::Shape(format!(
			"cannot blend {:?} with {:?}",
			a.shape(),
			b.shape()
		)));
	}
	let mut out = a.clone();
	Zip::from(&mut out).and(b).for_each(|o, &bv| *o += (bv - *o) * t);
	Ok(out)
}
