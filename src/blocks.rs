//! Per-resolution blocks and the image projections of both networks.

use crate::config::NetworkConfig;
use crate::constants::layers::{CONV_KERNEL, DEFAULT_GAIN, MBSTD_NEW_FEATURES};
use crate::error::Result;
use crate::graph::{GraphBuilder, NodeId};
use crate::layers::{self, Activation};
use crate::puzzle::{self, PuzzleLayout};

/// Scope of the block at stage `res`, e.g. `16x16`.
pub fn stage_scope(res: usize) -> String {
	format!("{0}x{0}", 1usize << res)
}

/// Everything a generator block needs besides its input.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorParts<'a> {
	pub config: &'a NetworkConfig,
	pub layout: &'a PuzzleLayout,
	pub act: Activation,
}

impl<'a> GeneratorParts<'a> {
	pub fn new(config: &'a NetworkConfig, layout: &'a PuzzleLayout) -> Self {
		let act = if config.use_leakyrelu {
			Activation::LeakyRelu
		} else {
			Activation::Relu
		};
		GeneratorParts { config, layout, act }
	}

	/// `PN(act(bias(x)))`.
	fn finish_conv(&self, b: &mut GraphBuilder, x: NodeId) -> Result<NodeId> {
		let x = layers::apply_bias(b, x)?;
		let x = self.act.apply(b, x);
		if self.config.use_pixelnorm {
			layers::pixel_norm(b, x, self.config.pixelnorm_epsilon)
		} else {
			Ok(x)
		}
	}

	pub fn block(&self, b: &mut GraphBuilder, x: NodeId, res: usize) -> Result<NodeId> {
		let config = self.config;
		let fmaps = config.nf(res - 1);
		b.scope(&stage_scope(res), |b| {
			if res == config.firstblock_log2() {
				let mut x = x;
				if config.normalize_latents {
					x = layers::pixel_norm(b, x, config.pixelnorm_epsilon)?;
				}
				let x = puzzle::first_layer(b, x, self.layout, config, res, self.act)?;
				b.scope("Conv", |b| {
					let x = layers::conv2d(b, x, fmaps, CONV_KERNEL, DEFAULT_GAIN, config.use_wscale)?;
					self.finish_conv(b, x)
				})
			} else {
				let x = if config.fused_scale {
					b.scope("Conv0_up", |b| {
						let x = layers::upscale2d_conv2d(b, x, fmaps, CONV_KERNEL, DEFAULT_GAIN, config.use_wscale)?;
						self.finish_conv(b, x)
					})?
				} else {
					let x = layers::upscale2d(b, x, 2)?;
					b.scope("Conv0", |b| {
						let x = layers::conv2d(b, x, fmaps, CONV_KERNEL, DEFAULT_GAIN, config.use_wscale)?;
						self.finish_conv(b, x)
					})?
				};
				b.scope("Conv1", |b| {
					let x = layers::conv2d(b, x, fmaps, CONV_KERNEL, DEFAULT_GAIN, config.use_wscale)?;
					self.finish_conv(b, x)
				})
			}
		})
	}

	/// 1x1 projection to `num_channels` with unit gain, plus bias.
	pub fn to_image(&self, b: &mut GraphBuilder, x: NodeId, res: usize) -> Result<NodeId> {
		let config = self.config;
		let lod = config.resolution_log2() - res;
		b.scope(&format!("ToRGB_lod{}", lod), |b| {
			let x = layers::conv2d(b, x, config.num_channels, 1, 1.0, config.use_wscale)?;
			layers::apply_bias(b, x)
		})
	}
}

fn dense_act(b: &mut GraphBuilder, x: NodeId, fmaps: usize, use_wscale: bool) -> Result<NodeId> {
	let x = layers::dense(b, x, fmaps, DEFAULT_GAIN, use_wscale)?;
	let x = layers::apply_bias(b, x)?;
	Ok(Activation::LeakyRelu.apply(b, x))
}

fn conv_act(b: &mut GraphBuilder, x: NodeId, fmaps: usize, use_wscale: bool) -> Result<NodeId> {
	let x = layers::conv2d(b, x, fmaps, CONV_KERNEL, DEFAULT_GAIN, use_wscale)?;
	let x = layers::apply_bias(b, x)?;
	Ok(Activation::LeakyRelu.apply(b, x))
}

/// Discriminator block at stage `res`. Above the first stage it halves the resolution; at the
/// first stage it reduces the feature map to one score per sample.
pub fn discriminator_block(b: &mut GraphBuilder, x: NodeId, res: usize, config: &NetworkConfig) -> Result<NodeId> {
	let wscale = config.use_wscale;
	b.scope(&stage_scope(res), |b| {
		if res > config.firstblock_log2() {
			let x = b.scope("Conv0", |b| conv_act(b, x, config.nf(res - 1), wscale))?;
			if config.fused_scale {
				b.scope("Conv1_down", |b| {
					let x = layers::conv2d_downscale2d(b, x, config.nf(res - 2), CONV_KERNEL, DEFAULT_GAIN, wscale)?;
					let x = layers::apply_bias(b, x)?;
					Ok(Activation::LeakyRelu.apply(b, x))
				})
			} else {
				let x = b.scope("Conv1", |b| conv_act(b, x, config.nf(res - 2), wscale))?;
				layers::downscale2d(b, x, 2)
			}
		} else {
			let mut x = x;
			if config.mbstd_group_size > 1 {
				x = layers::minibatch_stddev_layer(b, x, config.mbstd_group_size, MBSTD_NEW_FEATURES)?;
			}
			let x = b.scope("Conv", |b| conv_act(b, x, config.nf(res - 1), wscale))?;
			let x = b.scope("Dense0", |b| dense_act(b, x, config.nf(res - 2), wscale))?;
			b.scope("Dense1", |b| {
				let x = layers::dense(b, x, 1, 1.0, wscale)?;
				layers::apply_bias(b, x)
			})
		}
	})
}

/// 1x1 projection from image channels to `nf(res-1)` feature maps, plus bias and activation.
pub fn from_image(b: &mut GraphBuilder, x: NodeId, res: usize, config: &NetworkConfig) -> Result<NodeId> {
	let lod = config.resolution_log2() - res;
	b.scope(&format!("FromRGB_lod{}", lod), |b| {
		let x = layers::conv2d(b, x, config.nf(res - 1), 1, DEFAULT_GAIN, config.use_wscale)?;
		let x = layers::apply_bias(b, x)?;
		Ok(Activation::LeakyRelu.apply(b, x))
	})
}
