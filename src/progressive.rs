//! Progressive growing: wiring the resolution stages of both networks and cross-fading between
//! neighbouring stages according to the level of detail (LOD).
//!
//! `lod = 0` shows the full output resolution, every whole step above it halves the effective
//! resolution. The linear topology builds every stage and blends at each of them. The recursive
//! topology plans the path once from a LOD snapshot and builds only the stages on that path.
//! Blend weights are read at execution time, so a recursive graph serves every LOD value that
//! produces the same [`GrowthPlan`].

use crate::blocks::{self, GeneratorParts};
use crate::config::NetworkConfig;
use crate::error::Result;
use crate::graph::{GraphBuilder, NodeId};
use crate::layers;

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
	a + (b - a) * t
}

pub fn lerp_clip(a: f32, b: f32, t: f32) -> f32 {
	a + (b - a) * t.max(0.0).min(1.0)
}

/// Resolution stages `firstblock_log2..=resolution_log2`, coarse to fine.
pub fn stages(config: &NetworkConfig) -> Vec<usize> {
	(config.firstblock_log2()..=config.resolution_log2()).collect()
}

/// What the recursive topology does at one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrowthStep {
	/// Continue with the next finer stage.
	Descend,
	/// Stop here and cross-fade with the coarser neighbour.
	Blend,
	/// Stop here without blending.
	Emit,
}

/// Path through the stages selected by one LOD snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GrowthPlan {
	first: usize,
	resolution_log2: usize,
	steps: Vec<GrowthStep>,
}

impl GrowthPlan {
	pub fn new(config: &NetworkConfig, lod_in: f32) -> Self {
		let first = config.firstblock_log2();
		let resolution_log2 = config.resolution_log2();
		let mut steps = Vec::new();
		for res in first..=resolution_log2 {
			let lod = (resolution_log2 - res) as f32;
			let step = if res < resolution_log2 && lod_in < lod {
				GrowthStep::Descend
			} else if res > first && lod_in > lod {
				GrowthStep::Blend
			} else {
				GrowthStep::Emit
			};
			steps.push(step);
			if step != GrowthStep::Descend {
				break;
			}
		}
		GrowthPlan {
			first,
			resolution_log2,
			steps,
		}
	}

	pub fn steps(&self) -> &[GrowthStep] {
		&self.steps
	}

	/// Step taken at stage `res`, `None` for stages off the path.
	pub fn step(&self, res: usize) -> Option<GrowthStep> {
		res.checked_sub(self.first).and_then(|i| self.steps.get(i)).copied()
	}

	/// Finest stage that is built.
	pub fn terminal(&self) -> usize {
		self.first + self.steps.len() - 1
	}

	pub fn blends(&self) -> bool {
		self.steps.last() == Some(&GrowthStep::Blend)
	}

	/// LOD of the terminal stage.
	pub fn terminal_lod(&self) -> usize {
		self.resolution_log2 - self.terminal()
	}
}

fn lod_of(config: &NetworkConfig, res: usize) -> usize {
	config.resolution_log2() - res
}

fn grow_scope(lod: usize) -> String {
	format!("Grow_lod{}", lod)
}

/// Generator with every stage built, blended with `lerp_clip` at each stage above the first.
pub fn generator_linear(b: &mut GraphBuilder, parts: &GeneratorParts, latents: NodeId) -> Result<NodeId> {
	let config = parts.config;
	let first = config.firstblock_log2();
	let mut x = parts.block(b, latents, first)?;
	let mut images = parts.to_image(b, x, first)?;
	for res in first + 1..=config.resolution_log2() {
		let lod = lod_of(config, res);
		x = parts.block(b, x, res)?;
		let img = parts.to_image(b, x, res)?;
		let coarse = layers::upscale2d(b, images, 2)?;
		images = b.scope(&grow_scope(lod), |b| layers::blend(b, img, coarse, lod as f32, true))?;
	}
	Ok(images)
}

/// Generator restricted to the stages on `plan`'s path.
pub fn generator_recursive(
	b: &mut GraphBuilder,
	parts: &GeneratorParts,
	plan: &GrowthPlan,
	latents: NodeId,
) -> Result<NodeId> {
	let config = parts.config;
	let mut x = latents;
	let mut res = config.firstblock_log2();
	loop {
		let y = parts.block(b, x, res)?;
		let lod = lod_of(config, res);
		match plan.step(res) {
			Some(GrowthStep::Descend) => {
				x = y;
				res += 1;
			}
			Some(GrowthStep::Blend) => {
				let img = parts.to_image(b, y, res)?;
				let coarse = parts.to_image(b, x, res - 1)?;
				let coarse = layers::upscale2d(b, coarse, 2)?;
				let img = b.scope(&grow_scope(lod), |b| layers::blend(b, img, coarse, lod as f32, false))?;
				return layers::upscale2d(b, img, 1 << lod);
			}
			Some(GrowthStep::Emit) | None => {
				let img = parts.to_image(b, y, res)?;
				return layers::upscale2d(b, img, 1 << lod);
			}
		}
	}
}

/// Discriminator with every stage built. Each stage above the first is blended with the
/// projection of the downscaled image.
pub fn discriminator_linear(b: &mut GraphBuilder, config: &NetworkConfig, images: NodeId) -> Result<NodeId> {
	let first = config.firstblock_log2();
	let mut img = images;
	let mut x = blocks::from_image(b, img, config.resolution_log2(), config)?;
	for res in (first + 1..=config.resolution_log2()).rev() {
		let lod = lod_of(config, res);
		x = blocks::discriminator_block(b, x, res, config)?;
		img = layers::downscale2d(b, img, 2)?;
		let y = blocks::from_image(b, img, res - 1, config)?;
		x = b.scope(&grow_scope(lod), |b| layers::blend(b, x, y, lod as f32, true))?;
	}
	blocks::discriminator_block(b, x, first, config)
}

/// Discriminator restricted to the stages on `plan`'s path.
pub fn discriminator_recursive(
	b: &mut GraphBuilder,
	config: &NetworkConfig,
	plan: &GrowthPlan,
	images: NodeId,
) -> Result<NodeId> {
	let terminal = plan.terminal();
	let lod = lod_of(config, terminal);
	let img = layers::downscale2d(b, images, 1 << lod)?;
	let x = blocks::from_image(b, img, terminal, config)?;
	let mut x = blocks::discriminator_block(b, x, terminal, config)?;
	if plan.blends() {
		let coarse = layers::downscale2d(b, images, 1 << (lod + 1))?;
		let y = blocks::from_image(b, coarse, terminal - 1, config)?;
		x = b.scope(&grow_scope(lod), |b| layers::blend(b, x, y, lod as f32, false))?;
	}
	for res in (config.firstblock_log2()..terminal).rev() {
		x = blocks::discriminator_block(b, x, res, config)?;
	}
	Ok(x)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn config() -> NetworkConfig {
		NetworkConfig::builder().resolution(32).firstblock_res(8).build()
	}

	#[test]
	fn scalar_lerps() {
		assert_eq!(lerp(2.0, 6.0, 0.0), 2.0);
		assert_eq!(lerp(2.0, 6.0, 1.0), 6.0);
		assert_eq!(lerp(2.0, 6.0, 1.5), 8.0);
		assert_eq!(lerp_clip(2.0, 6.0, 1.5), 6.0);
		assert_eq!(lerp_clip(2.0, 6.0, -3.0), 2.0);
	}

	#[test]
	fn three_stages_for_32_from_8() {
		assert_eq!(stages(&config()), vec![3, 4, 5]);
	}

	#[test]
	fn full_resolution_descends_to_the_end() {
		let plan = GrowthPlan::new(&config(), 0.0);
		assert_eq!(
			plan.steps(),
			&[GrowthStep::Descend, GrowthStep::Descend, GrowthStep::Emit]
		);
		assert_eq!(plan.terminal(), 5);
		assert!(!plan.blends());
	}

	#[test]
	fn fractional_lod_blends_at_the_terminal_stage() {
		let plan = GrowthPlan::new(&config(), 0.5);
		assert_eq!(plan.steps(), &[GrowthStep::Descend, GrowthStep::Descend, GrowthStep::Blend]);
		let plan = GrowthPlan::new(&config(), 1.25);
		assert_eq!(plan.steps(), &[GrowthStep::Descend, GrowthStep::Blend]);
		assert_eq!(plan.terminal_lod(), 1);
	}

	#[test]
	fn whole_lod_stops_without_blending() {
		let plan = GrowthPlan::new(&config(), 1.0);
		assert_eq!(plan.steps(), &[GrowthStep::Descend, GrowthStep::Emit]);
		assert_eq!(plan.step(5), None);
	}

	#[test]
	fn out_of_range_lod_saturates() {
		assert_eq!(GrowthPlan::new(&config(), 7.0).steps(), &[GrowthStep::Emit]);
		assert_eq!(GrowthPlan::new(&config(), -2.0).terminal(), 5);
	}
}
