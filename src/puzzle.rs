//! Puzzle assembly of the generator's seed feature map.
//!
//! A puzzle mode names a jigsaw layout: the latent vector is cut into contiguous chunks, every
//! tile projects one chunk through its own dense layer, and the tiles are placed side by side so
//! that together they cover the seed map exactly once.

use crate::config::NetworkConfig;
use crate::constants::layers::PUZZLE_GAIN;
use crate::error::{ConfigError, Result};
use crate::graph::{GraphBuilder, NodeId, Op, TileRect};
use crate::layers::{self, Activation};
use indexmap::IndexMap;
use lazy_static::lazy_static;
use smallvec::smallvec;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct PuzzleTile {
	/// Variable scope of the tile's dense projection.
	pub scope: &'static str,
	/// Index of the latent chunk feeding the tile.
	pub chunk: usize,
	pub rect: TileRect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PuzzleLayout {
	pub mode: &'static str,
	/// Side of the square seed map.
	pub seed_size: usize,
	pub chunks: usize,
	pub tiles: Vec<PuzzleTile>,
}

impl PuzzleLayout {
	/// True when every cell of the seed map lies in exactly one tile.
	pub fn covers_exactly(&self) -> bool {
		let n = self.seed_size;
		let mut hits = vec![0u8; n * n];
		for tile in &self.tiles {
			let r = tile.rect;
			if r.row + r.height > n || r.col + r.width > n {
				return false;
			}
			for row in r.row..r.row + r.height {
				for col in r.col..r.col + r.width {
					hits[row * n + col] += 1;
				}
			}
		}
		hits.iter().all(|&h| h == 1)
	}

	/// Tile covering a given cell.
	pub fn tile_at(&self, row: usize, col: usize) -> Option<&PuzzleTile> {
		self.tiles.iter().find(|tile| tile.rect.contains(row, col))
	}
}

const fn tile(scope: &'static str, chunk: usize, row: usize, col: usize, height: usize, width: usize) -> PuzzleTile {
	PuzzleTile {
		scope,
		chunk,
		rect: TileRect::new(row, col, height, width),
	}
}

lazy_static! {
	static ref LAYOUTS: IndexMap<&'static str, PuzzleLayout> = {
		let layouts = vec![
			PuzzleLayout {
				mode: "2parts-faces",
				seed_size: 8,
				chunks: 2,
				tiles: vec![
					tile("Dense11", 0, 0, 0, 2, 8),
					tile("Dense12", 0, 2, 0, 4, 2),
					tile("Dense13", 0, 6, 0, 2, 8),
					tile("Dense14", 0, 2, 6, 4, 2),
					tile("Dense2", 1, 2, 2, 4, 4),
				],
			},
			PuzzleLayout {
				mode: "5parts-faces",
				seed_size: 8,
				chunks: 5,
				tiles: vec![
					tile("Dense11", 0, 0, 0, 8, 2),
					tile("Dense12", 0, 0, 2, 1, 4),
					tile("Dense13", 0, 0, 6, 8, 2),
					tile("Dense2", 1, 1, 2, 2, 4),
					tile("Dense3", 2, 3, 2, 2, 4),
					tile("Dense4", 3, 5, 3, 2, 2),
					tile("Dense51", 4, 5, 2, 3, 1),
					tile("Dense52", 4, 7, 3, 1, 2),
					tile("Dense53", 4, 5, 5, 3, 1),
				],
			},
			PuzzleLayout {
				mode: "2parts-bedrooms",
				seed_size: 8,
				chunks: 2,
				tiles: vec![tile("Dense1", 0, 0, 0, 4, 8), tile("Dense2", 1, 4, 0, 4, 8)],
			},
			PuzzleLayout {
				mode: "4parts-digits",
				seed_size: 16,
				chunks: 4,
				tiles: vec![
					tile("Dense1", 0, 0, 0, 8, 8),
					tile("Dense2", 1, 0, 8, 8, 8),
					tile("Dense3", 2, 8, 0, 8, 8),
					tile("Dense4", 3, 8, 8, 8, 8),
				],
			},
		];
		layouts.into_iter().map(|layout| (layout.mode, layout)).collect()
	};
}

/// Names of every registered puzzle mode.
pub fn modes() -> Vec<&'static str> {
	LAYOUTS.keys().copied().collect()
}

pub fn layout(mode: &str) -> Result<&'static PuzzleLayout> {
	LAYOUTS
		.get(mode)
		.ok_or_else(|| ConfigError::UnknownPuzzleMode(mode.to_string()).into())
}

/// Looks up the configured mode and checks the latent partition against it.
pub fn resolve(config: &NetworkConfig) -> Result<&'static PuzzleLayout> {
	let mode = config
		.mode
		.as_deref()
		.ok_or_else(|| ConfigError::UnknownPuzzleMode("<unset>".to_string()))?;
	let layout = layout(mode)?;

	let sizes = &config.latent_sizes;
	if sizes.len() != layout.chunks {
		return Err(ConfigError::LatentPartition(format!(
			"mode {} needs {} latent chunks, got {}",
			mode,
			layout.chunks,
			sizes.len()
		))
		.into());
	}
	if sizes.iter().any(|&size| size == 0) {
		return Err(ConfigError::LatentPartition(format!("latent chunk sizes {:?} contain a zero", sizes)).into());
	}
	let total: usize = sizes.iter().sum();
	if total != config.latent_size() {
		return Err(ConfigError::LatentPartition(format!(
			"latent chunk sizes {:?} sum to {}, latent size is {}",
			sizes,
			total,
			config.latent_size()
		))
		.into());
	}
	if layout.seed_size != config.firstblock_res {
		return Err(ConfigError::InvalidParameter(format!(
			"mode {} assembles a {}x{} seed map but firstblock_res is {}",
			mode, layout.seed_size, layout.seed_size, config.firstblock_res
		))
		.into());
	}
	Ok(layout)
}

/// Builds the seed feature map `(batch, nf(res-1), seed, seed)` from the latent vector `x`.
pub fn first_layer(
	b: &mut GraphBuilder,
	x: NodeId,
	layout: &PuzzleLayout,
	config: &NetworkConfig,
	res: usize,
	act: Activation,
) -> Result<NodeId> {
	let fmaps = config.nf(res - 1);

	let mut chunks = Vec::with_capacity(config.latent_sizes.len());
	let mut start = 0;
	for &size in &config.latent_sizes {
		chunks.push(layers::slice(b, x, start, size)?);
		start += size;
	}

	let mut tiles = Vec::with_capacity(layout.tiles.len());
	for tile in &layout.tiles {
		let rect = tile.rect;
		let z = *chunks.get(tile.chunk).ok_or_else(|| {
			ConfigError::LatentPartition(format!(
				"mode {} reads latent chunk {}, only {} configured",
				layout.mode,
				tile.chunk,
				chunks.len()
			))
		})?;
		let node = b.scope(tile.scope, |b| {
			let y = layers::dense(b, z, fmaps * rect.area(), PUZZLE_GAIN, config.use_wscale)?;
			layers::reshape(b, y, &[fmaps, rect.height, rect.width])
		})?;
		tiles.push(node);
	}

	let seed = layout.seed_size;
	let rects = layout.tiles.iter().map(|tile| tile.rect).collect();
	let assembled = b.add(Op::Assemble { tiles: rects }, &tiles, smallvec![fmaps, seed, seed]);
	debug!(mode = layout.mode, tiles = tiles.len(), fmaps, seed, "assembled puzzle seed map");

	let x = layers::apply_bias(b, assembled)?;
	let x = act.apply(b, x);
	if config.use_pixelnorm {
		layers::pixel_norm(b, x, config.pixelnorm_epsilon)
	} else {
		Ok(x)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn every_layout_tiles_its_seed_map() {
		for mode in modes() {
			let layout = layout(mode).unwrap();
			assert!(layout.covers_exactly(), "{} does not tile its seed map", mode);
			let max_chunk = layout.tiles.iter().map(|t| t.chunk).max().unwrap();
			assert_eq!(max_chunk + 1, layout.chunks, "{} chunk count", mode);
		}
	}

	#[test]
	fn faces_layout_places_second_part_in_the_middle() {
		let layout = layout("2parts-faces").unwrap();
		assert_eq!(layout.tile_at(3, 3).unwrap().scope, "Dense2");
		assert_eq!(layout.tile_at(0, 5).unwrap().scope, "Dense11");
		assert_eq!(layout.tile_at(7, 0).unwrap().scope, "Dense13");
	}

	#[test]
	fn unknown_mode_is_rejected() {
		let err = layout("3parts-cats").unwrap_err();
		assert!(err.is_config());
	}
}
