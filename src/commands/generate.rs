use super::{load_settings, load_store, save_store};
use crate::error::{PuzzleGanError, Result};
use crate::logging::OperationLogger;
use crate::network::{random_latents, Network};
use clap::ArgMatches;
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use ndarray::{ArrayD, Axis};
use tracing::info;

pub fn generate(app_m: &ArgMatches) -> Result<()> {
	let mut op = OperationLogger::new("generate");
	match run(app_m, &mut op) {
		Ok(()) => {
			op.complete();
			Ok(())
		}
		Err(err) => {
			op.log_error(&err);
			Err(err)
		}
	}
}

fn run(app_m: &ArgMatches, op: &mut OperationLogger) -> Result<()> {
	let output_path = app_m
		.value_of("OUTPUT_FILE")
		.ok_or_else(|| PuzzleGanError::InvalidInput("No output file given".to_string()))?;
	let settings = load_settings(app_m)?;
	let runtime = &settings.runtime;
	let store = load_store(runtime)?;

	op.add_metadata("count", runtime.batch_size);
	op.add_metadata("lod", runtime.lod);
	op.add_metadata("seed", runtime.seed);

	let mut generator = Network::generator(settings.network.clone(), store)?;
	generator.lod().set(runtime.lod);
	let latents = random_latents(&settings.network, runtime.batch_size, runtime.seed);
	let images = generator.forward(latents, runtime.seed)?;
	op.log_progress("samples generated");

	let grid = to_image_grid(&images)?;
	grid.save(output_path)?;
	info!("Wrote {} samples to: {}", runtime.batch_size, output_path);

	save_store(app_m, generator.store(), runtime.quantise)?;
	Ok(())
}

fn to_byte(value: f32) -> u8 {
	((value + 1.0) * 127.5).round().max(0.0).min(255.0) as u8
}

/// Tiles a `(batch, channels, height, width)` tensor with values in `[-1, 1]` into a square-ish
/// grid. One channel gives a grayscale image, three give RGB.
pub fn to_image_grid(images: &ArrayD<f32>) -> Result<DynamicImage> {
	let shape = images.shape();
	if shape.len() != 4 || shape[0] == 0 {
		return Err(PuzzleGanError::Shape(format!(
			"expected a non-empty (batch, channels, height, width) tensor, got {:?}",
			shape
		)));
	}
	let (count, channels, height, width) = (shape[0], shape[1], shape[2], shape[3]);
	let columns = (count as f64).sqrt().ceil() as usize;
	let rows = (count + columns - 1) / columns;
	let grid_w = (columns * width) as u32;
	let grid_h = (rows * height) as u32;

	let origin = |n: usize| ((n % columns) * width, (n / columns) * height);
	match channels {
		1 => {
			let mut grid = GrayImage::new(grid_w, grid_h);
			for (n, sample) in images.axis_iter(Axis(0)).enumerate() {
				let (ox, oy) = origin(n);
				for y in 0..height {
					for x in 0..width {
						grid.put_pixel((ox + x) as u32, (oy + y) as u32, Luma([to_byte(sample[[0, y, x]])]));
					}
				}
			}
			Ok(DynamicImage::ImageLuma8(grid))
		}
		3 => {
			let mut grid = RgbImage::new(grid_w, grid_h);
			for (n, sample) in images.axis_iter(Axis(0)).enumerate() {
				let (ox, oy) = origin(n);
				for y in 0..height {
					for x in 0..width {
						let pixel = Rgb([
							to_byte(sample[[0, y, x]]),
							to_byte(sample[[1, y, x]]),
							to_byte(sample[[2, y, x]]),
						]);
						grid.put_pixel((ox + x) as u32, (oy + y) as u32, pixel);
					}
				}
			}
			Ok(DynamicImage::ImageRgb8(grid))
		}
		other => Err(PuzzleGanError::InvalidInput(format!(
			"cannot write images with {} channels, only 1 or 3",
			other
		))),
	}
}
