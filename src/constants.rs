pub mod network {
	pub const DEFAULT_RESOLUTION: usize = 32;
	pub const DEFAULT_FIRSTBLOCK_RES: usize = 8;
	pub const DEFAULT_NUM_CHANNELS: usize = 1;
	pub const DEFAULT_LABEL_SIZE: usize = 0;
	pub const DEFAULT_FMAP_BASE: usize = 8192;
	pub const DEFAULT_FMAP_DECAY: f32 = 1.0;
	pub const DEFAULT_FMAP_MAX: usize = 512;
	pub const DEFAULT_LATENT_SIZES: &[usize] = &[512];
	pub const DEFAULT_PIXELNORM_EPSILON: f32 = 1e-8;
	pub const DEFAULT_MBSTD_GROUP_SIZE: usize = 4;
	pub const MIN_RESOLUTION: usize = 4;
}

pub mod layers {
	pub const LEAKY_RELU_ALPHA: f32 = 0.2;
	pub const CONV_KERNEL: usize = 3;
	pub const MBSTD_EPSILON: f32 = 1e-8;
	pub const MBSTD_NEW_FEATURES: usize = 1;
	/// Gain of the puzzle tile projections, sqrt(2)/4.
	pub const PUZZLE_GAIN: f32 = std::f32::consts::SQRT_2 / 4.0;
	pub const DEFAULT_GAIN: f32 = std::f32::consts::SQRT_2;
}

pub mod store {
	pub const DEFAULT_SEED: u64 = 0x5eed_1234;
	pub const SHUFFLE_STRIDE: usize = 4;
	pub const XZ_LEVEL: u32 = 7;
}
