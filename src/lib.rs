//! Generator and discriminator graphs of a progressive-growing puzzle GAN.
//!
//! The generator cuts its latent vector into chunks, projects every chunk into a tile of the
//! seed feature map and grows the assembled map through a pyramid of resolution blocks. The
//! discriminator mirrors the pyramid. Both cross-fade neighbouring stages by a level-of-detail
//! value and can be wired as a linear graph holding every stage or as a recursive graph holding
//! only the stages the current LOD needs.

extern crate clap;
extern crate image;
extern crate rand;
#[macro_use]
extern crate serde_derive;
extern crate bincode;
extern crate byteorder;
extern crate indexmap;
extern crate ndarray;
extern crate serde;
extern crate smallvec;
extern crate xz2;

pub mod blocks;
pub mod cli;
pub mod commands;
pub mod config;
pub mod config_file;
pub mod constants;
pub mod engine;
pub mod error;
pub mod graph;
pub mod layers;
pub mod logging;
pub mod network;
pub mod params;
pub mod progressive;
pub mod puzzle;

pub use config::{DType, NetworkConfig, NetworkConfigBuilder, Structure};
pub use engine::Executor;
pub use error::{ConfigError, PuzzleGanError, Result};
pub use graph::{Graph, GraphBuilder, NodeId, Op};
pub use network::{build_discriminator, build_generator, random_latents, LodControl, Network, Role, Topology};
pub use params::{Init, MemoryParamStore, ParamKey, ParamSpec, ParamStore};
pub use progressive::{lerp, lerp_clip, GrowthPlan, GrowthStep};
pub use puzzle::{PuzzleLayout, PuzzleTile};
