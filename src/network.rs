//! Generator and discriminator graphs, the LOD control and the [`Network`] facade.

use crate::blocks::GeneratorParts;
use crate::config::{NetworkConfig, Structure};
use crate::engine::Executor;
use crate::error::{PuzzleGanError, Result};
use crate::graph::{Graph, GraphBuilder, NodeId};
use crate::layers;
use crate::params::{MemoryParamStore, ParamStore};
use crate::progressive::{self, GrowthPlan};
use crate::puzzle;
use indexmap::IndexMap;
use ndarray::{ArrayD, IxDyn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Which of the two networks a graph implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
	Generator,
	Discriminator,
}

impl Role {
	/// Root variable scope.
	pub fn scope(self) -> &'static str {
		match self {
			Role::Generator => "G",
			Role::Discriminator => "D",
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Role::Generator => write!(f, "generator"),
			Role::Discriminator => write!(f, "discriminator"),
		}
	}
}

/// Shape of the graph to build.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topology {
	Linear,
	Recursive(GrowthPlan),
}

impl Topology {
	/// Topology selected by the config for a LOD snapshot.
	pub fn select(config: &NetworkConfig, lod: f32) -> Self {
		match config.structure() {
			Structure::Linear => Topology::Linear,
			Structure::Recursive => Topology::Recursive(GrowthPlan::new(config, lod)),
		}
	}
}

/// Externally driven level of detail, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct LodControl {
	bits: Arc<AtomicU32>,
}

impl LodControl {
	pub fn new(lod: f32) -> Self {
		LodControl {
			bits: Arc::new(AtomicU32::new(lod.to_bits())),
		}
	}

	pub fn get(&self) -> f32 {
		f32::from_bits(self.bits.load(Ordering::Acquire))
	}

	pub fn set(&self, lod: f32) {
		self.bits.store(lod.to_bits(), Ordering::Release);
	}
}

/// Builds the generator: inputs `latents (batch, latent_size)` and `labels (batch, label_size)`,
/// output `(batch, num_channels, resolution, resolution)`.
pub fn build_generator(config: &NetworkConfig, store: &mut dyn ParamStore, topology: &Topology) -> Result<Graph> {
	config.validate()?;
	let layout = puzzle::resolve(config)?;
	let parts = GeneratorParts::new(config, layout);

	let mut b = GraphBuilder::new(Role::Generator.scope(), config.dtype, store);
	let latents = b.input("latents", &[config.latent_size()]);
	b.input("labels", &[config.label_size]);
	let latents = layers::cast(&mut b, latents);

	let images = match topology {
		Topology::Linear => progressive::generator_linear(&mut b, &parts, latents)?,
		Topology::Recursive(plan) => {
			debug!(steps = ?plan.steps(), terminal = plan.terminal(), "generator growth plan");
			progressive::generator_recursive(&mut b, &parts, plan, latents)?
		}
	};
	check_output(&b, images, &[config.num_channels, config.resolution, config.resolution])?;
	let graph = b.finish(vec![images]);
	info!(
		nodes = graph.len(),
		params = graph.param_keys().len(),
		mode = layout.mode,
		"built generator graph"
	);
	Ok(graph)
}

/// Builds the discriminator: inputs `images (batch, num_channels, resolution, resolution)` and
/// `labels (batch, label_size)`, output `(batch, 1)`.
pub fn build_discriminator(config: &NetworkConfig, store: &mut dyn ParamStore, topology: &Topology) -> Result<Graph> {
	config.validate()?;

	let mut b = GraphBuilder::new(Role::Discriminator.scope(), config.dtype, store);
	let images = b.input("images", &[config.num_channels, config.resolution, config.resolution]);
	b.input("labels", &[config.label_size]);
	let images = layers::cast(&mut b, images);

	let scores = match topology {
		Topology::Linear => progressive::discriminator_linear(&mut b, config, images)?,
		Topology::Recursive(plan) => {
			debug!(steps = ?plan.steps(), terminal = plan.terminal(), "discriminator growth plan");
			progressive::discriminator_recursive(&mut b, config, plan, images)?
		}
	};
	check_output(&b, scores, &[1])?;
	let graph = b.finish(vec![scores]);
	info!(nodes = graph.len(), params = graph.param_keys().len(), "built discriminator graph");
	Ok(graph)
}

pub fn build(role: Role, config: &NetworkConfig, store: &mut dyn ParamStore, topology: &Topology) -> Result<Graph> {
	match role {
		Role::Generator => build_generator(config, store, topology),
		Role::Discriminator => build_discriminator(config, store, topology),
	}
}

fn check_output(b: &GraphBuilder, id: NodeId, expected: &[usize]) -> Result<()> {
	if b.shape(id).as_slice() == expected {
		Ok(())
	} else {
		Err(PuzzleGanError::Shape(format!(
			"network output is {:?}, expected {:?}",
			b.shape(id).as_slice(),
			expected
		)))
	}
}

/// Standard normal latent vectors `(count, latent_size)`.
pub fn random_latents(config: &NetworkConfig, count: usize, seed: u64) -> ArrayD<f32> {
	let width = config.latent_size();
	let mut rng = StdRng::seed_from_u64(seed);
	ArrayD::from_shape_simple_fn(IxDyn(&[count, width]), || StandardNormal.sample(&mut rng))
}

/// One network bound to a parameter store and a LOD control.
///
/// Every [`Network::forward`] call reads the LOD once and uses that value both to pick the graph
/// and as the blend input of the execution. Graphs are cached per topology.
pub struct Network {
	role: Role,
	config: NetworkConfig,
	store: MemoryParamStore,
	lod: LodControl,
	graphs: IndexMap<Topology, Graph>,
}

impl Network {
	pub fn new(role: Role, config: NetworkConfig, store: MemoryParamStore) -> Result<Self> {
		config.validate()?;
		if role == Role::Generator {
			puzzle::resolve(&config)?;
		}
		Ok(Network {
			role,
			config,
			store,
			lod: LodControl::default(),
			graphs: IndexMap::new(),
		})
	}

	pub fn generator(config: NetworkConfig, store: MemoryParamStore) -> Result<Self> {
		Network::new(Role::Generator, config, store)
	}

	pub fn discriminator(config: NetworkConfig, store: MemoryParamStore) -> Result<Self> {
		Network::new(Role::Discriminator, config, store)
	}

	pub fn role(&self) -> Role {
		self.role
	}

	pub fn config(&self) -> &NetworkConfig {
		&self.config
	}

	pub fn store(&self) -> &MemoryParamStore {
		&self.store
	}

	pub fn into_store(self) -> MemoryParamStore {
		self.store
	}

	/// Handle to the LOD scalar. Clones share the value.
	pub fn lod(&self) -> LodControl {
		self.lod.clone()
	}

	/// Number of graphs built so far.
	pub fn cached_graphs(&self) -> usize {
		self.graphs.len()
	}

	/// Graph for `topology`, built on first use.
	pub fn graph(&mut self, topology: &Topology) -> Result<&Graph> {
		if !self.graphs.contains_key(topology) {
			let graph = build(self.role, &self.config, &mut self.store, topology)?;
			self.graphs.insert(topology.clone(), graph);
		}
		self.graphs
			.get(topology)
			.ok_or_else(|| PuzzleGanError::Execution("graph cache lost an entry".to_string()))
	}

	/// Creates every variable of the linear topology, which covers all stages.
	pub fn initialize(&mut self) -> Result<()> {
		self.graph(&Topology::Linear).map(|_| ())
	}

	/// Runs the network on the primary input (`latents` or `images`) with all-zero labels.
	pub fn forward(&mut self, input: ArrayD<f32>, seed: u64) -> Result<ArrayD<f32>> {
		let batch = input.shape().first().copied().unwrap_or(0);
		let labels = ArrayD::zeros(IxDyn(&[batch, self.config.label_size]));
		self.forward_with_labels(input, labels, seed)
	}

	pub fn forward_with_labels(&mut self, input: ArrayD<f32>, labels: ArrayD<f32>, seed: u64) -> Result<ArrayD<f32>> {
		let lod = self.lod.get();
		if !lod.is_finite() {
			return Err(PuzzleGanError::Execution(format!("LOD value {} is not finite", lod)));
		}
		let topology = Topology::select(&self.config, lod);
		let name = match self.role {
			Role::Generator => "latents",
			Role::Discriminator => "images",
		};
		self.graph(&topology)?;
		let graph = &self.graphs[&topology];
		let mut outputs = Executor::new(graph, &self.store)
			.lod(lod)
			.seed(seed)
			.run(&[(name, input), ("labels", labels)])?;
		outputs
			.pop()
			.ok_or_else(|| PuzzleGanError::Execution(format!("{} graph has no output", self.role)))
	}
}
