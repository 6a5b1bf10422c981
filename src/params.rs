//! Parameter storage addressed by structured hierarchical keys.
//!
//! Keys render to slash separated paths such as `G/8x8/Dense1/weight`, which is the naming
//! scheme stored parameter files are indexed by.

use crate::constants::store;
use crate::error::{PuzzleGanError, Result};
use bincode::{deserialize, serialize};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use indexmap::IndexMap;
use ndarray::{ArrayD, IxDyn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Read;
use std::num::FpCategory;
use xz2::read::{XzDecoder, XzEncoder};

/// Structured address of a variable: the scope path followed by the variable name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamKey {
	scopes: Vec<String>,
	name: String,
}

impl ParamKey {
	pub fn new<I, S>(scopes: I, name: &str) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		ParamKey {
			scopes: scopes.into_iter().map(Into::into).collect(),
			name: name.to_string(),
		}
	}

	/// Parses a rendered path back into a key.
	pub fn parse(path: &str) -> Self {
		let mut parts: Vec<String> = path.split('/').map(str::to_string).collect();
		let name = parts.pop().unwrap_or_default();
		ParamKey { scopes: parts, name }
	}

	pub fn scopes(&self) -> &[String] {
		&self.scopes
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn render(&self) -> String {
		let mut path = self.scopes.join("/");
		if !path.is_empty() {
			path.push('/');
		}
		path.push_str(&self.name);
		path
	}
}

impl fmt::Display for ParamKey {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.render())
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Init {
	/// N(0, std²).
	Normal { std: f32 },
	Zeros,
}

/// Declaration of a variable: its shape, how it starts and whether an optimizer may update it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
	pub shape: Vec<usize>,
	pub init: Init,
	pub trainable: bool,
}

impl ParamSpec {
	pub fn trainable(shape: Vec<usize>, init: Init) -> Self {
		ParamSpec { shape, init, trainable: true }
	}

	pub fn constant(shape: Vec<usize>, init: Init) -> Self {
		ParamSpec { shape, init, trainable: false }
	}
}

/// The variable-store seam. Graph builders only ever create or look up variables through it.
pub trait ParamStore {
	/// Creates the variable if it is absent. An existing variable must have the declared shape.
	fn get_or_create(&mut self, key: &ParamKey, spec: &ParamSpec) -> Result<()>;

	fn value(&self, key: &ParamKey) -> Option<&ArrayD<f32>>;

	fn contains(&self, key: &ParamKey) -> bool {
		self.value(key).is_some()
	}

	fn len(&self) -> usize;

	fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamEntry {
	pub value: ArrayD<f32>,
	pub trainable: bool,
}

/// In-memory store. Initial values are drawn from a generator seeded by the store seed and the
/// key path, so the value of a variable never depends on creation order.
#[derive(Debug, Clone)]
pub struct MemoryParamStore {
	seed: u64,
	entries: IndexMap<String, ParamEntry>,
}

impl Default for MemoryParamStore {
	fn default() -> Self {
		MemoryParamStore::new(store::DEFAULT_SEED)
	}
}

impl MemoryParamStore {
	pub fn new(seed: u64) -> Self {
		MemoryParamStore {
			seed,
			entries: IndexMap::new(),
		}
	}

	pub fn seed(&self) -> u64 {
		self.seed
	}

	pub fn entry(&self, path: &str) -> Option<&ParamEntry> {
		self.entries.get(path)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamEntry)> {
		self.entries.iter()
	}

	pub fn keys(&self) -> impl Iterator<Item = &String> {
		self.entries.keys()
	}

	/// Overwrites an existing variable, keeping its shape.
	pub fn assign(&mut self, key: &ParamKey, value: ArrayD<f32>) -> Result<()> {
		let path = key.render();
		let entry = self
			.entries
			.get_mut(&path)
			.ok_or_else(|| PuzzleGanError::MissingParameter(path.clone()))?;
		if entry.value.shape() != value.shape() {
			return Err(PuzzleGanError::Shape(format!(
				"cannot assign {:?} to {} of shape {:?}",
				value.shape(),
				path,
				entry.value.shape()
			)));
		}
		entry.value = value;
		Ok(())
	}

	/// Number of scalar values held by trainable variables.
	pub fn trainable_count(&self) -> usize {
		self.entries
			.values()
			.filter(|entry| entry.trainable)
			.map(|entry| entry.value.len())
			.sum()
	}

	fn key_rng(&self, path: &str) -> StdRng {
		let mut hasher = Sha256::new();
		hasher.update(self.seed.to_le_bytes());
		hasher.update(path.as_bytes());
		let digest = hasher.finalize();
		StdRng::seed_from_u64(LittleEndian::read_u64(&digest[..8]))
	}

	fn initialize(&self, path: &str, spec: &ParamSpec) -> ArrayD<f32> {
		match spec.init {
			Init::Zeros => ArrayD::zeros(IxDyn(&spec.shape)),
			Init::Normal { std } => {
				let mut rng = self.key_rng(path);
				ArrayD::from_shape_simple_fn(IxDyn(&spec.shape), || {
					let sample: f32 = StandardNormal.sample(&mut rng);
					sample * std
				})
			}
		}
	}

	/// SHA-256 over every variable name and value, hex encoded.
	pub fn digest(&self) -> String {
		let mut hasher = Sha256::new();
		for (name, entry) in &self.entries {
			hasher.update(name.as_bytes());
			let mut bytes = [0u8; 4];
			for value in entry.value.iter() {
				LittleEndian::write_f32(&mut bytes, *value);
				hasher.update(bytes);
			}
		}
		hex::encode(hasher.finalize())
	}

	/// Serialises and compresses the store.
	/// If `quantise` is set, the least significant 12 bits of every value are zeroed to improve compression.
	pub fn to_bytes(&self, quantise: bool) -> Result<Vec<u8>> {
		let mut stored = StoredParams {
			seed: self.seed,
			entries: self
				.entries
				.iter()
				.map(|(name, entry)| StoredParam {
					name: name.clone(),
					trainable: entry.trainable,
					value: entry.value.clone(),
				})
				.collect(),
		};

		for param in &mut stored.entries {
			for e in param.value.iter_mut() {
				if let FpCategory::Subnormal = e.classify() {
					*e = 0.0;
				}
				if quantise {
					let mut bytes = [0; 4];
					BigEndian::write_f32(&mut bytes, *e);
					bytes[2] &= 0xF0;
					bytes[3] &= 0x00;
					*e = BigEndian::read_f32(&bytes);
				}
			}
		}

		let serialized = serialize(&stored)?;
		let shuffled = shuffle(&serialized, store::SHUFFLE_STRIDE);
		XzEncoder::new(shuffled.as_slice(), store::XZ_LEVEL)
			.bytes()
			.collect::<::std::result::Result<Vec<_>, _>>()
			.map_err(|e| PuzzleGanError::Serialization(format!("{}", e)))
	}

	/// Inverts `to_bytes()`.
	pub fn from_bytes(data: &[u8]) -> Result<Self> {
		let decompressed = XzDecoder::new(data)
			.bytes()
			.collect::<::std::result::Result<Vec<_>, _>>()
			.map_err(|e| PuzzleGanError::Serialization(format!("{}", e)))?;
		let unshuffled = unshuffle(&decompressed, store::SHUFFLE_STRIDE);
		let stored: StoredParams = deserialize(&unshuffled)
			.map_err(|e| PuzzleGanError::Serialization(format!("parameter file decoding failed: {}", e)))?;

		let mut entries = IndexMap::with_capacity(stored.entries.len());
		for param in stored.entries {
			entries.insert(
				param.name,
				ParamEntry {
					value: param.value,
					trainable: param.trainable,
				},
			);
		}
		Ok(MemoryParamStore {
			seed: stored.seed,
			entries,
		})
	}
}

impl ParamStore for MemoryParamStore {
	fn get_or_create(&mut self, key: &ParamKey, spec: &ParamSpec) -> Result<()> {
		let path = key.render();
		if let Some(entry) = self.entries.get(&path) {
			if entry.value.shape() != spec.shape.as_slice() {
				return Err(PuzzleGanError::Shape(format!(
					"variable {} exists with shape {:?}, requested {:?}",
					path,
					entry.value.shape(),
					spec.shape
				)));
			}
			return Ok(());
		}
		let value = self.initialize(&path, spec);
		self.entries.insert(
			path,
			ParamEntry {
				value,
				trainable: spec.trainable,
			},
		);
		Ok(())
	}

	fn value(&self, key: &ParamKey) -> Option<&ArrayD<f32>> {
		self.entries.get(&key.render()).map(|entry| &entry.value)
	}

	fn len(&self) -> usize {
		self.entries.len()
	}
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredParam {
	name: String,
	trainable: bool,
	value: ArrayD<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredParams {
	seed: u64,
	entries: Vec<StoredParam>,
}

/// Shuffle f32 bytes so that all first bytes are contiguous etc
/// Improves compression of floating point data
fn shuffle(data: &[u8], stride: usize) -> Vec<u8> {
	let mut vec = Vec::with_capacity(data.len());
	for offset in 0..stride {
		for i in 0..(data.len() + stride - 1 - offset) / stride {
			vec.push(data[offset + i * stride])
		}
	}
	debug_assert_eq!(vec.len(), data.len());
	vec
}

/// Inverts `shuffle()`
fn unshuffle(data: &[u8], stride: usize) -> Vec<u8> {
	let mut vec = vec![0; data.len()];
	let mut inc = 0;
	for offset in 0..stride {
		for i in 0..(data.len() + stride - 1 - offset) / stride {
			vec[offset + i * stride] = data[inc];
			inc += 1;
		}
	}
	debug_assert_eq!(inc, data.len());
	vec
}
