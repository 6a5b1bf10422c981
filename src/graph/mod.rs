//! Explicit computation graph.
//!
//! A [`GraphBuilder`] appends nodes in evaluation order while tracking a stack of named scopes;
//! variables are created through the [`ParamStore`] under the current scope path. The finished
//! [`Graph`] is immutable and is evaluated by [`crate::engine::Executor`].

mod node;

pub use self::node::{KernelTransform, Node, NodeId, NoiseSource, Op, Shape, TileRect, WeightRef};

use crate::config::DType;
use crate::error::Result;
use crate::params::{ParamKey, ParamSpec, ParamStore};
use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;
use std::fmt;

#[derive(Debug, Clone)]
pub struct Graph {
	nodes: Vec<Node>,
	inputs: IndexMap<String, NodeId>,
	outputs: Vec<NodeId>,
	dtype: DType,
}

impl Graph {
	pub fn nodes(&self) -> &[Node] {
		&self.nodes
	}

	pub fn node(&self, id: NodeId) -> &Node {
		&self.nodes[id.0]
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	pub fn dtype(&self) -> DType {
		self.dtype
	}

	pub fn input(&self, name: &str) -> Option<NodeId> {
		self.inputs.get(name).copied()
	}

	pub fn input_names(&self) -> impl Iterator<Item = &String> {
		self.inputs.keys()
	}

	pub fn outputs(&self) -> &[NodeId] {
		&self.outputs
	}

	/// Per-sample shape of the `index`th output.
	pub fn output_shape(&self, index: usize) -> Option<&Shape> {
		self.outputs.get(index).map(|id| &self.node(*id).shape)
	}

	/// Unique variables referenced by the graph, in first-use order.
	pub fn param_keys(&self) -> Vec<ParamKey> {
		let mut keys = IndexSet::new();
		for node in &self.nodes {
			for key in node.op.param_keys() {
				keys.insert(key.clone());
			}
		}
		keys.into_iter().collect()
	}

	pub fn count_kind(&self, kind: &str) -> usize {
		self.nodes.iter().filter(|node| node.op.kind() == kind).count()
	}

	/// Nodes the outputs depend on.
	pub fn reachable(&self) -> Vec<bool> {
		let mut needed = vec![false; self.nodes.len()];
		let mut stack: Vec<NodeId> = self.outputs.clone();
		while let Some(id) = stack.pop() {
			if needed[id.0] {
				continue;
			}
			needed[id.0] = true;
			stack.extend(self.nodes[id.0].inputs.iter().copied());
		}
		needed
	}

	/// Distinct scopes that own at least one node, in creation order.
	pub fn scopes(&self) -> Vec<&str> {
		let mut scopes = IndexSet::new();
		for node in &self.nodes {
			scopes.insert(node.scope.as_str());
		}
		scopes.into_iter().collect()
	}
}

impl fmt::Display for Graph {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		for (index, node) in self.nodes.iter().enumerate() {
			let inputs: Vec<String> = node.inputs.iter().map(|id| id.to_string()).collect();
			writeln!(
				f,
				"%{} = {}({}) {:?} [{}]",
				index,
				node.op.kind(),
				inputs.join(", "),
				node.shape.as_slice(),
				node.scope
			)?;
		}
		Ok(())
	}
}

pub struct GraphBuilder<'s> {
	nodes: Vec<Node>,
	inputs: IndexMap<String, NodeId>,
	scopes: Vec<String>,
	dtype: DType,
	store: &'s mut dyn ParamStore,
}

impl<'s> GraphBuilder<'s> {
	/// `root` is the outermost scope, `G` or `D` for the two networks.
	pub fn new(root: &str, dtype: DType, store: &'s mut dyn ParamStore) -> Self {
		GraphBuilder {
			nodes: Vec::new(),
			inputs: IndexMap::new(),
			scopes: vec![root.to_string()],
			dtype,
			store,
		}
	}

	pub fn dtype(&self) -> DType {
		self.dtype
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	pub fn shape(&self, id: NodeId) -> &Shape {
		&self.nodes[id.0].shape
	}

	pub fn current_scope(&self) -> String {
		self.scopes.join("/")
	}

	pub fn input(&mut self, name: &str, shape: &[usize]) -> NodeId {
		let id = self.add(
			Op::Input { name: name.to_string() },
			&[],
			SmallVec::from_slice(shape),
		);
		self.inputs.insert(name.to_string(), id);
		id
	}

	pub fn add(&mut self, op: Op, inputs: &[NodeId], shape: Shape) -> NodeId {
		let id = NodeId(self.nodes.len());
		self.nodes.push(Node {
			op,
			inputs: SmallVec::from_slice(inputs),
			shape,
			scope: self.current_scope(),
		});
		id
	}

	/// Runs `f` inside the named scope.
	pub fn scope<T, F>(&mut self, name: &str, f: F) -> Result<T>
	where
		F: FnOnce(&mut Self) -> Result<T>,
	{
		self.scopes.push(name.to_string());
		let result = f(self);
		self.scopes.pop();
		result
	}

	/// Creates (or reuses) the variable `name` in the current scope.
	pub fn variable(&mut self, name: &str, spec: ParamSpec) -> Result<ParamKey> {
		let key = ParamKey::new(self.scopes.iter().cloned(), name);
		self.store.get_or_create(&key, &spec)?;
		Ok(key)
	}

	pub fn finish(self, outputs: Vec<NodeId>) -> Graph {
		Graph {
			nodes: self.nodes,
			inputs: self.inputs,
			outputs,
			dtype: self.dtype,
		}
	}
}
