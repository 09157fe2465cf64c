//! The tree node type backing [`crate::MemBackend`].
//!
//! The specification describes a single global lock guarding structural
//! changes; here each directory carries its own `RwLock` instead; a `Node`
//! reached through an `Arc` clone needs interior mutability at the node
//! itself regardless of how coarse the nominal lock is, so going directory-
//! by-directory buys real concurrency between unrelated subtrees for free.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::{Mutex, RwLock};
use vfs_core::Attributes;

pub(crate) enum Node {
	File(Mutex<FileData>),
	Directory(RwLock<BTreeMap<String, Arc<Node>>>),
}

pub(crate) struct FileData {
	pub content: Vec<u8>,
	pub attributes: Attributes,
	pub modified: SystemTime,
	pub accessed: SystemTime,
}

impl Node {
	pub(crate) fn new_file() -> Self {
		let now = SystemTime::now();

		Node::File(Mutex::new(FileData {
			content: Vec::new(),
			attributes: Attributes::empty(),
			modified: now,
			accessed: now,
		}))
	}

	pub(crate) fn new_directory() -> Self {
		Node::Directory(RwLock::new(BTreeMap::new()))
	}

	pub(crate) fn as_file(&self) -> Option<&Mutex<FileData>> {
		match self {
			Node::File(data) => Some(data),
			Node::Directory(_) => None,
		}
	}

	pub(crate) fn as_directory(&self) -> Option<&RwLock<BTreeMap<String, Arc<Node>>>> {
		match self {
			Node::Directory(children) => Some(children),
			Node::File(_) => None,
		}
	}
}
