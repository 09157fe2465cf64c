//! The Aggregating Mount Binding (§4.3): composes the Components of one
//! Mount Binding into a single logical view.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::backend::{AccessMode, Capabilities, OpenMode, Share, VfsStream};
use crate::entry::{Attributes, Entry};
use crate::error::{Error, VfsResult};
use crate::mount_tree::{Component, MountBinding};
use crate::observer::Sink;
use crate::path::VPath;

/// Below this many Components, fan-out runs sequentially; above it, on a
/// `rayon` scope. Mirrors the reference codebase's own threshold-gated
/// split for large fan-outs rather than always paying thread-pool overhead.
const PARALLEL_FANOUT_THRESHOLD: usize = 4;

fn map_components<T: Send>(
	components: &[&Component],
	f: impl Fn(&Component) -> VfsResult<T> + Sync,
) -> Vec<VfsResult<T>> {
	if components.len() > PARALLEL_FANOUT_THRESHOLD {
		components.par_iter().map(|c| f(c)).collect()
	} else {
		components.iter().map(|c| f(c)).collect()
	}
}

/// Folds a set of per-Component results for a *unifying* read operation
/// (browse/getEntry): successes are passed to `unify`, `NotSupported`/
/// `NotFound` are swallowed, anything else propagates, and if every
/// Component fails tolerably the first such error is surfaced.
fn fold_unifying<T>(results: Vec<VfsResult<T>>, unify: impl Fn(Vec<T>) -> T) -> VfsResult<Option<T>> {
	let mut successes = Vec::new();
	let mut first_tolerated: Option<Error> = None;

	for result in results {
		match result {
			Ok(value) => successes.push(value),
			Err(e) if e.is_tolerated_during_fanout() => {
				log::trace!("component fan-out tolerated error: {e}");

				if first_tolerated.is_none() {
					first_tolerated = Some(e);
				}
			}
			Err(e) => {
				log::warn!("component fan-out aborted by non-tolerated error: {e}");
				return Err(e);
			}
		}
	}

	if successes.is_empty() {
		return match first_tolerated {
			Some(e) => Err(e),
			None => Ok(None),
		};
	}

	Ok(Some(unify(successes)))
}

/// `browse(P)`: merges entries by name across every Component that
/// advertises [`Capabilities::BROWSE`].
pub(crate) fn browse(binding: &MountBinding, path_in_mount: &VPath) -> VfsResult<Vec<Entry>> {
	let browsers: Vec<&Component> = binding
		.components()
		.iter()
		.filter(|c| c.supports(Capabilities::BROWSE))
		.collect();

	if browsers.is_empty() {
		return Err(Error::not_supported());
	}

	let results = map_components(&browsers, |c| {
		let child = c.path_map().forward(path_in_mount);
		c.backend().browse(&child)
	});

	let unified = fold_unifying(results, merge_entry_lists)?;
	Ok(unified.unwrap_or_default())
}

/// Merges entry lists keyed by path (ignoring a trailing `/`), earlier
/// lists taking priority for scalar fields on collision (§4.4's "entry
/// unification" algorithm).
pub(crate) fn merge_entry_lists(lists: Vec<Vec<Entry>>) -> Vec<Entry> {
	let mut merged: HashMap<String, Entry> = HashMap::new();

	for list in lists {
		for entry in list {
			let key = entry.path().as_str().trim_end_matches('/').to_string();

			match merged.remove(&key) {
				Some(existing) => {
					merged.insert(key, existing.unify(entry));
				}
				None => {
					merged.insert(key, entry);
				}
			}
		}
	}

	merged.into_values().collect()
}

/// `getEntry(P)`: same unification discipline as [`browse`], for a single
/// entry.
pub(crate) fn get_entry(binding: &MountBinding, path_in_mount: &VPath) -> VfsResult<Option<Entry>> {
	let getters: Vec<&Component> = binding
		.components()
		.iter()
		.filter(|c| c.supports(Capabilities::GET_ENTRY))
		.collect();

	if getters.is_empty() {
		return Err(Error::not_supported());
	}

	let results = map_components(&getters, |c| {
		let child = c.path_map().forward(path_in_mount);
		c.backend().get_entry(&child)
	});

	let mut found = Vec::new();
	let mut first_tolerated = None;

	for result in results {
		match result {
			Ok(Some(entry)) => found.push(entry),
			Ok(None) => {}
			Err(e) if e.is_tolerated_during_fanout() => {
				first_tolerated.get_or_insert(e);
			}
			Err(e) => return Err(e),
		};
	}

	if found.is_empty() {
		return match first_tolerated {
			Some(e) => Err(e),
			None => Ok(None),
		};
	}

	let mut iter = found.into_iter();
	let mut merged = iter.next().expect("checked non-empty above");

	for entry in iter {
		merged = merged.unify(entry);
	}

	Ok(Some(merged))
}

/// A linear-scan routing discipline shared by every write-type operation
/// (§4.3): try Components in priority order, tolerate `NotSupported`/
/// `NotFound`, stop and propagate on anything else, and only surface the
/// tolerated error once every supporting Component has failed.
fn route_write<T>(
	components: &[Component],
	required: Capabilities,
	mut attempt: impl FnMut(&Component) -> VfsResult<T>,
) -> VfsResult<T> {
	let mut any_supported = false;
	let mut not_found: Option<Error> = None;

	for component in components {
		if !component.supports(required) {
			continue;
		}

		any_supported = true;

		match attempt(component) {
			Ok(value) => return Ok(value),
			Err(e) if e.kind() == crate::error::Kind::NotSupported => continue,
			Err(e) if matches!(
				e.kind(),
				crate::error::Kind::FileNotFound | crate::error::Kind::DirectoryNotFound
			) =>
			{
				not_found.get_or_insert(e);
			}
			Err(e) => return Err(e),
		}
	}

	match not_found {
		Some(e) => Err(e),
		None if any_supported => Err(Error::file_not_found()),
		None => Err(Error::not_supported()),
	}
}

pub(crate) fn open(
	binding: &MountBinding,
	path_in_mount: &VPath,
	mode: OpenMode,
	access: AccessMode,
	share: Share,
) -> VfsResult<Box<dyn VfsStream>> {
	let required = if access.wants_write() {
		Capabilities::OPEN_WRITE
	} else {
		Capabilities::OPEN_READ
	};

	route_write(binding.components(), required, |c| {
		let child = c.path_map().forward(path_in_mount);
		c.backend().open(&child, mode, access, share)
	})
}

pub(crate) fn create_directory(binding: &MountBinding, path_in_mount: &VPath) -> VfsResult<()> {
	route_write(binding.components(), Capabilities::CREATE_DIRECTORY, |c| {
		let child = c.path_map().forward(path_in_mount);
		c.backend().create_directory(&child)
	})
}

pub(crate) fn delete(binding: &MountBinding, path_in_mount: &VPath, recursive: bool) -> VfsResult<()> {
	route_write(binding.components(), Capabilities::DELETE, |c| {
		let child = c.path_map().forward(path_in_mount);
		c.backend().delete(&child, recursive)
	})
}

pub(crate) fn set_attribute(
	binding: &MountBinding,
	path_in_mount: &VPath,
	attrs: Attributes,
) -> VfsResult<()> {
	route_write(binding.components(), Capabilities::SET_ATTRIBUTE, |c| {
		let child = c.path_map().forward(path_in_mount);
		c.backend().set_attribute(&child, attrs)
	})
}

/// `move(src, dst)` (§4.3): prefers a same-backend native move, falls back
/// to a copy-then-delete transfer when `src` and `dst` resolve to different
/// backends.
pub(crate) fn move_entry(
	src_binding: &MountBinding,
	src_in_mount: &VPath,
	dst_binding: &MountBinding,
	dst_in_mount: &VPath,
) -> VfsResult<()> {
	let mut not_found: Option<Error> = None;
	let mut any_supported = false;

	for src in src_binding.components() {
		if !src.supports(Capabilities::MOVE) {
			continue;
		}

		let src_child = src.path_map().forward(src_in_mount);

		for dst in dst_binding.components() {
			if !dst.supports(Capabilities::MOVE) {
				continue;
			}

			any_supported = true;
			let dst_child = dst.path_map().forward(dst_in_mount);

			let result = if std::sync::Arc::ptr_eq(src.backend(), dst.backend()) {
				src.backend().move_entry(&src_child, &dst_child)
			} else {
				transfer(src, &src_child, dst, &dst_child)
			};

			match result {
				Ok(()) => return Ok(()),
				Err(e) if e.kind() == crate::error::Kind::NotSupported => continue,
				Err(e)
					if matches!(
						e.kind(),
						crate::error::Kind::FileNotFound | crate::error::Kind::DirectoryNotFound
					) =>
				{
					not_found.get_or_insert(e);
				}
				Err(e) => return Err(e),
			}
		}
	}

	match not_found {
		Some(e) => Err(e),
		None if any_supported => Err(Error::file_not_found()),
		None => Err(Error::not_supported()),
	}
}

/// Copies `src_child`'s bytes to `dst_child` via a read/write stream pair,
/// then deletes the source. Used when `move` would otherwise cross
/// backends with no native rename available.
fn transfer(
	src: &Component,
	src_child: &VPath,
	dst: &Component,
	dst_child: &VPath,
) -> VfsResult<()> {
	use std::io::{Read, Write};

	let mut reader = VfsStreamRead(src.backend().open(
		src_child,
		OpenMode::Open,
		AccessMode::Read,
		Share::empty(),
	)?);

	let mut writer = VfsStreamWrite(dst.backend().open(
		dst_child,
		OpenMode::CreateNew,
		AccessMode::Write,
		Share::empty(),
	)?);

	std::io::copy(&mut reader, &mut writer).map_err(Error::from)?;
	writer.0.flush()?;
	writer.0.close()?;
	src.backend().delete(src_child, false)
}

struct VfsStreamRead(Box<dyn VfsStream>);

fn as_io_error(e: Error) -> std::io::Error {
	std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

impl std::io::Read for VfsStreamRead {
	fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
		self.0.read(buf).map_err(as_io_error)
	}
}

struct VfsStreamWrite(Box<dyn VfsStream>);

impl std::io::Write for VfsStreamWrite {
	fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
		self.0.write(buf).map_err(as_io_error)
	}

	fn flush(&mut self) -> std::io::Result<()> {
		self.0.flush().map_err(as_io_error)
	}
}

/// `observe(filter)` routing (§4.3): for each Component that supports
/// observation whose subtree intersects `filter`, subscribes with the
/// rebased child-side filter.
pub(crate) fn observe_components(
	binding: &MountBinding,
	filter: &str,
	mut make_sink: impl FnMut(&Component) -> Sink,
) -> Vec<Box<dyn crate::backend::BackendSubscription>> {
	let mut subscriptions = Vec::new();

	for component in binding.components() {
		if !component.supports(Capabilities::OBSERVE) {
			continue;
		}

		let mount_glob = if binding.mount_path().is_root() {
			"**".to_string()
		} else {
			format!("{}/**", binding.mount_path())
		};

		let Some(intersected) = crate::path::glob_intersect(&mount_glob, filter) else {
			continue;
		};

		let relative = intersected
			.strip_prefix(binding.mount_path().as_str())
			.map(|s| s.trim_start_matches('/'))
			.unwrap_or(&intersected);

		let child_filter = component
			.path_map()
			.forward(VPath::new(relative))
			.into_string();

		match component.backend().observe(&child_filter, make_sink(component)) {
			Ok(sub) => subscriptions.push(sub),
			Err(e) => log::warn!("component observe failed: {e}"),
		}
	}

	subscriptions
}

#[cfg(test)]
mod test;
