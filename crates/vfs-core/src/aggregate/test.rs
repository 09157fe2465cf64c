use std::sync::Arc;

use super::*;
use crate::backend::Backend;
use crate::entry::EntryKind;
use crate::mount_tree::Options;
use crate::path::VPathBuf;

struct Dir(Vec<(&'static str, &'static str)>);

impl Backend for Dir {
	fn capabilities(&self) -> Capabilities {
		Capabilities::BROWSE | Capabilities::GET_ENTRY | Capabilities::DELETE
	}

	fn browse(&self, path: &VPath) -> VfsResult<Vec<Entry>> {
		if path.is_root() {
			Ok(self
				.0
				.iter()
				.map(|(name, _)| Entry::new(VPathBuf::from(*name), EntryKind::File))
				.collect())
		} else {
			Err(Error::directory_not_found())
		}
	}

	fn get_entry(&self, path: &VPath) -> VfsResult<Option<Entry>> {
		for (name, content) in &self.0 {
			if path.as_str() == *name {
				return Ok(Some(
					Entry::new(VPathBuf::from(*name), EntryKind::File).with_length(content.len() as i64),
				));
			}
		}

		Ok(None)
	}

	fn delete(&self, path: &VPath, _recursive: bool) -> VfsResult<()> {
		if self.0.iter().any(|(name, _)| path.as_str() == *name) {
			Ok(())
		} else {
			Err(Error::file_not_found())
		}
	}
}

struct AlwaysNotSupported;

impl Backend for AlwaysNotSupported {
	fn capabilities(&self) -> Capabilities {
		Capabilities::empty()
	}
}

fn component(backend: impl Backend + 'static) -> Component {
	Component::new(Arc::new(backend), Options::new())
}

#[test]
fn browse_unifies_across_components() {
	let binding = MountBinding::new(
		VPathBuf::root(),
		vec![component(Dir(vec![("a.txt", "one")])), component(Dir(vec![("b.txt", "two")]))],
	);

	let entries = browse(&binding, VPath::new("")).unwrap();
	let mut names: Vec<&str> = entries.iter().map(Entry::name).collect();
	names.sort_unstable();
	assert_eq!(names, vec!["a.txt", "b.txt"]);
}

#[test]
fn browse_tolerates_one_directory_not_found() {
	let binding = MountBinding::new(
		VPathBuf::root(),
		vec![component(Dir(vec![("a.txt", "one")]))],
	);

	let entries = browse(&binding, VPath::new("sub")).unwrap_err();
	assert_eq!(entries.kind(), crate::error::Kind::DirectoryNotFound);
}

#[test]
fn get_entry_returns_none_when_absent_everywhere() {
	let binding = MountBinding::new(VPathBuf::root(), vec![component(Dir(vec![("a.txt", "one")]))]);
	assert!(get_entry(&binding, VPath::new("missing.txt")).unwrap().is_none());
}

#[test]
fn delete_routes_to_first_supporting_component() {
	let binding = MountBinding::new(
		VPathBuf::root(),
		vec![component(AlwaysNotSupported), component(Dir(vec![("a.txt", "one")]))],
	);

	delete(&binding, VPath::new("a.txt"), false).unwrap();
}

#[test]
fn delete_surfaces_not_found_only_after_every_component_fails() {
	let binding = MountBinding::new(VPathBuf::root(), vec![component(Dir(vec![("a.txt", "one")]))]);

	let err = delete(&binding, VPath::new("missing.txt"), false).unwrap_err();
	assert_eq!(err.kind(), crate::error::Kind::FileNotFound);
}

#[test]
fn delete_is_not_supported_when_no_component_supports_it() {
	let binding = MountBinding::new(VPathBuf::root(), vec![component(AlwaysNotSupported)]);

	let err = delete(&binding, VPath::new("a.txt"), false).unwrap_err();
	assert_eq!(err.kind(), crate::error::Kind::NotSupported);
}
