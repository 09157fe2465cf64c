use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::TempDir;
use vfs_core::{AccessMode, Attributes, Event, OpenMode, Share, VPath};

use super::*;

fn backend() -> (TempDir, LocalBackend) {
	let dir = TempDir::new().unwrap();
	let backend = LocalBackend::new(dir.path()).unwrap();
	(dir, backend)
}

#[test]
fn rejects_a_root_that_does_not_exist() {
	assert!(LocalBackend::new("/definitely/not/a/real/path/anywhere").is_err());
}

#[test]
fn write_then_read_round_trips_through_real_files() {
	let (_dir, backend) = backend();

	let mut stream = backend
		.open(VPath::new("a.txt"), OpenMode::Create, AccessMode::Write, Share::empty())
		.unwrap();
	stream.write(b"hello").unwrap();
	stream.close().unwrap();

	let mut stream = backend
		.open(VPath::new("a.txt"), OpenMode::Open, AccessMode::Read, Share::empty())
		.unwrap();
	let mut buf = [0u8; 16];
	let n = stream.read(&mut buf).unwrap();
	assert_eq!(&buf[..n], b"hello");
}

#[test]
fn browse_lists_directory_contents() {
	let (_dir, backend) = backend();
	backend.create_directory(VPath::new("sub")).unwrap();

	let mut stream = backend
		.open(VPath::new("sub/file.txt"), OpenMode::Create, AccessMode::Write, Share::empty())
		.unwrap();
	stream.write(b"x").unwrap();
	stream.close().unwrap();

	let entries = backend.browse(VPath::new("")).unwrap();
	assert!(entries.iter().any(|e| e.name() == "sub" && e.is_directory()));

	let nested = backend.browse(VPath::new("sub")).unwrap();
	assert_eq!(nested.len(), 1);
	assert_eq!(nested[0].name(), "file.txt");
	assert_eq!(nested[0].length(), 1);
}

#[test]
fn path_escape_above_root_is_rejected() {
	let (_dir, backend) = backend();
	let err = backend.resolve(VPath::new("../outside")).unwrap_err();
	assert_eq!(err.kind(), vfs_core::Kind::PathEscape);
}

#[test]
fn get_entry_reports_none_for_missing_path() {
	let (_dir, backend) = backend();
	assert!(backend.get_entry(VPath::new("missing.txt")).unwrap().is_none());
}

#[test]
fn set_attribute_read_only_is_reflected_by_metadata() {
	let (_dir, backend) = backend();

	let mut stream = backend
		.open(VPath::new("a.txt"), OpenMode::Create, AccessMode::Write, Share::empty())
		.unwrap();
	stream.write(b"x").unwrap();
	stream.close().unwrap();

	backend.set_attribute(VPath::new("a.txt"), Attributes::READ_ONLY).unwrap();
	let entry = backend.get_entry(VPath::new("a.txt")).unwrap().unwrap();
	assert!(entry.attributes().unwrap().contains(Attributes::READ_ONLY));

	// Undo so TempDir can clean up the directory on drop.
	let mut perms = std::fs::metadata(backend.resolve(VPath::new("a.txt")).unwrap())
		.unwrap()
		.permissions();
	perms.set_readonly(false);
	std::fs::set_permissions(backend.resolve(VPath::new("a.txt")).unwrap(), perms).unwrap();
}

#[test]
fn delete_nonempty_directory_without_recursive_fails() {
	let (_dir, backend) = backend();
	backend.create_directory(VPath::new("sub")).unwrap();

	let mut stream = backend
		.open(VPath::new("sub/a.txt"), OpenMode::Create, AccessMode::Write, Share::empty())
		.unwrap();
	stream.write(b"x").unwrap();
	stream.close().unwrap();

	assert!(backend.delete(VPath::new("sub"), false).is_err());
	backend.delete(VPath::new("sub"), true).unwrap();
	assert!(backend.get_entry(VPath::new("sub")).unwrap().is_none());
}

#[test]
fn move_entry_renames_the_real_file() {
	let (_dir, backend) = backend();

	let mut stream = backend
		.open(VPath::new("a.txt"), OpenMode::Create, AccessMode::Write, Share::empty())
		.unwrap();
	stream.write(b"content").unwrap();
	stream.close().unwrap();

	backend.move_entry(VPath::new("a.txt"), VPath::new("b.txt")).unwrap();
	assert!(backend.get_entry(VPath::new("a.txt")).unwrap().is_none());
	assert!(backend.get_entry(VPath::new("b.txt")).unwrap().is_some());
}

#[test]
fn observe_reports_a_create_after_the_watcher_settles() {
	let (_dir, backend) = backend();

	let events: Arc<Mutex<Vec<Event>>> = Arc::default();
	let events2 = Arc::clone(&events);
	let _sub = backend
		.observe("**", vfs_core::Sink::from_next(move |e| events2.lock().push(e)))
		.unwrap();

	// `notify`'s OS watcher needs a moment to register before events fire
	// reliably; the scenario tests elsewhere use `vfs-mem`'s synchronous
	// delivery instead precisely to avoid depending on this.
	std::thread::sleep(Duration::from_millis(100));

	let mut stream = backend
		.open(VPath::new("watched.txt"), OpenMode::Create, AccessMode::Write, Share::empty())
		.unwrap();
	stream.write(b"x").unwrap();
	stream.close().unwrap();

	std::thread::sleep(Duration::from_millis(500));

	let log = events.lock();
	assert!(log.iter().any(|e| matches!(e, Event::Create { path, .. } if path.as_str() == "watched.txt")));
}
