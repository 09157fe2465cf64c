use std::sync::Arc;

use tempfile::TempDir;
use vfs_core::{Component, EntryKind, Options, VPath, Vfs, VfsStream};
use vfs_local::LocalBackend;

fn mounted() -> (TempDir, Arc<Vfs>) {
	let dir = TempDir::new().unwrap();
	let backend = Arc::new(LocalBackend::new(dir.path()).unwrap());
	let vfs = Vfs::new();
	vfs.mount(VPath::new(""), vec![Component::new(backend, Options::new())]).unwrap();
	(dir, vfs)
}

#[test]
fn files_created_through_the_vfs_land_on_real_disk() {
	let (dir, vfs) = mounted();

	let mut stream = vfs
		.open(
			VPath::new("report.txt"),
			vfs_core::OpenMode::Create,
			vfs_core::AccessMode::Write,
			vfs_core::Share::empty(),
		)
		.unwrap();
	stream.write(b"results").unwrap();
	stream.close().unwrap();

	assert_eq!(std::fs::read(dir.path().join("report.txt")).unwrap(), b"results");

	let entries = vfs.browse(VPath::new("")).unwrap();
	assert!(entries.iter().any(|e| e.name() == "report.txt" && e.kind() == EntryKind::File));
}

#[test]
fn nested_directories_round_trip_through_the_vfs() {
	let (dir, vfs) = mounted();

	vfs.create_directory(VPath::new("a")).unwrap();
	vfs.create_directory(VPath::new("a/b")).unwrap();

	assert!(dir.path().join("a").join("b").is_dir());
	let entries = vfs.browse(VPath::new("a")).unwrap();
	assert_eq!(entries.len(), 1);
	assert_eq!(entries[0].name(), "b");

	vfs.delete(VPath::new("a"), true).unwrap();
	assert!(vfs.get_entry(VPath::new("a")).unwrap().is_none());
}
