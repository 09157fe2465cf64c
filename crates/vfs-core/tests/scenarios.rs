use std::sync::Arc;

use parking_lot::Mutex;
use vfs_core::{
	AccessMode, Backend, Component, Event, OpenMode, Options, Share, VPath, VfsStream,
};
use vfs_mem::MemBackend;

fn mem_with_files(files: &[&str]) -> Arc<MemBackend> {
	let backend = Arc::new(MemBackend::new());

	for file in files {
		let mut stream = backend
			.open(VPath::new(file), OpenMode::Create, AccessMode::Write, Share::empty())
			.unwrap();
		stream.write(file.as_bytes()).unwrap();
		stream.close().unwrap();
	}

	backend
}

fn component(backend: Arc<MemBackend>) -> Component {
	Component::new(backend, Options::new())
}

/// S1: an empty VFS reports an empty root.
#[test]
fn s1_empty_vfs_browse_of_root_is_empty() {
	let vfs = vfs_core::Vfs::new();
	assert_eq!(vfs.browse(VPath::new("")).unwrap(), vec![]);
}

/// S2: mounting a populated backend at a nested path surfaces virtual
/// intermediate directories and the backend's own entries.
#[test]
fn s2_mount_and_browse_reveals_virtual_and_real_entries() {
	let vfs = vfs_core::Vfs::new();
	let backend = mem_with_files(&["x.txt", "y.txt"]);
	vfs.mount(VPath::new("a/b"), vec![component(backend)]).unwrap();

	let root = vfs.browse(VPath::new("")).unwrap();
	assert_eq!(root.len(), 1);
	assert_eq!(root[0].name(), "a");
	assert!(root[0].is_directory());

	let a = vfs.browse(VPath::new("a")).unwrap();
	assert_eq!(a.len(), 1);
	assert_eq!(a[0].name(), "b");

	let mut ab = vfs.browse(VPath::new("a/b")).unwrap();
	ab.sort_by(|x, y| x.name().cmp(y.name()));
	assert_eq!(ab.len(), 2);
	assert_eq!(ab[0].name(), "x.txt");
	assert_eq!(ab[1].name(), "y.txt");
}

/// S3: two backends mounted at the same path unify into one listing, with
/// the higher-priority (index 0) backend's attributes winning on overlap.
#[test]
fn s3_overlay_unification_prefers_the_higher_priority_backend() {
	let vfs = vfs_core::Vfs::new();
	let m1 = mem_with_files(&["f1", "common"]);
	let m2 = mem_with_files(&["f2", "common"]);

	m1.set_attribute(VPath::new("common"), vfs_core::Attributes::READ_ONLY).unwrap();

	vfs.mount(VPath::new("z"), vec![component(Arc::clone(&m1)), component(Arc::clone(&m2))]).unwrap();

	let mut z = vfs.browse(VPath::new("z")).unwrap();
	z.sort_by(|x, y| x.name().cmp(y.name()));

	assert_eq!(z.len(), 3);
	let names: Vec<&str> = z.iter().map(|e| e.name()).collect();
	assert_eq!(names, vec!["common", "f1", "f2"]);

	let common = z.iter().find(|e| e.name() == "common").unwrap();
	assert_eq!(common.attributes(), Some(vfs_core::Attributes::READ_ONLY));
}

/// S4: mounting a populated backend while an observer is listening emits
/// Start before any mount-synthesized Create events, and one Create per
/// discovered entry (plus the mount point itself).
#[test]
fn s4_observer_synthesis_on_mount() {
	let vfs = vfs_core::Vfs::new();
	let events: Arc<Mutex<Vec<Event>>> = Arc::default();
	let events2 = Arc::clone(&events);
	let _handle = vfs.observe("**", vfs_core::Sink::from_next(move |e| events2.lock().push(e))).unwrap();

	let backend = mem_with_files(&["a.txt"]);
	vfs.mount(VPath::new("p"), vec![component(backend)]).unwrap();

	let log = events.lock();
	assert!(matches!(log[0], Event::Start { .. }));
	assert!(log.iter().any(|e| matches!(e, Event::Create { path, .. } if path.as_str() == "p")));
	assert!(log.iter().any(|e| matches!(e, Event::Create { path, .. } if path.as_str() == "p/a.txt")));

	let start_idx = log.iter().position(|e| matches!(e, Event::Start { .. })).unwrap();
	let p_idx = log.iter().position(|e| matches!(e, Event::Create { path, .. } if path.as_str() == "p")).unwrap();
	let file_idx = log.iter().position(|e| matches!(e, Event::Create { path, .. } if path.as_str() == "p/a.txt")).unwrap();
	assert!(start_idx < p_idx);
	assert!(p_idx <= file_idx);
}

/// S5: unmounting after S4 emits a Delete for every surviving entry plus
/// the mount point.
#[test]
fn s5_unmount_cleanup_emits_deletes() {
	let vfs = vfs_core::Vfs::new();
	let events: Arc<Mutex<Vec<Event>>> = Arc::default();
	let events2 = Arc::clone(&events);
	let _handle = vfs.observe("**", vfs_core::Sink::from_next(move |e| events2.lock().push(e))).unwrap();

	let backend = mem_with_files(&["a.txt"]);
	vfs.mount(VPath::new("p"), vec![component(backend)]).unwrap();
	events.lock().clear();

	vfs.unmount(VPath::new("p")).unwrap();

	let log = events.lock();
	assert!(log.iter().any(|e| matches!(e, Event::Delete { path, .. } if path.as_str() == "p/a.txt")));
	assert!(log.iter().any(|e| matches!(e, Event::Delete { path, .. } if path.as_str() == "p")));
}

/// S6: moving between two distinct mounted backends falls back to a
/// copy-then-delete transfer.
#[test]
fn s6_cross_backend_move_falls_back_to_transfer() {
	let vfs = vfs_core::Vfs::new();
	let m1 = mem_with_files(&["file"]);
	let m2 = Arc::new(MemBackend::new());

	vfs.mount(VPath::new("a"), vec![component(Arc::clone(&m1))]).unwrap();
	vfs.mount(VPath::new("b"), vec![component(Arc::clone(&m2))]).unwrap();

	vfs.move_path(VPath::new("a/file"), VPath::new("b/file")).unwrap();

	assert!(m1.get_entry(VPath::new("file")).unwrap().is_none());

	let mut stream = m2
		.open(VPath::new("file"), OpenMode::Open, AccessMode::Read, Share::empty())
		.unwrap();
	let mut buf = [0u8; 16];
	let n = stream.read(&mut buf).unwrap();
	assert_eq!(&buf[..n], b"file");
}
