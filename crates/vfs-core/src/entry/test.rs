use super::*;

#[test]
fn new_entry_derives_name_from_path() {
	let e = Entry::new(VPathBuf::from("a/b/c.txt"), EntryKind::File);
	assert_eq!(e.name(), "c.txt");
}

#[test]
fn root_entry_has_empty_name() {
	let e = Entry::new(VPathBuf::root(), EntryKind::Directory);
	assert_eq!(e.name(), "");
}

#[test]
fn unify_prefers_self_scalar_fields() {
	let a = Entry::new(VPathBuf::from("a.txt"), EntryKind::File).with_length(10);
	let b = Entry::new(VPathBuf::from("a.txt"), EntryKind::File).with_length(20);

	let unified = a.unify(b);
	assert_eq!(unified.length(), 10);
}

#[test]
fn unify_falls_back_when_self_lacks_a_field() {
	let a = Entry::new(VPathBuf::from("a.txt"), EntryKind::File);
	let b = Entry::new(VPathBuf::from("a.txt"), EntryKind::File).with_length(20);

	let unified = a.unify(b);
	assert_eq!(unified.length(), 20);
}

#[test]
fn unify_of_differing_kinds_becomes_file_and_directory() {
	let a = Entry::new(VPathBuf::from("x"), EntryKind::File);
	let b = Entry::new(VPathBuf::from("x"), EntryKind::Directory);

	let unified = a.unify(b);
	assert_eq!(unified.kind(), EntryKind::FileAndDirectory);
	assert!(unified.is_directory());
}
