use super::*;

#[test]
fn split_skips_empty_segments() {
	let segs: Vec<&str> = split("/a//b/c/").collect();
	assert_eq!(segs, vec!["a", "b", "c"]);
}

#[test]
fn normalize_resolves_dot_and_dotdot() {
	let p = normalize("a/./b/../c").unwrap();
	assert_eq!(p.as_str(), "a/c");
}

#[test]
fn normalize_rejects_escape_above_root() {
	let err = normalize("a/../../b").unwrap_err();
	assert_eq!(err.kind(), crate::error::Kind::DirectoryNotFound);
}

#[test]
fn normalize_root_is_empty() {
	let p = normalize("").unwrap();
	assert!(p.as_path().is_root());
}

#[test]
fn rebase_moves_a_path_between_bases() {
	let from = VPath::new("mnt/a");
	let to = VPath::new("other");
	let path = VPath::new("mnt/a/b/c.txt");

	let rebased = rebase(from, to, path).unwrap();
	assert_eq!(rebased.as_str(), "other/b/c.txt");
}

#[test]
fn rebase_to_root_strips_prefix() {
	let from = VPath::new("mnt/a");
	let to = VPath::new("");
	let path = VPath::new("mnt/a/b.txt");

	let rebased = rebase(from, to, path).unwrap();
	assert_eq!(rebased.as_str(), "b.txt");
}

#[test]
fn rebase_fails_when_not_under_base() {
	let from = VPath::new("mnt/a");
	let to = VPath::new("other");
	let path = VPath::new("mnt/b/c.txt");

	assert!(rebase(from, to, path).is_err());
}

#[test]
fn glob_question_mark_matches_one_char() {
	let m = compile_glob("a?c").unwrap();
	assert!(m.is_match(VPath::new("abc")));
	assert!(!m.is_match(VPath::new("ac")));
	assert!(!m.is_match(VPath::new("a/c")));
}

#[test]
fn glob_star_stays_within_segment() {
	let m = compile_glob("a/*.txt").unwrap();
	assert!(m.is_match(VPath::new("a/b.txt")));
	assert!(!m.is_match(VPath::new("a/b/c.txt")));
}

#[test]
fn glob_double_star_crosses_segments() {
	let m = compile_glob("a/**").unwrap();
	assert!(m.is_match(VPath::new("a/b/c/d.txt")));
	assert!(m.is_match(VPath::new("a")));
}

#[test]
fn glob_accept_all() {
	let m = compile_glob("**").unwrap();
	assert!(m.is_match(VPath::new("anything/at/all")));
	assert!(m.is_match(VPath::new("")));
}

#[test]
fn glob_stem_stops_before_wildcard() {
	assert_eq!(glob_stem("a/b/*.txt").as_str(), "a/b");
	assert_eq!(glob_stem("a/b/c").as_str(), "a/b/c");
	assert_eq!(glob_stem("*.txt").as_str(), "");
	assert_eq!(glob_stem("**").as_str(), "");
}

#[test]
fn glob_intersect_literal_with_wildcard() {
	let result = glob_intersect("a/b/c.txt", "a/*/c.txt").unwrap();
	assert_eq!(result, "a/b/c.txt");
}

#[test]
fn glob_intersect_is_commutative() {
	let a = "mnt/sub/**";
	let b = "mnt/sub/data/*.json";
	assert_eq!(glob_intersect(a, b), glob_intersect(b, a));
}

#[test]
fn glob_intersect_disjoint_literals_is_none() {
	assert!(glob_intersect("a/b.txt", "a/c.txt").is_none());
}

#[test]
fn glob_intersect_accept_all_yields_other() {
	assert_eq!(glob_intersect("**", "a/b/*.txt").unwrap(), "a/b/*.txt");
}

#[test]
fn glob_intersect_double_star_prefix() {
	let result = glob_intersect("mnt/**", "mnt/a/b.txt").unwrap();
	assert_eq!(result, "mnt/a/b.txt");
}

#[test]
fn glob_intersect_identical_accept_all_stays_accept_all() {
	let result = glob_intersect("**", "**").unwrap();
	assert_eq!(result, "**");
	assert!(compile_glob(&result).unwrap().is_match(VPath::new("a.txt")));
}
