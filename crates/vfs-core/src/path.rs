//! The Path Engine (§4.1): path normalization, rebasing, and the glob
//! grammar (`?`, `*`, `**`) used by observer filters and Component fan-out.

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::error::{Error, VfsResult};

/// A borrowed VFS path: `/`-separated, root is the empty string.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct VPath(str);

impl VPath {
	#[must_use]
	pub fn new<S: AsRef<str> + ?Sized>(s: &S) -> &VPath {
		// SAFETY: `VPath` is `#[repr(transparent)]` over `str`.
		unsafe { &*(s.as_ref() as *const str as *const VPath) }
	}

	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}

	#[must_use]
	pub fn is_root(&self) -> bool {
		self.0.is_empty()
	}

	/// Segments between `/`, skipping empty components (so `"a//b/"` yields
	/// `["a", "b"]`).
	pub fn components(&self) -> impl Iterator<Item = &str> {
		split(&self.0)
	}

	#[must_use]
	pub fn to_owned_path(&self) -> VPathBuf {
		VPathBuf(self.0.to_string())
	}

	/// `true` if `self` is `other`, or a descendant of it.
	#[must_use]
	pub fn is_ancestor_or_self_of(&self, other: &VPath) -> bool {
		if self.is_root() {
			return true;
		}

		let this = self.as_str();
		let that = other.as_str();

		that == this || that.starts_with(this) && that.as_bytes().get(this.len()) == Some(&b'/')
	}

	#[must_use]
	pub fn file_name(&self) -> Option<&str> {
		self.components().last()
	}

	#[must_use]
	pub fn parent(&self) -> Option<VPathBuf> {
		let mut comps: Vec<&str> = self.components().collect();

		if comps.is_empty() {
			return None;
		}

		comps.pop();
		Some(VPathBuf(comps.join("/")))
	}

	#[must_use]
	pub fn join(&self, segment: &str) -> VPathBuf {
		if self.is_root() {
			VPathBuf(segment.to_string())
		} else {
			VPathBuf(format!("{}/{}", self.0, segment))
		}
	}

	/// Joins `self` with a full relative path rather than a single segment.
	#[must_use]
	pub fn join_path(&self, other: &VPath) -> VPathBuf {
		if self.is_root() {
			other.to_owned_path()
		} else if other.is_root() {
			self.to_owned_path()
		} else {
			VPathBuf(format!("{}/{}", self.0, other.0))
		}
	}
}

impl fmt::Display for VPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.is_root() {
			write!(f, "/")
		} else {
			write!(f, "{}", self.0)
		}
	}
}

impl fmt::Debug for VPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "VPath({:?})", self.0)
	}
}

impl ToOwned for VPath {
	type Owned = VPathBuf;

	fn to_owned(&self) -> VPathBuf {
		self.to_owned_path()
	}
}

/// An owned VFS path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VPathBuf(String);

impl VPathBuf {
	#[must_use]
	pub fn root() -> Self {
		Self(String::new())
	}

	#[must_use]
	pub fn as_path(&self) -> &VPath {
		VPath::new(&self.0)
	}

	#[must_use]
	pub fn into_string(self) -> String {
		self.0
	}

	#[must_use]
	pub fn from_segments<I: IntoIterator<Item = S>, S: AsRef<str>>(segments: I) -> Self {
		let joined = segments
			.into_iter()
			.map(|s| s.as_ref().to_string())
			.collect::<Vec<_>>()
			.join("/");
		Self(joined)
	}
}

impl From<&str> for VPathBuf {
	fn from(value: &str) -> Self {
		Self(value.to_string())
	}
}

impl From<String> for VPathBuf {
	fn from(value: String) -> Self {
		Self(value)
	}
}

impl From<&VPath> for VPathBuf {
	fn from(value: &VPath) -> Self {
		value.to_owned_path()
	}
}

impl Deref for VPathBuf {
	type Target = VPath;

	fn deref(&self) -> &VPath {
		self.as_path()
	}
}

impl Borrow<VPath> for VPathBuf {
	fn borrow(&self) -> &VPath {
		self.as_path()
	}
}

impl AsRef<VPath> for VPathBuf {
	fn as_ref(&self) -> &VPath {
		self.as_path()
	}
}

impl fmt::Display for VPathBuf {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(self.as_path(), f)
	}
}

/// Splits a raw path string into its non-empty segments.
pub fn split(path: &str) -> impl Iterator<Item = &str> {
	path.split('/').filter(|s| !s.is_empty())
}

/// Resolves `.` and `..` relative to root. Fails with
/// [`Kind::DirectoryNotFound`](crate::error::Kind::DirectoryNotFound) if a
/// `..` would climb above root.
pub fn normalize(path: &str) -> VfsResult<VPathBuf> {
	let mut stack: Vec<&str> = Vec::new();

	for seg in split(path) {
		match seg {
			"." => continue,
			".." => {
				if stack.pop().is_none() {
					return Err(Error::directory_not_found().with_path(VPathBuf::from(path)));
				}
			}
			other => stack.push(other),
		}
	}

	Ok(VPathBuf(stack.join("/")))
}

/// Given a path known to live under `from_base`, produces the equivalent
/// path rebased under `to_base`.
pub fn rebase(from_base: &VPath, to_base: &VPath, path: &VPath) -> VfsResult<VPathBuf> {
	if !from_base.is_ancestor_or_self_of(path) {
		return Err(Error::directory_not_found().with_path(path.to_owned_path()));
	}

	let suffix: Vec<&str> = path.components().skip(from_base.components().count()).collect();

	if to_base.is_root() {
		Ok(VPathBuf(suffix.join("/")))
	} else if suffix.is_empty() {
		Ok(to_base.to_owned_path())
	} else {
		Ok(VPathBuf(format!("{}/{}", to_base.as_str(), suffix.join("/"))))
	}
}

/// A compiled glob pattern, per the separator-aware grammar of §4.1:
/// `?` matches one non-separator character, `*` matches any run of
/// non-separator characters within one segment, `**` matches any run of
/// characters including `/`.
#[derive(Debug, Clone)]
pub struct GlobMatcher {
	pattern: String,
	accept_all: bool,
	regex: Option<std::sync::Arc<Regex>>,
}

impl GlobMatcher {
	#[must_use]
	pub fn pattern(&self) -> &str {
		&self.pattern
	}

	#[must_use]
	pub fn is_match(&self, path: &VPath) -> bool {
		if self.accept_all {
			return true;
		}

		self.regex
			.as_ref()
			.expect("non-accept-all matcher always has a compiled regex")
			.is_match(path.as_str())
	}
}

impl PartialEq for GlobMatcher {
	fn eq(&self, other: &Self) -> bool {
		self.pattern == other.pattern
	}
}

/// Compiles a glob pattern into a [`GlobMatcher`].
pub fn compile_glob(pattern: &str) -> VfsResult<GlobMatcher> {
	if pattern == "**" {
		return Ok(GlobMatcher {
			pattern: pattern.to_string(),
			accept_all: true,
			regex: None,
		});
	}

	let regex_src = glob_to_regex_source(pattern);

	let regex = Regex::new(&regex_src)
		.map_err(|_| Error::new(crate::error::Kind::InvalidPath).with_path(VPathBuf::from(pattern)))?;

	Ok(GlobMatcher {
		pattern: pattern.to_string(),
		accept_all: false,
		regex: Some(std::sync::Arc::new(regex)),
	})
}

fn glob_to_regex_source(pattern: &str) -> String {
	let mut out = String::from("^");
	let mut chars = pattern.chars().peekable();

	while let Some(c) = chars.next() {
		match c {
			'*' if chars.peek() == Some(&'*') => {
				chars.next();
				out.push_str(".*");
			}
			'*' => out.push_str("[^/]*"),
			'?' => out.push_str("[^/]"),
			'/' => out.push('/'),
			other => out.push_str(&regex::escape(&other.to_string())),
		}
	}

	out.push('$');
	out
}

/// The longest wildcard-free prefix of a glob pattern, terminating at the
/// last `/` before the first wildcard character.
#[must_use]
pub fn glob_stem(pattern: &str) -> VPathBuf {
	let first_wildcard = pattern.find(['?', '*']);

	let Some(idx) = first_wildcard else {
		return VPathBuf::from(pattern);
	};

	match pattern[..idx].rfind('/') {
		Some(slash) => VPathBuf::from(&pattern[..slash]),
		None => VPathBuf::root(),
	}
}

/// Returns a glob whose match set is exactly the intersection of `a` and
/// `b`'s match sets, or `None` if that intersection is empty.
///
/// Operates structurally over the segment grammar rather than by general
/// automaton intersection: in practice one side is always a literal mount
/// path (optionally suffixed with a trailing `**`) and the other an
/// arbitrary observer filter, so a segment-by-segment walk is exact for
/// every case the core itself produces.
#[must_use]
pub fn glob_intersect(a: &str, b: &str) -> Option<String> {
	let segs_a: Vec<&str> = split(a).collect();
	let segs_b: Vec<&str> = split(b).collect();
	let merged = intersect_segments(&segs_a, &segs_b)?;
	Some(merged.join("/"))
}

fn intersect_segments(a: &[&str], b: &[&str]) -> Option<Vec<String>> {
	if a.is_empty() && b.is_empty() {
		return Some(Vec::new());
	}

	// A pattern always intersects itself to itself, regardless of what it
	// matches; this also sidesteps the general `**`/`**` recursion below
	// producing an over-specific `**/**` merge for the identical case.
	if a == b {
		return Some(a.iter().map(|s| (*s).to_string()).collect());
	}

	if a.first() == Some(&"**") {
		for k in 0..=b.len() {
			if let Some(mut tail) = intersect_segments(&a[1..], &b[k..]) {
				let mut result: Vec<String> = b[..k].iter().map(|s| (*s).to_string()).collect();
				result.push("**".to_string());
				result.append(&mut tail);
				return Some(result);
			}
		}

		return None;
	}

	if b.first() == Some(&"**") {
		return intersect_segments(b, a);
	}

	if a.is_empty() || b.is_empty() {
		return None;
	}

	let seg = intersect_one_segment(a[0], b[0])?;
	let mut rest = intersect_segments(&a[1..], &b[1..])?;
	let mut result = vec![seg];
	result.append(&mut rest);
	Some(result)
}

fn intersect_one_segment(x: &str, y: &str) -> Option<String> {
	if x == y {
		return Some(x.to_string());
	}

	let x_literal = is_segment_wildcard_free(x);
	let y_literal = is_segment_wildcard_free(y);

	if x_literal && y_literal {
		return None;
	}

	if x_literal {
		return single_segment_regex(y).is_match(x).then(|| x.to_string());
	}

	if y_literal {
		return single_segment_regex(x).is_match(y).then(|| y.to_string());
	}

	if x == "*" {
		return Some(y.to_string());
	}

	if y == "*" {
		return Some(x.to_string());
	}

	None
}

fn is_segment_wildcard_free(seg: &str) -> bool {
	!seg.contains(['?', '*'])
}

fn single_segment_regex(seg: &str) -> Regex {
	static CACHE: OnceCell<parking_lot::Mutex<std::collections::HashMap<String, Regex>>> =
		OnceCell::new();
	let cache = CACHE.get_or_init(|| parking_lot::Mutex::new(std::collections::HashMap::new()));

	let mut guard = cache.lock();

	if let Some(re) = guard.get(seg) {
		return re.clone();
	}

	let mut out = String::from("^");

	for c in seg.chars() {
		match c {
			'*' => out.push_str("[^/]*"),
			'?' => out.push_str("[^/]"),
			other => out.push_str(&regex::escape(&other.to_string())),
		}
	}

	out.push('$');
	let re = Regex::new(&out).expect("single-segment glob always compiles");
	guard.insert(seg.to_string(), re.clone());
	re
}

#[cfg(test)]
mod test;
