//! The error taxonomy shared by the core and every reference backend.

use std::fmt;

use crate::VPathBuf;

/// The result type used throughout `vfs-core` and its reference backends.
pub type VfsResult<T> = Result<T, Error>;

/// A single raised error: a [`Kind`], the path it concerns (if any), and an
/// optional cause chain.
#[derive(Debug)]
pub struct Error {
	kind: Kind,
	path: Option<VPathBuf>,
	source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
	/// Populated only when `kind == Kind::Aggregate`.
	aggregated: Vec<Error>,
}

impl Error {
	#[must_use]
	pub fn new(kind: Kind) -> Self {
		Self {
			kind,
			path: None,
			source: None,
			aggregated: Vec::new(),
		}
	}

	#[must_use]
	pub fn with_path(mut self, path: impl Into<VPathBuf>) -> Self {
		self.path = Some(path.into());
		self
	}

	#[must_use]
	pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
		self.source = Some(Box::new(source));
		self
	}

	#[must_use]
	pub fn kind(&self) -> Kind {
		self.kind
	}

	#[must_use]
	pub fn path(&self) -> Option<&VPathBuf> {
		self.path.as_ref()
	}

	#[must_use]
	pub fn aggregated(&self) -> &[Error] {
		&self.aggregated
	}

	/// Used by unification/write-routing fan-out: does this error get
	/// swallowed (treated as "this Component doesn't have the answer") rather
	/// than propagated immediately?
	#[must_use]
	pub fn is_tolerated_during_fanout(&self) -> bool {
		matches!(
			self.kind,
			Kind::NotSupported | Kind::FileNotFound | Kind::DirectoryNotFound
		)
	}

	#[must_use]
	pub fn not_supported() -> Self {
		Self::new(Kind::NotSupported)
	}

	#[must_use]
	pub fn file_not_found() -> Self {
		Self::new(Kind::FileNotFound)
	}

	#[must_use]
	pub fn directory_not_found() -> Self {
		Self::new(Kind::DirectoryNotFound)
	}

	#[must_use]
	pub fn aggregate(errors: Vec<Error>) -> Self {
		Self {
			kind: Kind::Aggregate,
			path: None,
			source: None,
			aggregated: errors,
		}
	}
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.kind)?;

		if let Some(path) = &self.path {
			write!(f, " (path: `{path}`)")?;
		}

		if let Some(src) = &self.source {
			write!(f, ": {src}")?;
		}

		Ok(())
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		self.source
			.as_deref()
			.map(|e| e as &(dyn std::error::Error + 'static))
	}
}

/// The error taxonomy (§7 of the specification).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
	NotSupported,
	FileNotFound,
	DirectoryNotFound,
	Unauthorized,
	AlreadyExists,
	PathEscape,
	PathTooLong,
	InvalidPath,
	Canceled,
	Io,
	Aggregate,
	Disposed,
}

impl fmt::Display for Kind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::NotSupported => write!(f, "operation not supported by this backend"),
			Self::FileNotFound => write!(f, "no file found at the given path"),
			Self::DirectoryNotFound => write!(f, "no directory found at the given path"),
			Self::Unauthorized => write!(f, "permission denied"),
			Self::AlreadyExists => write!(f, "an entry already exists at the given path"),
			Self::PathEscape => write!(f, "path resolves outside the permitted root"),
			Self::PathTooLong => write!(f, "path exceeds an implementation limit"),
			Self::InvalidPath => write!(f, "path is syntactically invalid"),
			Self::Canceled => write!(f, "operation was canceled"),
			Self::Io => write!(f, "backend I/O failure"),
			Self::Aggregate => write!(f, "multiple errors occurred"),
			Self::Disposed => write!(f, "operation attempted on a disposed object"),
		}
	}
}

impl From<std::io::Error> for Error {
	fn from(value: std::io::Error) -> Self {
		let kind = match value.kind() {
			std::io::ErrorKind::NotFound => Kind::FileNotFound,
			std::io::ErrorKind::PermissionDenied => Kind::Unauthorized,
			std::io::ErrorKind::AlreadyExists => Kind::AlreadyExists,
			_ => Kind::Io,
		};

		Error::new(kind).with_source(value)
	}
}
