//! # vfs-core
//!
//! A composable virtual filesystem: an arbitrary number of backends, each
//! mounted at a path, merged into one uniform tree. Reads fan out across
//! every Component mounted at (or above) a path and are unified into a
//! single answer; writes are routed to the first Component that can take
//! them. A path can carry more than one live backend at once (an
//! "Aggregating Mount Binding"), and change notifications are delivered
//! through a separate glob-filtered Observer Tree that doesn't require a
//! subtree to already be mounted before you can watch it.
//!
//! See [`Vfs`] for the entry point.

mod aggregate;
mod backend;
mod dispose;
mod entry;
mod error;
mod mount_tree;
mod observer;
mod path;
mod vfs;
mod writestream;

pub use self::backend::{AccessMode, Backend, BackendSubscription, Capabilities, OpenMode, Share, VfsStream};
pub use self::dispose::{Disposable, DisposalChain};
pub use self::entry::{Attributes, Entry, EntryKind};
pub use self::error::{Error, Kind, VfsResult};
pub use self::mount_tree::{Component, MountBinding, Options, PathMap};
pub use self::observer::{CollectScope, Event, ObserverHandle, ObserverId, Sink};
pub use self::path::{compile_glob, glob_intersect, glob_stem, normalize, rebase, GlobMatcher, VPath, VPathBuf};
pub use self::vfs::Vfs;
pub use self::writestream::WriteStreamWrapper;
