//! The Disposal Chain (§4.6): a parent-child disposal graph shared by every
//! VFS, Binding, Observer Handle, and opened stream.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, VfsResult};

/// Something that can be torn down exactly once (idempotently).
pub trait Disposable: Send + Sync {
	fn dispose(&self) -> VfsResult<()>;
	fn is_disposed(&self) -> bool;
}

type DisposeAction = Box<dyn FnOnce() -> VfsResult<()> + Send>;

/// A disposal participant that can itself own child [`Disposable`]s and
/// dispose actions. In "non-disposable" mode (§2, used for library-global
/// singletons), `dispose()` drains everything registered but leaves the
/// chain usable afterwards instead of marking it permanently disposed.
pub struct DisposalChain {
	disposing: AtomicBool,
	disposed: AtomicBool,
	non_disposable: bool,
	children: Mutex<Vec<Arc<dyn Disposable>>>,
	actions: Mutex<Vec<DisposeAction>>,
}

impl DisposalChain {
	#[must_use]
	pub fn new() -> Self {
		Self::with_mode(false)
	}

	#[must_use]
	pub fn non_disposable() -> Self {
		Self::with_mode(true)
	}

	fn with_mode(non_disposable: bool) -> Self {
		Self {
			disposing: AtomicBool::new(false),
			disposed: AtomicBool::new(false),
			non_disposable,
			children: Mutex::new(Vec::new()),
			actions: Mutex::new(Vec::new()),
		}
	}

	#[must_use]
	pub fn is_disposed(&self) -> bool {
		self.disposed.load(Ordering::Acquire)
	}

	fn is_terminal(&self) -> bool {
		self.disposing.load(Ordering::Acquire) || self.disposed.load(Ordering::Acquire)
	}

	/// Registers `child` to be disposed when `self` is. If `self` is
	/// already disposing or disposed, `child` is disposed immediately
	/// instead of being recorded.
	pub fn add_disposable(&self, child: Arc<dyn Disposable>) {
		if self.is_terminal() {
			if let Err(e) = child.dispose() {
				log::error!("disposal of late-registered child failed: {e}");
			}

			return;
		}

		self.children.lock().push(Arc::clone(&child));

		// A dispose() on another thread may have run between the check
		// above and the push; recheck and undo if so.
		if self.is_terminal() {
			let mut children = self.children.lock();

			if let Some(pos) = children.iter().position(|c| Arc::ptr_eq(c, &child)) {
				children.remove(pos);
				drop(children);

				if let Err(e) = child.dispose() {
					log::error!("disposal of raced child failed: {e}");
				}
			}
		}
	}

	/// Registers a plain action (e.g. "close this file handle") to run at
	/// dispose time, with the same immediate-run-if-terminal behavior as
	/// [`Self::add_disposable`].
	pub fn add_action(&self, action: impl FnOnce() -> VfsResult<()> + Send + 'static) {
		if self.is_terminal() {
			if let Err(e) = action() {
				log::error!("disposal action run late failed: {e}");
			}

			return;
		}

		self.actions.lock().push(Box::new(action));
	}

	/// Runs every collected action and disposes every child, collecting
	/// failures into a single [`Error::aggregate`]. In non-disposable mode
	/// the chain is left usable (emptied, but able to accept new children
	/// and be disposed again later).
	pub fn dispose(&self) -> VfsResult<()> {
		if self.disposing.swap(true, Ordering::AcqRel) {
			return Ok(());
		}

		if self.disposed.load(Ordering::Acquire) {
			self.disposing.store(false, Ordering::Release);
			return Ok(());
		}

		let mut errors = Vec::new();

		let actions: Vec<_> = self.actions.lock().drain(..).collect();

		for action in actions {
			if let Err(e) = action() {
				errors.push(e);
			}
		}

		let children: Vec<_> = self.children.lock().drain(..).collect();

		for child in children {
			if let Err(e) = child.dispose() {
				errors.push(e);
			}
		}

		if self.non_disposable {
			self.disposing.store(false, Ordering::Release);
		} else {
			self.disposed.store(true, Ordering::Release);
			self.disposing.store(false, Ordering::Release);
		}

		if errors.is_empty() {
			Ok(())
		} else {
			Err(Error::aggregate(errors))
		}
	}
}

impl Default for DisposalChain {
	fn default() -> Self {
		Self::new()
	}
}
