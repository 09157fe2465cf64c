use std::sync::Arc;

use super::*;

#[test]
fn close_flushes_buffered_writes_to_the_callback() {
	let received: Arc<parking_lot::Mutex<Vec<u8>>> = Arc::default();
	let received2 = Arc::clone(&received);

	let mut stream = WriteStreamWrapper::new(move |body| {
		*received2.lock() = body;
		Ok(())
	});

	VfsStream::write(&mut stream, b"hello ").unwrap();
	VfsStream::write(&mut stream, b"world").unwrap();

	Box::new(stream).close().unwrap();
	assert_eq!(&*received.lock(), b"hello world");
}

#[test]
fn dropping_without_close_discards_the_buffer_instead_of_panicking() {
	let mut stream = WriteStreamWrapper::new(|_| Ok(()));
	VfsStream::write(&mut stream, b"lost").unwrap();
	drop(stream);
}
