use std::sync::Arc;

use url::Url;
use vfs_core::{Component, Options, VPath, Vfs, VfsStream};
use vfs_http::HttpBackend;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn vfs_reads_and_writes_through_the_http_mount() {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/data.txt"))
		.respond_with(ResponseTemplate::new(200).set_body_bytes(b"remote content".to_vec()))
		.mount(&server)
		.await;

	Mock::given(method("PUT"))
		.and(path("/new.txt"))
		.respond_with(ResponseTemplate::new(201))
		.mount(&server)
		.await;

	let base = Url::parse(&server.uri()).unwrap();

	tokio::task::spawn_blocking(move || {
		let backend = Arc::new(HttpBackend::new(base));
		let vfs = Vfs::new();
		vfs.mount(VPath::new(""), vec![Component::new(backend, Options::new())]).unwrap();

		let mut stream = vfs
			.open(
				VPath::new("data.txt"),
				vfs_core::OpenMode::Open,
				vfs_core::AccessMode::Read,
				vfs_core::Share::empty(),
			)
			.unwrap();
		let mut buf = [0u8; 32];
		let n = stream.read(&mut buf).unwrap();
		assert_eq!(&buf[..n], b"remote content");

		let mut stream = vfs
			.open(
				VPath::new("new.txt"),
				vfs_core::OpenMode::Create,
				vfs_core::AccessMode::Write,
				vfs_core::Share::empty(),
			)
			.unwrap();
		stream.write(b"fresh").unwrap();
		stream.close().unwrap();
	})
	.await
	.unwrap();
}

#[tokio::test]
async fn delete_routes_through_the_vfs_to_a_delete_request() {
	let server = MockServer::start().await;

	Mock::given(method("DELETE"))
		.and(path("/stale.txt"))
		.respond_with(ResponseTemplate::new(204))
		.mount(&server)
		.await;

	let base = Url::parse(&server.uri()).unwrap();

	tokio::task::spawn_blocking(move || {
		let backend = Arc::new(HttpBackend::new(base));
		let vfs = Vfs::new();
		vfs.mount(VPath::new(""), vec![Component::new(backend, Options::new())]).unwrap();

		vfs.delete(VPath::new("stale.txt"), false).unwrap();
	})
	.await
	.unwrap();
}
