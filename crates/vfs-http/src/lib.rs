//! A reference [`Backend`] (§4.10) over a plain HTTP(S) document tree.
//!
//! Reads are GETs, writes are PUTs fired when the returned stream is
//! closed (via the shared [`WriteStreamWrapper`](vfs_core::WriteStreamWrapper)),
//! deletes are DELETEs, and directory listing is a best-effort scan of
//! anchor `href`s in the fetched document — there is no standard HTTP
//! directory format, so this only goes as far as typical static-file-server
//! autoindex pages.

use std::io::Read as _;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client;
use url::Url;
use vfs_core::{
	AccessMode, Attributes, Backend, BackendSubscription, Capabilities, Entry, EntryKind, Error, Kind,
	OpenMode, Share, Sink, VPath, VfsResult, VfsStream, WriteStreamWrapper,
};

static HREF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)<a\s[^>]*href\s*=\s*["']([^"']+)["']"#).unwrap());

/// A backend mounted over a base URL; every VFS path is resolved relative
/// to it.
pub struct HttpBackend {
	client: Client,
	base: Url,
}

impl HttpBackend {
	#[must_use]
	pub fn new(base: Url) -> Self {
		Self::with_client(Client::new(), base)
	}

	#[must_use]
	pub fn with_client(client: Client, mut base: Url) -> Self {
		if !base.path().ends_with('/') {
			let mut path = base.path().to_string();
			path.push('/');
			base.set_path(&path);
		}

		Self { client, base }
	}

	fn url_for(&self, path: &VPath) -> VfsResult<Url> {
		if path.is_root() {
			return Ok(self.base.clone());
		}

		self.base
			.join(path.as_str())
			.map_err(|e| Error::new(Kind::InvalidPath).with_path(path.to_owned_path()).with_source(e))
	}

	fn dir_url_for(&self, path: &VPath) -> VfsResult<Url> {
		let mut url = self.url_for(path)?;

		if !url.path().ends_with('/') {
			let mut p = url.path().to_string();
			p.push('/');
			url.set_path(&p);
		}

		Ok(url)
	}
}

fn http_err(e: reqwest::Error) -> Error {
	Error::new(Kind::Io).with_source(e)
}

impl Backend for HttpBackend {
	fn capabilities(&self) -> Capabilities {
		Capabilities::BROWSE | Capabilities::GET_ENTRY | Capabilities::OPEN_READ | Capabilities::OPEN_WRITE | Capabilities::DELETE
	}

	fn browse(&self, path: &VPath) -> VfsResult<Vec<Entry>> {
		let dir_url = self.dir_url_for(path)?;

		let body = self
			.client
			.get(dir_url.clone())
			.send()
			.and_then(reqwest::blocking::Response::error_for_status)
			.map_err(http_err)?
			.text()
			.map_err(http_err)?;

		let mut out = Vec::new();

		for cap in HREF_RE.captures_iter(&body) {
			let href = &cap[1];

			if href.starts_with('#') || href.starts_with('?') {
				continue;
			}

			let Ok(joined) = dir_url.join(href) else {
				continue;
			};

			if joined.origin() != self.base.origin() {
				continue;
			}

			let Some(rel) = joined.as_str().strip_prefix(dir_url.as_str()) else {
				continue;
			};

			let is_dir = rel.ends_with('/');
			let rel = rel.trim_end_matches('/');

			if rel.is_empty() || rel.contains('/') {
				continue;
			}

			let child = path.join(rel);
			out.push(Entry::new(child, if is_dir { EntryKind::Directory } else { EntryKind::File }));
		}

		Ok(out)
	}

	fn get_entry(&self, path: &VPath) -> VfsResult<Option<Entry>> {
		let url = self.url_for(path)?;
		let response = self.client.head(url).send().map_err(http_err)?;

		if response.status() == reqwest::StatusCode::NOT_FOUND {
			return Ok(None);
		}

		let response = response.error_for_status().map_err(http_err)?;

		let length = response
			.headers()
			.get(reqwest::header::CONTENT_LENGTH)
			.and_then(|v| v.to_str().ok())
			.and_then(|v| v.parse::<i64>().ok())
			.unwrap_or(-1);

		Ok(Some(Entry::new(path.to_owned_path(), EntryKind::File).with_length(length)))
	}

	fn open(
		&self,
		path: &VPath,
		_mode: OpenMode,
		access: AccessMode,
		_share: Share,
	) -> VfsResult<Box<dyn VfsStream>> {
		let url = self.url_for(path)?;

		if access.wants_write() {
			let client = self.client.clone();

			return Ok(Box::new(WriteStreamWrapper::new(move |body| {
				client
					.put(url)
					.body(body)
					.send()
					.and_then(reqwest::blocking::Response::error_for_status)
					.map(|_| ())
					.map_err(http_err)
			})));
		}

		let response = self
			.client
			.get(url)
			.send()
			.and_then(reqwest::blocking::Response::error_for_status)
			.map_err(http_err)?;

		Ok(Box::new(ReadStream { response }))
	}

	fn delete(&self, path: &VPath, _recursive: bool) -> VfsResult<()> {
		let url = self.url_for(path)?;

		self.client
			.delete(url)
			.send()
			.and_then(reqwest::blocking::Response::error_for_status)
			.map(|_| ())
			.map_err(http_err)
	}

	fn set_attribute(&self, _path: &VPath, _attrs: Attributes) -> VfsResult<()> {
		Err(Error::not_supported())
	}

	fn observe(&self, _filter: &str, _sink: Sink) -> VfsResult<Box<dyn BackendSubscription>> {
		Err(Error::not_supported())
	}
}

struct ReadStream {
	response: reqwest::blocking::Response,
}

impl VfsStream for ReadStream {
	fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
		self.response.read(buf).map_err(|e| Error::new(Kind::Io).with_source(e))
	}
}
