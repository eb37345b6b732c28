//! Application resource loaders, used by `classpath:` certificate sources.

use std::{
	borrow::Cow,
	collections::HashMap,
	env,
	ffi::OsStr,
	fmt,
	fs::File,
	io::{self, BufReader, Cursor},
	path::{Component, Path, PathBuf},
};

use tracing::{debug, trace};

use super::stream::CertStream;

/// Environment variable listing the directories searched by [`ResourcePath::from_env`].
pub const RESOURCE_PATH_VAR: &str = "PINNED_TLS_RESOURCE_PATH";

/// Locates named resources bundled with, or shipped alongside, the application.
///
/// Callers must check [`exists`](ResourceLoader::exists) before calling
/// [`open`](ResourceLoader::open).
pub trait ResourceLoader: fmt::Debug + Send + Sync {
	fn exists(&self, name: &str) -> bool;

	fn open(&self, name: &str) -> io::Result<Box<dyn CertStream>>;
}

/// Searches an ordered list of directories; the first directory containing the resource wins.
///
/// Resource names are relative paths. Absolute names and names that would
/// escape the search directories (`..`) never resolve.
#[derive(Debug, Clone, Default)]
pub struct ResourcePath {
	roots: Vec<PathBuf>,
}

impl ResourcePath {
	pub fn new(roots: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
		Self {
			roots: roots.into_iter().map(Into::into).collect(),
		}
	}

	/// Read the search directories from [`RESOURCE_PATH_VAR`], in platform path-list syntax.
	pub fn from_env() -> Self {
		Self::from_path_list(env::var_os(RESOURCE_PATH_VAR).as_deref())
	}

	fn from_path_list(list: Option<&OsStr>) -> Self {
		let roots: Vec<PathBuf> = list
			.map(|list| {
				env::split_paths(list)
					.filter(|path| !path.as_os_str().is_empty())
					.collect()
			})
			.unwrap_or_default();
		debug!(?roots, "resource search path");
		Self { roots }
	}

	pub fn roots(&self) -> &[PathBuf] {
		&self.roots
	}

	fn find(&self, name: &str) -> Option<PathBuf> {
		let name = Path::new(name);
		if name.as_os_str().is_empty()
			|| !name
				.components()
				.all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
		{
			trace!(?name, "resource name is not a plain relative path");
			return None;
		}

		self.roots
			.iter()
			.map(|root| root.join(name))
			.find(|candidate| candidate.is_file())
	}
}

impl ResourceLoader for ResourcePath {
	fn exists(&self, name: &str) -> bool {
		self.find(name).is_some()
	}

	fn open(&self, name: &str) -> io::Result<Box<dyn CertStream>> {
		let path = self.find(name).ok_or_else(|| {
			io::Error::new(io::ErrorKind::NotFound, format!("no resource named {name}"))
		})?;
		debug!(?path, "opening resource");
		Ok(Box::new(BufReader::new(File::open(path)?)))
	}
}

/// Resources held in memory, typically `include_bytes!` data compiled into the binary.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedResources {
	entries: HashMap<String, Cow<'static, [u8]>>,
}

impl EmbeddedResources {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, name: impl Into<String>, data: impl Into<Cow<'static, [u8]>>) {
		self.entries.insert(name.into(), data.into());
	}

	pub fn with(mut self, name: impl Into<String>, data: impl Into<Cow<'static, [u8]>>) -> Self {
		self.insert(name, data);
		self
	}
}

impl ResourceLoader for EmbeddedResources {
	fn exists(&self, name: &str) -> bool {
		self.entries.contains_key(name)
	}

	fn open(&self, name: &str) -> io::Result<Box<dyn CertStream>> {
		match self.entries.get(name) {
			Some(Cow::Borrowed(data)) => Ok(Box::new(Cursor::new(*data))),
			Some(Cow::Owned(data)) => Ok(Box::new(Cursor::new(data.clone()))),
			None => Err(io::Error::new(
				io::ErrorKind::NotFound,
				format!("no embedded resource named {name}"),
			)),
		}
	}
}
