//! Where the pinned certificate comes from.
//!
//! The configuration string is matched against an ordered table of prefixes;
//! the first match decides the source. A string that matches no prefix but
//! starts with the PEM certificate marker is treated as inline PEM.

use std::{
	env, fmt,
	fs::File,
	io::{BufReader, Cursor},
	path::PathBuf,
	sync::Arc,
};

use tracing::debug;

use crate::{
	error::{ConfigurationError, Error, Result},
	properties::Properties,
};

pub use self::{
	resources::{EmbeddedResources, RESOURCE_PATH_VAR, ResourceLoader, ResourcePath},
	stream::{CertStream, ScopedStream},
};

mod resources;
mod stream;

pub const FILE_PREFIX: &str = "file:";
pub const CLASSPATH_PREFIX: &str = "classpath:";
pub const ENV_PREFIX: &str = "env:";
pub const SYS_PROP_PREFIX: &str = "sys:";
pub const PEM_MARKER: &str = "-----BEGIN CERTIFICATE-----";

/// Prefixed forms, checked in this order.
const PREFIXED: [(&str, fn(&str) -> CertSource); 4] = [
	(FILE_PREFIX, file),
	(CLASSPATH_PREFIX, resource),
	(ENV_PREFIX, env_var),
	(SYS_PROP_PREFIX, property),
];

fn file(rest: &str) -> CertSource {
	CertSource::File(PathBuf::from(rest))
}

fn resource(rest: &str) -> CertSource {
	CertSource::Resource(rest.into())
}

fn env_var(rest: &str) -> CertSource {
	CertSource::Env(rest.into())
}

fn property(rest: &str) -> CertSource {
	CertSource::Property(rest.into())
}

/// A resolved certificate location.
#[derive(Clone, PartialEq, Eq)]
pub enum CertSource {
	File(PathBuf),
	Resource(String),
	Env(String),
	Property(String),
	InlinePem(String),
}

impl CertSource {
	pub fn parse(arg: &str) -> std::result::Result<Self, ConfigurationError> {
		if arg.is_empty() {
			return Err(ConfigurationError::Empty);
		}

		if let Some(source) = PREFIXED
			.iter()
			.find_map(|(prefix, make)| arg.strip_prefix(prefix).map(make))
		{
			return Ok(source);
		}

		if arg.starts_with(PEM_MARKER) {
			return Ok(Self::InlinePem(arg.into()));
		}

		Err(ConfigurationError::Unsupported)
	}

	/// Open the certificate bytes for reading.
	///
	/// The returned stream closes its underlying reader when dropped.
	pub fn open(&self, collaborators: &Collaborators) -> Result<ScopedStream> {
		debug!(source = %self, "opening certificate source");
		let stream: Box<dyn CertStream> = match self {
			Self::File(path) => {
				let file = File::open(path).map_err(|source| Error::Io {
					location: self.to_string(),
					source,
				})?;
				Box::new(BufReader::new(file))
			}
			Self::Resource(name) => {
				if !collaborators.resources.exists(name) {
					return Err(Error::ResourceNotFound { name: name.clone() });
				}
				collaborators
					.resources
					.open(name)
					.map_err(|source| Error::Io {
						location: self.to_string(),
						source,
					})?
			}
			Self::Env(name) => {
				let value = lookup_env(name)
					.ok_or_else(|| ConfigurationError::EnvEmpty { name: name.clone() })?;
				Box::new(Cursor::new(value.into_bytes()))
			}
			Self::Property(name) => {
				let value = collaborators
					.properties
					.get(name)
					.filter(|value| !value.is_empty())
					.ok_or_else(|| ConfigurationError::PropertyEmpty { name: name.clone() })?;
				Box::new(Cursor::new(value.into_bytes()))
			}
			Self::InlinePem(pem) => Box::new(Cursor::new(pem.clone().into_bytes())),
		};

		Ok(ScopedStream::new(stream, self.to_string()))
	}
}

fn lookup_env(name: &str) -> Option<String> {
	// var() may panic on names the platform cannot represent
	if name.is_empty() || name.contains(['=', '\0']) {
		return None;
	}

	env::var(name).ok().filter(|value| !value.is_empty())
}

// Never prints certificate content or env/property values.
impl fmt::Display for CertSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::File(path) => write!(f, "{FILE_PREFIX}{}", path.display()),
			Self::Resource(name) => write!(f, "{CLASSPATH_PREFIX}{name}"),
			Self::Env(name) => write!(f, "{ENV_PREFIX}{name}"),
			Self::Property(name) => write!(f, "{SYS_PROP_PREFIX}{name}"),
			Self::InlinePem(_) => f.write_str("inline PEM"),
		}
	}
}

impl fmt::Debug for CertSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "CertSource({self})")
	}
}

/// External capabilities consulted while resolving a [`CertSource`].
#[derive(Debug, Clone)]
pub struct Collaborators {
	pub resources: Arc<dyn ResourceLoader>,
	pub properties: Arc<Properties>,
}
