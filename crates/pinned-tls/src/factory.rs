use std::sync::Arc;

use rustls::ClientConfig;
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, instrument};

use crate::{
	cert::PinnedCertificate,
	error::{ConfigurationError, Error, Result},
	properties::Properties,
	source::{CertSource, Collaborators, ResourceLoader, ResourcePath},
	tls::make_client_config,
};

/// TLS client trust that accepts exactly one pre-shared server certificate.
///
/// Cheap to clone; every clone shares the same immutable configuration.
#[derive(Debug, Clone)]
pub struct PinnedCertTrust {
	certificate: Arc<PinnedCertificate>,
	config: Arc<ClientConfig>,
}

impl PinnedCertTrust {
	/// Build from a certificate argument, using the default resource loader
	/// and the process-wide property bag.
	///
	/// The argument is one of:
	/// - `file:<path>`
	/// - `classpath:<resource name>`
	/// - `env:<environment variable>`
	/// - `sys:<property name>`
	/// - inline PEM starting with `-----BEGIN CERTIFICATE-----`
	pub fn new(arg: &str) -> Result<Self> {
		Self::builder(arg).build()
	}

	/// Like [`new`](Self::new), for callers where the argument may be missing.
	pub fn from_arg(arg: Option<&str>) -> Result<Self> {
		Self::new(arg.ok_or(ConfigurationError::Empty)?)
	}

	pub fn builder(arg: impl Into<String>) -> PinnedCertTrustBuilder {
		PinnedCertTrustBuilder {
			arg: arg.into(),
			resources: None,
			properties: None,
		}
	}

	pub fn certificate(&self) -> &PinnedCertificate {
		&self.certificate
	}

	pub fn client_config(&self) -> Arc<ClientConfig> {
		self.config.clone()
	}

	/// A tokio-postgres TLS connector that trusts only the pinned certificate.
	pub fn make_tls_connect(&self) -> MakeRustlsConnect {
		MakeRustlsConnect::new((*self.config).clone())
	}
}

#[derive(Debug, Clone)]
pub struct PinnedCertTrustBuilder {
	arg: String,
	resources: Option<Arc<dyn ResourceLoader>>,
	properties: Option<Arc<Properties>>,
}

impl PinnedCertTrustBuilder {
	/// Resolve `classpath:` arguments with this loader instead of the default.
	pub fn resources(mut self, loader: impl ResourceLoader + 'static) -> Self {
		self.resources = Some(Arc::new(loader));
		self
	}

	/// Resolve `sys:` arguments against this bag instead of the global one.
	pub fn properties(mut self, properties: Arc<Properties>) -> Self {
		self.properties = Some(properties);
		self
	}

	#[instrument(level = "debug", skip(self))]
	pub fn build(self) -> Result<PinnedCertTrust> {
		if self.arg.is_empty() {
			return Err(ConfigurationError::Empty.into());
		}

		let source = CertSource::parse(&self.arg)?;
		let collaborators = Collaborators {
			resources: self
				.resources
				.unwrap_or_else(|| Arc::new(ResourcePath::from_env())),
			properties: self.properties.unwrap_or_else(Properties::global),
		};

		let certificate = {
			let mut stream = source.open(&collaborators)?;
			let bytes = stream.read_all().map_err(|source| Error::Io {
				location: stream.label().into(),
				source,
			})?;
			PinnedCertificate::parse(&bytes)?
		};

		let config = make_client_config(&certificate)?;
		debug!(
			subject = %certificate.summary().subject,
			fingerprint = %certificate.summary().fingerprint,
			"pinned certificate trust ready"
		);

		Ok(PinnedCertTrust {
			certificate: Arc::new(certificate),
			config: Arc::new(config),
		})
	}
}
