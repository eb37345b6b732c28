use std::sync::Arc;

use rustls::{ClientConfig, RootCertStore, crypto::CryptoProvider};
use tracing::debug;
use uuid::Uuid;

use crate::{cert::PinnedCertificate, error::SecuritySetupError};

pub use verifier::PinnedServerVerifier;

mod verifier;

/// A freshly created trust store holding exactly one anchor.
///
/// Nothing can be added after construction.
#[derive(Debug)]
pub struct SingleAnchorStore {
	alias: Uuid,
	roots: RootCertStore,
}

impl SingleAnchorStore {
	pub fn new(certificate: &PinnedCertificate) -> Result<Self, SecuritySetupError> {
		let mut roots = RootCertStore::empty();
		roots
			.add(certificate.der().clone())
			.map_err(SecuritySetupError::TrustStore)?;

		let alias = Uuid::new_v4();
		debug!(%alias, fingerprint = %certificate.summary().fingerprint, "installed pinned trust anchor");
		Ok(Self { alias, roots })
	}

	pub(crate) fn into_roots(self) -> RootCertStore {
		debug!(alias = %self.alias, "sealing trust store");
		self.roots
	}
}

/// The crypto provider used for every pinned TLS context.
pub fn crypto_provider() -> Arc<CryptoProvider> {
	Arc::new(rustls::crypto::aws_lc_rs::default_provider())
}

/// Create a TLS client configuration that trusts only the pinned certificate
pub fn make_client_config(
	certificate: &PinnedCertificate,
) -> Result<ClientConfig, SecuritySetupError> {
	debug!("creating TLS client config with pinned certificate");

	let provider = crypto_provider();
	let store = SingleAnchorStore::new(certificate)?;
	let verifier = PinnedServerVerifier::new(certificate.clone(), store, provider.clone())?;

	let config = ClientConfig::builder_with_provider(provider)
		.with_safe_default_protocol_versions()
		.map_err(SecuritySetupError::Context)?
		.dangerous()
		.with_custom_certificate_verifier(Arc::new(verifier))
		.with_no_client_auth();

	Ok(config)
}
