use std::sync::Arc;

use rustls::{
	DigitallySignedStruct, SignatureScheme,
	client::{
		WebPkiServerVerifier,
		danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
	},
	crypto::CryptoProvider,
	pki_types::{CertificateDer, ServerName, UnixTime},
};
use tracing::{debug, trace};

use super::SingleAnchorStore;
use crate::{cert::PinnedCertificate, error::SecuritySetupError};

/// Accepts a server only if it presents the pinned certificate, or a chain
/// that verifies up to it under the usual WebPKI rules.
///
/// A peer presenting exactly the pinned certificate is trusted as-is: the
/// certificate is the anchor, so there is no chain left to check.
#[derive(Debug)]
pub struct PinnedServerVerifier {
	pinned: PinnedCertificate,
	webpki: Arc<WebPkiServerVerifier>,
}

impl PinnedServerVerifier {
	pub fn new(
		pinned: PinnedCertificate,
		store: SingleAnchorStore,
		provider: Arc<CryptoProvider>,
	) -> Result<Self, SecuritySetupError> {
		let webpki =
			WebPkiServerVerifier::builder_with_provider(Arc::new(store.into_roots()), provider)
				.build()?;
		Ok(Self { pinned, webpki })
	}
}

impl ServerCertVerifier for PinnedServerVerifier {
	fn verify_server_cert(
		&self,
		end_entity: &CertificateDer<'_>,
		intermediates: &[CertificateDer<'_>],
		server_name: &ServerName<'_>,
		ocsp_response: &[u8],
		now: UnixTime,
	) -> Result<ServerCertVerified, rustls::Error> {
		if self.pinned.matches(end_entity) {
			trace!(?server_name, "server presented the pinned certificate");
			return Ok(ServerCertVerified::assertion());
		}

		self.webpki
			.verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
			.inspect(|_| trace!(?server_name, "server chain verified up to the pinned certificate"))
			.inspect_err(|err| debug!(?server_name, "rejected server certificate: {err}"))
	}

	fn verify_tls12_signature(
		&self,
		message: &[u8],
		cert: &CertificateDer<'_>,
		dss: &DigitallySignedStruct,
	) -> Result<HandshakeSignatureValid, rustls::Error> {
		self.webpki.verify_tls12_signature(message, cert, dss)
	}

	fn verify_tls13_signature(
		&self,
		message: &[u8],
		cert: &CertificateDer<'_>,
		dss: &DigitallySignedStruct,
	) -> Result<HandshakeSignatureValid, rustls::Error> {
		self.webpki.verify_tls13_signature(message, cert, dss)
	}

	fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
		self.webpki.supported_verify_schemes()
	}
}

#[cfg(test)]
mod tests {
	use rcgen::{
		BasicConstraints, Certificate, CertificateParams, DnType, IsCa, KeyPair, KeyUsagePurpose,
	};

	use super::*;
	use crate::tls::crypto_provider;

	struct Ca {
		cert: Certificate,
		key: KeyPair,
	}

	fn ca(name: &str) -> Ca {
		let key = KeyPair::generate().unwrap();
		let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
		params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
		params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
		params.distinguished_name.push(DnType::CommonName, name);
		let cert = params.self_signed(&key).unwrap();
		Ca { cert, key }
	}

	fn leaf(name: &str, issuer: &Ca) -> Certificate {
		let key = KeyPair::generate().unwrap();
		let mut params = CertificateParams::new(vec![name.to_string()]).unwrap();
		params.distinguished_name.push(DnType::CommonName, name);
		params.signed_by(&key, &issuer.cert, &issuer.key).unwrap()
	}

	fn self_signed(name: &str) -> Certificate {
		let key = KeyPair::generate().unwrap();
		CertificateParams::new(vec![name.to_string()])
			.unwrap()
			.self_signed(&key)
			.unwrap()
	}

	fn verifier(pinned: &CertificateDer<'_>) -> PinnedServerVerifier {
		let pinned = PinnedCertificate::parse(pinned).unwrap();
		let store = SingleAnchorStore::new(&pinned).unwrap();
		PinnedServerVerifier::new(pinned, store, crypto_provider()).unwrap()
	}

	fn verify(
		verifier: &PinnedServerVerifier,
		chain: &[&CertificateDer<'static>],
		name: &'static str,
	) -> Result<ServerCertVerified, rustls::Error> {
		let (end_entity, intermediates) = chain.split_first().unwrap();
		let intermediates: Vec<CertificateDer<'static>> =
			intermediates.iter().map(|c| (*c).clone()).collect();
		verifier.verify_server_cert(
			end_entity,
			&intermediates,
			&ServerName::try_from(name).unwrap(),
			&[],
			UnixTime::now(),
		)
	}

	#[test]
	fn accepts_exact_pinned_certificate() {
		let cert = self_signed("db.example.com");
		let verifier = verifier(cert.der());
		assert!(verify(&verifier, &[cert.der()], "db.example.com").is_ok());
	}

	#[test]
	fn exact_match_does_not_depend_on_server_name() {
		let cert = self_signed("db.example.com");
		let verifier = verifier(cert.der());
		assert!(verify(&verifier, &[cert.der()], "10.1.2.3").is_ok());
	}

	#[test]
	fn rejects_other_self_signed_certificate() {
		let pinned = self_signed("db.example.com");
		let other = self_signed("db.example.com");
		let verifier = verifier(pinned.der());
		assert!(verify(&verifier, &[other.der()], "db.example.com").is_err());
	}

	#[test]
	fn rejects_certificate_from_unrelated_ca() {
		let pinned = self_signed("db.example.com");
		let public = ca("Some Public CA");
		let presented = leaf("db.example.com", &public);
		let verifier = verifier(pinned.der());
		assert!(verify(&verifier, &[presented.der(), public.cert.der()], "db.example.com").is_err());
	}

	#[test]
	fn accepts_chain_to_pinned_ca() {
		let pinned = ca("Private DB CA");
		let presented = leaf("db.example.com", &pinned);
		let verifier = verifier(pinned.cert.der());
		assert!(verify(&verifier, &[presented.der()], "db.example.com").is_ok());
	}

	#[test]
	fn chain_to_pinned_ca_checks_server_name() {
		let pinned = ca("Private DB CA");
		let presented = leaf("db.example.com", &pinned);
		let verifier = verifier(pinned.cert.der());
		assert!(verify(&verifier, &[presented.der()], "other.example.com").is_err());
	}

	#[test]
	fn advertises_signature_schemes() {
		let cert = self_signed("db.example.com");
		assert!(!verifier(cert.der()).supported_verify_schemes().is_empty());
	}
}
