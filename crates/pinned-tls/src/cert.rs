use aws_lc_rs::digest::{SHA256, digest};
use jiff::Timestamp;
use rustls::pki_types::{CertificateDer, pem::PemObject};
use serde::Serialize;
use tracing::debug;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::error::CertificateParseError;

/// DER-encoded data always starts with a SEQUENCE tag; PEM never does.
const DER_SEQUENCE: u8 = 0x30;

/// A single parsed X.509 certificate, ready to be installed as a trust anchor.
#[derive(Debug, Clone)]
pub struct PinnedCertificate {
	der: CertificateDer<'static>,
	summary: CertificateSummary,
}

/// Human-facing details of a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateSummary {
	pub subject: String,
	pub issuer: String,
	pub serial: String,
	pub not_before: Timestamp,
	pub not_after: Timestamp,
	pub is_ca: bool,
	pub self_issued: bool,
	/// Lowercase hex SHA-256 of the DER encoding.
	pub fingerprint: String,
}

impl PinnedCertificate {
	/// Parse the first certificate in `bytes`, PEM or DER.
	///
	/// Anything after the first certificate is ignored.
	pub fn parse(bytes: &[u8]) -> Result<Self, CertificateParseError> {
		if bytes.is_empty() {
			return Err(CertificateParseError::Empty);
		}

		let der = if bytes[0] == DER_SEQUENCE {
			debug!("parsing certificate as DER");
			CertificateDer::from(bytes.to_vec())
		} else {
			debug!("parsing certificate as PEM");
			CertificateDer::from_pem_slice(bytes).map_err(|err| match err {
				rustls::pki_types::pem::Error::NoItemsFound => {
					CertificateParseError::NoPemCertificate
				}
				err => CertificateParseError::Pem(format!("{err:?}")),
			})?
		};

		let (rest, cert) = X509Certificate::from_der(&der)
			.map_err(|err| CertificateParseError::X509(err.to_string()))?;
		if !rest.is_empty() {
			debug!(trailing = rest.len(), "ignoring data after the certificate");
		}

		let consumed = &der[..der.len() - rest.len()];
		let summary = CertificateSummary::new(&cert, consumed);
		debug!(subject = %summary.subject, fingerprint = %summary.fingerprint, "parsed certificate");

		Ok(Self {
			der: CertificateDer::from(consumed.to_vec()),
			summary,
		})
	}

	pub fn der(&self) -> &CertificateDer<'static> {
		&self.der
	}

	pub fn summary(&self) -> &CertificateSummary {
		&self.summary
	}

	/// Whether `other` is byte-for-byte this certificate.
	pub fn matches(&self, other: &CertificateDer<'_>) -> bool {
		self.der.as_ref() == other.as_ref()
	}
}

impl CertificateSummary {
	fn new(cert: &X509Certificate<'_>, der: &[u8]) -> Self {
		let validity = cert.validity();

		Self {
			subject: cert.subject().to_string(),
			issuer: cert.issuer().to_string(),
			serial: cert.raw_serial_as_string(),
			not_before: clamped_timestamp(validity.not_before.timestamp()),
			not_after: clamped_timestamp(validity.not_after.timestamp()),
			is_ca: cert.is_ca(),
			self_issued: cert.subject().as_raw() == cert.issuer().as_raw(),
			fingerprint: fingerprint(der),
		}
	}
}

/// X.509 allows dates up to 9999-12-31T23:59:59Z, slightly past what jiff represents.
fn clamped_timestamp(seconds: i64) -> Timestamp {
	Timestamp::from_second(seconds).unwrap_or(if seconds < 0 {
		Timestamp::MIN
	} else {
		Timestamp::MAX
	})
}

/// Lowercase hex SHA-256 of a DER-encoded certificate.
pub fn fingerprint(der: &[u8]) -> String {
	hex::encode(digest(&SHA256, der))
}
