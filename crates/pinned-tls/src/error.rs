use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while building a [`PinnedCertTrust`](crate::PinnedCertTrust).
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
	#[error(transparent)]
	#[diagnostic(transparent)]
	Configuration(#[from] ConfigurationError),

	#[error("reading certificate from {location}")]
	#[diagnostic(code(pinned_tls::io), help("check that the path exists and is readable"))]
	Io {
		location: String,
		#[source]
		source: std::io::Error,
	},

	#[error("certificate resource not found: {name}")]
	#[diagnostic(
		code(pinned_tls::resource_not_found),
		help("resources are searched for in the directories listed in PINNED_TLS_RESOURCE_PATH")
	)]
	ResourceNotFound { name: String },

	#[error(transparent)]
	#[diagnostic(transparent)]
	CertificateParse(#[from] CertificateParseError),

	#[error("an error occurred setting up TLS trust for the certificate")]
	#[diagnostic(code(pinned_tls::security_configuration))]
	SecurityConfiguration(#[from] SecuritySetupError),
}

/// Problems with the configuration string itself, or with the named value it points to.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigurationError {
	#[error("the certificate argument may not be empty")]
	#[diagnostic(code(pinned_tls::config::empty))]
	Empty,

	#[error(
		"the environment variable containing the server's SSL certificate must not be empty: {name}"
	)]
	#[diagnostic(code(pinned_tls::config::env_empty))]
	EnvEmpty { name: String },

	#[error(
		"the system property containing the server's SSL certificate must not be empty: {name}"
	)]
	#[diagnostic(
		code(pinned_tls::config::property_empty),
		help("system properties can be set with -D KEY=VALUE")
	)]
	PropertyEmpty { name: String },

	#[error(
		"the certificate argument must start with the prefix file:, classpath:, env:, sys:, or -----BEGIN CERTIFICATE-----"
	)]
	#[diagnostic(code(pinned_tls::config::unsupported))]
	Unsupported,
}

/// The certificate bytes did not decode to an X.509 certificate.
#[derive(Debug, Error, Diagnostic)]
pub enum CertificateParseError {
	#[error("no certificate data")]
	#[diagnostic(code(pinned_tls::certificate_parse::empty))]
	Empty,

	#[error("no CERTIFICATE section found in PEM data")]
	#[diagnostic(code(pinned_tls::certificate_parse::no_certificate))]
	NoPemCertificate,

	#[error("malformed PEM: {0}")]
	#[diagnostic(code(pinned_tls::certificate_parse::pem))]
	Pem(String),

	#[error("malformed X.509 certificate: {0}")]
	#[diagnostic(code(pinned_tls::certificate_parse::x509))]
	X509(String),
}

/// Failures from rustls while assembling the trust store, verifier, or TLS context.
#[derive(Debug, Error)]
pub enum SecuritySetupError {
	#[error("trust store: {0}")]
	TrustStore(#[source] rustls::Error),

	#[error("server verifier: {0}")]
	Verifier(#[from] rustls::server::VerifierBuilderError),

	#[error("tls context: {0}")]
	Context(#[source] rustls::Error),
}

/// Convenience type for Results in this crate.
pub type Result<T> = std::result::Result<T, Error>;
