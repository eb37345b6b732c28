//! TLS client trust pinned to one pre-shared certificate.
//!
//! Instead of trusting the system certificate authorities, a
//! [`PinnedCertTrust`] trusts exactly one certificate, loaded from a file, an
//! application resource, an environment variable, a process property, or
//! given inline as PEM. The resulting trust plugs into tokio-postgres as a TLS
//! connector, or into anything else that takes a rustls [`ClientConfig`].
//!
//! ```no_run
//! # async fn example() -> miette::Result<()> {
//! use pinned_tls::{PinnedCertTrust, connect};
//!
//! let trust = PinnedCertTrust::new("file:/etc/ssl/db-server.crt")?;
//! let config = connect::parse_connection_url("postgresql://app@db.internal/app")?;
//! let _client = connect::connect(&config, &trust, "my-app").await?;
//! # Ok(()) }
//! ```
//!
//! [`ClientConfig`]: rustls::ClientConfig

pub use cert::{CertificateSummary, PinnedCertificate};
pub use error::{CertificateParseError, ConfigurationError, Error, Result, SecuritySetupError};
pub use factory::{PinnedCertTrust, PinnedCertTrustBuilder};
pub use properties::Properties;
pub use source::{CertSource, EmbeddedResources, ResourceLoader, ResourcePath};

pub mod cert;
pub mod connect;
pub mod error;
mod factory;
pub mod properties;
pub mod source;
pub mod tls;
