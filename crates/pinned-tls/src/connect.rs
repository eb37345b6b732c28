use std::str::FromStr;

use miette::{IntoDiagnostic, Report, Result, WrapErr};
use tokio_postgres::{
	Client, Config,
	config::{Host, SslMode},
	error::DbError,
};
use tracing::{debug, warn};

use crate::PinnedCertTrust;

/// Check if an error, or anything in its chain, is an authentication error
pub fn is_auth_error(error: &Report) -> bool {
	error.chain().any(|err| {
		if let Some(db_error) = err.downcast_ref::<DbError>() {
			// 28000 - invalid_authorization_specification
			// 28P01 - invalid_password
			let code = db_error.code().code();
			return code == "28000" || code == "28P01";
		}

		let message = err.to_string();
		message.contains("password authentication failed")
			|| message.contains("no password supplied")
			|| message.contains("authentication failed")
	})
}

/// Parse a connection URL, forcing TLS on.
///
/// A pinned certificate is pointless without TLS, so `sslmode=disable` and
/// `sslmode=prefer` are both upgraded to `require`.
pub fn parse_connection_url(url: &str) -> Result<Config> {
	let mut config = Config::from_str(url)
		.into_diagnostic()
		.wrap_err("parsing connection string")?;

	if config.get_ssl_mode() != SslMode::Require {
		debug!(from = ?config.get_ssl_mode(), "upgrading SSL mode to require");
		config.ssl_mode(SslMode::Require);
	}

	if config
		.get_hosts()
		.iter()
		.any(|host| !matches!(host, Host::Tcp(_)))
	{
		warn!("unix socket hosts never use TLS; the pinned certificate only applies to TCP hosts");
	}

	Ok(config)
}

/// Connect to PostgreSQL trusting only the pinned certificate.
///
/// The connection is driven on a spawned task; the returned client has
/// already answered a trivial query.
pub async fn connect(
	config: &Config,
	trust: &PinnedCertTrust,
	application_name: &str,
) -> Result<Client> {
	let mut config = config.clone();
	config.application_name(application_name);

	debug!(fingerprint = %trust.certificate().summary().fingerprint, "connecting with pinned TLS");
	let (client, connection) = config
		.connect(trust.make_tls_connect())
		.await
		.inspect_err(|err| {
			if let Some(db_err) = err.as_db_error() {
				debug!(
					"E{code} at {func} in {file}:{line}",
					code = db_err.code().code(),
					func = db_err.routine().unwrap_or("{unknown}"),
					file = db_err.file().unwrap_or("unknown.c"),
					line = db_err.line().unwrap_or(0)
				);
			}
		})
		.into_diagnostic()
		.wrap_err("connecting to the database")?;

	tokio::spawn(async move {
		if let Err(err) = connection.await {
			warn!("connection error: {err}");
		}
	});

	client
		.simple_query("SELECT 1")
		.await
		.into_diagnostic()
		.wrap_err("checking connection")?;

	Ok(client)
}

#[cfg(test)]
mod tests {
	use miette::miette;

	use super::*;

	#[test]
	fn parse_forces_tls() {
		for url in [
			"postgresql://localhost/test",
			"postgresql://localhost/test?sslmode=disable",
			"postgresql://localhost/test?sslmode=prefer",
			"postgresql://localhost/test?sslmode=require",
		] {
			let config = parse_connection_url(url).unwrap();
			assert_eq!(config.get_ssl_mode(), SslMode::Require, "{url}");
		}
	}

	#[test]
	fn parse_error_is_reported() {
		let err = parse_connection_url("postgresql://localhost/test?sslmode=bogus").unwrap_err();
		assert!(format!("{err:?}").contains("parsing connection string"));
	}

	#[test]
	fn auth_errors_by_message() {
		assert!(is_auth_error(&miette!(
			"password authentication failed for user \"postgres\""
		)));
		assert!(!is_auth_error(&miette!("connection refused")));
		assert!(is_auth_error(
			&miette!("no password supplied").wrap_err("connecting to the database")
		));
	}

	#[tokio::test]
	async fn connect_refused() {
		let key = rcgen::KeyPair::generate().unwrap();
		let cert = rcgen::CertificateParams::new(vec!["localhost".to_string()])
			.unwrap()
			.self_signed(&key)
			.unwrap();
		let trust = PinnedCertTrust::new(&cert.pem()).unwrap();

		let config = parse_connection_url("postgresql://postgres@127.0.0.1:1/test").unwrap();
		let err = connect(&config, &trust, "pinned-tls-test").await.unwrap_err();
		assert!(!is_auth_error(&err), "{err:?}");
	}
}
