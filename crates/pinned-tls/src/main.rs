use std::{fmt, path::PathBuf};

use clap::{Parser, Subcommand};
use lloggs::{LoggingArgs, PreArgs, WorkerGuard};
use miette::{IntoDiagnostic, Result, WrapErr, miette};
use pinned_tls::{
	CertSource, CertificateSummary, PinnedCertTrust, Properties, ResourcePath,
	connect::{connect, is_auth_error, parse_connection_url},
};
use tracing::debug;

/// Check and use TLS trust pinned to a single server certificate
#[derive(Clone, Parser)]
#[command(version)]
pub struct Args {
	#[command(flatten)]
	logging: LoggingArgs,

	/// Where the pinned certificate comes from
	///
	/// One of `file:<path>`, `classpath:<resource>`, `env:<VAR>`, `sys:<KEY>`,
	/// or the PEM text itself starting with `-----BEGIN CERTIFICATE-----`.
	#[arg(long, env = "PINNED_TLS_CERT", value_name = "SOURCE")]
	pub cert: String,

	/// Set a system property, readable with `sys:KEY`
	///
	/// Can be given multiple times.
	#[arg(short = 'D', long = "property", value_name = "KEY=VALUE", value_parser = parse_property)]
	pub properties: Vec<(String, String)>,

	/// Directory to search for `classpath:` resources
	///
	/// Can be given multiple times. Defaults to the directories listed in
	/// PINNED_TLS_RESOURCE_PATH.
	#[arg(long = "resource-path", value_name = "DIR")]
	pub resource_paths: Vec<PathBuf>,

	#[command(subcommand)]
	pub action: Action,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Action {
	/// Load the pinned certificate and print its details
	Inspect {
		/// Print as JSON
		#[arg(long)]
		json: bool,
	},

	/// Connect to PostgreSQL, trusting only the pinned certificate
	Probe {
		/// Connection URL
		///
		/// Example: postgresql://user@db.internal:5432/dbname
		#[arg(long, env = "DATABASE_URL")]
		url: String,

		/// Application name reported to the server
		#[arg(long, default_value = "pinned-tls")]
		application_name: String,
	},
}

// Never prints inline certificates or property values.
impl fmt::Debug for Args {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let cert = CertSource::parse(&self.cert)
			.map(|source| source.to_string())
			.unwrap_or_else(|_| "unrecognised".into());
		let property_keys: Vec<&str> = self
			.properties
			.iter()
			.map(|(key, _)| key.as_str())
			.collect();

		f.debug_struct("Args")
			.field("logging", &self.logging)
			.field("cert", &cert)
			.field("properties", &property_keys)
			.field("resource_paths", &self.resource_paths)
			.field("action", &self.action)
			.finish()
	}
}

fn parse_property(s: &str) -> std::result::Result<(String, String), String> {
	let (key, value) = s
		.split_once('=')
		.ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))?;
	if key.is_empty() {
		return Err("property key may not be empty".into());
	}
	Ok((key.into(), value.into()))
}

fn get_args() -> Result<(Args, WorkerGuard)> {
	let log_guard = PreArgs::parse().setup().map_err(|err| miette!("{err}"))?;

	debug!("parsing arguments");
	let args = Args::parse();

	let log_guard = match log_guard {
		Some(g) => g,
		None => args
			.logging
			.setup(|v| match v {
				0 => "pinned_tls=info",
				1 => "info,pinned_tls=debug",
				2 => "debug",
				3 => "debug,pinned_tls=trace",
				_ => "trace",
			})
			.map_err(|err| miette!("{err}"))?,
	};

	debug!(?args, "got arguments");
	Ok((args, log_guard))
}

fn print_summary(summary: &CertificateSummary) {
	println!("subject:     {}", summary.subject);
	println!("issuer:      {}", summary.issuer);
	println!("serial:      {}", summary.serial);
	println!("not before:  {}", summary.not_before);
	println!("not after:   {}", summary.not_after);
	println!("ca:          {}", summary.is_ca);
	println!("self-issued: {}", summary.self_issued);
	println!("sha256:      {}", summary.fingerprint);
}

#[tokio::main]
async fn main() -> Result<()> {
	let (args, _guard) = get_args()?;

	let properties = Properties::global();
	for (key, value) in &args.properties {
		properties.set(key, value);
	}

	let mut builder = PinnedCertTrust::builder(&args.cert);
	if !args.resource_paths.is_empty() {
		builder = builder.resources(ResourcePath::new(&args.resource_paths));
	}
	let trust = builder.build()?;

	match args.action {
		Action::Inspect { json } => {
			let summary = trust.certificate().summary();
			if json {
				println!(
					"{}",
					serde_json::to_string_pretty(summary).into_diagnostic()?
				);
			} else {
				print_summary(summary);
			}
		}
		Action::Probe {
			url,
			application_name,
		} => {
			let mut config = parse_connection_url(&url)?;
			let client = loop {
				match connect(&config, &trust, &application_name).await {
					Ok(client) => break client,
					Err(err) if is_auth_error(&err) && config.get_password().is_none() => {
						let password = rpassword::prompt_password("Password: ").into_diagnostic()?;
						config.password(password);
					}
					Err(err) => return Err(err),
				}
			};

			let row = client
				.query_one("SELECT version()", &[])
				.await
				.into_diagnostic()
				.wrap_err("querying server version")?;
			let version: String = row.get(0);
			println!(
				"connected, server certificate pinned to sha256:{}",
				trust.certificate().summary().fingerprint
			);
			println!("{version}");
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn property_parsing() {
		assert_eq!(
			parse_property("mydb_cert=abc=def").unwrap(),
			("mydb_cert".into(), "abc=def".into())
		);
		assert_eq!(
			parse_property("mydb_cert=").unwrap(),
			("mydb_cert".into(), String::new())
		);
		assert!(parse_property("mydb_cert").is_err());
		assert!(parse_property("=value").is_err());
	}

	#[test]
	fn args_parse() {
		let args = Args::try_parse_from([
			"pinned-tls",
			"--cert",
			"sys:mydb_cert",
			"-D",
			"mydb_cert=x",
			"inspect",
			"--json",
		])
		.unwrap();
		assert_eq!(args.cert, "sys:mydb_cert");
		assert_eq!(
			args.properties,
			vec![("mydb_cert".to_string(), "x".to_string())]
		);
		assert!(matches!(args.action, Action::Inspect { json: true }));
	}

	#[test]
	fn args_debug_hides_secrets() {
		let pem = "-----BEGIN CERTIFICATE-----\nTUlJQ3NlY3JldA==\n-----END CERTIFICATE-----\n";
		let args = Args::try_parse_from([
			"pinned-tls",
			"--cert",
			pem,
			"-D",
			"mydb_password=hunter2",
			"inspect",
		])
		.unwrap();

		let debug = format!("{args:?}");
		assert!(debug.contains("inline PEM"), "{debug}");
		assert!(debug.contains("mydb_password"), "{debug}");
		assert!(!debug.contains("TUlJQ3NlY3JldA"), "{debug}");
		assert!(!debug.contains("hunter2"), "{debug}");
	}
}
