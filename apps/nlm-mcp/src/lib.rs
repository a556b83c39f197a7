pub mod server;

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use clap::Parser;
use color_eyre::{
	Result,
	eyre::{self, WrapErr},
};
use tracing_subscriber::EnvFilter;

use nlm_config::{Config, Security};
use nlm_research::ResearchService;

#[derive(Debug, Parser)]
#[command(
	version = nlm_cli::VERSION,
	rename_all = "kebab",
	styles = nlm_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum McpAuthState {
	Off,
	StaticKeys { bearer_token: String },
}

pub async fn run(args: Args) -> Result<()> {
	let config = nlm_config::load(&args.config)?;

	init_tracing(&config);

	let auth_state = build_auth_state(&config.security, &config.service.mcp_bind)?;
	let service = ResearchService::from_config(&config)?;

	tracing::info!(
		base_url = %config.remote.base_url,
		build_label = %config.remote.build_label,
		"Research service configured."
	);

	server::serve_mcp(&config.service.mcp_bind, auth_state, Arc::new(service)).await
}

fn init_tracing(config: &Config) {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_auth_state(security: &Security, mcp_bind: &str) -> Result<McpAuthState> {
	match security.auth_mode.trim() {
		"off" => require_loopback_bind(mcp_bind).map(|()| McpAuthState::Off),
		"static_keys" => match security.bearer_token.as_deref().map(str::trim) {
			Some(token) if !token.is_empty() =>
				Ok(McpAuthState::StaticKeys { bearer_token: token.to_string() }),
			_ => Err(eyre::eyre!("static_keys auth needs a non-blank security.bearer_token.")),
		},
		other => Err(eyre::eyre!("Unsupported security.auth_mode for nlm-mcp, got {other}.")),
	}
}

fn require_loopback_bind(mcp_bind: &str) -> Result<()> {
	let addr = mcp_bind
		.parse::<SocketAddr>()
		.wrap_err_with(|| format!("service.mcp_bind {mcp_bind:?} is not a socket address."))?;

	eyre::ensure!(
		addr.ip().is_loopback(),
		"Refusing unauthenticated MCP on {addr}; bind a loopback address or use static_keys auth."
	);

	Ok(())
}

#[cfg(test)]
mod tests {
	use crate::{McpAuthState, build_auth_state};
	use nlm_config::Security;

	fn sample_security(auth_mode: &str, bearer_token: Option<&str>) -> Security {
		Security { auth_mode: auth_mode.to_string(), bearer_token: bearer_token.map(str::to_string) }
	}

	#[test]
	fn off_mode_requires_loopback_mcp_bind() {
		let err = build_auth_state(&sample_security("off", None), "0.0.0.0:9090")
			.expect_err("expected error");

		assert!(err.to_string().contains("loopback"), "unexpected error: {err}");
	}

	#[test]
	fn off_mode_reports_unparsable_mcp_bind() {
		let err = build_auth_state(&sample_security("off", None), "localhost")
			.expect_err("expected error");

		assert!(err.to_string().contains("not a socket address"), "unexpected error: {err}");
	}

	#[test]
	fn off_mode_accepts_loopback_mcp_bind() {
		let auth_state =
			build_auth_state(&sample_security("off", None), "127.0.0.1:9090").expect("auth state");

		assert_eq!(auth_state, McpAuthState::Off);
	}

	#[test]
	fn static_keys_mode_uses_configured_token() {
		let auth_state =
			build_auth_state(&sample_security("static_keys", Some(" token-1 ")), "0.0.0.0:9090")
				.expect("auth state");

		assert_eq!(auth_state, McpAuthState::StaticKeys { bearer_token: "token-1".to_string() });
	}

	#[test]
	fn static_keys_mode_rejects_blank_token() {
		let err = build_auth_state(&sample_security("static_keys", Some("  ")), "127.0.0.1:9090")
			.expect_err("expected error");

		assert!(err.to_string().contains("bearer_token"), "unexpected error: {err}");
	}

	#[test]
	fn unknown_mode_is_rejected() {
		let err = build_auth_state(&sample_security("oauth", None), "127.0.0.1:9090")
			.expect_err("expected error");

		assert!(err.to_string().contains("got oauth"), "unexpected error: {err}");
	}
}
