mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Auth, Config, Remote, Research, Security, Service};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.mcp_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.mcp_bind must be non-empty.".to_string(),
		});
	}

	let base_url = cfg.remote.base_url.trim();

	if base_url.is_empty() {
		return Err(Error::Validation {
			message: "remote.base_url must be non-empty.".to_string(),
		});
	}
	if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
		return Err(Error::Validation {
			message: "remote.base_url must start with http:// or https://.".to_string(),
		});
	}
	if cfg.remote.build_label.trim().is_empty() {
		return Err(Error::Validation {
			message: "remote.build_label must be non-empty.".to_string(),
		});
	}

	for (label, value) in [
		("remote.rpc_timeout_ms", cfg.remote.rpc_timeout_ms),
		("remote.import_timeout_ms", cfg.remote.import_timeout_ms),
		("research.poll_interval_secs", cfg.research.poll_interval_secs),
	] {
		if value == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if !has_cookie(&cfg.auth.cookie_header, "SID") {
		return Err(Error::Validation {
			message: "auth.cookie_header must contain a SID cookie.".to_string(),
		});
	}

	match cfg.security.auth_mode.trim() {
		"off" => {},
		"static_keys" =>
			if cfg.security.bearer_token.is_none() {
				return Err(Error::Validation {
					message: "security.bearer_token is required when security.auth_mode=static_keys."
						.to_string(),
				});
			},
		other => {
			return Err(Error::Validation {
				message: format!(
					"security.auth_mode must be one of off or static_keys, got {other}."
				),
			});
		},
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.remote.base_url = cfg.remote.base_url.trim().trim_end_matches('/').to_string();

	for value in [
		&mut cfg.auth.csrf_token,
		&mut cfg.auth.session_id,
		&mut cfg.security.bearer_token,
	] {
		if value.as_deref().map(|raw| raw.trim().is_empty()).unwrap_or(false) {
			*value = None;
		}
	}
}

fn has_cookie(header: &str, name: &str) -> bool {
	header.split(';').any(|pair| {
		pair.split_once('=')
			.is_some_and(|(key, value)| key.trim() == name && !value.trim().is_empty())
	})
}

#[cfg(test)]
mod tests {
	use super::has_cookie;

	#[test]
	fn finds_exact_cookie_names_only() {
		let header = "HSID=abc; SSID=def; SID=ghi; APISID=jkl";

		assert!(has_cookie(header, "SID"));
		assert!(!has_cookie("HSID=abc; SSID=def", "SID"));
		assert!(!has_cookie("SID=; HSID=abc", "SID"));
	}
}
