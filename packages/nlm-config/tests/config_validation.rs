use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use nlm_config::{Config, Error};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_toml_with(section: &str, key: &str, value: Value) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let table = root
		.as_table_mut()
		.expect("Template config must be a table.")
		.get_mut(section)
		.and_then(Value::as_table_mut)
		.expect("Template config must include the requested section.");

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render template config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("nlm_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_payload(payload: String) -> nlm_config::Result<Config> {
	let path = write_temp_config(payload);
	let result = nlm_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

fn expect_validation_message(payload: String, expected: &str) {
	let err = load_payload(payload).expect_err("Expected validation error.");

	assert!(matches!(err, Error::Validation { .. }), "Unexpected error kind: {err:?}");

	let message = err.to_string();

	assert!(message.contains(expected), "Unexpected error message: {message}");
}

#[test]
fn sample_config_loads_and_normalizes() {
	let cfg = load_payload(SAMPLE_CONFIG_TEMPLATE_TOML.to_string()).expect("Config must load.");

	assert_eq!(cfg.remote.base_url, "https://notebooklm.google.com");
	assert_eq!(cfg.auth.csrf_token.as_deref(), Some("csrf-token"));
	assert!(cfg.auth.session_id.is_none(), "Blank session_id must normalize to None.");
	assert_eq!(cfg.research.poll_interval_secs, 15);
	assert_eq!(cfg.research.max_wait_secs, 300);
}

#[test]
fn research_section_is_optional() {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");

	root.as_table_mut().expect("Template config must be a table.").remove("research");

	let payload = toml::to_string(&root).expect("Failed to render template config.");
	let cfg = load_payload(payload).expect("Config must load without [research].");

	assert_eq!(cfg.research.poll_interval_secs, 15);
	assert_eq!(cfg.research.max_wait_secs, 300);
}

#[test]
fn base_url_requires_http_scheme() {
	expect_validation_message(
		sample_toml_with("remote", "base_url", Value::String("notebooklm.google.com".to_string())),
		"remote.base_url must start with http:// or https://.",
	);
}

#[test]
fn rpc_timeout_must_be_positive() {
	expect_validation_message(
		sample_toml_with("remote", "rpc_timeout_ms", Value::Integer(0)),
		"remote.rpc_timeout_ms must be greater than zero.",
	);
}

#[test]
fn poll_interval_must_be_positive() {
	expect_validation_message(
		sample_toml_with("research", "poll_interval_secs", Value::Integer(0)),
		"research.poll_interval_secs must be greater than zero.",
	);
}

#[test]
fn cookie_header_requires_sid() {
	expect_validation_message(
		sample_toml_with("auth", "cookie_header", Value::String("HSID=abc; SSID=def".to_string())),
		"auth.cookie_header must contain a SID cookie.",
	);
}

#[test]
fn static_keys_requires_bearer_token() {
	expect_validation_message(
		sample_toml_with("security", "auth_mode", Value::String("static_keys".to_string())),
		"security.bearer_token is required",
	);
}

#[test]
fn unknown_auth_mode_is_rejected() {
	expect_validation_message(
		sample_toml_with("security", "auth_mode", Value::String("oauth".to_string())),
		"security.auth_mode must be one of off or static_keys, got oauth.",
	);
}

#[test]
fn missing_file_reports_read_error() {
	let mut path = env::temp_dir();

	path.push("nlm_config_test_missing_file.toml");

	let err = nlm_config::load(&path).expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }), "Unexpected error kind: {err:?}");
}
