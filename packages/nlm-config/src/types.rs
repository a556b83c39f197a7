use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub remote: Remote,
	pub auth: Auth,
	#[serde(default)]
	pub research: Research,
	pub security: Security,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub mcp_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Remote {
	pub base_url: String,
	pub build_label: String,
	#[serde(default = "default_language")]
	pub language: String,
	pub rpc_timeout_ms: u64,
	#[serde(default = "default_import_timeout_ms")]
	pub import_timeout_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Auth {
	pub cookie_header: String,
	pub csrf_token: Option<String>,
	pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Research {
	pub poll_interval_secs: u64,
	pub max_wait_secs: u64,
}
impl Default for Research {
	fn default() -> Self {
		Self { poll_interval_secs: 15, max_wait_secs: 300 }
	}
}

#[derive(Debug, Deserialize)]
pub struct Security {
	pub auth_mode: String,
	pub bearer_token: Option<String>,
}

fn default_language() -> String {
	"en".to_string()
}

fn default_import_timeout_ms() -> u64 {
	120_000
}
