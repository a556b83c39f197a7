use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::{
	Client, Response, StatusCode,
	header::{COOKIE, HeaderMap, HeaderValue, LOCATION},
	redirect::Policy,
};
use serde_json::Value;

use crate::{AuthChannel, BoxFuture, Credentials, Error, Result, RpcCall, batchexecute};

const SIGN_IN_HOST: &str = "accounts.google.com";
const REQID_STEP: u64 = 100_000;

pub struct BatchExecuteChannel {
	client: Client,
	endpoint: String,
	build_label: String,
	language: String,
	credentials: Credentials,
	reqid: AtomicU64,
}
impl BatchExecuteChannel {
	pub fn new(remote: &nlm_config::Remote, credentials: Credentials) -> Result<Self> {
		let base_url = remote.base_url.trim().trim_end_matches('/');

		if base_url.is_empty() {
			return Err(Error::InvalidConfig { message: "Remote base URL is empty.".to_string() });
		}

		let client = Client::builder()
			.redirect(Policy::none())
			.default_headers(default_headers(&credentials)?)
			.build()?;

		Ok(Self {
			client,
			endpoint: format!("{base_url}{}", batchexecute::ENDPOINT_PATH),
			build_label: remote.build_label.clone(),
			language: remote.language.clone(),
			credentials,
			reqid: AtomicU64::new(0),
		})
	}

	fn next_reqid(&self) -> u64 {
		self.reqid.fetch_add(REQID_STEP, Ordering::Relaxed) + REQID_STEP
	}

	fn query_params(&self, call: &RpcCall) -> Vec<(&'static str, String)> {
		let mut query = vec![
			("rpcids", call.method.id.to_string()),
			("source-path", call.source_path.clone().unwrap_or_else(|| "/".to_string())),
			("bl", self.build_label.clone()),
			("hl", self.language.clone()),
			("_reqid", self.next_reqid().to_string()),
			("rt", "c".to_string()),
		];

		if let Some(session_id) = self.credentials.session_id() {
			query.push(("f.sid", session_id.to_string()));
		}

		query
	}

	async fn execute(&self, call: &RpcCall) -> Result<Value> {
		let form = batchexecute::encode_request_form(
			call.method.id,
			&call.params,
			self.credentials.csrf_token(),
		)?;
		let response = self
			.client
			.post(&self.endpoint)
			.query(&self.query_params(call))
			.form(&form)
			.timeout(call.timeout)
			.send()
			.await?;
		let response = check_status(response, call)?;
		let body = response.text().await?;

		tracing::debug!(rpc = call.method.name, bytes = body.len(), "Batchexecute call completed.");

		batchexecute::decode_response(&body, call.method.id)
	}
}
impl AuthChannel for BatchExecuteChannel {
	fn call<'a>(&'a self, call: &'a RpcCall) -> BoxFuture<'a, Result<Value>> {
		Box::pin(self.execute(call))
	}
}

fn default_headers(credentials: &Credentials) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(COOKIE, HeaderValue::from_str(credentials.cookie_header())?);
	headers.insert("X-Same-Domain", HeaderValue::from_static("1"));

	Ok(headers)
}

fn check_status(response: Response, call: &RpcCall) -> Result<Response> {
	let status = response.status();

	if status.is_success() {
		return Ok(response);
	}
	if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
		return Err(Error::Auth {
			message: format!("{} was rejected with HTTP {status}.", call.method.name),
		});
	}
	if status.is_redirection() {
		let location =
			response.headers().get(LOCATION).and_then(|value| value.to_str().ok()).unwrap_or("");

		if location.contains(SIGN_IN_HOST) {
			return Err(Error::Auth {
				message: format!(
					"{} was redirected to the sign-in page; the cookies have expired.",
					call.method.name
				),
			});
		}
	}

	Err(Error::Transport { message: format!("{} returned HTTP {status}.", call.method.name) })
}
