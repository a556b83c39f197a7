use std::{net::SocketAddr, sync::Arc};

use axum::{
	Router,
	body::Body,
	extract::State,
	http::{
		HeaderMap, Request, StatusCode,
		header::{AUTHORIZATION, WWW_AUTHENTICATE},
	},
	middleware::{self, Next},
	response::{IntoResponse, Response},
};
use color_eyre::Result;
use rmcp::{
	ErrorData, ServerHandler,
	handler::server::router::tool::ToolRouter,
	model::{CallToolResult, JsonObject, ServerCapabilities, ServerInfo},
	transport::streamable_http_server::{
		StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
	},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::net::TcpListener;

use crate::McpAuthState;
use nlm_research::{
	Error, ImportResearchRequest, PollResearchRequest, ResearchService, StartResearchRequest,
};

#[derive(Clone)]
struct NlmMcp {
	service: Arc<ResearchService>,
	tool_router: ToolRouter<Self>,
}
impl NlmMcp {
	fn new(service: Arc<ResearchService>) -> Self {
		Self { service, tool_router: Self::tool_router() }
	}
}

#[rmcp::tool_router]
impl NlmMcp {
	#[rmcp::tool(
		name = "research_start",
		description = "Start a research job in a notebook. Returns the task id and query to poll with.",
		input_schema = research_start_schema()
	)]
	async fn research_start(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let req = parse_params::<StartResearchRequest>(params)?;

		tool_result(self.service.start_research(req).await)
	}

	#[rmcp::tool(
		name = "research_status",
		description = "Poll a research job until it completes, fails, disappears, or the wait budget runs out. Pass max_wait=0 to check once.",
		input_schema = research_status_schema()
	)]
	async fn research_status(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let req = parse_params::<PollResearchRequest>(params)?;

		tool_result(self.service.poll_research(req).await)
	}

	#[rmcp::tool(
		name = "research_import",
		description = "Import discovered sources of a completed research job into the notebook.",
		input_schema = research_import_schema()
	)]
	async fn research_import(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let req = parse_params::<ImportResearchRequest>(params)?;

		tool_result(self.service.import_research(req).await)
	}
}

#[rmcp::tool_handler]
impl ServerHandler for NlmMcp {
	fn get_info(&self) -> ServerInfo {
		ServerInfo {
			instructions: Some(
				"Research tools for a notebook service: start a job, poll it, then import its sources."
					.to_string(),
			),
			capabilities: ServerCapabilities::builder().enable_tools().build(),
			..Default::default()
		}
	}
}

pub async fn serve_mcp(
	bind_addr: &str,
	auth_state: McpAuthState,
	service: Arc<ResearchService>,
) -> Result<()> {
	let bind_addr: SocketAddr = bind_addr.parse()?;
	let session_manager: Arc<LocalSessionManager> = Default::default();
	let mcp_service = StreamableHttpService::new(
		move || Ok(NlmMcp::new(service.clone())),
		session_manager,
		StreamableHttpServerConfig::default(),
	);
	let router = Router::new()
		.fallback_service(mcp_service)
		.layer(middleware::from_fn_with_state(auth_state, require_bearer));
	let listener = TcpListener::bind(bind_addr).await?;

	tracing::info!(%bind_addr, "MCP server listening.");

	axum::serve(listener, router).await?;

	Ok(())
}

fn parse_params<T>(params: JsonObject) -> Result<T, ErrorData>
where
	T: DeserializeOwned,
{
	serde_json::from_value(Value::Object(params))
		.map_err(|err| ErrorData::invalid_params(format!("Invalid arguments: {err}"), None))
}

// Caller mistakes become protocol errors; failures on the remote side are reported as tool
// errors so the caller can decide whether to retry.
fn tool_result<T>(result: nlm_research::Result<T>) -> Result<CallToolResult, ErrorData>
where
	T: Serialize,
{
	match result {
		Ok(value) => {
			let value = serde_json::to_value(value).map_err(|err| {
				ErrorData::internal_error(format!("Failed to encode tool result: {err}"), None)
			})?;

			Ok(CallToolResult::structured(value))
		},
		Err(err @ (Error::Validation { .. } | Error::Precondition { .. })) =>
			Err(ErrorData::invalid_params(err.to_string(), None)),
		Err(err) => {
			tracing::warn!(kind = err.kind(), error = %err, "Research tool call failed.");

			Ok(CallToolResult::structured_error(serde_json::json!({
				"error": err.kind(),
				"message": err.to_string(),
			})))
		},
	}
}

fn research_start_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["notebook_id", "query"],
		"properties": {
			"notebook_id": { "type": "string" },
			"query": { "type": "string" },
			"mode": {
				"type": "string",
				"enum": ["fast-web", "deep-web", "fast-drive"],
				"default": "fast-web"
			}
		}
	}))
}

fn research_status_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["notebook_id"],
		"properties": {
			"notebook_id": { "type": "string" },
			"task_id": { "type": ["string", "null"] },
			"query": {
				"type": "string",
				"description": "Exact query text used to start the job. Used when the task id changes."
			},
			"max_wait": {
				"type": ["integer", "null"],
				"minimum": 0,
				"description": "Seconds to keep polling. 0 checks once."
			},
			"poll_interval": { "type": ["integer", "null"], "minimum": 1 }
		}
	}))
}

fn research_import_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["notebook_id", "task_id"],
		"properties": {
			"notebook_id": { "type": "string" },
			"task_id": { "type": "string" },
			"source_indices": {
				"type": ["array", "null"],
				"items": { "type": "integer" },
				"description": "Indices into discovered_sources. All sources when omitted."
			}
		}
	}))
}

fn admits(auth_state: &McpAuthState, headers: &HeaderMap) -> bool {
	let McpAuthState::StaticKeys { bearer_token } = auth_state else { return true };

	bearer_token_of(headers) == Some(bearer_token.as_str())
}

// The auth scheme is case-insensitive; the token itself is compared exactly.
fn bearer_token_of(headers: &HeaderMap) -> Option<&str> {
	let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
	let (scheme, token) = value.trim().split_once(' ')?;
	let token = token.trim();

	(scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

async fn require_bearer(
	State(auth_state): State<McpAuthState>,
	req: Request<Body>,
	next: Next,
) -> Response {
	if admits(&auth_state, req.headers()) {
		return next.run(req).await;
	}

	tracing::warn!(
		method = %req.method(),
		path = req.uri().path(),
		"Rejected MCP request without a valid bearer token."
	);

	unauthorized()
}

fn unauthorized() -> Response {
	(StatusCode::UNAUTHORIZED, [(WWW_AUTHENTICATE, "Bearer")], "Missing or invalid bearer token.")
		.into_response()
}
