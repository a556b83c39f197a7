use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
	Error, ResearchService, Result,
	task::{REMOTE_MODE_DEEP, ResearchMode, ResearchTask},
};
use nlm_rpc::{AuthChannel, RpcCall, RpcMethod};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StartResearchRequest {
	pub notebook_id: String,
	pub query: String,
	#[serde(default = "default_mode")]
	pub mode: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StartResearchResponse {
	pub task_id: String,
	pub query: String,
	pub mode: ResearchMode,
	pub report_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Launch {
	pub task: ResearchTask,
	pub report_id: Option<String>,
}
impl Launch {
	pub fn task_id(&self) -> &str {
		self.task.authoritative_id.as_deref().unwrap_or_default()
	}
}

impl ResearchService {
	pub async fn start_research(&self, req: StartResearchRequest) -> Result<StartResearchResponse> {
		let mode = req.mode.parse::<ResearchMode>()?;
		let launch = start(
			self.channel.as_ref(),
			&req.notebook_id,
			&req.query,
			mode,
			self.settings.rpc_timeout,
		)
		.await?;

		Ok(StartResearchResponse {
			task_id: launch.task_id().to_string(),
			query: launch.task.query.clone(),
			mode,
			report_id: launch.report_id,
		})
	}
}

pub async fn start(
	channel: &dyn AuthChannel,
	notebook_id: &str,
	query: &str,
	mode: ResearchMode,
	timeout: Duration,
) -> Result<Launch> {
	let notebook_id = notebook_id.trim();

	if notebook_id.is_empty() {
		return Err(Error::Validation { message: "notebook_id is required.".to_string() });
	}
	if query.trim().is_empty() {
		return Err(Error::Validation { message: "query is required.".to_string() });
	}

	let source_type = mode.source_type();
	let (method, params) = if mode.is_deep() {
		(
			RpcMethod::START_DEEP_RESEARCH,
			serde_json::json!([null, [1], [query, source_type], REMOTE_MODE_DEEP, notebook_id]),
		)
	} else {
		(
			RpcMethod::START_FAST_RESEARCH,
			serde_json::json!([[query, source_type], null, 1, notebook_id]),
		)
	};
	let call = RpcCall::new(method, params, timeout).for_notebook(notebook_id);
	let result = nlm_rpc::invoke(channel, &call).await.map_err(launch_error)?;
	let task_id = non_empty_str(result.get(0)).ok_or_else(|| Error::Remote {
		message: format!("{} returned no task id.", method.name),
	})?;
	let report_id = non_empty_str(result.get(1)).map(str::to_string);

	tracing::info!(notebook_id, task_id, mode = %mode, "Research task started.");

	Ok(Launch {
		task: ResearchTask::started(task_id.to_string(), query.to_string(), mode),
		report_id,
	})
}

fn default_mode() -> String {
	ResearchMode::FastWeb.as_str().to_string()
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
	value.and_then(Value::as_str).filter(|text| !text.is_empty())
}

// A start call that never produced a task surfaces as a remote failure; auth problems keep
// their own kind.
fn launch_error(err: nlm_rpc::Error) -> Error {
	match Error::from(err) {
		Error::Transport { message } => Error::Remote { message },
		other => other,
	}
}
