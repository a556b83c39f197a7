use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
	Error, ResearchService, Result,
	task::{DiscoveredSource, RESULT_TYPE_WEB, ResearchTask},
};
use nlm_rpc::{AuthChannel, RpcCall, RpcMethod};

const UNTITLED: &str = "Untitled";
const MIME_DOCUMENT: &str = "application/vnd.google-apps.document";
const MIME_PRESENTATION: &str = "application/vnd.google-apps.presentation";
const MIME_SPREADSHEET: &str = "application/vnd.google-apps.spreadsheet";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImportResearchRequest {
	pub notebook_id: String,
	pub task_id: String,
	/// Positions in the task's discovered sources; all sources when absent.
	#[serde(default)]
	pub source_indices: Option<Vec<i64>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedSource {
	pub id: String,
	pub title: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
	pub task_id: String,
	pub imported_count: usize,
	pub imported_sources: Vec<ImportedSource>,
}

impl ResearchService {
	pub async fn import_research(&self, req: ImportResearchRequest) -> Result<ImportResult> {
		let notebook_id = req.notebook_id.trim();
		let task_id = req.task_id.trim();

		if notebook_id.is_empty() {
			return Err(Error::Validation { message: "notebook_id is required.".to_string() });
		}
		if task_id.is_empty() {
			return Err(Error::Validation { message: "task_id is required.".to_string() });
		}

		let task = self.registry.completed_task(notebook_id, task_id).ok_or_else(|| {
			Error::Precondition {
				message: format!(
					"Research task {task_id} has not completed; poll it to completion before importing."
				),
			}
		})?;

		import(
			self.channel.as_ref(),
			notebook_id,
			&task,
			req.source_indices.as_deref(),
			self.settings.import_timeout,
		)
		.await
	}
}

pub async fn import(
	channel: &dyn AuthChannel,
	notebook_id: &str,
	task: &ResearchTask,
	source_indices: Option<&[i64]>,
	timeout: Duration,
) -> Result<ImportResult> {
	let notebook_id = notebook_id.trim();

	if notebook_id.is_empty() {
		return Err(Error::Validation { message: "notebook_id is required.".to_string() });
	}

	let task_id = match task.authoritative_id.as_deref() {
		Some(task_id) if task.is_completed() => task_id,
		_ =>
			return Err(Error::Precondition {
				message: format!(
					"Research task {} is {:?}; only completed tasks can be imported.",
					task.authoritative_id.as_deref().unwrap_or("<unknown>"),
					task.status
				),
			}),
	};
	let selected = select_sources(&task.discovered_sources, source_indices)?;
	let rows = selected.into_iter().filter_map(source_row).collect::<Vec<_>>();

	if rows.is_empty() {
		tracing::info!(notebook_id, task_id, "No importable research sources selected.");

		return Ok(ImportResult {
			task_id: task_id.to_string(),
			imported_count: 0,
			imported_sources: Vec::new(),
		});
	}

	let requested = rows.len();
	let call = RpcCall::new(
		RpcMethod::IMPORT_RESEARCH,
		serde_json::json!([null, [1], task_id, notebook_id, rows]),
		timeout,
	)
	.for_notebook(notebook_id);
	let result = nlm_rpc::invoke(channel, &call).await?;
	let imported_sources = parse_imported_sources(&result);

	tracing::info!(
		notebook_id,
		task_id,
		requested,
		imported = imported_sources.len(),
		"Research sources imported."
	);

	Ok(ImportResult {
		task_id: task_id.to_string(),
		imported_count: imported_sources.len(),
		imported_sources,
	})
}

fn select_sources<'a>(
	sources: &'a [DiscoveredSource],
	source_indices: Option<&[i64]>,
) -> Result<Vec<&'a DiscoveredSource>> {
	let Some(indices) = source_indices else {
		return Ok(sources.iter().collect());
	};

	indices
		.iter()
		.map(|&index| {
			usize::try_from(index).ok().and_then(|index| sources.get(index)).ok_or_else(|| {
				Error::Validation {
					message: format!(
						"source index {index} is out of range; the task has {} discovered source(s).",
						sources.len()
					),
				}
			})
		})
		.collect()
}

fn source_row(source: &DiscoveredSource) -> Option<Value> {
	if !source.is_importable() {
		return None;
	}

	let title = if source.title.is_empty() { UNTITLED } else { source.title.as_str() };
	let web_row = || {
		serde_json::json!([
			null, null, [source.url, title], null, null, null, null, null, null, null, 2
		])
	};

	if source.result_type == RESULT_TYPE_WEB {
		return Some(web_row());
	}

	let row = match drive_doc_id(&source.url) {
		Some(doc_id) => serde_json::json!([
			[doc_id, drive_mime_type(source.result_type), 1, title],
			null, null, null, null, null, null, null, null, null, 2
		]),
		None => web_row(),
	};

	Some(row)
}

fn drive_doc_id(url: &str) -> Option<&str> {
	let (_, query) = url.split_once('?')?;

	query.split('&').find_map(|pair| pair.strip_prefix("id=")).filter(|id| !id.is_empty())
}

fn drive_mime_type(result_type: i64) -> &'static str {
	match result_type {
		3 => MIME_PRESENTATION,
		8 => MIME_SPREADSHEET,
		_ => MIME_DOCUMENT,
	}
}

fn parse_imported_sources(result: &Value) -> Vec<ImportedSource> {
	let Some(mut rows) = result.as_array() else { return Vec::new() };

	if let Some(inner) = rows.first().and_then(Value::as_array)
		&& inner.first().is_some_and(Value::is_array)
	{
		rows = inner;
	}

	rows.iter()
		.filter_map(|row| {
			let fields = row.as_array().filter(|fields| fields.len() >= 2)?;
			let id = fields[0].as_array()?.first()?.as_str().filter(|id| !id.is_empty())?;
			let title = fields[1].as_str().unwrap_or(UNTITLED);

			Some(ImportedSource { id: id.to_string(), title: title.to_string() })
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::task::{TaskStatus, result_type_name};

	fn source(index: usize, url: &str, result_type: i64) -> DiscoveredSource {
		DiscoveredSource {
			index,
			url: url.to_string(),
			title: format!("Source {index}"),
			description: String::new(),
			result_type,
			result_type_name: result_type_name(result_type).to_string(),
		}
	}

	#[test]
	fn web_rows_carry_url_and_title() {
		let row = source_row(&source(0, "https://a.example", 1)).expect("row expected");

		assert_eq!(row[2], serde_json::json!(["https://a.example", "Source 0"]));
		assert_eq!(row.as_array().map(Vec::len), Some(11));
		assert_eq!(row[10], 2);
	}

	#[test]
	fn drive_rows_use_doc_id_and_mime() {
		let row = source_row(&source(0, "https://drive.google.com/a/x.com/open?id=doc-9&usp=x", 8))
			.expect("row expected");

		assert_eq!(row[0], serde_json::json!(["doc-9", MIME_SPREADSHEET, 1, "Source 0"]));
		assert_eq!(row[10], 2);
	}

	#[test]
	fn drive_rows_without_doc_id_fall_back_to_web_shape() {
		let row = source_row(&source(0, "https://docs.example/doc", 2)).expect("row expected");

		assert_eq!(row[0], Value::Null);
		assert_eq!(row[2][0], "https://docs.example/doc");
	}

	#[test]
	fn deep_reports_and_blank_urls_are_skipped() {
		assert!(source_row(&source(0, "", 1)).is_none());
		assert!(source_row(&source(1, "https://a.example", 5)).is_none());
	}

	#[test]
	fn out_of_range_indices_are_rejected() {
		let sources = vec![source(0, "https://a.example", 1)];

		assert!(matches!(select_sources(&sources, Some(&[1][..])), Err(Error::Validation { .. })));
		assert!(matches!(select_sources(&sources, Some(&[-1][..])), Err(Error::Validation { .. })));
		assert_eq!(select_sources(&sources, Some(&[0, 0][..])).map(|s| s.len()).ok(), Some(2));
	}

	#[test]
	fn parses_wrapped_import_response() {
		let result = serde_json::json!([[[["src-1"], "A"], [["src-2"], "B", null], [null, "skip"]]]);

		assert_eq!(
			parse_imported_sources(&result),
			vec![
				ImportedSource { id: "src-1".to_string(), title: "A".to_string() },
				ImportedSource { id: "src-2".to_string(), title: "B".to_string() },
			]
		);
	}

	#[tokio::test]
	async fn incomplete_task_fails_before_any_call() {
		struct PanickingChannel;
		impl AuthChannel for PanickingChannel {
			fn call<'a>(
				&'a self,
				_call: &'a RpcCall,
			) -> nlm_rpc::BoxFuture<'a, nlm_rpc::Result<Value>> {
				panic!("no call expected");
			}
		}

		let mut task = ResearchTask::tracked(Some("abc123".to_string()), "q".to_string());

		task.status = TaskStatus::InProgress;

		let err = import(&PanickingChannel, "nb-1", &task, None, Duration::from_secs(1))
			.await
			.expect_err("expected precondition error");

		assert!(matches!(err, Error::Precondition { .. }), "unexpected error: {err:?}");
	}
}
