use serde_json::Value;

use crate::task::{
	DiscoveredSource, RESULT_TYPE_DEEP_REPORT, RESULT_TYPE_WEB, ResearchMode, ResearchTask,
	SOURCE_TYPE_WEB, TaskStatus, result_type_name,
};

const STATUS_COMPLETED: i64 = 2;
const STATUS_FAILED: i64 = 3;
const STATUS_IMPORTED: i64 = 6;

#[derive(Clone, Debug, PartialEq)]
pub struct TaskEntry {
	pub id: String,
	pub query: String,
	pub mode: ResearchMode,
	pub status: TaskStatus,
	pub sources: Vec<DiscoveredSource>,
	pub summary: Option<String>,
	pub report: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
	Matched {
		entry: TaskEntry,
		/// The id this entry superseded, when it was found through the query fallback.
		migrated_from: Option<String>,
	},
	NotFound,
}

pub fn resolve(entries: &[TaskEntry], task: &ResearchTask) -> Resolution {
	if let Some(id) = task.authoritative_id.as_deref()
		&& let Some(entry) = entries.iter().find(|entry| entry.id == id)
	{
		return Resolution::Matched { entry: entry.clone(), migrated_from: None };
	}

	if task.query.is_empty() {
		return Resolution::NotFound;
	}

	match entries.iter().find(|entry| entry.query == task.query) {
		Some(entry) => Resolution::Matched {
			entry: entry.clone(),
			migrated_from: task.authoritative_id.clone().filter(|id| *id != entry.id),
		},
		None => Resolution::NotFound,
	}
}

pub fn parse_poll_response(payload: &Value) -> Vec<TaskEntry> {
	let Some(mut rows) = payload.as_array().filter(|rows| !rows.is_empty()) else {
		return Vec::new();
	};

	if let Some(inner) = rows[0].as_array()
		&& inner.first().is_some_and(Value::is_array)
	{
		rows = inner;
	}

	rows.iter().filter_map(parse_entry).collect()
}

fn parse_entry(row: &Value) -> Option<TaskEntry> {
	let fields = row.as_array().filter(|fields| fields.len() >= 2)?;
	let id = fields[0].as_str()?;
	let info = fields[1].as_array().filter(|info| !info.is_empty())?;
	let query_info = info.get(1).and_then(Value::as_array);
	let query = query_info
		.and_then(|query_info| query_info.first())
		.and_then(Value::as_str)
		.unwrap_or_default();
	let source_type = query_info
		.and_then(|query_info| query_info.get(1))
		.and_then(Value::as_i64)
		.unwrap_or(SOURCE_TYPE_WEB);
	let mode = ResearchMode::from_remote(info.get(2).and_then(Value::as_i64), source_type);
	let results = info.get(3).and_then(Value::as_array);
	let summary = results
		.and_then(|results| results.get(1))
		.and_then(Value::as_str)
		.filter(|summary| !summary.is_empty())
		.map(str::to_string);
	let (sources, report) = results
		.and_then(|results| results.first())
		.and_then(Value::as_array)
		.map(|rows| parse_sources(rows))
		.unwrap_or_default();

	Some(TaskEntry {
		id: id.to_string(),
		query: query.to_string(),
		mode,
		status: status_from_code(info.get(4).and_then(Value::as_i64)),
		sources,
		summary,
		report,
	})
}

fn status_from_code(code: Option<i64>) -> TaskStatus {
	match code {
		Some(STATUS_COMPLETED | STATUS_IMPORTED) => TaskStatus::Completed,
		Some(STATUS_FAILED) => TaskStatus::Failed,
		_ => TaskStatus::InProgress,
	}
}

fn parse_sources(rows: &[Value]) -> (Vec<DiscoveredSource>, Option<String>) {
	let mut sources = Vec::with_capacity(rows.len());
	let mut report = None;

	for row in rows {
		let Some(fields) = row.as_array().filter(|fields| fields.len() >= 2) else { continue };
		let text = |idx: usize| fields.get(idx).and_then(Value::as_str).unwrap_or_default();
		let code = |idx: usize, default: i64| {
			fields.get(idx).and_then(Value::as_i64).unwrap_or(default)
		};
		let (url, description, result_type) = if fields[0].is_null() && fields[1].is_string() {
			// Deep research rows: [null, title, null, type, null, null, [report], ...].
			if let Some(text) = fields
				.get(6)
				.and_then(Value::as_array)
				.and_then(|report| report.first())
				.and_then(Value::as_str)
			{
				report = Some(text.to_string());
			}

			("", "", code(3, RESULT_TYPE_DEEP_REPORT))
		} else if fields[0].is_string() || fields.len() >= 3 {
			(text(0), text(2), code(3, RESULT_TYPE_WEB))
		} else {
			continue;
		};

		sources.push(DiscoveredSource {
			index: sources.len(),
			url: url.to_string(),
			title: text(1).to_string(),
			description: description.to_string(),
			result_type,
			result_type_name: result_type_name(result_type).to_string(),
		});
	}

	(sources, report)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn entry(id: &str, query: &str, status: TaskStatus) -> TaskEntry {
		TaskEntry {
			id: id.to_string(),
			query: query.to_string(),
			mode: ResearchMode::FastWeb,
			status,
			sources: Vec::new(),
			summary: None,
			report: None,
		}
	}

	fn task(id: Option<&str>, query: &str) -> ResearchTask {
		ResearchTask::tracked(id.map(str::to_string), query.to_string())
	}

	#[test]
	fn id_match_wins_over_conflicting_query_match() {
		let entries = vec![
			entry("other", "quantum computing", TaskStatus::Completed),
			entry("abc123", "quantum computing", TaskStatus::InProgress),
		];
		let resolution = resolve(&entries, &task(Some("abc123"), "quantum computing"));

		assert_eq!(
			resolution,
			Resolution::Matched {
				entry: entry("abc123", "quantum computing", TaskStatus::InProgress),
				migrated_from: None,
			}
		);
	}

	#[test]
	fn query_fallback_reports_migration() {
		let entries = vec![entry("xyz789", "quantum computing", TaskStatus::Completed)];
		let resolution = resolve(&entries, &task(Some("abc123"), "quantum computing"));
		let Resolution::Matched { entry, migrated_from } = resolution else {
			panic!("expected a match");
		};

		assert_eq!(entry.id, "xyz789");
		assert_eq!(migrated_from.as_deref(), Some("abc123"));
	}

	#[test]
	fn query_match_without_known_id_is_not_a_migration() {
		let entries = vec![entry("xyz789", "quantum computing", TaskStatus::InProgress)];
		let resolution = resolve(&entries, &task(None, "quantum computing"));

		assert!(matches!(resolution, Resolution::Matched { migrated_from: None, .. }));
	}

	#[test]
	fn query_match_is_exact() {
		let entries = vec![entry("xyz789", "Quantum computing", TaskStatus::InProgress)];

		assert_eq!(
			resolve(&entries, &task(Some("abc123"), "quantum computing")),
			Resolution::NotFound
		);
	}

	#[test]
	fn empty_query_never_falls_back() {
		let entries = vec![entry("xyz789", "", TaskStatus::InProgress)];

		assert_eq!(resolve(&entries, &task(Some("abc123"), "")), Resolution::NotFound);
	}

	#[test]
	fn parses_fast_research_entry() {
		let payload = serde_json::json!([[
			[
				"task-1",
				[
					null,
					["quantum computing", 1],
					1,
					[
						[
							["https://a.example", "A", "about a", 1],
							["https://drive.google.com/open?id=doc1", "Doc", "", 2],
							[7]
						],
						"Short summary"
					],
					2
				]
			],
			[1_767_000_000, 0]
		]]);
		let entries = parse_poll_response(&payload);

		assert_eq!(entries.len(), 1);

		let entry = &entries[0];

		assert_eq!(entry.id, "task-1");
		assert_eq!(entry.query, "quantum computing");
		assert_eq!(entry.mode, ResearchMode::FastWeb);
		assert_eq!(entry.status, TaskStatus::Completed);
		assert_eq!(entry.summary.as_deref(), Some("Short summary"));
		assert_eq!(entry.sources.len(), 2);
		assert_eq!(entry.sources[0].url, "https://a.example");
		assert_eq!(entry.sources[0].description, "about a");
		assert_eq!(entry.sources[1].index, 1);
		assert_eq!(entry.sources[1].result_type_name, "google_doc");
	}

	#[test]
	fn parses_deep_research_report() {
		let payload = serde_json::json!([[
			"task-2",
			[
				null,
				["fusion energy", 1],
				5,
				[[[null, "Fusion report", null, 5, null, null, ["# Report\nbody"]]]],
				1
			]
		]]);
		let entries = parse_poll_response(&payload);

		assert_eq!(entries.len(), 1);
		assert_eq!(entries[0].mode, ResearchMode::DeepWeb);
		assert_eq!(entries[0].status, TaskStatus::InProgress);
		assert_eq!(entries[0].report.as_deref(), Some("# Report\nbody"));
		assert_eq!(entries[0].sources[0].result_type_name, "deep_report");
		assert!(!entries[0].sources[0].is_importable());
	}

	#[test]
	fn status_codes_map_to_task_status() {
		assert_eq!(status_from_code(Some(1)), TaskStatus::InProgress);
		assert_eq!(status_from_code(Some(2)), TaskStatus::Completed);
		assert_eq!(status_from_code(Some(6)), TaskStatus::Completed);
		assert_eq!(status_from_code(Some(3)), TaskStatus::Failed);
		assert_eq!(status_from_code(Some(42)), TaskStatus::InProgress);
		assert_eq!(status_from_code(None), TaskStatus::InProgress);
	}

	#[test]
	fn empty_payload_has_no_entries() {
		assert!(parse_poll_response(&Value::Null).is_empty());
		assert!(parse_poll_response(&serde_json::json!([])).is_empty());
		assert!(parse_poll_response(&serde_json::json!([[1, 2], "junk"])).is_empty());
	}
}
