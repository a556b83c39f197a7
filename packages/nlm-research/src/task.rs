use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub(crate) const SOURCE_TYPE_WEB: i64 = 1;
pub(crate) const SOURCE_TYPE_DRIVE: i64 = 2;
pub(crate) const REMOTE_MODE_DEEP: i64 = 5;
pub(crate) const RESULT_TYPE_WEB: i64 = 1;
pub(crate) const RESULT_TYPE_DEEP_REPORT: i64 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResearchMode {
	FastWeb,
	DeepWeb,
	FastDrive,
}
impl ResearchMode {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::FastWeb => "fast-web",
			Self::DeepWeb => "deep-web",
			Self::FastDrive => "fast-drive",
		}
	}

	pub fn is_deep(self) -> bool {
		matches!(self, Self::DeepWeb)
	}

	pub(crate) fn source_type(self) -> i64 {
		match self {
			Self::FastWeb | Self::DeepWeb => SOURCE_TYPE_WEB,
			Self::FastDrive => SOURCE_TYPE_DRIVE,
		}
	}

	pub(crate) fn from_remote(mode_code: Option<i64>, source_type: i64) -> Self {
		match (mode_code, source_type) {
			(Some(REMOTE_MODE_DEEP), _) => Self::DeepWeb,
			(_, SOURCE_TYPE_DRIVE) => Self::FastDrive,
			_ => Self::FastWeb,
		}
	}
}
impl fmt::Display for ResearchMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for ResearchMode {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self> {
		match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
			"fast-web" => Ok(Self::FastWeb),
			"deep-web" => Ok(Self::DeepWeb),
			"fast-drive" => Ok(Self::FastDrive),
			"deep-drive" => Err(Error::Validation {
				message: "Deep research only supports web sources; use fast-drive for Drive."
					.to_string(),
			}),
			_ => Err(Error::Validation {
				message: format!("mode must be one of fast-web, deep-web, or fast-drive, got {raw}."),
			}),
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
	Pending,
	InProgress,
	Completed,
	Failed,
	NotFound,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredSource {
	pub index: usize,
	pub url: String,
	pub title: String,
	pub description: String,
	pub result_type: i64,
	pub result_type_name: String,
}
impl DiscoveredSource {
	pub fn is_importable(&self) -> bool {
		self.result_type != RESULT_TYPE_DEEP_REPORT && !self.url.trim().is_empty()
	}
}

pub fn result_type_name(result_type: i64) -> &'static str {
	match result_type {
		1 => "web",
		2 => "google_doc",
		3 => "google_slides",
		5 => "deep_report",
		8 => "google_sheets",
		_ => "unknown",
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResearchTask {
	pub requested_id: Option<String>,
	/// Most recent id confirmed by the remote service; every later poll correlates on it.
	pub authoritative_id: Option<String>,
	pub query: String,
	pub mode: Option<ResearchMode>,
	pub status: TaskStatus,
	pub discovered_sources: Vec<DiscoveredSource>,
	pub summary: Option<String>,
	pub report: Option<String>,
}
impl ResearchTask {
	pub fn started(task_id: String, query: String, mode: ResearchMode) -> Self {
		Self {
			requested_id: Some(task_id.clone()),
			authoritative_id: Some(task_id),
			query,
			mode: Some(mode),
			status: TaskStatus::Pending,
			discovered_sources: Vec::new(),
			summary: None,
			report: None,
		}
	}

	pub fn tracked(task_id: Option<String>, query: String) -> Self {
		Self {
			requested_id: task_id.clone(),
			authoritative_id: task_id,
			query,
			mode: None,
			status: TaskStatus::Pending,
			discovered_sources: Vec::new(),
			summary: None,
			report: None,
		}
	}

	pub fn is_completed(&self) -> bool {
		self.status == TaskStatus::Completed
	}

	pub(crate) fn adopt_id(&mut self, id: &str) -> Option<String> {
		if self.authoritative_id.as_deref() == Some(id) {
			return None;
		}

		self.authoritative_id.replace(id.to_string())
	}
}
