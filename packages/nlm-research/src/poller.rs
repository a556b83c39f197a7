use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::{task::JoinHandle, time::Instant};
use uuid::Uuid;

use crate::{
	Error, ResearchService, Result,
	resolver::{self, Resolution, TaskEntry},
	task::{DiscoveredSource, ResearchMode, ResearchTask, TaskStatus},
};
use nlm_rpc::{AuthChannel, RpcCall, RpcMethod};

pub const MAX_ATTEMPT_BUDGET: u32 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
	Completed,
	Failed,
	NotFound,
	TimedOut,
	BudgetExhausted,
	InProgress,
}

#[derive(Clone, Copy, Debug)]
pub struct PollOptions {
	pub max_wait: Duration,
	pub poll_interval: Duration,
	pub rpc_timeout: Duration,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollResearchRequest {
	pub notebook_id: String,
	#[serde(default)]
	pub task_id: Option<String>,
	#[serde(default)]
	pub query: String,
	#[serde(default, alias = "max_wait")]
	pub max_wait_secs: Option<u64>,
	#[serde(default, alias = "poll_interval")]
	pub poll_interval_secs: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollReport {
	pub status: PollStatus,
	pub task_id: Option<String>,
	pub query: String,
	pub mode: Option<ResearchMode>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub discovered_sources: Option<Vec<DiscoveredSource>>,
	pub summary: Option<String>,
	pub report: Option<String>,
	pub attempts_made: u32,
	pub attempt_budget: u32,
	pub elapsed_seconds: f64,
	#[serde(with = "crate::time_serde")]
	pub started_at: OffsetDateTime,
	pub id_migrated_from: Option<String>,
	pub last_error: Option<String>,
	pub message: String,
}

#[derive(Clone, Debug)]
pub struct PollOutcome {
	pub report: PollReport,
	pub task: ResearchTask,
	pub superseded_ids: Vec<String>,
}

#[derive(Debug)]
pub struct PollHandle {
	inner: JoinHandle<Result<PollReport>>,
}
impl PollHandle {
	/// Stops polling. The remote job is left untouched.
	pub fn cancel(&self) {
		self.inner.abort();
	}

	pub fn is_finished(&self) -> bool {
		self.inner.is_finished()
	}

	/// Waits for the session; `None` when it was cancelled first.
	pub async fn join(self) -> Option<Result<PollReport>> {
		match self.inner.await {
			Ok(result) => Some(result),
			Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
			Err(_) => None,
		}
	}
}

#[derive(Debug, PartialEq)]
enum Step {
	Continue,
	Finish(PollStatus),
}

pub struct PollSession {
	channel: Arc<dyn AuthChannel>,
	session_id: Uuid,
	notebook_id: String,
	task: ResearchTask,
	options: PollOptions,
	attempt_budget: u32,
	attempts_made: u32,
	observed: bool,
	superseded_ids: Vec<String>,
	last_error: Option<String>,
	started_at: OffsetDateTime,
	started: Instant,
}
impl PollSession {
	pub fn new(
		channel: Arc<dyn AuthChannel>,
		notebook_id: &str,
		task: ResearchTask,
		options: PollOptions,
	) -> Result<Self> {
		let notebook_id = notebook_id.trim();

		if notebook_id.is_empty() {
			return Err(Error::Validation { message: "notebook_id is required.".to_string() });
		}
		if task.authoritative_id.as_deref().is_none_or(str::is_empty) && task.query.is_empty() {
			return Err(Error::Validation {
				message: "Either task_id or query is required.".to_string(),
			});
		}
		if options.poll_interval.is_zero() {
			return Err(Error::Validation {
				message: "poll_interval must be greater than zero.".to_string(),
			});
		}

		Ok(Self {
			channel,
			session_id: Uuid::new_v4(),
			notebook_id: notebook_id.to_string(),
			task,
			options,
			attempt_budget: attempt_budget(options.max_wait, options.poll_interval),
			attempts_made: 0,
			observed: false,
			superseded_ids: Vec::new(),
			last_error: None,
			started_at: OffsetDateTime::now_utc(),
			started: Instant::now(),
		})
	}

	pub fn attempt_budget(&self) -> u32 {
		self.attempt_budget
	}

	pub async fn run(mut self) -> Result<PollOutcome> {
		tracing::debug!(
			session_id = %self.session_id,
			notebook_id = %self.notebook_id,
			task_id = ?self.task.authoritative_id,
			attempt_budget = self.attempt_budget,
			"Polling research task."
		);

		if self.options.max_wait.is_zero() {
			return self.check_once().await;
		}

		loop {
			if self.attempts_made >= self.attempt_budget {
				return Ok(self.finish(PollStatus::BudgetExhausted));
			}

			let deadline_reached = self.started.elapsed() >= self.options.max_wait;
			let round = self.poll_once().await;

			if let Step::Finish(status) = self.record_round(round, deadline_reached)? {
				return Ok(self.finish(status));
			}
			if self.attempts_made < self.attempt_budget
				&& self.started.elapsed() < self.options.max_wait
			{
				tokio::time::sleep(self.options.poll_interval).await;
			}
		}
	}

	async fn check_once(mut self) -> Result<PollOutcome> {
		let entries = self.poll_once().await?;

		self.attempts_made = 1;

		let status = match self.apply(resolver::resolve(&entries, &self.task)) {
			Some(status) => status,
			None if self.observed => PollStatus::InProgress,
			None => PollStatus::NotFound,
		};

		Ok(self.finish(status))
	}

	async fn poll_once(&self) -> Result<Vec<TaskEntry>> {
		let call = RpcCall::new(
			RpcMethod::POLL_RESEARCH,
			serde_json::json!([null, null, self.notebook_id]),
			self.options.rpc_timeout,
		)
		.for_notebook(&self.notebook_id);
		let payload = nlm_rpc::invoke(self.channel.as_ref(), &call).await?;

		Ok(resolver::parse_poll_response(&payload))
	}

	// Auth failures end the session; any other failure costs the attempt.
	fn record_round(
		&mut self,
		round: Result<Vec<TaskEntry>>,
		deadline_reached: bool,
	) -> Result<Step> {
		self.attempts_made += 1;

		match round {
			Ok(entries) => {
				let resolution = resolver::resolve(&entries, &self.task);
				let was_observed = self.observed;

				if let Some(status) = self.apply(resolution) {
					return Ok(Step::Finish(status));
				}
				if was_observed && !self.observed {
					return Ok(Step::Finish(PollStatus::NotFound));
				}
			},
			Err(err @ Error::Auth { .. }) => return Err(err),
			Err(err) => {
				tracing::warn!(
					session_id = %self.session_id,
					attempt = self.attempts_made,
					error = %err,
					"Research poll failed."
				);

				self.last_error = Some(err.to_string());
			},
		}

		if deadline_reached {
			return Ok(Step::Finish(PollStatus::TimedOut));
		}

		Ok(Step::Continue)
	}

	// Returns the terminal status the resolution implies, if any. `observed` tracks whether the
	// task is currently visible in progress.
	fn apply(&mut self, resolution: Resolution) -> Option<PollStatus> {
		let Resolution::Matched { entry, migrated_from } = resolution else {
			self.observed = false;

			return None;
		};

		if let Some(previous) = migrated_from {
			tracing::info!(
				session_id = %self.session_id,
				from = %previous,
				to = %entry.id,
				"Research task id migrated."
			);

			self.superseded_ids.push(previous);
		}

		self.task.adopt_id(&entry.id);
		self.task.mode = Some(entry.mode);

		match entry.status {
			TaskStatus::Completed => {
				self.task.status = TaskStatus::Completed;
				self.task.discovered_sources = entry.sources;
				self.task.summary = entry.summary;
				self.task.report = entry.report;

				Some(PollStatus::Completed)
			},
			TaskStatus::Failed => {
				self.task.status = TaskStatus::Failed;

				Some(PollStatus::Failed)
			},
			_ => {
				self.task.status = TaskStatus::InProgress;
				self.observed = true;

				None
			},
		}
	}

	fn finish(mut self, status: PollStatus) -> PollOutcome {
		let elapsed = self.started.elapsed();

		if status == PollStatus::NotFound {
			self.task.status = TaskStatus::NotFound;
		}

		let message = self.message(status, elapsed);

		tracing::info!(
			session_id = %self.session_id,
			task_id = ?self.task.authoritative_id,
			status = ?status,
			attempts = self.attempts_made,
			"Research polling finished."
		);

		let report = PollReport {
			status,
			task_id: self.task.authoritative_id.clone(),
			query: self.task.query.clone(),
			mode: self.task.mode,
			discovered_sources: (status == PollStatus::Completed)
				.then(|| self.task.discovered_sources.clone()),
			summary: self.task.summary.clone(),
			report: self.task.report.clone(),
			attempts_made: self.attempts_made,
			attempt_budget: self.attempt_budget,
			elapsed_seconds: elapsed.as_secs_f64(),
			started_at: self.started_at,
			id_migrated_from: self.superseded_ids.last().cloned(),
			last_error: self.last_error,
			message,
		};

		PollOutcome { report, task: self.task, superseded_ids: self.superseded_ids }
	}

	fn message(&self, status: PollStatus, elapsed: Duration) -> String {
		let attempts = self.attempts_made;
		let elapsed = elapsed.as_secs_f64();

		match status {
			PollStatus::Completed => format!(
				"Research completed after {attempts} attempt(s) in {elapsed:.1}s with {} source(s).",
				self.task.discovered_sources.len()
			),
			PollStatus::Failed =>
				format!("Research failed after {attempts} attempt(s) and {elapsed:.1}s."),
			PollStatus::NotFound if self.task.mode.is_some() => format!(
				"Research task disappeared after {attempts} attempt(s) and {elapsed:.1}s."
			),
			PollStatus::NotFound => "No research task matched the task id or query.".to_string(),
			PollStatus::TimedOut => format!(
				"Research still in progress after {elapsed:.1}s (max wait {}s); poll again later.",
				self.options.max_wait.as_secs()
			),
			PollStatus::BudgetExhausted if self.task.mode.is_none() => format!(
				"No research task matched after {attempts} attempt(s) and {elapsed:.1}s."
			),
			PollStatus::BudgetExhausted => format!(
				"Gave up after {attempts} attempt(s) and {elapsed:.1}s without a terminal status."
			),
			PollStatus::InProgress => "Research is still in progress (checked once).".to_string(),
		}
	}
}

impl ResearchService {
	pub async fn poll_research(&self, req: PollResearchRequest) -> Result<PollReport> {
		let (notebook_id, session) = self.poll_session(req)?;
		let outcome = session.run().await?;

		self.registry.record(&notebook_id, &outcome);

		Ok(outcome.report)
	}

	pub fn spawn_poll(&self, req: PollResearchRequest) -> Result<PollHandle> {
		let (notebook_id, session) = self.poll_session(req)?;
		let registry = self.registry.clone();
		let inner = tokio::spawn(async move {
			let outcome = session.run().await?;

			registry.record(&notebook_id, &outcome);

			Ok(outcome.report)
		});

		Ok(PollHandle { inner })
	}

	fn poll_session(&self, req: PollResearchRequest) -> Result<(String, PollSession)> {
		let task_id = req.task_id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty());
		let options = PollOptions {
			max_wait: req
				.max_wait_secs
				.map(Duration::from_secs)
				.unwrap_or(self.settings.max_wait),
			poll_interval: req
				.poll_interval_secs
				.map(Duration::from_secs)
				.unwrap_or(self.settings.poll_interval),
			rpc_timeout: self.settings.rpc_timeout,
		};
		let session = PollSession::new(
			self.channel.clone(),
			&req.notebook_id,
			ResearchTask::tracked(task_id, req.query),
			options,
		)?;

		Ok((session.notebook_id.clone(), session))
	}
}

pub fn attempt_budget(max_wait: Duration, poll_interval: Duration) -> u32 {
	if max_wait.is_zero() {
		return 1;
	}

	let rounds = max_wait.as_millis().div_ceil(poll_interval.as_millis().max(1));

	u32::try_from(rounds.saturating_mul(2)).map_or(MAX_ATTEMPT_BUDGET, |budget| {
		budget.min(MAX_ATTEMPT_BUDGET)
	})
}
