pub mod import;
pub mod launcher;
pub mod poller;
pub mod resolver;
pub mod task;
pub mod time_serde;

mod error;

pub use error::{Error, Result};
pub use import::{ImportResearchRequest, ImportResult, ImportedSource};
pub use launcher::{Launch, StartResearchRequest, StartResearchResponse};
pub use poller::{
	PollHandle, PollOptions, PollOutcome, PollReport, PollResearchRequest, PollSession, PollStatus,
};
pub use task::{DiscoveredSource, ResearchMode, ResearchTask, TaskStatus};

use std::{
	collections::{HashMap, VecDeque},
	sync::{Arc, Mutex},
	time::Duration,
};

use nlm_config::Config;
use nlm_rpc::{AuthChannel, BatchExecuteChannel, Credentials};

#[derive(Clone, Copy, Debug)]
pub struct ResearchSettings {
	pub rpc_timeout: Duration,
	pub import_timeout: Duration,
	pub poll_interval: Duration,
	pub max_wait: Duration,
}
impl ResearchSettings {
	pub fn from_config(cfg: &Config) -> Self {
		Self {
			rpc_timeout: Duration::from_millis(cfg.remote.rpc_timeout_ms),
			import_timeout: Duration::from_millis(cfg.remote.import_timeout_ms),
			poll_interval: Duration::from_secs(cfg.research.poll_interval_secs),
			max_wait: Duration::from_secs(cfg.research.max_wait_secs),
		}
	}
}

pub struct ResearchService {
	pub channel: Arc<dyn AuthChannel>,
	pub settings: ResearchSettings,
	registry: Arc<Registry>,
}
impl ResearchService {
	pub fn new(channel: Arc<dyn AuthChannel>, settings: ResearchSettings) -> Self {
		Self { channel, settings, registry: Arc::new(Registry::default()) }
	}

	pub fn from_config(cfg: &Config) -> Result<Self> {
		let credentials = Credentials::from_config(&cfg.auth);
		let channel = BatchExecuteChannel::new(&cfg.remote, credentials)?;

		Ok(Self::new(Arc::new(channel), ResearchSettings::from_config(cfg)))
	}
}

const MAX_COMPLETED_TASKS: usize = 256;

type TaskKey = (String, String);

// Completed tasks keyed by notebook and authoritative id, oldest evicted first. Ids a task
// carried before a migration are aliases of the authoritative id.
#[derive(Debug, Default)]
struct Registry {
	inner: Mutex<RegistryState>,
}
impl Registry {
	fn record(&self, notebook_id: &str, outcome: &PollOutcome) {
		if outcome.task.is_completed() {
			self.insert(notebook_id, &outcome.task, &outcome.superseded_ids);
		}
	}

	fn insert(&self, notebook_id: &str, task: &ResearchTask, superseded_ids: &[String]) {
		let Some(task_id) = task.authoritative_id.as_deref() else { return };
		let mut state = self.inner.lock().unwrap_or_else(|err| err.into_inner());

		for previous in superseded_ids {
			state.aliases.insert(key(notebook_id, previous), task_id.to_string());
		}

		if state.completed.insert(key(notebook_id, task_id), task.clone()).is_none() {
			state.order.push_back(key(notebook_id, task_id));
		}

		while state.completed.len() > MAX_COMPLETED_TASKS {
			let Some((evicted_notebook, evicted_id)) = state.order.pop_front() else { break };

			state.completed.remove(&(evicted_notebook.clone(), evicted_id.clone()));
			state.aliases.retain(|(notebook_id, _), target| {
				*notebook_id != evicted_notebook || *target != evicted_id
			});

			tracing::debug!(
				notebook_id = %evicted_notebook,
				task_id = %evicted_id,
				"Evicted completed research task."
			);
		}
	}

	fn completed_task(&self, notebook_id: &str, task_id: &str) -> Option<ResearchTask> {
		let state = self.inner.lock().unwrap_or_else(|err| err.into_inner());

		if let Some(task) = state.completed.get(&key(notebook_id, task_id)) {
			return Some(task.clone());
		}

		let authoritative = state.aliases.get(&key(notebook_id, task_id))?;

		tracing::warn!(
			notebook_id,
			stale_id = task_id,
			task_id = %authoritative,
			"Import requested with a superseded task id; using the authoritative id."
		);

		state.completed.get(&key(notebook_id, authoritative)).cloned()
	}
}

#[derive(Debug, Default)]
struct RegistryState {
	completed: HashMap<TaskKey, ResearchTask>,
	aliases: HashMap<TaskKey, String>,
	order: VecDeque<TaskKey>,
}

fn key(notebook_id: &str, task_id: &str) -> TaskKey {
	(notebook_id.to_string(), task_id.to_string())
}
