use std::{collections::VecDeque, sync::Mutex, time::Duration};

use serde_json::Value;
use tokio::time::{self, Instant};

use nlm_rpc::{AuthChannel, BoxFuture, Error, Result, RpcCall};

pub const STATUS_IN_PROGRESS: i64 = 1;
pub const STATUS_COMPLETED: i64 = 2;
pub const STATUS_FAILED: i64 = 3;

#[derive(Clone, Debug)]
pub enum Reply {
	Payload(Value),
	Auth(String),
	Transport(String),
	Remote(String),
	Stall,
}

#[derive(Clone, Debug)]
pub struct RecordedCall {
	pub rpc_id: &'static str,
	pub params: Value,
	pub source_path: Option<String>,
	pub timeout: Duration,
	pub at: Instant,
}

#[derive(Debug, Default)]
pub struct ScriptedChannel {
	state: Mutex<ScriptState>,
}
impl ScriptedChannel {
	pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
		Self {
			state: Mutex::new(ScriptState {
				replies: replies.into_iter().collect(),
				last: None,
				calls: Vec::new(),
			}),
		}
	}

	pub fn push(&self, reply: Reply) {
		self.state.lock().unwrap_or_else(|err| err.into_inner()).replies.push_back(reply);
	}

	pub fn calls(&self) -> Vec<RecordedCall> {
		self.state.lock().unwrap_or_else(|err| err.into_inner()).calls.clone()
	}

	pub fn call_count(&self) -> usize {
		self.state.lock().unwrap_or_else(|err| err.into_inner()).calls.len()
	}

	fn next_reply(&self, call: &RpcCall) -> Option<Reply> {
		let mut state = self.state.lock().unwrap_or_else(|err| err.into_inner());

		state.calls.push(RecordedCall {
			rpc_id: call.method.id,
			params: call.params.clone(),
			source_path: call.source_path.clone(),
			timeout: call.timeout,
			at: Instant::now(),
		});

		// Once the script runs dry the last reply repeats.
		match state.replies.pop_front() {
			Some(reply) => {
				state.last = Some(reply.clone());

				Some(reply)
			},
			None => state.last.clone(),
		}
	}
}
impl AuthChannel for ScriptedChannel {
	fn call<'a>(&'a self, call: &'a RpcCall) -> BoxFuture<'a, Result<Value>> {
		let reply = self.next_reply(call);

		Box::pin(async move {
			match reply {
				Some(Reply::Payload(value)) => Ok(value),
				Some(Reply::Auth(message)) => Err(Error::Auth { message }),
				Some(Reply::Transport(message)) => Err(Error::Transport { message }),
				Some(Reply::Remote(message)) => Err(Error::Remote { message }),
				Some(Reply::Stall) => {
					time::sleep(Duration::from_secs(24 * 60 * 60)).await;

					Ok(Value::Null)
				},
				None => Err(Error::Remote {
					message: format!("No scripted reply for {}.", call.method.id),
				}),
			}
		})
	}
}

#[derive(Debug, Default)]
struct ScriptState {
	replies: VecDeque<Reply>,
	last: Option<Reply>,
	calls: Vec<RecordedCall>,
}

pub fn task_entry(task_id: &str, query: &str, status: i64) -> Value {
	task_entry_with_sources(task_id, query, status, Vec::new(), None)
}

pub fn task_entry_with_sources(
	task_id: &str,
	query: &str,
	status: i64,
	sources: Vec<Value>,
	summary: Option<&str>,
) -> Value {
	serde_json::json!([task_id, [null, [query, 1], 1, [sources, summary], status]])
}

pub fn web_source(url: &str, title: &str, result_type: i64) -> Value {
	serde_json::json!([url, title, "", result_type])
}

pub fn deep_report_source(title: &str, report: &str) -> Value {
	serde_json::json!([null, title, null, 5, null, null, [report]])
}

pub fn poll_payload(entries: impl IntoIterator<Item = Value>) -> Value {
	let mut rows = entries.into_iter().collect::<Vec<_>>();

	rows.push(serde_json::json!([1_767_225_600, 0]));

	serde_json::json!([rows])
}
