pub mod batchexecute;
pub mod channel;
pub mod credentials;

mod error;

pub use channel::BatchExecuteChannel;
pub use credentials::Credentials;
pub use error::{Error, Result};

use std::{future::Future, pin::Pin, time::Duration};

use serde_json::Value;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RpcMethod {
	pub id: &'static str,
	pub name: &'static str,
}
impl RpcMethod {
	pub const START_FAST_RESEARCH: Self = Self { id: "Ljjv0c", name: "start_fast_research" };
	pub const START_DEEP_RESEARCH: Self = Self { id: "QA9ei", name: "start_deep_research" };
	pub const POLL_RESEARCH: Self = Self { id: "e3bVqc", name: "poll_research" };
	pub const IMPORT_RESEARCH: Self = Self { id: "LBwxtb", name: "import_research" };
}

#[derive(Clone, Debug)]
pub struct RpcCall {
	pub method: RpcMethod,
	pub params: Value,
	pub source_path: Option<String>,
	pub timeout: Duration,
}
impl RpcCall {
	pub fn new(method: RpcMethod, params: Value, timeout: Duration) -> Self {
		Self { method, params, source_path: None, timeout }
	}

	pub fn for_notebook(mut self, notebook_id: &str) -> Self {
		self.source_path = Some(format!("/notebook/{notebook_id}"));

		self
	}
}

pub trait AuthChannel
where
	Self: Send + Sync,
{
	fn call<'a>(&'a self, call: &'a RpcCall) -> BoxFuture<'a, Result<Value>>;
}

/// Issues one call and enforces its timeout regardless of the channel implementation.
pub async fn invoke(channel: &dyn AuthChannel, call: &RpcCall) -> Result<Value> {
	match tokio::time::timeout(call.timeout, channel.call(call)).await {
		Ok(result) => result,
		Err(_) => Err(Error::Transport {
			message: format!(
				"{} timed out after {} ms.",
				call.method.name,
				call.timeout.as_millis()
			),
		}),
	}
}
