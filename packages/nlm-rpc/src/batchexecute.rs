use serde_json::Value;

use crate::{Error, Result};

pub const ENDPOINT_PATH: &str = "/_/LabsTailwindUi/data/batchexecute";

const XSSI_PREFIX: &str = ")]}'";
const RESULT_TAG: &str = "wrb.fr";
const ERROR_TAG: &str = "er";
// gRPC status codes reported in the error slot of a result row.
const STATUS_PERMISSION_DENIED: i64 = 7;
const STATUS_UNAUTHENTICATED: i64 = 16;

pub fn encode_request_form(
	rpc_id: &str,
	params: &Value,
	csrf_token: Option<&str>,
) -> Result<Vec<(&'static str, String)>> {
	let params_json = serde_json::to_string(params)
		.map_err(|err| Error::InvalidConfig { message: format!("Unencodable params: {err}") })?;
	let envelope = serde_json::json!([[[rpc_id, params_json, null, "generic"]]]);
	let mut form = vec![("f.req", envelope.to_string())];

	if let Some(token) = csrf_token {
		form.push(("at", token.to_string()));
	}

	Ok(form)
}

// The result is the JSON string in the third slot of the `["wrb.fr", rpc_id, ...]` row.
pub fn decode_response(body: &str, rpc_id: &str) -> Result<Value> {
	let body = body.trim_start();
	let body = body.strip_prefix(XSSI_PREFIX).unwrap_or(body);

	for chunk in parse_chunks(body) {
		let Some(rows) = chunk.as_array() else { continue };

		for row in rows {
			let Some(fields) = row.as_array() else { continue };

			match fields.first().and_then(Value::as_str) {
				Some(RESULT_TAG) if fields.get(1).and_then(Value::as_str) == Some(rpc_id) =>
					return decode_result_row(fields, rpc_id),
				Some(ERROR_TAG) =>
					return Err(Error::Remote {
						message: format!("{rpc_id} returned an error row: {row}"),
					}),
				_ => {},
			}
		}
	}

	Err(Error::Remote { message: format!("Response did not contain a result for {rpc_id}.") })
}

fn parse_chunks(body: &str) -> Vec<Value> {
	body.lines()
		.map(str::trim)
		.filter(|line| !line.is_empty() && line.parse::<u64>().is_err())
		.filter_map(|line| serde_json::from_str::<Value>(line).ok())
		.collect()
}

fn decode_result_row(fields: &[Value], rpc_id: &str) -> Result<Value> {
	match fields.get(2) {
		Some(Value::String(payload)) => serde_json::from_str(payload).map_err(|err| Error::Remote {
			message: format!("{rpc_id} result payload is not valid JSON: {err}"),
		}),
		_ => match error_status(fields) {
			Some(code @ (STATUS_UNAUTHENTICATED | STATUS_PERMISSION_DENIED)) => Err(Error::Auth {
				message: format!("{rpc_id} was rejected with status {code}; refresh the cookies."),
			}),
			Some(code) =>
				Err(Error::Remote { message: format!("{rpc_id} failed with status {code}.") }),
			None => Ok(Value::Null),
		},
	}
}

fn error_status(fields: &[Value]) -> Option<i64> {
	fields.get(5)?.as_array()?.first()?.as_i64()
}
