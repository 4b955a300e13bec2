//! Call dispatch.
//!
//! A call arrives on a `_call/…` topic framed as
//! `replyTopic SP token SP argumentJson`; only the first two spaces are
//! separators, the argument may contain anything. The reply goes to
//! `_reply/<replyTopic>` framed as `token SP resultJson`, non-retained.
//! Void calls produce no reply at all.

use super::{CallableEntry, Completion, Connection};
use crate::topics::ServiceTopics;
use arbor_contract::{Type, TypeDescr, type_check};
use arbor_mqtt_provider::{Message, MqttClient};
use serde_json::Value;

pub(super) struct CallFrame<'a> {
	pub(super) reply_to: &'a str,
	pub(super) token: &'a str,
	pub(super) argument: &'a str,
}

impl<'a> CallFrame<'a> {
	pub(super) fn parse(payload: &'a str) -> Option<Self> {
		let mut parts = payload.splitn(3, ' ');
		let frame = CallFrame {
			reply_to: parts.next()?,
			token: parts.next()?,
			argument: parts.next()?,
		};
		if frame.reply_to.is_empty() || frame.token.is_empty() {
			return None;
		}
		Some(frame)
	}
}

impl<C: MqttClient> Connection<C> {
	pub(super) fn dispatch_call(&mut self, entry: &CallableEntry, message: &Message) {
		let Ok(payload) = message.payload_str() else {
			tracing::error!(topic = %message.topic, "call payload is not valid utf-8");
			return;
		};
		let Some(frame) = CallFrame::parse(payload) else {
			tracing::error!(topic = %message.topic, "malformed call payload");
			return;
		};
		let argument: Value = match serde_json::from_str(frame.argument) {
			Ok(argument) => argument,
			Err(error) => {
				tracing::error!(topic = %message.topic, %error, "call argument is not valid json");
				return;
			}
		};
		if let Err(mismatch) = type_check(&argument, &entry.argument) {
			tracing::error!(topic = %message.topic, %mismatch, "call argument rejected");
			return;
		}

		if entry.asynchronous {
			self.spawn_call(entry, &frame, argument);
		} else {
			let result = (entry.handler)(&argument);
			if let Some(reply) = finish_call(&entry.retval, frame.reply_to, frame.token, result) {
				self.client.publish(reply);
			}
		}
	}

	/// Runs the handler on the blocking pool and posts the ready reply
	/// back as a completion event. If the loop dies first, the completion
	/// is discarded.
	fn spawn_call(&self, entry: &CallableEntry, frame: &CallFrame<'_>, argument: Value) {
		let handler = entry.handler.clone();
		let retval = entry.retval.clone();
		let reply_to = frame.reply_to.to_owned();
		let token = frame.token.to_owned();
		let liveness = self.liveness.clone();
		let tx = self.channels.completion.0.clone();
		tokio::task::spawn_blocking(move || {
			let result = handler(&argument);
			if let Some(message) = finish_call(&retval, &reply_to, &token, result) {
				if !liveness.send(&tx, Completion { message }) {
					tracing::debug!(reply_to = %reply_to, "discarding call completion after loop exit");
				}
			}
		});
	}
}

/// Checks the handler result against the declared retval and frames the
/// reply. A void callable must return null and gets no reply; everything
/// else must match its type. Violations are bugs in the handler, not
/// input errors, and abort the task running the call.
pub(super) fn finish_call(
	retval: &Type,
	reply_to: &str,
	token: &str,
	result: Value,
) -> Option<Message> {
	if matches!(retval.descr, TypeDescr::Void) {
		if !result.is_null() {
			panic!("callable with void retval returned a value: {result}");
		}
		return None;
	}
	if let Err(mismatch) = type_check(&result, retval) {
		panic!("callable returned a value that fails its retval type: {mismatch}");
	}
	let payload = format!("{token} {result}");
	Some(Message::new(ServiceTopics::reply(reply_to), payload, false))
}
