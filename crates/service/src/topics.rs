use arbor_mqtt_provider::Topic;

/// Builds the wire topics for one service: everything lives under the
/// configured root and per-service sub-root.
pub(crate) struct ServiceTopics {
	root: Topic,
	service_root: Topic,
}

impl ServiceTopics {
	pub(crate) fn new(root: Topic, service_root: Topic) -> Self {
		ServiceTopics { root, service_root }
	}

	/// `_contract/<root>/<serviceRoot>`: retained contract, also the will
	/// topic.
	pub(crate) fn contract(&self) -> Topic {
		Topic::join(["_contract", self.root.as_str(), self.service_root.as_str()])
	}

	/// `_value/<root>/<serviceRoot>/<path>`: retained current value.
	pub(crate) fn value(&self, path: &Topic) -> Topic {
		Topic::join([
			"_value",
			self.root.as_str(),
			self.service_root.as_str(),
			path.as_str(),
		])
	}

	/// `_call/<root>/<serviceRoot>/<path>`: subscribed for incoming calls.
	pub(crate) fn call(&self, path: &Topic) -> Topic {
		Topic::join([
			"_call",
			self.root.as_str(),
			self.service_root.as_str(),
			path.as_str(),
		])
	}

	/// `_reply/<replyTopic>`: non-retained call replies.
	pub(crate) fn reply(reply_to: &str) -> Topic {
		Topic::join(["_reply", reply_to])
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn topics_are_normalized_under_the_roots() {
		let topics = ServiceTopics::new(Topic::new("/r"), Topic::new("/s/"));
		assert_eq!(topics.contract().as_str(), "_contract/r/s");
		assert_eq!(topics.value(&Topic::new("m/v")).as_str(), "_value/r/s/m/v");
		assert_eq!(topics.call(&Topic::new("m/boing")).as_str(), "_call/r/s/m/boing");
		assert_eq!(ServiceTopics::reply("reply/x").as_str(), "_reply/reply/x");
	}

	#[test]
	fn an_empty_service_root_collapses() {
		let topics = ServiceTopics::new(Topic::new("things/fidget"), Topic::new("/"));
		assert_eq!(topics.contract().as_str(), "_contract/things/fidget");
		assert_eq!(topics.value(&Topic::new("spin")).as_str(), "_value/things/fidget/spin");
	}
}
