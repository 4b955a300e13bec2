use arbor_contract::Contract;
use arbor_mqtt_provider::{MqttClient, Topic};
use std::time::Duration;

/// Invoked from the loop after each successful contract (re)installation,
/// with the contract topic and the tree that was just published.
pub type ContractCallback = Box<dyn FnMut(&Topic, Option<&Contract>) + Send>;

pub struct ConnectionOptions<C: MqttClient> {
	pub(crate) mqtt_client: C,
	pub(crate) root: Topic,
	pub(crate) service_root: Topic,
	pub(crate) on_contract: Option<ContractCallback>,
	pub(crate) call_timeout: Duration,
}

impl<C: MqttClient> ConnectionOptions<C> {
	pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

	pub fn new(
		mqtt_client: C,
		root: impl Into<Topic>,
		service_root: impl Into<Topic>,
	) -> Self {
		ConnectionOptions {
			mqtt_client,
			root: root.into(),
			service_root: service_root.into(),
			on_contract: None,
			call_timeout: Self::DEFAULT_CALL_TIMEOUT,
		}
	}

	pub fn on_contract(
		mut self,
		callback: impl FnMut(&Topic, Option<&Contract>) + Send + 'static,
	) -> Self {
		self.on_contract = Some(Box::new(callback));
		self
	}

	/// Advisory deadline callers may attach to outgoing calls. The service
	/// side does not enforce it.
	pub fn call_timeout(mut self, timeout: Duration) -> Self {
		self.call_timeout = timeout;
		self
	}
}
