use std::sync::Mutex;

/// Shutdown gate shared between the loop and its producers.
///
/// Producers check the flag and enqueue under the lock; the loop flips the
/// flag and then drains its channels, so a producer that enqueued just
/// before the flip is always released. Only unbounded senders may be used
/// here: the send must never block while the lock is held.
pub(crate) struct Liveness {
	dead: Mutex<bool>,
}

impl Liveness {
	pub(crate) fn new() -> Self {
		Liveness {
			dead: Mutex::new(false),
		}
	}

	/// Sends unless the loop is dead. Returns whether the message was
	/// enqueued.
	pub(crate) fn send<T>(&self, tx: &flume::Sender<T>, value: T) -> bool {
		let dead = self.dead.lock().unwrap();
		if *dead {
			return false;
		}
		tx.send(value).is_ok()
	}

	pub(crate) fn kill(&self) {
		*self.dead.lock().unwrap() = true;
	}
}
