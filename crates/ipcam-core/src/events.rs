//! Resize notifications, delivered as an observer-registration interface
//! dispatched synchronously from the consumer thread. Modeled as a
//! consumer-owned queue drained at `tick()` rather than a direct callback
//! invoked under lock.

use crossbeam_channel::{unbounded, Receiver, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeEvent {
    pub width: u32,
    pub height: u32,
}

/// Registered observers plus the queue that decouples "a resize was detected
/// while the mutex was held" from "observers run with the mutex released."
pub struct EventBus {
    tx: Sender<ResizeEvent>,
    rx: Receiver<ResizeEvent>,
    observers: Vec<Box<dyn Fn(ResizeEvent) + Send>>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        EventBus {
            tx,
            rx,
            observers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, observer: Box<dyn Fn(ResizeEvent) + Send>) {
        self.observers.push(observer);
    }

    /// Enqueue a resize event detected while the mutex was held. Must be
    /// called only after the lock has been released.
    pub fn enqueue(&self, event: ResizeEvent) {
        let _ = self.tx.send(event);
    }

    /// Drain and dispatch every queued event to every observer, in order.
    /// Called once per `tick()`.
    pub fn dispatch_pending(&self) {
        for event in self.rx.try_iter() {
            for observer in &self.observers {
                observer(event);
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
