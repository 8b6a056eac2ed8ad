//! The process-wide "current class" cell.
//!
//! The control channel is the only writer; every HTTP handler is a reader.
//! A `tokio::sync::watch` channel fits exactly: writes replace the whole
//! value atomically, readers always see the latest one, and nobody waits
//! on anybody.
//!
//! ```text
//! ControlChannel ──set()──→ ClassCell ══watch══→ ClassView (cloned per handler)
//! ```

use serde_json::Value;
use tokio::sync::watch;

/// The writable side. Owned by the control channel.
#[derive(Debug)]
pub struct ClassCell {
    sender: watch::Sender<Option<Value>>,
}

impl ClassCell {
    /// An empty cell: no class has been announced yet.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender }
    }

    /// Replaces the current class. Readers see it on their next read.
    pub fn set(&self, class: Value) {
        // `send_replace` succeeds even when no view is alive.
        self.sender.send_replace(Some(class));
    }

    /// A new read-only view of this cell.
    pub fn view(&self) -> ClassView {
        ClassView {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for ClassCell {
    fn default() -> Self {
        Self::new()
    }
}

/// A read-only view of the current class. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ClassView {
    receiver: watch::Receiver<Option<Value>>,
}

impl ClassView {
    /// The latest class, or `None` if the authority hasn't announced one.
    pub fn current(&self) -> Option<Value> {
        self.receiver.borrow().clone()
    }

    /// Waits until the class changes after the last `current`/`changed`
    /// call on this view, then returns the new value.
    ///
    /// Returns `None` once the owning [`ClassCell`] is gone.
    pub async fn changed(&mut self) -> Option<Value> {
        self.receiver.changed().await.ok()?;
        self.receiver.borrow_and_update().clone()
    }
}
