//! In-memory transport for unit tests.

use std::sync::{
    atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering},
    Mutex,
};

use async_trait::async_trait;
use countdown_core::{ConversationId, MessageRef, Transport, TransportError, View};
use tokio::time::Instant;

#[derive(Default)]
pub(crate) struct RecordingTransport {
    sent: Mutex<Vec<(ConversationId, View)>>,
    edits: Mutex<Vec<(MessageRef, View)>>,
    edit_times: Mutex<Vec<Instant>>,
    deleted: Mutex<Vec<MessageRef>>,
    pinned: Mutex<Vec<MessageRef>>,
    fail_edits: AtomicBool,
    hang_edits: AtomicBool,
    /// 1-based number of the one edit call that hangs; 0 for none.
    hang_edit_number: AtomicUsize,
    edit_calls: AtomicUsize,
    next_id: AtomicI64,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<(ConversationId, View)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn edits(&self) -> Vec<(MessageRef, View)> {
        self.edits.lock().unwrap().clone()
    }

    /// When each successful edit landed.
    pub fn edit_times(&self) -> Vec<Instant> {
        self.edit_times.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<MessageRef> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn pinned(&self) -> Vec<MessageRef> {
        self.pinned.lock().unwrap().clone()
    }

    /// Make every edit fail as if the message had been deleted.
    pub fn fail_edits(&self, on: bool) {
        self.fail_edits.store(on, Ordering::SeqCst);
    }

    /// Make every edit hang until the caller's timeout fires.
    pub fn hang_edits(&self, on: bool) {
        self.hang_edits.store(on, Ordering::SeqCst);
    }

    /// Make only the `n`-th edit call (counting from 1) hang.
    pub fn hang_edit_number(&self, n: usize) {
        self.hang_edit_number.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_message(
        &self,
        conversation: ConversationId,
        view: &View,
    ) -> Result<MessageRef, TransportError> {
        let id = 1_000 + self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push((conversation, view.clone()));
        Ok(MessageRef::new(conversation.0, id))
    }

    async fn edit_message(&self, message: &MessageRef, view: &View) -> Result<(), TransportError> {
        let call = self.edit_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.hang_edits.load(Ordering::SeqCst)
            || call == self.hang_edit_number.load(Ordering::SeqCst)
        {
            std::future::pending::<()>().await;
        }
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(TransportError::MessageNotFound(message.to_string()));
        }
        self.edits.lock().unwrap().push((*message, view.clone()));
        self.edit_times.lock().unwrap().push(Instant::now());
        Ok(())
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<(), TransportError> {
        self.deleted.lock().unwrap().push(*message);
        Ok(())
    }

    async fn pin_message(&self, message: &MessageRef) -> Result<(), TransportError> {
        self.pinned.lock().unwrap().push(*message);
        Ok(())
    }
}
