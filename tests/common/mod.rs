use async_trait::async_trait;
use futures::stream;
use std::sync::Mutex;

use nitibot::conversation::StreamUpdate;
use nitibot::transport::{ ChatRequest, ChatTransport, TransportError, UpdateStream };

/// Replies to every request with the same chunks and remembers each request.
pub struct ScriptedTransport {
    chunks: Vec<String>,
    pub sent: Mutex<Vec<ChatRequest>>,
}

impl ScriptedTransport {
    pub fn replying(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|r| r.text.clone()).collect()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn send(&self, request: ChatRequest) -> Result<UpdateStream, TransportError> {
        self.sent.lock().unwrap().push(request);
        let updates: Vec<Result<StreamUpdate, TransportError>> = self.chunks
            .iter()
            .map(|c| Ok(StreamUpdate::TextDelta(c.clone())))
            .collect();
        Ok(Box::pin(stream::iter(updates)))
    }
}
