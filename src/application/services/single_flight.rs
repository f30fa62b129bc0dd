use crate::domain::value_objects::DocumentId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Per-document operation tokens. Holding a document's token is what makes
/// saves, finalizes and reconciliation mutually exclusive for that document
/// while leaving every other document free to proceed.
#[derive(Default)]
pub struct SingleFlight {
    tokens: Mutex<HashMap<DocumentId, Arc<tokio::sync::Mutex<()>>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self, id: &DocumentId) -> Arc<tokio::sync::Mutex<()>> {
        let mut tokens = self.tokens.lock().expect("single-flight registry poisoned");
        tokens
            .entry(id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drops the token for a document that no longer exists locally.
    pub fn release(&self, id: &DocumentId) {
        let mut tokens = self.tokens.lock().expect("single-flight registry poisoned");
        tokens.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn doc(id: &str) -> DocumentId {
        DocumentId::new(id.to_string()).unwrap()
    }

    #[tokio::test]
    async fn same_document_operations_are_serialized() {
        let flight = Arc::new(SingleFlight::new());
        let token = flight.token(&doc("doc-1"));

        let guard = token.lock().await;
        let second = flight.token(&doc("doc-1"));
        assert!(second.try_lock().is_err());
        drop(guard);
        assert!(second.try_lock().is_ok());
    }

    #[tokio::test]
    async fn different_documents_proceed_in_parallel() {
        let flight = Arc::new(SingleFlight::new());
        let a = flight.token(&doc("doc-a"));
        let b = flight.token(&doc("doc-b"));

        let _guard_a = a.lock().await;
        let acquired =
            tokio::time::timeout(Duration::from_millis(50), b.lock()).await;
        assert!(acquired.is_ok());
    }
}
