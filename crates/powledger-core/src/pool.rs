use crate::{error::InputError, now, Transaction};
use parking_lot::Mutex;
use serde::Deserialize;

/// Submit payload. Missing fields decode as empty strings and are rejected by
/// [`TransactionPool::submit`].
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewTransaction {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub content: String,
}

/// Unconfirmed transactions waiting for the next block. Unbounded and not
/// deduplicated.
#[derive(Debug, Default)]
pub struct TransactionPool {
    pending: Mutex<Vec<Transaction>>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamps the transaction with the current time and queues it.
    pub fn submit(&self, tx: NewTransaction) -> Result<Transaction, InputError> {
        if tx.author.is_empty() {
            return Err(InputError::MissingField("author"));
        }
        if tx.content.is_empty() {
            return Err(InputError::MissingField("content"));
        }
        let tx = Transaction {
            author: tx.author,
            content: tx.content,
            timestamp: now(),
        };
        self.pending.lock().push(tx.clone());
        Ok(tx)
    }

    /// Takes every pending transaction, leaving the pool empty.
    pub fn drain(&self) -> Vec<Transaction> {
        std::mem::take(&mut *self.pending.lock())
    }

    /// Puts drained transactions back ahead of anything submitted since.
    pub fn requeue(&self, mut txs: Vec<Transaction>) {
        if txs.is_empty() {
            return;
        }
        let mut pending = self.pending.lock();
        txs.append(&mut pending);
        *pending = txs;
    }

    pub fn pending(&self) -> Vec<Transaction> {
        self.pending.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_tx(author: &str, content: &str) -> NewTransaction {
        NewTransaction {
            author: author.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn submit_stamps_and_queues() {
        let pool = TransactionPool::new();
        let tx = pool.submit(new_tx("a", "hi")).unwrap();
        assert_eq!(tx.author, "a");
        assert_eq!(tx.content, "hi");
        assert!(tx.timestamp > 0.0);
        assert_eq!(pool.pending(), vec![tx]);
    }

    #[test]
    fn submit_rejects_missing_fields() {
        let pool = TransactionPool::new();
        assert_eq!(
            pool.submit(new_tx("", "hi")),
            Err(InputError::MissingField("author"))
        );
        assert_eq!(
            pool.submit(new_tx("a", "")),
            Err(InputError::MissingField("content"))
        );
        let decoded: NewTransaction = serde_json::from_str(r#"{"author":"a"}"#).unwrap();
        assert_eq!(
            pool.submit(decoded),
            Err(InputError::MissingField("content"))
        );
        assert!(pool.is_empty());
    }

    #[test]
    fn duplicates_are_kept() {
        let pool = TransactionPool::new();
        pool.submit(new_tx("a", "same")).unwrap();
        pool.submit(new_tx("a", "same")).unwrap();
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn drain_empties_pool() {
        let pool = TransactionPool::new();
        pool.submit(new_tx("a", "1")).unwrap();
        pool.submit(new_tx("b", "2")).unwrap();
        let drained = pool.drain();
        assert_eq!(drained.len(), 2);
        assert!(pool.is_empty());
        assert!(pool.drain().is_empty());
    }

    #[test]
    fn requeue_keeps_original_order_first() {
        let pool = TransactionPool::new();
        pool.submit(new_tx("a", "1")).unwrap();
        pool.submit(new_tx("b", "2")).unwrap();
        let drained = pool.drain();
        pool.submit(new_tx("c", "3")).unwrap();
        pool.requeue(drained);
        let contents: Vec<_> = pool.pending().into_iter().map(|t| t.content).collect();
        assert_eq!(contents, vec!["1", "2", "3"]);
    }
}
