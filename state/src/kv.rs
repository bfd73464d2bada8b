use std::collections::BTreeMap;
use std::sync::RwLock;

/// Failure of the underlying store.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KvError(pub String);

impl core::fmt::Display for KvError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for KvError {}

/// One operation inside a [`WriteBatch`].
#[derive(Clone, Debug)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// An atomic group of writes. Dropping an uncommitted batch discards it.
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    #[must_use]
    pub const fn new() -> Self {
        Self { ops: Vec::new() }
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(BatchOp::Put { key, value });
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(BatchOp::Delete { key });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// The byte-keyed store the whole chain persists into. Batches commit
/// atomically; readers see either none or all of a batch.
pub trait KeyValueStore: Send + Sync {
    /// # Errors
    /// `KvError` on backend failure.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError>;

    /// # Errors
    /// `KvError` on backend failure; the batch must not partially apply.
    fn write(&self, batch: WriteBatch) -> Result<(), KvError>;
}

/// In-memory store for tests and light tooling.
#[derive(Debug, Default)]
pub struct MemoryKv {
    inner: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryKv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().expect("lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryKv {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.inner.read().expect("lock poisoned").get(key).cloned())
    }

    fn write(&self, batch: WriteBatch) -> Result<(), KvError> {
        let mut inner = self.inner.write().expect("lock poisoned");
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => {
                    inner.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    inner.remove(&key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_applies_in_order() {
        let kv = MemoryKv::new();
        let mut batch = WriteBatch::new();
        batch.put(b"a".to_vec(), b"1".to_vec());
        batch.put(b"a".to_vec(), b"2".to_vec());
        batch.delete(b"b".to_vec());
        kv.write(batch).unwrap();
        assert_eq!(kv.get(b"a").unwrap(), Some(b"2".to_vec()));
        assert_eq!(kv.get(b"b").unwrap(), None);
    }
}
