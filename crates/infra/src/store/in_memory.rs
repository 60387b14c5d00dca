use std::sync::RwLock;

use usergate_core::DomainResult;

use super::{Directory, IdentityStore, StoreError};

/// In-memory identity store for tests/dev.
///
/// Writes are staged on a clone of the directory and swapped in on success,
/// so a failed transaction leaves no partial state behind. Directory tables
/// are copy-on-write, so staging copies only what the transaction changes.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    inner: RwLock<Directory>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for InMemoryIdentityStore {
    fn read<R>(&self, f: impl FnOnce(&Directory) -> DomainResult<R>) -> Result<R, StoreError> {
        let directory = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&*directory)?)
    }

    fn transaction<R>(
        &self,
        f: impl FnOnce(&mut Directory) -> DomainResult<R>,
    ) -> Result<R, StoreError> {
        let mut directory = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        let mut staged = directory.clone();
        let out = f(&mut staged)?;
        *directory = staged;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use usergate_auth::GroupName;
    use usergate_core::DomainError;

    use super::*;

    #[test]
    fn failed_transaction_leaves_no_trace() {
        let store = InMemoryIdentityStore::new();
        let name = GroupName::parse("half_done").unwrap();

        let result: Result<(), _> = store.transaction(|dir| {
            dir.insert_group(name.clone())?;
            Err(DomainError::validation("abort"))
        });

        assert!(matches!(result, Err(StoreError::Domain(DomainError::Validation(_)))));
        assert!(!store.read(|dir| Ok(dir.has_group(&name))).unwrap());
    }

    #[test]
    fn concurrent_duplicate_creates_resolve_to_one_success() {
        let store = Arc::new(InMemoryIdentityStore::new());
        let name = GroupName::parse("contended").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let name = name.clone();
                std::thread::spawn(move || store.transaction(|dir| dir.insert_group(name)))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let duplicates = results
            .iter()
            .filter(|r| matches!(r, Err(StoreError::Domain(DomainError::Validation(_)))))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(duplicates, 7);
    }
}
