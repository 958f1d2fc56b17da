//! Process-wide request defaults
//!
//! Defaults are an explicit, independently testable store rather than
//! ambient state. Merge/override order: per-call options always win over the
//! store; within the store, later `merge` calls overwrite earlier ones.
//! There is no removal primitive.

use std::sync::{OnceLock, RwLock};

use crate::options::PartialOptions;

/// Low-priority configuration merged under every call's explicit options
#[derive(Debug, Default)]
pub struct DefaultsStore {
    inner: RwLock<PartialOptions>,
}

impl DefaultsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay a partial options value onto the store; present fields
    /// overwrite, absent fields leave the stored value alone.
    pub fn merge(&self, options: PartialOptions) {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let current = std::mem::take(&mut *guard);
        *guard = options.merged_over(&current);
    }

    /// A point-in-time copy of the stored defaults
    pub fn snapshot(&self) -> PartialOptions {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

static GLOBAL: OnceLock<DefaultsStore> = OnceLock::new();

/// The process-wide defaults store read by [`crate::request`]
pub fn global_defaults() -> &'static DefaultsStore {
    GLOBAL.get_or_init(DefaultsStore::new)
}

/// Merge a partial options value into the process-wide defaults.
///
/// Intended to be called once at startup; later calls overlay earlier ones.
pub fn configure(options: PartialOptions) {
    global_defaults().merge(options);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overlays_later_over_earlier() {
        let store = DefaultsStore::new();
        store.merge(PartialOptions {
            method: Some("POST".to_string()),
            timeout_ms: Some(1_000),
            ..PartialOptions::default()
        });
        store.merge(PartialOptions {
            timeout_ms: Some(2_000),
            ..PartialOptions::default()
        });

        let snapshot = store.snapshot();
        assert_eq!(snapshot.method.as_deref(), Some("POST"));
        assert_eq!(snapshot.timeout_ms, Some(2_000));
    }

    #[test]
    fn test_absent_fields_do_not_clear() {
        let store = DefaultsStore::new();
        store.merge(PartialOptions {
            accept: Some("application/json".to_string()),
            ..PartialOptions::default()
        });
        store.merge(PartialOptions::default());
        assert_eq!(
            store.snapshot().accept.as_deref(),
            Some("application/json")
        );
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let store = DefaultsStore::new();
        store.merge(PartialOptions {
            credentials: Some(true),
            ..PartialOptions::default()
        });
        let snapshot = store.snapshot();
        store.merge(PartialOptions {
            credentials: Some(false),
            ..PartialOptions::default()
        });
        assert_eq!(snapshot.credentials, Some(true));
        assert_eq!(store.snapshot().credentials, Some(false));
    }
}
