//! Duplicate-invocation guard keyed on (alert, strategy)
//!
//! Mirrors the UI rule of disabling the export button while a request runs:
//! a second export for the same alert and strategy is rejected until the
//! first finishes, while queued and direct exports for one alert may run
//! side by side.

use crate::error::{Error, Result};
use crate::types::{AlertId, Strategy};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

type Key = (AlertId, Strategy);

/// Set of in-flight export keys
#[derive(Clone, Debug, Default)]
pub(crate) struct InFlightMap {
    keys: Arc<Mutex<HashSet<Key>>>,
}

impl InFlightMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<Key>> {
        // The critical sections never panic, but a poisoned set is still
        // just a set of keys
        self.keys.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claim the key, failing if an identical export is already running
    ///
    /// The returned guard releases the key on drop, on every exit path.
    pub(crate) fn try_acquire(&self, alert_id: &AlertId, strategy: Strategy) -> Result<InFlightGuard> {
        let key = (alert_id.clone(), strategy);
        let mut keys = self.lock();
        if !keys.insert(key.clone()) {
            return Err(Error::AlreadyInFlight {
                alert_id: alert_id.clone(),
                strategy,
            });
        }
        drop(keys);
        Ok(InFlightGuard {
            map: self.clone(),
            key,
        })
    }
}

/// RAII release of an in-flight key
#[derive(Debug)]
pub(crate) struct InFlightGuard {
    map: InFlightMap,
    key: Key,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.map.lock().remove(&self.key);
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_of_same_key_is_rejected() {
        let map = InFlightMap::new();
        let alert = AlertId::new("A1");

        let _guard = map.try_acquire(&alert, Strategy::Queued).unwrap();
        let err = map.try_acquire(&alert, Strategy::Queued).unwrap_err();
        assert!(matches!(err, Error::AlreadyInFlight { .. }));
    }

    #[test]
    fn different_strategies_for_one_alert_coexist() {
        let map = InFlightMap::new();
        let alert = AlertId::new("A1");

        let _queued = map.try_acquire(&alert, Strategy::Queued).unwrap();
        assert!(map.try_acquire(&alert, Strategy::Direct).is_ok());
    }

    #[test]
    fn different_alerts_coexist() {
        let map = InFlightMap::new();

        let _a = map.try_acquire(&AlertId::new("A1"), Strategy::Queued).unwrap();
        assert!(map.try_acquire(&AlertId::new("A2"), Strategy::Queued).is_ok());
    }

    #[test]
    fn drop_releases_the_key() {
        let map = InFlightMap::new();
        let alert = AlertId::new("A1");

        {
            let _guard = map.try_acquire(&alert, Strategy::Queued).unwrap();
        }
        assert!(map.try_acquire(&alert, Strategy::Queued).is_ok());
    }

    #[tokio::test]
    async fn concurrent_acquires_admit_exactly_one() {
        let map = InFlightMap::new();
        let alert = AlertId::new("A1");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let map = map.clone();
            let alert = alert.clone();
            handles.push(tokio::spawn(async move {
                match map.try_acquire(&alert, Strategy::Queued) {
                    Ok(guard) => {
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        drop(guard);
                        true
                    }
                    Err(_) => false,
                }
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert!(admitted >= 1, "at least one export must be admitted");
        assert!(admitted < 8, "simultaneous duplicates must be rejected");
    }
}
