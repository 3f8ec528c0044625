//! Cached area-code reference data.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use consync_core::{parse_area_hierarchy, AreaCode, Token};
use consync_gateway::{GatewayError, RemoteGateway};

/// Cache key used when no province filter is given.
pub const ALL_PROVINCES_KEY: &str = "ALL";

/// Area hierarchy per province filter.
///
/// A miss fetches under the lock, so two concurrent misses on the same key
/// produce one remote call. Responses with a failed state are returned but
/// not cached.
pub struct AreaCodeCache {
    gateway: Arc<dyn RemoteGateway>,
    entries: Mutex<HashMap<String, Arc<Vec<AreaCode>>>>,
}

impl AreaCodeCache {
    pub fn new(gateway: Arc<dyn RemoteGateway>) -> Self {
        Self {
            gateway,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(
        &self,
        token: &Token,
        province: Option<&str>,
    ) -> Result<Arc<Vec<AreaCode>>, GatewayError> {
        let province = province.filter(|p| !p.is_empty());
        let key = province.unwrap_or(ALL_PROVINCES_KEY).to_string();

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(hit) = entries.get(&key) {
            return Ok(Arc::clone(hit));
        }

        let response = self.gateway.query_area_codes(token, province)?;
        let codes = Arc::new(parse_area_hierarchy(&response));
        if response.is_success() {
            tracing::debug!(key = %key, count = codes.len(), "area codes cached");
            entries.insert(key, Arc::clone(&codes));
        } else {
            tracing::warn!(key = %key, "area query failed; not caching");
        }
        Ok(codes)
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
