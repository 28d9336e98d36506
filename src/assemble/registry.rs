use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const URL_SCHEME: &str = "clip:stillmotion/";

/// Caller-owned table of finalized clips addressable by URL.
///
/// Stands in for the platform's object-URL store: a clip stays resolvable until its handle is
/// revoked. Clones share the same table, and every [`ClipHandle`] keeps it alive, so URLs
/// outlive the controller that produced them.
#[derive(Clone, Debug, Default)]
pub struct ClipRegistry {
    inner: Arc<Mutex<RegistryState>>,
}

#[derive(Debug, Default)]
struct RegistryState {
    next_id: u64,
    clips: HashMap<String, RegisteredClip>,
}

#[derive(Debug)]
struct RegisteredClip {
    bytes: Arc<[u8]>,
    content_type: &'static str,
}

impl ClipRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(
        &self,
        bytes: Arc<[u8]>,
        content_type: &'static str,
        extension: &str,
        fingerprint: u64,
    ) -> ClipHandle {
        let mut st = self.lock();
        let id = st.next_id;
        st.next_id += 1;
        let url = format!("{URL_SCHEME}{id:08}-{fingerprint:016x}.{extension}");
        st.clips.insert(
            url.clone(),
            RegisteredClip {
                bytes,
                content_type,
            },
        );
        ClipHandle {
            url,
            registry: Arc::clone(&self.inner),
        }
    }

    /// Bytes and content type behind `url`, if it is still live.
    pub fn resolve(&self, url: &str) -> Option<(Arc<[u8]>, &'static str)> {
        self.lock()
            .clips
            .get(url)
            .map(|c| (c.bytes.clone(), c.content_type))
    }

    /// Invalidate `url`. Returns `false` if it was not live.
    pub fn revoke(&self, url: &str) -> bool {
        let removed = self.lock().clips.remove(url).is_some();
        if removed {
            tracing::debug!(url, "clip revoked");
        }
        removed
    }

    /// Number of live clips.
    pub fn live_count(&self) -> usize {
        self.lock().clips.len()
    }
}

/// Revocable reference to a registered clip.
///
/// Dropping the handle does not revoke it; the caller decides when the clip goes away.
#[derive(Clone, Debug)]
pub struct ClipHandle {
    url: String,
    registry: Arc<Mutex<RegistryState>>,
}

impl ClipHandle {
    /// URL under which the clip resolves.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the clip is still resolvable.
    pub fn is_live(&self) -> bool {
        self.with_state(|st| st.clips.contains_key(&self.url))
    }

    /// Bytes behind the handle, if still live.
    pub fn resolve(&self) -> Option<Arc<[u8]>> {
        self.with_state(|st| st.clips.get(&self.url).map(|c| c.bytes.clone()))
    }

    /// Invalidate the clip. Returns `false` if it was already revoked.
    pub fn revoke(&self) -> bool {
        let removed = self.with_state(|st| st.clips.remove(&self.url).is_some());
        if removed {
            tracing::debug!(url = self.url.as_str(), "clip revoked");
        }
        removed
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut RegistryState) -> R) -> R {
        let mut st = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut st)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assemble/registry.rs"]
mod tests;
