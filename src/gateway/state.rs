use std::sync::Arc;

use crate::cache::remote::RemoteStore;
use crate::proxy::ProxyCore;
use crate::upstream::Origin;

/// Shared handler state: one [`ProxyCore`] behind an `Arc`.
pub struct HandlerState<R: RemoteStore, O: Origin + 'static> {
    pub core: Arc<ProxyCore<R, O>>,
}

// Manual impl so cloning does not require `R: Clone` or `O: Clone`.
impl<R: RemoteStore, O: Origin + 'static> Clone for HandlerState<R, O> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<R: RemoteStore, O: Origin + 'static> HandlerState<R, O> {
    pub fn new(core: Arc<ProxyCore<R, O>>) -> Self {
        Self { core }
    }
}
