//! Request-scoped tenant context backed by a tokio task-local.
//!
//! Every request runs inside [`TenantContext::scope`]; code anywhere below the
//! handler can read the tenant without threading it through parameters.
//! Concurrent requests each own a separate slot.

use crate::error::TenantError;
use crate::tenant::TenantId;
use std::cell::RefCell;
use std::future::Future;

tokio::task_local! {
    static CURRENT_TENANT: RefCell<Option<TenantId>>;
}

pub struct TenantContext;

impl TenantContext {
    /// Run `fut` with a fresh tenant slot, optionally pre-bound. The slot is cleared
    /// when `fut` completes or is dropped.
    pub async fn scope<F>(initial: Option<TenantId>, fut: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_TENANT
            .scope(RefCell::new(initial), async move {
                let _guard = ClearOnDrop;
                fut.await
            })
            .await
    }

    /// Bind `tenant_id` to the current request scope.
    pub fn set(tenant_id: TenantId) -> Result<(), TenantError> {
        CURRENT_TENANT
            .try_with(|slot| {
                *slot.borrow_mut() = Some(tenant_id);
            })
            .map_err(|_| TenantError::ContextScopeMissing)
    }

    pub fn get() -> Option<TenantId> {
        CURRENT_TENANT
            .try_with(|slot| slot.borrow().clone())
            .ok()
            .flatten()
    }

    pub fn require() -> Result<TenantId, TenantError> {
        Self::get().ok_or(TenantError::MissingTenantContext)
    }

    pub fn is_set() -> bool {
        Self::get().is_some()
    }

    /// Remove the binding. A no-op outside a scope.
    pub fn clear() {
        let _ = CURRENT_TENANT.try_with(|slot| slot.borrow_mut().take());
    }
}

struct ClearOnDrop;

impl Drop for ClearOnDrop {
    fn drop(&mut self) {
        TenantContext::clear();
    }
}
