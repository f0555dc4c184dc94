use std::any::{Any, TypeId};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ContractError, Result};
use crate::store::ManagedStore;

/// Factory that hands out store instances by type.
///
/// Return `None` for types the factory does not know about.
pub type Factory = dyn Fn(TypeId) -> Option<Arc<dyn Any + Send + Sync>> + Send + Sync;

/// Holder for the optional store factory of a runtime.
#[derive(Default)]
pub(crate) struct ResolverSlot {
    factory: RwLock<Option<Arc<Factory>>>,
}

impl ResolverSlot {
    pub(crate) fn install(&self, factory: Arc<Factory>) {
        *self.factory.write() = Some(factory);
    }

    pub(crate) fn clear(&self) {
        *self.factory.write() = None;
    }

    pub(crate) fn is_installed(&self) -> bool {
        self.factory.read().is_some()
    }

    pub(crate) fn resolve<T: ManagedStore>(&self) -> Result<Arc<T>> {
        let expected = std::any::type_name::<T>();
        // Clone out so the factory may itself resolve other stores.
        let factory = self
            .factory
            .read()
            .clone()
            .ok_or(ContractError::ResolverMissing { expected })?;

        let instance = factory(TypeId::of::<T>()).ok_or(ContractError::Unresolved { expected })?;
        instance
            .downcast::<T>()
            .map_err(|_| ContractError::ResolverMismatch { expected })
    }
}
