use crate::{errors::Error, Pcct};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// Handle ID type - safer than raw pointers
pub type HandleId = u64;

type Shared = Arc<RwLock<Pcct>>;

/// Global handle registry for managing Pcct instances.
///
/// Each table sits behind its own `RwLock`: lookups from any number of
/// threads share the read side, the owning worker takes the write side.
struct HandleRegistry {
    tables: DashMap<HandleId, Shared>,
    ids: DashMap<String, HandleId>,
    next_id: AtomicU64,
}

impl HandleRegistry {
    fn new() -> Self {
        Self {
            tables: DashMap::new(),
            ids: DashMap::new(),
            next_id: AtomicU64::new(1), // Start from 1, reserve 0 for null/invalid
        }
    }

    /// Register a new Pcct and return its handle ID. Table identifiers must
    /// be unique among registered tables.
    fn register(&self, pcct: Pcct) -> Result<HandleId, Error> {
        match self.ids.entry(pcct.id().to_string()) {
            Entry::Occupied(o) => Err(Error::DuplicateId(o.key().clone())),
            Entry::Vacant(v) => {
                let handle_id = self.next_id.fetch_add(1, Ordering::SeqCst);
                self.tables.insert(handle_id, Arc::new(RwLock::new(pcct)));
                v.insert(handle_id);
                Ok(handle_id)
            }
        }
    }

    /// Get a shared reference to a Pcct by handle ID. The map guard is
    /// released before the caller locks the table.
    fn get(&self, handle_id: HandleId) -> Result<Shared, Error> {
        if handle_id == 0 {
            return Err(Error::InvalidHandle);
        }
        self.tables
            .get(&handle_id)
            .map(|t| Arc::clone(t.value()))
            .ok_or(Error::InvalidHandle)
    }

    /// Remove a Pcct from the registry. It is closed once the last in-flight
    /// user lets go.
    fn unregister(&self, handle_id: HandleId) -> Result<(), Error> {
        if handle_id == 0 {
            return Err(Error::InvalidHandle);
        }
        let (_, shared) = self
            .tables
            .remove(&handle_id)
            .ok_or(Error::InvalidHandle)?;
        // a poisoned table still gives up its identifier
        let id = shared
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .id()
            .to_string();
        self.ids.remove(&id);
        if let Ok(lock) = Arc::try_unwrap(shared) {
            lock.into_inner().unwrap_or_else(PoisonError::into_inner).close();
        }
        Ok(())
    }
}

static REGISTRY: OnceLock<HandleRegistry> = OnceLock::new();

fn get_registry() -> &'static HandleRegistry {
    REGISTRY.get_or_init(HandleRegistry::new)
}

/// Register a new Pcct and return its handle ID
pub fn register_table(pcct: Pcct) -> Result<HandleId, Error> {
    get_registry().register(pcct)
}

/// Execute a function with a shared reference to the Pcct identified by handle_id
pub fn with_table<T, F>(handle_id: HandleId, f: F) -> Result<T, Error>
where
    F: FnOnce(&Pcct) -> T,
{
    let shared = get_registry().get(handle_id)?;
    let guard = shared.read().map_err(|_| Error::InvalidHandle)?;
    Ok(f(&guard))
}

/// Execute a function with a mutable reference to the Pcct identified by handle_id
pub fn with_table_mut<T, F>(handle_id: HandleId, f: F) -> Result<T, Error>
where
    F: FnOnce(&mut Pcct) -> T,
{
    let shared = get_registry().get(handle_id)?;
    let mut guard = shared.write().map_err(|_| Error::InvalidHandle)?;
    Ok(f(&mut guard))
}

/// Unregister and close a Pcct
pub fn unregister_table(handle_id: HandleId) -> Result<(), Error> {
    get_registry().unregister(handle_id)
}
