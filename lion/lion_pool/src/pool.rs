//! Bounded pool of reusable resources.
//!
//! Idle resources live in a bounded channel that the pool holds both ends of,
//! so taking and returning a resource are non-blocking `try_recv`/`try_send`
//! calls. The channel sits behind a read-write lock: `get`, `put` and `len`
//! share it for the duration of a single channel operation, while `destroy`
//! takes it exclusively to remove and drain the store in one step.

use crate::config::PoolConfig;
use crate::error::{BoxError, PoolError, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, info, trace, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

type CreateFn<T> = Box<dyn Fn() -> std::result::Result<T, BoxError> + Send + Sync>;
type ValidateFn<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;
type DisposeFn<T> = Box<dyn Fn(T) + Send + Sync>;

/// Lifecycle state of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolState {
    /// The pool hands out and accepts resources
    Open,
    /// The pool has been destroyed; this state is terminal
    Closed,
}

/// Statistics about a pool
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Resources successfully produced by the `create` callback
    pub created: usize,

    /// Calls to `create` that returned an error
    pub create_failures: usize,

    /// Idle resources handed out by `get`
    pub reused: usize,

    /// Idle resources dropped because validation rejected them
    pub discarded: usize,

    /// Resources accepted back into the idle store by `put`
    pub returned: usize,

    /// Resources handed to `dispose` (surplus, drained, or put after close)
    pub disposed: usize,
}

#[derive(Debug, Default)]
struct Counters {
    created: AtomicUsize,
    create_failures: AtomicUsize,
    reused: AtomicUsize,
    discarded: AtomicUsize,
    returned: AtomicUsize,
    disposed: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PoolStats {
        PoolStats {
            created: self.created.load(Ordering::Relaxed),
            create_failures: self.create_failures.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            returned: self.returned.load(Ordering::Relaxed),
            disposed: self.disposed.load(Ordering::Relaxed),
        }
    }
}

/// The idle store. Dropping the sender closes it for inserts.
struct Store<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
}

/// A bounded pool of reusable resources.
///
/// The pool caches at most `max_size` idle resources. Resources checked out
/// with [`get`](Pool::get) are owned by the caller and are not counted
/// against the bound; the pool never waits for one to come back; it creates
/// a fresh resource instead.
pub struct Pool<T> {
    /// Idle resources, `None` once the pool is destroyed
    store: RwLock<Option<Store<T>>>,

    /// Capacity settings for this pool
    config: PoolConfig,

    create: Option<CreateFn<T>>,
    validate: Option<ValidateFn<T>>,
    dispose: Option<DisposeFn<T>>,

    counters: Counters,
}

impl<T> Pool<T> {
    /// Create a pool holding at most `max_size` idle resources and seed it
    /// with `initial_size` resources made by `create`.
    ///
    /// Construction is all-or-nothing: if `create` fails while seeding, the
    /// resources made so far are released and the error is returned.
    pub fn new<F, E>(initial_size: usize, max_size: usize, create: F) -> Result<Self>
    where
        F: Fn() -> std::result::Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        PoolBuilder::new(PoolConfig::new(initial_size, max_size))
            .create(create)
            .build()
    }

    /// Start building a pool with validation and disposal callbacks
    pub fn builder(config: PoolConfig) -> PoolBuilder<T> {
        PoolBuilder::new(config)
    }

    /// Take a resource from the idle store, or create a fresh one if the
    /// store is empty.
    ///
    /// Idle resources are checked with the `validate` callback, if any. A
    /// resource that fails validation is dropped without being disposed and
    /// the next idle resource is tried. Freshly created resources are not
    /// validated.
    pub fn get(&self) -> Result<T> {
        loop {
            let resource = match self.take_idle()? {
                Some(resource) => resource,
                None => return self.create_resource(),
            };

            if let Some(validate) = &self.validate {
                if !validate(&resource) {
                    trace!("Discarding idle resource that failed validation");
                    Counters::bump(&self.counters.discarded);
                    drop(resource);
                    continue;
                }
            }

            trace!("Reusing idle resource");
            Counters::bump(&self.counters.reused);
            return Ok(resource);
        }
    }

    /// Check out a resource wrapped in a guard that puts it back on drop
    pub fn acquire(&self) -> Result<Pooled<'_, T>> {
        let resource = self.get()?;
        Ok(Pooled {
            resource: Some(resource),
            pool: self,
        })
    }

    /// Return a resource to the pool.
    ///
    /// If the idle store is full, or the pool has been destroyed, the
    /// resource is handed to the `dispose` callback instead (or simply
    /// dropped when none is configured).
    pub fn put(&self, resource: T) {
        match self.try_store(resource) {
            None => {
                Counters::bump(&self.counters.returned);
            }
            Some(surplus) => {
                debug!("Idle store full or closed, disposing surplus resource");
                self.dispose_resource(surplus);
            }
        }
    }

    /// Destroy the pool, disposing every idle resource.
    ///
    /// Calling this more than once is a no-op. Resources currently checked out
    /// are not reachable from the pool and are left to their holders. The
    /// `dispose` callback runs under the pool's exclusive lock here and must
    /// not call back into the pool.
    pub fn destroy(&self) {
        let mut store = self.store.write();

        let Some(Store { sender, receiver }) = store.take() else {
            trace!("Pool already destroyed");
            return;
        };

        info!("Destroying resource pool...");

        drop(sender);

        let mut drained = 0;
        for resource in receiver.try_iter() {
            self.dispose_resource(resource);
            drained += 1;
        }

        info!("Resource pool destroyed, {} idle resources disposed", drained);
    }

    /// Number of idle resources. Advisory under concurrent use.
    pub fn len(&self) -> usize {
        self.store
            .read()
            .as_ref()
            .map_or(0, |store| store.receiver.len())
    }

    /// Whether the idle store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of idle resources this pool keeps
    pub fn capacity(&self) -> usize {
        self.config.max_size
    }

    /// Current lifecycle state
    pub fn state(&self) -> PoolState {
        if self.store.read().is_some() {
            PoolState::Open
        } else {
            PoolState::Closed
        }
    }

    /// Whether the pool has been destroyed
    pub fn is_closed(&self) -> bool {
        self.state() == PoolState::Closed
    }

    /// Snapshot of the pool's lifecycle counters
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot()
    }

    fn seed(&self) -> Result<()> {
        for _ in 0..self.config.initial_size {
            let resource = self.create_resource()?;
            if let Some(surplus) = self.try_store(resource) {
                self.dispose_resource(surplus);
            }
        }
        Ok(())
    }

    fn take_idle(&self) -> Result<Option<T>> {
        let store = self.store.read();
        let store = store.as_ref().ok_or(PoolError::PoolClosed)?;
        Ok(store.receiver.try_recv().ok())
    }

    /// Offer a resource to the idle store, handing it back if rejected.
    fn try_store(&self, resource: T) -> Option<T> {
        let store = self.store.read();
        match store.as_ref() {
            Some(store) => store
                .sender
                .try_send(resource)
                .err()
                .map(TrySendError::into_inner),
            None => Some(resource),
        }
    }

    fn create_resource(&self) -> Result<T> {
        let create = self.create.as_ref().ok_or(PoolError::NoFactory)?;

        match create() {
            Ok(resource) => {
                debug!("Created new resource");
                Counters::bump(&self.counters.created);
                Ok(resource)
            }
            Err(e) => {
                debug!("Resource creation failed: {}", e);
                Counters::bump(&self.counters.create_failures);
                Err(PoolError::CreateFailed(e))
            }
        }
    }

    fn dispose_resource(&self, resource: T) {
        Counters::bump(&self.counters.disposed);
        if let Some(dispose) = &self.dispose {
            dispose(resource);
        }
    }
}

impl<T> Drop for Pool<T> {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("state", &self.state())
            .field("idle", &self.len())
            .field("max_size", &self.config.max_size)
            .field("validate", &self.validate.is_some())
            .field("dispose", &self.dispose.is_some())
            .finish()
    }
}

/// Builder for a [`Pool`] with optional callbacks
pub struct PoolBuilder<T> {
    config: PoolConfig,
    create: Option<CreateFn<T>>,
    validate: Option<ValidateFn<T>>,
    dispose: Option<DisposeFn<T>>,
}

impl<T> PoolBuilder<T> {
    /// Create a builder with the given capacity settings and no callbacks
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            create: None,
            validate: None,
            dispose: None,
        }
    }

    /// Set the number of resources created eagerly
    pub fn initial_size(mut self, initial_size: usize) -> Self {
        self.config.initial_size = initial_size;
        self
    }

    /// Set the maximum number of idle resources
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.config.max_size = max_size;
        self
    }

    /// Set the callback that makes new resources
    pub fn create<F, E>(mut self, create: F) -> Self
    where
        F: Fn() -> std::result::Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.create = Some(Box::new(
            move || -> std::result::Result<T, BoxError> { create().map_err(Into::into) },
        ));
        self
    }

    /// Set the health check applied to idle resources before reuse
    pub fn validate<F>(mut self, validate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.validate = Some(Box::new(validate));
        self
    }

    /// Set the callback that releases surplus and drained resources
    pub fn dispose<F>(mut self, dispose: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.dispose = Some(Box::new(dispose));
        self
    }

    /// Build the pool and create its initial resources
    pub fn build(self) -> Result<Pool<T>> {
        self.config.validate()?;

        if self.config.initial_size > 0 && self.create.is_none() {
            return Err(PoolError::NoFactory);
        }

        let (sender, receiver) = bounded(self.config.max_size);
        let pool = Pool {
            store: RwLock::new(Some(Store { sender, receiver })),
            config: self.config,
            create: self.create,
            validate: self.validate,
            dispose: self.dispose,
            counters: Counters::default(),
        };

        info!(
            "Initializing resource pool with {} resources (max {})",
            pool.config.initial_size, pool.config.max_size
        );

        if let Err(e) = pool.seed() {
            warn!("Failed to create resource during initialization: {}", e);
            pool.destroy();
            return Err(e);
        }

        debug!("Resource pool initialized with {} resources", pool.len());
        Ok(pool)
    }
}

/// A resource checked out of a [`Pool`] that returns itself on drop
pub struct Pooled<'a, T> {
    /// The resource itself, `None` only after it has been taken out
    resource: Option<T>,

    /// The pool the resource goes back to
    pool: &'a Pool<T>,
}

impl<'a, T> Pooled<'a, T> {
    /// Take the resource out of the guard so it is not returned to the pool
    pub fn detach(mut self) -> T {
        self.resource.take().expect("Resource missing")
    }

    /// The pool this resource belongs to
    pub fn pool(&self) -> &'a Pool<T> {
        self.pool
    }
}

impl<T> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.resource.as_ref().expect("Resource missing")
    }
}

impl<T> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.resource.as_mut().expect("Resource missing")
    }
}

impl<T> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            self.pool.put(resource);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Pooled<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource {
            Some(resource) => write!(f, "Pooled({:?})", resource),
            None => write!(f, "Pooled(detached)"),
        }
    }
}
