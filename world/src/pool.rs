//! Recycling pool that hands out entity handles keyed by template.
//!
//! Pools grow on demand and never shrink: a released handle waits in its
//! template's idle queue until the next [`EntityPool::acquire`] for that
//! template. Handles are never reused across templates and never freed.

use std::collections::{HashMap, VecDeque};

use square_field_core::{EntityHandle, TemplateId};

/// Handle returned by [`EntityPool::acquire`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Acquired {
    /// Checked-out handle, inactive until [`EntityPool::activate`] is called.
    pub handle: EntityHandle,
    /// Whether the handle came from the idle queue rather than a new instance.
    pub reused: bool,
}

/// Result of handing a handle back to the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The handle was deactivated and queued for reuse.
    Pooled,
    /// The handle was already idle; the queue is left untouched.
    AlreadyIdle,
    /// The handle was destroyed earlier and can no longer be pooled.
    Retired,
    /// The handle was created outside the pool and must be destroyed instead.
    Unpooled,
    /// The handle belongs to a different template.
    TemplateMismatch,
    /// The pool never issued the handle.
    Unknown,
}

/// Instantiation counters for a single template.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of instances ever created for the template.
    pub instantiated: u32,
    /// Number of instances currently waiting in the idle queue.
    pub idle: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InstanceState {
    Idle,
    CheckedOut,
    Active,
    Destroyed,
}

#[derive(Clone, Copy, Debug)]
struct Instance {
    template: TemplateId,
    state: InstanceState,
    pooled: bool,
}

#[derive(Debug, Default)]
struct PoolEntry {
    idle: VecDeque<EntityHandle>,
    instantiated: u32,
}

/// Template-keyed recycle pool.
#[derive(Debug, Default)]
pub struct EntityPool {
    entries: HashMap<TemplateId, PoolEntry>,
    instances: Vec<Instance>,
}

impl EntityPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks out an idle instance of `template`, instantiating one if none is idle.
    pub fn acquire(&mut self, template: TemplateId) -> Acquired {
        let recycled = self
            .entries
            .get_mut(&template)
            .and_then(|entry| entry.idle.pop_front());

        if let Some(handle) = recycled {
            if let Some(instance) = self.instances.get_mut(handle.get() as usize) {
                instance.state = InstanceState::CheckedOut;
            }
            return Acquired {
                handle,
                reused: true,
            };
        }

        let handle = self.instantiate(template, InstanceState::CheckedOut, true);
        Acquired {
            handle,
            reused: false,
        }
    }

    /// Creates a pool-exempt instance that is later [`destroy`](Self::destroy)ed.
    pub fn instantiate_unpooled(&mut self, template: TemplateId) -> EntityHandle {
        self.instantiate(template, InstanceState::CheckedOut, false)
    }

    /// Pre-instantiates `count` idle instances of `template`.
    pub fn prewarm(&mut self, template: TemplateId, count: u32) {
        for _ in 0..count {
            let handle = self.instantiate(template, InstanceState::Idle, true);
            self.entries
                .entry(template)
                .or_default()
                .idle
                .push_back(handle);
        }
    }

    /// Marks a checked-out handle as active. Returns `false` for any other state.
    pub fn activate(&mut self, handle: EntityHandle) -> bool {
        match self.instances.get_mut(handle.get() as usize) {
            Some(instance) if instance.state == InstanceState::CheckedOut => {
                instance.state = InstanceState::Active;
                true
            }
            _ => false,
        }
    }

    /// Deactivates `handle` and queues it for reuse under `template`.
    ///
    /// Releasing a handle that is already idle, retired, unpooled, unknown, or
    /// owned by another template leaves every queue untouched.
    pub fn release(&mut self, template: TemplateId, handle: EntityHandle) -> ReleaseOutcome {
        let Some(instance) = self.instances.get_mut(handle.get() as usize) else {
            return ReleaseOutcome::Unknown;
        };

        if instance.template != template {
            return ReleaseOutcome::TemplateMismatch;
        }
        if !instance.pooled {
            return ReleaseOutcome::Unpooled;
        }

        match instance.state {
            InstanceState::Idle => ReleaseOutcome::AlreadyIdle,
            InstanceState::Destroyed => ReleaseOutcome::Retired,
            InstanceState::CheckedOut | InstanceState::Active => {
                instance.state = InstanceState::Idle;
                self.entries
                    .entry(template)
                    .or_default()
                    .idle
                    .push_back(handle);
                ReleaseOutcome::Pooled
            }
        }
    }

    /// Retires `handle` permanently. Returns `false` if it was idle, retired, or unknown.
    pub fn destroy(&mut self, handle: EntityHandle) -> bool {
        match self.instances.get_mut(handle.get() as usize) {
            Some(instance)
                if matches!(
                    instance.state,
                    InstanceState::CheckedOut | InstanceState::Active
                ) =>
            {
                instance.state = InstanceState::Destroyed;
                true
            }
            _ => false,
        }
    }

    /// Reports whether `handle` is currently active.
    #[must_use]
    pub fn is_active(&self, handle: EntityHandle) -> bool {
        self.state(handle) == Some(InstanceState::Active)
    }

    /// Reports whether `handle` is waiting in an idle queue.
    #[must_use]
    pub fn is_idle(&self, handle: EntityHandle) -> bool {
        self.state(handle) == Some(InstanceState::Idle)
    }

    /// Instantiation counters for `template`.
    #[must_use]
    pub fn stats(&self, template: TemplateId) -> PoolStats {
        self.entries
            .get(&template)
            .map(|entry| PoolStats {
                instantiated: entry.instantiated,
                idle: entry.idle.len(),
            })
            .unwrap_or_default()
    }

    /// Total number of instances the pool has created across all templates.
    #[must_use]
    pub fn total_instantiated(&self) -> usize {
        self.instances.len()
    }

    fn state(&self, handle: EntityHandle) -> Option<InstanceState> {
        self.instances
            .get(handle.get() as usize)
            .map(|instance| instance.state)
    }

    fn instantiate(
        &mut self,
        template: TemplateId,
        state: InstanceState,
        pooled: bool,
    ) -> EntityHandle {
        let handle = EntityHandle::new(self.instances.len() as u32);
        self.instances.push(Instance {
            template,
            state,
            pooled,
        });
        let entry = self.entries.entry(template).or_default();
        entry.instantiated = entry.instantiated.saturating_add(1);
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    const SQUARE: TemplateId = TemplateId::new(1);
    const ENEMY: TemplateId = TemplateId::new(2);

    #[test]
    fn empty_pool_instantiates_distinct_handles() {
        let mut pool = EntityPool::new();
        let first = pool.acquire(SQUARE);
        let second = pool.acquire(SQUARE);
        let third = pool.acquire(SQUARE);

        assert!(!first.reused && !second.reused && !third.reused);
        assert_ne!(first.handle, second.handle);
        assert_ne!(second.handle, third.handle);
        assert_ne!(first.handle, third.handle);
        assert_eq!(pool.stats(SQUARE).instantiated, 3);
    }

    #[test]
    fn released_handle_is_reused_before_instantiating() {
        let mut pool = EntityPool::new();
        let handles: Vec<_> = (0..3).map(|_| pool.acquire(SQUARE).handle).collect();

        assert_eq!(pool.release(SQUARE, handles[1]), ReleaseOutcome::Pooled);
        let again = pool.acquire(SQUARE);

        assert!(again.reused);
        assert_eq!(again.handle, handles[1]);
        assert_eq!(pool.stats(SQUARE).instantiated, 3);
    }

    #[test]
    fn double_release_leaves_queue_intact() {
        let mut pool = EntityPool::new();
        let handle = pool.acquire(SQUARE).handle;
        assert!(pool.activate(handle));

        assert_eq!(pool.release(SQUARE, handle), ReleaseOutcome::Pooled);
        assert_eq!(pool.release(SQUARE, handle), ReleaseOutcome::AlreadyIdle);
        assert_eq!(pool.stats(SQUARE).idle, 1);

        let reused = pool.acquire(SQUARE);
        let fresh = pool.acquire(SQUARE);
        assert!(reused.reused);
        assert!(!fresh.reused, "a double release must not queue a handle twice");
    }

    #[test]
    fn release_guards_template_and_unpooled_handles() {
        let mut pool = EntityPool::new();
        let enemy = pool.acquire(ENEMY).handle;
        let unique = pool.instantiate_unpooled(SQUARE);

        assert_eq!(pool.release(SQUARE, enemy), ReleaseOutcome::TemplateMismatch);
        assert_eq!(pool.release(SQUARE, unique), ReleaseOutcome::Unpooled);
        assert_eq!(
            pool.release(SQUARE, EntityHandle::new(99)),
            ReleaseOutcome::Unknown
        );

        assert!(pool.destroy(unique));
        assert!(!pool.destroy(unique));
        assert_eq!(pool.stats(SQUARE).idle, 0);
    }

    #[test]
    fn prewarmed_instances_are_handed_out_first() {
        let mut pool = EntityPool::new();
        pool.prewarm(SQUARE, 2);
        assert_eq!(pool.stats(SQUARE).idle, 2);

        let first = pool.acquire(SQUARE);
        let second = pool.acquire(SQUARE);
        let third = pool.acquire(SQUARE);
        assert!(first.reused && second.reused);
        assert!(!third.reused);
        assert_eq!(pool.stats(SQUARE).instantiated, 3);
    }

    #[test]
    fn live_handles_match_instantiations_minus_pending_releases() {
        let mut pool = EntityPool::new();
        let mut live = Vec::new();
        let mut rng = ChaCha8Rng::seed_from_u64(0x9e37_79b9);

        for _ in 0..500 {
            if rng.gen_bool(1.0 / 3.0) && !live.is_empty() {
                let index = rng.gen_range(0..live.len());
                let handle = live.swap_remove(index);
                assert_eq!(pool.release(SQUARE, handle), ReleaseOutcome::Pooled);
            } else {
                let acquired = pool.acquire(SQUARE);
                assert!(!live.contains(&acquired.handle), "handle handed out twice");
                assert!(pool.activate(acquired.handle));
                live.push(acquired.handle);
            }

            let stats = pool.stats(SQUARE);
            assert_eq!(live.len(), stats.instantiated as usize - stats.idle);
        }
    }
}
