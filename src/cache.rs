use std::collections::{BTreeMap, VecDeque};

use crate::{any::Instance, binding::BindingId, finalizer::BoxedFinalizer};

/// Instances a scope cached, keyed by binding, with the ones to finalize in creation order
#[derive(Default)]
pub(crate) struct Cache {
    map: BTreeMap<BindingId, Instance>,
    resolved: ResolvedSet,
}

impl Cache {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub(crate) fn get(&self, binding: BindingId) -> Option<Instance> {
        self.map.get(&binding).cloned()
    }

    #[inline]
    pub(crate) fn insert(&mut self, binding: BindingId, instance: Instance) -> Option<Instance> {
        self.map.insert(binding, instance)
    }

    #[inline]
    pub(crate) fn push_resolved(&mut self, resolved: Resolved) {
        self.resolved.push(resolved);
    }

    #[inline]
    #[must_use]
    pub(crate) fn take_resolved_set(&mut self) -> ResolvedSet {
        core::mem::take(&mut self.resolved)
    }

    #[inline]
    pub(crate) fn clear(&mut self) {
        self.map.clear();
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }
}

pub(crate) struct Resolved {
    pub(crate) binding: BindingId,
    pub(crate) dependency: Instance,
    pub(crate) finalizer: BoxedFinalizer,
}

#[derive(Default)]
pub(crate) struct ResolvedSet(pub(crate) VecDeque<Resolved>);

impl ResolvedSet {
    pub(crate) fn push(&mut self, resolved: Resolved) {
        self.0.push_back(resolved);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{Cache, Resolved};
    use crate::{any::Instance, binding::BindingId};

    #[test]
    fn test_resolved_set_is_taken_once() {
        let mut cache = Cache::new();
        let first = BindingId::next();
        let second = BindingId::next();

        cache.insert(first, Arc::new(1u8) as Instance);
        cache.insert(second, Arc::new(2u8) as Instance);
        for binding in [first, second] {
            cache.push_resolved(Resolved {
                binding,
                dependency: cache.get(binding).unwrap(),
                finalizer: Arc::new(|_| {}),
            });
        }

        let mut resolved = cache.take_resolved_set();
        assert_eq!(resolved.0.pop_back().map(|resolved| resolved.binding), Some(second));
        assert_eq!(resolved.0.pop_back().map(|resolved| resolved.binding), Some(first));
        assert!(cache.take_resolved_set().0.is_empty());

        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.get(first).is_none());
    }
}
