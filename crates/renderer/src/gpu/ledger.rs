use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Categories of GPU objects the scaffold allocates on the caller's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResourceClass {
    ShaderModule,
    Buffer,
    Texture,
}

/// Point-in-time count of live GPU objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveResources {
    pub shader_modules: usize,
    pub buffers: usize,
    pub textures: usize,
}

#[derive(Debug, Default)]
pub(crate) struct ResourceLedger {
    shader_modules: AtomicUsize,
    buffers: AtomicUsize,
    textures: AtomicUsize,
}

impl ResourceLedger {
    fn counter(&self, class: ResourceClass) -> &AtomicUsize {
        match class {
            ResourceClass::ShaderModule => &self.shader_modules,
            ResourceClass::Buffer => &self.buffers,
            ResourceClass::Texture => &self.textures,
        }
    }

    pub(crate) fn snapshot(&self) -> LiveResources {
        LiveResources {
            shader_modules: self.shader_modules.load(Ordering::Acquire),
            buffers: self.buffers.load(Ordering::Acquire),
            textures: self.textures.load(Ordering::Acquire),
        }
    }
}

/// Owns a wgpu object and keeps the ledger count in step with its lifetime.
pub(crate) struct Tracked<T> {
    inner: T,
    class: ResourceClass,
    ledger: Arc<ResourceLedger>,
}

impl<T> Tracked<T> {
    pub(crate) fn new(inner: T, ledger: &Arc<ResourceLedger>, class: ResourceClass) -> Self {
        ledger.counter(class).fetch_add(1, Ordering::AcqRel);
        Self {
            inner,
            class,
            ledger: Arc::clone(ledger),
        }
    }
}

impl<T> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> Drop for Tracked<T> {
    fn drop(&mut self) {
        self.ledger
            .counter(self.class)
            .fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_follow_handle_lifetimes() {
        let ledger = Arc::new(ResourceLedger::default());
        let first = Tracked::new((), &ledger, ResourceClass::Buffer);
        let second = Tracked::new((), &ledger, ResourceClass::Texture);
        assert_eq!(
            ledger.snapshot(),
            LiveResources {
                shader_modules: 0,
                buffers: 1,
                textures: 1
            }
        );
        drop(first);
        drop(second);
        assert_eq!(ledger.snapshot(), LiveResources::default());
    }
}
