use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use super::api::{GraphicsApi, PixelRect, ResourceId, ResourceKind};
use super::registry::ResourceRegistry;
use super::{DeviceCapabilities, EngineError, EngineResult};

/// A framebuffer binding as kept on the framebuffer stack.
///
/// `copy_back` is set for screen-backed targets on devices without
/// framebuffer objects: when the binding is left, the drawn region of the
/// screen is copied into the target's color texture.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct FbBinding {
    pub id: Option<ResourceId>,
    pub copy_back: Option<(ResourceId, PixelRect)>,
}

impl FbBinding {
    pub const SCREEN: Self = Self { id: None, copy_back: None };

    pub const fn object(id: ResourceId) -> Self {
        Self { id: Some(id), copy_back: None }
    }
}

/// Device plus everything the renderer shares about it: capabilities,
/// live-object registry and the framebuffer stack.
pub struct GraphicsContext<A: GraphicsApi> {
    api: A,
    caps: DeviceCapabilities,
    registry: ResourceRegistry,
    current_fb: FbBinding,
    fb_stack: Vec<FbBinding>,
}

impl<A: GraphicsApi> GraphicsContext<A> {
    pub fn new(api: A) -> Self {
        let caps = api.capabilities();
        log::debug!("device capabilities: {caps:?}");
        Self {
            api,
            caps,
            registry: ResourceRegistry::new(),
            current_fb: FbBinding::SCREEN,
            fb_stack: Vec::new(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn api_mut(&mut self) -> &mut A {
        &mut self.api
    }

    /// Gives the device back, e.g. after [`teardown`](Self::teardown).
    pub fn into_api(self) -> A {
        self.api
    }

    pub fn caps(&self) -> &DeviceCapabilities {
        &self.caps
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn create(&mut self, kind: ResourceKind) -> ResourceId {
        self.registry.create(&mut self.api, kind)
    }

    pub fn delete(&mut self, kind: ResourceKind, id: ResourceId) -> bool {
        self.registry.delete(&mut self.api, kind, id)
    }

    // ── framebuffer stack ─────────────────────────────────────────────────

    pub fn current_framebuffer(&self) -> FbBinding {
        self.current_fb
    }

    pub fn framebuffer_depth(&self) -> usize {
        self.fb_stack.len()
    }

    pub fn push_framebuffer(&mut self) {
        self.fb_stack.push(self.current_fb);
    }

    /// Binds `fb` without touching the stack.
    pub fn set_framebuffer(&mut self, fb: FbBinding) {
        if let Some(prev) = self.current_fb.id {
            self.registry.set_bound(ResourceKind::Framebuffer, prev, false);
        }
        if let Some(id) = fb.id {
            self.registry.set_bound(ResourceKind::Framebuffer, id, true);
        }
        self.current_fb = fb;
        self.api.bind_framebuffer(fb.id);
    }

    /// Leaves the current binding (copying back screen-backed targets) and
    /// rebinds the one below it.
    pub fn pop_framebuffer(&mut self) -> EngineResult<()> {
        let prev = self.fb_stack.pop().ok_or(EngineError::FramebufferStackEmpty)?;
        self.finish_current();
        self.set_framebuffer(prev);
        Ok(())
    }

    fn finish_current(&mut self) {
        if let Some((tex, rect)) = self.current_fb.copy_back {
            self.api.copy_to_texture(tex, rect);
        }
    }

    /// Releases every live object. The context stays usable.
    pub fn teardown(&mut self) -> usize {
        self.fb_stack.clear();
        self.current_fb = FbBinding::SCREEN;
        self.api.bind_framebuffer(None);
        self.registry.teardown(&mut self.api)
    }
}

// ── context lock ──────────────────────────────────────────────────────────

/// Hands the graphics context to one thread at a time.
///
/// Waiting threads sleep on a condition variable until the holder's guard is
/// dropped.
#[derive(Debug, Default)]
pub struct ContextLock {
    owner: Mutex<Option<ThreadId>>,
    released: Condvar,
}

/// Proof of ownership; releases the context on drop.
#[derive(Debug)]
pub struct ContextGuard<'a> {
    lock: &'a ContextLock,
}

impl ContextLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn owner(&self) -> MutexGuard<'_, Option<ThreadId>> {
        self.owner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until the context is free.
    ///
    /// Fails with `ContextAlreadyHeld` when the calling thread is the holder.
    pub fn acquire(&self) -> EngineResult<ContextGuard<'_>> {
        let me = thread::current().id();
        let mut owner = self.owner();
        if *owner == Some(me) {
            return Err(EngineError::ContextAlreadyHeld);
        }
        while owner.is_some() {
            owner = self.released.wait(owner).unwrap_or_else(PoisonError::into_inner);
        }
        *owner = Some(me);
        Ok(ContextGuard { lock: self })
    }

    /// Non-blocking variant; `Ok(None)` when another thread holds it.
    pub fn try_acquire(&self) -> EngineResult<Option<ContextGuard<'_>>> {
        let me = thread::current().id();
        let mut owner = self.owner();
        match *owner {
            Some(holder) if holder == me => Err(EngineError::ContextAlreadyHeld),
            Some(_) => Ok(None),
            None => {
                *owner = Some(me);
                Ok(Some(ContextGuard { lock: self }))
            }
        }
    }

    pub fn is_held(&self) -> bool {
        self.owner().is_some()
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        *self.lock.owner() = None;
        self.lock.released.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HeadlessApi;
    use std::sync::{Arc, mpsc};
    use std::time::Duration;

    // ── framebuffer stack ─────────────────────────────────────────────────

    #[test]
    fn pop_restores_previous_binding() {
        let mut ctx = GraphicsContext::new(HeadlessApi::new(8, 8));
        let fb = ctx.create(ResourceKind::Framebuffer);

        ctx.push_framebuffer();
        ctx.set_framebuffer(FbBinding::object(fb));
        assert_eq!(ctx.api().bound_framebuffer(), Some(fb));

        ctx.pop_framebuffer().unwrap();
        assert_eq!(ctx.current_framebuffer(), FbBinding::SCREEN);
        assert_eq!(ctx.api().bound_framebuffer(), None);
    }

    #[test]
    fn pop_on_empty_stack_errors() {
        let mut ctx = GraphicsContext::new(HeadlessApi::new(8, 8));
        assert!(matches!(ctx.pop_framebuffer(), Err(EngineError::FramebufferStackEmpty)));
    }

    #[test]
    fn bound_framebuffer_is_not_deleted() {
        let mut ctx = GraphicsContext::new(HeadlessApi::new(8, 8));
        let fb = ctx.create(ResourceKind::Framebuffer);
        ctx.push_framebuffer();
        ctx.set_framebuffer(FbBinding::object(fb));
        assert!(!ctx.delete(ResourceKind::Framebuffer, fb));
        ctx.pop_framebuffer().unwrap();
        assert!(ctx.delete(ResourceKind::Framebuffer, fb));
    }

    // ── context lock ──────────────────────────────────────────────────────

    #[test]
    fn reacquire_on_same_thread_errors() {
        let lock = ContextLock::new();
        let _guard = lock.acquire().unwrap();
        assert!(matches!(lock.acquire(), Err(EngineError::ContextAlreadyHeld)));
    }

    #[test]
    fn guard_drop_releases() {
        let lock = ContextLock::new();
        drop(lock.acquire().unwrap());
        assert!(!lock.is_held());
        assert!(lock.acquire().is_ok());
    }

    #[test]
    fn second_thread_waits_for_release() {
        let lock = Arc::new(ContextLock::new());
        let guard = lock.acquire().unwrap();

        let (tx, rx) = mpsc::channel();
        let other = Arc::clone(&lock);
        let handle = thread::spawn(move || {
            assert!(other.try_acquire().unwrap().is_none());
            let _g = other.acquire().unwrap();
            tx.send(()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        drop(guard);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
    }
}
