use std::collections::HashMap;
use std::sync::Arc;

use super::surface::DisplaySurface;
use super::{CloseSignal, ContextLostHook, PresentationTask, Retirement};
use crate::rendering::SurfaceHandle;

struct SurfaceEntry<T, S> {
    surface: S,
    bound: Option<Arc<T>>,
    subscribed: bool,
}

impl<T, S: DisplaySurface<T>> SurfaceEntry<T, S> {
    fn is_attached(&self) -> bool {
        self.bound.is_some()
    }

    fn attach(&mut self, texture: Arc<T>, on_context_lost: ContextLostHook) {
        if !self.subscribed {
            self.surface
                .on_context_lost(Box::new(move || on_context_lost()));
            self.subscribed = true;
        }
        self.bind(texture);
    }

    fn bind(&mut self, texture: Arc<T>) {
        self.surface.bind(Arc::clone(&texture));
        self.bound = Some(texture);
    }

    fn is_bound_to(&self, texture: &Arc<T>) -> bool {
        self.bound
            .as_ref()
            .map(|bound| Arc::ptr_eq(bound, texture))
            .unwrap_or(false)
    }
}

/// UI-thread consumer of [`PresentationTask`]s.
///
/// Owns the registered surfaces. Must be drained from the thread that owns
/// them; the worker side only ever holds a
/// [`PresentationSender`](super::PresentationSender).
pub struct PresentationBridge<T, S> {
    rx: flume::Receiver<PresentationTask<T>>,
    surfaces: HashMap<SurfaceHandle, SurfaceEntry<T, S>>,
}

impl<T, S: DisplaySurface<T>> PresentationBridge<T, S> {
    pub(super) fn new(rx: flume::Receiver<PresentationTask<T>>) -> Self {
        Self {
            rx,
            surfaces: HashMap::new(),
        }
    }

    /// Register a surface. It is attached to a texture on its first frame.
    pub fn register(&mut self, handle: SurfaceHandle, surface: S) {
        let previous = self.surfaces.insert(
            handle,
            SurfaceEntry {
                surface,
                bound: None,
                subscribed: false,
            },
        );
        if previous.is_some() {
            log::warn!(
                "[PresentationBridge] Surface {} registered twice, replacing",
                handle.id()
            );
        }
    }

    /// Forget a surface and hand it back. Later tasks for it are ignored.
    pub fn detach(&mut self, handle: SurfaceHandle) -> Option<S> {
        self.surfaces.remove(&handle).map(|entry| entry.surface)
    }

    pub fn surface(&self, handle: SurfaceHandle) -> Option<&S> {
        self.surfaces.get(&handle).map(|entry| &entry.surface)
    }

    pub fn is_attached(&self, handle: SurfaceHandle) -> bool {
        self.surfaces
            .get(&handle)
            .map(SurfaceEntry::is_attached)
            .unwrap_or(false)
    }

    /// Run every queued task. Returns how many were handled.
    pub fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(task) = self.rx.try_recv() {
            self.handle(task);
            handled += 1;
        }
        handled
    }

    /// Block and handle tasks until every sender is dropped.
    pub fn run_until_disconnected(&mut self) {
        while let Ok(task) = self.rx.recv() {
            self.handle(task);
        }
        log::info!("[PresentationBridge] All senders dropped, stopping");
    }

    fn handle(&mut self, task: PresentationTask<T>) {
        match task {
            PresentationTask::Present {
                surface,
                texture,
                on_context_lost,
                closed,
            } => self.present(surface, texture, on_context_lost, &closed),
            PresentationTask::Adopt {
                surface,
                texture,
                retire,
                closed,
            } => self.adopt(surface, texture, retire, &closed),
        }
    }

    fn present(
        &mut self,
        handle: SurfaceHandle,
        texture: Arc<T>,
        on_context_lost: ContextLostHook,
        closed: &CloseSignal,
    ) {
        if closed.is_closed() {
            log::debug!(
                "[PresentationBridge] Handler for surface {} closed, skipping frame",
                handle.id()
            );
            return;
        }

        let Some(entry) = self.surfaces.get_mut(&handle) else {
            log::debug!(
                "[PresentationBridge] Frame for unknown surface {}, dropping",
                handle.id()
            );
            return;
        };

        if !entry.is_attached() {
            entry.attach(texture, on_context_lost);
            log::info!("[PresentationBridge] Surface {} attached", handle.id());
            return;
        }

        if !entry.is_bound_to(&texture) {
            entry.bind(texture);
        }
        entry.surface.invalidate();
    }

    fn adopt(
        &mut self,
        handle: SurfaceHandle,
        texture: Arc<T>,
        retire: Retirement,
        closed: &CloseSignal,
    ) {
        match self.surfaces.get_mut(&handle) {
            _ if closed.is_closed() => log::debug!(
                "[PresentationBridge] Handler for surface {} closed, retiring only",
                handle.id()
            ),
            Some(entry) if entry.is_attached() => {
                entry.bind(texture);
                log::debug!(
                    "[PresentationBridge] Surface {} adopted new texture",
                    handle.id()
                );
            },
            Some(_) => {},
            None => log::debug!(
                "[PresentationBridge] Adopt for unknown surface {}, retiring only",
                handle.id()
            ),
        }
        retire();
    }
}
