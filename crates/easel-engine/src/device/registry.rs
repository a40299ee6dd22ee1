use std::collections::{BTreeSet, HashSet};

use super::api::{GraphicsApi, ResourceId, ResourceKind};

const KINDS: [ResourceKind; 4] = [
    ResourceKind::Texture,
    ResourceKind::VertexBuffer,
    ResourceKind::Framebuffer,
    ResourceKind::RenderBuffer,
];

/// Live device objects, one set per kind.
///
/// Deletes are guarded by membership: deleting twice, deleting something this
/// registry never created, or deleting an object that is currently bound are
/// all no-ops.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    live: [BTreeSet<ResourceId>; 4],
    bound: HashSet<(ResourceKind, ResourceId)>,
}

fn slot(kind: ResourceKind) -> usize {
    match kind {
        ResourceKind::Texture => 0,
        ResourceKind::VertexBuffer => 1,
        ResourceKind::Framebuffer => 2,
        ResourceKind::RenderBuffer => 3,
    }
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create<A: GraphicsApi + ?Sized>(&mut self, api: &mut A, kind: ResourceKind) -> ResourceId {
        let id = api.gen_resource(kind);
        self.live[slot(kind)].insert(id);
        log::trace!("created {kind:?} {id}");
        id
    }

    /// Returns `true` when the object was actually released.
    pub fn delete<A: GraphicsApi + ?Sized>(
        &mut self,
        api: &mut A,
        kind: ResourceKind,
        id: ResourceId,
    ) -> bool {
        if self.bound.contains(&(kind, id)) {
            log::debug!("{kind:?} {id} is bound; delete ignored");
            return false;
        }
        if !self.live[slot(kind)].remove(&id) {
            return false;
        }
        api.delete_resource(kind, id);
        log::trace!("deleted {kind:?} {id}");
        true
    }

    pub fn set_bound(&mut self, kind: ResourceKind, id: ResourceId, bound: bool) {
        if bound {
            self.bound.insert((kind, id));
        } else {
            self.bound.remove(&(kind, id));
        }
    }

    pub fn is_live(&self, kind: ResourceKind, id: ResourceId) -> bool {
        self.live[slot(kind)].contains(&id)
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.live[slot(kind)].len()
    }

    /// Releases every live object regardless of binding. Returns how many.
    pub fn teardown<A: GraphicsApi + ?Sized>(&mut self, api: &mut A) -> usize {
        self.bound.clear();
        let mut released = 0;
        for kind in KINDS {
            for id in std::mem::take(&mut self.live[slot(kind)]) {
                api.delete_resource(kind, id);
                released += 1;
            }
        }
        if released > 0 {
            log::debug!("released {released} device objects");
        }
        released
    }
}
