//! Mock implementation of RenderHost for testing.
//!
//! This module provides a scriptable scene that records every host call
//! without touching a GPU.

use crate::{gpu_types::*, render_host::*, scene_types::*};
use glam::Vec3;
use impostor_core::math::Aabb;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};

/// Records a host call for verification in tests.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    CreateRenderTarget {
        id: usize,
        size: u32,
        sample_count: u32,
    },
    DestroyRenderTarget {
        id: usize,
    },
    RenderSnapshot {
        object: ObjectId,
        target_id: usize,
        renderer_count: usize,
        casts_shadow: bool,
    },
    SetRenderGroup {
        renderer: RendererId,
        group: RenderGroup,
    },
    SetRenderersEnabled {
        renderers: Vec<RendererId>,
        enabled: bool,
    },
    SetBillboardVisible {
        object: ObjectId,
        visible: bool,
    },
    DestroyObject {
        object: ObjectId,
    },
}

/// Mock renderer stored in the scene.
#[derive(Debug, Clone)]
struct MockRenderer {
    owner: ObjectId,
    /// Bounds relative to the owning object's position.
    local_bounds: Aabb,
    group: RenderGroup,
    enabled: bool,
}

#[derive(Debug, Clone)]
struct MockObject {
    position: Vec3,
    renderers: Vec<RendererId>,
}

#[derive(Debug, Default)]
struct MockScene {
    objects: BTreeMap<ObjectId, MockObject>,
    renderers: BTreeMap<RendererId, MockRenderer>,
    billboards: BTreeMap<ObjectId, bool>,
    next_object: u64,
    next_renderer: u64,
}

#[derive(Debug, Default)]
struct MockTargets {
    next_id: usize,
    live: BTreeSet<usize>,
}

/// Mock implementation of RenderHost for testing.
///
/// # Interior Mutability
///
/// Trait methods take `&self` but record calls and mutate the scene, so state
/// lives behind `parking_lot::Mutex`es (the trait requires `Send + Sync`).
///
/// # Example
///
/// ```rust
/// use impostor_core::math::{Aabb, Vec3};
/// use impostor_test_utils::{MockRenderHost, RenderHost};
///
/// let host = MockRenderHost::new();
/// let object = host.spawn_object(Vec3::ZERO, &[Aabb::new(Vec3::splat(-1.0), Vec3::ONE)]);
///
/// assert_eq!(host.object_renderers(object).len(), 1);
/// host.despawn_object(object);
/// assert!(host.object_position(object).is_none());
/// ```
pub struct MockRenderHost {
    calls: Mutex<Vec<HostCall>>,
    scene: Mutex<MockScene>,
    targets: Mutex<MockTargets>,
}

impl MockRenderHost {
    /// Create an empty mock host.
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            scene: Mutex::new(MockScene::default()),
            targets: Mutex::new(MockTargets::default()),
        }
    }

    // Scene scripting

    /// Add an object with one renderer per entry of `local_bounds`.
    pub fn spawn_object(&self, position: Vec3, local_bounds: &[Aabb]) -> ObjectId {
        self.spawn_object_in_group(position, local_bounds, RenderGroup::default())
    }

    /// Like [`spawn_object`](Self::spawn_object) with a non-default render group.
    pub fn spawn_object_in_group(
        &self,
        position: Vec3,
        local_bounds: &[Aabb],
        group: RenderGroup,
    ) -> ObjectId {
        let mut scene = self.scene.lock();
        let object = ObjectId(scene.next_object);
        scene.next_object += 1;

        let mut renderers = Vec::with_capacity(local_bounds.len());
        for bounds in local_bounds {
            let renderer = RendererId(scene.next_renderer);
            scene.next_renderer += 1;
            scene.renderers.insert(
                renderer,
                MockRenderer {
                    owner: object,
                    local_bounds: *bounds,
                    group,
                    enabled: true,
                },
            );
            renderers.push(renderer);
        }

        scene.objects.insert(
            object,
            MockObject {
                position,
                renderers,
            },
        );
        object
    }

    /// Attach another renderer to an existing object (e.g. a new child mesh).
    pub fn add_renderer(&self, object: ObjectId, local_bounds: Aabb) -> Option<RendererId> {
        let mut scene = self.scene.lock();
        if !scene.objects.contains_key(&object) {
            return None;
        }
        let renderer = RendererId(scene.next_renderer);
        scene.next_renderer += 1;
        scene.renderers.insert(
            renderer,
            MockRenderer {
                owner: object,
                local_bounds,
                group: RenderGroup::default(),
                enabled: true,
            },
        );
        if let Some(entry) = scene.objects.get_mut(&object) {
            entry.renderers.push(renderer);
        }
        Some(renderer)
    }

    pub fn move_object(&self, object: ObjectId, position: Vec3) {
        if let Some(entry) = self.scene.lock().objects.get_mut(&object) {
            entry.position = position;
        }
    }

    /// Destroy an object behind the impostor system's back (not recorded).
    pub fn despawn_object(&self, object: ObjectId) {
        self.remove_object(object);
    }

    fn remove_object(&self, object: ObjectId) {
        let mut scene = self.scene.lock();
        if let Some(entry) = scene.objects.remove(&object) {
            for renderer in entry.renderers {
                scene.renderers.remove(&renderer);
            }
        }
        scene.billboards.remove(&object);
    }

    // Scene inspection

    pub fn renderer_enabled(&self, renderer: RendererId) -> Option<bool> {
        self.scene.lock().renderers.get(&renderer).map(|r| r.enabled)
    }

    pub fn billboard_visible(&self, object: ObjectId) -> bool {
        self.scene
            .lock()
            .billboards
            .get(&object)
            .copied()
            .unwrap_or(false)
    }

    pub fn object_count(&self) -> usize {
        self.scene.lock().objects.len()
    }

    /// Number of targets created and not yet destroyed.
    pub fn live_target_count(&self) -> usize {
        self.targets.lock().live.len()
    }

    // Call inspection

    /// Get a copy of all recorded calls (for test assertions).
    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }

    fn count(&self, filter: impl Fn(&HostCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| filter(call)).count()
    }

    pub fn count_target_creates(&self) -> usize {
        self.count(|call| matches!(call, HostCall::CreateRenderTarget { .. }))
    }

    pub fn count_target_destroys(&self) -> usize {
        self.count(|call| matches!(call, HostCall::DestroyRenderTarget { .. }))
    }

    pub fn count_snapshots(&self) -> usize {
        self.count(|call| matches!(call, HostCall::RenderSnapshot { .. }))
    }

    pub fn count_snapshots_for(&self, object: ObjectId) -> usize {
        self.count(
            |call| matches!(call, HostCall::RenderSnapshot { object: o, .. } if *o == object),
        )
    }

    /// Clear recorded calls (useful between test steps).
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Get total number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn record(&self, call: HostCall) {
        self.calls.lock().push(call);
    }
}

impl Default for MockRenderHost {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderHost for MockRenderHost {
    fn create_render_target(&self, desc: &RenderTargetDescriptor) -> GpuRenderTarget {
        let mut targets = self.targets.lock();
        let id = targets.next_id;
        targets.next_id += 1;
        targets.live.insert(id);

        self.record(HostCall::CreateRenderTarget {
            id,
            size: desc.size,
            sample_count: desc.sample_count,
        });

        GpuRenderTarget::mock(id, desc.size, desc.sample_count)
    }

    fn destroy_render_target(&self, target: GpuRenderTarget) {
        if let Some(id) = target.mock_id() {
            self.targets.lock().live.remove(&id);
            self.record(HostCall::DestroyRenderTarget { id });
        }
    }

    fn render_snapshot(&self, request: &SnapshotRequest<'_>, target: &GpuRenderTarget) {
        self.record(HostCall::RenderSnapshot {
            object: request.object,
            target_id: target.mock_id().unwrap_or(usize::MAX),
            renderer_count: request.renderers.len(),
            casts_shadow: request.shadow.is_some(),
        });
    }

    fn object_position(&self, object: ObjectId) -> Option<Vec3> {
        self.scene.lock().objects.get(&object).map(|o| o.position)
    }

    fn object_renderers(&self, object: ObjectId) -> Vec<RendererId> {
        self.scene
            .lock()
            .objects
            .get(&object)
            .map(|o| o.renderers.clone())
            .unwrap_or_default()
    }

    fn renderer_bounds(&self, renderer: RendererId) -> Option<Aabb> {
        let scene = self.scene.lock();
        let entry = scene.renderers.get(&renderer)?;
        let position = scene.objects.get(&entry.owner)?.position;
        Some(Aabb::new(
            entry.local_bounds.min + position,
            entry.local_bounds.max + position,
        ))
    }

    fn render_group(&self, renderer: RendererId) -> RenderGroup {
        self.scene
            .lock()
            .renderers
            .get(&renderer)
            .map(|r| r.group)
            .unwrap_or_default()
    }

    fn set_render_group(&self, renderer: RendererId, group: RenderGroup) {
        if let Some(entry) = self.scene.lock().renderers.get_mut(&renderer) {
            entry.group = group;
        }
        self.record(HostCall::SetRenderGroup { renderer, group });
    }

    fn set_renderers_enabled(&self, renderers: &[RendererId], enabled: bool) {
        {
            let mut scene = self.scene.lock();
            for renderer in renderers {
                if let Some(entry) = scene.renderers.get_mut(renderer) {
                    entry.enabled = enabled;
                }
            }
        }
        self.record(HostCall::SetRenderersEnabled {
            renderers: renderers.to_vec(),
            enabled,
        });
    }

    fn set_billboard_visible(&self, object: ObjectId, visible: bool) {
        self.scene.lock().billboards.insert(object, visible);
        self.record(HostCall::SetBillboardVisible { object, visible });
    }

    fn destroy_object(&self, object: ObjectId) {
        self.remove_object(object);
        self.record(HostCall::DestroyObject { object });
    }
}
