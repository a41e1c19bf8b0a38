//! Flythrough Demo - Impostors over a forest of mock objects
//!
//! Flies a camera over a grid of trees and prints what the impostor manager
//! did each frame. The scene is the call-recording mock host, so no GPU or
//! window is needed.
//!
//! Run with:
//!   cargo run -p impostor --example flythrough
//!
//! With RUST_LOG=impostor=trace every per-frame decision is logged. Connect
//! puffin_viewer to 127.0.0.1:8585 to see the frame pass in a flame graph.

use std::sync::Arc;

use glam::Vec3;
use impostor::{
    CachingPolicy, Camera, ImpostorManager, ImpostorSettings, LodMethod, MainLight, ManagerConfig,
};
use impostor_core::logging;
use impostor_core::math::Aabb;
use impostor_core::profiling::{ProfilingBackend, init_profiling, new_frame, profile_scope};
use impostor_test_utils::MockRenderHost;

const FRAMES: u32 = 240;

fn main() {
    logging::init();
    init_profiling(ProfilingBackend::PuffinHttp);

    let host = Arc::new(MockRenderHost::new());
    let config = ManagerConfig::default()
        .with_caching(CachingPolicy::PreloadAndCache)
        .with_cast_shadows(true)
        .with_reclaim_interval(120);
    let mut manager =
        ImpostorManager::new(config, host.clone()).expect("Failed to create impostor manager");
    manager.set_main_light(Some(MainLight::directional(true)));

    let mut camera = Camera::perspective(60.0, 16.0 / 9.0, 0.1, 2000.0, 1080.0);
    camera.look_at(Vec3::new(0.0, 12.0, 40.0), Vec3::new(0.0, 0.0, -60.0), Vec3::Y);
    manager.init(camera.clone());

    let trunk = Aabb::new(Vec3::new(-0.3, 0.0, -0.3), Vec3::new(0.3, 4.0, 0.3));
    let crown = Aabb::new(Vec3::new(-2.0, 3.0, -2.0), Vec3::new(2.0, 8.0, 2.0));
    for row in 0..12 {
        for column in 0..12 {
            let position = Vec3::new(column as f32 * 15.0 - 82.5, 0.0, -(row as f32) * 15.0);
            let tree = host.spawn_object(position, &[trunk, crown]);
            // Every other row switches by distance instead of screen size
            let settings = if row % 2 == 0 {
                ImpostorSettings::default().with_cast_shadow(true)
            } else {
                ImpostorSettings::default()
                    .with_lod(LodMethod::Distance { max_distance: 60.0 })
                    .with_max_texture_size(128)
            };
            manager
                .register(tree, settings)
                .expect("Failed to register tree");
        }
    }
    tracing::info!(impostors = manager.len(), "Forest planted");

    for frame in 0..FRAMES {
        new_frame();
        profile_scope!("frame");

        let t = frame as f32 / FRAMES as f32;
        let eye = Vec3::new((t * std::f32::consts::TAU).sin() * 50.0, 12.0, 40.0 - t * 200.0);
        camera.look_at(eye, eye + Vec3::new(0.0, -0.2, -1.0), Vec3::Y);

        let stats = manager.per_frame(&camera);
        if frame % 30 == 0 {
            tracing::info!(
                frame = stats.frame,
                rendered = stats.rendered,
                preloaded = stats.preload_granted,
                deferred = stats.preload_denied,
                activated = stats.activated,
                deactivated = stats.deactivated,
                textures = manager.texture_cache().len(),
                memory_kib = manager.texture_memory() / 1024,
                "Frame"
            );
        }
    }

    let cache = manager.texture_cache().stats();
    tracing::info!(
        textures = cache.textures,
        in_use = cache.in_use,
        free = cache.free,
        snapshots = host.count_snapshots(),
        "Flythrough finished"
    );

    let freed = manager.teardown();
    tracing::info!(destroyed = freed.destroyed, "Torn down");
}
