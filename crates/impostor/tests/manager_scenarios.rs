//! End-to-end impostor manager tests against the mock host.
//!
//! The camera sits at the origin looking down -Z with a 60 degree field of view
//! and a 720 pixel viewport. Objects are unit cubes unless stated otherwise.

use glam::Vec3;
use impostor::{
    CachingPolicy, Camera, ImpostorError, ImpostorManager, ImpostorSettings, LodMethod, MainLight,
    ManagerConfig,
};
use impostor_core::math::Aabb;
use impostor_test_utils::{HostCall, MockRenderHost, ObjectId, RenderGroup, RenderHost};
use std::sync::Arc;

fn unit_cube() -> Aabb {
    Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5))
}

fn camera_looking_at(target: Vec3) -> Camera {
    let mut camera = Camera::perspective(60.0, 1.0, 0.1, 1000.0, 720.0);
    camera.look_at(Vec3::ZERO, target, Vec3::Y);
    camera
}

fn forward_camera() -> Camera {
    camera_looking_at(Vec3::NEG_Z)
}

/// Looks 45 degrees to the right of -Z: objects straight ahead fall outside the
/// primary frustum but inside the doubled caching frustum.
fn sideways_camera() -> Camera {
    camera_looking_at(Vec3::new(1.0, 0.0, -1.0))
}

fn backwards_camera() -> Camera {
    camera_looking_at(Vec3::Z)
}

fn setup(config: ManagerConfig, camera: &Camera) -> (Arc<MockRenderHost>, ImpostorManager) {
    let _ = impostor_core::logging::try_init();
    let host = Arc::new(MockRenderHost::new());
    let mut manager = ImpostorManager::new(config, host.clone()).unwrap();
    manager.init(camera.clone());
    (host, manager)
}

fn spawn(host: &MockRenderHost, z: f32) -> ObjectId {
    host.spawn_object(Vec3::new(0.0, 0.0, z), &[unit_cube()])
}

#[test]
fn test_register_before_init_fails() {
    let host = Arc::new(MockRenderHost::new());
    let mut manager = ImpostorManager::new(ManagerConfig::default(), host.clone()).unwrap();
    let object = spawn(&host, -40.0);

    assert_eq!(
        manager.register(object, ImpostorSettings::default()),
        Err(ImpostorError::NotInitialized)
    );
    assert!(manager.is_empty());
    assert!(!manager.is_initialized());
}

#[test]
fn test_invalid_config_is_rejected() {
    let host = Arc::new(MockRenderHost::new());
    let config = ManagerConfig::default().with_antialiasing(3);
    assert!(matches!(
        ImpostorManager::new(config, host),
        Err(ImpostorError::InvalidConfig(_))
    ));
}

#[test]
fn test_register_unknown_object() {
    let camera = forward_camera();
    let (host, mut manager) = setup(ManagerConfig::default(), &camera);
    let object = spawn(&host, -40.0);
    host.despawn_object(object);

    assert_eq!(
        manager.register(object, ImpostorSettings::default()),
        Err(ImpostorError::ObjectNotFound(object))
    );
    assert!(manager.is_empty());
}

#[test]
fn test_register_twice_returns_same_id() {
    let camera = forward_camera();
    let (host, mut manager) = setup(ManagerConfig::default(), &camera);
    let object = spawn(&host, -40.0);

    let first = manager.register(object, ImpostorSettings::default()).unwrap();
    let second = manager.register(object, ImpostorSettings::default()).unwrap();
    assert_eq!(first, second);
    assert_eq!(manager.len(), 1);
    assert_eq!(manager.impostor_for(object), Some(first));
}

#[test]
fn test_register_twice_applies_new_settings() {
    let camera = forward_camera();
    let (host, mut manager) = setup(ManagerConfig::default(), &camera);
    let object = spawn(&host, -40.0);

    let id = manager.register(object, ImpostorSettings::default()).unwrap();
    manager.per_frame(&camera);
    assert!(manager.impostor(id).unwrap().is_showing_proxy());

    let closer = ImpostorSettings::default()
        .with_lod(LodMethod::Distance { max_distance: 100.0 })
        .with_max_texture_size(300);
    assert_eq!(manager.register(object, closer), Ok(id));

    let impostor = manager.impostor(id).unwrap();
    assert_eq!(impostor.settings().lod, LodMethod::Distance { max_distance: 100.0 });
    assert_eq!(impostor.settings().max_texture_size, 256);
    assert!(!impostor.is_showing_proxy());

    // 40 units is inside the new 100 unit range, so real geometry stays
    let stats = manager.per_frame(&camera);
    assert_eq!(stats.activated, 0);
    assert!(!manager.impostor(id).unwrap().is_showing_proxy());
    assert_eq!(host.renderer_enabled(host.object_renderers(object)[0]), Some(true));
}

#[test]
fn test_failed_re_register_keeps_old_settings() {
    let camera = forward_camera();
    let (host, mut manager) = setup(ManagerConfig::default(), &camera);
    let object = spawn(&host, -40.0);
    let id = manager.register(object, ImpostorSettings::default()).unwrap();

    // A destroyed object can't be captured again
    host.despawn_object(object);
    let distance = ImpostorSettings::default().with_lod(LodMethod::Distance { max_distance: 5.0 });
    assert_eq!(
        manager.register(object, distance),
        Err(ImpostorError::ObjectNotFound(object))
    );
    assert_eq!(manager.impostor(id).unwrap().settings().lod, LodMethod::ScreenSize);
}

#[test]
fn test_distance_lod_switches_both_ways() {
    let camera = forward_camera();
    let (host, mut manager) = setup(ManagerConfig::default(), &camera);
    let object = spawn(&host, -40.0);
    let settings =
        ImpostorSettings::default().with_lod(LodMethod::Distance { max_distance: 30.0 });
    let id = manager.register(object, settings).unwrap();
    let renderer = host.object_renderers(object)[0];

    // Far away: the billboard replaces the geometry
    let stats = manager.per_frame(&camera);
    assert_eq!(stats.activated, 1);
    assert_eq!(stats.rendered, 1);
    assert!(manager.impostor(id).unwrap().is_showing_proxy());
    assert_eq!(host.renderer_enabled(renderer), Some(false));
    assert!(host.billboard_visible(object));
    assert_eq!(host.count_snapshots_for(object), 1);

    // Close: real geometry is back and the texture returns to the pool
    host.move_object(object, Vec3::new(0.0, 0.0, -10.0));
    let stats = manager.per_frame(&camera);
    assert_eq!(stats.deactivated, 1);
    assert!(!manager.impostor(id).unwrap().is_showing_proxy());
    assert_eq!(host.renderer_enabled(renderer), Some(true));
    assert!(!host.billboard_visible(object));
    assert_eq!(manager.texture_cache().free_count(), 1);
    assert_eq!(manager.texture_cache().in_use_count(), 0);
}

#[test]
fn test_large_on_screen_object_keeps_geometry() {
    let camera = forward_camera();
    let (host, mut manager) = setup(ManagerConfig::default(), &camera);
    let object = spawn(&host, -2.0);
    let id = manager.register(object, ImpostorSettings::default()).unwrap();

    let stats = manager.per_frame(&camera);
    assert_eq!(stats.activated, 0);
    assert!(!manager.impostor(id).unwrap().is_showing_proxy());
    assert!(manager.impostor(id).unwrap().pixel_size() >= 256.0);
    assert_eq!(host.count_snapshots(), 0);
}

#[test]
fn test_texture_sizes_are_powers_of_two() {
    let camera = forward_camera();
    let (host, mut manager) = setup(ManagerConfig::default(), &camera);
    let object = spawn(&host, -5.0);
    let id = manager.register(object, ImpostorSettings::default()).unwrap();

    for z in [-5.0, -8.0, -15.0, -40.0, -120.0, -400.0] {
        host.move_object(object, Vec3::new(0.0, 0.0, z));
        manager.per_frame(&camera);

        let impostor = manager.impostor(id).unwrap();
        if !impostor.is_showing_proxy() {
            continue;
        }
        let texture = impostor.proxy().texture().unwrap();
        let size = manager.texture_cache().get(texture).unwrap().size();
        assert!(size.is_power_of_two());
        assert!(size <= 256);
        assert!(size as f32 >= impostor.pixel_size().min(256.0).floor());
        assert_eq!(size, impostor.last_texture_size());
    }
}

#[test]
fn test_still_camera_does_not_rerender() {
    let camera = forward_camera();
    let (host, mut manager) = setup(ManagerConfig::default(), &camera);
    let object = spawn(&host, -40.0);
    manager.register(object, ImpostorSettings::default()).unwrap();

    manager.per_frame(&camera);
    for _ in 0..5 {
        let stats = manager.per_frame(&camera);
        assert_eq!(stats.rendered, 0);
    }
    assert_eq!(host.count_snapshots(), 1);

    // Orbiting the object by 10 degrees makes the snapshot stale
    let mut orbit = camera.clone();
    let eye = glam::Quat::from_rotation_y(10f32.to_radians()) * Vec3::new(0.0, 0.0, 40.0)
        + Vec3::new(0.0, 0.0, -40.0);
    orbit.look_at(eye, Vec3::new(0.0, 0.0, -40.0), Vec3::Y);
    let stats = manager.per_frame(&orbit);
    assert_eq!(stats.rendered, 1);
    assert_eq!(host.count_snapshots(), 2);
}

#[test]
fn test_discard_releases_offscreen_textures() {
    let camera = forward_camera();
    let (host, mut manager) = setup(ManagerConfig::default(), &camera);
    let object = spawn(&host, -40.0);
    let id = manager.register(object, ImpostorSettings::default()).unwrap();

    manager.per_frame(&camera);
    assert_eq!(manager.texture_cache().in_use_count(), 1);

    let stats = manager.per_frame(&backwards_camera());
    assert_eq!(stats.invalidated, 1);
    assert!(!host.billboard_visible(object));
    assert!(manager.impostor(id).unwrap().proxy().texture().is_none());
    assert_eq!(manager.texture_cache().free_count(), 1);

    // Turning back recycles the released target
    let stats = manager.per_frame(&camera);
    assert_eq!(stats.rendered, 1);
    assert_eq!(host.count_target_creates(), 1);
    assert_eq!(manager.texture_cache().in_use_count(), 1);
}

#[test]
fn test_discard_releases_texture_inside_caching_frustum() {
    let camera = forward_camera();
    let config = ManagerConfig::default().with_caching(CachingPolicy::Discard);
    let (host, mut manager) = setup(config, &camera);
    let object = spawn(&host, -40.0);
    let id = manager.register(object, ImpostorSettings::default()).unwrap();

    manager.per_frame(&camera);
    assert_eq!(manager.texture_cache().in_use_count(), 1);

    // Still inside the wider caching frustum, yet the texture goes back at once
    let stats = manager.per_frame(&sideways_camera());
    let proxy = manager.impostor(id).unwrap().proxy();
    assert!(proxy.is_visible_in_cache());
    assert!(!proxy.is_visible());
    assert!(proxy.texture().is_none());
    assert_eq!(stats.invalidated, 1);
    assert_eq!(manager.texture_cache().free_count(), 1);
    assert_eq!(manager.texture_cache().in_use_count(), 0);
    assert!(!host.billboard_visible(object));
}

#[test]
fn test_cache_policy_keeps_texture_in_caching_frustum() {
    let camera = forward_camera();
    let config = ManagerConfig::default().with_caching(CachingPolicy::Cache);
    let (host, mut manager) = setup(config, &camera);
    let object = spawn(&host, -40.0);
    let id = manager.register(object, ImpostorSettings::default()).unwrap();

    manager.per_frame(&camera);
    let held = manager.impostor(id).unwrap().proxy().texture();

    let stats = manager.per_frame(&sideways_camera());
    assert_eq!(stats.invalidated, 0);
    assert!(!host.billboard_visible(object));
    assert!(manager.impostor(id).unwrap().proxy().is_visible_in_cache());
    assert_eq!(manager.impostor(id).unwrap().proxy().texture(), held);

    // Back in view without a new snapshot
    let stats = manager.per_frame(&camera);
    assert_eq!(stats.rendered, 0);
    assert!(host.billboard_visible(object));
    assert_eq!(host.count_snapshots(), 1);

    // Behind the camera even the caching frustum loses it
    let stats = manager.per_frame(&backwards_camera());
    assert_eq!(stats.invalidated, 1);
}

#[test]
fn test_preload_budget_spreads_over_frames() {
    let camera = sideways_camera();
    let config = ManagerConfig::default().with_caching(CachingPolicy::PreloadAndCache);
    let (host, mut manager) = setup(config, &camera);

    for i in 0..8 {
        let object = host.spawn_object(
            Vec3::new(i as f32 * 0.5 - 2.0, 0.0, -40.0),
            &[unit_cube()],
        );
        manager.register(object, ImpostorSettings::default()).unwrap();
    }

    let stats = manager.per_frame(&camera);
    assert_eq!(stats.activated, 8);
    assert_eq!(stats.preload_granted, 5);
    assert_eq!(stats.preload_denied, 3);
    assert_eq!(stats.rendered, 5);

    let stats = manager.per_frame(&camera);
    assert_eq!(stats.preload_granted, 3);
    assert_eq!(stats.preload_denied, 0);
    assert_eq!(stats.rendered, 3);

    let stats = manager.per_frame(&camera);
    assert_eq!(stats.rendered, 0);
    assert_eq!(host.count_snapshots(), 8);
}

#[test]
fn test_preload_lock_budget() {
    let camera = forward_camera();
    let (host, mut manager) = setup(ManagerConfig::default(), &camera);
    manager.set_preload_rate(2);
    let object = spawn(&host, -40.0);
    let id = manager.register(object, ImpostorSettings::default()).unwrap();

    assert!(manager.get_preload_lock(id));
    assert!(manager.get_preload_lock(id));
    assert!(!manager.get_preload_lock(id));

    manager.per_frame(&camera);
    assert!(manager.get_preload_lock(id));
}

#[test]
fn test_texture_brokering() {
    let camera = forward_camera();
    let (host, mut manager) = setup(ManagerConfig::default(), &camera);
    let object = spawn(&host, -40.0);
    let id = manager.register(object, ImpostorSettings::default()).unwrap();

    let texture = manager.get_render_texture(id, 64);
    let memory = manager.texture_memory();
    assert!(memory > 0);

    manager.give_back_render_texture(texture).unwrap();
    assert_eq!(
        manager.give_back_render_texture(texture),
        Err(ImpostorError::TextureAlreadyReleased(texture))
    );
    assert_eq!(manager.get_render_texture(id, 64), texture);

    manager.give_back_render_texture(texture).unwrap();
    let reclaimed = manager.reclaim();
    assert_eq!(reclaimed.destroyed, 1);
    assert_eq!(reclaimed.freed_bytes, memory);
    assert_eq!(manager.texture_memory(), 0);
    assert_eq!(host.live_target_count(), 0);
}

#[test]
fn test_periodic_reclaim() {
    let camera = forward_camera();
    let config = ManagerConfig::default().with_reclaim_interval(2);
    let (host, mut manager) = setup(config, &camera);
    let object = spawn(&host, -40.0);
    manager.register(object, ImpostorSettings::default()).unwrap();

    let stats = manager.per_frame(&camera);
    assert_eq!(stats.reclaimed, 0);

    let stats = manager.per_frame(&backwards_camera());
    assert_eq!(stats.frame, 2);
    assert_eq!(stats.reclaimed, 1);
    assert!(manager.texture_cache().is_empty());
    assert_eq!(host.count_target_destroys(), 1);
}

#[test]
fn test_destroyed_objects_are_pruned() {
    let camera = forward_camera();
    let (host, mut manager) = setup(ManagerConfig::default(), &camera);
    let doomed = spawn(&host, -40.0);
    let kept = spawn(&host, -50.0);
    let doomed_id = manager.register(doomed, ImpostorSettings::default()).unwrap();
    manager.register(kept, ImpostorSettings::default()).unwrap();

    manager.per_frame(&camera);
    host.despawn_object(doomed);

    let stats = manager.per_frame(&camera);
    assert_eq!(stats.pruned, 1);
    assert_eq!(stats.updated, 1);
    assert_eq!(manager.len(), 1);
    assert!(manager.impostor(doomed_id).is_none());
    assert_eq!(manager.impostor_for(doomed), None);
    assert_eq!(manager.texture_cache().free_count(), 1);
    assert_eq!(
        manager.unregister(doomed_id),
        Err(ImpostorError::StaleImpostor(doomed_id))
    );
}

#[test]
fn test_unregister_restores_geometry() {
    let camera = forward_camera();
    let (host, mut manager) = setup(ManagerConfig::default(), &camera);
    let object = host.spawn_object_in_group(Vec3::new(0.0, 0.0, -40.0), &[unit_cube()], RenderGroup(3));
    let id = manager.register(object, ImpostorSettings::default()).unwrap();
    let renderer = host.object_renderers(object)[0];

    manager.per_frame(&camera);
    assert_eq!(host.render_group(renderer), RenderGroup(30));

    manager.unregister(id).unwrap();
    assert_eq!(host.render_group(renderer), RenderGroup(3));
    assert_eq!(host.renderer_enabled(renderer), Some(true));
    assert!(!host.billboard_visible(object));
    assert!(manager.is_empty());
    assert_eq!(manager.texture_cache().in_use_count(), 0);
}

#[test]
fn test_reinitialize_picks_up_new_renderers() {
    let camera = forward_camera();
    let (host, mut manager) = setup(ManagerConfig::default(), &camera);
    let object = spawn(&host, -40.0);
    let id = manager.register(object, ImpostorSettings::default()).unwrap();
    let before = manager.impostor(id).unwrap().proxy().max_size();

    host.add_renderer(object, Aabb::new(Vec3::new(-0.5, 0.5, -0.5), Vec3::new(0.5, 4.0, 0.5)))
        .unwrap();
    manager.reinitialize(id).unwrap();

    let impostor = manager.impostor(id).unwrap();
    assert_eq!(impostor.renderers().len(), 2);
    assert!(impostor.proxy().max_size() > before);
}

#[test]
fn test_kill_switch_shows_real_geometry() {
    let camera = forward_camera();
    let (host, mut manager) = setup(ManagerConfig::default(), &camera);
    let object = spawn(&host, -40.0);
    let id = manager.register(object, ImpostorSettings::default()).unwrap();

    manager.per_frame(&camera);
    assert!(manager.impostor(id).unwrap().is_showing_proxy());

    manager.set_active(false);
    let stats = manager.per_frame(&camera);
    assert_eq!(stats.deactivated, 1);
    assert!(!manager.impostor(id).unwrap().is_showing_proxy());
    assert!(!host.billboard_visible(object));

    manager.set_active(true);
    let stats = manager.per_frame(&camera);
    assert_eq!(stats.activated, 1);
    assert_eq!(stats.rendered, 1);
}

#[test]
fn test_shadows_follow_main_light() {
    let camera = forward_camera();
    let config = ManagerConfig::default().with_cast_shadows(true);
    let (host, mut manager) = setup(config, &camera);
    let object = spawn(&host, -40.0);
    manager
        .register(object, ImpostorSettings::default().with_cast_shadow(true))
        .unwrap();

    let last_snapshot_shadow = |host: &MockRenderHost| {
        host.calls().iter().rev().find_map(|call| match call {
            HostCall::RenderSnapshot { casts_shadow, .. } => Some(*casts_shadow),
            _ => None,
        })
    };

    manager.per_frame(&camera);
    assert!(!manager.shadows_enabled());
    assert_eq!(last_snapshot_shadow(&host), Some(false));

    manager.set_main_light(Some(MainLight::directional(true)));
    let stats = manager.per_frame(&camera);
    assert!(manager.shadows_enabled());
    assert_eq!(stats.rendered, 1);
    assert_eq!(last_snapshot_shadow(&host), Some(true));
}

#[test]
fn test_teardown_destroys_everything() {
    let camera = forward_camera();
    let (host, mut manager) = setup(ManagerConfig::default(), &camera);
    for z in [-40.0, -60.0, -80.0] {
        let object = spawn(&host, z);
        manager.register(object, ImpostorSettings::default()).unwrap();
    }
    manager.per_frame(&camera);
    assert_eq!(manager.texture_cache().len(), 3);

    let stats = manager.teardown();
    assert_eq!(stats.destroyed, 3);
    assert!(manager.is_empty());
    assert!(manager.texture_cache().is_empty());
    assert_eq!(manager.texture_memory(), 0);
    assert_eq!(host.object_count(), 0);
    assert_eq!(host.live_target_count(), 0);
}
