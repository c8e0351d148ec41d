// Scene manager behaviour through the shared handle with a recording backend.

mod common;

use common::{png_bytes, record_names, MapFetcher, RecordingBackend};
use glam::{Vec2, Vec3};
use panovr::core::backend::{Cursor, ScreenshotOptions};
use panovr::core::error::SceneError;
use panovr::core::events::EventBus;
use panovr::core::hotspot::{HotspotContent, HotspotId, HotspotRecord, HotspotType, Point3, StylePatch};
use panovr::core::input::{KeyAction, PointerButton};
use panovr::core::scene::{ClickOutcome, LoadOptions, LoadOutcome, SceneEvent, SceneHandle, SceneOptions};
use pollster::block_on;
use std::cell::RefCell;
use std::rc::Rc;

const W: u32 = 800;
const H: u32 = 600;
const CENTRE: Vec2 = Vec2::new(400.0, 300.0);
const PANO: &str = "pano.png";

fn scene() -> SceneHandle<RecordingBackend> {
    scene_with(SceneOptions::default())
}

fn scene_with(options: SceneOptions) -> SceneHandle<RecordingBackend> {
    SceneHandle::create(RecordingBackend::default(), W, H, options, Rc::new(EventBus::new()))
}

fn loaded_scene() -> SceneHandle<RecordingBackend> {
    let scene = scene();
    let fetcher = MapFetcher::with(PANO, png_bytes(8, 4));
    block_on(scene.load_panorama(&fetcher, PANO, LoadOptions::default())).unwrap();
    scene
}

fn gate(id: &str) -> HotspotRecord {
    HotspotRecord {
        id: Some(id.to_string()),
        position: Point3 {
            x: 0.0,
            y: 0.0,
            z: -10.0,
        },
        kind: HotspotType::Info,
        content: HotspotContent {
            title: Some("Gate".into()),
            ..Default::default()
        },
        style: StylePatch::default(),
    }
}

#[test]
fn initialized_reaches_listeners_registered_before_create() {
    let events = Rc::new(EventBus::new());
    let names = record_names(&events, &["initialized"]);
    let scene = SceneHandle::create(RecordingBackend::default(), W, H, SceneOptions::default(), events);
    assert_eq!(*names.borrow(), vec!["initialized"]);
    assert_eq!(scene.read(|m| m.backend().viewport), (W, H));
}

#[test]
fn camera_starts_inside_looking_forward() {
    let scene = scene();
    let (eye, target) = scene.read(|m| (m.camera().eye, m.camera().target));
    assert_eq!(eye, Vec3::new(0.0, 0.0, 1.0));
    assert_eq!(target, Vec3::ZERO);
}

#[test]
fn load_emits_start_progress_complete() {
    let scene = scene();
    let names = record_names(scene.events(), &["loadStart", "loadProgress", "loadComplete", "loadError"]);
    let fetcher = MapFetcher::with(PANO, png_bytes(8, 4));
    let outcome = block_on(scene.load_panorama(&fetcher, PANO, LoadOptions::default())).unwrap();
    assert_eq!(outcome, LoadOutcome::Loaded { width: 8, height: 4 });
    assert_eq!(
        *names.borrow(),
        vec!["loadStart", "loadProgress", "loadProgress", "loadComplete"]
    );
    assert_eq!(scene.read(|m| m.panorama().map(|p| p.url.clone())), Some(PANO.to_string()));
}

#[test]
fn repeated_loads_keep_one_panorama_alive() {
    let scene = scene();
    let names = record_names(scene.events(), &["loadComplete"]);
    let fetcher = MapFetcher::with(PANO, png_bytes(8, 4));
    for _ in 0..10 {
        block_on(scene.load_panorama(&fetcher, PANO, LoadOptions::default())).unwrap();
    }
    assert_eq!(names.borrow().len(), 10);
    assert_eq!(scene.read(|m| m.backend().panoramas()), 1);
    assert_eq!(scene.read(|m| m.backend().released.len()), 9);
}

#[test]
fn older_load_is_superseded_by_newer_one() {
    let scene = scene();
    let names = record_names(scene.events(), &["loadComplete"]);
    let first = scene.with(|m| m.begin_load("a.png", LoadOptions::default())).unwrap();
    let second = scene.with(|m| m.begin_load("b.png", LoadOptions::default())).unwrap();
    assert!(!scene.read(|m| m.is_current(&first)));

    let image = panovr::core::backend::PanoramaImage::decode(&png_bytes(4, 2)).unwrap();
    let stale = scene.with(|m| m.finish_load(first, Ok(image.clone()))).unwrap();
    assert_eq!(stale, LoadOutcome::Superseded);
    assert!(names.borrow().is_empty());
    assert_eq!(scene.read(|m| m.backend().panoramas()), 0);

    let fresh = scene.with(|m| m.finish_load(second, Ok(image))).unwrap();
    assert_eq!(fresh, LoadOutcome::Loaded { width: 4, height: 2 });
    assert_eq!(scene.read(|m| m.panorama().map(|p| p.url.clone())), Some("b.png".into()));
}

#[test]
fn destroy_while_loading_cancels_quietly() {
    let scene = scene();
    let names = record_names(scene.events(), &["loadComplete", "loadError"]);
    let ticket = scene.with(|m| m.begin_load("a.png", LoadOptions::default())).unwrap();
    scene.with(|m| m.destroy());
    let image = panovr::core::backend::PanoramaImage::decode(&png_bytes(4, 2)).unwrap();
    assert_eq!(scene.with(|m| m.finish_load(ticket, Ok(image))), Ok(LoadOutcome::Cancelled));
    assert!(names.borrow().is_empty());
    assert_eq!(scene.read(|m| m.backend().panoramas()), 0);
}

#[test]
fn destroy_from_a_progress_listener_cancels_the_pending_load() {
    let scene = scene();
    let names = record_names(scene.events(), &["loadComplete", "loadError", "destroyed"]);
    let handle = scene.clone();
    scene.events().on("loadProgress", move |_| {
        handle.with(|m| m.destroy());
        Ok(())
    });
    let fetcher = MapFetcher::with(PANO, png_bytes(8, 4));
    let outcome = block_on(scene.load_panorama(&fetcher, PANO, LoadOptions::default()));
    assert_eq!(outcome, Ok(LoadOutcome::Cancelled));
    assert_eq!(*names.borrow(), vec!["destroyed"]);
    assert_eq!(scene.read(|m| m.backend().panoramas()), 0);
}

#[test]
fn failed_fetch_emits_load_error_and_leaves_no_panorama() {
    let scene = loaded_scene();
    let errors = Rc::new(RefCell::new(Vec::new()));
    let e = errors.clone();
    scene.events().on("loadError", move |ev| {
        if let SceneEvent::LoadError { url, .. } = ev {
            e.borrow_mut().push(url.clone());
        }
        Ok(())
    });
    let result = block_on(scene.load_panorama(&MapFetcher::default(), "missing.jpg", LoadOptions::default()));
    assert!(matches!(result, Err(SceneError::Fetch { .. })));
    assert_eq!(*errors.borrow(), vec!["missing.jpg".to_string()]);
    assert_eq!(scene.read(|m| m.panorama_resource()), None);
    assert_eq!(scene.read(|m| m.backend().panoramas()), 0);
}

#[test]
fn undecodable_bytes_are_a_load_error() {
    let scene = scene();
    let fetcher = MapFetcher::with("bad.jpg", b"not an image".to_vec());
    let result = block_on(scene.load_panorama(&fetcher, "bad.jpg", LoadOptions::default()));
    assert!(matches!(result, Err(SceneError::Decode(_))));
}

#[test]
fn oversized_panorama_is_downscaled_to_device_limit() {
    let scene = scene();
    scene.with(|m| m.backend_mut().max_texture = Some(16));
    let fetcher = MapFetcher::with(PANO, png_bytes(64, 32));
    let outcome = block_on(scene.load_panorama(&fetcher, PANO, LoadOptions::default())).unwrap();
    assert_eq!(outcome, LoadOutcome::Loaded { width: 16, height: 8 });
}

#[test]
fn add_and_remove_hotspot() {
    let scene = scene();
    let names = record_names(scene.events(), &["hotspotAdded", "hotspotRemoved"]);
    let id = scene.with(|m| m.add_hotspot(gate("h1"))).unwrap();
    assert_eq!(id.as_str(), "h1");
    assert_eq!(scene.read(|m| m.hotspot_count()), 1);
    assert_eq!(scene.read(|m| m.backend().drawables()), 3);

    assert!(scene.with(|m| m.remove_hotspot(&id)));
    assert!(!scene.with(|m| m.remove_hotspot(&id)));
    assert!(!scene.with(|m| m.remove_hotspot(&HotspotId::from("nope"))));
    assert_eq!(scene.read(|m| m.backend().drawables()), 0);
    assert_eq!(*names.borrow(), vec!["hotspotAdded", "hotspotRemoved"]);
}

#[test]
fn duplicate_ids_resolve_to_the_first() {
    let scene = scene();
    scene.with(|m| m.add_hotspot(gate("dup"))).unwrap();
    let mut second = gate("dup");
    second.position.z = -20.0;
    scene.with(|m| m.add_hotspot(second)).unwrap();
    let z = scene.read(|m| m.hotspot(&HotspotId::from("dup")).map(|h| h.position().z));
    assert_eq!(z, Some(-10.0));
    assert!(scene.with(|m| m.remove_hotspot(&HotspotId::from("dup"))));
    let z = scene.read(|m| m.hotspot(&HotspotId::from("dup")).map(|h| h.position().z));
    assert_eq!(z, Some(-20.0));
}

#[test]
fn clear_hotspots_reports_count() {
    let scene = scene();
    scene.with(|m| m.add_hotspot(gate("a"))).unwrap();
    scene.with(|m| m.add_hotspot(gate("b"))).unwrap();
    let counts = Rc::new(RefCell::new(Vec::new()));
    let c = counts.clone();
    scene.events().on("hotspotsCleared", move |ev| {
        if let SceneEvent::HotspotsCleared { count } = ev {
            c.borrow_mut().push(*count);
        }
        Ok(())
    });
    scene.with(|m| m.clear_hotspots());
    assert_eq!(*counts.borrow(), vec![2]);
    assert!(scene.read(|m| m.backend().live.is_empty()));
}

#[test]
fn click_on_hotspot_emits_hotspot_click_not_scene_click() {
    let scene = loaded_scene();
    scene.with(|m| m.add_hotspot(gate("h1"))).unwrap();
    let names = record_names(scene.events(), &["hotspotClick", "sceneClick", "showModal"]);
    let outcome = scene.with(|m| m.click(CENTRE)).unwrap();
    assert_eq!(outcome, ClickOutcome::Hotspot(HotspotId::from("h1")));
    assert_eq!(*names.borrow(), vec!["showModal", "hotspotClick"]);
    assert!(scene.read(|m| m.hotspot(&HotspotId::from("h1")).unwrap().is_selected()));
}

#[test]
fn nearest_hotspot_wins() {
    let scene = scene();
    let mut far = gate("far");
    far.position.z = -40.0;
    scene.with(|m| m.add_hotspot(far)).unwrap();
    scene.with(|m| m.add_hotspot(gate("near"))).unwrap();
    assert_eq!(scene.read(|m| m.hotspot_at(CENTRE)), Some(HotspotId::from("near")));
}

#[test]
fn scene_click_lands_on_the_panorama_sphere() {
    let scene = loaded_scene();
    let points = Rc::new(RefCell::new(Vec::new()));
    let p = points.clone();
    scene.events().on("sceneClick", move |ev| {
        if let SceneEvent::SceneClick { point, ndc, .. } = ev {
            p.borrow_mut().push((Vec3::from(*point), *ndc));
        }
        Ok(())
    });
    let outcome = scene.with(|m| m.click(CENTRE)).unwrap();
    let ClickOutcome::Scene(point) = outcome else {
        panic!("expected a scene click, got {:?}", outcome);
    };
    assert!((point.length() - 500.0).abs() < 0.1);
    assert!((point - Vec3::new(0.0, 0.0, -500.0)).length() < 0.5);
    let emitted = points.borrow();
    assert_eq!(emitted.len(), 1);
    assert!(emitted[0].1.x.abs() < 1e-6 && emitted[0].1.y.abs() < 1e-6);
}

#[test]
fn click_without_panorama_or_hotspot_is_a_miss() {
    let scene = scene();
    let names = record_names(scene.events(), &["sceneClick"]);
    assert_eq!(scene.with(|m| m.click(CENTRE)).unwrap(), ClickOutcome::Miss);
    assert!(names.borrow().is_empty());
}

#[test]
fn link_hotspot_opens_its_url() {
    let scene = scene();
    let mut link = gate("l1");
    link.kind = HotspotType::Link;
    link.content.url = Some("https://example.com/tour".into());
    scene.with(|m| m.add_hotspot(link)).unwrap();
    scene.with(|m| m.click(CENTRE)).unwrap();
    assert_eq!(
        scene.read(|m| m.backend().opened.clone()),
        vec![("https://example.com/tour".to_string(), "_blank".to_string())]
    );
}

#[test]
fn audio_hotspot_click_requests_playback() {
    let scene = scene();
    let mut bell = gate("bell");
    bell.kind = HotspotType::Audio;
    bell.content.audio_url = Some("bell.mp3".into());
    bell.content.looped = Some(true);
    scene.with(|m| m.add_hotspot(bell)).unwrap();
    let requests = Rc::new(RefCell::new(Vec::new()));
    let r = requests.clone();
    scene.events().on("playAudio", move |ev| {
        if let SceneEvent::PlayAudio { url, looped, .. } = ev {
            r.borrow_mut().push((url.clone(), *looped));
        }
        Ok(())
    });
    scene.with(|m| m.click(CENTRE)).unwrap();
    assert_eq!(*requests.borrow(), vec![("bell.mp3".to_string(), true)]);
}

#[test]
fn hover_sets_cursor_and_tooltip() {
    let scene = scene();
    let mut h = gate("h1");
    h.content.tooltip = Some("City gate".into());
    scene.with(|m| m.add_hotspot(h)).unwrap();
    scene.with(|m| m.pointer_move(CENTRE));
    assert_eq!(scene.read(|m| m.hovered().cloned()), Some(HotspotId::from("h1")));
    assert_eq!(scene.read(|m| m.backend().cursor), Some(Cursor::Pointer));
    assert_eq!(scene.read(|m| m.backend().tooltip.clone()), Some("City gate".into()));

    scene.with(|m| m.pointer_leave());
    assert_eq!(scene.read(|m| m.hovered().cloned()), None);
    assert_eq!(scene.read(|m| m.backend().cursor), Some(Cursor::Default));
    assert_eq!(scene.read(|m| m.backend().tooltip.clone()), None);
}

#[test]
fn drag_moves_hotspot_onto_the_sphere_and_suppresses_click() {
    let scene = loaded_scene();
    let id = scene.with(|m| m.add_hotspot(gate("h1"))).unwrap();
    assert!(scene.with(|m| m.enable_hotspot_drag(&id)));
    let names = record_names(
        scene.events(),
        &["hotspotDragStart", "hotspotDrag", "hotspotDragEnd", "hotspotClick"],
    );

    assert!(scene.with(|m| m.pointer_down(CENTRE, PointerButton::Primary)));
    assert!(scene.read(|m| m.is_dragging()));
    assert!(!scene.read(|m| m.controls().enabled));
    assert_eq!(scene.read(|m| m.backend().cursor), Some(Cursor::Grabbing));

    scene.with(|m| m.pointer_move(Vec2::new(600.0, 200.0)));
    scene.with(|m| m.pointer_up());
    assert!(!scene.read(|m| m.is_dragging()));
    assert!(scene.read(|m| m.controls().enabled));

    let pos = scene.read(|m| m.hotspot(&id).unwrap().position());
    assert!((pos.length() - 500.0).abs() < 0.1);
    assert!(pos.x > 0.0 && pos.y > 0.0);

    assert_eq!(scene.with(|m| m.click(Vec2::new(600.0, 200.0))).unwrap(), ClickOutcome::Suppressed);
    assert_eq!(
        *names.borrow(),
        vec!["hotspotDragStart", "hotspotDrag", "hotspotDragEnd"]
    );
}

#[test]
fn drag_needs_enable_and_a_panorama() {
    let scene = scene();
    let id = scene.with(|m| m.add_hotspot(gate("h1"))).unwrap();
    scene.with(|m| m.enable_hotspot_drag(&id));
    // No panorama: the press goes to the orbit controls
    scene.with(|m| m.pointer_down(CENTRE, PointerButton::Primary));
    assert!(!scene.read(|m| m.is_dragging()));
    scene.with(|m| m.pointer_up());

    let scene = loaded_scene();
    let id = scene.with(|m| m.add_hotspot(gate("h1"))).unwrap();
    scene.with(|m| m.pointer_down(CENTRE, PointerButton::Primary));
    assert!(!scene.read(|m| m.is_dragging()));
    scene.with(|m| m.pointer_up());

    assert!(!scene.with(|m| m.enable_hotspot_drag(&HotspotId::from("nope"))));
    scene.with(|m| m.enable_hotspot_drag(&id));
    scene.with(|m| m.disable_hotspot_drag(&id));
    scene.with(|m| m.disable_hotspot_drag(&id));
    assert!(!scene.read(|m| m.is_drag_enabled(&id)));
}

#[test]
fn click_after_stationary_drag_still_counts() {
    let scene = loaded_scene();
    let id = scene.with(|m| m.add_hotspot(gate("h1"))).unwrap();
    scene.with(|m| m.enable_hotspot_drag(&id));
    scene.with(|m| m.pointer_down(CENTRE, PointerButton::Primary));
    scene.with(|m| m.pointer_up());
    assert_eq!(scene.with(|m| m.click(CENTRE)).unwrap(), ClickOutcome::Hotspot(id));
}

#[test]
fn keyboard_shortcuts() {
    let scene = scene();
    let names = record_names(scene.events(), &["autoRotateToggle", "viewReset"]);
    assert_eq!(scene.with(|m| m.key(" ")), None);
    assert!(scene.read(|m| m.controls().auto_rotate));
    assert_eq!(scene.with(|m| m.key("r")), None);
    assert_eq!(scene.with(|m| m.key("Enter")), Some(KeyAction::ToggleFullscreen));
    assert_eq!(scene.with(|m| m.key("x")), None);
    assert_eq!(*names.borrow(), vec!["autoRotateToggle", "viewReset"]);
}

#[test]
fn tick_renders_hotspots_over_panorama() {
    let scene = loaded_scene();
    scene.with(|m| m.add_hotspot(gate("h1"))).unwrap();
    scene.with(|m| m.tick(0.016)).unwrap();
    let (renders, draws, pano) = scene.read(|m| {
        let b = m.backend();
        (b.renders, b.last_draws, b.last_panorama)
    });
    assert_eq!(renders, 1);
    assert_eq!(draws, 3);
    assert_eq!(pano, scene.read(|m| m.panorama_resource()));
}

#[test]
fn resize_and_fullscreen_events() {
    let scene = scene();
    let names = record_names(scene.events(), &["resize", "fullscreenChange", "fullscreenError"]);
    scene.with(|m| m.resize(1024, 0));
    assert_eq!(scene.read(|m| m.viewport()), (1024, 1));
    scene.with(|m| m.set_fullscreen(true));
    assert!(scene.read(|m| m.is_fullscreen()));
    scene.with(|m| m.fullscreen_failed(&SceneError::Fullscreen("denied".into())));
    assert_eq!(*names.borrow(), vec!["resize", "fullscreenChange", "fullscreenError"]);
}

#[test]
fn screenshot_success_and_failure() {
    let scene = scene();
    let names = record_names(scene.events(), &["screenshot", "screenshotError"]);
    let shot = scene
        .with(|m| m.take_screenshot(ScreenshotOptions::default()))
        .unwrap();
    assert_eq!(shot.data_url, "data:image/png;base64,AAAA");
    assert_eq!((shot.width, shot.height), (W, H));

    scene.with(|m| m.backend_mut().fail_capture = true);
    let err = scene.with(|m| m.take_screenshot(ScreenshotOptions::default()));
    assert_eq!(err, Err(SceneError::ContextLost));
    assert_eq!(*names.borrow(), vec!["screenshot", "screenshotError"]);
}

#[test]
fn listeners_may_call_back_into_the_scene() {
    let scene = scene();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let handle = scene.clone();
    let s = seen.clone();
    scene.events().on("hotspotAdded", move |_| {
        let count = handle.with(|m| m.hotspot_count());
        s.borrow_mut().push(count);
        if count == 1 {
            handle.with(|m| m.add_hotspot(gate("second")))?;
        }
        Ok(())
    });
    scene.with(|m| m.add_hotspot(gate("first"))).unwrap();
    assert_eq!(*seen.borrow(), vec![1, 2]);
}

#[test]
fn destroy_is_idempotent_and_releases_everything() {
    let scene = loaded_scene();
    scene.with(|m| m.add_hotspot(gate("h1"))).unwrap();
    let names = record_names(scene.events(), &["hotspotsCleared", "destroyed"]);
    scene.with(|m| m.destroy());
    scene.with(|m| m.destroy());
    assert_eq!(*names.borrow(), vec!["hotspotsCleared", "destroyed"]);
    assert!(scene.read(|m| m.backend().live.is_empty()));
    assert_eq!(scene.read(|m| m.backend().shutdowns), 1);

    assert_eq!(scene.with(|m| m.add_hotspot(gate("late"))), Err(SceneError::Destroyed));
    assert!(scene.with(|m| m.tick(0.016)).is_ok());
    assert_eq!(scene.read(|m| m.backend().renders), 0);
    let late = block_on(scene.load_panorama(&MapFetcher::default(), PANO, LoadOptions::default()));
    assert_eq!(late, Err(SceneError::Destroyed));
}

#[test]
fn camera_change_only_when_the_camera_moves() {
    let scene = scene_with(SceneOptions {
        enable_damping: false,
        ..Default::default()
    });
    let names = record_names(scene.events(), &["cameraChange"]);
    scene.with(|m| m.tick(0.016)).unwrap();
    assert!(names.borrow().is_empty());

    scene.with(|m| m.key("ArrowLeft"));
    scene.with(|m| m.tick(0.016)).unwrap();
    assert_eq!(names.borrow().len(), 1);

    scene.with(|m| m.tick(0.016)).unwrap();
    assert_eq!(names.borrow().len(), 1);
}

#[test]
fn every_frame_emits_render() {
    let scene = loaded_scene();
    let deltas = Rc::new(RefCell::new(Vec::new()));
    let d = deltas.clone();
    scene.events().on("render", move |ev| {
        if let SceneEvent::Render { delta } = ev {
            d.borrow_mut().push(*delta);
        }
        Ok(())
    });
    scene.with(|m| m.tick(0.016)).unwrap();
    scene.with(|m| m.tick(0.032)).unwrap();
    assert_eq!(*deltas.borrow(), vec![0.016, 0.032]);

    scene.with(|m| m.destroy());
    scene.with(|m| m.tick(0.016)).unwrap();
    assert_eq!(deltas.borrow().len(), 2);
}

#[test]
fn double_click_reports_the_sphere_point() {
    let points = Rc::new(RefCell::new(Vec::new()));
    for scene in [loaded_scene(), scene()] {
        let p = points.clone();
        scene.events().on("sceneDoubleClick", move |ev| {
            if let SceneEvent::SceneDoubleClick { point, .. } = ev {
                p.borrow_mut().push(point.map(Vec3::from));
            }
            Ok(())
        });
        scene.with(|m| m.double_click(CENTRE));
    }
    let points = points.borrow();
    assert_eq!(points.len(), 2);
    let hit = points[0].unwrap();
    assert!((hit - Vec3::new(0.0, 0.0, -500.0)).length() < 0.5);
    assert_eq!(points[1], None);
}

#[test]
fn hidden_hotspot_is_not_drawn_or_clicked() {
    let scene = loaded_scene();
    let id = scene.with(|m| m.add_hotspot(gate("h1"))).unwrap();
    assert!(scene.with(|m| m.set_hotspot_visible(&id, false)));
    assert!(!scene.with(|m| m.set_hotspot_visible(&HotspotId::from("nope"), false)));
    scene.with(|m| m.tick(0.016)).unwrap();
    assert_eq!(scene.read(|m| m.backend().last_draws), 0);
    assert!(matches!(scene.with(|m| m.click(CENTRE)), Ok(ClickOutcome::Scene(_))));
    assert!(!scene.read(|m| m.hotspots()[0].visible));

    scene.with(|m| m.set_hotspot_visible(&id, true));
    assert_eq!(scene.with(|m| m.click(CENTRE)).unwrap(), ClickOutcome::Hotspot(id));
}

#[test]
fn hiding_the_dragged_hotspot_ends_the_drag() {
    let scene = loaded_scene();
    let id = scene.with(|m| m.add_hotspot(gate("h1"))).unwrap();
    scene.with(|m| m.enable_hotspot_drag(&id));
    let names = record_names(scene.events(), &["hotspotDragStart", "hotspotDragEnd"]);
    assert!(scene.with(|m| m.pointer_down(CENTRE, PointerButton::Primary)));
    assert!(scene.read(|m| m.is_dragging()));

    scene.with(|m| m.set_hotspot_visible(&id, false));
    assert!(!scene.read(|m| m.is_dragging()));
    assert!(scene.read(|m| m.controls().enabled));
    assert_eq!(scene.read(|m| m.backend().cursor), Some(Cursor::Default));
    assert_eq!(*names.borrow(), vec!["hotspotDragStart", "hotspotDragEnd"]);
    scene.with(|m| m.pointer_up());
    assert_eq!(names.borrow().len(), 2);
}

#[test]
fn select_hotspot_builds_the_ring_once() {
    let scene = scene();
    let id = scene.with(|m| m.add_hotspot(gate("h1"))).unwrap();
    assert_eq!(scene.read(|m| m.backend().drawables()), 3);

    assert_eq!(scene.with(|m| m.select_hotspot(&id, true)), Ok(true));
    assert!(scene.read(|m| m.hotspot(&id).unwrap().is_selected()));
    assert!(scene.read(|m| m.hotspot(&id).unwrap().has_ring()));
    assert_eq!(scene.read(|m| m.backend().drawables()), 4);

    scene.with(|m| m.select_hotspot(&id, false)).unwrap();
    assert!(!scene.read(|m| m.hotspot(&id).unwrap().is_selected()));
    scene.with(|m| m.select_hotspot(&id, true)).unwrap();
    assert_eq!(scene.read(|m| m.backend().drawables()), 4);

    assert_eq!(scene.with(|m| m.select_hotspot(&HotspotId::from("nope"), true)), Ok(false));
}
