use kestrel_sprite_anim::animation::{AnimationClip, PlaybackState};
use kestrel_sprite_anim::assets::{AssetId, AssetRegistry, AtlasTexture, Rect, SpriteResource, TextureAtlas};
use kestrel_sprite_anim::config::ClipDefinition;
use kestrel_sprite_anim::events::ClipEventKind;
use kestrel_sprite_anim::signal::Subscription;
use std::cell::RefCell;
use std::rc::Rc;

const ATLAS: AssetId = AssetId(1);
const SPRITE: AssetId = AssetId(2);

fn loaded_registry(frames: usize) -> AssetRegistry {
    let keys: Vec<String> = (0..frames).map(|i| format!("f{i}")).collect();
    let regions = keys.iter().enumerate().map(|(i, key)| (key.as_str(), Rect { x: i as u32 * 16, y: 0, w: 16, h: 16 }));
    let atlas = TextureAtlas::from_regions(AtlasTexture::new("sheet.png", 16 * frames as u32, 16), regions)
        .expect("build atlas");
    let registry = AssetRegistry::new();
    registry.insert_loaded(ATLAS, "sheet", atlas).expect("insert atlas");
    registry
        .insert_loaded(SPRITE, "sprite", SpriteResource::new(keys.iter().map(String::as_str), Some(ATLAS)))
        .expect("insert sprite");
    registry
}

fn clip(frames: usize, fps: f32, looped: bool) -> (AnimationClip, AssetRegistry) {
    let registry = loaded_registry(frames);
    let definition = ClipDefinition::new("run", fps, looped).with_sprite_asset(SPRITE);
    let clip = AnimationClip::new(&definition, &registry);
    assert_eq!(clip.frame_count(), frames, "sprite should resolve immediately");
    (clip, registry)
}

fn record(clip: &AnimationClip) -> (Rc<RefCell<Vec<ClipEventKind>>>, Subscription) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let subscription = clip.on_event(move |event| sink.borrow_mut().push(event.kind));
    (log, subscription)
}

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

#[test]
fn looping_clip_wraps_and_reports_loop() {
    let (clip, _registry) = clip(4, 2.0, true);
    let (events, _sub) = record(&clip);
    assert!(approx(clip.duration(), 2.0));

    clip.play();
    clip.advance(1.5);
    assert!(approx(clip.time(), 1.5));
    assert_eq!(clip.frame(), 3);

    clip.advance(1.0);
    assert!(approx(clip.time(), 0.5), "time should wrap to 0.5, got {}", clip.time());
    assert_eq!(clip.frame(), 1);
    assert!(clip.is_playing());
    assert_eq!(*events.borrow(), vec![ClipEventKind::Play, ClipEventKind::Loop]);
}

#[test]
fn non_looping_clip_stops_on_last_frame() {
    let (clip, _registry) = clip(4, 4.0, false);
    let (events, _sub) = record(&clip);
    clip.play();
    clip.advance(1.2);
    assert!(approx(clip.time(), 1.0));
    assert_eq!(clip.frame(), 3);
    assert!(!clip.is_playing());
    assert_eq!(clip.state(), PlaybackState::Stopped);
    assert_eq!(*events.borrow(), vec![ClipEventKind::Play, ClipEventKind::End]);

    clip.advance(1.0);
    assert_eq!(events.borrow().len(), 2, "a stopped clip stays quiet");
}

#[test]
fn non_looping_clip_resting_on_duration_ends_on_next_step() {
    let (clip, _registry) = clip(4, 4.0, false);
    let (events, _sub) = record(&clip);
    clip.play();
    clip.advance(0.5);
    clip.advance(0.5);
    assert_eq!(clip.time(), clip.duration());
    assert_eq!(clip.frame(), 3);
    assert!(clip.is_playing(), "reaching duration exactly is not the end");
    assert_eq!(*events.borrow(), vec![ClipEventKind::Play]);

    clip.advance(0.01);
    assert_eq!(clip.time(), clip.duration());
    assert!(!clip.is_playing());
    assert_eq!(*events.borrow(), vec![ClipEventKind::Play, ClipEventKind::End]);
}

#[test]
fn zero_fps_clip_never_advances() {
    let (clip, _registry) = clip(4, 0.0, true);
    clip.play();
    clip.set_frame(2);
    let (events, _sub) = record(&clip);
    let (time, frame) = (clip.time(), clip.frame());
    assert_eq!(clip.duration(), 0.0);

    clip.advance(5.0);
    clip.advance(0.25);
    assert_eq!(clip.time(), time);
    assert_eq!(clip.frame(), frame);
    assert!(time.is_finite());
    assert!(events.borrow().is_empty());
}

#[test]
fn play_while_playing_is_a_no_op() {
    let (clip, _registry) = clip(4, 2.0, true);
    let (events, _sub) = record(&clip);
    clip.play();
    clip.advance(0.6);
    assert_eq!(clip.frame(), 1);

    clip.play();
    assert_eq!(clip.frame(), 1, "frame must not reset");
    assert!(approx(clip.time(), 0.6));
    assert_eq!(*events.borrow(), vec![ClipEventKind::Play]);
}

#[test]
fn play_from_pause_restarts_at_first_frame() {
    let (clip, _registry) = clip(4, 2.0, true);
    clip.play();
    clip.advance(1.1);
    clip.pause();
    clip.play();
    assert_eq!(clip.state(), PlaybackState::Playing);
    assert_eq!(clip.frame(), 0);
    assert_eq!(clip.time(), 0.0);
}

#[test]
fn pause_resume_stop_transitions() {
    let (clip, _registry) = clip(4, 2.0, true);
    let (events, _sub) = record(&clip);

    clip.pause();
    clip.resume();
    assert!(events.borrow().is_empty(), "pause/resume need a playing clip");

    clip.play();
    clip.advance(0.6);
    clip.pause();
    clip.pause();
    assert_eq!(clip.state(), PlaybackState::Paused);
    clip.advance(1.0);
    assert!(approx(clip.time(), 0.6), "paused clips hold their time");

    clip.resume();
    assert_eq!(clip.state(), PlaybackState::Playing);
    clip.stop();
    clip.stop();
    assert_eq!(clip.state(), PlaybackState::Stopped);
    assert_eq!((clip.time(), clip.frame()), (0.0, 0));
    assert_eq!(
        *events.borrow(),
        vec![ClipEventKind::Play, ClipEventKind::Pause, ClipEventKind::Resume, ClipEventKind::Stop]
    );
}

#[test]
fn non_looping_playback_is_bounded_and_monotonic() {
    let (clip, _registry) = clip(5, 10.0, false);
    let (events, _sub) = record(&clip);
    clip.play();
    let mut last_frame = clip.frame();
    for _ in 0..30 {
        clip.advance(0.07);
        assert!(clip.time() <= clip.duration());
        assert!(clip.frame() >= last_frame, "frames must not go backwards");
        last_frame = clip.frame();
    }
    let ends = events.borrow().iter().filter(|kind| **kind == ClipEventKind::End).count();
    assert_eq!(ends, 1);
    assert_eq!(last_frame, 4);
}

#[test]
fn looping_playback_reports_each_wrap() {
    let (clip, _registry) = clip(4, 8.0, true);
    let (events, _sub) = record(&clip);
    clip.play();
    let duration = clip.duration();
    let mut wraps = 0;
    let mut previous = clip.time();
    for _ in 0..49 {
        clip.advance(0.13);
        let time = clip.time();
        assert!((0.0..duration).contains(&time), "time {time} escaped [0, {duration})");
        if time < previous {
            wraps += 1;
        }
        previous = time;
    }
    let loops = events.borrow().iter().filter(|kind| **kind == ClipEventKind::Loop).count();
    assert_eq!(wraps, 12);
    assert_eq!(loops, wraps);
}

#[test]
fn frame_and_time_round_trip() {
    let (clip, _registry) = clip(6, 12.0, false);
    for frame in 0..6 {
        clip.set_frame(frame);
        let time = clip.time();
        clip.set_time(time);
        assert_eq!(clip.frame(), frame, "round trip through time {time}");
    }
}

// Explicit frame assignment clamps to the frame count, one past the last index.
#[test]
fn set_frame_upper_clamp_is_frame_count_not_last_index() {
    let (clip, _registry) = clip(4, 2.0, false);
    clip.set_frame(10);
    assert_eq!(clip.frame(), 4);
    assert!(approx(clip.time(), clip.duration()));

    clip.set_time(clip.time());
    assert_eq!(clip.frame(), 3, "time-derived frames stay in range");
}

#[test]
fn set_time_wraps_or_clamps() {
    let (looping, _a) = clip(4, 2.0, true);
    looping.set_time(2.5);
    assert!(approx(looping.time(), 0.5));
    assert_eq!(looping.frame(), 1);

    let (once, _b) = clip(4, 4.0, false);
    once.set_time(5.0);
    assert!(approx(once.time(), 1.0));
    assert_eq!(once.frame(), 3);
    once.set_time(-1.0);
    assert_eq!((once.time(), once.frame()), (0.0, 0));
}

#[test]
fn clip_without_sprite_keeps_flags_but_not_time() {
    let registry = AssetRegistry::new();
    let clip = AnimationClip::new(&ClipDefinition::new("empty", 12.0, true), &registry);
    let (events, _sub) = record(&clip);
    clip.play();
    assert!(clip.is_playing());
    clip.advance(1.0);
    clip.set_frame(3);
    assert_eq!((clip.time(), clip.frame()), (0.0, 0));
    clip.pause();
    assert!(clip.is_paused());
    assert_eq!(*events.borrow(), vec![ClipEventKind::Play, ClipEventKind::Pause]);
}

#[test]
fn changing_fps_rederives_frame() {
    let (clip, _registry) = clip(4, 2.0, true);
    clip.set_time(0.5);
    assert_eq!(clip.frame(), 1);
    clip.set_fps(4.0);
    assert!(approx(clip.duration(), 1.0));
    assert_eq!(clip.frame(), 2);

    clip.set_fps(-3.0);
    assert_eq!(clip.fps(), 0.0, "invalid fps disables playback");
}

#[test]
fn definition_round_trips_through_clip() {
    let (clip, _registry) = clip(4, 2.0, true);
    let definition = clip.definition();
    assert_eq!(definition.name, "run");
    assert_eq!(definition.fps, 2.0);
    assert!(definition.looped);
    assert_eq!(definition.sprite_asset.map(|asset| asset.id()), Some(SPRITE));
}
