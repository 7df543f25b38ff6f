use anyhow::{Context, Result};
use kestrel_sprite_anim::cli::ClipCheckOptions;
use kestrel_sprite_anim::config::PreviewConfig;
use kestrel_sprite_anim::ecs::EcsWorld;
use kestrel_sprite_anim::events::GameEvent;
use serde_json::json;
use std::process;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("clip_check error: {err:?}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = ClipCheckOptions::parse_from_env()?;
    let mut preview = PreviewConfig::load(&options.config)?;
    let overrides = options.config_overrides();
    if !overrides.is_empty() {
        log::info!("[animator] CLI overrides: {}", overrides.applied_fields().join(", "));
    }
    preview.animator.apply_overrides(&overrides);

    let registry = preview.build_registry().context("Failed to build preview assets")?;
    let mut world = EcsWorld::new(registry);
    let entity = world.spawn_animated(&preview.animator);
    log::info!(
        "[animator] previewing {} clip(s) for {:.2}s at {:.4}s steps",
        preview.animator.clips.len(),
        options.duration,
        options.step
    );

    let mut elapsed = 0.0_f32;
    let mut last_frame = None;
    let mut frame_changes = 0_usize;
    for _ in 0..options.step_count() {
        world.update(options.step);
        elapsed += options.step;
        for event in world.drain_events() {
            report_event(elapsed, &event);
        }
        let sprite = world.sprite(entity).cloned().unwrap_or_default();
        if sprite.frame != last_frame {
            frame_changes += 1;
            last_frame = sprite.frame;
            println!(
                "{elapsed:>8.3}s frame {:?} region {} uv {:?}",
                sprite.frame,
                sprite.region.as_deref().unwrap_or("-"),
                sprite.uv.to_array()
            );
        }
    }

    let current = world.animator(entity).and_then(|animator| animator.current_clip());
    let summary = json!({
        "elapsed": elapsed,
        "frame_changes": frame_changes,
        "current_clip": current.as_ref().map(|clip| clip.name().to_string()),
        "playing": current.as_ref().is_some_and(|clip| clip.is_playing()),
        "time": current.as_ref().map(|clip| clip.time()),
        "frame": current.as_ref().map(|clip| clip.frame()),
    });
    println!("{summary}");
    Ok(())
}

fn report_event(elapsed: f32, event: &GameEvent) {
    println!("{elapsed:>8.3}s {event}");
}
