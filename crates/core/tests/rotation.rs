use std::collections::HashSet;

use led_matrix_core::{
    AppConfig, CancelHandle, EffectCatalog, MemorySink, Pacing, Player, PlayerOptions, RotationQueue, RunOutcome,
};

const SIX: [&str; 6] = ["fire", "starfall", "kaleidoscope", "noise-field", "fireworks", "sphere-scan"];

fn six() -> Vec<String> {
    SIX.iter().map(|s| s.to_string()).collect()
}

#[test]
fn each_cycle_is_a_permutation() {
    let mut queue = RotationQueue::new(six(), 2024).unwrap();
    let expected: HashSet<String> = six().into_iter().collect();

    let first: Vec<String> = (0..6).map(|_| queue.next()).collect();
    assert_eq!(first.iter().cloned().collect::<HashSet<_>>(), expected);
    assert_eq!(queue.cycle(), 1);
    assert_eq!(queue.remaining(), 0);

    let seventh = queue.next();
    assert_eq!(queue.cycle(), 2);
    let mut second = vec![seventh];
    second.extend((0..5).map(|_| queue.next()));
    assert_eq!(second.into_iter().collect::<HashSet<_>>(), expected);
}

#[test]
fn same_seed_same_order() {
    let mut a = RotationQueue::new(six(), 7).unwrap();
    let mut b = RotationQueue::new(six(), 7).unwrap();
    for _ in 0..18 {
        assert_eq!(a.next(), b.next());
    }
}

#[test]
fn player_visits_every_effect_once_per_cycle() {
    let mut config = AppConfig::default();
    config.display.width = 16;
    config.display.height = 16;
    config.rotation.effects = six();
    config.rotation.seed = Some(99);
    config.rotation.switch_after_secs = Some(0.25);

    let mut player = Player::new(EffectCatalog::builtin(), config)
        .unwrap()
        .with_options(PlayerOptions {
            pacing: Pacing::Unpaced(0.125),
            switch_after: None,
            max_frames: Some(12),
        });
    let sink = MemorySink::counting();
    let report = player.run_rotation(&mut sink.clone(), &CancelHandle::new()).unwrap();

    let played: HashSet<&str> = report.runs[..6].iter().map(|r| r.id.as_str()).collect();
    assert_eq!(played, SIX.into_iter().collect::<HashSet<&str>>());
    assert!(report.runs[..6].iter().all(|r| r.outcome == RunOutcome::TimedOut && r.frames == 2));
    assert_eq!(report.outcome(), Some(RunOutcome::FrameLimit));
    assert_eq!(sink.frame_count(), 12);
    assert_eq!(sink.clear_count(), 1);
}

#[test]
fn finite_effects_move_on_when_done() {
    let mut config = AppConfig::default();
    config.display.width = 16;
    config.display.height = 16;
    config.rotation.effects = vec!["text".into(), "fire".into()];
    config.rotation.seed = Some(4);
    config.text.text = "A".into();
    config.text.speed = 400.0;

    let mut player = Player::new(EffectCatalog::builtin(), config)
        .unwrap()
        .with_options(PlayerOptions {
            pacing: Pacing::Unpaced(1.0 / 60.0),
            switch_after: None,
            max_frames: Some(2_000),
        });
    let report = player
        .run_rotation(&mut MemorySink::counting(), &CancelHandle::new())
        .unwrap();
    let text_run = report.runs.iter().find(|r| r.id == "text").unwrap();
    assert_eq!(text_run.outcome, RunOutcome::Completed);
    let fire_run = report.runs.iter().find(|r| r.id == "fire");
    assert!(fire_run.is_some_and(|r| matches!(r.outcome, RunOutcome::TimedOut | RunOutcome::FrameLimit)));
}
