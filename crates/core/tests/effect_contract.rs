use led_matrix_core::{AppConfig, EffectCatalog, EffectFamily, Step};

const SIDE: usize = 32;
const DT: f32 = 1.0 / 60.0;

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.display.width = SIDE;
    config.display.height = SIDE;
    config
}

#[test]
fn zero_delta_never_changes_the_frame() {
    let catalog = EffectCatalog::builtin();
    for id in catalog.ids() {
        let mut effect = catalog.instantiate(id, &config()).unwrap();
        effect.reset(SIDE, SIDE, 12);
        for _ in 0..20 {
            effect.advance(DT);
        }
        let first = effect.advance(0.0);
        assert!(!first.is_done(), "{id}");
        for _ in 0..3 {
            assert_eq!(effect.advance(0.0), first, "{id}");
        }
    }
}

#[test]
fn frames_match_the_panel_size() {
    let catalog = EffectCatalog::builtin();
    for id in catalog.ids() {
        let mut effect = catalog.instantiate(id, &config()).unwrap();
        effect.reset(SIDE, SIDE / 2, 3);
        for _ in 0..5 {
            let frame = effect.advance(DT).into_frame().unwrap();
            assert_eq!((frame.width(), frame.height()), (SIDE, SIDE / 2), "{id}");
        }
    }
}

#[test]
fn finite_effects_finish_with_monotone_segments() {
    let catalog = EffectCatalog::builtin();
    let finite = catalog.descriptors().into_iter().filter(|d| d.family.is_finite());
    for descriptor in finite {
        let id = descriptor.id;
        let mut effect = catalog.instantiate(id, &config()).unwrap();
        effect.reset(SIDE, SIDE, 21);
        let mut last: Option<(usize, f32)> = None;
        let mut finished = false;
        for _ in 0..60 * 120 {
            if let Step::Done = effect.advance(DT) {
                finished = true;
                break;
            }
            let pos = effect.segment().unwrap_or_else(|| panic!("{id} has no segment"));
            assert!((0.0..1.0).contains(&pos.progress), "{id}");
            if let Some((index, progress)) = last {
                assert!(pos.index >= index, "{id}");
                if pos.index == index {
                    assert!(pos.progress >= progress, "{id} went backwards in {}", pos.name);
                }
            }
            last = Some((pos.index, pos.progress));
        }
        assert!(finished, "{id} never finished");
        assert!(effect.advance(DT).is_done(), "{id} resumed after Done");
        assert!(effect.segment().is_none(), "{id}");
    }
}

#[test]
fn perpetual_effects_keep_going() {
    let catalog = EffectCatalog::builtin();
    for descriptor in catalog.descriptors() {
        if descriptor.family != EffectFamily::Perpetual {
            continue;
        }
        let mut effect = catalog.instantiate(descriptor.id, &config()).unwrap();
        effect.reset(SIDE, SIDE, 8);
        for _ in 0..600 {
            assert!(!effect.advance(0.1).is_done(), "{}", descriptor.id);
        }
    }
}

#[test]
fn seeds_make_runs_reproducible() {
    let catalog = EffectCatalog::builtin();
    for id in catalog.ids() {
        let mut a = catalog.instantiate(id, &config()).unwrap();
        let mut b = catalog.instantiate(id, &config()).unwrap();
        a.reset(SIDE, SIDE, 5);
        b.reset(SIDE, SIDE, 5);
        for _ in 0..30 {
            assert_eq!(a.advance(DT), b.advance(DT), "{id}");
        }
    }
}
