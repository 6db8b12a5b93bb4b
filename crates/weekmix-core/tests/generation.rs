use std::collections::{HashMap, HashSet};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tempfile::tempdir;
use weekmix_core::{
    CalendarStore, Catalog, DaySlot, Engine, EngineSettings, FileConfig, PickOrigin,
    PillarPolicy, Pool, RngSource, ScriptedSource, ThemePool,
};

fn default_engine() -> Engine {
    Engine::from_config(&FileConfig::default()).expect("default configuration is valid")
}

#[test]
fn ten_thousand_generations_never_break_a_rule() {
    let engine = default_engine();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut fallbacks = 0;

    for trial in 0..10_000 {
        let outcome = engine
            .generate_with(RngSource::new(&mut rng))
            .unwrap_or_else(|err| panic!("trial {trial} failed: {err}"));
        let violations = outcome.calendar.violations(engine.catalog());
        assert!(violations.is_empty(), "trial {trial}: {violations:?}");
        fallbacks += outcome.report.fallback_count();
    }

    // Both shared pillars land in Connection with probability 1/6, so twenty
    // straight rejections should essentially never happen.
    assert!(fallbacks < 5, "{fallbacks} fallbacks in 10,000 trials");
}

#[test]
fn entertainment_always_keeps_a_shared_pillar_available() {
    let engine = default_engine();
    let shared = engine.catalog().shared_pillars();
    let mut rng = StdRng::seed_from_u64(11);

    for _ in 0..2_000 {
        let outcome = engine.generate_with(RngSource::new(&mut rng)).unwrap();
        let connection_shared = outcome
            .calendar
            .iter()
            .filter(|day| day.theme.as_str() == "Connection")
            .filter(|day| shared.contains(&day.pillar))
            .count();
        assert!(connection_shared < 2);

        let entertainment: HashSet<&str> = outcome
            .calendar
            .iter()
            .filter(|day| day.theme.as_str() == "Entertainment")
            .map(|day| day.pillar.as_str())
            .collect();
        assert_eq!(entertainment.len(), 3);
    }
}

#[test]
fn seeded_engines_agree_on_the_plan() {
    let settings = EngineSettings {
        seed: Some(2024),
        ..EngineSettings::default()
    };
    let catalog = FileConfig::default().catalog().unwrap();
    let left = Engine::new(catalog.clone(), settings).generate().unwrap();
    let right = Engine::new(catalog, settings).generate().unwrap();

    assert!(left.calendar.plan_eq(&right.calendar));
    let left_ids: HashSet<_> = left.calendar.iter().map(|day| day.id).collect();
    assert!(right.calendar.iter().all(|day| !left_ids.contains(&day.id)));
}

#[test]
fn forced_rejection_is_redrawn_from_the_full_pool() {
    let catalog = Catalog::new(
        vec![
            ThemePool::new(
                "A",
                Pool::new(["a1", "a2", "a3", "a4", "a5"]),
                Pool::new(["e"]),
                Pool::new(["f"]),
            ),
            ThemePool::new(
                "B",
                Pool::new(["b1", "b2", "s1", "s2"]),
                Pool::new(["e"]),
                Pool::new(["f"]),
            ),
            ThemePool::new(
                "C",
                Pool::new(["s1", "s2", "c1", "c2"]),
                Pool::new(["e"]),
                Pool::new(["f"]),
            ),
        ],
        vec![
            DaySlot::new("Monday", "A"),
            DaySlot::new("Tuesday", "B"),
            DaySlot::new("Wednesday", "A"),
            DaySlot::new("Thursday", "B"),
            DaySlot::new("Friday", "C"),
            DaySlot::new("Saturday", "C"),
            DaySlot::new("Sunday", "C"),
        ],
    )
    .unwrap();
    let engine = Engine::new(catalog, EngineSettings::default());
    let script = [0, 0, 2, 2, 0, 1, 0, 0, 0];
    let outcome = engine.generate_with(ScriptedSource::new(script)).unwrap();

    let pillars: HashMap<&str, &str> = outcome
        .calendar
        .iter()
        .map(|day| (day.day.as_str(), day.pillar.as_str()))
        .collect();
    assert_eq!(pillars["Monday"], "a1");
    assert_eq!(pillars["Wednesday"], "a2");
    assert_eq!(pillars["Tuesday"], "b1");
    assert_eq!(pillars["Thursday"], "s1");
    assert_eq!(pillars["Friday"], "s2");
    assert_eq!(pillars["Saturday"], "c1");
    assert_eq!(pillars["Sunday"], "c2");

    let b = &outcome.report.themes[1];
    assert_eq!(b.theme.as_str(), "B");
    assert_eq!(b.attempts, 2);
    assert_eq!(b.origin, PickOrigin::Drawn);
    assert!(outcome.calendar.violations(engine.catalog()).is_empty());
}

#[test]
fn exhausted_budget_uses_configured_fallback() {
    let engine = default_engine();
    let outcome = engine.generate_with(ScriptedSource::new([2, 2])).unwrap();

    let connection = outcome
        .report
        .themes
        .iter()
        .find(|report| report.theme.as_str() == "Connection")
        .unwrap();
    assert_eq!(connection.attempts, 20);
    assert_eq!(connection.origin, PickOrigin::ConfiguredFallback);
    assert_eq!(outcome.calendar.day("Tuesday").unwrap().pillar, "Storytelling");
    assert_eq!(
        outcome.calendar.day("Thursday").unwrap().pillar,
        "Behind-the-Scenes"
    );
    assert!(outcome.calendar.violations(engine.catalog()).is_empty());
}

#[test]
fn independent_theme_samples_per_day_without_touching_other_themes() {
    let mut config = FileConfig::default();
    config.themes[2] = config.themes[2].clone().with_policy(PillarPolicy::Independent);
    let engine = Engine::from_config(&config).unwrap();
    let mut rng = StdRng::seed_from_u64(3);

    for _ in 0..500 {
        let outcome = engine.generate_with(RngSource::new(&mut rng)).unwrap();
        assert!(outcome.calendar.violations(engine.catalog()).is_empty());
    }
}

#[test]
fn empty_pool_is_rejected_before_generation() {
    let mut config = FileConfig::default();
    config.themes[1].formats = Pool::default();
    let err = Engine::from_config(&config).unwrap_err();
    assert!(err.to_string().contains("Connection"));
}

#[test]
fn saved_calendar_round_trips_through_the_store() {
    let dir = tempdir().expect("tempdir");
    let store = CalendarStore::new(dir.path().join("calendar.json"));
    let first = default_engine().generate().unwrap().calendar;
    store.save(&first).unwrap();

    let second = default_engine().generate().unwrap().calendar;
    store.save(&second).unwrap();

    let loaded = store.load().unwrap().expect("calendar stored");
    assert_eq!(loaded, second);
}
