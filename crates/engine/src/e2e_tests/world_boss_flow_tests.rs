//! World boss spawn cycle driven by the ticker.

use chrono::Duration;
use timegate_domain::BossSpawnState;

use super::e2e_helpers::*;

#[tokio::test]
async fn boss_respawns_after_cooldown_in_a_moved_window() {
    let world = TestWorld::new();
    let app = &world.app;
    let bosses = &app.content.world_bosses;

    bosses
        .create_boss_spawn(STORM_TITAN, HIGHLANDS)
        .await
        .expect("create");
    bosses
        .set_spawn_window(
            STORM_TITAN,
            HIGHLANDS,
            world.now(),
            world.now() + Duration::minutes(30),
        )
        .await
        .expect("window");

    let report = app.use_cases.ticker.tick().await;
    assert_eq!(report.bosses_spawned, vec![(STORM_TITAN, HIGHLANDS)]);

    world.advance(Duration::minutes(5));
    bosses.engage(STORM_TITAN, HIGHLANDS).await.expect("engage");
    world.advance(Duration::minutes(10));
    let killed_at = world.now();
    let boss = bosses.kill(STORM_TITAN, HIGHLANDS, 6).await.expect("kill");

    assert_eq!(boss.state(), BossSpawnState::Waiting);
    assert_eq!(boss.kill_count(), 1);
    assert_eq!(boss.next_spawn_at(), Some(killed_at + Duration::hours(6)));
    let window = boss.spawn_window().expect("window moved");
    assert_eq!(window.start(), killed_at + Duration::hours(6));
    assert_eq!(window.length(), Duration::minutes(30));

    assert!(app.use_cases.ticker.tick().await.bosses_spawned.is_empty());

    world.advance(Duration::hours(6));
    let report = app.use_cases.ticker.tick().await;
    assert_eq!(report.bosses_spawned, vec![(STORM_TITAN, HIGHLANDS)]);

    // Nobody shows up; the spawn lapses when the window closes
    world.advance(Duration::minutes(31));
    let report = app.use_cases.ticker.tick().await;
    assert_eq!(report.bosses_despawned, vec![(STORM_TITAN, HIGHLANDS)]);
    let boss = bosses
        .get(STORM_TITAN, HIGHLANDS)
        .await
        .expect("get")
        .expect("boss");
    assert_eq!(boss.state(), BossSpawnState::Waiting);
    assert_eq!(boss.kill_count(), 1);
}

#[tokio::test]
async fn boss_without_window_never_spawns() {
    let world = TestWorld::new();
    let app = &world.app;
    app.content
        .world_bosses
        .create_boss_spawn(STORM_TITAN, HIGHLANDS)
        .await
        .expect("create");

    let report = app.use_cases.ticker.tick().await;

    assert!(report.bosses_spawned.is_empty());
    assert!(app
        .content
        .world_bosses
        .spawn(STORM_TITAN, HIGHLANDS)
        .await
        .is_err());
}
