//! Performance benchmarks for critical game systems

use shared::bot::{decide, next_step};
use shared::protocol::{self, WireEntity};
use shared::{
    Coordinate, Direction, Entity, GameConfig, GameMap, GameState, Laser, Packet, Player,
};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// A busy arena: eight players and a hundred lasers in flight
fn crowded_state() -> GameState {
    let map = Arc::new(GameMap::default_arena());
    let (mut state, _changes) = GameState::new(Arc::clone(&map), GameConfig::mirror());

    for (i, spawn) in map.spawn_points().iter().take(8).enumerate() {
        state.add_entity(Player::new(Uuid::new_v4(), format!("P{}", i), *spawn).into());
    }
    let owners: Vec<Uuid> = state.players().map(|player| player.id).collect();
    for i in 0..100 {
        let owner = owners[i % owners.len()];
        let direction = Direction::CARDINALS[i % Direction::CARDINALS.len()];
        let origin = Coordinate::new(1 + (i as i32 % 40), 1 + (i as i32 % 18));
        state.add_entity(Laser::fired_from(Uuid::new_v4(), owner, origin, direction, 0).into());
    }
    state
}

/// Benchmarks building the cell occupancy map used by collision detection
#[test]
fn benchmark_collision_map() {
    let state = crowded_state();

    let iterations = 1_000;
    let start = Instant::now();

    for i in 0..iterations {
        let _ = state.collision_map(i as u64);
    }

    let duration = start.elapsed();
    println!(
        "Collision map: {} iterations in {:?} ({:.2} µs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // A collision tick is 20ms; one pass must fit many times over.
    assert!(duration.as_millis() < 1_000);
}

/// Benchmarks encoding and decoding a full join snapshot
#[test]
fn benchmark_snapshot_codec() {
    let state = crowded_state();
    let packet = Packet::Connected {
        token: Uuid::new_v4().to_string(),
        entities: state.entities().map(WireEntity::from).collect(),
    };

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let data = protocol::encode(&packet).unwrap();
        let decoded = protocol::decode(&data).unwrap();
        assert!(matches!(decoded, Packet::Connected { .. }));
    }

    let duration = start.elapsed();
    println!(
        "Snapshot codec: {} iterations in {:?} ({:.2} µs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2_000);
    assert!(protocol::encode(&packet).unwrap().len() < protocol::MAX_PACKET_SIZE);
}

/// Benchmarks bot path finding across the default arena
#[test]
fn benchmark_bot_decisions() {
    let map = GameMap::default_arena();
    let spawns = map.spawn_points().to_vec();
    let from = spawns[0];
    let to = map.furthest_spawn_point(from);

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = next_step(&map, from, to);
        let _ = decide(&map, from, &spawns[1..]);
    }

    let duration = start.elapsed();
    println!(
        "Bot decisions: {} iterations in {:?} ({:.2} µs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2_000);
}

/// Benchmarks laser position evaluation
#[test]
fn benchmark_laser_positions() {
    let state = crowded_state();
    let lasers: Vec<&Laser> = state.entities().filter_map(Entity::as_laser).collect();

    let iterations = 10_000;
    let start = Instant::now();

    for now in 0..iterations {
        for laser in &lasers {
            let _ = shared::Positioner::position_at(*laser, now);
        }
    }

    let duration = start.elapsed();
    println!(
        "Laser positions: {} lasers x {} ticks in {:?}",
        lasers.len(),
        iterations,
        duration
    );

    assert!(duration.as_millis() < 1_000);
}
