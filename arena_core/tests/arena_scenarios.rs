use std::sync::Arc;

use arena_core::{
    ArenaConfig, ArenaHandle, ArenaService, Colour, ItemLog, Pose, Position, RetryPolicy,
    RetryingBackend, SimBackend, World, ZoneLocation, placement::ITEM_SPREAD,
};

fn config(seed: u64) -> ArenaConfig {
    ArenaConfig {
        tick_period_ms: 10,
        retry: RetryPolicy {
            max_attempts: 3,
            initial_delay_ms: 5,
            max_delay_ms: 20,
            multiplier: 2.0,
            call_timeout_ms: 200,
        },
        ..ArenaConfig::with_seed(seed)
    }
}

fn start(seed: u64, sim: &SimBackend) -> ArenaHandle {
    let backend = RetryingBackend::new(sim.clone(), config(seed).retry);
    let (service, handle) = ArenaService::new(&config(seed), Arc::new(backend));
    service.spawn();
    handle
}

/// Waits until `count` more ticks have been published.
async fn wait_ticks(handle: &ArenaHandle, count: usize) {
    let mut telemetry = handle.telemetry();
    telemetry.borrow_and_update();
    for _ in 0..count {
        telemetry.changed().await.unwrap();
    }
}

/// Drives `robot_id` to `position` and waits until the arena has seen it there.
async fn drive(handle: &ArenaHandle, sim: &SimBackend, robot_id: &str, position: Position) {
    assert!(sim.move_entity(robot_id, position.x, position.y));
    wait_ticks(handle, 2).await;
}

fn first_item_of<'a>(world: &'a World, predicate: impl Fn(Colour) -> bool) -> (&'a str, Position) {
    world
        .items
        .iter()
        .find(|(_, item)| predicate(item.colour))
        .map(|(item_id, item)| (item_id.as_str(), item.position))
        .unwrap()
}

fn assert_single_holders(world: &World) {
    let mut held: Vec<&str> = world
        .robots
        .values()
        .filter_map(|robot| robot.item_held.as_deref())
        .collect();
    let total = held.len();
    held.sort();
    held.dedup();
    assert_eq!(held.len(), total, "an item is held by two robots");
}

fn expected_log(world: &World) -> ItemLog {
    let count = |colour| world.returned(colour);
    let value = |colour: Colour| count(colour) * colour.value();
    ItemLog {
        red_count: count(Colour::Red),
        green_count: count(Colour::Green),
        blue_count: count(Colour::Blue),
        total_count: Colour::ALL.into_iter().map(count).sum(),
        red_value: value(Colour::Red),
        green_value: value(Colour::Green),
        blue_value: value(Colour::Blue),
        total_value: Colour::ALL.into_iter().map(value).sum(),
    }
}

#[tokio::test]
async fn collect_deposit_and_reject() {
    let sim = SimBackend::new();
    sim.add_entity("robot1", Pose::default());
    let handle = start(2024, &sim);
    wait_ticks(&handle, 2).await;

    let world = handle.world().await.unwrap();
    assert!(world.robots.contains_key("robot1"));
    let (_, target) = first_item_of(&world, |_| true);

    // Pick up next to an item.
    drive(&handle, &sim, "robot1", Position::new(target.x, target.y + 0.2)).await;
    let response = handle.pick_up_item("robot1").await.unwrap();
    assert!(response.success, "{}", response.message);

    let world = handle.world().await.unwrap();
    let held = world.robot("robot1").unwrap().item_held.clone().unwrap();
    let colour = world.item(&held).unwrap().colour;
    let cluster = world.clusters[&world.item(&held).unwrap().cluster_id].position;
    assert_single_holders(&world);

    // Deposit into the fresh top-left zone.
    drive(&handle, &sim, "robot1", ZoneLocation::TopLeft.center()).await;
    let response = handle.offload_item("robot1").await.unwrap();
    assert!(response.success);
    assert!(response.message.contains(&held));
    assert!(response.message.contains("TOP_LEFT"));

    let world = handle.world().await.unwrap();
    let top_left = &world.zones[&ZoneLocation::TopLeft];
    assert_eq!(top_left.returned(colour), 1);
    assert_eq!(world.robot("robot1").unwrap().item_held, None);
    let respawned = world.item(&held).unwrap().position;
    assert!(respawned.distance(&cluster) < ITEM_SPREAD + 0.01);

    // An item of another colour is refused by the locked zone and dropped in place.
    let other = world
        .items
        .values()
        .map(|item| item.position)
        .find(|spot| {
            world
                .items
                .values()
                .filter(|item| item.position.distance(spot) < 0.5)
                .all(|item| item.colour != colour)
        })
        .unwrap();
    drive(&handle, &sim, "robot1", other).await;
    assert!(handle.pick_up_item("robot1").await.unwrap().success);
    drive(&handle, &sim, "robot1", ZoneLocation::TopLeft.center()).await;
    let response = handle.offload_item("robot1").await.unwrap();
    assert!(response.success);
    assert!(response.message.contains("offloaded in the arena"));

    let after = handle.world().await.unwrap();
    assert_eq!(after.zones, world.zones);
    let rejected = after.item(&after.robot("robot1").unwrap().previous_item_held.clone().unwrap());
    let rejected = rejected.unwrap();
    assert_ne!(rejected.colour, colour);
    assert!(!after.zones[&ZoneLocation::TopLeft].allowed_drop(rejected.colour));
    assert!(after.zones[&ZoneLocation::TopLeft].allowed_drop(colour));

    wait_ticks(&handle, 1).await;
    let log = handle.telemetry().borrow().log;
    assert_eq!(log, expected_log(&after));
    assert_eq!(log.total_value, colour.value());
}

#[tokio::test]
async fn unknown_robot_is_reported() {
    let sim = SimBackend::new();
    let handle = start(5, &sim);

    let response = handle.pick_up_item("ghost").await.unwrap();
    assert!(!response.success);
    assert_eq!(response.message, "Unable to find robot_id 'ghost'");

    let response = handle.offload_item("ghost").await.unwrap();
    assert!(!response.success);
    assert!(response.message.contains("ghost"));
}

#[tokio::test]
async fn two_robots_never_share_an_item() {
    let sim = SimBackend::new();
    sim.add_entity("robot1", Pose::default());
    sim.add_entity("robot2", Pose::default());
    let handle = start(99, &sim);
    wait_ticks(&handle, 2).await;

    let world = handle.world().await.unwrap();
    let (_, spot) = first_item_of(&world, |_| true);
    drive(&handle, &sim, "robot1", spot).await;
    drive(&handle, &sim, "robot2", spot).await;

    let (first, second) = tokio::join!(
        handle.pick_up_item("robot1"),
        handle.pick_up_item("robot2")
    );
    let (first, second) = (first.unwrap(), second.unwrap());
    assert!(first.success || second.success);

    let world = handle.world().await.unwrap();
    assert_single_holders(&world);
}

#[tokio::test]
async fn backend_outage_is_survived() {
    let sim = SimBackend::new();
    sim.add_entity("robot1", Pose::default());
    sim.set_available(false);
    let handle = start(31, &sim);

    // Seeding happens regardless; spawns wait for the backend.
    let world = handle.world().await.unwrap();
    assert!(world.robots.is_empty());

    sim.set_available(true);
    wait_ticks(&handle, 2).await;
    let world = handle.world().await.unwrap();
    assert_eq!(world.clusters.len(), 6);
    assert!(world.robots.contains_key("robot1"));
    assert_eq!(sim.spawned().len(), world.items.len() + 1);
}
