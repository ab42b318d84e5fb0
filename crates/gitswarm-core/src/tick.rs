//! Tick transition: the deterministic step from one world snapshot to the next.
//!
//! Each tick consumes one [`TickBatch`] and runs these stages in order; later
//! stages read the results of earlier ones:
//!
//! 1. **Apply events** -- lazily create unknown projects and authors, coalesce
//!    the batch into one contribution per (author, project) pair, and feed
//!    each contribution to its project (size) and author (history, momentum).
//!
//! 2. **Expire contributions** -- drop contributions older than the lifespan.
//!
//! 3. **Decay authors** -- lose momentum, spin by the new momentum, and evict
//!    authors that have been still for longer than the inactivity timeout.
//!
//! 4. **Decay projects** -- shrink toward zero. Projects are never evicted.
//!
//! 5. **Move projects** -- pull toward the origin, repel each other.
//!
//! 6. **Move authors** -- pull toward the latest project (scaled by
//!    momentum), push out of the central disc, repel each other.
//!
//! 7. **Stamp** -- record the batch's simulation and source timestamps.
//!
//! [`advance`] never mutates its input: the previous snapshot stays valid for
//! any reader still holding it. The transition is total; degenerate geometry
//! is normalized by the physics helpers and out-of-range values are caught by
//! debug assertions.

use std::f64::consts::PI;

use gitswarm_types::{
    Author, Contribution, Polar, Project, TickBatch, Vec2, World, cart_to_polar, polar_to_cart,
};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::config::{PhysicsConfig, SimulationConfig, WorldConfig};
use crate::physics::{self, integrate, pull_toward, repulsive_contact_force};

/// Summary of a single tick's execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    /// Simulation time of the tick.
    pub elapsed_ms: u64,
    /// Raw events in the batch.
    pub events: usize,
    /// Projects created by this tick.
    pub projects_created: usize,
    /// Authors created by this tick.
    pub authors_created: usize,
    /// Contributions created by this tick.
    pub contributions_created: usize,
    /// Contributions dropped for age.
    pub contributions_expired: usize,
    /// Authors dropped for inactivity.
    pub authors_evicted: usize,
    /// Live authors after the tick.
    pub authors: usize,
    /// Projects after the tick.
    pub projects: usize,
    /// Live contributions after the tick.
    pub contributions: usize,
}

/// The next snapshot and what happened while building it.
#[derive(Debug, Clone)]
pub struct TickResult {
    /// The new world snapshot.
    pub world: World,
    /// Counters for logging and the observer.
    pub summary: TickSummary,
}

/// Execute one tick: build the snapshot that follows `world` after `batch`.
///
/// Batches must be applied in the order the scheduler emitted them.
pub fn advance(world: &World, batch: &TickBatch, config: &SimulationConfig) -> TickResult {
    let now = batch.elapsed_ms;
    let mut next = world.clone();
    let mut summary = TickSummary {
        elapsed_ms: now,
        events: batch.events.len(),
        ..TickSummary::default()
    };

    // --- Stage 1: Apply events ---
    apply_events(&mut next, batch, &config.world, &mut summary);

    // --- Stage 2: Expire contributions ---
    summary.contributions_expired = expire_contributions(&mut next, now, &config.world);

    // --- Stage 3: Decay authors ---
    summary.authors_evicted = decay_authors(&mut next, now, &config.world);

    // --- Stage 4: Decay projects ---
    decay_projects(&mut next, now, &config.world);

    // --- Stages 5-6: Motion ---
    let dt = config.world.tick_interval_ms as f64;
    move_projects(&mut next, dt, &config.world, &config.physics);
    move_authors(&mut next, dt, &config.physics);

    // --- Stage 7: Stamp ---
    next.ts = now;
    next.real_world_ts = Some(batch.real_world_ts);

    debug_check_invariants(&next, &config.world);

    summary.authors = next.authors.len();
    summary.projects = next.projects.len();
    summary.contributions = next.contributions.len();

    if summary.authors_created > 0 || summary.projects_created > 0 || summary.authors_evicted > 0 {
        debug!(
            elapsed_ms = now,
            authors_created = summary.authors_created,
            projects_created = summary.projects_created,
            authors_evicted = summary.authors_evicted,
            "World population changed"
        );
    }

    TickResult {
        world: next,
        summary,
    }
}

/// Stage 1: create missing entities, then coalesce and apply contributions.
fn apply_events(world: &mut World, batch: &TickBatch, cfg: &WorldConfig, summary: &mut TickSummary) {
    let now = batch.elapsed_ms;

    // (author, project) -> event count, in order of first occurrence.
    let mut groups: IndexMap<(&str, &str), u32> = IndexMap::new();
    for event in &batch.events {
        if ensure_project(world, &event.project, now, cfg) {
            summary.projects_created = summary.projects_created.saturating_add(1);
        }
        if ensure_author(world, &event.author, &event.project, now, cfg) {
            summary.authors_created = summary.authors_created.saturating_add(1);
        }
        let count = groups
            .entry((event.author.as_str(), event.project.as_str()))
            .or_insert(0);
        *count = count.saturating_add(1);
    }

    for ((author_name, project_name), count) in groups {
        debug_assert!(
            world.projects.contains_key(project_name) && world.authors.contains_key(author_name),
            "entities are created before their contributions"
        );
        let contribution = Contribution::new(
            author_name,
            project_name,
            count.min(cfg.max_contribution_size),
            now,
        );
        let size = f64::from(contribution.size);

        if let Some(project) = world.projects.get_mut(project_name) {
            project.size += size;
            project.last_active_at = contribution.started;
        }

        if let Some(author) = world.authors.get_mut(author_name) {
            author.last_contributions.push(contribution.clone());
            let excess = author
                .last_contributions
                .len()
                .saturating_sub(cfg.author_history_len);
            author.last_contributions.drain(..excess);
            author.momentum += size.max(cfg.min_momentum_increase_per_contribution);
        }

        world.contributions.push(contribution);
        summary.contributions_created = summary.contributions_created.saturating_add(1);
    }
}

/// Create `name` if unknown. Returns whether a project was created.
///
/// New projects fan out on a circle around the origin, a sixth of a turn
/// apart, starting straight up.
fn ensure_project(world: &mut World, name: &str, now: u64, cfg: &WorldConfig) -> bool {
    if world.projects.contains_key(name) {
        return false;
    }
    let existing = world.projects.len() as f64;
    let pos = polar_to_cart(Polar {
        a: PI / 2.0 + PI / 3.0 * existing,
        r: cfg.project_placement_radius,
    });
    world.projects.insert(
        name.to_owned(),
        Project {
            key: Project::render_key(name, now),
            name: name.to_owned(),
            pos,
            speed: Vec2::ZERO,
            size: 0.0,
            last_active_at: now,
            started: now,
        },
    );
    true
}

/// Create author `name` if unknown. Returns whether an author was created.
///
/// New authors appear on the outer circle, on the bearing of the project
/// that introduced them.
fn ensure_author(world: &mut World, name: &str, project: &str, now: u64, cfg: &WorldConfig) -> bool {
    if world.authors.contains_key(name) {
        return false;
    }
    let bearing = world
        .projects
        .get(project)
        .map_or(0.0, |p| cart_to_polar(p.pos).a);
    let pos = polar_to_cart(Polar {
        a: bearing,
        r: cfg.new_author_radius,
    });
    world.authors.insert(
        name.to_owned(),
        Author {
            key: Author::render_key(name, now),
            name: name.to_owned(),
            pos,
            speed: Vec2::ZERO,
            momentum: 0.0,
            rotation: 0.0,
            last_contributions: Vec::new(),
            last_active_at: now,
            started: now,
        },
    );
    true
}

/// Stage 2. Returns the number of expired contributions.
fn expire_contributions(world: &mut World, now: u64, cfg: &WorldConfig) -> usize {
    let before = world.contributions.len();
    world
        .contributions
        .retain(|c| c.age(now) < cfg.contribution_lifespan_ms);
    before.saturating_sub(world.contributions.len())
}

/// Stage 3. Returns the number of evicted authors.
fn decay_authors(world: &mut World, now: u64, cfg: &WorldConfig) -> usize {
    let before = world.authors.len();
    world.authors.retain(|_, author| {
        let momentum = (author.momentum - cfg.author_momentum_decrease_per_tick)
            .clamp(0.0, cfg.max_author_momentum);
        author.momentum = momentum;
        author.rotation += momentum;
        if momentum > 0.0 {
            author.last_active_at = now;
        }
        now.saturating_sub(author.last_active_at) < cfg.author_inactivity_timeout_ms
    });
    before.saturating_sub(world.authors.len())
}

/// Stage 4.
fn decay_projects(world: &mut World, now: u64, cfg: &WorldConfig) {
    for project in world.projects.values_mut() {
        let size = (project.size - cfg.project_size_decrease_per_tick)
            .clamp(0.0, cfg.max_project_size);
        project.size = size;
        if size > 0.0 {
            project.last_active_at = now;
        }
    }
}

/// Stage 5. Every project reads the others' positions from before the move.
fn move_projects(world: &mut World, dt: f64, cfg: &WorldConfig, physics: &PhysicsConfig) {
    let visible_size = |size: f64| physics::visible_project_size(size, cfg.max_project_size, physics);
    let bodies: Vec<(Vec2, f64)> = world
        .projects
        .values()
        .map(|p| (p.pos, visible_size(p.size)))
        .collect();

    for (idx, project) in world.projects.values_mut().enumerate() {
        let own_size = visible_size(project.size);
        let mut acceleration = pull_toward(project.pos, Vec2::ZERO, physics.force_to_center);
        for (other_idx, &(other_pos, other_size)) in bodies.iter().enumerate() {
            if other_idx != idx {
                acceleration +=
                    repulsive_contact_force(project.pos, other_pos, own_size, other_size, physics);
            }
        }
        (project.pos, project.speed) =
            integrate(project.pos, project.speed, acceleration, dt, physics);
    }
}

/// Stage 6. Authors read projects after their move and other authors from
/// before theirs.
fn move_authors(world: &mut World, dt: f64, physics: &PhysicsConfig) {
    let projects = &world.projects;
    let positions: Vec<Vec2> = world.authors.values().map(|a| a.pos).collect();

    for (idx, author) in world.authors.values_mut().enumerate() {
        let target = author.latest_project().map_or(Vec2::ZERO, |name| {
            debug_assert!(projects.contains_key(name), "projects are never evicted");
            projects.get(name).map_or(Vec2::ZERO, |p| p.pos)
        });
        let mut acceleration =
            pull_toward(author.pos, target, physics.force_to_project).scale(author.momentum);

        let polar = cart_to_polar(author.pos);
        if polar.r < physics.authors_radius {
            acceleration += polar_to_cart(Polar {
                a: polar.a,
                r: physics.force_author_away,
            });
        }

        for (other_idx, &other_pos) in positions.iter().enumerate() {
            if other_idx != idx {
                acceleration += repulsive_contact_force(
                    author.pos,
                    other_pos,
                    physics.author_visible_size,
                    physics.author_visible_size,
                    physics,
                );
            }
        }
        (author.pos, author.speed) = integrate(author.pos, author.speed, acceleration, dt, physics);
    }
}

/// Bounds every snapshot must satisfy. A failure is a caller bug (bad config
/// or corrupted input), never a condition to clamp away.
fn debug_check_invariants(world: &World, cfg: &WorldConfig) {
    for author in world.authors.values() {
        debug_assert!(
            (0.0..=cfg.max_author_momentum).contains(&author.momentum),
            "author {} momentum {} out of bounds",
            author.name,
            author.momentum
        );
        debug_assert!(author.pos.is_finite(), "author {} position not finite", author.name);
        debug_assert!(author.last_contributions.len() <= cfg.author_history_len);
    }
    for project in world.projects.values() {
        debug_assert!(
            (0.0..=cfg.max_project_size).contains(&project.size),
            "project {} size {} out of bounds",
            project.name,
            project.size
        );
        debug_assert!(project.pos.is_finite(), "project {} position not finite", project.name);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use gitswarm_types::ContributionEvent;
    use proptest::prelude::*;

    use super::*;

    const EPS: f64 = 1e-9;

    fn batch(events: &[(&str, &str)], elapsed_ms: u64) -> TickBatch {
        TickBatch {
            events: events
                .iter()
                .enumerate()
                .map(|(i, (a, p))| ContributionEvent::new(*a, *p, i64::try_from(i).unwrap()))
                .collect(),
            elapsed_ms,
            real_world_ts: 1_000,
        }
    }

    fn empty(elapsed_ms: u64) -> TickBatch {
        batch(&[], elapsed_ms)
    }

    #[test]
    fn coalesces_events_per_pair() {
        let config = SimulationConfig::default();
        let b = TickBatch {
            events: vec![
                ContributionEvent::new("a", "p", 0),
                ContributionEvent::new("a", "p", 1),
                ContributionEvent::new("b", "p", 2),
            ],
            elapsed_ms: 0,
            real_world_ts: 2,
        };
        let result = advance(&World::new(), &b, &config);
        let world = &result.world;

        assert_eq!(world.contributions.len(), 2);
        assert_eq!(world.contributions[0].key, Contribution::render_key("a", "p", 0));
        assert_eq!(world.contributions[0].size, 2);
        assert_eq!(world.contributions[1].key, Contribution::render_key("b", "p", 0));
        assert_eq!(world.contributions[1].size, 1);
        assert_eq!(world.authors.len(), 2);
        assert_eq!(world.projects.len(), 1);
        // 3 from contributions, minus one tick of decay.
        assert!((world.projects["p"].size - 2.0).abs() < EPS);
        assert_eq!(world.real_world_ts, Some(2));
        assert_eq!(result.summary.contributions_created, 2);
        assert_eq!(result.summary.authors_created, 2);
        assert_eq!(result.summary.projects_created, 1);
    }

    #[test]
    fn momentum_gain_has_a_floor() {
        let config = SimulationConfig::default();
        let world = advance(&World::new(), &batch(&[("a", "p")], 0), &config).world;
        // max(1, 10) gained, 1 lost to decay.
        assert!((world.authors["a"].momentum - 9.0).abs() < EPS);
        assert!((world.authors["a"].rotation - 9.0).abs() < EPS);
    }

    #[test]
    fn contribution_size_is_capped() {
        let mut config = SimulationConfig::default();
        config.world.max_contribution_size = 3;
        let events = vec![("a", "p"); 10];
        let world = advance(&World::new(), &batch(&events, 0), &config).world;
        assert_eq!(world.contributions[0].size, 3);
    }

    #[test]
    fn dashed_names_stay_distinct() {
        let config = SimulationConfig::default();
        let world = advance(&World::new(), &batch(&[("a-b", "c"), ("a", "b-c")], 0), &config).world;
        assert_eq!(world.contributions.len(), 2);
        assert_eq!(world.authors.len(), 2);
        assert_eq!(world.projects.len(), 2);
        assert_eq!(world.contributions[0].author, "a-b");
        assert_eq!(world.contributions[1].author, "a");
        assert_ne!(world.contributions[0].key, world.contributions[1].key);
    }

    #[test]
    fn projects_fan_out_around_origin() {
        let cfg = WorldConfig::default();
        let mut world = World::new();
        assert!(ensure_project(&mut world, "first", 0, &cfg));
        assert!(ensure_project(&mut world, "second", 0, &cfg));
        assert!(!ensure_project(&mut world, "first", 5, &cfg));

        let first = cart_to_polar(world.projects["first"].pos);
        let second = cart_to_polar(world.projects["second"].pos);
        assert!((first.a - PI / 2.0).abs() < EPS);
        assert!((first.r - 500.0).abs() < EPS);
        assert!((second.a - (PI / 2.0 + PI / 3.0)).abs() < EPS);
        assert_eq!(world.projects["first"].key, r#"project:"first":0"#);
    }

    #[test]
    fn authors_start_on_their_project_bearing() {
        let cfg = WorldConfig::default();
        let mut world = World::new();
        ensure_project(&mut world, "p", 0, &cfg);
        ensure_project(&mut world, "q", 0, &cfg);
        assert!(ensure_author(&mut world, "ada", "q", 7, &cfg));

        let author = cart_to_polar(world.authors["ada"].pos);
        let project = cart_to_polar(world.projects["q"].pos);
        assert!((author.a - project.a).abs() < EPS);
        assert!((author.r - 1500.0).abs() < EPS);
        assert_eq!(world.authors["ada"].key, r#"author:"ada":7"#);
    }

    #[test]
    fn input_snapshot_is_not_mutated() {
        let config = SimulationConfig::default();
        let first = advance(&World::new(), &batch(&[("a", "p")], 0), &config).world;
        let copy = first.clone();
        let second = advance(&first, &batch(&[("b", "q")], 20), &config).world;
        assert_eq!(first, copy);
        assert_ne!(first, second);
    }

    #[test]
    fn empty_ticks_never_create_or_destroy_projects() {
        let config = SimulationConfig::default();
        let mut world = advance(&World::new(), &batch(&[("a", "p"), ("b", "q")], 0), &config).world;
        let mut contributions = world.contributions.len();
        for step in 1..=50 {
            let next = advance(&world, &empty(step * 20), &config).world;
            assert_eq!(next.projects.len(), world.projects.len());
            assert!(next.authors.len() <= world.authors.len());
            assert!(next.contributions.len() <= contributions);
            contributions = next.contributions.len();
            world = next;
        }
    }

    #[test]
    fn contribution_lives_exactly_its_lifespan() {
        let config = SimulationConfig::default();
        let created = advance(&World::new(), &batch(&[("a", "p")], 100), &config).world;

        let alive = advance(&created, &empty(100 + 1999), &config).world;
        assert_eq!(alive.contributions.len(), 1);

        let gone = advance(&created, &empty(100 + 2000), &config);
        assert!(gone.world.contributions.is_empty());
        assert_eq!(gone.summary.contributions_expired, 1);
    }

    #[test]
    fn history_keeps_latest_nine() {
        let config = SimulationConfig::default();
        let mut world = World::new();
        for step in 0..12_u64 {
            let project = format!("p{step}");
            world = advance(&world, &batch(&[("a", project.as_str())], step), &config).world;
        }
        let history = &world.authors["a"].last_contributions;
        assert_eq!(history.len(), 9);
        assert_eq!(history[0].project, "p3");
        assert_eq!(history[8].project, "p11");
        assert_eq!(world.authors["a"].latest_project(), Some("p11"));
    }

    #[test]
    fn idle_author_is_evicted_after_timeout() {
        let config = SimulationConfig::default();
        // 100 + 100 + 100 + max(1, 10) = 310, clamped to 300 after decay.
        let mut events = vec![("a", "p"); 100];
        events.extend(vec![("a", "q"); 100]);
        events.extend(vec![("a", "r"); 100]);
        events.push(("a", "s"));
        let mut world = advance(&World::new(), &batch(&events, 0), &config).world;
        assert!((world.authors["a"].momentum - 300.0).abs() < EPS);

        for t in 1..=300 {
            world = advance(&world, &empty(t), &config).world;
        }
        let author = &world.authors["a"];
        assert!(author.momentum.abs() < EPS);
        assert_eq!(author.last_active_at, 299);

        let timeout = config.world.author_inactivity_timeout_ms;
        for t in 301..299 + timeout {
            world = advance(&world, &empty(t), &config).world;
            assert!(world.authors.contains_key("a"), "evicted early at {t}");
        }
        let result = advance(&world, &empty(299 + timeout), &config);
        assert!(!result.world.authors.contains_key("a"));
        assert_eq!(result.summary.authors_evicted, 1);
        // The project outlives its authors.
        assert_eq!(result.world.projects.len(), 4);
    }

    #[test]
    fn projects_persist_at_zero_size() {
        let config = SimulationConfig::default();
        let mut world = advance(&World::new(), &batch(&[("a", "p")], 0), &config).world;
        for t in 1..=3000 {
            world = advance(&world, &empty(t), &config).world;
        }
        let project = &world.projects["p"];
        assert!(project.size.abs() < EPS);
        assert!(world.authors.is_empty());
    }

    #[test]
    fn projects_drift_toward_origin() {
        let config = SimulationConfig::default();
        let mut world = advance(&World::new(), &batch(&[("a", "p")], 0), &config).world;
        let start = world.projects["p"].pos.length();
        for t in 1..=20 {
            world = advance(&world, &empty(t * 20), &config).world;
        }
        assert!(world.projects["p"].pos.length() < start);
    }

    #[test]
    fn coincident_projects_stay_finite() {
        let config = SimulationConfig::default();
        let mut world = World::new();
        for name in ["p", "q"] {
            ensure_project(&mut world, name, 0, &config.world);
        }
        for project in world.projects.values_mut() {
            project.pos = Vec2::ZERO;
        }
        let next = advance(&world, &empty(20), &config).world;
        assert!(next.projects.values().all(|p| p.pos.is_finite()));
    }

    fn arb_batches() -> impl Strategy<Value = Vec<Vec<(u8, u8)>>> {
        proptest::collection::vec(
            proptest::collection::vec((0..4u8, 0..3u8), 0..150),
            1..40,
        )
    }

    proptest! {
        #[test]
        fn bounds_hold_after_any_ticks(batches in arb_batches()) {
            let config = SimulationConfig::default();
            let mut world = World::new();
            for (step, pairs) in batches.iter().enumerate() {
                let names: Vec<(String, String)> = pairs
                    .iter()
                    .map(|(a, p)| (format!("author{a}"), format!("project{p}")))
                    .collect();
                let refs: Vec<(&str, &str)> =
                    names.iter().map(|(a, p)| (a.as_str(), p.as_str())).collect();
                let elapsed = u64::try_from(step).unwrap() * 20;
                world = advance(&world, &batch(&refs, elapsed), &config).world;

                for author in world.authors.values() {
                    prop_assert!((0.0..=300.0).contains(&author.momentum));
                    prop_assert!(author.pos.is_finite());
                    prop_assert!(author.last_contributions.len() <= 9);
                }
                for project in world.projects.values() {
                    prop_assert!((0.0..=500.0).contains(&project.size));
                    prop_assert!(project.pos.is_finite());
                }
                for contribution in &world.contributions {
                    prop_assert!((1..=100).contains(&contribution.size));
                }
            }
        }
    }
}
