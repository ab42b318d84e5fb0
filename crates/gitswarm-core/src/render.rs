//! Render adapter: turns world snapshots into keyed, posed visible objects.
//!
//! Every entity maps to one [`VisibleObject`] whose key stays stable for
//! the entity's lifetime. [`RenderSession`] remembers which keys the
//! renderer has seen and reports the ones that disappeared, so the renderer
//! can release the matching scene objects.

use std::collections::HashMap;
use std::f64::consts::PI;

use gitswarm_types::{
    Author, Contribution, ObjectBlueprint, ObjectKind, Pose, Project, RenderFrame, VisibleObject,
    World, compose,
};

use crate::config::SimulationConfig;
use crate::physics::visible_project_scale;

/// Wobble amplitude as a fraction of the object scale.
const WOBBLE_DELTA: f64 = 0.05;

/// Wobble period.
const WOBBLE_PERIOD_MS: f64 = 500.0;

/// Spin period of projects and contributions.
const SPIN_PERIOD_MS: f64 = 5000.0;

const CONTRIBUTION_OPACITY: f64 = 0.4;

/// Generation-tagged object map.
///
/// Each generation, the caller touches every live key through
/// [`ObjectCache::get_or_build`]; [`ObjectCache::finish`] then releases the
/// entries that were not touched and starts the next generation.
#[derive(Debug)]
pub struct ObjectCache<T> {
    entries: HashMap<String, (T, u64)>,
    generation: u64,
}

impl<T> Default for ObjectCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            generation: 0,
        }
    }
}

impl<T> ObjectCache<T> {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry for `key`, built on first use. Marks it live.
    pub fn get_or_build(&mut self, key: &str, build: impl FnOnce() -> T) -> &mut T {
        let generation = self.generation;
        let entry = self
            .entries
            .entry(key.to_owned())
            .or_insert_with(|| (build(), generation));
        entry.1 = generation;
        &mut entry.0
    }

    /// Release every entry not touched this generation.
    pub fn finish(&mut self, mut remove: impl FnMut(String, T)) {
        let generation = self.generation;
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, (_, seen))| *seen != generation)
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            if let Some((value, _)) = self.entries.remove(&key) {
                remove(key, value);
            }
        }
        self.generation = generation.wrapping_add(1);
    }
}

/// Build the visible objects of `world` at render time `now_ms`.
///
/// Contributions come first, then authors, then projects. A contribution
/// whose author is already gone is not drawn.
pub fn build_frame(world: &World, now_ms: u64, config: &SimulationConfig) -> Vec<VisibleObject> {
    let t = now_ms as f64;
    let contributions = world
        .contributions
        .iter()
        .filter_map(|c| contribution_object(c, world, t, config));
    let authors = world.authors.values().map(|a| author_object(a, t, config));
    let projects = world.projects.values().map(|p| project_object(p, t, config));
    contributions.chain(authors).chain(projects).collect()
}

fn contribution_object(
    contribution: &Contribution,
    world: &World,
    t: f64,
    config: &SimulationConfig,
) -> Option<VisibleObject> {
    let author = world.authors.get(&contribution.author)?;
    let project = world.projects.get(&contribution.project)?;
    let progress =
        contribution.age(world.ts) as f64 / config.world.contribution_lifespan_ms.max(1) as f64;
    let eased = (1.0 - (PI * progress).cos()) / 2.0;
    let pos = author.pos + (project.pos - author.pos).scale(eased);

    Some(VisibleObject {
        key: contribution.key.clone(),
        blueprint: ObjectBlueprint {
            kind: ObjectKind::Contribution,
            radius: f64::from(contribution.size),
            color_of: Some(contribution.project.clone()),
            avatar: None,
            opacity: CONTRIBUTION_OPACITY,
        },
        pose: compose(&[
            Pose::translation(pos.x, pos.y, 0.0),
            Pose::rotation([1.0, 0.0, 0.0], PI / 4.0),
            Pose::rotation([0.0, 0.0, 1.0], phase(t, SPIN_PERIOD_MS)),
            Pose::uniform_scaling(1.0 + 2.0 * (PI * progress).sin()),
            wobble(t + contribution.started as f64),
        ]),
        text: None,
    })
}

fn author_object(author: &Author, t: f64, config: &SimulationConfig) -> VisibleObject {
    let scale = 0.5 + 0.5 * author.momentum / config.world.max_author_momentum;
    VisibleObject {
        key: author.key.clone(),
        blueprint: ObjectBlueprint {
            kind: ObjectKind::Author,
            radius: config.physics.author_visible_size,
            color_of: author.last_contributions.first().map(|c| c.project.clone()),
            avatar: Some(author.name.clone()),
            opacity: 1.0,
        },
        pose: compose(&[
            Pose::translation(author.pos.x, author.pos.y, 0.0),
            Pose::rotation([0.0, 1.0, 0.0], author.rotation / 1000.0),
            Pose::rotation([0.0, 0.0, 1.0], PI),
            Pose::rotation([1.0, 0.0, 0.0], 2.8),
            Pose::uniform_scaling(scale),
            wobble(t + author.started as f64),
        ]),
        text: Some(author.name.clone()),
    }
}

fn project_object(project: &Project, t: f64, config: &SimulationConfig) -> VisibleObject {
    VisibleObject {
        key: project.key.clone(),
        blueprint: ObjectBlueprint {
            kind: ObjectKind::Project,
            radius: config.physics.project_size_base,
            color_of: Some(project.name.clone()),
            avatar: None,
            opacity: 1.0,
        },
        pose: compose(&[
            Pose::translation(project.pos.x, project.pos.y, 0.0),
            Pose::rotation([1.0, 0.0, 0.0], PI / 4.0),
            Pose::rotation([0.0, 0.0, 1.0], phase(t, SPIN_PERIOD_MS)),
            Pose::uniform_scaling(visible_project_scale(
                project.size,
                config.world.max_project_size,
            )),
            wobble(t + project.started as f64),
        ]),
        text: Some(project.name.clone()),
    }
}

/// Angle reached after `t` ms of a rotation with the given period.
fn phase(t: f64, period_ms: f64) -> f64 {
    t / period_ms * 2.0 * PI
}

/// Value oscillating between `min` and `max`.
fn sin_wave(min: f64, max: f64, angle: f64) -> f64 {
    min + (1.0 + angle.sin()) / 2.0 * (max - min)
}

/// Slight out-of-phase breathing on each axis.
fn wobble(t: f64) -> Pose {
    let angle = phase(t, WOBBLE_PERIOD_MS);
    let (lo, hi) = (1.0 - WOBBLE_DELTA, 1.0 + WOBBLE_DELTA);
    Pose::scaling(
        sin_wave(lo, hi, angle * 0.7),
        sin_wave(lo, hi, angle),
        sin_wave(lo, hi, angle * 1.3),
    )
}

/// Frame builder that tracks which keys the renderer holds.
#[derive(Debug)]
pub struct RenderSession {
    config: SimulationConfig,
    seen: ObjectCache<ObjectKind>,
}

impl RenderSession {
    /// A session that has rendered nothing yet.
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            seen: ObjectCache::new(),
        }
    }

    /// Number of objects the renderer currently holds.
    pub fn live_objects(&self) -> usize {
        self.seen.len()
    }

    /// Build the frame for `world`, rendered at the snapshot's own time.
    pub fn frame(&mut self, world: &World) -> RenderFrame {
        let objects = build_frame(world, world.ts, &self.config);
        for object in &objects {
            self.seen.get_or_build(&object.key, || object.blueprint.kind);
        }
        let mut removed = Vec::new();
        self.seen.finish(|key, _| removed.push(key));
        removed.sort_unstable();

        RenderFrame {
            tick_ms: world.ts,
            real_world_ts: world.real_world_ts,
            objects,
            removed,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::HashSet;

    use gitswarm_types::{ContributionEvent, TickBatch, Vec2};

    use super::*;
    use crate::tick::advance;

    const EPS: f64 = 1e-9;

    fn world_with(events: &[(&str, &str)], elapsed_ms: u64) -> World {
        let batch = TickBatch {
            events: events
                .iter()
                .map(|(a, p)| ContributionEvent::new(*a, *p, 0))
                .collect(),
            elapsed_ms,
            real_world_ts: 42,
        };
        advance(&World::new(), &batch, &SimulationConfig::default()).world
    }

    #[test]
    fn cache_builds_once_and_releases_untouched() {
        let mut cache = ObjectCache::new();
        let mut builds = 0;
        cache.get_or_build("a", || {
            builds += 1;
            1
        });
        cache.get_or_build("b", || 2);
        cache.finish(|_, _| panic!("nothing is stale yet"));

        *cache.get_or_build("a", || {
            builds += 1;
            10
        }) += 1;
        let mut released = Vec::new();
        cache.finish(|key, value| released.push((key, value)));

        assert_eq!(builds, 1);
        assert_eq!(released, vec![("b".to_owned(), 2)]);
        assert_eq!(cache.len(), 1);
        assert_eq!(*cache.get_or_build("a", || 0), 2);
    }

    #[test]
    fn frame_lists_every_entity() {
        let world = world_with(&[("ada", "core"), ("bob", "core")], 0);
        let objects = build_frame(&world, 0, &SimulationConfig::default());

        let kinds: Vec<ObjectKind> = objects.iter().map(|o| o.blueprint.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ObjectKind::Contribution,
                ObjectKind::Contribution,
                ObjectKind::Author,
                ObjectKind::Author,
                ObjectKind::Project,
            ]
        );
        let ada_key = Author::render_key("ada", 0);
        let ada = objects.iter().find(|o| o.key == ada_key).unwrap();
        assert_eq!(ada.text.as_deref(), Some("ada"));
        assert_eq!(ada.blueprint.avatar.as_deref(), Some("ada"));
        assert_eq!(ada.blueprint.color_of.as_deref(), Some("core"));
    }

    #[test]
    fn contribution_starts_at_its_author() {
        let world = world_with(&[("ada", "core")], 0);
        let objects = build_frame(&world, 0, &SimulationConfig::default());
        let contribution = &objects[0];
        let author_pos = world.authors["ada"].pos;
        let [x, y, z] = contribution.pose.origin();
        assert!((x - author_pos.x).abs() < EPS);
        assert!((y - author_pos.y).abs() < EPS);
        assert!(z.abs() < EPS);
        assert!((contribution.blueprint.opacity - 0.4).abs() < EPS);
    }

    #[test]
    fn contribution_reaches_its_project() {
        let mut world = world_with(&[("ada", "core")], 0);
        world.ts = 2000;
        world.projects.get_mut("core").unwrap().pos = Vec2::new(10.0, 20.0);
        let objects = build_frame(&world, 2000, &SimulationConfig::default());
        let [x, y, _] = objects[0].pose.origin();
        assert!((x - 10.0).abs() < 1e-6);
        assert!((y - 20.0).abs() < 1e-6);
    }

    #[test]
    fn orphaned_contribution_is_skipped() {
        let mut world = world_with(&[("ada", "core")], 0);
        world.authors.clear();
        let objects = build_frame(&world, 0, &SimulationConfig::default());
        assert!(objects.iter().all(|o| o.blueprint.kind == ObjectKind::Project));
    }

    #[test]
    fn session_reports_removed_keys() {
        let mut session = RenderSession::new(SimulationConfig::default());
        let world = world_with(&[("ada", "core")], 0);

        let first = session.frame(&world);
        assert!(first.removed.is_empty());
        assert_eq!(first.real_world_ts, Some(42));
        assert_eq!(session.live_objects(), 3);

        let mut later = world.clone();
        later.authors.clear();
        later.contributions.clear();
        let second = session.frame(&later);
        assert_eq!(
            second.removed,
            vec![
                Author::render_key("ada", 0),
                Contribution::render_key("ada", "core", 0),
            ]
        );
        assert_eq!(session.live_objects(), 1);

        let third = session.frame(&later);
        assert!(third.removed.is_empty());
    }

    #[test]
    fn dashed_and_shared_names_get_distinct_keys() {
        let mut session = RenderSession::new(SimulationConfig::default());
        let world = world_with(&[("a-b", "c"), ("a", "b-c"), ("linux", "linux")], 0);

        let frame = session.frame(&world);
        let keys: HashSet<&str> = frame.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(frame.objects.len(), 9);
        assert_eq!(keys.len(), 9);
        assert_eq!(session.live_objects(), 9);

        let mut later = world.clone();
        later.authors.remove("linux");
        later.contributions.retain(|c| c.author != "linux");
        let next = session.frame(&later);
        assert_eq!(
            next.removed,
            vec![
                Author::render_key("linux", 0),
                Contribution::render_key("linux", "linux", 0),
            ]
        );
        assert!(next.objects.iter().any(|o| o.key == Project::render_key("linux", 0)));
    }

    #[test]
    fn wobble_stays_within_delta() {
        for t in [0.0, 125.0, 250.0, 377.0, 10_000.0] {
            let pose = wobble(t);
            for axis in [0, 5, 10] {
                let s = pose.m[axis];
                assert!((0.95 - EPS..=1.05 + EPS).contains(&s));
            }
        }
    }
}
