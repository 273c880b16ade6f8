//! Motion state machine
//!
//! One `tick` per timer interval: read the cursor, decide the state, move,
//! clamp, and pick an animation frame. All distance checks compare squared
//! values against squared thresholds. Randomness comes from an injected
//! seedable RNG so behavior is reproducible under test.
//!
//! State transitions:
//! - Idle → Wander after a randomized idle duration
//! - Wander → Idle on reaching the target, exhausting the budget, or a
//!   random mid-walk stop
//! - any (except Dragged) → Flee when the cursor gets too close
//! - Flee → Idle once the cursor is out past the safe distance
//! - Idle/Wander → Follow when following is on and the cursor sits in the
//!   middle band
//! - any → Dragged on drag-start, Dragged → Idle on release; dragging
//!   overrides everything else

use rand::Rng;
use rand::rngs::SmallRng;
use std::sync::Arc;
use tracing::debug;

use crate::animation::{AnimationLibrary, Animator, BehaviorKind, Facing, FrameCue};
use crate::behavior::BehaviorParams;
use crate::config::PetConfig;
use crate::constants::{behavior, distance, motion, timing};
use crate::types::{Dimensions, Position, ScreenBounds};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PetState {
    Idle,
    Wander,
    Follow,
    Flee,
    Dragged,
}

/// Drag signal surfaced by the window layer for this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragSignal {
    #[default]
    None,
    Started,
    /// Pointer moved while dragging; carries the desired top-left position
    Moved(Position),
    Released,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TickInput {
    /// Cursor in screen coordinates; `None` on a transient read failure,
    /// in which case the last known cursor is reused
    pub cursor: Option<Position>,
    pub drag: DragSignal,
}

#[derive(Debug, Clone, Copy)]
pub struct TickOutput {
    pub state: PetState,
    pub position: Position,
    /// Apply gate: true only when `position` differs from the previous tick
    pub moved: bool,
    pub frame: FrameCue,
}

pub struct MotionController {
    bounds: ScreenBounds,
    pet_size: Dimensions,
    library: Arc<AnimationLibrary>,
    animator: Animator,
    rng: SmallRng,

    state: PetState,
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,

    target: Position,
    idle_ticks_left: u32,
    wander_ticks_left: u32,
    ticks_in_wander: u32,
    idle_variant: usize,
    facing: Facing,

    jitter: (f32, f32),
    tick_count: u64,
    last_cursor: Position,
    last_published: Option<Position>,
}

impl MotionController {
    pub fn new(
        library: Arc<AnimationLibrary>,
        bounds: ScreenBounds,
        start: Position,
        rng: SmallRng,
    ) -> Self {
        let pet_size = library.pet_size();
        let mut controller = Self {
            bounds,
            pet_size,
            library,
            animator: Animator::new(),
            rng,
            state: PetState::Idle,
            x: start.x as f32,
            y: start.y as f32,
            vx: 0.0,
            vy: 0.0,
            target: start,
            idle_ticks_left: 0,
            wander_ticks_left: 0,
            ticks_in_wander: 0,
            idle_variant: 0,
            facing: Facing::Right,
            jitter: (0.0, 0.0),
            tick_count: 0,
            last_cursor: Position::default(),
            last_published: None,
        };
        controller.enter_idle(&BehaviorParams::for_mode(Default::default()));
        controller
    }

    pub fn state(&self) -> PetState {
        self.state
    }

    pub fn velocity(&self) -> (f32, f32) {
        (self.vx, self.vy)
    }

    /// Swap in a rescaled animation library (scale change at runtime)
    pub fn set_library(&mut self, library: Arc<AnimationLibrary>) {
        self.pet_size = library.pet_size();
        self.library = library;
    }

    /// Never fails and never leaves the screen: cursor read failures reuse
    /// the previous cursor, and the output position is clamped to bounds.
    pub fn tick(&mut self, input: &TickInput, config: &PetConfig) -> TickOutput {
        self.tick_count += 1;
        let params = BehaviorParams::for_mode(config.behavior_mode);

        let cursor_moved = input.cursor.is_some_and(|c| c != self.last_cursor);
        let cursor = input.cursor.unwrap_or(self.last_cursor);
        self.last_cursor = cursor;

        self.handle_drag(input.drag, &params);

        if self.state != PetState::Dragged {
            self.transition(cursor, cursor_moved, config, &params);
            self.advance_state(&params);
            self.integrate(cursor, config, &params);
        }

        let (x, y) = self.bounds.clamp(self.x, self.y, self.pet_size);
        self.x = x;
        self.y = y;

        let (dx, dy) = (self.x + self.jitter.0, self.y + self.jitter.1);
        let (dx, dy) = self.bounds.clamp(dx, dy, self.pet_size);
        let published = Position::new(dx.round() as i32, dy.round() as i32);
        let moved = self.last_published != Some(published);
        self.last_published = Some(published);

        let frame = self.select_frame();
        TickOutput {
            state: self.state,
            position: published,
            moved,
            frame,
        }
    }

    /// Dragging overrides every other state, entered and exited
    /// unconditionally.
    fn handle_drag(&mut self, drag: DragSignal, params: &BehaviorParams) {
        match drag {
            DragSignal::Started => {
                debug!("drag started");
                self.state = PetState::Dragged;
                self.vx = 0.0;
                self.vy = 0.0;
            }
            DragSignal::Moved(pos) if self.state == PetState::Dragged => {
                self.x = pos.x as f32;
                self.y = pos.y as f32;
            }
            DragSignal::Released if self.state == PetState::Dragged => {
                debug!("drag released");
                self.enter_idle(params);
            }
            _ => {}
        }
    }

    fn transition(
        &mut self,
        cursor: Position,
        cursor_moved: bool,
        config: &PetConfig,
        params: &BehaviorParams,
    ) {
        let d2 = self.center().dist_sq(cursor);

        if d2 < distance::FLEE_DIST_SQ {
            if self.state != PetState::Flee {
                debug!(dist_sq = d2, "cursor too close, fleeing");
                self.state = PetState::Flee;
            }
            return;
        }

        if self.state == PetState::Flee {
            if d2 > distance::SAFE_DIST_SQ {
                self.enter_idle(params);
            }
            return;
        }

        let follow_enabled = params.follow_override.unwrap_or(config.follow_mouse);
        match self.state {
            PetState::Idle | PetState::Wander => {
                if follow_enabled
                    && d2 > distance::SAFE_DIST_SQ
                    && d2 < distance::FOLLOW_FAR_DIST_SQ
                {
                    debug!(dist_sq = d2, "entering follow band");
                    self.state = PetState::Follow;
                    self.retarget_follow(cursor);
                }
            }
            PetState::Follow => {
                if !follow_enabled || d2 >= distance::FOLLOW_FAR_DIST_SQ {
                    self.enter_idle(params);
                } else if cursor_moved {
                    self.retarget_follow(cursor);
                }
            }
            _ => {}
        }
    }

    fn advance_state(&mut self, params: &BehaviorParams) {
        match self.state {
            PetState::Idle => {
                self.idle_ticks_left = self.idle_ticks_left.saturating_sub(1);
                if self.idle_ticks_left == 0 {
                    self.enter_wander(params);
                }
            }
            PetState::Wander => {
                self.ticks_in_wander += 1;
                self.wander_ticks_left = self.wander_ticks_left.saturating_sub(1);
                let reached =
                    self.position().dist_sq(self.target) <= distance::REACH_DIST_SQ;
                let random_stop = self.ticks_in_wander >= params.min_move_ticks
                    && self.rng.random_bool(params.stop_chance);
                if reached || self.wander_ticks_left == 0 || random_stop {
                    self.enter_idle(params);
                }
            }
            PetState::Follow => {
                if self.position().dist_sq(self.target) <= distance::REACH_DIST_SQ {
                    self.enter_idle(params);
                }
            }
            _ => {}
        }
    }

    /// Velocity integration: blend toward the desired direction, bounce off
    /// screen edges, and add the rate-limited jitter offset.
    fn integrate(&mut self, cursor: Position, config: &PetConfig, params: &BehaviorParams) {
        let (dir_x, dir_y, state_mul) = match self.state {
            PetState::Idle => (0.0, 0.0, 0.0),
            PetState::Wander => {
                let (x, y) = self.direction_to(self.target);
                (x, y, motion::SPEED_WANDER)
            }
            PetState::Follow => {
                let (x, y) = self.direction_to(self.target);
                (x, y, motion::SPEED_FOLLOW)
            }
            PetState::Flee => {
                let (x, y) = self.direction_to(cursor);
                (-x, -y, motion::SPEED_FLEE)
            }
            PetState::Dragged => unreachable!("dragged pets are moved by the window layer"),
        };

        let speed = state_mul * params.speed_mul * config.speed;
        let desired_vx = dir_x * motion::BASE_SPEED_X * speed;
        let desired_vy = dir_y * motion::BASE_SPEED_Y * speed;
        self.vx = self.vx * motion::INERTIA_FACTOR + desired_vx * motion::INTENT_FACTOR;
        self.vy = self.vy * motion::INERTIA_FACTOR + desired_vy * motion::INTENT_FACTOR;

        if self.tick_count % timing::JITTER_INTERVAL == 0 {
            self.jitter = (
                self.rng.random_range(-motion::JITTER_AMPLITUDE..=motion::JITTER_AMPLITUDE),
                self.rng.random_range(-motion::JITTER_AMPLITUDE..=motion::JITTER_AMPLITUDE),
            );
        }

        self.x += self.vx;
        self.y += self.vy;

        let max_x = self.bounds.width.saturating_sub(self.pet_size.width) as f32;
        let max_y = self.bounds.height.saturating_sub(self.pet_size.height) as f32;
        if self.x <= 0.0 {
            self.vx = self.vx.abs();
        } else if self.x >= max_x {
            self.vx = -self.vx.abs();
        }
        if self.y <= 0.0 {
            self.vy = self.vy.abs();
        } else if self.y >= max_y {
            self.vy = -self.vy.abs();
        }
    }

    fn select_frame(&mut self) -> FrameCue {
        if self.vx >= 0.5 {
            self.facing = Facing::Right;
        } else if self.vx <= -0.5 {
            self.facing = Facing::Left;
        }

        let kind = match self.state {
            PetState::Idle => BehaviorKind::Idle,
            PetState::Wander | PetState::Follow | PetState::Flee => BehaviorKind::Walk,
            PetState::Dragged => BehaviorKind::Drag,
        };
        self.animator.set_behavior(kind, self.idle_variant, self.facing);
        self.animator.advance(&self.library, timing::TICK_MS as u32)
    }

    fn enter_idle(&mut self, params: &BehaviorParams) {
        self.state = PetState::Idle;
        let min = scaled_ticks(behavior::IDLE_TICKS_MIN, params.idle_duration_mul);
        let max = scaled_ticks(behavior::IDLE_TICKS_MAX, params.idle_duration_mul);
        self.idle_ticks_left = self.rng.random_range(min..=max.max(min));
        self.idle_variant = self.rng.random_range(0..self.library.idle_variants());
    }

    fn enter_wander(&mut self, params: &BehaviorParams) {
        self.state = PetState::Wander;
        self.ticks_in_wander = 0;
        let min = scaled_ticks(behavior::WANDER_TICKS_MIN, params.wander_budget_mul);
        let max = scaled_ticks(behavior::WANDER_TICKS_MAX, params.wander_budget_mul);
        self.wander_ticks_left = self.rng.random_range(min..=max.max(min));

        let max_x = self.bounds.width.saturating_sub(self.pet_size.width) as i32;
        let max_y = self.bounds.height.saturating_sub(self.pet_size.height) as i32;
        self.target = Position::new(
            self.rng.random_range(0..=max_x.max(0)),
            self.rng.random_range(0..=max_y.max(0)),
        );
        debug!(target = ?self.target, budget = self.wander_ticks_left, "wandering");
    }

    /// Aim for a point near the cursor rather than the cursor itself
    fn retarget_follow(&mut self, cursor: Position) {
        let off = distance::FOLLOW_OFFSET;
        self.target = Position::new(
            cursor.x + self.rng.random_range(-off..=off),
            cursor.y + self.rng.random_range(-off..=off),
        );
    }

    fn position(&self) -> Position {
        Position::new(self.x.round() as i32, self.y.round() as i32)
    }

    fn center(&self) -> Position {
        Position::new(
            self.x.round() as i32 + (self.pet_size.width / 2) as i32,
            self.y.round() as i32 + (self.pet_size.height / 2) as i32,
        )
    }

    fn direction_to(&self, target: Position) -> (f32, f32) {
        let dx = target.x as f32 - self.x;
        let dy = target.y as f32 - self.y;
        let dist = (dx * dx + dy * dy).sqrt().max(1.0);
        (dx / dist, dy / dist)
    }
}

fn scaled_ticks(base: u32, mul: f32) -> u32 {
    ((base as f32 * mul) as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::BehaviorMode;
    use rand::SeedableRng;

    fn controller_at(start: Position) -> MotionController {
        MotionController::new(
            Arc::new(AnimationLibrary::fallback()),
            ScreenBounds::new(1920, 1080),
            start,
            SmallRng::seed_from_u64(7),
        )
    }

    fn far_cursor() -> TickInput {
        TickInput {
            cursor: Some(Position::new(0, 0)),
            drag: DragSignal::None,
        }
    }

    fn cursor_at(x: i32, y: i32) -> TickInput {
        TickInput {
            cursor: Some(Position::new(x, y)),
            drag: DragSignal::None,
        }
    }

    #[test]
    fn distant_cursor_keeps_idle_or_wander() {
        // Pet at (500,500), cursor at origin, ~707px away
        let mut controller = controller_at(Position::new(500, 500));
        let out = controller.tick(&far_cursor(), &PetConfig::default());
        assert!(matches!(out.state, PetState::Idle | PetState::Wander));
    }

    #[test]
    fn close_cursor_forces_flee_and_velocity_points_away() {
        let mut controller = controller_at(Position::new(500, 500));
        controller.tick(&far_cursor(), &PetConfig::default());

        // Fallback frames are 32x32, so the center sits at (516, 516);
        // a cursor at (480,480) is ~51px away, inside the 100px flee radius
        let out = controller.tick(&cursor_at(480, 480), &PetConfig::default());
        assert_eq!(out.state, PetState::Flee);

        for _ in 0..20 {
            controller.tick(&cursor_at(480, 480), &PetConfig::default());
        }
        let (vx, vy) = controller.velocity();
        assert!(vx > 0.0, "vx should point away from the cursor, got {vx}");
        assert!(vy > 0.0, "vy should point away from the cursor, got {vy}");
    }

    #[test]
    fn flee_triggers_from_wander_too() {
        let mut controller = controller_at(Position::new(500, 500));
        let config = PetConfig::default();
        // Idle out until the pet starts wandering
        for _ in 0..5000 {
            if controller.state() == PetState::Wander {
                break;
            }
            controller.tick(&far_cursor(), &config);
        }
        assert_eq!(controller.state(), PetState::Wander);

        let out = controller.tick(&cursor_at(510, 510), &config);
        assert_eq!(out.state, PetState::Flee);
    }

    #[test]
    fn flee_ends_past_safe_distance() {
        let mut controller = controller_at(Position::new(500, 500));
        let config = PetConfig::default();
        controller.tick(&cursor_at(510, 510), &config);
        assert_eq!(controller.state(), PetState::Flee);

        // Cursor jumps far away, past the 200px safe radius
        let out = controller.tick(&cursor_at(1500, 200), &config);
        assert_eq!(out.state, PetState::Idle);
    }

    #[test]
    fn drag_overrides_flee() {
        let mut controller = controller_at(Position::new(500, 500));
        let config = PetConfig::default();
        let input = TickInput {
            cursor: Some(Position::new(510, 510)),
            drag: DragSignal::Started,
        };
        let out = controller.tick(&input, &config);
        assert_eq!(out.state, PetState::Dragged);

        // Still dragged on the next tick despite the close cursor
        let out = controller.tick(&cursor_at(510, 510), &config);
        assert_eq!(out.state, PetState::Dragged);
    }

    #[test]
    fn drag_moves_follow_the_pointer_and_release_idles() {
        let mut controller = controller_at(Position::new(500, 500));
        let config = PetConfig::default();
        controller.tick(
            &TickInput {
                cursor: Some(Position::new(0, 0)),
                drag: DragSignal::Started,
            },
            &config,
        );
        let out = controller.tick(
            &TickInput {
                cursor: Some(Position::new(0, 0)),
                drag: DragSignal::Moved(Position::new(700, 300)),
            },
            &config,
        );
        assert_eq!(out.position, Position::new(700, 300));

        let out = controller.tick(
            &TickInput {
                cursor: Some(Position::new(0, 0)),
                drag: DragSignal::Released,
            },
            &config,
        );
        assert_eq!(out.state, PetState::Idle);
    }

    #[test]
    fn dragging_outside_the_screen_is_clamped() {
        let mut controller = controller_at(Position::new(500, 500));
        let config = PetConfig::default();
        controller.tick(
            &TickInput {
                cursor: None,
                drag: DragSignal::Started,
            },
            &config,
        );
        let out = controller.tick(
            &TickInput {
                cursor: None,
                drag: DragSignal::Moved(Position::new(-5000, 99_999)),
            },
            &config,
        );
        assert_eq!(out.position.x, 0);
        assert!(out.position.y <= 1080 - 32);
    }

    #[test]
    fn unchanged_position_does_not_fire_apply() {
        let mut controller = controller_at(Position::new(500, 500));
        let config = PetConfig::default();
        // First tick always publishes
        let first = controller.tick(&far_cursor(), &config);
        assert!(first.moved);

        // Freshly idle, zero velocity, jitter not yet redrawn: identical
        // position and the gate must stay closed
        let second = controller.tick(&far_cursor(), &config);
        if second.position == first.position {
            assert!(!second.moved);
        }
        let third = controller.tick(&far_cursor(), &config);
        if third.position == second.position {
            assert!(!third.moved);
        }
    }

    #[test]
    fn position_stays_in_bounds_under_extreme_speed() {
        let mut controller = controller_at(Position::new(500, 500));
        let config = PetConfig {
            speed: 10.0,
            ..PetConfig::default()
        };
        for _ in 0..3000 {
            let out = controller.tick(&far_cursor(), &config);
            assert!(out.position.x >= 0 && out.position.x <= 1920 - 32);
            assert!(out.position.y >= 0 && out.position.y <= 1080 - 32);
        }
    }

    #[test]
    fn idle_eventually_wanders_and_wander_eventually_rests() {
        let mut controller = controller_at(Position::new(500, 500));
        let config = PetConfig::default();
        let mut saw_wander = false;
        let mut saw_idle_after_wander = false;
        for _ in 0..20_000 {
            let out = controller.tick(&far_cursor(), &config);
            match out.state {
                PetState::Wander => saw_wander = true,
                PetState::Idle if saw_wander => {
                    saw_idle_after_wander = true;
                    break;
                }
                _ => {}
            }
        }
        assert!(saw_wander);
        assert!(saw_idle_after_wander);
    }

    #[test]
    fn follow_requires_flag_and_band() {
        let mut controller = controller_at(Position::new(500, 500));
        // Center (516,516); cursor 300px away is inside the (200,400) band
        let in_band = cursor_at(816, 516);

        let out = controller.tick(&in_band, &PetConfig::default());
        assert_ne!(out.state, PetState::Follow);

        let config = PetConfig {
            follow_mouse: true,
            ..PetConfig::default()
        };
        let out = controller.tick(&in_band, &config);
        assert_eq!(out.state, PetState::Follow);
    }

    #[test]
    fn clingy_mode_follows_without_the_flag() {
        let mut controller = controller_at(Position::new(500, 500));
        let config = PetConfig {
            behavior_mode: BehaviorMode::Clingy,
            ..PetConfig::default()
        };
        let out = controller.tick(&cursor_at(816, 516), &config);
        assert_eq!(out.state, PetState::Follow);
    }

    #[test]
    fn quiet_mode_never_follows() {
        let mut controller = controller_at(Position::new(500, 500));
        let config = PetConfig {
            follow_mouse: true,
            behavior_mode: BehaviorMode::Quiet,
            ..PetConfig::default()
        };
        let out = controller.tick(&cursor_at(816, 516), &config);
        assert_ne!(out.state, PetState::Follow);
    }

    #[test]
    fn cursor_read_failure_reuses_last_known_cursor() {
        let mut controller = controller_at(Position::new(500, 500));
        let config = PetConfig::default();
        controller.tick(&cursor_at(510, 510), &config);
        assert_eq!(controller.state(), PetState::Flee);

        // Cursor retrieval fails this tick: last position is reused and the
        // pet keeps fleeing instead of snapping to a default
        let out = controller.tick(
            &TickInput {
                cursor: None,
                drag: DragSignal::None,
            },
            &config,
        );
        assert_eq!(out.state, PetState::Flee);
    }

    #[test]
    fn walk_frames_face_the_direction_of_travel() {
        let mut controller = controller_at(Position::new(500, 500));
        let config = PetConfig::default();
        // Flee from a cursor on the right: the pet runs left
        for _ in 0..40 {
            controller.tick(&cursor_at(560, 516), &config);
        }
        assert_eq!(controller.state(), PetState::Flee);
        let out = controller.tick(&cursor_at(560, 516), &config);
        assert_eq!(out.frame.kind, BehaviorKind::Walk);
        assert_eq!(out.frame.facing, Facing::Left);
    }

    #[test]
    fn seeded_controllers_are_reproducible() {
        let run = || {
            let mut controller = controller_at(Position::new(500, 500));
            let config = PetConfig::default();
            let mut trail = Vec::new();
            for _ in 0..500 {
                trail.push(controller.tick(&far_cursor(), &config).position);
            }
            trail
        };
        assert_eq!(run(), run());
    }
}
