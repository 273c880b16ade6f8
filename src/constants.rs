//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Tick loop timing
pub mod timing {
    /// Fixed tick interval in milliseconds (~33 updates per second)
    pub const TICK_MS: u64 = 30;

    /// Jitter offset is redrawn once every this many ticks
    pub const JITTER_INTERVAL: u64 = 5;
}

/// Motion tuning
pub mod motion {
    /// Base horizontal speed in pixels per tick (before multipliers)
    pub const BASE_SPEED_X: f32 = 3.0;

    /// Base vertical speed in pixels per tick (before multipliers)
    pub const BASE_SPEED_Y: f32 = 2.0;

    /// Fraction of the previous velocity kept each tick
    pub const INERTIA_FACTOR: f32 = 0.95;

    /// Fraction of the desired velocity blended in each tick
    pub const INTENT_FACTOR: f32 = 0.05;

    /// Maximum magnitude of the jitter offset in pixels
    pub const JITTER_AMPLITUDE: f32 = 1.5;

    /// Speed multiplier while wandering
    pub const SPEED_WANDER: f32 = 0.8;

    /// Speed multiplier while following the cursor
    pub const SPEED_FOLLOW: f32 = 1.2;

    /// Speed multiplier while fleeing from the cursor
    pub const SPEED_FLEE: f32 = 1.6;
}

/// Distance thresholds, stored squared so the tick loop never takes a root
pub mod distance {
    /// Cursor closer than this (pixels) triggers Flee
    pub const FLEE_DIST: i64 = 100;
    pub const FLEE_DIST_SQ: i64 = FLEE_DIST * FLEE_DIST;

    /// Flee ends once the cursor is farther than this
    pub const SAFE_DIST: i64 = 200;
    pub const SAFE_DIST_SQ: i64 = SAFE_DIST * SAFE_DIST;

    /// Outer edge of the follow band
    pub const FOLLOW_FAR_DIST: i64 = 400;
    pub const FOLLOW_FAR_DIST_SQ: i64 = FOLLOW_FAR_DIST * FOLLOW_FAR_DIST;

    /// Distance kept from the cursor while following
    pub const FOLLOW_OFFSET: i32 = 80;

    /// A wander target counts as reached within this distance
    pub const REACH_DIST: i64 = 20;
    pub const REACH_DIST_SQ: i64 = REACH_DIST * REACH_DIST;
}

/// Behavior timing, in ticks
pub mod behavior {
    /// Randomized idle duration bounds
    pub const IDLE_TICKS_MIN: u32 = 33;
    pub const IDLE_TICKS_MAX: u32 = 100;

    /// Randomized wander budget bounds (state ends when exhausted)
    pub const WANDER_TICKS_MIN: u32 = 200;
    pub const WANDER_TICKS_MAX: u32 = 500;

    /// Per-tick chance of stopping mid-wander once MIN_MOVE_TICKS have passed
    pub const STOP_CHANCE: f64 = 0.0003;

    /// Ticks a wander must last before a random stop may trigger
    pub const MIN_MOVE_TICKS: u32 = 18;

    /// Pixels the pointer must travel with the button held before a drag starts
    pub const DRAG_THRESHOLD: i32 = 5;
}

/// Display option tables indexed by the persisted config
pub mod scale {
    pub const SCALE_OPTIONS: [f32; 9] = [0.3, 0.5, 0.7, 0.9, 1.1, 1.3, 1.5, 1.7, 1.9];
    pub const DEFAULT_SCALE_INDEX: usize = 3;

    pub const OPACITY_OPTIONS: [f32; 8] = [1.0, 0.9, 0.8, 0.7, 0.6, 0.5, 0.4, 0.3];
    pub const DEFAULT_OPACITY_INDEX: usize = 0;
}

/// Filesystem locations
pub mod paths {
    /// Directory under the user config dir holding our files
    pub const APP_DIR: &str = "scamper";

    /// Config file name inside APP_DIR
    pub const CONFIG_FILENAME: &str = "config.json";

    /// XDG autostart entry file name
    pub const AUTOSTART_FILENAME: &str = "scamper.desktop";

    /// Default animation asset directory, relative to the working directory
    pub const ASSET_DIR: &str = "assets";
}

/// Animation asset file names inside the asset directory
pub mod assets {
    pub const WALK: &str = "walk.png";
    pub const DRAG: &str = "drag.png";
    pub const IDLE_PREFIX: &str = "idle";
    pub const IDLE_COUNT: usize = 4;
    pub const ICON: &str = "icon.png";

    /// Frame delay substituted when an asset carries none
    pub const DEFAULT_DELAY_MS: u32 = 80;
}

/// Update check constants
pub mod net {
    /// Releases page scanned for the latest tag
    pub const RELEASES_URL: &str = "https://github.com/scamper-pet/scamper/releases";

    /// Pattern extracting release tags from the page
    pub const TAG_PATTERN: &str = r#"/releases/tag/(v[0-9][^"/]*)"#;

    pub const HTTP_TIMEOUT_SECS: u64 = 10;

    pub const USER_AGENT: &str = "scamper-update-check";
}

/// Mouse button constants
pub mod mouse {
    /// Left mouse button number
    pub const BUTTON_LEFT: u8 = 1;
}

/// X11 protocol and rendering constants
pub mod x11 {
    /// ARGB color depth (32-bit: 8 bits each for Alpha, Red, Green, Blue)
    pub const ARGB_DEPTH: u8 = 32;

    /// Override redirect flag for unmanaged windows
    pub const OVERRIDE_REDIRECT: u32 = 1;

    /// Baseline DPI an unscaled desktop reports
    pub const BASE_DPI: f32 = 96.0;

    /// Millimetres per inch, for DPI derivation from screen geometry
    pub const MM_PER_INCH: f32 = 25.4;
}
