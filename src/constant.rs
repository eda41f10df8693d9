// Window size constants
pub const DEFAULT_WINDOW_WIDTH: f32 = 820.0;
pub const DEFAULT_WINDOW_HEIGHT: f32 = 560.0;
pub const DEFAULT_WINDOW_TITLE: &str = "Diff Gutter";

/// Application name and metadata constants
pub const APP_QUALIFIER: &str = "com";
pub const APP_ORGANIZATION: &str = "DiffGutter";
pub const APP_NAME: &str = "Diff Gutter";

/// App related Magic Numbers
pub const MAX_RECENT_FILES: usize = 10;

/// Debounce defaults: 200ms per started block of 2000 lines, capped at 10s
pub const DEFAULT_BASE_DELAY_MS: u64 = 200;
pub const DEFAULT_LINES_PER_STEP: usize = 2000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;
pub const DEFAULT_WORKER_THREADS: usize = 2;

/// Gutter defaults
pub const DEFAULT_GUTTER_WIDTH: f32 = 8.0;
pub const DEFAULT_TOOLTIP_MAX_LINES: usize = 40;
pub const ADDED_COLOR: [u8; 3] = [0x8a, 0xe2, 0x34];
pub const MODIFIED_COLOR: [u8; 3] = [0xfc, 0xaf, 0x3e];
pub const REMOVED_COLOR: [u8; 3] = [0xef, 0x29, 0x29];
