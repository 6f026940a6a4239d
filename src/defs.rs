// src/defs.rs
// Shared constants for the jigsaw arena server and its clients.

/// Side length of the square occupancy grid every piece is drawn on.
pub const PIECE_SIDE: usize = 3;

/// Number of pieces appended to the shared pool each time a cursor runs past it.
pub const PIECE_BATCH: usize = 5;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;

pub const DEFAULT_ROUND_SECONDS: u64 = 60;
pub const MIN_ROUND_SECONDS: u64 = 10;

pub const DEFAULT_TOP_COUNT: usize = 10;
pub const DEFAULT_MAX_CONNECTIONS: usize = 64;
pub const DEFAULT_ARCHIVE_PATH: &str = "data/results.json";

pub const MIN_LOGIN_LENGTH: usize = 1;
pub const MAX_LOGIN_LENGTH: usize = 255;

// Upper bound for a single protocol line, newline excluded.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

pub type Cells = [[bool; PIECE_SIDE]; PIECE_SIDE];
