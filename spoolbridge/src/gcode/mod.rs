mod scanner;

pub use scanner::{
    MARKER_COMMAND, dedup_consecutive, match_marker, scan_file, scan_lines, scan_reader,
};
