use std::path::Path;

use anyhow::Context;
use itertools::Itertools;
use pest::Parser;
use pest_derive::Parser;

use tokio::fs::File;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncRead;
use tokio::io::BufReader;

use spoolbridge_api::FilamentId;

#[derive(Parser)]
#[grammar = "gcode/marker.pest"]
struct MarkerParser;

/// command the slicer emits whenever the active filament changes
pub const MARKER_COMMAND: &str = "ASSERT_ACTIVE_FILAMENT";

/// extract the filament id of a marker line
pub fn match_marker(line: &str) -> Option<FilamentId> {
    // most lines are moves, skip the parser for them
    if !line.contains(MARKER_COMMAND) {
        return None;
    }

    let mut pairs = MarkerParser::parse(Rule::MARKER_LINE, line).ok()?;

    let digits = pairs
        .next()?
        .into_inner()
        .find(|p| p.as_rule() == Rule::FILAMENT_ID)?;

    match digits.as_str().parse::<FilamentId>() {
        Ok(id) => Some(id),
        Err(e) => {
            log::warn!("ignoring filament id '{}': {}", digits.as_str(), e);
            None
        }
    }
}

/// filament ids of every marker line, in order
pub fn scan_lines<I, S>(lines: I) -> Vec<FilamentId>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|line| match_marker(line.as_ref().trim()))
        .collect()
}

/// collapse runs of the same id, non adjacent repeats are kept
pub fn dedup_consecutive(ids: Vec<FilamentId>) -> Vec<FilamentId> {
    ids.into_iter().dedup().collect()
}

/// read gcode line by line and return the sequence of filament changes.
/// invalid utf8 is tolerated
pub async fn scan_reader<R: AsyncRead + Unpin>(file: R) -> std::io::Result<Vec<FilamentId>> {
    // reader
    let mut reader = BufReader::new(file);
    // buffer for reader
    let mut buffer = Vec::new();
    // raw captures
    let mut ids = Vec::new();

    while reader.read_until(b'\n', &mut buffer).await? != 0 {
        // slicer comments may carry arbitrary bytes
        let line = String::from_utf8_lossy(&buffer);

        if let Some(id) = match_marker(line.trim()) {
            ids.push(id);
        }

        buffer.clear();
    }

    log::debug!("found {} filament markers", ids.len());

    return Ok(dedup_consecutive(ids));
}

/// open a gcode file and return the sequence of filament changes
pub async fn scan_file(path: &Path) -> anyhow::Result<Vec<FilamentId>> {
    let file = match File::open(path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            anyhow::bail!("G-code file not found -> {}", path.display())
        }
        Err(e) => {
            return Err(e).with_context(|| format!("cannot open G-code file '{}'", path.display()));
        }
    };

    let changes = scan_reader(file)
        .await
        .with_context(|| format!("failed to read G-code file '{}'", path.display()))?;

    return Ok(changes);
}

#[test]
fn test_match_marker() {
    assert_eq!(match_marker("ASSERT_ACTIVE_FILAMENT ID=3"), Some(3));
    assert_eq!(match_marker("  ASSERT_ACTIVE_FILAMENT\tID=12 ; tool change"), Some(12));
    assert_eq!(match_marker("T1 ; ASSERT_ACTIVE_FILAMENT   ID=007"), Some(7));
    // digits stop at the first non digit
    assert_eq!(match_marker("ASSERT_ACTIVE_FILAMENT ID=42abc"), Some(42));
    // leftmost complete marker wins
    assert_eq!(
        match_marker("ASSERT_ACTIVE_FILAMENT ID=x ASSERT_ACTIVE_FILAMENT ID=5 ASSERT_ACTIVE_FILAMENT ID=6"),
        Some(5)
    );

    assert_eq!(match_marker("G1 X10 Y10 E0.4"), None);
    assert_eq!(match_marker("ASSERT_ACTIVE_FILAMENT ID="), None);
    assert_eq!(match_marker("ASSERT_ACTIVE_FILAMENTID=3"), None);
    assert_eq!(match_marker("ASSERT_ACTIVE_FILAMENT id=3"), None);
    assert_eq!(match_marker("ASSERT_ACTIVE_FILAMENT ID=99999999999999999999999"), None);
}

#[test]
fn test_dedup_is_adjacency_only() {
    assert_eq!(dedup_consecutive(vec![1, 1, 2, 2, 2, 1]), vec![1, 2, 1]);
    assert_eq!(dedup_consecutive(vec![4, 5, 4, 5]), vec![4, 5, 4, 5]);
    assert_eq!(dedup_consecutive(Vec::new()), Vec::<FilamentId>::new());
}

#[test]
fn test_dedup_properties() {
    let raw = scan_lines([
        "ASSERT_ACTIVE_FILAMENT ID=2",
        "G1 X1",
        "ASSERT_ACTIVE_FILAMENT ID=2",
        "ASSERT_ACTIVE_FILAMENT ID=9",
        "ASSERT_ACTIVE_FILAMENT ID=9",
        "ASSERT_ACTIVE_FILAMENT ID=2",
        "ASSERT_ACTIVE_FILAMENT ID=3",
        "ASSERT_ACTIVE_FILAMENT ID=3",
    ]);
    assert_eq!(raw, vec![2, 2, 9, 9, 2, 3, 3]);

    let changes = dedup_consecutive(raw.clone());
    assert_eq!(changes, vec![2, 9, 2, 3]);

    // no two neighbours are equal
    assert!(changes.windows(2).all(|w| w[0] != w[1]));

    // expanding each change back to its run reproduces the raw captures
    let mut expanded = Vec::new();
    let mut rest = raw.as_slice();
    for id in &changes {
        let run = rest.iter().take_while(|x| *x == id).count();
        assert!(run > 0);
        expanded.extend(std::iter::repeat_n(*id, run));
        rest = &rest[run..];
    }
    assert!(rest.is_empty());
    assert_eq!(expanded, raw);
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn test_scan_reader() {
        let gcode: &[u8] = b"; generated by OrcaSlicer\n\
            ASSERT_ACTIVE_FILAMENT ID=1\n\
            G1 X0 Y0\n\
            ASSERT_ACTIVE_FILAMENT ID=1\n\
            ; \xff\xfe broken bytes\n\
            ASSERT_ACTIVE_FILAMENT ID=2\r\n\
            ASSERT_ACTIVE_FILAMENT ID=2\n\
            ASSERT_ACTIVE_FILAMENT ID=2\n\
            ASSERT_ACTIVE_FILAMENT ID=1";

        let changes = scan_reader(gcode).await.unwrap();

        assert_eq!(changes, vec![1, 2, 1]);
    }

    #[tokio::test]
    async fn test_scan_file_without_markers() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "G28\nG1 Z0.2 F3000\nM104 S0").unwrap();

        let changes = scan_file(file.path()).await.unwrap();

        assert!(changes.is_empty());
    }

    #[tokio::test]
    async fn test_scan_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.gcode");

        let err = scan_file(&path).await.unwrap_err();

        assert!(err.to_string().contains("not found"));
        assert!(err.to_string().contains("missing.gcode"));
    }
}
