//! PGN files written by the match runner.
//!
//! Games are sliced into their header block and move text, abnormal
//! terminations are classified, and finished files are stripped and
//! gzip-compressed for upload.

use std::io::{self, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

/// Headers kept when bundling games for upload.
const KEPT_HEADERS: &[&str] = &[
    "Event",
    "Site",
    "Date",
    "Round",
    "White",
    "Black",
    "Result",
    "FEN",
    "TimeControl",
    "Variant",
];

/// One game: raw header lines and move text lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgnGame {
    pub headers: Vec<String>,
    pub moves: Vec<String>,
}

impl PgnGame {
    /// Value of `[Name "value"]`.
    pub fn header(&self, name: &str) -> Option<&str> {
        let prefix = format!("[{} ", name);
        self.headers
            .iter()
            .find(|line| line.starts_with(&prefix))
            .and_then(|line| line.split('"').nth(1))
    }

    /// Diagnostic label for games that ended abnormally.
    pub fn termination_error(&self) -> Option<&'static str> {
        let reason = self.header("Termination")?;
        if reason.contains("abandoned") {
            Some("Disconnect")
        } else if reason.contains("stalled") {
            Some("Stalled")
        } else if reason.contains("illegal") {
            Some("Illegal Move")
        } else {
            None
        }
    }

    /// The game as text, headers and moves separated by a blank line.
    pub fn pretty(&self) -> String {
        let mut text = self.headers.join("\n");
        text.push_str("\n\n");
        text.push_str(&self.moves.join("\n"));
        text
    }

    /// The game with only [`KEPT_HEADERS`], a `ScaleFactor` header and the
    /// end time, moves joined on one line.
    pub fn stripped(&self, scale_factor: f64) -> String {
        let mut lines: Vec<String> = KEPT_HEADERS
            .iter()
            .filter_map(|name| self.header(name).map(|value| format!("[{} \"{}\"]", name, value)))
            .collect();
        lines.push(format!("[ScaleFactor \"{}\"]", scale_factor));
        if let Some(end) = self.header("GameEndTime") {
            lines.push(format!("[GameEndTime \"{}\"]", end));
        }

        let mut text = lines.join("\n");
        text.push_str("\n\n");
        text.push_str(&self.moves.join(" "));
        text.push_str("\n\n");
        text
    }
}

/// Splits PGN text into games.
///
/// Slicing stops at the first game missing either its headers or its moves.
pub fn slice_pgn(text: &str) -> Vec<PgnGame> {
    let mut games = Vec::new();
    let mut lines = text.lines().map(str::trim_end).peekable();

    loop {
        while lines.peek().is_some_and(|line| line.is_empty()) {
            lines.next();
        }
        let headers: Vec<String> = lines
            .by_ref()
            .take_while(|line| !line.is_empty())
            .map(String::from)
            .collect();
        let moves: Vec<String> = lines
            .by_ref()
            .take_while(|line| !line.is_empty())
            .map(String::from)
            .collect();

        if headers.is_empty() || moves.is_empty() {
            break;
        }
        games.push(PgnGame { headers, moves });
    }

    games
}

/// Reads and slices a PGN file; a missing file has no games.
pub fn read_pgn_file(path: &Path) -> io::Result<Vec<PgnGame>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(slice_pgn(&text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Strips every game of `paths` and gzip-compresses the concatenation.
pub fn compress_pgns(paths: &[impl AsRef<Path>], scale_factor: f64) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    for path in paths {
        for game in read_pgn_file(path.as_ref())? {
            encoder.write_all(game.stripped(scale_factor).as_bytes())?;
        }
    }
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    const PGN: &str = r#"[Event "?"]
[Site "?"]
[White "dev"]
[Black "base"]
[Result "1-0"]
[PlyCount "3"]
[Termination "adjudication"]

1. e4 {+0.30/12 0.5s} e5 {-0.25/11 0.4s}
2. Nf3 {+0.31/12 0.3s} 1-0

[Event "?"]
[White "base"]
[Black "dev"]
[Result "0-1"]
[Termination "abandoned"]

1. d4 {+0.10/10 0.2s} 0-1

"#;

    #[test]
    fn test_slice_games() {
        let games = slice_pgn(PGN);
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].headers.len(), 7);
        assert_eq!(games[0].moves.len(), 2);
        assert_eq!(games[1].header("White"), Some("base"));
    }

    #[test]
    fn test_truncated_game_is_dropped() {
        let games = slice_pgn("[Event \"?\"]\n\n1. e4 *\n\n[Event \"?\"]\n");
        assert_eq!(games.len(), 1);
    }

    #[test]
    fn test_termination_errors() {
        let games = slice_pgn(PGN);
        assert_eq!(games[0].termination_error(), None);
        assert_eq!(games[1].termination_error(), Some("Disconnect"));

        let stalled = PgnGame {
            headers: vec!["[Termination \"stalled connection\"]".to_string()],
            moves: vec!["*".to_string()],
        };
        assert_eq!(stalled.termination_error(), Some("Stalled"));

        let illegal = PgnGame {
            headers: vec!["[Termination \"illegal move\"]".to_string()],
            moves: vec!["0-1".to_string()],
        };
        assert_eq!(illegal.termination_error(), Some("Illegal Move"));
    }

    #[test]
    fn test_pretty_format() {
        let games = slice_pgn(PGN);
        let text = games[1].pretty();
        assert!(text.starts_with("[Event \"?\"]\n"));
        assert!(text.contains("[Termination \"abandoned\"]\n\n1. d4"));
    }

    #[test]
    fn test_stripped_headers() {
        let games = slice_pgn(PGN);
        let stripped = games[0].stripped(0.75);
        assert!(stripped.contains("[White \"dev\"]"));
        assert!(stripped.contains("[ScaleFactor \"0.75\"]"));
        assert!(!stripped.contains("PlyCount"));
        assert!(!stripped.contains("Termination"));
        assert!(stripped.contains("1. e4 {+0.30/12 0.5s} e5 {-0.25/11 0.4s} 2. Nf3"));
    }

    #[test]
    fn test_compress_pgns() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let first = temp_dir.path().join("1.1.0.0.pgn");
        std::fs::write(&first, PGN).unwrap();
        let missing = temp_dir.path().join("1.1.0.1.pgn");

        let compressed = compress_pgns(&[first, missing], 1.0).unwrap();
        let mut text = String::new();
        GzDecoder::new(compressed.as_slice()).read_to_string(&mut text).unwrap();

        assert_eq!(text.matches("[ScaleFactor \"1\"]").count(), 2);
        assert!(text.contains("1. d4"));
    }
}
