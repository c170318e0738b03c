//! Loading of pre-recorded estimator output.
//!
//! Frames are stored either as one JSON array or as JSON Lines (one frame per
//! line). Blank lines in JSON Lines input are ignored.

use crate::pose::types::KeypointFrame;
use std::path::Path;
use thiserror::Error;

/// On-disk layout of recorded frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    Json,
    JsonLines,
}

impl FrameFormat {
    /// Pick the format from a file extension, defaulting to a JSON array.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("jsonl") | Some("ndjson") => FrameFormat::JsonLines,
            _ => FrameFormat::Json,
        }
    }
}

/// Errors raised while reading recorded frames.
#[derive(Debug, Error)]
pub enum FrameLoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

impl FrameLoadError {
    /// Input line the error refers to, when known.
    pub fn line(&self) -> Option<usize> {
        match self {
            FrameLoadError::Io(_) => None,
            FrameLoadError::Parse { line, .. } => Some(*line),
        }
    }
}

/// Read all frames from a file.
pub fn load_frames(path: &Path) -> Result<Vec<KeypointFrame>, FrameLoadError> {
    let content = std::fs::read_to_string(path)?;
    parse_frames(&content, FrameFormat::from_path(path))
}

/// Parse frames from an in-memory document.
pub fn parse_frames(
    content: &str,
    format: FrameFormat,
) -> Result<Vec<KeypointFrame>, FrameLoadError> {
    match format {
        FrameFormat::Json => {
            serde_json::from_str(content).map_err(|source| FrameLoadError::Parse {
                line: source.line(),
                source,
            })
        }
        FrameFormat::JsonLines => content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| parse_frame_line(line, i + 1))
            .collect(),
    }
}

/// Parse a single JSON Lines record.
pub fn parse_frame_line(line: &str, line_number: usize) -> Result<KeypointFrame, FrameLoadError> {
    serde_json::from_str(line).map_err(|source| FrameLoadError::Parse {
        line: line_number,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            FrameFormat::from_path(&PathBuf::from("a.jsonl")),
            FrameFormat::JsonLines
        );
        assert_eq!(
            FrameFormat::from_path(&PathBuf::from("a.json")),
            FrameFormat::Json
        );
        assert_eq!(FrameFormat::from_path(&PathBuf::from("a")), FrameFormat::Json);
    }

    #[test]
    fn test_parse_json_lines_skips_blank_lines() {
        let content = r#"{"frame_index":0,"keypoints":[{"x":0.1,"y":0.2,"visibility":1.0}]}

{"frame_index":5,"keypoints":[]}
"#;
        let frames = parse_frames(content, FrameFormat::JsonLines).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].frame_index, 5);
        assert_eq!(frames[0].keypoints[0].confidence, 1.0);
    }

    #[test]
    fn test_parse_error_reports_line() {
        let content = "{\"keypoints\":[]}\nnot json\n";
        match parse_frames(content, FrameFormat::JsonLines) {
            Err(FrameLoadError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_parse_json_array() {
        let content = r#"[{"keypoints":[]},{"frame_index":3,"timestamp":0.1,"keypoints":[]}]"#;
        let frames = parse_frames(content, FrameFormat::Json).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].timestamp, Some(0.1));
    }
}
