//! Video metadata extraction via FFprobe

use crate::error::{Error, Result};
use crate::media::GpsCoord;
use crate::time::datetime::parse_video_datetime;
use chrono::{Local, NaiveDateTime, TimeZone};
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;
use tracing::{debug, trace};

/// Metadata keys to try for creation date
const CREATION_DATE_KEYS: &[&str] = &[
    "creation_time",
    "com.apple.quicktime.creationdate",
    "date",
    "date_recorded",
];

/// Metadata keys holding an ISO 6709 location string
const LOCATION_KEYS: &[&str] = &["location", "com.apple.quicktime.location.ISO6709"];

/// Cached FFprobe availability check
static FFPROBE_AVAILABLE: OnceLock<bool> = OnceLock::new();

static ISO6709: OnceLock<Regex> = OnceLock::new();

/// Check if ffprobe is available (cached)
fn is_ffprobe_available() -> bool {
    *FFPROBE_AVAILABLE.get_or_init(|| Command::new("ffprobe").arg("-version").output().is_ok())
}

/// Values read from a video container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoData {
    /// Creation time converted to local wall-clock time
    pub timestamp: Option<NaiveDateTime>,
    pub gps: Option<GpsCoord>,
}

/// Extract creation time and location from video metadata using FFprobe
pub fn read_video_metadata(path: &Path) -> Result<VideoData> {
    if !is_ffprobe_available() {
        return Err(Error::FfprobeNotFound);
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| Error::VideoMetadata {
            path: path.to_path_buf(),
            message: format!("Failed to execute ffprobe: {}", e),
        })?;

    if !output.status.success() {
        return Err(Error::VideoMetadata {
            path: path.to_path_buf(),
            message: format!(
                "FFprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ),
        });
    }

    let json_str = String::from_utf8_lossy(&output.stdout);
    trace!(?path, "FFprobe output: {}", json_str);

    let json: Value = serde_json::from_str(&json_str).map_err(|e| Error::VideoMetadata {
        path: path.to_path_buf(),
        message: format!("Failed to parse FFprobe JSON: {}", e),
    })?;

    Ok(parse_ffprobe_json(path, &json))
}

/// Pull creation time and location out of ffprobe's JSON, format tags first,
/// then stream tags
fn parse_ffprobe_json(path: &Path, json: &Value) -> VideoData {
    let mut tag_sets: Vec<&Value> = Vec::new();
    if let Some(tags) = json.get("format").and_then(|f| f.get("tags")) {
        tag_sets.push(tags);
    }
    if let Some(streams) = json.get("streams").and_then(|s| s.as_array()) {
        tag_sets.extend(streams.iter().filter_map(|s| s.get("tags")));
    }

    let utc_time = tag_sets.iter().find_map(|tags| {
        CREATION_DATE_KEYS.iter().find_map(|key| {
            let value = lookup_tag(tags, key)?;
            let dt = parse_video_datetime(value)?;
            debug!(?path, key, "Found video creation time");
            Some(dt)
        })
    });

    let gps = tag_sets.iter().find_map(|tags| {
        LOCATION_KEYS
            .iter()
            .find_map(|key| lookup_tag(tags, key).and_then(parse_iso6709))
    });

    VideoData {
        timestamp: utc_time.map(|utc| Local.from_utc_datetime(&utc).naive_local()),
        gps,
    }
}

/// Tag lookup trying both the given and the upper-case spelling
fn lookup_tag<'a>(tags: &'a Value, key: &str) -> Option<&'a str> {
    tags.get(key)
        .or_else(|| tags.get(key.to_uppercase()))
        .and_then(|v| v.as_str())
}

/// Parse "+48.8566+002.3522+035.000/" style location strings
fn parse_iso6709(value: &str) -> Option<GpsCoord> {
    let re = ISO6709.get_or_init(|| {
        Regex::new(r"^([+-]\d+(?:\.\d+)?)([+-]\d+(?:\.\d+)?)").expect("valid ISO 6709 pattern")
    });
    let caps = re.captures(value.trim())?;
    let latitude = caps[1].parse().ok()?;
    let longitude = caps[2].parse().ok()?;
    GpsCoord::new(latitude, longitude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_parse_iso6709() {
        let gps = parse_iso6709("+48.8566+002.3522+035.000/").unwrap();
        assert!((gps.latitude - 48.8566).abs() < 1e-9);
        assert!((gps.longitude - 2.3522).abs() < 1e-9);

        let gps = parse_iso6709("-33.8688+151.2093/").unwrap();
        assert!(gps.latitude < 0.0);

        assert!(parse_iso6709("nowhere").is_none());
    }

    #[test]
    fn test_parse_ffprobe_json_prefers_format_tags() {
        let json: Value = serde_json::from_str(
            r#"{
                "format": {"tags": {"creation_time": "2022-05-01T10:00:00.000000Z",
                                    "location": "+48.8566+002.3522/"}},
                "streams": [{"tags": {"creation_time": "2019-01-01T00:00:00Z"}}]
            }"#,
        )
        .unwrap();

        let data = parse_ffprobe_json(Path::new("clip.mp4"), &json);
        let expected = Local
            .from_utc_datetime(&parse_video_datetime("2022-05-01T10:00:00Z").unwrap())
            .naive_local();
        assert_eq!(data.timestamp, Some(expected));
        assert!(data.gps.is_some());
    }

    #[test]
    fn test_parse_ffprobe_json_falls_back_to_streams() {
        let json: Value = serde_json::from_str(
            r#"{"format": {"tags": {}},
                "streams": [{"codec_type": "audio"},
                            {"tags": {"CREATION_TIME": "2019-03-02T08:00:00Z"}}]}"#,
        )
        .unwrap();

        let data = parse_ffprobe_json(Path::new("clip.mov"), &json);
        assert_eq!(data.timestamp.map(|t| t.year()), Some(2019));
        assert!(data.gps.is_none());
    }
}
