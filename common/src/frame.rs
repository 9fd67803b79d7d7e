use chrono::TimeDelta;
use std::fmt;
use std::path::PathBuf;

/// Marker between the source prefix and the timestamp in a frame file name.
pub const FRAME_MARKER: &str = "_frame";
pub const FRAME_EXTENSION: &str = "jpg";

/// Offset of a frame from the start of its source video, with millisecond
/// resolution.
///
/// Displays as `MM:SS:mmm`. Minutes are padded to two digits but are not
/// capped, so a two-hour video produces `120:00:000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameTimestamp(TimeDelta);

impl FrameTimestamp {
    pub fn from_millis(ms: u64) -> Self {
        Self(TimeDelta::milliseconds(ms.min(i64::MAX as u64) as i64))
    }

    /// Timestamp of the frame at `index` in a stream running at `fps`.
    /// Fractional milliseconds are truncated. `fps` must be finite and
    /// positive; the sampler rejects anything else before getting here.
    ///
    /// Computed as `floor(index * 1000 / fps)`. Dividing first,
    /// `(index / fps) * 1000`, picks up float error and lands 1 ms early on
    /// exact boundaries (15 fps, frame 125817: 8387799 instead of 8387800).
    pub fn at_frame(index: u64, fps: f64) -> Self {
        let ms = (index as f64 * 1000.0 / fps).floor();
        Self::from_millis(ms as u64)
    }

    pub fn as_millis(&self) -> u64 {
        self.0.num_milliseconds().max(0) as u64
    }
}

impl fmt::Display for FrameTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.as_millis();
        write!(
            f,
            "{:02}:{:02}:{:03}",
            ms / 60_000,
            (ms % 60_000) / 1000,
            ms % 1000
        )
    }
}

/// A frame that has been sampled from a source video and written to disk.
///
/// The timestamp travels with the frame, so nothing downstream has to
/// recover it from `file_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampledFrame {
    /// Index of the frame in the source stream.
    pub index: u64,
    pub timestamp: FrameTimestamp,
    pub file_name: String,
    pub path: PathBuf,
}

/// Derive the file-name prefix for frames sampled from `source`.
///
/// Takes the last path segment of a URL or filesystem path, ignoring any
/// query string or fragment, and replaces every `.` with `_`.
/// e.g. "https://cdn.example.com/uploads/clip.final.mp4?sig=abc" -> "clip_final_mp4"
pub fn source_prefix(source: &str) -> String {
    let without_query = source
        .split(['?', '#'])
        .next()
        .unwrap_or(source)
        .trim_end_matches(['/', '\\']);
    let base = without_query
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(without_query);
    if base.is_empty() {
        return "video".into();
    }
    base.replace('.', "_")
}

/// e.g. "clip_mp4_frame00:01:400.jpg"
pub fn frame_file_name(prefix: &str, timestamp: FrameTimestamp) -> String {
    format!("{prefix}{FRAME_MARKER}{timestamp}.{FRAME_EXTENSION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_at_thirty_fps() {
        assert_eq!(FrameTimestamp::at_frame(0, 30.0).to_string(), "00:00:000");
        assert_eq!(FrameTimestamp::at_frame(6, 30.0).to_string(), "00:00:200");
        assert_eq!(FrameTimestamp::at_frame(30, 30.0).to_string(), "00:01:000");
    }

    #[test]
    fn timestamp_truncates_fractional_millis() {
        // 1 / 29.97 s = 33.366... ms
        assert_eq!(FrameTimestamp::at_frame(1, 29.97).as_millis(), 33);
        // 7 / 24 s = 291.666... ms
        assert_eq!(FrameTimestamp::at_frame(7, 24.0).to_string(), "00:00:291");
    }

    #[test]
    fn timestamp_exact_on_millisecond_boundaries() {
        assert_eq!(FrameTimestamp::at_frame(125_817, 15.0).as_millis(), 8_387_800);
        assert_eq!(
            FrameTimestamp::at_frame(125_817, 15.0).to_string(),
            "139:47:800"
        );
    }

    #[test]
    fn timestamp_rolls_into_minutes() {
        let ts = FrameTimestamp::from_millis(61_005);
        assert_eq!(ts.to_string(), "01:01:005");
        let long = FrameTimestamp::from_millis(125 * 60_000 + 59_999);
        assert_eq!(long.to_string(), "125:59:999");
    }

    #[test]
    fn timestamps_order_by_offset() {
        let a = FrameTimestamp::from_millis(200);
        let b = FrameTimestamp::from_millis(60_000);
        assert!(a < b);
    }

    #[test]
    fn prefix_from_url_drops_query() {
        assert_eq!(
            source_prefix("https://cdn.example.com/uploads/clip.final.mp4?sig=abc#t=3"),
            "clip_final_mp4"
        );
    }

    #[test]
    fn prefix_from_path() {
        assert_eq!(source_prefix("/data/in/cooking.mov"), "cooking_mov");
        assert_eq!(source_prefix("relative.webm"), "relative_webm");
    }

    #[test]
    fn prefix_falls_back_when_empty() {
        assert_eq!(source_prefix(""), "video");
        assert_eq!(source_prefix("https://example.com/"), "example_com");
        assert_eq!(source_prefix("/"), "video");
    }

    #[test]
    fn file_name_format() {
        let name = frame_file_name("clip_mp4", FrameTimestamp::from_millis(1_400));
        assert_eq!(name, "clip_mp4_frame00:01:400.jpg");
    }
}
