//! Video frame sources.
//!
//! Decoding is delegated to `ffprobe`/`ffmpeg` subprocesses: the stream is
//! probed once for its geometry and frame rate, then `ffmpeg` writes packed
//! `rgb24` frames to a pipe that is read one frame at a time.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use serde::Deserialize;

use crate::convert::RawFrame;
use crate::error::{PlayerError, Result};

/// Frame rate assumed when the container does not report a usable one.
pub const FALLBACK_FRAME_RATE: f64 = 25.0;

/// Stream properties reported once when a source is opened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    /// Native frames per second.
    pub frame_rate: f64,
    /// Total number of frames, when the container knows it.
    pub frame_count: Option<u64>,
}

/// Something that yields decoded frames in presentation order.
pub trait FrameSource {
    fn info(&self) -> SourceInfo;

    /// Next frame, or `Ok(None)` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<RawFrame>>;
}

/// Frame source backed by an `ffmpeg` child process.
///
/// The child is killed and reaped when the source is dropped.
pub struct FfmpegSource {
    path: PathBuf,
    info: SourceInfo,
    child: Child,
    stdout: ChildStdout,
    frame_len: usize,
    finished: bool,
}

impl FfmpegSource {
    /// Probe `path` and start decoding it.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(PlayerError::unavailable(path, "file does not exist"));
        }

        let info = probe(path)?;
        let mut child = spawn_decoder(path, &info)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PlayerError::unavailable(path, "ffmpeg stdout not captured"))?;

        let frame_len = info.width as usize * info.height as usize * 3;
        log::info!(
            "opened {}: {}x{} @ {:.3}fps, {} frames",
            path.display(),
            info.width,
            info.height,
            info.frame_rate,
            info.frame_count
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );

        Ok(Self {
            path: path.to_path_buf(),
            info,
            child,
            stdout,
            frame_len,
            finished: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        if self.finished {
            return Ok(None);
        }
        let mut buf = vec![0u8; self.frame_len];
        if !read_exact_or_eof(&mut self.stdout, &mut buf)? {
            self.finished = true;
            log::debug!("end of stream for {}", self.path.display());
            return Ok(None);
        }
        RawFrame::from_rgb24(self.info.width, self.info.height, buf)
            .map(Some)
            .ok_or_else(|| PlayerError::Decode("frame size does not match stream".to_string()))
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Read exactly `buf.len()` bytes. `Ok(false)` means the stream ended first;
/// a trailing partial frame is discarded.
pub fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool> {
    let mut total = 0usize;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => return Ok(false),
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(PlayerError::Decode(e.to_string())),
        }
    }
    Ok(true)
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
    tags: Option<ProbeTags>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

fn probe(path: &Path) -> Result<SourceInfo> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate,avg_frame_rate,nb_frames,duration\
             :stream_side_data=rotation:stream_tags=rotate:format=duration",
            "-of",
            "json",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| PlayerError::unavailable(path, format!("running ffprobe: {}", e)))?;

    if !output.status.success() {
        return Err(PlayerError::unavailable(path, "ffprobe could not read the file"));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    parse_probe(&text).map_err(|reason| PlayerError::unavailable(path, reason))
}

/// Turn `ffprobe -of json` output into [`SourceInfo`].
fn parse_probe(json: &str) -> std::result::Result<SourceInfo, String> {
    let parsed: ProbeOutput =
        serde_json::from_str(json).map_err(|e| format!("parsing ffprobe output: {}", e))?;
    let stream = parsed
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| "no video stream found".to_string())?;

    let coded_width = stream.width.unwrap_or(0);
    let coded_height = stream.height.unwrap_or(0);
    if coded_width == 0 || coded_height == 0 {
        return Err("video stream has no dimensions".to_string());
    }

    // ffmpeg autorotates, so a quarter turn arrives as a transposed frame.
    let rotation = stream_rotation(&stream);
    let (width, height) = if rotation % 180 == 90 {
        log::debug!("stream rotated {} degrees, swapping dimensions", rotation);
        (coded_height, coded_width)
    } else {
        (coded_width, coded_height)
    };

    let frame_rate = [stream.r_frame_rate.as_deref(), stream.avg_frame_rate.as_deref()]
        .into_iter()
        .flatten()
        .filter_map(parse_rate)
        .next()
        .unwrap_or_else(|| {
            log::warn!("no frame rate reported, assuming {}", FALLBACK_FRAME_RATE);
            FALLBACK_FRAME_RATE
        });

    let duration = stream
        .duration
        .as_deref()
        .or(parsed.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);

    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.trim().parse::<u64>().ok())
        .filter(|n| *n > 0)
        .or_else(|| duration.map(|d| (d * frame_rate).round() as u64));

    Ok(SourceInfo {
        width,
        height,
        frame_rate,
        frame_count,
    })
}

/// Display rotation in whole degrees, normalized to `0..360`.
fn stream_rotation(stream: &ProbeStream) -> i64 {
    let degrees = stream
        .side_data_list
        .iter()
        .find_map(|side| side.rotation)
        .or_else(|| {
            stream
                .tags
                .as_ref()
                .and_then(|t| t.rotate.as_deref())
                .and_then(|r| r.trim().parse::<f64>().ok())
        })
        .filter(|r| r.is_finite())
        .unwrap_or(0.0);
    (degrees.round() as i64).rem_euclid(360)
}

/// Parse `"30000/1001"` or `"25"`. Zero or malformed rates yield `None`.
fn parse_rate(s: &str) -> Option<f64> {
    let s = s.trim();
    let rate = match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => s.parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// Output geometry is pinned to the probed display size so every frame read
/// from the pipe matches `info`.
fn spawn_decoder(path: &Path, info: &SourceInfo) -> Result<Child> {
    let scale_filter = format!("scale={}:{}", info.width, info.height);
    Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-i"])
        .arg(path)
        .args(["-an", "-vf", scale_filter.as_str()])
        .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| PlayerError::unavailable(path, format!("running ffmpeg: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_integer_rate() {
        let json = r#"{
            "streams": [{"width": 640, "height": 360, "r_frame_rate": "30/1",
                         "avg_frame_rate": "30/1", "nb_frames": "900"}],
            "format": {"duration": "30.000000"}
        }"#;
        let info = parse_probe(json).unwrap();
        assert_eq!(info.width, 640);
        assert_eq!(info.height, 360);
        assert_eq!(info.frame_rate, 30.0);
        assert_eq!(info.frame_count, Some(900));
    }

    #[test]
    fn test_parse_probe_ntsc_rate_and_duration_fallback() {
        let json = r#"{
            "streams": [{"width": 1920, "height": 1080, "r_frame_rate": "30000/1001"}],
            "format": {"duration": "10.010000"}
        }"#;
        let info = parse_probe(json).unwrap();
        assert!((info.frame_rate - 29.97).abs() < 0.01);
        assert_eq!(info.frame_count, Some(300));
    }

    #[test]
    fn test_parse_probe_missing_rate_uses_fallback() {
        let json = r#"{"streams": [{"width": 10, "height": 10, "r_frame_rate": "0/0"}]}"#;
        let info = parse_probe(json).unwrap();
        assert_eq!(info.frame_rate, FALLBACK_FRAME_RATE);
        assert_eq!(info.frame_count, None);
    }

    #[test]
    fn test_parse_probe_rejects_streamless_output() {
        assert!(parse_probe(r#"{"streams": []}"#).is_err());
        assert!(parse_probe(r#"{}"#).is_err());
        assert!(parse_probe("not json").is_err());
    }

    #[test]
    fn test_parse_probe_rejects_zero_dimensions() {
        let json = r#"{"streams": [{"width": 0, "height": 480, "r_frame_rate": "25/1"}]}"#;
        assert!(parse_probe(json).is_err());
    }

    #[test]
    fn test_parse_probe_swaps_dimensions_for_rotated_stream() {
        let json = r#"{
            "streams": [{"width": 4, "height": 2, "r_frame_rate": "30/1",
                         "side_data_list": [{"rotation": -90}]}]
        }"#;
        let info = parse_probe(json).unwrap();
        assert_eq!((info.width, info.height), (2, 4));

        // ffmpeg delivers the upright 2x4 frame: left column black, right white.
        let mut data = Vec::new();
        for _ in 0..4 {
            data.extend_from_slice(&[0, 0, 0, 255, 255, 255]);
        }
        let frame = RawFrame::from_rgb24(info.width, info.height, data).unwrap();
        let text = crate::convert::convert(&frame, 2, 4).unwrap();
        assert_eq!(text.rows(), ["@ ", "@ ", "@ ", "@ "]);
    }

    #[test]
    fn test_parse_probe_rotation_sources() {
        let legacy_tag = r#"{"streams": [{"width": 1920, "height": 1080,
            "r_frame_rate": "25/1", "tags": {"rotate": "270"}}]}"#;
        let info = parse_probe(legacy_tag).unwrap();
        assert_eq!((info.width, info.height), (1080, 1920));

        let upside_down = r#"{"streams": [{"width": 1920, "height": 1080,
            "r_frame_rate": "25/1", "side_data_list": [{"rotation": 180}]}]}"#;
        let info = parse_probe(upside_down).unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));

        let other_side_data = r#"{"streams": [{"width": 640, "height": 480,
            "r_frame_rate": "25/1", "side_data_list": [{}]}]}"#;
        let info = parse_probe(other_side_data).unwrap();
        assert_eq!((info.width, info.height), (640, 480));
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("25"), Some(25.0));
        assert_eq!(parse_rate("24000/1001").map(|r| (r * 1000.0).round()), Some(23976.0));
        assert_eq!(parse_rate("0/0"), None);
        assert_eq!(parse_rate("abc"), None);
        assert_eq!(parse_rate("-5"), None);
    }

    #[test]
    fn test_read_exact_or_eof() {
        let mut full = std::io::Cursor::new(vec![1u8, 2, 3, 4, 5, 6]);
        let mut buf = [0u8; 3];
        assert!(read_exact_or_eof(&mut full, &mut buf).unwrap());
        assert_eq!(buf, [1, 2, 3]);
        assert!(read_exact_or_eof(&mut full, &mut buf).unwrap());
        assert!(!read_exact_or_eof(&mut full, &mut buf).unwrap());

        let mut partial = std::io::Cursor::new(vec![9u8, 9]);
        assert!(!read_exact_or_eof(&mut partial, &mut buf).unwrap());
    }

    #[test]
    fn test_open_missing_file_is_unavailable() {
        let result = FfmpegSource::open(Path::new("/definitely/not/here.mp4"));
        assert!(matches!(
            result,
            Err(PlayerError::SourceUnavailable { .. })
        ));
    }
}
