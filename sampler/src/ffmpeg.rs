use std::io::{self, BufReader, Read};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};

use image::RgbImage;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::SampleError;
use crate::source::FrameSource;

/// Stream properties needed to read raw frames off an ffmpeg pipe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoProbe {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
}

/// Run ffprobe against the first video stream of `input`.
pub fn probe(ffprobe: &str, input: &str) -> Result<VideoProbe, SampleError> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,avg_frame_rate,r_frame_rate",
            "-of",
            "json",
        ])
        .arg(input)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| SampleError::io(format!("failed to run {ffprobe}"), e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SampleError::io(
            format!("{ffprobe} could not read {input}"),
            io::Error::other(stderr.trim().to_string()),
        ));
    }

    parse_probe(&output.stdout)
}

/// Parse ffprobe's JSON output. A zero frame rate is passed through; the
/// sampler decides what to do with it.
pub(crate) fn parse_probe(json: &[u8]) -> Result<VideoProbe, SampleError> {
    let parsed: ProbeOutput = serde_json::from_slice(json).map_err(|e| {
        SampleError::io(
            "malformed ffprobe output",
            io::Error::new(io::ErrorKind::InvalidData, e),
        )
    })?;

    let stream = parsed
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| SampleError::InvalidInput("source has no video stream".into()))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(SampleError::InvalidInput(
                "video stream reports no frame dimensions".into(),
            ))
        }
    };

    // avg_frame_rate is "0/0" for some containers; fall back to r_frame_rate.
    let fps = [stream.avg_frame_rate, stream.r_frame_rate]
        .into_iter()
        .flatten()
        .filter_map(|rate| parse_frame_rate(&rate))
        .find(|fps| *fps > 0.0)
        .unwrap_or(0.0);

    Ok(VideoProbe { width, height, fps })
}

/// Parse an ffmpeg rational ("30000/1001") or plain number ("25").
pub(crate) fn parse_frame_rate(rate: &str) -> Option<f64> {
    let value = match rate.trim().split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    value.is_finite().then_some(value)
}

/// Bytes of decoder stderr kept for error reports.
const STDERR_TAIL: usize = 8 * 1024;

/// Decodes a video with an ffmpeg subprocess and reads packed RGB24 frames
/// from its stdout, one `width * height * 3` chunk per frame.
pub struct FfmpegSource {
    name: String,
    probe: VideoProbe,
    child: Child,
    stdout: BufReader<ChildStdout>,
    /// Drains stderr so a chatty decoder never blocks on a full pipe.
    /// Yields the tail of what was written.
    stderr: Option<JoinHandle<String>>,
    frame_len: usize,
    finished: bool,
    frames_read: u64,
}

impl FfmpegSource {
    pub fn open(ffmpeg: &str, ffprobe: &str, input: &str) -> Result<Self, SampleError> {
        let probe = probe(ffprobe, input)?;

        let frame_len = (probe.width as usize)
            .checked_mul(probe.height as usize)
            .and_then(|px| px.checked_mul(3))
            .ok_or_else(|| {
                SampleError::InvalidInput(format!(
                    "frame size {}x{} is too large",
                    probe.width, probe.height
                ))
            })?;

        // -noautorotate keeps output dimensions equal to the probed ones.
        // passthrough disables frame duplication/dropping so pipe frame N is
        // source frame N.
        let mut child = Command::new(ffmpeg)
            .args(["-v", "error", "-nostdin", "-noautorotate", "-i"])
            .arg(input)
            .args([
                "-map", "0:v:0",
                "-an", "-sn",
                "-vsync", "passthrough",
                "-f", "rawvideo",
                "-pix_fmt", "rgb24",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SampleError::io(format!("failed to spawn {ffmpeg}"), e))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            SampleError::io(
                "ffmpeg decoder",
                io::Error::new(io::ErrorKind::BrokenPipe, "could not get stdout handle"),
            )
        })?;
        let stderr = match child.stderr.take().map(drain_stderr).transpose() {
            Ok(handle) => handle,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SampleError::io("failed to start ffmpeg stderr reader", e));
            }
        };

        debug!(
            input,
            width = probe.width,
            height = probe.height,
            fps = probe.fps,
            "ffmpeg decoder started"
        );

        Ok(Self {
            name: input.to_string(),
            probe,
            child,
            stdout: BufReader::with_capacity(frame_len.max(8192), stdout),
            stderr,
            frame_len,
            finished: false,
            frames_read: 0,
        })
    }

    pub fn probe(&self) -> VideoProbe {
        self.probe
    }

    /// Reap the decoder once its output is drained and surface a non-zero exit.
    fn finish(&mut self) -> Result<(), SampleError> {
        self.finished = true;
        let status = self
            .child
            .wait()
            .map_err(|e| SampleError::io("failed to wait for ffmpeg", e))?;
        let stderr = self.join_stderr();

        if !status.success() {
            return Err(SampleError::io(
                format!("ffmpeg exited with {status} while decoding {}", self.name),
                io::Error::other(stderr.trim().to_string()),
            ));
        }

        info!(input = self.name, frames = self.frames_read, "decoder reached end of stream");
        Ok(())
    }

    fn join_stderr(&mut self) -> String {
        self.stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }
}

fn drain_stderr(mut pipe: ChildStderr) -> io::Result<JoinHandle<String>> {
    thread::Builder::new()
        .name("ffmpeg-stderr".into())
        .spawn(move || {
            let mut tail = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                match pipe.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => {
                        tail.extend_from_slice(&chunk[..n]);
                        if tail.len() > STDERR_TAIL {
                            let excess = tail.len() - STDERR_TAIL;
                            tail.drain(..excess);
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
            String::from_utf8_lossy(&tail).into_owned()
        })
}

impl FrameSource for FfmpegSource {
    fn fps(&self) -> f64 {
        self.probe.fps
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>, SampleError> {
        if self.finished {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.frame_len];
        let mut filled = 0;
        while filled < self.frame_len {
            match self.stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.finished = true;
                    return Err(SampleError::io("failed to read frame from ffmpeg", e));
                }
            }
        }

        if filled == 0 {
            self.finish()?;
            return Ok(None);
        }
        if filled < self.frame_len {
            self.finished = true;
            return Err(SampleError::io(
                format!("truncated frame {} from {}", self.frames_read, self.name),
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("got {filled} of {} bytes", self.frame_len),
                ),
            ));
        }

        self.frames_read += 1;
        let image = RgbImage::from_raw(self.probe.width, self.probe.height, buf).ok_or_else(|| {
            SampleError::io(
                "ffmpeg decoder",
                io::Error::new(io::ErrorKind::InvalidData, "frame buffer size mismatch"),
            )
        })?;
        Ok(Some(image))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            if let Err(e) = self.child.kill() {
                warn!(error = %e, input = self.name, "failed to kill ffmpeg decoder");
            }
            let _ = self.child.wait();
        }
        self.join_stderr();
    }
}
