use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use frame_relay_common::frame::{frame_file_name, SampledFrame};
use image::codecs::jpeg::JpegEncoder;
use image::ImageError;
use tracing::{debug, info};

use crate::error::SampleError;
use crate::sampler::Sample;

/// Clear `dir` if it exists and create it again, empty.
pub fn prepare_output_dir(dir: &Path) -> Result<(), SampleError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => info!(dir = %dir.display(), "cleared existing frame directory"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(SampleError::io(
                format!("failed to clear {}", dir.display()),
                e,
            ))
        }
    }
    fs::create_dir_all(dir)
        .map_err(|e| SampleError::io(format!("failed to create {}", dir.display()), e))
}

/// Encodes samples as JPEG files named `<prefix>_frame<MM:SS:mmm>.jpg`.
pub struct FrameWriter {
    dir: PathBuf,
    prefix: String,
    quality: u8,
}

impl FrameWriter {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, quality: u8) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            quality,
        }
    }

    pub fn write(&self, sample: &Sample) -> Result<SampledFrame, SampleError> {
        let file_name = frame_file_name(&self.prefix, sample.timestamp);
        let path = self.dir.join(&file_name);

        let file = File::create(&path)
            .map_err(|e| SampleError::io(format!("failed to create {}", path.display()), e))?;
        let mut out = BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut out, self.quality)
            .encode_image(&sample.image)
            .map_err(|e| {
                SampleError::io(format!("failed to encode {}", path.display()), into_io(e))
            })?;
        out.flush()
            .map_err(|e| SampleError::io(format!("failed to write {}", path.display()), e))?;

        debug!(
            index = sample.index,
            timestamp = %sample.timestamp,
            file = file_name,
            "wrote frame"
        );

        Ok(SampledFrame {
            index: sample.index,
            timestamp: sample.timestamp,
            file_name,
            path,
        })
    }
}

fn into_io(err: ImageError) -> io::Error {
    match err {
        ImageError::IoError(e) => e,
        other => io::Error::other(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frame_relay_common::frame::FrameTimestamp;
    use image::{Rgb, RgbImage};

    fn sample(index: u64, ms: u64) -> Sample {
        Sample {
            index,
            timestamp: FrameTimestamp::from_millis(ms),
            image: RgbImage::from_pixel(16, 8, Rgb([200, 10, 10])),
        }
    }

    #[test]
    fn prepare_creates_missing_nested_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("a").join("frames");
        prepare_output_dir(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn prepare_clears_previous_run() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("frames");
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("old_frame00:00:000.jpg"), b"stale").unwrap();

        prepare_output_dir(&dir).unwrap();

        assert!(dir.is_dir());
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn prepare_fails_when_path_is_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("frames");
        fs::write(&file, b"not a dir").unwrap();
        assert!(matches!(
            prepare_output_dir(&file),
            Err(SampleError::Io(..))
        ));
    }

    #[test]
    fn writes_decodable_jpeg_with_record() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = FrameWriter::new(tmp.path(), "clip_mp4", 90);

        let frame = writer.write(&sample(6, 200)).unwrap();

        assert_eq!(frame.index, 6);
        assert_eq!(frame.timestamp.as_millis(), 200);
        assert_eq!(frame.file_name, "clip_mp4_frame00:00:200.jpg");
        assert_eq!(frame.path, tmp.path().join("clip_mp4_frame00:00:200.jpg"));

        let decoded = image::open(&frame.path).unwrap();
        assert_eq!(decoded.width(), 16);
        assert_eq!(decoded.height(), 8);
    }

    #[test]
    fn write_into_missing_dir_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = FrameWriter::new(tmp.path().join("gone"), "clip", 90);
        assert!(matches!(writer.write(&sample(0, 0)), Err(SampleError::Io(..))));
    }
}
