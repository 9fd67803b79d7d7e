use image::RgbImage;

use crate::error::SampleError;

/// A decodable video stream, read front to back one frame at a time.
///
/// Implementations own whatever decoder sits behind the stream. The sampler
/// only needs the container's frame rate and the decoded frames in order.
pub trait FrameSource {
    /// Frames per second as reported by the source. May be zero or otherwise
    /// nonsensical for broken inputs; the sampler validates it.
    fn fps(&self) -> f64;

    /// Returns the next decoded frame, or `None` once the stream is exhausted.
    /// An error is terminal: callers must not keep reading after one.
    fn next_frame(&mut self) -> Result<Option<RgbImage>, SampleError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn fps(&self) -> f64 {
        (**self).fps()
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>, SampleError> {
        (**self).next_frame()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[cfg(test)]
pub(crate) mod synthetic {
    use super::*;
    use image::Rgb;

    /// In-memory source producing `total` solid-colour frames. Each frame's red
    /// channel carries its index (mod 256) so tests can tell frames apart.
    pub struct SyntheticSource {
        pub fps: f64,
        pub total: u64,
        pub width: u32,
        pub height: u32,
        /// Fail with an I/O error instead of producing this frame index.
        pub fail_at: Option<u64>,
        produced: u64,
    }

    impl SyntheticSource {
        pub fn new(fps: f64, total: u64) -> Self {
            Self {
                fps,
                total,
                width: 8,
                height: 4,
                fail_at: None,
                produced: 0,
            }
        }

        pub fn failing_at(mut self, index: u64) -> Self {
            self.fail_at = Some(index);
            self
        }
    }

    impl FrameSource for SyntheticSource {
        fn fps(&self) -> f64 {
            self.fps
        }

        fn next_frame(&mut self) -> Result<Option<RgbImage>, SampleError> {
            if self.fail_at == Some(self.produced) {
                return Err(SampleError::Io(
                    format!("synthetic read failure at frame {}", self.produced),
                    std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated"),
                ));
            }
            if self.produced >= self.total {
                return Ok(None);
            }
            let shade = (self.produced % 256) as u8;
            self.produced += 1;
            Ok(Some(RgbImage::from_pixel(
                self.width,
                self.height,
                Rgb([shade, 64, 128]),
            )))
        }

        fn name(&self) -> &str {
            "synthetic"
        }
    }
}
