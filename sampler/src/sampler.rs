use std::iter::FusedIterator;

use frame_relay_common::frame::FrameTimestamp;
use image::RgbImage;
use tracing::debug;

use crate::error::SampleError;
use crate::source::FrameSource;

/// Number of source frames between emitted samples:
/// `max(1, floor(fps / samples_per_second))`.
pub fn sampling_interval(fps: f64, samples_per_second: u32) -> Result<u64, SampleError> {
    if !fps.is_finite() || fps <= 0.0 {
        return Err(SampleError::InvalidInput(format!(
            "frame rate must be a positive number, got {fps}"
        )));
    }
    if samples_per_second == 0 {
        return Err(SampleError::InvalidInput(
            "samples per second must be at least 1".into(),
        ));
    }
    Ok(((fps / f64::from(samples_per_second)).floor() as u64).max(1))
}

/// A decoded frame selected by the sampler.
#[derive(Debug, Clone)]
pub struct Sample {
    pub index: u64,
    pub timestamp: FrameTimestamp,
    pub image: RgbImage,
}

/// Lazily walks a [`FrameSource`] and yields every `interval`-th frame,
/// starting with frame 0.
///
/// Ends with `None` when the source is exhausted. A source error is yielded
/// once and ends the iteration.
pub struct FrameSampler<S> {
    source: S,
    fps: f64,
    interval: u64,
    next_index: u64,
    done: bool,
}

impl<S: FrameSource> FrameSampler<S> {
    pub fn new(source: S, samples_per_second: u32) -> Result<Self, SampleError> {
        let fps = source.fps();
        let interval = sampling_interval(fps, samples_per_second)?;
        debug!(source = source.name(), fps, interval, "frame sampler ready");
        Ok(Self {
            source,
            fps,
            interval,
            next_index: 0,
            done: false,
        })
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Frames read from the source so far, sampled or not.
    pub fn frames_read(&self) -> u64 {
        self.next_index
    }
}

impl<S: FrameSource> Iterator for FrameSampler<S> {
    type Item = Result<Sample, SampleError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let image = match self.source.next_frame() {
                Ok(Some(image)) => image,
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            let index = self.next_index;
            self.next_index += 1;

            if index % self.interval == 0 {
                return Some(Ok(Sample {
                    index,
                    timestamp: FrameTimestamp::at_frame(index, self.fps),
                    image,
                }));
            }
        }
        None
    }
}

impl<S: FrameSource> FusedIterator for FrameSampler<S> {}
