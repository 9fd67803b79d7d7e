pub mod error;
pub mod ffmpeg;
pub mod output;
pub mod sampler;
pub mod source;

use frame_relay_common::config::SamplerConfig;
use frame_relay_common::frame::SampledFrame;
use tracing::info;

pub use error::SampleError;
pub use ffmpeg::FfmpegSource;
pub use output::{prepare_output_dir, FrameWriter};
pub use sampler::{sampling_interval, FrameSampler, Sample};
pub use source::FrameSource;

/// Sample `source` into `config.output_dir` and return the written frames in
/// stream order.
///
/// The frame rate is validated before the output directory is touched. The
/// directory is then recreated, so a run never sees a previous run's files.
/// On error the frames written so far are left on disk but not returned.
pub fn sample_to_dir<S: FrameSource>(
    source: S,
    config: &SamplerConfig,
    prefix: &str,
) -> Result<Vec<SampledFrame>, SampleError> {
    let mut sampler = FrameSampler::new(source, config.samples_per_second)?;
    prepare_output_dir(&config.output_dir)?;
    let writer = FrameWriter::new(&config.output_dir, prefix, config.jpeg_quality);

    info!(
        prefix,
        fps = sampler.fps(),
        interval = sampler.interval(),
        samples_per_second = config.samples_per_second,
        output_dir = %config.output_dir.display(),
        "extracting frames"
    );

    let frames = sampler
        .by_ref()
        .map(|sample| sample.and_then(|s| writer.write(&s)))
        .collect::<Result<Vec<_>, _>>()?;

    info!(
        prefix,
        frames_read = sampler.frames_read(),
        frames_written = frames.len(),
        "frame extraction complete"
    );
    Ok(frames)
}

/// Decode `input` (a local path or any URL ffmpeg can open) with ffmpeg and
/// sample it into `config.output_dir`.
pub fn sample_video(
    input: &str,
    prefix: &str,
    config: &SamplerConfig,
) -> Result<Vec<SampledFrame>, SampleError> {
    let source = FfmpegSource::open(&config.ffmpeg_path, &config.ffprobe_path, input)?;
    sample_to_dir(source, config, prefix)
}
