/// Terminal failure of a sampling run. Nothing sampled before the failure is
/// returned to the caller.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    /// Malformed frame rate, a source without a video stream, or an unusable
    /// sampler configuration.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Reading the source, decoding it, or writing a frame failed.
    #[error("{0}: {1}")]
    Io(String, #[source] std::io::Error),
}

impl SampleError {
    pub(crate) fn io(context: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io(context.into(), err)
    }
}
