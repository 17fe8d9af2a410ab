use crate::error::Result;
use crate::ingest::FrameSource;

/// A started frame source that is stopped when the guard goes out of scope.
pub struct CaptureGuard<S: FrameSource> {
    source: S,
}

impl<S: FrameSource> CaptureGuard<S> {
    /// Starts `source`. On failure the source is stopped before returning.
    pub fn acquire(mut source: S) -> Result<Self> {
        if let Err(err) = source.start() {
            source.stop();
            return Err(err);
        }
        log::debug!("CaptureGuard: acquired {}", source.name());
        Ok(Self { source })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: FrameSource> Drop for CaptureGuard<S> {
    fn drop(&mut self) {
        self.source.stop();
        log::debug!("CaptureGuard: released {}", self.source.name());
    }
}
