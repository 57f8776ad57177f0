use super::convert::ConvertedFrameBuffer;
use super::types::PlaneRef;
use log::trace;
use playback_types::{PlaybackError, PlaybackErrorKind};
use std::thread;
use std::time::Duration;

/// A fixed-size drawable the presenter pushes image planes into.
pub trait PresentationSurface {
    /// Pixel size fixed at creation.
    fn size(&self) -> (u32, u32);

    fn update_planes(&mut self, planes: &[PlaneRef<'_>]) -> Result<(), PlaybackError>;

    fn redraw(&mut self) -> Result<(), PlaybackError>;

    /// Processes pending surface events and reports whether the user closed it.
    fn poll_closed(&mut self) -> bool {
        false
    }
}

/// Fixed inter-frame delay. It ignores stream timestamps, so variable frame
/// rate content drifts from real time.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    interval: Duration,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn wait(&self) {
        if !self.interval.is_zero() {
            thread::sleep(self.interval);
        }
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(Duration::from_millis(40))
    }
}

pub struct Presenter<S> {
    surface: S,
    pacer: Pacer,
    presented: u64,
}

impl<S: PresentationSurface> Presenter<S> {
    pub fn new(surface: S, pacer: Pacer) -> Self {
        Self {
            surface,
            pacer,
            presented: 0,
        }
    }

    /// Pushes the converted planes, redraws, then blocks for the pacing
    /// interval.
    pub fn present(&mut self, frame: &ConvertedFrameBuffer) -> Result<(), PlaybackError> {
        let (width, height) = self.surface.size();
        if (frame.width(), frame.height()) != (width, height) {
            return Err(PlaybackError::new(
                PlaybackErrorKind::Presentation,
                format!(
                    "frame is {}x{} but the surface is {}x{}",
                    frame.width(),
                    frame.height(),
                    width,
                    height
                ),
            ));
        }

        self.surface.update_planes(&frame.planes())?;
        self.surface.redraw()?;
        self.presented += 1;
        trace!("Presented frame {}", self.presented);

        self.pacer.wait();
        Ok(())
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}
