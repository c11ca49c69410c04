// SPDX-License-Identifier: CEPL-1.0
//! Per-frame control flow: wait, acquire, record, submit, present.
//!
//! The driver owns no state between calls. Backends supply the GPU work
//! through [`FrameBackend`]; [`draw_frame`] decides ordering and which
//! failures are recoverable.
use std::fmt;
use tracing::{trace, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStage {
    Idle,
    Acquiring,
    ResettingFence,
    Recording,
    Submitted,
    Presenting,
    Recreating,
}

impl fmt::Display for FrameStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FrameStage::Idle => "waiting for the previous frame",
            FrameStage::Acquiring => "acquiring an image",
            FrameStage::ResettingFence => "resetting the frame fence",
            FrameStage::Recording => "recording commands",
            FrameStage::Submitted => "submitting",
            FrameStage::Presenting => "presenting",
            FrameStage::Recreating => "recreating the swapchain",
        })
    }
}

/// Result of asking the swapchain for the next image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquired {
    Image(u32),
    /// Usable this frame, but the swapchain no longer matches the surface.
    Suboptimal(u32),
    /// The swapchain cannot be presented to anymore.
    Stale,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presented {
    Done,
    /// Out of date or suboptimal; the swapchain must be rebuilt.
    Stale,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented { image: u32 },
    PresentedThenRecreated { image: u32 },
    /// Acquire reported a stale swapchain; nothing was submitted.
    Recreated,
}

#[derive(Debug, thiserror::Error)]
#[error("frame failed while {stage}")]
pub struct FrameError<E: std::error::Error + 'static> {
    pub stage: FrameStage,
    #[source]
    pub source: E,
}

pub trait FrameBackend {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Blocks until the in-flight fence is signaled.
    fn wait_for_previous_frame(&mut self) -> Result<(), Self::Error>;
    fn acquire_image(&mut self) -> Result<Acquired, Self::Error>;
    fn reset_frame_fence(&mut self) -> Result<(), Self::Error>;
    fn record(&mut self, image: u32) -> Result<(), Self::Error>;
    fn submit(&mut self, image: u32) -> Result<(), Self::Error>;
    fn present(&mut self, image: u32) -> Result<Presented, Self::Error>;
    fn recreate(&mut self) -> Result<(), Self::Error>;
}

fn at<E: std::error::Error + 'static>(stage: FrameStage) -> impl FnOnce(E) -> FrameError<E> {
    move |source| FrameError { stage, source }
}

/// Draws one frame.
///
/// The fence is reset only once an image has been acquired, so a stale
/// acquire leaves it signaled and the next call does not block forever.
/// A suboptimal acquire is not aborted; the frame still goes out and the
/// swapchain is recreated after the present.
pub fn draw_frame<B: FrameBackend + ?Sized>(
    backend: &mut B,
) -> Result<FrameOutcome, FrameError<B::Error>> {
    backend
        .wait_for_previous_frame()
        .map_err(at(FrameStage::Idle))?;

    let (image, suboptimal) = match backend.acquire_image().map_err(at(FrameStage::Acquiring))? {
        Acquired::Image(i) => (i, false),
        Acquired::Suboptimal(i) => (i, true),
        Acquired::Stale => {
            warn!("swapchain out of date at acquire, recreating");
            backend.recreate().map_err(at(FrameStage::Recreating))?;
            return Ok(FrameOutcome::Recreated);
        }
    };
    backend
        .reset_frame_fence()
        .map_err(at(FrameStage::ResettingFence))?;
    trace!("acquired image {image}");

    backend.record(image).map_err(at(FrameStage::Recording))?;
    backend.submit(image).map_err(at(FrameStage::Submitted))?;
    let presented = backend
        .present(image)
        .map_err(at(FrameStage::Presenting))?;

    if suboptimal || presented == Presented::Stale {
        warn!("swapchain suboptimal after present, recreating");
        backend.recreate().map_err(at(FrameStage::Recreating))?;
        return Ok(FrameOutcome::PresentedThenRecreated { image });
    }
    Ok(FrameOutcome::Presented { image })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("injected failure in {0}")]
    struct Injected(&'static str);

    struct Scripted {
        acquire: Acquired,
        present: Presented,
        fail_at: Option<&'static str>,
        calls: Vec<String>,
    }

    impl Scripted {
        fn new(acquire: Acquired) -> Self {
            Self {
                acquire,
                present: Presented::Done,
                fail_at: None,
                calls: Vec::new(),
            }
        }

        fn step(&mut self, name: &'static str) -> Result<(), Injected> {
            self.calls.push(name.to_string());
            if self.fail_at == Some(name) {
                Err(Injected(name))
            } else {
                Ok(())
            }
        }
    }

    impl FrameBackend for Scripted {
        type Error = Injected;

        fn wait_for_previous_frame(&mut self) -> Result<(), Injected> {
            self.step("wait")
        }
        fn acquire_image(&mut self) -> Result<Acquired, Injected> {
            self.step("acquire").map(|_| self.acquire)
        }
        fn reset_frame_fence(&mut self) -> Result<(), Injected> {
            self.step("reset")
        }
        fn record(&mut self, image: u32) -> Result<(), Injected> {
            self.calls.push(format!("record {image}"));
            match self.fail_at {
                Some("record") => Err(Injected("record")),
                _ => Ok(()),
            }
        }
        fn submit(&mut self, _image: u32) -> Result<(), Injected> {
            self.step("submit")
        }
        fn present(&mut self, _image: u32) -> Result<Presented, Injected> {
            self.step("present").map(|_| self.present)
        }
        fn recreate(&mut self) -> Result<(), Injected> {
            self.step("recreate")
        }
    }

    #[test]
    fn first_frame_submits_once_and_presents() {
        let mut b = Scripted::new(Acquired::Image(2));
        let out = draw_frame(&mut b).unwrap();
        assert_eq!(out, FrameOutcome::Presented { image: 2 });
        assert_eq!(
            b.calls,
            ["wait", "acquire", "reset", "record 2", "submit", "present"]
        );
    }

    #[test]
    fn stale_acquire_skips_the_frame_and_keeps_the_fence() {
        let mut b = Scripted::new(Acquired::Stale);
        let out = draw_frame(&mut b).unwrap();
        assert_eq!(out, FrameOutcome::Recreated);
        assert_eq!(b.calls, ["wait", "acquire", "recreate"]);
    }

    #[test]
    fn suboptimal_acquire_finishes_then_recreates() {
        let mut b = Scripted::new(Acquired::Suboptimal(0));
        let out = draw_frame(&mut b).unwrap();
        assert_eq!(out, FrameOutcome::PresentedThenRecreated { image: 0 });
        assert_eq!(b.calls.last().map(String::as_str), Some("recreate"));
        assert!(b.calls.iter().any(|c| c == "submit"));
    }

    #[test]
    fn stale_present_schedules_recreation() {
        let mut b = Scripted::new(Acquired::Image(1));
        b.present = Presented::Stale;
        let out = draw_frame(&mut b).unwrap();
        assert_eq!(out, FrameOutcome::PresentedThenRecreated { image: 1 });
    }

    #[test]
    fn submit_failure_is_reported_with_stage() {
        let mut b = Scripted::new(Acquired::Image(0));
        b.fail_at = Some("submit");
        let err = draw_frame(&mut b).unwrap_err();
        assert_eq!(err.stage, FrameStage::Submitted);
        assert!(!b.calls.iter().any(|c| c == "present"));
    }

    #[test]
    fn record_failure_never_submits() {
        let mut b = Scripted::new(Acquired::Image(0));
        b.fail_at = Some("record");
        let err = draw_frame(&mut b).unwrap_err();
        assert_eq!(err.stage, FrameStage::Recording);
        assert!(!b.calls.iter().any(|c| c == "submit"));
        assert!(b.calls.iter().any(|c| c == "record 0"));
    }

    #[test]
    fn present_and_recreate_failures_carry_their_stage() {
        let mut b = Scripted::new(Acquired::Image(0));
        b.fail_at = Some("present");
        assert_eq!(draw_frame(&mut b).unwrap_err().stage, FrameStage::Presenting);

        let mut b = Scripted::new(Acquired::Stale);
        b.fail_at = Some("recreate");
        let err = draw_frame(&mut b).unwrap_err();
        assert_eq!(err.stage, FrameStage::Recreating);
        assert_eq!(err.to_string(), "frame failed while recreating the swapchain");
    }

    #[test]
    fn fence_reset_failure_is_not_blamed_on_acquire() {
        let mut b = Scripted::new(Acquired::Image(1));
        b.fail_at = Some("reset");
        let err = draw_frame(&mut b).unwrap_err();
        assert_eq!(err.stage, FrameStage::ResettingFence);
        assert_eq!(err.to_string(), "frame failed while resetting the frame fence");
        assert_eq!(b.calls, ["wait", "acquire", "reset"]);
    }

    #[test]
    fn fence_wait_failure_stops_before_acquire() {
        let mut b = Scripted::new(Acquired::Image(0));
        b.fail_at = Some("wait");
        assert_eq!(draw_frame(&mut b).unwrap_err().stage, FrameStage::Idle);
        assert_eq!(b.calls, ["wait"]);
    }
}
