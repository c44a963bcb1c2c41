/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! The load/save driver
//!
//! A driver sequences the codec entry points for one operation:
//!
//! ```text
//! start -> seek_next_frame -> (alloc pixels) -> load_frame -> ... -> finish
//! ```
//!
//! Whatever happens, `finish` runs exactly once per successful init: on
//! the happy path, when the codec reports an error, when the stream runs
//! out of frames, and as a drop backstop when the caller walks away mid
//! sequence.
//!
//! A driver is not thread safe and serves a single operation; concurrent
//! work needs one driver per operation.

use std::rc::Rc;

use log::{error, trace, warn};

use marlin_core::errors::MarlinError;
use marlin_core::io::IoStream;
use marlin_core::options::{LoadOptions, SaveOptions};

use crate::codec::{CodecLoadState, CodecSaveState};
use crate::context;
use crate::image::Image;
use crate::registry::CodecDescriptor;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Stage {
    /// Between frames, ready to seek
    Initialized,
    /// A frame header was produced, its pixels are pending
    FrameHeader,
    /// `finish` has run, the driver is spent
    Finished
}

/// Drives one load operation over one stream.
pub struct LoadDriver<'io> {
    descriptor: Rc<CodecDescriptor>,
    state:      Option<Box<dyn CodecLoadState + 'io>>,
    stage:      Stage
}

impl<'io> LoadDriver<'io> {
    /// Bind the codec and initialize a load over `io`.
    ///
    /// The stream must outlive the driver and stays open afterwards,
    /// closing it is the caller's business.
    pub fn start(
        io: &'io mut dyn IoStream, descriptor: Rc<CodecDescriptor>, options: &LoadOptions
    ) -> Result<LoadDriver<'io>, MarlinError> {
        let layout = descriptor.bind()?;
        let load_init = layout
            .load_init
            .ok_or(MarlinError::MissingEntryPoint("load_init"))?;

        trace!("Starting load with codec '{}'", descriptor.name());

        let state = load_init(io, options)?;

        Ok(LoadDriver {
            descriptor,
            state: Some(state),
            stage: Stage::Initialized
        })
    }

    /// Codec behind this driver.
    pub fn descriptor(&self) -> &Rc<CodecDescriptor> {
        &self.descriptor
    }

    /// Seek to the next frame and return its image with pixels
    /// allocated but not yet decoded.
    ///
    /// Returns `Ok(None)` past the last frame, after which the driver
    /// is finished. Calling this again without
    /// [`read_frame`](Self::read_frame) skips the pending frame, which
    /// only codecs that can seek past pixel data support.
    pub fn next_frame_header(&mut self) -> Result<Option<Image>, MarlinError> {
        if self.stage == Stage::Finished {
            return Ok(None);
        }
        if self.stage == Stage::FrameHeader {
            trace!("{}: skipping a pending frame", self.tag());
        }

        let result = self
            .state
            .as_mut()
            .expect("driver state outlives the finished stage")
            .seek_next_frame();

        match result {
            Ok(mut image) => {
                image.alloc_pixels()?;
                self.stage = Stage::FrameHeader;
                Ok(Some(image))
            }
            Err(MarlinError::NoMoreFrames) => {
                self.stop()?;
                Ok(None)
            }
            Err(err) => Err(self.fail("seek_next_frame", err))
        }
    }

    /// Decode pixels into the image returned by the last
    /// [`next_frame_header`](Self::next_frame_header) call.
    pub fn read_frame(&mut self, image: &mut Image) -> Result<(), MarlinError> {
        if self.stage != Stage::FrameHeader {
            return Err(MarlinError::InvalidArgument(
                "read_frame needs a pending frame header"
            ));
        }

        let result = self
            .state
            .as_mut()
            .expect("driver state outlives the finished stage")
            .load_frame(image);

        match result {
            Ok(()) => {
                self.stage = Stage::Initialized;
                Ok(())
            }
            Err(err) => Err(self.fail("load_frame", err))
        }
    }

    /// Produce the next fully decoded frame, or `None` at the end of
    /// the sequence.
    pub fn next_frame(&mut self) -> Result<Option<Image>, MarlinError> {
        match self.next_frame_header()? {
            Some(mut image) => {
                self.read_frame(&mut image)?;
                Ok(Some(image))
            }
            None => Ok(None)
        }
    }

    /// Read the first frame's header and finish, without touching
    /// pixel data.
    ///
    /// This is the cheap "what is in this file" operation; the returned
    /// image is a skeleton.
    pub fn probe(mut self) -> Result<Image, MarlinError> {
        if self.stage != Stage::Initialized {
            return Err(MarlinError::InvalidArgument(
                "probe wants a freshly started driver"
            ));
        }

        let result = self
            .state
            .as_mut()
            .expect("driver state outlives the finished stage")
            .seek_next_frame();

        match result {
            Ok(image) => {
                self.stop()?;
                Ok(image)
            }
            Err(err) => Err(self.fail("seek_next_frame", err))
        }
    }

    /// Stop loading and run the codec's `finish`. Idempotent.
    pub fn stop(&mut self) -> Result<(), MarlinError> {
        self.stage = Stage::Finished;

        match self.state.take() {
            Some(mut state) => state.finish(),
            None => Ok(())
        }
    }

    fn tag(&self) -> String {
        self.descriptor.name().to_uppercase()
    }

    /// Log a codec failure, run `finish`, and hand the original error
    /// back for propagation.
    fn fail(&mut self, operation: &str, err: MarlinError) -> MarlinError {
        let detail = format!("{}: {operation} failed: {err:?}", self.tag());

        error!("{}", detail.trim_end());
        context::record_error(detail);

        self.stage = Stage::Finished;
        if let Some(mut state) = self.state.take() {
            if let Err(finish_err) = state.finish() {
                warn!("{}: finish after a failure also failed: {finish_err:?}", self.tag());
            }
        }
        err
    }
}

impl Drop for LoadDriver<'_> {
    fn drop(&mut self) {
        if let Some(mut state) = self.state.take() {
            if let Err(err) = state.finish() {
                warn!("{}: finish on drop failed: {err:?}", self.tag());
            }
        }
    }
}

/// Drives one save operation over one stream.
pub struct SaveDriver<'io> {
    descriptor: Rc<CodecDescriptor>,
    state:      Option<Box<dyn CodecSaveState + 'io>>,
    frames:     usize
}

impl<'io> SaveDriver<'io> {
    /// Bind the codec and initialize a save into `io`.
    pub fn start(
        io: &'io mut dyn IoStream, descriptor: Rc<CodecDescriptor>, options: &SaveOptions
    ) -> Result<SaveDriver<'io>, MarlinError> {
        let layout = descriptor.bind()?;
        let save_init = layout
            .save_init
            .ok_or(MarlinError::MissingEntryPoint("save_init"))?;

        trace!("Starting save with codec '{}'", descriptor.name());

        let state = save_init(io, options)?;

        Ok(SaveDriver {
            descriptor,
            state: Some(state),
            frames: 0
        })
    }

    /// Number of frames written so far.
    pub const fn frames_written(&self) -> usize {
        self.frames
    }

    /// Write one frame: seek, then encode pixels and metadata.
    pub fn write_frame(&mut self, image: &Image) -> Result<(), MarlinError> {
        image.check_valid()?;

        let Some(state) = self.state.as_mut() else {
            return Err(MarlinError::InvalidArgument(
                "write_frame on a finished driver"
            ));
        };

        let result = match state.seek_next_frame(image) {
            Ok(()) => state.save_frame(image),
            Err(err) => Err(err)
        };

        match result {
            Ok(()) => {
                self.frames += 1;
                Ok(())
            }
            Err(err) => Err(self.fail("save_frame", err))
        }
    }

    /// Finalize the container and run the codec's `finish`. Idempotent.
    pub fn stop(&mut self) -> Result<(), MarlinError> {
        match self.state.take() {
            Some(mut state) => state.finish(),
            None => Ok(())
        }
    }

    fn tag(&self) -> String {
        self.descriptor.name().to_uppercase()
    }

    fn fail(&mut self, operation: &str, err: MarlinError) -> MarlinError {
        let detail = format!("{}: {operation} failed: {err:?}", self.tag());

        error!("{}", detail.trim_end());
        context::record_error(detail);

        if let Some(mut state) = self.state.take() {
            if let Err(finish_err) = state.finish() {
                warn!("{}: finish after a failure also failed: {finish_err:?}", self.tag());
            }
        }
        err
    }
}

impl Drop for SaveDriver<'_> {
    fn drop(&mut self) {
        if let Some(mut state) = self.state.take() {
            if let Err(err) = state.finish() {
                warn!("{}: finish on drop failed: {err:?}", self.tag());
            }
        }
    }
}
