/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Compositing of animation frames onto a persistent canvas
//!
//! Animation-aware codecs decode each frame as a *fragment*: a sub
//! rectangle of the full canvas. The compositor owns the canvas across
//! the frames of one decode and turns fragments into full output frames
//! by applying the previous frame's disposal and the current frame's
//! blend method.

use marlin_core::errors::MarlinError;

/// Milliseconds substituted when an animation frame reports a
/// non-positive duration.
pub const FALLBACK_DELAY_MS: i32 = 100;

/// How a frame's pixels are cleared before the next frame is composed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DisposeMethod {
    /// Leave the canvas as the frame left it
    None,
    /// Fill the frame's rectangle with the background color
    Background,
    /// Restore the canvas to its state before the frame was composed
    Previous
}

/// How a fragment combines with the pixels already on the canvas.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BlendMethod {
    /// The fragment replaces the canvas rectangle, alpha included
    Overwrite,
    /// The fragment is alpha-composited over the canvas rectangle
    AlphaOver
}

/// Placement of a fragment on the canvas.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FrameRect {
    pub x:      u32,
    pub y:      u32,
    pub width:  u32,
    pub height: u32
}

/// The persistent RGBA canvas of one animation decode.
pub struct FrameCompositor {
    width:      u32,
    height:     u32,
    background: [u8; 4],
    canvas:     Vec<u8>,
    prev:       Option<(FrameRect, DisposeMethod)>,
    snapshot:   Option<Vec<u8>>
}

impl FrameCompositor {
    /// Create a canvas filled with `background`.
    pub fn new(width: u32, height: u32, background: [u8; 4]) -> Result<FrameCompositor, MarlinError> {
        if width == 0 || height == 0 {
            return Err(MarlinError::IncorrectImageDimensions);
        }
        let size = usize::try_from(u64::from(width) * u64::from(height) * 4)
            .map_err(|_| MarlinError::IncorrectImageDimensions)?;

        let mut canvas = Vec::new();
        canvas.try_reserve_exact(size)?;
        for _ in 0..size / 4 {
            canvas.extend_from_slice(&background);
        }

        Ok(FrameCompositor {
            width,
            height,
            background,
            canvas,
            prev: None,
            snapshot: None
        })
    }

    pub const fn width(&self) -> u32 {
        self.width
    }

    pub const fn height(&self) -> u32 {
        self.height
    }

    /// The full canvas, `width * height` RGBA pixels.
    pub fn canvas(&self) -> &[u8] {
        &self.canvas
    }

    /// Compose the next frame's fragment onto the canvas.
    ///
    /// `fragment` holds `rect.width * rect.height` RGBA pixels. The
    /// previous frame's disposal runs first, then the fragment lands
    /// with the requested blend method, then the frame is recorded as
    /// the new "previous" frame.
    pub fn compose(
        &mut self, rect: FrameRect, dispose: DisposeMethod, blend: BlendMethod,
        fragment: &[u8]
    ) -> Result<(), MarlinError> {
        if rect.width == 0
            || rect.height == 0
            || u64::from(rect.x) + u64::from(rect.width) > u64::from(self.width)
            || u64::from(rect.y) + u64::from(rect.height) > u64::from(self.height)
        {
            return Err(MarlinError::BrokenImage(
                "frame rectangle escapes the canvas".into()
            ));
        }
        if fragment.len() != rect.width as usize * rect.height as usize * 4 {
            return Err(MarlinError::InvalidArgument(
                "fragment size does not match its rectangle"
            ));
        }

        match self.prev {
            Some((prev_rect, DisposeMethod::Background)) => {
                self.fill_rect(prev_rect, self.background);
            }
            Some((_, DisposeMethod::Previous)) => {
                // the snapshot was taken right before that frame landed
                match self.snapshot.take() {
                    Some(snapshot) => self.canvas = snapshot,
                    None => {
                        return Err(MarlinError::BrokenImage(
                            "no canvas snapshot to restore".into()
                        ))
                    }
                }
            }
            Some((_, DisposeMethod::None)) | None => {}
        }

        if dispose == DisposeMethod::Previous {
            self.snapshot = Some(self.canvas.clone());
        }

        let stride = self.width as usize * 4;
        let row_len = rect.width as usize * 4;

        for row in 0..rect.height as usize {
            let src = &fragment[row * row_len..(row + 1) * row_len];
            let offset = (rect.y as usize + row) * stride + rect.x as usize * 4;
            let dst = &mut self.canvas[offset..offset + row_len];

            match blend {
                BlendMethod::Overwrite => dst.copy_from_slice(src),
                BlendMethod::AlphaOver => blend_over_row(dst, src)
            }
        }

        self.prev = Some((rect, dispose));
        Ok(())
    }

    /// Copy the canvas into an output pixel buffer of the same size.
    pub fn write_into(&self, pixels: &mut [u8]) -> Result<(), MarlinError> {
        if pixels.len() != self.canvas.len() {
            return Err(MarlinError::InvalidArgument(
                "output buffer does not match the canvas size"
            ));
        }
        pixels.copy_from_slice(&self.canvas);
        Ok(())
    }

    fn fill_rect(&mut self, rect: FrameRect, color: [u8; 4]) {
        let stride = self.width as usize * 4;

        for row in 0..rect.height as usize {
            let offset = (rect.y as usize + row) * stride + rect.x as usize * 4;

            for pixel in self.canvas[offset..offset + rect.width as usize * 4].chunks_exact_mut(4) {
                pixel.copy_from_slice(&color);
            }
        }
    }
}

/// Alpha-composite one straight-alpha RGBA row over another.
///
/// `out.rgb = src.rgb * src.a + dst.rgb * (1 - src.a)` and
/// `out.a = src.a + dst.a * (1 - src.a)`, normalized to 8 bits.
pub fn blend_over_row(dst: &mut [u8], src: &[u8]) {
    debug_assert_eq!(dst.len(), src.len());

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let alpha = u32::from(s[3]);
        let inverse = 255 - alpha;

        for c in 0..3 {
            d[c] = ((u32::from(s[c]) * alpha + u32::from(d[c]) * inverse + 127) / 255) as u8;
        }
        d[3] = (alpha + (u32::from(d[3]) * inverse + 127) / 255) as u8;
    }
}

/// Spread single-channel gray pixels into opaque RGBA.
pub fn spread_gray_to_rgba(gray: &[u8], rgba: &mut [u8]) {
    debug_assert_eq!(gray.len() * 4, rgba.len());

    for (g, out) in gray.iter().zip(rgba.chunks_exact_mut(4)) {
        out[0] = *g;
        out[1] = *g;
        out[2] = *g;
        out[3] = 255;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];
    const RED: [u8; 4] = [255, 0, 0, 255];
    const GREEN: [u8; 4] = [0, 255, 0, 255];

    fn solid(color: [u8; 4], pixels: usize) -> Vec<u8> {
        color.repeat(pixels)
    }

    fn pixel(canvas: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
        let offset = (y * width + x) as usize * 4;
        canvas[offset..offset + 4].try_into().unwrap()
    }

    #[test]
    fn background_disposal_clears_the_previous_rect() {
        let mut compositor = FrameCompositor::new(4, 4, TRANSPARENT).unwrap();

        // frame 1: red 2x2 at the top left, disposed to background
        compositor
            .compose(
                FrameRect { x: 0, y: 0, width: 2, height: 2 },
                DisposeMethod::Background,
                BlendMethod::Overwrite,
                &solid(RED, 4)
            )
            .unwrap();

        assert_eq!(pixel(compositor.canvas(), 4, 0, 0), RED);
        assert_eq!(pixel(compositor.canvas(), 4, 1, 1), RED);
        assert_eq!(pixel(compositor.canvas(), 4, 2, 2), TRANSPARENT);

        // frame 2: green 2x2 at the bottom right
        compositor
            .compose(
                FrameRect { x: 2, y: 2, width: 2, height: 2 },
                DisposeMethod::None,
                BlendMethod::Overwrite,
                &solid(GREEN, 4)
            )
            .unwrap();

        // the red quadrant was disposed, the green one landed
        assert_eq!(pixel(compositor.canvas(), 4, 0, 0), TRANSPARENT);
        assert_eq!(pixel(compositor.canvas(), 4, 1, 1), TRANSPARENT);
        assert_eq!(pixel(compositor.canvas(), 4, 2, 2), GREEN);
        assert_eq!(pixel(compositor.canvas(), 4, 3, 3), GREEN);
    }

    #[test]
    fn previous_disposal_restores_the_snapshot() {
        let mut compositor = FrameCompositor::new(2, 1, TRANSPARENT).unwrap();

        compositor
            .compose(
                FrameRect { x: 0, y: 0, width: 2, height: 1 },
                DisposeMethod::None,
                BlendMethod::Overwrite,
                &solid(RED, 2)
            )
            .unwrap();

        // frame 2 paints green but asks to be thrown away afterwards
        compositor
            .compose(
                FrameRect { x: 0, y: 0, width: 1, height: 1 },
                DisposeMethod::Previous,
                BlendMethod::Overwrite,
                &solid(GREEN, 1)
            )
            .unwrap();
        assert_eq!(pixel(compositor.canvas(), 2, 0, 0), GREEN);

        // frame 3 lands on the restored canvas
        compositor
            .compose(
                FrameRect { x: 1, y: 0, width: 1, height: 1 },
                DisposeMethod::None,
                BlendMethod::Overwrite,
                &solid(GREEN, 1)
            )
            .unwrap();
        assert_eq!(pixel(compositor.canvas(), 2, 0, 0), RED);
        assert_eq!(pixel(compositor.canvas(), 2, 1, 0), GREEN);
    }

    #[test]
    fn alpha_over_blends_with_the_canvas() {
        let mut compositor = FrameCompositor::new(1, 1, [0, 0, 0, 255]).unwrap();

        // half transparent white over opaque black
        compositor
            .compose(
                FrameRect { x: 0, y: 0, width: 1, height: 1 },
                DisposeMethod::None,
                BlendMethod::AlphaOver,
                &[255, 255, 255, 128]
            )
            .unwrap();

        let out = pixel(compositor.canvas(), 1, 0, 0);
        assert_eq!(out[3], 255);
        assert!(out[0] >= 128 && out[0] <= 129);
    }

    #[test]
    fn transparent_fragment_pixels_keep_the_canvas_when_blending() {
        let mut compositor = FrameCompositor::new(1, 1, TRANSPARENT).unwrap();

        compositor
            .compose(
                FrameRect { x: 0, y: 0, width: 1, height: 1 },
                DisposeMethod::None,
                BlendMethod::Overwrite,
                &solid(RED, 1)
            )
            .unwrap();
        compositor
            .compose(
                FrameRect { x: 0, y: 0, width: 1, height: 1 },
                DisposeMethod::None,
                BlendMethod::AlphaOver,
                &[0, 255, 0, 0]
            )
            .unwrap();

        assert_eq!(pixel(compositor.canvas(), 1, 0, 0), RED);
    }

    #[test]
    fn escaping_rect_is_rejected() {
        let mut compositor = FrameCompositor::new(2, 2, TRANSPARENT).unwrap();

        assert!(compositor
            .compose(
                FrameRect { x: 1, y: 1, width: 2, height: 2 },
                DisposeMethod::None,
                BlendMethod::Overwrite,
                &solid(RED, 4)
            )
            .is_err());
    }
}
