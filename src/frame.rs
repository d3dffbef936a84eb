//! Raw frame data and the transforms that turn a captured buffer into a
//! decodable luminance view.
//!
//! A [`RawFrame`] is a luminance-leading byte plane in the sensor's natural
//! orientation. [`SourceData`] wraps one captured frame together with the
//! rotation, crop, scale and mirror metadata needed to reproduce what the
//! display shows, and is handed from the camera worker to the decode worker
//! and discarded within one loop iteration.

use crate::errors::ScanError;
use crate::types::{Point, Rect, Rotation, Size};
use serde::{Deserialize, Serialize};

/// Layout tag for captured buffers. Both variants carry the luminance plane
/// first, so the decode path reads the leading `width * height` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Bare 8-bit grayscale, exactly one byte per pixel.
    Luma8,
    /// Y plane followed by interleaved VU chroma; only the Y plane is used.
    Nv21,
}

/// An owned luminance plane with dimensions in natural sensor orientation.
///
/// The buffer may be longer than `width * height` (chroma tail for planar
/// formats); transforms only touch the luminance prefix.
#[derive(Debug, Clone)]
pub struct RawFrame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl RawFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self, ScanError> {
        if (width as usize) * (height as usize) > data.len() {
            return Err(ScanError::InvalidArgument(format!(
                "frame buffer too small: {} bytes for {}x{}",
                data.len(),
                width,
                height
            )));
        }
        Ok(RawFrame {
            data,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Rotates the luminance plane into display orientation. The result
    /// holds exactly `width * height` bytes; any chroma tail is dropped.
    pub fn rotate(&self, rotation: Rotation) -> RawFrame {
        match rotation {
            Rotation::Deg0 => RawFrame {
                data: self.luminance().to_vec(),
                width: self.width,
                height: self.height,
            },
            Rotation::Deg90 => self.rotate_cw(),
            Rotation::Deg180 => self.rotate_180(),
            Rotation::Deg270 => self.rotate_ccw(),
        }
    }

    fn luminance(&self) -> &[u8] {
        &self.data[..(self.width as usize) * (self.height as usize)]
    }

    fn rotate_cw(&self) -> RawFrame {
        let (w, h) = (self.width as usize, self.height as usize);
        let src = self.luminance();
        let mut out = vec![0u8; w * h];
        let mut i = 0;
        for x in 0..w {
            for y in (0..h).rev() {
                out[i] = src[y * w + x];
                i += 1;
            }
        }
        RawFrame {
            data: out,
            width: self.height,
            height: self.width,
        }
    }

    fn rotate_180(&self) -> RawFrame {
        let src = self.luminance();
        let mut out: Vec<u8> = src.to_vec();
        out.reverse();
        RawFrame {
            data: out,
            width: self.width,
            height: self.height,
        }
    }

    fn rotate_ccw(&self) -> RawFrame {
        let (w, h) = (self.width as usize, self.height as usize);
        let src = self.luminance();
        let mut out = vec![0u8; w * h];
        let mut i = w * h;
        for x in 0..w {
            for y in (0..h).rev() {
                i -= 1;
                out[i] = src[y * w + x];
            }
        }
        RawFrame {
            data: out,
            width: self.height,
            height: self.width,
        }
    }

    /// Extracts `crop` and downsamples it by the integer factor `scale`
    /// (every `scale`-th pixel on both axes). With `scale == 1` this is a
    /// row-by-row byte copy of the sub-region.
    pub fn crop_and_scale(&self, crop: Rect, scale: u32) -> Result<RawFrame, ScanError> {
        if scale == 0 {
            return Err(ScanError::InvalidArgument("scale must be >= 1".into()));
        }
        if crop.left < 0
            || crop.top < 0
            || crop.right > self.width as i32
            || crop.bottom > self.height as i32
            || crop.is_empty()
        {
            return Err(ScanError::InvalidArgument(format!(
                "crop {} outside {}x{} frame",
                crop, self.width, self.height
            )));
        }
        let out_w = (crop.width() as u32 / scale) as usize;
        let out_h = (crop.height() as u32 / scale) as usize;
        if out_w == 0 || out_h == 0 {
            return Err(ScanError::InvalidArgument(format!(
                "crop {} collapses to nothing at scale {}",
                crop, scale
            )));
        }
        let src = self.luminance();
        let stride = self.width as usize;
        let (left, top) = (crop.left as usize, crop.top as usize);
        let mut out = vec![0u8; out_w * out_h];
        if scale == 1 {
            for y in 0..out_h {
                let input = (y + top) * stride + left;
                out[y * out_w..(y + 1) * out_w].copy_from_slice(&src[input..input + out_w]);
            }
        } else {
            let step = scale as usize;
            for y in 0..out_h {
                let mut input = (top + y * step) * stride + left;
                let row = &mut out[y * out_w..(y + 1) * out_w];
                for px in row.iter_mut() {
                    *px = src[input];
                    input += step;
                }
            }
        }
        Ok(RawFrame {
            data: out,
            width: out_w as u32,
            height: out_h as u32,
        })
    }
}

/// Grayscale plane handed to a reader; dimensions are in display
/// orientation after crop and scale have been applied.
#[derive(Debug, Clone)]
pub struct LuminanceView {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl LuminanceView {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self, ScanError> {
        if (width as usize) * (height as usize) > data.len() {
            return Err(ScanError::InvalidArgument(format!(
                "luminance buffer too small: {} bytes for {}x{}",
                data.len(),
                width,
                height
            )));
        }
        Ok(LuminanceView {
            data,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Luminance at (x, y); callers stay in bounds.
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[(y * self.width + x) as usize]
    }

    /// Polarity-flipped copy, for decoding light-on-dark codes.
    pub fn inverted(&self) -> LuminanceView {
        LuminanceView {
            data: self.data.iter().map(|b| 255 - b).collect(),
            width: self.width,
            height: self.height,
        }
    }
}

/// One captured preview frame plus the metadata required to decode it and
/// to map detection points back into display coordinates.
#[derive(Debug, Clone)]
pub struct SourceData {
    frame: RawFrame,
    format: PixelFormat,
    /// Delta between sensor and display orientation.
    rotation: Rotation,
    /// Region to decode, in display orientation. Unset means "do not
    /// decode this frame".
    crop: Option<Rect>,
    /// Power-of-two downsample applied before decoding.
    scaling_factor: u32,
    /// True for front-facing devices; the preview the user sees is a
    /// mirror image of the buffer.
    mirrored: bool,
}

impl SourceData {
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        rotation: Rotation,
    ) -> Result<Self, ScanError> {
        Ok(SourceData {
            frame: RawFrame::new(data, width, height)?,
            format,
            rotation,
            crop: None,
            scaling_factor: 1,
            mirrored: false,
        })
    }

    pub fn data_width(&self) -> u32 {
        self.frame.width()
    }

    pub fn data_height(&self) -> u32 {
        self.frame.height()
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// True when sensor and display axes are swapped.
    pub fn is_rotated(&self) -> bool {
        self.rotation.is_perpendicular()
    }

    pub fn crop_rect(&self) -> Option<Rect> {
        self.crop
    }

    pub fn set_crop_rect(&mut self, crop: Rect) {
        self.crop = Some(crop);
    }

    pub fn scaling_factor(&self) -> u32 {
        self.scaling_factor
    }

    /// Factor must be a power of two.
    pub fn set_scaling_factor(&mut self, factor: u32) {
        debug_assert!(factor.is_power_of_two(), "scaling factor must be 2^n");
        self.scaling_factor = factor.max(1);
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirrored
    }

    pub fn set_mirrored(&mut self, mirrored: bool) {
        self.mirrored = mirrored;
    }

    /// Builds the decodable view: rotate into display orientation, crop,
    /// downsample. Returns None when no crop rect has been set.
    pub fn luminance_view(&self) -> Result<Option<LuminanceView>, ScanError> {
        let crop = match self.crop {
            Some(c) => c,
            None => return Ok(None),
        };
        let rotated = self.frame.rotate(self.rotation);
        let cropped = rotated.crop_and_scale(crop, self.scaling_factor)?;
        let (w, h) = (cropped.width(), cropped.height());
        Ok(Some(LuminanceView::new(cropped.into_data(), w, h)?))
    }

    /// Maps a point reported by the reader (cropped/scaled coordinates)
    /// back into display-orientation frame coordinates.
    pub fn translate_point(&self, p: Point) -> Point {
        let (crop_left, crop_top) = match self.crop {
            Some(c) => (c.left as f32, c.top as f32),
            None => (0.0, 0.0),
        };
        let factor = self.scaling_factor as f32;
        let mut x = p.x * factor + crop_left;
        let y = p.y * factor + crop_top;
        if self.mirrored {
            x = self.frame.width() as f32 - x;
        }
        Point::new(x, y)
    }

    /// Grayscale image of the frame in display orientation, downsampled by
    /// `scale`. `crop` is in display orientation; None renders the whole
    /// frame.
    pub fn to_image(&self, crop: Option<Rect>, scale: u32) -> Result<image::GrayImage, ScanError> {
        let rotated = self.frame.rotate(self.rotation);
        let region = crop.unwrap_or_else(|| Rect::from_size(rotated.size()));
        let scaled = rotated.crop_and_scale(region, scale.max(1))?;
        let (w, h) = (scaled.width(), scaled.height());
        image::GrayImage::from_raw(w, h, scaled.into_data())
            .ok_or_else(|| ScanError::InvalidArgument("image buffer mismatch".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_2x2() -> RawFrame {
        RawFrame::new(vec![1, 2, 3, 4], 2, 2).unwrap()
    }

    #[test]
    fn rejects_short_buffer() {
        assert!(RawFrame::new(vec![0; 3], 2, 2).is_err());
    }

    #[test]
    fn rotate_cw_2x2() {
        let r = frame_2x2().rotate(Rotation::Deg90);
        assert_eq!(r.data(), &[3, 1, 4, 2]);
    }

    #[test]
    fn rotate_180_2x2() {
        let r = frame_2x2().rotate(Rotation::Deg180);
        assert_eq!(r.data(), &[4, 3, 2, 1]);
    }

    #[test]
    fn rotate_ccw_2x2() {
        let r = frame_2x2().rotate(Rotation::Deg270);
        assert_eq!(r.data(), &[2, 4, 1, 3]);
    }

    #[test]
    fn rotate_drops_chroma_tail() {
        let f = RawFrame::new(vec![1, 2, 3, 4, 9, 9], 2, 2).unwrap();
        assert_eq!(f.rotate(Rotation::Deg0).data().len(), 4);
    }

    #[test]
    fn crop_extracts_subregion() {
        let data: Vec<u8> = (0..16).collect();
        let f = RawFrame::new(data, 4, 4).unwrap();
        let c = f.crop_and_scale(Rect::new(1, 1, 3, 3), 1).unwrap();
        assert_eq!(c.size(), Size::new(2, 2));
        assert_eq!(c.data(), &[5, 6, 9, 10]);
    }

    #[test]
    fn crop_with_scale_subsamples() {
        let data: Vec<u8> = (0..16).collect();
        let f = RawFrame::new(data, 4, 4).unwrap();
        let c = f.crop_and_scale(Rect::new(0, 0, 4, 4), 2).unwrap();
        assert_eq!(c.size(), Size::new(2, 2));
        assert_eq!(c.data(), &[0, 2, 8, 10]);
    }

    #[test]
    fn crop_out_of_bounds_is_rejected() {
        let f = frame_2x2();
        assert!(f.crop_and_scale(Rect::new(0, 0, 3, 2), 1).is_err());
        assert!(f.crop_and_scale(Rect::new(-1, 0, 2, 2), 1).is_err());
    }

    #[test]
    fn luminance_view_requires_crop() {
        let sd = SourceData::new(vec![0; 16], 4, 4, PixelFormat::Luma8, Rotation::Deg0).unwrap();
        assert!(sd.luminance_view().unwrap().is_none());
    }

    #[test]
    fn translate_point_applies_crop_scale_and_mirror() {
        let mut sd =
            SourceData::new(vec![0; 100], 10, 10, PixelFormat::Luma8, Rotation::Deg0).unwrap();
        sd.set_crop_rect(Rect::new(2, 3, 8, 9));
        sd.set_scaling_factor(2);
        let p = sd.translate_point(Point::new(1.0, 1.0));
        assert_eq!((p.x, p.y), (4.0, 5.0));
        sd.set_mirrored(true);
        let m = sd.translate_point(Point::new(1.0, 1.0));
        assert_eq!((m.x, m.y), (6.0, 5.0));
    }

    #[test]
    fn inverted_view_flips_polarity() {
        let v = LuminanceView::new(vec![0, 100, 255, 5], 2, 2).unwrap();
        assert_eq!(v.inverted().data(), &[255, 155, 0, 250]);
    }
}
