//! AVIF input support.
//!
//! The `image` crate's `"avif"` feature only provides the encoder (rav1e).
//! Its decoder needs `"avif-native"`, which links the C library dav1d. AVIF
//! sources are instead read with `avif-parse` (container) and decoded with
//! `rav1d`, the pure Rust port of dav1d, then converted from YUV to RGB here.

use super::backend::{BackendError, Dimensions};
use image::{DynamicImage, ImageFormat, RgbImage};

/// Whether the bytes carry an AVIF container (by magic, not file name).
pub fn is_avif(bytes: &[u8]) -> bool {
    image::guess_format(bytes).ok() == Some(ImageFormat::Avif)
}

fn parse(bytes: &[u8]) -> Result<avif_parse::AvifData, BackendError> {
    avif_parse::read_avif(&mut std::io::Cursor::new(bytes))
        .map_err(|e| BackendError::Decode(format!("invalid AVIF container: {e:?}")))
}

/// Dimensions from container metadata, without decoding any frame.
pub fn identify(bytes: &[u8]) -> Result<Dimensions, BackendError> {
    let meta = parse(bytes)?
        .primary_item_metadata()
        .map_err(|e| BackendError::Decode(format!("unreadable AVIF metadata: {e:?}")))?;
    Ok(Dimensions {
        width: meta.max_frame_width.get(),
        height: meta.max_frame_height.get(),
    })
}

/// Runs the wrapped closure when dropped.
///
/// Every rav1d handle acquired below is paired with one of these, so the
/// context, data buffer and picture are released on success and on each
/// early error return alike.
struct Release<F: FnMut()>(F);

impl<F: FnMut()> Drop for Release<F> {
    fn drop(&mut self) {
        (self.0)()
    }
}

fn rav1d_failed(step: &str, code: i32) -> BackendError {
    BackendError::Decode(format!("rav1d {step} failed ({code})"))
}

/// Decode the primary AV1 item into an RGB8 image.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, BackendError> {
    use rav1d::include::dav1d::data::Dav1dData;
    use rav1d::include::dav1d::dav1d::Dav1dSettings;
    use rav1d::include::dav1d::headers::{
        DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
        DAV1D_PIXEL_LAYOUT_I444,
    };
    use rav1d::include::dav1d::picture::Dav1dPicture;
    use rav1d::src::lib as dav1d;
    use std::ptr::NonNull;

    let avif = parse(bytes)?;
    let av1: &[u8] = &avif.primary_item;

    let mut settings = std::mem::MaybeUninit::<Dav1dSettings>::uninit();
    unsafe { dav1d::dav1d_default_settings(NonNull::from(&mut settings).cast()) };
    let mut settings = unsafe { settings.assume_init() };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc = unsafe { dav1d::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(rav1d_failed("open", rc.0));
    }
    let ctx_ptr = NonNull::new(&mut ctx);
    let _close = Release(move || unsafe { dav1d::dav1d_close(ctx_ptr) });

    let mut data = Dav1dData::default();
    let buf = unsafe { dav1d::dav1d_data_create(NonNull::new(&mut data), av1.len()) };
    if buf.is_null() {
        return Err(BackendError::Decode("rav1d data_create failed".into()));
    }
    unsafe { std::ptr::copy_nonoverlapping(av1.as_ptr(), buf, av1.len()) };
    let data_ptr = NonNull::new(&mut data);
    // A no-op once send_data has consumed the buffer.
    let _unref_data = Release(move || unsafe { dav1d::dav1d_data_unref(data_ptr) });

    let rc = unsafe { dav1d::dav1d_send_data(ctx, data_ptr) };
    if rc.0 != 0 {
        return Err(rav1d_failed("send_data", rc.0));
    }

    let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
    let rc = unsafe { dav1d::dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
    if rc.0 != 0 {
        return Err(rav1d_failed("get_picture", rc.0));
    }
    let pic_ptr = NonNull::new(&mut pic);
    let _unref_pic = Release(move || unsafe { dav1d::dav1d_picture_unref(pic_ptr) });

    let plane = |i: usize| -> Result<*const u8, BackendError> {
        pic.data[i]
            .map(|p| p.as_ptr() as *const u8)
            .ok_or_else(|| BackendError::Decode(format!("AVIF picture is missing plane {i}")))
    };

    let layout = pic.p.layout;
    let (ss_x, ss_y, monochrome) = match layout {
        DAV1D_PIXEL_LAYOUT_I400 => (false, false, true),
        DAV1D_PIXEL_LAYOUT_I420 => (true, true, false),
        DAV1D_PIXEL_LAYOUT_I422 => (true, false, false),
        DAV1D_PIXEL_LAYOUT_I444 => (false, false, false),
        _ => {
            return Err(BackendError::Decode(format!(
                "unsupported AVIF pixel layout: {layout}"
            )));
        }
    };

    let luma = plane(0)?;
    let (cb, cr) = if monochrome {
        (luma, luma)
    } else {
        (plane(1)?, plane(2)?)
    };

    let planes = YuvPlanes {
        luma,
        cb,
        cr,
        luma_stride: pic.stride[0],
        chroma_stride: if monochrome { 0 } else { pic.stride[1] },
        width: pic.p.w as u32,
        height: pic.p.h as u32,
        bpc: pic.p.bpc as u32,
        ss_x,
        ss_y,
        monochrome,
    };
    let rgb = planes.to_rgb();

    RgbImage::from_raw(planes.width, planes.height, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| BackendError::Decode("decoded AVIF buffer has the wrong size".into()))
}

/// Borrowed YUV planes of a decoded picture.
struct YuvPlanes {
    luma: *const u8,
    cb: *const u8,
    cr: *const u8,
    luma_stride: isize,
    chroma_stride: isize,
    width: u32,
    height: u32,
    bpc: u32,
    /// Chroma subsampling: horizontal, vertical (I420 = true, true)
    ss_x: bool,
    ss_y: bool,
    monochrome: bool,
}

impl YuvPlanes {
    /// Interleaved RGB8 using BT.601 coefficients.
    fn to_rgb(&self) -> Vec<u8> {
        let max_val = ((1u32 << self.bpc) - 1) as f32;
        let center = (1u32 << (self.bpc - 1)) as f32;
        let scale = 255.0 / max_val;
        let to_u8 = |v: f32| (v * scale).clamp(0.0, 255.0) as u8;

        let mut rgb = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for row in 0..self.height {
            for col in 0..self.width {
                let y = sample(self.luma, self.luma_stride, col, row, self.bpc);
                if self.monochrome {
                    let v = to_u8(y);
                    rgb.extend_from_slice(&[v, v, v]);
                    continue;
                }

                let c_col = if self.ss_x { col / 2 } else { col };
                let c_row = if self.ss_y { row / 2 } else { row };
                let cb = sample(self.cb, self.chroma_stride, c_col, c_row, self.bpc) - center;
                let cr = sample(self.cr, self.chroma_stride, c_col, c_row, self.bpc) - center;

                rgb.extend_from_slice(&[
                    to_u8(y + 1.402 * cr),
                    to_u8(y - 0.344136 * cb - 0.714136 * cr),
                    to_u8(y + 1.772 * cb),
                ]);
            }
        }
        rgb
    }
}

/// One sample from a plane; 10- and 12-bit content is stored as u16.
#[inline]
fn sample(plane: *const u8, stride: isize, x: u32, y: u32, bpc: u32) -> f32 {
    let row = y as isize * stride;
    if bpc <= 8 {
        (unsafe { *plane.offset(row + x as isize) }) as f32
    } else {
        (unsafe { *(plane.offset(row + x as isize * 2) as *const u16) }) as f32
    }
}
