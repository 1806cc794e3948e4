//! Background composition.
//!
//! Produces the opaque `width × height` canvas that text is drawn onto.
//!
//! | Kind | Result |
//! |---|---|
//! | **Solid** | every pixel the color |
//! | **Gradient** | vertical, piecewise-linear across the stops at `t = y / height` |
//! | **Image** | cover-fit + center crop, optional Gaussian blur, blended over black by `opacity` |
//!
//! The canvas carries no transparency: color alpha is dropped for solid and
//! gradient fills, and image alpha only weakens the blend against black.

use crate::color::Rgba8;
use crate::data_url::{self, DataUrlError};
use crate::dsl::{BackgroundSpec, ImageSource};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackgroundError {
    #[error("cannot read background image {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Decode(#[from] ImageDecodeError),
}

#[derive(Error, Debug)]
pub enum ImageDecodeError {
    #[error("invalid background data URL: {0}")]
    DataUrl(#[from] DataUrlError),
    #[error("cannot decode background image: {0}")]
    Image(#[from] image::ImageError),
    #[error("background image has zero width or height")]
    Empty,
}

pub fn compose(spec: &BackgroundSpec, width: u32, height: u32) -> Result<RgbaImage, BackgroundError> {
    match spec {
        BackgroundSpec::Solid(color) => Ok(RgbaImage::from_pixel(width, height, opaque_pixel(*color))),
        BackgroundSpec::Gradient(stops) => Ok(vertical_gradient(stops, width, height)),
        BackgroundSpec::Image {
            source,
            opacity,
            blur_radius,
        } => {
            let image = load_image(source)?;
            Ok(image_background(&image, width, height, *opacity, *blur_radius))
        }
    }
}

fn opaque_pixel(c: Rgba8) -> Rgba<u8> {
    Rgba([c.r, c.g, c.b, 255])
}

/// Color of a gradient at `t ∈ [0, 1)`, piecewise across evenly spaced stops.
pub fn gradient_color(stops: &[Rgba8], t: f32) -> Rgba8 {
    match stops {
        [] => Rgba8::WHITE,
        [only] => *only,
        _ => {
            let segments = (stops.len() - 1) as f32;
            let pos = t.clamp(0.0, 1.0) * segments;
            let i = (pos.floor() as usize).min(stops.len() - 2);
            stops[i].lerp(stops[i + 1], pos - i as f32)
        }
    }
}

fn vertical_gradient(stops: &[Rgba8], width: u32, height: u32) -> RgbaImage {
    let mut canvas = RgbaImage::new(width, height);
    for y in 0..height {
        let pixel = opaque_pixel(gradient_color(stops, y as f32 / height as f32));
        for x in 0..width {
            canvas.put_pixel(x, y, pixel);
        }
    }
    canvas
}

fn load_image(source: &ImageSource) -> Result<RgbaImage, BackgroundError> {
    let bytes = match source {
        ImageSource::Path(path) => std::fs::read(path).map_err(|source| BackgroundError::Io {
            path: path.clone(),
            source,
        })?,
        ImageSource::DataUrl(url) => data_url::decode(url).map_err(ImageDecodeError::from)?.bytes,
    };
    let image = image::load_from_memory(&bytes)
        .map_err(ImageDecodeError::from)?
        .to_rgba8();
    if image.width() == 0 || image.height() == 0 {
        return Err(ImageDecodeError::Empty.into());
    }
    Ok(image)
}

/// Dimensions that completely cover `target` while keeping the source aspect
/// ratio. One side matches the target exactly, the other may exceed it.
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        let w = (tgt_h as f64 * src_aspect).round() as u32;
        (w.max(tgt_w), tgt_h)
    } else {
        let h = (tgt_w as f64 / src_aspect).round() as u32;
        (tgt_w, h.max(tgt_h))
    }
}

fn image_background(
    image: &RgbaImage,
    width: u32,
    height: u32,
    opacity: f32,
    blur_radius: f32,
) -> RgbaImage {
    let (fill_w, fill_h) = calculate_fill_dimensions(image.dimensions(), (width, height));
    let resized = imageops::resize(image, fill_w, fill_h, FilterType::Lanczos3);
    let x = (fill_w - width) / 2;
    let y = (fill_h - height) / 2;
    let cropped = imageops::crop_imm(&resized, x, y, width, height).to_image();
    let layer = if blur_radius > 0.0 {
        imageops::blur(&cropped, blur_radius)
    } else {
        cropped
    };

    let opacity = opacity.clamp(0.0, 1.0);
    let mut canvas = RgbaImage::new(width, height);
    for (dst, src) in canvas.pixels_mut().zip(layer.pixels()) {
        let k = opacity * src[3] as f32 / 255.0;
        let blend = |c: u8| (c as f32 * k).round().clamp(0.0, 255.0) as u8;
        *dst = Rgba([blend(src[0]), blend(src[1]), blend(src[2]), 255]);
    }
    canvas
}
