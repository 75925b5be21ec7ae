//! Screen-space types and the greyscale conversion shared by templates and
//! frames.

pub mod locator;
pub mod matching;
pub mod template;

use crate::error::Result;

use opencv::core::{Mat, Scalar};
use opencv::imgproc;
use opencv::prelude::*;
use serde::{Deserialize, Serialize};

pub const SCREEN_WIDTH: u32 = 256;
pub const SCREEN_HEIGHT: u32 = 240;

/// Top-left corner of something on screen, in pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Point {
        Point { x, y }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Size {
        Size { width, height }
    }

    pub fn of(mat: &Mat) -> Size {
        Size::new(mat.cols().max(0) as u32, mat.rows().max(0) as u32)
    }
}

/// Copies a packed pixel buffer into a new matrix of type `typ`
/// (`CV_8UC1`, `CV_8UC3`, ...).
pub fn mat_from_bytes(width: u32, height: u32, typ: i32, bytes: &[u8]) -> Result<Mat> {
    let mut mat =
        Mat::new_rows_cols_with_default(height as i32, width as i32, typ, Scalar::all(0.0))?;
    let data = mat.data_bytes_mut()?;
    if data.len() != bytes.len() {
        return Err(opencv::Error::new(
            opencv::core::StsUnmatchedSizes,
            format!("{} bytes for a {}x{} matrix of {}", bytes.len(), width, height, data.len()),
        )
        .into());
    }
    data.copy_from_slice(bytes);
    Ok(mat)
}

/// Greyscale copy of a BGR frame or sprite. Single-channel input is copied
/// as is.
pub fn to_grey(image: &Mat) -> Result<Mat> {
    if image.channels() == 1 {
        return Ok(image.try_clone()?);
    }
    let mut grey = Mat::default();
    imgproc::cvt_color_def(image, &mut grey, imgproc::COLOR_BGR2GRAY)?;
    Ok(grey)
}
