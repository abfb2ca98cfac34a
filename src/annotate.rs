// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Drawing detections onto the input image.

#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]

use std::fs;
use std::path::PathBuf;

use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::results::Detections;

/// Font looked up in the config directory for label text.
pub const FONT_NAME: &str = "Arial.ttf";

/// Box outline thickness in pixels.
const THICKNESS: i32 = 3;

/// Label text height in pixels.
const LABEL_SCALE: f32 = 16.0;

/// Ultralytics color palette.
pub const COLORS: [[u8; 3]; 20] = [
    [4, 42, 255],    // #042aff
    [11, 219, 235],  // #0bdbeb
    [243, 243, 243], // #f3f3f3
    [0, 223, 183],   // #00dfb7
    [17, 31, 104],   // #111f68
    [255, 111, 221], // #ff6fdd
    [255, 68, 79],   // #ff444f
    [204, 237, 0],   // #cced00
    [0, 243, 68],    // #00f344
    [189, 0, 255],   // #bd00ff
    [0, 180, 255],   // #00b4ff
    [221, 0, 186],   // #dd00ba
    [0, 255, 255],   // #00ffff
    [38, 192, 0],    // #26c000
    [1, 255, 179],   // #01ffb3
    [125, 36, 255],  // #7d24ff
    [123, 0, 104],   // #7b0068
    [255, 27, 108],  // #ff1b6c
    [252, 109, 47],  // #fc6d2f
    [162, 255, 11],  // #a2ff0b
];

/// Color for a class index.
#[must_use]
pub const fn class_color(class_id: usize) -> Rgb<u8> {
    Rgb(COLORS[class_id % COLORS.len()])
}

/// Location of the label font, `<config_dir>/detect-invoker/Arial.ttf`.
#[must_use]
pub fn font_path() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join(env!("CARGO_PKG_NAME")).join(FONT_NAME))
}

/// Load the label font if present. Nothing is downloaded.
#[must_use]
pub fn load_font() -> Option<FontVec> {
    let data = fs::read(font_path()?).ok()?;
    FontVec::try_from_vec(data).ok()
}

/// Draw boxes, and labels when `font` is given, onto a copy of `image`.
#[must_use]
pub fn annotate_image(image: &DynamicImage, detections: &Detections, font: Option<&FontVec>) -> RgbImage {
    let mut img = image.to_rgb8();
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img;
    }
    let (max_x, max_y) = (width as i32 - 1, height as i32 - 1);

    for detection in &detections.items {
        let [x1, y1, x2, y2] = detection.bbox.map(|v| v.round() as i32);
        let (x1, x2) = (x1.min(x2).clamp(0, max_x), x1.max(x2).clamp(0, max_x));
        let (y1, y2) = (y1.min(y2).clamp(0, max_y), y1.max(y2).clamp(0, max_y));
        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        let color = class_color(detection.class_id);

        for t in 0..THICKNESS {
            let (tx1, ty1) = (x1 + t, y1 + t);
            let (tx2, ty2) = (x2 - t, y2 - t);
            if tx2 > tx1 && ty2 > ty1 {
                let rect = Rect::at(tx1, ty1).of_size((tx2 - tx1) as u32, (ty2 - ty1) as u32);
                draw_hollow_rect_mut(&mut img, rect, color);
            }
        }

        if let Some(font) = font {
            let label = format!(
                "{} {:.2}",
                detections.label(detection.class_id),
                detection.confidence
            );
            // Above the box when there is room, otherwise just inside it.
            let text_y = if y1 > 20 { y1 - 20 } else { y1 + THICKNESS };
            draw_text_mut(&mut img, color, x1, text_y, PxScale::from(LABEL_SCALE), font, &label);
        }
    }

    img
}
