//! Burns a caption (and optionally a round avatar) into the bottom-right corner of an image.

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{imageops, imageops::FilterType, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::{info, warn};

const PADDING: i32 = 20;
const AVATAR_GAP: i32 = 15;
const MIN_FONT_SIZE: u32 = 20;
const SHADOW_OFFSET: i32 = 1;
const SHADOW_COLOR: Rgba<u8> = Rgba([0, 0, 0, 180]);
const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 220]);
const GLYPH_CELL: u32 = 8;

/// Caption renderer. Font and avatar are resolved once; rendering is pure.
pub struct Watermarker {
    font: Option<FontVec>,
    avatar: Option<RgbaImage>,
}

impl Watermarker {
    /// `font: None` renders with the built-in 8x8 bitmap glyphs.
    pub fn new(font: Option<FontVec>, avatar: Option<RgbaImage>) -> Self {
        Self { font, avatar }
    }

    pub fn from_paths(font_paths: &[PathBuf], avatar_path: Option<&Path>) -> Self {
        let font = load_first_font(font_paths);
        let avatar = avatar_path.filter(|p| p.exists()).and_then(|p| match image::open(p) {
            Ok(img) => {
                info!("Watermark avatar loaded from {:?}", p);
                Some(img.to_rgba8())
            }
            Err(e) => {
                warn!("Failed to load watermark avatar {:?}: {e}", p);
                None
            }
        });
        Self::new(font, avatar)
    }

    pub fn font_size_for(width: u32) -> u32 {
        (width / 30).max(MIN_FONT_SIZE)
    }

    /// Return a watermarked copy of `image`; the input is left untouched.
    pub fn apply(&self, image: &RgbImage, caption: &str) -> RgbImage {
        let (width, height) = image.dimensions();
        let font_size = Self::font_size_for(width);
        let mut overlay = RgbaImage::new(width, height);

        let (text_width, text_height) = self.measure(caption, font_size);
        let x_text = width as i32 - text_width as i32 - PADDING;
        let y_text = height as i32 - text_height as i32 - PADDING;

        if let Some(avatar) = &self.avatar {
            let face = circular_avatar(avatar, font_size + 20);
            let face_x = x_text - face.width() as i32 - AVATAR_GAP;
            let face_y = y_text - face.height() as i32 / 4;
            imageops::overlay(&mut overlay, &face, face_x as i64, face_y as i64);
        }

        self.draw(
            &mut overlay,
            caption,
            font_size,
            (x_text + SHADOW_OFFSET, y_text + SHADOW_OFFSET),
            SHADOW_COLOR,
        );
        self.draw(&mut overlay, caption, font_size, (x_text, y_text), TEXT_COLOR);

        composite(image, &overlay)
    }

    fn measure(&self, caption: &str, font_size: u32) -> (u32, u32) {
        match &self.font {
            Some(font) => text_size(PxScale::from(font_size as f32), font, caption),
            None => {
                let scale = bitmap_scale(font_size);
                let chars = caption.chars().count() as u32;
                (chars * GLYPH_CELL * scale, GLYPH_CELL * scale)
            }
        }
    }

    fn draw(&self, overlay: &mut RgbaImage, caption: &str, font_size: u32, (x, y): (i32, i32), color: Rgba<u8>) {
        match &self.font {
            Some(font) => draw_text_mut(overlay, color, x, y, PxScale::from(font_size as f32), font, caption),
            None => draw_bitmap_text(overlay, caption, bitmap_scale(font_size), (x, y), color),
        }
    }
}

fn load_first_font(font_paths: &[PathBuf]) -> Option<FontVec> {
    for path in font_paths {
        let Ok(bytes) = std::fs::read(path) else {
            continue;
        };
        match FontVec::try_from_vec(bytes) {
            Ok(font) => {
                info!("Watermark font: {:?}", path);
                return Some(font);
            }
            Err(e) => warn!("Skipping unusable font {:?}: {e}", path),
        }
    }
    info!("No watermark font found, using built-in bitmap glyphs");
    None
}

fn bitmap_scale(font_size: u32) -> u32 {
    (font_size / GLYPH_CELL).max(1)
}

/// Characters outside the basic set render as '?'.
fn draw_bitmap_text(overlay: &mut RgbaImage, caption: &str, scale: u32, (x, y): (i32, i32), color: Rgba<u8>) {
    let cell = (GLYPH_CELL * scale) as i32;
    let fallback = BASIC_FONTS.get('?').unwrap_or([0; 8]);

    for (index, ch) in caption.chars().enumerate() {
        let glyph = BASIC_FONTS.get(ch).unwrap_or(fallback);
        let glyph_x = x + index as i32 * cell;
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH_CELL {
                if bits & (1 << col) == 0 {
                    continue;
                }
                let px = glyph_x + (col * scale) as i32;
                let py = y + (row as u32 * scale) as i32;
                draw_filled_rect_mut(overlay, Rect::at(px, py).of_size(scale, scale), color);
            }
        }
    }
}

/// Resize to `size` square and clear everything outside the inscribed circle.
fn circular_avatar(avatar: &RgbaImage, size: u32) -> RgbaImage {
    let mut face = imageops::resize(avatar, size, size, FilterType::Lanczos3);
    let radius = size as f32 / 2.0;
    for (x, y, pixel) in face.enumerate_pixels_mut() {
        let dx = x as f32 + 0.5 - radius;
        let dy = y as f32 + 0.5 - radius;
        if dx * dx + dy * dy > radius * radius {
            pixel[3] = 0;
        }
    }
    face
}

/// Alpha-composite the overlay onto a copy of the base image.
fn composite(base: &RgbImage, overlay: &RgbaImage) -> RgbImage {
    let mut out = base.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let Rgba([r, g, b, a]) = *overlay.get_pixel(x, y);
        if a == 0 {
            continue;
        }
        let alpha = a as f32 / 255.0;
        let blend = |under: u8, over: u8| (under as f32 * (1.0 - alpha) + over as f32 * alpha).round() as u8;
        *pixel = Rgb([blend(pixel[0], r), blend(pixel[1], g), blend(pixel[2], b)]);
    }
    out
}
