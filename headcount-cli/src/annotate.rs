//! Drawing detections and the people count onto result images.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::{
    drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut},
    rect::Rect as PixelRect,
};
use headcount_core::Rect;
use headcount_utils::config::AnnotationSettings;

use crate::glyphs::{GLYPH_ADVANCE, GLYPH_WIDTH, glyph};

/// Text drawn in the corner of a result image, e.g. `People: 3`.
pub fn count_label(style: &AnnotationSettings, count: usize) -> String {
    format!("{}: {count}", style.label)
}

/// Copy of `image` with every detection outlined, its center marked and the
/// count written in the top-left corner.
pub fn render(image: &DynamicImage, detections: &[Rect], style: &AnnotationSettings) -> DynamicImage {
    let mut canvas = image.to_rgba8();
    let box_color = style.box_color.to_rgba();
    let marker_color = style.marker_color.to_rgba();

    for detection in detections {
        draw_thick_rect(&mut canvas, detection, style.box_thickness, box_color);
        if style.marker_radius > 0 {
            draw_filled_circle_mut(&mut canvas, detection.center(), style.marker_radius, marker_color);
        }
    }

    draw_text(
        &mut canvas,
        &count_label(style, detections.len()),
        (style.text_x, style.text_y),
        style.text_scale.max(1),
        style.text_color.to_rgba(),
    );

    if image.color().has_alpha() {
        DynamicImage::ImageRgba8(canvas)
    } else {
        DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8())
    }
}

/// Render the annotated copy and write it to `output_path`.
pub fn save_annotated(
    image: &DynamicImage,
    detections: &[Rect],
    style: &AnnotationSettings,
    output_path: &Path,
) -> Result<()> {
    let (img_w, img_h) = (image.width(), image.height());
    if img_w == 0 || img_h == 0 {
        anyhow::bail!(
            "cannot annotate image with zero dimensions: {}",
            output_path.display()
        );
    }

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    render(image, detections, style)
        .save(output_path)
        .with_context(|| format!("failed to save annotated image {}", output_path.display()))
}

/// Outline `rect` with a line `thickness` pixels wide, centered on its edge.
fn draw_thick_rect(canvas: &mut RgbaImage, rect: &Rect, thickness: u32, color: Rgba<u8>) {
    let thickness = thickness.max(1) as i32;
    let start = -(thickness / 2);
    for offset in start..start + thickness {
        let width = rect.width - 2 * offset;
        let height = rect.height - 2 * offset;
        if width <= 0 || height <= 0 {
            continue;
        }
        let outline = PixelRect::at(rect.x + offset, rect.y + offset).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(canvas, outline, color);
    }
}

/// Draw `text` with the built-in bitmap font; `origin` is the top-left corner.
fn draw_text(canvas: &mut RgbaImage, text: &str, origin: (i32, i32), scale: u32, color: Rgba<u8>) {
    let (mut pen_x, pen_y) = origin;
    for c in text.chars() {
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                let x = pen_x + (col * scale) as i32;
                let y = pen_y + (row as u32 * scale) as i32;
                draw_filled_rect_mut(canvas, PixelRect::at(x, y).of_size(scale, scale), color);
            }
        }
        pen_x += (GLYPH_ADVANCE * scale) as i32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};
    use tempfile::tempdir;

    fn blank(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([0, 0, 0])))
    }

    #[test]
    fn label_uses_configured_prefix() {
        let style = AnnotationSettings::default();
        assert_eq!(count_label(&style, 3), "People: 3");
    }

    #[test]
    fn outlines_and_marks_each_detection() {
        let style = AnnotationSettings {
            text_x: 1000,
            ..AnnotationSettings::default()
        };
        let out = render(&blank(120, 120), &[Rect::new(40, 40, 30, 20)], &style);

        assert_eq!(out.get_pixel(40, 40).0[..3], [0, 255, 0]);
        assert_eq!(out.get_pixel(39, 55).0[..3], [0, 255, 0]);
        assert_eq!(out.get_pixel(55, 50).0[..3], [255, 0, 0]);
        assert_eq!(out.get_pixel(50, 45).0[..3], [0, 0, 0]);
        assert_eq!(out.get_pixel(5, 5).0[..3], [0, 0, 0]);
    }

    #[test]
    fn count_text_lands_at_origin() {
        let style = AnnotationSettings::default();
        let out = render(&blank(200, 60), &[], &style);
        // Top row of 'P' is 0b11110: its first column is lit.
        assert_eq!(out.get_pixel(10, 10).0[..3], [0, 255, 0]);
        assert_eq!(out.get_pixel(9, 9).0[..3], [0, 0, 0]);
    }

    #[test]
    fn opaque_inputs_stay_rgb() {
        let out = render(&blank(16, 16), &[], &AnnotationSettings::default());
        assert!(!out.color().has_alpha());
    }

    #[test]
    fn save_writes_jpeg_next_to_results() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("results").join("result_photo.jpg");
        save_annotated(
            &blank(64, 48),
            &[Rect::new(8, 8, 20, 20)],
            &AnnotationSettings::default(),
            &path,
        )
        .expect("save");
        let reloaded = image::open(&path).expect("reload");
        assert_eq!(reloaded.dimensions(), (64, 48));
    }

    #[test]
    fn boxes_partly_outside_the_frame_are_clipped() {
        let out = render(
            &blank(50, 50),
            &[Rect::new(40, -5, 30, 30)],
            &AnnotationSettings::default(),
        );
        assert_eq!(out.dimensions(), (50, 50));
    }
}
