#![allow(non_upper_case_globals)]

use crate::engine::{DrawCommand, MapStyle};
use crate::error::MapError;
use crate::model::MapResult;
use web_sys::{CanvasRenderingContext2d, HtmlImageElement};

// Canvas drawing primitives

pub const clear_canvas: fn(&CanvasRenderingContext2d, (f64, f64)) -> MapResult<()> =
    |context, (width, height)| {
        context.clear_rect(0.0, 0.0, width, height);
        Ok(())
    };

pub const draw_background: fn(&CanvasRenderingContext2d, (f64, f64), &str) -> MapResult<()> =
    |context, (width, height), color| {
        context.set_fill_style_str(color);
        context.fill_rect(0.0, 0.0, width, height);
        Ok(())
    };

pub const draw_image: fn(
    &CanvasRenderingContext2d,
    &HtmlImageElement,
    (f64, f64),
    (f64, f64),
) -> MapResult<()> = |context, image, (x, y), (width, height)| {
    context
        .draw_image_with_html_image_element_and_dw_and_dh(image, x, y, width, height)
        .map_err(|_| MapError::Wasm("Failed to draw image".to_string()))
};

pub const render_circle: fn(
    &CanvasRenderingContext2d,
    (f64, f64),
    f64,
    &str,
    &MapStyle,
) -> MapResult<()> = |context, (x, y), radius, color, style| {
    context.begin_path();
    context
        .arc(x, y, radius, 0.0, 2.0 * std::f64::consts::PI)
        .map_err(|_| MapError::Wasm("Failed to draw arc".to_string()))?;
    context.set_global_alpha(style.overlay_fill_opacity);
    context.set_fill_style_str(color);
    context.fill();
    context.set_global_alpha(1.0);
    context.set_stroke_style_str(color);
    context.set_line_width(style.overlay_line_width);
    context.stroke();
    Ok(())
};

// Stand-in for a marker icon that has not finished loading
pub const render_single_point: fn(&CanvasRenderingContext2d, (f64, f64), f64, &str) -> MapResult<()> =
    |context, (x, y), radius, color| {
        context.begin_path();
        context
            .arc(x, y, radius, 0.0, 2.0 * std::f64::consts::PI)
            .map_err(|_| MapError::Wasm("Failed to draw arc".to_string()))?;
        context.set_fill_style_str(color);
        context.fill();
        context.set_stroke_style_str("#ffffff");
        context.set_line_width(1.5);
        context.stroke();
        Ok(())
    };

pub const draw_attribution: fn(&CanvasRenderingContext2d, &str, (f64, f64), &str) -> MapResult<()> =
    |context, text, (width, height), font| {
        context.set_font(font);
        let text_width = context
            .measure_text(text)
            .map_err(|_| MapError::Wasm("Failed to measure text".to_string()))?
            .width();
        let padding = 4.0;
        let box_height = 16.0;
        let left = width - text_width - 2.0 * padding;
        let top = height - box_height;

        context.set_global_alpha(0.7);
        context.set_fill_style_str("#ffffff");
        context.fill_rect(left, top, text_width + 2.0 * padding, box_height);
        context.set_global_alpha(1.0);
        context.set_fill_style_str("#333333");
        context
            .fill_text(text, left + padding, height - padding)
            .map_err(|_| MapError::Wasm("Failed to draw text".to_string()))
    };

/// Paints a frame. `image` returns a loaded image for a URL, or `None`
/// while it is still in flight; missing tiles are left as background and
/// missing icons fall back to a dot.
pub fn execute(
    context: &CanvasRenderingContext2d,
    commands: &[DrawCommand],
    canvas_size: (f64, f64),
    style: &MapStyle,
    mut image: impl FnMut(&str) -> Option<HtmlImageElement>,
) -> MapResult<()> {
    clear_canvas(context, canvas_size)?;
    draw_background(context, canvas_size, &style.background)?;

    for command in commands {
        match command {
            DrawCommand::Tile { url, x, y, size } => {
                if let Some(tile) = image(url) {
                    draw_image(context, &tile, (*x, *y), (*size, *size))?;
                }
            }
            DrawCommand::Circle {
                x,
                y,
                radius,
                color,
            } => render_circle(context, (*x, *y), *radius, color, style)?,
            DrawCommand::MarkerShadow { url, x, y } => {
                if let Some(shadow) = image(url) {
                    let size = (shadow.natural_width() as f64, shadow.natural_height() as f64);
                    draw_image(context, &shadow, (*x, *y), size)?;
                }
            }
            DrawCommand::Marker {
                url,
                x,
                y,
                width,
                height,
            } => match image(url) {
                Some(icon) => draw_image(context, &icon, (*x, *y), (*width, *height))?,
                None => render_single_point(
                    context,
                    (x + width / 2.0, y + height / 2.0),
                    style.marker_fallback_radius,
                    &style.marker_fallback_color,
                )?,
            },
            DrawCommand::Attribution { text } => {
                draw_attribution(context, text, canvas_size, &style.attribution_font)?
            }
        }
    }
    Ok(())
}
