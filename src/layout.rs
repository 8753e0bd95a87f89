//! Shrink-to-fit multi-line text layout.
//!
//! [`autofit_layout`] is a pure function: it takes the text box, the
//! requested typography and a [`TextMeasure`] implementation and returns the
//! font size and wrapped lines to paint. The browser shell measures with the
//! canvas context; tests use a fixed-advance measurer.

#[cfg(test)]
#[path = "layout_test.rs"]
mod layout_test;

use crate::consts::{AUTOFIT_MAX_STEPS, MAX_STROKE_INTENSITY, MIN_FONT_SIZE};
use crate::entity::{TextAlign, TextProps, VerticalAlign};

/// Pixel stroke per unit of intensity, as a fraction of the font size.
const STROKE_PER_INTENSITY: f64 = 0.035;

/// Text outlines never exceed this fraction of the font size.
const MAX_STROKE_RATIO: f64 = 0.3;

/// Measures the advance width of a string in a CSS font.
pub trait TextMeasure {
    fn text_width(&self, text: &str, font: &str) -> f64;
}

/// Everything the layout needs to know about one text box.
#[derive(Debug, Clone, Copy)]
pub struct LayoutRequest<'a> {
    pub text: &'a str,
    pub width: f64,
    pub height: f64,
    pub font_size: f64,
    pub font_family: &'a str,
    pub font_weight: &'a str,
    pub font_style: &'a str,
    pub line_height: f64,
    pub vertical_align: VerticalAlign,
}

impl<'a> LayoutRequest<'a> {
    /// Build a request from a text entity's props and its unscaled box.
    #[must_use]
    pub fn from_props(props: &'a TextProps, width: f64, height: f64) -> Self {
        Self {
            text: &props.text,
            width,
            height,
            font_size: props.font_size,
            font_family: &props.font_family,
            font_weight: &props.font_weight,
            font_style: &props.font_style,
            line_height: props.line_height,
            vertical_align: props.vertical_align,
        }
    }
}

/// Result of a layout pass, in the box's local frame (origin at center).
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    pub font_size: f64,
    /// CSS font shorthand at `font_size`.
    pub font: String,
    pub lines: Vec<String>,
    /// Distance between baselines in pixels.
    pub line_height_px: f64,
    pub total_height: f64,
    /// Local y of the top of the first line.
    pub start_y: f64,
    /// False when even the floor size could not avoid an over-wide word.
    pub fits_width: bool,
}

/// Lay out `req`, shrinking the font 1px at a time until the wrapped block
/// fits the box height or the 8px floor is reached.
///
/// Always returns at least one line and a font size of at least 8px.
#[must_use]
pub fn autofit_layout(req: &LayoutRequest<'_>, measure: &dyn TextMeasure) -> TextLayout {
    let line_height = if req.line_height.is_finite() && req.line_height > 0.0 { req.line_height } else { 1.0 };
    let mut size = if req.font_size.is_finite() { req.font_size.max(MIN_FONT_SIZE) } else { MIN_FONT_SIZE };

    let mut best: Option<(f64, Vec<String>)> = None;
    for _ in 0..AUTOFIT_MAX_STEPS {
        let font = font_css(req.font_style, req.font_weight, size, req.font_family);
        if let Some(lines) = wrap_lines(req.text, req.width, &font, measure, true) {
            let total = block_height(lines.len(), size, line_height);
            best = Some((size, lines));
            if total <= req.height {
                break;
            }
        }
        if size <= MIN_FONT_SIZE {
            break;
        }
        size = (size - 1.0).max(MIN_FONT_SIZE);
    }

    let (font_size, lines, fits_width) = match best {
        Some((size, lines)) => (size, lines, true),
        None => {
            let font = font_css(req.font_style, req.font_weight, MIN_FONT_SIZE, req.font_family);
            let lines = wrap_lines(req.text, req.width, &font, measure, false).unwrap_or_else(|| vec![String::new()]);
            (MIN_FONT_SIZE, lines, false)
        }
    };

    let line_height_px = font_size * line_height;
    let total_height = block_height(lines.len(), font_size, line_height);
    let start_y = match req.vertical_align {
        VerticalAlign::Top => -req.height / 2.0,
        VerticalAlign::Middle => -total_height / 2.0,
        VerticalAlign::Bottom => req.height / 2.0 - total_height,
    };

    TextLayout {
        font_size,
        font: font_css(req.font_style, req.font_weight, font_size, req.font_family),
        lines,
        line_height_px,
        total_height,
        start_y,
        fits_width,
    }
}

#[allow(clippy::cast_precision_loss)]
fn block_height(line_count: usize, font_size: f64, line_height: f64) -> f64 {
    line_count as f64 * font_size * line_height
}

/// Greedy word wrap per `\n` paragraph.
///
/// In strict mode a single word wider than `max_width` fails the whole wrap.
/// Otherwise such a word is placed on a line of its own.
fn wrap_lines(
    text: &str,
    max_width: f64,
    font: &str,
    measure: &dyn TextMeasure,
    strict: bool,
) -> Option<Vec<String>> {
    let mut out = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        let mut emitted = 0usize;
        for word in paragraph.split_whitespace() {
            if measure.text_width(word, font) > max_width {
                if strict {
                    return None;
                }
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                    emitted += 1;
                }
                out.push(word.to_owned());
                emitted += 1;
                continue;
            }
            if current.is_empty() {
                current.push_str(word);
                continue;
            }
            let candidate = format!("{current} {word}");
            if measure.text_width(&candidate, font) <= max_width {
                current = candidate;
            } else {
                out.push(std::mem::replace(&mut current, word.to_owned()));
                emitted += 1;
            }
        }
        if !current.is_empty() || emitted == 0 {
            out.push(current);
        }
    }
    Some(out)
}

/// CSS font shorthand, e.g. `normal bold 40px Impact`.
///
/// Families containing spaces are quoted unless already quoted or a list.
#[must_use]
pub fn font_css(style: &str, weight: &str, size: f64, family: &str) -> String {
    let family = family.trim();
    let needs_quotes = family.contains(' ') && !family.contains(',') && !family.starts_with(['"', '\'']);
    if needs_quotes {
        format!("{style} {weight} {size}px \"{family}\"")
    } else {
        format!("{style} {weight} {size}px {family}")
    }
}

/// Map a text stroke intensity (0-10) to a pixel line width at `font_size`.
#[must_use]
pub fn text_stroke_px(intensity: f64, font_size: f64) -> f64 {
    if !intensity.is_finite() || intensity <= 0.0 || !font_size.is_finite() || font_size <= 0.0 {
        return 0.0;
    }
    let intensity = intensity.min(MAX_STROKE_INTENSITY);
    (intensity * font_size * STROKE_PER_INTENSITY).min(font_size * MAX_STROKE_RATIO)
}

/// Local x of each line's anchor and the canvas `textAlign` value to paint with.
#[must_use]
pub fn line_anchor(align: TextAlign, width: f64) -> (f64, &'static str) {
    match align {
        TextAlign::Left => (-width / 2.0, "left"),
        TextAlign::Center => (0.0, "center"),
        TextAlign::Right => (width / 2.0, "right"),
    }
}
