use std::fmt;
use std::sync::Arc;

use crate::measure::TextMeasurer;
use crate::types::PT_TO_MM;

/// Font sizes are searched downwards in steps of this many points.
pub const FONT_SIZE_STEP_PT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextScaleParams<'a> {
    pub text: &'a str,
    pub box_width_mm: f64,
    pub box_height_mm: f64,
    pub font_size_pt: f64,
    pub font_name: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextScaleResult {
    pub font_size_pt: f64,
    pub lines: Vec<String>,
    pub fits: bool,
}

/// Finds the largest font size at which wrapped text fits a box.
#[derive(Clone)]
pub struct TextScaler {
    min_font_size_pt: f64,
    line_height_ratio: f64,
    measurer: Arc<dyn TextMeasurer>,
}

impl fmt::Debug for TextScaler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextScaler")
            .field("min_font_size_pt", &self.min_font_size_pt)
            .field("line_height_ratio", &self.line_height_ratio)
            .finish_non_exhaustive()
    }
}

impl TextScaler {
    pub fn new(
        min_font_size_pt: f64,
        line_height_ratio: f64,
        measurer: Arc<dyn TextMeasurer>,
    ) -> Self {
        Self {
            min_font_size_pt,
            line_height_ratio,
            measurer,
        }
    }

    pub fn min_font_size_pt(&self) -> f64 {
        self.min_font_size_pt
    }

    pub fn line_height_ratio(&self) -> f64 {
        self.line_height_ratio
    }

    /// Height in millimetres of one line at `font_size_pt`.
    pub fn line_height_mm(&self, font_size_pt: f64) -> f64 {
        font_size_pt * PT_TO_MM * self.line_height_ratio
    }

    pub fn measurer(&self) -> &Arc<dyn TextMeasurer> {
        &self.measurer
    }

    /// Shrinks from the requested size in [`FONT_SIZE_STEP_PT`] steps until
    /// the wrapped block fits. Never fails: when nothing fits, the wrap at the
    /// minimum size comes back with `fits == false`.
    pub fn compute_font_size(&self, params: &TextScaleParams<'_>) -> TextScaleResult {
        if params.text.is_empty() {
            return TextScaleResult {
                font_size_pt: params.font_size_pt,
                lines: Vec::new(),
                fits: true,
            };
        }

        let mut font_size = params.font_size_pt;
        while font_size >= self.min_font_size_pt && font_size > 0.0 {
            let lines = self.wrap_text(
                params.text,
                params.box_width_mm,
                font_size,
                params.font_name,
            );
            let total_height = lines.len() as f64 * self.line_height_mm(font_size);
            if total_height <= params.box_height_mm {
                return TextScaleResult {
                    font_size_pt: font_size,
                    lines,
                    fits: true,
                };
            }
            font_size -= FONT_SIZE_STEP_PT;
        }

        TextScaleResult {
            font_size_pt: self.min_font_size_pt,
            lines: self.wrap_text(
                params.text,
                params.box_width_mm,
                self.min_font_size_pt,
                params.font_name,
            ),
            fits: false,
        }
    }

    /// Greedy word wrap. Words wider than the box are split across lines,
    /// keeping at least one character per line.
    pub fn wrap_text(
        &self,
        text: &str,
        box_width_mm: f64,
        font_size_pt: f64,
        font_name: &str,
    ) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current = String::new();

        for word in text.split_whitespace() {
            let word_width = self
                .measurer
                .measure_text_width_mm(word, font_size_pt, font_name);
            if word_width > box_width_mm {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                self.force_break_word(word, box_width_mm, font_size_pt, font_name, &mut lines);
                continue;
            }

            if current.is_empty() {
                current.push_str(word);
                continue;
            }
            let candidate = format!("{current} {word}");
            let candidate_width =
                self.measurer
                    .measure_text_width_mm(&candidate, font_size_pt, font_name);
            if candidate_width <= box_width_mm {
                current = candidate;
            } else {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            }
        }

        if !current.is_empty() {
            lines.push(current);
        }
        lines
    }

    fn force_break_word(
        &self,
        word: &str,
        box_width_mm: f64,
        font_size_pt: f64,
        font_name: &str,
        lines: &mut Vec<String>,
    ) {
        let mut remaining = word;
        while !remaining.is_empty() {
            let boundaries: Vec<usize> = remaining
                .char_indices()
                .map(|(idx, _)| idx)
                .skip(1)
                .chain(std::iter::once(remaining.len()))
                .collect();
            // boundaries[0] is the end of the first char, which is always taken.
            let mut end = boundaries[0];
            for &candidate in boundaries.iter().rev() {
                let width = self.measurer.measure_text_width_mm(
                    &remaining[..candidate],
                    font_size_pt,
                    font_name,
                );
                if width <= box_width_mm {
                    end = candidate;
                    break;
                }
                if candidate == boundaries[0] {
                    break;
                }
            }
            lines.push(remaining[..end].to_string());
            remaining = &remaining[end..];
        }
    }
}
