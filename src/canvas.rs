use std::sync::Arc;

use crate::font::{DEFAULT_FONT_FAMILY, RegisteredFont};
use crate::path::DrawingContext;
use crate::types::{Color, Pt, Size};

/// One drawing operation in page space: points, origin at the top-left.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SaveState,
    RestoreState,
    Meta {
        key: String,
        value: String,
    },
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(Pt),
    SetDash {
        pattern: Vec<Pt>,
        phase: Pt,
    },
    SetOpacity {
        fill: f32,
        stroke: f32,
    },
    SetFontName(String),
    SetFontSize(Pt),
    ClipRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    MoveTo {
        x: Pt,
        y: Pt,
    },
    LineTo {
        x: Pt,
        y: Pt,
    },
    CurveTo {
        x1: Pt,
        y1: Pt,
        x2: Pt,
        y2: Pt,
        x: Pt,
        y: Pt,
    },
    ClosePath,
    Fill,
    Stroke,
    FillStroke,
    /// `y` is the top of the line box; the baseline sits one font size lower.
    DrawString {
        x: Pt,
        y: Pt,
        text: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub commands: Vec<Command>,
}

impl Page {
    fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    /// Values of every `Meta` command with the given key, in drawing order.
    pub fn meta_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.commands.iter().filter_map(move |cmd| match cmd {
            Command::Meta { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub page_size: Size,
    pub pages: Vec<Page>,
    pub fonts: Vec<Arc<RegisteredFont>>,
}

#[derive(Debug, Clone)]
struct GraphicsState {
    fill_color: Color,
    stroke_color: Color,
    line_width: Pt,
    font_size: Pt,
    font_name: String,
}

impl GraphicsState {
    fn initial() -> Self {
        Self {
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: Pt::from_f32(1.0),
            font_size: Pt::from_f32(12.0),
            font_name: DEFAULT_FONT_FAMILY.to_string(),
        }
    }
}

/// Records drawing commands page by page. Redundant state changes are
/// dropped so the PDF content stream stays small.
pub struct Canvas {
    page_size: Size,
    pages: Vec<Page>,
    current: Page,
    state_stack: Vec<GraphicsState>,
    current_state: GraphicsState,
    fonts: Vec<Arc<RegisteredFont>>,
}

impl Canvas {
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            pages: Vec::new(),
            current: Page::new(),
            state_stack: Vec::new(),
            current_state: GraphicsState::initial(),
            fonts: Vec::new(),
        }
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    /// Makes an embedded font program available to every page. Registering the
    /// same family twice keeps the first program.
    pub fn embed_font(&mut self, font: Arc<RegisteredFont>) {
        if self.fonts.iter().any(|f| f.family == font.family) {
            return;
        }
        self.fonts.push(font);
    }

    pub fn save_state(&mut self) {
        self.state_stack.push(self.current_state.clone());
        self.current.commands.push(Command::SaveState);
    }

    pub fn restore_state(&mut self) {
        if let Some(state) = self.state_stack.pop() {
            self.current_state = state;
            self.current.commands.push(Command::RestoreState);
        }
    }

    pub fn meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.current.commands.push(Command::Meta {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn set_fill_color(&mut self, color: Color) {
        if self.current_state.fill_color == color {
            return;
        }
        self.current_state.fill_color = color;
        self.current.commands.push(Command::SetFillColor(color));
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        if self.current_state.stroke_color == color {
            return;
        }
        self.current_state.stroke_color = color;
        self.current.commands.push(Command::SetStrokeColor(color));
    }

    pub fn set_line_width(&mut self, width: Pt) {
        let width = if width < Pt::ZERO { Pt::ZERO } else { width };
        if self.current_state.line_width == width {
            return;
        }
        self.current_state.line_width = width;
        self.current.commands.push(Command::SetLineWidth(width));
    }

    /// An empty pattern restores a solid line.
    pub fn set_dash(&mut self, pattern: Vec<Pt>, phase: Pt) {
        self.current
            .commands
            .push(Command::SetDash { pattern, phase });
    }

    pub fn set_opacity(&mut self, fill: f32, stroke: f32) {
        self.current.commands.push(Command::SetOpacity {
            fill: fill.clamp(0.0, 1.0),
            stroke: stroke.clamp(0.0, 1.0),
        });
    }

    pub fn set_font_name(&mut self, name: &str) {
        if self.current_state.font_name == name {
            return;
        }
        self.current_state.font_name = name.to_string();
        self.current
            .commands
            .push(Command::SetFontName(self.current_state.font_name.clone()));
    }

    pub fn set_font_size(&mut self, size: Pt) {
        if self.current_state.font_size == size {
            return;
        }
        self.current_state.font_size = size;
        self.current.commands.push(Command::SetFontSize(size));
    }

    pub fn clip_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.current.commands.push(Command::ClipRect {
            x,
            y,
            width,
            height,
        });
    }

    pub fn move_to(&mut self, x: Pt, y: Pt) {
        self.current.commands.push(Command::MoveTo { x, y });
    }

    pub fn line_to(&mut self, x: Pt, y: Pt) {
        self.current.commands.push(Command::LineTo { x, y });
    }

    pub fn curve_to(&mut self, x1: Pt, y1: Pt, x2: Pt, y2: Pt, x: Pt, y: Pt) {
        self.current.commands.push(Command::CurveTo {
            x1,
            y1,
            x2,
            y2,
            x,
            y,
        });
    }

    pub fn close_path(&mut self) {
        self.current.commands.push(Command::ClosePath);
    }

    pub fn fill(&mut self) {
        self.current.commands.push(Command::Fill);
    }

    pub fn stroke(&mut self) {
        self.current.commands.push(Command::Stroke);
    }

    pub fn fill_stroke(&mut self) {
        self.current.commands.push(Command::FillStroke);
    }

    pub fn draw_string(&mut self, x: Pt, y: Pt, text: impl Into<String>) {
        self.current.commands.push(Command::DrawString {
            x,
            y,
            text: text.into(),
        });
    }

    pub fn show_page(&mut self) {
        let current = std::mem::replace(&mut self.current, Page::new());
        self.pages.push(current);
        self.state_stack.clear();
        self.current_state = GraphicsState::initial();
    }

    pub fn current_command_count(&self) -> usize {
        self.current.commands.len()
    }

    pub fn is_current_empty(&self) -> bool {
        self.current.commands.is_empty()
    }

    /// Closes the last page. A document always has at least one page.
    pub fn finish(mut self) -> Document {
        if !self.current.commands.is_empty() || self.pages.is_empty() {
            self.show_page();
        }
        Document {
            page_size: self.page_size,
            pages: self.pages,
            fonts: self.fonts,
        }
    }
}

// Path drawing works in millimetres; the canvas stores points.
impl DrawingContext for Canvas {
    fn move_to(&mut self, x: f64, y: f64) {
        Canvas::move_to(self, Pt::from_mm(x), Pt::from_mm(y));
    }

    fn line_to(&mut self, x: f64, y: f64) {
        Canvas::line_to(self, Pt::from_mm(x), Pt::from_mm(y));
    }

    fn curve_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) {
        Canvas::curve_to(
            self,
            Pt::from_mm(x1),
            Pt::from_mm(y1),
            Pt::from_mm(x2),
            Pt::from_mm(y2),
            Pt::from_mm(x3),
            Pt::from_mm(y3),
        );
    }

    fn close_path(&mut self) {
        Canvas::close_path(self);
    }

    fn fill(&mut self) {
        Canvas::fill(self);
    }

    fn fill_stroke(&mut self) {
        Canvas::fill_stroke(self);
    }

    fn set_fill_color(&mut self, color: Color) {
        Canvas::set_fill_color(self, color);
    }

    fn set_stroke_color(&mut self, color: Color) {
        Canvas::set_stroke_color(self, color);
    }

    fn save_state(&mut self) {
        Canvas::save_state(self);
    }

    fn restore_state(&mut self) {
        Canvas::restore_state(self);
    }

    fn set_opacity(&mut self, opacity: f64) {
        let alpha = opacity as f32;
        Canvas::set_opacity(self, alpha, alpha);
    }

    fn clip_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        Canvas::clip_rect(
            self,
            Pt::from_mm(x),
            Pt::from_mm(y),
            Pt::from_mm(width),
            Pt::from_mm(height),
        );
    }
}
