//! Interpreter for compact vector path data (`M/m L/l C/c Q/q A/a Z/z`).
//!
//! Paths are replayed into a [`DrawingContext`] after mapping their view-box
//! coordinates onto a destination rectangle in millimetres. Each axis is
//! scaled independently; aspect ratio is not preserved. Elliptical arcs are
//! drawn as a straight segment to the arc's end point.

use crate::assets::{PathData, PatternAsset};
use crate::types::Color;

/// The drawing surface a path is replayed into. Coordinates are millimetres
/// from the top-left corner of the page.
pub trait DrawingContext {
    fn move_to(&mut self, x: f64, y: f64);
    fn line_to(&mut self, x: f64, y: f64);
    fn curve_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64);
    fn close_path(&mut self);
    fn fill(&mut self);
    fn fill_stroke(&mut self);
    fn set_fill_color(&mut self, color: Color);
    fn set_stroke_color(&mut self, color: Color);
    fn save_state(&mut self);
    fn restore_state(&mut self);
    /// Applies one alpha to both fill and stroke until the state is restored.
    fn set_opacity(&mut self, opacity: f64);
    /// Intersects the clip with a rectangle. The current path is discarded.
    fn clip_rect(&mut self, x: f64, y: f64, width: f64, height: f64);
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathCommand {
    pub command: char,
    pub args: Vec<f64>,
}

impl PathCommand {
    /// Missing trailing arguments read as zero.
    fn arg(&self, index: usize) -> f64 {
        self.args.get(index).copied().unwrap_or(0.0)
    }

    fn is_relative(&self) -> bool {
        self.command.is_ascii_lowercase()
    }
}

fn arg_count(command: char) -> usize {
    match command.to_ascii_uppercase() {
        'M' | 'L' => 2,
        'C' => 6,
        'Q' => 4,
        'A' => 7,
        _ => 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Command(char),
    Number(f64),
}

fn tokenize(d: &str) -> Vec<Token> {
    let bytes = d.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if matches!(
            b,
            b'M' | b'm' | b'L' | b'l' | b'C' | b'c' | b'Q' | b'q' | b'A' | b'a' | b'Z' | b'z'
        ) {
            tokens.push(Token::Command(b as char));
            i += 1;
            continue;
        }
        match scan_number(bytes, i) {
            Some(end) => {
                if let Ok(value) = d[i..end].parse::<f64>() {
                    tokens.push(Token::Number(value));
                }
                i = end;
            }
            None => i += 1,
        }
    }
    tokens
}

/// Returns the end of a number starting at `start`: an optional sign, then
/// `digits[.digits]` or `.digits`. Exponents are not part of the grammar.
fn scan_number(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start;
    if matches!(bytes.get(i), Some(b'+') | Some(b'-')) {
        i += 1;
    }
    let int_start = i;
    while bytes.get(i).is_some_and(u8::is_ascii_digit) {
        i += 1;
    }
    if i > int_start {
        if bytes.get(i) == Some(&b'.') {
            i += 1;
            while bytes.get(i).is_some_and(u8::is_ascii_digit) {
                i += 1;
            }
        }
        return Some(i);
    }
    if bytes.get(i) == Some(&b'.') && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
        i += 1;
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        return Some(i);
    }
    None
}

/// Splits path data into commands with their fixed argument counts.
///
/// Numbers beyond a command's count are ignored; a command cut short at the
/// end of the data keeps whatever arguments were present.
pub fn parse_path(d: &str) -> Vec<PathCommand> {
    let tokens = tokenize(d);
    let mut commands = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let Token::Command(command) = tokens[i] else {
            i += 1;
            continue;
        };
        let wanted = arg_count(command);
        let args: Vec<f64> = tokens[i + 1..]
            .iter()
            .take(wanted)
            .map_while(|token| match token {
                Token::Number(value) => Some(*value),
                Token::Command(_) => None,
            })
            .collect();
        i += 1 + args.len();
        commands.push(PathCommand { command, args });
    }
    commands
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBox {
    pub min_x: f64,
    pub min_y: f64,
    pub width: f64,
    pub height: f64,
}

/// Parses `"min-x min-y width height"`. A missing, zero, negative or
/// unparseable extent reads as 1 so that scaling stays finite.
pub fn parse_view_box(view_box: &str) -> ViewBox {
    let parts: Vec<Option<f64>> = view_box
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect();
    let part = |index: usize| parts.get(index).copied().flatten();
    let extent = |index: usize| part(index).filter(|v| *v > 0.0).unwrap_or(1.0);
    ViewBox {
        min_x: part(0).unwrap_or(0.0),
        min_y: part(1).unwrap_or(0.0),
        width: extent(2),
        height: extent(3),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawPathParams {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub fill_color: Color,
    pub stroke_color: Option<Color>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TiledPatternParams {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: Color,
}

/// A point in the path's own coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Point {
    x: f64,
    y: f64,
}

impl Point {
    fn offset(self, dx: f64, dy: f64) -> Point {
        Point {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// View-box to destination mapping: `coord * scale + offset` per axis.
#[derive(Debug, Clone, Copy)]
struct Mapping {
    offset_x: f64,
    offset_y: f64,
    scale_x: f64,
    scale_y: f64,
}

impl Mapping {
    fn apply(&self, p: Point) -> (f64, f64) {
        (
            p.x * self.scale_x + self.offset_x,
            p.y * self.scale_y + self.offset_y,
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PathRenderer;

impl PathRenderer {
    pub fn new() -> Self {
        PathRenderer
    }

    /// Draws `path` scaled into the destination rectangle and paints it with
    /// one fill, or fill and stroke when a stroke colour is given.
    pub fn draw_path<C: DrawingContext + ?Sized>(
        &self,
        ctx: &mut C,
        path: &PathData,
        params: &DrawPathParams,
    ) {
        let commands = parse_path(&path.d);
        if commands.is_empty() {
            return;
        }
        let view_box = parse_view_box(&path.view_box);
        let mapping = Mapping {
            offset_x: params.x,
            offset_y: params.y,
            scale_x: params.width / view_box.width,
            scale_y: params.height / view_box.height,
        };

        ctx.set_fill_color(params.fill_color);
        if let Some(stroke) = params.stroke_color {
            ctx.set_stroke_color(stroke);
        }

        commands.iter().fold(Point::default(), |current, command| {
            execute(&mut *ctx, command, &mapping, current)
        });

        if params.stroke_color.is_some() {
            ctx.fill_stroke();
        } else {
            ctx.fill();
        }
    }

    /// Repeats `pattern` over the rectangle at the pattern's opacity. Tiles on
    /// the far edges may overhang; the clip keeps them inside.
    pub fn draw_tiled_pattern<C: DrawingContext + ?Sized>(
        &self,
        ctx: &mut C,
        pattern: &PatternAsset,
        params: &TiledPatternParams,
    ) {
        let tile_w = pattern.tile_width_mm;
        let tile_h = pattern.tile_height_mm;
        if !(tile_w > 0.0 && tile_h > 0.0) || !(params.width > 0.0 && params.height > 0.0) {
            return;
        }

        ctx.save_state();
        ctx.set_opacity(pattern.opacity);
        ctx.clip_rect(params.x, params.y, params.width, params.height);

        let cols = (params.width / tile_w).ceil() as usize;
        let rows = (params.height / tile_h).ceil() as usize;
        for row in 0..rows {
            for col in 0..cols {
                self.draw_path(
                    ctx,
                    &pattern.path,
                    &DrawPathParams {
                        x: params.x + col as f64 * tile_w,
                        y: params.y + row as f64 * tile_h,
                        width: tile_w,
                        height: tile_h,
                        fill_color: params.color,
                        stroke_color: None,
                    },
                );
            }
        }

        ctx.restore_state();
    }
}

/// Emits one command and returns the new current point.
fn execute<C: DrawingContext + ?Sized>(
    ctx: &mut C,
    command: &PathCommand,
    mapping: &Mapping,
    current: Point,
) -> Point {
    let base = if command.is_relative() {
        current
    } else {
        Point::default()
    };
    let point = |ix: usize, iy: usize| base.offset(command.arg(ix), command.arg(iy));

    match command.command.to_ascii_uppercase() {
        'M' => {
            let p = point(0, 1);
            let (x, y) = mapping.apply(p);
            ctx.move_to(x, y);
            p
        }
        'L' => {
            let p = point(0, 1);
            let (x, y) = mapping.apply(p);
            ctx.line_to(x, y);
            p
        }
        'C' => {
            let (c1, c2, end) = (point(0, 1), point(2, 3), point(4, 5));
            emit_curve(ctx, mapping, c1, c2, end);
            end
        }
        'Q' => {
            let (q, end) = (point(0, 1), point(2, 3));
            let c1 = Point {
                x: current.x + 2.0 / 3.0 * (q.x - current.x),
                y: current.y + 2.0 / 3.0 * (q.y - current.y),
            };
            let c2 = Point {
                x: end.x + 2.0 / 3.0 * (q.x - end.x),
                y: end.y + 2.0 / 3.0 * (q.y - end.y),
            };
            emit_curve(ctx, mapping, c1, c2, end);
            end
        }
        'A' => {
            let end = point(5, 6);
            let (x, y) = mapping.apply(end);
            ctx.line_to(x, y);
            end
        }
        'Z' => {
            ctx.close_path();
            current
        }
        _ => current,
    }
}

fn emit_curve<C: DrawingContext + ?Sized>(
    ctx: &mut C,
    mapping: &Mapping,
    c1: Point,
    c2: Point,
    end: Point,
) {
    let (x1, y1) = mapping.apply(c1);
    let (x2, y2) = mapping.apply(c2);
    let (x3, y3) = mapping.apply(end);
    ctx.curve_to(x1, y1, x2, y2, x3, y3);
}

#[cfg(test)]
pub(crate) mod testing {
    use super::DrawingContext;
    use crate::types::Color;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Op {
        MoveTo(f64, f64),
        LineTo(f64, f64),
        CurveTo(f64, f64, f64, f64, f64, f64),
        ClosePath,
        Fill,
        FillStroke,
        FillColor(Color),
        StrokeColor(Color),
        Save,
        Restore,
        Opacity(f64),
        Clip(f64, f64, f64, f64),
    }

    /// Records every call so tests can compare exact coordinates.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingContext {
        pub ops: Vec<Op>,
    }

    impl RecordingContext {
        pub fn count(&self, pred: impl Fn(&Op) -> bool) -> usize {
            self.ops.iter().filter(|op| pred(op)).count()
        }

        pub fn first_move(&self) -> Option<(f64, f64)> {
            self.ops.iter().find_map(|op| match op {
                Op::MoveTo(x, y) => Some((*x, *y)),
                _ => None,
            })
        }
    }

    impl DrawingContext for RecordingContext {
        fn move_to(&mut self, x: f64, y: f64) {
            self.ops.push(Op::MoveTo(x, y));
        }
        fn line_to(&mut self, x: f64, y: f64) {
            self.ops.push(Op::LineTo(x, y));
        }
        fn curve_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) {
            self.ops.push(Op::CurveTo(x1, y1, x2, y2, x3, y3));
        }
        fn close_path(&mut self) {
            self.ops.push(Op::ClosePath);
        }
        fn fill(&mut self) {
            self.ops.push(Op::Fill);
        }
        fn fill_stroke(&mut self) {
            self.ops.push(Op::FillStroke);
        }
        fn set_fill_color(&mut self, color: Color) {
            self.ops.push(Op::FillColor(color));
        }
        fn set_stroke_color(&mut self, color: Color) {
            self.ops.push(Op::StrokeColor(color));
        }
        fn save_state(&mut self) {
            self.ops.push(Op::Save);
        }
        fn restore_state(&mut self) {
            self.ops.push(Op::Restore);
        }
        fn set_opacity(&mut self, opacity: f64) {
            self.ops.push(Op::Opacity(opacity));
        }
        fn clip_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
            self.ops.push(Op::Clip(x, y, width, height));
        }
    }
}
