use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};
use std::sync::Arc;

use fixed::types::I32F32;

use crate::canvas::{Command, Document, Page};
use crate::debug::DebugLogger;
use crate::font::{DEFAULT_FONT_FAMILY, RegisteredFont};
use crate::metrics::{DocumentMetrics, PageMetrics};
use crate::types::{Color, Pt};
use crate::winansi;

const PDF_HEADER: &[u8] = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n";

const CATALOG_ID: usize = 1;
const PAGE_TREE_ID: usize = 2;
const INFO_ID: usize = 3;
const RESOURCES_ID: usize = 4;
const FIRST_FREE_ID: usize = 5;

#[derive(Debug, Clone, Default)]
pub(crate) struct PdfOptions {
    pub document_title: Option<String>,
}

/// How one font name used on the canvas ends up in the file.
enum FontProgram<'a> {
    BuiltIn(&'static str),
    Embedded(&'a RegisteredFont),
}

struct FontResource {
    resource: String,
}

/// Serializes a recorded document. The whole file is built in memory;
/// nothing is returned unless every object was written.
pub(crate) fn document_to_pdf(
    document: &Document,
    metrics: Option<&mut DocumentMetrics>,
    options: &PdfOptions,
    debug: Option<&DebugLogger>,
) -> io::Result<Vec<u8>> {
    let mut objects: Vec<(usize, String)> = Vec::new();
    let mut next_id = FIRST_FREE_ID;

    let font_names = collect_used_font_names(document);
    let mut font_map: BTreeMap<String, FontResource> = BTreeMap::new();
    let mut font_resources: Vec<(String, usize)> = Vec::new();
    for (index, name) in font_names.iter().enumerate() {
        let resource = format!("F{}", index + 1);
        let (font_objects, font_id) = match resolve_font_program(name, &document.fonts) {
            FontProgram::Embedded(font) => build_truetype_font_objects(font, next_id),
            FontProgram::BuiltIn(base) => (vec![font_object(base)], next_id),
        };
        for (offset, body) in font_objects.into_iter().enumerate() {
            objects.push((next_id + offset, body));
        }
        next_id = font_id + 1;
        font_resources.push((resource.clone(), font_id));
        font_map.insert(name.clone(), FontResource { resource });
    }

    let (gs_objects, gs_resources, gs_map) = build_extgstate_objects(document, next_id);
    next_id += gs_objects.len();
    for (index, body) in gs_objects.into_iter().enumerate() {
        objects.push((gs_resources[index].1, body));
    }

    let mut replaced_chars = 0usize;
    let mut page_ids = Vec::with_capacity(document.pages.len());
    let mut content_sizes = Vec::with_capacity(document.pages.len());
    let media_box = format!(
        "[0 0 {} {}]",
        fmt_pt(document.page_size.width),
        fmt_pt(document.page_size.height)
    );
    for page in &document.pages {
        let content = render_page(
            page,
            document.page_size.height,
            &font_map,
            &gs_map,
            &mut replaced_chars,
        );
        content_sizes.push(content.len());
        let content_id = next_id;
        let page_id = next_id + 1;
        next_id += 2;
        objects.push((content_id, stream_object(&content)));
        objects.push((
            page_id,
            format!(
                "<< /Type /Page /Parent {} 0 R /MediaBox {} /Resources {} 0 R /Contents {} 0 R >>",
                PAGE_TREE_ID, media_box, RESOURCES_ID, content_id
            ),
        ));
        page_ids.push(page_id);
    }

    let kids = page_ids
        .iter()
        .map(|id| format!("{} 0 R", id))
        .collect::<Vec<_>>()
        .join(" ");
    objects.push((
        CATALOG_ID,
        format!("<< /Type /Catalog /Pages {} 0 R >>", PAGE_TREE_ID),
    ));
    objects.push((
        PAGE_TREE_ID,
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids,
            page_ids.len()
        ),
    ));
    objects.push((INFO_ID, info_object(options.document_title.as_deref())));
    objects.push((
        RESOURCES_ID,
        resources_object(&font_resources, &gs_resources),
    ));
    objects.sort_by_key(|(id, _)| *id);

    let bytes = write_pdf(&objects, next_id)?;

    if replaced_chars > 0 {
        if let Some(debug) = debug {
            debug.increment("pdf.winansi.replaced", replaced_chars as u64);
        }
    }

    if let Some(metrics) = metrics {
        metrics.total_bytes = bytes.len();
        for (page_index, page) in document.pages.iter().enumerate() {
            if metrics.pages.len() <= page_index {
                metrics
                    .pages
                    .resize_with(page_index + 1, PageMetrics::default);
            }
            let entry = &mut metrics.pages[page_index];
            entry.page_number = page_index + 1;
            entry.command_count = page.commands.len();
            entry.content_bytes = content_sizes[page_index];
        }
    }

    Ok(bytes)
}

fn write_pdf(objects: &[(usize, String)], size: usize) -> io::Result<Vec<u8>> {
    let mut out: Vec<u8> = Vec::new();
    let mut offset = 0usize;
    let mut offsets = vec![0usize; size];
    write_bytes(&mut out, PDF_HEADER, &mut offset)?;
    for (obj_id, body) in objects {
        write_pdf_object(&mut out, &mut offset, &mut offsets, *obj_id, body)?;
    }

    let xref_start = offset;
    write_str(&mut out, &format!("xref\n0 {}\n", size), &mut offset)?;
    write_str(&mut out, "0000000000 65535 f \n", &mut offset)?;
    for entry in offsets.iter().skip(1) {
        write_str(&mut out, &format!("{:010} 00000 n \n", entry), &mut offset)?;
    }
    write_str(
        &mut out,
        &format!(
            "trailer\n<< /Size {} /Root {} 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            size, CATALOG_ID, INFO_ID, xref_start
        ),
        &mut offset,
    )?;
    Ok(out)
}

fn write_pdf_object<W: Write>(
    writer: &mut W,
    offset: &mut usize,
    offsets: &mut [usize],
    obj_id: usize,
    body: &str,
) -> io::Result<()> {
    if let Some(slot) = offsets.get_mut(obj_id) {
        *slot = *offset;
    }
    write_str(writer, &format!("{} 0 obj\n", obj_id), offset)?;
    write_bytes(writer, body.as_bytes(), offset)?;
    write_bytes(writer, b"\nendobj\n", offset)?;
    Ok(())
}

fn write_bytes<W: Write>(writer: &mut W, data: &[u8], offset: &mut usize) -> io::Result<()> {
    writer.write_all(data)?;
    *offset += data.len();
    Ok(())
}

fn write_str<W: Write>(writer: &mut W, data: &str, offset: &mut usize) -> io::Result<()> {
    write_bytes(writer, data.as_bytes(), offset)
}

/// Every font name that a `DrawString` is actually shown in.
fn collect_used_font_names(document: &Document) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for page in &document.pages {
        let mut current = DEFAULT_FONT_FAMILY.to_string();
        let mut stack: Vec<String> = Vec::new();
        for cmd in &page.commands {
            match cmd {
                Command::SaveState => stack.push(current.clone()),
                Command::RestoreState => {
                    if let Some(name) = stack.pop() {
                        current = name;
                    }
                }
                Command::SetFontName(name) => current = name.clone(),
                Command::DrawString { .. } => {
                    names.insert(current.clone());
                }
                _ => {}
            }
        }
    }
    names
}

fn resolve_font_program<'a>(name: &str, fonts: &'a [Arc<RegisteredFont>]) -> FontProgram<'a> {
    let name = name.trim();
    if let Some(font) = fonts.iter().find(|f| f.family.eq_ignore_ascii_case(name)) {
        return FontProgram::Embedded(font.as_ref());
    }
    FontProgram::BuiltIn(base14_name(name))
}

fn base14_name(family: &str) -> &'static str {
    match family.trim().to_ascii_lowercase().as_str() {
        "times" | "times-roman" => "Times-Roman",
        "courier" => "Courier",
        _ => "Helvetica",
    }
}

/// Returns the program, descriptor and font dictionary; the font dictionary
/// id is the last one.
fn build_truetype_font_objects(font: &RegisteredFont, start_id: usize) -> (Vec<String>, usize) {
    let font_file_id = start_id;
    let descriptor_id = start_id + 1;
    let font_id = start_id + 2;
    (
        vec![
            font_file_object(&font.data),
            font_descriptor_object(font, font_file_id),
            truetype_font_object(font, descriptor_id),
        ],
        font_id,
    )
}

fn truetype_font_object(font: &RegisteredFont, descriptor_id: usize) -> String {
    let metrics = &font.metrics;
    let widths = metrics
        .widths
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "<< /Type /Font /Subtype /TrueType /BaseFont /{} /FirstChar {} /LastChar {} /Widths [{}] /FontDescriptor {} 0 R /Encoding /WinAnsiEncoding >>",
        font.postscript_name, metrics.first_char, metrics.last_char, widths, descriptor_id
    )
}

fn font_descriptor_object(font: &RegisteredFont, font_file_id: usize) -> String {
    let metrics = &font.metrics;
    let mut flags = 32;
    if metrics.is_fixed_pitch {
        flags |= 1;
    }
    format!(
        "<< /Type /FontDescriptor /FontName /{} /Flags {} /FontBBox [{} {} {} {}] /ItalicAngle {} /Ascent {} /Descent {} /CapHeight {} /StemV 80 /MissingWidth {} /FontFile2 {} 0 R >>",
        font.postscript_name,
        flags,
        metrics.bbox.0,
        metrics.bbox.1,
        metrics.bbox.2,
        metrics.bbox.3,
        metrics.italic_angle,
        metrics.ascent,
        metrics.descent,
        metrics.cap_height,
        metrics.missing_width,
        font_file_id
    )
}

fn font_file_object(data: &[u8]) -> String {
    let mut stream_data = ascii_hex_encode(data);
    stream_data.push('>');
    stream_data.push('\n');
    format!(
        "<< /Length {} /Length1 {} /Filter /ASCIIHexDecode >>\nstream\n{}endstream",
        stream_data.len(),
        data.len(),
        stream_data
    )
}

fn ascii_hex_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2 + data.len() / 32);
    for (index, byte) in data.iter().enumerate() {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02X}", byte);
        if index % 32 == 31 {
            out.push('\n');
        }
    }
    out
}

fn font_object(base: &str) -> String {
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
        base
    )
}

/// Opacity pairs quantized to thousandths, each backed by one `/GSn` state.
fn build_extgstate_objects(
    document: &Document,
    start_id: usize,
) -> (Vec<String>, Vec<(String, usize)>, BTreeMap<(u16, u16), String>) {
    let mut pairs: BTreeSet<(u16, u16)> = BTreeSet::new();
    for page in &document.pages {
        for cmd in &page.commands {
            if let Command::SetOpacity { fill, stroke } = cmd {
                pairs.insert((quantize_alpha(*fill), quantize_alpha(*stroke)));
            }
        }
    }

    let mut objects = Vec::new();
    let mut resources = Vec::new();
    let mut name_map = BTreeMap::new();
    for (index, (f, s)) in pairs.into_iter().enumerate() {
        let name = format!("GS{}", index + 1);
        objects.push(format!(
            "<< /Type /ExtGState /ca {} /CA {} >>",
            fmt(f as f32 / 1000.0),
            fmt(s as f32 / 1000.0)
        ));
        resources.push((name.clone(), start_id + index));
        name_map.insert((f, s), name);
    }
    (objects, resources, name_map)
}

fn quantize_alpha(value: f32) -> u16 {
    ((value * 1000.0).round() as i32).clamp(0, 1000) as u16
}

fn resources_object(fonts: &[(String, usize)], states: &[(String, usize)]) -> String {
    let mut entries = Vec::new();
    if !fonts.is_empty() {
        entries.push(format!("/Font {}", resource_dict(fonts)));
    }
    if !states.is_empty() {
        entries.push(format!("/ExtGState {}", resource_dict(states)));
    }
    format!("<< {} >>", entries.join(" "))
}

fn resource_dict(items: &[(String, usize)]) -> String {
    let entries = items
        .iter()
        .map(|(resource, id)| format!("/{} {} 0 R", resource, id))
        .collect::<Vec<_>>();
    format!("<< {} >>", entries.join(" "))
}

fn render_page(
    page: &Page,
    page_height: Pt,
    font_map: &BTreeMap<String, FontResource>,
    gs_map: &BTreeMap<(u16, u16), String>,
    replaced_chars: &mut usize,
) -> String {
    let mut out = String::new();
    let mut current_font_size = Pt::from_f32(12.0);
    let mut current_font_name = DEFAULT_FONT_FAMILY.to_string();
    let mut text_stack: Vec<(String, Pt)> = Vec::new();

    for cmd in &page.commands {
        match cmd {
            Command::SaveState => {
                text_stack.push((current_font_name.clone(), current_font_size));
                out.push_str("q\n");
            }
            Command::RestoreState => {
                if let Some((name, size)) = text_stack.pop() {
                    current_font_name = name;
                    current_font_size = size;
                }
                out.push_str("Q\n");
            }
            Command::Meta { .. } => {}
            Command::SetFillColor(color) => out.push_str(&color_to_pdf_fill(*color)),
            Command::SetStrokeColor(color) => out.push_str(&color_to_pdf_stroke(*color)),
            Command::SetLineWidth(width) => {
                out.push_str(&format!("{} w\n", fmt_pt(*width)));
            }
            Command::SetDash { pattern, phase } => {
                let items = pattern
                    .iter()
                    .map(|v| fmt_pt(*v))
                    .collect::<Vec<_>>()
                    .join(" ");
                out.push_str(&format!("[{}] {} d\n", items, fmt_pt(*phase)));
            }
            Command::SetOpacity { fill, stroke } => {
                let key = (quantize_alpha(*fill), quantize_alpha(*stroke));
                if let Some(name) = gs_map.get(&key) {
                    out.push_str(&format!("/{} gs\n", name));
                }
            }
            Command::SetFontName(name) => current_font_name = name.clone(),
            Command::SetFontSize(size) => current_font_size = *size,
            Command::ClipRect {
                x,
                y,
                width,
                height,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} re\nW\nn\n",
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - *height),
                    fmt_pt(*width),
                    fmt_pt(*height)
                ));
            }
            Command::MoveTo { x, y } => {
                out.push_str(&format!("{} {} m\n", fmt_pt(*x), fmt_pt(page_height - *y)));
            }
            Command::LineTo { x, y } => {
                out.push_str(&format!("{} {} l\n", fmt_pt(*x), fmt_pt(page_height - *y)));
            }
            Command::CurveTo {
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} {} {} c\n",
                    fmt_pt(*x1),
                    fmt_pt(page_height - *y1),
                    fmt_pt(*x2),
                    fmt_pt(page_height - *y2),
                    fmt_pt(*x),
                    fmt_pt(page_height - *y),
                ));
            }
            Command::ClosePath => out.push_str("h\n"),
            Command::Fill => out.push_str("f\n"),
            Command::Stroke => out.push_str("S\n"),
            Command::FillStroke => out.push_str("B\n"),
            Command::DrawString { x, y, text } => {
                let resource = font_map
                    .get(&current_font_name)
                    .map(|v| v.resource.as_str())
                    .unwrap_or("F1");
                let encoded = encode_winansi_pdf_string(text);
                *replaced_chars += encoded.replaced;
                out.push_str("BT\n");
                out.push_str(&format!("/{} {} Tf\n", resource, fmt_pt(current_font_size)));
                out.push_str(&format!(
                    "{} {} Td\n",
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - current_font_size)
                ));
                out.push_str(&format!("({}) Tj\n", encoded.text));
                out.push_str("ET\n");
            }
        }
    }

    out
}

fn stream_object(content: &str) -> String {
    format!(
        "<< /Length {} >>\nstream\n{}\nendstream",
        content.len(),
        content
    )
}

fn info_object(title: Option<&str>) -> String {
    match title {
        Some(title) => format!(
            "<< /Title ({}) /Producer (coupon-sheet) >>",
            encode_winansi_pdf_string(title).text
        ),
        None => "<< /Producer (coupon-sheet) >>".to_string(),
    }
}

struct WinAnsiEncoded {
    text: String,
    replaced: usize,
}

/// Escapes a string for a literal `( )` operand. Characters outside
/// cp1252 become `?`.
fn encode_winansi_pdf_string(input: &str) -> WinAnsiEncoded {
    let mut out = String::new();
    let mut replaced = 0usize;
    for ch in input.chars() {
        let byte = winansi::encode_char(ch).unwrap_or_else(|| {
            replaced += 1;
            b'?'
        });

        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b if b < 0x20 || b >= 0x7f => out.push_str(&format!("\\{:03o}", b)),
            b => out.push(b as char),
        }
    }

    WinAnsiEncoded {
        text: out,
        replaced,
    }
}

fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = I32F32::from_num(value);
    let scaled = (fixed * I32F32::from_num(1000)).round();
    let milli: i64 = scaled.to_num();
    format_milli(milli)
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        return format!("{}{}", sign, int_part);
    }
    let mut s = format!("{}{}.{:03}", sign, int_part, frac_part);
    while s.ends_with('0') {
        s.pop();
    }
    s
}

fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}

fn color_to_pdf_fill(color: Color) -> String {
    format!("{} {} {} rg\n", fmt(color.r), fmt(color.g), fmt(color.b))
}

fn color_to_pdf_stroke(color: Color) -> String {
    format!("{} {} {} RG\n", fmt(color.r), fmt(color.g), fmt(color.b))
}
