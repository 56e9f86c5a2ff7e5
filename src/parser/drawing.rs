//! DrawingML Parser
//!
//! Reads the shapes of an `xl/drawings/drawingN.xml` part in document order.
//! Group shapes are flattened: their children appear where the group does.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::XlteError;
use crate::model::{ModernShape, ModernShapeKind};

/// Text body of the `sp` element being read.
#[derive(Debug, Default)]
struct TextBody {
    paragraphs: Vec<String>,
    current: Option<String>,
    has_body: bool,
}

impl TextBody {
    fn into_text(self) -> Option<String> {
        if self.has_body {
            Some(self.paragraphs.join("\n"))
        } else {
            None
        }
    }
}

fn opaque_kind(element: &BytesStart<'_>) -> Option<ModernShapeKind> {
    match element.local_name().as_ref() {
        b"pic" => Some(ModernShapeKind::Picture),
        b"graphicFrame" => Some(ModernShapeKind::GraphicFrame),
        b"cxnSp" => Some(ModernShapeKind::Connector),
        _ => None,
    }
}

/// Parses a drawing part into its shapes.
///
/// `mc:Fallback` branches are skipped so shapes wrapped in
/// `mc:AlternateContent` are read once, from `mc:Choice`.
pub(crate) fn parse_drawing(xml: &[u8]) -> Result<Vec<ModernShape>, XlteError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(false);

    let mut buf = Vec::new();
    let mut shapes = Vec::new();
    // depth inside an element whose content is ignored (Fallback, pic, ...)
    let mut skip_depth = 0usize;
    let mut current: Option<TextBody> = None;
    let mut in_text_run = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;

        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
            continue;
        }

        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"Fallback" => skip_depth = 1,
                b"sp" => current = Some(TextBody::default()),
                b"txBody" => {
                    if let Some(body) = current.as_mut() {
                        body.has_body = true;
                    }
                }
                b"p" => {
                    if let Some(body) = current.as_mut() {
                        body.current = Some(String::new());
                    }
                }
                b"t" => in_text_run = current.is_some(),
                b"br" => push_line_break(&mut current),
                _ => {
                    if let Some(kind) = opaque_kind(&e) {
                        shapes.push(ModernShape { kind, text: None });
                        skip_depth = 1;
                    }
                }
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"br" => push_line_break(&mut current),
                b"p" => {
                    if let Some(body) = current.as_mut() {
                        body.paragraphs.push(String::new());
                    }
                }
                b"txBody" => {
                    if let Some(body) = current.as_mut() {
                        body.has_body = true;
                    }
                }
                b"sp" => shapes.push(ModernShape {
                    kind: ModernShapeKind::Simple,
                    text: None,
                }),
                _ => {
                    if let Some(kind) = opaque_kind(&e) {
                        shapes.push(ModernShape { kind, text: None });
                    }
                }
            },
            Event::Text(e) if in_text_run => {
                let text = e.unescape()?;
                if let Some(paragraph) = current.as_mut().and_then(|b| b.current.as_mut()) {
                    paragraph.push_str(&text);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => {
                    if let Some(body) = current.as_mut() {
                        if let Some(paragraph) = body.current.take() {
                            body.paragraphs.push(paragraph);
                        }
                    }
                }
                b"sp" => {
                    if let Some(body) = current.take() {
                        shapes.push(ModernShape {
                            kind: ModernShapeKind::Simple,
                            text: body.into_text(),
                        });
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(shapes)
}

fn push_line_break(current: &mut Option<TextBody>) {
    if let Some(paragraph) = current.as_mut().and_then(|b| b.current.as_mut()) {
        paragraph.push('\n');
    }
}
