//! Rich text content - characters, paragraphs and text flows
//!
//! Text content is not a command of its own; boxes and table cells embed it
//! and serialize it into their `values` payload.

use crate::html::{ContentFactory, HtmlFragmentParser};
use crate::{Command, ImageBox, ImageRegistry, RenderContext, Result};
use regex_lite::Regex;
use serde_json::{json, Map, Value};
use std::sync::OnceLock;

fn html_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<\s*/?\s*[A-Za-z][A-Za-z0-9]*[^>]*>").unwrap())
}

fn blank_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\n[ \t]*\n").unwrap())
}

/// Whether a string contains at least one HTML tag
pub fn looks_like_html(value: &str) -> bool {
    html_tag_pattern().is_match(value)
}

// =============================================================================
// Characters
// =============================================================================

/// A run of text with one character style
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Characters {
    pub text: String,
    pub style: Option<String>,
    pub hyperlink: Option<String>,
}

impl Characters {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn with_hyperlink(mut self, target: impl Into<String>) -> Self {
        self.hyperlink = Some(target.into());
        self
    }

    pub fn build(&self) -> Value {
        let mut out = Map::new();
        out.insert("text".into(), Value::String(self.text.clone()));
        if let Some(style) = &self.style {
            out.insert("cs".into(), Value::String(style.clone()));
        }
        if let Some(target) = &self.hyperlink {
            out.insert("hl".into(), Value::String(target.clone()));
        }
        Value::Object(out)
    }
}

// =============================================================================
// Paragraph
// =============================================================================

/// One entry of a paragraph
#[derive(Debug)]
pub enum ParagraphPart {
    Characters(Characters),
    Image(ImageBox),
}

/// Paragraph with a paragraph style and inline content
#[derive(Debug, Default)]
pub struct Paragraph {
    style: String,
    parts: Vec<ParagraphPart>,
}

impl Paragraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_style(style: impl Into<String>) -> Self {
        Self {
            style: style.into(),
            parts: Vec::new(),
        }
    }

    pub fn style(&self) -> &str {
        &self.style
    }

    pub fn set_style(&mut self, style: impl Into<String>) {
        self.style = style.into();
    }

    pub fn add_string(&mut self, text: impl Into<String>) -> &mut Self {
        self.add_characters(Characters::new(text))
    }

    pub fn add_characters(&mut self, characters: Characters) -> &mut Self {
        self.parts.push(ParagraphPart::Characters(characters));
        self
    }

    pub fn add_image(&mut self, image: ImageBox) -> &mut Self {
        self.parts.push(ParagraphPart::Image(image));
        self
    }

    pub fn parts(&self) -> &[ParagraphPart] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Plain text of all character runs
    pub fn plain_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ParagraphPart::Characters(chars) => Some(chars.text.as_str()),
                ParagraphPart::Image(_) => None,
            })
            .collect()
    }

    /// Assets used by inline images
    pub fn images(&self) -> ImageRegistry {
        let mut images = ImageRegistry::new();
        for part in &self.parts {
            if let ParagraphPart::Image(image) = part {
                images.extend(image.images().clone());
            }
        }
        images
    }

    pub fn missing_assets(&self) -> Vec<String> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ParagraphPart::Image(image) => Some(image.missing_assets()),
                ParagraphPart::Characters(_) => None,
            })
            .flatten()
            .collect()
    }

    /// Serialize as `{ps, chars}`; inline images get their own box ident
    pub fn build(&mut self, ctx: &mut RenderContext) -> Result<Value> {
        let mut chars = Vec::with_capacity(self.parts.len());
        for part in &mut self.parts {
            match part {
                ParagraphPart::Characters(characters) => chars.push(characters.build()),
                ParagraphPart::Image(image) => {
                    chars.push(json!({ "image": build_inline_image(image, ctx)? }));
                }
            }
        }
        Ok(json!({ "ps": self.style, "chars": chars }))
    }
}

/// Generated idents are not kept on the image, so a rebuild after a failed
/// add produces the same ident again
fn build_inline_image(image: &mut ImageBox, ctx: &mut RenderContext) -> Result<Value> {
    let generated = image.base().box_ident().is_none();
    let built = ctx
        .ensure_box_ident(&mut *image, &["inline"])
        .and_then(|_| {
            ctx.ensure_unique_box_ident(&*image);
            image.build_command(ctx, true)
        });
    if generated {
        image.base_mut().clear_box_ident();
    }
    built
}

// =============================================================================
// Text
// =============================================================================

/// Ordered sequence of paragraphs
#[derive(Debug, Default)]
pub struct Text {
    paragraphs: Vec<Paragraph>,
}

impl Text {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split plain text into paragraphs at blank lines
    pub fn from_plain(value: &str) -> Self {
        let normalized = value.replace("\r\n", "\n");
        let paragraphs = blank_line_pattern()
            .split(&normalized)
            .map(|chunk| chunk.trim_matches('\n'))
            .filter(|chunk| !chunk.is_empty())
            .map(|chunk| {
                let mut paragraph = Paragraph::new();
                paragraph.add_string(chunk);
                paragraph
            })
            .collect();
        Self { paragraphs }
    }

    /// Route HTML input through the fragment parser, plain text otherwise
    pub fn from_str_auto(
        value: &str,
        parser: &dyn HtmlFragmentParser,
        factory: &dyn ContentFactory,
    ) -> Self {
        if looks_like_html(value) {
            parser.parse(value, factory)
        } else {
            Self::from_plain(value)
        }
    }

    pub fn add_paragraph(&mut self, paragraph: Paragraph) -> &mut Self {
        self.paragraphs.push(paragraph);
        self
    }

    pub fn append(&mut self, other: Text) -> &mut Self {
        self.paragraphs.extend(other.paragraphs);
        self
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    pub fn images(&self) -> ImageRegistry {
        self.paragraphs.iter().flat_map(|p| p.images()).collect()
    }

    pub fn missing_assets(&self) -> Vec<String> {
        self.paragraphs.iter().flat_map(|p| p.missing_assets()).collect()
    }

    pub fn build(&mut self, ctx: &mut RenderContext) -> Result<Value> {
        let paragraphs = self
            .paragraphs
            .iter_mut()
            .map(|p| p.build(ctx))
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::Array(paragraphs))
    }
}

impl From<Paragraph> for Text {
    fn from(paragraph: Paragraph) -> Self {
        Self {
            paragraphs: vec![paragraph],
        }
    }
}
