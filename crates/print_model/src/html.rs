//! HTML fragment import
//!
//! Converts the small HTML subset produced by CMS rich-text editors into
//! [`Text`] and [`Table`] content. The parser never fails: unknown tags are
//! dropped and unbalanced markup is logged and tolerated.
//!
//! Content objects are created through a [`ContentFactory`], so projects can
//! map tags to their own paragraph and character styles.

use crate::{
    AssetProvider, Characters, GeneratorSettings, ImageBox, Paragraph, Result, RowType, Table,
    Text,
};
use regex_lite::Regex;
use std::sync::OnceLock;

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9]*)([^>]*?)(/?)>").unwrap())
}

fn attr_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"([A-Za-z-]+)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).unwrap()
    })
}

fn row_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").unwrap())
}

fn cell_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?is)<t([dh])[^>]*>(.*?)</t[dh]>").unwrap())
}

/// Inline formatting active for a run of characters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InlineFormat {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub superscript: bool,
    pub subscript: bool,
}

/// Creates the content objects the importer emits
pub trait ContentFactory {
    /// Character style name for a format; `None` keeps the paragraph default
    fn create_style(&self, format: InlineFormat) -> Option<String>;

    fn create_characters(
        &self,
        text: &str,
        style: Option<String>,
        hyperlink: Option<&str>,
    ) -> Characters;

    /// Paragraph for a block tag (`p`, `h1`, `li`, ...)
    fn create_paragraph(&self, block_tag: &str) -> Paragraph;

    /// Inline image for an `img` source; `None` drops the image
    fn create_image_box(&self, src: &str) -> Option<ImageBox>;

    fn create_text(&self) -> Text;
}

/// Turns an HTML fragment into text content
pub trait HtmlFragmentParser {
    fn parse(&self, html: &str, factory: &dyn ContentFactory) -> Text;
}

// =============================================================================
// Default factory
// =============================================================================

/// Maps tags to style names of the same name. Inline images use the
/// configured inline image element and image box defaults. `img` sources of
/// the form `asset:<id>` are resolved through the asset provider, others are
/// used as plain URLs.
pub struct DefaultContentFactory<'a> {
    settings: &'a GeneratorSettings,
    assets: Option<&'a dyn AssetProvider>,
}

impl<'a> DefaultContentFactory<'a> {
    pub fn new(settings: &'a GeneratorSettings) -> Self {
        Self {
            settings,
            assets: None,
        }
    }

    pub fn with_assets(mut self, assets: &'a dyn AssetProvider) -> Self {
        self.assets = Some(assets);
        self
    }
}

impl ContentFactory for DefaultContentFactory<'_> {
    fn create_style(&self, format: InlineFormat) -> Option<String> {
        let mut name = String::new();
        if format.bold {
            name.push_str("bold");
        }
        if format.italic {
            name.push_str("italic");
        }
        if format.underline {
            name.push_str("underline");
        }
        if format.superscript {
            name.push_str("superscript");
        }
        if format.subscript {
            name.push_str("subscript");
        }
        (!name.is_empty()).then_some(name)
    }

    fn create_characters(
        &self,
        text: &str,
        style: Option<String>,
        hyperlink: Option<&str>,
    ) -> Characters {
        Characters {
            text: text.to_string(),
            style,
            hyperlink: hyperlink.map(str::to_string),
        }
    }

    fn create_paragraph(&self, block_tag: &str) -> Paragraph {
        match block_tag {
            "p" | "div" | "" => Paragraph::new(),
            tag => Paragraph::with_style(tag),
        }
    }

    fn create_image_box(&self, src: &str) -> Option<ImageBox> {
        let mut image =
            ImageBox::configured(self.settings.inline_image_element.clone(), self.settings);
        let stored = match (src.strip_prefix("asset:"), self.assets) {
            (Some(asset_id), Some(assets)) => image.set_asset(asset_id, assets).map(|_| ()),
            _ => image.set_source(src),
        };
        match stored {
            Ok(()) => Some(image),
            Err(e) => {
                tracing::warn!("Dropping inline image '{}': {}", src, e);
                None
            }
        }
    }

    fn create_text(&self) -> Text {
        Text::new()
    }
}

// =============================================================================
// Parser
// =============================================================================

const BLOCK_TAGS: [&str; 10] = ["p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "li", "blockquote"];

/// Regex-driven parser for rich-text editor output
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleHtmlParser;

struct ParseState<'f> {
    factory: &'f dyn ContentFactory,
    text: Text,
    paragraph: Option<Paragraph>,
    format: InlineFormat,
    links: Vec<Option<String>>,
    open_tags: Vec<String>,
}

impl<'f> ParseState<'f> {
    fn new(factory: &'f dyn ContentFactory) -> Self {
        Self {
            factory,
            text: factory.create_text(),
            paragraph: None,
            format: InlineFormat::default(),
            links: Vec::new(),
            open_tags: Vec::new(),
        }
    }

    fn paragraph(&mut self) -> &mut Paragraph {
        let factory = self.factory;
        self.paragraph.get_or_insert_with(|| factory.create_paragraph(""))
    }

    fn finish_paragraph(&mut self) {
        if let Some(paragraph) = self.paragraph.take() {
            if !paragraph.is_empty() {
                self.text.add_paragraph(paragraph);
            }
        }
    }

    fn push_text(&mut self, raw: &str) {
        let decoded = decode_entities(&collapse_whitespace(raw));
        if decoded.is_empty() || (self.paragraph.is_none() && decoded.trim().is_empty()) {
            return;
        }
        let style = self.factory.create_style(self.format);
        let link = self.links.last().cloned().flatten();
        let characters = self
            .factory
            .create_characters(&decoded, style, link.as_deref());
        self.paragraph().add_characters(characters);
    }

    fn set_format(&mut self, tag: &str, on: bool) -> bool {
        match tag {
            "b" | "strong" => self.format.bold = on,
            "i" | "em" => self.format.italic = on,
            "u" => self.format.underline = on,
            "sup" => self.format.superscript = on,
            "sub" => self.format.subscript = on,
            _ => return false,
        }
        true
    }

    fn open(&mut self, tag: &str, attrs: &str, self_closing: bool) {
        if BLOCK_TAGS.contains(&tag) {
            self.finish_paragraph();
            self.paragraph = Some(self.factory.create_paragraph(tag));
        } else if tag == "br" {
            let characters = self.factory.create_characters("\n", None, None);
            self.paragraph().add_characters(characters);
            return;
        } else if tag == "img" {
            if let Some(src) = attribute(attrs, "src") {
                if let Some(image) = self.factory.create_image_box(&src) {
                    self.paragraph().add_image(image);
                }
            }
            return;
        } else if tag == "a" {
            self.links.push(attribute(attrs, "href"));
        } else if !self.set_format(tag, true) {
            tracing::trace!(tag, "ignoring unsupported tag");
            return;
        }
        if !self_closing {
            self.open_tags.push(tag.to_string());
        }
    }

    fn close(&mut self, tag: &str) {
        match self.open_tags.iter().rposition(|t| t == tag) {
            Some(index) => {
                self.open_tags.truncate(index);
            }
            None => {
                if BLOCK_TAGS.contains(&tag) || tag == "a" || self.set_format(tag, false) {
                    tracing::warn!(tag, "closing tag without matching opening tag");
                }
                return;
            }
        }
        if BLOCK_TAGS.contains(&tag) {
            self.finish_paragraph();
        } else if tag == "a" {
            self.links.pop();
        } else {
            self.set_format(tag, false);
        }
    }

    fn finish(mut self) -> Text {
        if !self.open_tags.is_empty() {
            tracing::warn!(open = ?self.open_tags, "unclosed tags in HTML fragment");
        }
        self.finish_paragraph();
        self.text
    }
}

impl HtmlFragmentParser for SimpleHtmlParser {
    fn parse(&self, html: &str, factory: &dyn ContentFactory) -> Text {
        let mut state = ParseState::new(factory);
        let mut cursor = 0;
        for captures in tag_pattern().captures_iter(html) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            state.push_text(&html[cursor..whole.start()]);
            cursor = whole.end();

            let closing = captures.get(1).is_some_and(|m| !m.as_str().is_empty());
            let tag = captures
                .get(2)
                .map(|m| m.as_str().to_ascii_lowercase())
                .unwrap_or_default();
            let attrs = captures.get(3).map_or("", |m| m.as_str());
            let self_closing = captures.get(4).is_some_and(|m| !m.as_str().is_empty());

            if closing {
                state.close(&tag);
            } else {
                state.open(&tag, attrs, self_closing);
            }
        }
        state.push_text(&html[cursor..]);
        state.finish()
    }
}

impl SimpleHtmlParser {
    /// Build a table frame from an HTML `<table>`. Columns are created as
    /// cells appear; rows made only of `th` cells become header rows.
    pub fn parse_table(
        &self,
        html: &str,
        element_name: &str,
        factory: &dyn ContentFactory,
    ) -> Result<Table> {
        let mut table = Table::new(element_name);
        table.set_parse_mode(true);
        for row in row_pattern().captures_iter(html) {
            let inner = row.get(1).map_or("", |m| m.as_str());
            let cells: Vec<(bool, &str)> = cell_pattern()
                .captures_iter(inner)
                .map(|cell| {
                    let header = cell.get(1).is_some_and(|m| m.as_str().eq_ignore_ascii_case("h"));
                    (header, cell.get(2).map_or("", |m| m.as_str()))
                })
                .collect();
            if cells.is_empty() {
                continue;
            }
            let row_type = if cells.iter().all(|(header, _)| *header) {
                RowType::Header
            } else {
                RowType::Body
            };
            table.new_row(row_type, None, false);
            for (_, content) in cells {
                table.add_cell(None, self.parse(content, factory))?;
            }
        }
        Ok(table)
    }
}

fn attribute(attrs: &str, name: &str) -> Option<String> {
    attr_pattern().captures_iter(attrs).find_map(|captures| {
        let key = captures.get(1)?.as_str();
        if !key.eq_ignore_ascii_case(name) {
            return None;
        }
        captures
            .get(2)
            .or_else(|| captures.get(3))
            .or_else(|| captures.get(4))
            .map(|m| decode_entities(m.as_str()))
    })
}

fn collapse_whitespace(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut last_space = false;
    for ch in value.chars() {
        if ch.is_whitespace() {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(ch);
            last_space = false;
        }
    }
    out
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&nbsp;", "\u{a0}")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AssetInfo, BoxDefaults, ImageRegistry, MasterLocaleMode, RenderContext};
    use serde_json::json;

    fn parse(html: &str) -> Text {
        let settings = GeneratorSettings::default();
        SimpleHtmlParser.parse(html, &DefaultContentFactory::new(&settings))
    }

    fn built(mut text: Text) -> serde_json::Value {
        let mut ctx = RenderContext::default();
        text.build(&mut ctx).unwrap()
    }

    #[test]
    fn test_paragraphs_and_inline_styles() {
        let text = parse("<p>Hello <b>bold <i>both</i></b></p><h2>Title</h2>");
        assert_eq!(
            built(text),
            json!([
                {"ps": "", "chars": [
                    {"text": "Hello "},
                    {"text": "bold ", "cs": "bold"},
                    {"text": "both", "cs": "bolditalic"}
                ]},
                {"ps": "h2", "chars": [{"text": "Title"}]}
            ])
        );
    }

    #[test]
    fn test_links_breaks_and_entities() {
        let text = parse(r#"Fish &amp; Chips<br/><a href="https://shop.test/?a=1&amp;b=2">buy</a>"#);
        assert_eq!(
            built(text),
            json!([{"ps": "", "chars": [
                {"text": "Fish & Chips"},
                {"text": "\n"},
                {"text": "buy", "hl": "https://shop.test/?a=1&b=2"}
            ]}])
        );
    }

    #[test]
    fn test_broken_markup_is_tolerated() {
        let text = parse("</b>text <span>kept</span><p>open");
        let plain: Vec<String> = text.paragraphs().iter().map(Paragraph::plain_text).collect();
        assert_eq!(plain, vec!["text kept", "open"]);
    }

    #[test]
    fn test_inline_asset_image() {
        let mut assets = ImageRegistry::new();
        assets.insert("5".into(), AssetInfo::new("5", "https://cms.example/5.jpg"));
        let settings = GeneratorSettings {
            inline_image_element: "inline".into(),
            ..GeneratorSettings::default()
        };
        let factory = DefaultContentFactory::new(&settings).with_assets(&assets);
        let text = SimpleHtmlParser.parse(r#"<p>logo <img src="asset:5"></p>"#, &factory);
        assert!(text.images().contains_key("5"));
        let out = built(text);
        assert_eq!(out[0]["chars"][1]["image"]["src"], "https://cms.example/5.jpg");
        assert_eq!(out[0]["chars"][1]["image"]["name"], "inline");
    }

    #[test]
    fn test_inline_image_uses_box_defaults() {
        let mut settings = GeneratorSettings::default();
        settings.set_box_defaults(
            "pbox",
            BoxDefaults {
                localized: true,
                use_master_locale_dimension: Some(MasterLocaleMode::Position),
            },
        );
        let factory = DefaultContentFactory::new(&settings);
        let text = SimpleHtmlParser.parse(r#"<p><img src="https://cdn.test/a.png"></p>"#, &factory);
        let out = built(text);
        let image = &out[0]["chars"][0]["image"];
        assert_eq!(image["name"], "image");
        assert_eq!(image["localized"], true);
        assert_eq!(image["useMasterLocaleDimension"], "position");
        assert_eq!(image["src"], "https://cdn.test/a.png");
    }

    #[test]
    fn test_auto_detection() {
        let settings = GeneratorSettings::default();
        let factory = DefaultContentFactory::new(&settings);
        let html = Text::from_str_auto("<p>a</p><p>b</p>", &SimpleHtmlParser, &factory);
        assert_eq!(html.paragraphs().len(), 2);
        let plain = Text::from_str_auto("a\n\nb\n\nc", &SimpleHtmlParser, &factory);
        assert_eq!(plain.paragraphs().len(), 3);
    }

    #[test]
    fn test_parse_table() {
        let html = "<table><thead><tr><th>Name</th><th>Price</th></tr></thead>\
                    <tbody><tr><td>Tea</td><td><b>2.50</b></td></tr>\
                    <tr><td>Cake</td></tr></tbody></table>";
        let settings = GeneratorSettings::default();
        let factory = DefaultContentFactory::new(&settings);
        let mut table = SimpleHtmlParser.parse_table(html, "prices", &factory).unwrap();
        assert_eq!(table.columns().len(), 2);

        let mut ctx = RenderContext::default();
        use crate::Command;
        let out = table.build_command(&mut ctx, true).unwrap();
        let rows = out["values"]["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["type"], "header");
        assert_eq!(rows[1]["cols"][1]["content"][0]["chars"][0]["cs"], "bold");
        assert!(rows[2]["cols"][1].is_null());
    }
}
