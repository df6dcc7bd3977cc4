//! Table frames - columns, rows and cells
//!
//! Columns and rows accumulate through explicit calls. A row is kept in a
//! working buffer until the next row starts or the table is serialized. The
//! serialized grid is column-ordered; cells missing from a row are `null`.
//!
//! In parse mode (used by the HTML importer) unknown columns are created on
//! the fly instead of failing.

use crate::boxes::BoxCore;
use crate::{
    Command, CommandCore, GeneratorSettings, ImageRegistry, ModelError, Paragraph, RenderContext,
    Result, Text,
};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

const WORKING_PARAMS: [&str; 4] = ["tableStyle", "fit", "lineHeight", "rowHeight"];

/// Section of the table a row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowType {
    #[default]
    Body,
    Header,
    Footer,
}

impl RowType {
    pub fn as_str(self) -> &'static str {
        match self {
            RowType::Body => "body",
            RowType::Header => "header",
            RowType::Footer => "footer",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "body" => Ok(RowType::Body),
            "header" => Ok(RowType::Header),
            "footer" => Ok(RowType::Footer),
            other => Err(ModelError::invalid(
                "rowType",
                format!("'{}' is not one of body, header, footer", other),
            )),
        }
    }
}

/// Column definition
#[derive(Debug, Clone, PartialEq)]
pub struct TableColumn {
    pub ident: String,
    pub width: Option<f64>,
    pub style: Option<String>,
}

/// Content accepted by [`Table::add_cell`]
#[derive(Debug)]
pub struct CellContent(Text);

impl From<Text> for CellContent {
    fn from(text: Text) -> Self {
        CellContent(text)
    }
}

impl From<Paragraph> for CellContent {
    fn from(paragraph: Paragraph) -> Self {
        CellContent(Text::from(paragraph))
    }
}

impl From<&str> for CellContent {
    fn from(value: &str) -> Self {
        CellContent(Text::from_plain(value))
    }
}

impl From<String> for CellContent {
    fn from(value: String) -> Self {
        CellContent(Text::from_plain(&value))
    }
}

impl From<f64> for CellContent {
    fn from(value: f64) -> Self {
        CellContent(Text::from_plain(&value.to_string()))
    }
}

impl From<i64> for CellContent {
    fn from(value: i64) -> Self {
        CellContent(Text::from_plain(&value.to_string()))
    }
}

#[derive(Debug)]
struct TableCell {
    content: Text,
    style: Option<String>,
}

impl TableCell {
    fn build(&mut self, ctx: &mut RenderContext) -> Result<Value> {
        let mut out = Map::new();
        out.insert("content".into(), self.content.build(ctx)?);
        if let Some(style) = &self.style {
            out.insert("style".into(), Value::String(style.clone()));
        }
        Ok(Value::Object(out))
    }
}

/// A finished or in-progress row
#[derive(Debug, Default)]
pub struct TableRow {
    pub height: Option<f64>,
    pub exact_height: bool,
    pub row_type: RowType,
    cells: BTreeMap<String, TableCell>,
}

impl TableRow {
    pub fn new(row_type: RowType, height: Option<f64>, exact_height: bool) -> Self {
        Self {
            height,
            exact_height,
            row_type,
            cells: BTreeMap::new(),
        }
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn has_cell(&self, column: &str) -> bool {
        self.cells.contains_key(column)
    }
}

/// Table frame
#[derive(Debug)]
pub struct Table {
    base: BoxCore,
    columns: Vec<TableColumn>,
    rows: Vec<TableRow>,
    current: Option<TableRow>,
    parse_mode: bool,
    images: ImageRegistry,
    missing: Vec<String>,
}

impl Table {
    pub const KIND: &'static str = "table";

    pub fn new(element_name: impl Into<String>) -> Self {
        Self::from_base(BoxCore::new(Self::KIND, element_name))
    }

    pub fn configured(element_name: impl Into<String>, settings: &GeneratorSettings) -> Self {
        Self::from_base(BoxCore::configured(Self::KIND, element_name, settings))
    }

    fn from_base(mut base: BoxCore) -> Self {
        let core = base.core_mut();
        for param in WORKING_PARAMS {
            core.define(param, Value::Null);
        }
        core.define("values", Value::Null);
        Self {
            base,
            columns: Vec::new(),
            rows: Vec::new(),
            current: None,
            parse_mode: false,
            images: ImageRegistry::new(),
            missing: Vec::new(),
        }
    }

    pub fn base(&self) -> &BoxCore {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut BoxCore {
        &mut self.base
    }

    pub fn set_table_style(&mut self, style: impl Into<String>) -> Result<()> {
        self.base.core_mut().set_param("tableStyle", style.into())
    }

    /// Fit the table width to its frame
    pub fn set_fit(&mut self, fit: bool) -> Result<()> {
        self.base.core_mut().set_param("fit", fit)
    }

    pub fn set_line_height(&mut self, height: f64) -> Result<()> {
        self.base.core_mut().set_param("lineHeight", height)
    }

    pub fn set_row_height(&mut self, height: f64) -> Result<()> {
        self.base.core_mut().set_param("rowHeight", height)
    }

    pub fn set_parse_mode(&mut self, parse_mode: bool) {
        self.parse_mode = parse_mode;
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    /// Finished rows, excluding the row currently being built
    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    /// Add an auto-numbered column (`col1`, `col2`, ...) and return its ident
    pub fn add_column(&mut self, width: Option<f64>, style: Option<&str>) -> String {
        let mut n = self.columns.len() + 1;
        let mut ident = format!("col{}", n);
        while self.column_index(&ident).is_some() {
            n += 1;
            ident = format!("col{}", n);
        }
        self.columns.push(TableColumn {
            ident: ident.clone(),
            width,
            style: style.map(str::to_string),
        });
        ident
    }

    pub fn add_named_column(
        &mut self,
        ident: impl Into<String>,
        width: Option<f64>,
        style: Option<&str>,
    ) -> Result<()> {
        let ident = ident.into();
        if self.column_index(&ident).is_some() {
            return Err(ModelError::invalid("column", format!("'{}' already exists", ident)));
        }
        self.columns.push(TableColumn {
            ident,
            width,
            style: style.map(str::to_string),
        });
        Ok(())
    }

    fn column_index(&self, ident: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.ident == ident)
    }

    /// Close the current row and start a new one
    pub fn new_row(&mut self, row_type: RowType, height: Option<f64>, exact_height: bool) {
        self.finish_row();
        self.current = Some(TableRow::new(row_type, height, exact_height));
    }

    /// Move the row being built into the finished rows
    pub fn finish_row(&mut self) {
        if let Some(row) = self.current.take() {
            self.rows.push(row);
        }
    }

    /// Add a cell using the column's default style. Without a column ident
    /// the next free column of the row is used.
    pub fn add_cell(&mut self, column: Option<&str>, content: impl Into<CellContent>) -> Result<()> {
        self.add_cell_with_style(column, content, None, false)
    }

    /// Add a cell; `style` replaces the column style, or is appended to it
    /// when `append` is set
    pub fn add_cell_with_style(
        &mut self,
        column: Option<&str>,
        content: impl Into<CellContent>,
        style: Option<&str>,
        append: bool,
    ) -> Result<()> {
        if self.current.is_none() {
            self.current = Some(TableRow::default());
        }
        let cells_in_row = self.current.as_ref().map_or(0, TableRow::cell_count);

        let column_ident = match column {
            Some(ident) => match self.column_index(ident) {
                Some(_) => ident.to_string(),
                None if self.parse_mode => {
                    self.add_named_column(ident, None, None)?;
                    ident.to_string()
                }
                None => return Err(ModelError::UnknownColumn(ident.to_string())),
            },
            None => match self.columns.get(cells_in_row).map(|c| c.ident.clone()) {
                Some(ident) => ident,
                None if self.parse_mode => self.add_column(None, None),
                None => {
                    return Err(ModelError::RowOverflow {
                        columns: self.columns.len(),
                        cells: cells_in_row + 1,
                    })
                }
            },
        };

        let already_filled = self
            .current
            .as_ref()
            .is_some_and(|row| row.has_cell(&column_ident));
        if !already_filled && cells_in_row >= self.columns.len() {
            return Err(ModelError::RowOverflow {
                columns: self.columns.len(),
                cells: cells_in_row + 1,
            });
        }

        let column_style = self
            .column_index(&column_ident)
            .and_then(|i| self.columns[i].style.clone());
        let style = match (column_style, style) {
            (Some(base), Some(extra)) if append => Some(format!("{}{}", base, extra)),
            (_, Some(extra)) => Some(extra.to_string()),
            (base, None) => base,
        };

        let CellContent(content) = content.into();
        self.images.extend(content.images());
        self.missing.extend(content.missing_assets());

        if let Some(row) = self.current.as_mut() {
            row.cells.insert(column_ident, TableCell { content, style });
        }
        Ok(())
    }

    fn build_values(&mut self, ctx: &mut RenderContext) -> Result<Value> {
        let core = self.base.core();
        let mut values = Map::new();
        for param in WORKING_PARAMS {
            if let Ok(value) = core.param(param) {
                if !value.is_null() {
                    values.insert(param.to_string(), value.clone());
                }
            }
        }

        let columns: Vec<Value> = self
            .columns
            .iter()
            .map(|col| {
                let mut out = Map::new();
                out.insert("ident".into(), Value::String(col.ident.clone()));
                if let Some(width) = col.width {
                    out.insert("width".into(), Value::from(width));
                }
                if let Some(style) = &col.style {
                    out.insert("style".into(), Value::String(style.clone()));
                }
                Value::Object(out)
            })
            .collect();

        let mut rows = Vec::with_capacity(self.rows.len());
        for row in &mut self.rows {
            let mut cols = Vec::with_capacity(self.columns.len());
            for column in &self.columns {
                match row.cells.get_mut(&column.ident) {
                    Some(cell) => cols.push(cell.build(ctx)?),
                    None => cols.push(Value::Null),
                }
            }
            let mut out = json!({
                "exact": row.exact_height,
                "type": row.row_type.as_str(),
                "cols": cols,
            });
            if let Some(height) = row.height {
                out["height"] = Value::from(height);
            }
            rows.push(out);
        }

        values.insert("columns".into(), Value::Array(columns));
        values.insert("rows".into(), Value::Array(rows));
        Ok(Value::Object(values))
    }
}

impl Command for Table {
    fn core(&self) -> &CommandCore {
        self.base.core()
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        self.base.core_mut()
    }

    fn assemble(&mut self, ctx: &mut RenderContext) -> Result<()> {
        self.finish_row();
        if self.rows.is_empty() {
            return Err(ModelError::EmptyTable);
        }
        let values = self.build_values(ctx)?;
        let core = self.base.core_mut();
        core.set_param("values", values)?;
        for param in WORKING_PARAMS {
            core.clear_param(param);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.base.validate()
    }

    fn as_box(&self) -> Option<&BoxCore> {
        Some(&self.base)
    }

    fn as_box_mut(&mut self) -> Option<&mut BoxCore> {
        Some(&mut self.base)
    }

    fn dependencies(&self) -> Vec<String> {
        self.base.dependencies()
    }

    fn collected_images(&self) -> Option<&ImageRegistry> {
        Some(&self.images)
    }

    fn missing_assets(&self) -> Vec<String> {
        self.missing.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AssetInfo, Characters, ImageBox};

    fn two_column_table() -> Table {
        let mut table = Table::new("priceTable");
        table.add_named_column("A", Some(30.0), Some("cellA")).unwrap();
        table.add_named_column("B", Some(50.0), None).unwrap();
        table
    }

    #[test]
    fn test_missing_cells_are_null_padded() {
        let mut table = two_column_table();
        table.new_row(RowType::Body, None, false);
        table.add_cell(Some("A"), "only A").unwrap();

        let mut ctx = RenderContext::default();
        let out = table.build_command(&mut ctx, true).unwrap();
        let cols = out["values"]["rows"][0]["cols"].as_array().unwrap();
        assert_eq!(cols.len(), 2);
        assert_eq!(
            cols[0],
            json!({"content": [{"ps": "", "chars": [{"text": "only A"}]}], "style": "cellA"})
        );
        assert!(cols[1].is_null());
    }

    #[test]
    fn test_empty_table_fails() {
        let mut table = two_column_table();
        let mut ctx = RenderContext::default();
        assert!(matches!(
            table.build_command(&mut ctx, true),
            Err(ModelError::EmptyTable)
        ));
    }

    #[test]
    fn test_row_overflow() {
        let mut table = two_column_table();
        table.add_cell(None, "1").unwrap();
        table.add_cell(None, 2i64).unwrap();
        assert!(matches!(
            table.add_cell(None, 3.5),
            Err(ModelError::RowOverflow { columns: 2, cells: 3 })
        ));
    }

    #[test]
    fn test_unknown_column() {
        let mut table = two_column_table();
        assert!(matches!(
            table.add_cell(Some("Z"), "x"),
            Err(ModelError::UnknownColumn(col)) if col == "Z"
        ));
    }

    #[test]
    fn test_parse_mode_creates_columns() {
        let mut table = Table::new("imported");
        table.set_parse_mode(true);
        table.add_cell(None, "a").unwrap();
        table.add_cell(None, "b").unwrap();
        table.add_cell(Some("notes"), "c").unwrap();
        let idents: Vec<&str> = table.columns().iter().map(|c| c.ident.as_str()).collect();
        assert_eq!(idents, vec!["col1", "col2", "notes"]);
    }

    #[test]
    fn test_style_override_and_append() {
        let mut table = two_column_table();
        table.add_cell_with_style(Some("A"), "x", Some("Bold"), true).unwrap();
        table.add_cell_with_style(Some("B"), "y", Some("Plain"), false).unwrap();
        table.new_row(RowType::Footer, Some(8.0), true);
        table.add_cell_with_style(Some("A"), "z", Some("Red"), false).unwrap();

        let mut ctx = RenderContext::default();
        let out = table.build_command(&mut ctx, true).unwrap();
        let rows = &out["values"]["rows"];
        assert_eq!(rows[0]["cols"][0]["style"], "cellABold");
        assert_eq!(rows[0]["cols"][1]["style"], "Plain");
        assert_eq!(rows[1]["cols"][0]["style"], "Red");
        assert_eq!(rows[1]["type"], "footer");
        assert_eq!(rows[1]["exact"], true);
        assert_eq!(rows[1]["height"], json!(8.0));
    }

    #[test]
    fn test_working_params_folded_into_values() {
        let mut table = two_column_table();
        table.set_table_style("Prices").unwrap();
        table.set_fit(true).unwrap();
        table.set_row_height(6.0).unwrap();
        table.add_cell(None, "a").unwrap();

        let mut ctx = RenderContext::default();
        let out = table.build_command(&mut ctx, true).unwrap();
        assert_eq!(out["values"]["tableStyle"], "Prices");
        assert_eq!(out["values"]["fit"], true);
        assert_eq!(out["values"]["rowHeight"], json!(6.0));
        assert!(out["values"].get("lineHeight").is_none());
        for param in WORKING_PARAMS {
            assert!(out.get(param).is_none(), "{} should be folded", param);
        }
        assert_eq!(out["values"]["columns"][0], json!({"ident": "A", "width": 30.0, "style": "cellA"}));
    }

    #[test]
    fn test_row_type_parse() {
        assert_eq!(RowType::parse("header").unwrap(), RowType::Header);
        assert!(RowType::parse("sidebar").is_err());
    }

    #[test]
    fn test_cell_images_are_collected() {
        let mut assets = ImageRegistry::new();
        assets.insert("9".into(), AssetInfo::new("9", "https://cms.example/9.png"));
        let mut icon = ImageBox::new("icon");
        icon.set_asset("9", &assets).unwrap();
        let mut missing = ImageBox::new("icon");
        missing.set_asset("10", &assets).unwrap();

        let mut paragraph = Paragraph::new();
        paragraph
            .add_characters(Characters::new("with icon"))
            .add_image(icon)
            .add_image(missing);

        let mut table = two_column_table();
        table.add_cell(Some("B"), paragraph).unwrap();
        assert!(table.collected_images().unwrap().contains_key("9"));
        assert_eq!(table.missing_assets(), vec!["10".to_string()]);
    }
}
