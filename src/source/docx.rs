//! WordprocessingML adapter: reads an extracted `word/document.xml`.
//!
//! Only what the engine needs survives: paragraph runs with italic, bold and
//! point size, and tables of cells. Nested tables are flattened into the
//! enclosing cell. Paragraph-mark formatting (`w:pPr/w:rPr`) is ignored.

use quick_xml::events::{BytesStart, Event};

use super::{Block, Cell, Paragraph, Row, Run, SourceError, Table};

#[derive(Default)]
struct TableBuild {
    rows: Vec<Row>,
    row: Option<Vec<Cell>>,
    cell: Option<Vec<Paragraph>>,
}

#[derive(Default)]
struct DocumentBuild {
    blocks: Vec<Block>,
    tables: Vec<TableBuild>,
    paragraph: Option<Vec<Run>>,
    run: Option<Run>,
    in_run_props: bool,
    in_text: bool,
}

pub fn parse_document(xml: &str) -> Result<Vec<Block>, SourceError> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut doc = DocumentBuild::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => doc.open(&e, false)?,
            Event::Empty(e) => doc.open(&e, true)?,
            Event::Text(e) if doc.in_text => {
                let text = e.unescape().map_err(quick_xml::Error::from)?;
                if let Some(run) = doc.run.as_mut() {
                    run.text.push_str(&text);
                }
            }
            Event::End(e) => doc.close(e.name().as_ref()),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(doc.blocks)
}

impl DocumentBuild {
    fn open(&mut self, e: &BytesStart, empty: bool) -> Result<(), SourceError> {
        match e.name().as_ref() {
            b"w:tbl" if !empty => self.tables.push(TableBuild::default()),
            b"w:tr" if !empty => {
                if let Some(t) = self.tables.last_mut() {
                    t.row = Some(Vec::new());
                }
            }
            b"w:tc" if !empty => {
                if let Some(t) = self.tables.last_mut() {
                    t.cell = Some(Vec::new());
                }
            }
            b"w:p" => {
                self.paragraph = Some(Vec::new());
                if empty {
                    self.finish_paragraph();
                }
            }
            b"w:r" if !empty && self.paragraph.is_some() => self.run = Some(Run::default()),
            b"w:rPr" if !empty && self.run.is_some() => self.in_run_props = true,
            b"w:i" if self.in_run_props => {
                let on = toggle(e)?;
                if let Some(run) = self.run.as_mut() {
                    run.italic = on;
                }
            }
            b"w:b" if self.in_run_props => {
                let on = toggle(e)?;
                if let Some(run) = self.run.as_mut() {
                    run.bold = on;
                }
            }
            b"w:sz" if self.in_run_props => {
                // half-points
                let size = attr(e, "w:val")?
                    .and_then(|v| v.parse::<f32>().ok())
                    .map(|v| v / 2.0);
                if let Some(run) = self.run.as_mut() {
                    run.size = size;
                }
            }
            b"w:t" if !empty => self.in_text = true,
            b"w:tab" | b"w:br" => {
                if let Some(run) = self.run.as_mut() {
                    run.text.push(if e.name().as_ref() == b"w:tab" { '\t' } else { ' ' });
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"w:t" => self.in_text = false,
            b"w:rPr" => self.in_run_props = false,
            b"w:r" => {
                if let (Some(run), Some(runs)) = (self.run.take(), self.paragraph.as_mut()) {
                    if !run.text.is_empty() {
                        runs.push(run);
                    }
                }
            }
            b"w:p" => self.finish_paragraph(),
            b"w:tc" => {
                if let Some(t) = self.tables.last_mut() {
                    let paragraphs = t.cell.take().unwrap_or_default();
                    t.row.get_or_insert_with(Vec::new).push(Cell { paragraphs });
                }
            }
            b"w:tr" => {
                if let Some(t) = self.tables.last_mut() {
                    let cells = t.row.take().unwrap_or_default();
                    t.rows.push(Row { cells });
                }
            }
            b"w:tbl" => {
                if let Some(done) = self.tables.pop() {
                    let table = Table { rows: done.rows };
                    match self.tables.last_mut().and_then(|outer| outer.cell.as_mut()) {
                        Some(cell) => cell.extend(
                            table
                                .rows
                                .into_iter()
                                .flat_map(|r| r.cells)
                                .flat_map(|c| c.paragraphs),
                        ),
                        None => self.blocks.push(Block::Table(table)),
                    }
                }
            }
            _ => {}
        }
    }

    fn finish_paragraph(&mut self) {
        let Some(runs) = self.paragraph.take() else {
            return;
        };
        let paragraph = Paragraph::from_runs(runs);
        match self.tables.last_mut().and_then(|t| t.cell.as_mut()) {
            Some(cell) => cell.push(paragraph),
            None => self.blocks.push(Block::Paragraph(paragraph)),
        }
    }
}

fn attr(e: &BytesStart, name: &str) -> Result<Option<String>, SourceError> {
    match e.try_get_attribute(name).map_err(quick_xml::Error::from)? {
        Some(a) => Ok(Some(
            a.unescape_value().map_err(quick_xml::Error::from)?.into_owned(),
        )),
        None => Ok(None),
    }
}

/// `<w:i/>` switches on; `w:val="0"`, `"false"` or `"off"` switches off.
fn toggle(e: &BytesStart) -> Result<bool, SourceError> {
    Ok(!matches!(attr(e, "w:val")?.as_deref(), Some("0") | Some("false") | Some("off")))
}
