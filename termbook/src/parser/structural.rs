use std::ops::Range;

use crate::block::Block;

/// Header currently collecting body lines.
struct OpenHeader<'a> {
    name: &'a str,
    header: Range<usize>,
    body_start: usize,
}

impl OpenHeader<'_> {
    fn close(self, source: &str, end: usize) -> Block {
        let raw = &source[self.body_start..end];
        let leading = raw.len() - raw.trim_start().len();
        let body = raw.trim();
        let body_start = self.body_start + leading;
        Block {
            name: self.name.to_string(),
            body: body.to_string(),
            body_span: body_start..body_start + body.len(),
            span: self.header.start..end,
            header: self.header,
        }
    }
}

/// Split the source into blocks, one per header line, in document order.
pub(crate) fn scan_blocks(source: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut open: Option<OpenHeader<'_>> = None;
    let mut offset = 0;

    for line in source.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        let text = line.trim_end_matches(['\n', '\r']);
        let Some(name) = header_name(text) else {
            continue;
        };

        if let Some(header) = open.take() {
            blocks.push(header.close(source, line_start));
        }
        open = Some(OpenHeader {
            name,
            header: line_start..line_start + text.len(),
            body_start: offset,
        });
    }

    if let Some(header) = open.take() {
        blocks.push(header.close(source, source.len()));
    }

    blocks
}

/// `### name` with at least one space or tab after the hashes.
fn header_name(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("###")?;
    if !rest.starts_with([' ', '\t']) {
        return None;
    }
    let name = rest.trim();
    if name.is_empty() { None } else { Some(name) }
}
