//! Plain text: one unit per line.

use super::{Container, UnitKind, check_unit_count, decode_text, encode_text};
use crate::error::Result;
use crate::rewrite::RewriteResult;

#[derive(Debug)]
struct Line {
    content: String,
    /// `"\n"`, `"\r\n"` or empty on the last line.
    terminator: String,
}

/// A plain text document. Line endings are kept as found.
#[derive(Debug)]
pub struct PlainText {
    lines: Vec<Line>,
    bom: bool,
}

impl PlainText {
    pub fn parse(bytes: &[u8]) -> Self {
        let decoded = decode_text(bytes, None);
        let lines = decoded
            .text
            .split_inclusive('\n')
            .map(|line| {
                let content = line.trim_end_matches(['\r', '\n']);
                Line {
                    content: content.to_string(),
                    terminator: line[content.len()..].to_string(),
                }
            })
            .collect();
        Self {
            lines,
            bom: decoded.bom,
        }
    }

    pub fn text(&self) -> String {
        self.lines
            .iter()
            .flat_map(|line| [line.content.as_str(), line.terminator.as_str()])
            .collect()
    }
}

impl Container for PlainText {
    fn unit_kind(&self) -> UnitKind {
        UnitKind::Line
    }

    fn units(&self) -> Vec<String> {
        self.lines.iter().map(|line| line.content.clone()).collect()
    }

    fn apply(&mut self, results: &[RewriteResult]) -> Result<()> {
        check_unit_count(self.lines.len(), results.len())?;
        for (line, result) in self.lines.iter_mut().zip(results) {
            if result.changed {
                line.content.clone_from(&result.text);
            }
        }
        Ok(())
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(encode_text(&self.text(), self.bom))
    }
}
