use repl_types::Dialect;

use crate::error::{CsvError, RowTooLongSnafu};
use snafu::OptionExt;

/// Default hard cap on a single row's length, matching the worker's own
/// `LOAD DATA INFILE` buffer ceiling.
pub const DEFAULT_MAX_ROW_LEN: usize = 64 * 1024 * 1024;

/// A streaming scanner that splits byte chunks into complete lines under a
/// [`Dialect`], honoring escape pairs across calls and carrying an
/// unterminated residue forward to the next chunk.
///
/// Only `lines_terminated_by`/`fields_escaped_by` matter here: field
/// splitting is left to the worker's own `LOAD DATA INFILE`, which is why
/// [`CsvParser::sql_options`] renders the clause that tells the worker how
/// to do it instead of this parser doing it itself.
#[derive(Debug)]
pub struct CsvParser {
    dialect: Dialect,
    max_row_len: usize,
    residue: Vec<u8>,
    escaped: bool,
    lines_seen: u64,
}

impl CsvParser {
    pub fn new(dialect: Dialect) -> Self {
        Self::with_max_row_len(dialect, DEFAULT_MAX_ROW_LEN)
    }

    pub fn with_max_row_len(dialect: Dialect, max_row_len: usize) -> Self {
        Self {
            dialect,
            max_row_len,
            residue: Vec::new(),
            escaped: false,
            lines_seen: 0,
        }
    }

    /// Number of complete lines handed to `on_line` so far.
    pub fn lines_seen(&self) -> u64 {
        self.lines_seen
    }

    /// The `FIELDS ... LINES ...` clause for this parser's dialect.
    pub fn sql_options(&self) -> String {
        self.dialect.sql_options()
    }

    /// Bytes currently buffered as an unterminated residue, for diagnostics.
    pub fn pending_len(&self) -> usize {
        self.residue.len()
    }

    /// Splits `buf` into complete lines, calling `on_line` once per line in
    /// order. An unterminated tail is carried into `self.residue` and
    /// prefixed onto the next call's first line, unless `flush` is set, in
    /// which case any residue is emitted as a final line before returning.
    pub fn parse(&mut self, buf: &[u8], flush: bool, mut on_line: impl FnMut(&[u8])) -> Result<(), CsvError> {
        let term = self.dialect.lines_terminated_by;
        let escape = self.dialect.fields_escaped_by;
        let mut start = 0usize;

        for i in 0..buf.len() {
            let b = buf[i];
            if self.escaped {
                self.escaped = false;
                continue;
            }
            if Some(b) == escape {
                self.escaped = true;
                continue;
            }
            if b == term {
                self.grow_residue(&buf[start..i])?;
                on_line(&self.residue);
                self.lines_seen += 1;
                self.residue.clear();
                start = i + 1;
            }
        }

        if start < buf.len() {
            self.grow_residue(&buf[start..])?;
        }

        if flush && !self.residue.is_empty() {
            on_line(&self.residue);
            self.lines_seen += 1;
            self.residue.clear();
        }

        Ok(())
    }

    fn grow_residue(&mut self, chunk: &[u8]) -> Result<(), CsvError> {
        if self.residue.len() + chunk.len() > self.max_row_len {
            return RowTooLongSnafu { limit: self.max_row_len }.fail();
        }
        self.residue.extend_from_slice(chunk);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(parser: &mut CsvParser, buf: &[u8], flush: bool) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        parser.parse(buf, flush, |line| out.push(line.to_vec())).unwrap();
        out
    }

    #[test]
    fn splits_complete_lines() {
        let mut p = CsvParser::new(Dialect::default());
        let got = lines(&mut p, b"a,1\nb,2\n", false);
        assert_eq!(got, vec![b"a,1".to_vec(), b"b,2".to_vec()]);
        assert_eq!(p.lines_seen(), 2);
    }

    #[test]
    fn carries_residue_across_calls() {
        let mut p = CsvParser::new(Dialect::default());
        assert!(lines(&mut p, b"a,1\nb,", false).into_iter().eq(vec![b"a,1".to_vec()]));
        assert_eq!(p.pending_len(), 2);
        let got = lines(&mut p, b"2\n", false);
        assert_eq!(got, vec![b"b,2".to_vec()]);
    }

    #[test]
    fn flush_emits_unterminated_residue() {
        let mut p = CsvParser::new(Dialect::default());
        let got = lines(&mut p, b"a,1", true);
        assert_eq!(got, vec![b"a,1".to_vec()]);
        assert_eq!(p.pending_len(), 0);
    }

    #[test]
    fn escaped_terminator_is_literal() {
        let dialect = Dialect::new(b',', None, Some(b'\\'), b'\n').unwrap();
        let mut p = CsvParser::new(dialect);
        let got = lines(&mut p, b"a\\\nb\n", false);
        assert_eq!(got, vec![b"a\\\nb".to_vec()]);
    }

    #[test]
    fn oversized_row_is_rejected() {
        let mut p = CsvParser::with_max_row_len(Dialect::default(), 4);
        let err = p.parse(b"abcde\n", false, |_| {}).unwrap_err();
        assert_eq!(err, CsvError::RowTooLong { limit: 4 });
    }

    #[test]
    fn oversized_row_accumulated_across_calls_is_rejected() {
        let mut p = CsvParser::with_max_row_len(Dialect::default(), 4);
        p.parse(b"ab", false, |_| {}).unwrap();
        let err = p.parse(b"cde\n", false, |_| {}).unwrap_err();
        assert_eq!(err, CsvError::RowTooLong { limit: 4 });
    }

    #[test]
    fn sql_options_delegates_to_dialect() {
        let p = CsvParser::new(Dialect::default());
        assert_eq!(p.sql_options(), Dialect::default().sql_options());
    }
}
