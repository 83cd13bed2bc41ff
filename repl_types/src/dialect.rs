use snafu::Snafu;

/// The punctuation rules for parsing CSV-like row data, also
/// used to render a `LOAD DATA INFILE`-style clause for the worker's
/// ingest query.
///
/// Byte values are restricted to the closed set `default()` enumerates, per
/// the allowed-terminators-and-escapes invariant; callers should always go
/// through [`Dialect::new`] rather than constructing the struct literal
/// directly so that restriction is checked once, at parse time rather than
/// scattered across every consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Dialect {
    pub fields_terminated_by: u8,
    pub fields_enclosed_by: Option<u8>,
    pub fields_escaped_by: Option<u8>,
    pub lines_terminated_by: u8,
}

impl Default for Dialect {
    /// MySQL `LOAD DATA INFILE`'s own defaults: tab-separated fields, no
    /// enclosure, backslash escapes, newline-terminated lines.
    fn default() -> Self {
        Self {
            fields_terminated_by: b'\t',
            fields_enclosed_by: None,
            fields_escaped_by: Some(b'\\'),
            lines_terminated_by: b'\n',
        }
    }
}

const ALLOWED_TERMINATORS: &[u8] = b"\t,;|";
const ALLOWED_ENCLOSURES: &[u8] = b"\"'";
const ALLOWED_ESCAPES: &[u8] = b"\\";
const ALLOWED_LINE_TERMINATORS: &[u8] = b"\n";

impl Dialect {
    pub fn new(
        fields_terminated_by: u8,
        fields_enclosed_by: Option<u8>,
        fields_escaped_by: Option<u8>,
        lines_terminated_by: u8,
    ) -> Result<Self, DialectError> {
        if !ALLOWED_TERMINATORS.contains(&fields_terminated_by) {
            return InvalidTerminatorSnafu { byte: fields_terminated_by }.fail();
        }
        if let Some(b) = fields_enclosed_by {
            if !ALLOWED_ENCLOSURES.contains(&b) {
                return InvalidEnclosureSnafu { byte: b }.fail();
            }
        }
        if let Some(b) = fields_escaped_by {
            if !ALLOWED_ESCAPES.contains(&b) {
                return InvalidEscapeSnafu { byte: b }.fail();
            }
        }
        if !ALLOWED_LINE_TERMINATORS.contains(&lines_terminated_by) {
            return InvalidLineTerminatorSnafu { byte: lines_terminated_by }.fail();
        }
        Ok(Self {
            fields_terminated_by,
            fields_enclosed_by,
            fields_escaped_by,
            lines_terminated_by,
        })
    }

    /// Renders the `FIELDS ... LINES ...` clause of a `LOAD DATA INFILE`
    /// statement for this dialect.
    pub fn sql_options(&self) -> String {
        let mut s = format!(
            "FIELDS TERMINATED BY '{}'",
            escape_for_sql(self.fields_terminated_by)
        );
        if let Some(enclosed) = self.fields_enclosed_by {
            s.push_str(&format!(" ENCLOSED BY '{}'", escape_for_sql(enclosed)));
        }
        if let Some(escaped) = self.fields_escaped_by {
            s.push_str(&format!(" ESCAPED BY '{}'", escape_for_sql(escaped)));
        }
        s.push_str(&format!(
            " LINES TERMINATED BY '{}'",
            escape_for_sql(self.lines_terminated_by)
        ));
        s
    }
}

fn escape_for_sql(byte: u8) -> String {
    match byte {
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        b'\'' => "\\'".to_string(),
        b'\\' => "\\\\".to_string(),
        b => (b as char).to_string(),
    }
}

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum DialectError {
    #[snafu(display("fields-terminated-by byte {byte:#x} is not in the allowed set"))]
    InvalidTerminator { byte: u8 },

    #[snafu(display("fields-enclosed-by byte {byte:#x} is not in the allowed set"))]
    InvalidEnclosure { byte: u8 },

    #[snafu(display("fields-escaped-by byte {byte:#x} is not in the allowed set"))]
    InvalidEscape { byte: u8 },

    #[snafu(display("lines-terminated-by byte {byte:#x} is not in the allowed set"))]
    InvalidLineTerminator { byte: u8 },
}
