use snafu::Snafu;

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum CsvError {
    #[snafu(display("row exceeds the {limit}-byte cap without a line terminator"))]
    RowTooLong { limit: usize },
}
