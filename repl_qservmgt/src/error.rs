use repl_messenger::MessengerError;
use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum QservMgtError {
    #[snafu(display("messenger error: {source}"))]
    Messenger { source: MessengerError },

    #[snafu(display("failed to encode JSON body: {source}"))]
    Encode { source: serde_json::Error },

    #[snafu(display("failed to decode JSON response body: {source}"))]
    Decode { source: serde_json::Error },
}

impl From<MessengerError> for QservMgtError {
    fn from(source: MessengerError) -> Self {
        Self::Messenger { source }
    }
}

pub type Result<T, E = QservMgtError> = std::result::Result<T, E>;
