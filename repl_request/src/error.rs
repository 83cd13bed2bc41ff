use repl_messenger::MessengerError;
use repl_store::StoreError;
use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum RequestError {
    #[snafu(display("messenger error: {source}"))]
    Messenger { source: MessengerError },

    #[snafu(display("store error: {source}"))]
    Store { source: StoreError },

    #[snafu(display("failed to encode request body: {source}"))]
    Encode { source: bincode::Error },

    #[snafu(display("failed to decode response body: {source}"))]
    Decode { source: bincode::Error },

    #[snafu(display("request was cancelled"))]
    Cancelled,

    #[snafu(display("request expired before a response arrived"))]
    Expired,
}

impl From<MessengerError> for RequestError {
    fn from(source: MessengerError) -> Self {
        Self::Messenger { source }
    }
}

impl From<StoreError> for RequestError {
    fn from(source: StoreError) -> Self {
        Self::Store { source }
    }
}

pub type Result<T, E = RequestError> = std::result::Result<T, E>;
