use snafu::Snafu;

#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
pub enum MessengerError {
    #[snafu(display("worker channel closed before the item was sent"))]
    ChannelClosed,

    #[snafu(display("request was cancelled before a response arrived"))]
    Cancelled,

    #[snafu(display("transport error: {message}"))]
    Transport { message: String },

    #[snafu(display("no such outstanding request on this worker"))]
    UnknownRequest,
}
