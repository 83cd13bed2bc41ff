use snafu::Snafu;

#[derive(Debug, Snafu)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    #[snafu(display("loading topology: {source}"))]
    Topology { source: crate::topology::TopologyError },

    #[snafu(display("connecting to the store: {source}"))]
    Store { source: repl_store::StoreError },

    #[snafu(display("starting the controller: {source}"))]
    Controller { source: repl_controller::ControllerError },

    #[snafu(display("request failed: {message}"))]
    Request { message: String },

    #[snafu(display("serving HTTP: {source}"))]
    Http { source: hyper::Error },

    #[snafu(display("logging setup: {source}"))]
    Logging { source: repl_logging::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
