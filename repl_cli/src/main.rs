mod commands;
mod error;
mod topology;

use clap::Parser;
use repl_logging::cli::LoggingConfig;

use commands::request;

#[derive(Debug, clap::Parser)]
#[clap(name = "replctl", about = "Replication & ingest control plane CLI")]
struct Config {
    #[clap(flatten)]
    logging: LoggingConfig,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Parser)]
enum Command {
    /// Run the controller and HTTP front-end as a long-lived service.
    Service(commands::run::Config),

    /// Issue a REPLICATE request.
    Replicate(request::Replicate),
    /// Issue a DELETE request.
    Delete(request::Delete),
    /// Issue a FIND (FindReplica) request.
    Find(request::Find),
    /// Issue a FINDALL (FindAllReplicas) request.
    Findall(request::FindAll),
    /// Issue an ECHO request.
    Echo(request::Echo),
    /// Issue a SQL request.
    Sql(request::Sql),
    /// Issue a director INDEX request.
    Index(request::Index),
    /// Issue a STATUS request.
    Status(request::Status),
    /// Issue a STOP request.
    Stop(request::Stop),
    /// Issue a DISPOSE request.
    Dispose(request::Dispose),
}

#[tokio::main]
async fn main() {
    let config = Config::parse();
    if let Err(err) = config.logging.init() {
        eprintln!("failed to initialize logging: {err}");
        std::process::exit(1);
    }

    let result = match config.command {
        Command::Service(cfg) => commands::run::command(cfg).await,
        Command::Replicate(cmd) => cmd.run().await,
        Command::Delete(cmd) => cmd.run().await,
        Command::Find(cmd) => cmd.run().await,
        Command::Findall(cmd) => cmd.run().await,
        Command::Echo(cmd) => cmd.run().await,
        Command::Sql(cmd) => cmd.run().await,
        Command::Index(cmd) => cmd.run().await,
        Command::Status(cmd) => cmd.run().await,
        Command::Stop(cmd) => cmd.run().await,
        Command::Dispose(cmd) => cmd.run().await,
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
