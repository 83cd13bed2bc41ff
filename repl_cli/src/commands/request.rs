use repl_request::{
    DeleteBehavior, DirectorIndexBehavior, DisposeBehavior, EchoBehavior, FindAllReplicasBehavior,
    FindReplicaBehavior, RequestBehavior, ReplicateBehavior, SqlBehavior, StatusBehavior, StopBehavior,
};
use repl_time::TimeProvider;
use repl_types::{ChunkNumber, DatabaseName, TableName, WorkerName};
use tokio::sync::oneshot;

use crate::commands::runtime::ClusterArgs;
use crate::error::{RequestSnafu, Result};

/// Flags shared by every one-shot Request subcommand: which worker to send
/// it to, where it sits in that worker's queue, whether to keep its row
/// around after it finishes, and an optional deadline.
#[derive(Debug, Clone, clap::Args)]
pub struct RequestArgs {
    #[clap(flatten)]
    pub cluster: ClusterArgs,

    /// Name of the worker to send the request to.
    #[clap(long)]
    pub worker: String,

    #[clap(long, default_value = "0")]
    pub priority: i32,

    /// Keep the request's row in the store after it reaches a terminal
    /// state, instead of letting it be disposed automatically.
    #[clap(long)]
    pub keep_tracking: bool,

    /// Allow a duplicate of an already in-flight request with the same
    /// fingerprint, instead of being folded into it.
    #[clap(long)]
    pub allow_duplicate: bool,

    /// Seconds from now after which the request is cancelled if still
    /// outstanding.
    #[clap(long = "cancel-after")]
    pub cancel_after_secs: Option<u64>,
}

#[derive(Debug, Clone, clap::Parser)]
pub struct Replicate {
    #[clap(flatten)]
    pub request: RequestArgs,
    #[clap(long)]
    pub database: String,
    #[clap(long)]
    pub chunk: u32,
    #[clap(long = "source-worker")]
    pub source_worker: String,
}

#[derive(Debug, Clone, clap::Parser)]
pub struct Delete {
    #[clap(flatten)]
    pub request: RequestArgs,
    #[clap(long)]
    pub database: String,
    #[clap(long)]
    pub chunk: u32,
}

#[derive(Debug, Clone, clap::Parser)]
pub struct Find {
    #[clap(flatten)]
    pub request: RequestArgs,
    #[clap(long)]
    pub database: String,
    #[clap(long)]
    pub chunk: u32,
}

#[derive(Debug, Clone, clap::Parser)]
pub struct FindAll {
    #[clap(flatten)]
    pub request: RequestArgs,
    #[clap(long)]
    pub database: String,
}

#[derive(Debug, Clone, clap::Parser)]
pub struct Echo {
    #[clap(flatten)]
    pub request: RequestArgs,
    #[clap(long)]
    pub payload: String,
    #[clap(long = "delay-ms", default_value = "0")]
    pub delay_ms: u64,
}

#[derive(Debug, Clone, clap::Parser)]
pub struct Sql {
    #[clap(flatten)]
    pub request: RequestArgs,
    #[clap(long)]
    pub query: String,
}

#[derive(Debug, Clone, clap::Parser)]
pub struct Index {
    #[clap(flatten)]
    pub request: RequestArgs,
    #[clap(long)]
    pub database: String,
    #[clap(long)]
    pub table: String,
    #[clap(long)]
    pub chunk: u32,
}

#[derive(Debug, Clone, clap::Parser)]
pub struct Status {
    #[clap(flatten)]
    pub request: RequestArgs,
    #[clap(long = "target-request-id")]
    pub target_request_id: String,
}

#[derive(Debug, Clone, clap::Parser)]
pub struct Stop {
    #[clap(flatten)]
    pub request: RequestArgs,
    #[clap(long = "target-request-id")]
    pub target_request_id: String,
}

#[derive(Debug, Clone, clap::Parser)]
pub struct Dispose {
    #[clap(flatten)]
    pub request: RequestArgs,
    /// One or more target request ids to drop from tracking.
    #[clap(long = "target-request-id", required = true)]
    pub target_request_ids: Vec<String>,
}

macro_rules! dispatch {
    ($name:ident, $behavior:expr) => {
        impl $name {
            pub async fn run(self) -> Result<()> {
                let behavior: Box<dyn RequestBehavior> = Box::new($behavior(&self));
                execute(self.request, behavior).await
            }
        }
    };
}

dispatch!(Replicate, |c: &Replicate| ReplicateBehavior {
    database: DatabaseName::from(c.database.as_str()),
    chunk: ChunkNumber::new(c.chunk),
    source_worker: WorkerName::from(c.source_worker.as_str()),
});
dispatch!(Delete, |c: &Delete| DeleteBehavior {
    database: DatabaseName::from(c.database.as_str()),
    chunk: ChunkNumber::new(c.chunk),
});
dispatch!(Find, |c: &Find| FindReplicaBehavior {
    database: DatabaseName::from(c.database.as_str()),
    chunk: ChunkNumber::new(c.chunk),
});
dispatch!(FindAll, |c: &FindAll| FindAllReplicasBehavior {
    database: DatabaseName::from(c.database.as_str()),
});
dispatch!(Echo, |c: &Echo| EchoBehavior { payload: c.payload.clone(), delay_ms: c.delay_ms });
dispatch!(Sql, |c: &Sql| SqlBehavior { query: c.query.clone() });
dispatch!(Index, |c: &Index| DirectorIndexBehavior {
    database: DatabaseName::from(c.database.as_str()),
    table: TableName::from(c.table.as_str()),
    chunk: ChunkNumber::new(c.chunk),
});
dispatch!(Status, |c: &Status| StatusBehavior { target_request_id: c.target_request_id.clone() });
dispatch!(Stop, |c: &Stop| StopBehavior { target_request_id: c.target_request_id.clone() });
dispatch!(Dispose, |c: &Dispose| DisposeBehavior { target_request_ids: c.target_request_ids.clone() });

async fn execute(args: RequestArgs, behavior: Box<dyn RequestBehavior>) -> Result<()> {
    let (controller, _store) = args.cluster.controller().await?;
    let now = repl_time::SystemProvider::new().now();
    let deadline = args.cancel_after_secs.and_then(|secs| now.checked_add(std::time::Duration::from_secs(secs)));

    let (tx, rx) = oneshot::channel();
    let _handle = controller.submit_request(
        WorkerName::from(args.worker.as_str()),
        args.priority,
        args.keep_tracking,
        args.allow_duplicate,
        behavior,
        deadline,
        move |outcome| {
            let _ = tx.send(outcome);
        },
    );

    let outcome = rx.await.map_err(|_| RequestSnafu { message: "completion channel closed before a response arrived".to_string() }.build())?;
    let printable = serde_json::json!({
        "id": outcome.record.id.get(),
        "state": outcome.record.state,
        "extendedState": outcome.record.extended_state,
        "serverError": outcome.record.server_error,
        "response": outcome.response,
    });
    println!("{}", serde_json::to_string_pretty(&printable).expect("json object always serializes"));
    Ok(())
}
