/// The kind of frame carried over the replication worker wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FrameKind {
    Request,
    Status,
    Stop,
}

/// Prefixes every request frame.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RequestHeader {
    pub id: u64,
    pub kind: FrameKind,
    /// Set only on management frames (`Status`/`Stop`): the id of the
    /// worker-side request being probed or cancelled.
    pub management_type: Option<String>,
    pub instance_id: u64,
}

/// The worker's reply status, common to every response regardless of body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StatusCode {
    Success,
    Created,
    Queued,
    InProgress,
    IsCancelling,
    Bad,
    Failed,
    Cancelled,
}

/// Prefixes every response frame; `extended_status` carries a
/// protocol-specific secondary code (e.g. a vendor error string) when
/// `status` is not `Success`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResponseHeader {
    pub id: u64,
    pub status: StatusCode,
    pub extended_status: Option<String>,
}
