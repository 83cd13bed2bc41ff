use repl_store::{DatabaseServices, MemDatabaseServices};
use repl_types::{ChunkNumber, Replica, ReplicaStatus};

fn replica(worker: &str, chunk: u32) -> Replica {
    Replica {
        worker: worker.into(),
        database: "D".into(),
        chunk: ChunkNumber::new(chunk),
        status: ReplicaStatus::Complete,
        verify_time: None,
        files: vec![],
    }
}

#[tokio::test]
async fn save_replica_info_collection_is_an_exact_snapshot() {
    let store = MemDatabaseServices::new();

    store
        .save_replica_info_collection(
            &"w1".into(),
            &"D".into(),
            vec![replica("w1", 1), replica("w1", 2), replica("w1", 3)],
        )
        .await
        .unwrap();

    let found = store.find_worker_replicas(&"w1".into(), &"D".into()).await.unwrap();
    assert_eq!(found.len(), 3);

    // A second, smaller collection entirely replaces the first: no residue.
    store
        .save_replica_info_collection(&"w1".into(), &"D".into(), vec![replica("w1", 2)])
        .await
        .unwrap();

    let found = store.find_worker_replicas(&"w1".into(), &"D".into()).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].chunk, ChunkNumber::new(2));
}

#[tokio::test]
async fn find_replicas_is_ordered_by_database_chunk_worker() {
    let store = MemDatabaseServices::new();
    store
        .save_replica_info_collection(&"w2".into(), &"D".into(), vec![replica("w2", 1)])
        .await
        .unwrap();
    store
        .save_replica_info_collection(&"w1".into(), &"D".into(), vec![replica("w1", 1)])
        .await
        .unwrap();

    let found = store.find_replicas(&"D".into(), Some(ChunkNumber::new(1))).await.unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].worker.as_str(), "w1");
    assert_eq!(found[1].worker.as_str(), "w2");
}
