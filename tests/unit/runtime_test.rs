//! Tests for tokio spawner utilities

use pending_sync::core::Spawn;
use pending_sync::runtime::tokio_spawner::TokioSpawner;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[test]
fn test_tokio_spawner_with_worker_threads() {
    let (runtime, spawner) = TokioSpawner::with_worker_threads(1).expect("runtime");

    let (tx, rx) = std::sync::mpsc::channel();
    spawner.spawn(async move {
        tx.send(7).unwrap();
    });

    assert_eq!(rx.recv().unwrap(), 7);
    drop(runtime);
}
