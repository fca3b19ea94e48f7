use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use prometheus_slurm_sd::common::config::JobConfig;
use prometheus_slurm_sd::common::error::SlurmError;
use prometheus_slurm_sd::common::node::{Node, NodeInfoResponse};
use prometheus_slurm_sd::common::target::{LABEL_NODE, LABEL_PARTITION, LABEL_STATE, build_targets};
use prometheus_slurm_sd::server::discovery::DiscoveryService;
use prometheus_slurm_sd::traits::node_source::NodeSource;

/// Serves whatever inventory is currently set; `None` makes the upstream fail.
#[derive(Default)]
struct ScriptedSource {
    nodes: Mutex<Option<Vec<Node>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    fn with_nodes(nodes: Vec<Node>) -> Self {
        let source = ScriptedSource::default();
        source.set(Some(nodes));
        source
    }

    fn set(&self, nodes: Option<Vec<Node>>) {
        *self.nodes.lock().unwrap() = nodes;
    }
}

impl NodeSource for ScriptedSource {
    async fn get_nodes(&self, _timeout: Option<Duration>) -> Result<NodeInfoResponse, SlurmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let nodes = self.nodes.lock().unwrap().clone();
        match nodes {
            Some(nodes) => Ok(NodeInfoResponse {
                nodes,
                ..Default::default()
            }),
            None => Err(SlurmError::UnexpectedStatus {
                status: 500,
                body: "upstream down".to_string(),
            }),
        }
    }
}

/// Lets a test keep a handle on the source after handing it to the service.
struct Shared(Arc<ScriptedSource>);

impl NodeSource for Shared {
    async fn get_nodes(&self, timeout: Option<Duration>) -> Result<NodeInfoResponse, SlurmError> {
        self.0.get_nodes(timeout).await
    }
}

fn node(name: &str, address: &str, state: &str, partitions: &[&str]) -> Node {
    Node {
        name: name.to_string(),
        address: address.to_string(),
        hostname: format!("{}.example.com", name),
        state: vec![state.to_string()],
        partitions: partitions.iter().map(|s| s.to_string()).collect(),
    }
}

fn jobs() -> Vec<JobConfig> {
    vec![
        JobConfig {
            name: "node".to_string(),
            port: 9100,
        },
        JobConfig {
            name: "gpu".to_string(),
            port: 9400,
        },
    ]
}

fn cluster() -> Vec<Node> {
    vec![
        node("node1", "10.0.0.1", "IDLE", &["compute"]),
        node("node2", "10.0.0.2", "ALLOCATED", &["compute", "gpu"]),
        node("node3", "", "DRAIN", &["compute"]),
    ]
}

#[tokio::test]
async fn nothing_is_known_before_the_first_refresh() {
    let service = DiscoveryService::new(ScriptedSource::default(), jobs(), Duration::from_secs(60));
    assert!(service.get_targets("node").is_none());
    assert!(service.get_all_targets().is_empty());
    assert_eq!(service.cache().generation(), 0);
}

#[tokio::test]
async fn refresh_fills_every_job() {
    let service = DiscoveryService::new(
        ScriptedSource::with_nodes(cluster()),
        jobs(),
        Duration::from_secs(60),
    );
    service.update_targets().await.expect("refresh");

    let node_targets = service.get_targets("node").expect("node job");
    assert_eq!(node_targets.len(), 4);
    let gpu_targets = service.get_targets("gpu").expect("gpu job");
    assert_eq!(gpu_targets.len(), 4);
    assert!(gpu_targets.iter().any(|g| g.targets == vec!["10.0.0.2:9400".to_string()]
        && g.labels[LABEL_PARTITION] == "gpu"));

    let all = service.get_all_targets();
    assert_eq!(all.len(), 8);
    let expected: Vec<_> = build_targets(&cluster(), &jobs()).into_values().flatten().collect();
    assert_eq!(all, expected);
    assert_eq!(service.cache().generation(), 1);
}

#[tokio::test]
async fn empty_inventory_still_reports_configured_jobs() {
    let service = DiscoveryService::new(
        ScriptedSource::with_nodes(vec![]),
        jobs(),
        Duration::from_secs(60),
    );
    service.update_targets().await.expect("refresh");

    assert_eq!(service.get_targets("node"), Some(vec![]));
    assert_eq!(service.get_targets("gpu"), Some(vec![]));
    assert!(service.get_targets("unknown-job").is_none());
}

#[tokio::test]
async fn failed_refresh_keeps_previous_targets() {
    let source = Arc::new(ScriptedSource::with_nodes(cluster()));
    let service = DiscoveryService::new(Shared(source.clone()), jobs(), Duration::from_secs(60));
    service.update_targets().await.expect("refresh");
    let before = service.get_all_targets();

    source.set(None);
    let err = service.update_targets().await.unwrap_err();
    assert!(matches!(err, SlurmError::UnexpectedStatus { status: 500, .. }));

    // refresh() swallows the error the same way
    service.refresh().await;

    assert_eq!(service.get_all_targets(), before);
    assert_eq!(service.cache().generation(), 1);
}

#[tokio::test]
async fn run_refreshes_immediately_and_stops_on_cancel() {
    let source = Arc::new(ScriptedSource::with_nodes(cluster()));
    let service = Arc::new(DiscoveryService::new(
        Shared(source.clone()),
        jobs(),
        Duration::from_millis(50),
    ));
    let shutdown = CancellationToken::new();

    let task = {
        let service = service.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { service.run(shutdown).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(service.get_targets("node").is_some());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(source.calls.load(Ordering::SeqCst) >= 3);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("loop exits promptly")
        .unwrap();
}

/// Never answers; only cancellation can end a refresh against it.
struct HangingSource;

impl NodeSource for HangingSource {
    async fn get_nodes(&self, _timeout: Option<Duration>) -> Result<NodeInfoResponse, SlurmError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn cancel_abandons_refresh_in_flight() {
    let service = Arc::new(DiscoveryService::new(HangingSource, jobs(), Duration::from_secs(60)));
    let shutdown = CancellationToken::new();

    let task = {
        let service = service.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { service.run(shutdown).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("loop exits promptly")
        .unwrap();
    assert!(service.get_all_targets().is_empty());
}

/// Every call returns a new generation; all labels of one generation carry its number.
#[derive(Default)]
struct GenerationSource {
    generation: AtomicUsize,
}

impl NodeSource for GenerationSource {
    async fn get_nodes(&self, _timeout: Option<Duration>) -> Result<NodeInfoResponse, SlurmError> {
        let g = self.generation.fetch_add(1, Ordering::SeqCst);
        let state = format!("GEN{}", g);
        let nodes = (0..20)
            .map(|i| node(&format!("g{}-n{}", g, i), &format!("10.{}.0.{}", g % 250, i), &state, &["p1", "p2"]))
            .collect();
        Ok(NodeInfoResponse {
            nodes,
            ..Default::default()
        })
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_see_a_torn_snapshot() {
    let service = Arc::new(DiscoveryService::new(
        GenerationSource::default(),
        jobs(),
        Duration::from_secs(60),
    ));
    service.update_targets().await.unwrap();

    let writer = {
        let service = service.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                service.update_targets().await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move {
                for _ in 0..500 {
                    let all = service.get_all_targets();
                    assert_eq!(all.len(), 2 * 20 * 2);

                    let state = &all[0].labels[LABEL_STATE];
                    let prefix = format!("g{}-", &state["GEN".len()..]);
                    for group in &all {
                        assert_eq!(&group.labels[LABEL_STATE], state);
                        assert!(group.labels[LABEL_NODE].starts_with(&prefix));
                    }
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
    assert_eq!(service.cache().generation(), 201);
}
