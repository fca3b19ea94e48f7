use std::collections::BTreeMap;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::common::config::JobConfig;
use crate::common::node::Node;

pub const LABEL_PARTITION: &str = "__meta_slurm_partition";
pub const LABEL_JOB: &str = "__meta_slurm_job";
pub const LABEL_NODE: &str = "__meta_slurm_node";
pub const LABEL_STATE: &str = "__meta_slurm_state";

/// One entry of a Prometheus HTTP SD document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    pub targets: Vec<String>,
    pub labels: BTreeMap<String, String>,
}

/// Targets per job name, in configuration order.
pub type JobTargets = IndexMap<String, Vec<TargetGroup>>;

/// Builds one group per (job, partition, node). Nodes are not filtered by state; the state
/// is exposed as a label instead. Every configured job gets an entry, even when empty.
pub fn build_targets(nodes: &[Node], jobs: &[JobConfig]) -> JobTargets {
    let mut job_targets = JobTargets::with_capacity(jobs.len());

    for job in jobs {
        let mut groups = Vec::new();

        for node in nodes {
            let target = format!("{}:{}", node.target_host(), job.port);
            let partitions: IndexSet<&str> = node.partitions.iter().map(String::as_str).collect();

            for partition in partitions {
                let labels = BTreeMap::from([
                    (LABEL_PARTITION.to_string(), partition.to_string()),
                    (LABEL_JOB.to_string(), job.name.clone()),
                    (LABEL_NODE.to_string(), node.name.clone()),
                    (LABEL_STATE.to_string(), node.primary_state().to_string()),
                ]);

                groups.push(TargetGroup {
                    targets: vec![target.clone()],
                    labels,
                });
            }
        }

        job_targets.insert(job.name.clone(), groups);
    }

    job_targets
}
