use std::time::Duration;

use reqwest::StatusCode;

use crate::common::error::SlurmError;
use crate::common::node::NodeInfoResponse;
use crate::traits::node_source::NodeSource;

/// Upper bound for a single request, whatever the caller asks for.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_NAME_HEADER: &str = "X-SLURM-USER-NAME";
const USER_TOKEN_HEADER: &str = "X-SLURM-USER-TOKEN";

/// Client for the slurmrestd node listing.
#[derive(Debug, Clone)]
pub struct SlurmClient {
    base_url: String,
    api_version: String,
    username: Option<String>,
    token: Option<String>,
    http: reqwest::Client,
}

impl SlurmClient {
    pub fn new(
        base_url: &str,
        api_version: &str,
        username: Option<String>,
        token: Option<String>,
    ) -> Result<Self, SlurmError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(SlurmError::Transport)?;

        Ok(SlurmClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version: api_version.to_string(),
            username: username.filter(|u| !u.is_empty()),
            token: token.filter(|t| !t.is_empty()),
            http,
        })
    }

    pub fn nodes_url(&self) -> String {
        format!("{}/slurm/{}/nodes/", self.base_url, self.api_version)
    }

    async fn fetch(&self, timeout: Duration) -> Result<NodeInfoResponse, SlurmError> {
        let url = self.nodes_url();
        let mut request = self.http.get(&url).timeout(timeout);
        if let Some(username) = &self.username {
            request = request.header(USER_NAME_HEADER, username);
        }
        if let Some(token) = &self.token {
            request = request.header(USER_TOKEN_HEADER, token);
        }

        log::debug!("Requesting Slurm nodes from {}", url);
        let response = request.send().await.map_err(|e| classify(e, timeout))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| classify(e, timeout))?;
        if status != StatusCode::OK {
            return Err(SlurmError::UnexpectedStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let node_info: NodeInfoResponse = serde_json::from_slice(&body)?;
        report(&node_info);
        Ok(node_info)
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> SlurmError {
    if err.is_timeout() {
        SlurmError::Timeout(timeout)
    } else {
        SlurmError::Transport(err)
    }
}

fn report(node_info: &NodeInfoResponse) {
    if let Some(slurm) = node_info.meta.as_ref().and_then(|m| m.slurm.as_ref()) {
        log::debug!(
            "Slurm cluster {:?} release {:?} reported {} nodes",
            slurm.cluster,
            slurm.release,
            node_info.nodes.len()
        );
    }
    for error in &node_info.errors {
        log::warn!(
            "Slurm API reported error {} ({}): {} [{}]",
            error.error_number,
            error.error,
            error.description,
            error.source
        );
    }
    for warning in &node_info.warnings {
        log::warn!("Slurm API reported warning: {} [{}]", warning.description, warning.source);
    }
}

impl NodeSource for SlurmClient {
    async fn get_nodes(&self, timeout: Option<Duration>) -> Result<NodeInfoResponse, SlurmError> {
        let timeout = timeout.map_or(REQUEST_TIMEOUT, |t| t.min(REQUEST_TIMEOUT));
        self.fetch(timeout).await
    }
}
