//! Docker registry checks

use reqwest::StatusCode;
use tracing::{debug, info};

use crate::errors::DeployError;
use crate::http::client::HttpClient;
use crate::utils::short_sha;

const MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// Repository a service's images are pushed to
pub fn image_repository(service: &str) -> String {
    format!("services-{}", service)
}

/// Tag of the image built from `commit`
pub fn image_tag(commit: &str) -> String {
    format!("paasta-{}", commit)
}

/// Check whether the image built from `commit` has been pushed
pub async fn is_docker_image_already_in_registry(
    registry: &HttpClient,
    service: &str,
    commit: &str,
) -> Result<bool, DeployError> {
    let repository = image_repository(service);
    let tag = image_tag(commit);
    debug!("Looking for {}:{} in {}", repository, tag, registry.base_url());

    let status = registry
        .head(&["v2", repository.as_str(), "manifests", tag.as_str()], MANIFEST_V2)
        .await?;

    match status {
        StatusCode::OK => Ok(true),
        StatusCode::NOT_FOUND => Ok(false),
        other => Err(DeployError::HttpStatus {
            status: other.as_u16(),
            body: format!("unexpected status checking {}:{}", repository, tag),
        }),
    }
}

/// Fail with a precondition error unless the image for `commit` exists
pub async fn ensure_image_in_registry(
    registry: &HttpClient,
    service: &str,
    commit: &str,
) -> Result<(), DeployError> {
    if is_docker_image_already_in_registry(registry, service, commit).await? {
        info!("Found image for {} at {}", service, short_sha(commit));
        Ok(())
    } else {
        Err(DeployError::Precondition(format!(
            "{}:{} is not in the docker registry yet; wait for the build to push it",
            image_repository(service),
            image_tag(commit)
        )))
    }
}
