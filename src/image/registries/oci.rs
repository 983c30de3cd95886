//! OCI distribution API registry implementation

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::header::{ACCEPT, LINK, RETRY_AFTER, WWW_AUTHENTICATE};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

use crate::config::{Credential, RegistryConfig};
use crate::image::error::RegistryError;
use crate::image::reference::{DEFAULT_REGISTRY, Repository, TaggedReference};
use crate::image::registry::{DigestResolver, TagLister};
use crate::image::types::{Origin, ResolvedImage};

/// Host serving the Docker Hub registry API
const DOCKER_HUB_API_HOST: &str = "registry-1.docker.io";

/// Number of tags requested per page
const TAGS_PAGE_SIZE: u32 = 1000;

/// Manifest and index media types accepted when resolving a digest
const MANIFEST_MEDIA_TYPES: &str = "application/vnd.oci.image.index.v1+json,\
application/vnd.oci.image.manifest.v1+json,\
application/vnd.docker.distribution.manifest.list.v2+json,\
application/vnd.docker.distribution.manifest.v2+json";

const DOCKER_CONTENT_DIGEST: &str = "docker-content-digest";

static DIGEST_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:[.+_-][a-z0-9]+)*:[a-fA-F0-9]{32,}$").expect("digest pattern is valid")
});

/// Response from the tags list endpoint
#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Response from a bearer token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// Registry client speaking the OCI distribution API
///
/// Lists tags and resolves tags to digests. Bearer tokens obtained from
/// authentication challenges are kept per repository scope for the lifetime
/// of the client.
pub struct OciRegistry {
    client: reqwest::Client,
    insecure: bool,
    credentials: Vec<Credential>,
    tokens: RwLock<HashMap<String, String>>,
}

impl OciRegistry {
    /// Creates a new OciRegistry from registry settings
    pub fn new(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            insecure: config.insecure,
            credentials: config.credentials.clone(),
            tokens: RwLock::new(HashMap::new()),
        })
    }

    /// Scheme and host serving the API of `registry`
    fn base_url(&self, registry: &str) -> String {
        let scheme = if self.insecure || is_loopback(registry) {
            "http"
        } else {
            "https"
        };
        let host = if registry == DEFAULT_REGISTRY {
            DOCKER_HUB_API_HOST
        } else {
            registry
        };

        format!("{}://{}", scheme, host)
    }

    fn credential_for(&self, registry: &str) -> Option<&Credential> {
        self.credentials
            .iter()
            .find(|credential| credential.matches(registry))
    }

    fn request(
        &self,
        method: Method,
        url: &str,
        accept: Option<&str>,
        auth: Option<&Auth<'_>>,
    ) -> RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some(accept) = accept {
            builder = builder.header(ACCEPT, accept);
        }

        match auth {
            Some(Auth::Bearer(token)) => builder.bearer_auth(token),
            Some(Auth::Basic(credential)) => {
                builder.basic_auth(&credential.username, Some(&credential.password))
            }
            None => builder,
        }
    }

    /// Sends a request, answering one authentication challenge if the
    /// registry issues it
    async fn send(
        &self,
        method: Method,
        url: &str,
        repository: &Repository,
        accept: Option<&str>,
    ) -> Result<Response, RegistryError> {
        let scope = format!("repository:{}:pull", repository.path());
        let token_key = format!("{}/{}", repository.registry(), scope);

        let cached = self.tokens.read().await.get(&token_key).cloned();
        let auth = cached.map(Auth::Bearer);
        let response = self
            .request(method.clone(), url, accept, auth.as_ref())
            .send()
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(challenge) = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .and_then(Challenge::parse)
        else {
            return Ok(response);
        };

        let auth = match challenge {
            Challenge::Bearer {
                realm,
                service,
                scope: challenge_scope,
            } => {
                let token = self
                    .fetch_token(
                        &realm,
                        service.as_deref(),
                        challenge_scope.as_deref().unwrap_or(&scope),
                        repository.registry(),
                    )
                    .await?;
                self.tokens
                    .write()
                    .await
                    .insert(token_key, token.clone());
                Auth::Bearer(token)
            }
            Challenge::Basic => match self.credential_for(repository.registry()) {
                Some(credential) => Auth::Basic(credential),
                None => return Ok(response),
            },
        };

        debug!("Repeating request to {} with credentials", url);
        Ok(self.request(method, url, accept, Some(&auth)).send().await?)
    }

    async fn fetch_token(
        &self,
        realm: &str,
        service: Option<&str>,
        scope: &str,
        registry: &str,
    ) -> Result<String, RegistryError> {
        let mut params = vec![("scope", scope)];
        if let Some(service) = service {
            params.push(("service", service));
        }
        let url = Url::parse_with_params(realm, &params)
            .map_err(|e| RegistryError::InvalidResponse(format!("Invalid token realm: {}", e)))?;

        debug!("Requesting token from {}", realm);

        let mut request = self.client.get(url);
        if let Some(credential) = self.credential_for(registry) {
            request = request.basic_auth(&credential.username, Some(&credential.password));
        }

        let response = check_status(request.send().await?, realm)?;
        let body: TokenResponse = response.json().await.map_err(|e| {
            warn!("Failed to parse token response: {}", e);
            RegistryError::InvalidResponse(e.to_string())
        })?;

        body.token.or(body.access_token).ok_or_else(|| {
            RegistryError::InvalidResponse(format!("Token response from {} has no token", realm))
        })
    }
}

#[async_trait::async_trait]
impl TagLister for OciRegistry {
    async fn list_tags(&self, repository: &Repository) -> Result<Vec<String>, RegistryError> {
        let base_url = self.base_url(repository.registry());
        let mut url = format!(
            "{}/v2/{}/tags/list?n={}",
            base_url,
            repository.path(),
            TAGS_PAGE_SIZE
        );
        let mut tags = Vec::new();
        let mut visited = HashSet::new();

        loop {
            debug!("Listing tags from {}", url);

            let response = self.send(Method::GET, &url, repository, None).await?;
            let response = check_status(response, &repository.name())?;

            let next_url = response
                .headers()
                .get(LINK)
                .and_then(|h| h.to_str().ok())
                .and_then(|link| next_page_url(link, &base_url));

            let page: TagsResponse = response.json().await.map_err(|e| {
                warn!("Failed to parse tags response: {}", e);
                RegistryError::InvalidResponse(e.to_string())
            })?;
            tags.extend(page.tags.unwrap_or_default());

            visited.insert(url);
            match next_url {
                Some(next) if visited.contains(&next) => {
                    warn!("Registry pagination for {} revisits {}, stopping", repository, next);
                    break;
                }
                Some(next) => url = next,
                None => break,
            }
        }

        trace!("Found {} tags for {}", tags.len(), repository);
        Ok(tags)
    }
}

#[async_trait::async_trait]
impl DigestResolver for OciRegistry {
    async fn resolve_digest(&self, image: &str) -> Result<ResolvedImage, RegistryError> {
        let reference = TaggedReference::parse(image)?;
        let repository = reference.repository();
        let subject = reference.to_string();
        let url = format!(
            "{}/v2/{}/manifests/{}",
            self.base_url(repository.registry()),
            repository.path(),
            reference.tag()
        );

        debug!("Resolving digest from {}", url);

        let response = self
            .send(Method::HEAD, &url, repository, Some(MANIFEST_MEDIA_TYPES))
            .await?;
        let digest = match content_digest(&check_status(response, &subject)?) {
            Some(digest) => digest,
            None => {
                debug!("No digest in HEAD response for {}, falling back to GET", subject);
                let response = self
                    .send(Method::GET, &url, repository, Some(MANIFEST_MEDIA_TYPES))
                    .await?;
                content_digest(&check_status(response, &subject)?).ok_or_else(|| {
                    RegistryError::InvalidResponse(format!(
                        "Missing {} header for {}",
                        DOCKER_CONTENT_DIGEST, subject
                    ))
                })?
            }
        };

        if !DIGEST_PATTERN.is_match(&digest) {
            return Err(RegistryError::InvalidResponse(format!(
                "Invalid digest '{}' for {}",
                digest, subject
            )));
        }

        Ok(ResolvedImage::new(
            format!("{}@{}", repository.name(), digest),
            vec![Origin::Resolved {
                url: image.to_string(),
                tag: reference.tag().to_string(),
            }],
        ))
    }
}

enum Auth<'a> {
    Bearer(String),
    Basic(&'a Credential),
}

/// A `WWW-Authenticate` challenge
#[derive(Debug, PartialEq, Eq)]
enum Challenge {
    Bearer {
        realm: String,
        service: Option<String>,
        scope: Option<String>,
    },
    Basic,
}

impl Challenge {
    fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params) = header.split_once(' ').unwrap_or((header, ""));

        if scheme.eq_ignore_ascii_case("basic") {
            return Some(Challenge::Basic);
        }
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let mut params = parse_auth_params(params);
        Some(Challenge::Bearer {
            realm: params.remove("realm")?,
            service: params.remove("service"),
            scope: params.remove("scope"),
        })
    }
}

/// Parse `key="value",key=value` pairs; quoted values may contain commas
fn parse_auth_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut rest = input.trim();

    while let Some((key, after)) = rest.split_once('=') {
        let key = key.trim().to_ascii_lowercase();
        let after = after.trim_start();

        let (value, remaining) = match after.strip_prefix('"') {
            Some(quoted) => match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            },
            None => match after.find(',') {
                Some(end) => (&after[..end], &after[end..]),
                None => (after, ""),
            },
        };

        params.insert(key, value.to_string());
        rest = remaining.trim_start().trim_start_matches(',').trim_start();
    }

    params
}

/// Map error statuses to registry errors
fn check_status(response: Response, subject: &str) -> Result<Response, RegistryError> {
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return Err(RegistryError::NotFound(subject.to_string()));
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(RegistryError::Unauthorized(format!("{} ({})", subject, status)));
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        return Err(RegistryError::RateLimited {
            retry_after_secs: retry_after,
        });
    }

    if !status.is_success() {
        warn!("Registry returned status {}: {}", status, response.url());
        return Err(RegistryError::InvalidResponse(format!(
            "Unexpected status: {}",
            status
        )));
    }

    Ok(response)
}

fn content_digest(response: &Response) -> Option<String> {
    response
        .headers()
        .get(DOCKER_CONTENT_DIGEST)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a Link header for the next page
/// Format: </v2/org/app/tags/list?n=1000&last=tag>; rel="next"
fn next_page_url(link: &str, base_url: &str) -> Option<String> {
    link.split(',')
        .map(str::trim)
        .filter(|part| part.contains("rel=\"next\""))
        .find_map(|part| {
            let start = part.find('<')?;
            let end = part.find('>')?;
            let url = &part[start + 1..end];
            if url.starts_with('/') {
                Some(format!("{}{}", base_url, url))
            } else {
                Some(url.to_string())
            }
        })
}

fn is_loopback(registry: &str) -> bool {
    let host = match registry.strip_prefix('[') {
        Some(bracketed) => bracketed.split(']').next().unwrap_or(bracketed),
        None => registry.split(':').next().unwrap_or(registry),
    };

    host == "localhost"
        || host.ends_with(".localhost")
        || host.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
}
