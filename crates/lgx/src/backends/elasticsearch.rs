//! # 📡 THE ELASTICSEARCH BACKEND
//!
//! *Previously, on lgx...*
//!
//! 🎬 COLD OPEN: INT. SERVER ROOM: 3:47 AM
//!
//! The dashboard is amber. The cluster is yellow. The engineer is beige, from the lack of
//! sunlight. Somewhere a service is logging "retrying..." in a tight loop, and every one of
//! those lines is about to become a document. This module is how.
//!
//! 🚀 One event, one `POST /{index}/_doc` (or `POST /{index}/{type}` on a pre-7 cluster that
//! still believes in mapping types). If the index came from a date pattern, one
//! `PUT /{index}/_alias/{alias}` after it. No bulk. No batching. No retries.
//! Fire, and (mostly) forget.
//!
//! 🧠 Knowledge graph:
//! - Explicit hosts: `host_list`, each normalized to `http://host:9200` when scheme/port are missing.
//!   A path prefix (`http://proxy/es`) survives, and the port goes in front of it.
//! - Auto-discovery: ask `discovery_seed` for `GET /_nodes/http` and use every `publish_address`.
//!   If the seed won't say, the seed itself is the host list. Population: one.
//! - Connect pings `GET /`, compares `cluster_name` and remembers `version.number`'s major.
//!   Wrong cluster is a hard stop. No version means a modern cluster.
//! - Requests rotate round-robin across hosts.
//! - Auth: api key beats basic auth. This is not a democracy.
//!
//! 🦆 (mandatory duck, no context provided, none shall be requested)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Url};
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use crate::backends::SearchStore;
use crate::document::Document;
use crate::sink::ElasticsearchSinkConfig;

/// 🔌 The HTTP port Elasticsearch answers on when nobody says otherwise.
pub const DEFAULT_ELASTICSEARCH_PORT: u16 = 9200;

/// 🔒 Who we claim to be when we knock.
#[derive(Debug, Clone)]
enum Auth {
    ApiKey(String),
    Basic {
        username: String,
        password: Option<String>,
    },
    Anonymous,
}

impl Auth {
    fn from_config(config: &ElasticsearchSinkConfig) -> Self {
        // -- 🔒 api_key is the premium tier, checked first
        if let Some(ref api_key) = config.api_key {
            Auth::ApiKey(api_key.clone())
        } else if let Some(ref username) = config.username {
            Auth::Basic {
                username: username.clone(),
                password: config.password.clone(),
            }
        } else {
            Auth::Anonymous
        }
    }

    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Auth::ApiKey(api_key) => request.header("Authorization", format!("ApiKey {}", api_key)),
            Auth::Basic { username, password } => request.basic_auth(username, password.as_ref()),
            Auth::Anonymous => request,
        }
    }
}

/// 📡 A connection to an Elasticsearch cluster over its HTTP API.
///
/// Internally holds:
/// - `client`: the HTTP muscle 💪, reused across requests
/// - `hosts`: base URLs, one per node we know about
/// - `next_host`: the round-robin cursor, atomic so `&self` is enough to pick a node
/// - `auth`: the credentials we present
/// - `major_version`: what `GET /` said, `None` if it kept that to itself
#[derive(Debug)]
pub struct ElasticsearchStore {
    client: reqwest::Client,
    hosts: Vec<String>,
    next_host: AtomicUsize,
    auth: Auth,
    major_version: Option<u64>,
}

/// 🧹 `host1` → `http://host1:9200`. Scheme and port are added only when missing.
pub(crate) fn normalize_host(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    let (scheme, rest) = trimmed.split_once("://").unwrap_or(("http", trimmed));
    // -- 🔍 the port lives in the authority, never in the path after it
    let (authority, the_path) = match rest.find('/') {
        Some(slash) => rest.split_at(slash),
        None => (rest, ""),
    };
    let has_port = authority
        .rsplit_once(':')
        .is_some_and(|(_, port)| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()));
    if has_port {
        format!("{}://{}{}", scheme, authority, the_path)
    } else {
        format!("{}://{}:{}{}", scheme, authority, DEFAULT_ELASTICSEARCH_PORT, the_path)
    }
}

/// 🔢 `"8.13.0"` → `8`. Anything unreadable is `None`.
fn major_version_of(root: &Value) -> Option<u64> {
    root.pointer("/version/number")
        .and_then(Value::as_str)?
        .split('.')
        .next()?
        .parse()
        .ok()
}

/// 🗺️ Pull every node's HTTP `publish_address` out of a `GET /_nodes/http` response.
///
/// Addresses come as `ip:port` or `hostname/ip:port`. The IP is what we dial.
fn publish_addresses(nodes_response: &Value) -> Vec<String> {
    let Some(nodes) = nodes_response.get("nodes").and_then(Value::as_object) else {
        return Vec::new();
    };
    nodes
        .values()
        .filter_map(|node| node.pointer("/http/publish_address").and_then(Value::as_str))
        .map(|address| address.rsplit('/').next().unwrap_or(address))
        .map(normalize_host)
        .collect()
}

impl ElasticsearchStore {
    /// 🚀 Dial the cluster described by `config`.
    ///
    /// 1. Build the `reqwest::Client` with the configured connect/request timeouts.
    /// 2. Settle on a host list: explicit, or discovered through the seed.
    /// 3. `GET /` on the first host and make sure the cluster is the one we were told about.
    pub async fn connect(config: &ElasticsearchSinkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("💀 The HTTP client refused to be born. The TLS stack wept. The architect shrugged. Probably a missing TLS cert or a cursed system OpenSSL. Either way: tragic.")?;

        let mut store = Self {
            client,
            hosts: Vec::new(),
            next_host: AtomicUsize::new(0),
            auth: Auth::from_config(config),
            major_version: None,
        };

        store.hosts = if config.host_list.is_empty() {
            info!(
                "🔭 No host_list configured, using auto-discovery through seed '{}'",
                config.discovery_seed
            );
            store.discover_hosts(&config.discovery_seed).await
        } else {
            info!("📋 Using provided hosts: {}", config.host_list.len());
            config.host_list.iter().map(|h| normalize_host(h)).collect()
        };
        for host in &store.hosts {
            debug!("➕ Adding host: {}", host);
        }

        store.major_version = store.verify_cluster_name(&config.cluster_name).await?;
        Ok(store)
    }

    /// 🏠 The base URLs this store rotates through.
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// 🏷️ The type segment of the index URL. Mapping types were removed in 7.0, after which
    /// every document is `_doc` no matter what `index_type` says.
    fn type_segment<'a>(&self, doc_type: &'a str) -> &'a str {
        match self.major_version {
            Some(major) if major < 7 => doc_type,
            _ => "_doc",
        }
    }

    /// 🔭 Ask the seed which nodes speak HTTP. Never fails: a mute seed is its own answer.
    async fn discover_hosts(&self, seed: &str) -> Vec<String> {
        let the_seed = normalize_host(seed);
        match self.fetch_json(&the_seed, &["_nodes", "http"]).await {
            Ok(nodes_response) => {
                let discovered = publish_addresses(&nodes_response);
                if discovered.is_empty() {
                    warn!("⚠️ Seed '{}' answered but listed no HTTP nodes, falling back to the seed itself", the_seed);
                    vec![the_seed]
                } else {
                    info!("🔭 Discovered {} node(s) through '{}'", discovered.len(), the_seed);
                    discovered
                }
            }
            Err(err) => {
                warn!(
                    "⚠️ Node discovery through '{}' failed ({:#}), falling back to the seed itself",
                    the_seed, err
                );
                vec![the_seed]
            }
        }
    }

    /// 🪪 `GET /` and compare `cluster_name`. A missing name is tolerated, a different one is not.
    ///
    /// Hands back the cluster's major version while it's at it.
    async fn verify_cluster_name(&self, expected: &str) -> Result<Option<u64>> {
        let the_host = self
            .hosts
            .first()
            .context("💀 The host list is empty. There is nobody to talk to.")?;
        let the_root = self
            .fetch_json(the_host, &[])
            .await
            .with_context(|| format!("💀 Could not reach Elasticsearch at '{}'. Is it running? Is the port right? Is the firewall having a day?", the_host))?;
        let the_major = major_version_of(&the_root);

        match the_root.get("cluster_name").and_then(Value::as_str) {
            Some(actual) if actual == expected => {
                info!(
                    "✅ Connected to cluster '{}' via {} (major version {:?})",
                    actual, the_host, the_major
                );
                Ok(the_major)
            }
            Some(actual) => anyhow::bail!(
                "💀 Expected cluster '{}' but '{}' introduced itself as '{}'. Wrong party. Check cluster_name.",
                expected,
                the_host,
                actual
            ),
            None => {
                warn!("⚠️ '{}' did not report a cluster_name, assuming it is '{}'", the_host, expected);
                Ok(the_major)
            }
        }
    }

    /// 🔄 Round-robin host pick. Wraps forever. Never panics on an empty list because
    /// `connect` never builds one.
    fn pick_host(&self) -> &str {
        let slot = self.next_host.fetch_add(1, Ordering::Relaxed) % self.hosts.len().max(1);
        self.hosts.get(slot).map(String::as_str).unwrap_or_default()
    }

    /// 📐 `host` + percent-encoded path segments.
    fn endpoint(host: &str, segments: &[&str]) -> Result<Url> {
        let mut url =
            Url::parse(host).with_context(|| format!("💀 '{}' is not a usable base URL", host))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("💀 '{}' cannot carry a path", host))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// 📥 GET a JSON document. Non-2xx is an error, with the body attached for the postmortem.
    async fn fetch_json(&self, host: &str, segments: &[&str]) -> Result<Value> {
        let url = Self::endpoint(host, segments)?;
        let response = self
            .auth
            .apply(self.client.get(url.clone()))
            .send()
            .await
            .with_context(|| format!("💀 GET {} never came back", url))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("💀 GET {} answered, then mumbled", url))?;
        if !status.is_success() {
            anyhow::bail!("💀 GET {} said '{}': {}", url, status, body);
        }
        serde_json::from_str(&body)
            .with_context(|| format!("💀 GET {} returned something that is not JSON", url))
    }
}

#[async_trait]
impl SearchStore for ElasticsearchStore {
    /// 📡 `POST /{index}/_doc` (or `/{index}/{type}` before 7.0) with the document as the body.
    /// No id: the cluster mints one.
    async fn write(&self, index: &str, doc_type: &str, document: &Document) -> Result<()> {
        let url = Self::endpoint(self.pick_host(), &[index, self.type_segment(doc_type)])?;
        let body = serde_json::to_vec(document).context(
            "💀 The document refused to become JSON. The JSON that describes a log line has failed to become JSON.",
        )?;
        trace!("📡 Sending {} bytes of type '{}' to {}", body.len(), doc_type, url);

        let response = self
            .auth
            .apply(self.client.post(url.clone()))
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .with_context(|| format!("💀 The index request to {} never made it. Check connectivity, check timeouts, check your feelings.", url))?;

        let status = response.status();
        if !status.is_success() {
            // -- 💀 we got a response, it just wasn't good news. the body usually says which mapping is upset.
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "💀 Elasticsearch looked at our document for '{}' and said '{}'. The response read: '{}'",
                index,
                status,
                body
            );
        }
        trace!("✅ Document landed in '{}'", index);
        Ok(())
    }

    /// 🏷️ `PUT /{index}/_alias/{alias}`. Elasticsearch treats a repeat as a no-op, so do we.
    async fn add_alias(&self, index: &str, alias: &str) -> Result<()> {
        let url = Self::endpoint(self.pick_host(), &[index, "_alias", alias])?;
        let response = self
            .auth
            .apply(self.client.put(url.clone()))
            .send()
            .await
            .with_context(|| format!("💀 The alias request to {} never made it", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "💀 Elasticsearch would not alias '{}' as '{}': '{}' {}",
                index,
                alias,
                status,
                body
            );
        }
        trace!("🏷️ '{}' is now reachable as '{}'", index, alias);
        Ok(())
    }

    /// 🗑️ Nothing buffered, nothing to flush. The connection pool drops with the client.
    async fn close(&mut self) -> Result<()> {
        debug!("🗑️ Elasticsearch store closing, {} host(s) released", self.hosts.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Event, Priority};
    use crate::document;
    use crate::transcode::Charset;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn the_cluster_named(name: &str) -> MockServer {
        the_cluster_on_version(name, "8.13.0").await
    }

    async fn the_cluster_on_version(name: &str, version: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "node-1",
                "cluster_name": name,
                "version": { "number": version }
            })))
            .mount(&server)
            .await;
        server
    }

    fn the_config_for(server: &MockServer) -> ElasticsearchSinkConfig {
        ElasticsearchSinkConfig {
            host_list: vec![server.uri()],
            ..ElasticsearchSinkConfig::default()
        }
    }

    fn the_document() -> Document {
        let the_event = Event::new("message goes here", 0, Priority::Info, "localhost")
            .with_attribute("attr3", r#"{"key":"value"}"#);
        document::build(&the_event, Charset::Utf8).expect("document builds")
    }

    #[test]
    fn the_one_where_bare_hostnames_get_dressed_up() {
        assert_eq!(normalize_host("host1"), "http://host1:9200");
        assert_eq!(normalize_host(" host2:9201 "), "http://host2:9201");
        assert_eq!(normalize_host("https://secure.example/"), "https://secure.example:9200");
        assert_eq!(normalize_host("http://10.0.0.1:9200"), "http://10.0.0.1:9200");
    }

    #[test]
    fn the_one_where_a_path_prefix_keeps_the_port_out_of_it() {
        assert_eq!(normalize_host("http://h:9200/es"), "http://h:9200/es");
        assert_eq!(normalize_host("h/es"), "http://h:9200/es");
        assert_eq!(normalize_host("https://proxy.example/es/v1/"), "https://proxy.example:9200/es/v1");
        // 🔢 digits after a ':' in the path are not a port either
        assert_eq!(normalize_host("proxy/es:8080"), "http://proxy:9200/es:8080");
    }

    #[test]
    fn the_one_where_the_version_is_read_off_the_front_door() {
        assert_eq!(major_version_of(&json!({ "version": { "number": "8.13.0" } })), Some(8));
        assert_eq!(major_version_of(&json!({ "version": { "number": "6.8.23" } })), Some(6));
        assert_eq!(major_version_of(&json!({ "version": { "number": "banana" } })), None);
        assert_eq!(major_version_of(&json!({ "cluster_name": "elasticsearch" })), None);
    }

    #[test]
    fn the_one_where_publish_addresses_lose_their_hostnames() {
        let the_nodes = json!({
            "nodes": {
                "a": { "http": { "publish_address": "10.0.0.1:9200" } },
                "b": { "http": { "publish_address": "es-2.internal/10.0.0.2:9200" } },
                "c": { "name": "no http here" }
            }
        });
        let mut the_addresses = publish_addresses(&the_nodes);
        the_addresses.sort();
        assert_eq!(the_addresses, vec!["http://10.0.0.1:9200", "http://10.0.0.2:9200"]);
    }

    #[tokio::test]
    async fn the_one_where_a_modern_cluster_gets_doc_not_the_type() -> Result<()> {
        let server = the_cluster_named("elasticsearch").await;
        let the_document = the_document();
        Mock::given(method("POST"))
            .and(path("/flume/_doc"))
            .and(header("Content-Type", "application/json"))
            .and(body_json(serde_json::to_value(&the_document)?))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "result": "created" })))
            .expect(1)
            .mount(&server)
            .await;

        let the_store = ElasticsearchStore::connect(&the_config_for(&server)).await?;
        the_store.write("flume", "log", &the_document).await?;
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_an_old_cluster_still_gets_its_type() -> Result<()> {
        let server = the_cluster_on_version("elasticsearch", "6.8.0").await;
        Mock::given(method("POST"))
            .and(path("/flume/log"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "result": "created" })))
            .expect(1)
            .mount(&server)
            .await;

        let the_store = ElasticsearchStore::connect(&the_config_for(&server)).await?;
        the_store.write("flume", "log", &the_document()).await?;
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_path_prefix_survives_all_the_way_to_the_write() -> Result<()> {
        let server = the_cluster_named("elasticsearch").await;
        Mock::given(method("GET"))
            .and(path("/es"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "cluster_name": "elasticsearch",
                "version": { "number": "7.17.0" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/es/flume/_doc"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "result": "created" })))
            .expect(1)
            .mount(&server)
            .await;

        let the_config = ElasticsearchSinkConfig {
            host_list: vec![format!("{}/es", server.uri())],
            ..ElasticsearchSinkConfig::default()
        };
        let the_store = ElasticsearchStore::connect(&the_config).await?;
        assert_eq!(the_store.hosts(), &[format!("{}/es", server.uri())]);
        the_store.write("flume", "log", &the_document()).await?;
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_rejected_document_is_an_error() -> Result<()> {
        let server = the_cluster_named("elasticsearch").await;
        Mock::given(method("POST"))
            .and(path("/flume/_doc"))
            .respond_with(ResponseTemplate::new(400).set_body_string("mapper_parsing_exception"))
            .mount(&server)
            .await;

        let the_store = ElasticsearchStore::connect(&the_config_for(&server)).await?;
        let the_error = the_store
            .write("flume", "log", &the_document())
            .await
            .expect_err("a 400 is not a success");
        assert!(format!("{:#}", the_error).contains("mapper_parsing_exception"));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_aliases_are_put_not_posted() -> Result<()> {
        let server = the_cluster_named("elasticsearch").await;
        Mock::given(method("PUT"))
            .and(path("/test_1970-01-01/_alias/flume"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "acknowledged": true })))
            .expect(2)
            .mount(&server)
            .await;

        let the_store = ElasticsearchStore::connect(&the_config_for(&server)).await?;
        the_store.add_alias("test_1970-01-01", "flume").await?;
        // 🔁 twice, because idempotence is a promise, not a vibe
        the_store.add_alias("test_1970-01-01", "flume").await?;
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_wrong_cluster_is_turned_away() {
        let server = the_cluster_named("somebody-elses-cluster").await;
        let the_config = ElasticsearchSinkConfig {
            cluster_name: "mycluster".to_string(),
            ..the_config_for(&server)
        };
        let the_error = ElasticsearchStore::connect(&the_config)
            .await
            .expect_err("cluster name mismatch must fail");
        assert!(the_error.to_string().contains("somebody-elses-cluster"));
    }

    #[tokio::test]
    async fn the_one_where_the_api_key_gets_the_vip_entrance() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(header("Authorization", "ApiKey sekrit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "cluster_name": "elasticsearch" })))
            .expect(1)
            .mount(&server)
            .await;

        let the_config = ElasticsearchSinkConfig {
            api_key: Some("sekrit".to_string()),
            username: Some("ignored".to_string()),
            ..the_config_for(&server)
        };
        ElasticsearchStore::connect(&the_config).await?;
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_seed_introduces_its_friends() -> Result<()> {
        let server = the_cluster_named("elasticsearch").await;
        let the_address = server.address().to_string();
        Mock::given(method("GET"))
            .and(path("/_nodes/http"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "nodes": { "n1": { "http": { "publish_address": format!("localhost/{}", the_address) } } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let the_config = ElasticsearchSinkConfig {
            discovery_seed: server.uri(),
            ..ElasticsearchSinkConfig::default()
        };
        let the_store = ElasticsearchStore::connect(&the_config).await?;
        assert_eq!(the_store.hosts(), &[format!("http://{}", the_address)]);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_shy_seed_becomes_the_whole_cluster() -> Result<()> {
        let server = the_cluster_named("elasticsearch").await;
        Mock::given(method("GET"))
            .and(path("/_nodes/http"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let the_config = ElasticsearchSinkConfig {
            discovery_seed: server.uri(),
            ..ElasticsearchSinkConfig::default()
        };
        let the_store = ElasticsearchStore::connect(&the_config).await?;
        assert_eq!(the_store.hosts(), &[normalize_host(&server.uri())]);
        Ok(())
    }
}
