//! Shared helpers for vpkg-core integration tests
//!
//! `FixtureServer` is an axum app on an ephemeral port. A single fallback
//! handler answers GET and HEAD from an in-memory route table that tests
//! can change between requests, and records every request it saw.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, Once};

use axum::{
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};

use vpkg_core::Settings;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Route table and request log shared with the handler
#[derive(Clone, Default)]
struct FixtureState {
    routes: Arc<Mutex<HashMap<String, (u16, Vec<u8>)>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

pub struct FixtureServer {
    base_url: String,
    state: FixtureState,
}

impl FixtureServer {
    /// Bind `127.0.0.1:0` and serve on the test's runtime
    pub async fn start() -> Self {
        let state = FixtureState::default();
        let app = Router::new()
            .fallback(serve_route)
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fixture server");
        let base_url = format!("http://{}", listener.local_addr().expect("local addr"));

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { base_url, state }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Serve `body` with 200 at `path` (query strings are ignored)
    pub fn set(&self, path: &str, body: impl Into<Vec<u8>>) {
        self.set_status(path, 200, body);
    }

    pub fn set_status(&self, path: &str, status: u16, body: impl Into<Vec<u8>>) {
        self.state
            .routes
            .lock()
            .unwrap()
            .insert(normalize(path), (status, body.into()));
    }

    pub fn remove(&self, path: &str) {
        self.state.routes.lock().unwrap().remove(&normalize(path));
    }

    /// Requests seen so far, as `METHOD /path?query`
    pub fn requests(&self) -> Vec<String> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn hits(&self, path: &str) -> usize {
        let path = normalize(path);
        self.requests()
            .iter()
            .filter(|r| r.split_once(' ').map(|(_, p)| normalize(p)) == Some(path.clone()))
            .count()
    }

    /// Settings pointing every remote at this server
    pub fn settings(&self) -> Settings {
        Settings {
            registry_url: self.url("index.yaml"),
            contents_api_url: self.url("api"),
            content_timeout_secs: 5,
            probe_timeout_secs: 2,
            ..Settings::default()
        }
    }
}

fn normalize(path: &str) -> String {
    let path = path.split('?').next().unwrap_or_default();
    format!("/{}", path.trim_start_matches('/'))
}

async fn serve_route(State(state): State<FixtureState>, method: Method, uri: Uri) -> Response {
    state.requests.lock().unwrap().push(format!("{method} {uri}"));

    let (status, body) = state
        .routes
        .lock()
        .unwrap()
        .get(&normalize(uri.path()))
        .cloned()
        .unwrap_or((404, b"not found".to_vec()));
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if method == Method::HEAD {
        return status.into_response();
    }
    (status, body).into_response()
}

/// Registry index listing `repos` as `(name, manifest path)` in order
pub fn index_yaml(server: &FixtureServer, repos: &[(&str, &str)]) -> String {
    let mut yaml = format!(
        "version: \"1\"\nregistry_url: {}\nrepositories:\n",
        server.url("index.yaml")
    );
    for (name, manifest) in repos {
        yaml.push_str(&format!(
            "  - name: {name}\n    repository: https://github.com/acme/{name}\n    meta_url: {}\n    author: Acme\n    verified: true\n",
            server.url(manifest)
        ));
    }
    yaml.push_str("tags:\n  - name: cache\n    description: Caching\n");
    yaml
}

/// Contents-API JSON for a flat directory listing
pub fn listing_json(entries: &[(&str, &str)]) -> String {
    let items: Vec<_> = entries
        .iter()
        .map(|(name, kind)| serde_json::json!({ "name": name, "type": kind }))
        .collect();
    serde_json::Value::Array(items).to_string()
}

pub const CACHE_MANIFEST: &str = r#"version: "1"
repository: https://github.com/acme/official
author: Acme
license: MIT
packages:
  - name: acme/cache
    title: Cache
    description: Redis-backed cache client
    type: library-module
    templates: templates
    version: 1.2.0
    tags: [cache, redis]
    dependencies:
      - github.com/redis/go-redis/v9
"#;

pub const CLIENT_TEMPLATE: &str =
    "package {{.Package}}\n\n// {{.Title}} {{.Version}} for {{.Module}}\nconst Name = \"{{.VpkgName}}\"\n";

pub const README: &str = "# Cache\n\nUse {{.Pkg}} as-is.\n";

/// A registry with one repository hosting `acme/cache`
///
/// Two files, `client.go.tmpl` and `README.md`, listed through the
/// contents API under `templates`.
pub fn serve_cache_registry(server: &FixtureServer) {
    server.set("index.yaml", index_yaml(server, &[("official", "official/meta.yaml")]));
    server.set("official/meta.yaml", CACHE_MANIFEST);
    server.set(
        "api/repos/acme/official/contents/templates",
        listing_json(&[("client.go.tmpl", "file"), ("README.md", "file")]),
    );
    server.set("official/templates/client.go.tmpl", CLIENT_TEMPLATE);
    server.set("official/templates/README.md", README);
}

/// Empty project with a go.mod declaring `module`
pub fn create_go_project(root: &Path, module: &str) {
    std::fs::write(root.join("go.mod"), format!("module {module}\n\ngo 1.22\n"))
        .expect("write go.mod");
}

/// Write an install record for `name` into `{project}/vpkg/{name}`
///
/// `meta_extra` is appended to the descriptor snapshot and must already
/// be indented by two spaces.
pub fn write_installed(project: &Path, name: &str, kind: &str, version: &str, meta_extra: &str) -> std::path::PathBuf {
    let dir = project.join("vpkg").join(name);
    std::fs::create_dir_all(&dir).expect("create install dir");
    let record = format!(
        "name: {name}\nversion: {version}\ninstalled_at: 2024-05-01T12:00:00Z\npath: vpkg/{name}\ntype: {kind}\nmeta:\n  name: {name}\n  type: {kind}\n  templates: templates\n  version: {version}\n{meta_extra}"
    );
    std::fs::write(dir.join("meta.yaml"), record).expect("write meta.yaml");
    dir
}
