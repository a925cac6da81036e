//! In-memory repository with transaction, tombstone and version semantics.
//!
//! Every transaction works on its own copy of the committed tree. On commit
//! only the paths the transaction touched are written back, so concurrent
//! transactions on different records do not clobber each other.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RequestBody};
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

pub const BASE_URL: &str = "http://repo.test/fedora/rest";

const TX_SEGMENT: &str = "fcr:tx";
const COMMIT_SUFFIX: &str = "fcr:tx/fcr:commit";
const ROLLBACK_SUFFIX: &str = "fcr:tx/fcr:rollback";
const TOMBSTONE_SUFFIX: &str = "/fcr:tombstone";
const VERSIONS_SUFFIX: &str = "/fcr:versions";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    /// `None` for the version created with the resource
    pub label: Option<String>,
    pub content: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Container,
    Binary {
        content_type: String,
        file_name: Option<String>,
        versions: Vec<Version>,
    },
}

impl Node {
    pub fn is_container(&self) -> bool {
        matches!(self, Node::Container)
    }

    pub fn versions(&self) -> &[Version] {
        match self {
            Node::Container => &[],
            Node::Binary { versions, .. } => versions,
        }
    }

    pub fn content(&self) -> Option<&Bytes> {
        self.versions().last().map(|version| &version.content)
    }

    pub fn content_type(&self) -> Option<&str> {
        match self {
            Node::Container => None,
            Node::Binary { content_type, .. } => Some(content_type),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Tree {
    nodes: BTreeMap<String, Node>,
    tombstones: BTreeSet<String>,
}

impl Tree {
    fn is_gone(&self, path: &str) -> bool {
        self.tombstones
            .iter()
            .any(|tombstone| path == tombstone || path.starts_with(&format!("{}/", tombstone)))
    }
}

#[derive(Debug)]
struct Workspace {
    tree: Tree,
    touched: BTreeSet<String>,
}

impl Workspace {
    fn touch(&mut self, path: &str) {
        self.touched.insert(path.to_string());
    }
}

#[derive(Debug, Clone)]
struct Failure {
    method: HttpMethod,
    url_suffix: String,
    status: u16,
}

#[derive(Debug, Default)]
struct State {
    committed: Tree,
    transactions: HashMap<String, Workspace>,
    next_transaction: u32,
    failures: Vec<Failure>,
    requests: Vec<(HttpMethod, String)>,
}

/// Repository fake speaking the subset of the REST API the engine uses.
#[derive(Debug, Default)]
pub struct FakeRepository {
    state: Mutex<State>,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every request whose method matches and whose URL ends with
    /// `url_suffix` answer `status`.
    pub fn fail_when(&self, method: HttpMethod, url_suffix: &str, status: u16) {
        self.state.lock().unwrap().failures.push(Failure {
            method,
            url_suffix: url_suffix.to_string(),
            status,
        });
    }

    /// Put a committed binary at `path` (relative to the base URL).
    pub fn seed_binary(&self, path: &str, content: &'static [u8]) {
        let mut state = self.state.lock().unwrap();
        state.committed.nodes.insert(
            path.to_string(),
            Node::Binary {
                content_type: "application/octet-stream".to_string(),
                file_name: None,
                versions: vec![Version {
                    label: None,
                    content: Bytes::from_static(content),
                }],
            },
        );
    }

    pub fn seed_container(&self, path: &str) {
        let mut state = self.state.lock().unwrap();
        state.committed.nodes.insert(path.to_string(), Node::Container);
    }

    /// Committed node at `path` (relative to the base URL).
    pub fn node(&self, path: &str) -> Option<Node> {
        self.state.lock().unwrap().committed.nodes.get(path).cloned()
    }

    /// Committed paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .committed
            .nodes
            .keys()
            .cloned()
            .collect()
    }

    pub fn open_transactions(&self) -> usize {
        self.state.lock().unwrap().transactions.len()
    }

    pub fn requests(&self) -> Vec<(HttpMethod, String)> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn count_requests(&self, method: HttpMethod, url_suffix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|(m, url)| *m == method && url.ends_with(url_suffix))
            .count()
    }

    fn handle(&self, request: HttpRequest) -> HttpResponse {
        let mut state = self.state.lock().unwrap();
        state.requests.push((request.method, request.url.clone()));

        if let Some(failure) = state
            .failures
            .iter()
            .find(|f| f.method == request.method && request.url.ends_with(&f.url_suffix))
        {
            return HttpResponse::new(failure.status).with_body("injected failure");
        }

        let Some(rest) = request
            .url
            .strip_prefix(BASE_URL)
            .map(|rest| rest.trim_start_matches('/').to_string())
        else {
            return HttpResponse::new(404);
        };

        if rest == TX_SEGMENT && request.method == HttpMethod::Post {
            state.next_transaction += 1;
            let id = format!("tx:{:04}", state.next_transaction);
            let workspace = Workspace {
                tree: state.committed.clone(),
                touched: BTreeSet::new(),
            };
            state.transactions.insert(id.clone(), workspace);
            return HttpResponse::new(201)
                .with_header("Location", format!("{}/{}", BASE_URL, id));
        }

        let Some(tx_rest) = rest.strip_prefix("tx:") else {
            return read_only(&state.committed, &rest, &request);
        };
        let (id, path) = match tx_rest.split_once('/') {
            Some((number, path)) => (format!("tx:{}", number), path.to_string()),
            None => (format!("tx:{}", tx_rest), String::new()),
        };

        if !state.transactions.contains_key(&id) {
            return HttpResponse::new(410).with_body("transaction is gone");
        }

        if request.method == HttpMethod::Post && path == TX_SEGMENT {
            return HttpResponse::new(204);
        }
        if request.method == HttpMethod::Post && path == COMMIT_SUFFIX {
            if let Some(workspace) = state.transactions.remove(&id) {
                commit(&mut state.committed, workspace);
            }
            return HttpResponse::new(204);
        }
        if request.method == HttpMethod::Post && path == ROLLBACK_SUFFIX {
            state.transactions.remove(&id);
            return HttpResponse::new(204);
        }

        match state.transactions.get_mut(&id) {
            Some(workspace) => in_transaction(workspace, &path, &request),
            None => HttpResponse::new(410),
        }
    }
}

#[async_trait]
impl HttpClient for FakeRepository {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        Ok(self.handle(request))
    }
}

fn commit(committed: &mut Tree, workspace: Workspace) {
    for path in workspace.touched {
        match workspace.tree.nodes.get(&path) {
            Some(node) => {
                committed.nodes.insert(path.clone(), node.clone());
            }
            None => {
                committed.nodes.remove(&path);
            }
        }
        if workspace.tree.tombstones.contains(&path) {
            committed.tombstones.insert(path);
        } else {
            committed.tombstones.remove(&path);
        }
    }
}

/// Bytes of a request entity; file bodies are read the way a streaming
/// client would send them.
fn entity(body: &RequestBody) -> Bytes {
    match body {
        RequestBody::Bytes(bytes) => bytes.clone(),
        RequestBody::File(path) => std::fs::read(path)
            .map(Bytes::from)
            .unwrap_or_else(|e| panic!("upload of {} failed: {}", path.display(), e)),
    }
}

fn read_only(tree: &Tree, path: &str, request: &HttpRequest) -> HttpResponse {
    match request.method {
        HttpMethod::Get if tree.nodes.contains_key(path) => {
            HttpResponse::new(200)
        }
        HttpMethod::Get if tree.is_gone(path) => HttpResponse::new(410),
        HttpMethod::Get => HttpResponse::new(404),
        _ => HttpResponse::new(405).with_body("writes require a transaction"),
    }
}

fn in_transaction(workspace: &mut Workspace, path: &str, request: &HttpRequest) -> HttpResponse {
    if let Some(target) = path.strip_suffix(TOMBSTONE_SUFFIX) {
        if request.method != HttpMethod::Delete {
            return HttpResponse::new(405);
        }
        return if workspace.tree.tombstones.remove(target) {
            workspace.touch(target);
            HttpResponse::new(204)
        } else {
            HttpResponse::new(404).with_body("no tombstone")
        };
    }

    if let Some(target) = path.strip_suffix(VERSIONS_SUFFIX) {
        if request.method != HttpMethod::Post {
            return HttpResponse::new(405);
        }
        let label = request.headers.get("Slug").cloned();
        let content = request.body.as_ref().map(entity).unwrap_or_default();
        return match workspace.tree.nodes.get_mut(target) {
            Some(Node::Binary { versions, .. }) => {
                let location = format!("{}/{}", request.url, label.clone().unwrap_or_default());
                versions.push(Version { label, content });
                workspace.touch(target);
                HttpResponse::new(201).with_header("Location", location)
            }
            Some(Node::Container) => HttpResponse::new(400).with_body("not a binary"),
            None => HttpResponse::new(404),
        };
    }

    match request.method {
        HttpMethod::Get => {
            if workspace.tree.nodes.contains_key(path) {
                HttpResponse::new(200)
            } else if workspace.tree.is_gone(path) {
                HttpResponse::new(410)
            } else {
                HttpResponse::new(404)
            }
        }
        HttpMethod::Put => {
            if workspace.tree.is_gone(path) {
                return HttpResponse::new(410).with_body("tombstone in the way");
            }
            if workspace.tree.nodes.contains_key(path) {
                return HttpResponse::new(409).with_body("already exists");
            }
            let node = match request.body.as_ref().map(entity) {
                None => Node::Container,
                Some(content) => Node::Binary {
                    content_type: request
                        .headers
                        .get("Content-Type")
                        .cloned()
                        .unwrap_or_default(),
                    file_name: request
                        .headers
                        .get("Content-Disposition")
                        .and_then(|value| value.split("filename=").nth(1))
                        .map(|name| name.trim_matches('"').to_string()),
                    versions: vec![Version {
                        label: None,
                        content,
                    }],
                },
            };
            workspace.tree.nodes.insert(path.to_string(), node);
            workspace.touch(path);
            HttpResponse::new(201).with_header("Location", request.url.clone())
        }
        HttpMethod::Delete => {
            if !workspace.tree.nodes.contains_key(path) {
                return HttpResponse::new(404);
            }
            let prefix = format!("{}/", path);
            let removed: Vec<String> = workspace
                .tree
                .nodes
                .keys()
                .filter(|key| key.as_str() == path || key.starts_with(&prefix))
                .cloned()
                .collect();
            for key in removed {
                workspace.tree.nodes.remove(&key);
                workspace.touch(&key);
            }
            workspace.tree.tombstones.insert(path.to_string());
            workspace.touch(path);
            HttpResponse::new(204)
        }
        HttpMethod::Post => HttpResponse::new(405),
    }
}
