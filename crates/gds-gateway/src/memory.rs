//! In-process Drive backend.
//!
//! Serves the role opendal's memory service plays elsewhere: a complete
//! backend that unit and integration tests (and `--dry-run` style usage) can
//! exercise without credentials. Duplicate names under one parent are
//! permitted, matching the provider.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use gds_core::{GdsError, GdsResult};

use crate::model::{DriveFile, MIME_FOLDER};
use crate::DriveGateway;

#[derive(Debug, Clone)]
struct Node {
    name: String,
    mime_type: String,
    parent: Option<String>,
    content: Vec<u8>,
    modified_time: String,
    /// Insertion order within the parent, provider listing order.
    seq: u64,
}

pub struct MemoryDrive {
    root_id: String,
    nodes: Mutex<HashMap<String, Node>>,
    counter: AtomicU64,
}

impl MemoryDrive {
    /// An empty drive whose root folder has the given ID.
    pub fn new(root_id: &str) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            root_id.to_string(),
            Node {
                name: "My Drive".into(),
                mime_type: MIME_FOLDER.into(),
                parent: None,
                content: Vec::new(),
                modified_time: tick_time(0),
                seq: 0,
            },
        );
        MemoryDrive {
            root_id: root_id.to_string(),
            nodes: Mutex::new(nodes),
            counter: AtomicU64::new(1),
        }
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Create a subfolder; returns the new folder ID.
    pub fn mkdir(&self, parent_id: &str, name: &str) -> String {
        let n = self.next();
        let id = format!("folder-{n}");
        self.nodes.lock().unwrap().insert(
            id.clone(),
            Node {
                name: name.to_string(),
                mime_type: MIME_FOLDER.into(),
                parent: Some(parent_id.to_string()),
                content: Vec::new(),
                modified_time: tick_time(n),
                seq: n,
            },
        );
        id
    }

    /// Create or overwrite-by-new-node a file; returns the new file ID.
    pub fn put_file(&self, parent_id: &str, name: &str, content: &[u8]) -> String {
        self.put_file_mime(parent_id, name, content, guess_mime(name))
    }

    pub fn put_file_mime(&self, parent_id: &str, name: &str, content: &[u8], mime: &str) -> String {
        let n = self.next();
        let id = format!("file-{n}");
        self.nodes.lock().unwrap().insert(
            id.clone(),
            Node {
                name: name.to_string(),
                mime_type: mime.to_string(),
                parent: Some(parent_id.to_string()),
                content: content.to_vec(),
                modified_time: tick_time(n),
                seq: n,
            },
        );
        id
    }

    /// Replace a file's content in place, advancing its modified time.
    pub fn overwrite(&self, file_id: &str, content: &[u8]) -> bool {
        let n = self.next();
        let mut nodes = self.nodes.lock().unwrap();
        match nodes.get_mut(file_id) {
            Some(node) => {
                node.content = content.to_vec();
                node.modified_time = tick_time(n);
                true
            }
            None => false,
        }
    }

    /// First child of `parent_id` with the given name, if any.
    pub fn find_child(&self, parent_id: &str, name: &str) -> Option<DriveFile> {
        let nodes = self.nodes.lock().unwrap();
        let mut hits: Vec<(&String, &Node)> = nodes
            .iter()
            .filter(|(_, n)| n.parent.as_deref() == Some(parent_id) && n.name == name)
            .collect();
        hits.sort_by_key(|(_, n)| n.seq);
        hits.first().map(|(id, n)| to_file(id, n))
    }

    /// Re-parent (and optionally rename) a node, like a server-side `mv`.
    pub fn move_node(&self, file_id: &str, new_parent: &str, new_name: Option<&str>) -> bool {
        let mut nodes = self.nodes.lock().unwrap();
        match nodes.get_mut(file_id) {
            Some(node) => {
                node.parent = Some(new_parent.to_string());
                if let Some(name) = new_name {
                    node.name = name.to_string();
                }
                true
            }
            None => false,
        }
    }

    /// Synchronous content read, for code simulating the remote side.
    pub fn content(&self, file_id: &str) -> Option<Vec<u8>> {
        let nodes = self.nodes.lock().unwrap();
        nodes
            .get(file_id)
            .filter(|n| n.mime_type != MIME_FOLDER)
            .map(|n| n.content.clone())
    }

    /// Remove a node and everything under it.
    pub fn remove_tree(&self, file_id: &str) {
        let mut nodes = self.nodes.lock().unwrap();
        let mut stack = vec![file_id.to_string()];
        while let Some(id) = stack.pop() {
            let children: Vec<String> = nodes
                .iter()
                .filter(|(_, n)| n.parent.as_deref() == Some(id.as_str()))
                .map(|(cid, _)| cid.clone())
                .collect();
            stack.extend(children);
            nodes.remove(&id);
        }
    }
}

#[async_trait]
impl DriveGateway for MemoryDrive {
    async fn list_children(
        &self,
        folder_id: &str,
        max: Option<usize>,
    ) -> GdsResult<Vec<DriveFile>> {
        let nodes = self.nodes.lock().unwrap();
        if !nodes.contains_key(folder_id) {
            return Err(GdsError::Provider(format!("no such folder: {folder_id}")));
        }
        let mut children: Vec<(&String, &Node)> = nodes
            .iter()
            .filter(|(_, n)| n.parent.as_deref() == Some(folder_id))
            .collect();
        children.sort_by_key(|(_, n)| n.seq);
        let mut files: Vec<DriveFile> = children.iter().map(|(id, n)| to_file(id, n)).collect();
        if let Some(max) = max {
            files.truncate(max);
        }
        Ok(files)
    }

    async fn get_media(&self, file_id: &str) -> GdsResult<Vec<u8>> {
        let nodes = self.nodes.lock().unwrap();
        match nodes.get(file_id) {
            Some(node) if node.mime_type != MIME_FOLDER => Ok(node.content.clone()),
            Some(_) => Err(GdsError::Provider(format!("{file_id} is a folder"))),
            None => Err(GdsError::Provider(format!("no such file: {file_id}"))),
        }
    }

    async fn delete(&self, file_id: &str) -> GdsResult<()> {
        let mut nodes = self.nodes.lock().unwrap();
        nodes
            .remove(file_id)
            .map(|_| ())
            .ok_or_else(|| GdsError::Provider(format!("no such file: {file_id}")))
    }

    async fn get(&self, file_id: &str) -> GdsResult<DriveFile> {
        let nodes = self.nodes.lock().unwrap();
        nodes
            .get(file_id)
            .map(|n| to_file(&file_id.to_string(), n))
            .ok_or_else(|| GdsError::Provider(format!("no such file: {file_id}")))
    }

    async fn parents(&self, file_id: &str) -> GdsResult<Vec<String>> {
        let nodes = self.nodes.lock().unwrap();
        match nodes.get(file_id) {
            Some(node) => Ok(node.parent.iter().cloned().collect()),
            None => Err(GdsError::Provider(format!("no such file: {file_id}"))),
        }
    }
}

fn to_file(id: &String, node: &Node) -> DriveFile {
    DriveFile {
        id: id.clone(),
        name: node.name.clone(),
        mime_type: node.mime_type.clone(),
        size: if node.mime_type == MIME_FOLDER {
            None
        } else {
            Some(node.content.len() as u64)
        },
        modified_time: Some(node.modified_time.clone()),
    }
}

/// Monotonic fake RFC3339 timestamps; ordering is all freshness needs.
fn tick_time(n: u64) -> String {
    format!("2026-01-01T00:00:00.{n:09}Z")
}

fn guess_mime(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext) {
        Some("ipynb") => "application/vnd.google.colaboratory",
        Some("json") => "application/json",
        Some("txt") | Some("md") => "text/plain",
        Some("py") => "text/x-python",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}
