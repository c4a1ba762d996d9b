use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use gds_core::{vpath, GdsConfig, GdsResult};
use gds_gateway::{folder_url, DriveFile, DriveGateway, FileKind};
use serde::Serialize;

/// One row of a listing, with its derived web URL.
#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    pub name: String,
    pub id: String,
    pub kind: FileKind,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
    pub web_url: String,
}

impl From<&DriveFile> for Entry {
    fn from(file: &DriveFile) -> Self {
        Entry {
            name: file.name.clone(),
            id: file.id.clone(),
            kind: file.kind(),
            mime_type: file.mime_type.clone(),
            size: file.size,
            modified_time: file.modified_time.clone(),
            web_url: file.web_url(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingMode {
    Plain,
    Detailed,
    SingleFile,
    RecursiveFlat,
    RecursiveDetailed,
}

/// Single-directory view.
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub path: String,
    pub folder_id: String,
    pub folder_url: String,
    pub files: Vec<Entry>,
    pub folders: Vec<Entry>,
    pub count: usize,
    pub mode: ListingMode,
}

impl Listing {
    /// All entry names, folders first (the order they are displayed).
    pub fn names(&self) -> Vec<&str> {
        self.folders
            .iter()
            .chain(self.files.iter())
            .map(|e| e.name.as_str())
            .collect()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.names().iter().any(|n| *n == name)
    }
}

/// An entry placed in the recursive flat view.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedEntry {
    #[serde(flatten)]
    pub entry: Entry,
    /// Directory the entry was found in (canonical display path)
    pub path: String,
    pub depth: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecursiveListing {
    pub path: String,
    pub folder_id: String,
    pub folder_url: String,
    pub files: Vec<PlacedEntry>,
    pub folders: Vec<PlacedEntry>,
    pub count: usize,
    pub mode: ListingMode,
}

/// Recursive detailed mode: every folder carries its own files and folders.
#[derive(Debug, Clone, Serialize)]
pub struct NestedFolder {
    #[serde(flatten)]
    pub entry: Entry,
    pub files: Vec<Entry>,
    pub folders: Vec<NestedFolder>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NestedListing {
    pub path: String,
    pub folder_id: String,
    pub folder_url: String,
    pub files: Vec<Entry>,
    pub folders: Vec<NestedFolder>,
    pub count: usize,
    pub mode: ListingMode,
}

pub struct ListingEngine<'a> {
    gateway: &'a dyn DriveGateway,
    config: &'a GdsConfig,
}

impl<'a> ListingEngine<'a> {
    pub fn new(gateway: &'a dyn DriveGateway, config: &'a GdsConfig) -> Self {
        ListingEngine { gateway, config }
    }

    /// Single-level listing: stable sort (folders first, case-insensitive
    /// name), de-duplicated by first occurrence.
    pub async fn list(&self, folder_id: &str, display_path: &str, detailed: bool) -> GdsResult<Listing> {
        let children = self
            .gateway
            .list_children(folder_id, Some(self.config.listing.ls_page_size))
            .await?;

        let (folders, files) = split_and_dedupe(&children);
        let count = folders.len() + files.len();
        Ok(Listing {
            path: display_path.to_string(),
            folder_id: folder_id.to_string(),
            folder_url: folder_url(folder_id),
            files,
            folders,
            count,
            mode: if detailed {
                ListingMode::Detailed
            } else {
                ListingMode::Plain
            },
        })
    }

    /// `ls <file>`: a one-entry listing for a resolved file.
    pub fn single_file(&self, file: &DriveFile, parent_id: &str, input_path: &str) -> Listing {
        Listing {
            path: input_path.to_string(),
            folder_id: parent_id.to_string(),
            folder_url: folder_url(parent_id),
            files: vec![Entry::from(file)],
            folders: Vec::new(),
            count: 1,
            mode: ListingMode::SingleFile,
        }
    }

    /// Bounded-depth DFS over the tree, flat result sorted by (path, name).
    pub async fn list_recursive(
        &self,
        folder_id: &str,
        display_path: &str,
    ) -> GdsResult<RecursiveListing> {
        let items = self.collect(folder_id, display_path).await?;
        let folders = items
            .iter()
            .filter(|p| p.entry.kind == FileKind::Folder)
            .cloned()
            .collect::<Vec<_>>();
        let files = items
            .iter()
            .filter(|p| p.entry.kind != FileKind::Folder)
            .cloned()
            .collect::<Vec<_>>();
        Ok(RecursiveListing {
            path: display_path.to_string(),
            folder_id: folder_id.to_string(),
            folder_url: folder_url(folder_id),
            count: items.len(),
            files,
            folders,
            mode: ListingMode::RecursiveFlat,
        })
    }

    /// Recursive detailed mode: nested structure grouped per folder.
    pub async fn list_recursive_detailed(
        &self,
        folder_id: &str,
        display_path: &str,
    ) -> GdsResult<NestedListing> {
        let items = self.collect(folder_id, display_path).await?;
        let count = items.len();
        let (files, folders) = build_nested(&items, display_path);
        Ok(NestedListing {
            path: display_path.to_string(),
            folder_id: folder_id.to_string(),
            folder_url: folder_url(folder_id),
            files,
            folders,
            count,
            mode: ListingMode::RecursiveDetailed,
        })
    }

    async fn collect(&self, folder_id: &str, display_path: &str) -> GdsResult<Vec<PlacedEntry>> {
        let mut visited = HashSet::new();
        let mut out = Vec::new();
        self.scan(
            folder_id.to_string(),
            display_path.to_string(),
            0,
            &mut visited,
            &mut out,
        )
        .await?;
        out.sort_by(|a, b| {
            (a.path.as_str(), a.entry.name.to_lowercase())
                .cmp(&(b.path.as_str(), b.entry.name.to_lowercase()))
        });
        Ok(out)
    }

    /// DFS with a visited set for cycle protection (shortcuts can cross-link
    /// folders) and the configured depth cap. Listing failures inside the
    /// walk are logged and skipped, not fatal.
    fn scan<'s>(
        &'s self,
        folder_id: String,
        folder_path: String,
        depth: usize,
        visited: &'s mut HashSet<String>,
        out: &'s mut Vec<PlacedEntry>,
    ) -> Pin<Box<dyn Future<Output = GdsResult<()>> + Send + 's>> {
        Box::pin(async move {
            if depth > self.config.listing.max_depth {
                return Ok(());
            }
            if !visited.insert(folder_id.clone()) {
                return Ok(());
            }

            let children = match self
                .gateway
                .list_children(&folder_id, Some(self.config.listing.page_size))
                .await
            {
                Ok(children) => children,
                Err(e) => {
                    tracing::warn!(folder = %folder_path, "listing failed during recursion: {e}");
                    visited.remove(&folder_id);
                    return Ok(());
                }
            };

            let mut seen = HashSet::new();
            for file in &children {
                if !seen.insert(file.name.clone()) {
                    continue;
                }
                out.push(PlacedEntry {
                    entry: Entry::from(file),
                    path: folder_path.clone(),
                    depth,
                });
                if file.is_folder() {
                    let sub_path = vpath::child(&folder_path, &file.name);
                    self.scan(file.id.clone(), sub_path, depth + 1, visited, out)
                        .await?;
                }
            }

            // Allow this folder to appear again along a different branch.
            visited.remove(&folder_id);
            Ok(())
        })
    }
}

/// Folders first, each group case-insensitively sorted, then de-duplicated by
/// name keeping the first occurrence (the provider permits duplicates).
fn split_and_dedupe(children: &[DriveFile]) -> (Vec<Entry>, Vec<Entry>) {
    let mut folders: Vec<&DriveFile> = children.iter().filter(|f| f.is_folder()).collect();
    let mut files: Vec<&DriveFile> = children.iter().filter(|f| !f.is_folder()).collect();
    folders.sort_by_key(|f| f.name.to_lowercase());
    files.sort_by_key(|f| f.name.to_lowercase());

    let mut seen = HashSet::new();
    let mut clean_folders = Vec::new();
    for folder in folders {
        if seen.insert(folder.name.clone()) {
            clean_folders.push(Entry::from(folder));
        }
    }
    let mut clean_files = Vec::new();
    for file in files {
        if seen.insert(file.name.clone()) {
            clean_files.push(Entry::from(file));
        }
    }
    (clean_folders, clean_files)
}

fn build_nested(items: &[PlacedEntry], path: &str) -> (Vec<Entry>, Vec<NestedFolder>) {
    let mut files = Vec::new();
    let mut folders = Vec::new();
    for placed in items.iter().filter(|p| p.path == path) {
        if placed.entry.kind == FileKind::Folder {
            let sub_path = vpath::child(path, &placed.entry.name);
            let (sub_files, sub_folders) = build_nested(items, &sub_path);
            folders.push(NestedFolder {
                entry: placed.entry.clone(),
                files: sub_files,
                folders: sub_folders,
            });
        } else {
            files.push(placed.entry.clone());
        }
    }
    (files, folders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gds_gateway::MemoryDrive;

    fn config() -> GdsConfig {
        let mut config = GdsConfig::default();
        config.remote.root_folder_id = "root".into();
        config
    }

    #[tokio::test]
    async fn list_sorts_folders_first_case_insensitive() {
        let drive = MemoryDrive::new("root");
        drive.put_file("root", "zz.txt", b"z");
        drive.put_file("root", "Aa.txt", b"a");
        drive.mkdir("root", "beta");
        drive.mkdir("root", "Alpha");

        let config = config();
        let engine = ListingEngine::new(&drive, &config);
        let listing = engine.list("root", "~", false).await.unwrap();

        let names = listing.names();
        assert_eq!(names, vec!["Alpha", "beta", "Aa.txt", "zz.txt"]);
        assert_eq!(listing.count, 4);
    }

    #[tokio::test]
    async fn list_dedupes_by_first_occurrence() {
        let drive = MemoryDrive::new("root");
        drive.put_file("root", "dup.txt", b"one");
        drive.put_file("root", "dup.txt", b"two");

        let config = config();
        let engine = ListingEngine::new(&drive, &config);
        let listing = engine.list("root", "~", false).await.unwrap();

        assert_eq!(listing.files.len(), 1);
        // no two returned entries share a name
        let mut names = listing.names();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), listing.count);
    }

    #[tokio::test]
    async fn recursive_collects_nested_entries() {
        let drive = MemoryDrive::new("root");
        let a = drive.mkdir("root", "a");
        let b = drive.mkdir(&a, "b");
        drive.put_file(&b, "deep.txt", b"d");
        drive.put_file("root", "top.txt", b"t");

        let config = config();
        let engine = ListingEngine::new(&drive, &config);
        let listing = engine.list_recursive("root", "~").await.unwrap();

        assert_eq!(listing.count, 4);
        let deep = listing
            .files
            .iter()
            .find(|p| p.entry.name == "deep.txt")
            .unwrap();
        assert_eq!(deep.path, "~/a/b");
        assert_eq!(deep.depth, 2);
    }

    #[tokio::test]
    async fn recursive_respects_depth_cap() {
        let drive = MemoryDrive::new("root");
        let mut parent = "root".to_string();
        for i in 0..8 {
            parent = drive.mkdir(&parent, &format!("d{i}"));
        }
        drive.put_file(&parent, "bottom.txt", b"x");

        let mut config = config();
        config.listing.max_depth = 3;
        let engine = ListingEngine::new(&drive, &config);
        let listing = engine.list_recursive("root", "~").await.unwrap();

        // d0..d3 are visited (depth 0..=3); nothing below is listed
        assert!(listing.files.is_empty());
        assert_eq!(listing.folders.len(), 4);
    }

    #[tokio::test]
    async fn recursive_detailed_nests_per_folder() {
        let drive = MemoryDrive::new("root");
        let pkg = drive.mkdir("root", "pkg");
        let sub = drive.mkdir(&pkg, "b");
        drive.put_file(&pkg, "a.txt", b"A");
        drive.put_file(&sub, "c.txt", b"C");

        let config = config();
        let engine = ListingEngine::new(&drive, &config);
        let nested = engine.list_recursive_detailed("root", "~").await.unwrap();

        assert_eq!(nested.folders.len(), 1);
        let pkg_folder = &nested.folders[0];
        assert_eq!(pkg_folder.entry.name, "pkg");
        assert_eq!(pkg_folder.files.len(), 1);
        assert_eq!(pkg_folder.files[0].name, "a.txt");
        assert_eq!(pkg_folder.folders.len(), 1);
        assert_eq!(pkg_folder.folders[0].files[0].name, "c.txt");
    }
}
