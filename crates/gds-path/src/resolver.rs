use std::path::PathBuf;

use gds_core::{vpath, GdsConfig, GdsError, GdsResult};
use gds_gateway::{DriveFile, DriveGateway};

/// Where a shell currently stands: its folder ID and canonical display path.
#[derive(Debug, Clone)]
pub struct ShellPos {
    pub folder_id: String,
    pub display_path: String,
}

impl ShellPos {
    pub fn root(config: &GdsConfig) -> Self {
        ShellPos {
            folder_id: config.remote.root_folder_id.clone(),
            display_path: vpath::HOME.to_string(),
        }
    }
}

/// Outcome of resolving a virtual path. Never partial: either the whole input
/// resolved, or the call returned an error.
#[derive(Debug, Clone)]
pub enum Resolved {
    Folder {
        folder_id: String,
        display_path: String,
    },
    /// The final component matched a non-folder node.
    File {
        file: DriveFile,
        parent_id: String,
        display_path: String,
    },
}

impl Resolved {
    pub fn display_path(&self) -> &str {
        match self {
            Resolved::Folder { display_path, .. } | Resolved::File { display_path, .. } => {
                display_path
            }
        }
    }
}

pub struct PathResolver<'a> {
    gateway: &'a dyn DriveGateway,
    config: &'a GdsConfig,
}

impl<'a> PathResolver<'a> {
    pub fn new(gateway: &'a dyn DriveGateway, config: &'a GdsConfig) -> Self {
        PathResolver { gateway, config }
    }

    /// Resolve `input` against the shell position. Strictly read-only; never
    /// creates intermediate folders. Case-sensitive exact match, no globbing.
    pub async fn resolve(&self, input: &str, pos: &ShellPos) -> GdsResult<Resolved> {
        let input = vpath::rewrite_input(input);
        let (mut folder_id, mut display) = if input == "." {
            (pos.folder_id.clone(), pos.display_path.clone())
        } else if input == vpath::HOME || input.starts_with("~/") {
            (
                self.config.remote.root_folder_id.clone(),
                vpath::HOME.to_string(),
            )
        } else {
            (pos.folder_id.clone(), pos.display_path.clone())
        };

        let comps: Vec<String> = if input == "." || input == vpath::HOME {
            Vec::new()
        } else {
            input
                .trim_start_matches("~/")
                .split('/')
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect()
        };

        let last = comps.len().saturating_sub(1);
        for (i, comp) in comps.iter().enumerate() {
            match comp.as_str() {
                "." => continue,
                ".." => {
                    if display == vpath::HOME {
                        return Err(GdsError::PathNotFound(format!(
                            "{input}: already at the root"
                        )));
                    }
                    let parents = self.gateway.parents(&folder_id).await?;
                    let parent_id = parents.first().ok_or_else(|| {
                        GdsError::PathNotFound(format!("{display}: no parent folder"))
                    })?;
                    folder_id = parent_id.clone();
                    display = vpath::parent(&display)
                        .ok_or_else(|| GdsError::PathNotFound(input.clone()))?;
                }
                name => {
                    let children = self
                        .gateway
                        .list_children(&folder_id, Some(self.config.listing.page_size))
                        .await?;
                    let folder_hit = children
                        .iter()
                        .find(|f| f.name == name && f.is_folder());
                    match folder_hit {
                        Some(folder) => {
                            folder_id = folder.id.clone();
                            display = vpath::child(&display, name);
                        }
                        None => {
                            // A non-folder match only terminates the walk when
                            // it is the last component.
                            let file_hit = children.iter().find(|f| f.name == name);
                            match file_hit {
                                Some(file) if i == last => {
                                    return Ok(Resolved::File {
                                        file: file.clone(),
                                        parent_id: folder_id,
                                        display_path: vpath::child(&display, name),
                                    });
                                }
                                _ => {
                                    return Err(GdsError::PathNotFound(format!(
                                        "Path not found: {input}"
                                    )))
                                }
                            }
                        }
                    }
                }
            }
        }

        Ok(Resolved::Folder {
            folder_id,
            display_path: display,
        })
    }

    /// Resolve, requiring the result to be a folder.
    pub async fn resolve_folder(&self, input: &str, pos: &ShellPos) -> GdsResult<(String, String)> {
        match self.resolve(input, pos).await? {
            Resolved::Folder {
                folder_id,
                display_path,
            } => Ok((folder_id, display_path)),
            Resolved::File { display_path, .. } => Err(GdsError::PathNotFound(format!(
                "{display_path}: not a directory"
            ))),
        }
    }

    /// Resolve, requiring the result to be a file.
    pub async fn resolve_file(&self, input: &str, pos: &ShellPos) -> GdsResult<(DriveFile, String, String)> {
        match self.resolve(input, pos).await? {
            Resolved::File {
                file,
                parent_id,
                display_path,
            } => Ok((file, parent_id, display_path)),
            Resolved::Folder { display_path, .. } => Err(GdsError::PathNotFound(format!(
                "{display_path}: is a directory"
            ))),
        }
    }

    /// Canonical absolute display path for an input, computed lexically.
    pub fn absolute_display(&self, input: &str, pos: &ShellPos) -> String {
        vpath::absolute(&pos.display_path, input)
    }

    /// Projection onto the on-disk mirror (`<mirror>/REMOTE_ROOT/...`).
    pub fn mirror_path(&self, display_path: &str) -> PathBuf {
        let base = self.config.mirror.base_dir.join("REMOTE_ROOT");
        let rel = vpath::rel_to_root(display_path);
        if rel.is_empty() {
            base
        } else {
            base.join(rel)
        }
    }

    /// Projection onto the remote filesystem used inside emitted scripts.
    pub fn remote_path(&self, display_path: &str) -> String {
        let root = self.config.remote.root_path.trim_end_matches('/');
        let rel = vpath::rel_to_root(display_path);
        if rel.is_empty() {
            root.to_string()
        } else {
            format!("{root}/{rel}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gds_gateway::MemoryDrive;

    fn config(root_id: &str) -> GdsConfig {
        let mut config = GdsConfig::default();
        config.remote.root_folder_id = root_id.into();
        config.mirror.base_dir = PathBuf::from("/mnt/gdrive");
        config
    }

    fn drive_with_tree() -> MemoryDrive {
        let drive = MemoryDrive::new("root");
        let docs = drive.mkdir("root", "docs");
        let work = drive.mkdir(&docs, "work");
        drive.put_file(&work, "notes.txt", b"n");
        drive.put_file("root", "top.txt", b"t");
        drive
    }

    #[tokio::test]
    async fn resolves_nested_folder() {
        let drive = drive_with_tree();
        let config = config(drive.root_id());
        let resolver = PathResolver::new(&drive, &config);
        let pos = ShellPos::root(&config);

        let (id, display) = resolver.resolve_folder("docs/work", &pos).await.unwrap();
        assert_eq!(display, "~/docs/work");
        assert_eq!(drive.find_child("root", "docs").unwrap().is_folder(), true);
        // resolving the canonical form again lands on the same folder
        let (id2, display2) = resolver.resolve_folder(&display, &pos).await.unwrap();
        assert_eq!(id, id2);
        assert_eq!(display, display2);
    }

    #[tokio::test]
    async fn trailing_file_yields_file_result() {
        let drive = drive_with_tree();
        let config = config(drive.root_id());
        let resolver = PathResolver::new(&drive, &config);
        let pos = ShellPos::root(&config);

        let (file, _parent, display) = resolver
            .resolve_file("docs/work/notes.txt", &pos)
            .await
            .unwrap();
        assert_eq!(file.name, "notes.txt");
        assert_eq!(display, "~/docs/work/notes.txt");
    }

    #[tokio::test]
    async fn file_in_the_middle_is_not_found() {
        let drive = drive_with_tree();
        let config = config(drive.root_id());
        let resolver = PathResolver::new(&drive, &config);
        let pos = ShellPos::root(&config);

        let err = resolver.resolve("top.txt/deeper", &pos).await.unwrap_err();
        assert!(matches!(err, GdsError::PathNotFound(_)));
    }

    #[tokio::test]
    async fn dotdot_walks_to_parent_and_fails_at_root() {
        let drive = drive_with_tree();
        let config = config(drive.root_id());
        let resolver = PathResolver::new(&drive, &config);
        let root = ShellPos::root(&config);

        let (work_id, work_display) = resolver.resolve_folder("docs/work", &root).await.unwrap();
        let pos = ShellPos {
            folder_id: work_id,
            display_path: work_display,
        };
        let (_, display) = resolver.resolve_folder("..", &pos).await.unwrap();
        assert_eq!(display, "~/docs");

        let err = resolver.resolve("..", &root).await.unwrap_err();
        assert!(matches!(err, GdsError::PathNotFound(_)));
    }

    #[tokio::test]
    async fn relative_resolution_from_subdir() {
        let drive = drive_with_tree();
        let config = config(drive.root_id());
        let resolver = PathResolver::new(&drive, &config);
        let root = ShellPos::root(&config);

        let (docs_id, docs_display) = resolver.resolve_folder("docs", &root).await.unwrap();
        let pos = ShellPos {
            folder_id: docs_id,
            display_path: docs_display,
        };
        let (_, display) = resolver.resolve_folder("work", &pos).await.unwrap();
        assert_eq!(display, "~/docs/work");
    }

    #[test]
    fn projections_share_canonicalisation() {
        let drive = MemoryDrive::new("root");
        let config = config("root");
        let resolver = PathResolver::new(&drive, &config);

        assert_eq!(
            resolver.mirror_path("~/tmp/test"),
            PathBuf::from("/mnt/gdrive/REMOTE_ROOT/tmp/test")
        );
        assert_eq!(
            resolver.mirror_path("~"),
            PathBuf::from("/mnt/gdrive/REMOTE_ROOT")
        );
        assert_eq!(
            resolver.remote_path("~/tmp/test"),
            "/content/drive/MyDrive/REMOTE_ROOT/tmp/test"
        );
        assert_eq!(
            resolver.remote_path("~"),
            "/content/drive/MyDrive/REMOTE_ROOT"
        );
    }
}
