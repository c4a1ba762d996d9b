use serde::{Deserialize, Serialize};

pub const MIME_FOLDER: &str = "application/vnd.google-apps.folder";
const MIME_DOC: &str = "application/vnd.google-apps.document";
const MIME_SHEET: &str = "application/vnd.google-apps.spreadsheet";
const MIME_SLIDE: &str = "application/vnd.google-apps.presentation";
const MIME_NOTEBOOK: &str = "application/vnd.google.colaboratory";

/// A node in the provider tree as the gateway reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub modified_time: Option<String>,
}

/// Kind classification derived from the MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Folder,
    Doc,
    Sheet,
    Slide,
    Notebook,
    File,
}

impl DriveFile {
    pub fn kind(&self) -> FileKind {
        match self.mime_type.as_str() {
            MIME_FOLDER => FileKind::Folder,
            MIME_DOC => FileKind::Doc,
            MIME_SHEET => FileKind::Sheet,
            MIME_SLIDE => FileKind::Slide,
            MIME_NOTEBOOK => FileKind::Notebook,
            _ => FileKind::File,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.mime_type == MIME_FOLDER
    }

    /// The web UI URL for this node. The shape depends on the kind.
    pub fn web_url(&self) -> String {
        web_url(self.kind(), &self.id)
    }
}

pub fn web_url(kind: FileKind, id: &str) -> String {
    match kind {
        FileKind::Folder => format!("https://drive.google.com/drive/folders/{id}"),
        FileKind::Doc => format!("https://docs.google.com/document/d/{id}/edit"),
        FileKind::Sheet => format!("https://docs.google.com/spreadsheets/d/{id}/edit"),
        FileKind::Slide => format!("https://docs.google.com/presentation/d/{id}/edit"),
        FileKind::Notebook => format!("https://colab.research.google.com/drive/{id}"),
        FileKind::File => format!("https://drive.google.com/file/d/{id}/view"),
    }
}

/// URL of a folder by ID alone (used for the listing header).
pub fn folder_url(id: &str) -> String {
    web_url(FileKind::Folder, id)
}
