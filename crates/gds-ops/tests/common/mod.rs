//! Shared harness: an in-process drive, a mirror directory, a simulated
//! vendor sync agent, and a presenter that plays the remote host by applying
//! the generated script's effects to the drive.
#![allow(dead_code)]

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gds_core::GdsConfig;
use gds_gateway::{DriveGateway, MemoryDrive};
use gds_mirror::MirrorLayout;
use gds_ops::{GdsContext, NullSink, ProgressSink};
use gds_remote::{CommandEnvelope, PresenterOutcome, ScriptedPresenter};

pub struct Harness {
    pub drive: Arc<MemoryDrive>,
    pub config: GdsConfig,
    pub mirror_dir: tempfile::TempDir,
    pub tmp_folder_id: String,
    pub work_dir: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let drive = Arc::new(MemoryDrive::new("root"));
        let tmp_folder_id = drive.mkdir("root", "tmp");

        let mirror_dir = tempfile::tempdir().unwrap();
        let mut config = GdsConfig::default();
        config.remote.root_folder_id = "root".into();
        config.mirror.base_dir = mirror_dir.path().to_path_buf();
        config.mirror.probe_addr = String::new();
        config.timeouts.sync_per_file_secs = 1;
        config.timeouts.sync_max_secs = 2;
        config.timeouts.result_poll_secs = 5;
        config.timeouts.verify_attempts = 5;
        config.timeouts.poll_interval_ms = 10;
        config.timeouts.syntax_check_ms = 5000;

        let layout = MirrorLayout::new(mirror_dir.path());
        layout.ensure_dirs().unwrap();

        Harness {
            drive,
            config,
            mirror_dir,
            tmp_folder_id,
            work_dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn layout(&self) -> MirrorLayout {
        MirrorLayout::new(self.mirror_dir.path())
    }

    pub fn ctx<'a>(
        &'a self,
        presenter: &'a ScriptedPresenter,
        progress: &'a dyn ProgressSink,
    ) -> GdsContext<'a> {
        GdsContext {
            gateway: self.drive.as_ref(),
            presenter,
            config: &self.config,
            mirror: self.layout(),
            progress,
        }
    }

    pub fn ctx_quiet<'a>(&'a self, presenter: &'a ScriptedPresenter) -> GdsContext<'a> {
        self.ctx(presenter, &NullSink)
    }

    /// Background task copying staged files to the drive-equivalent folder,
    /// like the vendor agent relaying local writes.
    pub fn spawn_sync_agent(&self) -> tokio::task::JoinHandle<()> {
        let staging = self.layout().local_equivalent();
        let landing = self.layout().drive_equivalent();
        tokio::spawn(async move {
            loop {
                if let Ok(entries) = std::fs::read_dir(&staging) {
                    for entry in entries.flatten() {
                        let dest = landing.join(entry.file_name());
                        if entry.path().is_file() && !dest.exists() {
                            let _ = std::fs::copy(entry.path(), &dest);
                        }
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
    }

    /// A presenter that executes upload/relocation scripts against the
    /// in-process drive and then reports success through the sentinel.
    pub fn remote_host_presenter(&self) -> ScriptedPresenter {
        let drive = Arc::clone(&self.drive);
        let tmp_id = self.tmp_folder_id.clone();
        let root_path = self.config.remote.root_path.clone();
        let landing = self.layout().drive_equivalent();
        ScriptedPresenter::new(move |envelope: &CommandEnvelope| {
            apply_script(&drive, envelope, &root_path, &landing);
            drive.put_file(
                &tmp_id,
                &envelope.result_filename,
                br#"{"exit_code": 0, "stdout": "done", "stderr": ""}"#,
            );
            PresenterOutcome::Executed
        })
    }

    /// Write a local file under the scratch work dir.
    pub fn local_file(&self, rel: &str, content: &[u8]) -> PathBuf {
        let path = self.work_dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    pub async fn cloud_names(&self, folder_id: &str) -> Vec<String> {
        self.drive
            .list_children(folder_id, None)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect()
    }
}

/// Ensure the folder chain for a remote path exists in the drive; returns
/// the folder id holding the final component's parent.
fn mkdir_p_cloud(drive: &MemoryDrive, root_path: &str, remote_dir: &str) -> Option<String> {
    let rel = remote_dir.strip_prefix(root_path)?.trim_start_matches('/');
    let mut folder = "root".to_string();
    if rel.is_empty() {
        return Some(folder);
    }
    for comp in rel.split('/') {
        folder = match drive.find_child(&folder, comp) {
            Some(hit) if hit.is_folder() => hit.id,
            _ => drive.mkdir(&folder, comp),
        };
    }
    Some(folder)
}

/// Interpret the relocation script: mkdir chains, `mv` from the drive-side
/// staging into the target (overwriting like a filesystem mv), and the
/// optional unzip appendix.
fn apply_script(
    drive: &MemoryDrive,
    envelope: &CommandEnvelope,
    root_path: &str,
    landing: &std::path::Path,
) {
    // the envelope double-quotes the inner bash -c body
    let text = envelope.script.replace("\\\"", "\"");

    let mkdir_re = regex::Regex::new(r#"mkdir -p "([^"]+)""#).unwrap();
    for cap in mkdir_re.captures_iter(&text) {
        mkdir_p_cloud(drive, root_path, &cap[1]);
    }

    let mv_re = regex::Regex::new(r#"mv "([^"]+)" "([^"]+)""#).unwrap();
    for cap in mv_re.captures_iter(&text) {
        let src = &cap[1];
        let dst = &cap[2];
        let mirror_name = src.rsplit('/').next().unwrap();
        let (dst_dir, dst_name) = dst.rsplit_once('/').unwrap();

        let staged = landing.join(mirror_name);
        let bytes = match std::fs::read(&staged) {
            Ok(bytes) => bytes,
            Err(_) => continue,
        };
        if let Some(folder) = mkdir_p_cloud(drive, root_path, dst_dir) {
            if let Some(existing) = drive.find_child(&folder, dst_name) {
                if !existing.is_folder() {
                    drive.remove_tree(&existing.id);
                }
            }
            drive.put_file(&folder, dst_name, &bytes);
            let _ = std::fs::remove_file(&staged);
        }
    }

    // `echo <b64> | base64 -d > "<path>"`
    let echo_re =
        regex::Regex::new(r#"echo ([A-Za-z0-9+/=]+) \| base64 -d > "([^"]+)""#).unwrap();
    for cap in echo_re.captures_iter(&text) {
        use base64::Engine as _;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&cap[1])
            .unwrap_or_default();
        let (dir, name) = cap[2].rsplit_once('/').unwrap();
        if let Some(folder) = mkdir_p_cloud(drive, root_path, dir) {
            if let Some(existing) = drive.find_child(&folder, name) {
                drive.remove_tree(&existing.id);
            }
            drive.put_file(&folder, name, &bytes);
        }
    }

    // `(cd "<dir>" && unzip -o "<zip>"[ && rm "<zip>"] && ls -la)`
    let unzip_re =
        regex::Regex::new(r#"\(cd "([^"]+)" && unzip -o "([^"]+)"(.*?)\)"#).unwrap();
    if let Some(cap) = unzip_re.captures(&text) {
        let dir = &cap[1];
        let zip_name = &cap[2];
        let remove_zip = cap[3].contains("rm ");
        if let Some(folder) = mkdir_p_cloud(drive, root_path, dir) {
            if let Some(zip_file) = drive.find_child(&folder, zip_name) {
                let bytes = drive.content(&zip_file.id).unwrap();
                extract_zip_into(drive, &folder, &bytes);
                if remove_zip {
                    drive.remove_tree(&zip_file.id);
                }
            }
        }
    }
}

fn extract_zip_into(drive: &MemoryDrive, folder_id: &str, bytes: &[u8]) {
    let reader = std::io::Cursor::new(bytes.to_vec());
    let mut archive = zip::ZipArchive::new(reader).unwrap();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        let name = entry.name().trim_end_matches('/').to_string();
        let is_dir = entry.is_dir();
        let comps: Vec<&str> = name.split('/').filter(|c| !c.is_empty()).collect();
        if comps.is_empty() {
            continue;
        }
        let mut folder = folder_id.to_string();
        let (dirs, last) = if is_dir {
            (&comps[..], None)
        } else {
            (&comps[..comps.len() - 1], Some(comps[comps.len() - 1]))
        };
        for &comp in dirs {
            folder = match drive.find_child(&folder, comp) {
                Some(hit) if hit.is_folder() => hit.id,
                _ => drive.mkdir(&folder, comp),
            };
        }
        if let Some(file_name) = last {
            let mut content = Vec::new();
            entry.read_to_end(&mut content).unwrap();
            if let Some(existing) = drive.find_child(&folder, file_name) {
                drive.remove_tree(&existing.id);
            }
            drive.put_file(&folder, file_name, &content);
        }
    }
}
