//! Workspace backups: a zip bundle holding the database plus a manifest
//! with its checksum. Import also takes a bare SQLite file.

use anyhow::{bail, Context};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::Path;
use uuid::Uuid;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::db;

const MANIFEST_ENTRY: &str = "manifest.json";
const DB_ENTRY: &str = "db/school.sqlite3";
const WORKSPACE_ENTRY: &str = "meta/workspace.json";
const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";
const SQLITE_MAGIC: [u8; 16] = *b"SQLite format 3\0";

pub const BUNDLE_FORMAT: &str = "schoold-workspace-v1";
pub const RAW_SQLITE_FORMAT: &str = "raw-sqlite3";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    format: String,
    version: u32,
    app_version: String,
    exported_at: String,
    bundle_id: String,
    db_sha256: String,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub bundle_id: String,
    pub db_sha256: String,
    pub entry_count: usize,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub bundle_id: Option<String>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

struct BundleWriter {
    zip: ZipWriter<File>,
    opts: FileOptions,
    entries: usize,
}

impl BundleWriter {
    fn create(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
        Ok(BundleWriter {
            zip: ZipWriter::new(file),
            opts: FileOptions::default().compression_method(CompressionMethod::Deflated),
            entries: 0,
        })
    }

    fn add(&mut self, name: &str, bytes: &[u8]) -> anyhow::Result<()> {
        self.zip
            .start_file(name, self.opts)
            .with_context(|| format!("cannot start entry {}", name))?;
        self.zip
            .write_all(bytes)
            .with_context(|| format!("cannot write entry {}", name))?;
        self.entries += 1;
        Ok(())
    }

    fn add_json<T: Serialize>(&mut self, name: &str, value: &T) -> anyhow::Result<()> {
        let text = serde_json::to_vec_pretty(value)
            .with_context(|| format!("cannot serialize {}", name))?;
        self.add(name, &text)
    }

    fn finish(mut self) -> anyhow::Result<usize> {
        self.zip.finish().context("cannot finalize bundle")?;
        Ok(self.entries)
    }
}

pub fn export_workspace_bundle(
    workspace_path: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let db_file = db::db_path(workspace_path);
    if !db_file.is_file() {
        bail!("no database in workspace {}", workspace_path.display());
    }
    let db_bytes = fs::read(&db_file).with_context(|| format!("cannot read {}", db_file.display()))?;

    let manifest = Manifest {
        format: BUNDLE_FORMAT.to_string(),
        version: 1,
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        exported_at: Utc::now().to_rfc3339(),
        bundle_id: Uuid::new_v4().to_string(),
        db_sha256: sha256_hex(&db_bytes),
    };

    let mut bundle = BundleWriter::create(out_path)?;
    bundle.add_json(MANIFEST_ENTRY, &manifest)?;
    bundle.add(DB_ENTRY, &db_bytes)?;
    bundle.add_json(
        WORKSPACE_ENTRY,
        &serde_json::json!({ "sourceWorkspace": workspace_path.to_string_lossy() }),
    )?;
    let entry_count = bundle.finish()?;

    Ok(ExportSummary {
        bundle_format: manifest.format,
        bundle_id: manifest.bundle_id,
        db_sha256: manifest.db_sha256,
        entry_count,
    })
}

/// Replaces the workspace database with the one in `in_path`: either an
/// exported bundle or a bare SQLite file (older `classroom.db` files).
/// The caller must close its connection first and reopen afterwards.
pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    let (bytes, summary) = match sniff(in_path)? {
        Some(Kind::Sqlite) => {
            let bytes = fs::read(in_path).with_context(|| format!("cannot read {}", in_path.display()))?;
            let summary = ImportSummary {
                bundle_format_detected: RAW_SQLITE_FORMAT.to_string(),
                bundle_id: None,
            };
            (bytes, summary)
        }
        Some(Kind::Zip) => read_bundle(in_path)?,
        None => bail!(
            "{} is neither a backup bundle nor a SQLite database",
            in_path.display()
        ),
    };

    fs::create_dir_all(workspace_path)
        .with_context(|| format!("cannot create workspace {}", workspace_path.display()))?;
    install_db(workspace_path, &bytes)?;
    Ok(summary)
}

/// Writes next to the live file and renames over it. The rename replaces
/// the old database in one step; on any failure the old file is untouched
/// and the staged copy is removed.
fn install_db(workspace_path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let dst = db::db_path(workspace_path);
    let staged = workspace_path.join(format!("{}.importing", db::DB_FILE));
    let installed = write_staged(&staged, bytes).and_then(|_| {
        fs::rename(&staged, &dst)
            .with_context(|| format!("cannot move database into {}", dst.display()))
    });
    if installed.is_err() {
        let _ = fs::remove_file(&staged);
    }
    installed
}

fn write_staged(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let mut out = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    out.write_all(bytes)
        .and_then(|_| out.sync_all())
        .with_context(|| format!("cannot write {}", path.display()))
}

fn read_bundle(in_path: &Path) -> anyhow::Result<(Vec<u8>, ImportSummary)> {
    let file = File::open(in_path).with_context(|| format!("cannot open {}", in_path.display()))?;
    let mut archive = ZipArchive::new(BufReader::new(file)).context("invalid zip archive")?;

    let manifest: Manifest = {
        let entry = archive
            .by_name(MANIFEST_ENTRY)
            .context("bundle has no manifest.json")?;
        serde_json::from_reader(entry).context("manifest.json is malformed")?
    };
    if manifest.format != BUNDLE_FORMAT {
        bail!("unsupported bundle format: {}", manifest.format);
    }

    let mut bytes = Vec::new();
    archive
        .by_name(DB_ENTRY)
        .with_context(|| format!("bundle has no {}", DB_ENTRY))?
        .read_to_end(&mut bytes)
        .context("cannot extract database")?;

    let actual = sha256_hex(&bytes);
    if !actual.eq_ignore_ascii_case(&manifest.db_sha256) {
        bail!(
            "database checksum mismatch: manifest {}, bundle {}",
            manifest.db_sha256,
            actual
        );
    }

    Ok((
        bytes,
        ImportSummary {
            bundle_format_detected: manifest.format,
            bundle_id: Some(manifest.bundle_id),
        },
    ))
}

enum Kind {
    Zip,
    Sqlite,
}

fn sniff(path: &Path) -> anyhow::Result<Option<Kind>> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut head = Vec::with_capacity(SQLITE_MAGIC.len());
    file.take(SQLITE_MAGIC.len() as u64)
        .read_to_end(&mut head)
        .context("cannot read file header")?;

    if head.starts_with(&ZIP_MAGIC) {
        Ok(Some(Kind::Zip))
    } else if head == SQLITE_MAGIC {
        Ok(Some(Kind::Sqlite))
    } else {
        Ok(None)
    }
}
