use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::models::backup_log::NewBackupLog;
use crate::models::settings::is_truthy;
use crate::store::Store;

pub const BACKUP_PREFIX: &str = "loanflow_complete_";

const DB_ENTRY: &str = "database.sqlite";
const MANIFEST_ENTRY: &str = "manifest.json";
const FILES_DIR: &str = "files";
/// Directory names never copied into `files/`.
const EXCLUDED_DIRS: &[&str] = &["backups", "temp", "cache", "db", ".git", "node_modules", "vendor"];
const EXCLUDED_EXTENSIONS: &[&str] = &["log", "tmp"];
const KEEP_ZERO_RETENTION: Duration = Duration::from_secs(24 * 3600);
/// Minutes after the scheduled time during which the weekly check still fires.
const SCHEDULE_GRACE_MINUTES: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupKind {
    Manual,
    Automatic,
}

impl BackupKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackupKind::Manual => "manual",
            BackupKind::Automatic => "automatic",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupOutcome {
    pub name: String,
    pub files_count: i64,
    pub total_size: u64,
    pub compressed_size: u64,
    pub removed_by_retention: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupFile {
    pub name: String,
    pub size: u64,
    pub size_human: String,
    pub modified: String,
}

/// A project file picked up for the `files/` part of the archive.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectFile {
    pub entry: String,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Serialize)]
struct Manifest<'a> {
    backup_name: &'a str,
    created_at: String,
    #[serde(rename = "type")]
    kind: &'a str,
    version: &'a str,
    database_engine: String,
    files_count: i64,
    total_size: u64,
}

pub fn backup_name(now: NaiveDateTime) -> String {
    format!("{}{}", BACKUP_PREFIX, now.format("%Y-%m-%d_%H-%M-%S"))
}

/// Accepts `loanflow_complete_*` names, with or without `.zip`, and nothing that could
/// leave the backup directory.
pub fn is_valid_backup_name(name: &str) -> bool {
    let stem = name.strip_suffix(".zip").unwrap_or(name);
    stem.len() > BACKUP_PREFIX.len()
        && stem.starts_with(BACKUP_PREFIX)
        && !stem.contains("..")
        && stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Path of the archive for `name`, if the name is valid and the file exists.
pub fn backup_path(dir: &str, name: &str) -> Option<PathBuf> {
    if !is_valid_backup_name(name) {
        return None;
    }
    let stem = name.strip_suffix(".zip").unwrap_or(name);
    let path = Path::new(dir).join(format!("{}.zip", stem));
    path.is_file().then_some(path)
}

/// Full backup: database snapshot, project files from `sources` and a manifest,
/// zipped, then retention. Every attempt is recorded in `backup_logs`.
pub fn create_complete_backup(
    store: &dyn Store,
    dir: &str,
    sources: &[String],
    kind: BackupKind,
) -> Result<BackupOutcome, String> {
    let name = backup_name(store.site_now());
    log::info!("Creating {} backup {}", kind.as_str(), name);

    let result = build_archive(store, dir, sources, &name, kind);
    let notify = store.setting_get_bool("backup_email_notifications");

    match result {
        Ok(mut outcome) => {
            let max = store.setting_get_or("backup_max_retention", "4").parse::<i64>().unwrap_or(4);
            outcome.removed_by_retention = apply_retention(dir, max, SystemTime::now());

            let entry = NewBackupLog {
                backup_name: name.clone(),
                backup_type: kind.as_str().to_string(),
                files_count: outcome.files_count,
                total_size: outcome.total_size as i64,
                compressed_size: outcome.compressed_size as i64,
                status: "completed".to_string(),
            };
            if let Err(e) = store.backup_log_insert(&entry) {
                log::error!("Failed to log backup {}: {}", name, e);
            }
            log::info!(
                "Backup {} completed: {} file(s), {} compressed to {}",
                name,
                outcome.files_count,
                human_bytes(outcome.total_size),
                human_bytes(outcome.compressed_size)
            );
            if notify {
                let detail = format!(
                    "{} file(s), {} compressed.",
                    outcome.files_count,
                    human_bytes(outcome.compressed_size)
                );
                crate::email::send_backup_notification(store, &name, true, &detail);
            }
            Ok(outcome)
        }
        Err(e) => {
            log::error!("Backup {} failed: {}", name, e);
            let _ = fs::remove_dir_all(Path::new(dir).join(&name));
            let entry = NewBackupLog {
                backup_name: name.clone(),
                backup_type: kind.as_str().to_string(),
                status: "failed".to_string(),
                ..Default::default()
            };
            if let Err(log_err) = store.backup_log_insert(&entry) {
                log::error!("Failed to log backup {}: {}", name, log_err);
            }
            if notify {
                crate::email::send_backup_notification(store, &name, false, &e);
            }
            Err(e)
        }
    }
}

fn build_archive(
    store: &dyn Store,
    dir: &str,
    sources: &[String],
    name: &str,
    kind: BackupKind,
) -> Result<BackupOutcome, String> {
    fs::create_dir_all(dir).map_err(|e| format!("Cannot create backup directory: {}", e))?;
    let staging = Path::new(dir).join(name);
    fs::create_dir_all(&staging).map_err(|e| format!("Cannot create staging directory: {}", e))?;

    let db_file = staging.join(DB_ENTRY);
    store.snapshot_to(&db_file.to_string_lossy())?;
    let db_size = file_size(&db_file);

    let files = collect_project_files(sources, dir);
    let files_size: u64 = files.iter().map(|f| f.size).sum();
    // Database and manifest count alongside the project files.
    let files_count = files.len() as i64 + 2;

    let (sqlite_version, _) = store.ping()?;
    let manifest = Manifest {
        backup_name: name,
        created_at: store.site_now().format("%Y-%m-%d %H:%M:%S").to_string(),
        kind: kind.as_str(),
        version: env!("CARGO_PKG_VERSION"),
        database_engine: format!("SQLite {}", sqlite_version),
        files_count,
        total_size: db_size + files_size,
    };
    let manifest_json = serde_json::to_vec_pretty(&manifest).map_err(|e| e.to_string())?;
    let manifest_file = staging.join(MANIFEST_ENTRY);
    fs::write(&manifest_file, &manifest_json).map_err(|e| format!("Cannot write manifest: {}", e))?;

    let mut entries: Vec<(String, PathBuf)> = Vec::with_capacity(files.len() + 2);
    entries.push((DB_ENTRY.to_string(), db_file));
    entries.extend(files.into_iter().map(|f| (f.entry, f.path)));
    entries.push((MANIFEST_ENTRY.to_string(), manifest_file));

    let zip_path = Path::new(dir).join(format!("{}.zip", name));
    write_zip(&zip_path, &entries)?;

    fs::remove_dir_all(&staging).map_err(|e| format!("Cannot remove staging directory: {}", e))?;

    Ok(BackupOutcome {
        name: name.to_string(),
        files_count,
        total_size: db_size + files_size + manifest_json.len() as u64,
        compressed_size: file_size(&zip_path),
        removed_by_retention: 0,
    })
}

fn write_zip(dest: &Path, entries: &[(String, PathBuf)]) -> Result<(), String> {
    let file = File::create(dest).map_err(|e| format!("Cannot create archive: {}", e))?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for (entry_name, path) in entries {
        let mut src = File::open(path).map_err(|e| format!("Cannot read {}: {}", entry_name, e))?;
        zip.start_file(entry_name.as_str(), options).map_err(|e| e.to_string())?;
        io::copy(&mut src, &mut zip).map_err(|e| format!("Cannot archive {}: {}", entry_name, e))?;
    }
    zip.finish().map_err(|e| e.to_string())?;
    Ok(())
}

/// Files under each source, as `files/<source name>/...` entries sorted by entry name.
/// Missing sources are skipped. Excluded directories, `.log`/`.tmp` files, symlinks
/// and the backup directory itself never make it in.
pub fn collect_project_files(sources: &[String], backup_dir: &str) -> Vec<ProjectFile> {
    let backup_root = fs::canonicalize(backup_dir).ok();
    let mut out = Vec::new();
    for source in sources {
        let path = Path::new(source);
        let Some(base) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            continue;
        };
        let prefix = format!("{}/{}", FILES_DIR, base);
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => walk_project_dir(path, &prefix, backup_root.as_deref(), &mut out),
            Ok(meta) if meta.is_file() && !is_excluded_file(path) => out.push(ProjectFile {
                entry: prefix,
                path: path.to_path_buf(),
                size: meta.len(),
            }),
            Ok(_) => {}
            Err(_) => log::debug!("Backup source {} not found, skipped", source),
        }
    }
    out.sort_by(|a, b| a.entry.cmp(&b.entry));
    out
}

fn walk_project_dir(dir: &Path, prefix: &str, backup_root: Option<&Path>, out: &mut Vec<ProjectFile>) {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            log::warn!("Cannot read {} for backup: {}", dir.display(), e);
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        let file_type = meta.file_type();
        if file_type.is_dir() {
            if EXCLUDED_DIRS.contains(&name.as_str()) {
                continue;
            }
            if backup_root.is_some_and(|root| fs::canonicalize(&path).ok().as_deref() == Some(root)) {
                continue;
            }
            walk_project_dir(&path, &format!("{}/{}", prefix, name), backup_root, out);
        } else if file_type.is_file() && !is_excluded_file(&path) {
            out.push(ProjectFile {
                entry: format!("{}/{}", prefix, name),
                path,
                size: meta.len(),
            });
        }
    }
}

fn is_excluded_file(path: &Path) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    EXCLUDED_EXTENSIONS.contains(&ext.as_str())
}

/// Archives in `dir`, newest first.
pub fn list_backups(dir: &str) -> Vec<BackupFile> {
    let mut found: Vec<(SystemTime, BackupFile)> = backup_entries(dir)
        .into_iter()
        .map(|(path, modified, size)| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let modified_str = chrono::DateTime::<chrono::Local>::from(modified)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string();
            (
                modified,
                BackupFile {
                    name,
                    size,
                    size_human: human_bytes(size),
                    modified: modified_str,
                },
            )
        })
        .collect();
    found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.name.cmp(&a.1.name)));
    found.into_iter().map(|(_, f)| f).collect()
}

pub fn delete_backup(dir: &str, name: &str) -> Result<(), String> {
    if !is_valid_backup_name(name) {
        return Err("Invalid backup name".into());
    }
    let path = backup_path(dir, name).ok_or_else(|| "Backup not found".to_string())?;
    fs::remove_file(&path).map_err(|e| format!("Failed to delete backup: {}", e))
}

/// `max_keep = 0` removes archives older than 24 hours; otherwise keeps the newest
/// `max_keep`. Returns how many were deleted.
pub fn apply_retention(dir: &str, max_keep: i64, now: SystemTime) -> usize {
    let mut entries = backup_entries(dir);
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));

    let doomed: Vec<PathBuf> = if max_keep <= 0 {
        entries
            .into_iter()
            .filter(|(_, modified, _)| {
                now.duration_since(*modified)
                    .map(|age| age > KEEP_ZERO_RETENTION)
                    .unwrap_or(false)
            })
            .map(|(p, _, _)| p)
            .collect()
    } else {
        entries
            .into_iter()
            .skip(max_keep as usize)
            .map(|(p, _, _)| p)
            .collect()
    };

    let mut removed = 0;
    for path in doomed {
        match fs::remove_file(&path) {
            Ok(_) => {
                log::info!("Removed old backup {}", path.display());
                removed += 1;
            }
            Err(e) => log::error!("Failed to remove old backup {}: {}", path.display(), e),
        }
    }
    removed
}

/// True when the weekly schedule is on, today is the configured day, the clock is
/// within a few minutes after the configured time, and no automatic backup ran recently.
pub fn weekly_backup_due(settings: &HashMap<String, String>, now: NaiveDateTime, ran_recently: bool) -> bool {
    if ran_recently {
        return false;
    }
    let get = |k: &str, d: &str| settings.get(k).cloned().unwrap_or_else(|| d.to_string());
    if !is_truthy(&get("backup_weekly_schedule", "0")) {
        return false;
    }
    let Some(day) = parse_weekday(&get("backup_schedule_day", "sunday")) else {
        return false;
    };
    let Some(at) = parse_schedule_time(&get("backup_schedule_time", "02:00")) else {
        return false;
    };
    if now.weekday() != day {
        return false;
    }
    let now_minutes = (now.hour() * 60 + now.minute()) as i64;
    let at_minutes = (at.hour() * 60 + at.minute()) as i64;
    let delta = now_minutes - at_minutes;
    (0..SCHEDULE_GRACE_MINUTES).contains(&delta)
}

pub fn parse_weekday(s: &str) -> Option<Weekday> {
    match s.to_ascii_lowercase().as_str() {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// `HH:MM`, 24-hour clock.
pub fn parse_schedule_time(s: &str) -> Option<NaiveTime> {
    let re = regex::Regex::new(r"^([01]\d|2[0-3]):([0-5]\d)$").ok()?;
    if !re.is_match(s) {
        return None;
    }
    NaiveTime::parse_from_str(s, "%H:%M").ok()
}

fn backup_entries(dir: &str) -> Vec<(PathBuf, SystemTime, u64)> {
    let Ok(read) = fs::read_dir(dir) else {
        return vec![];
    };
    read.filter_map(|e| e.ok())
        .filter_map(|e| {
            let path = e.path();
            let name = path.file_name()?.to_string_lossy().to_string();
            if !name.starts_with(BACKUP_PREFIX) || !name.ends_with(".zip") {
                return None;
            }
            let meta = e.metadata().ok()?;
            if !meta.is_file() {
                return None;
            }
            Some((path, meta.modified().ok()?, meta.len()))
        })
        .collect()
}

fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

pub fn human_bytes(bytes: u64) -> String {
    if bytes >= 1_073_741_824 {
        format!("{:.1} GB", bytes as f64 / 1_073_741_824.0)
    } else if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}
