use crate::backup;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};

fn get_path(req: &Request, key: &str) -> Option<PathBuf> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

fn handle_backup_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(out) = get_path(req, "outPath") else {
        return err(&req.id, "bad_params", "missing outPath", None);
    };

    match backup::export_workspace_bundle(&workspace, &out) {
        Ok(summary) => {
            info!(bundle = %summary.bundle_id, out = %out.to_string_lossy(), "workspace exported");
            ok(
                &req.id,
                json!({
                    "path": out.to_string_lossy(),
                    "bundleFormat": summary.bundle_format,
                    "bundleId": summary.bundle_id,
                    "dbSha256": summary.db_sha256,
                    "entryCount": summary.entry_count,
                }),
            )
        }
        Err(e) => {
            warn!(error = %format!("{e:#}"), "backup export failed");
            err(&req.id, "backup_failed", format!("{e:#}"), None)
        }
    }
}

fn handle_backup_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(src) = get_path(req, "inPath") else {
        return err(&req.id, "bad_params", "missing inPath", None);
    };

    // Close the live connection before its file is replaced.
    state.db = None;
    let imported = backup::import_workspace_bundle(&src, &workspace);

    // Reopen whichever database is now in place; this also migrates it.
    match db::open_store(&workspace) {
        Ok(conn) => state.db = Some(conn),
        Err(e) => {
            state.workspace = None;
            return err(
                &req.id,
                e.code(),
                e.to_string(),
                Some(json!({ "workspacePath": workspace.to_string_lossy() })),
            );
        }
    }

    match imported {
        Ok(summary) => {
            info!(format = %summary.bundle_format_detected, "workspace imported");
            ok(
                &req.id,
                json!({
                    "workspacePath": workspace.to_string_lossy(),
                    "bundleFormatDetected": summary.bundle_format_detected,
                    "bundleId": summary.bundle_id,
                }),
            )
        }
        Err(e) => {
            warn!(error = %format!("{e:#}"), "backup import failed");
            err(&req.id, "backup_failed", format!("{e:#}"), None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.export" => Some(handle_backup_export(state, req)),
        "backup.import" => Some(handle_backup_import(state, req)),
        _ => None,
    }
}
