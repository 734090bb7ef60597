use schoold::config::Config;
use schoold::{db, ipc, logging};
use std::io::{self, BufRead, Write};
use tracing::{debug, info, warn};

fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    logging::init(config.log_format);
    info!(version = env!("CARGO_PKG_VERSION"), "schoold starting");

    let mut state = ipc::AppState::new(config.store());
    if let Some(workspace) = &config.workspace {
        match db::open_store(workspace) {
            Ok(conn) => {
                info!(workspace = %workspace.to_string_lossy(), "workspace opened from config");
                state.workspace = Some(workspace.clone());
                state.db = Some(conn);
            }
            // Clients can still pick a workspace over IPC.
            Err(e) => warn!(error = %e, "configured workspace unavailable"),
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                warn!(error = %e, "unparseable request");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        debug!(id = %req.id, method = %req.method, "request");
        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    info!("stdin closed, exiting");
    Ok(())
}
