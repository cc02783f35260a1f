//! Fan-out of detected gestures to Unix socket clients.

use std::io::{ErrorKind, Write};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{Error, Result};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Clone)]
pub struct Broadcaster {
    path: PathBuf,
    clients: Arc<Mutex<Vec<UnixStream>>>,
}

impl Broadcaster {
    /// Bind `path` (replacing a stale socket) and accept clients in the
    /// background.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let _ = std::fs::remove_file(&path);

        let listener = UnixListener::bind(&path).map_err(|source| Error::Bind {
            path: path.clone(),
            source,
        })?;
        // Clients may run as a different user.
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o777))?;
        listener.set_nonblocking(true)?;

        let clients: Arc<Mutex<Vec<UnixStream>>> = Arc::new(Mutex::new(Vec::new()));
        let accepted = clients.clone();
        thread::spawn(move || loop {
            match listener.accept() {
                Ok((stream, _)) => {
                    info!("client connected");
                    if let Err(e) = stream.set_nonblocking(false) {
                        warn!("dropping client: {e}");
                        continue;
                    }
                    accepted
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(stream);
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_BACKOFF);
                }
                Err(e) => {
                    warn!("accept error: {e}");
                    thread::sleep(ACCEPT_BACKOFF);
                }
            }
        });

        Ok(Self { path, clients })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn client_count(&self) -> usize {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Write one line to every client, dropping the ones that fail.
    pub fn send_line(&self, line: &str) {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        clients.retain_mut(|stream| match writeln!(stream, "{line}") {
            Ok(_) => {
                stream.flush().ok();
                true
            }
            Err(_) => {
                info!("client disconnected");
                false
            }
        });
    }
}
