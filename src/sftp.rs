// SFTP connectivity probe: log in with a private key, list the home
// directory and look for the web root that serves the landing pages.

use crate::config::ServerConfig;
use crate::error::SftpError;
use serde::Serialize;
use ssh2::Session;
use std::collections::BTreeMap;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Entries of the login directory shown in a report.
pub const ROOT_PREVIEW: usize = 10;
/// PHP files of the web root shown in a report.
pub const PHP_PREVIEW: usize = 5;

/// Checked in order; the first readable one wins.
pub const WEB_ROOTS: [&str; 5] = [
    "/var/www/html",
    "/var/www",
    "/public_html",
    "/home/ubuntu/public_html",
    "/usr/share/nginx/html",
];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RemoteEntry {
    pub name: String,
    pub is_dir: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WebRoot {
    pub path: String,
    pub item_count: usize,
    pub php_files: Vec<String>,
    pub php_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    /// `None` when the login directory could not be listed.
    pub root_entries: Option<Vec<RemoteEntry>>,
    pub web_root: Option<WebRoot>,
}

fn entry_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Summarize a web root listing: item count and the first PHP files.
pub fn summarize_web_root(path: &str, names: &[String]) -> WebRoot {
    let php: Vec<&String> = names.iter().filter(|n| n.ends_with(".php")).collect();
    WebRoot {
        path: path.to_string(),
        item_count: names.len(),
        php_count: php.len(),
        php_files: php.into_iter().take(PHP_PREVIEW).cloned().collect(),
    }
}

fn connect(server: &ServerConfig) -> Result<TcpStream, SftpError> {
    let addr = format!("{}:{}", server.host, server.port);
    let io_err = |source| SftpError::Connect {
        addr: addr.clone(),
        source,
    };
    let resolved = addr.to_socket_addrs().map_err(io_err)?.collect::<Vec<_>>();
    let mut last = std::io::Error::new(std::io::ErrorKind::NotFound, "host did not resolve");
    for sock in resolved {
        match TcpStream::connect_timeout(&sock, CONNECT_TIMEOUT) {
            Ok(tcp) => return Ok(tcp),
            Err(e) => last = e,
        }
    }
    Err(io_err(last))
}

/// Connect to `server`, authenticate with its key file and report what
/// the SFTP session can see.
pub fn probe(server: &ServerConfig) -> Result<ProbeReport, SftpError> {
    if !server.key_file.exists() {
        return Err(SftpError::KeyNotFound(server.key_file.clone()));
    }

    info!(host = %server.host, port = server.port, key = %server.key_file.display(), "Connecting");
    let tcp = connect(server)?;
    let mut session = Session::new()?;
    session.set_tcp_stream(tcp);
    session.set_timeout(CONNECT_TIMEOUT.as_millis() as u32);
    session.handshake()?;

    // libssh2 picks the key type (RSA, Ed25519, ...) from the file itself.
    if let Err(e) = session.userauth_pubkey_file(
        &server.username,
        None,
        &server.key_file,
        server.passphrase.as_deref(),
    ) {
        debug!("Public key auth rejected: {}", e);
        return Err(SftpError::Authentication(server.username.clone()));
    }
    if !session.authenticated() {
        return Err(SftpError::Authentication(server.username.clone()));
    }
    info!(host = %server.host, "SSH connected");

    let sftp = session.sftp()?;
    let root_entries = match sftp.readdir(Path::new(".")) {
        Ok(entries) => Some(
            entries
                .iter()
                .take(ROOT_PREVIEW)
                .map(|(path, stat)| RemoteEntry {
                    name: entry_name(path),
                    is_dir: stat.is_dir(),
                })
                .collect(),
        ),
        Err(e) => {
            warn!(host = %server.host, "Could not list login directory: {}", e);
            None
        }
    };

    let web_root = WEB_ROOTS.iter().find_map(|root| match sftp.readdir(Path::new(root)) {
        Ok(entries) => {
            let names: Vec<String> = entries.iter().map(|(p, _)| entry_name(p)).collect();
            Some(summarize_web_root(root, &names))
        }
        Err(e) => {
            debug!(path = root, "Not readable: {}", e);
            None
        }
    });

    drop(sftp);
    if let Err(e) = session.disconnect(None, "probe finished", None) {
        debug!("Disconnect failed: {}", e);
    }
    Ok(ProbeReport { root_entries, web_root })
}

/// Probe each server in turn; one failure doesn't stop the others.
pub fn probe_all(
    servers: &BTreeMap<String, ServerConfig>,
) -> Vec<(String, Result<ProbeReport, SftpError>)> {
    servers
        .iter()
        .map(|(name, server)| {
            let result = probe(server);
            if let Err(e) = &result {
                warn!(server = %name, "Probe failed: {}", e);
            }
            (name.clone(), result)
        })
        .collect()
}
