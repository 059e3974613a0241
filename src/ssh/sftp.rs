//! SFTP file operations
//!
//! Every tool call opens a fresh SFTP client over the resident SSH session
//! and drops it when done, so channel use is bounded to the operation and no
//! mutable SFTP state is shared between concurrent handlers. Remote paths go
//! through server-side canonicalization (`~`, `..`, relative components)
//! before use.

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::{FileAttributes, OpenFlags};
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::connection::Session;
use crate::error::{Result, SshMcpError};

/// Mode applied when neither explicit perms nor a local stat are available.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// A file or directory entry on the remote host.
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub mode: String,
    pub mod_time: Option<DateTime<Utc>>,
    pub is_dir: bool,
    pub is_symlink: bool,
}

/// Open a fresh SFTP client on the session. Dropping the returned client
/// closes its channel.
pub async fn open_client(session: &Session) -> Result<SftpSession> {
    let channel = session.open_channel().await?;
    channel
        .request_subsystem(true, "sftp")
        .await
        .map_err(|e| SshMcpError::sftp(format!("failed to request SFTP subsystem: {}", e)))?;
    SftpSession::new(channel.into_stream())
        .await
        .map_err(|e| SshMcpError::sftp(format!("failed to initialize SFTP session: {}", e)))
}

/// Canonicalize a remote path on the server, resolving `~`, `..`, and
/// relative components. Falls back to the original string when the server
/// refuses.
pub async fn expand_remote_path(sftp: &SftpSession, remote_path: &str) -> String {
    match sftp.canonicalize(remote_path).await {
        Ok(real) => real,
        Err(_) => remote_path.to_string(),
    }
}

/// Upload a local file. Mode applied to the remote copy: explicit `perms`,
/// else the local permission bits, else 0644. Returns bytes copied.
pub async fn upload_file(
    sftp: &SftpSession,
    local_path: &Path,
    remote_path: &str,
    perms: Option<u32>,
) -> Result<u64> {
    let mut local = tokio::fs::File::open(local_path)
        .await
        .map_err(|e| SshMcpError::sftp(format!("open local file {}: {}", local_path.display(), e)))?;

    let mode = match perms {
        Some(mode) => mode,
        None => match local.metadata().await {
            Ok(meta) => perm_bits(&meta),
            Err(_) => DEFAULT_FILE_MODE,
        },
    };

    let mut remote = sftp
        .open_with_flags(
            remote_path,
            OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
        )
        .await
        .map_err(|e| SshMcpError::sftp(format!("create remote file {}: {}", remote_path, e)))?;

    let bytes = tokio::io::copy(&mut local, &mut remote)
        .await
        .map_err(|e| SshMcpError::sftp(format!("copy to remote {}: {}", remote_path, e)))?;
    remote
        .shutdown()
        .await
        .map_err(|e| SshMcpError::sftp(format!("finish remote file {}: {}", remote_path, e)))?;

    chmod(sftp, remote_path, mode).await?;
    Ok(bytes)
}

/// Download a remote file, applying its permission bits to the local copy.
/// Returns bytes copied.
pub async fn download_file(sftp: &SftpSession, remote_path: &str, local_path: &Path) -> Result<u64> {
    let mut remote = sftp
        .open(remote_path)
        .await
        .map_err(|e| SshMcpError::sftp(format!("open remote file {}: {}", remote_path, e)))?;

    let attrs = sftp
        .metadata(remote_path)
        .await
        .map_err(|e| SshMcpError::sftp(format!("stat remote file {}: {}", remote_path, e)))?;

    let mut local = tokio::fs::File::create(local_path)
        .await
        .map_err(|e| SshMcpError::sftp(format!("create local file {}: {}", local_path.display(), e)))?;

    let bytes = tokio::io::copy(&mut remote, &mut local)
        .await
        .map_err(|e| SshMcpError::sftp(format!("copy to local {}: {}", local_path.display(), e)))?;
    local
        .flush()
        .await
        .map_err(|e| SshMcpError::sftp(format!("flush local file {}: {}", local_path.display(), e)))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = attrs.permissions.unwrap_or(DEFAULT_FILE_MODE) & 0o777;
        tokio::fs::set_permissions(local_path, std::fs::Permissions::from_mode(mode))
            .await
            .map_err(|e| {
                SshMcpError::sftp(format!("chmod local file {}: {}", local_path.display(), e))
            })?;
    }
    #[cfg(not(unix))]
    let _ = attrs;

    Ok(bytes)
}

/// Read a remote file. With `max > 0` the size is checked up front and the
/// read is capped at `max + 1` bytes so growth between stat and read is
/// still caught.
pub async fn read_file(sftp: &SftpSession, remote_path: &str, max_size: u64) -> Result<Vec<u8>> {
    let file = sftp
        .open(remote_path)
        .await
        .map_err(|e| SshMcpError::sftp(format!("open remote file {}: {}", remote_path, e)))?;

    let mut data = Vec::new();
    if max_size > 0 {
        let attrs = sftp
            .metadata(remote_path)
            .await
            .map_err(|e| SshMcpError::sftp(format!("stat remote file {}: {}", remote_path, e)))?;
        let size = attrs.size.unwrap_or(0);
        if size > max_size {
            return Err(SshMcpError::FileTooLarge {
                path: remote_path.to_string(),
                size,
                limit: max_size,
            });
        }
        let mut limited = file.take(max_size + 1);
        limited
            .read_to_end(&mut data)
            .await
            .map_err(|e| SshMcpError::sftp(format!("read remote file {}: {}", remote_path, e)))?;
        if data.len() as u64 > max_size {
            return Err(SshMcpError::FileTooLarge {
                path: remote_path.to_string(),
                size: data.len() as u64,
                limit: max_size,
            });
        }
    } else {
        let mut file = file;
        file.read_to_end(&mut data)
            .await
            .map_err(|e| SshMcpError::sftp(format!("read remote file {}: {}", remote_path, e)))?;
    }

    Ok(data)
}

/// Write data to a remote file and chmod it. Returns bytes written.
pub async fn write_file(
    sftp: &SftpSession,
    remote_path: &str,
    data: &[u8],
    perms: u32,
) -> Result<u64> {
    let mut remote = sftp
        .open_with_flags(
            remote_path,
            OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
        )
        .await
        .map_err(|e| SshMcpError::sftp(format!("create remote file {}: {}", remote_path, e)))?;

    remote
        .write_all(data)
        .await
        .map_err(|e| SshMcpError::sftp(format!("write remote file {}: {}", remote_path, e)))?;
    remote
        .shutdown()
        .await
        .map_err(|e| SshMcpError::sftp(format!("finish remote file {}: {}", remote_path, e)))?;

    chmod(sftp, remote_path, perms).await?;
    Ok(data.len() as u64)
}

/// List a remote directory.
pub async fn list_dir(sftp: &SftpSession, dir_path: &str) -> Result<Vec<FileEntry>> {
    let read_dir = sftp
        .read_dir(dir_path)
        .await
        .map_err(|e| SshMcpError::sftp(format!("read remote directory {}: {}", dir_path, e)))?;

    let mut entries = Vec::new();
    for entry in read_dir {
        let name = entry.file_name();
        if name == "." || name == ".." {
            continue;
        }
        let attrs = entry.metadata();
        let path = join_remote(dir_path, &name);
        entries.push(entry_from_attrs(name, path, &attrs));
    }
    Ok(entries)
}

/// Stat a remote path, following symlinks or not.
pub async fn stat_entry(
    sftp: &SftpSession,
    remote_path: &str,
    follow_symlinks: bool,
) -> Result<FileEntry> {
    let attrs = if follow_symlinks {
        sftp.metadata(remote_path).await
    } else {
        sftp.symlink_metadata(remote_path).await
    }
    .map_err(|e| SshMcpError::sftp(format!("stat {}: {}", remote_path, e)))?;

    Ok(entry_from_attrs(
        base_name(remote_path).to_string(),
        remote_path.to_string(),
        &attrs,
    ))
}

/// Rename a remote file or directory.
pub async fn rename(sftp: &SftpSession, old_path: &str, new_path: &str) -> Result<()> {
    sftp.rename(old_path, new_path)
        .await
        .map_err(|e| SshMcpError::sftp(format!("rename {} to {}: {}", old_path, new_path, e)))
}

/// Recursively upload a local directory. Directory modes are applied
/// best-effort (some servers refuse chmod on directories). Returns
/// (files, bytes) uploaded.
pub async fn upload_dir(sftp: &SftpSession, local_dir: &Path, remote_dir: &str) -> Result<(u64, u64)> {
    let mut files = 0u64;
    let mut bytes = 0u64;
    upload_dir_recursive(sftp, local_dir, remote_dir, &mut files, &mut bytes).await?;
    Ok((files, bytes))
}

async fn upload_dir_recursive(
    sftp: &SftpSession,
    local_dir: &Path,
    remote_dir: &str,
    files: &mut u64,
    bytes: &mut u64,
) -> Result<()> {
    create_dir_all(sftp, remote_dir).await?;
    if let Ok(meta) = tokio::fs::metadata(local_dir).await {
        let attrs = FileAttributes {
            permissions: Some(perm_bits(&meta)),
            ..Default::default()
        };
        if let Err(e) = sftp.set_metadata(remote_dir, attrs).await {
            debug!("chmod remote dir {} skipped: {}", remote_dir, e);
        }
    }

    let mut entries = tokio::fs::read_dir(local_dir)
        .await
        .map_err(|e| SshMcpError::sftp(format!("read local directory {}: {}", local_dir.display(), e)))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| SshMcpError::sftp(format!("read local directory entry: {}", e)))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        let remote_child = join_remote(remote_dir, &name);
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| SshMcpError::sftp(format!("stat {}: {}", entry.path().display(), e)))?;

        if file_type.is_dir() {
            Box::pin(upload_dir_recursive(
                sftp,
                &entry.path(),
                &remote_child,
                files,
                bytes,
            ))
            .await?;
        } else {
            let n = upload_file(sftp, &entry.path(), &remote_child, None).await?;
            *files += 1;
            *bytes += n;
        }
    }
    Ok(())
}

/// Recursively download a remote directory. Returns (files, bytes)
/// downloaded.
pub async fn download_dir(
    sftp: &SftpSession,
    remote_dir: &str,
    local_dir: &Path,
) -> Result<(u64, u64)> {
    let mut files = 0u64;
    let mut bytes = 0u64;
    download_dir_recursive(sftp, remote_dir, local_dir, &mut files, &mut bytes).await?;
    Ok((files, bytes))
}

async fn download_dir_recursive(
    sftp: &SftpSession,
    remote_dir: &str,
    local_dir: &Path,
    files: &mut u64,
    bytes: &mut u64,
) -> Result<()> {
    tokio::fs::create_dir_all(local_dir)
        .await
        .map_err(|e| SshMcpError::sftp(format!("mkdir {}: {}", local_dir.display(), e)))?;

    for entry in list_dir(sftp, remote_dir).await? {
        let target = local_dir.join(&entry.name);
        if entry.is_dir {
            Box::pin(download_dir_recursive(
                sftp,
                &entry.path,
                &target,
                files,
                bytes,
            ))
            .await?;
        } else {
            let n = download_file(sftp, &entry.path, &target).await?;
            *files += 1;
            *bytes += n;
        }
    }
    Ok(())
}

/// Create a remote directory and any missing parents.
pub async fn create_dir_all(sftp: &SftpSession, path: &str) -> Result<()> {
    let mut current = String::new();
    if path.starts_with('/') {
        current.push('/');
    }

    for part in path.split('/').filter(|p| !p.is_empty()) {
        if !current.is_empty() && !current.ends_with('/') {
            current.push('/');
        }
        current.push_str(part);

        if let Ok(true) = sftp.try_exists(current.as_str()).await {
            continue;
        }
        if let Err(e) = sftp.create_dir(current.as_str()).await {
            // A concurrent mkdir is fine; only fail if it still doesn't exist.
            match sftp.try_exists(current.as_str()).await {
                Ok(true) => {}
                _ => {
                    return Err(SshMcpError::sftp(format!("mkdir {}: {}", current, e)));
                }
            }
        }
    }
    Ok(())
}

/// Permission bits of a remote path, or 0644 when it cannot be stat'ed.
pub async fn file_perms(sftp: &SftpSession, remote_path: &str) -> u32 {
    match sftp.metadata(remote_path).await {
        Ok(attrs) => attrs.permissions.unwrap_or(DEFAULT_FILE_MODE) & 0o777,
        Err(_) => DEFAULT_FILE_MODE,
    }
}

/// Set permission bits on a remote path.
pub async fn chmod(sftp: &SftpSession, remote_path: &str, mode: u32) -> Result<()> {
    let attrs = FileAttributes {
        permissions: Some(mode),
        ..Default::default()
    };
    sftp.set_metadata(remote_path, attrs)
        .await
        .map_err(|e| SshMcpError::sftp(format!("chmod remote file {}: {}", remote_path, e)))
}

fn entry_from_attrs(name: String, path: String, attrs: &FileAttributes) -> FileEntry {
    FileEntry {
        name,
        path,
        size: attrs.size.unwrap_or(0),
        mode: mode_string(attrs),
        mod_time: attrs
            .mtime
            .and_then(|mtime| Utc.timestamp_opt(i64::from(mtime), 0).single()),
        is_dir: attrs.is_dir(),
        is_symlink: attrs.is_symlink(),
    }
}

/// Render attributes as an `ls -l` style mode string.
fn mode_string(attrs: &FileAttributes) -> String {
    let mut s = String::with_capacity(10);
    s.push(if attrs.is_dir() {
        'd'
    } else if attrs.is_symlink() {
        'l'
    } else {
        '-'
    });

    let perms = attrs.permissions.unwrap_or(0) & 0o777;
    for shift in [6u32, 3, 0] {
        let bits = (perms >> shift) & 0o7;
        s.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        s.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        s.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    s
}

/// Join a remote directory and child name with forward slashes.
fn join_remote(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{}", name)
    } else if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir.trim_end_matches('/'), name)
    }
}

fn base_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(path)
}

#[cfg(unix)]
fn perm_bits(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn perm_bits(_meta: &std::fs::Metadata) -> u32 {
    DEFAULT_FILE_MODE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(permissions: Option<u32>) -> FileAttributes {
        FileAttributes {
            permissions,
            ..Default::default()
        }
    }

    #[test]
    fn test_mode_string_regular_file() {
        assert_eq!(mode_string(&attrs(Some(0o644))), "-rw-r--r--");
        assert_eq!(mode_string(&attrs(Some(0o755))), "-rwxr-xr-x");
        assert_eq!(mode_string(&attrs(Some(0o600))), "-rw-------");
    }

    #[test]
    fn test_mode_string_directory_bit() {
        // S_IFDIR | 0755
        assert_eq!(mode_string(&attrs(Some(0o040755))), "drwxr-xr-x");
    }

    #[test]
    fn test_mode_string_symlink_bit() {
        // S_IFLNK | 0777
        assert_eq!(mode_string(&attrs(Some(0o120777))), "lrwxrwxrwx");
    }

    #[test]
    fn test_mode_string_no_permissions() {
        assert_eq!(mode_string(&attrs(None)), "----------");
    }

    #[test]
    fn test_join_remote() {
        assert_eq!(join_remote("/home/user", "f.txt"), "/home/user/f.txt");
        assert_eq!(join_remote("/home/user/", "f.txt"), "/home/user/f.txt");
        assert_eq!(join_remote("/", "f.txt"), "/f.txt");
        assert_eq!(join_remote("", "f.txt"), "f.txt");
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("/a/b/c.txt"), "c.txt");
        assert_eq!(base_name("c.txt"), "c.txt");
        assert_eq!(base_name("/a/b/"), "b");
        assert_eq!(base_name("/"), "/");
    }

    #[test]
    fn test_entry_from_attrs_mtime() {
        let mut a = attrs(Some(0o644));
        a.size = Some(42);
        a.mtime = Some(1_700_000_000);
        let entry = entry_from_attrs("f".into(), "/f".into(), &a);
        assert_eq!(entry.size, 42);
        assert!(entry.mod_time.is_some());
        assert!(!entry.is_dir);
        assert!(!entry.is_symlink);
    }
}
