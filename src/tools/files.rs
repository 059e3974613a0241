//! File tools: upload, download, edit, stat, rename
//!
//! Each handler validates paths first, resolves the session, opens a scoped
//! SFTP client, expands the remote path server-side, and does the work.

use std::path::Path;

use russh_sftp::client::SftpSession;

use crate::error::{Result, SshMcpError};
use crate::security::{validate_local_path, validate_path};
use crate::ssh::sftp;

use super::types::*;
use super::{session_for, ToolContext};

pub async fn handle_upload_file(
    cx: &ToolContext,
    input: SshUploadFileInput,
) -> Result<SshUploadFileOutput> {
    validate_local_path(
        &input.local_path,
        cx.config.security.local_base_dir.as_deref(),
    )?;
    validate_path(&input.remote_path)?;

    let session = session_for(cx, &input.session_id, true).await?;
    let client = sftp::open_client(&session).await?;
    let remote_path = sftp::expand_remote_path(&client, &input.remote_path).await;

    let bytes = sftp::upload_file(&client, Path::new(&input.local_path), &remote_path, None).await?;

    Ok(SshUploadFileOutput {
        bytes_written: bytes,
        message: format!("Uploaded {} bytes to {}", bytes, remote_path),
    })
}

pub async fn handle_download_file(
    cx: &ToolContext,
    input: SshDownloadFileInput,
) -> Result<SshDownloadFileOutput> {
    validate_local_path(
        &input.local_path,
        cx.config.security.local_base_dir.as_deref(),
    )?;
    validate_path(&input.remote_path)?;

    let session = session_for(cx, &input.session_id, true).await?;
    let client = sftp::open_client(&session).await?;
    let remote_path = sftp::expand_remote_path(&client, &input.remote_path).await;

    let bytes = sftp::download_file(&client, &remote_path, Path::new(&input.local_path)).await?;

    Ok(SshDownloadFileOutput {
        bytes_read: bytes,
        message: format!("Downloaded {} bytes from {}", bytes, remote_path),
    })
}

pub async fn handle_edit_file(
    cx: &ToolContext,
    input: SshEditFileInput,
) -> Result<SshEditFileOutput> {
    validate_path(&input.remote_path)?;

    let session = session_for(cx, &input.session_id, true).await?;
    let client = sftp::open_client(&session).await?;
    let remote_path = sftp::expand_remote_path(&client, &input.remote_path).await;

    let backup = input.backup.unwrap_or(true);
    let max_file_size = cx.config.security.max_file_size;

    match input.mode.as_deref().unwrap_or("replace") {
        "replace" => {
            edit_replace(&client, &remote_path, &input, backup, max_file_size).await
        }
        "patch" => edit_patch(&client, &remote_path, &input, backup, max_file_size).await,
        other => Err(SshMcpError::validation(format!(
            "unknown edit mode: {:?} (must be 'replace' or 'patch')",
            other
        ))),
    }
}

async fn edit_replace(
    client: &SftpSession,
    remote_path: &str,
    input: &SshEditFileInput,
    backup: bool,
    max_file_size: u64,
) -> Result<SshEditFileOutput> {
    if backup {
        create_backup(client, remote_path, max_file_size).await?;
    }

    let perms = sftp::file_perms(client, remote_path).await;
    let content = input.content.as_deref().unwrap_or_default();
    let bytes = sftp::write_file(client, remote_path, content.as_bytes(), perms).await?;

    Ok(SshEditFileOutput {
        bytes_written: bytes,
        message: format!("Replaced content of {} ({} bytes)", remote_path, bytes),
    })
}

async fn edit_patch(
    client: &SftpSession,
    remote_path: &str,
    input: &SshEditFileInput,
    backup: bool,
    max_file_size: u64,
) -> Result<SshEditFileOutput> {
    let old_string = input.old_string.as_deref().unwrap_or_default();
    if old_string.is_empty() {
        return Err(SshMcpError::validation(
            "old_string is required for patch mode",
        ));
    }

    let data = sftp::read_file(client, remote_path, max_file_size).await?;
    let content = String::from_utf8_lossy(&data).into_owned();
    if !content.contains(old_string) {
        return Err(SshMcpError::PatchTargetMissing(remote_path.to_string()));
    }

    let new_content = content.replacen(old_string, input.new_string.as_deref().unwrap_or(""), 1);

    if backup {
        create_backup(client, remote_path, max_file_size).await?;
    }

    let perms = sftp::file_perms(client, remote_path).await;
    let bytes = sftp::write_file(client, remote_path, new_content.as_bytes(), perms).await?;

    Ok(SshEditFileOutput {
        bytes_written: bytes,
        message: format!("Patched {} ({} bytes)", remote_path, bytes),
    })
}

/// Copy the current content to `<path>.bak`, preserving permissions. A file
/// that cannot be read (typically: does not exist yet) needs no backup.
async fn create_backup(client: &SftpSession, remote_path: &str, max_file_size: u64) -> Result<()> {
    let data = match sftp::read_file(client, remote_path, max_file_size).await {
        Ok(data) => data,
        Err(_) => return Ok(()),
    };

    let perms = sftp::file_perms(client, remote_path).await;
    sftp::write_file(client, &format!("{}.bak", remote_path), &data, perms)
        .await
        .map_err(|e| SshMcpError::sftp(format!("create backup: {}", e)))?;
    Ok(())
}

pub async fn handle_file_stat(
    cx: &ToolContext,
    input: SshFileStatInput,
) -> Result<SshFileStatOutput> {
    validate_path(&input.remote_path)?;

    let session = session_for(cx, &input.session_id, true).await?;
    let client = sftp::open_client(&session).await?;
    let remote_path = sftp::expand_remote_path(&client, &input.remote_path).await;

    let follow = input.follow_symlinks.unwrap_or(true);
    let entry = sftp::stat_entry(&client, &remote_path, follow).await?;

    Ok(SshFileStatOutput {
        name: entry.name,
        path: remote_path,
        size: entry.size,
        mode: entry.mode,
        is_dir: entry.is_dir,
        is_symlink: entry.is_symlink,
        mod_time: entry
            .mod_time
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default(),
    })
}

pub async fn handle_rename(cx: &ToolContext, input: SshRenameInput) -> Result<SshRenameOutput> {
    validate_path(&input.old_path)?;
    validate_path(&input.new_path)?;

    let session = session_for(cx, &input.session_id, true).await?;
    let client = sftp::open_client(&session).await?;
    let old_path = sftp::expand_remote_path(&client, &input.old_path).await;
    let new_path = sftp::expand_remote_path(&client, &input.new_path).await;

    sftp::rename(&client, &old_path, &new_path).await?;

    Ok(SshRenameOutput {
        message: format!("Renamed {} -> {}", old_path, new_path),
    })
}
