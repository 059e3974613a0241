//! Directory tools: list, recursive upload, recursive download

use std::path::Path;

use crate::error::Result;
use crate::security::{validate_local_path, validate_path};
use crate::ssh::sftp;

use super::types::*;
use super::{session_for, ToolContext};

pub async fn handle_list_directory(
    cx: &ToolContext,
    input: SshListDirectoryInput,
) -> Result<SshListDirectoryOutput> {
    validate_path(&input.path)?;

    let session = session_for(cx, &input.session_id, true).await?;
    let client = sftp::open_client(&session).await?;
    let path = sftp::expand_remote_path(&client, &input.path).await;

    let entries = sftp::list_dir(&client, &path).await?;

    Ok(SshListDirectoryOutput {
        count: entries.len(),
        entries,
    })
}

pub async fn handle_upload_directory(
    cx: &ToolContext,
    input: SshUploadDirectoryInput,
) -> Result<SshUploadDirectoryOutput> {
    validate_local_path(
        &input.local_path,
        cx.config.security.local_base_dir.as_deref(),
    )?;
    validate_path(&input.remote_path)?;

    let session = session_for(cx, &input.session_id, true).await?;
    let client = sftp::open_client(&session).await?;
    let remote_path = sftp::expand_remote_path(&client, &input.remote_path).await;

    let (files, bytes) =
        sftp::upload_dir(&client, Path::new(&input.local_path), &remote_path).await?;

    Ok(SshUploadDirectoryOutput {
        files_uploaded: files,
        bytes_written: bytes,
        message: format!("Uploaded {} files ({} bytes) to {}", files, bytes, remote_path),
    })
}

pub async fn handle_download_directory(
    cx: &ToolContext,
    input: SshDownloadDirectoryInput,
) -> Result<SshDownloadDirectoryOutput> {
    validate_local_path(
        &input.local_path,
        cx.config.security.local_base_dir.as_deref(),
    )?;
    validate_path(&input.remote_path)?;

    let session = session_for(cx, &input.session_id, true).await?;
    let client = sftp::open_client(&session).await?;
    let remote_path = sftp::expand_remote_path(&client, &input.remote_path).await;

    let (files, bytes) =
        sftp::download_dir(&client, &remote_path, Path::new(&input.local_path)).await?;

    Ok(SshDownloadDirectoryOutput {
        files_downloaded: files,
        bytes_read: bytes,
        message: format!(
            "Downloaded {} files ({} bytes) from {}",
            files, bytes, remote_path
        ),
    })
}
