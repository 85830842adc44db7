//! High-level pipeline: presign → direct transfer → confirm, per file and per batch.
//!
//! # Major Types
//! - [`UploadConfig`]: where files go and what is accepted
//! - [`UploadResult`]: what the caller gets back for each file
//! - [`BatchError`]: first fatal failure of a batch, with what completed before it
//!
//! # Responsibilities
//! - Validate every file locally before any request is made
//! - Run each file through a strict forward state machine:
//!   `Pending → Presigned → (Duplicate | Uploaded) → (Confirmed | ConfirmSkipped | ConfirmFailedSoft) → Done`
//! - Process batches strictly one file at a time, reporting progress after each
//! - Fail fast on presign/transfer failures; never roll back uploaded files
//! - Treat confirmation as best effort: failures are logged and recorded on the result
//!
//! # Navigation
//! - Entrypoints: [`upload_all`], [`upload_one`]
//! - Steps: [`presign`], [`put_bytes`] / [`build_transfer`], [`confirm`]

use tracing::{debug, error, info, warn};

use crate::config::UploadConfig;
use crate::contract::{
    ConfirmOutcome, ConfirmRequest, FileApi, FileDescriptor, FileSource, PresignRequest,
    ProgressState, TransferRequest, UploadResult, UploadTicket,
};
use crate::error::{BatchError, UploadError};
use crate::hasher::content_digest;
use crate::validation::validate_file;

const CONTENT_TYPE: &str = "Content-Type";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Pending,
    Presigned,
    Duplicate,
    Uploaded,
    Confirmed,
    ConfirmSkipped,
    ConfirmFailedSoft,
    Done,
}

impl Stage {
    fn rank(self) -> u8 {
        match self {
            Stage::Pending => 0,
            Stage::Presigned => 1,
            Stage::Duplicate | Stage::Uploaded => 2,
            Stage::Confirmed | Stage::ConfirmSkipped | Stage::ConfirmFailedSoft => 3,
            Stage::Done => 4,
        }
    }
}

/// Tracks one file through the pipeline. Stages only move forward, one step at a time.
struct FileRun<'a> {
    file: &'a str,
    stage: Stage,
}

impl<'a> FileRun<'a> {
    fn new(file: &'a str) -> Self {
        Self {
            file,
            stage: Stage::Pending,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug_assert_eq!(
            next.rank(),
            self.stage.rank() + 1,
            "illegal transition {:?} -> {:?}",
            self.stage,
            next
        );
        debug!(file = self.file, from = ?self.stage, to = ?next, "[UPLOAD] Stage transition");
        self.stage = next;
    }
}

/// Metadata for `file`, with its digest when `compute_digest` is set.
pub fn describe(file: &FileSource, compute_digest: bool) -> FileDescriptor {
    FileDescriptor {
        original_name: file.name.clone(),
        mime_type: file.mime_type.clone(),
        size_bytes: file.size_bytes(),
        content_digest: compute_digest.then(|| content_digest(&file.content)),
    }
}

/// Obtain an upload ticket for `descriptor`.
pub async fn presign<A>(
    api: &A,
    descriptor: &FileDescriptor,
    config: &UploadConfig,
) -> Result<UploadTicket, UploadError>
where
    A: FileApi + ?Sized,
{
    let request = PresignRequest {
        file: descriptor.clone(),
        destination: config.destination(),
        expires_in: config.expires_in,
    };

    let ticket = api.presign(&request).await.map_err(|source| {
        error!(file = %descriptor.original_name, error = %source, "[UPLOAD][ERROR] presign failed");
        UploadError::Presign {
            file: descriptor.original_name.clone(),
            source,
        }
    })?;

    if !ticket.is_duplicate && ticket.destination_url.is_none() {
        error!(file = %descriptor.original_name, "[UPLOAD][ERROR] presign ticket has no destination");
        return Err(UploadError::MissingDestination {
            file: descriptor.original_name.clone(),
        });
    }

    info!(
        file = %descriptor.original_name,
        object_key = %ticket.object_key,
        duplicate = ticket.is_duplicate,
        "[UPLOAD] presign succeeded"
    );
    Ok(ticket)
}

/// Resolve the direct transfer for `file` from `ticket`.
///
/// `Content-Type` defaults to the file's MIME type unless the ticket already
/// carries a header of that name, in any case.
pub fn build_transfer(file: &FileSource, ticket: &UploadTicket) -> Result<TransferRequest, UploadError> {
    let url = ticket
        .destination_url
        .clone()
        .ok_or_else(|| UploadError::MissingDestination {
            file: file.name.clone(),
        })?;

    let mut headers = ticket.required_headers.clone();
    if !headers.keys().any(|k| k.eq_ignore_ascii_case(CONTENT_TYPE)) {
        headers.insert(CONTENT_TYPE.to_string(), file.mime_type.clone());
    }

    Ok(TransferRequest {
        url,
        method: ticket.http_method.clone(),
        headers,
        body: file.content.clone(),
    })
}

/// Single transfer attempt of `file` to the ticket's destination.
pub async fn put_bytes<A>(api: &A, file: &FileSource, ticket: &UploadTicket) -> Result<(), UploadError>
where
    A: FileApi + ?Sized,
{
    let request = build_transfer(file, ticket)?;
    info!(
        file = %file.name,
        method = %request.method,
        size = request.body.len(),
        "[UPLOAD] Transferring bytes"
    );
    api.transfer(&request).await.map_err(|source| {
        error!(file = %file.name, error = %source, "[UPLOAD][ERROR] transfer failed");
        UploadError::Transfer {
            file: file.name.clone(),
            source,
        }
    })
}

/// Register the object with the backend when the ticket asks for it.
///
/// Never fails: a rejected confirmation is logged and reported as
/// [`ConfirmOutcome::FailedSoft`], because the bytes are already stored.
pub async fn confirm<A>(
    api: &A,
    descriptor: &FileDescriptor,
    ticket: &UploadTicket,
    config: &UploadConfig,
) -> ConfirmOutcome
where
    A: FileApi + ?Sized,
{
    if !ticket.confirmation_required {
        debug!(file = %descriptor.original_name, "[UPLOAD] confirmation not required");
        return ConfirmOutcome::Skipped;
    }

    let request = ConfirmRequest {
        object_key: ticket.object_key.clone(),
        original_name: descriptor.original_name.clone(),
        entity_type: config.entity_type.clone(),
        entity_id: config.entity_id,
        content_digest: descriptor.content_digest.clone(),
    };

    match api.confirm(&request).await {
        Ok(metadata) => {
            debug!(file = %descriptor.original_name, %metadata, "[UPLOAD] confirm succeeded");
            ConfirmOutcome::Confirmed
        }
        Err(e) => {
            warn!(
                file = %descriptor.original_name,
                object_key = %ticket.object_key,
                error = %e,
                request_id = e.request_id().unwrap_or("-"),
                "[UPLOAD][WARN] confirm failed, keeping upload"
            );
            ConfirmOutcome::FailedSoft(e.to_string())
        }
    }
}

/// Validate and upload a single file.
pub async fn upload_one<A>(api: &A, file: &FileSource, config: &UploadConfig) -> Result<UploadResult, UploadError>
where
    A: FileApi + ?Sized,
{
    validate_file(file, &config.limits)?;
    run_file(api, file, config).await
}

/// Upload `files` one after another, in order.
///
/// `on_progress` runs once per file, after that file is done and before the
/// next one starts. The first fatal failure stops the batch; files already
/// uploaded are left in place and returned inside the [`BatchError`].
pub async fn upload_all<A, F>(
    api: &A,
    files: &[FileSource],
    config: &UploadConfig,
    mut on_progress: F,
) -> Result<Vec<UploadResult>, BatchError>
where
    A: FileApi + ?Sized,
    F: FnMut(&ProgressState, &UploadResult),
{
    let total = files.len();
    info!(total, directory = %config.directory, "[UPLOAD] Starting batch");

    for (index, file) in files.iter().enumerate() {
        if let Err(e) = validate_file(file, &config.limits) {
            error!(file = %file.name, index, error = %e, "[UPLOAD][ERROR] validation failed");
            return Err(BatchError {
                index,
                total,
                completed: Vec::new(),
                source: e.into(),
            });
        }
    }

    let mut completed = Vec::with_capacity(total);
    let mut progress = ProgressState {
        completed_count: 0,
        total_count: total,
    };

    for (index, file) in files.iter().enumerate() {
        match run_file(api, file, config).await {
            Ok(result) => {
                progress.completed_count += 1;
                on_progress(&progress, &result);
                completed.push(result);
            }
            Err(source) => {
                error!(
                    file = %file.name,
                    index,
                    completed = completed.len(),
                    error = %source,
                    "[UPLOAD][ERROR] Aborting batch"
                );
                return Err(BatchError {
                    index,
                    total,
                    completed,
                    source,
                });
            }
        }
    }

    info!(total, "[UPLOAD] Batch complete");
    Ok(completed)
}

async fn run_file<A>(api: &A, file: &FileSource, config: &UploadConfig) -> Result<UploadResult, UploadError>
where
    A: FileApi + ?Sized,
{
    let mut run = FileRun::new(&file.name);
    let descriptor = describe(file, config.compute_digest);

    let ticket = presign(api, &descriptor, config).await?;
    run.advance(Stage::Presigned);

    if ticket.is_duplicate {
        info!(file = %file.name, object_key = %ticket.object_key, "[UPLOAD] Duplicate content, skipping transfer");
        run.advance(Stage::Duplicate);
    } else {
        put_bytes(api, file, &ticket).await?;
        run.advance(Stage::Uploaded);
    }

    let confirmation = confirm(api, &descriptor, &ticket, config).await;
    run.advance(match confirmation {
        ConfirmOutcome::Confirmed => Stage::Confirmed,
        ConfirmOutcome::Skipped => Stage::ConfirmSkipped,
        ConfirmOutcome::FailedSoft(_) => Stage::ConfirmFailedSoft,
    });

    let result = UploadResult {
        url: ticket.public_url,
        object_key: ticket.object_key,
        original_name: descriptor.original_name,
        mime_type: descriptor.mime_type,
        size_bytes: descriptor.size_bytes,
        is_duplicate: ticket.is_duplicate,
        confirmation,
    };
    run.advance(Stage::Done);
    info!(file = %result.original_name, object_key = %result.object_key, "[UPLOAD] File done");
    Ok(result)
}
