use actix_multipart::Multipart;
use actix_web::web;
use futures_util::StreamExt;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::Config;

const MAX_FILE_SIZE_MB: u64 = 25;

/// Maps a validated MIME type to a safe file extension. Intentionally not
/// configurable.
fn mime_to_safe_extension(mime_type: &str) -> Option<&'static str> {
    let map: BTreeMap<&str, &str> = [
        ("image/gif", "gif"),
        ("image/jpeg", "jpg"),
        ("image/png", "png"),
        ("image/webp", "webp"),
        ("video/mp4", "mp4"),
        ("video/quicktime", "mov"),
        ("video/webm", "webm"),
    ]
    .iter()
    .cloned()
    .collect();

    map.get(mime_type).cloned()
}

#[derive(Debug, Serialize)]
pub struct FileError {
    pub filename: String,
    pub error: String,
}

/// Result of a multi-file upload. Failures are reported per file; one bad
/// file never discards the rest of the batch.
#[derive(Debug, Serialize, Default)]
pub struct UploadOutcome {
    pub urls: Vec<String>,
    pub errors: Vec<FileError>,
}

/// Streams every file field of a multipart payload into
/// `<media_path>/<folder>/aa/bb/<uuid>.<ext>` and returns the public
/// `/media/...` URLs in upload order.
pub async fn save_upload_batch(
    config: &Config,
    folder: &str,
    payload: &mut Multipart,
) -> Result<UploadOutcome, actix_web::Error> {
    let mut outcome = UploadOutcome::default();

    while let Some(item) = payload.next().await {
        let mut field = item?;
        let filename = field
            .content_disposition()
            .get_filename()
            .unwrap_or("upload.tmp")
            .to_string();

        let content_type = match field.content_type() {
            Some(ct) => ct.to_string(),
            None => {
                outcome.errors.push(FileError {
                    filename,
                    error: "Missing content type".to_string(),
                });
                continue;
            }
        };

        let extension = match mime_to_safe_extension(&content_type) {
            Some(ext) => ext,
            None => {
                outcome.errors.push(FileError {
                    filename,
                    error: format!("Unsupported file type '{}'", content_type),
                });
                continue;
            }
        };

        let file_id = Uuid::new_v4().to_string();
        let dir1 = file_id[0..2].to_string();
        let dir2 = file_id[2..4].to_string();
        let stored_name = format!("{}.{}", file_id, extension);

        let dir_path = PathBuf::from(&config.media_path)
            .join(folder)
            .join(&dir1)
            .join(&dir2);
        let final_path = dir_path.join(&stored_name);

        let create_result = web::block({
            let dir_path = dir_path.clone();
            move || fs::create_dir_all(&dir_path)
        })
        .await?;
        if let Err(e) = create_result {
            outcome.errors.push(FileError {
                filename,
                error: format!("Could not prepare storage directory: {}", e),
            });
            continue;
        }

        let mut file = match web::block({
            let final_path = final_path.clone();
            move || fs::File::create(final_path)
        })
        .await?
        {
            Ok(f) => f,
            Err(e) => {
                outcome.errors.push(FileError {
                    filename,
                    error: format!("Could not create file: {}", e),
                });
                continue;
            }
        };

        let mut written: u64 = 0;
        let mut failed = false;
        while let Some(chunk) = field.next().await {
            let data = chunk?;
            written += data.len() as u64;
            if written > MAX_FILE_SIZE_MB * 1024 * 1024 {
                drop(file);
                let _ = fs::remove_file(&final_path);
                outcome.errors.push(FileError {
                    filename: filename.clone(),
                    error: format!("File exceeds the {}MB limit", MAX_FILE_SIZE_MB),
                });
                failed = true;
                break;
            }
            match web::block(move || file.write_all(&data).map(|_| file)).await? {
                Ok(f) => file = f,
                Err(e) => {
                    let _ = fs::remove_file(&final_path);
                    outcome.errors.push(FileError {
                        filename: filename.clone(),
                        error: format!("Write failed: {}", e),
                    });
                    failed = true;
                    break;
                }
            }
        }

        if !failed {
            outcome
                .urls
                .push(format!("/media/{}/{}/{}/{}", folder, dir1, dir2, stored_name));
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_image_and_video_types_map_to_extensions() {
        assert_eq!(mime_to_safe_extension("image/png"), Some("png"));
        assert_eq!(mime_to_safe_extension("video/mp4"), Some("mp4"));
        assert_eq!(mime_to_safe_extension("application/pdf"), None);
        assert_eq!(mime_to_safe_extension("text/html"), None);
    }
}
