//! Multipart bodies of the profile and group update endpoints.

use crate::core::AppError;
use crate::services::Upload;
use axum::extract::Multipart;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Text fields plus at most one file.
#[derive(Debug, Default)]
pub struct UpdateForm {
    pub fields: HashMap<String, String>,
    pub file: Option<Upload>,
}

impl UpdateForm {
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }
}

/// Reads every part. Only `file_field` may carry a file; unknown parts are skipped.
pub async fn read_update_form(
    mut multipart: Multipart,
    text_fields: &[&str],
    file_field: &str,
) -> Result<UpdateForm, AppError> {
    let mut form = UpdateForm::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == file_field {
            let content_type = field
                .content_type()
                .map(str::to_string)
                .unwrap_or_default();
            let file_name = field.file_name().map(str::to_string);
            let bytes = field.bytes().await?;
            if bytes.is_empty() {
                debug!("Empty file part ignored");
                continue;
            }
            form.file = Some(Upload {
                bytes: bytes.to_vec(),
                content_type,
                file_name,
            });
        } else if text_fields.contains(&name.as_str()) {
            let value = field.text().await?;
            form.fields.insert(name, value);
        } else {
            warn!(field = %name, "Unexpected form field skipped");
        }
    }
    Ok(form)
}
