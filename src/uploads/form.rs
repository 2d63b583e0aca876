use axum::body::Bytes;
use axum::extract::Multipart;
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::middleware::logging::ApiError;
use crate::uploads::image_set::ImageSet;
use crate::uploads::storage::FileExtension;

/// An accepted upload held in memory until the handler decides to keep it.
#[derive(Clone, Debug)]
pub struct PendingFile {
    pub file_name: String,
    pub data: Bytes,
}

#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    files: Vec<PendingFile>,
}

impl UploadForm {
    /// Reads the whole multipart body. Parts named `file_field` that carry a
    /// filename or content type are treated as files, everything else as text.
    pub async fn parse(
        multipart: &mut Multipart,
        file_field: &str,
        max_files: usize,
        size_limit: usize,
    ) -> Result<Self, ApiError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = clean_field_name(field.name().unwrap_or_default());
            let is_file = field.file_name().is_some() || field.content_type().is_some();

            if name == file_field && is_file {
                let content_type = field.content_type().unwrap_or_default().to_owned();
                let data = field.bytes().await?;
                // Browsers send an empty part when no file was picked.
                if data.is_empty() {
                    continue;
                }

                let extension = FileExtension::from_content_type(&content_type).ok_or_else(
                    || ApiError::BadRequest("Unsupported content type.".to_string()),
                )?;
                if data.len() > size_limit {
                    return Err(ApiError::PayloadTooLarge("Payload too large".to_string()));
                }
                if form.files.len() == max_files {
                    return Err(ApiError::BadRequest(format!(
                        "Too many files. At most {max_files} allowed."
                    )));
                }

                form.files.push(PendingFile {
                    file_name: format!("{}.{}", Uuid::new_v4(), extension),
                    data,
                });
            } else {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// Non-blank text value with surrounding quotes and whitespace removed.
    pub fn text(&self, key: &str) -> Option<String> {
        self.fields
            .get(key)
            .map(|value| strip_quotes(value))
            .filter(|value| !value.is_empty())
    }

    pub fn file_names(&self) -> Vec<String> {
        self.files.iter().map(|file| file.file_name.clone()).collect()
    }

    pub fn first_file(&self) -> Option<&PendingFile> {
        self.files.first()
    }

    /// Uploads that made it into `images`.
    pub fn kept_files<'a>(&'a self, images: &'a ImageSet) -> impl Iterator<Item = &'a PendingFile> {
        self.files
            .iter()
            .filter(move |file| images.contains(&file.file_name))
    }

    /// Echo of the listed text fields, `null` when absent.
    pub fn received(&self, keys: &[&str]) -> Value {
        let mut map = Map::new();
        for key in keys {
            map.insert(
                key.to_string(),
                self.text(key).map(Value::String).unwrap_or(Value::Null),
            );
        }
        Value::Object(map)
    }
}

/// The admin client sometimes sends keys wrapped in quotes (`"name"`).
pub fn clean_field_name(raw: &str) -> String {
    raw.replace('"', "").trim().to_string()
}

pub fn strip_quotes(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('"').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('"').unwrap_or(trimmed);
    trimmed.trim().to_string()
}
