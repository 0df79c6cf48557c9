//! Admin save forms for content records.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::{ImagePolicy, RecordSchema};
use crate::db::{FieldValue, WriteFields};
use crate::images::{ImageReference, UploadPayload};

/// Body of a create or update request.
///
/// Schema fields sit at the top level next to `image` (the existing reference) and
/// `imageFile` (a newly selected file).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordForm {
    #[serde(default)]
    pub image: Option<ImageReference>,
    #[serde(default)]
    pub image_file: Option<UploadPayload>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RecordForm {
    /// Check required fields and field types. Runs before any store or storage call.
    pub fn validate(&self, schema: &RecordSchema, is_edit: bool) -> Result<(), String> {
        for &field in schema.required {
            match self.fields.get(field) {
                Some(Value::String(s)) if !s.trim().is_empty() => {}
                // A partial edit may leave the field untouched
                None if is_edit => {}
                _ => return Err(format!("{} is required", field)),
            }
        }

        for (key, value) in &self.fields {
            if schema.fields.contains(&key.as_str())
                && !matches!(value, Value::String(_) | Value::Number(_) | Value::Null)
            {
                return Err(format!("{} must be text", key));
            }
        }

        Ok(())
    }

    /// Enforce the image policy given the reference the save would otherwise keep.
    pub fn check_image(
        &self,
        policy: &ImagePolicy,
        is_edit: bool,
        existing: &ImageReference,
    ) -> Result<(), String> {
        if policy.requires_image(is_edit) && self.image_file.is_none() && existing.is_empty() {
            return Err("An image is required".to_string());
        }
        Ok(())
    }

    /// Build the store write: schema fields, the resolved image, and timestamps.
    ///
    /// Fields outside the schema are dropped.
    pub fn into_write(
        self,
        schema: &RecordSchema,
        image: ImageReference,
        is_create: bool,
    ) -> WriteFields {
        let mut write = WriteFields::new();

        for (key, value) in self.fields {
            if !schema.fields.contains(&key.as_str()) {
                tracing::warn!("Ignoring unknown field {:?} for {}", key, schema.collection);
                continue;
            }
            let value = match value {
                Value::String(s) => Value::String(s.trim().to_string()),
                Value::Null => Value::String(String::new()),
                other => other,
            };
            write.insert(key, FieldValue::Value(value));
        }

        write.insert("image".to_string(), image.into_string().into());
        write.insert("updatedAt".to_string(), FieldValue::ServerTimestamp);
        if is_create {
            write.insert("createdAt".to_string(), FieldValue::ServerTimestamp);
        }

        write
    }
}
