//! Form schemas accepted by the routes, and the errors shown back to the user

use std::{
    borrow::Cow,
    collections::{BTreeMap, HashMap},
};

use axum::{
    extract::{rejection::FormRejection, Multipart},
    Form,
};
use serde::{Deserialize, Deserializer, Serialize};
use shutter_gallery::Upload;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::errors::{ServerError, ServerResult};

const REQUIRED: &str = "This field is required.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

#[derive(Debug, Default, Clone, Validate, Deserialize, Serialize)]
#[serde(default)]
pub struct AlbumForm {
    #[serde(deserialize_with = "trimmed")]
    #[validate(custom(function = "required"), length(max = 255, message = "Ensure this value has at most 255 characters."))]
    pub album: String,
}

#[derive(Debug, Default, Clone, Validate, Deserialize, Serialize)]
#[serde(default)]
pub struct ProfileForm {
    #[validate(custom(function = "required"), length(max = 255, message = "Ensure this value has at most 255 characters."))]
    pub first_name: String,
    #[validate(custom(function = "required"), length(max = 255, message = "Ensure this value has at most 255 characters."))]
    pub last_name: String,
    #[validate(custom(function = "phone_number"))]
    pub phone: String,
}

impl ProfileForm {
    /// Reads the text fields of a multipart profile submission
    pub fn from_multipart(form: &MultipartForm) -> Self {
        Self {
            first_name: form.text("first_name"),
            last_name: form.text("last_name"),
            phone: form.text("phone"),
        }
    }

    /// The phone as a number, [None] when left blank
    pub fn phone(&self) -> Option<i64> {
        self.phone.parse().ok()
    }
}

#[derive(Debug, Default, Clone, Validate, Deserialize, Serialize)]
#[serde(default)]
pub struct ContactForm {
    #[serde(deserialize_with = "trimmed")]
    #[validate(custom(function = "required"), length(max = 255, message = "Ensure this value has at most 255 characters."))]
    pub first_name: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(custom(function = "required"), length(max = 255, message = "Ensure this value has at most 255 characters."))]
    pub last_name: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 255, message = "Ensure this value has at most 255 characters.")
    )]
    pub email: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(custom(function = "required"), length(max = 255, message = "Ensure this value has at most 255 characters."))]
    pub subject: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(custom(function = "required"), length(max = 255, message = "Ensure this value has at most 255 characters."))]
    pub message: String,
}

#[derive(Debug, Default, Validate, Deserialize)]
#[serde(default)]
pub struct LoginSchema {
    #[serde(deserialize_with = "trimmed")]
    #[validate(custom(function = "required"), length(max = 128))]
    pub username: String,
    #[validate(custom(function = "required"), length(max = 64))]
    pub password: String,
    pub next: Option<String>,
}

#[derive(Debug, Default, Validate, Deserialize)]
#[serde(default)]
pub struct RegisterSchema {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(
        min = 2,
        max = 128,
        message = "Usernames are between 2 and 128 characters long."
    ))]
    pub username: String,
    #[validate(length(
        min = 8,
        max = 64,
        message = "Passwords are between 8 and 64 characters long."
    ))]
    pub password: String,
    #[validate(must_match(other = "password", message = "The two password fields didn't match."))]
    pub password_confirmation: String,
}

fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(|value| value.trim().to_string())
}

fn required(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("required");
        error.message = Some(Cow::from(REQUIRED));

        return Err(error);
    }

    Ok(())
}

fn phone_number(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || value.parse::<i64>().is_ok() {
        return Ok(());
    }

    let mut error = ValidationError::new("phone");
    error.message = Some(Cow::from("Enter a whole number."));

    Err(error)
}

/// Field errors keyed by field name, as rendered next to the inputs.
/// Errors that belong to no field are stored under `__all__`.
#[derive(Debug, Default, Clone, Serialize)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub const NON_FIELD: &'static str = "__all__";

    pub fn single(field: &str, message: &str) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);

        errors
    }

    pub fn add(&mut self, field: &str, message: &str) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn field(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(value: ValidationErrors) -> Self {
        let mut errors = Self::default();

        for (field, field_errors) in value.field_errors() {
            for error in field_errors {
                let message = match (&error.message, error.code.as_ref()) {
                    (Some(message), _) => message.to_string(),
                    (None, "length") => "Ensure this value has a valid length.".to_string(),
                    (None, code) => format!("Invalid value ({})", code),
                };

                errors.add(&field, &message);
            }
        }

        errors
    }
}

/// Validates the schema, converting failures into [FormErrors]
pub fn validate<T: Validate>(schema: &T) -> Result<(), FormErrors> {
    schema.validate().map_err(FormErrors::from)
}

/// The submitted form. A body that isn't a form is read as an empty one, so it fails validation.
pub fn submitted<T: Default>(form: Result<Form<T>, FormRejection>) -> T {
    form.map(|Form(form)| form).unwrap_or_default()
}

/// A fully read multipart body. Text parts become fields and file parts become uploads.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Upload>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> ServerResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServerError::BadRequest(e.body_text()))?
        {
            let Some(name) = field.name().map(String::from) else {
                continue;
            };

            let file_name = field.file_name().map(String::from);
            let content_type = field.content_type().map(String::from);

            let contents = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(e.body_text()))?;

            match file_name {
                // Browsers send an empty part when no file was picked
                Some(file_name) if file_name.is_empty() && contents.is_empty() => {}
                Some(file_name) => {
                    form.files.insert(
                        name,
                        Upload {
                            file_name,
                            content_type,
                            contents: contents.to_vec(),
                        },
                    );
                }
                None => {
                    form.fields
                        .insert(name, String::from_utf8_lossy(&contents).into_owned());
                }
            }
        }

        Ok(form)
    }

    /// A trimmed text field, empty when missing
    pub fn text(&self, name: &str) -> String {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }

    pub fn take_file(&mut self, name: &str) -> Option<Upload> {
        self.files.remove(name)
    }
}
