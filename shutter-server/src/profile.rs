use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use shutter_gallery::{GalleryError, ProfileData, ProfileUpdate, StorageError};

use crate::{
    auth::{redirect, Session},
    errors::ServerResult,
    schemas::{validate, FormErrors, MultipartForm, ProfileForm, INVALID_IMAGE},
    serialized::{Photo, Profile, ToSerialized},
    Router, ServerContext,
};

#[derive(Debug, Serialize)]
struct ProfilePage<'a> {
    username: &'a str,
    profile: Profile,
    photos: Vec<Photo>,
    form: ProfileForm,
    errors: FormErrors,
}

impl From<&ProfileData> for ProfileForm {
    fn from(profile: &ProfileData) -> Self {
        Self {
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            phone: profile.phone.map(|p| p.to_string()).unwrap_or_default(),
        }
    }
}

async fn render_profile(
    context: &ServerContext,
    session: &Session,
    form: Option<ProfileForm>,
    errors: FormErrors,
) -> ServerResult<Html<String>> {
    let gallery = &context.gallery;
    let user_id = session.user().id;

    let profile = gallery.profiles.profile(user_id).await?;
    let photos = gallery.profiles.recent_photos(user_id).await?;

    context.templates.render(
        "profile.html",
        &ProfilePage {
            username: &session.user().username,
            form: form.unwrap_or_else(|| ProfileForm::from(&profile)),
            profile: profile.to_serialized(gallery.storage()),
            photos: photos.to_serialized(gallery.storage()),
            errors,
        },
    )
}

async fn profile(session: Session, State(context): State<ServerContext>) -> ServerResult<Html<String>> {
    render_profile(&context, &session, None, FormErrors::default()).await
}

async fn update_profile(
    session: Session,
    State(context): State<ServerContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ServerResult<Response> {
    let mut multipart = match multipart {
        Ok(multipart) => MultipartForm::read(multipart).await?,
        Err(_) => MultipartForm::default(),
    };
    let form = ProfileForm::from_multipart(&multipart);

    if let Err(errors) = validate(&form) {
        return Ok(render_profile(&context, &session, Some(form), errors)
            .await?
            .into_response());
    }

    let update = ProfileUpdate {
        first_name: form.first_name.clone(),
        last_name: form.last_name.clone(),
        phone: form.phone(),
        image: multipart.take_file("image"),
    };

    let result = context
        .gallery
        .profiles
        .update_profile(session.user().id, update)
        .await;

    match result {
        Ok(_) => Ok(redirect("/profile/")),
        Err(GalleryError::Storage(StorageError::InvalidImage)) => {
            let errors = FormErrors::single("image", INVALID_IMAGE);

            Ok(render_profile(&context, &session, Some(form), errors)
                .await?
                .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

pub fn router() -> Router {
    Router::new().route("/profile/", get(profile).post(update_profile))
}
