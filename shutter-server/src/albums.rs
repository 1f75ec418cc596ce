use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::FormRejection,
        Multipart, Path, State,
    },
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json,
};
use log::{debug, info};
use serde::Serialize;
use shutter_gallery::{AlbumData, AlbumId, GalleryError, StorageError};

use crate::{
    auth::{redirect, Session},
    errors::{ServerError, ServerResult},
    schemas::{submitted, validate, AlbumForm, FormErrors, MultipartForm},
    serialized::{Album, Photo, ToSerialized, UploadResult},
    Router, ServerContext,
};

#[derive(Debug, Serialize)]
struct IndexPage<'a> {
    username: &'a str,
    albums: Vec<Album>,
    form: AlbumForm,
    errors: FormErrors,
}

#[derive(Debug, Serialize)]
struct AlbumPage<'a> {
    username: &'a str,
    album: Album,
    photos: Vec<Photo>,
    album_form: AlbumForm,
    errors: FormErrors,
}

#[derive(Debug, Serialize)]
struct DeleteAlbumPage<'a> {
    username: &'a str,
    album: Album,
}

async fn render_index(
    context: &ServerContext,
    session: &Session,
    form: AlbumForm,
    errors: FormErrors,
) -> ServerResult<Html<String>> {
    let gallery = &context.gallery;
    let albums = gallery.albums.list_for_owner(session.user().id).await?;

    context.templates.render(
        "index.html",
        &IndexPage {
            username: &session.user().username,
            albums: albums.to_serialized(gallery.storage()),
            form,
            errors,
        },
    )
}

async fn render_album(
    context: &ServerContext,
    session: &Session,
    album: &AlbumData,
    album_form: AlbumForm,
    errors: FormErrors,
) -> ServerResult<Html<String>> {
    let gallery = &context.gallery;
    let photos = gallery.albums.photos(album).await?;

    context.templates.render(
        "single.html",
        &AlbumPage {
            username: &session.user().username,
            album: album.to_serialized(gallery.storage()),
            photos: photos.to_serialized(gallery.storage()),
            album_form,
            errors,
        },
    )
}

async fn index(session: Session, State(context): State<ServerContext>) -> ServerResult<Html<String>> {
    render_index(&context, &session, AlbumForm::default(), FormErrors::default()).await
}

async fn create_album(
    session: Session,
    State(context): State<ServerContext>,
    form: Result<Form<AlbumForm>, FormRejection>,
) -> ServerResult<Response> {
    let form = submitted(form);
    if let Err(errors) = validate(&form) {
        return Ok(render_index(&context, &session, form, errors)
            .await?
            .into_response());
    }

    let album = context
        .gallery
        .albums
        .create_album(session.user().id, &form.album)
        .await?;

    Ok(redirect(&format!("/photos/{}/", album.id)))
}

async fn album(
    session: Session,
    State(context): State<ServerContext>,
    Path(album_id): Path<AlbumId>,
) -> ServerResult<Html<String>> {
    let album = context
        .gallery
        .albums
        .album_for_owner(album_id, session.user().id)
        .await?;

    render_album(&context, &session, &album, AlbumForm::default(), FormErrors::default()).await
}

async fn upload_photo(
    session: Session,
    State(context): State<ServerContext>,
    Path(album_id): Path<AlbumId>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ServerResult<Json<UploadResult>> {
    let albums = &context.gallery.albums;
    let album = albums.album_for_owner(album_id, session.user().id).await?;

    let rejected = Json(UploadResult {
        is_valid: false,
        url: None,
    });

    let form = match multipart {
        Ok(multipart) => MultipartForm::read(multipart).await,
        Err(rejection) => Err(ServerError::BadRequest(rejection.body_text())),
    };

    let upload = match form {
        Ok(mut form) => form.take_file("image"),
        Err(e) => {
            debug!("Unreadable upload to album {}: {}", album.id, e);
            None
        }
    };

    let Some(upload) = upload else {
        return Ok(rejected);
    };

    match albums.upload_photo(&album, upload).await {
        Ok(photo) => Ok(Json(UploadResult {
            is_valid: true,
            url: Some(albums.photo_url(&photo)),
        })),
        Err(GalleryError::Storage(StorageError::InvalidImage)) => {
            info!("Rejected upload to album {} that is not an image", album.id);
            Ok(rejected)
        }
        Err(e) => Err(e.into()),
    }
}

async fn rename_album(
    session: Session,
    State(context): State<ServerContext>,
    Path(album_id): Path<AlbumId>,
    form: Result<Form<AlbumForm>, FormRejection>,
) -> ServerResult<Response> {
    let form = submitted(form);
    let albums = &context.gallery.albums;
    let album = albums.album_for_owner(album_id, session.user().id).await?;

    if let Err(errors) = validate(&form) {
        return Ok(render_album(&context, &session, &album, form, errors)
            .await?
            .into_response());
    }

    albums
        .rename_album(album.id, session.user().id, &form.album)
        .await?;

    Ok(redirect(&format!("/photos/{}/", album.id)))
}

async fn confirm_delete(
    session: Session,
    State(context): State<ServerContext>,
    Path(album_id): Path<AlbumId>,
) -> ServerResult<Html<String>> {
    let gallery = &context.gallery;
    let album = gallery
        .albums
        .album_for_owner(album_id, session.user().id)
        .await?;

    context.templates.render(
        "delete_album.html",
        &DeleteAlbumPage {
            username: &session.user().username,
            album: album.to_serialized(gallery.storage()),
        },
    )
}

async fn delete_album(
    session: Session,
    State(context): State<ServerContext>,
    Path(album_id): Path<AlbumId>,
) -> ServerResult<Response> {
    context
        .gallery
        .albums
        .delete_album(album_id, session.user().id)
        .await?;

    Ok(redirect("/"))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(index).post(create_album))
        .route("/photos/:id/", get(album).post(upload_photo))
        .route("/update/:id/", post(rename_album))
        .route("/delete_album/:id/", get(confirm_delete))
        .route("/delete/:id/", post(delete_album))
}
