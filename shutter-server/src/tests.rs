use std::{io::Cursor, sync::Arc};

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
};
use http_body_util::BodyExt;
use image::{DynamicImage, ImageOutputFormat};
use serde_json::Value;
use shutter_gallery::{
    AlbumRepository, Gallery, MemoryDatabase, MemoryMailer, MemoryStorage, NewUser,
    PhotoRepository, ProfileRepository, UserData, UserRepository, MAX_NAME_LENGTH,
};
use tower::ServiceExt;

use crate::{app, ServerConfig, ServerContext, Templates, SESSION_COOKIE};

const BOUNDARY: &str = "shutter-test-boundary";

struct TestApp {
    context: ServerContext,
    database: Arc<MemoryDatabase>,
    storage: Arc<MemoryStorage>,
    mailer: Arc<MemoryMailer>,
}

impl TestApp {
    fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    fn with_config(config: ServerConfig) -> Self {
        let database = Arc::new(MemoryDatabase::new());
        let storage = Arc::new(MemoryStorage::new(&config.media_url));
        let mailer = Arc::new(MemoryMailer::new());

        let gallery = Gallery::new(
            database.clone(),
            storage.clone(),
            mailer.clone(),
            config.contact_recipients.clone(),
        );

        let context = ServerContext {
            gallery: Arc::new(gallery),
            templates: Arc::new(Templates::new().unwrap()),
            config: Arc::new(config),
        };

        Self {
            context,
            database,
            storage,
            mailer,
        }
    }

    /// Creates a user and returns it with a cookie header for a fresh session
    async fn user(&self, username: &str) -> (UserData, String) {
        let (user, _) = self
            .database
            .create_user_with_profile(NewUser {
                username: username.to_string(),
                password: "not-a-hash".to_string(),
            })
            .await
            .unwrap();

        let session = self.context.gallery.auth.begin_session(&user).await.unwrap();

        (user, format!("{}={}", SESSION_COOKIE, session.token))
    }

    async fn send(&self, request: Request<Body>) -> Response {
        app(self.context.clone()).oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str, cookie: &str) -> Response {
        let request = Request::builder()
            .uri(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();

        self.send(request).await
    }

    async fn post_form(&self, uri: &str, cookie: &str, body: &str) -> Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::COOKIE, cookie)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();

        self.send(request).await
    }

    async fn post_empty(&self, uri: &str, cookie: &str) -> Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();

        self.send(request).await
    }

    async fn post_multipart(&self, uri: &str, cookie: &str, body: Vec<u8>) -> Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::COOKIE, cookie)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();

        self.send(request).await
    }
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, Vec<u8>),
}

fn multipart(parts: Vec<Part>) -> Vec<u8> {
    let mut body = Vec::new();

    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());

        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, file_name, contents) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                        name, file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(&contents);
            }
        }

        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn png() -> Vec<u8> {
    let mut bytes = Vec::new();

    DynamicImage::new_rgb8(2, 2)
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .unwrap();

    bytes
}

fn location(response: &Response) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

async fn text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn json(response: Response) -> Value {
    serde_json::from_str(&text(response).await).unwrap()
}

#[tokio::test]
async fn creating_an_album_redirects_to_it() {
    let app = TestApp::new();
    let (alice, cookie) = app.user("alice").await;

    let response = app.post_form("/", &cookie, "album=Trip").await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/photos/1/");

    let album = app.database.album_by_id(1).await.unwrap();
    assert_eq!(album.name, "Trip");
    assert_eq!(album.owner_id, alice.id);
    assert_eq!(app.database.count_photos_by_album(1).await.unwrap(), 0);
}

#[tokio::test]
async fn gallery_routes_require_login() {
    let app = TestApp::new();
    let (alice, _) = app.user("alice").await;
    let album = app
        .context
        .gallery
        .albums
        .create_album(alice.id, "Trip")
        .await
        .unwrap();

    let id = album.id;
    let routes = [
        (Method::GET, "/".to_string()),
        (Method::POST, "/".to_string()),
        (Method::GET, format!("/photos/{id}/")),
        (Method::POST, format!("/photos/{id}/")),
        (Method::POST, format!("/update/{id}/")),
        (Method::GET, format!("/delete_album/{id}/")),
        (Method::POST, format!("/delete/{id}/")),
        (Method::GET, "/profile/".to_string()),
        (Method::POST, "/profile/".to_string()),
        (Method::GET, "/contact/".to_string()),
        (Method::POST, "/contact/".to_string()),
    ];

    let unknown_session = format!("{}=made-up", SESSION_COOKIE);

    for cookie in ["", unknown_session.as_str()] {
        for (method, uri) in &routes {
            let request = Request::builder()
                .method(method.clone())
                .uri(uri)
                .header(header::COOKIE, cookie)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(
                    "album=Mine&first_name=A&last_name=B&email=a%40b.c&subject=S&message=M",
                ))
                .unwrap();

            let response = app.send(request).await;

            assert_eq!(response.status(), StatusCode::FOUND, "{method} {uri}");
            assert_eq!(
                location(&response),
                format!("/accounts/login/?next={uri}"),
                "{method} {uri}"
            );
        }
    }

    assert_eq!(app.database.album_by_id(id).await.unwrap().name, "Trip");
    assert_eq!(app.database.list_albums_by_owner(alice.id).await.unwrap().len(), 1);
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn bodies_that_are_not_forms_fail_validation() {
    let app = TestApp::new();
    let (alice, cookie) = app.user("alice").await;

    let response = app.post_empty("/", &cookie).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("This field is required."));
    assert!(app
        .database
        .list_albums_by_owner(alice.id)
        .await
        .unwrap()
        .is_empty());

    let album = app
        .context
        .gallery
        .albums
        .create_album(alice.id, "Trip")
        .await
        .unwrap();

    let response = app.post_empty(&format!("/update/{}/", album.id), &cookie).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("This field is required."));
    assert_eq!(app.database.album_by_id(album.id).await.unwrap().name, "Trip");

    let response = app.post_empty("/contact/", &cookie).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("This field is required."));
    assert!(app.mailer.sent().is_empty());

    let response = app.post_empty("/profile/", &cookie).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("This field is required."));
}

#[tokio::test]
async fn listing_shows_only_own_albums_with_one_cover() {
    let app = TestApp::new();
    let (alice, alice_cookie) = app.user("alice").await;
    let (bob, _) = app.user("bob").await;
    let albums = &app.context.gallery.albums;

    let trip = albums.create_album(alice.id, "Trip").await.unwrap();
    albums.create_album(bob.id, "Bob's secret album").await.unwrap();

    for name in ["old.png", "new.png"] {
        let upload = shutter_gallery::Upload {
            file_name: name.to_string(),
            content_type: None,
            contents: png(),
        };
        albums.upload_photo(&trip, upload).await.unwrap();
    }

    let response = app.get("/", &alice_cookie).await;
    assert_eq!(response.status(), StatusCode::OK);

    let html = text(response).await;
    assert!(html.contains("Trip"));
    assert!(!html.contains("Bob&#x27;s secret album"));
    assert!(!html.contains("Bob's secret album"));
    assert!(html.contains("new.png"));
    assert!(!html.contains("old.png"));
}

#[tokio::test]
async fn blank_album_name_rerenders_the_listing() {
    let app = TestApp::new();
    let (alice, cookie) = app.user("alice").await;

    let response = app.post_form("/", &cookie, "album=+++").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("This field is required."));
    assert!(app
        .database
        .list_albums_by_owner(alice.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn album_page_links_to_deletion() {
    let app = TestApp::new();
    let (alice, cookie) = app.user("alice").await;
    let album = app
        .context
        .gallery
        .albums
        .create_album(alice.id, "Trip")
        .await
        .unwrap();

    let response = app.get(&format!("/photos/{}/", album.id), &cookie).await;
    assert_eq!(response.status(), StatusCode::OK);

    let html = text(response).await;
    assert!(html.contains(&format!("/delete_album/{}/", album.id)));
    assert!(html.contains("id=\"fileupload\""));

    let response = app.get("/photos/999/", &cookie).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn uploads_report_whether_they_were_images() {
    let app = TestApp::new();
    let (alice, cookie) = app.user("alice").await;
    let album = app
        .context
        .gallery
        .albums
        .create_album(alice.id, "Trip")
        .await
        .unwrap();
    let uri = format!("/photos/{}/", album.id);

    let response = app
        .post_multipart(&uri, &cookie, multipart(vec![Part::File("image", "beach.png", png())]))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let result = json(response).await;
    assert_eq!(result["is_valid"], true);
    assert_eq!(result["url"], "/media/beach.png");
    assert_eq!(app.database.count_photos_by_album(album.id).await.unwrap(), 1);

    let response = app
        .post_multipart(
            &uri,
            &cookie,
            multipart(vec![Part::File("image", "notes.txt", b"file_content".to_vec())]),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let result = json(response).await;
    assert_eq!(result, serde_json::json!({ "is_valid": false }));
    assert_eq!(app.database.count_photos_by_album(album.id).await.unwrap(), 1);
    assert_eq!(app.storage.len(), 1);
}

#[tokio::test]
async fn uploads_that_are_not_multipart_are_rejected() {
    let app = TestApp::new();
    let (alice, cookie) = app.user("alice").await;
    let album = app
        .context
        .gallery
        .albums
        .create_album(alice.id, "Trip")
        .await
        .unwrap();
    let uri = format!("/photos/{}/", album.id);

    let response = app.post_form(&uri, &cookie, "image=x").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await, serde_json::json!({ "is_valid": false }));

    let response = app
        .post_multipart(&uri, &cookie, multipart(vec![Part::Text("title", "beach")]))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await, serde_json::json!({ "is_valid": false }));

    assert_eq!(app.database.count_photos_by_album(album.id).await.unwrap(), 0);
    assert!(app.storage.is_empty());
}

#[tokio::test]
async fn uploads_with_long_file_names_are_stored() {
    let app = TestApp::new();
    let (alice, cookie) = app.user("alice").await;
    let album = app
        .context
        .gallery
        .albums
        .create_album(alice.id, "Trip")
        .await
        .unwrap();
    let uri = format!("/photos/{}/", album.id);
    let file_name = format!("{}.png", "a".repeat(300));

    for _ in 0..2 {
        let response = app
            .post_multipart(&uri, &cookie, multipart(vec![Part::File("image", &file_name, png())]))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["is_valid"], true);
    }

    let photos = app.database.list_photos_by_album(album.id).await.unwrap();
    assert_eq!(photos.len(), 2);

    for photo in &photos {
        assert!(photo.image.len() <= MAX_NAME_LENGTH);
        assert!(photo.image.ends_with(".png"));
        assert!(app.storage.contains(&photo.image));
    }
}

#[tokio::test]
async fn renaming_redirects_or_shows_errors() {
    let app = TestApp::new();
    let (alice, cookie) = app.user("alice").await;
    let album = app
        .context
        .gallery
        .albums
        .create_album(alice.id, "Trip")
        .await
        .unwrap();
    let uri = format!("/update/{}/", album.id);

    let response = app.post_form(&uri, &cookie, "album=Road+trip").await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), format!("/photos/{}/", album.id));
    assert_eq!(
        app.database.album_by_id(album.id).await.unwrap().name,
        "Road trip"
    );

    let response = app.post_form(&uri, &cookie, "album=").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("This field is required."));
    assert_eq!(
        app.database.album_by_id(album.id).await.unwrap().name,
        "Road trip"
    );
}

#[tokio::test]
async fn deleting_removes_the_album_and_its_photos() {
    let app = TestApp::new();
    let (alice, cookie) = app.user("alice").await;
    let albums = &app.context.gallery.albums;
    let album = albums.create_album(alice.id, "Trip").await.unwrap();

    for name in ["a.png", "b.png"] {
        let upload = shutter_gallery::Upload {
            file_name: name.to_string(),
            content_type: None,
            contents: png(),
        };
        albums.upload_photo(&album, upload).await.unwrap();
    }

    let response = app
        .get(&format!("/delete_album/{}/", album.id), &cookie)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let html = text(response).await;
    assert!(html.contains(&format!("action=\"/delete/{}/\"", album.id)));
    assert!(html.contains(&format!("/photos/{}/", album.id)));

    let response = app
        .post_form(&format!("/delete/{}/", album.id), &cookie, "")
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");

    assert!(app.database.album_by_id(album.id).await.unwrap_err().is_not_found());
    assert!(app
        .database
        .list_photos_by_album(album.id)
        .await
        .unwrap()
        .is_empty());
    assert!(app.storage.is_empty());
}

#[tokio::test]
async fn rename_and_delete_only_accept_post() {
    let app = TestApp::new();
    let (alice, cookie) = app.user("alice").await;
    let album = app
        .context
        .gallery
        .albums
        .create_album(alice.id, "Trip")
        .await
        .unwrap();

    let response = app.get(&format!("/update/{}/", album.id), &cookie).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let response = app.get(&format!("/delete/{}/", album.id), &cookie).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    assert!(app.database.album_by_id(album.id).await.is_ok());
}

#[tokio::test]
async fn other_users_albums_are_not_found() {
    let app = TestApp::new();
    let (alice, _) = app.user("alice").await;
    let (_, bob_cookie) = app.user("bob").await;
    let album = app
        .context
        .gallery
        .albums
        .create_album(alice.id, "Trip")
        .await
        .unwrap();

    let view = app.get(&format!("/photos/{}/", album.id), &bob_cookie).await;
    assert_eq!(view.status(), StatusCode::NOT_FOUND);

    let rename = app
        .post_form(&format!("/update/{}/", album.id), &bob_cookie, "album=Mine")
        .await;
    assert_eq!(rename.status(), StatusCode::NOT_FOUND);

    let delete = app
        .post_form(&format!("/delete/{}/", album.id), &bob_cookie, "")
        .await;
    assert_eq!(delete.status(), StatusCode::NOT_FOUND);

    assert_eq!(app.database.album_by_id(album.id).await.unwrap().name, "Trip");
}

#[tokio::test]
async fn profile_shows_and_updates_details() {
    let app = TestApp::new();
    let (alice, cookie) = app.user("alice").await;

    let response = app.get("/profile/", &cookie).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("default_user.png"));

    let body = multipart(vec![
        Part::Text("first_name", "Alice"),
        Part::Text("last_name", "Liddell"),
        Part::Text("phone", "5551234"),
        Part::File("image", "", vec![]),
    ]);

    let response = app.post_multipart("/profile/", &cookie, body).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/profile/");

    let profile = app.database.profile_by_user(alice.id).await.unwrap();
    assert_eq!(profile.full_name(), "Alice Liddell");
    assert_eq!(profile.phone, Some(5551234));
    assert_eq!(profile.image, "profiles/default_user.png");
}

#[tokio::test]
async fn invalid_profile_input_is_reported() {
    let app = TestApp::new();
    let (alice, cookie) = app.user("alice").await;

    let body = multipart(vec![
        Part::Text("first_name", "Alice"),
        Part::Text("last_name", ""),
        Part::Text("phone", "call me"),
    ]);

    let response = app.post_multipart("/profile/", &cookie, body).await;
    assert_eq!(response.status(), StatusCode::OK);

    let html = text(response).await;
    assert!(html.contains("This field is required."));
    assert!(html.contains("Enter a whole number."));

    let body = multipart(vec![
        Part::Text("first_name", "Alice"),
        Part::Text("last_name", "Liddell"),
        Part::File("image", "me.png", b"not an image".to_vec()),
    ]);

    let response = app.post_multipart("/profile/", &cookie, body).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("Upload a valid image."));

    let profile = app.database.profile_by_user(alice.id).await.unwrap();
    assert_eq!(profile.first_name, "");
}

#[tokio::test]
async fn contact_sends_mail_and_flashes_a_notice() {
    let config = ServerConfig {
        contact_recipients: vec!["owner@example.com".to_string()],
        ..Default::default()
    };
    let app = TestApp::with_config(config);
    let (_, cookie) = app.user("alice").await;

    let response = app
        .post_form(
            "/contact/",
            &cookie,
            "first_name=Alice&last_name=Liddell&email=alice%40example.com&subject=Hello&message=Lovely+gallery",
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/contact/");

    let flash = set_cookies(&response)
        .into_iter()
        .find(|c| c.starts_with("shutter_flash="))
        .unwrap();
    let flash = flash.split(';').next().unwrap().to_string();

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Hello");
    assert_eq!(sent[0].from, "alice@example.com");
    assert_eq!(sent[0].body, "Alice Liddell\n Lovely gallery");
    assert_eq!(sent[0].recipients, vec!["owner@example.com".to_string()]);

    let response = app
        .get("/contact/", &format!("{}; {}", cookie, flash))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("Message sent successfully!"));
}

#[tokio::test]
async fn invalid_contact_message_sends_nothing() {
    let app = TestApp::new();
    let (_, cookie) = app.user("alice").await;

    let response = app
        .post_form("/contact/", &cookie, "first_name=Alice&email=nope")
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("Enter a valid email address."));
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn signup_login_and_logout() {
    let app = TestApp::new();

    let response = app
        .post_form(
            "/accounts/signup/",
            "",
            "username=alice&password=correct+horse&password_confirmation=correct+horse",
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
    assert!(set_cookies(&response)
        .iter()
        .any(|c| c.starts_with("shutter_session=") && c.contains("HttpOnly")));

    let user = app.database.user_by_username("alice").await.unwrap();
    assert!(app.database.profile_by_user(user.id).await.is_ok());

    let response = app
        .post_form(
            "/accounts/signup/",
            "",
            "username=alice&password=another+one&password_confirmation=another+one",
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("already exists"));

    let response = app
        .post_form(
            "/accounts/login/",
            "",
            "username=alice&password=wrong+password",
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .post_form(
            "/accounts/login/",
            "",
            "username=alice&password=correct+horse&next=%2Fprofile%2F",
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/profile/");

    let session = set_cookies(&response)
        .into_iter()
        .find(|c| c.starts_with("shutter_session="))
        .unwrap();
    let session = session.split(';').next().unwrap().to_string();

    assert_eq!(app.get("/profile/", &session).await.status(), StatusCode::OK);

    let response = app.post_form("/accounts/logout/", &session, "").await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/accounts/login/");

    assert_eq!(app.get("/profile/", &session).await.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn login_page_keeps_next() {
    let app = TestApp::new();

    let response = app.get("/accounts/login/?next=/profile/", "").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("value=\"&#x2F;profile&#x2F;\""));
}
