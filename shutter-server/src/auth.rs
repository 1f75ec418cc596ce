use axum::{
    async_trait,
    extract::{rejection::FormRejection, FromRequestParts, Query, State},
    http::{header, request::Parts, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use shutter_gallery::{AuthError, Credentials, NewPlainUser, SessionData, UserData};
use url::form_urlencoded;

use crate::{
    errors::{ServerError, ServerResult},
    schemas::{submitted, validate, FormErrors, LoginSchema, RegisterSchema},
    Router, ServerContext,
};

pub const SESSION_COOKIE: &str = "shutter_session";
pub const LOGIN_PATH: &str = "/accounts/login/";

/// Wraps [SessionData] so [FromRequestParts] can be implemented for it.
/// Requests without a valid session are redirected to the login page.
pub struct Session(SessionData);

impl Session {
    /// Returns the user of the session
    pub fn user(&self) -> &UserData {
        &self.0.user
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for Session {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);

        let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) else {
            return Err(login_redirect(&parts.uri));
        };

        match state.gallery.auth.session(&token).await {
            Ok(session) => Ok(Self(session)),
            Err(e) if e.is_not_found() => Err(login_redirect(&parts.uri)),
            Err(e) => Err(ServerError::from(e).into_response()),
        }
    }
}

/// A `302 Found` pointing at `location`
pub fn redirect(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn login_redirect(uri: &Uri) -> Response {
    let next = uri
        .path_and_query()
        .map(|p| p.as_str())
        .unwrap_or_else(|| uri.path());

    let encoded: String = form_urlencoded::byte_serialize(next.as_bytes()).collect();
    redirect(&format!("{}?next={}", LOGIN_PATH, encoded.replace("%2F", "/")))
}

/// Only paths on this site are followed after login
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => "/",
    }
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

#[derive(Debug, Default, Serialize)]
struct AccountPage<'a> {
    username: &'a str,
    next: &'a str,
    errors: FormErrors,
}

#[derive(Debug, Deserialize)]
struct NextQuery {
    next: Option<String>,
}

async fn login_page(
    State(context): State<ServerContext>,
    Query(query): Query<NextQuery>,
) -> ServerResult<Html<String>> {
    context.templates.render(
        "login.html",
        &AccountPage {
            next: query.next.as_deref().unwrap_or_default(),
            ..Default::default()
        },
    )
}

async fn login(
    State(context): State<ServerContext>,
    jar: CookieJar,
    body: Result<Form<LoginSchema>, FormRejection>,
) -> ServerResult<Response> {
    let body = submitted(body);
    let rerender = |errors: FormErrors| {
        context.templates.render(
            "login.html",
            &AccountPage {
                username: &body.username,
                next: body.next.as_deref().unwrap_or_default(),
                errors,
            },
        )
    };

    if let Err(errors) = validate(&body) {
        return Ok(rerender(errors)?.into_response());
    }

    let credentials = Credentials {
        username: body.username.clone(),
        password: body.password.clone(),
    };

    let session = match context.gallery.auth.login(credentials).await {
        Ok(session) => session,
        Err(AuthError::InvalidCredentials) => {
            let errors = FormErrors::single(
                FormErrors::NON_FIELD,
                "Please enter a correct username and password.",
            );
            return Ok(rerender(errors)?.into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let jar = jar.add(session_cookie(session.token, context.config.secure_cookies));
    Ok((jar, redirect(safe_next(body.next.as_deref()))).into_response())
}

async fn signup_page(State(context): State<ServerContext>) -> ServerResult<Html<String>> {
    context
        .templates
        .render("signup.html", &AccountPage::default())
}

async fn signup(
    State(context): State<ServerContext>,
    jar: CookieJar,
    body: Result<Form<RegisterSchema>, FormRejection>,
) -> ServerResult<Response> {
    let body = submitted(body);
    let rerender = |errors: FormErrors| {
        context.templates.render(
            "signup.html",
            &AccountPage {
                username: &body.username,
                next: "",
                errors,
            },
        )
    };

    if let Err(errors) = validate(&body) {
        return Ok(rerender(errors)?.into_response());
    }

    let new_user = NewPlainUser {
        username: body.username.clone(),
        password: body.password.clone(),
    };

    let auth = &context.gallery.auth;

    let user = match auth.register(new_user).await {
        Ok((user, _)) => user,
        Err(AuthError::UsernameTaken(_)) => {
            let errors =
                FormErrors::single("username", "A user with that username already exists.");
            return Ok(rerender(errors)?.into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let session = auth.begin_session(&user).await?;
    let jar = jar.add(session_cookie(session.token, context.config.secure_cookies));

    Ok((jar, redirect("/")).into_response())
}

async fn logout(State(context): State<ServerContext>, jar: CookieJar) -> ServerResult<Response> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        match context.gallery.auth.logout(cookie.value()).await {
            Err(e) if !e.is_not_found() => return Err(e.into()),
            _ => {}
        }
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, redirect(LOGIN_PATH)).into_response())
}

pub fn router() -> Router {
    Router::new()
        .route("/login/", get(login_page).post(login))
        .route("/signup/", get(signup_page).post(signup))
        .route("/logout/", post(logout))
}
