use axum::{
    extract::{rejection::FormRejection, State},
    response::{Html, IntoResponse, Response},
    routing::get,
    Form,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use shutter_gallery::ContactMessage;

use crate::{
    auth::{redirect, Session},
    errors::ServerResult,
    schemas::{submitted, validate, ContactForm, FormErrors},
    Router, ServerContext,
};

const FLASH_COOKIE: &str = "shutter_flash";
const MESSAGE_SENT: &str = "sent";

#[derive(Debug, Serialize)]
struct ContactPage<'a> {
    username: &'a str,
    notice: Option<&'static str>,
    form: ContactForm,
    errors: FormErrors,
}

fn render_contact(
    context: &ServerContext,
    session: &Session,
    notice: Option<&'static str>,
    form: ContactForm,
    errors: FormErrors,
) -> ServerResult<Html<String>> {
    context.templates.render(
        "contact.html",
        &ContactPage {
            username: &session.user().username,
            notice,
            form,
            errors,
        },
    )
}

/// Shows the form along with the notice left by a previous submission, consuming it
async fn contact(
    session: Session,
    State(context): State<ServerContext>,
    jar: CookieJar,
) -> ServerResult<Response> {
    let notice = match jar.get(FLASH_COOKIE).map(|c| c.value()) {
        Some(MESSAGE_SENT) => Some("Message sent successfully!"),
        _ => None,
    };

    let html = render_contact(
        &context,
        &session,
        notice,
        ContactForm::default(),
        FormErrors::default(),
    )?;

    if jar.get(FLASH_COOKIE).is_some() {
        let jar = jar.remove(Cookie::build(FLASH_COOKIE).path("/"));
        return Ok((jar, html).into_response());
    }

    Ok(html.into_response())
}

async fn send_message(
    session: Session,
    State(context): State<ServerContext>,
    jar: CookieJar,
    form: Result<Form<ContactForm>, FormRejection>,
) -> ServerResult<Response> {
    let form = submitted(form);
    if let Err(errors) = validate(&form) {
        return Ok(render_contact(&context, &session, None, form, errors)?.into_response());
    }

    context
        .gallery
        .contact
        .send(ContactMessage {
            first_name: form.first_name,
            last_name: form.last_name,
            email: form.email,
            subject: form.subject,
            message: form.message,
        })
        .await?;

    let flash = Cookie::build((FLASH_COOKIE, MESSAGE_SENT))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);

    Ok((jar.add(flash), redirect("/contact/")).into_response())
}

pub fn router() -> Router {
    Router::new().route("/contact/", get(contact).post(send_message))
}
