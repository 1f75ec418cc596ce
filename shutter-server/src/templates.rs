use axum::response::Html;
use serde::Serialize;
use tera::{Context, Tera};

use crate::errors::ServerResult;

/// Pages are compiled into the binary
const TEMPLATES: [(&str, &str); 8] = [
    ("base.html", include_str!("../templates/base.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("single.html", include_str!("../templates/single.html")),
    ("delete_album.html", include_str!("../templates/delete_album.html")),
    ("profile.html", include_str!("../templates/profile.html")),
    ("contact.html", include_str!("../templates/contact.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("signup.html", include_str!("../templates/signup.html")),
];

pub struct Templates {
    tera: Tera,
}

impl Templates {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES)?;

        Ok(Self { tera })
    }

    /// Renders a page with the fields of `page` as template variables
    pub fn render<T: Serialize>(&self, name: &str, page: &T) -> ServerResult<Html<String>> {
        let context = Context::from_serialize(page)?;
        let html = self.tera.render(name, &context)?;

        Ok(Html(html))
    }
}
