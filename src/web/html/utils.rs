use html_minifier::HTMLMinifier;
use tera::Context;
use thiserror::Error;
use tide::{Response, StatusCode};

use crate::State;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("rendering error")]
    Tera(#[from] tera::Error),
}

pub(super) fn render(
    state: &State,
    template: &'static str,
    context: &Context,
) -> Result<String, TemplateError> {
    let rendered = state.tera.render(template, context)?;

    let mut html_minifier = HTMLMinifier::new();
    if let Err(err) = html_minifier.digest(&rendered) {
        tracing::error!("Failed to minify HTML: {}", err);
        return Ok(rendered);
    };

    let minified = match std::str::from_utf8(html_minifier.get_html()) {
        Ok(minified) => minified.to_string(),
        Err(err) => {
            tracing::error!("Failed to parse minified HTML as UTF-8: {}", err);
            rendered
        },
    };

    Ok(minified)
}

pub(super) fn html_response(body: String) -> Response {
    Response::builder(StatusCode::Ok)
        .content_type("text/html")
        .body(body)
        .build()
}
