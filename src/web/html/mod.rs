use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use tide::{Request, Response};

use crate::models::images::{find_image, is_plain_filename, list_images};
use crate::store::Lookup;
use imghost_api_structs::{CopyFormat, ImageRecord};

mod utils;

use utils::{html_response, render};

pub(in super::super) fn mount(route: &mut tide::Server<crate::State>) {
    route.at("/").get(gallery);
    route.at("/image/:name").get(image);
}

#[derive(Default, Deserialize, Serialize)]
#[serde(default)]
struct GalleryQueryParams {
    q: Option<String>,
}

impl GalleryQueryParams {
    fn search(&self) -> &str {
        self.q.as_deref().map(str::trim).unwrap_or("")
    }

    /// Query string carrying the search across pages, empty without one.
    fn suffix(&self) -> String {
        if self.search().is_empty() {
            return String::new();
        }
        match serde_qs::to_string(self) {
            Ok(qs) => format!("?{}", qs),
            Err(err) => {
                tracing::warn!("could not encode gallery query string: {}", err);
                String::new()
            },
        }
    }
}

#[derive(Serialize)]
struct Card<'a> {
    name: &'a str,
    url: &'a str,
    size: u64,
    date: Option<String>,
    href: String,
}

impl<'a> Card<'a> {
    fn new(image: &'a ImageRecord, query: &GalleryQueryParams) -> Self {
        Card {
            name: &image.name,
            url: &image.url,
            size: image.size,
            date: image.date.map(|date| date.date().to_string()),
            href: format!(
                "/image/{}{}",
                utf8_percent_encode(&image.name, NON_ALPHANUMERIC),
                query.suffix()
            ),
        }
    }
}

#[derive(Serialize)]
struct Snippet {
    name: &'static str,
    text: String,
}

async fn gallery(req: Request<crate::State>) -> tide::Result<Response> {
    let state = req.state();
    let query: GalleryQueryParams = req.query()?;

    let images = list_images(&state.store, &state.config).await?;
    let cards: Vec<Card> = images
        .iter()
        .filter(|image| image.matches(query.search()))
        .map(|image| Card::new(image, &query))
        .collect();

    let mut context = tera::Context::new();
    context.insert("title", "gallery");
    context.insert("repo_url", &state.config.repo_url());
    context.insert("search", query.search());
    context.insert("total", &images.len());
    context.insert("cards", &cards);

    let body = render(state, "gallery.html", &context)?;
    Ok(html_response(body))
}

async fn image(req: Request<crate::State>) -> tide::Result<Response> {
    let state = req.state();
    let query: GalleryQueryParams = req.query()?;

    let name = percent_decode_str(req.param("name")?)
        .decode_utf8_lossy()
        .to_string();
    if !is_plain_filename(&name) {
        return Ok(Response::builder(tide::http::StatusCode::NotFound).build());
    }

    let image = match find_image(&state.store, &state.config, &name).await? {
        Lookup::Found(image) => image,
        Lookup::NotFound => return Ok(Response::builder(tide::http::StatusCode::NotFound).build()),
    };

    let snippets: Vec<Snippet> = CopyFormat::ALL
        .iter()
        .map(|format| Snippet {
            name: format.name(),
            text: format.render(&image),
        })
        .collect();

    let mut context = tera::Context::new();
    context.insert("title", &image.name);
    context.insert("image", &Card::new(&image, &query));
    context.insert("snippets", &snippets);
    context.insert("back_href", &format!("/{}", query.suffix()));

    let body = render(state, "image.html", &context)?;
    Ok(html_response(body))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tide::http::{Method, StatusCode};
    use time::macros::datetime;

    use crate::store::memory::MemoryStore;
    use crate::web::api::utils::test_utils::call;

    fn populated() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.insert("images/cat.png", "AAAA", Some(datetime!(2024-01-01 0:00 UTC)));
        store.insert("images/dog.png", "AAAA", Some(datetime!(2024-02-01 0:00 UTC)));
        store.insert("images/catfish.jpg", "AAAA", Some(datetime!(2024-03-01 0:00 UTC)));
        store
    }

    #[async_std::test]
    async fn gallery_filters_by_search() {
        let app = crate::server(crate::test_state(populated()));

        let mut res = call(&app, Method::Get, "/?q=CAT", None).await;
        assert_eq!(res.status(), StatusCode::Ok);
        let body = res.body_string().await.unwrap();

        assert!(body.contains("catfish.jpg"));
        assert!(body.contains("cat.png"));
        assert!(!body.contains("dog.png"));
        assert!(body.contains("/image/catfish%2Ejpg?q=CAT"));
        assert!(body.find("catfish.jpg") < body.find("cat.png"));
    }

    #[async_std::test]
    async fn image_page_offers_copy_snippets() {
        let app = crate::server(crate::test_state(populated()));

        let mut res = call(&app, Method::Get, "/image/cat%2Epng", None).await;
        assert_eq!(res.status(), StatusCode::Ok);
        let body = res.body_string().await.unwrap();

        assert!(body.contains("https://raw.githubusercontent.com/octo/pics/main/images/cat.png"));
        assert!(body.contains("![cat.png]("));
        assert!(body.contains("2024-01-01"));
    }

    #[async_std::test]
    async fn double_dots_inside_a_name_are_served() {
        let store = populated();
        store.insert("images/my..photo_1.png", "AAAA", None);
        let app = crate::server(crate::test_state(store));

        let res = call(&app, Method::Get, "/image/my..photo_1.png", None).await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[async_std::test]
    async fn unknown_image_is_not_found() {
        let app = crate::server(crate::test_state(populated()));

        let res = call(&app, Method::Get, "/image/ghost.png", None).await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }
}
