mod delete;
mod images;
mod upload;
pub mod utils;

use utils::{cors, method_not_allowed, preflight};

pub(super) fn mount(mut route: tide::Route<crate::State>) {
    route.with(cors);

    route
        .at("/upload")
        .post(upload::upload)
        .options(preflight)
        .all(method_not_allowed);
    route
        .at("/images")
        .get(images::images)
        .options(preflight)
        .all(method_not_allowed);
    route
        .at("/delete")
        .post(delete::delete)
        .options(preflight)
        .all(method_not_allowed);
}
