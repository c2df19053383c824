use tide::{Request, Response};

use crate::models::images::list_images;
use crate::web::api::utils::respond;
use imghost_api_structs::ImageList;

pub(super) async fn images(req: Request<crate::State>) -> tide::Result<Response> {
    let state = req.state();
    let result = list_images(&state.store, &state.config)
        .await
        .map(|images| ImageList { images })
        .map_err(Into::into);
    respond(result)
}
