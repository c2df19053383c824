use tide::{Request, Response};

use crate::models::images::is_plain_filename;
use crate::store::Lookup;
use crate::web::api::utils::{invalid_body, respond, ApiError};
use imghost_api_structs::{DeletePayload, DeleteResponse};

pub(super) async fn delete(mut req: Request<crate::State>) -> tide::Result<Response> {
    let result = match req.body_json::<DeletePayload>().await {
        Ok(payload) => delete_image(req.state(), payload).await,
        Err(err) => Err(invalid_body(err)),
    };
    respond(result)
}

fn file_not_found() -> ApiError {
    ApiError::NotFound("File not found".to_string())
}

async fn delete_image(
    state: &crate::State,
    payload: DeletePayload,
) -> Result<DeleteResponse, ApiError> {
    let filename = payload
        .filename
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ApiError::Validation("Missing filename".to_string()))?;
    if !is_plain_filename(&filename) {
        return Err(ApiError::Validation("Invalid filename".to_string()));
    }

    let path = state.config.image_path(&filename);
    let sha = match state.store.get_content(&path).await? {
        Lookup::Found(entry) => entry.sha,
        Lookup::NotFound => return Err(file_not_found()),
    };

    match state
        .store
        .delete_content(&path, &format!("Delete {}", filename), &sha)
        .await?
    {
        Lookup::Found(()) => Ok(DeleteResponse {
            success: true,
            message: "File deleted successfully".to_string(),
        }),
        Lookup::NotFound => Err(file_not_found()),
    }
}
