use base64::{engine::general_purpose::STANDARD, Engine as _};
use tide::{Request, Response};

use crate::models::images::stored_filename;
use crate::store::Lookup;
use crate::web::api::utils::{invalid_body, respond, ApiError};
use imghost_api_structs::{UploadPayload, UploadResponse, MAX_UPLOAD_SIZE};

pub(super) async fn upload(mut req: Request<crate::State>) -> tide::Result<Response> {
    let result = match req.body_json::<UploadPayload>().await {
        Ok(payload) => store_upload(req.state(), payload).await,
        Err(err) => Err(invalid_body(err)),
    };
    respond(result)
}

fn too_large() -> ApiError {
    ApiError::Validation("File size exceeds 15MB limit".to_string())
}

async fn store_upload(
    state: &crate::State,
    payload: UploadPayload,
) -> Result<UploadResponse, ApiError> {
    let filename = payload.filename.filter(|f| !f.is_empty());
    let content = payload.content.filter(|c| !c.is_empty());
    let (filename, content) = match (filename, content) {
        (Some(filename), Some(content)) => (filename, content),
        _ => {
            return Err(ApiError::Validation(
                "Missing filename or content".to_string(),
            ))
        },
    };

    if payload.size.map_or(false, |size| size > MAX_UPLOAD_SIZE) {
        return Err(too_large());
    }

    let bytes = STANDARD
        .decode(content.as_bytes())
        .map_err(|_| ApiError::Validation("Content is not valid base64".to_string()))?;
    if bytes.len() as u64 > MAX_UPLOAD_SIZE {
        return Err(too_large());
    }

    let stored = stored_filename(&filename, state.suffixes.next());
    tracing::debug!("storing {} ({} bytes) as {}", filename, bytes.len(), stored);

    let path = state.config.image_path(&stored);
    let sha = match state.store.get_content(&path).await? {
        Lookup::Found(existing) => Some(existing.sha),
        Lookup::NotFound => None,
    };

    state
        .store
        .put_content(&path, &content, &format!("Upload {}", stored), sha.as_deref())
        .await?;

    Ok(UploadResponse {
        success: true,
        url: state.config.raw_url(&path),
        filename: stored,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tide::http::{Method, StatusCode};

    use crate::store::memory::MemoryStore;
    use crate::store::StoreError;
    use crate::web::api::utils::test_utils::{call, json};
    use imghost_api_structs::ErrorBody;

    fn app(store: &Arc<MemoryStore>) -> tide::Server<crate::State> {
        crate::server(crate::test_state(store.clone()))
    }

    #[async_std::test]
    async fn stores_image_under_unique_sanitized_name() {
        let store = Arc::new(MemoryStore::new());
        let app = app(&store);

        let body = json!({"filename": "my cat.png", "content": "iVBORw0KGgo=", "size": 8});
        let res = call(&app, Method::Post, "/api/upload", Some(body.clone())).await;
        assert_eq!(res.status(), StatusCode::Ok);
        let first: imghost_api_structs::UploadResponse = json(res).await;

        assert!(first.success);
        assert!(first.filename.starts_with("my_cat_"));
        assert!(first.filename.ends_with(".png"));
        assert_ne!(first.filename, "my cat.png");
        assert_eq!(
            first.url,
            format!(
                "https://raw.githubusercontent.com/octo/pics/main/images/{}",
                first.filename
            )
        );
        let path = format!("images/{}", first.filename);
        assert_eq!(store.content(&path).as_deref(), Some("iVBORw0KGgo="));

        let res = call(&app, Method::Post, "/api/upload", Some(body)).await;
        let second: imghost_api_structs::UploadResponse = json(res).await;
        assert_ne!(first.filename, second.filename);
        assert_eq!(store.paths().len(), 2);
    }

    #[async_std::test]
    async fn name_without_extension_is_stored_as_png() {
        let store = Arc::new(MemoryStore::new());
        let res = call(
            &app(&store),
            Method::Post,
            "/api/upload",
            Some(json!({"filename": "screenshot", "content": "AAAA"})),
        )
        .await;
        let uploaded: imghost_api_structs::UploadResponse = json(res).await;
        assert!(uploaded.filename.starts_with("screenshot_"));
        assert!(uploaded.filename.ends_with(".png"));
    }

    #[async_std::test]
    async fn missing_fields_are_rejected() {
        let store = Arc::new(MemoryStore::new());
        let app = app(&store);

        for body in [
            json!({"content": "AAAA"}),
            json!({"filename": "a.png"}),
            json!({"filename": "", "content": "AAAA"}),
        ] {
            let res = call(&app, Method::Post, "/api/upload", Some(body)).await;
            assert_eq!(res.status(), StatusCode::BadRequest);
            let error: ErrorBody = json(res).await;
            assert_eq!(error.error, "Missing filename or content");
        }
        assert_eq!(store.calls(), 0);
    }

    #[async_std::test]
    async fn oversized_upload_never_reaches_github() {
        let store = Arc::new(MemoryStore::new());
        let res = call(
            &app(&store),
            Method::Post,
            "/api/upload",
            Some(json!({
                "filename": "big.png",
                "content": "AAAA",
                "size": 15 * 1024 * 1024 + 1,
            })),
        )
        .await;

        assert_eq!(res.status(), StatusCode::BadRequest);
        let error: ErrorBody = json(res).await;
        assert_eq!(error.error, "File size exceeds 15MB limit");
        assert_eq!(store.calls(), 0);
    }

    #[async_std::test]
    async fn limit_itself_is_accepted() {
        let store = Arc::new(MemoryStore::new());
        let res = call(
            &app(&store),
            Method::Post,
            "/api/upload",
            Some(json!({"filename": "a.gif", "content": "AAAA", "size": 15 * 1024 * 1024})),
        )
        .await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[async_std::test]
    async fn invalid_content_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let app = app(&store);

        let res = call(
            &app,
            Method::Post,
            "/api/upload",
            Some(json!({"filename": "a.png", "content": "not base64!"})),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BadRequest);
        assert_eq!(store.calls(), 0);
    }

    #[async_std::test]
    async fn any_extension_is_stored() {
        let store = Arc::new(MemoryStore::new());
        let app = app(&store);

        for filename in &["notes.txt", "report.pdf"] {
            let res = call(
                &app,
                Method::Post,
                "/api/upload",
                Some(json!({"filename": filename, "content": "AAAA", "size": 3})),
            )
            .await;
            assert_eq!(res.status(), StatusCode::Ok);
        }

        let paths = store.paths();
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().any(|p| p.starts_with("images/notes_") && p.ends_with(".txt")));
        assert!(paths.iter().any(|p| p.starts_with("images/report_") && p.ends_with(".pdf")));
    }

    #[async_std::test]
    async fn upstream_failure_passes_message_through() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next(StoreError::Upstream {
            status: 403,
            message: "Resource not accessible by integration".to_string(),
        });

        let res = call(
            &app(&store),
            Method::Post,
            "/api/upload",
            Some(json!({"filename": "a.png", "content": "AAAA"})),
        )
        .await;
        assert_eq!(res.status(), StatusCode::InternalServerError);
        let error: ErrorBody = json(res).await;
        assert_eq!(error.error, "Resource not accessible by integration");
    }

    #[async_std::test]
    async fn rejected_credentials_are_a_configuration_error() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next(StoreError::Unauthorized("Bad credentials".to_string()));

        let res = call(
            &app(&store),
            Method::Post,
            "/api/upload",
            Some(json!({"filename": "a.png", "content": "AAAA"})),
        )
        .await;
        assert_eq!(res.status(), StatusCode::InternalServerError);
        let error: ErrorBody = json(res).await;
        assert_eq!(error.error, "Server configuration error");
    }

    #[async_std::test]
    async fn wrong_method_and_preflight() {
        let store = Arc::new(MemoryStore::new());
        let app = app(&store);

        let res = call(&app, Method::Get, "/api/upload", None).await;
        assert_eq!(res.status(), StatusCode::MethodNotAllowed);
        let error: ErrorBody = json(res).await;
        assert_eq!(error.error, "Method not allowed");

        let res = call(&app, Method::Options, "/api/upload", None).await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(
            res.header("Access-Control-Allow-Origin").map(|v| v.last().as_str()),
            Some("*")
        );
    }
}
