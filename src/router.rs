use crate::config::Config;
use crate::error::AppError;
use crate::ingest::{UploadedFile, ingest_image};
use crate::llm_client::ModelClient;
use crate::page::{RenderInstruction, render_page};
use crate::request_id::{RequestId, inject_request_id};
use axum::{
    Extension, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartRejection},
    response::Html,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

const PROMPT_FIELD: &str = "input";
const IMAGE_FIELD: &str = "image";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub model_client: ModelClient,
}

/// The decoded form: prompt text plus whatever came in the file field.
#[derive(Debug, Default)]
pub struct Submission {
    pub user_text: String,
    pub file: Option<UploadedFile>,
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/", get(index))
        .route("/submit", post(submit))
        .route("/health", get(|| async { "OK" }))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn(inject_request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn index() -> Html<String> {
    Html(render_page(&RenderInstruction::blank()))
}

#[axum_macros::debug_handler]
pub async fn submit(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Html<String> {
    let mut submission = Submission::default();
    let read = match multipart {
        Ok(multipart) => read_submission(multipart, &mut submission).await,
        Err(rejection) => Err(AppError::InvalidForm(rejection.body_text())),
    };

    let view = match read {
        Ok(()) => handle_submission(&state, submission, &request_id).await,
        Err(e) => {
            warn!("Rejected submission: {}", e);
            let message = format!("An error occurred: {}", e);
            RenderInstruction::error(submission.user_text, None, message)
        }
    };
    Html(render_page(&view))
}

/// Fills `submission` field by field, so whatever was read before a decoding
/// error is still available to the caller.
pub async fn read_submission(
    mut multipart: Multipart,
    submission: &mut Submission,
) -> Result<(), AppError> {
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            PROMPT_FIELD => submission.user_text = field.text().await?,
            IMAGE_FIELD => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                submission.file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            other => debug!("Ignoring form field {:?}", other),
        }
    }
    Ok(())
}

/// Submit-button handler: ingest, ask the model, describe what to show.
///
/// Never fails; every error becomes an error outcome on the page.
pub async fn handle_submission(
    state: &AppState,
    submission: Submission,
    request_id: &RequestId,
) -> RenderInstruction {
    let Submission { user_text, file } = submission;

    let image = match ingest_image(file.as_ref()) {
        Ok(image) => Some(image),
        Err(AppError::MissingInput(reason)) => {
            info!("Submission without image: {}", reason);
            None
        }
        Err(e) => {
            return RenderInstruction::error(user_text, None, format!("An error occurred: {}", e));
        }
    };

    let result = state
        .model_client
        .get_response(&state.config.system_prompt, &user_text, image.as_ref(), request_id)
        .await;

    match (result, image) {
        // The no-image answer is shown inline as the error text, verbatim.
        (Ok(text), None) => RenderInstruction::error(user_text, None, text),
        (Ok(text), Some(image)) => {
            info!("Model answered with {} chars", text.len());
            RenderInstruction::answer(user_text, Some(image), text)
        }
        (Err(e), image) => {
            error!("Submission failed: {}", e);
            RenderInstruction::error(user_text, image, format!("An error occurred: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::NO_IMAGE_RESPONSE;
    use crate::llm_client::tests::{MockModel, text_response};
    use crate::page::Outcome;
    use bytes::Bytes;
    use serde_json::json;

    fn state_with(mock: Arc<MockModel>) -> AppState {
        let mut config = Config::default();
        config.system_prompt = "You read invoices.".to_string();
        AppState {
            config: Arc::new(config),
            model_client: ModelClient::new(mock),
        }
    }

    fn png_upload() -> UploadedFile {
        UploadedFile {
            file_name: Some("invoice.png".to_string()),
            content_type: Some("image/png".to_string()),
            bytes: Bytes::from_static(&[
                0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x01,
            ]),
        }
    }

    fn request_id() -> RequestId {
        RequestId("router-test".to_string())
    }

    #[tokio::test]
    async fn test_png_question_round_trip() {
        let mock = MockModel::replying(vec![Ok(text_response("The total is 118.00 USD"))]);
        let state = state_with(mock.clone());

        let view = handle_submission(
            &state,
            Submission {
                user_text: "What is the total?".to_string(),
                file: Some(png_upload()),
            },
            &request_id(),
        )
        .await;

        assert_eq!(view.outcome, Some(Outcome::Answer("The total is 118.00 USD".to_string())));
        let preview = view.preview.unwrap();
        assert_eq!(preview.mime_type(), "image/png");
        assert_eq!(preview.data().len(), 10);

        assert_eq!(mock.call_count(), 1);
        let sent = serde_json::to_value(&mock.calls.lock().unwrap()[0]).unwrap();
        assert_eq!(
            sent["contents"][0]["parts"][0],
            json!({"text": "You read invoices.\nWhat is the total?"})
        );
        assert_eq!(sent["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/png");
    }

    #[tokio::test]
    async fn test_no_file_shows_fallback_without_remote_call() {
        let mock = MockModel::replying(vec![]);
        let state = state_with(mock.clone());

        let view = handle_submission(
            &state,
            Submission {
                user_text: "What is the total?".to_string(),
                file: None,
            },
            &request_id(),
        )
        .await;

        assert_eq!(view.outcome, Some(Outcome::Error(NO_IMAGE_RESPONSE.to_string())));
        assert!(view.preview.is_none());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_remote_failure_then_next_submission_succeeds() {
        let mock = MockModel::replying(vec![
            Err(AppError::RemoteCall("quota exceeded".to_string())),
            Ok(text_response("Vendor: ACME GmbH")),
        ]);
        let state = state_with(mock.clone());

        let first = handle_submission(
            &state,
            Submission {
                user_text: "Who is the vendor?".to_string(),
                file: Some(png_upload()),
            },
            &request_id(),
        )
        .await;
        match first.outcome {
            Some(Outcome::Error(msg)) => {
                assert!(msg.starts_with("An error occurred: "));
                assert!(msg.contains("quota exceeded"));
            }
            other => panic!("expected error outcome, got {:?}", other),
        }
        assert_eq!(first.user_text, "Who is the vendor?");

        let second = handle_submission(
            &state,
            Submission {
                user_text: "Who is the vendor?".to_string(),
                file: Some(png_upload()),
            },
            &request_id(),
        )
        .await;
        assert_eq!(second.outcome, Some(Outcome::Answer("Vendor: ACME GmbH".to_string())));
        assert_eq!(mock.call_count(), 2);
    }

    async fn spawn_app(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_http_form_flow() {
        let mock = MockModel::replying(vec![Ok(text_response("Invoice <INV-7>"))]);
        let base = spawn_app(state_with(mock.clone())).await;
        let client = reqwest::Client::new();

        let index = client.get(format!("{}/", base)).send().await.unwrap();
        assert!(index.headers().contains_key("x-request-id"));
        let html = index.text().await.unwrap();
        assert!(html.contains("Tell me about the invoice"));

        let form = reqwest::multipart::Form::new()
            .text("input", "What is the invoice number?")
            .part(
                "image",
                reqwest::multipart::Part::bytes(vec![0x89, b'P', b'N', b'G'])
                    .file_name("invoice.png")
                    .mime_str("image/png")
                    .unwrap(),
            );
        let html = client
            .post(format!("{}/submit", base))
            .multipart(form)
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();

        assert!(html.contains("The response is:"));
        assert!(html.contains("Invoice &lt;INV-7&gt;"));
        assert!(html.contains("data:image/png;base64,iVBORw=="));
        assert!(html.contains("value=\"What is the invoice number?\""));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_http_submit_without_file() {
        let mock = MockModel::replying(vec![]);
        let base = spawn_app(state_with(mock.clone())).await;

        let form = reqwest::multipart::Form::new()
            .text("input", "What is the total?")
            .part(
                "image",
                reqwest::multipart::Part::bytes(Vec::new())
                    .file_name("")
                    .mime_str("application/octet-stream")
                    .unwrap(),
            );
        let html = reqwest::Client::new()
            .post(format!("{}/submit", base))
            .multipart(form)
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();

        assert!(html.contains("role=\"alert\">No image uploaded, cannot process invoice.</div>"));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_http_upload_over_limit_is_rendered_inline() {
        let mock = MockModel::replying(vec![Ok(text_response("unused"))]);
        let mut state = state_with(mock.clone());
        let mut config = (*state.config).clone();
        config.max_upload_bytes = 1024;
        state.config = Arc::new(config);
        let base = spawn_app(state).await;

        let form = reqwest::multipart::Form::new()
            .text("input", "What is the total?")
            .part(
                "image",
                reqwest::multipart::Part::bytes(vec![0u8; 4096])
                    .file_name("huge.png")
                    .mime_str("image/png")
                    .unwrap(),
            );
        let response = reqwest::Client::new()
            .post(format!("{}/submit", base))
            .multipart(form)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let html = response.text().await.unwrap();
        assert!(html.contains(
            "An error occurred: invalid form submission: Request payload is too large"
        ));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_http_truncated_form_keeps_prompt() {
        let mock = MockModel::replying(vec![]);
        let base = spawn_app(state_with(mock.clone())).await;

        // The closing boundary never arrives, so decoding fails inside the image field.
        let body = concat!(
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"input\"\r\n\r\n",
            "What is the total?\r\n",
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"image\"; filename=\"a.png\"\r\n",
            "Content-Type: image/png\r\n\r\n",
            "\u{89}PNG",
        );
        let html = reqwest::Client::new()
            .post(format!("{}/submit", base))
            .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
            .body(body)
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();

        assert!(html.contains("An error occurred: invalid form submission"));
        assert!(html.contains("value=\"What is the total?\""));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_http_non_multipart_body_is_rendered_as_error() {
        let base = spawn_app(state_with(MockModel::replying(vec![]))).await;

        let response = reqwest::Client::new()
            .post(format!("{}/submit", base))
            .header("content-type", "application/json")
            .body("{}")
            .send()
            .await
            .unwrap();

        assert!(response.status().is_success());
        let html = response.text().await.unwrap();
        assert!(html.contains("An error occurred: invalid form submission"));
    }

    #[tokio::test]
    async fn test_health() {
        let base = spawn_app(state_with(MockModel::replying(vec![]))).await;
        let body = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "OK");
    }
}
