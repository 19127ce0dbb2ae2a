//! SMS webhook (TwiML) plus health and info endpoints.
//!
//! The SMS provider posts `From` and `Body` as a form. Whatever happens
//! inside the pipeline, the provider gets HTTP 200 and a TwiML document
//! with one `<Message>`.

use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{State, rejection::FormRejection},
    http::header,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::config::ServiceConfig;
use crate::pipeline::IntakePipeline;

/// Sent when the pipeline task itself dies.
pub const APOLOGY_REPLY: &str =
    "Sorry, we're experiencing technical difficulties. Please try again later.";

/// Which external services are configured, as reported by `/health`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceStatus {
    pub llm: bool,
    pub database: bool,
    pub twilio: bool,
}

impl ServiceStatus {
    /// Status for a started service: the store is open by the time routes exist.
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            llm: config.llm.api_key.is_some(),
            database: true,
            twilio: config.twilio_configured,
        }
    }
}

#[derive(Clone)]
struct SmsState {
    pipeline: Arc<IntakePipeline>,
    status: ServiceStatus,
}

/// Inbound webhook form. Missing fields are empty strings.
#[derive(Debug, Default, Deserialize)]
struct SmsWebhook {
    #[serde(rename = "From", default)]
    from: String,
    #[serde(rename = "Body", default)]
    body: String,
}

/// Build the router for the SMS webhook and operational endpoints.
pub fn sms_routes(pipeline: Arc<IntakePipeline>, status: ServiceStatus) -> Router {
    let state = SmsState { pipeline, status };

    Router::new()
        .route("/sms", post(handle_sms))
        .route("/health", get(health))
        .route("/test", get(test_info))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── SMS ─────────────────────────────────────────────────────────────────

async fn handle_sms(
    State(state): State<SmsState>,
    form: Result<Form<SmsWebhook>, FormRejection>,
) -> impl IntoResponse {
    let webhook = match form {
        Ok(Form(webhook)) => webhook,
        Err(rejection) => {
            warn!(error = %rejection, "Unreadable SMS webhook form, treating as empty");
            SmsWebhook::default()
        }
    };

    let pipeline = Arc::clone(&state.pipeline);
    let from = webhook.from.clone();
    let task = tokio::spawn(async move { pipeline.reply(&webhook.from, &webhook.body).await });

    let reply = match task.await {
        Ok(reply) => reply,
        Err(e) => {
            error!(channel_address = %from, error = %e, "SMS pipeline task failed");
            APOLOGY_REPLY.to_string()
        }
    };

    (
        [(header::CONTENT_TYPE, "application/xml")],
        twiml_message(&reply),
    )
}

/// Wrap a reply in a TwiML `<Response><Message>` document.
pub fn twiml_message(text: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Response><Message>{}</Message></Response>"#,
        xml_escape(text)
    )
}

/// Escape markup and drop characters XML 1.0 cannot carry.
fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\t' | '\n' | '\r' => out.push(c),
            c if c.is_control() && c < '\u{80}' => {}
            '\u{FFFE}' | '\u{FFFF}' => {}
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

// ── Health / info ───────────────────────────────────────────────────────

fn configured(flag: bool) -> &'static str {
    if flag { "configured" } else { "missing" }
}

async fn health(State(state): State<SmsState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "services": {
            "llm": configured(state.status.llm),
            "database": configured(state.status.database),
            "twilio": configured(state.status.twilio),
        }
    }))
}

async fn test_info() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "BookingBuddy is running!",
        "endpoints": {
            "sms": "/sms (POST)",
            "health": "/health (GET)",
            "test": "/test (GET)",
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use rust_decimal::Decimal;
    use tower::ServiceExt;

    use crate::config::PipelineConfig;
    use crate::error::LlmError;
    use crate::llm::{CompletionRequest, CompletionResponse, LlmProvider, OfflineProvider};
    use crate::pipeline::FALLBACK_REPLY;
    use crate::store::{Database, LibSqlBackend};

    struct PanickingLlm;

    #[async_trait]
    impl LlmProvider for PanickingLlm {
        fn model_name(&self) -> &str {
            "panicking"
        }

        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (Decimal::ZERO, Decimal::ZERO)
        }

        async fn complete(&self, _: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            panic!("provider bug");
        }
    }

    async fn app_with(llm: Arc<dyn LlmProvider>) -> Router {
        let store: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let pipeline = Arc::new(IntakePipeline::new(llm, store, PipelineConfig::default()));
        sms_routes(
            pipeline,
            ServiceStatus {
                llm: false,
                database: true,
                twilio: false,
            },
        )
    }

    fn sms_request(form: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/sms")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn twiml_escapes_markup() {
        let doc = twiml_message("Tom & Jerry's <b>cuts</b>");
        assert_eq!(
            doc,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>Tom &amp; Jerry&apos;s &lt;b&gt;cuts&lt;/b&gt;</Message></Response>"
        );
    }

    #[test]
    fn twiml_drops_invalid_xml_characters() {
        let doc = twiml_message("Hi\u{0}\u{1b}[2J there\u{7f}\u{FFFF}\nSee you");
        assert!(doc.contains("<Message>Hi[2J there\nSee you</Message>"));
        assert!(!doc.chars().any(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r')));
    }

    #[tokio::test]
    async fn sms_offline_llm_returns_fallback_twiml() {
        let app = app_with(Arc::new(OfflineProvider::new("openai"))).await;

        let response = app
            .oneshot(sms_request("From=%2B15551234567&Body=Hello"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/xml"
        );
        let body = body_text(response).await;
        assert_eq!(body, twiml_message(FALLBACK_REPLY));
        assert!(body.contains("We&apos;ll get back to you soon!"));
    }

    #[tokio::test]
    async fn sms_pipeline_panic_returns_apology() {
        let app = app_with(Arc::new(PanickingLlm)).await;

        let response = app
            .oneshot(sms_request("From=%2B15551234567&Body=Hello"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Sorry, we&apos;re experiencing technical difficulties."));
    }

    #[tokio::test]
    async fn sms_missing_fields_still_replies() {
        let app = app_with(Arc::new(OfflineProvider::new("openai"))).await;

        let response = app.oneshot(sms_request("")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("<Message>"));
    }

    #[tokio::test]
    async fn health_reports_services() {
        let app = app_with(Arc::new(OfflineProvider::new("openai"))).await;

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["services"]["llm"], "missing");
        assert_eq!(json["services"]["database"], "configured");
        assert_eq!(json["services"]["twilio"], "missing");
        assert!(json["timestamp"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_endpoint_lists_routes() {
        let app = app_with(Arc::new(OfflineProvider::new("openai"))).await;

        let response = app
            .oneshot(Request::builder().uri("/test").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["message"], "BookingBuddy is running!");
        assert_eq!(json["endpoints"]["sms"], "/sms (POST)");
    }
}
