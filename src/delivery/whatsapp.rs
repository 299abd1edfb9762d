use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};

use super::{DocumentTemplate, Messenger};
use crate::config::WhatsAppConfig;
use crate::error::{AppError, AppResult};

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);
const SEND_TIMEOUT: Duration = Duration::from_secs(60);

/// WhatsApp Cloud API client for one sending phone number.
pub struct WhatsAppClient {
    client: reqwest::Client,
    base: String,
    phone_number_id: String,
    token: String,
}

impl WhatsAppClient {
    pub fn new(config: &WhatsAppConfig) -> AppResult<Self> {
        if config.phone_number_id.is_empty() || config.token.is_empty() {
            return Err(AppError::Config(
                "WHATSAPP_PHONE_ID and WA_TOKEN are required for delivery".into(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base: config.graph_base(),
            phone_number_id: config.phone_number_id.clone(),
            token: config.token.clone(),
        })
    }

    fn endpoint(&self, resource: &str) -> String {
        format!("{}/{}/{resource}", self.base, self.phone_number_id)
    }

    async fn read_json(response: reqwest::Response) -> AppResult<Value> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AppError::api(status.as_u16(), &body));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait::async_trait]
impl Messenger for WhatsAppClient {
    #[tracing::instrument(name = "whatsapp upload", skip(self, path), fields(path = %path.display()))]
    async fn upload_media(&self, path: &Path) -> AppResult<String> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report.pdf".to_string());
        let size = bytes.len();

        let form = Form::new()
            .text("messaging_product", "whatsapp")
            .text("type", "application/pdf")
            .part(
                "file",
                Part::bytes(bytes)
                    .file_name(filename)
                    .mime_str("application/pdf")?,
            );

        let response = self
            .client
            .post(self.endpoint("media"))
            .bearer_auth(&self.token)
            .multipart(form)
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await?;

        let body = Self::read_json(response).await?;
        let media_id = body["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AppError::Delivery(format!("media upload returned no id: {body}")))?;
        tracing::info!(media_id = %media_id, bytes = size, "media uploaded");
        Ok(media_id)
    }

    async fn send_template(&self, recipient: &str, template: &DocumentTemplate) -> AppResult<String> {
        let payload = json!({
            "messaging_product": "whatsapp",
            "to": recipient,
            "type": "template",
            "template": {
                "name": template.name,
                "language": { "code": template.language },
                "components": [{
                    "type": "header",
                    "parameters": [{
                        "type": "document",
                        "document": {
                            "id": template.media_id,
                            "filename": template.filename,
                        },
                    }],
                }],
            },
        });

        let response = self
            .client
            .post(self.endpoint("messages"))
            .bearer_auth(&self.token)
            .json(&payload)
            .timeout(SEND_TIMEOUT)
            .send()
            .await?;

        let body = Self::read_json(response).await?;
        body["messages"][0]["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AppError::Delivery(format!("send returned no message id: {body}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client_for(server: &MockServer) -> WhatsAppClient {
        WhatsAppClient::new(&WhatsAppConfig {
            phone_number_id: "1055".to_string(),
            token: "wa-token".to_string(),
            graph_version: "v19.0".to_string(),
            base_url: server.base_url(),
            default_language: "en".to_string(),
            send_delay: Duration::ZERO,
        })
        .unwrap()
    }

    fn template() -> DocumentTemplate {
        DocumentTemplate {
            name: "zoho_engineer_performance_report".to_string(),
            language: "en".to_string(),
            media_id: "MEDIA42".to_string(),
            filename: "Asha_Verma_Feb_analysis.pdf".to_string(),
        }
    }

    #[test]
    fn test_missing_credentials_are_config_errors() {
        let result = WhatsAppClient::new(&WhatsAppConfig {
            phone_number_id: String::new(),
            token: "t".to_string(),
            graph_version: "v19.0".to_string(),
            base_url: "https://graph.facebook.com".to_string(),
            default_language: "en".to_string(),
            send_delay: Duration::ZERO,
        });
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_upload_posts_multipart_pdf() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v19.0/1055/media")
                    .header("Authorization", "Bearer wa-token")
                    .body_contains("messaging_product")
                    .body_contains("application/pdf")
                    .body_contains("weekly.pdf");
                then.status(200).json_body(serde_json::json!({"id": "MEDIA42"}));
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weekly.pdf");
        std::fs::write(&path, b"%PDF-1.7 report").unwrap();

        let media_id = client_for(&server).upload_media(&path).await.unwrap();

        mock.assert_async().await;
        assert_eq!(media_id, "MEDIA42");
    }

    #[tokio::test]
    async fn test_upload_of_missing_file_is_io_error() {
        let server = MockServer::start_async().await;
        let err = client_for(&server)
            .upload_media(Path::new("/nonexistent/report.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }

    #[tokio::test]
    async fn test_send_template_with_document_header() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v19.0/1055/messages")
                    .header("Authorization", "Bearer wa-token")
                    .body_contains("\"to\":\"919800000001\"")
                    .body_contains("\"type\":\"document\"")
                    .body_contains("\"id\":\"MEDIA42\"")
                    .body_contains("\"name\":\"zoho_engineer_performance_report\"");
                then.status(200).json_body(serde_json::json!({
                    "messaging_product": "whatsapp",
                    "contacts": [{"input": "919800000001", "wa_id": "919800000001"}],
                    "messages": [{"id": "wamid.HBgM"}]
                }));
            })
            .await;

        let message_id = client_for(&server)
            .send_template("919800000001", &template())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(message_id, "wamid.HBgM");
    }

    #[tokio::test]
    async fn test_send_rejection_keeps_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v19.0/1055/messages");
                then.status(400)
                    .body(r#"{"error":{"message":"Template name does not exist"}}"#);
            })
            .await;

        let err = client_for(&server)
            .send_template("919800000001", &template())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(400));
    }
}
