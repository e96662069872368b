use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;

use super::Credential;

/// Body sent to the image generation endpoint. Absent caller fields are left out
/// so the upstream gets to reject them.
#[derive(Debug, Serialize)]
pub struct UpstreamRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<&'a Value>,
    pub n: u32,
    pub size: &'a str,
}

#[derive(Debug, PartialEq, Eq)]
pub enum UpstreamReply {
    /// 2xx. The URL is `None` if `data[0].url` was missing or empty.
    Image(Option<String>),
    Rejected { status: StatusCode, body: String },
}

pub async fn query(
    client: &Client,
    url: &str,
    credential: &Credential,
    payload: &UpstreamRequest<'_>,
) -> reqwest::Result<UpstreamReply> {
    let resp = client
        .post(url)
        .bearer_auth(credential.expose())
        .json(payload)
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await?;
        return Ok(UpstreamReply::Rejected { status, body });
    }

    let result = resp.json::<Value>().await?;
    Ok(UpstreamReply::Image(first_image_url(&result)))
}

fn first_image_url(result: &Value) -> Option<String> {
    result
        .pointer("/data/0/url")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use expect_test::expect;
    use serde_json::json;

    use super::*;

    #[test]
    fn request_serialization() {
        let model = json!("img3");
        let prompt = json!("a red fox");
        let body = UpstreamRequest {
            model: Some(&model),
            prompt: Some(&prompt),
            n: 1,
            size: "1024x1024",
        };
        let expect = expect![[r#"{"model":"img3","prompt":"a red fox","n":1,"size":"1024x1024"}"#]];
        expect.assert_eq(&serde_json::to_string(&body).unwrap());

        let partial = UpstreamRequest {
            model: None,
            prompt: Some(&prompt),
            n: 1,
            size: "1024x1024",
        };
        let expect = expect![[r#"{"prompt":"a red fox","n":1,"size":"1024x1024"}"#]];
        expect.assert_eq(&serde_json::to_string(&partial).unwrap());
    }

    #[test]
    fn image_url_extraction() {
        assert_eq!(
            first_image_url(&json!({"data": [{"url": "http://x/img.png"}]})).as_deref(),
            Some("http://x/img.png")
        );
        assert_eq!(first_image_url(&json!({"data": []})), None);
        assert_eq!(first_image_url(&json!({"data": [{"url": ""}]})), None);
        assert_eq!(first_image_url(&json!({"data": [{"b64_json": "AQID"}]})), None);
        assert_eq!(first_image_url(&json!({"data": "nope"})), None);
        assert_eq!(first_image_url(&json!([])), None);
    }
}
