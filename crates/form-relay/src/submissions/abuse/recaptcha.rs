use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{BotScoreVerifier, VerificationError, VerificationResponse};

/// Google reCAPTCHA `siteverify` client.
#[derive(Clone)]
pub struct RecaptchaVerifier {
    client: Client,
    verify_url: String,
    secret: String,
    timeout: Duration,
}

impl RecaptchaVerifier {
    pub fn new(
        secret: String,
        verify_url: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            verify_url,
            secret,
            timeout,
        })
    }
}

#[async_trait]
impl BotScoreVerifier for RecaptchaVerifier {
    async fn verify(&self, token: &str) -> Result<VerificationResponse, VerificationError> {
        let response = self
            .client
            .post(&self.verify_url)
            .form(&[("secret", self.secret.as_str()), ("response", token)])
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    VerificationError::Timeout(self.timeout)
                } else {
                    VerificationError::Transport(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(VerificationError::Status(status.as_u16()));
        }

        response
            .json::<VerificationResponse>()
            .await
            .map_err(|err| VerificationError::Decode(err.to_string()))
    }
}
