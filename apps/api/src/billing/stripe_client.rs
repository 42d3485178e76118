//! Payment provider client — the single point of entry for all Stripe API
//! calls. No other module may talk to the provider directly.

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const STRIPE_API_URL: &str = "https://api.stripe.com/v1";

#[derive(Debug, Error)]
pub enum StripeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl From<StripeError> for crate::errors::AppError {
    fn from(e: StripeError) -> Self {
        crate::errors::AppError::Upstream(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct Customer {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionSummary {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct StripeApiError {
    error: StripeApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeApiErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
}

impl StripeClient {
    pub fn new(secret_key: String, timeout: std::time::Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            secret_key,
        }
    }

    pub async fn create_customer(&self, email: &str) -> Result<Customer, StripeError> {
        self.post_form("/customers", &[("email", email)]).await
    }

    pub async fn list_active_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<SubscriptionSummary>, StripeError> {
        let list: ListResponse<SubscriptionSummary> = self
            .get(&format!(
                "/subscriptions?customer={customer_id}&status=active"
            ))
            .await?;
        Ok(list.data)
    }

    pub async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), StripeError> {
        let _: SubscriptionSummary = self
            .delete(&format!("/subscriptions/{subscription_id}"))
            .await?;
        Ok(())
    }

    pub async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, StripeError> {
        self.post_form(
            "/checkout/sessions",
            &[
                ("mode", "subscription"),
                ("customer", customer_id),
                ("line_items[0][price]", price_id),
                ("line_items[0][quantity]", "1"),
                ("success_url", success_url),
                ("cancel_url", cancel_url),
            ],
        )
        .await
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<T, StripeError> {
        let response = self
            .client
            .post(format!("{STRIPE_API_URL}{path}"))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await?;
        Self::read_response(path, response).await
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, StripeError> {
        let response = self
            .client
            .get(format!("{STRIPE_API_URL}{path}"))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        Self::read_response(path, response).await
    }

    async fn delete<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, StripeError> {
        let response = self
            .client
            .delete(format!("{STRIPE_API_URL}{path}"))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        Self::read_response(path, response).await
    }

    async fn read_response<T: serde::de::DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(StripeError::Api {
                status: status.as_u16(),
                message,
            });
        }
        debug!(path, "stripe call succeeded");
        Ok(response.json().await?)
    }
}
