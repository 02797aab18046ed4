use domain::Identity;
use serde::Deserialize;
use utoipa::ToSchema;

/// Body of `POST /v1/messages`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateParams {
    /// Accepts a number or a numeric string; `recipient_id` is an alias.
    #[serde(alias = "recipient_id")]
    #[schema(value_type = i64, example = 2)]
    pub receiver_id: Identity,
    #[schema(example = "hi")]
    pub content: String,
}
