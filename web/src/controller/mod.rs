use serde::Serialize;
pub(crate) mod health_check_controller;
pub(crate) mod message_controller;
pub(crate) mod websocket_controller;

/// Envelope for every JSON body the REST endpoints return.
#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status_code: u16, data: T) -> Self {
        Self {
            status_code,
            data: Some(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn serializes_status_and_data() {
        let response = ApiResponse::new(StatusCode::OK.into(), vec!["hi", "there"]);
        let serialized = serde_json::to_string(&response).unwrap();

        // Compare as values; key order in the serialized string is not guaranteed.
        let value: serde_json::Value = serde_json::from_str(&serialized).unwrap();
        assert_eq!(value, json!({"data": ["hi", "there"], "status_code": 200}));
    }

    #[test]
    fn omits_missing_data() {
        let response = ApiResponse::<()> {
            status_code: StatusCode::NO_CONTENT.into(),
            data: None,
        };

        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            json!({"status_code": 204}).to_string()
        );
    }
}
