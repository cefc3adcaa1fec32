use axum::Json;
use bolt_core::descriptor::{descriptor_filename, synthesize, DescriptorRequest};

use crate::error::AppError;

/// POST /api/descriptors: synthesize a release descriptor without writing it.
pub async fn create_descriptor(
    Json(req): Json<DescriptorRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let descriptor = synthesize(&req)?;
    Ok(Json(serde_json::json!({
        "filename": descriptor_filename(&req),
        "descriptor": descriptor,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use bolt_core::types::Platform;

    fn request(date: &str) -> DescriptorRequest {
        DescriptorRequest {
            ait: "12345".into(),
            spk: "CODECTS".into(),
            ops_number: "9999".into(),
            train_type: "Minor".into(),
            release_date: date.into(),
            components: vec!["Auth".into()],
            environments: vec!["DEV".into()],
            platform: Platform::Structured,
        }
    }

    #[tokio::test]
    async fn returns_filename_and_descriptor() {
        let Json(body) = create_descriptor(Json(request("2025.06.15"))).await.unwrap();
        assert_eq!(
            body["filename"],
            "12345_CODECTS_OPSERVICES_9999_DB_Minor_Release_Train_2025.06.15.json"
        );
        assert_eq!(
            body["descriptor"]["component"]["releaseComponents"][0],
            "CODECTS auth 2025.06.15:1"
        );
    }

    #[tokio::test]
    async fn bad_date_is_a_client_error() {
        let err = create_descriptor(Json(request("2025"))).await.unwrap_err();
        assert_eq!(err.into_response().status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
