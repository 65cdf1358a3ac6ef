//! Virtual try-on synthesis.
//!
//! The browser posts the shopper's photo; the garment image and instruction
//! come from the catalog. The image model key never leaves the server.

use axum::{Json, extract::State};
use luxe_core::ProductId;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::catalog::Catalog;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::state::AppState;
use crate::tryon::{
    ImagePayload, ImageSource, ImageSynthesizer, SynthesisRequest, build_instruction,
};

/// Largest accepted request body; photos arrive base64-encoded.
pub const MAX_TRYON_BODY_BYTES: usize = 12 * 1024 * 1024;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TryOnRequest {
    pub product_id: ProductId,
    /// Shopper photo as a `data:` URL.
    pub photo: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TryOnResponse {
    /// Generated look as a `data:` URL.
    pub image: String,
}

/// Generate a try-on image for a catalog product.
#[instrument(skip(state, request), fields(product = %request.product_id))]
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<TryOnRequest>,
) -> Result<Json<TryOnResponse>> {
    let synthesis = synthesis_request(state.catalog(), &request)?;
    let synthesizer = state.synthesizer().ok_or(AppError::TryOnUnavailable)?;
    Ok(Json(synthesize_look(synthesizer, &synthesis).await?))
}

/// Build the model request from the catalog entry and the posted photo.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for unknown products, products without an
/// image, or a photo that is not a base64 `data:` URL.
pub fn synthesis_request(catalog: &Catalog, request: &TryOnRequest) -> Result<SynthesisRequest> {
    let product = catalog
        .get(&request.product_id)
        .ok_or_else(|| AppError::BadRequest(format!("unknown product: {}", request.product_id)))?;
    let garment = product.primary_image().ok_or_else(|| {
        AppError::BadRequest(format!("product has no image: {}", request.product_id))
    })?;
    let photo = ImagePayload::from_data_url(&request.photo)
        .map_err(|e| AppError::BadRequest(format!("invalid photo: {e}")))?;

    Ok(SynthesisRequest {
        user_image: ImageSource::Inline(photo),
        garment_image: ImageSource::Remote(garment.to_string()),
        instruction: build_instruction(product),
    })
}

/// Run `request` through `synthesizer`.
///
/// # Errors
///
/// Returns `AppError::TryOn` if synthesis fails.
pub async fn synthesize_look<S: ImageSynthesizer>(
    synthesizer: &S,
    request: &SynthesisRequest,
) -> Result<TryOnResponse> {
    add_breadcrumb("tryon", "Synthesizing look", &[]);
    let image = synthesizer.synthesize(request).await?;
    info!(mime_type = %image.mime_type, "Try-on image generated");
    Ok(TryOnResponse {
        image: image.to_data_url(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::tests::sample_catalog;
    use crate::tryon::SynthesisError;

    struct FixedSynthesizer(Option<ImagePayload>);

    impl ImageSynthesizer for FixedSynthesizer {
        async fn synthesize(
            &self,
            _request: &SynthesisRequest,
        ) -> std::result::Result<ImagePayload, SynthesisError> {
            self.0.clone().ok_or(SynthesisError::NoImage)
        }
    }

    fn request(id: &str, photo: &str) -> TryOnRequest {
        TryOnRequest {
            product_id: ProductId::new(id),
            photo: photo.to_string(),
        }
    }

    #[test]
    fn test_request_uses_catalog_garment() {
        let catalog = sample_catalog();
        let synthesis =
            synthesis_request(&catalog, &request("p1", "data:image/jpeg;base64,bWU=")).unwrap();

        assert_eq!(
            synthesis.user_image,
            ImageSource::Inline(ImagePayload::from_bytes("image/jpeg", b"me").unwrap())
        );
        let garment = catalog.get(&ProductId::new("p1")).unwrap().primary_image().unwrap();
        assert_eq!(synthesis.garment_image, ImageSource::Remote(garment.to_string()));
        assert!(synthesis.instruction.contains("Product p1"));
    }

    #[test]
    fn test_bad_requests() {
        let catalog = sample_catalog();
        assert!(matches!(
            synthesis_request(&catalog, &request("ghost", "data:image/jpeg;base64,bWU=")),
            Err(AppError::BadRequest(msg)) if msg.contains("ghost")
        ));
        assert!(matches!(
            synthesis_request(&catalog, &request("p1", "not a data url")),
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_look_returned_as_data_url() {
        let look = ImagePayload::from_bytes("image/png", b"look").unwrap();
        let synthesis =
            synthesis_request(&sample_catalog(), &request("p1", "data:image/jpeg;base64,bWU="))
                .unwrap();

        let response = synthesize_look(&FixedSynthesizer(Some(look)), &synthesis)
            .await
            .unwrap();
        assert_eq!(response.image, "data:image/png;base64,bG9vaw==");

        let failed = synthesize_look(&FixedSynthesizer(None), &synthesis).await;
        assert!(matches!(failed, Err(AppError::TryOn(SynthesisError::NoImage))));
    }
}
