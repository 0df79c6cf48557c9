//! Site configuration endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::images::{ImageReference, LogProgress};
use crate::models::{BannerSlot, SettingsForm, SiteConfig, SETTINGS_COLLECTION, SETTINGS_ID};
use crate::AppState;

/// Storage prefix for logo and banner uploads.
const SETTINGS_IMAGE_PREFIX: &str = "settings";

/// Resolved banner of a page.
#[derive(Debug, Serialize)]
pub struct Banner {
    pub slot: &'static str,
    pub image: String,
}

async fn load_config(state: &AppState) -> Result<SiteConfig, AppError> {
    match state.store.get(SETTINGS_COLLECTION, SETTINGS_ID).await? {
        Some(doc) => Ok(SiteConfig::from_fields(doc.fields)?),
        None => Ok(SiteConfig::default()),
    }
}

/// GET /api/settings - Get the site configuration, empty when never saved.
pub async fn get_settings(State(state): State<AppState>) -> ApiResult<SiteConfig> {
    success(load_config(&state).await?)
}

/// GET /api/settings/banner/:slot - Get a page banner, falling back to the home banner.
pub async fn get_banner(
    State(state): State<AppState>,
    Path(slot): Path<String>,
) -> ApiResult<Banner> {
    let slot = BannerSlot::from_str(&slot)
        .ok_or_else(|| AppError::NotFound(format!("Banner slot {} not found", slot)))?;
    let config = load_config(&state).await?;

    success(Banner {
        slot: slot.as_str(),
        image: config.banner(slot).to_string(),
    })
}

/// PUT /api/settings - Merge a partial configuration into the stored document.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(mut form): Json<SettingsForm>,
) -> ApiResult<SiteConfig> {
    // Decode every payload before touching storage
    let banner_forms = form.banner_slots().map_err(AppError::Validation)?;
    let logo_file = form
        .logo_file
        .take()
        .map(|payload| payload.decode())
        .transpose()
        .map_err(AppError::Validation)?;
    let mut banner_files = Vec::with_capacity(banner_forms.len());
    for (slot, banner) in banner_forms {
        let file = banner
            .image_file
            .as_ref()
            .map(|payload| payload.decode())
            .transpose()
            .map_err(AppError::Validation)?;
        banner_files.push((slot, banner.image, file));
    }

    let current = load_config(&state).await?;

    let logo = if form.touches_logo() || logo_file.is_some() {
        let existing = form
            .logo
            .take()
            .unwrap_or_else(|| ImageReference::new(current.logo.clone()));
        let progress = LogProgress::new("settings logo");
        Some(
            state
                .images
                .resolve_image(logo_file, existing, SETTINGS_IMAGE_PREFIX, &progress)
                .await?,
        )
    } else {
        None
    };

    // Banners upload one after another
    let mut banners = Vec::with_capacity(banner_files.len());
    for (slot, image, file) in banner_files {
        let existing =
            image.unwrap_or_else(|| ImageReference::new(current.hero_image(slot).to_string()));
        let progress = LogProgress::new(format!("banner {}", slot.as_str()));
        let resolved = state
            .images
            .resolve_image(file, existing, SETTINGS_IMAGE_PREFIX, &progress)
            .await?;
        banners.push((slot, resolved));
    }

    state
        .store
        .set_merge(SETTINGS_COLLECTION, SETTINGS_ID, form.into_write(logo, banners))
        .await?;
    tracing::info!("Saved site configuration");

    success(load_config(&state).await?)
}
