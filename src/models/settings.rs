//! Site-wide configuration document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::db::{Fields, FieldValue, WriteFields};
use crate::images::{ImageReference, UploadPayload};

/// Collection and id of the singleton configuration document.
pub const SETTINGS_COLLECTION: &str = "settings";
pub const SETTINGS_ID: &str = "general";

/// Page whose hero banner is configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BannerSlot {
    Home,
    About,
    Services,
    Shop,
    News,
    Contact,
}

impl BannerSlot {
    pub const ALL: [BannerSlot; 6] = [
        BannerSlot::Home,
        BannerSlot::About,
        BannerSlot::Services,
        BannerSlot::Shop,
        BannerSlot::News,
        BannerSlot::Contact,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BannerSlot::Home => "home",
            BannerSlot::About => "about",
            BannerSlot::Services => "services",
            BannerSlot::Shop => "shop",
            BannerSlot::News => "news",
            BannerSlot::Contact => "contact",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.as_str() == s)
    }

    /// Document field holding this slot's image.
    pub fn field(&self) -> String {
        format!("heroImage_{}", self.as_str())
    }
}

/// The configuration document as read by the storefront.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteConfig {
    pub contact_phone: String,
    pub contact_email: String,
    pub contact_address: String,
    pub zalo_link: String,
    pub logo: String,
    #[serde(rename = "heroImage_home")]
    pub hero_image_home: String,
    #[serde(rename = "heroImage_about")]
    pub hero_image_about: String,
    #[serde(rename = "heroImage_services")]
    pub hero_image_services: String,
    #[serde(rename = "heroImage_shop")]
    pub hero_image_shop: String,
    #[serde(rename = "heroImage_news")]
    pub hero_image_news: String,
    #[serde(rename = "heroImage_contact")]
    pub hero_image_contact: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl SiteConfig {
    pub fn from_fields(fields: Fields) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(fields))
    }

    pub fn hero_image(&self, slot: BannerSlot) -> &str {
        match slot {
            BannerSlot::Home => &self.hero_image_home,
            BannerSlot::About => &self.hero_image_about,
            BannerSlot::Services => &self.hero_image_services,
            BannerSlot::Shop => &self.hero_image_shop,
            BannerSlot::News => &self.hero_image_news,
            BannerSlot::Contact => &self.hero_image_contact,
        }
    }

    /// Banner for `slot`, falling back to the home banner when the slot is empty.
    pub fn banner(&self, slot: BannerSlot) -> &str {
        let image = self.hero_image(slot);
        if image.trim().is_empty() {
            &self.hero_image_home
        } else {
            image
        }
    }
}

/// Banner part of a settings save.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerForm {
    pub image: Option<ImageReference>,
    pub image_file: Option<UploadPayload>,
}

/// A partial settings save. Absent fields are left as stored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsForm {
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub contact_address: Option<String>,
    pub zalo_link: Option<String>,
    pub logo: Option<ImageReference>,
    pub logo_file: Option<UploadPayload>,
    /// Keyed by slot name
    #[serde(default)]
    pub banners: BTreeMap<String, BannerForm>,
}

impl SettingsForm {
    /// Resolve banner slot names, rejecting unknown slots.
    pub fn banner_slots(&mut self) -> Result<Vec<(BannerSlot, BannerForm)>, String> {
        std::mem::take(&mut self.banners)
            .into_iter()
            .map(|(name, form)| {
                BannerSlot::from_str(&name)
                    .map(|slot| (slot, form))
                    .ok_or_else(|| format!("Unknown banner slot: {}", name))
            })
            .collect()
    }

    /// Whether the logo is part of this save.
    pub fn touches_logo(&self) -> bool {
        self.logo.is_some() || self.logo_file.is_some()
    }

    /// Build the merge write from the text fields and already resolved images.
    pub fn into_write(
        self,
        logo: Option<ImageReference>,
        banners: Vec<(BannerSlot, ImageReference)>,
    ) -> WriteFields {
        let mut write = WriteFields::new();

        let text = [
            ("contactPhone", self.contact_phone),
            ("contactEmail", self.contact_email),
            ("contactAddress", self.contact_address),
            ("zaloLink", self.zalo_link),
        ];
        for (key, value) in text {
            if let Some(value) = value {
                write.insert(key.to_string(), value.trim().to_string().into());
            }
        }

        if let Some(logo) = logo {
            write.insert("logo".to_string(), logo.into_string().into());
        }
        for (slot, image) in banners {
            write.insert(slot.field(), image.into_string().into());
        }

        write.insert("updatedAt".to_string(), FieldValue::ServerTimestamp);
        write
    }
}
