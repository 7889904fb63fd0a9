use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{Result, ShopError};
use crate::types::{generate_promo_id, AddressChoice, CollectorRef, ProductId, Role, UserId};

/// catalog product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// cost price the installment is computed from
    pub principal: Money,
    #[serde(default)]
    pub images: Vec<String>,
}

impl Product {
    pub fn cover_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// product form input
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub principal: Money,
    pub images: Vec<String>,
}

impl ProductDraft {
    /// split a comma separated url list, dropping blanks
    pub fn parse_images(list: &str) -> Vec<String> {
        list.split(',')
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ShopError::missing_field("name"));
        }
        if !self.principal.is_positive() || !self.principal.is_whole() {
            return Err(ShopError::InvalidAmount { amount: self.principal });
        }
        if self.images.iter().all(|url| url.trim().is_empty()) {
            return Err(ShopError::missing_field("images"));
        }
        Ok(())
    }

    /// validated product with a fresh identifier
    pub fn into_product(self) -> Result<Product> {
        self.into_product_with_id(ProductId::generate())
    }

    /// validated product keeping an existing identifier
    pub fn into_product_with_id(self, id: ProductId) -> Result<Product> {
        self.validate()?;
        Ok(Product {
            id,
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            principal: self.principal,
            images: self
                .images
                .into_iter()
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty())
                .collect(),
        })
    }
}

/// consumer profile fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConsumerProfile {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub business_type: String,
    #[serde(default)]
    pub home_address: String,
    #[serde(default)]
    pub business_address: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub national_id: String,
    /// referring sales agent, optional
    #[serde(default)]
    pub sales_name: String,
}

impl ConsumerProfile {
    /// fields that block ordering while empty
    pub fn missing_for_ordering(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.full_name.trim().is_empty() {
            missing.push("full_name".to_string());
        }
        if self.phone.trim().is_empty() {
            missing.push("phone".to_string());
        }
        missing
    }

    pub fn can_order(&self) -> bool {
        self.missing_for_ordering().is_empty()
    }

    /// full validation applied when the profile form is saved
    pub fn validate_for_save(&self) -> Result<()> {
        let required = [
            ("full_name", &self.full_name),
            ("business_type", &self.business_type),
            ("home_address", &self.home_address),
            ("business_address", &self.business_address),
            ("phone", &self.phone),
            ("national_id", &self.national_id),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ShopError::missing_field(field));
            }
        }
        Ok(())
    }

    pub fn address(&self, choice: AddressChoice) -> &str {
        match choice {
            AddressChoice::Home => &self.home_address,
            AddressChoice::Business => &self.business_address,
        }
    }
}

/// user record, keyed by identity uid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub profile: ConsumerProfile,
}

impl UserRecord {
    /// record created at self-registration
    pub fn new_consumer(email: &str) -> Self {
        Self {
            email: email.to_string(),
            role: Role::Consumer,
            name: email.to_string(),
            profile: ConsumerProfile {
                full_name: email.to_string(),
                ..ConsumerProfile::default()
            },
        }
    }

    /// name shown to other roles: full name, else the email
    pub fn display_name(&self) -> &str {
        if !self.profile.full_name.trim().is_empty() {
            &self.profile.full_name
        } else if !self.name.trim().is_empty() {
            &self.name
        } else {
            &self.email
        }
    }

    pub fn collector_ref(&self, uid: &UserId) -> CollectorRef {
        CollectorRef {
            uid: uid.clone(),
            name: self.display_name().to_string(),
        }
    }
}

/// one-way notice from the administrator to all consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broadcast {
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

/// promo media kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PromoKind {
    #[default]
    Image,
    /// embeddable video url
    Video,
}

/// promo content shown on the storefront
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promo {
    pub id: String,
    pub kind: PromoKind,
    pub url: String,
}

impl Promo {
    pub fn new(kind: PromoKind, url: &str) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ShopError::missing_field("url"));
        }
        Ok(Self {
            id: generate_promo_id(),
            kind,
            url: url.to_string(),
        })
    }

    /// storefront content installed into an empty promos collection
    pub fn defaults() -> Vec<Promo> {
        [
            (PromoKind::Image, "https://images2.imgbox.com/bc/6e/auiVPjLj_o.jpeg"),
            (PromoKind::Video, "https://www.youtube.com/embed/ScMzIvxBSi4"),
            (PromoKind::Image, "https://images2.imgbox.com/d8/21/CaAGurXT_o.jpeg"),
        ]
        .into_iter()
        .map(|(kind, url)| Self {
            id: generate_promo_id(),
            kind,
            url: url.to_string(),
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn complete_profile() -> ConsumerProfile {
        ConsumerProfile {
            full_name: "Siti Aminah".to_string(),
            business_type: "Warung".to_string(),
            home_address: "Jl. Melati 4".to_string(),
            business_address: "Pasar Baru 12".to_string(),
            phone: "08123456789".to_string(),
            national_id: "3273000000000001".to_string(),
            sales_name: String::new(),
        }
    }

    #[test]
    fn test_product_draft_validation() {
        let draft = ProductDraft {
            name: "Etalase Kaca".to_string(),
            description: String::new(),
            principal: Money::from_major(1_500_000),
            images: ProductDraft::parse_images(" https://img/a.jpg, ,https://img/b.jpg "),
        };
        let product = draft.clone().into_product().unwrap();
        assert_eq!(product.images, vec!["https://img/a.jpg", "https://img/b.jpg"]);
        assert_eq!(product.cover_image(), Some("https://img/a.jpg"));
        assert!(product.id.as_str().starts_with("PRD-"));

        let nameless = ProductDraft { name: "  ".to_string(), ..draft.clone() };
        assert_matches!(nameless.validate(), Err(ShopError::MissingField { .. }));

        let free = ProductDraft { principal: Money::ZERO, ..draft.clone() };
        assert_matches!(free.validate(), Err(ShopError::InvalidAmount { .. }));

        let imageless = ProductDraft { images: vec![], ..draft };
        assert_matches!(imageless.validate(), Err(ShopError::MissingField { .. }));
    }

    #[test]
    fn test_ordering_gate_needs_name_and_phone() {
        let mut profile = complete_profile();
        assert!(profile.can_order());

        profile.phone = " ".to_string();
        assert_eq!(profile.missing_for_ordering(), vec!["phone".to_string()]);

        profile.full_name.clear();
        assert_eq!(profile.missing_for_ordering().len(), 2);
    }

    #[test]
    fn test_profile_save_requires_all_but_sales_name() {
        let profile = complete_profile();
        assert!(profile.validate_for_save().is_ok());

        let no_ktp = ConsumerProfile { national_id: String::new(), ..profile };
        assert_matches!(
            no_ktp.validate_for_save(),
            Err(ShopError::MissingField { field }) if field == "national_id"
        );
    }

    #[test]
    fn test_user_record_layout() {
        let record = UserRecord::new_consumer("siti@example.com");
        assert_eq!(record.display_name(), "siti@example.com");

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["role"], "consumer");
        assert_eq!(value["full_name"], "siti@example.com");
        assert_eq!(value["phone"], "");

        // sparse records decode with empty profile fields
        let sparse: UserRecord =
            serde_json::from_str(r#"{"email":"budi@example.com","role":"collector"}"#).unwrap();
        assert_eq!(sparse.display_name(), "budi@example.com");
        assert_eq!(sparse.profile, ConsumerProfile::default());
    }

    #[test]
    fn test_promo_requires_url() {
        assert_matches!(Promo::new(PromoKind::Video, "   "), Err(ShopError::MissingField { .. }));
        let promo = Promo::new(PromoKind::Image, " https://img/promo.jpg ").unwrap();
        assert_eq!(promo.url, "https://img/promo.jpg");
    }
}
