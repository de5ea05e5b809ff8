//! Product variant: the record a product-detail editor buffers and autosaves.

use serde::{Deserialize, Serialize};

use shopdesk_core::{DomainError, DomainResult, EditableEntity, Entity, ProductId, SkuId};

use crate::ledger::StockLedger;

/// A sellable variant of a product, with its stock ledger.
///
/// Prices are stored in minor units exactly as entered; nothing here converts
/// currencies or computes tax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
    pub id: SkuId,
    pub product_id: ProductId,
    pub product_title: String,
    pub option_title: String,
    pub sku_code: String,
    pub barcode: Option<String>,
    pub price_cents: i64,
    pub track_quantity: bool,
    pub ledger: StockLedger,
}

impl ProductVariant {
    pub fn new(
        id: SkuId,
        product_id: ProductId,
        product_title: impl Into<String>,
        option_title: impl Into<String>,
        sku_code: impl Into<String>,
    ) -> Self {
        Self {
            id,
            product_id,
            product_title: product_title.into(),
            option_title: option_title.into(),
            sku_code: sku_code.into(),
            barcode: None,
            price_cents: 0,
            track_quantity: true,
            ledger: StockLedger::default(),
        }
    }

    pub fn with_ledger(mut self, ledger: StockLedger) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn with_price_cents(mut self, price_cents: i64) -> Self {
        self.price_cents = price_cents;
        self
    }

    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    /// "Product / Option", or just the product title for single-variant products.
    pub fn display_name(&self) -> String {
        let option = self.option_title.trim();
        if option.is_empty() || option.eq_ignore_ascii_case("default") {
            self.product_title.clone()
        } else {
            format!("{} / {}", self.product_title, option)
        }
    }

    /// Field-level checks an editor runs before handing the record to autosave.
    pub fn validate(&self) -> DomainResult<()> {
        if self.sku_code.trim().is_empty() {
            return Err(DomainError::validation("sku code cannot be empty"));
        }
        if self.product_title.trim().is_empty() {
            return Err(DomainError::validation("product title cannot be empty"));
        }
        if self.price_cents < 0 {
            return Err(DomainError::validation("price cannot be negative"));
        }
        Ok(())
    }
}

impl Entity for ProductVariant {
    type Id = SkuId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl EditableEntity for ProductVariant {}
