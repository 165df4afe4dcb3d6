use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What a collection run should pull from the supplier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionType {
    /// The supplier's full catalog.
    Full,
    /// Only recently registered products.
    NewArrivals,
    /// Products matching a supplier-side keyword search.
    Keyword(String),
}

impl CollectionType {
    /// Stable string form persisted on collection batches.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionType::Full => "full",
            CollectionType::NewArrivals => "new_arrivals",
            CollectionType::Keyword(_) => "keyword",
        }
    }

    #[must_use]
    pub fn keyword(&self) -> Option<&str> {
        match self {
            CollectionType::Keyword(kw) => Some(kw.as_str()),
            _ => None,
        }
    }
}

/// Coarse availability bucket derived from supplier stock data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Available,
    Limited,
    OutOfStock,
}

impl StockStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StockStatus::Available => "available",
            StockStatus::Limited => "limited",
            StockStatus::OutOfStock => "out_of_stock",
        }
    }

    /// Parse the persisted string form; unknown values fall back to
    /// `Available` rather than failing a read path.
    #[must_use]
    pub fn parse(s: &str) -> StockStatus {
        match s {
            "limited" => StockStatus::Limited,
            "out_of_stock" => StockStatus::OutOfStock,
            _ => StockStatus::Available,
        }
    }

    /// Derive the bucket from a quantity and an availability flag.
    ///
    /// A known quantity wins over the flag: 0 is out of stock, 1–10 is
    /// limited, anything above is available. Without a quantity the
    /// supplier's own flag decides.
    #[must_use]
    pub fn derive(quantity: Option<i32>, is_available: bool) -> StockStatus {
        match quantity {
            Some(q) if q <= 0 => StockStatus::OutOfStock,
            Some(q) if q <= 10 => StockStatus::Limited,
            Some(_) => StockStatus::Available,
            None if is_available => StockStatus::Available,
            None => StockStatus::OutOfStock,
        }
    }

    #[must_use]
    pub fn is_in_stock(self) -> bool {
        !matches!(self, StockStatus::OutOfStock)
    }
}

/// Lifecycle state of a collected product row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    /// Freshly collected, awaiting review/sourcing.
    Collected,
    /// Promoted into the main catalog; sync keeps tracking price/stock
    /// but never changes this status.
    Sourced,
    Rejected,
    /// Not observed within the retention window.
    Expired,
}

impl ProductStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProductStatus::Collected => "collected",
            ProductStatus::Sourced => "sourced",
            ProductStatus::Rejected => "rejected",
            ProductStatus::Expired => "expired",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> ProductStatus {
        match s {
            "sourced" => ProductStatus::Sourced,
            "rejected" => ProductStatus::Rejected,
            "expired" => ProductStatus::Expired,
            _ => ProductStatus::Collected,
        }
    }
}

/// Kinds of audit events recorded in product history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    PriceChange,
    StockChange,
    StatusChange,
    InfoUpdate,
    NewCollection,
}

impl ChangeType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::PriceChange => "price_change",
            ChangeType::StockChange => "stock_change",
            ChangeType::StatusChange => "status_change",
            ChangeType::InfoUpdate => "info_update",
            ChangeType::NewCollection => "new_collection",
        }
    }
}

/// One product as yielded by a wholesaler client stream.
///
/// Prices are normalized to [`Decimal`] during adapter parsing; everything
/// the adapter cannot map onto a typed field stays available in `raw_data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductData {
    /// The supplier's native product key.
    pub supplier_product_id: String,
    pub name: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    /// Unit price charged to the reseller.
    pub wholesale_price: Option<Decimal>,
    /// Supplier-suggested selling price.
    pub retail_price: Decimal,
    pub stock_quantity: Option<i32>,
    pub is_in_stock: bool,
    pub minimum_order_quantity: Option<i32>,
    pub main_image_url: Option<String>,
    pub additional_images: Vec<String>,
    pub options: Vec<ProductOption>,
    pub variants: Vec<ProductVariant>,
    pub shipping_info: serde_json::Value,
    /// Supplier category path, outermost first.
    pub category_path: Vec<String>,
    pub raw_data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductOption {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductVariant {
    pub variant_id: Option<String>,
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub stock_quantity: Option<i32>,
}

impl ProductData {
    /// The raw category string used for mapping and persisted in the
    /// `category` column: path segments joined with " > ".
    #[must_use]
    pub fn raw_category(&self) -> String {
        self.category_path.join(" > ")
    }

    #[must_use]
    pub fn stock_status(&self) -> StockStatus {
        StockStatus::derive(self.stock_quantity, self.is_in_stock)
    }

    /// Content completeness score in [0, 10].
    ///
    /// Base 5.0, plus 1.0 for each of: a main image, a description longer
    /// than 20 characters, in-stock quantity above zero, and more than one
    /// variant; plus 0.5 each for additional images and options. Clamped
    /// at 10.0 so future bonuses cannot push it out of range.
    #[must_use]
    pub fn quality_score(&self) -> f64 {
        let mut score: f64 = 5.0;

        if self.main_image_url.as_deref().is_some_and(|u| !u.is_empty()) {
            score += 1.0;
        }
        if self
            .description
            .as_deref()
            .is_some_and(|d| d.chars().count() > 20)
        {
            score += 1.0;
        }
        if self.is_in_stock && self.stock_quantity.is_some_and(|q| q > 0) {
            score += 1.0;
        }
        if self.variants.len() > 1 {
            score += 1.0;
        }
        if !self.additional_images.is_empty() {
            score += 0.5;
        }
        if !self.options.is_empty() {
            score += 0.5;
        }

        score.min(10.0)
    }
}

/// Point-in-time stock answer from a supplier's stock endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StockInfo {
    pub quantity: Option<i32>,
    pub is_available: bool,
}

impl StockInfo {
    #[must_use]
    pub fn status(self) -> StockStatus {
        StockStatus::derive(self.quantity, self.is_available)
    }
}
