//! OwnerClan wholesale API client.
//!
//! JSON REST API with bearer-token auth. The catalog is paged with opaque
//! cursors (`items` + `next_cursor`); stock lives on a per-item endpoint.

use domae_core::{CollectionType, ProductData, ProductOption, ProductVariant, StockInfo, Supplier};
use futures::stream::BoxStream;
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::SupplierError;
use crate::http::{build_client, check_status, display_url, normalize_base_url};
use crate::pagination::{paginate, PageFetch};
use crate::retry::retry_with_backoff;
use crate::{split_category_path, ClientConfig};

const DEFAULT_BASE_URL: &str = "https://api.ownerclan.com/";
const PAGE_SIZE: u32 = 100;

/// Client for the OwnerClan wholesale API.
///
/// Use [`OwnerclanClient::new`] for production or
/// [`OwnerclanClient::with_base_url`] to point at a mock server in tests.
#[derive(Debug)]
pub struct OwnerclanClient {
    client: Client,
    api_key: String,
    base_url: Url,
    max_retries: u32,
    backoff_base_secs: u64,
    inter_request_delay_ms: u64,
}

#[derive(Debug, Deserialize)]
struct ProductsPage {
    #[serde(default)]
    items: Vec<serde_json::Value>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireItem {
    key: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    brand: Option<String>,
    #[serde(default)]
    category: Option<String>,
    /// Wholesale unit price in whole KRW.
    price: i64,
    /// Suggested retail price in whole KRW.
    #[serde(default)]
    fixed_price: Option<i64>,
    #[serde(default)]
    stock: Option<i32>,
    /// `"available"` or `"soldout"`.
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    min_order: Option<i32>,
    #[serde(default)]
    images: Vec<String>,
    #[serde(default)]
    options: Vec<WireOption>,
    #[serde(default)]
    variants: Vec<WireVariant>,
    #[serde(default)]
    shipping: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WireOption {
    name: String,
    #[serde(default)]
    values: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WireVariant {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    price: Option<i64>,
    #[serde(default)]
    stock: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct StockBody {
    #[serde(default)]
    quantity: Option<i32>,
    is_available: bool,
}

impl OwnerclanClient {
    /// Creates a client pointed at the production OwnerClan API (or the
    /// base-URL override carried in `config`).
    ///
    /// # Errors
    ///
    /// Returns [`SupplierError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`SupplierError::InvalidBaseUrl`] for a
    /// malformed override.
    pub fn new(config: &ClientConfig) -> Result<Self, SupplierError> {
        let base = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        Self::with_base_url(config, base)
    }

    /// Creates a client with an explicit base URL (for wiremock tests).
    ///
    /// # Errors
    ///
    /// Same as [`OwnerclanClient::new`].
    pub fn with_base_url(config: &ClientConfig, base_url: &str) -> Result<Self, SupplierError> {
        Ok(Self {
            client: build_client(config.timeout_secs, &config.user_agent)?,
            api_key: config.api_key.clone(),
            base_url: normalize_base_url(base_url)?,
            max_retries: config.max_retries,
            backoff_base_secs: config.backoff_base_secs,
            inter_request_delay_ms: config.inter_request_delay_ms,
        })
    }

    /// Minimal connectivity and credential probe: fetches one catalog item.
    ///
    /// # Errors
    ///
    /// Propagates the typed error for whatever went wrong, notably
    /// [`SupplierError::AuthRejected`] for a bad key.
    pub async fn ping(&self) -> Result<(), SupplierError> {
        self.fetch_products_page(&CollectionType::Full, None, 1)
            .await
            .map(|_| ())
    }

    /// Streams the catalog as [`ProductData`] items, following cursors until
    /// the supplier stops handing them out or `max_products` successful items
    /// have been yielded (`0` = unlimited).
    ///
    /// Malformed catalog entries surface as [`SupplierError::InvalidItem`]
    /// stream elements; a page-level failure ends the stream after one final
    /// `Err` element.
    pub fn collect_products(
        &self,
        collection_type: &CollectionType,
        max_products: usize,
    ) -> BoxStream<'_, Result<ProductData, SupplierError>> {
        let collection_type = collection_type.clone();
        paginate(
            Supplier::Ownerclan,
            None::<String>,
            max_products,
            self.inter_request_delay_ms,
            move |cursor| {
                let collection_type = collection_type.clone();
                async move {
                    self.fetch_products_page(&collection_type, cursor, PAGE_SIZE)
                        .await
                }
            },
        )
    }

    /// Fetches current stock for one product.
    ///
    /// # Errors
    ///
    /// [`SupplierError::NotFound`] for an unknown id; otherwise the usual
    /// transport/status/parse errors.
    pub async fn get_product_stock(
        &self,
        supplier_product_id: &str,
    ) -> Result<StockInfo, SupplierError> {
        let url = self.endpoint(&["v1", "products", supplier_product_id, "stock"])?;
        let body = retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            let url = url.clone();
            async move {
                let response = self
                    .client
                    .get(url.clone())
                    .bearer_auth(&self.api_key)
                    .send()
                    .await?;
                let response = check_status(Supplier::Ownerclan, response)?;
                let text = response.text().await?;
                serde_json::from_str::<StockBody>(&text).map_err(|e| {
                    SupplierError::Deserialize {
                        context: display_url(&url),
                        source: e,
                    }
                })
            }
        })
        .await?;

        Ok(StockInfo {
            quantity: body.quantity,
            is_available: body.is_available,
        })
    }

    async fn fetch_products_page(
        &self,
        collection_type: &CollectionType,
        cursor: Option<String>,
        limit: u32,
    ) -> Result<PageFetch<Option<String>>, SupplierError> {
        let mut url = self.endpoint(&["v1", "products"])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("limit", &limit.to_string());
            match collection_type {
                CollectionType::Full => {}
                CollectionType::NewArrivals => {
                    pairs.append_pair("sort", "newest");
                }
                CollectionType::Keyword(kw) => {
                    pairs.append_pair("search", kw);
                }
            }
            if let Some(cursor) = &cursor {
                pairs.append_pair("cursor", cursor);
            }
        }

        let page = retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            let url = url.clone();
            async move {
                let response = self
                    .client
                    .get(url.clone())
                    .bearer_auth(&self.api_key)
                    .send()
                    .await?;
                let response = check_status(Supplier::Ownerclan, response)?;
                let body = response.text().await?;
                serde_json::from_str::<ProductsPage>(&body).map_err(|e| {
                    SupplierError::Deserialize {
                        context: display_url(&url),
                        source: e,
                    }
                })
            }
        })
        .await?;

        let next = page.next_cursor.filter(|c| !c.is_empty()).map(Some);
        Ok(PageFetch {
            items: page.items.into_iter().map(item_to_product).collect(),
            next,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, SupplierError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| SupplierError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: "cannot be a base".to_owned(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn item_to_product(value: serde_json::Value) -> Result<ProductData, SupplierError> {
    let raw = value.clone();
    let invalid_id = || {
        raw.get("key")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("<missing key>")
            .to_owned()
    };

    let item: WireItem =
        serde_json::from_value(value).map_err(|e| SupplierError::InvalidItem {
            supplier_product_id: invalid_id(),
            reason: e.to_string(),
        })?;

    if item.key.trim().is_empty() || item.name.trim().is_empty() {
        return Err(SupplierError::InvalidItem {
            supplier_product_id: invalid_id(),
            reason: "empty key or name".to_owned(),
        });
    }

    let is_in_stock = item.status.as_deref() != Some("soldout") && item.stock != Some(0);
    let category_path = item
        .category
        .as_deref()
        .map(split_category_path)
        .unwrap_or_default();
    let mut images = item.images.into_iter();
    let main_image_url = images.next();
    let additional_images: Vec<String> = images.collect();

    Ok(ProductData {
        supplier_product_id: item.key,
        name: item.name,
        description: item.description,
        brand: item.brand,
        wholesale_price: Some(Decimal::from(item.price)),
        retail_price: Decimal::from(item.fixed_price.unwrap_or(item.price)),
        stock_quantity: item.stock,
        is_in_stock,
        minimum_order_quantity: item.min_order,
        main_image_url,
        additional_images,
        options: item
            .options
            .into_iter()
            .map(|o| ProductOption {
                name: o.name,
                values: o.values,
            })
            .collect(),
        variants: item
            .variants
            .into_iter()
            .map(|v| ProductVariant {
                variant_id: v.key,
                name: v.name,
                price: v.price.map(Decimal::from),
                stock_quantity: v.stock,
            })
            .collect(),
        shipping_info: item.shipping,
        category_path,
        raw_data: raw,
    })
}
