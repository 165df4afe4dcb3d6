//! Domeme open API client.
//!
//! JSON API with the key passed as the `aid` query parameter. Every response
//! is wrapped in a `domeme.header/list` envelope whose `header.code` carries
//! the application-level result; catalog pages are numbered and sized, with
//! `header.total_count` driving pagination. Stock is read through the
//! item-view endpoint.

use domae_core::{CollectionType, ProductData, StockInfo, Supplier};
use futures::stream::BoxStream;
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::SupplierError;
use crate::http::{build_client, check_status, display_url, normalize_base_url};
use crate::pagination::{paginate, PageFetch};
use crate::retry::retry_with_backoff;
use crate::{split_category_path, ClientConfig};

const DEFAULT_BASE_URL: &str = "https://openapi.domeme.com/";
const PAGE_SIZE: u32 = 100;

/// Client for the Domeme open API.
#[derive(Debug)]
pub struct DomemeClient {
    client: Client,
    api_key: String,
    base_url: Url,
    max_retries: u32,
    backoff_base_secs: u64,
    inter_request_delay_ms: u64,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    domeme: Payload,
}

#[derive(Debug, Deserialize)]
struct Payload {
    header: Header,
    #[serde(default)]
    list: Vec<serde_json::Value>,
    #[serde(default)]
    item: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Header {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    total_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireItem {
    /// Product number; doubles as the supplier product id.
    no: i64,
    title: String,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    maker: Option<String>,
    #[serde(default)]
    category_full: Option<String>,
    /// Wholesale unit price in whole KRW.
    supply_price: i64,
    /// Listed sale price in whole KRW.
    #[serde(default)]
    sell_price: Option<i64>,
    #[serde(default)]
    stock_qty: Option<i32>,
    /// `"Y"` once the listing is sold out.
    #[serde(default)]
    sold_out: Option<String>,
    #[serde(default)]
    min_qty: Option<i32>,
    #[serde(default)]
    img: Option<String>,
    #[serde(default)]
    add_imgs: Vec<String>,
    #[serde(default)]
    delivery: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct StockFields {
    #[serde(default)]
    stock_qty: Option<i32>,
    #[serde(default)]
    sold_out: Option<String>,
}

impl DomemeClient {
    /// Creates a client pointed at the production Domeme API (or the
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
    /// Same as [`DomemeClient::new`].
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
    /// [`SupplierError::ApiError`] when the envelope reports a bad key.
    pub async fn ping(&self) -> Result<(), SupplierError> {
        self.fetch_list_page(&CollectionType::Full, 1, 1)
            .await
            .map(|_| ())
    }

    /// Streams the catalog as [`ProductData`] items across numbered pages
    /// until `header.total_count` is exhausted or `max_products` successful
    /// items have been yielded (`0` = unlimited).
    pub fn collect_products(
        &self,
        collection_type: &CollectionType,
        max_products: usize,
    ) -> BoxStream<'_, Result<ProductData, SupplierError>> {
        let collection_type = collection_type.clone();
        paginate(
            Supplier::Domeme,
            1u32,
            max_products,
            self.inter_request_delay_ms,
            move |page| {
                let collection_type = collection_type.clone();
                async move { self.fetch_list_page(&collection_type, page, PAGE_SIZE).await }
            },
        )
    }

    /// Reads current stock through the item-view endpoint.
    ///
    /// # Errors
    ///
    /// [`SupplierError::ApiError`] when the envelope reports a failure or
    /// carries no item; otherwise the usual transport/status/parse errors.
    pub async fn get_product_stock(
        &self,
        supplier_product_id: &str,
    ) -> Result<StockInfo, SupplierError> {
        let mut url = self.endpoint(&["open", "productView.do"])?;
        url.query_pairs_mut()
            .append_pair("aid", &self.api_key)
            .append_pair("no", supplier_product_id);

        let payload = self.request_envelope(&url).await?;
        let Some(item) = payload.item else {
            return Err(SupplierError::ApiError(format!(
                "productView returned no item for no={supplier_product_id}"
            )));
        };
        let fields: StockFields =
            serde_json::from_value(item).map_err(|e| SupplierError::Deserialize {
                context: display_url(&url),
                source: e,
            })?;

        Ok(StockInfo {
            quantity: fields.stock_qty,
            is_available: fields.sold_out.as_deref() != Some("Y"),
        })
    }

    async fn fetch_list_page(
        &self,
        collection_type: &CollectionType,
        page: u32,
        size: u32,
    ) -> Result<PageFetch<u32>, SupplierError> {
        let mut url = self.endpoint(&["open", "searchProductList.do"])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("aid", &self.api_key);
            pairs.append_pair("page", &page.to_string());
            pairs.append_pair("size", &size.to_string());
            match collection_type {
                // "rd" = recently updated, "ne" = newly registered.
                CollectionType::Full => {
                    pairs.append_pair("so", "rd");
                }
                CollectionType::NewArrivals => {
                    pairs.append_pair("so", "ne");
                }
                CollectionType::Keyword(kw) => {
                    pairs.append_pair("kw", kw);
                }
            }
        }

        let payload = self.request_envelope(&url).await?;
        let total = payload.header.total_count.unwrap_or(0);
        let fetched_through = u64::from(page) * u64::from(size);
        let next = if fetched_through < u64::from(total) && !payload.list.is_empty() {
            Some(page + 1)
        } else {
            None
        };

        Ok(PageFetch {
            items: payload.list.into_iter().map(item_to_product).collect(),
            next,
        })
    }

    /// Sends a GET, maps HTTP status, parses the `domeme` envelope, and
    /// turns a non-zero `header.code` into [`SupplierError::ApiError`].
    async fn request_envelope(&self, url: &Url) -> Result<Payload, SupplierError> {
        let payload = retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            let url = url.clone();
            async move {
                let response = self.client.get(url.clone()).send().await?;
                let response = check_status(Supplier::Domeme, response)?;
                let body = response.text().await?;
                let envelope: Envelope =
                    serde_json::from_str(&body).map_err(|e| SupplierError::Deserialize {
                        context: display_url(&url),
                        source: e,
                    })?;
                Ok(envelope.domeme)
            }
        })
        .await?;

        if payload.header.code != 0 {
            return Err(SupplierError::ApiError(format!(
                "domeme code {}: {}",
                payload.header.code,
                payload.header.message.as_deref().unwrap_or("no message")
            )));
        }
        Ok(payload)
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
        raw.get("no")
            .map(ToString::to_string)
            .unwrap_or_else(|| "<missing no>".to_owned())
    };

    let item: WireItem =
        serde_json::from_value(value).map_err(|e| SupplierError::InvalidItem {
            supplier_product_id: invalid_id(),
            reason: e.to_string(),
        })?;

    if item.title.trim().is_empty() {
        return Err(SupplierError::InvalidItem {
            supplier_product_id: invalid_id(),
            reason: "empty title".to_owned(),
        });
    }

    let is_in_stock = item.sold_out.as_deref() != Some("Y") && item.stock_qty != Some(0);
    let category_path = item
        .category_full
        .as_deref()
        .map(split_category_path)
        .unwrap_or_default();

    Ok(ProductData {
        supplier_product_id: item.no.to_string(),
        name: item.title,
        description: item.desc,
        brand: item.maker,
        wholesale_price: Some(Decimal::from(item.supply_price)),
        retail_price: Decimal::from(item.sell_price.unwrap_or(item.supply_price)),
        stock_quantity: item.stock_qty,
        is_in_stock,
        minimum_order_quantity: item.min_qty,
        main_image_url: item.img,
        additional_images: item.add_imgs,
        // Domeme listings carry no option/variant structure.
        options: Vec::new(),
        variants: Vec::new(),
        shipping_info: item.delivery,
        category_path,
        raw_data: raw,
    })
}
