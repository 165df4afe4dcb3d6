//! Gentrade catalog feed client.
//!
//! Gentrade exposes its catalog as an XML document windowed by `offset` and
//! `count` query parameters, with the API key passed as `key`. The
//! `<catalog total="...">` attribute drives pagination. Stock is a one-line
//! XML document per product code. Parsed with `quick-xml` events.

use domae_core::{CollectionType, ProductData, StockInfo, Supplier};
use futures::stream::BoxStream;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::{Client, Url};
use rust_decimal::Decimal;

use crate::error::SupplierError;
use crate::http::{build_client, check_status, display_url, normalize_base_url};
use crate::pagination::{paginate, PageFetch};
use crate::retry::retry_with_backoff;
use crate::{split_category_path, ClientConfig};

const DEFAULT_BASE_URL: &str = "https://feed.gentrade.co.kr/";
const WINDOW_SIZE: u32 = 200;

/// Client for the Gentrade XML catalog feed.
#[derive(Debug)]
pub struct GentradeClient {
    client: Client,
    api_key: String,
    base_url: Url,
    max_retries: u32,
    backoff_base_secs: u64,
    inter_request_delay_ms: u64,
}

impl GentradeClient {
    /// Creates a client pointed at the production Gentrade feed (or the
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
    /// Same as [`GentradeClient::new`].
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

    /// Minimal connectivity and credential probe: fetches a one-item window.
    ///
    /// # Errors
    ///
    /// Propagates the typed error for whatever went wrong.
    pub async fn ping(&self) -> Result<(), SupplierError> {
        self.fetch_catalog_window(&CollectionType::Full, 0, 1)
            .await
            .map(|_| ())
    }

    /// Streams the catalog as [`ProductData`] items across offset windows
    /// until the feed's `total` is exhausted or `max_products` successful
    /// items have been yielded (`0` = unlimited).
    pub fn collect_products(
        &self,
        collection_type: &CollectionType,
        max_products: usize,
    ) -> BoxStream<'_, Result<ProductData, SupplierError>> {
        let collection_type = collection_type.clone();
        paginate(
            Supplier::Gentrade,
            0u32,
            max_products,
            self.inter_request_delay_ms,
            move |offset| {
                let collection_type = collection_type.clone();
                async move {
                    self.fetch_catalog_window(&collection_type, offset, WINDOW_SIZE)
                        .await
                }
            },
        )
    }

    /// Reads current stock for one product code.
    ///
    /// # Errors
    ///
    /// [`SupplierError::NotFound`] for an unknown code; [`SupplierError::Xml`]
    /// when the response carries no `<stock>` element; otherwise the usual
    /// transport/status errors.
    pub async fn get_product_stock(
        &self,
        supplier_product_id: &str,
    ) -> Result<StockInfo, SupplierError> {
        let mut url = self.endpoint(&["api", "stock.xml"])?;
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("code", supplier_product_id);

        retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            let url = url.clone();
            async move {
                let response = self.client.get(url.clone()).send().await?;
                let response = check_status(Supplier::Gentrade, response)?;
                let body = response.text().await?;
                parse_stock_xml(&body, &display_url(&url))
            }
        })
        .await
    }

    async fn fetch_catalog_window(
        &self,
        collection_type: &CollectionType,
        offset: u32,
        count: u32,
    ) -> Result<PageFetch<u32>, SupplierError> {
        let mut url = self.endpoint(&["api", "catalog.xml"])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("key", &self.api_key);
            pairs.append_pair("offset", &offset.to_string());
            pairs.append_pair("count", &count.to_string());
            match collection_type {
                CollectionType::Full => {}
                CollectionType::NewArrivals => {
                    pairs.append_pair("recent", "1");
                }
                CollectionType::Keyword(kw) => {
                    pairs.append_pair("q", kw);
                }
            }
        }

        let page = retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            let url = url.clone();
            async move {
                let response = self.client.get(url.clone()).send().await?;
                let response = check_status(Supplier::Gentrade, response)?;
                let body = response.text().await?;
                parse_catalog_xml(&body, &display_url(&url))
            }
        })
        .await?;

        let fetched_through = offset.saturating_add(count);
        let next = if fetched_through < page.total && !page.items.is_empty() {
            Some(fetched_through)
        } else {
            None
        };

        Ok(PageFetch {
            items: page.items,
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

struct CatalogPage {
    items: Vec<Result<ProductData, SupplierError>>,
    total: u32,
}

/// Accumulates the child elements of one `<product>` while the event
/// parser walks the document. Field validation happens in
/// [`RawProduct::into_product`] so one bad entry stays a per-item error.
#[derive(Default)]
struct RawProduct {
    code: Option<String>,
    name: Option<String>,
    brand: Option<String>,
    category: Option<String>,
    supply_price: Option<String>,
    retail_price: Option<String>,
    stock: Option<String>,
    soldout: Option<String>,
    moq: Option<String>,
    image: Option<String>,
    extra_images: Option<String>,
    description: Option<String>,
}

impl RawProduct {
    fn assign(&mut self, tag: &str, text: String) {
        let slot = match tag {
            "code" => &mut self.code,
            "name" => &mut self.name,
            "brand" => &mut self.brand,
            "category" => &mut self.category,
            "supply_price" => &mut self.supply_price,
            "retail_price" => &mut self.retail_price,
            "stock" => &mut self.stock,
            "soldout" => &mut self.soldout,
            "moq" => &mut self.moq,
            "image" => &mut self.image,
            "extra_images" => &mut self.extra_images,
            "description" => &mut self.description,
            _ => return,
        };
        *slot = Some(text);
    }

    fn raw_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code,
            "name": self.name,
            "brand": self.brand,
            "category": self.category,
            "supply_price": self.supply_price,
            "retail_price": self.retail_price,
            "stock": self.stock,
            "soldout": self.soldout,
            "moq": self.moq,
            "image": self.image,
            "extra_images": self.extra_images,
        })
    }

    fn into_product(self) -> Result<ProductData, SupplierError> {
        let raw_data = self.raw_json();

        let code = match self.code {
            Some(c) if !c.trim().is_empty() => c,
            _ => {
                return Err(SupplierError::InvalidItem {
                    supplier_product_id: "<missing code>".to_owned(),
                    reason: "product element without <code>".to_owned(),
                })
            }
        };
        let name = match self.name {
            Some(n) if !n.trim().is_empty() => n,
            _ => {
                return Err(SupplierError::InvalidItem {
                    supplier_product_id: code,
                    reason: "product element without <name>".to_owned(),
                })
            }
        };

        let supply_price = match parse_price(self.supply_price.as_deref()) {
            Ok(v) => v,
            Err(reason) => {
                return Err(SupplierError::InvalidItem {
                    supplier_product_id: code,
                    reason,
                })
            }
        };
        let retail_price = match parse_price(self.retail_price.as_deref()) {
            Ok(v) => v,
            Err(reason) => {
                return Err(SupplierError::InvalidItem {
                    supplier_product_id: code,
                    reason,
                })
            }
        };
        let retail = match (retail_price, supply_price) {
            (Some(r), _) => Decimal::from(r),
            (None, Some(s)) => Decimal::from(s),
            (None, None) => {
                return Err(SupplierError::InvalidItem {
                    supplier_product_id: code,
                    reason: "no <retail_price> or <supply_price>".to_owned(),
                })
            }
        };

        // Stock and minimum-order values are lenient: feeds put free text
        // here and a missing quantity is not worth dropping the item over.
        let stock = self
            .stock
            .as_deref()
            .and_then(|s| s.trim().parse::<i32>().ok());
        let moq = self
            .moq
            .as_deref()
            .and_then(|s| s.trim().parse::<i32>().ok());
        let is_in_stock =
            !matches!(self.soldout.as_deref(), Some(s) if s.eq_ignore_ascii_case("y"))
                && stock != Some(0);

        let additional_images = self
            .extra_images
            .as_deref()
            .map(|joined| {
                joined
                    .split('|')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        let category_path = self
            .category
            .as_deref()
            .map(split_category_path)
            .unwrap_or_default();

        Ok(ProductData {
            supplier_product_id: code,
            name,
            description: self.description,
            brand: self.brand,
            wholesale_price: supply_price.map(Decimal::from),
            retail_price: retail,
            stock_quantity: stock,
            is_in_stock,
            minimum_order_quantity: moq,
            main_image_url: self.image,
            additional_images,
            // The feed carries no option/variant or shipping structure.
            options: Vec::new(),
            variants: Vec::new(),
            shipping_info: serde_json::Value::Null,
            category_path,
            raw_data,
        })
    }
}

fn parse_price(raw: Option<&str>) -> Result<Option<i64>, String> {
    match raw {
        None => Ok(None),
        Some(s) => match s.trim().parse::<i64>() {
            Ok(v) => Ok(Some(v)),
            Err(_) => Err(format!("unparseable price \"{s}\"")),
        },
    }
}

fn parse_catalog_xml(xml: &str, context: &str) -> Result<CatalogPage, SupplierError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut total = 0u32;
    let mut in_product = false;
    let mut current_tag = String::new();
    let mut raw = RawProduct::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name_buf = e.name().as_ref().to_vec();
                let name = std::str::from_utf8(&name_buf).unwrap_or("").to_string();
                if name == "catalog" {
                    total = read_total_attr(&e);
                } else if name == "product" {
                    in_product = true;
                    raw = RawProduct::default();
                }
                current_tag = name;
            }
            Ok(Event::End(e)) => {
                let name_buf = e.name().as_ref().to_vec();
                let name = std::str::from_utf8(&name_buf).unwrap_or("");
                if name == "product" && in_product {
                    in_product = false;
                    items.push(std::mem::take(&mut raw).into_product());
                }
                current_tag.clear();
            }
            Ok(Event::Text(e)) => {
                if in_product {
                    let text = e.unescape().unwrap_or_default().into_owned();
                    raw.assign(&current_tag, text);
                }
            }
            Ok(Event::CData(e)) => {
                if in_product && current_tag == "description" {
                    raw.assign(
                        "description",
                        String::from_utf8_lossy(e.as_ref()).into_owned(),
                    );
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SupplierError::Xml {
                    context: context.to_owned(),
                    reason: e.to_string(),
                })
            }
            _ => {}
        }
    }

    Ok(CatalogPage { items, total })
}

fn read_total_attr(e: &BytesStart<'_>) -> u32 {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == b"total" {
            if let Ok(value) = attr.unescape_value() {
                if let Ok(total) = value.trim().parse::<u32>() {
                    return total;
                }
            }
        }
    }
    0
}

fn parse_stock_xml(xml: &str, context: &str) -> Result<StockInfo, SupplierError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) => {
                if e.name().as_ref() == b"stock" {
                    let mut quantity = None;
                    let mut available = false;
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"quantity" => {
                                quantity = attr
                                    .unescape_value()
                                    .ok()
                                    .and_then(|v| v.trim().parse::<i32>().ok());
                            }
                            b"available" => {
                                available = attr
                                    .unescape_value()
                                    .ok()
                                    .is_some_and(|v| v.eq_ignore_ascii_case("y"));
                            }
                            _ => {}
                        }
                    }
                    return Ok(StockInfo {
                        quantity,
                        is_available: available,
                    });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SupplierError::Xml {
                    context: context.to_owned(),
                    reason: e.to_string(),
                })
            }
            _ => {}
        }
    }

    Err(SupplierError::Xml {
        context: context.to_owned(),
        reason: "no <stock> element in response".to_owned(),
    })
}
