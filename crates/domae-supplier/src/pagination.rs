//! Generic page-walking driver shared by the supplier adapters.
//!
//! Each adapter speaks a different pagination dialect — OwnerClan hands out
//! opaque cursors, Domeme numbers its pages, Gentrade windows an offset —
//! so the driver is generic over the continuation token. Adapters supply a
//! page fetcher; the driver flattens pages into a stream of per-item
//! results, enforces the page cap and inter-page delay, and stops once the
//! requested number of products has been yielded.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use domae_core::{ProductData, Supplier};
use futures::stream::{self, BoxStream};
use futures::StreamExt;

use crate::error::SupplierError;

/// Hard cap on pages per collection run. Prevents infinite loops on
/// cycling cursors or a server that keeps reporting one more page.
pub(crate) const MAX_PAGES: usize = 600;

/// One fetched page: converted items and the token for the next page.
///
/// Entries that could not be turned into a [`ProductData`] stay in `items`
/// as [`SupplierError::InvalidItem`] so the consumer can count them without
/// losing the rest of the page.
pub(crate) struct PageFetch<T> {
    pub items: Vec<Result<ProductData, SupplierError>>,
    pub next: Option<T>,
}

struct DriverState<T, F> {
    fetch_page: F,
    supplier: Supplier,
    remaining: usize,
    inter_request_delay_ms: u64,
    buffered: VecDeque<Result<ProductData, SupplierError>>,
    next_token: Option<T>,
    pages_fetched: usize,
    done: bool,
}

/// Drives `fetch_page` from the `first` token until the supplier reports no
/// further page, `max_products` items have been yielded (`0` = unlimited),
/// or a page-level error occurs.
///
/// Per-item errors are yielded in place and do not end the stream; a
/// page-level error is yielded once and ends it.
pub(crate) fn paginate<'a, T, F, Fut>(
    supplier: Supplier,
    first: T,
    max_products: usize,
    inter_request_delay_ms: u64,
    fetch_page: F,
) -> BoxStream<'a, Result<ProductData, SupplierError>>
where
    T: Send + 'a,
    F: FnMut(T) -> Fut + Send + 'a,
    Fut: Future<Output = Result<PageFetch<T>, SupplierError>> + Send + 'a,
{
    let remaining = if max_products == 0 {
        usize::MAX
    } else {
        max_products
    };
    let state = DriverState {
        fetch_page,
        supplier,
        remaining,
        inter_request_delay_ms,
        buffered: VecDeque::new(),
        next_token: Some(first),
        pages_fetched: 0,
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if st.done {
                return None;
            }

            if let Some(item) = st.buffered.pop_front() {
                if item.is_ok() {
                    st.remaining -= 1;
                    if st.remaining == 0 {
                        st.done = true;
                    }
                }
                return Some((item, st));
            }

            let Some(token) = st.next_token.take() else {
                return None;
            };

            if st.pages_fetched >= MAX_PAGES {
                st.done = true;
                return Some((
                    Err(SupplierError::PaginationLimit {
                        supplier: st.supplier,
                        max_pages: MAX_PAGES,
                    }),
                    st,
                ));
            }

            if st.pages_fetched > 0 && st.inter_request_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(st.inter_request_delay_ms)).await;
            }
            st.pages_fetched += 1;

            match (st.fetch_page)(token).await {
                Ok(page) => {
                    st.buffered = page.items.into();
                    st.next_token = page.next;
                }
                Err(err) => {
                    st.done = true;
                    return Some((Err(err), st));
                }
            }
        }
    })
    .boxed()
}
