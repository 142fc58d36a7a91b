//! Cursor-driven collection of complete result sets.

use std::collections::HashSet;

use {serde_json::Value, tracing::debug};

use crate::{
    dispatch::Dispatcher,
    error::{GatewayError, Result},
    transport::ApiRequest,
};

/// Walks a cursor-paginated endpoint page by page.
pub struct Paginator<'a> {
    dispatcher: &'a Dispatcher,
}

impl<'a> Paginator<'a> {
    #[must_use]
    pub fn new(dispatcher: &'a Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Collect every item under `items_key` across all pages, in arrival
    /// order.
    ///
    /// Pages are fetched strictly one after another. Any failure aborts the
    /// walk and the pages gathered so far are dropped.
    pub async fn collect(&self, request: &ApiRequest, items_key: &str) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page_request = request.clone().with_opt("cursor", cursor.clone());
            let mut page = self.dispatcher.execute(&page_request).await?;
            pages += 1;

            if let Some(Value::Array(batch)) = page.get_mut(items_key).map(Value::take) {
                items.extend(batch);
            }

            let next = page
                .pointer("/response_metadata/next_cursor")
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
                .map(str::to_string);

            match next {
                None => break,
                Some(next) if !seen.insert(next.clone()) => {
                    return Err(GatewayError::malformed(
                        "cursor_loop",
                        format!(
                            "{} returned cursor {next:?} twice",
                            request.endpoint()
                        ),
                    ));
                },
                Some(next) => {
                    debug!(
                        endpoint = request.endpoint(),
                        pages,
                        collected = items.len(),
                        "fetching next page"
                    );
                    cursor = Some(next);
                },
            }
        }

        debug!(endpoint = request.endpoint(), pages, total = items.len(), "pagination complete");
        Ok(items)
    }
}
