use std::rc::Rc;

use futures::lock::Mutex;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::Response;

use crate::errors::{LoadError, LoadResult};
use crate::parcels::{AttributeSchema, FeatureCollection};
use crate::{console_error, console_log};

/// Where the parcel document comes from.
#[allow(async_fn_in_trait)]
pub trait FeatureSource {
    /// Human readable location, used in errors and logs.
    fn location(&self) -> &str;

    /// Fetch the raw GeoJSON text.
    async fn fetch_document(&self) -> LoadResult<String>;
}

/// Fetches the parcel document over HTTP with the browser `fetch` API.
pub struct HttpFeatureSource {
    url: String,
}

impl HttpFeatureSource {
    pub fn new(url: impl Into<String>) -> Self {
        HttpFeatureSource { url: url.into() }
    }

    fn network_error(&self, reason: impl Into<String>) -> LoadError {
        LoadError::Network {
            url: self.url.clone(),
            reason: reason.into(),
        }
    }
}

impl FeatureSource for HttpFeatureSource {
    fn location(&self) -> &str {
        &self.url
    }

    async fn fetch_document(&self) -> LoadResult<String> {
        let window = web_sys::window().ok_or_else(|| self.network_error("no window object available"))?;

        let response_value = JsFuture::from(window.fetch_with_str(&self.url))
            .await
            .map_err(|e| self.network_error(describe_js_error(&e)))?;
        let response: Response = response_value
            .dyn_into()
            .map_err(|_| self.network_error("fetch did not resolve to a Response"))?;

        if !response.ok() {
            return Err(LoadError::HttpStatus {
                url: self.url.clone(),
                status: response.status(),
            });
        }

        let text_promise = response
            .text()
            .map_err(|e| self.network_error(describe_js_error(&e)))?;
        let body = JsFuture::from(text_promise)
            .await
            .map_err(|e| self.network_error(describe_js_error(&e)))?;

        body.as_string()
            .ok_or_else(|| LoadError::Parse("response body is not text".to_string()))
    }
}

fn describe_js_error(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| format!("{:?}", value))
}

/// Loads the parcel collection on first demand and keeps it for the session.
///
/// Concurrent first loads wait on the same lock, so the document is fetched
/// once. Failures are not cached.
pub struct FeatureIndex<S> {
    source: S,
    schema: AttributeSchema,
    cached: Mutex<Option<Rc<FeatureCollection>>>,
}

impl<S: FeatureSource> FeatureIndex<S> {
    pub fn new(source: S, schema: AttributeSchema) -> Self {
        FeatureIndex {
            source,
            schema,
            cached: Mutex::new(None),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn load(&self) -> LoadResult<Rc<FeatureCollection>> {
        let mut cached = self.cached.lock().await;
        if let Some(collection) = cached.as_ref() {
            return Ok(Rc::clone(collection));
        }

        let collection = match self.fetch_and_parse().await {
            Ok(collection) => Rc::new(collection),
            Err(err) => {
                console_error!("Feature collection load from {} failed: {}", self.source.location(), err);
                return Err(err);
            }
        };

        let without_ring = collection
            .features()
            .iter()
            .filter(|f| f.ring.is_none())
            .count();
        console_log!(
            "Loaded {} parcel features from {} ({} without a usable ring)",
            collection.len(),
            self.source.location(),
            without_ring
        );

        *cached = Some(Rc::clone(&collection));
        Ok(collection)
    }

    async fn fetch_and_parse(&self) -> LoadResult<FeatureCollection> {
        let document = self.source.fetch_document().await?;
        FeatureCollection::from_geojson_str(&document, &self.schema)
    }

    /// Collection loaded so far, without triggering a fetch.
    pub fn loaded(&self) -> Option<Rc<FeatureCollection>> {
        self.cached.try_lock().and_then(|cached| (*cached).clone())
    }
}
