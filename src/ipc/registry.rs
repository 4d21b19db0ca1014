//! Method registry and typed handler adaptation.

use super::protocol::ErrorObject;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, ErrorObject>> + Send>>;

/// A method implementation: raw params in, JSON result or error out.
pub type Handler = Arc<dyn Fn(Option<Value>) -> HandlerFuture + Send + Sync>;

/// Turns a typed async function into a [`Handler`].
///
/// Absent or `null` params decode as `P::default()`; params that do not
/// decode into `P` produce an invalid-params error without calling `f`.
pub fn adapt<P, R, F, Fut>(f: F) -> Handler
where
    P: DeserializeOwned + Default + Send + 'static,
    R: Serialize + Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, ErrorObject>> + Send + 'static,
{
    Arc::new(move |params: Option<Value>| -> HandlerFuture {
        match decode_params::<P>(params) {
            Ok(params) => {
                let pending = f(params);
                Box::pin(async move {
                    let result = pending.await?;
                    serde_json::to_value(result).map_err(ErrorObject::internal)
                })
            }
            Err(error) => Box::pin(std::future::ready(Err(error))),
        }
    })
}

fn decode_params<P: DeserializeOwned + Default>(params: Option<Value>) -> Result<P, ErrorObject> {
    match params {
        None | Some(Value::Null) => Ok(P::default()),
        Some(value) => serde_json::from_value(value).map_err(ErrorObject::invalid_params),
    }
}

/// Name -> handler map, safe to mutate while requests are being served.
#[derive(Default)]
pub struct MethodRegistry {
    methods: RwLock<HashMap<String, Handler>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `handler` under `name`, replacing any previous one.
    pub fn register(&self, name: impl Into<String>, handler: Handler) {
        let name = name.into();
        let replaced = self
            .methods
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), handler)
            .is_some();
        tracing::debug!(method = %name, replaced, "Registered method");
    }

    pub fn get(&self, name: &str) -> Option<Handler> {
        self.methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered method names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}
