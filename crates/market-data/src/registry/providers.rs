use std::fmt;
use std::sync::Arc;

use crate::provider::{PriceSource, ProviderContext};

/// Builds one source from the shared context.
pub type ProviderConstructor =
    Box<dyn Fn(&ProviderContext<'_>) -> Arc<dyn PriceSource> + Send + Sync>;

/// Ordered list of provider constructors.
///
/// Assembled by the composition root and handed to
/// [`SourceRegistry::build`](super::SourceRegistry::build). Append only.
#[derive(Default)]
pub struct ProviderList {
    constructors: Vec<ProviderConstructor>,
}

impl ProviderList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a constructor.
    pub fn register<F>(&mut self, constructor: F) -> &mut Self
    where
        F: Fn(&ProviderContext<'_>) -> Arc<dyn PriceSource> + Send + Sync + 'static,
    {
        self.constructors.push(Box::new(constructor));
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&ProviderContext<'_>) -> Arc<dyn PriceSource> + Send + Sync + 'static,
    {
        self.register(constructor);
        self
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Run every constructor once, in registration order.
    pub(crate) fn construct(&self, context: &ProviderContext<'_>) -> Vec<Arc<dyn PriceSource>> {
        self.constructors
            .iter()
            .map(|constructor| constructor(context))
            .collect()
    }
}

impl fmt::Debug for ProviderList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderList")
            .field("constructors", &self.constructors.len())
            .finish()
    }
}
