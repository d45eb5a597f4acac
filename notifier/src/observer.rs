use std::sync::Arc;

/// Something that wants to hear about price changes.
///
/// Callbacks are invoked synchronously from whichever task applies the price
/// update, so implementations must not block.
pub trait Observer: Send + Sync {
    /// Stable identity, unique within a registry.
    fn id(&self) -> &str;

    fn on_price_changed(&self, symbol: &str, new_price: f64);
}

/// Owning handle. The registry only keeps a weak reference to it.
pub type ObserverHandle = Arc<dyn Observer>;
