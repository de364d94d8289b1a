//! Process-wide cart store.
//!
//! [`CartStore`] owns the buyer's [`Cart`], mirrors it into [`CartStorage`]
//! after every mutation and notifies subscribers (badges, cart pages, the
//! checkout flow) through a `tokio::sync::watch` channel.
//!
//! # Example
//!
//! ```rust,ignore
//! let store = CartStore::load(Arc::new(FileStorage::new(".cartflow")));
//! let mut badge = store.subscribe();
//!
//! store.add_item(&product, 1);
//! badge.changed().await?;
//! assert_eq!(badge.borrow().total_items(), 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use cartflow_core::{Cart, Product, ProductId};

use crate::storage::CartStorage;

/// Storage key the cart is persisted under.
pub const CART_STORAGE_KEY: &str = "cart";

/// Single source of truth for the buyer's pending selections.
///
/// Mutations take `&self`; share the store with `Arc<CartStore>`. Mutations
/// are serialised by the channel's write lock. Each snapshot is encoded and
/// numbered under that lock but written after it is released, so readers
/// never wait on storage I/O. A write never replaces a newer snapshot.
pub struct CartStore {
    state: watch::Sender<Cart>,
    storage: Arc<dyn CartStorage>,
    /// Revision of the latest encoded snapshot. Bumped under the channel's
    /// write lock.
    revision: AtomicU64,
    /// Revision of the latest snapshot handed to storage.
    written: Mutex<u64>,
}

impl CartStore {
    /// Rehydrate the cart from storage.
    ///
    /// An absent key, an unreadable backend or a malformed payload all yield
    /// an empty cart. The latter two are logged.
    #[must_use]
    pub fn load(storage: Arc<dyn CartStorage>) -> Self {
        let cart = match storage.load(CART_STORAGE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Cart>(&raw) {
                Ok(cart) => {
                    debug!(lines = cart.len(), "cart restored from storage");
                    cart
                }
                Err(e) => {
                    warn!(error = %e, "stored cart is malformed, starting with an empty cart");
                    Cart::new()
                }
            },
            Ok(None) => Cart::new(),
            Err(e) => {
                warn!(error = %e, "failed to read stored cart, starting with an empty cart");
                Cart::new()
            }
        };

        Self {
            state: watch::Sender::new(cart),
            storage,
            revision: AtomicU64::new(0),
            written: Mutex::new(0),
        }
    }

    /// A copy of the current cart.
    #[must_use]
    pub fn snapshot(&self) -> Cart {
        self.state.borrow().clone()
    }

    /// Receiver notified after every mutation that changed the cart.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Cart> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.borrow().is_empty()
    }

    /// Sum of all quantities, recomputed on every call.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.state.borrow().total_items()
    }

    /// Sum of `unit_price * quantity`, recomputed on every call.
    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.state.borrow().total_price()
    }

    /// Add one unit of `product`. See [`Cart::add`] for how `quantity` is
    /// treated.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub fn add_item(&self, product: &Product, quantity: u32) {
        self.mutate(|cart| cart.add(product, quantity));
    }

    /// Remove a product's line. Absent products are ignored.
    #[instrument(skip(self))]
    pub fn remove_item(&self, product_id: ProductId) {
        self.mutate(|cart| cart.remove(product_id));
    }

    /// Set a line's quantity; zero or below removes it.
    #[instrument(skip(self))]
    pub fn update_quantity(&self, product_id: ProductId, quantity: i64) {
        self.mutate(|cart| cart.update_quantity(product_id, quantity));
    }

    /// Empty the cart.
    #[instrument(skip(self))]
    pub fn clear(&self) {
        self.mutate(Cart::clear);
    }

    fn mutate(&self, apply: impl FnOnce(&mut Cart) -> bool) {
        let mut pending = None;
        self.state.send_if_modified(|cart| {
            let changed = apply(cart);
            if changed {
                pending = self.encode(cart);
            }
            changed
        });

        if let Some((revision, json)) = pending {
            self.persist(revision, &json);
        }
    }

    /// Serialize a snapshot and give it the next revision number.
    fn encode(&self, cart: &Cart) -> Option<(u64, String)> {
        let json = match serde_json::to_string(cart) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to serialize cart");
                return None;
            }
        };

        let revision = self.revision.fetch_add(1, Ordering::Relaxed) + 1;
        Some((revision, json))
    }

    fn persist(&self, revision: u64, json: &str) {
        let mut written = self.written.lock().unwrap_or_else(PoisonError::into_inner);
        if *written > revision {
            debug!(revision, latest = *written, "skipping stale cart snapshot");
            return;
        }

        if let Err(e) = self.storage.save(CART_STORAGE_KEY, json) {
            warn!(error = %e, "failed to persist cart, keeping in-memory state");
        }
        *written = revision;
    }
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("cart", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, StorageError};
    use cartflow_core::{Price, SellerId};
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    fn product(id: i64, price: i64) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price: Price::new(Decimal::new(price, 0)).unwrap(),
            stock: Some(10),
            seller_id: SellerId::new(3),
        }
    }

    struct FailingStorage;

    impl CartStorage for FailingStorage {
        fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::InvalidKey(key.to_owned()))
        }

        fn save(&self, key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::InvalidKey(key.to_owned()))
        }
    }

    #[test]
    fn test_starts_empty_without_stored_cart() {
        let store = CartStore::load(Arc::new(MemoryStorage::new()));
        assert!(store.is_empty());
        assert_eq!(store.total_items(), 0);
    }

    #[test]
    fn test_malformed_storage_resets_to_empty() {
        let storage = MemoryStorage::with_entry(CART_STORAGE_KEY, "{not json");
        let store = CartStore::load(Arc::new(storage));
        assert!(store.is_empty());
    }

    #[test]
    fn test_mutations_are_persisted() {
        let storage = MemoryStorage::new();
        let store = CartStore::load(Arc::new(storage.clone()));

        store.add_item(&product(1, 100), 1);
        store.add_item(&product(2, 50), 1);
        store.update_quantity(ProductId::new(1), 3);

        let raw = storage.load(CART_STORAGE_KEY).unwrap().unwrap();
        let persisted: Cart = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted, store.snapshot());
        assert_eq!(store.total_price(), Decimal::new(350, 0));
    }

    #[test]
    fn test_reload_restores_same_sequence() {
        let storage = MemoryStorage::new();
        let store = CartStore::load(Arc::new(storage.clone()));
        store.add_item(&product(5, 10), 1);
        store.add_item(&product(2, 20), 1);
        store.add_item(&product(5, 10), 1);

        let reloaded = CartStore::load(Arc::new(storage));
        assert_eq!(reloaded.snapshot(), store.snapshot());
        let ids: Vec<i64> = reloaded
            .snapshot()
            .items()
            .iter()
            .map(|i| i.product_id.as_i64())
            .collect();
        assert_eq!(ids, vec![5, 2]);
    }

    #[test]
    fn test_storage_failures_keep_memory_state() {
        let store = CartStore::load(Arc::new(FailingStorage));
        store.add_item(&product(1, 100), 1);
        assert_eq!(store.total_items(), 1);
    }

    #[test]
    fn test_total_out_of_range_resets_to_empty() {
        let raw = r#"[{"productId":1,"name":"x","unitPrice":"79228162514264337593543950335","quantity":2,"sellerId":1}]"#;
        let store = CartStore::load(Arc::new(MemoryStorage::with_entry(CART_STORAGE_KEY, raw)));

        assert!(store.is_empty());
        assert_eq!(store.total_price(), Decimal::ZERO);
    }

    #[test]
    fn test_refused_add_is_not_persisted() {
        let storage = MemoryStorage::new();
        let store = CartStore::load(Arc::new(storage.clone()));
        let mut expensive = product(1, 1);
        expensive.price = Price::new(Decimal::MAX).unwrap();

        store.add_item(&expensive, 1);
        store.add_item(&expensive, 1);

        assert_eq!(store.total_items(), 1);
        assert_eq!(store.total_price(), Decimal::MAX);
        let persisted: Cart =
            serde_json::from_str(&storage.load(CART_STORAGE_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(persisted.total_items(), 1);
    }

    /// Blocks inside `save` until released.
    struct GatedStorage {
        entered: std_mpsc::SyncSender<()>,
        release: Mutex<std_mpsc::Receiver<()>>,
    }

    impl CartStorage for GatedStorage {
        fn load(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn save(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            self.entered.send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
            Ok(())
        }
    }

    #[test]
    fn test_readers_are_not_blocked_by_storage_writes() {
        let (entered_tx, entered_rx) = std_mpsc::sync_channel(1);
        let (release_tx, release_rx) = std_mpsc::channel();
        let store = Arc::new(CartStore::load(Arc::new(GatedStorage {
            entered: entered_tx,
            release: Mutex::new(release_rx),
        })));

        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || store.add_item(&product(1, 100), 1))
        };
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        // The save is still in flight; reads must not wait for it
        let (read_tx, read_rx) = std_mpsc::channel();
        let reader = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || read_tx.send(store.total_items()).unwrap())
        };
        let seen = read_rx.recv_timeout(Duration::from_secs(5));

        release_tx.send(()).unwrap();
        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(seen.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let store = CartStore::load(Arc::new(MemoryStorage::new()));
        let mut rx = store.subscribe();

        store.add_item(&product(1, 100), 1);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().total_items(), 1);

        // No-op mutations do not notify
        store.remove_item(ProductId::new(42));
        assert!(!rx.has_changed().unwrap());

        store.clear();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_empty());
    }
}
