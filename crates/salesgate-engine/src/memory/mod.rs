//! # In-Process Engine
//!
//! A `SalesEngine` backed by plain maps, used by the test suites and the
//! demo binary in place of the real engine.
//!
//! ## Store vs Engine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  MemoryStore (Clone, Send + Sync)         MemoryEngine (!Send)          │
//! │  ───────────────────────────────          ────────────────────          │
//! │  documents, parties, currencies   ◄────── one per worker thread,        │
//! │  EngineStats (instrumentation)            opened by the store acting    │
//! │  FaultPlan   (fault injection)            as EngineFactory              │
//! │                                                                         │
//! │  Documents live in the store, so they survive terminate/initialize     │
//! │  cycles exactly like a company database would.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Instrumentation
//! Every engine call enters a guard that counts calls in flight across all
//! engines of a store. `EngineStats::max_concurrent_calls` above 1 means
//! two calls overlapped in time, which the affinity worker must prevent.

mod engine;
mod pricing;

pub use engine::MemoryEngine;

use chrono::{Days, NaiveDate};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::warn;

use salesgate_core::{
    CompanyInfo, Currency, DocumentKey, DocumentKind, LinePrice, LineSpec, Money,
    PersistedTransaction, TaxRate,
};

use crate::engine::{DraftHeader, EngineFactory, SalesEngine};
use crate::error::{EngineError, EngineResult};

// =============================================================================
// Instrumentation
// =============================================================================

/// Counters collected across every engine opened from one store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Engines handed out by the factory.
    pub opened: u32,
    pub initializations: u32,
    pub terminations: u32,
    pub last_number_calls: u32,
    /// Existence probes.
    pub probes: u32,
    /// Full loads (including failed ones).
    pub loads: u32,
    /// Successful commits.
    pub saves: u32,
    pub discards: u32,
    /// Every engine call of any kind.
    pub calls: u64,
    /// Highest number of engine calls observed running at the same time.
    pub max_concurrent_calls: usize,
}

/// Faults the store will inject into its engines.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// `EngineFactory::open` fails with this message.
    pub fail_open: Option<String>,
    /// `initialize` fails with this message.
    pub fail_initialize: Option<String>,
    /// `terminate` reports a fault (the session still closes).
    pub fail_terminate: bool,
    /// Existence probes for these numbers raise a fault.
    pub failing_probes: Vec<f64>,
    /// Loads for these numbers raise a fault.
    pub failing_loads: Vec<f64>,
    /// Every load raises a fault.
    pub fail_all_loads: bool,
    /// `save` returns `Ok(false)`.
    pub reject_save: bool,
    /// The named call panics (`"exists"`, `"save"`, ...).
    pub panic_on: Option<String>,
    /// Every call sleeps this long while counted as in flight.
    pub call_delay: Option<Duration>,
}

// =============================================================================
// Store
// =============================================================================

type StoredKey = (DocumentKind, String, String, u64);

fn stored_key(kind: DocumentKind, key: &DocumentKey) -> StoredKey {
    (
        kind,
        key.series.clone(),
        key.document_type.clone(),
        key.number.to_bits(),
    )
}

struct StoreData {
    company: CompanyInfo,
    user_name: String,
    base_currency: String,
    currencies: HashMap<String, Currency>,
    parties: HashMap<u64, String>,
    document_types: HashMap<String, DocumentKind>,
    default_series: Option<String>,
    documents: HashMap<StoredKey, PersistedTransaction>,
}

impl StoreData {
    fn demo() -> Self {
        let currencies = [
            Currency::new("EUR", "Euro"),
            Currency::new("USD", "US Dollar"),
            Currency::new("GBP", "Pound Sterling"),
        ]
        .into_iter()
        .map(|c| (c.id.clone(), c))
        .collect();

        let parties = [
            (1.0, "Walk-in Customer"),
            (2.0, "Acme Supplies"),
            (3.0, "Northwind Traders"),
        ]
        .into_iter()
        .map(|(id, name): (f64, &str)| (id.to_bits(), name.to_string()))
        .collect();

        let document_types = [
            ("FS", DocumentKind::Sale),
            ("FT", DocumentKind::Sale),
            ("FR", DocumentKind::Sale),
            ("NC", DocumentKind::Sale),
            ("VFA", DocumentKind::Purchase),
            ("VGR", DocumentKind::Purchase),
            ("GT", DocumentKind::Stock),
            ("OR", DocumentKind::Other),
        ]
        .into_iter()
        .map(|(code, kind)| (code.to_string(), kind))
        .collect();

        StoreData {
            company: CompanyInfo {
                id: String::new(),
                name: "Demo Trading Lda".to_string(),
                address: "Rua Central 1, 1000-001 Lisboa".to_string(),
                phone: "+351 210 000 000".to_string(),
                fax: "+351 210 000 001".to_string(),
                email: "office@demo-trading.example".to_string(),
            },
            user_name: "admin".to_string(),
            base_currency: "EUR".to_string(),
            currencies,
            parties,
            document_types,
            default_series: Some("A".to_string()),
            documents: HashMap::new(),
        }
    }

    fn kind_of(&self, document_type: &str) -> DocumentKind {
        self.document_types
            .get(document_type)
            .copied()
            .unwrap_or(DocumentKind::Sale)
    }

    fn last_number(&self, kind: DocumentKind, series: &str, document_type: &str) -> f64 {
        self.documents
            .keys()
            .filter(|(k, s, t, _)| *k == kind && s == series && t == document_type)
            .map(|(_, _, _, bits)| f64::from_bits(*bits))
            .fold(0.0, f64::max)
    }
}

struct Shared {
    data: Mutex<StoreData>,
    stats: Mutex<EngineStats>,
    faults: Mutex<FaultPlan>,
    in_flight: AtomicUsize,
}

/// Recovers the guard from a poisoned lock. A panicking engine call (fault
/// injection) must not take the store down with it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared state behind every `MemoryEngine`, and the factory that opens them.
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// A store with one demo company, three parties and no documents.
    pub fn new() -> Self {
        MemoryStore {
            shared: Arc::new(Shared {
                data: Mutex::new(StoreData::demo()),
                stats: Mutex::new(EngineStats::default()),
                faults: Mutex::new(FaultPlan::default()),
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    // =========================================================================
    // Faults and Stats
    // =========================================================================

    pub fn with_faults(self, plan: FaultPlan) -> Self {
        self.set_faults(plan);
        self
    }

    pub fn set_faults(&self, plan: FaultPlan) {
        *lock(&self.shared.faults) = plan;
    }

    pub fn update_faults(&self, f: impl FnOnce(&mut FaultPlan)) {
        f(&mut lock(&self.shared.faults));
    }

    pub fn stats(&self) -> EngineStats {
        lock(&self.shared.stats).clone()
    }

    pub fn reset_stats(&self) {
        *lock(&self.shared.stats) = EngineStats::default();
    }

    // =========================================================================
    // Fixture Data
    // =========================================================================

    pub fn add_party(&self, party_id: f64, name: impl Into<String>) {
        lock(&self.shared.data)
            .parties
            .insert(party_id.to_bits(), name.into());
    }

    pub fn add_currency(&self, currency: Currency) {
        lock(&self.shared.data)
            .currencies
            .insert(currency.id.clone(), currency);
    }

    pub fn set_default_series(&self, series: Option<&str>) {
        lock(&self.shared.data).default_series = series.map(str::to_string);
    }

    /// Stores a document directly, bypassing the draft protocol.
    pub fn insert_document(&self, document: PersistedTransaction) {
        let mut data = lock(&self.shared.data);
        let kind = data.kind_of(&document.key.document_type);
        data.documents
            .insert(stored_key(kind, &document.key), document);
    }

    /// Appends `count` one-line documents after the current last number.
    ///
    /// Dates advance one day per document from 2024-01-01 and parties cycle
    /// through the demo parties, so listings have something to sort.
    pub fn seed(&self, series: &str, document_type: &str, count: u32) {
        let (kind, last, currency) = {
            let data = lock(&self.shared.data);
            let kind = data.kind_of(document_type);
            (
                kind,
                data.last_number(kind, series, document_type),
                data.base_currency.clone(),
            )
        };
        let base_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();

        for i in 1..=count {
            let number = last + i as f64;
            let create_date = base_date
                .checked_add_days(Days::new(u64::from(i)))
                .unwrap_or(base_date);
            let header = DraftHeader {
                number,
                create_date,
                comments: format!("Seed document {}", i),
                tax_included: true,
                currency: Currency::new(currency.clone(), ""),
            };
            let line = LineSpec {
                item_id: format!("ITEM-{:03}", i),
                description: None,
                quantity: 1.0,
                price: LinePrice::Unit(Money::from_cents(1000 * i as i64)),
                tax_rate: TaxRate::from_bps(2300),
                unit_of_sale: Some("UN".to_string()),
                warehouse_id: 1,
                color_id: None,
                size_id: None,
                property_value: None,
            };
            let key = DocumentKey::new(series, document_type, number);
            let party_id = f64::from((i - 1) % 3 + 1);
            let document = match pricing::build_document(key, &header, party_id, 0.0, &[line]) {
                Ok(document) => document,
                Err(e) => {
                    warn!(number, error = %e, "seed document skipped");
                    continue;
                }
            };

            lock(&self.shared.data)
                .documents
                .insert(stored_key(kind, &document.key), document);
        }
    }

    pub fn document_count(&self) -> usize {
        lock(&self.shared.data).documents.len()
    }

    /// Direct lookup, bypassing any engine (and its counters).
    pub fn document(&self, key: &DocumentKey) -> Option<PersistedTransaction> {
        let data = lock(&self.shared.data);
        let kind = data.kind_of(&key.document_type);
        data.documents.get(&stored_key(kind, key)).cloned()
    }

    pub fn last_number(&self, series: &str, document_type: &str) -> f64 {
        let data = lock(&self.shared.data);
        let kind = data.kind_of(document_type);
        data.last_number(kind, series, document_type)
    }
}

impl EngineFactory for MemoryStore {
    fn open(&self) -> EngineResult<Box<dyn SalesEngine>> {
        if let Some(message) = lock(&self.shared.faults).fail_open.clone() {
            return Err(EngineError::OpenFailed(message));
        }
        lock(&self.shared.stats).opened += 1;
        Ok(Box::new(MemoryEngine::new(self.clone())))
    }
}

// =============================================================================
// Call Guard
// =============================================================================

/// Marks one engine call as in flight for the lifetime of the guard.
pub(crate) struct CallGuard {
    shared: Arc<Shared>,
}

impl CallGuard {
    fn enter(shared: &Arc<Shared>, operation: &str) -> CallGuard {
        let now = shared.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut stats = lock(&shared.stats);
            stats.calls += 1;
            stats.max_concurrent_calls = stats.max_concurrent_calls.max(now);
        }
        let guard = CallGuard {
            shared: Arc::clone(shared),
        };

        let (delay, panic_here) = {
            let faults = lock(&shared.faults);
            (
                faults.call_delay,
                faults.panic_on.as_deref() == Some(operation),
            )
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if panic_here {
            panic!("engine crashed during {}", operation);
        }
        guard
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_appends_after_last_number() {
        let store = MemoryStore::new();
        store.seed("A", "FS", 3);
        assert_eq!(store.last_number("A", "FS"), 3.0);

        store.seed("A", "FS", 2);
        assert_eq!(store.last_number("A", "FS"), 5.0);
        assert_eq!(store.document_count(), 5);

        let doc = store.document(&DocumentKey::new("A", "FS", 5.0)).unwrap();
        assert_eq!(doc.transaction_id, "A-FS-5");
        assert_eq!(doc.totals.net, Money::from_cents(2000));
    }

    #[test]
    fn test_last_number_is_scoped() {
        let store = MemoryStore::new();
        store.seed("A", "FS", 4);
        store.seed("B", "FS", 1);
        store.seed("A", "FT", 2);
        assert_eq!(store.last_number("A", "FS"), 4.0);
        assert_eq!(store.last_number("B", "FS"), 1.0);
        assert_eq!(store.last_number("A", "FT"), 2.0);
        assert_eq!(store.last_number("C", "FS"), 0.0);
    }

    #[test]
    fn test_open_failure() {
        let store = MemoryStore::new().with_faults(FaultPlan {
            fail_open: Some("licence server unreachable".into()),
            ..FaultPlan::default()
        });
        assert!(matches!(store.open(), Err(EngineError::OpenFailed(_))));
        assert_eq!(store.stats().opened, 0);
    }
}
