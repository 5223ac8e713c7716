use std::marker::PhantomData;
use std::rc::Rc;

use tracing::{debug, trace};

use salesgate_core::{
    Currency, DocumentKey, DocumentKind, DocumentTotals, LineSpec, PersistedTransaction,
    SessionSettings, SystemSnapshot,
};

use super::{lock, pricing, stored_key, CallGuard, MemoryStore};
use crate::engine::{DraftHeader, SalesEngine};
use crate::error::{EngineError, EngineResult};

/// The draft a `MemoryEngine` is building.
struct Draft {
    kind: DocumentKind,
    series: String,
    document_type: String,
    header: Option<DraftHeader>,
    party_id: f64,
    lines: Vec<LineSpec>,
    discount_percent: f64,
    totals: Option<DocumentTotals>,
}

/// One engine session over a [`MemoryStore`].
///
/// `!Send`, like the handles it stands in for.
pub struct MemoryEngine {
    store: MemoryStore,
    session: Option<SessionSettings>,
    draft: Option<Draft>,
    _thread_bound: PhantomData<Rc<()>>,
}

impl MemoryEngine {
    pub fn new(store: MemoryStore) -> Self {
        MemoryEngine {
            store,
            session: None,
            draft: None,
            _thread_bound: PhantomData,
        }
    }

    fn enter(&self, operation: &str) -> CallGuard {
        trace!(operation, "memory engine call");
        CallGuard::enter(&self.store.shared, operation)
    }

    fn require_session(&self) -> EngineResult<()> {
        if self.session.is_none() {
            return Err(EngineError::NotInitialized);
        }
        Ok(())
    }

    fn draft_mut(&mut self) -> EngineResult<&mut Draft> {
        self.draft.as_mut().ok_or(EngineError::NoOpenDraft)
    }
}

impl SalesEngine for MemoryEngine {
    fn initialize(&mut self, settings: &SessionSettings) -> EngineResult<SystemSnapshot> {
        let _call = self.enter("initialize");
        if self.session.is_some() {
            return Err(EngineError::fault("session already open"));
        }
        if let Some(message) = lock(&self.store.shared.faults).fail_initialize.clone() {
            return Err(EngineError::InitFailed(message));
        }

        let snapshot = {
            let data = lock(&self.store.shared.data);
            let mut company = data.company.clone();
            company.id = settings.company_id.clone();
            let base_currency = data
                .currencies
                .get(&data.base_currency)
                .cloned()
                .ok_or_else(|| EngineError::InitFailed("company has no base currency".into()))?;
            SystemSnapshot {
                company,
                user_name: data.user_name.clone(),
                base_currency,
                default_series: data.default_series.clone(),
            }
        };

        lock(&self.store.shared.stats).initializations += 1;
        debug!(company_id = %settings.company_id, product = %settings.product_code, "memory engine session opened");
        self.session = Some(settings.clone());
        Ok(snapshot)
    }

    fn terminate(&mut self) -> EngineResult<()> {
        let _call = self.enter("terminate");
        self.draft = None;
        self.session = None;
        lock(&self.store.shared.stats).terminations += 1;

        if lock(&self.store.shared.faults).fail_terminate {
            return Err(EngineError::fault("terminate raised after closing the company"));
        }
        Ok(())
    }

    fn document_kind(&mut self, document_type: &str) -> DocumentKind {
        let _call = self.enter("document_kind");
        lock(&self.store.shared.data).kind_of(document_type)
    }

    fn is_known_document(&mut self, document_type: &str) -> bool {
        let _call = self.enter("is_known_document");
        lock(&self.store.shared.data)
            .document_types
            .contains_key(document_type)
    }

    fn last_number(
        &mut self,
        kind: DocumentKind,
        series: &str,
        document_type: &str,
    ) -> EngineResult<f64> {
        let _call = self.enter("last_number");
        self.require_session()?;
        lock(&self.store.shared.stats).last_number_calls += 1;
        Ok(lock(&self.store.shared.data).last_number(kind, series, document_type))
    }

    fn exists(&mut self, kind: DocumentKind, key: &DocumentKey) -> EngineResult<bool> {
        let _call = self.enter("exists");
        self.require_session()?;
        lock(&self.store.shared.stats).probes += 1;

        if lock(&self.store.shared.faults)
            .failing_probes
            .contains(&key.number)
        {
            return Err(EngineError::fault(format!("probe failed for {}", key)));
        }
        Ok(lock(&self.store.shared.data)
            .documents
            .contains_key(&stored_key(kind, key)))
    }

    fn load(
        &mut self,
        kind: DocumentKind,
        key: &DocumentKey,
        suspended: bool,
    ) -> EngineResult<PersistedTransaction> {
        let _call = self.enter("load");
        self.require_session()?;
        lock(&self.store.shared.stats).loads += 1;

        {
            let faults = lock(&self.store.shared.faults);
            if faults.fail_all_loads || faults.failing_loads.contains(&key.number) {
                return Err(EngineError::fault(format!("load failed for {}", key)));
            }
        }
        // Nothing is ever parked in the memory store.
        if suspended {
            return Err(EngineError::NotFound(format!("suspended {}", key)));
        }

        lock(&self.store.shared.data)
            .documents
            .get(&stored_key(kind, key))
            .cloned()
            .ok_or_else(|| EngineError::NotFound(key.to_string()))
    }

    fn party_name(&mut self, party_id: f64) -> EngineResult<Option<String>> {
        let _call = self.enter("party_name");
        self.require_session()?;
        Ok(lock(&self.store.shared.data)
            .parties
            .get(&party_id.to_bits())
            .cloned())
    }

    fn currency(&mut self, currency_id: &str) -> EngineResult<Option<Currency>> {
        let _call = self.enter("currency");
        self.require_session()?;
        Ok(lock(&self.store.shared.data)
            .currencies
            .get(currency_id)
            .cloned())
    }

    fn open_draft(
        &mut self,
        kind: DocumentKind,
        series: &str,
        document_type: &str,
    ) -> EngineResult<()> {
        let _call = self.enter("open_draft");
        self.require_session()?;
        self.draft = Some(Draft {
            kind,
            series: series.to_string(),
            document_type: document_type.to_string(),
            header: None,
            party_id: 0.0,
            lines: Vec::new(),
            discount_percent: 0.0,
            totals: None,
        });
        Ok(())
    }

    fn set_header(&mut self, header: &DraftHeader) -> EngineResult<()> {
        let _call = self.enter("set_header");
        let draft = self.draft_mut()?;
        draft.header = Some(header.clone());
        draft.totals = None;
        Ok(())
    }

    fn set_party(&mut self, party_id: f64) -> EngineResult<()> {
        let _call = self.enter("set_party");
        let draft = self.draft_mut()?;
        draft.party_id = party_id;
        Ok(())
    }

    fn add_line(&mut self, line: &LineSpec) -> EngineResult<()> {
        let _call = self.enter("add_line");
        let draft = self.draft_mut()?;
        draft.lines.push(line.clone());
        draft.totals = None;
        Ok(())
    }

    fn set_discount_percent(&mut self, percent: f64) -> EngineResult<()> {
        let _call = self.enter("set_discount_percent");
        let draft = self.draft_mut()?;
        draft.discount_percent = percent;
        draft.totals = None;
        Ok(())
    }

    fn calculate(&mut self) -> EngineResult<DocumentTotals> {
        let _call = self.enter("calculate");
        let draft = self.draft_mut()?;
        let (_, totals) = pricing::price_lines(&draft.lines, draft.discount_percent)?;
        draft.totals = Some(totals);
        Ok(totals)
    }

    fn save(&mut self) -> EngineResult<bool> {
        let _call = self.enter("save");
        self.require_session()?;

        let document = {
            let draft = self.draft.as_ref().ok_or(EngineError::NoOpenDraft)?;
            let header = draft
                .header
                .as_ref()
                .ok_or_else(|| EngineError::fault("draft has no header"))?;
            if draft.totals.is_none() {
                return Err(EngineError::fault("draft was not calculated"));
            }
            if lock(&self.store.shared.faults).reject_save {
                return Ok(false);
            }

            let key = DocumentKey::new(draft.series.clone(), draft.document_type.clone(), header.number);
            let document = pricing::build_document(
                key,
                header,
                draft.party_id,
                draft.discount_percent,
                &draft.lines,
            )?;
            (stored_key(draft.kind, &document.key), document)
        };

        let (slot, document) = document;
        {
            let mut data = lock(&self.store.shared.data);
            if data.documents.contains_key(&slot) {
                return Err(EngineError::duplicate(document.transaction_id.clone()));
            }
            data.documents.insert(slot, document);
        }

        lock(&self.store.shared.stats).saves += 1;
        self.draft = None;
        Ok(true)
    }

    fn discard_draft(&mut self) {
        let _call = self.enter("discard_draft");
        if self.draft.take().is_some() {
            lock(&self.store.shared.stats).discards += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::FaultPlan;
    use chrono::NaiveDate;
    use salesgate_core::{LinePrice, Money, TaxRate};

    fn open(store: &MemoryStore) -> MemoryEngine {
        let mut engine = MemoryEngine::new(store.clone());
        engine
            .initialize(&SessionSettings::new("Sage50c", "DEMO", false))
            .unwrap();
        engine
    }

    fn header(number: f64) -> DraftHeader {
        DraftHeader {
            number,
            create_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            comments: "test".into(),
            tax_included: true,
            currency: Currency::new("EUR", "Euro"),
        }
    }

    fn line() -> LineSpec {
        LineSpec {
            item_id: "X1".into(),
            description: None,
            quantity: 2.0,
            price: LinePrice::Unit(Money::from_cents(5000)),
            tax_rate: TaxRate::zero(),
            unit_of_sale: None,
            warehouse_id: 0,
            color_id: None,
            size_id: None,
            property_value: None,
        }
    }

    fn build(engine: &mut MemoryEngine, number: f64) -> EngineResult<bool> {
        engine.open_draft(DocumentKind::Sale, "A", "FS")?;
        engine.set_header(&header(number))?;
        engine.add_line(&line())?;
        engine.calculate()?;
        engine.save()
    }

    #[test]
    fn test_calls_require_session() {
        let store = MemoryStore::new();
        let mut engine = MemoryEngine::new(store);
        let key = DocumentKey::new("A", "FS", 1.0);
        assert_eq!(
            engine.exists(DocumentKind::Sale, &key),
            Err(EngineError::NotInitialized)
        );
    }

    #[test]
    fn test_snapshot_reports_company() {
        let store = MemoryStore::new();
        let mut engine = MemoryEngine::new(store);
        let snapshot = engine
            .initialize(&SessionSettings::new("Sage50c", "ACME", false))
            .unwrap();
        assert_eq!(snapshot.company.id, "ACME");
        assert_eq!(snapshot.base_currency.id, "EUR");
        assert_eq!(snapshot.default_series.as_deref(), Some("A"));
    }

    #[test]
    fn test_save_then_probe_and_load() {
        let store = MemoryStore::new();
        let mut engine = open(&store);

        assert_eq!(build(&mut engine, 1.0), Ok(true));

        let key = DocumentKey::new("A", "FS", 1.0);
        assert_eq!(engine.exists(DocumentKind::Sale, &key), Ok(true));
        let doc = engine.load(DocumentKind::Sale, &key, false).unwrap();
        assert_eq!(doc.totals.net, Money::from_cents(10000));
        assert_eq!(engine.last_number(DocumentKind::Sale, "A", "FS"), Ok(1.0));
        assert_eq!(store.stats().saves, 1);
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let store = MemoryStore::new();
        let mut engine = open(&store);
        build(&mut engine, 7.0).unwrap();
        assert!(matches!(build(&mut engine, 7.0), Err(EngineError::DuplicateKey(_))));
    }

    #[test]
    fn test_save_requires_calculation() {
        let store = MemoryStore::new();
        let mut engine = open(&store);
        engine.open_draft(DocumentKind::Sale, "A", "FS").unwrap();
        engine.set_header(&header(1.0)).unwrap();
        engine.add_line(&line()).unwrap();
        assert!(matches!(engine.save(), Err(EngineError::Fault(_))));
    }

    #[test]
    fn test_rejected_save_keeps_nothing() {
        let store = MemoryStore::new().with_faults(FaultPlan {
            reject_save: true,
            ..FaultPlan::default()
        });
        let mut engine = open(&store);
        assert_eq!(build(&mut engine, 1.0), Ok(false));
        assert_eq!(store.document_count(), 0);
    }

    #[test]
    fn test_suspended_load_not_found() {
        let store = MemoryStore::new();
        store.seed("A", "FS", 1);
        let mut engine = open(&store);
        let key = DocumentKey::new("A", "FS", 1.0);
        assert!(matches!(
            engine.load(DocumentKind::Sale, &key, true),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_unknown_document_type_defaults_to_sale() {
        let store = MemoryStore::new();
        let mut engine = open(&store);
        assert_eq!(engine.document_kind("ZZ"), DocumentKind::Sale);
        assert!(!engine.is_known_document("ZZ"));
        assert_eq!(engine.document_kind("VFA"), DocumentKind::Purchase);
    }

    #[test]
    fn test_discard_without_draft_is_noop() {
        let store = MemoryStore::new();
        let mut engine = open(&store);
        engine.discard_draft();
        assert_eq!(store.stats().discards, 0);
        engine.open_draft(DocumentKind::Sale, "A", "FS").unwrap();
        engine.discard_draft();
        assert_eq!(store.stats().discards, 1);
        assert_eq!(engine.set_party(1.0), Err(EngineError::NoOpenDraft));
    }
}
