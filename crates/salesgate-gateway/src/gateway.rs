//! # Gateway Facade
//!
//! The single entry point an outer layer (HTTP, CLI) talks to.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SalesGateway                                   │
//! │                                                                         │
//! │  initialize / terminate / status / company_info ──► SessionManager      │
//! │  next_number / reverse_scan ──────────────────────► NumberingService    │
//! │  list_recent ─────────────────────────────────────► RecentListing       │
//! │  get / create / delete ───────────────────────────► TransactionAssembler│
//! │                                                                         │
//! │  every engine call ──► SessionManager::execute ──► AffinityWorker       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tracing::info;

use salesgate_core::{
    CompanyInfo, CreatedDocument, DeletionReport, DocumentKey, FetchedDocument, SessionSettings,
    TransactionDraft,
};
use salesgate_engine::EngineFactory;

use crate::assembler::TransactionAssembler;
use crate::config::GatewayConfig;
use crate::error::GatewayResult;
use crate::listing::{ListQuery, RecentDocuments, RecentListing};
use crate::numbering::{NumberingService, ScanResult, ScanWindow};
use crate::session::{InitOutcome, SessionManager, SessionStatus, TerminateOutcome};

/// Sales document gateway over one engine session.
pub struct SalesGateway {
    config: GatewayConfig,
    session: Arc<SessionManager>,
    numbering: NumberingService,
    listing: RecentListing,
    assembler: TransactionAssembler,
}

impl SalesGateway {
    pub fn new(config: GatewayConfig, factory: Arc<dyn EngineFactory>) -> Self {
        let session = Arc::new(SessionManager::new(factory, config.worker.clone()));
        info!(
            company_id = %config.engine.company_id,
            window_size = config.listing.window_size,
            max_results = config.listing.max_results,
            "sales gateway created"
        );

        SalesGateway {
            numbering: NumberingService::new(Arc::clone(&session)),
            listing: RecentListing::new(Arc::clone(&session), config.listing.clone()),
            assembler: TransactionAssembler::new(Arc::clone(&session)),
            session,
            config,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    // =========================================================================
    // Session
    // =========================================================================

    pub async fn initialize(
        &self,
        product_code: &str,
        company_id: &str,
        debug_mode: bool,
    ) -> GatewayResult<InitOutcome> {
        self.session
            .initialize(SessionSettings::new(product_code, company_id, debug_mode))
            .await
    }

    /// Initializes with the `[engine]` section of the configuration.
    pub async fn initialize_from_config(&self) -> GatewayResult<InitOutcome> {
        self.session
            .initialize(self.config.engine.session_settings())
            .await
    }

    pub async fn terminate(&self) -> GatewayResult<TerminateOutcome> {
        self.session.terminate().await
    }

    pub async fn status(&self) -> SessionStatus {
        self.session.status().await
    }

    pub async fn company_info(&self) -> GatewayResult<CompanyInfo> {
        self.session.company_info().await
    }

    pub fn available_products(&self) -> Vec<String> {
        salesgate_core::available_products()
    }

    // =========================================================================
    // Numbering
    // =========================================================================

    pub async fn next_number(&self, document_type: &str, series: &str) -> GatewayResult<f64> {
        self.numbering.next_number(document_type, series).await
    }

    pub async fn reverse_scan(
        &self,
        document_type: &str,
        series: &str,
        start_number: f64,
        window_size: u32,
        max_results: u32,
    ) -> GatewayResult<ScanResult> {
        self.numbering
            .reverse_scan(
                document_type,
                series,
                ScanWindow::new(start_number, window_size, max_results),
            )
            .await
    }

    // =========================================================================
    // Documents
    // =========================================================================

    pub async fn list_recent(&self, query: ListQuery) -> GatewayResult<RecentDocuments> {
        self.listing.list_recent(query).await
    }

    pub async fn get(
        &self,
        series: &str,
        document_type: &str,
        number: f64,
        suspended: bool,
    ) -> GatewayResult<FetchedDocument> {
        self.assembler
            .get(DocumentKey::new(series, document_type, number), suspended)
            .await
    }

    pub async fn create(&self, draft: TransactionDraft) -> GatewayResult<CreatedDocument> {
        self.assembler.create(draft).await
    }

    pub async fn delete(
        &self,
        series: &str,
        document_type: &str,
        number: f64,
    ) -> GatewayResult<DeletionReport> {
        self.assembler
            .delete(DocumentKey::new(series, document_type, number))
            .await
    }
}
