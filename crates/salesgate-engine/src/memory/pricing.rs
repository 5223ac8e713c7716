//! Line pricing for the in-process engine.
//!
//! ```text
//! net unit   = unit price | gross price with tax extracted | 0
//! line net   = net unit × quantity − global discount
//! line tax   = line net × tax rate
//! totals     = Σ line net, Σ line tax, net + tax
//! ```

use salesgate_core::{
    DocumentKey, DocumentTotals, LinePrice, LineSpec, Money, PersistedLine, PersistedTransaction,
    TaxRate,
};

use crate::engine::DraftHeader;
use crate::error::{EngineError, EngineResult};

fn net_unit_price(line: &LineSpec) -> Money {
    match line.price {
        LinePrice::Unit(price) => price,
        LinePrice::TaxIncluded(gross) => gross.extract_tax_included(line.tax_rate),
        LinePrice::Free => Money::zero(),
    }
}

fn overflow(line_number: u32) -> EngineError {
    EngineError::fault(format!("amount overflow on line {}", line_number))
}

/// Prices every line and returns them with the document totals.
///
/// Amounts that do not fit in `Money` fail the calculation instead of
/// wrapping.
pub(crate) fn price_lines(
    lines: &[LineSpec],
    discount_percent: f64,
) -> EngineResult<(Vec<PersistedLine>, DocumentTotals)> {
    let discount = TaxRate::from_percentage(discount_percent);
    let mut totals = DocumentTotals::default();
    let mut priced = Vec::with_capacity(lines.len());

    for (index, line) in lines.iter().enumerate() {
        let line_number = index as u32 + 1;
        let unit_price = net_unit_price(line);
        let line_total = unit_price
            .checked_multiply_quantity(line.quantity)
            .ok_or_else(|| overflow(line_number))?
            .apply_percentage_discount(discount.bps());
        let tax = line_total.calculate_tax(line.tax_rate);

        totals.net = totals
            .net
            .checked_add(line_total)
            .ok_or_else(|| overflow(line_number))?;
        totals.tax = totals
            .tax
            .checked_add(tax)
            .ok_or_else(|| overflow(line_number))?;

        priced.push(PersistedLine {
            line_number,
            item_id: line.item_id.clone(),
            description: line
                .description
                .clone()
                .unwrap_or_else(|| line.item_id.clone()),
            quantity: line.quantity,
            unit_price,
            tax_rate: line.tax_rate,
            line_total,
            unit_of_sale: line.unit_of_sale.clone(),
            warehouse_id: line.warehouse_id,
            color_id: line.color_id,
            size_id: line.size_id,
            property_value: line.property_value.clone(),
        });
    }

    totals.gross = totals
        .net
        .checked_add(totals.tax)
        .ok_or_else(|| EngineError::fault("amount overflow in document total"))?;
    Ok((priced, totals))
}

/// Assembles the stored form of a document.
pub(crate) fn build_document(
    key: DocumentKey,
    header: &DraftHeader,
    party_id: f64,
    discount_percent: f64,
    lines: &[LineSpec],
) -> EngineResult<PersistedTransaction> {
    let (lines, totals) = price_lines(lines, discount_percent)?;
    Ok(PersistedTransaction {
        transaction_id: key.transaction_id(),
        key,
        party_id,
        create_date: header.create_date,
        currency_id: header.currency.id.clone(),
        comments: header.comments.clone(),
        tax_included: header.tax_included,
        global_discount_percent: discount_percent,
        totals,
        lines,
    })
}
