// The `classifier` module maps documents to filing categories.
//
// Two modes: keyword matching over a filename (used when no structured
// extractor is configured) and a fixed lookup over an extracted record.
// Both are pure and total: unrecognized input degrades to `Uncategorized`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::record::{DocumentType, StructuredRecord};

/// The closed set of filing categories.
///
/// Each category corresponds to exactly one destination folder; the folder
/// map is provisioned from [`Category::ALL`] at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Invoices,
    Receipts,
    PurchaseOrders,
    Uncategorized,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Invoices,
        Category::Receipts,
        Category::PurchaseOrders,
        Category::Uncategorized,
    ];

    /// The destination folder name for this category.
    pub fn folder_name(&self) -> &'static str {
        match self {
            Category::Invoices => "Invoices",
            Category::Receipts => "Receipts",
            Category::PurchaseOrders => "Purchase Orders",
            Category::Uncategorized => "Uncategorized",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder_name())
    }
}

/// Classifies by case-insensitive keyword rules over a filename.
///
/// Rules are checked in a fixed order (invoice, receipt, purchase order) so
/// a name matching several keywords resolves deterministically; the first
/// match wins.
pub fn classify_name(name: &str) -> Category {
    let haystack = name.to_lowercase();
    if haystack.contains("invoice") || haystack.contains("inv_") {
        Category::Invoices
    } else if haystack.contains("receipt") {
        Category::Receipts
    } else if haystack.contains("purchase order") || haystack.contains("po_") {
        Category::PurchaseOrders
    } else {
        Category::Uncategorized
    }
}

/// Classifies from an extracted record's document type.
pub fn classify_record(record: &StructuredRecord) -> Category {
    match record.document_type {
        Some(DocumentType::Invoice) => Category::Invoices,
        Some(DocumentType::Receipt) => Category::Receipts,
        Some(DocumentType::PurchaseOrder) => Category::PurchaseOrders,
        Some(DocumentType::Other) | None => Category::Uncategorized,
    }
}
