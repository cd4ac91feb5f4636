mod batch;
mod receipt;

pub use batch::{BatchEntry, BatchSummary, ErrorMarker, ReceiptBatch};
pub use receipt::{MAX_TOTAL_DIGITS, ReceiptRecord, is_valid_total, parse_iso_date};
