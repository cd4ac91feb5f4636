pub mod aggregator;
pub mod error;
pub mod extractor;
pub mod models;
pub mod openai;
pub mod report;
pub mod source;

pub use aggregator::{print_json, process_directory, render_json, write_json};
pub use error::ReceiptError;
pub use extractor::{ReceiptExtractor, ReceiptExtractorBuilder};
pub use models::{BatchEntry, ErrorMarker, ReceiptBatch, ReceiptRecord};
pub use openai::{OpenAiClient, OpenAiClientBuilder, OpenAiError, VisionClientTrait};
pub use source::{ImageFile, ImageSource, ReceiptImage};
