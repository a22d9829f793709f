pub mod board;
pub mod commodity;
pub mod extract;
pub mod price;
pub mod region;
pub mod windows;

use rayon::prelude::*;

use crate::record::{Document, PriceRecord, Source};
use extract::Extractor;

/// Documents are independent, so a batch is extracted in parallel. Output
/// order follows input order.
pub fn process_batch(extractor: &Extractor, source: Source, docs: &[Document]) -> Vec<Vec<PriceRecord>> {
    docs.par_iter()
        .map(|doc| extractor.extract(source, doc))
        .collect()
}
