pub mod document_cache;
