pub mod document_loading;
pub mod pdf_extraction;
