//! Integration tests for kudufleet


mod test_engine;
mod test_filter;
mod test_report;
