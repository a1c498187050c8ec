//! Tessclassify Test - Regression test framework
//!
//! This crate provides a regression test framework for the tessclassify
//! workspace, supporting three modes of operation:
//!
//! - **Generate**: Create golden (reference) files from current output
//! - **Compare**: Compare current output with golden files (default)
//! - **Display**: Run tests without comparison
//!
//! # Usage
//!
//! ```ignore
//! use tessclassify_test::RegParams;
//!
//! #[test]
//! fn my_reg_test() {
//!     let mut rp = RegParams::new("mytest");
//!
//!     // Compare values
//!     rp.compare_values(expected, actual, delta);
//!
//!     // Compare serialized output
//!     rp.compare_strings(&expected_bytes, &actual_bytes);
//!
//!     // Check overall success
//!     assert!(rp.cleanup());
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `REGTEST_MODE`: Set to "generate", "compare", or "display"

mod error;
mod params;

pub use error::{TestError, TestResult};
pub use params::{RegParams, RegTestMode};

/// Get the workspace root directory
pub fn workspace_root() -> String {
    format!("{}/../..", env!("CARGO_MANIFEST_DIR"))
}

/// Get the path to a test data file
pub fn test_data_path(name: &str) -> String {
    format!("{}/tests/data/{}", workspace_root(), name)
}

/// Get the golden files directory
pub fn golden_dir() -> String {
    format!("{}/tests/golden", workspace_root())
}

/// Get the regression output directory
pub fn regout_dir() -> String {
    format!("{}/tests/regout", workspace_root())
}

/// Load test data from the tests/data directory
pub fn load_test_data(name: &str) -> TestResult<Vec<u8>> {
    let path = test_data_path(name);
    std::fs::read(&path).map_err(|e| TestError::DataLoad {
        path: path.clone(),
        message: e.to_string(),
    })
}
