pub use synctv_xiu::storage::*;

// Re-export submodules so paths like `storage::file::FileStorage` still resolve
pub use synctv_xiu::storage::file;
pub use synctv_xiu::storage::memory;
pub use synctv_xiu::storage::oss;
