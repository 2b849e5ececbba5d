pub mod backup_service;
pub mod cache_service;
pub mod hash_service;
pub mod organize_service;
pub mod scan_service;
pub mod undo_service;
