mod repository;
mod supabase;

pub use repository::ProductStore;
pub use supabase::{SupabaseConfig, SupabaseProductStore};

#[cfg(test)]
pub use repository::MockProductStore;
