use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use super::{Catalog, CatalogLoadError};

/// Process-wide catalog cache keyed by source path.
///
/// The first successful load of a path is kept for the life of the cache; later calls
/// return the same [`Arc`] without touching the file again.
#[derive(Debug, Default)]
pub struct CatalogCache {
    entries: Mutex<HashMap<PathBuf, Arc<Catalog>>>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(&self, path: impl AsRef<Path>) -> Result<Arc<Catalog>, CatalogLoadError> {
        let path = path.as_ref();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(catalog) = entries.get(path) {
            tracing::debug!(path = %path.display(), "using cached question catalog");
            return Ok(Arc::clone(catalog));
        }
        let catalog = Arc::new(Catalog::load(path)?);
        entries.insert(path.to_path_buf(), Arc::clone(&catalog));
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn second_lookup_does_not_reread_the_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .expect("temp file");
        writeln!(file, "id,page,question,type\nage,1,Age?,number").expect("write");
        let path = file.path().to_path_buf();

        let cache = CatalogCache::new();
        let first = cache.get_or_load(&path).expect("first load");
        drop(file);
        assert!(!path.exists());

        let second = cache.get_or_load(&path).expect("cached load");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn failed_loads_are_not_cached() {
        let cache = CatalogCache::new();
        let missing = Path::new("/nonexistent/questions.csv");
        assert!(matches!(
            cache.get_or_load(missing),
            Err(CatalogLoadError::NotFound { .. })
        ));
        assert!(cache.entries.lock().expect("lock").is_empty());
    }
}
