use crate::application::ports::TemplateProvider;
use crate::domain::entities::DocumentTemplate;
use crate::domain::value_objects::TemplateId;
use crate::shared::error::AppError;
use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::Mutex;

const DEFAULT_CAPACITY: usize = 64;

/// Caches templates fetched from the inner provider so standalone sessions
/// keep rendering after connectivity is gone: a fetch failure falls back to
/// the previously-cached copy.
pub struct CachedTemplateProvider {
    inner: Arc<dyn TemplateProvider>,
    cache: Mutex<LruCache<TemplateId, DocumentTemplate>>,
}

impl CachedTemplateProvider {
    pub fn new(inner: Arc<dyn TemplateProvider>) -> Self {
        Self::with_capacity(inner, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(inner: Arc<dyn TemplateProvider>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn cached(&self, id: &TemplateId) -> Option<DocumentTemplate> {
        self.cache.lock().expect("template cache poisoned").get(id).cloned()
    }

    fn store(&self, template: DocumentTemplate) {
        self.cache
            .lock()
            .expect("template cache poisoned")
            .put(template.id.clone(), template);
    }
}

#[async_trait]
impl TemplateProvider for CachedTemplateProvider {
    async fn get_template(&self, id: &TemplateId) -> Result<DocumentTemplate, AppError> {
        match self.inner.get_template(id).await {
            Ok(template) => {
                self.store(template.clone());
                Ok(template)
            }
            Err(err) => {
                if let Some(template) = self.cached(id) {
                    tracing::debug!(
                        target: "docs::templates",
                        template_id = %id,
                        error = %err,
                        "provider unavailable, serving cached template"
                    );
                    return Ok(template);
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::FieldSpec;
    use crate::domain::value_objects::{FieldKey, FieldKind};
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FlakyProvider {
        offline: AtomicBool,
    }

    #[async_trait]
    impl TemplateProvider for FlakyProvider {
        async fn get_template(&self, id: &TemplateId) -> Result<DocumentTemplate, AppError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(AppError::Network("provider unreachable".to_string()));
            }
            Ok(DocumentTemplate::new(
                id.clone(),
                "Odometer Disclosure",
                vec![FieldSpec::new(
                    FieldKey::new("mileage".to_string()).unwrap(),
                    "Mileage",
                    FieldKind::Number,
                    true,
                )],
            ))
        }
    }

    #[tokio::test]
    async fn serves_cached_copy_when_provider_goes_offline() {
        let inner = Arc::new(FlakyProvider {
            offline: AtomicBool::new(false),
        });
        let provider = CachedTemplateProvider::new(inner.clone());
        let id = TemplateId::new("tpl-odometer".to_string()).unwrap();

        let online_copy = provider.get_template(&id).await.unwrap();

        inner.offline.store(true, Ordering::SeqCst);
        let cached_copy = provider.get_template(&id).await.unwrap();
        assert_eq!(online_copy, cached_copy);
    }

    #[tokio::test]
    async fn uncached_template_fails_while_offline() {
        let inner = Arc::new(FlakyProvider {
            offline: AtomicBool::new(true),
        });
        let provider = CachedTemplateProvider::new(inner);
        let id = TemplateId::new("tpl-never-fetched".to_string()).unwrap();

        assert!(matches!(
            provider.get_template(&id).await,
            Err(AppError::Network(_))
        ));
    }
}
