//! Subscription - explicit listener lifetime

/// Live registration of a message listener.
///
/// `dispose` (or drop) detaches it. Disposing twice is a no-op.
pub struct Subscription {
    disposer: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(disposer: impl FnOnce() + 'static) -> Self {
        Self { disposer: Some(Box::new(disposer)) }
    }

    pub fn is_active(&self) -> bool {
        self.disposer.is_some()
    }

    pub fn dispose(&mut self) {
        if let Some(disposer) = self.disposer.take() {
            disposer();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("active", &self.is_active()).finish()
    }
}
