use std::sync::Arc;

use snip_core::Storage;

use crate::auth::CookieSigner;

#[derive(Clone)]
pub struct AppState {
    storage: Arc<dyn Storage>,
    signer: CookieSigner,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, signer: CookieSigner) -> Self {
        Self { storage, signer }
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn signer(&self) -> &CookieSigner {
        &self.signer
    }
}
