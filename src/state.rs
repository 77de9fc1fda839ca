use crate::{config::Config, llm::DynLlm, store::DynStore, utils::policy::AdminPolicy};
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub store: DynStore,
    pub llm: DynLlm,
    pub admins: AdminPolicy,
    pub config: Config,
}

impl AppState {
    /// Builds the admin policy from the configured allow-list.
    pub fn new(store: DynStore, llm: DynLlm, config: Config) -> Self {
        Self {
            store,
            llm,
            admins: AdminPolicy::new(&config.admin_emails),
            config,
        }
    }
}

impl FromRef<AppState> for DynStore {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for DynLlm {
    fn from_ref(state: &AppState) -> Self {
        state.llm.clone()
    }
}

impl FromRef<AppState> for AdminPolicy {
    fn from_ref(state: &AppState) -> Self {
        state.admins.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
