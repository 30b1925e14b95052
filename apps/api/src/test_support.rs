//! Application wiring over the in-memory backend, for router and flow tests.

use std::sync::Arc;

use crate::admin::AdminPanel;
use crate::auth::AuthContext;
use crate::backend::memory::MemoryBackend;
use crate::backend::AuthBackend;
use crate::config::Config;
use crate::notify::Notifier;
use crate::state::AppState;

pub struct TestApp {
    pub state: AppState,
    pub backend: Arc<MemoryBackend>,
}

/// An `AppState` whose auth context has finished loading.
pub async fn test_app() -> TestApp {
    let backend = Arc::new(MemoryBackend::new());
    let notifier = Notifier::new();
    let config = Config::for_tests();

    let auth = AuthContext::start(
        backend.clone(),
        backend.clone(),
        notifier.clone(),
        config.sign_in_redirect(),
    )
    .await
    .unwrap();
    let mut rx = auth.watch();
    rx.wait_for(|s| !s.loading).await.unwrap();
    drop(rx);

    let state = AppState {
        store: backend.clone(),
        blobs: backend.clone(),
        auth: Arc::new(auth),
        admin: AdminPanel::new(backend.clone(), backend.clone(), notifier.clone()),
        notifier,
        config,
    };
    TestApp { state, backend }
}

/// Signs `email` in through the auth context and returns the access token.
pub async fn sign_in(app: &TestApp, email: &str) -> String {
    app.backend
        .send_one_time_code(email, &app.state.config.sign_in_redirect())
        .await
        .unwrap();
    let code = app.backend.last_code(email).unwrap();
    app.state
        .auth
        .complete_sign_in(email, &code)
        .await
        .unwrap()
        .session
        .access_token
}
