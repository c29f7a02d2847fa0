//! Admin Override Channel: server-initiated forced logout.

use std::sync::Arc;

use crate::{
    domain::{CredentialStore, ForceLogout, Navigator},
    infrastructure::dto::websocket::{ForceLogoutPayload, events},
};

use super::router::{EventRouter, Handler, Subscription};

/// Reason code passed to the login view after a forced logout.
pub const FORCE_LOGOUT_REASON: &str = "force_logout";

pub struct AdminOverrideChannel {
    subscription: Subscription,
}

impl AdminOverrideChannel {
    pub fn new(
        router: Arc<EventRouter>,
        credentials: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let weak_router = Arc::downgrade(&router);
        let on_force_logout: Handler<ForceLogout> = Arc::new(move |command: ForceLogout| {
            let Some(router) = weak_router.upgrade() else {
                return;
            };
            if router.current_identity().as_ref() != Some(&command.user_id) {
                tracing::debug!(
                    "Ignoring forced logout addressed to '{}'",
                    command.user_id
                );
                return;
            }

            tracing::warn!(
                "Forced logout of '{}' by administrator (reason: {})",
                command.user_id,
                command.reason.as_deref().unwrap_or("none")
            );
            credentials.clear();
            router.manager().release();
            navigator.redirect_to_login(FORCE_LOGOUT_REASON);
        });
        let subscription = router.on_decoded::<ForceLogoutPayload, ForceLogout>(
            events::ADMIN_FORCE_LOGOUT,
            on_force_logout,
        );

        Self { subscription }
    }
}

impl Drop for AdminOverrideChannel {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}
