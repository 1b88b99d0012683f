//! Client session: who is signed in, and which cart backend is live.
//!
//! [`AuthState`] is the observer registry for authentication changes. A
//! [`Session`] selects the cart backend once per login and swaps it back at
//! logout, always keeping the lines the user last saw.

use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

use crate::cart::local::{LocalCart, LocalStorage};
use crate::cart::remote::RemoteCart;
use crate::cart::server::ServerCart;
use crate::cart::CartBackend;
use crate::domain::aggregates::Cart;
use crate::domain::value_objects::ActorId;
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::{Result, StorefrontError};

const EVENT_CAPACITY: usize = 16;

#[derive(Clone)]
pub struct Credential {
    pub actor: ActorId,
    pub token: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential").field("actor", &self.actor).field("token", &"<redacted>").finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthEvent {
    LoggedIn { actor: ActorId },
    LoggedOut,
}

#[derive(Debug)]
pub struct AuthState {
    current: RwLock<Option<Credential>>,
    events: broadcast::Sender<AuthEvent>,
}

impl Default for AuthState {
    fn default() -> Self { Self::new() }
}

impl AuthState {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { current: RwLock::new(None), events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> { self.events.subscribe() }

    pub fn credential(&self) -> Option<Credential> {
        self.current.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn actor(&self) -> Option<ActorId> { self.credential().map(|c| c.actor) }

    pub fn set(&self, credential: Credential) {
        let actor = credential.actor;
        *self.current.write().unwrap_or_else(|p| p.into_inner()) = Some(credential);
        self.notify(AuthEvent::LoggedIn { actor });
    }

    pub fn clear(&self) {
        let had = self.current.write().unwrap_or_else(|p| p.into_inner()).take().is_some();
        if had {
            self.notify(AuthEvent::LoggedOut);
        }
    }

    fn notify(&self, event: AuthEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

pub enum ActiveCart<S> {
    Guest(LocalCart<S>),
    Member(ServerCart<S>),
}

pub struct Session<S> {
    auth: Arc<AuthState>,
    // only `None` while a login/logout swap is in flight
    cart: Option<ActiveCart<S>>,
}

impl<S: LocalStorage + 'static> Session<S> {
    pub fn new(auth: Arc<AuthState>, local: LocalCart<S>) -> Self {
        Self { auth, cart: Some(ActiveCart::Guest(local)) }
    }

    pub fn auth(&self) -> &Arc<AuthState> { &self.auth }

    pub fn is_member(&self) -> bool { matches!(self.cart, Some(ActiveCart::Member(_))) }

    pub fn view(&self) -> Option<&Cart> {
        match self.cart.as_ref()? {
            ActiveCart::Guest(local) => Some(local.cart()),
            ActiveCart::Member(server) => Some(server.cart()),
        }
    }

    pub fn cart(&mut self) -> Result<&mut dyn CartBackend> {
        match self.cart.as_mut() {
            Some(ActiveCart::Guest(local)) => Ok(local),
            Some(ActiveCart::Member(server)) => Ok(server),
            None => Err(StorefrontError::Storage("cart is being switched".to_string())),
        }
    }

    /// Stores the credential, switches to the member cart and merges the guest lines into it.
    ///
    /// A failed merge still leaves the session signed in; [`Session::reconcile`] may be retried.
    pub async fn login(&mut self, credential: Credential, remote: Arc<dyn RemoteCart>) -> Result<ReconcileReport> {
        let actor = credential.actor;
        if let Some(ActiveCart::Member(current)) = &self.cart {
            if current.actor() != actor {
                return Err(StorefrontError::Conflict("Another account is signed in".to_string()));
            }
        }
        self.auth.set(credential);
        let local = match self.cart.take() {
            Some(ActiveCart::Guest(local)) => Some(local),
            Some(ActiveCart::Member(server)) => Some(server.into_local()),
            None => None,
        };
        let Some(local) = local else {
            return Err(StorefrontError::Storage("cart is being switched".to_string()));
        };
        self.cart = Some(ActiveCart::Member(ServerCart::new(remote, actor, local)));
        tracing::info!(%actor, "Signed in");
        self.reconcile().await
    }

    pub async fn reconcile(&mut self) -> Result<ReconcileReport> {
        let Some(ActiveCart::Member(server)) = self.cart.as_mut() else {
            return Err(StorefrontError::Unauthorized);
        };
        let reconciler = Reconciler::new(server.remote().clone(), server.actor());
        reconciler.run(server.mirror_mut()).await
    }

    /// Mirrors the server cart locally, then drops the credential. Lines are kept.
    pub async fn logout(&mut self) {
        self.cart = match self.cart.take() {
            Some(ActiveCart::Member(mut server)) => {
                Reconciler::new(server.remote().clone(), server.actor()).mirror_for_logout(server.mirror_mut()).await;
                Some(ActiveCart::Guest(server.into_local()))
            }
            Some(guest) => Some(guest),
            None => {
                tracing::warn!("Logout while cart was being switched");
                None
            }
        };
        self.auth.clear();
        tracing::info!("Signed out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::local::MemoryStorage;
    use crate::cart::remote::ActorCart;
    use crate::cart::service::CartService;
    use crate::domain::aggregates::CatalogItem;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn test_auth_changes_are_broadcast() {
        let auth = AuthState::new();
        let mut rx = auth.subscribe();
        let actor = ActorId::new();
        auth.set(Credential { actor, token: "t".into() });
        auth.clear();
        auth.clear();
        assert_eq!(rx.recv().await.unwrap(), AuthEvent::LoggedIn { actor });
        assert_eq!(rx.recv().await.unwrap(), AuthEvent::LoggedOut);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_credential_debug_hides_token() {
        let c = Credential { actor: ActorId::new(), token: "secret-token".into() };
        assert!(!format!("{c:?}").contains("secret-token"));
    }

    #[tokio::test]
    async fn test_login_merges_and_logout_keeps_cart() {
        let store = Arc::new(InMemoryStore::new());
        let service = CartService::new(store.clone(), store.clone());
        let tea = CatalogItem::new("Tea", 250, "INR");
        let tea_snapshot = tea.snapshot();
        store.insert_item(tea).await;
        let actor = ActorId::new();
        service.add_line(actor, tea_snapshot.id, 1).await.unwrap();

        let auth = Arc::new(AuthState::new());
        let mut session = Session::new(auth.clone(), LocalCart::open(MemoryStorage::new()));
        session.cart().unwrap().add(tea_snapshot.clone(), 1).await.unwrap();

        let remote: Arc<dyn RemoteCart> = Arc::new(ActorCart::new(service.clone(), actor));
        session.login(Credential { actor, token: "t".into() }, remote.clone()).await.unwrap();
        assert!(session.is_member());
        assert_eq!(auth.actor(), Some(actor));
        assert_eq!(service.snapshot(actor).await.unwrap().qty_of(tea_snapshot.id).map(|q| q.value()), Some(2));

        session.logout().await;
        assert!(!session.is_member());
        assert_eq!(auth.actor(), None);
        assert_eq!(session.view().and_then(|c| c.get(tea_snapshot.id)).map(|l| l.qty.value()), Some(2));

        // the kept lines are the mirrored baseline, not fresh guest additions
        let report = session.login(Credential { actor, token: "t".into() }, remote).await.unwrap();
        assert_eq!(report.updated + report.added, 0);
        assert_eq!(service.snapshot(actor).await.unwrap().qty_of(tea_snapshot.id).map(|q| q.value()), Some(2));
    }

    #[tokio::test]
    async fn test_reconcile_requires_member() {
        let mut session = Session::new(Arc::new(AuthState::new()), LocalCart::open(MemoryStorage::new()));
        assert!(matches!(session.reconcile().await, Err(StorefrontError::Unauthorized)));
    }
}
