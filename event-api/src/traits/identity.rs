use crate::model::user::User;

/// Read-only access to the authenticated user, if any.
pub trait IdentityProvider: Send + Sync {
    fn get_authenticated_user(&self) -> Option<User>;
}

/// A fixed identity, handy for hosts that authenticate once up front.
impl IdentityProvider for Option<User> {
    fn get_authenticated_user(&self) -> Option<User> {
        self.clone()
    }
}
