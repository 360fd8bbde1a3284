//! Access policy
//!
//! One explicit policy check invoked by the HTTP layer before calling
//! into the core; the core itself never inspects session or role state.

use mailflow_common::types::{UserId, UserRole};

/// The authenticated principal, as the HTTP layer sees it
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: UserId,
    pub role: UserRole,
    pub is_blocked: bool,
}

/// What the actor is trying to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Edit,
    Delete,
    Send,
    ListUsers,
    BlockUser,
}

/// What the action targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// A resource owned by a user (clients, mailings, statistics)
    Owned(UserId),
    /// A shared, ownerless resource (messages)
    Shared,
}

/// Decide whether `actor` may perform `action` on `resource`.
///
/// Blocked actors are denied everything. Managers may read any owned
/// resource and administer users, but mutating someone else's resource
/// still requires ownership.
pub fn can_access(actor: &Actor, action: Action, resource: Resource) -> bool {
    if actor.is_blocked {
        return false;
    }

    let is_manager = actor.role == UserRole::Manager;

    match (action, resource) {
        (Action::View, Resource::Owned(owner)) => is_manager || owner == actor.user_id,
        (Action::Edit | Action::Delete | Action::Send, Resource::Owned(owner)) => {
            owner == actor.user_id
        }
        (Action::View | Action::Edit | Action::Delete, Resource::Shared) => true,
        (Action::ListUsers | Action::BlockUser, _) => is_manager,
        (Action::Send, Resource::Shared) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(role: UserRole, is_blocked: bool) -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            role,
            is_blocked,
        }
    }

    #[test]
    fn blocked_actors_are_denied_everything() {
        let actor = user(UserRole::Manager, true);
        let own = Resource::Owned(actor.user_id);
        for action in [
            Action::View,
            Action::Edit,
            Action::Delete,
            Action::Send,
            Action::ListUsers,
            Action::BlockUser,
        ] {
            assert!(!can_access(&actor, action, own));
            assert!(!can_access(&actor, action, Resource::Shared));
        }
    }

    #[test]
    fn owners_control_their_own_resources() {
        let actor = user(UserRole::User, false);
        let own = Resource::Owned(actor.user_id);
        assert!(can_access(&actor, Action::View, own));
        assert!(can_access(&actor, Action::Edit, own));
        assert!(can_access(&actor, Action::Delete, own));
        assert!(can_access(&actor, Action::Send, own));
    }

    #[test]
    fn users_cannot_touch_foreign_resources() {
        let actor = user(UserRole::User, false);
        let foreign = Resource::Owned(Uuid::new_v4());
        assert!(!can_access(&actor, Action::View, foreign));
        assert!(!can_access(&actor, Action::Edit, foreign));
        assert!(!can_access(&actor, Action::Delete, foreign));
        assert!(!can_access(&actor, Action::Send, foreign));
    }

    #[test]
    fn managers_read_but_do_not_mutate_foreign_resources() {
        let actor = user(UserRole::Manager, false);
        let foreign = Resource::Owned(Uuid::new_v4());
        assert!(can_access(&actor, Action::View, foreign));
        assert!(!can_access(&actor, Action::Edit, foreign));
        assert!(!can_access(&actor, Action::Delete, foreign));
        assert!(!can_access(&actor, Action::Send, foreign));
    }

    #[test]
    fn only_managers_administer_users() {
        let manager = user(UserRole::Manager, false);
        let plain = user(UserRole::User, false);
        assert!(can_access(&manager, Action::ListUsers, Resource::Shared));
        assert!(can_access(&manager, Action::BlockUser, Resource::Shared));
        assert!(!can_access(&plain, Action::ListUsers, Resource::Shared));
        assert!(!can_access(&plain, Action::BlockUser, Resource::Shared));
    }

    #[test]
    fn shared_content_is_editable_by_any_active_user() {
        let actor = user(UserRole::User, false);
        assert!(can_access(&actor, Action::View, Resource::Shared));
        assert!(can_access(&actor, Action::Edit, Resource::Shared));
        assert!(can_access(&actor, Action::Delete, Resource::Shared));
        assert!(!can_access(&actor, Action::Send, Resource::Shared));
    }
}
