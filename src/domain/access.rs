//! Role-based access gate.

use serde::{Deserialize, Serialize};
use crate::domain::aggregates::Role;

/// What an operation requires of the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Sell,
    ManageInventory,
    Administer,
}

/// Screens of the register UI.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View { #[default] Login, Dashboard, Pos, Inventory, Reports, Users, Settings }

impl View {
    pub fn required(&self) -> Option<Capability> {
        match self {
            Self::Login => None,
            Self::Pos => Some(Capability::Sell),
            Self::Inventory => Some(Capability::ManageInventory),
            Self::Dashboard | Self::Reports | Self::Users | Self::Settings => Some(Capability::Administer),
        }
    }
}

/// Predicates derived from the caller's role. `None` is a signed-out caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Access { role: Option<Role> }

impl Access {
    pub fn for_role(role: Role) -> Self { Self { role: Some(role) } }
    pub fn anonymous() -> Self { Self { role: None } }

    pub fn is_authenticated(&self) -> bool { self.role.is_some() }
    pub fn is_admin(&self) -> bool { self.role == Some(Role::Admin) }
    pub fn can_sell(&self) -> bool { matches!(self.role, Some(Role::Admin | Role::Vendedor)) }
    pub fn can_manage_inventory(&self) -> bool { matches!(self.role, Some(Role::Admin | Role::Bodeguero)) }

    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::Sell => self.can_sell(),
            Capability::ManageInventory => self.can_manage_inventory(),
            Capability::Administer => self.is_admin(),
        }
    }

    /// Where this caller lands when a view is refused.
    pub fn home(&self) -> View {
        match self.role {
            None => View::Login,
            Some(Role::Admin) => View::Dashboard,
            Some(Role::Vendedor) => View::Pos,
            Some(Role::Bodeguero) => View::Inventory,
        }
    }

    /// The requested view if permitted, otherwise the caller's home view.
    pub fn admit(&self, view: View) -> View {
        let permitted = match view.required() {
            None => true,
            Some(capability) => self.allows(capability),
        };
        if permitted && (self.is_authenticated() || view == View::Login) { view } else { self.home() }
    }
}
